// Audio Analysis API data models
//
// Response bodies of the HTTP API. The request body is read field by field
// in `handlers::routes`.

use serde::Serialize;

/// Error response for API
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,
}
