use std::sync::Arc;
use std::time::Duration;

use actix_web::{middleware::Logger, web, App, HttpServer};
use env_logger::Env;
use log::{error, info, warn};

use audio_analysis_api::config::{
    HandlerConfig, MetricsConfig, OutputRetention, SarvamConfig, ServerConfig,
};
use audio_analysis_api::handlers::{analyze_audio, home, metrics_handler};
use audio_analysis_api::metrics::{create_metrics_exporter, Metrics};
use audio_analysis_api::pipeline::AnalysisContext;
use audio_analysis_api::transcription::TranscriptionService;
use audio_analysis_api::{config_loader, retention, SarvamClient};

fn startup_error<E: std::fmt::Display>(err: E) -> std::io::Error {
    error!("{}", err);
    std::io::Error::new(std::io::ErrorKind::Other, err.to_string())
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Initialize logger
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    if !config_loader::load_config() {
        info!("No configuration file loaded, using environment and defaults");
    }

    // The service key is mandatory
    let sarvam_config = SarvamConfig::from_env().map_err(startup_error)?;
    let handler_config = HandlerConfig::default();
    let server_config = ServerConfig::default();
    let metrics_config = MetricsConfig::default();

    let metrics = Metrics::new(create_metrics_exporter(&metrics_config.exporter_type));

    if let Err(e) = handler_config.ensure_dirs() {
        warn!(
            "Failed to create working directories {} / {}: {}",
            handler_config.temp_dir.display(),
            handler_config.output_dir.display(),
            e
        );
    }

    let service: Arc<dyn TranscriptionService> =
        Arc::new(SarvamClient::new(&sarvam_config).map_err(startup_error)?);
    let context = AnalysisContext::new(service, handler_config.clone(), metrics.clone())
        .map_err(startup_error)?;

    if let OutputRetention::MaxAge(hours) = handler_config.retention {
        retention::start_cleanup_task(
            handler_config.output_dir.clone(),
            Duration::from_secs(hours * 3600),
            Duration::from_secs(handler_config.cleanup_interval_hours.max(1) * 3600),
        );
    }

    let workers = server_config.worker_count();
    info!(
        "Starting Audio Analysis API server on http://{}:{}",
        server_config.host, server_config.port
    );
    info!("Using temp directory: {}", handler_config.temp_dir.display());
    info!("Using output directory: {}", handler_config.output_dir.display());
    info!("Transcription model: {}", handler_config.model);
    info!("Output retention: {:?}", handler_config.retention);
    info!("Metrics exporter: {}", metrics_config.exporter_type);
    info!("HTTP workers: {}", workers);

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(web::Data::new(context.clone()))
            .app_data(web::Data::new(metrics.clone()))
            .service(home)
            .service(analyze_audio)
            .service(metrics_handler)
    })
    .workers(workers)
    .keep_alive(Duration::from_secs(server_config.keep_alive))
    .bind((server_config.host.as_str(), server_config.port))?
    .run()
    .await
}
