use crate::{
    config::Config, inference_service::InferenceService, ort_service::OrtModelService,
    server::HttpServer,
};
use std::error::Error;
use tokio::signal;

// Input size the classifier was trained on.
const TRAINED_INPUT_SIZE: (u32, u32) = (224, 224);

pub async fn start_app(config: Config) -> Result<(), Box<dyn Error>> {
    let ort_model_service = match OrtModelService::new(&config.model) {
        Ok(service) => service,
        Err(e) => {
            tracing::error!("Failed to load model: {:?}", e);
            return Err(Box::new(e));
        }
    };

    let input_size = (config.model.input_height, config.model.input_width);
    if input_size != TRAINED_INPUT_SIZE {
        tracing::warn!(
            "Images are resized to {}x{} but the classifier was trained on {}x{}",
            input_size.0,
            input_size.1,
            TRAINED_INPUT_SIZE.0,
            TRAINED_INPUT_SIZE.1
        );
    }

    let inference_service = InferenceService::from_config(ort_model_service, &config);
    let server = HttpServer::new(inference_service, &config).await?;

    server
        .run(async {
            shutdown_signal().await;
            tracing::info!("Shutdown signal received, starting graceful shutdown.");
        })
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
