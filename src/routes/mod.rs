mod health;
mod labels;
mod metrics;
mod predict;

use crate::{model_service::ModelService, server::AppState};
use axum::{
    routing::{get, post},
    Router,
};

pub fn api_routes<M: ModelService>() -> Router<AppState<M>> {
    Router::new()
        .route("/predict", post(predict::predict::<M>))
        .route("/labels", get(labels::labels::<M>))
        .route("/metrics", get(metrics::metrics_handler::<M>))
        .route("/health", get(health::healthcheck))
}
