use crate::{model_service::ModelService, server::AppState};
use axum::{extract::State, response::Json};
use serde::Serialize;

#[derive(Serialize)]
pub struct Labels {
    labels: Vec<String>,
}

/// Class labels in model output order.
pub async fn labels<M: ModelService>(State(state): State<AppState<M>>) -> Json<Labels> {
    Json(Labels {
        labels: state.inference_service.labels().to_vec(),
    })
}
