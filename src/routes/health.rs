use axum::response::Json;
use serde::Serialize;

#[derive(Serialize)]
pub struct Health {
    status: &'static str,
}

/// The router only exists once the model is loaded, so answering at all
/// means the service is ready.
pub async fn healthcheck() -> Json<Health> {
    Json(Health {
        status: "Available",
    })
}
