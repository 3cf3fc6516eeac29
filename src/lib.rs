mod app;
mod ort_service;
mod routes;
mod telemetry;

pub mod classification;
pub mod config;
pub mod error;
pub mod inference_service;
pub mod model_service;
pub mod preprocessing;
pub mod server;
pub mod upload;

pub use app::start_app;
pub use telemetry::Metrics;
