use crate::{
    classification::ClassificationError, model_service::ModelServiceError,
    preprocessing::PreprocessError,
};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Client,
    Server,
}

#[derive(Error, Debug)]
pub enum PredictError {
    #[error("No file uploaded")]
    MissingFile,
    #[error("Empty filename")]
    EmptyFilename,
    #[error("Failed to read upload: {0}")]
    UploadRead(String),
    #[error("{0}")]
    Staging(#[from] std::io::Error),
    #[error("{0}")]
    Preprocess(#[from] PreprocessError),
    #[error("{0}")]
    Model(#[from] ModelServiceError),
    #[error("{0}")]
    Classification(#[from] ClassificationError),
    #[error("Inference timed out after {0} ms")]
    Timeout(u64),
    #[error("Inference task failed: {0}")]
    TaskFailed(String),
}

impl PredictError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PredictError::MissingFile
            | PredictError::EmptyFilename
            | PredictError::UploadRead(_) => ErrorKind::Client,
            _ => ErrorKind::Server,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::Client => StatusCode::BAD_REQUEST,
            ErrorKind::Server => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

impl IntoResponse for PredictError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self.kind() {
            ErrorKind::Client => tracing::warn!(error = %self, "Rejected prediction request"),
            ErrorKind::Server => tracing::error!(error = %self, "Prediction failed"),
        }

        (
            status,
            Json(ErrorBody {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_errors_map_to_bad_request() {
        assert_eq!(PredictError::MissingFile.status(), StatusCode::BAD_REQUEST);
        assert_eq!(PredictError::EmptyFilename.status(), StatusCode::BAD_REQUEST);
        assert_eq!(PredictError::MissingFile.to_string(), "No file uploaded");
        assert_eq!(PredictError::EmptyFilename.to_string(), "Empty filename");
    }

    #[test]
    fn test_processing_errors_map_to_internal_error() {
        let err = PredictError::from(ClassificationError::EmptyOutput);
        assert_eq!(err.kind(), ErrorKind::Server);
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.to_string(), "Model returned an empty output");

        assert_eq!(
            PredictError::Timeout(250).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_into_response_status() {
        let response = PredictError::EmptyFilename.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = PredictError::TaskFailed("panicked".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
