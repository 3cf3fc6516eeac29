use crate::{
    classification::Prediction,
    error::{ErrorKind, PredictError},
    model_service::ModelService,
    server::AppState,
    upload::Upload,
};
use axum::{
    extract::{multipart::MultipartRejection, Multipart, State},
    response::Json,
};
use std::time::Instant;
use tracing::instrument;

const FILE_FIELD: &str = "file";

#[instrument(skip(state, multipart))]
pub async fn predict<M: ModelService>(
    State(state): State<AppState<M>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<Prediction>, PredictError> {
    let upload = match read_upload(multipart).await {
        Ok(upload) => upload,
        Err(err) => {
            state.metrics.record_prediction("rejected", None);
            return Err(err);
        }
    };

    let started = Instant::now();
    let result = state.inference_service.predict(upload).await;
    let elapsed_ms = started.elapsed().as_millis() as u64;

    match result {
        Ok(classification) => {
            state.metrics.record_inference_duration(elapsed_ms, "success");
            state
                .metrics
                .record_prediction("success", Some(classification.label.as_str()));
            Ok(Json(classification.into_prediction()))
        }
        Err(err) => {
            let outcome = match err.kind() {
                ErrorKind::Client => "rejected",
                ErrorKind::Server => "failed",
            };
            state.metrics.record_inference_duration(elapsed_ms, outcome);
            state.metrics.record_prediction(outcome, None);
            Err(err)
        }
    }
}

/// Pulls the first file part named `file` out of the form. Anything that is
/// not a readable multipart body counts as a missing file.
async fn read_upload(
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Upload, PredictError> {
    let mut multipart = match multipart {
        Ok(multipart) => multipart,
        Err(rejection) => {
            tracing::debug!("Request is not a multipart form: {}", rejection);
            return Err(PredictError::MissingFile);
        }
    };

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => return Err(PredictError::MissingFile),
            Err(e) => {
                tracing::debug!("Malformed multipart body: {}", e);
                return Err(PredictError::MissingFile);
            }
        };

        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        // A plain text field named `file` is not an upload.
        let Some(file_name) = field.file_name().map(str::to_string) else {
            continue;
        };
        if file_name.is_empty() {
            return Err(PredictError::EmptyFilename);
        }

        let data = field
            .bytes()
            .await
            .map_err(|e| PredictError::UploadRead(e.body_text()))?;

        tracing::info!("Received file: {} ({} bytes)", file_name, data.len());
        return Ok(Upload::new(file_name, data));
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        config::default_labels,
        inference_service::{
            tests::{png_bytes, MockModelService},
            InferenceService,
        },
        preprocessing::InputSize,
        server::{create_router, AppState},
        telemetry::Metrics,
        upload::UploadStager,
    };
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
        Router,
    };
    use serde_json::Value;
    use std::{path::Path, sync::Arc, time::Duration};
    use tower::ServiceExt;

    const BOUNDARY: &str = "X-CATARACT-BOUNDARY";

    fn test_app(probabilities: Vec<f32>, temp_dir: &Path) -> Router {
        let inference_service = InferenceService::new(
            MockModelService::new(probabilities),
            default_labels(),
            UploadStager::new(temp_dir),
            InputSize::new(50, 80),
            Duration::from_secs(5),
        );
        let state = AppState {
            inference_service,
            metrics: Arc::new(Metrics::new().unwrap()),
        };
        create_router(state, 10 * 1024 * 1024)
    }

    fn multipart_body(name: &str, file_name: Option<&str>, data: &[u8]) -> Vec<u8> {
        let disposition = match file_name {
            Some(file_name) => format!(
                "form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: application/octet-stream",
                name, file_name
            ),
            None => format!("form-data; name=\"{}\"", name),
        };
        let mut body = format!(
            "--{}\r\nContent-Disposition: {}\r\n\r\n",
            BOUNDARY, disposition
        )
        .into_bytes();
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
        body
    }

    fn predict_request(body: Vec<u8>) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/predict")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_predict_returns_label_and_complemented_confidence() {
        let temp = tempfile::tempdir().unwrap();
        let app = test_app(vec![0.92, 0.08], temp.path());

        let body = multipart_body("file", Some("image_265.png"), &png_bytes(40, 30, [10, 20, 30]));
        let response = app.oneshot(predict_request(body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["prediction"], "cataract");
        let confidence = json["confidence"].as_f64().unwrap();
        assert!((confidence - 0.08).abs() < 1e-9);
        assert!(std::fs::read_dir(temp.path()).unwrap().next().is_none());
    }

    #[tokio::test]
    async fn test_predict_without_file_field() {
        let temp = tempfile::tempdir().unwrap();
        let app = test_app(vec![0.92, 0.08], temp.path());

        let body = multipart_body("image", Some("eye.png"), &png_bytes(4, 4, [0, 0, 0]));
        let response = app.oneshot(predict_request(body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            json_body(response).await,
            serde_json::json!({ "error": "No file uploaded" })
        );
    }

    #[tokio::test]
    async fn test_predict_with_text_field_named_file() {
        let temp = tempfile::tempdir().unwrap();
        let app = test_app(vec![0.92, 0.08], temp.path());

        let body = multipart_body("file", None, b"just text");
        let response = app.oneshot(predict_request(body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"], "No file uploaded");
    }

    #[tokio::test]
    async fn test_predict_without_multipart_body() {
        let temp = tempfile::tempdir().unwrap();
        let app = test_app(vec![0.92, 0.08], temp.path());

        let request = Request::builder()
            .method("POST")
            .uri("/predict")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"], "No file uploaded");
    }

    #[tokio::test]
    async fn test_predict_with_empty_filename() {
        let temp = tempfile::tempdir().unwrap();
        let app = test_app(vec![0.92, 0.08], temp.path());

        let body = multipart_body("file", Some(""), &png_bytes(4, 4, [0, 0, 0]));
        let response = app.oneshot(predict_request(body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            json_body(response).await,
            serde_json::json!({ "error": "Empty filename" })
        );
    }

    #[tokio::test]
    async fn test_predict_with_corrupt_image() {
        let temp = tempfile::tempdir().unwrap();
        let app = test_app(vec![0.92, 0.08], temp.path());

        let body = multipart_body("file", Some("broken.png"), b"\x89PNG not really");
        let response = app.oneshot(predict_request(body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = json_body(response).await;
        assert!(!json["error"].as_str().unwrap().is_empty());
        assert!(std::fs::read_dir(temp.path()).unwrap().next().is_none());
    }

    #[tokio::test]
    async fn test_labels_and_health() {
        let temp = tempfile::tempdir().unwrap();
        let app = test_app(vec![0.92, 0.08], temp.path());

        let response = app
            .clone()
            .oneshot(Request::builder().uri("/labels").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            json_body(response).await,
            serde_json::json!({ "labels": ["cataract", "normal"] })
        );

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["status"], "Available");
    }

    #[tokio::test]
    async fn test_metrics_exposes_prediction_counts() {
        let temp = tempfile::tempdir().unwrap();
        let app = test_app(vec![0.92, 0.08], temp.path());

        let body = multipart_body("file", Some("eye.png"), &png_bytes(8, 8, [200, 10, 10]));
        let response = app.clone().oneshot(predict_request(body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.contains("predictions_total"), "{}", text);
        assert!(text.contains("outcome=\"success\""), "{}", text);
        assert!(text.contains("label=\"cataract\""), "{}", text);
    }
}
