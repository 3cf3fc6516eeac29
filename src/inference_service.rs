use crate::{
    classification::{classify, Classification},
    config::Config,
    error::PredictError,
    model_service::ModelService,
    preprocessing::{preprocess_file, InputSize},
    upload::{Upload, UploadStager},
};
use std::{sync::Arc, time::Duration};
use tracing::instrument;

/// Runs one upload through staging, preprocessing, the model and
/// classification. The model is shared read-only across requests.
pub struct InferenceService<M: ModelService> {
    model_service: Arc<M>,
    labels: Arc<Vec<String>>,
    stager: UploadStager,
    input_size: InputSize,
    timeout: Duration,
}

impl<M: ModelService> Clone for InferenceService<M> {
    fn clone(&self) -> Self {
        Self {
            model_service: self.model_service.clone(),
            labels: self.labels.clone(),
            stager: self.stager.clone(),
            input_size: self.input_size,
            timeout: self.timeout,
        }
    }
}

impl<M: ModelService> InferenceService<M> {
    pub fn new(
        model_service: M,
        labels: Vec<String>,
        stager: UploadStager,
        input_size: InputSize,
        timeout: Duration,
    ) -> Self {
        Self {
            model_service: Arc::new(model_service),
            labels: Arc::new(labels),
            stager,
            input_size,
            timeout,
        }
    }

    pub fn from_config(model_service: M, config: &Config) -> Self {
        Self::new(
            model_service,
            config.labels.clone(),
            UploadStager::new(config.upload.temp_dir.clone()),
            InputSize::new(config.model.input_height, config.model.input_width),
            Duration::from_millis(config.model.inference_timeout_ms),
        )
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    #[instrument(skip(self, upload), fields(file_name = %upload.file_name, bytes = upload.data.len()))]
    pub async fn predict(&self, upload: Upload) -> Result<Classification, PredictError> {
        if upload.file_name.is_empty() {
            return Err(PredictError::EmptyFilename);
        }

        let model_service = self.model_service.clone();
        let stager = self.stager.clone();
        let input_size = self.input_size;

        // The staged file lives inside the blocking task, so it is removed
        // when the task ends even if the caller already timed out.
        let task = tokio::task::spawn_blocking(move || -> Result<Vec<f32>, PredictError> {
            let staged = stager.stage(&upload)?;
            let input = preprocess_file(staged.path(), input_size)?;
            let probabilities = model_service.predict(&input)?;
            Ok(probabilities)
        });

        let probabilities = match tokio::time::timeout(self.timeout, task).await {
            Ok(Ok(result)) => result?,
            Ok(Err(join_error)) => return Err(PredictError::TaskFailed(join_error.to_string())),
            Err(_) => return Err(PredictError::Timeout(self.timeout.as_millis() as u64)),
        };

        let classification = classify(&probabilities, &self.labels)?;
        tracing::debug!(
            "Predicted class_id={} label={} raw_confidence={:.3}",
            classification.class_id,
            classification.label,
            classification.raw_confidence
        );

        Ok(classification)
    }
}
