use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum ClassificationError {
    #[error("Model returned an empty output")]
    EmptyOutput,
    #[error("Model returned {got} probabilities but {expected} class labels are configured")]
    LabelMismatch { expected: usize, got: usize },
    #[error("Model returned a non-finite probability at index {0}")]
    NonFinite(usize),
}

/// Winning class of a single model output.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub class_id: usize,
    pub label: String,
    pub raw_confidence: f64,
}

/// Response body of a successful prediction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    pub prediction: String,
    pub confidence: f64,
}

impl Classification {
    /// Confidence as served to clients: the complement of the model's own
    /// confidence rounded to three decimals. Existing clients depend on it.
    pub fn reported_confidence(&self) -> f64 {
        1.0 - round_to(self.raw_confidence, 3)
    }

    pub fn into_prediction(self) -> Prediction {
        let confidence = self.reported_confidence();
        Prediction {
            prediction: self.label,
            confidence,
        }
    }
}

/// Half-to-even, so exact ties like 0.8125 round down to 0.812.
fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round_ties_even() / factor
}

/// Picks the most probable label. Ties go to the lowest index.
pub fn classify(
    probabilities: &[f32],
    labels: &[String],
) -> Result<Classification, ClassificationError> {
    if probabilities.is_empty() {
        return Err(ClassificationError::EmptyOutput);
    }
    if probabilities.len() != labels.len() {
        return Err(ClassificationError::LabelMismatch {
            expected: labels.len(),
            got: probabilities.len(),
        });
    }
    if let Some(index) = probabilities.iter().position(|p| !p.is_finite()) {
        return Err(ClassificationError::NonFinite(index));
    }

    let (class_id, prob) = probabilities
        .iter()
        .enumerate()
        .map(|(index, value)| (index, *value))
        .reduce(|accum, row| if row.1 > accum.1 { row } else { accum })
        .ok_or(ClassificationError::EmptyOutput)?;

    Ok(Classification {
        class_id,
        label: labels[class_id].clone(),
        raw_confidence: f64::from(prob),
    })
}
