use opentelemetry::{
    global,
    metrics::{Counter, Histogram, MeterProvider},
    KeyValue,
};
use opentelemetry_sdk::metrics::SdkMeterProvider;
use prometheus::Registry;
use std::collections::HashSet;

pub struct Metrics {
    prediction_counter: Counter<u64>,
    inference_duration: Histogram<u64>,
    // Held so that replacing the global provider does not shut this one down.
    _provider: SdkMeterProvider,
    pub registry: Registry,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();
        let exporter = opentelemetry_prometheus::exporter()
            .with_registry(registry.clone())
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build prometheus exporter: {}", e))?;

        let provider = SdkMeterProvider::builder()
            .with_reader(exporter)
            .build();

        let meter = provider.meter("cataract_classifier");
        global::set_meter_provider(provider.clone());

        let prediction_counter = meter
            .u64_counter("predictions_total")
            .with_description("Total number of prediction requests by outcome and label")
            .build();

        let boundaries = generate_boundaries((10, 100, 1000, 5000, 30000));

        let inference_duration = meter
            .u64_histogram("inference_duration_ms")
            .with_boundaries(boundaries)
            .with_description("Duration of preprocessing and inference in milliseconds")
            .build();

        Ok(Metrics {
            prediction_counter,
            inference_duration,
            _provider: provider,
            registry,
        })
    }

    pub fn record_prediction(&self, outcome: &str, label: Option<&str>) {
        let attributes = vec![
            KeyValue::new("outcome", outcome.to_string()),
            KeyValue::new("label", label.unwrap_or("none").to_string()),
        ];
        self.prediction_counter.add(1, &attributes);
    }

    pub fn record_inference_duration(&self, duration_ms: u64, outcome: &str) {
        let attributes = vec![KeyValue::new("outcome", outcome.to_string())];
        self.inference_duration.record(duration_ms, &attributes);
    }
}

/// Histogram buckets: fine steps for fast inference, coarser ones towards the
/// timeout.
fn generate_boundaries(parts: (i32, i32, i32, i32, i32)) -> Vec<f64> {
    let first_step: usize = 10;
    let middle_step: usize = 100;
    let end_step: usize = 1000;
    let tail_step: usize = 5000;
    let first_part = (parts.0..=parts.1).step_by(first_step);
    let middle_part = (parts.1..=parts.2).step_by(middle_step);
    let end_part = (parts.2..=parts.3).step_by(end_step);
    let tail_part = (parts.3..=parts.4).step_by(tail_step);

    let mut seen = HashSet::new();
    first_part
        .chain(middle_part)
        .chain(end_part)
        .chain(tail_part)
        .filter(|&x| seen.insert(x))
        .map(|x| x as f64)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_boundaries() {
        let parts = (10, 30, 230, 1230, 6230);
        let get = generate_boundaries(parts);
        let expected = vec![10.0, 20.0, 30.0, 130.0, 230.0, 1230.0, 6230.0];

        assert_eq!(get, expected);
    }

    #[test]
    fn test_boundaries_are_increasing() {
        let get = generate_boundaries((10, 100, 1000, 5000, 30000));

        assert!(get.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(get.first(), Some(&10.0));
        assert_eq!(get.last(), Some(&30000.0));
    }
}
