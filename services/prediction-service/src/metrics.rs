//! Prometheus metrics owned by the prediction service.

use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

#[derive(Clone)]
pub struct ServiceMetrics {
    registry: Registry,
    pub predictions: IntCounterVec,
    pub prediction_latency: Histogram,
    pub artifact_loads: IntCounter,
}

impl ServiceMetrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();
        let predictions = IntCounterVec::new(
            Opts::new("wine_predictions_total", "Prediction requests by outcome"),
            &["outcome"],
        )?;
        let prediction_latency = Histogram::with_opts(
            HistogramOpts::new("wine_prediction_latency_seconds", "Artifact load plus inference time")
                .buckets(vec![0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 1.0]),
        )?;
        let artifact_loads = IntCounter::new("wine_artifact_loads_total", "Scaler and model loads from disk")?;
        registry.register(Box::new(predictions.clone()))?;
        registry.register(Box::new(prediction_latency.clone()))?;
        registry.register(Box::new(artifact_loads.clone()))?;
        Ok(Self { registry, predictions, prediction_latency, artifact_loads })
    }

    pub fn record_outcome(&self, ok: bool) {
        self.predictions.with_label_values(&[if ok { "ok" } else { "error" }]).inc();
    }

    /// Text exposition format.
    pub fn encode(&self) -> prometheus::Result<Vec<u8>> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buf)?;
        Ok(buf)
    }
}
