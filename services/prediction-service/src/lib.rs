//! HTTP front end for wine quality predictions.

use std::sync::Arc;

use anyhow::Context;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use wine_core::{AppConfig, Predictor, WineRecord};

pub mod metrics;

use metrics::ServiceMetrics;

const TARGET: &str = "prediction-service";

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub health_check: String,
    pub model_version: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PredictionResponse {
    pub quality_prediction: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReloadResponse {
    pub reloaded: bool,
}

#[derive(Clone)]
pub struct AppState {
    inner: Arc<Inner>,
}

struct Inner {
    cfg: AppConfig,
    metrics: ServiceMetrics,
    cache: RwLock<CacheSlot>,
}

/// Cached predictor tagged with the generation it was loaded under.
/// Every `/reload` bumps the generation.
#[derive(Default)]
struct CacheSlot {
    generation: u64,
    predictor: Option<Arc<Predictor>>,
}

impl AppState {
    pub fn new(cfg: AppConfig) -> anyhow::Result<Self> {
        let metrics = ServiceMetrics::new().context("registering metrics")?;
        Ok(Self { inner: Arc::new(Inner { cfg, metrics, cache: RwLock::new(CacheSlot::default()) }) })
    }

    pub fn config(&self) -> &AppConfig { &self.inner.cfg }
    pub fn metrics(&self) -> &ServiceMetrics { &self.inner.metrics }

    /// Loads scaler and model from disk, or returns the cached pair when caching is on.
    fn predictor(&self) -> wine_core::error::Result<Arc<Predictor>> {
        let cfg = &self.inner.cfg;
        let generation = {
            let slot = self.inner.cache.read();
            if cfg.serving.cache_artifacts {
                if let Some(cached) = &slot.predictor {
                    return Ok(cached.clone());
                }
            }
            slot.generation
        };
        let predictor = Arc::new(Predictor::load(&cfg.scaler_path(), &cfg.model_path())?);
        self.inner.metrics.artifact_loads.inc();
        if cfg.serving.cache_artifacts {
            self.store_if_current(generation, predictor.clone());
        }
        Ok(predictor)
    }

    /// Caches `predictor` unless the cache was invalidated after `generation` was read.
    fn store_if_current(&self, generation: u64, predictor: Arc<Predictor>) -> bool {
        let mut slot = self.inner.cache.write();
        if slot.generation != generation {
            return false;
        }
        slot.predictor = Some(predictor);
        true
    }

    pub fn invalidate(&self) {
        let mut slot = self.inner.cache.write();
        slot.generation += 1;
        slot.predictor = None;
    }
}

pub struct AppError(anyhow::Error);

impl<E: Into<anyhow::Error>> From<E> for AppError {
    fn from(e: E) -> Self { Self(e.into()) }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let message = format!("{:#}", self.0);
        error!(target: TARGET, error = %message, "request failed");
        (StatusCode::INTERNAL_SERVER_ERROR, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/predict", post(predict))
        .route("/reload", post(reload))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse { health_check: "OK".into(), model_version: state.config().serving.model_version.clone() })
}

async fn predict(
    State(state): State<AppState>,
    Json(record): Json<WineRecord>,
) -> Result<(StatusCode, Json<PredictionResponse>), AppError> {
    let timer = state.metrics().prediction_latency.start_timer();
    let worker = state.clone();
    let result = tokio::task::spawn_blocking(move || -> anyhow::Result<f64> {
        let predictor = worker.predictor()?;
        let predictions = predictor.predict(std::slice::from_ref(&record))?;
        predictions.first().copied().context("model returned no prediction")
    })
    .await
    .context("inference task panicked")?;
    timer.observe_duration();
    state.metrics().record_outcome(result.is_ok());

    let quality_prediction = result?;
    info!(target: TARGET, quality_prediction, "prediction served");
    Ok((StatusCode::CREATED, Json(PredictionResponse { quality_prediction })))
}

async fn reload(State(state): State<AppState>) -> Json<ReloadResponse> {
    state.invalidate();
    info!(target: TARGET, "artifact cache cleared");
    Json(ReloadResponse { reloaded: true })
}

async fn metrics_handler(State(state): State<AppState>) -> Result<Response, AppError> {
    let body = state.metrics().encode()?;
    Ok(([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body).into_response())
}
