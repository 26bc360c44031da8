//! Core shared code for the wine quality services: the preprocessing contract,
//! the fitted scaler and regression model, their persisted artifacts, the
//! experiment tracking store and the shared configuration.

use anyhow::Result;
use once_cell::sync::OnceCell;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

static TRACING_INIT: OnceCell<()> = OnceCell::new();

pub mod artifacts;
pub mod config;
pub mod dataset;
pub mod deployment;
pub mod error;
pub mod features;
pub mod frame;
pub mod inference;
pub mod model;
pub mod preprocessing;
pub mod record;
pub mod scaler;
pub mod schema;
pub mod tracking;

pub use config::AppConfig;
pub use deployment::ModelDeployment;
pub use error::WineError;
pub use features::FeatureTable;
pub use frame::{Column, Frame};
pub use inference::{run_inference, Predictor};
pub use model::{LinearRegression, Metrics};
pub use preprocessing::{encode_wine_type, preprocess_records, preprocess_wine_data};
pub use record::WineRecord;
pub use scaler::StandardScaler;
pub use tracking::{ModelVersion, RunInfo, RunStatus, SledTracking, Stage, TrackingClient};

fn json_logs_enabled() -> bool {
    std::env::var("WINE_JSON_LOG").ok().map(|v| v == "1" || v.eq_ignore_ascii_case("true")).unwrap_or(false)
}

/// Installs the global subscriber once per process. `RUST_LOG` overrides the
/// default `info` filter and `WINE_JSON_LOG=1` switches to JSON lines.
pub fn init_tracing(service: &str) -> Result<()> {
    TRACING_INIT.get_or_try_init(|| -> Result<()> {
        let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let registry = tracing_subscriber::registry().with(env_filter);
        if json_logs_enabled() {
            registry
                .with(tracing_subscriber::fmt::layer().json().flatten_event(true).with_current_span(true).with_span_list(false))
                .try_init()?;
        } else {
            registry
                .with(tracing_subscriber::fmt::layer().with_target(true).with_thread_ids(false).with_line_number(true))
                .try_init()?;
        }
        Ok(())
    })?;
    info!(target: "wine_core", service, "tracing initialized");
    Ok(())
}
