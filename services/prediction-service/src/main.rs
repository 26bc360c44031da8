use anyhow::{Context, Result};
use prediction_service::{router, AppState};
use tokio::signal;
use tracing::info;
use wine_core::{init_tracing, AppConfig};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing("prediction-service")?;
    let cfg = AppConfig::load()?;
    info!(target: "prediction-service", title = %cfg.app.title, version = %cfg.app.version, model_version = %cfg.serving.model_version, "config loaded");

    let addr = cfg.bind_addr();
    let app = router(AppState::new(cfg)?);
    let listener = tokio::net::TcpListener::bind(&addr).await.with_context(|| format!("binding {addr}"))?;
    info!(target: "prediction-service", %addr, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = signal::ctrl_c().await;
        })
        .await?;
    info!(target: "prediction-service", "shutdown");
    Ok(())
}
