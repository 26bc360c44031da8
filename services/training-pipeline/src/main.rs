use anyhow::{Context, Result};
use tracing::info;
use training_pipeline::{deploy_pipeline, train_pipeline, Job};
use wine_core::{init_tracing, AppConfig, SledTracking};

fn main() -> Result<()> {
    init_tracing("training-pipeline")?;
    let job: Job = std::env::args().nth(1).as_deref().unwrap_or("all").parse()?;
    let cfg = AppConfig::load()?;
    info!(target: "training-pipeline", ?job, ?cfg, "config loaded");

    let tracking = SledTracking::open(&cfg.tracking.dir)
        .with_context(|| format!("opening tracking store at {}", cfg.tracking.dir.display()))?;

    if matches!(job, Job::Train | Job::All) {
        let outcome = train_pipeline(&cfg, &tracking)?;
        info!(target: "training-pipeline", outcome = %serde_json::to_string(&outcome)?, "training finished");
    }
    if matches!(job, Job::Deploy | Job::All) {
        let version = deploy_pipeline(&cfg, &tracking)?;
        info!(target: "training-pipeline", version = version.version, stage = %version.stage, "deployment finished");
    }
    tracking.flush()?;
    Ok(())
}
