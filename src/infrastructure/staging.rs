use crate::config::IntakeConfig;
use crate::services::staging::StagingArea;
use tracing::info;

/// Creates the staging directory and resolves it to an absolute path.
pub async fn setup_staging(config: &IntakeConfig) -> anyhow::Result<StagingArea> {
    tokio::fs::create_dir_all(&config.staging_dir).await?;
    let root = tokio::fs::canonicalize(&config.staging_dir).await?;

    info!("📁 Staging directory: {}", root.display());
    Ok(StagingArea::new(root))
}
