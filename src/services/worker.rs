use crate::services::staging::StagingArea;
use std::path::PathBuf;
use tokio::sync::watch;
use tokio::time::{Duration, sleep};

/// Removes source documents orphaned by a crashed process. The pipeline never
/// retains a source document, so any old enough is garbage. Raster images are
/// left alone since successful runs keep them.
pub struct StagingSweeper {
    staging: StagingArea,
    max_age: Duration,
    interval: Duration,
    shutdown: watch::Receiver<bool>,
}

impl StagingSweeper {
    pub fn new(staging: StagingArea, max_age_hours: u64, shutdown: watch::Receiver<bool>) -> Self {
        Self {
            staging,
            max_age: Duration::from_secs(max_age_hours.saturating_mul(3600)),
            interval: Duration::from_secs(3600),
            shutdown,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub async fn run(mut self) {
        if self.max_age.is_zero() {
            tracing::info!("Staging sweeper disabled");
            return;
        }
        tracing::info!("🚀 Staging sweeper started");

        loop {
            tokio::select! {
                _ = self.shutdown.changed() => {
                    tracing::info!("🛑 Staging sweeper shutting down");
                    break;
                }
                _ = sleep(self.interval) => {
                    self.sweep().await;
                }
            }
        }
    }

    /// One pass over the staging directory. Returns the removed paths.
    pub async fn sweep(&self) -> Vec<PathBuf> {
        tracing::info!("🧹 Sweeping stale staging artifacts...");

        let stale = match self.staging.list_stale("pdf", self.max_age).await {
            Ok(stale) => stale,
            Err(e) => {
                tracing::error!("Failed to list staging directory: {}", e);
                return Vec::new();
            }
        };

        let mut removed = Vec::new();
        for path in stale {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {
                    tracing::info!("Removed orphaned source document {}", path.display());
                    removed.push(path);
                }
                Err(e) => tracing::warn!("Failed to remove {}: {}", path.display(), e),
            }
        }

        tracing::info!("✅ Staging sweep completed ({} removed)", removed.len());
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sweep_keeps_fresh_files_and_images() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("license-1-1.pdf"), b"%PDF").await.unwrap();
        tokio::fs::write(dir.path().join("license-1-1.png"), b"png").await.unwrap();

        let (_tx, rx) = watch::channel(false);
        let sweeper = StagingSweeper::new(StagingArea::new(dir.path()), 24, rx);

        assert!(sweeper.sweep().await.is_empty());
        assert!(dir.path().join("license-1-1.pdf").exists());
        assert!(dir.path().join("license-1-1.png").exists());
    }

    #[tokio::test]
    async fn test_sweep_removes_old_documents_only() {
        let dir = tempfile::tempdir().unwrap();
        let pdf = dir.path().join("license-1-2.pdf");
        let png = dir.path().join("license-1-2.png");
        std::fs::write(&pdf, b"%PDF").unwrap();
        std::fs::write(&png, b"png").unwrap();

        let three_hours_ago = std::time::SystemTime::now() - Duration::from_secs(3 * 3600);
        for path in [&pdf, &png] {
            std::fs::File::options()
                .write(true)
                .open(path)
                .unwrap()
                .set_modified(three_hours_ago)
                .unwrap();
        }

        let (_tx, rx) = watch::channel(false);
        let sweeper = StagingSweeper::new(StagingArea::new(dir.path()), 1, rx);

        assert_eq!(sweeper.sweep().await, vec![pdf.clone()]);
        assert!(!pdf.exists());
        assert!(png.exists());
    }

    #[test]
    fn test_absurd_age_saturates() {
        let (_tx, rx) = watch::channel(false);
        let sweeper = StagingSweeper::new(StagingArea::new("unused"), u64::MAX, rx);
        assert_eq!(sweeper.max_age, Duration::from_secs(u64::MAX));
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, rx) = watch::channel(false);
        let sweeper = StagingSweeper::new(StagingArea::new(dir.path()), 1, rx)
            .with_interval(Duration::from_secs(3600));

        let handle = tokio::spawn(sweeper.run());
        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
