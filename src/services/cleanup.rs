use crate::models::{ArtifactKind, ArtifactState, StagedArtifact};
use std::io;
use tracing::{debug, warn};

/// Owns the staged artifacts of one pipeline run and removes whatever is
/// still tracked when the run ends.
///
/// Holds at most one source document and one raster image. A retained
/// raster is handed back to the caller and is no longer tracked. Anything
/// left when the guard is dropped (early return, panic, aborted task) is
/// removed synchronously. Removal failures are logged, never returned.
#[derive(Debug, Default)]
pub struct ArtifactGuard {
    source: Option<StagedArtifact>,
    raster: Option<StagedArtifact>,
}

impl ArtifactGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn track(&mut self, artifact: StagedArtifact) {
        let slot = match artifact.kind {
            ArtifactKind::SourceDocument => &mut self.source,
            ArtifactKind::RasterImage => &mut self.raster,
        };
        debug_assert!(slot.is_none(), "artifact slot already occupied");
        debug!("Tracking {:?} {}", artifact.kind, artifact.path.display());
        *slot = Some(artifact);
    }

    pub fn source(&self) -> Option<&StagedArtifact> {
        self.source.as_ref()
    }

    pub fn raster(&self) -> Option<&StagedArtifact> {
        self.raster.as_ref()
    }

    /// Deletes the source document once it has been converted. If the
    /// delete fails the document stays tracked and is retried on release.
    pub async fn discard_source(&mut self) {
        if let Some(source) = self.source.as_mut() {
            source.state = ArtifactState::Consumed;
            if remove_artifact(source).await {
                self.source = None;
            }
        }
    }

    /// Stops tracking the raster image so it survives the run.
    pub fn retain_raster(&mut self) -> Option<StagedArtifact> {
        self.raster.take().map(|mut raster| {
            raster.state = ArtifactState::Retained;
            raster
        })
    }

    /// Deletes every artifact still tracked.
    pub async fn release(&mut self) {
        for slot in [&mut self.source, &mut self.raster] {
            if let Some(artifact) = slot.as_mut() {
                remove_artifact(artifact).await;
            }
            *slot = None;
        }
    }
}

impl Drop for ArtifactGuard {
    fn drop(&mut self) {
        for artifact in [self.source.take(), self.raster.take()].into_iter().flatten() {
            match std::fs::remove_file(&artifact.path) {
                Ok(()) => debug!("Removed {} on drop", artifact.path.display()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => warn!(
                    "Failed to remove staged artifact {} on drop: {}",
                    artifact.path.display(),
                    e
                ),
            }
        }
    }
}

/// Best-effort delete. Returns true when the file is gone.
async fn remove_artifact(artifact: &mut StagedArtifact) -> bool {
    match tokio::fs::remove_file(&artifact.path).await {
        Ok(()) => {
            artifact.state = ArtifactState::Deleted;
            debug!("Removed {}", artifact.path.display());
            true
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            artifact.state = ArtifactState::Deleted;
            true
        }
        Err(e) => {
            warn!(
                "Failed to remove staged artifact {}: {}",
                artifact.path.display(),
                e
            );
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    async fn artifact(dir: &Path, name: &str, kind: ArtifactKind) -> StagedArtifact {
        let path = dir.join(name);
        tokio::fs::write(&path, b"x").await.unwrap();
        StagedArtifact::new(name.to_string(), path, kind)
    }

    #[tokio::test]
    async fn test_release_removes_everything() {
        let dir = tempfile::tempdir().unwrap();
        let source = artifact(dir.path(), "a.pdf", ArtifactKind::SourceDocument).await;
        let raster = artifact(dir.path(), "a.png", ArtifactKind::RasterImage).await;

        let mut guard = ArtifactGuard::new();
        guard.track(source.clone());
        guard.track(raster.clone());
        guard.release().await;

        assert!(!source.path.exists());
        assert!(!raster.path.exists());
        assert!(guard.source().is_none() && guard.raster().is_none());
    }

    #[tokio::test]
    async fn test_retained_raster_survives_drop() {
        let dir = tempfile::tempdir().unwrap();
        let source = artifact(dir.path(), "b.pdf", ArtifactKind::SourceDocument).await;
        let raster = artifact(dir.path(), "b.png", ArtifactKind::RasterImage).await;

        let retained = {
            let mut guard = ArtifactGuard::new();
            guard.track(source.clone());
            guard.track(raster.clone());
            guard.discard_source().await;
            assert!(!source.path.exists());
            guard.retain_raster().unwrap()
        };

        assert_eq!(retained.state, ArtifactState::Retained);
        assert!(retained.path.exists());
    }

    #[tokio::test]
    async fn test_drop_removes_tracked_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let raster = artifact(dir.path(), "c.png", ArtifactKind::RasterImage).await;
        {
            let mut guard = ArtifactGuard::new();
            guard.track(raster.clone());
        }
        assert!(!raster.path.exists());
    }

    #[tokio::test]
    async fn test_missing_file_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut guard = ArtifactGuard::new();
        guard.track(StagedArtifact::new(
            "gone.pdf".to_string(),
            dir.path().join("gone.pdf"),
            ArtifactKind::SourceDocument,
        ));
        guard.discard_source().await;
        assert!(guard.source().is_none());
    }
}
