use crate::models::StagedArtifact;
use crate::utils::validation::AcceptedUpload;
use chrono::Utc;
use rand::Rng;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;

/// Fresh keys tried before giving up on a crowded staging directory
const MAX_KEY_ATTEMPTS: usize = 5;

/// Flat staging directory shared by all requests. Every request only ever
/// touches the keys it generated itself.
#[derive(Debug, Clone)]
pub struct StagingArea {
    root: PathBuf,
}

impl StagingArea {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Creates the staging directory. Idempotent, safe under concurrent first use.
    pub async fn ensure_dir(&self) -> io::Result<()> {
        tokio::fs::create_dir_all(&self.root).await
    }

    /// `{prefix}-{unix millis}-{random}.{extension}`
    pub fn generate_key(prefix: &str, extension: &str) -> String {
        let suffix: u32 = rand::thread_rng().gen_range(0..1_000_000_000);
        format!(
            "{}-{}-{}.{}",
            prefix,
            Utc::now().timestamp_millis(),
            suffix,
            extension
        )
    }

    /// Writes accepted bytes under a newly generated key and returns the artifact.
    ///
    /// Files are opened with `create_new`, so a colliding key is never
    /// overwritten; another key is drawn instead. A partially written file is
    /// removed before the error is returned.
    pub async fn stage(
        &self,
        prefix: &str,
        accepted: &AcceptedUpload,
        bytes: &[u8],
    ) -> io::Result<StagedArtifact> {
        self.ensure_dir().await?;

        for _ in 0..MAX_KEY_ATTEMPTS {
            let key = Self::generate_key(prefix, &accepted.extension);
            let path = self.root.join(&key);

            let mut file = match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(file) => file,
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    tracing::warn!("Staging key collision on {}, drawing a new key", key);
                    continue;
                }
                Err(e) => return Err(e),
            };

            let written: io::Result<()> = async {
                file.write_all(bytes).await?;
                file.flush().await
            }
            .await;

            if let Err(e) = written {
                drop(file);
                if let Err(cleanup_err) = tokio::fs::remove_file(&path).await {
                    tracing::warn!(
                        "Failed to remove partial staging file {}: {}",
                        path.display(),
                        cleanup_err
                    );
                }
                return Err(e);
            }

            tracing::info!(
                "Staged {} ({} bytes) as {}",
                accepted.filename,
                bytes.len(),
                key
            );
            return Ok(StagedArtifact::new(key, path, accepted.format.kind()));
        }

        Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            "could not allocate a unique staging key",
        ))
    }

    /// Path of the raster image rendered from `source`: same stem, `.png`.
    ///
    /// The name is not reserved with `create_new`. A PNG upload staged under
    /// the identical `{prefix}-{millis}-{random}` key would be overwritten by
    /// the render; that needs the same millisecond and random suffix.
    pub fn rendered_path(source: &Path) -> PathBuf {
        source.with_extension("png")
    }

    /// Files with the given extension whose modification time is older than `max_age`.
    pub async fn list_stale(&self, extension: &str, max_age: Duration) -> io::Result<Vec<PathBuf>> {
        let mut stale = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(stale),
            Err(e) => return Err(e),
        };

        let now = SystemTime::now();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let matches_ext = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case(extension));
            if !matches_ext {
                continue;
            }

            let metadata = entry.metadata().await?;
            if !metadata.is_file() {
                continue;
            }
            let age = metadata
                .modified()
                .ok()
                .and_then(|modified| now.duration_since(modified).ok())
                .unwrap_or_default();
            if age > max_age {
                stale.push(path);
            }
        }

        Ok(stale)
    }

    /// Readiness probe: the directory exists and is a directory.
    pub async fn is_ready(&self) -> bool {
        tokio::fs::metadata(&self.root)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ArtifactKind, LicenseFormat};
    use std::collections::HashSet;

    fn accepted(extension: &str, format: LicenseFormat) -> AcceptedUpload {
        AcceptedUpload {
            filename: format!("scan.{}", extension),
            extension: extension.to_string(),
            format,
        }
    }

    #[test]
    fn test_generate_key_shape() {
        let key = StagingArea::generate_key("license", "pdf");
        assert!(key.starts_with("license-"));
        assert!(key.ends_with(".pdf"));
        assert_eq!(key.trim_end_matches(".pdf").split('-').count(), 3);
    }

    #[test]
    fn test_rendered_path_shares_stem() {
        let rendered = StagingArea::rendered_path(Path::new("/tmp/x/license-1-2.pdf"));
        assert_eq!(rendered, PathBuf::from("/tmp/x/license-1-2.png"));
    }

    #[tokio::test]
    async fn test_stage_creates_directory_and_file() {
        let dir = tempfile::tempdir().unwrap();
        let staging = StagingArea::new(dir.path().join("nested/licenses"));

        let artifact = staging
            .stage("license", &accepted("pdf", LicenseFormat::Pdf), b"%PDF-1.4")
            .await
            .unwrap();

        assert_eq!(artifact.kind, ArtifactKind::SourceDocument);
        assert_eq!(tokio::fs::read(&artifact.path).await.unwrap(), b"%PDF-1.4");
        assert!(staging.is_ready().await);
    }

    #[tokio::test]
    async fn test_stage_keys_are_unique() {
        let dir = tempfile::tempdir().unwrap();
        let staging = StagingArea::new(dir.path());
        let upload = accepted("png", LicenseFormat::Png);

        let mut keys = HashSet::new();
        for i in 0..50u8 {
            let artifact = staging.stage("license", &upload, &[i]).await.unwrap();
            assert!(keys.insert(artifact.storage_key));
        }
    }

    #[tokio::test]
    async fn test_list_stale_filters_by_extension_and_age() {
        let dir = tempfile::tempdir().unwrap();
        let staging = StagingArea::new(dir.path());
        tokio::fs::write(dir.path().join("a.pdf"), b"x").await.unwrap();
        tokio::fs::write(dir.path().join("a.png"), b"x").await.unwrap();

        let old = std::time::SystemTime::now() - Duration::from_secs(7200);
        for name in ["a.pdf", "a.png"] {
            std::fs::File::options()
                .write(true)
                .open(dir.path().join(name))
                .unwrap()
                .set_modified(old)
                .unwrap();
        }

        let stale = staging
            .list_stale("pdf", Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(stale, vec![dir.path().join("a.pdf")]);

        let none = staging
            .list_stale("pdf", Duration::from_secs(3 * 3600))
            .await
            .unwrap();
        assert!(none.is_empty());
    }
}
