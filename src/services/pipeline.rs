use crate::config::IntakeConfig;
use crate::models::{ArtifactKind, ExtractionResult, StagedArtifact, UploadRequest, ValidationOutcome};
use crate::services::cleanup::ArtifactGuard;
use crate::services::ocr::TextExtractor;
use crate::services::renderer::DocumentRenderer;
use crate::services::staging::StagingArea;
use crate::utils::license::{LICENSE_NOT_FOUND, find_license_number};
use crate::utils::validation::{IntakeError, validate_upload};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Rejected(#[from] IntakeError),

    #[error("Failed to stage upload: {0}")]
    Staging(#[source] std::io::Error),

    #[error("Document conversion failed: {0}")]
    ConversionFailed(String),

    #[error("Text extraction failed: {0}")]
    OcrFailed(String),
}

impl PipelineError {
    pub fn reason(&self) -> &'static str {
        match self {
            PipelineError::Rejected(e) => e.reason(),
            PipelineError::Staging(_) => "staging-failed",
            PipelineError::ConversionFailed(_) => "conversion-failed",
            PipelineError::OcrFailed(_) => "ocr-failed",
        }
    }
}

/// intake -> stage -> normalize -> extract -> validate, with every staged
/// artifact owned by an [`ArtifactGuard`] for the length of the run.
pub struct LicensePipeline {
    staging: StagingArea,
    renderer: Arc<dyn DocumentRenderer>,
    extractor: Arc<dyn TextExtractor>,
    config: IntakeConfig,
}

impl LicensePipeline {
    pub fn new(
        staging: StagingArea,
        renderer: Arc<dyn DocumentRenderer>,
        extractor: Arc<dyn TextExtractor>,
        config: IntakeConfig,
    ) -> Self {
        Self {
            staging,
            renderer,
            extractor,
            config,
        }
    }

    pub fn staging(&self) -> &StagingArea {
        &self.staging
    }

    pub fn renderer(&self) -> &Arc<dyn DocumentRenderer> {
        &self.renderer
    }

    pub fn extractor(&self) -> &Arc<dyn TextExtractor> {
        &self.extractor
    }

    pub async fn run(&self, upload: UploadRequest) -> Result<ValidationOutcome, PipelineError> {
        // 1. Intake, nothing touches the disk before this passes
        let accepted = validate_upload(
            &upload.original_filename,
            upload.content_type.as_deref(),
            upload.size,
            &upload.bytes,
            self.config.max_file_size,
        )?;

        // 2. Stage
        let staged = self
            .staging
            .stage(&self.config.upload_field, &accepted, &upload.bytes)
            .await
            .map_err(|e| {
                error!("Staging failed for {}: {}", accepted.filename, e);
                PipelineError::Staging(e)
            })?;
        let storage_key = staged.storage_key.clone();

        let mut guard = ArtifactGuard::new();
        guard.track(staged);

        let result = self.process(&mut guard).await;

        match &result {
            Ok(ValidationOutcome::Matched { identifier, .. }) => {
                info!("{}: license {} accepted", storage_key, identifier);
            }
            Ok(ValidationOutcome::NotMatched { reason }) => {
                info!("{}: rejected ({})", storage_key, reason);
            }
            Err(e) => error!("{}: {} ({})", storage_key, e, e.reason()),
        }

        // Whatever the guard still tracks is not part of the result
        guard.release().await;
        result
    }

    async fn process(&self, guard: &mut ArtifactGuard) -> Result<ValidationOutcome, PipelineError> {
        // 3. Normalize
        let image = self.normalize(guard).await?;

        // 4. Extract
        let extraction = self.extract(&image).await?;

        // 5. Validate
        match find_license_number(&extraction.text) {
            Some(identifier) => {
                let identifier = identifier.to_string();
                let retained = guard
                    .retain_raster()
                    .map(|artifact| artifact.path)
                    .unwrap_or(image);
                Ok(ValidationOutcome::Matched {
                    identifier,
                    retained_artifact_path: retained,
                })
            }
            None => Ok(ValidationOutcome::NotMatched {
                reason: LICENSE_NOT_FOUND.to_string(),
            }),
        }
    }

    /// Produces the raster image to OCR. Raster uploads pass straight through.
    async fn normalize(&self, guard: &mut ArtifactGuard) -> Result<PathBuf, PipelineError> {
        if let Some(raster) = guard.raster() {
            return Ok(raster.path.clone());
        }

        let source = guard
            .source()
            .cloned()
            .ok_or_else(|| PipelineError::ConversionFailed("nothing staged".to_string()))?;
        debug_assert_eq!(source.kind, ArtifactKind::SourceDocument);

        let rendered = with_timeout(
            self.config.render_timeout(),
            self.renderer.render_first_page(&source.path),
        )
        .await;

        let rendered = match rendered {
            Ok(path) => path,
            Err(reason) => {
                // A killed or failed render can leave a partial image behind
                let partial = StagingArea::rendered_path(&source.path);
                if partial != source.path {
                    match tokio::fs::remove_file(&partial).await {
                        Ok(()) => {}
                        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                        Err(e) => warn!(
                            "Failed to remove partial render {}: {}",
                            partial.display(),
                            e
                        ),
                    }
                }
                return Err(PipelineError::ConversionFailed(reason));
            }
        };

        guard.track(StagedArtifact::rendered_from(&source, rendered.clone()));
        // The document is not needed past this point
        guard.discard_source().await;

        Ok(rendered)
    }

    async fn extract(&self, image: &std::path::Path) -> Result<ExtractionResult, PipelineError> {
        let extraction = with_timeout(self.config.ocr_timeout(), self.extractor.extract_text(image))
            .await
            .map_err(PipelineError::OcrFailed)?;

        for line in &extraction.log_lines {
            tracing::debug!(target: "ocr", "{}", line);
        }
        Ok(extraction)
    }
}

/// Bounds an engine call; a timeout is reported like any other engine failure.
async fn with_timeout<T>(
    limit: Duration,
    call: impl std::future::Future<Output = anyhow::Result<T>>,
) -> Result<T, String> {
    match tokio::time::timeout(limit, call).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(e.to_string()),
        Err(_) => {
            warn!("Engine call timed out after {:?}", limit);
            Err(format!("timed out after {} seconds", limit.as_secs()))
        }
    }
}
