use bytes::Bytes;
use std::path::PathBuf;

/// One uploaded license document, as delivered by the HTTP layer.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    /// Client supplied name, untrusted
    pub original_filename: String,
    pub content_type: Option<String>,
    pub size: usize,
    pub bytes: Bytes,
}

impl UploadRequest {
    pub fn new(original_filename: impl Into<String>, content_type: Option<String>, bytes: Bytes) -> Self {
        Self {
            original_filename: original_filename.into(),
            content_type,
            size: bytes.len(),
            bytes,
        }
    }
}

/// Accepted upload formats. PDF is the only multi-page document format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LicenseFormat {
    Jpeg,
    Png,
    Pdf,
}

impl LicenseFormat {
    pub fn kind(self) -> ArtifactKind {
        match self {
            LicenseFormat::Pdf => ArtifactKind::SourceDocument,
            LicenseFormat::Jpeg | LicenseFormat::Png => ArtifactKind::RasterImage,
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            LicenseFormat::Jpeg => "image/jpeg",
            LicenseFormat::Png => "image/png",
            LicenseFormat::Pdf => "application/pdf",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    SourceDocument,
    RasterImage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactState {
    Staged,
    Consumed,
    Deleted,
    Retained,
}

/// A file in the staging directory owned by exactly one in-flight request.
#[derive(Debug, Clone)]
pub struct StagedArtifact {
    pub storage_key: String,
    pub path: PathBuf,
    pub kind: ArtifactKind,
    pub state: ArtifactState,
}

impl StagedArtifact {
    pub fn new(storage_key: String, path: PathBuf, kind: ArtifactKind) -> Self {
        Self {
            storage_key,
            path,
            kind,
            state: ArtifactState::Staged,
        }
    }

    /// Artifact produced by the normalizer from `source`.
    pub fn rendered_from(source: &StagedArtifact, path: PathBuf) -> Self {
        let storage_key = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| source.storage_key.clone());
        Self::new(storage_key, path, ArtifactKind::RasterImage)
    }
}

/// Raw OCR output. `log_lines` is informational only.
#[derive(Debug, Clone, Default)]
pub struct ExtractionResult {
    pub text: String,
    pub log_lines: Vec<String>,
}

/// Terminal value of a pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    Matched {
        identifier: String,
        retained_artifact_path: PathBuf,
    },
    NotMatched {
        reason: String,
    },
}

impl ValidationOutcome {
    pub fn is_matched(&self) -> bool {
        matches!(self, ValidationOutcome::Matched { .. })
    }
}
