use crate::models::ExtractionResult;
use crate::utils::process::probe_version;
use anyhow::{Result, anyhow};
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;

/// Progress notification from an OCR engine. Purely informational.
#[derive(Debug, Clone)]
pub struct OcrProgress {
    pub status: String,
    /// 0.0 ..= 1.0
    pub progress: f32,
}

pub type ProgressHook = Arc<dyn Fn(&OcrProgress) + Send + Sync>;

/// Forwards progress to the tracing subscriber.
pub fn tracing_progress_hook() -> ProgressHook {
    Arc::new(|p: &OcrProgress| {
        tracing::debug!(target: "ocr", status = %p.status, progress = p.progress, "ocr_progress");
    })
}

/// Black-box text extraction over a raster image.
#[async_trait::async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract_text(&self, image: &Path) -> Result<ExtractionResult>;

    /// Check if the engine is available
    async fn health_check(&self) -> bool;
}

/// Tesseract CLI engine: `tesseract <image> stdout -l <lang>`.
pub struct TesseractExtractor {
    command: String,
    language: String,
    progress: Option<ProgressHook>,
}

impl TesseractExtractor {
    pub fn new(command: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            language: language.into(),
            progress: None,
        }
    }

    pub fn with_progress_hook(mut self, hook: ProgressHook) -> Self {
        self.progress = Some(hook);
        self
    }

    fn report(&self, status: &str, progress: f32) {
        if let Some(hook) = &self.progress {
            hook(&OcrProgress {
                status: status.to_string(),
                progress,
            });
        }
    }
}

#[async_trait::async_trait]
impl TextExtractor for TesseractExtractor {
    async fn extract_text(&self, image: &Path) -> Result<ExtractionResult> {
        self.report("recognizing text", 0.0);

        let output = Command::new(&self.command)
            .arg(image.as_os_str())
            .arg("stdout")
            .arg("-l")
            .arg(&self.language)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| anyhow!("failed to launch {}: {}", self.command, e))?;

        let log_lines: Vec<String> = String::from_utf8_lossy(&output.stderr)
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect();

        if !output.status.success() {
            tracing::error!("tesseract failed: {}", log_lines.join(" | "));
            return Err(anyhow!("tesseract failed: {}", log_lines.join(" | ")));
        }

        self.report("recognizing text", 1.0);

        Ok(ExtractionResult {
            text: String::from_utf8_lossy(&output.stdout).into_owned(),
            log_lines,
        })
    }

    async fn health_check(&self) -> bool {
        probe_version(&self.command, "--version").await
    }
}
