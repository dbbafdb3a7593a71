use crate::services::staging::StagingArea;
use crate::utils::process::probe_version;
use anyhow::{Result, anyhow};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, error, info};

/// Turns the first page of a multi-page document into a raster image.
#[async_trait::async_trait]
pub trait DocumentRenderer: Send + Sync {
    /// Renders page one of `source` next to it and returns the image path.
    async fn render_first_page(&self, source: &Path) -> Result<PathBuf>;

    /// Check if the renderer is available
    async fn health_check(&self) -> bool;
}

/// Poppler based renderer.
///
/// Runs `pdftocairo -png -singlefile -f 1 -l 1 -r <dpi> <source> <stem>`,
/// which writes `<stem>.png`.
pub struct PdftocairoRenderer {
    command: String,
    dpi: u32,
}

impl PdftocairoRenderer {
    pub fn new(command: impl Into<String>, dpi: u32) -> Self {
        Self {
            command: command.into(),
            dpi,
        }
    }
}

#[async_trait::async_trait]
impl DocumentRenderer for PdftocairoRenderer {
    async fn render_first_page(&self, source: &Path) -> Result<PathBuf> {
        inspect_pdf(source).await?;

        let output_path = StagingArea::rendered_path(source);
        let output_root = output_path.with_extension("");

        let output = Command::new(&self.command)
            .arg("-png")
            .arg("-singlefile")
            .arg("-f")
            .arg("1")
            .arg("-l")
            .arg("1")
            .arg("-r")
            .arg(self.dpi.to_string())
            .arg(source.as_os_str())
            .arg(output_root.as_os_str())
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| anyhow!("failed to launch {}: {}", self.command, e))?;

        if !output.status.success() {
            let err_msg = String::from_utf8_lossy(&output.stderr);
            error!("pdftocairo failed: {}", err_msg);
            // pdftocairo may leave a truncated image behind
            let _ = tokio::fs::remove_file(&output_path).await;
            return Err(anyhow!("pdftocairo failed: {}", err_msg.trim()));
        }

        verify_raster(&output_path).await?;
        Ok(output_path)
    }

    async fn health_check(&self) -> bool {
        probe_version(&self.command, "-v").await
    }
}

/// Pre-flight look at the PDF structure. Encrypted documents cannot be
/// rendered without a password and fail here; parse errors are left for the
/// renderer to judge since poppler is more lenient than lopdf.
async fn inspect_pdf(source: &Path) -> Result<()> {
    let path = source.to_path_buf();
    let loaded = tokio::task::spawn_blocking(move || lopdf::Document::load(&path))
        .await
        .map_err(|e| anyhow!("PDF inspection task failed: {}", e))?;

    match loaded {
        Ok(doc) => {
            if doc.is_encrypted() {
                return Err(anyhow!("document is password protected"));
            }
            let pages = doc.get_pages().len();
            if pages == 0 {
                return Err(anyhow!("document has no pages"));
            }
            debug!("{} has {} page(s), rendering page 1", source.display(), pages);
        }
        Err(e) => {
            let err_msg = e.to_string().to_lowercase();
            if err_msg.contains("password") || err_msg.contains("encrypted") {
                return Err(anyhow!("document is password protected"));
            }
            debug!("lopdf could not parse {}: {}", source.display(), e);
        }
    }
    Ok(())
}

/// The rendered output must exist and decode as an image.
async fn verify_raster(path: &Path) -> Result<()> {
    let probe = path.to_path_buf();
    let dimensions = tokio::task::spawn_blocking(move || image::image_dimensions(&probe))
        .await
        .map_err(|e| anyhow!("image probe task failed: {}", e))?
        .map_err(|e| anyhow!("renderer produced no readable image: {}", e))?;

    info!(
        "Rendered {} ({}x{})",
        path.display(),
        dimensions.0,
        dimensions.1
    );
    Ok(())
}
