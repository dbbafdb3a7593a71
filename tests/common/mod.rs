#![allow(dead_code)]

use anyhow::anyhow;
use async_trait::async_trait;
use credential_intake::config::IntakeConfig;
use credential_intake::models::ExtractionResult;
use credential_intake::services::ocr::TextExtractor;
use credential_intake::services::pipeline::LicensePipeline;
use credential_intake::services::renderer::DocumentRenderer;
use credential_intake::services::staging::StagingArea;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub const PDF_BYTES: &[u8] = b"%PDF-1.4\n1 0 obj\n<< /Type /Catalog >>\nendobj\ntrailer\n<< /Root 1 0 R >>\n%%EOF\n";

/// A small but real PNG so magic byte sniffing recognises it
pub fn png_bytes(seed: u8) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(2, 2, image::Rgb([seed, seed, seed]));
    let mut out = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut out, image::ImageOutputFormat::Png)
        .unwrap();
    out.into_inner()
}

/// Writes a PNG where pdftocairo would, without needing poppler.
#[derive(Default)]
pub struct FakeRenderer {
    pub calls: AtomicUsize,
}

#[async_trait]
impl DocumentRenderer for FakeRenderer {
    async fn render_first_page(&self, source: &Path) -> anyhow::Result<PathBuf> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let output = StagingArea::rendered_path(source);
        tokio::fs::write(&output, png_bytes(7)).await?;
        Ok(output)
    }

    async fn health_check(&self) -> bool {
        true
    }
}

pub struct FailingRenderer;

#[async_trait]
impl DocumentRenderer for FailingRenderer {
    async fn render_first_page(&self, _source: &Path) -> anyhow::Result<PathBuf> {
        Err(anyhow!("corrupt document"))
    }

    async fn health_check(&self) -> bool {
        false
    }
}

pub struct HangingRenderer;

#[async_trait]
impl DocumentRenderer for HangingRenderer {
    async fn render_first_page(&self, source: &Path) -> anyhow::Result<PathBuf> {
        // Leave a partial image behind, as a killed pdftocairo might
        tokio::fs::write(StagingArea::rendered_path(source), b"\x89PNG").await?;
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok(StagingArea::rendered_path(source))
    }

    async fn health_check(&self) -> bool {
        true
    }
}

/// What the OCR engine saw when it was called
#[derive(Debug, Clone)]
pub struct OcrCall {
    pub image: PathBuf,
    pub image_existed: bool,
    /// Names of every file in the staging directory at call time
    pub staged_files: Vec<String>,
}

/// Returns canned text and records each call.
pub struct FakeOcr {
    text: String,
    pub calls: Mutex<Vec<OcrCall>>,
}

impl FakeOcr {
    pub fn returning(text: &str) -> Self {
        Self {
            text: text.to_string(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<OcrCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextExtractor for FakeOcr {
    async fn extract_text(&self, image: &Path) -> anyhow::Result<ExtractionResult> {
        let dir = image.parent().map(Path::to_path_buf).unwrap_or_default();
        self.calls.lock().unwrap().push(OcrCall {
            image: image.to_path_buf(),
            image_existed: image.exists(),
            staged_files: file_names(&dir),
        });
        Ok(ExtractionResult {
            text: self.text.clone(),
            log_lines: vec!["Tesseract Open Source OCR Engine".to_string()],
        })
    }

    async fn health_check(&self) -> bool {
        true
    }
}

pub struct FailingOcr;

#[async_trait]
impl TextExtractor for FailingOcr {
    async fn extract_text(&self, _image: &Path) -> anyhow::Result<ExtractionResult> {
        Err(anyhow!("engine crashed"))
    }

    async fn health_check(&self) -> bool {
        false
    }
}

pub struct HangingOcr;

#[async_trait]
impl TextExtractor for HangingOcr {
    async fn extract_text(&self, _image: &Path) -> anyhow::Result<ExtractionResult> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok(ExtractionResult::default())
    }

    async fn health_check(&self) -> bool {
        true
    }
}

pub fn test_config(staging_dir: &Path) -> IntakeConfig {
    IntakeConfig {
        staging_dir: staging_dir.to_path_buf(),
        ..IntakeConfig::default()
    }
}

pub fn build_pipeline(
    config: &IntakeConfig,
    renderer: Arc<dyn DocumentRenderer>,
    extractor: Arc<dyn TextExtractor>,
) -> Arc<LicensePipeline> {
    Arc::new(LicensePipeline::new(
        StagingArea::new(config.staging_dir.clone()),
        renderer,
        extractor,
        config.clone(),
    ))
}

/// Sorted file names in `dir`; empty when the directory does not exist.
pub fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}
