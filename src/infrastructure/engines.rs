use crate::config::IntakeConfig;
use crate::services::ocr::{TesseractExtractor, TextExtractor, tracing_progress_hook};
use crate::services::renderer::{DocumentRenderer, PdftocairoRenderer};
use std::sync::Arc;
use tracing::{info, warn};

pub async fn setup_renderer(config: &IntakeConfig) -> Arc<dyn DocumentRenderer> {
    let renderer = PdftocairoRenderer::new(config.pdftocairo_cmd.clone(), config.render_dpi);

    if renderer.health_check().await {
        info!("🖨️  Renderer ready ({}, {} dpi)", config.pdftocairo_cmd, config.render_dpi);
    } else {
        warn!(
            "⚠️  Renderer '{}' unavailable! PDF uploads will fail with conversion errors.",
            config.pdftocairo_cmd
        );
    }

    Arc::new(renderer)
}

pub async fn setup_extractor(config: &IntakeConfig) -> Arc<dyn TextExtractor> {
    let extractor = TesseractExtractor::new(config.tesseract_cmd.clone(), config.ocr_language.clone())
        .with_progress_hook(tracing_progress_hook());

    if extractor.health_check().await {
        info!("🔎 OCR engine ready ({}, lang={})", config.tesseract_cmd, config.ocr_language);
    } else {
        warn!(
            "⚠️  OCR engine '{}' unavailable! Uploads will fail with OCR errors.",
            config.tesseract_cmd
        );
    }

    Arc::new(extractor)
}
