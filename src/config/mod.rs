use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Hard ceiling for uploaded license documents (5 MiB)
pub const MAX_LICENSE_SIZE: usize = 5 * 1024 * 1024;

/// Configuration for the license intake pipeline
#[derive(Debug, Clone)]
pub struct IntakeConfig {
    /// Maximum upload size in bytes (default: 5 MiB)
    pub max_file_size: usize,

    /// Flat directory holding staged artifacts (default: "uploads/licenses")
    pub staging_dir: PathBuf,

    /// Multipart field carrying the document (default: "license")
    pub upload_field: String,

    /// Poppler renderer binary (default: "pdftocairo")
    pub pdftocairo_cmd: String,

    /// Resolution used when rasterizing the first page (default: 300)
    pub render_dpi: u32,

    /// Tesseract binary (default: "tesseract")
    pub tesseract_cmd: String,

    /// Tesseract language pack (default: "eng")
    pub ocr_language: String,

    /// Upper bound for a single page render (default: 60s)
    pub render_timeout_secs: u64,

    /// Upper bound for a single OCR call (default: 120s)
    pub ocr_timeout_secs: u64,

    /// Age after which orphaned source documents are swept, 0 disables (default: 24)
    pub staging_cleanup_age_hours: u64,

    /// Allowed CORS Origins (comma separated)
    pub allowed_origins: Vec<String>,
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            max_file_size: MAX_LICENSE_SIZE,
            staging_dir: PathBuf::from("uploads/licenses"),
            upload_field: "license".to_string(),
            pdftocairo_cmd: "pdftocairo".to_string(),
            render_dpi: 300,
            tesseract_cmd: "tesseract".to_string(),
            ocr_language: "eng".to_string(),
            render_timeout_secs: 60,
            ocr_timeout_secs: 120,
            staging_cleanup_age_hours: 24,
            allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://localhost:5173".to_string(), // Vite default
                "http://127.0.0.1:3000".to_string(),
            ],
        }
    }
}

impl IntakeConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            max_file_size: env::var("MAX_FILE_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_file_size),

            staging_dir: env::var("STAGING_DIR")
                .map(PathBuf::from)
                .unwrap_or(default.staging_dir),

            upload_field: env::var("UPLOAD_FIELD").unwrap_or(default.upload_field),

            pdftocairo_cmd: env::var("PDFTOCAIRO_CMD").unwrap_or(default.pdftocairo_cmd),

            render_dpi: env::var("RENDER_DPI")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.render_dpi),

            tesseract_cmd: env::var("TESSERACT_CMD").unwrap_or(default.tesseract_cmd),

            ocr_language: env::var("OCR_LANGUAGE").unwrap_or(default.ocr_language),

            render_timeout_secs: env::var("RENDER_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.render_timeout_secs),

            ocr_timeout_secs: env::var("OCR_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.ocr_timeout_secs),

            staging_cleanup_age_hours: env::var("STAGING_CLEANUP_AGE_HOURS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.staging_cleanup_age_hours),

            allowed_origins: env::var("ALLOWED_ORIGINS")
                .ok()
                .map(|v| parse_origins(&v))
                .unwrap_or(default.allowed_origins),
        }
    }

    /// Create config for development (local staging dir, generous engine timeouts)
    pub fn development() -> Self {
        Self {
            staging_dir: PathBuf::from("target/dev-staging"),
            render_timeout_secs: 300,
            ocr_timeout_secs: 300,
            staging_cleanup_age_hours: 1,
            ..Self::default()
        }
    }

    /// Create config for production (fixed size ceiling, env-driven paths)
    pub fn production() -> Self {
        Self::from_env().pin_ceiling()
    }

    /// Restores the 5 MiB ceiling regardless of overrides
    pub fn pin_ceiling(self) -> Self {
        Self {
            max_file_size: MAX_LICENSE_SIZE,
            ..self
        }
    }

    pub fn render_timeout(&self) -> Duration {
        Duration::from_secs(self.render_timeout_secs)
    }

    pub fn ocr_timeout(&self) -> Duration {
        Duration::from_secs(self.ocr_timeout_secs)
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = IntakeConfig::default();
        assert_eq!(config.max_file_size, 5 * 1024 * 1024);
        assert_eq!(config.upload_field, "license");
        assert_eq!(config.render_timeout(), Duration::from_secs(60));
        assert_eq!(config.ocr_timeout(), Duration::from_secs(120));
    }

    #[test]
    fn test_development_config() {
        let config = IntakeConfig::development();
        assert_eq!(config.max_file_size, MAX_LICENSE_SIZE);
        assert_eq!(config.staging_dir, PathBuf::from("target/dev-staging"));
        assert_eq!(config.ocr_timeout_secs, 300);
    }

    #[test]
    fn test_production_config_pins_ceiling() {
        let overridden = IntakeConfig {
            max_file_size: 999_999_999,
            ocr_language: "deu".to_string(),
            ..IntakeConfig::default()
        };
        let config = overridden.pin_ceiling();
        assert_eq!(config.max_file_size, MAX_LICENSE_SIZE);
        assert_eq!(config.ocr_language, "deu");
    }

    #[test]
    fn test_origins_parsing() {
        assert_eq!(
            parse_origins(" https://a.example , https://b.example,"),
            vec!["https://a.example", "https://b.example"]
        );
        let default_config = IntakeConfig::default();
        assert!(!default_config.allowed_origins.contains(&"*".to_string()));
    }
}
