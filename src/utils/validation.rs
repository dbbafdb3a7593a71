use crate::models::LicenseFormat;
use std::path::Path;
use thiserror::Error;

/// Extensions accepted for license documents
pub const ALLOWED_EXTENSIONS: &[&str] = &["jpeg", "jpg", "png", "pdf"];

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IntakeError {
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("File size {size} bytes exceeds maximum allowed {max} bytes ({} MB)", .max / 1024 / 1024)]
    TooLarge { size: usize, max: usize },
}

impl IntakeError {
    pub fn reason(&self) -> &'static str {
        match self {
            IntakeError::UnsupportedFormat(_) => "unsupported-format",
            IntakeError::TooLarge { .. } => "too-large",
        }
    }
}

/// Result of a successful intake check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptedUpload {
    pub filename: String,
    /// Lower-cased original extension, kept for the storage key
    pub extension: String,
    pub format: LicenseFormat,
}

/// Validates file size against maximum limit
pub fn validate_file_size(size: usize, max_size: usize) -> Result<(), IntakeError> {
    if size > max_size {
        return Err(IntakeError::TooLarge {
            size,
            max: max_size,
        });
    }
    Ok(())
}

fn format_for_extension(extension: &str) -> Option<LicenseFormat> {
    match extension {
        "jpeg" | "jpg" => Some(LicenseFormat::Jpeg),
        "png" => Some(LicenseFormat::Png),
        "pdf" => Some(LicenseFormat::Pdf),
        _ => None,
    }
}

fn format_for_mime(content_type: &str) -> Option<LicenseFormat> {
    let normalized = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_lowercase();

    let parsed: mime::Mime = normalized.parse().ok()?;
    match (parsed.type_().as_str(), parsed.subtype().as_str()) {
        ("image", "jpeg" | "jpg") => Some(LicenseFormat::Jpeg),
        ("image", "png") => Some(LicenseFormat::Png),
        ("application", "pdf") => Some(LicenseFormat::Pdf),
        _ => None,
    }
}

/// Sanitizes filename to prevent path traversal and injection attacks
pub fn sanitize_filename(filename: &str) -> Result<String, IntakeError> {
    // Backslashes are not separators on unix, normalize them first
    let unified = filename.replace('\\', "/");
    let name = Path::new(&unified)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("");

    if name.is_empty() {
        return Err(IntakeError::UnsupportedFormat(
            "Filename cannot be empty".to_string(),
        ));
    }

    if filename.contains("..") || filename.contains('/') || filename.contains('\\') {
        tracing::warn!("Path traversal attempt detected: {}", filename);
    }

    let sanitized: String = name
        .chars()
        .map(|c| {
            if c.is_control() || matches!(c, ':' | '*' | '?' | '"' | '<' | '>' | '|' | ';') {
                '_'
            } else {
                c
            }
        })
        .collect();

    let sanitized = if sanitized.len() > 255 {
        let mut end = 255;
        while !sanitized.is_char_boundary(end) {
            end -= 1;
        }
        sanitized[..end].to_string()
    } else {
        sanitized
    };

    if sanitized.starts_with('.') {
        return Err(IntakeError::UnsupportedFormat(
            "Hidden files (starting with '.') are not allowed".to_string(),
        ));
    }

    Ok(sanitized)
}

/// Checks the declared name and content type. Runs before any byte is read.
///
/// Extension and content type are checked independently against the allowed
/// set and must then name the same format.
pub fn validate_declared(
    filename: &str,
    content_type: Option<&str>,
) -> Result<AcceptedUpload, IntakeError> {
    let filename = sanitize_filename(filename)?;

    let extension = Path::new(&filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    let by_extension = format_for_extension(&extension).ok_or_else(|| {
        IntakeError::UnsupportedFormat(format!(
            "File extension '.{}' is not allowed. Allowed: {}",
            extension,
            ALLOWED_EXTENSIONS.join(", ")
        ))
    })?;

    let declared = content_type.unwrap_or("application/octet-stream");
    let by_mime = format_for_mime(declared).ok_or_else(|| {
        IntakeError::UnsupportedFormat(format!("MIME type '{}' is not allowed", declared))
    })?;

    if by_extension != by_mime {
        return Err(IntakeError::UnsupportedFormat(format!(
            "File extension '.{}' does not match declared type '{}'",
            extension, declared
        )));
    }

    Ok(AcceptedUpload {
        filename,
        extension,
        format: by_extension,
    })
}

/// Checks magic bytes to verify the actual content matches the declared format.
/// Unrecognised signatures are let through; the engines judge those later.
pub fn verify_magic_bytes(header: &[u8], format: LicenseFormat) -> Result<(), IntakeError> {
    if header.is_empty() {
        return Err(IntakeError::UnsupportedFormat(
            "File appears to be empty".to_string(),
        ));
    }

    let Some(kind) = infer::get(header) else {
        tracing::debug!(
            "No magic bytes match for declared type '{}', allowing anyway",
            format.mime_type()
        );
        return Ok(());
    };

    if format_for_mime(kind.mime_type()) == Some(format) {
        return Ok(());
    }

    Err(IntakeError::UnsupportedFormat(format!(
        "File content looks like '{}' but was declared as '{}'",
        kind.mime_type(),
        format.mime_type()
    )))
}

/// Full intake check for a buffered upload. Nothing may be staged unless this passes.
pub fn validate_upload(
    filename: &str,
    content_type: Option<&str>,
    size: usize,
    header: &[u8],
    max_size: usize,
) -> Result<AcceptedUpload, IntakeError> {
    // 1. Name and declared type
    let accepted = validate_declared(filename, content_type)?;

    // 2. Size check
    validate_file_size(size, max_size)?;

    // 3. Magic bytes verification
    verify_magic_bytes(header, accepted.format)?;

    Ok(accepted)
}
