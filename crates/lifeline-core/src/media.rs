use std::fs;
use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tracing::{debug, warn};

use crate::event::Attachment;
use crate::validation::{Field, FieldError};

pub const IMAGE_MAX_BYTES: u64 = 5 * 1024 * 1024;
pub const ATTACHMENT_MAX_BYTES: u64 = 10 * 1024 * 1024;

const IMAGE_TYPES: &[(&str, &str)] = &[
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("png", "image/png"),
    ("gif", "image/gif"),
    ("webp", "image/webp"),
];

pub fn image_mime_for(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    IMAGE_TYPES
        .iter()
        .find(|(known, _)| *known == ext)
        .map(|(_, mime)| *mime)
}

fn is_remote_or_inline(raw: &str) -> bool {
    let lower = raw.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://") || lower.starts_with("data:image/")
}

/// Turns an image argument into the value stored on an event: remote and
/// inline URLs are kept, local files become `data:` URLs.
#[tracing::instrument]
pub fn image_reference(raw: &str) -> Result<String, FieldError> {
    let raw = raw.trim();
    if is_remote_or_inline(raw) {
        return Ok(raw.to_string());
    }
    read_image_as_data_url(Path::new(raw))
}

#[tracing::instrument]
pub fn read_image_as_data_url(path: &Path) -> Result<String, FieldError> {
    let mime = image_mime_for(path).ok_or_else(|| {
        FieldError::new(
            Field::Image,
            "Only JPEG, PNG, GIF or WebP images are supported.",
        )
    })?;
    let size = checked_file_size(path, Field::Image)?;
    if size > IMAGE_MAX_BYTES {
        return Err(FieldError::new(
            Field::Image,
            format!("Image must be {} MB or smaller.", IMAGE_MAX_BYTES / (1024 * 1024)),
        ));
    }

    let bytes = fs::read(path).map_err(|err| {
        warn!(file = %path.display(), error = %err, "failed reading image");
        FieldError::new(Field::Image, format!("Could not read {}.", path.display()))
    })?;
    debug!(file = %path.display(), bytes = bytes.len(), mime, "encoded image as data url");
    Ok(format!("data:{mime};base64,{}", STANDARD.encode(bytes)))
}

#[tracing::instrument]
pub fn attachment_from_path(path: &Path) -> Result<Attachment, FieldError> {
    let size = checked_file_size(path, Field::Attachment)?;
    if size > ATTACHMENT_MAX_BYTES {
        return Err(FieldError::new(
            Field::Attachment,
            format!(
                "Attachment must be {} MB or smaller.",
                ATTACHMENT_MAX_BYTES / (1024 * 1024)
            ),
        ));
    }
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .filter(|n| !n.is_empty())
        .ok_or_else(|| FieldError::new(Field::Attachment, "Attachment needs a file name."))?;
    Ok(Attachment { name })
}

fn checked_file_size(path: &Path, field: Field) -> Result<u64, FieldError> {
    let meta = fs::metadata(path)
        .map_err(|_| FieldError::new(field, format!("File not found: {}.", path.display())))?;
    if !meta.is_file() {
        return Err(FieldError::new(
            field,
            format!("{} is not a regular file.", path.display()),
        ));
    }
    Ok(meta.len())
}

/// Short human description of a stored image reference.
pub fn describe_image(image_url: &str) -> String {
    if let Some(rest) = image_url.strip_prefix("data:") {
        let mime = rest.split(';').next().unwrap_or("image");
        let approx_bytes = rest.len().saturating_sub(mime.len()) * 3 / 4;
        format!("inline {mime}, ~{} KB", approx_bytes.div_ceil(1024))
    } else {
        image_url.to_string()
    }
}
