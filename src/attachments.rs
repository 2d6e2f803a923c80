use crate::error::ChatError;
use crate::models::{Attachment, AttachmentKind};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use std::path::Path;
use uuid::Uuid;

/// Longest text excerpt kept from a non-image file, in characters.
pub const EXCERPT_MAX_CHARS: usize = 10_000;
pub const IMAGE_MAX_BYTES: u64 = 20 * 1024 * 1024;

/// Reads a picked file into an attachment.
pub async fn load_attachment(path: &Path) -> Result<Attachment, ChatError> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| ChatError::Attachment(format!("'{}' is not a file", path.display())))?;
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| ChatError::Attachment(format!("Failed to read '{}': {}", path.display(), e)))?;
    let mime_type = mime_guess::from_path(path).first_or_octet_stream().to_string();
    log::info!("Loaded attachment {} ({}, {} bytes)", name, mime_type, bytes.len());
    attachment_from_bytes(name, mime_type, &bytes)
}

pub fn attachment_from_bytes(
    name: String,
    mime_type: String,
    bytes: &[u8],
) -> Result<Attachment, ChatError> {
    let size = bytes.len() as u64;
    if mime_type.starts_with("image/") {
        if size > IMAGE_MAX_BYTES {
            return Err(ChatError::Attachment(format!(
                "'{}' is larger than {} MiB",
                name,
                IMAGE_MAX_BYTES / (1024 * 1024)
            )));
        }
        let data = format!("data:{};base64,{}", mime_type, BASE64.encode(bytes));
        return Ok(Attachment {
            id: Uuid::new_v4(),
            name,
            kind: AttachmentKind::Image,
            mime_type,
            data: Some(data),
            excerpt: None,
            size,
        });
    }

    let text = String::from_utf8_lossy(bytes);
    let excerpt: String = text.chars().take(EXCERPT_MAX_CHARS).collect();
    Ok(Attachment {
        id: Uuid::new_v4(),
        name,
        kind: AttachmentKind::File,
        mime_type,
        data: None,
        excerpt: Some(excerpt),
        size,
    })
}

/// Human-readable byte size, e.g. `1.5 KB`.
pub fn format_size(size: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = size as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", size, UNITS[0])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}
