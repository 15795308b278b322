//! `data:` URI helpers for slide visuals.

use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::error::{CarouselError, CarouselResult};

const DEFAULT_MIME: &str = "image/png";

/// A decoded `data:<mime>;base64,<payload>` URI.
#[derive(Debug, Clone, PartialEq)]
pub struct DataUri {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl DataUri {
    /// Parses and decodes a base64 data URI.
    pub fn parse(uri: &str) -> CarouselResult<Self> {
        let (meta, payload) = split(uri)?;
        if !meta.ends_with(";base64") {
            return Err(CarouselError::invalid_data_uri("payload is not base64"));
        }
        let bytes = STANDARD
            .decode(payload.trim())
            .map_err(|e| CarouselError::invalid_data_uri(e.to_string()))?;
        Ok(Self {
            mime_type: mime_of_meta(meta),
            bytes,
        })
    }

    /// Encodes bytes as a base64 data URI.
    pub fn encode(mime_type: &str, bytes: &[u8]) -> String {
        format!("data:{};base64,{}", mime_type, STANDARD.encode(bytes))
    }

    /// File extension for the archive entry.
    pub fn extension(&self) -> &'static str {
        extension_for_mime(&self.mime_type)
    }
}

fn split(uri: &str) -> CarouselResult<(&str, &str)> {
    let rest = uri
        .strip_prefix("data:")
        .ok_or_else(|| CarouselError::invalid_data_uri("missing data: scheme"))?;
    rest.split_once(',')
        .ok_or_else(|| CarouselError::invalid_data_uri("missing payload separator"))
}

fn mime_of_meta(meta: &str) -> String {
    let mime = meta.split(';').next().unwrap_or_default().trim();
    if mime.is_empty() {
        DEFAULT_MIME.to_string()
    } else {
        mime.to_string()
    }
}

/// MIME type declared by a data URI, `image/png` when absent.
pub fn mime_type(uri: &str) -> String {
    match split(uri) {
        Ok((meta, _)) => mime_of_meta(meta),
        Err(_) => DEFAULT_MIME.to_string(),
    }
}

/// Raw base64 payload of a data URI (everything after the comma).
pub fn payload(uri: &str) -> CarouselResult<&str> {
    split(uri).map(|(_, payload)| payload)
}

/// Archive file extension for a MIME type.
///
/// Parameters and case are ignored. Unrecognised video types export as `mp4`,
/// unrecognised images as `png`, anything else as `bin`.
pub fn extension_for_mime(mime: &str) -> &'static str {
    let essence = mime.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();
    match essence.as_str() {
        "video/mp4" => "mp4",
        "video/webm" => "webm",
        "video/quicktime" => "mov",
        "video/x-matroska" => "mkv",
        "video/ogg" => "ogv",
        "image/png" => "png",
        "image/jpeg" | "image/jpg" => "jpg",
        "image/webp" => "webp",
        "image/gif" => "gif",
        other if other.starts_with("image/") => "png",
        other if other.starts_with("video/") || other == "video" || other.is_empty() => "mp4",
        _ => "bin",
    }
}
