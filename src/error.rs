//! Error types for the carousel pipeline.
//!
//! The `Display` text of every user-facing variant is the message shown to the
//! user, so callers can surface `err.to_string()` directly.

use serde::Deserialize;
use thiserror::Error;

/// Result type alias for carousel operations.
pub type CarouselResult<T> = Result<T, CarouselError>;

/// Help link used when a quota payload carries no `google.rpc.Help` detail.
pub const DEFAULT_RATE_LIMITS_LINK: &str = "https://ai.google.dev/gemini-api/docs/rate-limits";

/// Shown when no Gemini API key is configured.
pub const MISSING_API_KEY_MESSAGE: &str =
    "API key is not configured. Add your Gemini API key in Settings.";

const HELP_DETAIL_TYPE: &str = "type.googleapis.com/google.rpc.Help";
const ENTITY_NOT_FOUND: &str = "requested entity was not found";
const NO_IMAGE_MESSAGE: &str = "ai did not return an image";

/// Errors that can occur while generating, editing, persisting or exporting a carousel.
#[derive(Error, Debug)]
pub enum CarouselError {
    /// Required configuration (API key, credentials) is missing or invalid.
    #[error("{0}")]
    Configuration(String),

    /// The AI service reported quota exhaustion.
    #[error("You have exceeded your API quota. Check your plan and billing details: {help_link}")]
    QuotaExceeded { help_link: String },

    /// The AI service rejected the API key.
    #[error("The API key is not valid. Check it in Settings.")]
    InvalidCredentials,

    /// The image service responded without image data.
    #[error("AI did not return an image from your prompt.")]
    NoImageReturned,

    /// The video service could not find the selected key/project.
    #[error("Video generation key not found. Select a valid API key for video generation.")]
    ResourceNotFound(String),

    /// Anything the classifier did not recognise. The raw message is shown.
    #[error("{0}")]
    Unknown(String),

    /// A remote or local save/fetch failed.
    #[error("Failed to save changes to the cloud: {0}")]
    Persistence(String),

    /// Export failed; no archive was produced.
    #[error("Failed to download carousel. Please try again.")]
    Export(String),

    /// Slide not found in the current carousel.
    #[error("Slide not found: {0}")]
    SlideNotFound(String),

    /// No carousel is open in the session.
    #[error("No carousel is open")]
    NoCarousel,

    /// Malformed data URI.
    #[error("Invalid data URI: {0}")]
    InvalidDataUri(String),

    /// JSON (de)serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Archive writer error.
    #[error("Archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// Transport error talking to a remote service.
    #[cfg(feature = "http")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Image decode/encode error.
    #[cfg(feature = "raster")]
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

/// Coarse classification used by callers that branch on the failure class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    QuotaExceeded,
    InvalidCredentials,
    NoImageReturned,
    ResourceNotFound,
    Unknown,
    Persistence,
    Export,
    Internal,
}

impl CarouselError {
    /// Creates a Configuration error.
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// The Configuration error for a missing Gemini API key.
    pub fn missing_api_key() -> Self {
        Self::Configuration(MISSING_API_KEY_MESSAGE.to_string())
    }

    /// Creates an Unknown error.
    pub fn unknown(msg: impl Into<String>) -> Self {
        Self::Unknown(msg.into())
    }

    /// Creates a Persistence error.
    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::Persistence(msg.into())
    }

    /// Creates an Export error.
    pub fn export(msg: impl Into<String>) -> Self {
        Self::Export(msg.into())
    }

    /// Creates a SlideNotFound error.
    pub fn slide_not_found(id: impl Into<String>) -> Self {
        Self::SlideNotFound(id.into())
    }

    /// Creates an InvalidDataUri error.
    pub fn invalid_data_uri(msg: impl Into<String>) -> Self {
        Self::InvalidDataUri(msg.into())
    }

    /// Returns the failure class of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::QuotaExceeded { .. } => ErrorKind::QuotaExceeded,
            Self::InvalidCredentials => ErrorKind::InvalidCredentials,
            Self::NoImageReturned => ErrorKind::NoImageReturned,
            Self::ResourceNotFound(_) => ErrorKind::ResourceNotFound,
            Self::Unknown(_) => ErrorKind::Unknown,
            Self::Persistence(_) => ErrorKind::Persistence,
            Self::Export(_) => ErrorKind::Export,
            #[cfg(feature = "http")]
            Self::Http(_) => ErrorKind::Unknown,
            #[cfg(feature = "raster")]
            Self::Image(_) => ErrorKind::Internal,
            Self::SlideNotFound(_)
            | Self::NoCarousel
            | Self::InvalidDataUri(_)
            | Self::Serialization(_)
            | Self::Io(_)
            | Self::Zip(_) => ErrorKind::Internal,
        }
    }

    /// Re-classifies an error raised by a video call.
    ///
    /// The video service reports a missing billing key as a generic
    /// "Requested entity was not found." error.
    pub fn into_video_error(self) -> Self {
        match self {
            Self::Unknown(msg) if msg.to_lowercase().contains(ENTITY_NOT_FOUND) => {
                Self::ResourceNotFound(msg)
            }
            other => other,
        }
    }
}

// =============================================================================
// API ERROR CLASSIFICATION
// =============================================================================

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ErrorBody {
    code: Option<u16>,
    message: Option<String>,
    status: Option<String>,
    details: Vec<ErrorDetail>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ErrorDetail {
    #[serde(rename = "@type")]
    type_: String,
    links: Vec<HelpLink>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct HelpLink {
    url: Option<String>,
}

/// Classifies an error payload returned by the AI service.
///
/// `status` is the HTTP status when known. `body` may be a structured
/// `{"error": {...}}` payload or free text.
pub fn classify_api_error(status: Option<u16>, body: &str) -> CarouselError {
    let trimmed = body.trim();

    if trimmed.starts_with('{') && trimmed.ends_with('}') {
        if let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(trimmed) {
            let err = envelope.error;
            let code = err.code.or(status);

            if code == Some(429) || err.status.as_deref() == Some("RESOURCE_EXHAUSTED") {
                let help_link = err
                    .details
                    .iter()
                    .find(|d| d.type_ == HELP_DETAIL_TYPE)
                    .and_then(|d| d.links.first())
                    .and_then(|l| l.url.clone())
                    .unwrap_or_else(|| DEFAULT_RATE_LIMITS_LINK.to_string());
                return CarouselError::QuotaExceeded { help_link };
            }

            let message = err.message.unwrap_or_default();
            if let Some(classified) = classify_message(&message) {
                return classified;
            }
            if message.is_empty() {
                return CarouselError::unknown(trimmed);
            }
            return CarouselError::unknown(message);
        }
    }

    if status == Some(429) {
        return CarouselError::QuotaExceeded {
            help_link: DEFAULT_RATE_LIMITS_LINK.to_string(),
        };
    }

    classify_message(trimmed).unwrap_or_else(|| CarouselError::unknown(trimmed))
}

/// Classifies an error returned by the video service.
///
/// Same as [`classify_api_error`], except a 404 or a "Requested entity was
/// not found." message means the selected video key is missing.
pub fn classify_video_error(status: Option<u16>, body: &str) -> CarouselError {
    match classify_api_error(status, body) {
        CarouselError::Unknown(msg) if status == Some(404) => CarouselError::ResourceNotFound(msg),
        other => other.into_video_error(),
    }
}

/// Pattern-matches a free-text error message.
fn classify_message(message: &str) -> Option<CarouselError> {
    let lower = message.to_lowercase();
    if lower.contains("api key not valid") || lower.contains("permission denied") {
        return Some(CarouselError::InvalidCredentials);
    }
    if lower.contains("api key is not configured") {
        return Some(CarouselError::configuration(message));
    }
    if lower.contains(NO_IMAGE_MESSAGE) {
        return Some(CarouselError::NoImageReturned);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_shows_its_message() {
        assert_eq!(CarouselError::missing_api_key().to_string(), MISSING_API_KEY_MESSAGE);
        let err = CarouselError::configuration("invalid Supabase credential: bad header");
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert_eq!(err.to_string(), "invalid Supabase credential: bad header");
    }

    #[test]
    fn test_quota_without_help_link_uses_default() {
        let err = classify_api_error(None, r#"{"error":{"code":429,"status":"RESOURCE_EXHAUSTED"}}"#);
        match err {
            CarouselError::QuotaExceeded { help_link } => {
                assert_eq!(help_link, DEFAULT_RATE_LIMITS_LINK)
            }
            other => panic!("expected quota error, got {:?}", other),
        }
    }

    #[test]
    fn test_quota_extracts_help_link() {
        let body = r#"{"error":{"code":429,"message":"Quota exceeded","status":"RESOURCE_EXHAUSTED",
            "details":[{"@type":"type.googleapis.com/google.rpc.QuotaFailure"},
                       {"@type":"type.googleapis.com/google.rpc.Help","links":[{"description":"Learn more","url":"https://example.com/quota"}]}]}}"#;
        let err = classify_api_error(Some(429), body);
        assert_eq!(err.kind(), ErrorKind::QuotaExceeded);
        assert!(err.to_string().contains("https://example.com/quota"));
    }

    #[test]
    fn test_status_only_quota() {
        let err = classify_api_error(None, r#"{"error":{"status":"RESOURCE_EXHAUSTED","message":"slow down"}}"#);
        assert_eq!(err.kind(), ErrorKind::QuotaExceeded);
    }

    #[test]
    fn test_invalid_key_is_case_insensitive() {
        let body = r#"{"error":{"code":400,"message":"API Key Not Valid. Please pass a valid API key.","status":"INVALID_ARGUMENT"}}"#;
        assert_eq!(classify_api_error(Some(400), body).kind(), ErrorKind::InvalidCredentials);
        assert_eq!(
            classify_api_error(None, "PERMISSION DENIED for project").kind(),
            ErrorKind::InvalidCredentials
        );
    }

    #[test]
    fn test_unknown_keeps_raw_message() {
        let err = classify_api_error(Some(500), r#"{"error":{"code":500,"message":"Internal failure"}}"#);
        assert_eq!(err.kind(), ErrorKind::Unknown);
        assert_eq!(err.to_string(), "Internal failure");

        let err = classify_api_error(None, "connection reset");
        assert_eq!(err.to_string(), "connection reset");
    }

    #[test]
    fn test_no_image_message() {
        let err = classify_api_error(None, "AI did not return an image from your prompt.");
        assert_eq!(err.kind(), ErrorKind::NoImageReturned);
    }

    #[test]
    fn test_video_not_found_reclassified() {
        let err = classify_api_error(Some(404), r#"{"error":{"code":404,"message":"Requested entity was not found.","status":"NOT_FOUND"}}"#);
        assert_eq!(err.kind(), ErrorKind::Unknown);
        let err = err.into_video_error();
        assert_eq!(err.kind(), ErrorKind::ResourceNotFound);
    }

    #[test]
    fn test_video_404_is_resource_not_found() {
        let err = classify_video_error(Some(404), r#"{"error":{"code":404,"message":"Model missing"}}"#);
        assert_eq!(err.kind(), ErrorKind::ResourceNotFound);
        let err = classify_video_error(Some(429), r#"{"error":{"code":429}}"#);
        assert_eq!(err.kind(), ErrorKind::QuotaExceeded);
    }

    #[test]
    fn test_into_video_error_leaves_others() {
        let err = CarouselError::InvalidCredentials.into_video_error();
        assert_eq!(err.kind(), ErrorKind::InvalidCredentials);
    }
}
