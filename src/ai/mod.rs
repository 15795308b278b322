//! AI content client.
//!
//! [`ContentGenerator`] is the capability the orchestrator calls into. Every
//! operation is one request/response exchange (video generation polls
//! internally but is still a single awaited call) and none of them retries.
//! Settings are passed per call so a settings change applies to the next
//! request without rebuilding the client.

pub mod prompts;

#[cfg(feature = "http")]
pub mod gemini;

use async_trait::async_trait;

use crate::carousel::model::{
    AspectRatio, Carousel, DesignPreferences, PreferencesUpdate, Slide, SlideContent, SlidePart,
};
use crate::error::{CarouselError, CarouselResult};
use crate::settings::AppSettings;

#[cfg(feature = "http")]
pub use gemini::GeminiClient;

/// Generative-AI operations used by the pipeline.
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    /// Produces the slide list for a new carousel. The slide count is chosen by the model.
    async fn generate_carousel_content(
        &self,
        settings: &AppSettings,
        topic: &str,
        niche: &str,
        preferences: &DesignPreferences,
    ) -> CarouselResult<Vec<SlideContent>>;

    /// Generates a still image and returns it as a data URI.
    async fn generate_image(
        &self,
        settings: &AppSettings,
        prompt: &str,
        aspect_ratio: AspectRatio,
    ) -> CarouselResult<String>;

    /// Generates a video and returns it as a data URI.
    async fn generate_video(
        &self,
        settings: &AppSettings,
        prompt: &str,
        aspect_ratio: AspectRatio,
    ) -> CarouselResult<String>;

    /// Edits an existing image (`image_base64` without the data URI prefix).
    async fn edit_image(
        &self,
        settings: &AppSettings,
        image_base64: &str,
        mime_type: &str,
        instruction: &str,
    ) -> CarouselResult<String>;

    /// Rewrites one text field of a slide.
    async fn regenerate_slide_content(
        &self,
        settings: &AppSettings,
        carousel_title: &str,
        slide: &Slide,
        part: SlidePart,
    ) -> CarouselResult<String>;

    /// Writes a social caption for the carousel.
    async fn generate_caption(&self, settings: &AppSettings, carousel: &Carousel)
        -> CarouselResult<String>;

    /// Rewrites the carousel as a text thread.
    async fn generate_thread(&self, settings: &AppSettings, carousel: &Carousel)
        -> CarouselResult<String>;

    /// Suggests preferences for a title and category.
    async fn design_suggestion(
        &self,
        settings: &AppSettings,
        title: &str,
        category: &str,
    ) -> CarouselResult<PreferencesUpdate>;
}

/// Host hook for the extra key the video service needs (billing project selection).
#[async_trait]
pub trait VideoKeySelector: Send + Sync {
    async fn has_selected_key(&self) -> CarouselResult<bool>;

    /// Asks the user to pick a key.
    async fn select_key(&self) -> CarouselResult<()>;
}

/// Selector for hosts where the configured API key is all the video service needs.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfiguredKey;

#[async_trait]
impl VideoKeySelector for ConfiguredKey {
    async fn has_selected_key(&self) -> CarouselResult<bool> {
        Ok(true)
    }

    async fn select_key(&self) -> CarouselResult<()> {
        Ok(())
    }
}

/// Fails fast when no API key is configured.
pub fn ensure_api_key(settings: &AppSettings) -> CarouselResult<()> {
    if settings.has_api_key() {
        Ok(())
    } else {
        Err(CarouselError::missing_api_key())
    }
}

/// Nearest aspect ratio the image service accepts.
pub fn image_aspect_ratio(ratio: AspectRatio) -> &'static str {
    match ratio {
        AspectRatio::Square => "1:1",
        AspectRatio::Portrait => "3:4",
        AspectRatio::Story => "9:16",
        AspectRatio::Landscape => "16:9",
    }
}

/// Aspect ratio sent to the video service, which only does landscape or portrait.
pub fn video_aspect_ratio(ratio: AspectRatio) -> &'static str {
    match ratio {
        AspectRatio::Landscape => "16:9",
        AspectRatio::Square | AspectRatio::Portrait | AspectRatio::Story => "9:16",
    }
}
