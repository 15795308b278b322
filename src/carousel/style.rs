//! Effective style resolution.
//!
//! Every attribute resolves slide override first, then the carousel
//! preference, then a hard-coded default. Nothing here caches: render and
//! export both call back in and get the same answer.

use serde::Serialize;

use super::model::{
    AspectRatio, BrandingStyle, DesignPreferences, DesignStyle, Slide, SlideNumberStyle, TextStyle,
};

pub const DEFAULT_BACKGROUND_COLOR: &str = "#FFFFFF";
pub const DEFAULT_FONT_COLOR: &str = "#111827";
pub const DEFAULT_BACKGROUND_OPACITY: f64 = 1.0;
pub const DEFAULT_FONT: &str = "Inter";

/// What kind of visual sits behind a slide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VisualKind {
    None,
    Image,
    Video,
}

impl VisualKind {
    /// Classifies a visual by its data URI prefix.
    pub fn of(uri: Option<&str>) -> Self {
        match uri {
            Some(u) if u.starts_with("data:video") => Self::Video,
            Some(u) if !u.is_empty() => Self::Image,
            _ => Self::None,
        }
    }
}

/// Effective visual: the slide's own, else the carousel-level one.
pub fn background_image<'a>(
    slide: Option<&'a Slide>,
    prefs: Option<&'a DesignPreferences>,
) -> Option<&'a str> {
    slide
        .and_then(|s| s.style.background_image.as_deref())
        .or_else(|| prefs.and_then(|p| p.background_image.as_deref()))
}

pub fn visual_kind(slide: Option<&Slide>, prefs: Option<&DesignPreferences>) -> VisualKind {
    VisualKind::of(background_image(slide, prefs))
}

pub fn background_color(slide: Option<&Slide>, prefs: Option<&DesignPreferences>) -> String {
    slide
        .and_then(|s| s.style.background_color.clone())
        .or_else(|| prefs.map(|p| p.background_color.clone()))
        .unwrap_or_else(|| DEFAULT_BACKGROUND_COLOR.to_string())
}

pub fn font_color(slide: Option<&Slide>, prefs: Option<&DesignPreferences>) -> String {
    slide
        .and_then(|s| s.style.font_color.clone())
        .or_else(|| prefs.map(|p| p.font_color.clone()))
        .unwrap_or_else(|| DEFAULT_FONT_COLOR.to_string())
}

pub fn background_opacity(slide: Option<&Slide>, prefs: Option<&DesignPreferences>) -> f64 {
    slide
        .and_then(|s| s.style.background_opacity)
        .or_else(|| prefs.map(|p| p.background_opacity))
        .unwrap_or(DEFAULT_BACKGROUND_OPACITY)
}

/// Headline color: headline override, then the slide's font color, then the carousel's.
pub fn headline_color(slide: Option<&Slide>, prefs: Option<&DesignPreferences>) -> String {
    slide
        .and_then(|s| s.style.headline_color.clone())
        .unwrap_or_else(|| font_color(slide, prefs))
}

/// Body color: body override, then the slide's font color, then the carousel's.
pub fn body_color(slide: Option<&Slide>, prefs: Option<&DesignPreferences>) -> String {
    slide
        .and_then(|s| s.style.body_color.clone())
        .unwrap_or_else(|| font_color(slide, prefs))
}

pub fn headline_style(slide: Option<&Slide>, prefs: Option<&DesignPreferences>) -> TextStyle {
    slide
        .and_then(|s| s.style.headline_style.clone())
        .or_else(|| prefs.map(|p| p.headline_style.clone()))
        .unwrap_or_else(TextStyle::headline)
}

pub fn body_style(slide: Option<&Slide>, prefs: Option<&DesignPreferences>) -> TextStyle {
    slide
        .and_then(|s| s.style.body_style.clone())
        .or_else(|| prefs.map(|p| p.body_style.clone()))
        .unwrap_or_else(TextStyle::body)
}

/// Fully resolved style of one slide.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectiveStyle {
    pub background_color: String,
    pub font_color: String,
    pub background_opacity: f64,
    pub background_image: Option<String>,
    pub visual: VisualKind,
    pub headline_color: String,
    pub body_color: String,
    pub headline_style: TextStyle,
    pub body_style: TextStyle,
    pub font: String,
    pub style: DesignStyle,
    pub aspect_ratio: AspectRatio,
    pub branding_text: String,
    pub branding_style: BrandingStyle,
    pub slide_number_style: SlideNumberStyle,
}

/// Resolves every stylable attribute of a slide at once.
pub fn resolve(slide: Option<&Slide>, prefs: Option<&DesignPreferences>) -> EffectiveStyle {
    let image = background_image(slide, prefs);
    EffectiveStyle {
        background_color: background_color(slide, prefs),
        font_color: font_color(slide, prefs),
        background_opacity: background_opacity(slide, prefs),
        background_image: image.map(str::to_string),
        visual: VisualKind::of(image),
        headline_color: headline_color(slide, prefs),
        body_color: body_color(slide, prefs),
        headline_style: headline_style(slide, prefs),
        body_style: body_style(slide, prefs),
        font: prefs
            .map(|p| p.font.clone())
            .filter(|f| !f.is_empty())
            .unwrap_or_else(|| DEFAULT_FONT.to_string()),
        style: prefs.map(|p| p.style).unwrap_or_default(),
        aspect_ratio: prefs.map(|p| p.aspect_ratio).unwrap_or_default(),
        branding_text: prefs.map(|p| p.branding_text.clone()).unwrap_or_default(),
        branding_style: prefs.map(|p| p.branding_style.clone()).unwrap_or_default(),
        slide_number_style: prefs
            .and_then(|p| p.slide_number_style.clone())
            .unwrap_or_default(),
    }
}
