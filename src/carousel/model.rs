//! Data models for the carousel document.
//!
//! Field names serialize in the camelCase shape the browser client and the
//! remote tables use (`backgroundImage`, `createdAt`, ...), except
//! `visual_prompt`, which has always been snake_case on the wire.

use chrono::{DateTime, Utc};
use paste::paste;
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// Generates a fresh opaque identifier.
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Returns true if `id` is a hyphenated UUID (the remote store's id format).
pub fn is_canonical_uuid(id: &str) -> bool {
    id.len() == 36 && Uuid::try_parse(id).is_ok()
}

/// Deserializes a present field (including `null`) as `Some(..)`, so
/// `Option<Option<T>>` can tell "absent" from "explicitly cleared".
fn deserialize_some<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(deserializer).map(Some)
}

// =============================================================================
// ENUMERATIONS
// =============================================================================

/// Slide aspect ratio.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum AspectRatio {
    #[default]
    #[serde(rename = "1:1")]
    Square,
    #[serde(rename = "4:5")]
    Portrait,
    #[serde(rename = "9:16")]
    Story,
    #[serde(rename = "16:9")]
    Landscape,
}

impl AspectRatio {
    /// Returns the ratio label (`"1:1"`, `"4:5"`, ...).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Square => "1:1",
            Self::Portrait => "4:5",
            Self::Story => "9:16",
            Self::Landscape => "16:9",
        }
    }

    /// Pixel height for a given width, rounded to the nearest pixel.
    pub fn height_for_width(&self, width: u32) -> u32 {
        let (w, h) = match self {
            Self::Square => (1.0, 1.0),
            Self::Portrait => (4.0, 5.0),
            Self::Story => (9.0, 16.0),
            Self::Landscape => (16.0, 9.0),
        };
        (width as f64 * h / w).round() as u32
    }
}

/// Visual theme requested from the AI and used by the renderer.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum DesignStyle {
    #[default]
    Minimalist,
    Bold,
    Elegant,
    Playful,
    Corporate,
    Vibrant,
}

impl DesignStyle {
    pub const ALL: [DesignStyle; 6] = [
        Self::Minimalist,
        Self::Bold,
        Self::Elegant,
        Self::Playful,
        Self::Corporate,
        Self::Vibrant,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Minimalist => "Minimalist",
            Self::Bold => "Bold",
            Self::Elegant => "Elegant",
            Self::Playful => "Playful",
            Self::Corporate => "Corporate",
            Self::Vibrant => "Vibrant",
        }
    }
}

/// Corner/edge anchor for branding text and slide numbers.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum Position {
    TopLeft,
    TopCenter,
    TopRight,
    BottomLeft,
    BottomCenter,
    #[default]
    BottomRight,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TextAlign {
    Left,
    #[default]
    Center,
    Right,
    Justify,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum FontWeight {
    #[default]
    Normal,
    Bold,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum TextDecoration {
    #[default]
    None,
    Underline,
    LineThrough,
}

// =============================================================================
// TEXT AND BRANDING STYLES
// =============================================================================

/// Outline drawn around text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TextStroke {
    pub color: String,
    pub width: f64,
}

impl Default for TextStroke {
    fn default() -> Self {
        Self {
            color: "#000000".to_string(),
            width: 0.0,
        }
    }
}

/// Per-text-role (headline/body) style.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct TextStyle {
    /// Relative size (rem-like units of the preview).
    pub font_size: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_weight: Option<FontWeight>,
    pub text_align: TextAlign,
    pub text_stroke: TextStroke,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_decoration: Option<TextDecoration>,
}

impl TextStyle {
    /// Default headline style: large, bold, centered.
    pub fn headline() -> Self {
        Self {
            font_size: 1.4,
            font_weight: Some(FontWeight::Bold),
            ..Self::body()
        }
    }

    /// Default body style.
    pub fn body() -> Self {
        Self {
            font_size: 0.8,
            font_weight: None,
            text_align: TextAlign::Center,
            text_stroke: TextStroke::default(),
            text_decoration: None,
        }
    }

    /// Builder: Set font size.
    pub fn with_font_size(mut self, font_size: f64) -> Self {
        self.font_size = font_size;
        self
    }

    /// Builder: Set alignment.
    pub fn with_text_align(mut self, align: TextAlign) -> Self {
        self.text_align = align;
        self
    }

    /// Builder: Set stroke.
    pub fn with_text_stroke(mut self, color: impl Into<String>, width: f64) -> Self {
        self.text_stroke = TextStroke {
            color: color.into(),
            width,
        };
        self
    }
}

impl Default for TextStyle {
    fn default() -> Self {
        Self::body()
    }
}

/// Branding text appearance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct BrandingStyle {
    pub color: String,
    pub opacity: f64,
    pub position: Position,
    pub font_size: f64,
}

impl Default for BrandingStyle {
    fn default() -> Self {
        Self {
            color: "#111827".to_string(),
            opacity: 0.75,
            position: Position::BottomRight,
            font_size: 0.7,
        }
    }
}

/// Slide-number badge appearance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct SlideNumberStyle {
    pub show: bool,
    pub color: String,
    pub opacity: f64,
    pub position: Position,
    pub font_size: f64,
}

impl Default for SlideNumberStyle {
    fn default() -> Self {
        Self {
            show: false,
            color: "#FFFFFF".to_string(),
            opacity: 0.8,
            position: Position::TopRight,
            font_size: 0.7,
        }
    }
}

// =============================================================================
// DESIGN PREFERENCES
// =============================================================================

/// Carousel-wide design defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct DesignPreferences {
    pub background_color: String,
    pub font_color: String,
    pub background_opacity: f64,
    pub style: DesignStyle,
    pub font: String,
    pub aspect_ratio: AspectRatio,
    /// Carousel-level visual (data URI), used by slides without their own.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background_image: Option<String>,
    pub branding_text: String,
    pub branding_style: BrandingStyle,
    pub headline_style: TextStyle,
    pub body_style: TextStyle,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slide_number_style: Option<SlideNumberStyle>,
}

impl Default for DesignPreferences {
    fn default() -> Self {
        Self {
            background_color: "#FFFFFF".to_string(),
            font_color: "#111827".to_string(),
            background_opacity: 1.0,
            style: DesignStyle::Minimalist,
            font: "Inter".to_string(),
            aspect_ratio: AspectRatio::Square,
            background_image: None,
            branding_text: String::new(),
            branding_style: BrandingStyle::default(),
            headline_style: TextStyle::headline(),
            body_style: TextStyle::body(),
            slide_number_style: Some(SlideNumberStyle::default()),
        }
    }
}

impl DesignPreferences {
    /// Builder: Set background color.
    pub fn with_background_color(mut self, color: impl Into<String>) -> Self {
        self.background_color = color.into();
        self
    }

    /// Builder: Set font color.
    pub fn with_font_color(mut self, color: impl Into<String>) -> Self {
        self.font_color = color.into();
        self
    }

    /// Builder: Set aspect ratio.
    pub fn with_aspect_ratio(mut self, ratio: AspectRatio) -> Self {
        self.aspect_ratio = ratio;
        self
    }

    /// Builder: Set style theme.
    pub fn with_style(mut self, style: DesignStyle) -> Self {
        self.style = style;
        self
    }

    /// Merges a partial update: only fields present in `update` overwrite.
    pub fn merge(&mut self, update: &PreferencesUpdate) {
        if let Some(v) = &update.background_color {
            self.background_color = v.clone();
        }
        if let Some(v) = &update.font_color {
            self.font_color = v.clone();
        }
        if let Some(v) = update.background_opacity {
            self.background_opacity = v;
        }
        if let Some(v) = update.style {
            self.style = v;
        }
        if let Some(v) = &update.font {
            self.font = v.clone();
        }
        if let Some(v) = update.aspect_ratio {
            self.aspect_ratio = v;
        }
        if let Some(v) = &update.background_image {
            self.background_image = v.clone();
        }
        if let Some(v) = &update.branding_text {
            self.branding_text = v.clone();
        }
        if let Some(v) = &update.branding_style {
            self.branding_style = v.clone();
        }
        if let Some(v) = &update.headline_style {
            self.headline_style = v.clone();
        }
        if let Some(v) = &update.body_style {
            self.body_style = v.clone();
        }
        if let Some(v) = &update.slide_number_style {
            self.slide_number_style = Some(v.clone());
        }
    }
}

/// Partial preferences. Absent fields are left untouched by [`DesignPreferences::merge`].
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct PreferencesUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background_opacity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<DesignStyle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aspect_ratio: Option<AspectRatio>,
    /// `Some(None)` clears the carousel-level visual.
    #[serde(
        deserialize_with = "deserialize_some",
        skip_serializing_if = "Option::is_none"
    )]
    pub background_image: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branding_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branding_style: Option<BrandingStyle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headline_style: Option<TextStyle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body_style: Option<TextStyle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slide_number_style: Option<SlideNumberStyle>,
}

impl PreferencesUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: Set background color.
    pub fn with_background_color(mut self, color: impl Into<String>) -> Self {
        self.background_color = Some(color.into());
        self
    }

    /// Builder: Set font color.
    pub fn with_font_color(mut self, color: impl Into<String>) -> Self {
        self.font_color = Some(color.into());
        self
    }

    /// Builder: Set background opacity.
    pub fn with_background_opacity(mut self, opacity: f64) -> Self {
        self.background_opacity = Some(opacity);
        self
    }

    /// Builder: Set style theme.
    pub fn with_style(mut self, style: DesignStyle) -> Self {
        self.style = Some(style);
        self
    }

    /// Builder: Set font family.
    pub fn with_font(mut self, font: impl Into<String>) -> Self {
        self.font = Some(font.into());
        self
    }

    /// Builder: Set aspect ratio.
    pub fn with_aspect_ratio(mut self, ratio: AspectRatio) -> Self {
        self.aspect_ratio = Some(ratio);
        self
    }

    /// Builder: Set (`Some`) or clear (`None`) the carousel-level visual.
    pub fn with_background_image(mut self, image: Option<String>) -> Self {
        self.background_image = Some(image);
        self
    }

    /// Builder: Set branding text.
    pub fn with_branding_text(mut self, text: impl Into<String>) -> Self {
        self.branding_text = Some(text.into());
        self
    }

    /// Builder: Set branding style.
    pub fn with_branding_style(mut self, style: BrandingStyle) -> Self {
        self.branding_style = Some(style);
        self
    }

    /// Builder: Set headline style.
    pub fn with_headline_style(mut self, style: TextStyle) -> Self {
        self.headline_style = Some(style);
        self
    }

    /// Builder: Set body style.
    pub fn with_body_style(mut self, style: TextStyle) -> Self {
        self.body_style = Some(style);
        self
    }

    /// Builder: Set slide-number style.
    pub fn with_slide_number_style(mut self, style: SlideNumberStyle) -> Self {
        self.slide_number_style = Some(style);
        self
    }
}

// =============================================================================
// SLIDE STYLE OVERRIDES
// =============================================================================

/// Declares the per-slide override table.
///
/// For every `field: Type => "wireKey"` this generates:
/// - an optional field on [`SlideStyle`] (absent = inherit),
/// - a tri-state field on [`StyleUpdate`] (absent / set / clear),
/// - a [`StyleField`] variant naming it,
/// - `with_*` / `without_*` builders on [`SlideUpdate`].
macro_rules! style_overrides {
    ($($field:ident : $ty:ty => $key:literal),* $(,)?) => {
        paste! {
            /// Per-slide overrides. Every field is independently optional.
            #[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
            pub struct SlideStyle {
                $(
                    #[serde(rename = $key, default, skip_serializing_if = "Option::is_none")]
                    pub $field: Option<$ty>,
                )*
            }

            /// Tri-state override changes: `None` leaves a field alone,
            /// `Some(None)` removes it, `Some(Some(v))` sets it.
            #[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
            pub struct StyleUpdate {
                $(
                    #[serde(
                        rename = $key,
                        default,
                        deserialize_with = "deserialize_some",
                        skip_serializing_if = "Option::is_none"
                    )]
                    pub $field: Option<Option<$ty>>,
                )*
            }

            /// Names one override field.
            #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
            pub enum StyleField {
                $( [<$field:camel>], )*
            }

            impl StyleField {
                /// All override fields.
                pub const ALL: &'static [StyleField] = &[$( StyleField::[<$field:camel>], )*];

                /// Wire key of this field.
                pub fn key(self) -> &'static str {
                    match self {
                        $( StyleField::[<$field:camel>] => $key, )*
                    }
                }

                /// Parses a wire key (`"backgroundColor"`, ...).
                pub fn from_key(key: &str) -> Option<Self> {
                    match key {
                        $( $key => Some(StyleField::[<$field:camel>]), )*
                        _ => None,
                    }
                }
            }

            impl SlideStyle {
                /// Removes one override so the slide inherits again.
                pub fn clear(&mut self, field: StyleField) {
                    match field {
                        $( StyleField::[<$field:camel>] => self.$field = None, )*
                    }
                }

                /// True if the override is present.
                pub fn is_set(&self, field: StyleField) -> bool {
                    match field {
                        $( StyleField::[<$field:camel>] => self.$field.is_some(), )*
                    }
                }

                /// True if no override is present.
                pub fn is_empty(&self) -> bool {
                    StyleField::ALL.iter().all(|f| !self.is_set(*f))
                }

                /// Applies a tri-state update.
                pub fn apply(&mut self, update: &StyleUpdate) {
                    $(
                        if let Some(value) = &update.$field {
                            self.$field = value.clone();
                        }
                    )*
                }
            }

            impl SlideUpdate {
                $(
                    /// Builder: Set this override.
                    pub fn [<with_ $field>](mut self, value: impl Into<$ty>) -> Self {
                        self.style.$field = Some(Some(value.into()));
                        self
                    }

                    /// Builder: Remove this override.
                    pub fn [<without_ $field>](mut self) -> Self {
                        self.style.$field = Some(None);
                        self
                    }
                )*
            }
        }
    };
}

style_overrides! {
    background_image: String => "backgroundImage",
    background_color: String => "backgroundColor",
    font_color: String => "fontColor",
    background_opacity: f64 => "backgroundOpacity",
    headline_color: String => "headlineColor",
    body_color: String => "bodyColor",
    headline_style: TextStyle => "headlineStyle",
    body_style: TextStyle => "bodyStyle",
}

// =============================================================================
// SLIDE
// =============================================================================

/// AI-produced text for one slide.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SlideContent {
    pub headline: String,
    pub body: String,
    pub visual_prompt: String,
}

impl SlideContent {
    pub fn new(
        headline: impl Into<String>,
        body: impl Into<String>,
        visual_prompt: impl Into<String>,
    ) -> Self {
        Self {
            headline: headline.into(),
            body: body.into(),
            visual_prompt: visual_prompt.into(),
        }
    }
}

/// One slide of a carousel.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Slide {
    pub id: String,
    #[serde(default)]
    pub headline: String,
    #[serde(default)]
    pub body: String,
    #[serde(rename = "visual_prompt", default)]
    pub visual_prompt: String,
    /// Overrides, flattened next to the text fields.
    #[serde(flatten)]
    pub style: SlideStyle,
}

impl Slide {
    /// Creates an empty slide with the given ID.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    /// Creates a slide from AI content.
    pub fn from_content(id: impl Into<String>, content: SlideContent) -> Self {
        Self {
            id: id.into(),
            headline: content.headline,
            body: content.body,
            visual_prompt: content.visual_prompt,
            style: SlideStyle::default(),
        }
    }

    /// Builder: Set headline.
    pub fn with_headline(mut self, headline: impl Into<String>) -> Self {
        self.headline = headline.into();
        self
    }

    /// Builder: Set body.
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Builder: Set visual prompt.
    pub fn with_visual_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.visual_prompt = prompt.into();
        self
    }

    /// Builder: Set the slide's own visual.
    pub fn with_background_image(mut self, image: impl Into<String>) -> Self {
        self.style.background_image = Some(image.into());
        self
    }

    /// Builder: Set overrides.
    pub fn with_style(mut self, style: SlideStyle) -> Self {
        self.style = style;
        self
    }

    /// The slide's own visual, if any.
    pub fn background_image(&self) -> Option<&str> {
        self.style.background_image.as_deref()
    }

    /// Applies a partial update in place.
    pub fn apply(&mut self, update: &SlideUpdate) {
        if let Some(v) = &update.headline {
            self.headline = v.clone();
        }
        if let Some(v) = &update.body {
            self.body = v.clone();
        }
        if let Some(v) = &update.visual_prompt {
            self.visual_prompt = v.clone();
        }
        self.style.apply(&update.style);
    }
}

/// Partial slide changes (text fields plus tri-state overrides).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SlideUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headline: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(rename = "visual_prompt", default, skip_serializing_if = "Option::is_none")]
    pub visual_prompt: Option<String>,
    #[serde(flatten)]
    pub style: StyleUpdate,
}

impl SlideUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: Set headline.
    pub fn with_headline(mut self, headline: impl Into<String>) -> Self {
        self.headline = Some(headline.into());
        self
    }

    /// Builder: Set body.
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Builder: Set visual prompt.
    pub fn with_visual_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.visual_prompt = Some(prompt.into());
        self
    }

    /// Builder: Set one text part.
    pub fn with_part(self, part: SlidePart, text: impl Into<String>) -> Self {
        match part {
            SlidePart::Headline => self.with_headline(text),
            SlidePart::Body => self.with_body(text),
        }
    }
}

/// Regenerable text field of a slide.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SlidePart {
    Headline,
    Body,
}

impl SlidePart {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Headline => "headline",
            Self::Body => "body",
        }
    }
}

// =============================================================================
// CAROUSEL
// =============================================================================

/// Root document: metadata, ordered slides and design preferences.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Carousel {
    pub id: String,
    pub title: String,
    /// Set once at creation.
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub preferences: DesignPreferences,
    /// Order is meaningful: rendering, export and persistence all follow it.
    #[serde(default)]
    pub slides: Vec<Slide>,
}

impl Carousel {
    /// Creates an empty carousel with the given ID and title.
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            created_at: Utc::now(),
            category: String::new(),
            preferences: DesignPreferences::default(),
            slides: Vec::new(),
        }
    }

    /// Builder: Set category.
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    /// Builder: Set preferences.
    pub fn with_preferences(mut self, preferences: DesignPreferences) -> Self {
        self.preferences = preferences;
        self
    }

    /// Builder: Append a slide.
    pub fn with_slide(mut self, slide: Slide) -> Self {
        self.slides.push(slide);
        self
    }

    /// Builder: Set creation time.
    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    /// Position of a slide by ID.
    pub fn slide_index(&self, slide_id: &str) -> Option<usize> {
        self.slides.iter().position(|s| s.id == slide_id)
    }

    /// Gets a slide by ID.
    pub fn slide(&self, slide_id: &str) -> Option<&Slide> {
        self.slides.iter().find(|s| s.id == slide_id)
    }

    /// Slide IDs in document order.
    pub fn slide_ids(&self) -> Vec<String> {
        self.slides.iter().map(|s| s.id.clone()).collect()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preferences_default() {
        let prefs = DesignPreferences::default();
        assert_eq!(prefs.background_color, "#FFFFFF");
        assert_eq!(prefs.font_color, "#111827");
        assert_eq!(prefs.aspect_ratio, AspectRatio::Square);
        assert_eq!(prefs.headline_style.font_weight, Some(FontWeight::Bold));
        assert!(prefs.background_image.is_none());
    }

    #[test]
    fn test_preferences_merge_is_partial() {
        let mut prefs = DesignPreferences::default();
        prefs.merge(
            &PreferencesUpdate::new()
                .with_background_color("#000000")
                .with_aspect_ratio(AspectRatio::Story),
        );
        assert_eq!(prefs.background_color, "#000000");
        assert_eq!(prefs.aspect_ratio, AspectRatio::Story);
        assert_eq!(prefs.font_color, "#111827");
    }

    #[test]
    fn test_preferences_update_clears_background_image() {
        let mut prefs = DesignPreferences::default();
        prefs.background_image = Some("data:image/png;base64,AAAA".to_string());

        let update: PreferencesUpdate = serde_json::from_str(r#"{"backgroundImage": null}"#).unwrap();
        assert_eq!(update.background_image, Some(None));
        prefs.merge(&update);
        assert!(prefs.background_image.is_none());

        let untouched: PreferencesUpdate = serde_json::from_str(r##"{"fontColor": "#333333"}"##).unwrap();
        assert_eq!(untouched.background_image, None);
    }

    #[test]
    fn test_partial_preferences_fill_defaults() {
        let prefs: DesignPreferences =
            serde_json::from_str(r##"{"backgroundColor":"#101010","aspectRatio":"4:5"}"##).unwrap();
        assert_eq!(prefs.background_color, "#101010");
        assert_eq!(prefs.aspect_ratio, AspectRatio::Portrait);
        assert_eq!(prefs.body_style, TextStyle::body());
    }

    #[test]
    fn test_slide_wire_shape() {
        let slide = Slide::new("s-1")
            .with_headline("Hook")
            .with_visual_prompt("A sunrise")
            .with_background_image("data:image/png;base64,AAAA");
        let json = serde_json::to_value(&slide).unwrap();
        assert_eq!(json["visual_prompt"], "A sunrise");
        assert_eq!(json["backgroundImage"], "data:image/png;base64,AAAA");
        assert!(json.get("backgroundColor").is_none());

        let back: Slide = serde_json::from_value(json).unwrap();
        assert_eq!(back, slide);
    }

    #[test]
    fn test_style_field_keys() {
        assert_eq!(StyleField::BackgroundColor.key(), "backgroundColor");
        assert_eq!(StyleField::from_key("headlineStyle"), Some(StyleField::HeadlineStyle));
        assert_eq!(StyleField::from_key("nope"), None);
        assert_eq!(StyleField::ALL.len(), 8);
    }

    #[test]
    fn test_style_clear_removes_field() {
        let mut style = SlideStyle {
            background_color: Some("#FF0000".to_string()),
            font_color: Some("#00FF00".to_string()),
            ..Default::default()
        };
        style.clear(StyleField::BackgroundColor);
        assert!(!style.is_set(StyleField::BackgroundColor));
        assert!(style.is_set(StyleField::FontColor));
        style.clear(StyleField::FontColor);
        assert!(style.is_empty());
    }

    #[test]
    fn test_slide_update_tri_state() {
        let mut slide = Slide::new("s-1").with_background_image("data:image/png;base64,AAAA");
        slide.apply(&SlideUpdate::new().with_headline("New").with_background_color("#222222"));
        assert_eq!(slide.headline, "New");
        assert_eq!(slide.style.background_color.as_deref(), Some("#222222"));
        assert!(slide.background_image().is_some());

        slide.apply(&SlideUpdate::new().without_background_image());
        assert!(slide.background_image().is_none());
        assert_eq!(slide.headline, "New");
    }

    #[test]
    fn test_carousel_roundtrip_json() {
        let carousel = Carousel::new("c-1", "Morning routines")
            .with_category("Fitness")
            .with_slide(Slide::new("s-1").with_headline("H1"));
        let json = serde_json::to_string(&carousel).unwrap();
        assert!(json.contains("\"createdAt\""));
        let back: Carousel = serde_json::from_str(&json).unwrap();
        assert_eq!(back, carousel);
    }

    #[test]
    fn test_aspect_ratio_dimensions() {
        assert_eq!(AspectRatio::Square.height_for_width(1080), 1080);
        assert_eq!(AspectRatio::Portrait.height_for_width(1080), 1350);
        assert_eq!(AspectRatio::Story.height_for_width(1080), 1920);
        assert_eq!(AspectRatio::Landscape.height_for_width(1920), 1080);
        assert_eq!(serde_json::to_string(&AspectRatio::Story).unwrap(), "\"9:16\"");
    }

    #[test]
    fn test_canonical_uuid() {
        assert!(is_canonical_uuid(&new_id()));
        assert!(!is_canonical_uuid("slide-1"));
        assert!(!is_canonical_uuid("67e5504410b1426f9247bb680e5fe0c8"));
    }
}
