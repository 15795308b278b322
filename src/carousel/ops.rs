//! Carousel mutation operations.
//!
//! Every operation takes the current value by reference and returns the next
//! one. Slide order is preserved by everything except [`move_slide`].

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::model::{
    new_id, Carousel, DesignPreferences, PreferencesUpdate, Slide, SlideContent, SlideUpdate,
    StyleField, TextStyle,
};
use crate::settings::BrandKit;

/// Category given to drafts created before any content exists.
pub const DEFAULT_CATEGORY: &str = "General";

const FALLBACK_FONT: &str = "Inter";

/// Direction of a slide move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Left,
    Right,
}

/// Which slides a style change targets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "type", content = "slideId")]
pub enum EditScope {
    /// The carousel-wide preference.
    AllSlides,
    /// One slide's override.
    Slide(String),
}

/// A style edit that can be scoped to one slide or to all of them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "field", content = "value")]
pub enum StyleChange {
    BackgroundColor(String),
    FontColor(String),
    BackgroundOpacity(f64),
    /// `None` removes the visual.
    BackgroundImage(Option<String>),
    HeadlineStyle(TextStyle),
    BodyStyle(TextStyle),
}

/// Builds a new carousel from AI content. The carousel and every slide get fresh IDs.
pub fn create_carousel(
    topic: &str,
    contents: Vec<SlideContent>,
    category: &str,
    preferences: DesignPreferences,
) -> Carousel {
    let slides = contents
        .into_iter()
        .map(|content| Slide::from_content(new_id(), content))
        .collect();

    Carousel {
        id: new_id(),
        title: topic.to_string(),
        created_at: Utc::now(),
        category: category.to_string(),
        preferences,
        slides,
    }
}

/// Merges `update` into the slide with `slide_id`.
///
/// An unknown ID returns the carousel unchanged.
pub fn update_slide(carousel: &Carousel, slide_id: &str, update: &SlideUpdate) -> Carousel {
    let mut next = carousel.clone();
    match next.slides.iter_mut().find(|s| s.id == slide_id) {
        Some(slide) => slide.apply(update),
        None => warn!(slide_id, carousel_id = %carousel.id, "update_slide: unknown slide id"),
    }
    next
}

/// Merges `update` into the carousel preferences.
///
/// With no carousel yet, synthesizes a draft titled `fallback_topic` with
/// default preferences overlaid by the update and no slides.
pub fn update_preferences(
    carousel: Option<&Carousel>,
    update: &PreferencesUpdate,
    fallback_topic: &str,
) -> Carousel {
    match carousel {
        Some(current) => {
            let mut next = current.clone();
            next.preferences.merge(update);
            next
        }
        None => {
            let mut preferences = DesignPreferences::default();
            preferences.merge(update);
            Carousel::new(new_id(), fallback_topic)
                .with_category(DEFAULT_CATEGORY)
                .with_preferences(preferences)
        }
    }
}

/// Removes `field` from every slide so it inherits from the preferences again.
pub fn clear_slide_overrides(carousel: &Carousel, field: StyleField) -> Carousel {
    let mut next = carousel.clone();
    for slide in &mut next.slides {
        slide.style.clear(field);
    }
    next
}

/// Swaps the slide with its neighbour in `direction`.
///
/// No-op at either boundary and for unknown IDs.
pub fn move_slide(carousel: &Carousel, slide_id: &str, direction: Direction) -> Carousel {
    let mut next = carousel.clone();
    let Some(index) = carousel.slide_index(slide_id) else {
        warn!(slide_id, carousel_id = %carousel.id, "move_slide: unknown slide id");
        return next;
    };

    let target = match direction {
        Direction::Left => index.checked_sub(1),
        Direction::Right => Some(index + 1).filter(|i| *i < carousel.slides.len()),
    };

    if let Some(target) = target {
        next.slides.swap(index, target);
    }
    next
}

/// Copies brand colors, font and branding into the preferences, then clears
/// background/font color overrides so the brand colors show.
pub fn apply_brand_kit(carousel: &Carousel, kit: &BrandKit) -> Carousel {
    let font = if kit.fonts.body.is_empty() {
        FALLBACK_FONT.to_string()
    } else {
        kit.fonts.body.clone()
    };

    let mut update = PreferencesUpdate::new()
        .with_background_color(kit.colors.primary.clone())
        .with_font_color(kit.colors.text.clone())
        .with_font(font)
        .with_branding_text(kit.branding_text.clone())
        .with_branding_style(kit.branding_style.clone());
    if let Some(numbers) = &kit.slide_number_style {
        update = update.with_slide_number_style(numbers.clone());
    }

    let mut next = carousel.clone();
    next.preferences.merge(&update);
    let next = clear_slide_overrides(&next, StyleField::BackgroundColor);
    clear_slide_overrides(&next, StyleField::FontColor)
}

/// Applies a style change to one slide or to the whole carousel.
///
/// Carousel-wide background color, font color and opacity changes also clear
/// the matching slide overrides. Removing the carousel-wide visual clears
/// every slide's own visual too.
pub fn apply_style(carousel: &Carousel, scope: &EditScope, change: &StyleChange) -> Carousel {
    match scope {
        EditScope::Slide(slide_id) => {
            let update = match change.clone() {
                StyleChange::BackgroundColor(v) => SlideUpdate::new().with_background_color(v),
                StyleChange::FontColor(v) => SlideUpdate::new().with_font_color(v),
                StyleChange::BackgroundOpacity(v) => SlideUpdate::new().with_background_opacity(v),
                StyleChange::BackgroundImage(Some(v)) => {
                    SlideUpdate::new().with_background_image(v)
                }
                StyleChange::BackgroundImage(None) => SlideUpdate::new().without_background_image(),
                StyleChange::HeadlineStyle(v) => SlideUpdate::new().with_headline_style(v),
                StyleChange::BodyStyle(v) => SlideUpdate::new().with_body_style(v),
            };
            update_slide(carousel, slide_id, &update)
        }
        EditScope::AllSlides => {
            let (update, cleared) = match change.clone() {
                StyleChange::BackgroundColor(v) => (
                    PreferencesUpdate::new().with_background_color(v),
                    Some(StyleField::BackgroundColor),
                ),
                StyleChange::FontColor(v) => (
                    PreferencesUpdate::new().with_font_color(v),
                    Some(StyleField::FontColor),
                ),
                StyleChange::BackgroundOpacity(v) => (
                    PreferencesUpdate::new().with_background_opacity(v),
                    Some(StyleField::BackgroundOpacity),
                ),
                StyleChange::BackgroundImage(None) => (
                    PreferencesUpdate::new().with_background_image(None),
                    Some(StyleField::BackgroundImage),
                ),
                StyleChange::BackgroundImage(image) => {
                    (PreferencesUpdate::new().with_background_image(image), None)
                }
                StyleChange::HeadlineStyle(v) => (PreferencesUpdate::new().with_headline_style(v), None),
                StyleChange::BodyStyle(v) => (PreferencesUpdate::new().with_body_style(v), None),
            };

            let next = update_preferences(Some(carousel), &update, &carousel.title);
            match cleared {
                Some(field) => clear_slide_overrides(&next, field),
                None => next,
            }
        }
    }
}

/// Sets (`Some`) or removes (`None`) one slide's own visual.
pub fn set_slide_visual(carousel: &Carousel, slide_id: &str, visual: Option<String>) -> Carousel {
    let update = match visual {
        Some(uri) => SlideUpdate::new().with_background_image(uri),
        None => SlideUpdate::new().without_background_image(),
    };
    update_slide(carousel, slide_id, &update)
}
