//! Prompt text, response schemas and response parsing for the text model.
//!
//! Kept free of any transport so the request shapes can be checked in tests.

use serde::Deserialize;
use serde_json::{json, Value};

use crate::carousel::model::{
    Carousel, DesignPreferences, DesignStyle, PreferencesUpdate, Slide, SlideContent, SlidePart,
};
use crate::error::{CarouselError, CarouselResult};

/// Prompt for the initial slide list.
pub fn carousel_content_prompt(topic: &str, niche: &str, preferences: &DesignPreferences) -> String {
    format!(
        "Create an engaging social media carousel about \"{topic}\" for an audience interested in {niche}.\n\
         Decide how many slides the topic needs (usually 5 to 8).\n\
         The first slide is a hook, the last slide is a call to action.\n\
         Keep each headline under 10 words and each body under 30 words.\n\
         For every slide write a visual_prompt describing a background image in a {style} style \
         with no text in the image.\n\
         The slides will be shown at a {ratio} aspect ratio.",
        topic = topic,
        niche = niche,
        style = preferences.style.as_str(),
        ratio = preferences.aspect_ratio.as_str(),
    )
}

/// Response schema: an array of `{headline, body, visual_prompt}`.
pub fn carousel_content_schema() -> Value {
    json!({
        "type": "ARRAY",
        "items": {
            "type": "OBJECT",
            "properties": {
                "headline": { "type": "STRING" },
                "body": { "type": "STRING" },
                "visual_prompt": { "type": "STRING" }
            },
            "required": ["headline", "body", "visual_prompt"]
        }
    })
}

pub fn regenerate_prompt(carousel_title: &str, slide: &Slide, part: SlidePart) -> String {
    let (current, guidance) = match part {
        SlidePart::Headline => (&slide.headline, "a punchy headline under 10 words"),
        SlidePart::Body => (&slide.body, "body text under 30 words"),
    };
    format!(
        "This slide belongs to a carousel titled \"{title}\".\n\
         Headline: {headline}\nBody: {body}\n\
         Rewrite the {part} (currently: \"{current}\") as {guidance}.\n\
         Respond with the new text only, without quotes.",
        title = carousel_title,
        headline = slide.headline,
        body = slide.body,
        part = part.as_str(),
        current = current,
        guidance = guidance,
    )
}

fn outline(carousel: &Carousel) -> String {
    carousel
        .slides
        .iter()
        .enumerate()
        .map(|(i, s)| format!("Slide {}: {} - {}", i + 1, s.headline, s.body))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn caption_prompt(carousel: &Carousel) -> String {
    format!(
        "Write an engaging social media caption for a carousel titled \"{}\".\n\
         Slides:\n{}\n\
         Open with a hook, summarise the value in two or three short sentences, \
         end with a call to action and 3 to 5 relevant hashtags.",
        carousel.title,
        outline(carousel)
    )
}

pub fn thread_prompt(carousel: &Carousel) -> String {
    format!(
        "Turn this carousel titled \"{}\" into a thread of short posts.\n\
         Slides:\n{}\n\
         Write one post per slide, numbered like 1/, 2/, and separate posts with a blank line.",
        carousel.title,
        outline(carousel)
    )
}

pub fn design_suggestion_prompt(title: &str, category: &str) -> String {
    format!(
        "Suggest a visual design for a social media carousel titled \"{}\" in the {} category.\n\
         Pick a background color and a font color with strong contrast (hex codes), \
         one of the styles {} and a Google font family.",
        title,
        category,
        DesignStyle::ALL
            .iter()
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    )
}

pub fn design_suggestion_schema() -> Value {
    let styles: Vec<&str> = DesignStyle::ALL.iter().map(|s| s.as_str()).collect();
    json!({
        "type": "OBJECT",
        "properties": {
            "backgroundColor": { "type": "STRING" },
            "fontColor": { "type": "STRING" },
            "style": { "type": "STRING", "enum": styles },
            "font": { "type": "STRING" }
        },
        "required": ["backgroundColor", "fontColor", "style", "font"]
    })
}

pub fn edit_image_prompt(instruction: &str) -> String {
    format!(
        "Edit this image: {}. Keep the composition and do not add any text.",
        instruction
    )
}

// =============================================================================
// RESPONSE PARSING
// =============================================================================

/// Removes a surrounding markdown code fence, if any.
fn strip_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ContentPayload {
    List(Vec<SlideContent>),
    Wrapped { slides: Vec<SlideContent> },
}

/// Parses the slide list returned by the text model.
pub fn parse_slide_contents(text: &str) -> CarouselResult<Vec<SlideContent>> {
    let payload: ContentPayload = serde_json::from_str(strip_fence(text))?;
    let slides = match payload {
        ContentPayload::List(slides) | ContentPayload::Wrapped { slides } => slides,
    };
    if slides.is_empty() {
        return Err(CarouselError::unknown("AI returned no slides for this topic."));
    }
    Ok(slides)
}

#[derive(Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
struct SuggestionPayload {
    background_color: Option<String>,
    font_color: Option<String>,
    style: Option<String>,
    font: Option<String>,
}

fn is_hex_color(value: &str) -> bool {
    let digits = match value.strip_prefix('#') {
        Some(d) => d,
        None => return false,
    };
    matches!(digits.len(), 3 | 6 | 8) && digits.chars().all(|c| c.is_ascii_hexdigit())
}

/// Parses a design suggestion into a preferences update, dropping invalid values.
pub fn parse_design_suggestion(text: &str) -> CarouselResult<PreferencesUpdate> {
    let payload: SuggestionPayload = serde_json::from_str(strip_fence(text))?;
    let mut update = PreferencesUpdate::new();

    if let Some(color) = payload.background_color.filter(|c| is_hex_color(c)) {
        update = update.with_background_color(color);
    }
    if let Some(color) = payload.font_color.filter(|c| is_hex_color(c)) {
        update = update.with_font_color(color);
    }
    if let Some(style) = payload
        .style
        .and_then(|s| DesignStyle::ALL.into_iter().find(|d| d.as_str().eq_ignore_ascii_case(&s)))
    {
        update = update.with_style(style);
    }
    if let Some(font) = payload.font.map(|f| f.trim().to_string()).filter(|f| !f.is_empty()) {
        update = update.with_font(font);
    }
    Ok(update)
}

/// Trims whitespace and wrapping quotes from a free-text answer.
pub fn clean_text(text: &str) -> String {
    let trimmed = text.trim();
    trimmed
        .strip_prefix('"')
        .and_then(|t| t.strip_suffix('"'))
        .unwrap_or(trimmed)
        .trim()
        .to_string()
}
