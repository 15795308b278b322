//! WASM bindings for the carousel document.
//!
//! `JsCarouselEditor` holds the live carousel for a browser editing session
//! and exposes the mutation operations and style resolution to JavaScript.
//! Each mutation replaces the held value with the next one.

use js_sys::Array;
use serde::Serialize;
use serde_wasm_bindgen::{from_value, Serializer};
use wasm_bindgen::prelude::*;

use crate::carousel::model::*;
use crate::carousel::ops::{self, Direction, EditScope, StyleChange};
use crate::carousel::style;
use crate::settings::BrandKit;
use crate::CarouselError;

/// Serialize a value to JsValue with maps as plain JS objects (not Map).
fn to_js_value<T: Serialize>(value: &T) -> Result<JsValue, serde_wasm_bindgen::Error> {
    value.serialize(&Serializer::new().serialize_maps_as_objects(true))
}

// =============================================================================
// ERROR CONVERSION
// =============================================================================

macro_rules! js_result {
    ($expr:expr) => {
        $expr.map_err(|e: CarouselError| JsValue::from_str(&e.to_string()))
    };
}

fn parse_direction(direction: &str) -> Result<Direction, JsValue> {
    match direction {
        "left" => Ok(Direction::Left),
        "right" => Ok(Direction::Right),
        other => Err(JsValue::from_str(&format!("Unknown direction: {}", other))),
    }
}

// =============================================================================
// MAIN WRAPPER TYPE
// =============================================================================

/// JavaScript-friendly editor over one carousel.
#[wasm_bindgen]
pub struct JsCarouselEditor {
    inner: Carousel,
}

#[wasm_bindgen]
impl JsCarouselEditor {
    // =========================================================================
    // LIFECYCLE
    // =========================================================================

    /// Wraps an existing carousel object.
    ///
    /// # Example (JavaScript)
    /// ```js
    /// const editor = new JsCarouselEditor(carouselFromHistory);
    /// ```
    #[wasm_bindgen(constructor)]
    pub fn new(carousel: JsValue) -> Result<JsCarouselEditor, JsValue> {
        let inner: Carousel = from_value(carousel)?;
        Ok(JsCarouselEditor { inner })
    }

    /// Creates a carousel from AI slide content (`[{headline, body, visual_prompt}]`).
    #[wasm_bindgen(js_name = create)]
    pub fn create(
        topic: &str,
        slides: JsValue,
        category: &str,
        preferences: JsValue,
    ) -> Result<JsCarouselEditor, JsValue> {
        let contents: Vec<SlideContent> = from_value(slides)?;
        let preferences: DesignPreferences = if preferences.is_undefined() || preferences.is_null() {
            DesignPreferences::default()
        } else {
            from_value(preferences)?
        };
        Ok(JsCarouselEditor {
            inner: ops::create_carousel(topic, contents, category, preferences),
        })
    }

    /// Creates a draft carousel (no slides) from a preferences update.
    #[wasm_bindgen(js_name = draft)]
    pub fn draft(updates: JsValue, topic: &str) -> Result<JsCarouselEditor, JsValue> {
        let updates: PreferencesUpdate = from_value(updates)?;
        Ok(JsCarouselEditor {
            inner: ops::update_preferences(None, &updates, topic),
        })
    }

    /// Loads from a JSON string.
    #[wasm_bindgen(js_name = fromJson)]
    pub fn from_json(json: &str) -> Result<JsCarouselEditor, JsValue> {
        let inner = js_result!(serde_json::from_str::<Carousel>(json).map_err(CarouselError::from))?;
        Ok(JsCarouselEditor { inner })
    }

    /// Serializes to a JSON string.
    #[wasm_bindgen(js_name = toJson)]
    pub fn to_json(&self) -> Result<String, JsValue> {
        js_result!(serde_json::to_string(&self.inner).map_err(CarouselError::from))
    }

    // =========================================================================
    // STATE ACCESS
    // =========================================================================

    /// Gets the full carousel as a JavaScript object.
    #[wasm_bindgen(js_name = getState)]
    pub fn get_state(&self) -> Result<JsValue, JsValue> {
        Ok(to_js_value(&self.inner)?)
    }

    #[wasm_bindgen(js_name = carouselId)]
    pub fn carousel_id(&self) -> String {
        self.inner.id.clone()
    }

    /// Slide IDs in document order.
    #[wasm_bindgen(js_name = slideIds)]
    pub fn slide_ids(&self) -> Array {
        self.inner
            .slides
            .iter()
            .map(|s| JsValue::from_str(&s.id))
            .collect()
    }

    /// Gets a slide by ID (undefined if missing).
    #[wasm_bindgen(js_name = getSlide)]
    pub fn get_slide(&self, slide_id: &str) -> Result<JsValue, JsValue> {
        match self.inner.slide(slide_id) {
            Some(slide) => Ok(to_js_value(slide)?),
            None => Ok(JsValue::UNDEFINED),
        }
    }

    /// Resolves the effective style of a slide.
    ///
    /// # Example (JavaScript)
    /// ```js
    /// const { backgroundColor, visual } = editor.resolveStyle(slideId);
    /// ```
    #[wasm_bindgen(js_name = resolveStyle)]
    pub fn resolve_style(&self, slide_id: &str) -> Result<JsValue, JsValue> {
        let slide = self.inner.slide(slide_id);
        Ok(to_js_value(&style::resolve(slide, Some(&self.inner.preferences)))?)
    }

    // =========================================================================
    // MUTATIONS
    // =========================================================================

    /// Merges fields into a slide. Unknown IDs leave the carousel unchanged.
    ///
    /// # Example (JavaScript)
    /// ```js
    /// editor.updateSlide(slideId, { headline: 'New hook', backgroundColor: '#000000' });
    /// editor.updateSlide(slideId, { backgroundImage: null }); // clears the visual
    /// ```
    #[wasm_bindgen(js_name = updateSlide)]
    pub fn update_slide(&mut self, slide_id: &str, updates: JsValue) -> Result<(), JsValue> {
        let updates: SlideUpdate = from_value(updates)?;
        self.inner = ops::update_slide(&self.inner, slide_id, &updates);
        Ok(())
    }

    /// Merges fields into the carousel preferences.
    #[wasm_bindgen(js_name = updatePreferences)]
    pub fn update_preferences(&mut self, updates: JsValue) -> Result<(), JsValue> {
        let updates: PreferencesUpdate = from_value(updates)?;
        self.inner = ops::update_preferences(Some(&self.inner), &updates, "");
        Ok(())
    }

    /// Removes an override (by wire key, e.g. `"backgroundColor"`) from every slide.
    #[wasm_bindgen(js_name = clearSlideOverrides)]
    pub fn clear_slide_overrides(&mut self, field: &str) -> Result<(), JsValue> {
        let field = StyleField::from_key(field)
            .ok_or_else(|| JsValue::from_str(&format!("Unknown style field: {}", field)))?;
        self.inner = ops::clear_slide_overrides(&self.inner, field);
        Ok(())
    }

    /// Moves a slide `"left"` or `"right"`.
    #[wasm_bindgen(js_name = moveSlide)]
    pub fn move_slide(&mut self, slide_id: &str, direction: &str) -> Result<(), JsValue> {
        let direction = parse_direction(direction)?;
        self.inner = ops::move_slide(&self.inner, slide_id, direction);
        Ok(())
    }

    /// Applies a brand kit object.
    #[wasm_bindgen(js_name = applyBrandKit)]
    pub fn apply_brand_kit(&mut self, kit: JsValue) -> Result<(), JsValue> {
        let kit: BrandKit = from_value(kit)?;
        self.inner = ops::apply_brand_kit(&self.inner, &kit);
        Ok(())
    }

    /// Applies a scoped style change.
    ///
    /// # Example (JavaScript)
    /// ```js
    /// editor.applyStyle({ type: 'allSlides' }, { field: 'backgroundColor', value: '#111111' });
    /// editor.applyStyle({ type: 'slide', slideId }, { field: 'backgroundOpacity', value: 0.5 });
    /// ```
    #[wasm_bindgen(js_name = applyStyle)]
    pub fn apply_style(&mut self, scope: JsValue, change: JsValue) -> Result<(), JsValue> {
        let scope: EditScope = from_value(scope)?;
        let change: StyleChange = from_value(change)?;
        self.inner = ops::apply_style(&self.inner, &scope, &change);
        Ok(())
    }

    /// Sets or clears (`null`) one slide's own visual.
    #[wasm_bindgen(js_name = setSlideVisual)]
    pub fn set_slide_visual(&mut self, slide_id: &str, visual: Option<String>) {
        self.inner = ops::set_slide_visual(&self.inner, slide_id, visual);
    }
}
