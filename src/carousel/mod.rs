//! Carousel document model.
//!
//! This module provides:
//! - `model`: Data structures (Carousel, Slide, DesignPreferences, override table)
//! - `style`: Effective style resolution (slide > carousel > default)
//! - `ops`: Pure mutation operations (update, move, clear overrides, brand kit, scoped edits)
//! - `data_uri`: Decoding of `data:` visuals
//! - `wasm`: WASM bindings for browser usage (JsCarouselEditor)

pub mod data_uri;
pub mod model;
pub mod ops;
pub mod style;

#[cfg(feature = "wasm")]
pub mod wasm;

pub use data_uri::DataUri;
pub use model::*;
pub use ops::{Direction, EditScope, StyleChange};
pub use style::{EffectiveStyle, VisualKind};

#[cfg(feature = "wasm")]
pub use wasm::JsCarouselEditor;
