//! Caroumate - AI-generated social media carousels.
//!
//! A topic goes in; a carousel of slides (headline, body, visual prompt and an
//! optional generated image or video) comes out, ready to be styled, saved and
//! exported as a zip of per-slide assets:
//!
//! - **Document model**: immutable-style operations on a [`Carousel`], with
//!   per-slide overrides resolved against carousel-wide preferences
//! - **Generation**: the [`Orchestrator`] sequences AI calls, document updates
//!   and saves, one slide at a time, with epoch tokens so stale runs never
//!   overwrite newer work
//! - **Persistence**: any [`PersistenceGateway`] (Supabase, or a local JSON file)
//! - **Export**: archive assembly over any [`SlideRasterizer`]
//!
//! # Example
//!
//! ```rust
//! use caroumate::carousel::ops::{create_carousel, move_slide, Direction};
//! use caroumate::carousel::style;
//! use caroumate::{DesignPreferences, SlideContent, SlideUpdate};
//!
//! let carousel = create_carousel(
//!     "Morning routines",
//!     vec![
//!         SlideContent::new("Wake early", "Same time every day", "sunrise over a city"),
//!         SlideContent::new("Hydrate", "A glass of water first", "glass of water on a desk"),
//!     ],
//!     "Health",
//!     DesignPreferences::default().with_background_color("#0F172A"),
//! );
//!
//! // Override one slide, then reorder
//! let first = carousel.slides[0].id.clone();
//! let carousel = caroumate::carousel::ops::update_slide(
//!     &carousel,
//!     &first,
//!     &SlideUpdate::new().with_background_color("#FF0000"),
//! );
//! let carousel = move_slide(&carousel, &first, Direction::Right);
//!
//! assert_eq!(carousel.slides[1].id, first);
//! assert_eq!(
//!     style::background_color(carousel.slides.get(0), Some(&carousel.preferences)),
//!     "#0F172A"
//! );
//! ```

pub mod error;

pub mod ai;
pub mod carousel;
pub mod export;
pub mod generation;
pub mod persistence;
pub mod settings;

#[cfg(test)]
mod testing;

// Re-exports for convenience
pub use error::{CarouselError, CarouselResult, ErrorKind};

pub use carousel::{
    AspectRatio, Carousel, DesignPreferences, DesignStyle, Direction, EditScope, PreferencesUpdate,
    Slide, SlideContent, SlidePart, SlideStyle, SlideUpdate, StyleChange, StyleField, TextStyle,
};

pub use ai::{ContentGenerator, VideoKeySelector};
pub use export::{export_carousel, ExportArchive, SlideRasterizer};
pub use generation::{BulkReport, GenerationRequest, Orchestrator, ProgressEvent, ProgressSink};
pub use persistence::{LocalStore, PersistenceGateway};
pub use settings::{AiModel, AppContext, AppSettings, BrandKit, UserProfile};

#[cfg(feature = "http")]
pub use ai::GeminiClient;

#[cfg(feature = "http")]
pub use persistence::SupabaseGateway;

#[cfg(feature = "raster")]
pub use export::FlatRasterizer;

#[cfg(feature = "wasm")]
pub use carousel::JsCarouselEditor;
