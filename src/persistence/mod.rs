//! Persistence gateway.
//!
//! Carousels are stored as two row kinds, mirroring the remote tables:
//! one carousel row (metadata + preferences) and one row per slide carrying
//! an explicit `order` index. The gateway only ever receives snapshots.

pub mod local;

#[cfg(feature = "http")]
pub mod supabase;

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::carousel::model::{is_canonical_uuid, new_id, Carousel, DesignPreferences, Slide, SlideStyle};
use crate::error::{CarouselError, CarouselResult};

pub use local::LocalStore;

#[cfg(feature = "http")]
pub use supabase::SupabaseGateway;

/// Statistic shown when there is no history.
pub const NO_CATEGORY: &str = "N/A";

// =============================================================================
// ROWS
// =============================================================================

/// `carousels` table row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CarouselRow {
    pub id: String,
    pub user_id: String,
    pub title: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub preferences: DesignPreferences,
    pub created_at: DateTime<Utc>,
}

/// `slides` table row. `styles` holds every override except the visual,
/// which has its own column.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SlideRow {
    pub id: String,
    pub carousel_id: String,
    #[serde(default)]
    pub headline: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub visual_prompt: String,
    #[serde(default)]
    pub background_image: Option<String>,
    #[serde(default)]
    pub styles: SlideStyle,
    pub order: i64,
}

/// Splits a carousel snapshot into rows. Slide `order` is the slide's position.
pub fn to_rows(owner_id: &str, carousel: &Carousel) -> (CarouselRow, Vec<SlideRow>) {
    let row = CarouselRow {
        id: carousel.id.clone(),
        user_id: owner_id.to_string(),
        title: carousel.title.clone(),
        category: carousel.category.clone(),
        preferences: carousel.preferences.clone(),
        created_at: carousel.created_at,
    };

    let slides = carousel
        .slides
        .iter()
        .enumerate()
        .map(|(index, slide)| {
            let mut styles = slide.style.clone();
            let background_image = styles.background_image.take();
            SlideRow {
                id: slide.id.clone(),
                carousel_id: carousel.id.clone(),
                headline: slide.headline.clone(),
                body: slide.body.clone(),
                visual_prompt: slide.visual_prompt.clone(),
                background_image,
                styles,
                order: index as i64,
            }
        })
        .collect();

    (row, slides)
}

/// Reassembles a carousel, ordering slides by their `order` column.
pub fn from_rows(row: CarouselRow, mut slides: Vec<SlideRow>) -> Carousel {
    slides.sort_by_key(|s| s.order);
    let slides = slides
        .into_iter()
        .map(|s| {
            let mut style = s.styles;
            if s.background_image.is_some() {
                style.background_image = s.background_image;
            }
            Slide {
                id: s.id,
                headline: s.headline,
                body: s.body,
                visual_prompt: s.visual_prompt,
                style,
            }
        })
        .collect();

    Carousel {
        id: row.id,
        title: row.title,
        created_at: row.created_at,
        category: row.category,
        preferences: row.preferences,
        slides,
    }
}

// =============================================================================
// GATEWAY
// =============================================================================

/// Durable carousel storage. Upserts are idempotent by `id`.
#[async_trait]
pub trait PersistenceGateway: Send + Sync {
    async fn upsert_carousel(&self, row: &CarouselRow) -> CarouselResult<()>;

    async fn upsert_slides(&self, rows: &[SlideRow]) -> CarouselResult<()>;

    /// All carousels of `owner_id`, newest first, slides in `order`.
    async fn fetch_carousels(&self, owner_id: &str) -> CarouselResult<Vec<Carousel>>;

    async fn delete_carousel(&self, id: &str) -> CarouselResult<()>;

    async fn delete_all_carousels(&self, owner_id: &str) -> CarouselResult<()>;
}

/// Saves a carousel snapshot: carousel row first, then its slide rows.
///
/// Any failure is reported as a persistence error.
pub async fn save_carousel(
    gateway: &dyn PersistenceGateway,
    owner_id: &str,
    carousel: &Carousel,
) -> CarouselResult<()> {
    let (row, slides) = to_rows(owner_id, carousel);
    debug!(carousel_id = %carousel.id, slides = slides.len(), "saving carousel");

    let result = async {
        gateway.upsert_carousel(&row).await?;
        if !slides.is_empty() {
            gateway.upsert_slides(&slides).await?;
        }
        Ok::<(), CarouselError>(())
    }
    .await;

    result.map_err(|e| {
        error!(carousel_id = %carousel.id, error = %e, "failed to save carousel");
        match e {
            CarouselError::Persistence(msg) => CarouselError::Persistence(msg),
            other => CarouselError::persistence(other.to_string()),
        }
    })
}

/// Most frequent category in the history, `"N/A"` when empty.
///
/// Ties go to the category seen last for the first time.
pub fn most_used_category(history: &[Carousel]) -> String {
    let mut counts: Vec<(&str, usize)> = Vec::new();
    for carousel in history {
        match counts.iter_mut().find(|(c, _)| *c == carousel.category) {
            Some((_, n)) => *n += 1,
            None => counts.push((carousel.category.as_str(), 1)),
        }
    }

    counts
        .into_iter()
        .reduce(|best, next| if best.1 > next.1 { best } else { next })
        .map(|(category, _)| category.to_string())
        .unwrap_or_else(|| NO_CATEGORY.to_string())
}

/// Replaces carousel and slide IDs that are not hyphenated UUIDs.
pub fn normalize_ids(carousel: &Carousel) -> Carousel {
    let mut next = carousel.clone();
    if !is_canonical_uuid(&next.id) {
        next.id = new_id();
    }
    for slide in &mut next.slides {
        if !is_canonical_uuid(&slide.id) {
            slide.id = new_id();
        }
    }
    next
}

/// Groups slide rows by carousel ID.
pub(crate) fn group_slides(rows: &[SlideRow]) -> HashMap<&str, Vec<&SlideRow>> {
    let mut grouped: HashMap<&str, Vec<&SlideRow>> = HashMap::new();
    for row in rows {
        grouped.entry(row.carousel_id.as_str()).or_default().push(row);
    }
    grouped
}
