//! In-memory doubles shared by the unit tests.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::ai::ContentGenerator;
use crate::carousel::model::{
    AspectRatio, Carousel, DesignPreferences, PreferencesUpdate, Slide, SlideContent, SlidePart,
};
use crate::error::{CarouselError, CarouselResult};
use crate::export::{CaptureOptions, RenderedSlide, SlideRasterizer};
use crate::persistence::{CarouselRow, LocalStore, PersistenceGateway, SlideRow};
use crate::settings::AppSettings;

// =============================================================================
// GATEWAY
// =============================================================================

/// Gateway backed by an in-memory [`LocalStore`] that records what it was sent.
pub struct RecordingGateway {
    store: LocalStore,
    failing: AtomicBool,
    saves: AtomicUsize,
    slide_rows: Mutex<Vec<SlideRow>>,
}

impl RecordingGateway {
    pub fn new() -> Self {
        Self {
            store: LocalStore::in_memory(),
            failing: AtomicBool::new(false),
            saves: AtomicUsize::new(0),
            slide_rows: Mutex::new(Vec::new()),
        }
    }

    /// Makes every upsert fail until switched back.
    pub fn fail_saves(&self, fail: bool) {
        self.failing.store(fail, Ordering::SeqCst);
    }

    /// Number of carousel upserts received, failed ones included.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// Slide rows of the most recent slide upsert.
    pub fn slide_rows(&self) -> Vec<SlideRow> {
        self.slide_rows.lock().unwrap().clone()
    }

    pub fn stored(&self) -> Vec<Carousel> {
        self.store.carousels()
    }

    fn check(&self) -> CarouselResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            Err(CarouselError::persistence("offline"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl PersistenceGateway for RecordingGateway {
    async fn upsert_carousel(&self, row: &CarouselRow) -> CarouselResult<()> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        self.store.upsert_carousel(row).await
    }

    async fn upsert_slides(&self, rows: &[SlideRow]) -> CarouselResult<()> {
        self.check()?;
        *self.slide_rows.lock().unwrap() = rows.to_vec();
        self.store.upsert_slides(rows).await
    }

    async fn fetch_carousels(&self, owner_id: &str) -> CarouselResult<Vec<Carousel>> {
        self.store.fetch_carousels(owner_id).await
    }

    async fn delete_carousel(&self, id: &str) -> CarouselResult<()> {
        self.store.delete_carousel(id).await
    }

    async fn delete_all_carousels(&self, owner_id: &str) -> CarouselResult<()> {
        self.store.delete_all_carousels(owner_id).await
    }
}

// =============================================================================
// GENERATOR
// =============================================================================

type Hook = Box<dyn Fn(&str) + Send + Sync>;

/// Content generator with scripted answers.
///
/// Images and videos echo their prompt back inside the data URI so tests can
/// tell which slide a visual came from.
pub struct ScriptedGenerator {
    contents: Mutex<CarouselResult<Vec<SlideContent>>>,
    failing_prompts: Mutex<HashSet<String>>,
    calls: Mutex<Vec<String>>,
    suggestion: Mutex<PreferencesUpdate>,
    on_asset: Mutex<Option<Hook>>,
}

impl ScriptedGenerator {
    /// Answers content requests with the given slides.
    pub fn with_contents(contents: Vec<SlideContent>) -> Self {
        Self {
            contents: Mutex::new(Ok(contents)),
            failing_prompts: Mutex::new(HashSet::new()),
            calls: Mutex::new(Vec::new()),
            suggestion: Mutex::new(PreferencesUpdate::new()),
            on_asset: Mutex::new(None),
        }
    }

    /// Three slides with prompts `P1`..`P3`.
    pub fn three_slides() -> Self {
        Self::with_contents(
            (1..=3)
                .map(|i| SlideContent::new(format!("H{}", i), format!("B{}", i), format!("P{}", i)))
                .collect(),
        )
    }

    /// Makes content generation fail with `err`.
    pub fn failing_content(self, err: CarouselError) -> Self {
        *self.contents.lock().unwrap() = Err(err);
        self
    }

    /// Makes image and video requests for `prompt` fail.
    pub fn fail_prompt(self, prompt: &str) -> Self {
        self.failing_prompts.lock().unwrap().insert(prompt.to_string());
        self
    }

    pub fn with_suggestion(self, update: PreferencesUpdate) -> Self {
        *self.suggestion.lock().unwrap() = update;
        self
    }

    /// Runs `hook` with the prompt before each image/video answer.
    pub fn on_asset(&self, hook: impl Fn(&str) + Send + Sync + 'static) {
        *self.on_asset.lock().unwrap() = Some(Box::new(hook));
    }

    /// Operation names in call order, e.g. `image:P1`.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn asset(&self, kind: &str, mime: &str, prompt: &str) -> CarouselResult<String> {
        self.record(format!("{}:{}", kind, prompt));
        if let Some(hook) = self.on_asset.lock().unwrap().as_ref() {
            hook(prompt);
        }
        if self.failing_prompts.lock().unwrap().contains(prompt) {
            return Err(CarouselError::unknown(format!("{} failed", prompt)));
        }
        Ok(format!("data:{};base64,{}", mime, prompt))
    }
}

fn clone_result<T: Clone>(result: &CarouselResult<T>) -> CarouselResult<T> {
    match result {
        Ok(v) => Ok(v.clone()),
        Err(CarouselError::Configuration(m)) => Err(CarouselError::configuration(m.clone())),
        Err(CarouselError::QuotaExceeded { help_link }) => Err(CarouselError::QuotaExceeded {
            help_link: help_link.clone(),
        }),
        Err(e) => Err(CarouselError::unknown(e.to_string())),
    }
}

#[async_trait]
impl ContentGenerator for ScriptedGenerator {
    async fn generate_carousel_content(
        &self,
        _settings: &AppSettings,
        topic: &str,
        niche: &str,
        _preferences: &DesignPreferences,
    ) -> CarouselResult<Vec<SlideContent>> {
        self.record(format!("content:{}:{}", topic, niche));
        clone_result(&self.contents.lock().unwrap())
    }

    async fn generate_image(
        &self,
        _settings: &AppSettings,
        prompt: &str,
        _aspect_ratio: AspectRatio,
    ) -> CarouselResult<String> {
        self.asset("image", "image/png", prompt)
    }

    async fn generate_video(
        &self,
        _settings: &AppSettings,
        prompt: &str,
        _aspect_ratio: AspectRatio,
    ) -> CarouselResult<String> {
        self.asset("video", "video/mp4", prompt)
    }

    async fn edit_image(
        &self,
        _settings: &AppSettings,
        image_base64: &str,
        mime_type: &str,
        instruction: &str,
    ) -> CarouselResult<String> {
        self.record(format!("edit:{}", instruction));
        Ok(format!("data:{};base64,{}{}", mime_type, image_base64, "ED"))
    }

    async fn regenerate_slide_content(
        &self,
        _settings: &AppSettings,
        _carousel_title: &str,
        slide: &Slide,
        part: SlidePart,
    ) -> CarouselResult<String> {
        self.record(format!("regenerate:{}", part.as_str()));
        Ok(format!("new {} for {}", part.as_str(), slide.id))
    }

    async fn generate_caption(&self, _settings: &AppSettings, carousel: &Carousel) -> CarouselResult<String> {
        self.record("caption".to_string());
        Ok(format!("caption for {}", carousel.title))
    }

    async fn generate_thread(&self, _settings: &AppSettings, carousel: &Carousel) -> CarouselResult<String> {
        self.record("thread".to_string());
        Ok(format!("thread for {}", carousel.title))
    }

    async fn design_suggestion(
        &self,
        _settings: &AppSettings,
        _title: &str,
        _category: &str,
    ) -> CarouselResult<PreferencesUpdate> {
        self.record("suggest".to_string());
        Ok(self.suggestion.lock().unwrap().clone())
    }
}

// =============================================================================
// RASTERIZER
// =============================================================================

#[derive(Default)]
struct RasterState {
    captures: Vec<(String, CaptureOptions)>,
    open_captures: i64,
    hidden_videos: i64,
}

/// Rasterizer that records captures and returns placeholder bytes.
pub struct FakeRasterizer {
    nodes: Vec<RenderedSlide>,
    fail_on: Option<String>,
    state: Arc<Mutex<RasterState>>,
}

impl FakeRasterizer {
    /// Surface showing `ids` in the given order, all at `width`.
    pub fn new(ids: &[&str], width: u32) -> Self {
        Self {
            nodes: ids
                .iter()
                .map(|id| RenderedSlide {
                    slide_id: id.to_string(),
                    width,
                })
                .collect(),
            fail_on: None,
            state: Arc::new(Mutex::new(RasterState::default())),
        }
    }

    /// Fails every capture of `slide_id`.
    pub fn fail_on(mut self, slide_id: &str) -> Self {
        self.fail_on = Some(slide_id.to_string());
        self
    }

    pub fn captures(&self) -> Vec<(String, CaptureOptions)> {
        self.state.lock().unwrap().captures.clone()
    }

    /// True when every stripped decoration and hidden video was put back.
    pub fn is_restored(&self) -> bool {
        let state = self.state.lock().unwrap();
        state.open_captures == 0 && state.hidden_videos == 0
    }
}

#[async_trait]
impl SlideRasterizer for FakeRasterizer {
    async fn rendered_slides(&self) -> CarouselResult<Vec<RenderedSlide>> {
        Ok(self.nodes.clone())
    }

    async fn begin_capture(&self, _slide_id: &str) -> CarouselResult<()> {
        self.state.lock().unwrap().open_captures += 1;
        Ok(())
    }

    async fn end_capture(&self, _slide_id: &str) -> CarouselResult<()> {
        self.state.lock().unwrap().open_captures -= 1;
        Ok(())
    }

    async fn set_video_visible(&self, _slide_id: &str, visible: bool) -> CarouselResult<()> {
        let mut state = self.state.lock().unwrap();
        state.hidden_videos += if visible { -1 } else { 1 };
        Ok(())
    }

    async fn capture(&self, slide_id: &str, options: &CaptureOptions) -> CarouselResult<Vec<u8>> {
        self.state
            .lock()
            .unwrap()
            .captures
            .push((slide_id.to_string(), options.clone()));
        if self.fail_on.as_deref() == Some(slide_id) {
            return Err(CarouselError::unknown("capture failed"));
        }
        Ok(b"png".to_vec())
    }
}
