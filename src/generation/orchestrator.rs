//! Generation orchestrator and editing session.
//!
//! The session owns the single active carousel. Every change is derived from
//! the latest value under the session lock, and the lock is never held across
//! an await. Long runs carry an epoch token: starting another run, opening a
//! different carousel or closing the editor bumps the epoch, and results from
//! an older epoch are dropped instead of applied.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, info, warn};

use super::progress::{AssetKind, NoProgress, ProgressEvent, ProgressSink};
use crate::ai::{ensure_api_key, ConfiguredKey, ContentGenerator, VideoKeySelector};
use crate::carousel::data_uri;
use crate::carousel::model::{
    Carousel, DesignPreferences, PreferencesUpdate, SlidePart, SlideUpdate, StyleField,
};
use crate::carousel::ops::{self, Direction, EditScope, StyleChange, DEFAULT_CATEGORY};
use crate::error::{CarouselError, CarouselResult};
use crate::export::{export_carousel, SlideRasterizer};
use crate::persistence::{save_carousel, PersistenceGateway};
use crate::settings::{AppContext, AppSettings, UserProfile};

// =============================================================================
// SESSION STATE
// =============================================================================

/// Where the session is in a generation run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RunState {
    #[default]
    Idle,
    GeneratingContent,
    GeneratingAssets,
    /// The last action failed; see [`Orchestrator::last_error`].
    Error,
}

#[derive(Debug, Default)]
struct Session {
    carousel: Option<Carousel>,
    selected_slide: Option<String>,
    topic: String,
    state: RunState,
    epoch: u64,
    last_error: Option<String>,
    message: Option<String>,
    settings: AppSettings,
}

impl Session {
    fn begin_epoch(&mut self) -> u64 {
        self.epoch += 1;
        self.epoch
    }
}

/// Input of a full generation run.
#[derive(Debug, Clone, Default)]
pub struct GenerationRequest {
    pub topic: String,
    /// Falls back to the profile's first niche, then `"General"`.
    pub niche: Option<String>,
    pub preferences: DesignPreferences,
    /// Also generate an image for every slide.
    pub magic_create: bool,
}

impl GenerationRequest {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            ..Default::default()
        }
    }

    pub fn with_niche(mut self, niche: impl Into<String>) -> Self {
        self.niche = Some(niche.into());
        self
    }

    pub fn with_preferences(mut self, preferences: DesignPreferences) -> Self {
        self.preferences = preferences;
        self
    }

    pub fn with_magic_create(mut self, magic_create: bool) -> Self {
        self.magic_create = magic_create;
        self
    }
}

/// Outcome of a bulk asset run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BulkReport {
    pub succeeded: Vec<String>,
    /// `(slide_id, message)` of every slide that kept its previous visual.
    pub failed: Vec<(String, String)>,
    /// A newer run or navigation took over; remaining slides were skipped.
    pub superseded: bool,
    /// The final save went through.
    pub persisted: bool,
}

// =============================================================================
// ORCHESTRATOR
// =============================================================================

/// Drives generation runs and user edits against one active carousel.
pub struct Orchestrator {
    generator: Arc<dyn ContentGenerator>,
    gateway: Arc<dyn PersistenceGateway>,
    key_selector: Arc<dyn VideoKeySelector>,
    progress: Arc<dyn ProgressSink>,
    owner_id: String,
    profile: UserProfile,
    session: Mutex<Session>,
}

impl Orchestrator {
    pub fn new(
        generator: Arc<dyn ContentGenerator>,
        gateway: Arc<dyn PersistenceGateway>,
        owner_id: impl Into<String>,
        settings: AppSettings,
    ) -> Self {
        Self {
            generator,
            gateway,
            key_selector: Arc::new(ConfiguredKey),
            progress: Arc::new(NoProgress),
            owner_id: owner_id.into(),
            profile: UserProfile::default(),
            session: Mutex::new(Session {
                settings,
                ..Default::default()
            }),
        }
    }

    pub fn with_profile(mut self, profile: UserProfile) -> Self {
        self.profile = profile;
        self
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_key_selector(mut self, selector: Arc<dyn VideoKeySelector>) -> Self {
        self.key_selector = selector;
        self
    }

    fn lock(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(|e| e.into_inner())
    }

    // ===== Accessors =====

    pub fn carousel(&self) -> Option<Carousel> {
        self.lock().carousel.clone()
    }

    pub fn selected_slide(&self) -> Option<String> {
        self.lock().selected_slide.clone()
    }

    /// Selects a slide of the current carousel. Unknown IDs are ignored.
    pub fn select_slide(&self, slide_id: &str) {
        let mut session = self.lock();
        let known = session
            .carousel
            .as_ref()
            .is_some_and(|c| c.slide(slide_id).is_some());
        if known {
            session.selected_slide = Some(slide_id.to_string());
        } else {
            warn!(slide_id, "select_slide: unknown slide id");
        }
    }

    pub fn state(&self) -> RunState {
        self.lock().state
    }

    pub fn epoch(&self) -> u64 {
        self.lock().epoch
    }

    /// User-facing message of the last failure.
    pub fn last_error(&self) -> Option<String> {
        self.lock().last_error.clone()
    }

    /// Progress message of the running step.
    pub fn message(&self) -> Option<String> {
        self.lock().message.clone()
    }

    /// Clears the error and returns to idle.
    pub fn dismiss_error(&self) {
        let mut session = self.lock();
        session.last_error = None;
        if session.state == RunState::Error {
            session.state = RunState::Idle;
        }
    }

    pub fn settings(&self) -> AppSettings {
        self.lock().settings.clone()
    }

    /// Replaces the settings used by subsequent requests.
    pub fn set_settings(&self, settings: AppSettings) {
        self.lock().settings = settings;
    }

    // ===== Internal helpers =====

    fn emit(&self, event: ProgressEvent) {
        self.lock().message = match &event {
            ProgressEvent::Done => None,
            other => Some(other.to_string()),
        };
        self.progress.on_event(&event);
    }

    fn is_current(&self, epoch: u64) -> bool {
        self.lock().epoch == epoch
    }

    /// Records `err` as the session error and hands it back.
    fn fail(&self, err: CarouselError) -> CarouselError {
        let mut session = self.lock();
        session.last_error = Some(err.to_string());
        session.state = RunState::Error;
        err
    }

    fn current(&self) -> CarouselResult<(Carousel, AppSettings)> {
        let session = self.lock();
        let carousel = session.carousel.clone().ok_or(CarouselError::NoCarousel)?;
        Ok((carousel, session.settings.clone()))
    }

    fn ready(&self) -> CarouselResult<(Carousel, AppSettings)> {
        let (carousel, settings) = self.current()?;
        ensure_api_key(&settings).map_err(|e| self.fail(e))?;
        Ok((carousel, settings))
    }

    /// Applies `change` to the latest carousel when `epoch` is still active.
    fn apply_if_current(&self, epoch: u64, change: impl FnOnce(&Carousel) -> Carousel) -> Option<Carousel> {
        let mut session = self.lock();
        if session.epoch != epoch {
            return None;
        }
        let next = change(session.carousel.as_ref()?);
        session.carousel = Some(next.clone());
        Some(next)
    }

    /// Applies `change` to the latest carousel regardless of runs in flight.
    fn apply(&self, change: impl FnOnce(&Carousel) -> Carousel) -> CarouselResult<Carousel> {
        let mut session = self.lock();
        let current = session.carousel.as_ref().ok_or(CarouselError::NoCarousel)?;
        let next = change(current);
        session.carousel = Some(next.clone());
        Ok(next)
    }

    async fn persist(&self, carousel: &Carousel) -> CarouselResult<()> {
        save_carousel(self.gateway.as_ref(), &self.owner_id, carousel)
            .await
            .map_err(|e| self.fail(e))
    }

    /// Applies an edit then saves it. A failed save keeps the edit.
    async fn edit(&self, change: impl FnOnce(&Carousel) -> Carousel) -> CarouselResult<Carousel> {
        let next = self.apply(change)?;
        self.persist(&next).await?;
        Ok(next)
    }

    fn resolve_niche(&self, niche: Option<&str>) -> String {
        niche
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .or_else(|| self.profile.primary_niche())
            .unwrap_or(DEFAULT_CATEGORY)
            .to_string()
    }

    // ===== Generation =====

    /// Full generation: writes the slides, installs and saves the carousel,
    /// then optionally generates every image.
    ///
    /// Content failure aborts with no carousel shown. A failed save is
    /// recorded as the session error but does not stop the run.
    pub async fn generate(&self, request: GenerationRequest) -> CarouselResult<Carousel> {
        let settings = self.settings();
        ensure_api_key(&settings).map_err(|e| self.fail(e))?;

        let epoch = {
            let mut session = self.lock();
            session.carousel = None;
            session.selected_slide = None;
            session.topic = request.topic.clone();
            session.last_error = None;
            session.state = RunState::GeneratingContent;
            session.begin_epoch()
        };
        self.emit(ProgressEvent::Content {
            topic: request.topic.clone(),
        });

        let niche = self.resolve_niche(request.niche.as_deref());
        debug!(topic = %request.topic, niche = %niche, epoch, "generating carousel content");

        let contents = match self
            .generator
            .generate_carousel_content(&settings, &request.topic, &niche, &request.preferences)
            .await
        {
            Ok(contents) => contents,
            Err(e) => {
                self.emit(ProgressEvent::Done);
                if !self.is_current(epoch) {
                    return Err(e);
                }
                return Err(self.fail(e));
            }
        };

        let carousel = ops::create_carousel(&request.topic, contents, &niche, request.preferences);
        {
            let mut session = self.lock();
            if session.epoch != epoch {
                debug!(carousel_id = %carousel.id, "discarding content from a superseded run");
                return Ok(carousel);
            }
            session.selected_slide = carousel.slides.first().map(|s| s.id.clone());
            session.carousel = Some(carousel.clone());
        }
        info!(carousel_id = %carousel.id, slides = carousel.slides.len(), "carousel created");

        if let Err(e) = self.persist(&carousel).await {
            warn!(carousel_id = %carousel.id, error = %e, "initial save failed, continuing");
        }

        if request.magic_create {
            self.run_bulk(epoch, AssetKind::Image, &settings).await;
        }

        self.finish(epoch);
        Ok(self.carousel().unwrap_or(carousel))
    }

    /// Generates an image for every slide, one slide at a time.
    pub async fn generate_all_images(&self) -> CarouselResult<BulkReport> {
        let (_, settings) = self.ready()?;
        self.dismiss_error();
        let epoch = self.lock().begin_epoch();
        let report = self.run_bulk(epoch, AssetKind::Image, &settings).await;
        self.finish(epoch);
        Ok(report)
    }

    /// Generates a video for every slide, one slide at a time.
    pub async fn generate_all_videos(&self) -> CarouselResult<BulkReport> {
        let (_, settings) = self.ready()?;
        self.dismiss_error();
        let epoch = self.lock().begin_epoch();
        self.ensure_video_key().await;
        let report = self.run_bulk(epoch, AssetKind::Video, &settings).await;
        self.finish(epoch);
        Ok(report)
    }

    async fn ensure_video_key(&self) {
        match self.key_selector.has_selected_key().await {
            Ok(true) => {}
            Ok(false) => {
                if let Err(e) = self.key_selector.select_key().await {
                    warn!(error = %e, "video key selection failed");
                }
            }
            Err(e) => warn!(error = %e, "video key helper not available"),
        }
    }

    fn finish(&self, epoch: u64) {
        {
            let mut session = self.lock();
            if session.epoch == epoch && session.state != RunState::Error {
                session.state = RunState::Idle;
            }
        }
        self.emit(ProgressEvent::Done);
    }

    /// Per-slide asset loop. Slide failures are logged and skipped; results
    /// land in the latest carousel only while `epoch` is still active.
    async fn run_bulk(&self, epoch: u64, kind: AssetKind, settings: &AppSettings) -> BulkReport {
        let mut report = BulkReport::default();

        let snapshot = {
            let mut session = self.lock();
            if session.epoch != epoch {
                report.superseded = true;
                return report;
            }
            let Some(carousel) = session.carousel.clone() else {
                return report;
            };
            session.state = RunState::GeneratingAssets;
            carousel
        };
        let aspect_ratio = snapshot.preferences.aspect_ratio;
        let total = snapshot.slides.len();

        for (i, slide) in snapshot.slides.iter().enumerate() {
            let index = i + 1;
            if !self.is_current(epoch) {
                report.superseded = true;
                break;
            }
            self.emit(ProgressEvent::Asset {
                kind,
                index,
                total,
                slide_id: slide.id.clone(),
            });

            let result = match kind {
                AssetKind::Image => {
                    self.generator
                        .generate_image(settings, &slide.visual_prompt, aspect_ratio)
                        .await
                }
                AssetKind::Video => self
                    .generator
                    .generate_video(settings, &slide.visual_prompt, aspect_ratio)
                    .await
                    .map_err(CarouselError::into_video_error),
            };

            let succeeded = match result {
                Ok(uri) => {
                    let applied = self.apply_if_current(epoch, |current| {
                        ops::set_slide_visual(current, &slide.id, Some(uri))
                    });
                    if applied.is_none() {
                        debug!(slide_id = %slide.id, index, "discarding asset from a superseded run");
                        report.superseded = true;
                        break;
                    }
                    report.succeeded.push(slide.id.clone());
                    true
                }
                Err(e) => {
                    warn!(slide_id = %slide.id, index, error = %e, "{} generation failed, skipping slide", kind.as_str());
                    report.failed.push((slide.id.clone(), e.to_string()));
                    false
                }
            };

            self.emit(ProgressEvent::AssetDone {
                kind,
                index,
                total,
                slide_id: slide.id.clone(),
                succeeded,
            });
        }

        if !report.superseded {
            if let Some(latest) = self.carousel() {
                report.persisted = self.persist(&latest).await.is_ok();
            }
        }
        info!(
            succeeded = report.succeeded.len(),
            failed = report.failed.len(),
            superseded = report.superseded,
            "bulk {} run finished",
            kind.as_str()
        );
        report
    }

    /// Generates an image for one slide.
    pub async fn generate_slide_image(&self, slide_id: &str) -> CarouselResult<Carousel> {
        let (carousel, settings) = self.ready()?;
        let slide = carousel
            .slide(slide_id)
            .ok_or_else(|| CarouselError::slide_not_found(slide_id))?;
        self.dismiss_error();

        let uri = self
            .generator
            .generate_image(&settings, &slide.visual_prompt, carousel.preferences.aspect_ratio)
            .await
            .map_err(|e| self.fail(e))?;
        self.set_slide_visual(slide_id, Some(uri)).await
    }

    /// Generates a video for one slide.
    pub async fn generate_slide_video(&self, slide_id: &str) -> CarouselResult<Carousel> {
        let (carousel, settings) = self.ready()?;
        let slide = carousel
            .slide(slide_id)
            .ok_or_else(|| CarouselError::slide_not_found(slide_id))?;
        self.ensure_video_key().await;
        self.dismiss_error();
        self.emit(ProgressEvent::Asset {
            kind: AssetKind::Video,
            index: 1,
            total: 1,
            slide_id: slide_id.to_string(),
        });

        let result = self
            .generator
            .generate_video(&settings, &slide.visual_prompt, carousel.preferences.aspect_ratio)
            .await
            .map_err(CarouselError::into_video_error);
        self.emit(ProgressEvent::Done);
        let uri = result.map_err(|e| self.fail(e))?;
        self.set_slide_visual(slide_id, Some(uri)).await
    }

    /// Edits a slide's own image. Slides without a `data:image` visual are left alone.
    pub async fn edit_slide_image(&self, slide_id: &str, instruction: &str) -> CarouselResult<Carousel> {
        let (carousel, settings) = self.current()?;
        let slide = carousel
            .slide(slide_id)
            .ok_or_else(|| CarouselError::slide_not_found(slide_id))?;
        let Some(visual) = slide.background_image().filter(|v| v.starts_with("data:image")) else {
            debug!(slide_id, "slide has no image to edit");
            return Ok(carousel);
        };
        if instruction.trim().is_empty() {
            return Ok(carousel);
        }
        ensure_api_key(&settings).map_err(|e| self.fail(e))?;
        self.dismiss_error();

        let mime_type = data_uri::mime_type(visual);
        let payload = data_uri::payload(visual).map_err(|e| self.fail(e))?;
        let uri = self
            .generator
            .edit_image(&settings, payload, &mime_type, instruction)
            .await
            .map_err(|e| self.fail(e))?;
        self.set_slide_visual(slide_id, Some(uri)).await
    }

    /// Rewrites a slide's headline or body.
    pub async fn regenerate_content(&self, slide_id: &str, part: SlidePart) -> CarouselResult<Carousel> {
        let (carousel, settings) = self.ready()?;
        let slide = carousel
            .slide(slide_id)
            .ok_or_else(|| CarouselError::slide_not_found(slide_id))?;
        self.dismiss_error();

        let text = self
            .generator
            .regenerate_slide_content(&settings, &carousel.title, slide, part)
            .await
            .map_err(|e| self.fail(e))?;
        self.update_slide(slide_id, &SlideUpdate::new().with_part(part, text))
            .await
    }

    pub async fn generate_caption(&self) -> CarouselResult<String> {
        let (carousel, settings) = self.ready()?;
        self.dismiss_error();
        self.generator
            .generate_caption(&settings, &carousel)
            .await
            .map_err(|e| self.fail(e))
    }

    pub async fn generate_thread(&self) -> CarouselResult<String> {
        let (carousel, settings) = self.ready()?;
        self.dismiss_error();
        self.generator
            .generate_thread(&settings, &carousel)
            .await
            .map_err(|e| self.fail(e))
    }

    /// Asks for a design suggestion and merges it into the preferences.
    pub async fn suggest_design(&self) -> CarouselResult<Carousel> {
        let (carousel, settings) = self.current()?;
        self.dismiss_error();
        let suggestion = self
            .generator
            .design_suggestion(&settings, &carousel.title, &carousel.category)
            .await
            .map_err(|e| self.fail(e))?;
        self.update_preferences(&suggestion).await
    }

    // ===== Edits =====

    pub async fn update_slide(&self, slide_id: &str, update: &SlideUpdate) -> CarouselResult<Carousel> {
        self.edit(|c| ops::update_slide(c, slide_id, update)).await
    }

    /// Merges `update` into the preferences.
    ///
    /// Before any carousel exists this creates an unsaved draft titled with the
    /// current topic.
    pub async fn update_preferences(&self, update: &PreferencesUpdate) -> CarouselResult<Carousel> {
        let draft = {
            let mut session = self.lock();
            if session.carousel.is_some() {
                None
            } else {
                let category = self.profile.primary_niche().unwrap_or(DEFAULT_CATEGORY);
                let draft = ops::update_preferences(None, update, &session.topic).with_category(category);
                session.carousel = Some(draft.clone());
                Some(draft)
            }
        };
        match draft {
            Some(draft) => Ok(draft),
            None => self.edit(|c| ops::update_preferences(Some(c), update, &c.title)).await,
        }
    }

    pub async fn clear_slide_overrides(&self, field: StyleField) -> CarouselResult<Carousel> {
        self.edit(|c| ops::clear_slide_overrides(c, field)).await
    }

    pub async fn move_slide(&self, slide_id: &str, direction: Direction) -> CarouselResult<Carousel> {
        self.edit(|c| ops::move_slide(c, slide_id, direction)).await
    }

    /// Applies the brand kit from the current settings. No kit, no change.
    pub async fn apply_brand_kit(&self) -> CarouselResult<Carousel> {
        let Some(kit) = self.settings().brand_kit else {
            return self.current().map(|(c, _)| c);
        };
        self.edit(|c| ops::apply_brand_kit(c, &kit)).await
    }

    pub async fn apply_style(&self, scope: &EditScope, change: &StyleChange) -> CarouselResult<Carousel> {
        self.edit(|c| ops::apply_style(c, scope, change)).await
    }

    /// Uploads (`Some`) or removes (`None`) a slide's own visual.
    pub async fn set_slide_visual(&self, slide_id: &str, visual: Option<String>) -> CarouselResult<Carousel> {
        self.edit(|c| ops::set_slide_visual(c, slide_id, visual)).await
    }

    // ===== Navigation =====

    /// Makes `carousel` the active one and selects its first slide.
    pub fn open_carousel(&self, carousel: Carousel) {
        let mut session = self.lock();
        session.begin_epoch();
        session.selected_slide = carousel.slides.first().map(|s| s.id.clone());
        session.topic = carousel.title.clone();
        session.carousel = Some(carousel);
        session.state = RunState::Idle;
        session.message = None;
    }

    /// Drops the active carousel. Runs in flight stop applying results.
    pub fn start_new(&self) {
        let mut session = self.lock();
        session.begin_epoch();
        session.carousel = None;
        session.selected_slide = None;
        session.topic.clear();
        session.state = RunState::Idle;
        session.message = None;
    }

    /// Saves the active carousel, then drops it.
    pub async fn close(&self) -> CarouselResult<()> {
        let current = self.carousel();
        self.start_new();
        match current {
            Some(carousel) => self.persist(&carousel).await,
            None => Ok(()),
        }
    }

    // ===== History =====

    /// Saved carousels, newest first.
    pub async fn history(&self) -> CarouselResult<Vec<Carousel>> {
        self.gateway
            .fetch_carousels(&self.owner_id)
            .await
            .map_err(|e| self.fail(e))
    }

    /// Opens a saved carousel by ID.
    pub async fn open_saved(&self, carousel_id: &str) -> CarouselResult<Carousel> {
        let carousel = self
            .history()
            .await?
            .into_iter()
            .find(|c| c.id == carousel_id)
            .ok_or_else(|| self.fail(CarouselError::unknown(format!("Carousel not found: {}", carousel_id))))?;
        self.open_carousel(carousel.clone());
        Ok(carousel)
    }

    pub async fn delete_carousel(&self, carousel_id: &str) -> CarouselResult<()> {
        self.gateway
            .delete_carousel(carousel_id)
            .await
            .map_err(|e| self.fail(e))?;
        let mut session = self.lock();
        if session.carousel.as_ref().is_some_and(|c| c.id == carousel_id) {
            session.begin_epoch();
            session.carousel = None;
            session.selected_slide = None;
        }
        Ok(())
    }

    pub async fn clear_history(&self) -> CarouselResult<()> {
        self.gateway
            .delete_all_carousels(&self.owner_id)
            .await
            .map_err(|e| self.fail(e))
    }

    // ===== Export =====

    /// Exports the active carousel into `out_dir` and counts the download.
    pub async fn download(
        &self,
        rasterizer: &dyn SlideRasterizer,
        out_dir: &Path,
        context: &mut AppContext,
    ) -> CarouselResult<PathBuf> {
        let (carousel, _) = self.current()?;
        self.dismiss_error();
        let archive = export_carousel(&carousel, rasterizer)
            .await
            .map_err(|e| self.fail(e))?;
        let path = archive
            .write_to(out_dir)
            .map_err(|e| self.fail(CarouselError::export(e.to_string())))?;
        match context.record_download() {
            Ok(count) => info!(path = %path.display(), downloads = count, "carousel downloaded"),
            Err(e) => warn!(path = %path.display(), error = %e, "carousel downloaded, counter not saved"),
        }
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::carousel::model::{SlideContent, TextStyle};
    use crate::error::ErrorKind;
    use crate::persistence::from_rows;
    use crate::settings::BrandKit;
    use crate::testing::{FakeRasterizer, RecordingGateway, ScriptedGenerator};
    use tempfile::TempDir;

    fn keyed() -> AppSettings {
        AppSettings::default().with_api_key("key")
    }

    fn setup(generator: ScriptedGenerator) -> (Arc<ScriptedGenerator>, Arc<RecordingGateway>, Orchestrator) {
        let generator = Arc::new(generator);
        let gateway = Arc::new(RecordingGateway::new());
        let orchestrator = Orchestrator::new(generator.clone(), gateway.clone(), "user-1", keyed());
        (generator, gateway, orchestrator)
    }

    #[tokio::test]
    async fn test_generate_installs_and_persists() {
        let (generator, gateway, orch) = setup(ScriptedGenerator::three_slides());
        let carousel = orch
            .generate(GenerationRequest::new("Sleep").with_niche("Health"))
            .await
            .unwrap();

        assert_eq!(carousel.title, "Sleep");
        assert_eq!(carousel.category, "Health");
        assert_eq!(carousel.slides.len(), 3);
        assert_eq!(orch.selected_slide(), Some(carousel.slides[0].id.clone()));
        assert_eq!(orch.state(), RunState::Idle);
        assert_eq!(gateway.save_count(), 1);
        assert_eq!(generator.calls(), vec!["content:Sleep:Health"]);
    }

    #[tokio::test]
    async fn test_niche_falls_back_to_profile_then_general() {
        let (generator, _, orch) = setup(ScriptedGenerator::three_slides());
        let orch = orch.with_profile(UserProfile {
            name: "A".to_string(),
            niche: vec!["Travel".to_string()],
        });
        orch.generate(GenerationRequest::new("T")).await.unwrap();

        let (generator2, _, orch2) = setup(ScriptedGenerator::three_slides());
        orch2.generate(GenerationRequest::new("T").with_niche("  ")).await.unwrap();

        assert_eq!(generator.calls()[0], "content:T:Travel");
        assert_eq!(generator2.calls()[0], "content:T:General");
    }

    #[tokio::test]
    async fn test_missing_key_fails_fast() {
        let generator = Arc::new(ScriptedGenerator::three_slides());
        let gateway = Arc::new(RecordingGateway::new());
        let orch = Orchestrator::new(generator.clone(), gateway.clone(), "u", AppSettings::default());

        let err = orch.generate(GenerationRequest::new("T")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert_eq!(orch.state(), RunState::Error);
        assert_eq!(orch.last_error(), Some(err.to_string()));
        assert!(generator.calls().is_empty());
        assert_eq!(gateway.save_count(), 0);
    }

    #[tokio::test]
    async fn test_content_failure_shows_no_carousel() {
        let generator = ScriptedGenerator::three_slides().failing_content(CarouselError::QuotaExceeded {
            help_link: "https://example.com".to_string(),
        });
        let (_, gateway, orch) = setup(generator);

        let err = orch.generate(GenerationRequest::new("T")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::QuotaExceeded);
        assert!(orch.carousel().is_none());
        assert!(orch.last_error().unwrap().contains("https://example.com"));
        assert_eq!(gateway.save_count(), 0);
    }

    #[tokio::test]
    async fn test_bulk_images_absorb_single_failure() {
        let (_, gateway, orch) = setup(ScriptedGenerator::three_slides().fail_prompt("P2"));
        let created = orch.generate(GenerationRequest::new("T")).await.unwrap();

        let report = orch.generate_all_images().await.unwrap();
        assert_eq!(report.succeeded, vec![created.slides[0].id.clone(), created.slides[2].id.clone()]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, created.slides[1].id);
        assert!(report.persisted);
        assert!(!report.superseded);

        let carousel = orch.carousel().unwrap();
        assert_eq!(carousel.slides[0].background_image(), Some("data:image/png;base64,P1"));
        assert_eq!(carousel.slides[1].background_image(), None);
        assert_eq!(carousel.slides[2].background_image(), Some("data:image/png;base64,P3"));
        assert!(orch.last_error().is_none());
        // initial save + final save
        assert_eq!(gateway.save_count(), 2);
        assert_eq!(gateway.stored()[0], carousel);
    }

    #[tokio::test]
    async fn test_magic_create_runs_images() {
        let (generator, gateway, orch) = setup(ScriptedGenerator::three_slides());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let orch = orch.with_progress(Arc::new(move |e: &ProgressEvent| {
            sink.lock().unwrap().push(e.to_string())
        }));

        let carousel = orch
            .generate(GenerationRequest::new("T").with_magic_create(true))
            .await
            .unwrap();
        assert!(carousel.slides.iter().all(|s| s.background_image().is_some()));
        assert_eq!(generator.calls().len(), 4);
        assert_eq!(gateway.save_count(), 2);

        let seen = seen.lock().unwrap();
        assert!(seen.contains(&"Generating image 2 of 3".to_string()));
        assert_eq!(seen.last().map(String::as_str), Some("Done"));
        assert_eq!(orch.message(), None);
    }

    #[tokio::test]
    async fn test_superseded_run_discards_results() {
        let (generator, gateway, orch) = setup(ScriptedGenerator::three_slides());
        let orch = Arc::new(orch);
        orch.generate(GenerationRequest::new("T")).await.unwrap();
        let saves_before = gateway.save_count();

        let handle = orch.clone();
        generator.on_asset(move |prompt| {
            if prompt == "P2" {
                handle.start_new();
            }
        });

        let report = orch.generate_all_images().await.unwrap();
        assert!(report.superseded);
        assert_eq!(report.succeeded.len(), 1);
        assert!(!report.persisted);
        assert!(orch.carousel().is_none());
        assert_eq!(gateway.save_count(), saves_before);
        // slide 3 never requested
        assert!(!generator.calls().contains(&"image:P3".to_string()));
    }

    #[tokio::test]
    async fn test_user_edit_during_run_is_kept() {
        let (generator, _, orch) = setup(ScriptedGenerator::three_slides());
        let orch = Arc::new(orch);
        let created = orch.generate(GenerationRequest::new("T")).await.unwrap();

        let handle = orch.clone();
        let edited = created.slides[2].id.clone();
        generator.on_asset(move |prompt| {
            if prompt == "P1" {
                handle
                    .apply(|c| ops::update_slide(c, &edited, &SlideUpdate::new().with_headline("mine")))
                    .unwrap();
            }
        });

        orch.generate_all_images().await.unwrap();
        let carousel = orch.carousel().unwrap();
        assert_eq!(carousel.slides[2].headline, "mine");
        assert!(carousel.slides[2].background_image().is_some());
    }

    #[tokio::test]
    async fn test_bulk_videos_classify_and_absorb() {
        let (generator, _, orch) = setup(ScriptedGenerator::three_slides().fail_prompt("P1"));
        orch.generate(GenerationRequest::new("T")).await.unwrap();

        let report = orch.generate_all_videos().await.unwrap();
        assert_eq!(report.succeeded.len(), 2);
        let carousel = orch.carousel().unwrap();
        assert_eq!(carousel.slides[1].background_image(), Some("data:video/mp4;base64,P2"));
        assert!(generator.calls().contains(&"video:P3".to_string()));
    }

    #[tokio::test]
    async fn test_single_slide_failure_surfaces() {
        let (_, _, orch) = setup(ScriptedGenerator::three_slides().fail_prompt("P1"));
        let created = orch.generate(GenerationRequest::new("T")).await.unwrap();

        let err = orch.generate_slide_image(&created.slides[0].id).await.unwrap_err();
        assert_eq!(orch.last_error(), Some(err.to_string()));
        assert_eq!(orch.state(), RunState::Error);

        orch.dismiss_error();
        assert_eq!(orch.state(), RunState::Idle);
        let next = orch.generate_slide_image(&created.slides[1].id).await.unwrap();
        assert!(next.slides[1].background_image().is_some());
    }

    #[tokio::test]
    async fn test_edit_image_requires_image_visual() {
        let (generator, _, orch) = setup(ScriptedGenerator::three_slides());
        let created = orch.generate(GenerationRequest::new("T")).await.unwrap();
        let id = created.slides[0].id.clone();

        orch.edit_slide_image(&id, "brighter").await.unwrap();
        assert!(!generator.calls().iter().any(|c| c.starts_with("edit:")));

        orch.set_slide_visual(&id, Some("data:image/jpeg;base64,AAAA".to_string()))
            .await
            .unwrap();
        let edited = orch.edit_slide_image(&id, "brighter").await.unwrap();
        assert_eq!(edited.slides[0].background_image(), Some("data:image/jpeg;base64,AAAAED"));
    }

    #[tokio::test]
    async fn test_regenerate_caption_thread_suggest() {
        let generator = ScriptedGenerator::three_slides()
            .with_suggestion(PreferencesUpdate::new().with_background_color("#000000"));
        let (_, _, orch) = setup(generator);
        let created = orch.generate(GenerationRequest::new("T")).await.unwrap();
        let id = created.slides[0].id.clone();

        let next = orch.regenerate_content(&id, SlidePart::Body).await.unwrap();
        assert_eq!(next.slides[0].body, format!("new body for {}", id));
        assert_eq!(next.slides[0].headline, "H1");

        assert_eq!(orch.generate_caption().await.unwrap(), "caption for T");
        assert_eq!(orch.generate_thread().await.unwrap(), "thread for T");

        let suggested = orch.suggest_design().await.unwrap();
        assert_eq!(suggested.preferences.background_color, "#000000");
    }

    #[tokio::test]
    async fn test_failed_save_keeps_edit() {
        let (_, gateway, orch) = setup(ScriptedGenerator::three_slides());
        let created = orch.generate(GenerationRequest::new("T")).await.unwrap();
        gateway.fail_saves(true);

        let err = orch
            .update_slide(&created.slides[0].id, &SlideUpdate::new().with_headline("edited"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Persistence);
        assert!(orch.last_error().unwrap().starts_with("Failed to save changes to the cloud:"));
        assert_eq!(orch.carousel().unwrap().slides[0].headline, "edited");
    }

    #[tokio::test]
    async fn test_edits_persist() {
        let generator = Arc::new(ScriptedGenerator::three_slides());
        let gateway = Arc::new(RecordingGateway::new());
        let mut settings = keyed();
        let mut kit = BrandKit::default();
        kit.colors.primary = "#123456".to_string();
        settings.brand_kit = Some(kit);
        let orch = Orchestrator::new(generator, gateway.clone(), "u", settings);

        let created = orch.generate(GenerationRequest::new("T")).await.unwrap();
        let first = created.slides[0].id.clone();

        orch.apply_style(&EditScope::Slide(first.clone()), &StyleChange::BackgroundColor("#FF0000".into()))
            .await
            .unwrap();
        orch.apply_style(&EditScope::Slide(first.clone()), &StyleChange::BodyStyle(TextStyle::body()))
            .await
            .unwrap();
        orch.move_slide(&first, Direction::Right).await.unwrap();
        let branded = orch.apply_brand_kit().await.unwrap();

        assert_eq!(branded.preferences.background_color, "#123456");
        assert!(branded.slides.iter().all(|s| s.style.background_color.is_none()));
        assert_eq!(branded.slides[1].id, first);
        assert!(branded.slides[1].style.body_style.is_some());

        let cleared = orch.clear_slide_overrides(StyleField::BodyStyle).await.unwrap();
        assert!(cleared.slides[1].style.body_style.is_none());
        assert_eq!(gateway.stored()[0], cleared);
    }

    #[tokio::test]
    async fn test_preferences_without_carousel_creates_draft() {
        let (_, gateway, orch) = setup(ScriptedGenerator::three_slides());
        let orch = orch.with_profile(UserProfile {
            name: String::new(),
            niche: vec!["Food".to_string()],
        });
        let draft = orch
            .update_preferences(&PreferencesUpdate::new().with_font_color("#222222"))
            .await
            .unwrap();
        assert!(draft.slides.is_empty());
        assert_eq!(draft.category, "Food");
        assert_eq!(draft.preferences.font_color, "#222222");
        assert_eq!(gateway.save_count(), 0);
    }

    #[tokio::test]
    async fn test_history_open_close_delete() {
        let (_, gateway, orch) = setup(ScriptedGenerator::three_slides());
        let first = orch.generate(GenerationRequest::new("First")).await.unwrap();
        orch.generate(GenerationRequest::new("Second")).await.unwrap();
        orch.close().await.unwrap();
        assert!(orch.carousel().is_none());

        let history = orch.history().await.unwrap();
        assert_eq!(history.len(), 2);

        let opened = orch.open_saved(&first.id).await.unwrap();
        assert_eq!(opened.title, "First");
        assert_eq!(orch.selected_slide(), Some(first.slides[0].id.clone()));

        orch.delete_carousel(&first.id).await.unwrap();
        assert!(orch.carousel().is_none());
        assert_eq!(gateway.stored().len(), 1);

        orch.clear_history().await.unwrap();
        assert!(orch.history().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_roundtrip_keeps_slide_fields_and_order() {
        let contents = vec![SlideContent::new("H1", "B1", "P1")];
        let (_, gateway, orch) = setup(ScriptedGenerator::with_contents(contents));
        let created = orch
            .generate(GenerationRequest::new("Topic").with_niche("Fitness"))
            .await
            .unwrap();

        let rows = gateway.slide_rows();
        assert_eq!(rows[0].order, 0);
        let fetched = orch.history().await.unwrap();
        assert_eq!(fetched[0].slides[0].headline, "H1");
        assert_eq!(fetched[0].slides[0].body, "B1");
        assert_eq!(fetched[0].slides[0].visual_prompt, "P1");
        assert_eq!(fetched[0], created);

        let (row, _) = crate::persistence::to_rows("user-1", &created);
        assert_eq!(from_rows(row, rows), created);
    }

    #[tokio::test]
    async fn test_download_counts_only_success() {
        let dir = TempDir::new().unwrap();
        let mut context = AppContext::load(dir.path()).unwrap();
        let (_, _, orch) = setup(ScriptedGenerator::three_slides());
        let created = orch.generate(GenerationRequest::new("My Deck")).await.unwrap();
        let ids: Vec<&str> = created.slides.iter().map(|s| s.id.as_str()).collect();

        let failing = FakeRasterizer::new(&ids, 540).fail_on(ids[1]);
        let err = orch.download(&failing, dir.path(), &mut context).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Export);
        assert_eq!(context.download_count(), 0);

        let raster = FakeRasterizer::new(&ids, 540);
        let path = orch.download(&raster, dir.path(), &mut context).await.unwrap();
        assert!(path.ends_with("my_deck.zip"));
        assert_eq!(context.download_count(), 1);
        assert_eq!(AppContext::load(dir.path()).unwrap().download_count(), 1);
    }

    #[tokio::test]
    async fn test_download_succeeds_when_counter_cannot_be_saved() {
        let config = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let mut context = AppContext::load(config.path()).unwrap();
        // A directory where the counter file belongs makes the write fail.
        std::fs::create_dir(config.path().join("downloads.json")).unwrap();

        let (_, _, orch) = setup(ScriptedGenerator::three_slides());
        let created = orch.generate(GenerationRequest::new("My Deck")).await.unwrap();
        let ids: Vec<&str> = created.slides.iter().map(|s| s.id.as_str()).collect();

        let raster = FakeRasterizer::new(&ids, 540);
        let path = orch.download(&raster, out.path(), &mut context).await.unwrap();
        assert!(path.exists());
        assert!(orch.last_error().is_none());
        assert_eq!(context.download_count(), 1);
    }
}
