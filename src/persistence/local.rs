//! Local carousel store.
//!
//! A JSON file holding the carousel list, used before an account exists.
//! The store implements [`PersistenceGateway`] so the orchestrator can run
//! against it unchanged, and its records can be migrated once into a remote
//! gateway with [`migrate_local_history`].

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::{from_rows, group_slides, normalize_ids, save_carousel, to_rows};
use super::{CarouselRow, PersistenceGateway, SlideRow};
use crate::carousel::model::Carousel;
use crate::error::{CarouselError, CarouselResult};
use crate::settings::write_json;

/// Carousel list kept in a local JSON file (or only in memory).
#[derive(Debug)]
pub struct LocalStore {
    path: Option<PathBuf>,
    carousels: Mutex<Vec<Carousel>>,
}

impl LocalStore {
    /// Opens the store at `path`. A missing file is an empty store; a corrupt
    /// one is an error so it is never overwritten.
    pub fn open(path: impl Into<PathBuf>) -> CarouselResult<Self> {
        let path = path.into();
        let carousels = match fs::read_to_string(&path) {
            Ok(raw) if raw.trim().is_empty() => Vec::new(),
            Ok(raw) => serde_json::from_str(&raw)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };
        debug!(path = %path.display(), count = carousels.len(), "opened local store");
        Ok(Self {
            path: Some(path),
            carousels: Mutex::new(carousels),
        })
    }

    /// A store that never touches the filesystem.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            carousels: Mutex::new(Vec::new()),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Carousel>> {
        self.carousels.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn flush(&self, carousels: &[Carousel]) -> CarouselResult<()> {
        match &self.path {
            Some(path) => write_json(path, carousels),
            None => Ok(()),
        }
    }

    /// Snapshot of the stored carousels, in storage order.
    pub fn carousels(&self) -> Vec<Carousel> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Inserts or replaces a whole carousel by ID. New carousels go first.
    pub fn put(&self, carousel: Carousel) -> CarouselResult<()> {
        let mut carousels = self.lock();
        match carousels.iter_mut().find(|c| c.id == carousel.id) {
            Some(existing) => *existing = carousel,
            None => carousels.insert(0, carousel),
        }
        self.flush(&carousels)
    }

    /// Empties the store and deletes its file.
    pub fn remove_all(&self) -> CarouselResult<()> {
        let mut carousels = self.lock();
        carousels.clear();
        if let Some(path) = &self.path {
            match fs::remove_file(path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

#[async_trait]
impl PersistenceGateway for LocalStore {
    async fn upsert_carousel(&self, row: &CarouselRow) -> CarouselResult<()> {
        let mut carousels = self.lock();
        match carousels.iter_mut().find(|c| c.id == row.id) {
            Some(existing) => {
                existing.title = row.title.clone();
                existing.category = row.category.clone();
                existing.preferences = row.preferences.clone();
                existing.created_at = row.created_at;
            }
            None => carousels.insert(0, from_rows(row.clone(), Vec::new())),
        }
        self.flush(&carousels)
    }

    async fn upsert_slides(&self, rows: &[SlideRow]) -> CarouselResult<()> {
        let mut carousels = self.lock();
        for (carousel_id, incoming) in group_slides(rows) {
            let carousel = carousels
                .iter_mut()
                .find(|c| c.id == carousel_id)
                .ok_or_else(|| {
                    CarouselError::persistence(format!("carousel {} does not exist", carousel_id))
                })?;

            let (row, mut slides) = to_rows("", carousel);
            for slide in incoming {
                match slides.iter_mut().find(|s| s.id == slide.id) {
                    Some(existing) => *existing = slide.clone(),
                    None => slides.push(slide.clone()),
                }
            }
            *carousel = from_rows(row, slides);
        }
        self.flush(&carousels)
    }

    async fn fetch_carousels(&self, _owner_id: &str) -> CarouselResult<Vec<Carousel>> {
        let mut carousels = self.carousels();
        carousels.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(carousels)
    }

    async fn delete_carousel(&self, id: &str) -> CarouselResult<()> {
        let mut carousels = self.lock();
        carousels.retain(|c| c.id != id);
        self.flush(&carousels)
    }

    async fn delete_all_carousels(&self, _owner_id: &str) -> CarouselResult<()> {
        let mut carousels = self.lock();
        carousels.clear();
        self.flush(&carousels)
    }
}

// =============================================================================
// MIGRATION
// =============================================================================

/// Outcome of a local-to-remote migration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MigrationReport {
    pub migrated: usize,
    /// Carousels whose ID had to be replaced.
    pub reassigned: usize,
}

/// Copies every local carousel into `remote`, one at a time.
///
/// Non-UUID IDs are replaced first. The local file is removed only after
/// every record saved; on the first failure the error is returned and the
/// local store is left intact.
pub async fn migrate_local_history<F>(
    local: &LocalStore,
    remote: &dyn PersistenceGateway,
    owner_id: &str,
    mut on_progress: F,
) -> CarouselResult<MigrationReport>
where
    F: FnMut(usize, usize, &Carousel) + Send,
{
    let records = local.carousels();
    let total = records.len();
    let mut report = MigrationReport::default();

    for (index, record) in records.iter().enumerate() {
        let clean = normalize_ids(record);
        if clean.id != record.id {
            report.reassigned += 1;
        }
        on_progress(index + 1, total, &clean);
        save_carousel(remote, owner_id, &clean).await?;
        report.migrated += 1;
    }

    if total > 0 {
        local.remove_all()?;
        info!(migrated = report.migrated, "local history migrated");
    } else {
        warn!("no local carousels to migrate");
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::carousel::model::{is_canonical_uuid, DesignPreferences, Slide, SlideContent};
    use crate::carousel::ops::{create_carousel, move_slide, Direction};
    use crate::persistence::save_carousel;
    use crate::testing::RecordingGateway;
    use chrono::{Duration, Utc};
    use tempfile::TempDir;

    fn sample(title: &str) -> Carousel {
        create_carousel(
            title,
            vec![SlideContent::new("H1", "B1", "P1"), SlideContent::new("H2", "B2", "P2")],
            "Fitness",
            DesignPreferences::default(),
        )
    }

    #[tokio::test]
    async fn test_save_and_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("history.json");
        let store = LocalStore::open(&path).unwrap();
        let carousel = sample("A");
        save_carousel(&store, "local", &carousel).await.unwrap();

        let reopened = LocalStore::open(&path).unwrap();
        assert_eq!(reopened.carousels(), vec![carousel]);
    }

    #[tokio::test]
    async fn test_resave_after_move_keeps_new_order() {
        let store = LocalStore::in_memory();
        let carousel = sample("A");
        save_carousel(&store, "local", &carousel).await.unwrap();

        let moved = move_slide(&carousel, &carousel.slides[0].id, Direction::Right);
        save_carousel(&store, "local", &moved).await.unwrap();

        let stored = &store.carousels()[0];
        assert_eq!(stored.slides[0].headline, "H2");
        assert_eq!(stored.slides[1].headline, "H1");
    }

    #[tokio::test]
    async fn test_fetch_newest_first_and_delete() {
        let store = LocalStore::in_memory();
        let old = sample("old").with_created_at(Utc::now() - Duration::days(1));
        let new = sample("new");
        store.put(new.clone()).unwrap();
        store.put(old.clone()).unwrap();

        let fetched = store.fetch_carousels("any").await.unwrap();
        assert_eq!(fetched[0].title, "new");
        assert_eq!(fetched[1].title, "old");

        store.delete_carousel(&new.id).await.unwrap();
        assert_eq!(store.len(), 1);
        store.delete_all_carousels("any").await.unwrap();
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_slides_for_unknown_carousel_fail() {
        let store = LocalStore::in_memory();
        let (_, rows) = to_rows("local", &sample("A"));
        assert!(store.upsert_slides(&rows).await.is_err());
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("history.json");
        fs::write(&path, "[{oops").unwrap();
        assert!(LocalStore::open(&path).is_err());
    }

    #[tokio::test]
    async fn test_migration_replaces_ids_and_removes_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("history.json");
        let store = LocalStore::open(&path).unwrap();
        let legacy = Carousel::new("1712345678", "Legacy")
            .with_slide(Slide::new("slide-a").with_headline("A"))
            .with_slide(Slide::new("slide-b").with_headline("B"));
        store.put(legacy).unwrap();
        store.put(sample("Modern")).unwrap();
        assert!(path.exists());

        let remote = RecordingGateway::new();
        let mut seen = Vec::new();
        let report = migrate_local_history(&store, &remote, "user-1", |i, n, _| seen.push((i, n)))
            .await
            .unwrap();

        assert_eq!(report.migrated, 2);
        assert_eq!(report.reassigned, 1);
        assert_eq!(seen, vec![(1, 2), (2, 2)]);
        assert!(!path.exists());
        assert!(store.is_empty());

        let migrated = remote.fetch_carousels("user-1").await.unwrap();
        assert_eq!(migrated.len(), 2);
        for carousel in &migrated {
            assert!(is_canonical_uuid(&carousel.id));
            assert!(carousel.slides.iter().all(|s| is_canonical_uuid(&s.id)));
        }
        let legacy = migrated.iter().find(|c| c.title == "Legacy").unwrap();
        assert_eq!(legacy.slides[0].headline, "A");
    }

    #[tokio::test]
    async fn test_failed_migration_keeps_local_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("history.json");
        let store = LocalStore::open(&path).unwrap();
        store.put(sample("A")).unwrap();

        let remote = RecordingGateway::new();
        remote.fail_saves(true);
        let result = migrate_local_history(&store, &remote, "user-1", |_, _, _| {}).await;
        assert!(result.is_err());
        assert!(path.exists());
        assert_eq!(store.len(), 1);
    }
}
