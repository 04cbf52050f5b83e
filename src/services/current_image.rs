//! Owner of the "now showing" state and the image archive.
//!
//! All writers (upload, import, history load, playlist advance) funnel
//! through one async mutex, so readers always see a consistent pair of
//! metadata and pixel buffer. The playlist advance check runs inside the
//! same lock: two polls racing an interval boundary cannot both advance.

use chrono::{DateTime, Utc};
use rand::Rng;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::metrics::METRICS;
use crate::error::AppError;
use crate::models::{
    ArchiveEntry, CurrentImage, HistoryEntry, Playlist, PlaylistMode, Rotation,
    MAX_ARCHIVE_ENTRIES,
};
use crate::pipeline::ProcessedImage;
use crate::store::{entity, JsonStore};
use std::sync::Arc;

/// Blob holding the device buffer of the image currently showing.
const CURRENT_PIXELS: &str = "current.bin";

fn pixels_blob(id: Uuid) -> String {
    format!("{id}.bin")
}

fn original_blob(id: Uuid) -> String {
    format!("{id}.src")
}

fn thumb_blob(id: Uuid) -> String {
    format!("{id}.thumb.png")
}

/// Metadata and payloads for a new image entering the archive.
pub struct NewImage {
    pub title: String,
    pub artist: Option<String>,
    pub source: Option<String>,
    pub source_url: Option<String>,
    pub rotation: Rotation,
    pub ai_generated: bool,
    pub sleep_duration_us: u64,
    pub processed: ProcessedImage,
    /// Original (pre-pipeline) bytes, retained for later re-quantization.
    pub original_bytes: Option<Vec<u8>>,
}

pub struct CurrentImageService {
    store: Arc<JsonStore>,
    write_lock: Mutex<()>,
}

impl CurrentImageService {
    pub fn new(store: Arc<JsonStore>) -> Self {
        Self {
            store,
            write_lock: Mutex::new(()),
        }
    }

    /// Consistent snapshot of the current image metadata.
    pub async fn snapshot(&self) -> Result<Option<CurrentImage>, AppError> {
        Ok(self.store.read(entity::CURRENT).await?)
    }

    /// The device pixel buffer for the current image.
    pub async fn pixels(&self) -> Result<Option<Vec<u8>>, AppError> {
        Ok(self.store.read_blob(CURRENT_PIXELS).await?)
    }

    pub async fn history(&self) -> Result<Vec<HistoryEntry>, AppError> {
        Ok(self.store.read_or_default(entity::HISTORY).await?)
    }

    pub async fn archive_entry(&self, image_id: Uuid) -> Result<Option<ArchiveEntry>, AppError> {
        let entries: Vec<ArchiveEntry> = self.store.read_or_default(entity::IMAGES).await?;
        Ok(entries.into_iter().find(|e| e.image_id == image_id))
    }

    pub async fn archive_entries(&self) -> Result<Vec<ArchiveEntry>, AppError> {
        Ok(self.store.read_or_default(entity::IMAGES).await?)
    }

    pub async fn original_bytes(&self, image_id: Uuid) -> Result<Option<Vec<u8>>, AppError> {
        Ok(self.store.read_blob(&original_blob(image_id)).await?)
    }

    pub async fn thumbnail(&self, image_id: Uuid) -> Result<Option<Vec<u8>>, AppError> {
        Ok(self.store.read_blob(&thumb_blob(image_id)).await?)
    }

    /// Archive an image without promoting it to the display. Returns the
    /// new entry.
    pub async fn archive(&self, new: NewImage) -> Result<ArchiveEntry, AppError> {
        let _guard = self.write_lock.lock().await;
        self.archive_locked(new).await
    }

    /// Archive an image and make it the current one.
    pub async fn publish(&self, new: NewImage) -> Result<CurrentImage, AppError> {
        let _guard = self.write_lock.lock().await;
        let sleep = new.sleep_duration_us;
        let pixels = new.processed.pixels.clone();
        let entry = self.archive_locked(new).await?;
        self.set_current_locked(&entry, &pixels, sleep, Utc::now())
            .await
    }

    /// Promote an already-archived image to the display.
    pub async fn apply_archived(
        &self,
        image_id: Uuid,
        sleep_duration_us: u64,
    ) -> Result<CurrentImage, AppError> {
        let _guard = self.write_lock.lock().await;
        let entry = self
            .archive_entry(image_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("unknown image {image_id}")))?;
        let pixels = self
            .store
            .read_blob(&pixels_blob(image_id))
            .await?
            .ok_or_else(|| AppError::NotFound(format!("pixel buffer missing for {image_id}")))?;
        self.set_current_locked(&entry, &pixels, sleep_duration_us, Utc::now())
            .await
    }

    /// Replace an archived image's processed output (a history re-load
    /// with new parameters) and promote it. The image keeps its id.
    pub async fn republish(
        &self,
        image_id: Uuid,
        processed: ProcessedImage,
        rotation: Rotation,
        sleep_duration_us: u64,
    ) -> Result<CurrentImage, AppError> {
        let _guard = self.write_lock.lock().await;
        let mut entry = self
            .archive_entry(image_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("unknown image {image_id}")))?;
        entry.rotation = rotation;
        entry.width = processed.width;
        entry.height = processed.height;

        self.store
            .write_blob(&pixels_blob(image_id), &processed.pixels)
            .await?;
        self.store
            .write_blob(&thumb_blob(image_id), &processed.thumbnail_png)
            .await?;
        self.store
            .update(entity::IMAGES, |entries: &mut Vec<ArchiveEntry>| {
                if let Some(row) = entries.iter_mut().find(|e| e.image_id == image_id) {
                    *row = entry.clone();
                }
            })
            .await?;
        self.set_current_locked(&entry, &processed.pixels, sleep_duration_us, Utc::now())
            .await
    }

    /// Remove an archive/history pair and its blobs.
    pub async fn delete(&self, image_id: Uuid) -> Result<(), AppError> {
        let _guard = self.write_lock.lock().await;
        let mut found = false;
        self.store
            .update(entity::IMAGES, |entries: &mut Vec<ArchiveEntry>| {
                let before = entries.len();
                entries.retain(|e| e.image_id != image_id);
                found = entries.len() != before;
            })
            .await?;
        if !found {
            return Err(AppError::NotFound(format!("unknown image {image_id}")));
        }
        self.store
            .update(entity::HISTORY, |entries: &mut Vec<HistoryEntry>| {
                entries.retain(|e| e.image_id != image_id);
            })
            .await?;
        self.remove_blobs(image_id).await;
        Ok(())
    }

    /// Advance the playlist if its interval has elapsed. Called on every
    /// device metadata poll; returns the new current image if a swap
    /// happened.
    pub async fn maybe_advance_playlist(&self) -> Result<Option<CurrentImage>, AppError> {
        let now = Utc::now();
        // Cheap pre-check before taking the write lock.
        let playlist: Playlist = self.store.read_or_default(entity::PLAYLIST).await?;
        if !playlist.due(now) {
            return Ok(None);
        }

        let _guard = self.write_lock.lock().await;
        // Re-check under the lock: a concurrent poll may have advanced.
        let mut playlist: Playlist = self.store.read_or_default(entity::PLAYLIST).await?;
        if !playlist.due(now) {
            return Ok(None);
        }

        let next_index = match playlist.mode {
            PlaylistMode::Sequential => (playlist.current_index + 1) % playlist.images.len(),
            PlaylistMode::Random => rand::thread_rng().gen_range(0..playlist.images.len()),
        };
        let image_id = playlist.images[next_index];

        playlist.current_index = next_index;
        playlist.last_update = now;

        let entry = self.archive_entry(image_id).await?;
        let pixels = self.store.read_blob(&pixels_blob(image_id)).await?;
        let (Some(entry), Some(pixels)) = (entry, pixels) else {
            // Evicted or corrupt entry: skip this slot but still stamp the
            // advance so the next poll moves on instead of spinning here.
            tracing::warn!(image_id = %image_id, "Playlist entry missing from archive, skipping");
            self.store.write(entity::PLAYLIST, &playlist).await?;
            return Ok(None);
        };

        let current = self
            .set_current_locked(&entry, &pixels, playlist.interval_us, now)
            .await?;
        self.store.write(entity::PLAYLIST, &playlist).await?;
        METRICS.playlist_advances.inc();
        tracing::info!(
            image_id = %image_id,
            index = next_index,
            mode = ?playlist.mode,
            "Playlist advanced"
        );
        Ok(Some(current))
    }

    async fn archive_locked(&self, new: NewImage) -> Result<ArchiveEntry, AppError> {
        let image_id = Uuid::new_v4();
        let now = Utc::now();
        let entry = ArchiveEntry {
            image_id,
            title: new.title,
            artist: new.artist,
            source: new.source,
            source_url: new.source_url,
            rotation: new.rotation,
            width: new.processed.width,
            height: new.processed.height,
            timestamp: now,
            ai_generated: new.ai_generated,
            has_original: new.original_bytes.is_some(),
        };

        // Blobs first: a crash between blob and index writes leaves only
        // orphaned files, never an index row without its payload.
        self.store
            .write_blob(&pixels_blob(image_id), &new.processed.pixels)
            .await?;
        self.store
            .write_blob(&thumb_blob(image_id), &new.processed.thumbnail_png)
            .await?;
        if let Some(original) = &new.original_bytes {
            self.store
                .write_blob(&original_blob(image_id), original)
                .await?;
        }

        let mut evicted: Vec<Uuid> = Vec::new();
        self.store
            .update(entity::IMAGES, |entries: &mut Vec<ArchiveEntry>| {
                entries.push(entry.clone());
                while entries.len() > MAX_ARCHIVE_ENTRIES {
                    evicted.push(entries.remove(0).image_id);
                }
            })
            .await?;
        self.store
            .update(entity::HISTORY, |entries: &mut Vec<HistoryEntry>| {
                entries.push(HistoryEntry {
                    image_id,
                    title: entry.title.clone(),
                    artist: entry.artist.clone(),
                    source: entry.source.clone(),
                    timestamp: now,
                    ai_generated: entry.ai_generated,
                });
                entries.retain(|e| !evicted.contains(&e.image_id));
            })
            .await?;
        for id in evicted {
            tracing::debug!(image_id = %id, "Evicting archived image");
            self.remove_blobs(id).await;
        }

        Ok(entry)
    }

    async fn set_current_locked(
        &self,
        entry: &ArchiveEntry,
        pixels: &[u8],
        sleep_duration_us: u64,
        now: DateTime<Utc>,
    ) -> Result<CurrentImage, AppError> {
        let expected = (entry.width * entry.height * 3) as usize;
        if pixels.len() != expected {
            return Err(AppError::Internal(format!(
                "pixel buffer is {} bytes, expected {expected}",
                pixels.len()
            )));
        }
        let current = CurrentImage {
            image_id: entry.image_id,
            title: entry.title.clone(),
            artist: entry.artist.clone(),
            source: entry.source.clone(),
            rotation: entry.rotation,
            width: entry.width,
            height: entry.height,
            timestamp: now,
            sleep_duration: sleep_duration_us,
            ai_generated: entry.ai_generated,
        };
        self.store.write_blob(CURRENT_PIXELS, pixels).await?;
        self.store.write(entity::CURRENT, &current).await?;
        tracing::info!(image_id = %entry.image_id, title = %entry.title, "Current image updated");
        Ok(current)
    }

    async fn remove_blobs(&self, image_id: Uuid) {
        for blob in [
            pixels_blob(image_id),
            original_blob(image_id),
            thumb_blob(image_id),
        ] {
            if let Err(e) = self.store.remove_blob(&blob).await {
                tracing::warn!(blob = %blob, error = %e, "Failed to remove blob");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MIN_PLAYLIST_INTERVAL_US;

    fn processed(width: u32, height: u32) -> ProcessedImage {
        ProcessedImage {
            pixels: vec![0u8; (width * height * 3) as usize],
            width,
            height,
            thumbnail_png: vec![1, 2, 3],
        }
    }

    fn new_image(title: &str) -> NewImage {
        NewImage {
            title: title.into(),
            artist: None,
            source: None,
            source_url: None,
            rotation: Rotation::Deg0,
            ai_generated: false,
            sleep_duration_us: 3_600_000_000,
            processed: processed(1200, 1600),
            original_bytes: None,
        }
    }

    fn service() -> (tempfile::TempDir, CurrentImageService) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(JsonStore::open(dir.path()).unwrap());
        (dir, CurrentImageService::new(store))
    }

    #[tokio::test]
    async fn test_publish_sets_current_and_history() {
        let (_dir, svc) = service();
        let current = svc.publish(new_image("First")).await.unwrap();
        assert_eq!(current.title, "First");

        let snapshot = svc.snapshot().await.unwrap().unwrap();
        assert_eq!(snapshot.image_id, current.image_id);

        let pixels = svc.pixels().await.unwrap().unwrap();
        assert_eq!(pixels.len(), 1200 * 1600 * 3);

        let history = svc.history().await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].image_id, current.image_id);
    }

    #[tokio::test]
    async fn test_archive_does_not_swap_current() {
        let (_dir, svc) = service();
        svc.publish(new_image("Shown")).await.unwrap();
        let shown = svc.snapshot().await.unwrap().unwrap();

        svc.archive(new_image("Waiting")).await.unwrap();
        let still = svc.snapshot().await.unwrap().unwrap();
        assert_eq!(still.image_id, shown.image_id);
        assert_eq!(svc.history().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_apply_archived_promotes() {
        let (_dir, svc) = service();
        svc.publish(new_image("Old")).await.unwrap();
        let entry = svc.archive(new_image("New")).await.unwrap();

        let current = svc
            .apply_archived(entry.image_id, 1_000_000)
            .await
            .unwrap();
        assert_eq!(current.image_id, entry.image_id);
        assert_eq!(current.sleep_duration, 1_000_000);
    }

    #[tokio::test]
    async fn test_apply_unknown_id_is_not_found() {
        let (_dir, svc) = service();
        let err = svc
            .apply_archived(Uuid::new_v4(), 1_000_000)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_eviction_removes_archive_history_and_blobs() {
        let (_dir, svc) = service();
        let first = svc.archive(new_image("img-0")).await.unwrap();
        for i in 1..=MAX_ARCHIVE_ENTRIES {
            svc.archive(new_image(&format!("img-{i}"))).await.unwrap();
        }

        let entries = svc.archive_entries().await.unwrap();
        assert_eq!(entries.len(), MAX_ARCHIVE_ENTRIES);
        assert!(entries.iter().all(|e| e.image_id != first.image_id));

        let history = svc.history().await.unwrap();
        assert_eq!(history.len(), MAX_ARCHIVE_ENTRIES);
        assert!(history.iter().all(|e| e.image_id != first.image_id));

        assert!(svc.thumbnail(first.image_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_removes_both_sides() {
        let (_dir, svc) = service();
        let entry = svc.archive(new_image("gone")).await.unwrap();
        svc.delete(entry.image_id).await.unwrap();
        assert!(svc.archive_entry(entry.image_id).await.unwrap().is_none());
        assert!(svc.history().await.unwrap().is_empty());
        let err = svc.delete(entry.image_id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_playlist_advances_sequentially() {
        let (_dir, svc) = service();
        let a = svc.publish(new_image("A")).await.unwrap();
        let b = svc.archive(new_image("B")).await.unwrap();
        let c = svc.archive(new_image("C")).await.unwrap();

        let playlist = Playlist {
            active: true,
            mode: PlaylistMode::Sequential,
            interval_us: MIN_PLAYLIST_INTERVAL_US,
            images: vec![a.image_id, b.image_id, c.image_id],
            current_index: 0,
            last_update: Utc::now() - chrono::Duration::seconds(3700),
        };
        svc.store.write(entity::PLAYLIST, &playlist).await.unwrap();

        let advanced = svc.maybe_advance_playlist().await.unwrap().unwrap();
        assert_eq!(advanced.image_id, b.image_id);
        assert_eq!(advanced.sleep_duration, MIN_PLAYLIST_INTERVAL_US);

        let saved: Playlist = svc.store.read(entity::PLAYLIST).await.unwrap().unwrap();
        assert_eq!(saved.current_index, 1);
        assert!(saved.last_update > playlist.last_update);

        // Immediately after an advance nothing further is due.
        assert!(svc.maybe_advance_playlist().await.unwrap().is_none());
        let still = svc.snapshot().await.unwrap().unwrap();
        assert_eq!(still.image_id, b.image_id);
    }

    #[tokio::test]
    async fn test_inactive_playlist_never_advances() {
        let (_dir, svc) = service();
        let a = svc.publish(new_image("A")).await.unwrap();
        let playlist = Playlist {
            active: false,
            images: vec![a.image_id],
            last_update: Utc::now() - chrono::Duration::days(1),
            ..Default::default()
        };
        svc.store.write(entity::PLAYLIST, &playlist).await.unwrap();
        assert!(svc.maybe_advance_playlist().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_concurrent_polls_advance_once() {
        let (_dir, svc) = service();
        let svc = Arc::new(svc);
        let a = svc.publish(new_image("A")).await.unwrap();
        let b = svc.archive(new_image("B")).await.unwrap();
        let playlist = Playlist {
            active: true,
            mode: PlaylistMode::Sequential,
            interval_us: MIN_PLAYLIST_INTERVAL_US,
            images: vec![a.image_id, b.image_id],
            current_index: 0,
            last_update: Utc::now() - chrono::Duration::seconds(3700),
        };
        svc.store.write(entity::PLAYLIST, &playlist).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let svc = svc.clone();
            handles.push(tokio::spawn(
                async move { svc.maybe_advance_playlist().await },
            ));
        }
        let mut advances = 0;
        for h in handles {
            if h.await.unwrap().unwrap().is_some() {
                advances += 1;
            }
        }
        assert_eq!(advances, 1, "exactly one poll may perform the advance");
    }
}
