use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::image_uri::ImageUri;
use crate::settings::AspectRatio;
use crate::store::KeyValueStore;

pub const HISTORY_CAPACITY: usize = 15;
pub const HISTORY_KEY: &str = "wallpaperHistory";

/// One past generation. Field names on disk match the browser-era record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub id: String,
    pub prompt: String,
    #[serde(rename = "imageUrl")]
    pub result_image: ImageUri,
    pub created_at: String,
    #[serde(rename = "baseImageUrl", default, skip_serializing_if = "Option::is_none")]
    pub source_image: Option<ImageUri>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aspect_ratio: Option<AspectRatio>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
}

impl HistoryEntry {
    pub fn text_to_image(
        prompt: impl Into<String>,
        result_image: ImageUri,
        aspect_ratio: AspectRatio,
        style: impl Into<String>,
    ) -> Self {
        let stamp = now_utc_iso();
        Self {
            id: stamp.clone(),
            prompt: prompt.into(),
            result_image,
            created_at: stamp,
            source_image: None,
            aspect_ratio: Some(aspect_ratio),
            style: Some(style.into()),
        }
    }

    pub fn image_edit(
        prompt: impl Into<String>,
        result_image: ImageUri,
        source_image: ImageUri,
    ) -> Self {
        let stamp = now_utc_iso();
        Self {
            id: stamp.clone(),
            prompt: prompt.into(),
            result_image,
            created_at: stamp,
            source_image: Some(source_image),
            aspect_ratio: None,
            style: None,
        }
    }

    pub fn is_edit(&self) -> bool {
        self.source_image.is_some()
    }
}

/// Bounded, newest-first history persisted under [`HISTORY_KEY`].
///
/// Every mutation returns the new sequence and writes it through. Write
/// failures are logged and never undo the returned value.
#[derive(Clone)]
pub struct HistoryStore {
    store: Arc<dyn KeyValueStore>,
}

impl HistoryStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn load(&self) -> Vec<HistoryEntry> {
        let Some(raw) = self.store.get(HISTORY_KEY) else {
            return Vec::new();
        };
        match serde_json::from_value::<Vec<HistoryEntry>>(raw) {
            Ok(mut entries) => {
                entries.truncate(HISTORY_CAPACITY);
                entries
            }
            Err(err) => {
                tracing::warn!(error = %err, "stored history unreadable; starting empty");
                Vec::new()
            }
        }
    }

    pub fn save(&self, entries: &[HistoryEntry]) {
        let value = match serde_json::to_value(entries) {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!(error = %err, "failed to serialize history");
                return;
            }
        };
        if let Err(err) = self.store.set(HISTORY_KEY, value) {
            tracing::warn!(error = %err, "failed to persist history");
        }
    }

    pub fn append(&self, entry: HistoryEntry, existing: &[HistoryEntry]) -> Vec<HistoryEntry> {
        let mut entries = Vec::with_capacity(HISTORY_CAPACITY);
        entries.push(entry);
        entries.extend(existing.iter().take(HISTORY_CAPACITY - 1).cloned());
        self.save(&entries);
        entries
    }

    pub fn update_matching<P, T>(
        &self,
        predicate: P,
        transform: T,
        existing: &[HistoryEntry],
    ) -> Vec<HistoryEntry>
    where
        P: Fn(&HistoryEntry) -> bool,
        T: Fn(&mut HistoryEntry),
    {
        let entries: Vec<HistoryEntry> = existing
            .iter()
            .cloned()
            .map(|mut entry| {
                if predicate(&entry) {
                    transform(&mut entry);
                }
                entry
            })
            .collect();
        self.save(&entries);
        entries
    }

    pub fn clear(&self) {
        if let Err(err) = self.store.remove(HISTORY_KEY) {
            tracing::warn!(error = %err, "failed to remove stored history");
        }
    }
}

fn now_utc_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::{json, Value};

    use super::{HistoryEntry, HistoryStore, HISTORY_CAPACITY, HISTORY_KEY};
    use crate::image_uri::ImageUri;
    use crate::settings::AspectRatio;
    use crate::store::{KeyValueStore, MemoryStore};

    struct ReadOnlyStore;

    impl KeyValueStore for ReadOnlyStore {
        fn get(&self, _key: &str) -> Option<Value> {
            None
        }

        fn set(&self, _key: &str, _value: Value) -> anyhow::Result<()> {
            anyhow::bail!("disk full")
        }

        fn remove(&self, _key: &str) -> anyhow::Result<()> {
            anyhow::bail!("disk full")
        }
    }

    fn image(tag: usize) -> ImageUri {
        ImageUri::new(format!("data:image/jpeg;base64,img{tag}"))
    }

    fn entry(tag: usize) -> HistoryEntry {
        HistoryEntry {
            id: format!("id-{tag}"),
            prompt: format!("prompt {tag}"),
            result_image: image(tag),
            created_at: format!("2026-01-01T00:00:{tag:02}Z"),
            source_image: None,
            aspect_ratio: Some(AspectRatio::Portrait),
            style: Some("ghibli".to_string()),
        }
    }

    fn memory_history() -> (Arc<MemoryStore>, HistoryStore) {
        let store = Arc::new(MemoryStore::new());
        let history = HistoryStore::new(store.clone());
        (store, history)
    }

    #[test]
    fn constructors_keep_mode_fields_exclusive() {
        let text = HistoryEntry::text_to_image("p", image(1), AspectRatio::Landscape, "pixel");
        assert!(!text.is_edit());
        assert_eq!(text.aspect_ratio, Some(AspectRatio::Landscape));
        assert_eq!(text.style.as_deref(), Some("pixel"));
        assert_eq!(text.id, text.created_at);

        let edit = HistoryEntry::image_edit("p", image(2), image(3));
        assert!(edit.is_edit());
        assert_eq!(edit.aspect_ratio, None);
        assert_eq!(edit.style, None);
    }

    #[test]
    fn load_returns_empty_when_absent_or_corrupt() -> anyhow::Result<()> {
        let (store, history) = memory_history();
        assert!(history.load().is_empty());

        store.set(HISTORY_KEY, json!({"not": "a list"}))?;
        assert!(history.load().is_empty());

        store.set(HISTORY_KEY, json!([{"id": "x"}]))?;
        assert!(history.load().is_empty());
        Ok(())
    }

    #[test]
    fn load_reads_browser_record_shape() -> anyhow::Result<()> {
        let (store, history) = memory_history();
        store.set(
            HISTORY_KEY,
            json!([
                {
                    "id": "2026-01-01T00:00:00.000Z",
                    "prompt": "edit me",
                    "imageUrl": "data:image/png;base64,AAAA",
                    "createdAt": "2026-01-01T00:00:00.000Z",
                    "baseImageUrl": "data:image/png;base64,BBBB"
                },
                {
                    "id": "2025-12-31T00:00:00.000Z",
                    "prompt": "text",
                    "imageUrl": "data:image/jpeg;base64,CCCC",
                    "createdAt": "2025-12-31T00:00:00.000Z",
                    "baseImageUrl": null,
                    "aspectRatio": "16:9",
                    "style": "cyberpunk"
                }
            ]),
        )?;

        let entries = history.load();
        assert_eq!(entries.len(), 2);
        assert_eq!(
            entries[0].source_image,
            Some(ImageUri::new("data:image/png;base64,BBBB"))
        );
        assert_eq!(entries[1].source_image, None);
        assert_eq!(entries[1].aspect_ratio, Some(AspectRatio::Landscape));
        Ok(())
    }

    #[test]
    fn append_prepends_and_persists() {
        let (_store, history) = memory_history();
        let entries = history.append(entry(1), &[]);
        let entries = history.append(entry(2), &entries);
        assert_eq!(entries[0].id, "id-2");
        assert_eq!(entries[1].id, "id-1");
        assert_eq!(history.load(), entries);
    }

    #[test]
    fn append_evicts_oldest_beyond_capacity() {
        let (_store, history) = memory_history();
        let mut entries = Vec::new();
        for tag in 0..HISTORY_CAPACITY {
            entries = history.append(entry(tag), &entries);
        }
        assert_eq!(entries.len(), HISTORY_CAPACITY);
        assert_eq!(entries.last().map(|e| e.id.as_str()), Some("id-0"));

        entries = history.append(entry(99), &entries);
        assert_eq!(entries.len(), HISTORY_CAPACITY);
        assert_eq!(entries[0].id, "id-99");
        assert_eq!(entries.last().map(|e| e.id.as_str()), Some("id-1"));
        assert!(entries.iter().all(|e| e.id != "id-0"));
        assert_eq!(history.load().len(), HISTORY_CAPACITY);
    }

    #[test]
    fn update_matching_rewrites_every_match() {
        let (_store, history) = memory_history();
        let mut duplicate = entry(2);
        duplicate.result_image = image(1);
        let entries = vec![entry(1), duplicate, entry(3)];
        let target = image(1);

        let updated = history.update_matching(
            |e| e.result_image == target,
            |e| e.result_image = image(42),
            &entries,
        );

        assert_eq!(updated[0].result_image, image(42));
        assert_eq!(updated[1].result_image, image(42));
        assert_eq!(updated[2].result_image, image(3));
        assert_eq!(history.load(), updated);
    }

    #[test]
    fn clear_removes_record() {
        let (store, history) = memory_history();
        history.append(entry(1), &[]);
        assert!(store.get(HISTORY_KEY).is_some());
        history.clear();
        assert_eq!(store.get(HISTORY_KEY), None);
        assert!(history.load().is_empty());
    }

    #[test]
    fn write_failures_do_not_surface() {
        let history = HistoryStore::new(Arc::new(ReadOnlyStore));
        let entries = history.append(entry(1), &[]);
        assert_eq!(entries.len(), 1);
        history.clear();
        assert!(history.load().is_empty());
    }
}
