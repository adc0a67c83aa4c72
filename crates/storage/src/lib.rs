use anyhow::{Context, Result};
use async_trait::async_trait;
use bannerscope_core::SelectorRecord;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::{Mutex, RwLock};

/// Upsert + point lookup over selector records.
///
/// Stores may keep superseded records around; `latest` must always answer with
/// the most recent one for the key.
#[async_trait]
pub trait SelectorStore: Send + Sync {
    async fn latest(&self, scope_key: &str) -> Result<Option<SelectorRecord>>;
    async fn upsert(&self, record: SelectorRecord) -> Result<()>;
}

#[async_trait]
impl<S: SelectorStore + ?Sized> SelectorStore for std::sync::Arc<S> {
    async fn latest(&self, scope_key: &str) -> Result<Option<SelectorRecord>> {
        (**self).latest(scope_key).await
    }

    async fn upsert(&self, record: SelectorRecord) -> Result<()> {
        (**self).upsert(record).await
    }
}

const DEFAULT_HISTORY: usize = 16;

type History = HashMap<String, Vec<SelectorRecord>>;

fn newest(records: &[SelectorRecord]) -> Option<&SelectorRecord> {
    records.iter().max_by_key(|r| r.created_at)
}

fn push_bounded(history: &mut History, record: SelectorRecord, max_history: usize) {
    let records = history.entry(record.scope_key.clone()).or_default();
    records.push(record);
    if records.len() > max_history {
        let excess = records.len() - max_history;
        records.drain(..excess);
    }
}

/// In-process store, shared across audits of one process.
pub struct MemoryStore {
    records: RwLock<History>,
    max_history: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self { records: RwLock::new(HashMap::new()), max_history: DEFAULT_HISTORY }
    }

    pub fn with_history(mut self, max_history: usize) -> Self {
        self.max_history = max_history.max(1);
        self
    }

    pub async fn history(&self, scope_key: &str) -> Vec<SelectorRecord> {
        self.records.read().await.get(scope_key).cloned().unwrap_or_default()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SelectorStore for MemoryStore {
    async fn latest(&self, scope_key: &str) -> Result<Option<SelectorRecord>> {
        let records = self.records.read().await;
        Ok(records.get(scope_key).and_then(|r| newest(r)).cloned())
    }

    async fn upsert(&self, record: SelectorRecord) -> Result<()> {
        let mut records = self.records.write().await;
        push_bounded(&mut records, record, self.max_history);
        Ok(())
    }
}

/// Durable store: every record lives in one JSON document under `folder`.
pub struct JsonFileStore {
    path: PathBuf,
    max_history: usize,
    cache: Mutex<Option<History>>,
}

impl JsonFileStore {
    /// Creates `folder` if it does not exist yet.
    pub fn new(folder: &str) -> Result<Self> {
        std::fs::create_dir_all(folder).with_context(|| format!("Failed to create store folder: {}", folder))?;
        Ok(Self {
            path: Path::new(folder).join("selectors.json"),
            max_history: DEFAULT_HISTORY,
            cache: Mutex::new(None),
        })
    }

    pub fn with_history(mut self, max_history: usize) -> Self {
        self.max_history = max_history.max(1);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<History> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .with_context(|| format!("corrupt selector store at {}", self.path.display())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(e).with_context(|| format!("reading {}", self.path.display())),
        }
    }

    async fn persist(&self, history: &History) -> Result<()> {
        let data = serde_json::to_vec_pretty(history)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, data).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl SelectorStore for JsonFileStore {
    async fn latest(&self, scope_key: &str) -> Result<Option<SelectorRecord>> {
        let mut cache = self.cache.lock().await;
        if cache.is_none() {
            *cache = Some(self.load().await?);
        }
        Ok(cache
            .as_ref()
            .and_then(|h| h.get(scope_key))
            .and_then(|r| newest(r))
            .cloned())
    }

    async fn upsert(&self, record: SelectorRecord) -> Result<()> {
        let mut cache = self.cache.lock().await;
        let mut history = match cache.take() {
            Some(h) => h,
            None => self.load().await?,
        };
        tracing::debug!(scope_key = %record.scope_key, selector = %record.selector, "storing selector");
        push_bounded(&mut history, record, self.max_history);
        let written = self.persist(&history).await;
        *cache = Some(history);
        written
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Records created back to back can share a timestamp; nudge them apart.
    fn later(mut record: SelectorRecord, than: &SelectorRecord) -> SelectorRecord {
        record.created_at = than.created_at + chrono::Duration::seconds(1);
        record
    }

    #[tokio::test]
    async fn memory_store_round_trip() {
        let store = MemoryStore::new();
        store.upsert(SelectorRecord::new("https://example.com/", "div#cookie", "fp1")).await.unwrap();

        let found = store.latest("https://example.com/").await.unwrap().unwrap();
        assert_eq!(found.selector, "div#cookie");
        assert_eq!(found.fingerprint, "fp1");
        assert!(store.latest("example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn latest_record_wins_and_history_is_kept() {
        let store = MemoryStore::new();
        let first = SelectorRecord::new("example.com", "div.old", "a");
        let second = later(SelectorRecord::new("example.com", "div.new", "b"), &first);
        store.upsert(second).await.unwrap();
        store.upsert(first).await.unwrap();

        assert_eq!(store.latest("example.com").await.unwrap().unwrap().selector, "div.new");
        assert_eq!(store.history("example.com").await.len(), 2);
    }

    #[tokio::test]
    async fn history_is_bounded() {
        let store = MemoryStore::new().with_history(2);
        let mut prev = SelectorRecord::new("k", "s0", "f0");
        store.upsert(prev.clone()).await.unwrap();
        for i in 1..5 {
            let next = later(SelectorRecord::new("k", format!("s{i}"), format!("f{i}")), &prev);
            store.upsert(next.clone()).await.unwrap();
            prev = next;
        }
        let history = store.history("k").await;
        assert_eq!(history.len(), 2);
        assert_eq!(store.latest("k").await.unwrap().unwrap().selector, "s4");
    }

    #[tokio::test]
    async fn json_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let folder = dir.path().to_str().unwrap();

        let store = JsonFileStore::new(folder).unwrap();
        store.upsert(SelectorRecord::new("https://example.com/", "div#cookie", "fp")).await.unwrap();
        drop(store);

        let reopened = JsonFileStore::new(folder).unwrap();
        let record = reopened.latest("https://example.com/").await.unwrap().unwrap();
        assert_eq!(record.selector, "div#cookie");
        assert!(reopened.path().exists());
    }

    #[tokio::test]
    async fn json_store_rejects_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let folder = dir.path().to_str().unwrap();
        std::fs::write(dir.path().join("selectors.json"), b"{not json").unwrap();

        let store = JsonFileStore::new(folder).unwrap();
        assert!(store.latest("anything").await.is_err());
    }

    #[test]
    fn json_store_reports_unusable_folder() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"a file, not a folder").unwrap();

        let nested = blocker.join("store");
        let err = JsonFileStore::new(nested.to_str().unwrap()).err().unwrap();
        assert!(format!("{:#}", err).contains("Failed to create store folder"));
    }
}
