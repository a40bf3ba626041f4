use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use super::document::{self, OptionTally, VoteDocument, Votes};
use crate::errors::ServiceError;
use crate::metrics;
use crate::storage::{DocumentStorage, JsonFileStorage, Loaded};

/// Per-poll, per-option vote tallies persisted as one JSON document.
///
/// Reads are lock free and tolerate a missing or corrupt document. Every
/// read-modify-write runs under `write_lock`, so concurrent votes on the same
/// instance never lose an increment.
pub struct VoteStore {
    storage: Arc<dyn DocumentStorage>,
    write_lock: Mutex<()>,
}

impl VoteStore {
    pub fn new(storage: Arc<dyn DocumentStorage>) -> Self {
        Self { storage, write_lock: Mutex::new(()) }
    }

    /// File-backed store at `path`. Nothing is created until the first write.
    pub fn open<P: Into<PathBuf>>(path: P) -> Arc<Self> {
        Arc::new(Self::new(Arc::new(JsonFileStorage::new(path))))
    }

    pub fn location(&self) -> String {
        self.storage.location()
    }

    /// Normalized view of the document; empty when absent, corrupt or unreadable.
    pub async fn load(&self) -> Votes {
        match self.storage.load().await {
            Ok(loaded) => self.decode(loaded),
            Err(e) => {
                warn!(error = %e, "vote document unreadable; serving empty store");
                Votes::new()
            }
        }
    }

    fn decode(&self, loaded: Loaded) -> Votes {
        match loaded {
            Loaded::Missing => Votes::new(),
            Loaded::Corrupt { reason } => {
                metrics::CORRUPT_DOCUMENT_TOTAL.inc();
                warn!(path = %self.location(), %reason, "vote document failed to parse; treating as empty");
                Votes::new()
            }
            Loaded::Parsed(value) => {
                let doc = VoteDocument::decode(&value);
                if doc == VoteDocument::Unrecognised {
                    metrics::CORRUPT_DOCUMENT_TOTAL.inc();
                    warn!(path = %self.location(), "vote document is not an object; treating as empty");
                }
                debug!(shape = doc.shape(), "vote document loaded");
                doc.into_votes()
            }
        }
    }

    /// Like `load`, but a read error other than "not found" aborts: writing
    /// after a failed read would replace tallies we never saw.
    async fn load_for_update(&self) -> Result<(Votes, bool), ServiceError> {
        let loaded = self.storage.load().await?;
        let existed = loaded.exists();
        Ok((self.decode(loaded), existed))
    }

    async fn persist(&self, votes: &Votes) -> Result<(), ServiceError> {
        if let Err(e) = self.storage.write_atomic(&document::encode(votes)).await {
            metrics::STORAGE_WRITE_FAILURES_TOTAL.inc();
            error!(path = %self.location(), error = %e, "failed to persist votes");
            return Err(e.into());
        }
        Ok(())
    }

    /// Increment `option_id` of `poll_id` by one and return the poll's tally.
    pub async fn record_vote(&self, poll_id: &str, option_id: &str) -> Result<OptionTally, ServiceError> {
        if poll_id.is_empty() {
            return Err(ServiceError::Validation("poll_id must not be empty".into()));
        }
        if option_id.is_empty() {
            return Err(ServiceError::Validation("option must not be empty".into()));
        }

        let _guard = self.write_lock.lock().await;
        let (mut votes, _) = self.load_for_update().await?;
        let tally = votes.entry(poll_id.to_string()).or_default();
        let count = tally.entry(option_id.to_string()).or_insert(0);
        *count = count.checked_add(1).ok_or_else(|| {
            ServiceError::Validation(format!("tally for {poll_id}/{option_id} is at its maximum"))
        })?;
        let result = tally.clone();

        self.persist(&votes).await?;
        metrics::VOTES_RECORDED_TOTAL.inc();
        info!(%poll_id, option = %option_id, count = result[option_id], "vote saved");
        Ok(result)
    }

    /// Tally for one poll; empty when the poll is unknown.
    pub async fn get_results(&self, poll_id: &str) -> OptionTally {
        self.load().await.remove(poll_id).unwrap_or_default()
    }

    pub async fn get_all(&self) -> Votes {
        self.load().await
    }

    /// The document exactly as stored (canonical or legacy), or `{}`.
    pub async fn get_raw(&self) -> Value {
        match self.storage.load().await {
            Ok(Loaded::Parsed(value)) => value,
            Ok(Loaded::Missing) => Value::Object(Default::default()),
            Ok(Loaded::Corrupt { reason }) => {
                metrics::CORRUPT_DOCUMENT_TOTAL.inc();
                warn!(path = %self.location(), %reason, "raw vote document failed to parse");
                Value::Object(Default::default())
            }
            Err(e) => {
                warn!(error = %e, "raw vote document unreadable");
                Value::Object(Default::default())
            }
        }
    }

    /// Insert an empty tally for every known poll that has none.
    ///
    /// Writes only when something was inserted or no document existed yet,
    /// and returns whether it wrote. A second call with the same ids is a no-op.
    pub async fn ensure_polls(&self, known_poll_ids: &BTreeSet<String>) -> Result<bool, ServiceError> {
        let _guard = self.write_lock.lock().await;
        let (mut votes, existed) = self.load_for_update().await?;

        let mut inserted = 0u64;
        for poll_id in known_poll_ids {
            if !votes.contains_key(poll_id) {
                votes.insert(poll_id.clone(), OptionTally::new());
                inserted += 1;
            }
        }

        if inserted == 0 && existed {
            debug!(known = known_poll_ids.len(), "all known polls present; nothing to write");
            return Ok(false);
        }

        self.persist(&votes).await?;
        metrics::POLLS_BACKFILLED_TOTAL.inc_by(inserted);
        info!(inserted, created = !existed, path = %self.location(), "poll entries backfilled");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use serde_json::json;

    fn memory_store(storage: &Arc<MemoryStorage>) -> VoteStore {
        VoteStore::new(Arc::clone(storage) as Arc<dyn DocumentStorage>)
    }

    fn ids(list: &[&str]) -> BTreeSet<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn counts_accumulate_per_option() -> Result<(), anyhow::Error> {
        let storage = Arc::new(MemoryStorage::new());
        let store = memory_store(&storage);

        store.record_vote("p1", "a").await?;
        store.record_vote("p1", "a").await?;
        let tally = store.record_vote("p1", "b").await?;
        assert_eq!(tally, OptionTally::from([("a".into(), 2), ("b".into(), 1)]));

        let all = store.get_all().await;
        assert_eq!(all.len(), 1);
        assert_eq!(all["p1"], tally);
        assert_eq!(storage.value().await, Some(json!({"votes": {"p1": {"a": 2, "b": 1}}})));
        Ok(())
    }

    #[tokio::test]
    async fn legacy_document_is_upgraded_on_vote() -> Result<(), anyhow::Error> {
        let storage = Arc::new(MemoryStorage::with_value(&json!({"alaska-tour": {"yes": 3}})));
        let store = memory_store(&storage);

        store.record_vote("alaska-tour", "yes").await?;
        assert_eq!(storage.value().await, Some(json!({"votes": {"alaska-tour": {"yes": 4}}})));
        Ok(())
    }

    #[tokio::test]
    async fn raw_keeps_legacy_shape_while_all_normalizes() {
        let legacy = json!({"alaska-tour": {"yes": 3, "no": 1}});
        let storage = Arc::new(MemoryStorage::with_value(&legacy));
        let store = memory_store(&storage);

        assert_eq!(store.get_raw().await, legacy);
        assert_eq!(document::encode(&store.get_all().await), json!({"votes": legacy}));
        assert_eq!(storage.write_count(), 0);
    }

    #[tokio::test]
    async fn missing_and_corrupt_documents_read_as_empty() {
        let store = memory_store(&Arc::new(MemoryStorage::new()));
        assert!(store.get_results("nonexistent").await.is_empty());
        assert_eq!(store.get_raw().await, json!({}));

        let store = memory_store(&Arc::new(MemoryStorage::with_raw("{\"votes\": {\"p1\"")));
        assert!(store.get_all().await.is_empty());
        assert_eq!(store.get_raw().await, json!({}));

        let store = memory_store(&Arc::new(MemoryStorage::with_value(&json!([1, 2, 3]))));
        assert!(store.get_all().await.is_empty());
        // raw still returns what is on disk
        assert_eq!(store.get_raw().await, json!([1, 2, 3]));
    }

    #[tokio::test]
    async fn empty_ids_are_rejected_without_touching_storage() {
        let storage = Arc::new(MemoryStorage::new());
        let store = memory_store(&storage);
        assert!(matches!(store.record_vote("", "a").await, Err(ServiceError::Validation(_))));
        assert!(matches!(store.record_vote("p1", "").await, Err(ServiceError::Validation(_))));
        assert_eq!(storage.write_count(), 0);
        assert_eq!(storage.raw().await, None);
    }

    #[tokio::test]
    async fn whitespace_ids_are_opaque_keys() -> Result<(), anyhow::Error> {
        let storage = Arc::new(MemoryStorage::new());
        let store = memory_store(&storage);
        store.record_vote(" ", "  ").await?;
        assert_eq!(storage.value().await, Some(json!({"votes": {" ": {"  ": 1}}})));
        Ok(())
    }

    #[tokio::test]
    async fn saturated_tally_is_not_wrapped() {
        let before = json!({"votes": {"p": {"a": 18446744073709551615u64}}});
        let storage = Arc::new(MemoryStorage::with_value(&before));
        let store = memory_store(&storage);

        let err = store.record_vote("p", "a").await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
        assert_eq!(storage.write_count(), 0);
        assert_eq!(storage.value().await, Some(before));
        assert_eq!(store.get_results("p").await["a"], u64::MAX);
    }

    #[tokio::test]
    async fn failed_write_propagates_and_keeps_previous_document() {
        let before = json!({"votes": {"p1": {"a": 1}}});
        let storage = Arc::new(MemoryStorage::with_value(&before));
        let store = memory_store(&storage);

        storage.fail_writes(true);
        let err = store.record_vote("p1", "a").await.unwrap_err();
        assert!(matches!(err, ServiceError::Storage(_)));
        assert_eq!(storage.value().await, Some(before));

        storage.fail_writes(false);
        let tally = store.record_vote("p1", "a").await.unwrap();
        assert_eq!(tally["a"], 2);
    }

    #[tokio::test]
    async fn ensure_polls_is_idempotent() -> Result<(), anyhow::Error> {
        let storage = Arc::new(MemoryStorage::with_value(&json!({"votes": {"p1": {"a": 4}}})));
        let store = memory_store(&storage);
        let known = ids(&["p1", "p2", "p3"]);

        assert!(store.ensure_polls(&known).await?);
        let after_first = storage.raw().await;
        assert_eq!(
            storage.value().await,
            Some(json!({"votes": {"p1": {"a": 4}, "p2": {}, "p3": {}}}))
        );

        assert!(!store.ensure_polls(&known).await?);
        assert_eq!(storage.raw().await, after_first);
        assert_eq!(storage.write_count(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn ensure_polls_creates_missing_document_even_without_ids() -> Result<(), anyhow::Error> {
        let storage = Arc::new(MemoryStorage::new());
        let store = memory_store(&storage);

        assert!(store.ensure_polls(&BTreeSet::new()).await?);
        assert_eq!(storage.value().await, Some(json!({"votes": {}})));
        assert!(!store.ensure_polls(&BTreeSet::new()).await?);
        Ok(())
    }

    #[tokio::test]
    async fn ensure_polls_leaves_complete_legacy_file_alone() -> Result<(), anyhow::Error> {
        let legacy = json!({"p1": {"a": 1}});
        let storage = Arc::new(MemoryStorage::with_value(&legacy));
        let store = memory_store(&storage);

        assert!(!store.ensure_polls(&ids(&["p1"])).await?);
        assert_eq!(storage.value().await, Some(legacy));

        assert!(store.ensure_polls(&ids(&["p1", "p2"])).await?);
        assert_eq!(storage.value().await, Some(json!({"votes": {"p1": {"a": 1}, "p2": {}}})));
        Ok(())
    }

    #[tokio::test]
    async fn concurrent_votes_are_not_lost() -> Result<(), anyhow::Error> {
        let tmp = std::env::temp_dir().join(format!("vote_store_{}.json", uuid::Uuid::new_v4()));
        let store = VoteStore::open(&tmp);

        let mut handles = Vec::new();
        for i in 0..40 {
            let store = Arc::clone(&store);
            let option = if i % 2 == 0 { "yes" } else { "no" };
            handles.push(tokio::spawn(async move { store.record_vote("p1", option).await }));
        }
        for h in handles {
            h.await??;
        }

        let results = store.get_results("p1").await;
        assert_eq!(results["yes"], 20);
        assert_eq!(results["no"], 20);

        // a fresh instance over the same file sees the same counts
        let reopened = VoteStore::open(&tmp);
        assert_eq!(reopened.get_results("p1").await, results);

        let _ = tokio::fs::remove_file(&tmp).await;
        Ok(())
    }
}
