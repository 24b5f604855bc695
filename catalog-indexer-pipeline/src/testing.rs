//! Test doubles shared by the pipeline tests.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use catalog_indexer_repository::{
    IdentityStore, MemoryStore, SearchEngineClient, SearchError, StoreError, StoreTransaction,
};
use catalog_indexer_shared::{Entry, EntryId, SearchQuery, SearchResponse};

/// In-memory search engine that records documents by identity.
pub struct MockSearchClient {
    documents: Mutex<HashMap<EntryId, Entry>>,
    pub index_calls: AtomicUsize,
    pub delete_calls: AtomicUsize,
    pub recreate_calls: AtomicUsize,
    successful_index_calls: Option<usize>,
}

impl MockSearchClient {
    pub fn new() -> Self {
        Self {
            documents: Mutex::new(HashMap::new()),
            index_calls: AtomicUsize::new(0),
            delete_calls: AtomicUsize::new(0),
            recreate_calls: AtomicUsize::new(0),
            successful_index_calls: None,
        }
    }

    /// A client whose `bulk_index` fails after `calls` successful calls.
    pub fn failing_after(calls: usize) -> Self {
        Self {
            successful_index_calls: Some(calls),
            ..Self::new()
        }
    }

    pub fn document_ids(&self) -> HashSet<EntryId> {
        self.documents.lock().unwrap().keys().cloned().collect()
    }

    pub fn document(&self, id: &EntryId) -> Option<Entry> {
        self.documents.lock().unwrap().get(id).cloned()
    }

    pub fn seed(&self, entries: &[Entry]) {
        let mut documents = self.documents.lock().unwrap();
        for entry in entries {
            documents.insert(entry.id(), entry.clone());
        }
    }
}

#[async_trait]
impl SearchEngineClient for MockSearchClient {
    async fn search(&self, _query: &SearchQuery) -> Result<SearchResponse, SearchError> {
        Ok(SearchResponse::empty())
    }

    async fn bulk_index(&self, entries: &[Entry]) -> Result<(), SearchError> {
        let call = self.index_calls.fetch_add(1, Ordering::SeqCst);
        if matches!(self.successful_index_calls, Some(limit) if call >= limit) {
            return Err(SearchError::bulk_index("mock failure"));
        }

        self.seed(entries);
        Ok(())
    }

    async fn bulk_delete(&self, ids: &[EntryId]) -> Result<(), SearchError> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        let mut documents = self.documents.lock().unwrap();
        for id in ids {
            documents.remove(id);
        }
        Ok(())
    }

    async fn recreate_index(&self) -> Result<(), SearchError> {
        self.recreate_calls.fetch_add(1, Ordering::SeqCst);
        self.documents.lock().unwrap().clear();
        Ok(())
    }

    async fn health_check(&self) -> Result<bool, SearchError> {
        Ok(true)
    }
}

/// Store whose `map_put` and `set_add` report the store as unavailable for
/// the first `failures` calls, then delegate to an inner `MemoryStore`.
pub struct FlakyStore {
    pub inner: MemoryStore,
    failures: usize,
    pub write_calls: AtomicUsize,
}

impl FlakyStore {
    pub fn new(failures: usize) -> Self {
        Self {
            inner: MemoryStore::new(),
            failures,
            write_calls: AtomicUsize::new(0),
        }
    }

    fn write_attempt(&self) -> Result<(), StoreError> {
        let call = self.write_calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            return Err(StoreError::unavailable("connection reset"));
        }
        Ok(())
    }
}

#[async_trait]
impl IdentityStore for FlakyStore {
    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        self.inner.exists(key).await
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.inner.delete(key).await
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.inner.set(key, value).await
    }

    async fn create_set(&self, key: &str) -> Result<(), StoreError> {
        self.inner.create_set(key).await
    }

    async fn set_add(&self, key: &str, ids: &[EntryId]) -> Result<u64, StoreError> {
        self.write_attempt()?;
        self.inner.set_add(key, ids).await
    }

    async fn set_card(&self, key: &str) -> Result<u64, StoreError> {
        self.inner.set_card(key).await
    }

    async fn set_members(&self, key: &str) -> Result<Vec<EntryId>, StoreError> {
        self.inner.set_members(key).await
    }

    async fn set_pop(&self, key: &str, count: usize) -> Result<Vec<EntryId>, StoreError> {
        self.inner.set_pop(key, count).await
    }

    async fn diff_store(&self, destination: &str, from: &str, minus: &str) -> Result<u64, StoreError> {
        self.inner.diff_store(destination, from, minus).await
    }

    async fn map_put(&self, key: &str, entries: &[Entry]) -> Result<(), StoreError> {
        self.write_attempt()?;
        self.inner.map_put(key, entries).await
    }

    async fn map_get_many(&self, key: &str, ids: &[EntryId]) -> Result<Vec<Option<Entry>>, StoreError> {
        self.inner.map_get_many(key, ids).await
    }

    async fn map_remove(&self, key: &str, ids: &[EntryId]) -> Result<(), StoreError> {
        self.inner.map_remove(key, ids).await
    }

    async fn map_retain(&self, key: &str, set_key: &str) -> Result<u64, StoreError> {
        self.inner.map_retain(key, set_key).await
    }

    async fn exec(&self, transaction: StoreTransaction) -> Result<(), StoreError> {
        self.inner.exec(transaction).await
    }
}

/// An entry with the given title and otherwise fixed content.
pub fn entry(title: &str) -> Entry {
    Entry {
        channel: "ARD".to_string(),
        topic: "Tatort".to_string(),
        title: title.to_string(),
        timestamp: 1580526240,
        duration: 5400,
        url_video: format!("http://example.com/{}.mp4", title),
        ..Default::default()
    }
}

/// Store `entries` as records and add their identities to `set_key`.
pub async fn stage(store: &MemoryStore, set_key: &str, map_key: &str, entries: &[Entry]) -> Vec<EntryId> {
    let ids: Vec<EntryId> = entries.iter().map(Entry::id).collect();
    store.map_put(map_key, entries).await.unwrap();
    store.set_add(set_key, &ids).await.unwrap();
    ids
}
