//! Query Store
//!
//! The ordered collection of a user's saved queries for one provider. The store is the
//! only writer of the persisted blob: every mutation rewrites the whole collection
//! through the [`ConfigStore`] while holding the collection lock, so writers never
//! interleave.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::{NormalizedQuery, Normalizer, QueryId};
use crate::config::{queries_key, ConfigStore};
use crate::error::{QueryError, QueryResult};
use crate::provider::ProviderId;

pub const DESCRIPTION_MIN_CHARS: usize = 5;
pub const DESCRIPTION_MAX_CHARS: usize = 150;

/// A saved search or collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedQuery {
    pub id: QueryId,
    pub description: String,
    pub url: NormalizedQuery,
    pub active: bool,
}

/// On-disk shape of one entry. The identity is recomputed on load.
#[derive(Debug, Serialize, Deserialize)]
struct PersistedQuery {
    description: String,
    url: String,
    active: bool,
}

impl From<&SavedQuery> for PersistedQuery {
    fn from(query: &SavedQuery) -> Self {
        PersistedQuery {
            description: query.description.clone(),
            url: query.url.as_str().to_string(),
            active: query.active,
        }
    }
}

/// Checks the 5-150 printable character constraint.
pub fn validate_description(description: &str) -> QueryResult<()> {
    let count = description.chars().count();
    if count < DESCRIPTION_MIN_CHARS || count > DESCRIPTION_MAX_CHARS {
        return Err(QueryError::InvalidDescription(format!(
            "must be between {DESCRIPTION_MIN_CHARS} and {DESCRIPTION_MAX_CHARS} characters, got {count}"
        )));
    }
    if description.trim().is_empty() {
        return Err(QueryError::InvalidDescription("must not be blank".to_string()));
    }
    if let Some(c) = description.chars().find(|c| c.is_control() || is_format_char(*c)) {
        return Err(QueryError::InvalidDescription(format!(
            "contains non-printable character {:?}",
            c
        )));
    }
    Ok(())
}

/// Unicode general category `Cf`: invisible format characters.
fn is_format_char(c: char) -> bool {
    matches!(
        c,
        '\u{00AD}'
            | '\u{0600}'..='\u{0605}'
            | '\u{061C}'
            | '\u{06DD}'
            | '\u{070F}'
            | '\u{0890}'..='\u{0891}'
            | '\u{08E2}'
            | '\u{180E}'
            | '\u{200B}'..='\u{200F}'
            | '\u{202A}'..='\u{202E}'
            | '\u{2060}'..='\u{2064}'
            | '\u{2066}'..='\u{206F}'
            | '\u{FEFF}'
            | '\u{FFF9}'..='\u{FFFB}'
            | '\u{110BD}'
            | '\u{110CD}'
            | '\u{13430}'..='\u{1343F}'
            | '\u{1BCA0}'..='\u{1BCA3}'
            | '\u{1D173}'..='\u{1D17A}'
            | '\u{E0001}'
            | '\u{E0020}'..='\u{E007F}'
    )
}

pub struct QueryStore {
    normalizer: Normalizer,
    config: Arc<dyn ConfigStore>,
    key: String,
    queries: Mutex<Vec<SavedQuery>>,
}

impl QueryStore {
    /// Opens the store for the normalizer's provider, hydrating it from `config`.
    ///
    /// Stored URLs are re-normalized; entries that no longer normalize or that repeat an
    /// earlier identity are dropped with a warning. A blob that isn't valid JSON fails.
    pub fn open(normalizer: Normalizer, config: Arc<dyn ConfigStore>) -> QueryResult<Self> {
        let provider = normalizer.provider().id();
        let key = queries_key(provider.name());

        let raw = config.get_string(&key, "[]");
        let raw = if raw.trim().is_empty() { "[]" } else { raw.as_str() };
        let persisted: Vec<PersistedQuery> = serde_json::from_str(raw).map_err(|e| {
            error!("Stored {} queries are corrupt: {}", provider, e);
            QueryError::Persistence(e.into())
        })?;

        let mut queries: Vec<SavedQuery> = Vec::with_capacity(persisted.len());
        for entry in persisted {
            let url = match normalizer.normalize(&entry.url) {
                Ok(url) => url,
                Err(e) => {
                    warn!("Dropping stored {} query '{}': {}", provider, entry.url, e);
                    continue;
                }
            };
            let id = QueryId::of(&url);
            if queries.iter().any(|q| q.id == id) {
                warn!("Dropping duplicate stored {} query '{}'", provider, url);
                continue;
            }
            queries.push(SavedQuery {
                id,
                description: entry.description,
                url,
                active: entry.active,
            });
        }

        info!("Loaded {} saved {} queries", queries.len(), provider);
        Ok(Self {
            normalizer,
            config,
            key,
            queries: Mutex::new(queries),
        })
    }

    pub fn provider(&self) -> ProviderId {
        self.normalizer.provider().id()
    }

    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    /// Validates, normalizes and prepends a new query, then persists.
    ///
    /// On a `Persistence` error the query has still been added in memory.
    pub fn add_query(&self, description: &str, raw_url: &str, active: bool) -> QueryResult<QueryId> {
        let url = self.normalizer.normalize(raw_url)?;
        let id = QueryId::of(&url);
        validate_description(description)?;

        let mut queries = self.queries.lock();
        if let Some(existing) = queries.iter().find(|q| q.id == id) {
            if existing.url != url {
                return Err(QueryError::IdentityCollision {
                    id,
                    existing: existing.url.to_string(),
                    incoming: url.into_string(),
                });
            }
            return Err(QueryError::DuplicateQuery(id));
        }

        queries.insert(
            0,
            SavedQuery {
                id: id.clone(),
                description: description.to_string(),
                url,
                active,
            },
        );
        info!("Added {} query {} ('{}')", self.provider(), id.short(), description);

        self.persist(&queries)?;
        Ok(id)
    }

    pub fn remove_query(&self, id: &QueryId) -> QueryResult<()> {
        let mut queries = self.queries.lock();
        let index = queries
            .iter()
            .position(|q| &q.id == id)
            .ok_or_else(|| QueryError::NotFound(id.clone()))?;

        let removed = queries.remove(index);
        info!("Removed {} query {} ('{}')", self.provider(), id.short(), removed.description);
        self.persist(&queries)
    }

    pub fn enable_query(&self, id: &QueryId) -> QueryResult<()> {
        self.set_active(id, true)
    }

    pub fn disable_query(&self, id: &QueryId) -> QueryResult<()> {
        self.set_active(id, false)
    }

    fn set_active(&self, id: &QueryId, active: bool) -> QueryResult<()> {
        let mut queries = self.queries.lock();
        let query = queries
            .iter_mut()
            .find(|q| &q.id == id)
            .ok_or_else(|| QueryError::NotFound(id.clone()))?;

        query.active = active;
        info!(
            "{} {} query {}",
            if active { "Enabled" } else { "Disabled" },
            self.provider(),
            id.short()
        );
        self.persist(&queries)
    }

    /// Snapshot of all queries, newest first.
    pub fn list_queries(&self) -> Vec<SavedQuery> {
        self.queries.lock().clone()
    }

    /// Snapshot of the enabled queries, newest first.
    pub fn active_queries(&self) -> Vec<SavedQuery> {
        self.queries
            .lock()
            .iter()
            .filter(|q| q.active)
            .cloned()
            .collect()
    }

    pub fn get_query(&self, id: &QueryId) -> Option<SavedQuery> {
        self.queries.lock().iter().find(|q| &q.id == id).cloned()
    }

    /// Writes the current collection again, e.g. after a failed flush.
    pub fn flush(&self) -> QueryResult<()> {
        let queries = self.queries.lock();
        self.persist(&queries)
    }

    fn persist(&self, queries: &[SavedQuery]) -> QueryResult<()> {
        let persisted: Vec<PersistedQuery> = queries.iter().map(PersistedQuery::from).collect();
        let json = serde_json::to_string(&persisted).map_err(|e| QueryError::Persistence(e.into()))?;

        self.config.set_string(&self.key, &json).map_err(|e| {
            error!("Failed to persist {} queries: {}", self.provider(), e);
            QueryError::Persistence(e)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigError, ConfigResult, MemoryConfigStore};
    use crate::provider::ProviderDefinition;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;

    const CATS: &str = "https://svc/search?q=cats";

    fn normalizer() -> Normalizer {
        Normalizer::new(Arc::new(ProviderDefinition::wallhaven_at("https://svc")))
    }

    fn open(config: Arc<dyn ConfigStore>) -> QueryStore {
        QueryStore::open(normalizer(), config).unwrap()
    }

    /// Store whose writes can be switched to fail.
    #[derive(Default)]
    struct FlakyStore {
        inner: MemoryConfigStore,
        failing: AtomicBool,
    }

    impl ConfigStore for FlakyStore {
        fn get_string(&self, key: &str, fallback: &str) -> String {
            self.inner.get_string(key, fallback)
        }

        fn set_string(&self, key: &str, value: &str) -> ConfigResult<()> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(ConfigError::Rejected("disk full".to_string()));
            }
            self.inner.set_string(key, value)
        }
    }

    #[test]
    fn test_add_rejects_duplicates() {
        let store = open(Arc::new(MemoryConfigStore::new()));

        store.add_query("first cats", CATS, true).unwrap();
        let second = store.add_query("second cats", "https://svc/api/v1/search?q=cats&page=2", true);

        assert!(matches!(second, Err(QueryError::DuplicateQuery(_))));
        assert_eq!(store.list_queries().len(), 1);
        assert_eq!(store.list_queries()[0].description, "first cats");
    }

    #[test]
    fn test_lifecycle() {
        let store = open(Arc::new(MemoryConfigStore::new()));

        let id = store.add_query("cat pictures", CATS, true).unwrap();
        store.disable_query(&id).unwrap();
        assert!(!store.list_queries()[0].active);
        assert!(store.active_queries().is_empty());

        store.enable_query(&id).unwrap();
        assert!(store.get_query(&id).unwrap().active);

        store.remove_query(&id).unwrap();
        assert!(store.list_queries().iter().all(|q| q.id != id));
        assert!(store.get_query(&id).is_none());
    }

    #[test]
    fn test_newest_first() {
        let store = open(Arc::new(MemoryConfigStore::new()));
        let cats = store.add_query("cat pictures", CATS, true).unwrap();
        let dogs = store.add_query("dog pictures", "https://svc/search?q=dogs", false).unwrap();

        let ids: Vec<QueryId> = store.list_queries().into_iter().map(|q| q.id).collect();
        assert_eq!(ids, vec![dogs, cats]);
    }

    #[test]
    fn test_validation_errors_surface() {
        let store = open(Arc::new(MemoryConfigStore::new()));

        assert!(matches!(
            store.add_query("cat", CATS, true),
            Err(QueryError::InvalidDescription(_))
        ));
        assert!(matches!(
            store.add_query(&"x".repeat(151), CATS, true),
            Err(QueryError::InvalidDescription(_))
        ));
        assert!(matches!(
            store.add_query("bad\u{7}bell", CATS, true),
            Err(QueryError::InvalidDescription(_))
        ));
        assert!(matches!(
            store.add_query("valid description", "https://unrelated.example.com", true),
            Err(QueryError::UnsupportedUrl(_))
        ));
        assert!(store.list_queries().is_empty());

        let missing = QueryId::from_hex("deadbeef");
        assert!(matches!(store.remove_query(&missing), Err(QueryError::NotFound(_))));
        assert!(matches!(store.enable_query(&missing), Err(QueryError::NotFound(_))));
        assert!(matches!(store.disable_query(&missing), Err(QueryError::NotFound(_))));
    }

    #[test]
    fn test_description_limits() {
        assert!(validate_description("12345").is_ok());
        assert!(validate_description(&"é".repeat(150)).is_ok());
        assert!(validate_description("     ").is_err());
        assert!(validate_description("line\nbreak").is_err());
    }

    #[test]
    fn test_description_rejects_invisible_format_chars() {
        assert!(validate_description("cats\u{200B}dogs").is_err());
        assert!(validate_description("\u{FEFF}sunset").is_err());
        assert!(validate_description(&"\u{200B}".repeat(6)).is_err());
        assert!(validate_description("right\u{202E}to left").is_err());
        assert!(validate_description("café au lait 🌅").is_ok());
    }

    #[test]
    fn test_persists_and_rehydrates() {
        let config: Arc<dyn ConfigStore> = Arc::new(MemoryConfigStore::new());
        let store = open(config.clone());
        let cats = store.add_query("cat pictures", CATS, true).unwrap();
        let dogs = store.add_query("dog pictures", "https://svc/user/Alice/favorites/42", false).unwrap();
        drop(store);

        let raw = config.get_string("wallhaven_queries", "");
        let blob: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(blob[0]["url"], "https://svc/api/v1/collections/Alice/42");
        assert_eq!(blob[0]["active"], false);
        assert!(blob[0].get("id").is_none());

        let reopened = open(config);
        let queries = reopened.list_queries();
        assert_eq!(queries.len(), 2);
        assert_eq!(queries[0].id, dogs);
        assert_eq!(queries[1].id, cats);
        assert!(!queries[0].active);
    }

    #[test]
    fn test_hydration_drops_bad_entries() {
        let blob = serde_json::json!([
            { "description": "cat pictures", "url": "https://svc/api/v1/search?q=cats", "active": true },
            { "description": "cats again", "url": "https://svc/search?q=cats&page=9", "active": false },
            { "description": "somewhere else", "url": "https://unrelated.example.com", "active": true }
        ]);
        let config = Arc::new(MemoryConfigStore::with_values([("wallhaven_queries", blob.to_string())]));

        let store = open(config);
        let queries = store.list_queries();
        assert_eq!(queries.len(), 1);
        assert_eq!(queries[0].description, "cat pictures");
    }

    #[test]
    fn test_corrupt_blob_fails_open() {
        let config = Arc::new(MemoryConfigStore::with_values([("wallhaven_queries", "{not json")]));
        assert!(matches!(
            QueryStore::open(normalizer(), config),
            Err(QueryError::Persistence(_))
        ));

        let blank = Arc::new(MemoryConfigStore::with_values([("wallhaven_queries", "  ")]));
        assert!(QueryStore::open(normalizer(), blank).unwrap().list_queries().is_empty());
    }

    #[test]
    fn test_persistence_failure_keeps_memory_state() {
        let config = Arc::new(FlakyStore::default());
        let store = open(config.clone());

        config.failing.store(true, Ordering::SeqCst);
        let result = store.add_query("cat pictures", CATS, true);
        assert!(matches!(result, Err(QueryError::Persistence(_))));
        assert_eq!(store.list_queries().len(), 1);
        assert_eq!(config.get_string("wallhaven_queries", "unset"), "unset");

        config.failing.store(false, Ordering::SeqCst);
        store.flush().unwrap();
        assert!(config.get_string("wallhaven_queries", "").contains("cat pictures"));
    }

    #[test]
    fn test_concurrent_adds_are_serialized() {
        let config: Arc<dyn ConfigStore> = Arc::new(MemoryConfigStore::new());
        let store = Arc::new(open(config.clone()));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                thread::spawn(move || {
                    store
                        .add_query(&format!("query number {i}"), &format!("https://svc/search?q=tag{i}"), true)
                        .unwrap()
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.list_queries().len(), 8);
        let reopened = open(config);
        assert_eq!(reopened.list_queries().len(), 8);
    }
}
