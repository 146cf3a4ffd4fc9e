//! The alias-decoration cache used when building block responses.
//!
//! Aliasing is best-effort and cacheable: a request may see a stale numeric
//! id if an entity's alias was assigned after the cached miss.

use lru::LruCache;
use mirror_domain::{AccountId, MirrorError};
use mirror_storage::AccountRepository;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use prometheus::{register_int_counter_vec, IntCounterVec};
use std::num::NonZeroUsize;

static ALIAS_CACHE_LOOKUPS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "mirror_rosetta_entity_cache_lookups_total",
        "Alias cache lookups, by outcome",
        &["outcome"]
    )
    .expect("metric registration")
});

/// Maps encoded entity ids to their resolved account identifiers, evicting
/// least-recently-used entries at the configured capacity. Safe for parallel
/// request handlers; updates are last-writer-wins.
pub struct AliasCache {
    entries: Mutex<LruCache<i64, AccountId>>,
}

impl AliasCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).expect("capacity is at least 1");
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Resolve an operation account to its alias form, delegating to the
    /// account repository on a miss and caching the answer. Alias-form inputs
    /// have no numeric key and pass through untouched.
    pub async fn resolve(
        &self,
        account_id: AccountId,
        repo: &dyn AccountRepository,
    ) -> Result<AccountId, MirrorError> {
        let key = account_id.encoded();
        if key == 0 {
            return Ok(account_id);
        }

        if let Some(cached) = self.entries.lock().get(&key).cloned() {
            ALIAS_CACHE_LOOKUPS.with_label_values(&["hit"]).inc();
            return Ok(cached);
        }

        ALIAS_CACHE_LOOKUPS.with_label_values(&["miss"]).inc();
        let resolved = repo.get_account_alias(account_id).await?;
        self.entries.lock().put(key, resolved.clone());
        Ok(resolved)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
