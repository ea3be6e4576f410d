//! User-agent classification against the vendor catalog.

use crate::cache::BoundedCache;
use crate::catalog::Catalog;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Default number of memoized user agents.
pub const DEFAULT_CACHE_SIZE: u64 = 5000;

/// Outcome of classifying one user agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationResult {
    /// User agent exactly as received
    pub raw_user_agent: String,
    /// Whether the agent matched a catalog pattern
    pub is_bot: bool,
    /// Vendor of the matching pattern
    pub vendor: Option<String>,
}

impl ClassificationResult {
    fn human(raw_user_agent: &str) -> Self {
        Self {
            raw_user_agent: raw_user_agent.to_string(),
            is_bot: false,
            vendor: None,
        }
    }
}

/// Classifies user agents, memoizing results by raw user-agent string.
pub struct AgentClassifier {
    catalog: Arc<Catalog>,
    cache: BoundedCache<String, ClassificationResult>,
}

impl AgentClassifier {
    /// Create a classifier over `catalog` with a cache of `cache_size` entries.
    pub fn new(catalog: Arc<Catalog>, cache_size: u64) -> Self {
        Self {
            catalog,
            cache: BoundedCache::new("user_agent_classification", cache_size),
        }
    }

    /// Classifier with the built-in catalog and default cache size.
    pub fn with_defaults() -> Self {
        Self::new(Arc::new(Catalog::builtin()), DEFAULT_CACHE_SIZE)
    }

    /// Classify a user agent.
    ///
    /// Empty user agents are never bots and bypass the cache.
    pub fn classify(&self, user_agent: &str) -> ClassificationResult {
        if user_agent.is_empty() {
            return ClassificationResult::human(user_agent);
        }

        self.cache
            .get_or_insert_with(user_agent.to_string(), || self.scan(user_agent))
    }

    /// Vendor for a user agent, if it is a known bot.
    pub fn identify(&self, user_agent: &str) -> Option<String> {
        self.classify(user_agent).vendor
    }

    pub fn is_bot(&self, user_agent: &str) -> bool {
        self.classify(user_agent).is_bot
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Number of memoized user agents.
    pub fn cached_entries(&self) -> u64 {
        self.cache.sync();
        self.cache.entry_count()
    }

    /// Uncached catalog scan.
    fn scan(&self, user_agent: &str) -> ClassificationResult {
        let ua_lower = user_agent.to_lowercase();

        match self.catalog.find_vendor(&ua_lower) {
            Some(vendor) => ClassificationResult {
                raw_user_agent: user_agent.to_string(),
                is_bot: true,
                vendor: Some(vendor.to_string()),
            },
            None => ClassificationResult::human(user_agent),
        }
    }
}

impl Default for AgentClassifier {
    fn default() -> Self {
        Self::with_defaults()
    }
}
