//! Memoized sector lookups.

use crate::collaborators::FundamentalsSource;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Caches sector answers (including "no sector") per symbol.
///
/// The lock is never held across the fundamentals await.
pub struct SectorCache {
    source: Arc<dyn FundamentalsSource>,
    entries: Mutex<HashMap<String, Option<String>>>,
}

impl SectorCache {
    pub fn new(source: Arc<dyn FundamentalsSource>) -> Self {
        Self {
            source,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub async fn sector(&self, symbol: &str) -> Option<String> {
        let cached = self.entries.lock().get(symbol).cloned();
        if let Some(hit) = cached {
            return hit;
        }
        let fetched = self.source.sector(symbol).await;
        self.entries
            .lock()
            .insert(symbol.to_string(), fetched.clone());
        fetched
    }

    /// Seed an answer without asking the source.
    pub fn insert(&self, symbol: impl Into<String>, sector: Option<String>) {
        self.entries.lock().insert(symbol.into(), sector);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
