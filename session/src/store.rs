//! Currency store collaborator: which currencies exist and which are active.

use parking_lot::RwLock;
use ratekeeper_common::{ConverterError, CurrencyCode, CurrencyEntry, Result};

/// Persistent list of currencies known to the converter.
///
/// Insertion order is display order.
pub trait CurrencyStore: Send + Sync {
    /// Currencies flagged active, in display order.
    fn active_currencies(&self) -> Result<Vec<CurrencyEntry>>;

    /// Seed entries, replacing any with the same code in place.
    fn insert_initial(&self, entries: Vec<CurrencyEntry>) -> Result<()>;

    /// Look up a currency by code.
    fn currency_by_name(&self, name: &CurrencyCode) -> Result<Option<CurrencyEntry>>;

    /// Toggle whether a currency is shown.
    fn set_active(&self, name: &CurrencyCode, active: bool) -> Result<()>;
}

/// Thread-safe in-memory currency store.
pub struct InMemoryCurrencyStore {
    entries: RwLock<Vec<CurrencyEntry>>,
}

impl InMemoryCurrencyStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
        }
    }

    /// Create a store already holding `entries`.
    pub fn with_entries(entries: Vec<CurrencyEntry>) -> Self {
        Self {
            entries: RwLock::new(entries),
        }
    }

    /// Get the number of known currencies.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Check if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl Default for InMemoryCurrencyStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CurrencyStore for InMemoryCurrencyStore {
    fn active_currencies(&self) -> Result<Vec<CurrencyEntry>> {
        Ok(self
            .entries
            .read()
            .iter()
            .filter(|c| c.is_active)
            .cloned()
            .collect())
    }

    fn insert_initial(&self, entries: Vec<CurrencyEntry>) -> Result<()> {
        let mut stored = self.entries.write();
        for entry in entries {
            match stored.iter_mut().find(|c| c.name == entry.name) {
                Some(existing) => *existing = entry,
                None => stored.push(entry),
            }
        }
        Ok(())
    }

    fn currency_by_name(&self, name: &CurrencyCode) -> Result<Option<CurrencyEntry>> {
        Ok(self.entries.read().iter().find(|c| c.name == *name).cloned())
    }

    fn set_active(&self, name: &CurrencyCode, active: bool) -> Result<()> {
        let mut stored = self.entries.write();
        let entry = stored
            .iter_mut()
            .find(|c| c.name == *name)
            .ok_or_else(|| ConverterError::Store(format!("Unknown currency {}", name)))?;
        entry.is_active = active;
        Ok(())
    }
}
