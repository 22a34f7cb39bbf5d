//! Mapping store: a bounded, insertion-ordered `(exchange, variant) → input text`.
//!
//! Eviction is FIFO by first insertion and deliberately not exchange-aware:
//! once the store grows past its capacity the oldest keys go, even if they
//! belong to the exchange currently on screen. Overwriting an existing key
//! keeps its original slot.

use std::collections::{BTreeSet, HashMap, VecDeque};

use swipelink_core::{ExchangeId, MappingKey};
use tracing::debug;

/// Default capacity of the mapping store.
pub const MAX_ENTRIES: usize = 100;

/// Bounded map from variant key to the input text that produced it.
#[derive(Clone, Debug)]
pub struct MappingStore {
    capacity: usize,
    order: VecDeque<MappingKey>,
    values: HashMap<MappingKey, String>,
}

impl Default for MappingStore {
    fn default() -> Self {
        Self::with_capacity(MAX_ENTRIES)
    }
}

impl MappingStore {
    /// Create an empty store holding at most `capacity` entries.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            order: VecDeque::with_capacity(capacity + 1),
            values: HashMap::with_capacity(capacity + 1),
        }
    }

    /// Maximum number of entries kept after an insert.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Insert or overwrite `key`, then evict overflow.
    ///
    /// Returns the number of entries evicted.
    pub fn set(&mut self, key: MappingKey, text: impl Into<String>) -> usize {
        let text = text.into();
        if let Some(slot) = self.values.get_mut(&key) {
            *slot = text;
            return 0;
        }
        let _ = self.values.insert(key, text);
        self.order.push_back(key);
        self.evict_overflow()
    }

    /// Insert `key` only if it has no entry yet. Returns whether it was inserted.
    pub fn set_if_absent(&mut self, key: MappingKey, text: impl Into<String>) -> bool {
        if self.values.contains_key(&key) {
            return false;
        }
        let _ = self.set(key, text);
        true
    }

    /// Text stored under `key`.
    pub fn get(&self, key: &MappingKey) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Whether `key` has an entry.
    pub fn contains(&self, key: &MappingKey) -> bool {
        self.values.contains_key(key)
    }

    /// Remove `key`, returning its text.
    pub fn remove(&mut self, key: &MappingKey) -> Option<String> {
        let text = self.values.remove(key)?;
        self.order.retain(|k| k != key);
        Some(text)
    }

    /// Remove every entry.
    pub fn clear(&mut self) {
        self.order.clear();
        self.values.clear();
    }

    /// Drop the oldest entries until the store is within capacity.
    ///
    /// Returns the number of entries evicted.
    pub fn evict_overflow(&mut self) -> usize {
        let overflow = self.order.len().saturating_sub(self.capacity);
        for key in self.order.drain(..overflow) {
            let _ = self.values.remove(&key);
        }
        if overflow > 0 {
            debug!(evicted = overflow, "evicted oldest mappings");
        }
        overflow
    }

    /// Keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &MappingKey> {
        self.order.iter()
    }

    /// Distinct exchanges referenced by stored keys.
    pub fn exchanges(&self) -> BTreeSet<ExchangeId> {
        self.order.iter().map(|k| k.exchange).collect()
    }

    /// Remove every entry of `exchange`. Returns how many were removed.
    pub fn remove_exchange(&mut self, exchange: ExchangeId) -> usize {
        let before = self.order.len();
        self.order.retain(|k| !k.is_for(exchange));
        self.values.retain(|k, _| !k.is_for(exchange));
        before - self.order.len()
    }

    /// Delete the entry for one variant and renumber the higher variants of
    /// the same exchange down by one, keeping each entry's slot.
    ///
    /// Returns how many entries were renumbered.
    pub fn remove_variant(&mut self, exchange: ExchangeId, variant: usize) -> usize {
        let _ = self.remove(&MappingKey::new(exchange, variant));

        let mut shifted: Vec<MappingKey> = self
            .order
            .iter()
            .filter(|k| k.is_for(exchange) && k.variant > variant)
            .copied()
            .collect();
        shifted.sort_by(|a, b| b.variant.cmp(&a.variant));

        // Lift every value out before reinserting so no rename reads a slot
        // another rename already wrote.
        let lifted: Vec<(usize, String)> = shifted
            .iter()
            .filter_map(|k| self.values.remove(k).map(|text| (k.variant, text)))
            .collect();
        for (old_variant, text) in lifted {
            let _ = self
                .values
                .insert(MappingKey::new(exchange, old_variant - 1), text);
        }
        for key in &mut self.order {
            if key.is_for(exchange) && key.variant > variant {
                key.variant -= 1;
            }
        }
        shifted.len()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
