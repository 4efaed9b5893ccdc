use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::time::Instant;

// Rate limit entry - tracks requests per key inside one window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitEntry {
    pub count: u32,
    pub reset_time: Instant,
}

impl RateLimitEntry {
    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.reset_time
    }
}

/// Keyed counter storage behind the rate limiter.
///
/// The in-memory map is the only backend shipped here; a shared cache can
/// implement the same trait for multi-instance deployments. `upsert` must be
/// atomic per key so increment-then-compare cannot interleave.
pub trait RateLimitStore: Send + Sync + 'static {
    fn get(&self, key: &str) -> Option<RateLimitEntry>;

    fn set(&self, key: &str, entry: RateLimitEntry);

    fn delete(&self, key: &str);

    /// Read-modify-write one key under the store's lock for that key.
    fn upsert(
        &self,
        key: &str,
        update: &mut dyn FnMut(Option<RateLimitEntry>) -> RateLimitEntry,
    ) -> RateLimitEntry;

    /// Drop every entry whose window ended before `now`. Returns how many went.
    fn sweep(&self, now: Instant) -> usize;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Default)]
pub struct MemoryStore {
    entries: DashMap<String, RateLimitEntry>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RateLimitStore for MemoryStore {
    fn get(&self, key: &str) -> Option<RateLimitEntry> {
        self.entries.get(key).map(|e| *e)
    }

    fn set(&self, key: &str, entry: RateLimitEntry) {
        self.entries.insert(key.to_string(), entry);
    }

    fn delete(&self, key: &str) {
        self.entries.remove(key);
    }

    fn upsert(
        &self,
        key: &str,
        update: &mut dyn FnMut(Option<RateLimitEntry>) -> RateLimitEntry,
    ) -> RateLimitEntry {
        // entry() holds the shard write lock until the guard drops
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                let next = update(Some(*occupied.get()));
                occupied.insert(next);
                next
            }
            Entry::Vacant(vacant) => {
                let next = update(None);
                vacant.insert(next);
                next
            }
        }
    }

    fn sweep(&self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        before.saturating_sub(self.entries.len())
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn sweep_drops_only_expired_entries() {
        let store = MemoryStore::new();
        let now = Instant::now();
        store.set("old", RateLimitEntry { count: 3, reset_time: now });
        store.set(
            "fresh",
            RateLimitEntry { count: 1, reset_time: now + Duration::from_secs(60) },
        );

        assert_eq!(store.sweep(now + Duration::from_millis(1)), 1);
        assert!(store.get("old").is_none());
        assert_eq!(store.get("fresh").map(|e| e.count), Some(1));
    }

    #[test]
    fn upsert_sees_previous_value() {
        let store = MemoryStore::new();
        let reset_time = Instant::now() + Duration::from_secs(1);

        let first = store.upsert("k", &mut |prev| {
            assert!(prev.is_none());
            RateLimitEntry { count: 1, reset_time }
        });
        let second = store.upsert("k", &mut |prev| {
            let prev = prev.unwrap();
            RateLimitEntry { count: prev.count + 1, ..prev }
        });

        assert_eq!(first.count, 1);
        assert_eq!(second.count, 2);
        store.delete("k");
        assert!(store.is_empty());
    }
}
