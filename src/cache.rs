//! Byte-budgeted LRU response store.
//!
//! The eviction policy is our own — a fixed byte budget, not the `lru`
//! crate's count-based capacity — but the recency structure (intrusive
//! list + hash index, O(1) `get`/`put`) is reused verbatim from `lru`.
//! `LruCache::unbounded()` gives us that structure without its own
//! capacity ever kicking in; we evict LR-first ourselves whenever an
//! insert would push `used_bytes` over `capacity_bytes`.

use bytes::Bytes;
use lru::LruCache;
use std::sync::{Arc, Mutex};

#[derive(Clone, Debug, PartialEq, Eq)]
struct Entry {
    payload: Bytes,
    size: usize,
}

struct Inner {
    entries: LruCache<Vec<u8>, Entry>,
    capacity_bytes: usize,
    used_bytes: usize,
}

impl Inner {
    fn lookup(&mut self, key: &[u8]) -> Option<Bytes> {
        self.entries.get(key).map(|entry| entry.payload.clone())
    }

    fn insert(&mut self, key: Vec<u8>, payload: Bytes) {
        let size = payload.len();
        if size > self.capacity_bytes {
            return;
        }

        if let Some(old) = self.entries.pop(&key) {
            self.used_bytes -= old.size;
        }

        while self.used_bytes + size > self.capacity_bytes {
            match self.entries.pop_lru() {
                Some((_, evicted)) => self.used_bytes -= evicted.size,
                None => break,
            }
        }

        self.entries.put(key, Entry { payload, size });
        self.used_bytes += size;
    }
}

/// Shared handle to the store. Cheap to clone; all clones see the same
/// underlying cache.
#[derive(Clone)]
pub struct Cache {
    inner: Arc<Mutex<Inner>>,
}

impl Cache {
    /// `capacity_bytes` is fixed for the lifetime of the cache.
    pub fn new(capacity_bytes: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                entries: LruCache::unbounded(),
                capacity_bytes,
                used_bytes: 0,
            })),
        }
    }

    /// Exact byte-equality lookup by request-line key. On hit, the entry
    /// becomes most-recently-used before this call returns.
    pub fn lookup(&self, key: &[u8]) -> Option<Bytes> {
        self.inner.lock().unwrap().lookup(key)
    }

    /// Inserts `payload` under `key`, evicting least-recently-used entries
    /// until there is room. Silently drops the insert if `payload` alone
    /// exceeds the cache's capacity. A pre-existing entry under `key` is
    /// replaced and moved to most-recently-used.
    pub fn insert(&self, key: Vec<u8>, payload: Bytes) {
        self.inner.lock().unwrap().insert(key, payload);
    }

    /// Total bytes currently held across all entries.
    pub fn len_bytes(&self) -> usize {
        self.inner.lock().unwrap().used_bytes
    }

    /// Number of entries currently held.
    pub fn len_entries(&self) -> usize {
        self.inner.lock().unwrap().entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bytes_of(n: usize) -> Bytes {
        Bytes::from(vec![0u8; n])
    }

    #[test]
    fn miss_on_empty_cache() {
        let cache = Cache::new(1_000_000);
        assert!(cache.lookup(b"GET /a HTTP/1.1").is_none());
    }

    #[test]
    fn hit_after_insert_and_recency_bump() {
        let cache = Cache::new(1_000_000);
        cache.insert(b"GET /a HTTP/1.1".to_vec(), bytes_of(10));
        assert_eq!(cache.lookup(b"GET /a HTTP/1.1").unwrap().len(), 10);
        assert_eq!(cache.len_bytes(), 10);
    }

    #[test]
    fn oversize_entry_is_silently_dropped() {
        let cache = Cache::new(100);
        cache.insert(b"GET /big HTTP/1.1".to_vec(), bytes_of(101));
        assert_eq!(cache.len_bytes(), 0);
        assert!(cache.lookup(b"GET /big HTTP/1.1").is_none());
    }

    #[test]
    fn duplicate_key_replaces_rather_than_duplicates() {
        let cache = Cache::new(1_000_000);
        cache.insert(b"GET /a HTTP/1.1".to_vec(), bytes_of(10));
        cache.insert(b"GET /a HTTP/1.1".to_vec(), bytes_of(20));
        assert_eq!(cache.len_entries(), 1);
        assert_eq!(cache.len_bytes(), 20);
    }

    #[test]
    fn eviction_scenario_from_spec() {
        // capacity 1_000_000 bytes; K1, K2, K3 each 400_000 bytes.
        let cache = Cache::new(1_000_000);
        cache.insert(b"K1".to_vec(), bytes_of(400_000));
        cache.insert(b"K2".to_vec(), bytes_of(400_000));
        cache.insert(b"K3".to_vec(), bytes_of(400_000));

        // Touch K1 again -> K1 becomes MR.
        assert!(cache.lookup(b"K1").is_some());

        // Insert K4 (400_000): must evict LR suffix until room is made.
        // Pre-insert MR->LR order is [K1, K3, K2]; to fit 400_000 more
        // (total would be 1_600_000), evict K2 (LR) then K3.
        cache.insert(b"K4".to_vec(), bytes_of(400_000));

        assert_eq!(cache.len_entries(), 2);
        assert_eq!(cache.len_bytes(), 800_000);
        assert!(cache.lookup(b"K4").is_some());
        assert!(cache.lookup(b"K1").is_some());
        assert!(cache.lookup(b"K2").is_none());
        assert!(cache.lookup(b"K3").is_none());
    }

    #[test]
    fn eviction_is_lru_suffix_not_arbitrary() {
        let cache = Cache::new(300);
        cache.insert(b"a".to_vec(), bytes_of(100));
        cache.insert(b"b".to_vec(), bytes_of(100));
        cache.insert(b"c".to_vec(), bytes_of(100));
        // MR->LR: c, b, a (used_bytes == 300, at capacity). Inserting a
        // 150-byte entry needs 150 bytes back, so the LR suffix {a, b} is
        // evicted — shortest contiguous LR suffix that makes room — and c
        // (still MR-side of that suffix) survives.
        cache.insert(b"d".to_vec(), bytes_of(150));
        assert!(cache.lookup(b"a").is_none());
        assert!(cache.lookup(b"b").is_none());
        assert!(cache.lookup(b"c").is_some());
        assert!(cache.lookup(b"d").is_some());
        assert_eq!(cache.len_bytes(), 250);
    }
}
