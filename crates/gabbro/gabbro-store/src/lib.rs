//! Sharded chained hash table backing the worker side of the channel.
//!
//! One mutex per bucket: threads hashing to different buckets never
//! contend. Buckets are plain vectors scanned linearly, which beats a
//! fancier structure at the small per-bucket chain lengths a reasonably
//! sized table produces.

use std::sync::Mutex;

/// A concurrent fixed-bucket-count key/value store.
///
/// Shared across worker threads behind an `Arc`; all methods take `&self`.
pub struct KvStore {
    buckets: Vec<Mutex<Vec<(u32, u32)>>>,
}

impl KvStore {
    /// Creates a store with `buckets` hash buckets.
    ///
    /// # Panics
    /// Panics if `buckets` is zero.
    pub fn new(buckets: usize) -> Self {
        assert!(buckets > 0, "store needs at least one bucket");
        Self {
            buckets: (0..buckets).map(|_| Mutex::new(Vec::new())).collect(),
        }
    }

    #[inline]
    fn bucket(&self, key: u32) -> &Mutex<Vec<(u32, u32)>> {
        &self.buckets[key as usize % self.buckets.len()]
    }

    /// Inserts `(key, value)`, overwriting any existing value for `key`.
    pub fn put(&self, key: u32, value: u32) {
        let mut chain = self.bucket(key).lock().unwrap();
        for entry in chain.iter_mut() {
            if entry.0 == key {
                entry.1 = value;
                return;
            }
        }
        chain.push((key, value));
    }

    /// Looks up `key`. `None` for a key that was never stored.
    pub fn get(&self, key: u32) -> Option<u32> {
        let chain = self.bucket(key).lock().unwrap();
        chain.iter().find(|entry| entry.0 == key).map(|entry| entry.1)
    }

    /// Number of hash buckets (not entries).
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn missing_key_is_none() {
        let store = KvStore::new(16);
        assert_eq!(store.get(42), None);
    }

    #[test]
    fn put_then_get_round_trips() {
        let store = KvStore::new(16);
        store.put(1, 100);
        store.put(2, 200);
        assert_eq!(store.get(1), Some(100));
        assert_eq!(store.get(2), Some(200));
    }

    #[test]
    fn put_overwrites_existing_key() {
        let store = KvStore::new(4);
        store.put(9, 1);
        store.put(9, 2);
        assert_eq!(store.get(9), Some(2));
    }

    #[test]
    fn colliding_keys_coexist_in_one_bucket() {
        // With 4 buckets, keys 3, 7, 11 all chain in bucket 3.
        let store = KvStore::new(4);
        store.put(3, 30);
        store.put(7, 70);
        store.put(11, 110);
        assert_eq!(store.get(3), Some(30));
        assert_eq!(store.get(7), Some(70));
        assert_eq!(store.get(11), Some(110));
    }

    #[test]
    fn concurrent_writers_with_disjoint_keys() {
        let store = Arc::new(KvStore::new(8));
        let handles: Vec<_> = (0..4u32)
            .map(|t| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for i in 0..1_000u32 {
                        let key = t * 1_000 + i;
                        store.put(key, key + 1);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        for key in 0..4_000u32 {
            assert_eq!(store.get(key), Some(key + 1));
        }
    }
}
