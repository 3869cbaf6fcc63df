//! Synthetic record pool.
//!
//! Randomness is paid once up front: the pool is generated before the run
//! starts and the send loop only indexes into it, cyclically.

use rand::Rng;
use uuid::Uuid;

const PAYLOAD_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// Pool entries generated per destination topic.
pub const POOL_ENTRIES_PER_DESTINATION: usize = 1000;

/// Fixed-size sequence of (key, payload) pairs, never mutated after
/// construction.
#[derive(Debug)]
pub struct RecordPool {
    keys: Option<Vec<String>>,
    payloads: Vec<String>,
}

impl RecordPool {
    /// Generate `size` random alphabetic payloads of `payload_size` bytes,
    /// plus `size` unique keys when `random_keys` is set. With keys disabled
    /// no key storage is allocated at all and every entry reads back `None`.
    pub fn build(size: usize, payload_size: usize, random_keys: bool) -> Self {
        let mut rng = rand::rng();
        let payloads = (0..size)
            .map(|_| random_payload(&mut rng, payload_size))
            .collect();
        let keys =
            random_keys.then(|| (0..size).map(|_| Uuid::new_v4().to_string()).collect());
        RecordPool { keys, payloads }
    }

    pub fn len(&self) -> usize {
        self.payloads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payloads.is_empty()
    }

    /// Entry at `n % len()`, so callers can feed the monotonically
    /// increasing send counter directly.
    pub fn entry(&self, n: u64) -> (Option<&str>, &str) {
        let idx = (n % self.payloads.len() as u64) as usize;
        let key = self.keys.as_ref().map(|keys| keys[idx].as_str());
        (key, self.payloads[idx].as_str())
    }
}

fn random_payload(rng: &mut impl Rng, size: usize) -> String {
    (0..size)
        .map(|_| PAYLOAD_CHARSET[rng.random_range(0..PAYLOAD_CHARSET.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payloads_are_fixed_length_alphabetic() {
        let pool = RecordPool::build(10, 64, true);
        assert_eq!(pool.len(), 10);
        for n in 0..10 {
            let (key, payload) = pool.entry(n);
            assert_eq!(payload.len(), 64);
            assert!(payload.chars().all(|c| c.is_ascii_alphabetic()));
            assert!(key.is_some());
        }
    }

    #[test]
    fn test_disabled_keys_read_back_none() {
        let pool = RecordPool::build(5, 16, false);
        for n in 0..5 {
            assert_eq!(pool.entry(n).0, None);
        }
    }

    #[test]
    fn test_entry_wraps_modulo_pool_size() {
        let pool = RecordPool::build(3, 8, true);
        assert_eq!(pool.entry(0), pool.entry(3));
        assert_eq!(pool.entry(2), pool.entry(5));
        assert_ne!(pool.entry(0).1, pool.entry(1).1);
    }

    #[test]
    fn test_keys_simulate_high_cardinality() {
        let pool = RecordPool::build(100, 8, true);
        let mut keys: Vec<&str> = (0..100).map(|n| pool.entry(n).0.unwrap()).collect();
        keys.sort_unstable();
        keys.dedup();
        assert_eq!(keys.len(), 100);
    }
}
