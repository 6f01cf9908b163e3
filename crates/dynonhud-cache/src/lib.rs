//! Time-bounded telemetry package cache.
//!
//! Each telemetry source owns one [`TelemetryCache`]: the most recently merged
//! set of decoded fields, a last-update stamp, and a maximum age. Readers get
//! snapshot copies; content that has outlived its maximum age is hidden by
//! [`TelemetryCache::get`] and physically removed by
//! [`TelemetryCache::garbage_collect`].

use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use serde_json::{Map, Value};
use tracing::debug;

/// Mutex-guarded merged package for one telemetry source.
///
/// Safe for one writer (the owning feed loop) and any number of concurrent
/// readers. A single lock scope guards both the package and its timestamp.
pub struct TelemetryCache {
    max_age: Duration,
    inner: Mutex<Inner>,
}

struct Inner {
    package: Map<String, Value>,
    last_updated: Option<Instant>,
}

impl Inner {
    /// True when the content can no longer be trusted: never updated, or the
    /// last update is at least `max_age` old.
    fn is_stale(&self, max_age: Duration) -> bool {
        match self.last_updated {
            Some(at) => at.elapsed() >= max_age,
            None => true,
        }
    }
}

impl TelemetryCache {
    /// Create an empty cache whose content expires `max_age` after the most
    /// recent update.
    pub fn new(max_age: Duration) -> Self {
        Self {
            max_age,
            inner: Mutex::new(Inner {
                package: Map::new(),
                last_updated: None,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A poisoned lock only means a writer panicked mid-merge; the max-age
        // policy already bounds how long any half-merged content survives.
        self.inner.lock().unwrap_or_else(|err| err.into_inner())
    }

    /// Merge `partial` into the stored package and stamp the update time.
    ///
    /// Later values overwrite same-named earlier ones. An empty `partial` is
    /// a no-op: neither the content nor the timestamp changes.
    pub fn update(&self, partial: &Map<String, Value>) {
        if partial.is_empty() {
            return;
        }

        let mut inner = self.lock();
        inner.last_updated = Some(Instant::now());
        for (key, value) in partial {
            inner.package.insert(key.clone(), value.clone());
        }
    }

    /// A copy of the stored package if it is still fresh, otherwise empty.
    ///
    /// The returned map is independent of internal storage; mutating it never
    /// affects subsequent reads.
    pub fn get(&self) -> Map<String, Value> {
        let inner = self.lock();
        if inner.is_stale(self.max_age) {
            Map::new()
        } else {
            inner.package.clone()
        }
    }

    /// Same freshness test as [`get`](Self::get), without copying anything.
    ///
    /// Lets callers distinguish "no data at all" from "data present but
    /// expired" (pair with [`item_count`](Self::item_count)).
    pub fn is_available(&self) -> bool {
        let inner = self.lock();
        !inner.is_stale(self.max_age)
    }

    /// Remove expired content so an indefinitely silent source cannot keep
    /// old fields dangerously present. The timestamp is left untouched.
    ///
    /// Intended to run once per read/decode cycle.
    pub fn garbage_collect(&self) {
        let mut inner = self.lock();
        if inner.is_stale(self.max_age) && !inner.package.is_empty() {
            debug!(
                expired_keys = inner.package.len(),
                "clearing expired telemetry package"
            );
            inner.package.clear();
        }
    }

    /// Number of keys currently stored, regardless of freshness.
    ///
    /// Diagnostic only: expired keys still count until
    /// [`garbage_collect`](Self::garbage_collect) runs.
    pub fn item_count(&self) -> usize {
        self.lock().package.len()
    }

    /// The configured maximum package age.
    pub fn max_age(&self) -> Duration {
        self.max_age
    }
}

impl std::fmt::Debug for TelemetryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("TelemetryCache")
            .field("max_age", &self.max_age)
            .field("item_count", &inner.package.len())
            .field("last_updated", &inner.last_updated)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use serde_json::json;

    use super::*;

    fn package(pairs: &[(&str, Value)]) -> Map<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn fresh_update_is_readable() {
        let cache = TelemetryCache::new(Duration::from_secs(60));
        cache.update(&package(&[("EmsVolts", json!(12.4))]));

        assert!(cache.is_available());
        assert_eq!(cache.get().get("EmsVolts"), Some(&json!(12.4)));
        assert_eq!(cache.item_count(), 1);
    }

    #[test]
    fn empty_cache_is_unavailable_and_reads_empty() {
        let cache = TelemetryCache::new(Duration::from_secs(60));
        assert!(!cache.is_available());
        assert!(cache.get().is_empty());
        assert_eq!(cache.item_count(), 0);
    }

    #[test]
    fn empty_update_is_a_no_op() {
        let cache = TelemetryCache::new(Duration::from_millis(40));
        cache.update(&package(&[("EmsRpm", json!(2350.0))]));

        // An empty merge must not refresh the timestamp.
        thread::sleep(Duration::from_millis(60));
        cache.update(&Map::new());

        assert!(!cache.is_available());
        assert!(cache.get().is_empty());
    }

    #[test]
    fn later_values_overwrite_earlier_ones() {
        let cache = TelemetryCache::new(Duration::from_secs(60));
        cache.update(&package(&[("AHRSPitch", json!(1.5)), ("AHRSAOA", json!(10))]));
        cache.update(&package(&[("AHRSPitch", json!(-0.8))]));

        let snapshot = cache.get();
        assert_eq!(snapshot.get("AHRSPitch"), Some(&json!(-0.8)));
        assert_eq!(snapshot.get("AHRSAOA"), Some(&json!(10)));
    }

    #[test]
    fn get_returns_an_independent_copy() {
        let cache = TelemetryCache::new(Duration::from_secs(60));
        cache.update(&package(&[("AHRSRoll", json!(0.0))]));

        let mut first = cache.get();
        first.insert("AHRSRoll".to_string(), json!(99.9));
        first.insert("Injected".to_string(), json!(true));

        let second = cache.get();
        assert_eq!(second.get("AHRSRoll"), Some(&json!(0.0)));
        assert!(!second.contains_key("Injected"));
    }

    #[test]
    fn expired_content_is_hidden_but_still_counted() {
        let cache = TelemetryCache::new(Duration::from_millis(40));
        cache.update(&package(&[("EmsVolts", json!(13.8))]));
        thread::sleep(Duration::from_millis(60));

        // get() and is_available() gate on freshness; item_count() does not.
        assert!(!cache.is_available());
        assert!(cache.get().is_empty());
        assert_eq!(cache.item_count(), 1);
    }

    #[test]
    fn garbage_collect_clears_expired_content() {
        let cache = TelemetryCache::new(Duration::from_millis(40));
        cache.update(&package(&[("EmsVolts", json!(13.8))]));
        thread::sleep(Duration::from_millis(60));

        cache.garbage_collect();
        assert_eq!(cache.item_count(), 0);
        assert!(cache.get().is_empty());
    }

    #[test]
    fn garbage_collect_keeps_fresh_content() {
        let cache = TelemetryCache::new(Duration::from_secs(60));
        cache.update(&package(&[("EmsVolts", json!(13.8))]));

        cache.garbage_collect();
        assert_eq!(cache.item_count(), 1);
        assert!(cache.is_available());
    }

    #[test]
    fn update_after_expiry_revives_the_package() {
        let cache = TelemetryCache::new(Duration::from_millis(40));
        cache.update(&package(&[("EmsRpm", json!(0.0))]));
        thread::sleep(Duration::from_millis(60));
        cache.garbage_collect();

        cache.update(&package(&[("EmsRpm", json!(2350.0))]));
        assert!(cache.is_available());
        assert_eq!(cache.get().get("EmsRpm"), Some(&json!(2350.0)));
    }

    #[test]
    fn single_writer_many_readers() {
        let cache = Arc::new(TelemetryCache::new(Duration::from_secs(60)));

        let writer = {
            let cache = Arc::clone(&cache);
            thread::spawn(move || {
                for i in 0..200 {
                    cache.update(&package(&[("EmsRpm", json!(i as f64 * 10.0))]));
                }
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || {
                    for _ in 0..200 {
                        let snapshot = cache.get();
                        if let Some(value) = snapshot.get("EmsRpm") {
                            assert!(value.is_number());
                        }
                    }
                })
            })
            .collect();

        writer.join().expect("writer thread should complete");
        for reader in readers {
            reader.join().expect("reader thread should complete");
        }

        assert_eq!(cache.get().get("EmsRpm"), Some(&json!(1990.0)));
    }
}
