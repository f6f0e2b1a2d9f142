use doppler_common::types::{unix_now, Sample, Scalar, Timestamp};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Thread-safe, append-only log of samples with optional de-duplication.
///
/// Every operation takes the single per-store lock for the duration of one
/// call only. Samples keep insertion order; nothing is ever sorted.
///
/// # Examples
///
/// ```
/// use doppler_store::ValueStore;
///
/// let states = ValueStore::deduping();
/// states.collect_at(10, "os.version", Some("1.0".into()), false);
/// states.collect_at(11, "os.version", Some("1.0".into()), false);
/// assert_eq!(states.len(), 1);
///
/// let completed = states.get_completed(11);
/// assert_eq!(completed.len(), 1);
/// states.remove(&completed);
/// assert!(states.is_empty());
/// ```
#[derive(Debug)]
pub struct ValueStore {
    de_dupe: bool,
    max_samples: Option<usize>,
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    next_seq: u64,
    items: VecDeque<Sample>,
    last_value: HashMap<String, Option<Scalar>>,
    dropped: u64,
}

impl ValueStore {
    pub fn new(de_dupe: bool) -> Self {
        Self {
            de_dupe,
            max_samples: None,
            inner: Mutex::new(Inner::default()),
        }
    }

    /// A store that only records a sample when its value changed.
    pub fn deduping() -> Self {
        Self::new(true)
    }

    /// A store that records every call.
    pub fn appending() -> Self {
        Self::new(false)
    }

    /// Bound the store to `max` samples. Once full, the oldest sample is
    /// dropped to make room for each new one.
    pub fn with_max_samples(mut self, max: usize) -> Self {
        self.max_samples = Some(max.max(1));
        self
    }

    pub fn is_deduping(&self) -> bool {
        self.de_dupe
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record `value` for `name` at the current time.
    pub fn collect(&self, name: &str, value: Option<Scalar>, force: bool) {
        self.collect_at(unix_now(), name, value, force);
    }

    /// Record `value` for `name` at `timestamp`.
    ///
    /// On a de-duping store the call is a no-op when the last recorded value
    /// for `name` equals `value`, unless `force` is set.
    pub fn collect_at(
        &self,
        timestamp: Timestamp,
        name: &str,
        value: Option<Scalar>,
        force: bool,
    ) {
        let mut inner = self.lock();

        if self.de_dupe && !force && inner.last_value.get(name) == Some(&value) {
            tracing::debug!(metric = %name, "Skipping unchanged value");
            return;
        }

        if let Some(max) = self.max_samples {
            while inner.items.len() >= max {
                if let Some(oldest) = inner.items.pop_front() {
                    inner.dropped += 1;
                    tracing::warn!(
                        metric = %oldest.name,
                        timestamp = oldest.timestamp,
                        max_samples = max,
                        "Store full, evicting oldest sample"
                    );
                }
            }
        }

        let seq = inner.next_seq;
        inner.next_seq += 1;
        tracing::debug!(metric = %name, seq, value = ?value, "Collecting");
        if self.de_dupe {
            inner.last_value.insert(name.to_string(), value.clone());
        }
        inner.items.push_back(Sample {
            seq,
            timestamp,
            name: name.to_string(),
            value,
        });
    }

    /// Record an occurrence of the event `name`, carrying no value.
    pub fn register(&self, name: &str) {
        self.collect(name, None, false);
    }

    pub fn register_at(&self, timestamp: Timestamp, name: &str) {
        self.collect_at(timestamp, name, None, false);
    }

    /// Snapshot of every sample with `timestamp < before`, in store order.
    ///
    /// Nothing is removed; calling this twice without writes in between
    /// returns equal results.
    pub fn get_completed(&self, before: Timestamp) -> Vec<Sample> {
        self.lock()
            .items
            .iter()
            .filter(|s| s.timestamp < before)
            .cloned()
            .collect()
    }

    /// Snapshot of every stored sample regardless of timestamp.
    pub fn get_all(&self) -> Vec<Sample> {
        self.lock().items.iter().cloned().collect()
    }

    /// Remove the given samples, matching on their sequence numbers.
    ///
    /// Samples that are no longer present are skipped. Returns how many
    /// samples were actually removed.
    pub fn remove(&self, samples: &[Sample]) -> usize {
        if samples.is_empty() {
            return 0;
        }
        let wanted: HashSet<u64> = samples.iter().map(|s| s.seq).collect();

        let mut inner = self.lock();
        let before = inner.items.len();
        inner.items.retain(|s| !wanted.contains(&s.seq));
        let removed = before - inner.items.len();

        let missing = wanted.len() - removed;
        if missing > 0 {
            tracing::debug!(missing, removed, "Some samples were already gone from the store");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().items.is_empty()
    }

    /// Number of samples discarded by the capacity bound so far.
    pub fn dropped(&self) -> u64 {
        self.lock().dropped
    }
}

impl Default for ValueStore {
    fn default() -> Self {
        Self::appending()
    }
}
