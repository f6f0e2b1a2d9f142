use doppler_common::types::{Category, Scalar};
use doppler_store::ValueStore;
use std::sync::Arc;

/// The write capability handed to providers.
///
/// Metrics go to an appending store, states to a de-duping store and events
/// are registered without a value.
#[derive(Debug, Clone)]
pub struct Recorder {
    metrics: Arc<ValueStore>,
    states: Arc<ValueStore>,
    events: Arc<ValueStore>,
}

impl Recorder {
    pub fn new(metrics: Arc<ValueStore>, states: Arc<ValueStore>, events: Arc<ValueStore>) -> Self {
        Self {
            metrics,
            states,
            events,
        }
    }

    /// Fresh unbounded stores with the standard de-dupe settings.
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(ValueStore::appending()),
            Arc::new(ValueStore::deduping()),
            Arc::new(ValueStore::appending()),
        )
    }

    pub fn metric(&self, name: &str, value: impl Into<Scalar>) {
        self.metrics.collect(name, Some(value.into()), false);
    }

    pub fn state(&self, name: &str, value: impl Into<Scalar>) {
        self.states.collect(name, Some(value.into()), false);
    }

    /// Record that the state `name` currently has no value.
    pub fn clear_state(&self, name: &str) {
        self.states.collect(name, None, false);
    }

    pub fn event(&self, name: &str) {
        self.events.register(name);
    }

    pub fn store(&self, category: Category) -> &Arc<ValueStore> {
        match category {
            Category::Metrics => &self.metrics,
            Category::States => &self.states,
            Category::Events => &self.events,
        }
    }
}
