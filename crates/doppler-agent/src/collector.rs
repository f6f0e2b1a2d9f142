//! Batches provider output and ships it to the collection endpoint.
//!
//! Every send cycle drains the completed samples of each store into the
//! payload accumulators, posts the whole accumulated payload and, only on an
//! HTTP 200, removes the drained samples and clears the accumulators. A failed
//! send leaves both untouched so the next cycle resends the same data plus
//! whatever arrived meanwhile.

use crate::envelope::{Envelope, Identity};
use crate::error::{AgentError, Result};
use crate::transport::Transport;
use doppler_common::types::{unix_now, Category, Sample, Timestamp};
use doppler_provider::providers::agent::AGENT_STOPPED;
use doppler_provider::runner::{self, RunnerOptions};
use doppler_provider::{Provider, ProviderDescriptor, Recorder};
use doppler_store::{PayloadAccumulator, ValueStore};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// Sends happen faster right after startup so a new host shows up quickly.
pub const STARTUP_WINDOW: Duration = Duration::from_secs(30 * 60);
pub const STARTUP_SEND_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct CollectorSettings {
    pub send_interval: Duration,
    pub max_store_samples: Option<usize>,
    pub max_payload_age: Option<Duration>,
    pub runner: RunnerOptions,
}

impl Default for CollectorSettings {
    fn default() -> Self {
        Self {
            send_interval: Duration::from_secs(30),
            max_store_samples: Some(100_000),
            max_payload_age: None,
            runner: RunnerOptions::default(),
        }
    }
}

/// Which samples a transmission drains from the stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainMode {
    /// Samples strictly older than the collection timestamp.
    Completed,
    /// Everything, used for the final flush on shutdown.
    FullFlush,
}

/// Samples removed from each store by a successful transmission.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Delivery {
    pub metrics: usize,
    pub states: usize,
    pub events: usize,
}

impl Delivery {
    pub fn total(&self) -> usize {
        self.metrics + self.states + self.events
    }
}

#[derive(Debug, Default)]
struct Payloads {
    metrics: PayloadAccumulator,
    states: PayloadAccumulator,
    events: PayloadAccumulator,
}

impl Payloads {
    fn get_mut(&mut self, category: Category) -> &mut PayloadAccumulator {
        match category {
            Category::Metrics => &mut self.metrics,
            Category::States => &mut self.states,
            Category::Events => &mut self.events,
        }
    }

    fn prune_before(&mut self, cutoff: Timestamp) -> usize {
        self.metrics.prune_before(cutoff)
            + self.states.prune_before(cutoff)
            + self.events.prune_before(cutoff)
    }

    fn truncate_oldest(&mut self, max_points: usize) -> usize {
        self.metrics.truncate_oldest(max_points)
            + self.states.truncate_oldest(max_points)
            + self.events.truncate_oldest(max_points)
    }

    fn point_count(&self) -> usize {
        self.metrics.point_count() + self.states.point_count() + self.events.point_count()
    }

    fn clear(&mut self) {
        self.metrics.clear();
        self.states.clear();
        self.events.clear();
    }
}

pub struct Collector {
    identity: Identity,
    transport: Arc<dyn Transport>,
    recorder: Recorder,
    settings: CollectorSettings,
    /// Held for the whole of a transmission, so at most one is in flight.
    payloads: Mutex<Payloads>,
    started_at: Instant,
}

impl Collector {
    pub fn new(
        identity: Identity,
        transport: Arc<dyn Transport>,
        settings: CollectorSettings,
    ) -> Self {
        let store = |de_dupe: bool| {
            let store = ValueStore::new(de_dupe);
            let store = match settings.max_store_samples {
                Some(max) => store.with_max_samples(max),
                None => store,
            };
            Arc::new(store)
        };
        let recorder = Recorder::new(store(false), store(true), store(false));

        Self {
            identity,
            transport,
            recorder,
            settings,
            payloads: Mutex::new(Payloads::default()),
            started_at: Instant::now(),
        }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// The recorder shared by every provider of this collector.
    pub fn recorder(&self) -> &Recorder {
        &self.recorder
    }

    /// Samples waiting in the stores.
    pub fn pending(&self) -> usize {
        Category::ALL
            .iter()
            .map(|category| self.recorder.store(*category).len())
            .sum()
    }

    /// Seed each provider's descriptors into the payload, run its startup
    /// hook and spawn its runner.
    pub async fn start(&self, providers: Vec<Box<dyn Provider>>) -> Vec<JoinHandle<()>> {
        let mut handles = Vec::with_capacity(providers.len());
        for mut provider in providers {
            let descriptor = provider.descriptor();
            self.seed_descriptor(descriptor).await;

            if let Err(e) = provider.on_start(&self.recorder).await {
                tracing::warn!(
                    provider = descriptor.name,
                    error = %e,
                    "Provider startup hook failed"
                );
            }

            handles.push(runner::spawn(
                provider,
                self.recorder.clone(),
                self.settings.runner,
            ));
            tracing::debug!(provider = descriptor.name, "Provider started");
        }
        handles
    }

    /// Per-instance specs are skipped; their bare names never carry values.
    async fn seed_descriptor(&self, descriptor: &ProviderDescriptor) {
        let (category, specs) = descriptor.specs();
        let mut payloads = self.payloads.lock().await;
        let accumulator = payloads.get_mut(category);
        for spec in specs.iter().filter(|spec| !spec.per_instance) {
            accumulator.merge_descriptor(spec.name, spec.title, spec.unit);
        }
    }

    /// Interval before the next send, given the time since startup.
    pub fn send_interval_for(&self, elapsed: Duration) -> Duration {
        if elapsed < STARTUP_WINDOW {
            self.settings.send_interval.min(STARTUP_SEND_INTERVAL)
        } else {
            self.settings.send_interval
        }
    }

    /// Transmit forever; failures are logged and retried next cycle.
    pub async fn run_send_loop(&self) {
        loop {
            tokio::time::sleep(self.send_interval_for(self.started_at.elapsed())).await;

            match self.transmit(DrainMode::Completed).await {
                Ok(delivery) => {
                    tracing::debug!(samples = delivery.total(), "Send cycle complete");
                }
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        pending = self.pending(),
                        "Failed to send payload, keeping data for the next cycle"
                    );
                }
            }
        }
    }

    pub async fn transmit(&self, mode: DrainMode) -> Result<Delivery> {
        self.transmit_at(unix_now(), mode).await
    }

    /// Drain, merge and post with `collected_ts` as the collection time.
    pub async fn transmit_at(&self, collected_ts: Timestamp, mode: DrainMode) -> Result<Delivery> {
        let mut payloads = self.payloads.lock().await;

        let drain = |category: Category| -> Vec<Sample> {
            let store = self.recorder.store(category);
            match mode {
                DrainMode::Completed => store.get_completed(collected_ts),
                DrainMode::FullFlush => store.get_all(),
            }
        };
        let metrics = drain(Category::Metrics);
        let states = drain(Category::States);
        let events = drain(Category::Events);

        payloads.metrics.merge_scalars(&metrics);
        payloads.states.merge_scalars(&states);
        payloads.events.merge_events(&events);
        payloads.metrics.retain_merged(&metrics);
        payloads.states.retain_merged(&states);
        payloads.events.retain_merged(&events);

        if let Some(max) = self.settings.max_store_samples {
            let dropped = payloads.truncate_oldest(max);
            if dropped > 0 {
                tracing::warn!(
                    dropped,
                    max_samples = max,
                    "Payload over the sample limit, dropped oldest undelivered points"
                );
            }
        }

        if let Some(max_age) = self.settings.max_payload_age {
            let cutoff = collected_ts.saturating_sub(max_age.as_secs() as i64);
            let pruned = payloads.prune_before(cutoff);
            if pruned > 0 {
                tracing::warn!(
                    pruned,
                    max_age_secs = max_age.as_secs(),
                    "Dropped undelivered points older than the payload age limit"
                );
            }
        }

        let envelope = Envelope {
            api_key: &self.identity.api_key,
            machine_id: &self.identity.machine_id,
            hostname: &self.identity.hostname,
            collected_ts,
            sent_ts: unix_now(),
            metrics: &payloads.metrics,
            states: &payloads.states,
            events: &payloads.events,
        };
        let body = serde_json::to_vec(&envelope)?;
        let size = body.len();

        let response = self.transport.send(body).await?;
        if response.status != 200 {
            return Err(AgentError::Rejected {
                status: response.status,
                body: response.body,
            });
        }

        let delivery = Delivery {
            metrics: self.recorder.store(Category::Metrics).remove(&metrics),
            states: self.recorder.store(Category::States).remove(&states),
            events: self.recorder.store(Category::Events).remove(&events),
        };
        payloads.clear();

        tracing::info!(
            endpoint = self.transport.endpoint(),
            metrics = delivery.metrics,
            states = delivery.states,
            events = delivery.events,
            bytes = size,
            "Payload delivered"
        );
        Ok(delivery)
    }

    /// Record the stop event and flush everything, waiting for any send
    /// already in flight.
    pub async fn shutdown(&self) -> Result<Delivery> {
        self.recorder.event(AGENT_STOPPED);
        self.transmit(DrainMode::FullFlush).await
    }

    /// Undelivered points held in the payload accumulators.
    pub async fn pending_points(&self) -> usize {
        self.payloads.lock().await.point_count()
    }

    /// The accumulated payload as it would be sent, keyed by category.
    pub async fn payload_snapshot(&self) -> serde_json::Value {
        let payloads = self.payloads.lock().await;
        serde_json::json!({
            "metrics": &payloads.metrics,
            "states": &payloads.states,
            "events": &payloads.events,
        })
    }
}
