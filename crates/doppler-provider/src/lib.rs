//! Provider framework for the doppler agent.
//!
//! A [`Provider`] owns a named set of metrics, states or events and produces
//! samples on its own schedule. Each provider is driven by the [`runner`] on
//! an independent tokio task and writes only through a [`Recorder`], which
//! routes metrics, states and events into their respective stores.

pub mod descriptor;
pub mod error;
pub mod parse;
pub mod providers;
pub mod recorder;
pub mod registry;
pub mod runner;

pub use descriptor::{Acquisition, MetricSpec, ProviderDescriptor};
pub use error::{ProviderError, Result};
pub use recorder::Recorder;
pub use registry::{Platform, ProviderRegistry};

use async_trait::async_trait;

/// A unit of host data collection.
///
/// Which hook the runner calls depends on the descriptor:
///
/// - [`Acquisition::Command`] and [`Acquisition::File`]: the command output or
///   file content is handed to [`Provider::parse`] every interval;
/// - [`Acquisition::Direct`] with an interval: [`Provider::fetch`] every interval;
/// - no interval: [`Provider::begin`] exactly once.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Static description of what this provider produces and how.
    fn descriptor(&self) -> &'static ProviderDescriptor;

    fn name(&self) -> &'static str {
        self.descriptor().name
    }

    /// Called once, before the provider's loop starts and before the agent
    /// begins sending.
    async fn on_start(&mut self, _recorder: &Recorder) -> anyhow::Result<()> {
        Ok(())
    }

    /// Interprets the output of the provider's command or file.
    fn parse(&mut self, _output: &str, _recorder: &Recorder) -> anyhow::Result<()> {
        anyhow::bail!("provider '{}' does not parse output", self.name())
    }

    /// Computes values directly, without a command or file.
    async fn fetch(&mut self, _recorder: &Recorder) -> anyhow::Result<()> {
        anyhow::bail!("provider '{}' does not fetch values", self.name())
    }

    /// One-shot work for providers without an interval.
    async fn begin(&mut self, _recorder: &Recorder) -> anyhow::Result<()> {
        Ok(())
    }
}
