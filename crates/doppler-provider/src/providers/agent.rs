use crate::descriptor::{Acquisition, MetricSpec, ProviderDescriptor};
use crate::{Provider, Recorder};
use async_trait::async_trait;

pub const AGENT_STARTED: &str = "agent.started";
pub const AGENT_STOPPED: &str = "agent.stopped";

static DESCRIPTOR: ProviderDescriptor = ProviderDescriptor {
    name: "agent_events",
    description: "Lifecycle events of the agent itself",
    metrics: &[],
    states: &[],
    events: &[
        MetricSpec::new(AGENT_STARTED, "Agent Started"),
        MetricSpec::new(AGENT_STOPPED, "Agent Stopped"),
    ],
    interval: None,
    acquisition: Acquisition::Direct,
};

/// Emits `agent.started` before the agent starts sending.
///
/// `agent.stopped` is recorded by the collector's shutdown path.
#[derive(Debug, Default)]
pub struct AgentEvents;

#[async_trait]
impl Provider for AgentEvents {
    fn descriptor(&self) -> &'static ProviderDescriptor {
        &DESCRIPTOR
    }

    async fn on_start(&mut self, recorder: &Recorder) -> anyhow::Result<()> {
        recorder.event(AGENT_STARTED);
        Ok(())
    }
}
