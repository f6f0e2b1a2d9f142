use crate::descriptor::{Acquisition, MetricSpec, ProviderDescriptor};
use crate::{Provider, Recorder};
use async_trait::async_trait;
use std::time::Duration;
use sysinfo::System;

static DESCRIPTOR: ProviderDescriptor = ProviderDescriptor {
    name: "load",
    description: "Load averages and uptime",
    metrics: &[
        MetricSpec::new("system.load.1", "Load Average (1m)"),
        MetricSpec::new("system.load.5", "Load Average (5m)"),
        MetricSpec::new("system.load.15", "Load Average (15m)"),
        MetricSpec::new("system.uptime", "Uptime").with_unit("s"),
    ],
    states: &[],
    events: &[],
    interval: Some(Duration::from_secs(5)),
    acquisition: Acquisition::Direct,
};

#[derive(Debug, Default)]
pub struct LoadAverage;

#[async_trait]
impl Provider for LoadAverage {
    fn descriptor(&self) -> &'static ProviderDescriptor {
        &DESCRIPTOR
    }

    async fn fetch(&mut self, recorder: &Recorder) -> anyhow::Result<()> {
        let load_avg = System::load_average();
        recorder.metric("system.load.1", load_avg.one);
        recorder.metric("system.load.5", load_avg.five);
        recorder.metric("system.load.15", load_avg.fifteen);
        recorder.metric("system.uptime", System::uptime());
        Ok(())
    }
}
