use crate::descriptor::{Acquisition, MetricSpec, ProviderDescriptor};
use crate::{Provider, Recorder};
use async_trait::async_trait;
use std::time::Duration;
use sysinfo::Disks;

const MIB: u64 = 1024 * 1024;

static DESCRIPTOR: ProviderDescriptor = ProviderDescriptor {
    name: "disk",
    description: "Space usage per mounted filesystem",
    metrics: &[
        MetricSpec::new("system.disk.total", "Disk Size")
            .with_unit("MiB")
            .per_instance(),
        MetricSpec::new("system.disk.available", "Disk Available")
            .with_unit("MiB")
            .per_instance(),
        MetricSpec::new("system.disk.used_percent", "Disk Used")
            .with_unit("%")
            .per_instance(),
    ],
    states: &[],
    events: &[],
    interval: Some(Duration::from_secs(60)),
    acquisition: Acquisition::Direct,
};

/// Per-mount metrics are named `<metric>:<mount point>`.
pub struct DiskUsage {
    disks: Disks,
}

impl DiskUsage {
    pub fn new() -> Self {
        Self {
            disks: Disks::new_with_refreshed_list(),
        }
    }
}

impl Default for DiskUsage {
    fn default() -> Self {
        Self::new()
    }
}

fn used_percent(total: u64, available: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let used = total.saturating_sub(available);
    ((used as f64 / total as f64) * 10_000.0).round() / 100.0
}

#[async_trait]
impl Provider for DiskUsage {
    fn descriptor(&self) -> &'static ProviderDescriptor {
        &DESCRIPTOR
    }

    async fn fetch(&mut self, recorder: &Recorder) -> anyhow::Result<()> {
        self.disks.refresh();

        for disk in self.disks.iter() {
            let mount = disk.mount_point().to_string_lossy();
            let total = disk.total_space();
            let available = disk.available_space();

            recorder.metric(&format!("system.disk.total:{mount}"), total / MIB);
            recorder.metric(&format!("system.disk.available:{mount}"), available / MIB);
            recorder.metric(
                &format!("system.disk.used_percent:{mount}"),
                used_percent(total, available),
            );
        }

        Ok(())
    }
}
