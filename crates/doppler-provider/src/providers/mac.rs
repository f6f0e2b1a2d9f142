//! Providers scraping macOS command line tools.

use crate::descriptor::{Acquisition, MetricSpec, ProviderDescriptor};
use crate::parse::{convert_data_unit, parse_number, value_for_column, DataUnit};
use crate::{Provider, Recorder};
use anyhow::{anyhow, bail};
use std::time::Duration;

static IOSTAT: ProviderDescriptor = ProviderDescriptor {
    name: "iostat",
    description: "CPU utilisation sampled over three seconds",
    metrics: &[
        MetricSpec::new("system.cpu.user", "CPU User").with_unit("%"),
        MetricSpec::new("system.cpu.system", "CPU System").with_unit("%"),
        MetricSpec::new("system.cpu.idle", "CPU Idle").with_unit("%"),
    ],
    states: &[],
    events: &[],
    interval: Some(Duration::from_secs(5)),
    acquisition: Acquisition::Command("iostat -C -w 3 -c 2"),
};

static TOP: ProviderDescriptor = ProviderDescriptor {
    name: "top",
    description: "Physical memory usage",
    metrics: &[
        MetricSpec::new("system.memory.used", "Used Memory").with_unit("MiB"),
        MetricSpec::new("system.memory.free", "Free Memory").with_unit("MiB"),
    ],
    states: &[],
    events: &[],
    interval: Some(Duration::from_secs(5)),
    acquisition: Acquisition::Command("top -l 1"),
};

static SYSCTL: ProviderDescriptor = ProviderDescriptor {
    name: "sysctl",
    description: "Installed memory",
    metrics: &[],
    states: &[MetricSpec::new("system.memory.total", "Total Memory").with_unit("MiB")],
    events: &[],
    interval: Some(Duration::from_secs(120)),
    acquisition: Acquisition::Command("sysctl -a"),
};

#[derive(Debug, Default)]
pub struct Iostat;

impl Provider for Iostat {
    fn descriptor(&self) -> &'static ProviderDescriptor {
        &IOSTAT
    }

    fn parse(&mut self, output: &str, recorder: &Recorder) -> anyhow::Result<()> {
        let lines: Vec<&str> = output.lines().filter(|l| !l.trim().is_empty()).collect();
        let legend: Vec<&str> = lines
            .iter()
            .map(|l| l.split_whitespace().collect::<Vec<_>>())
            .find(|tokens| tokens.contains(&"us"))
            .ok_or_else(|| anyhow!("iostat legend line not found"))?;
        let data: Vec<&str> = lines
            .last()
            .map(|l| l.split_whitespace().collect())
            .unwrap_or_default();

        for (metric, column) in [
            ("system.cpu.user", "us"),
            ("system.cpu.system", "sy"),
            ("system.cpu.idle", "id"),
        ] {
            let value = value_for_column(&legend, &data, column)
                .and_then(parse_number)
                .ok_or_else(|| anyhow!("iostat column '{column}' missing"))?;
            recorder.metric(metric, value);
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct Top;

impl Provider for Top {
    fn descriptor(&self) -> &'static ProviderDescriptor {
        &TOP
    }

    /// Understands both `PhysMem: 3584M used, 4608M free.` and
    /// `PhysMem: 16G used (2500M wired), 120M unused.`
    fn parse(&mut self, output: &str, recorder: &Recorder) -> anyhow::Result<()> {
        let line = output
            .lines()
            .find_map(|l| l.trim().strip_prefix("PhysMem:"))
            .ok_or_else(|| anyhow!("PhysMem line not found in top output"))?;

        let tokens: Vec<&str> = line
            .split(|c: char| c == ',' || c == '(' || c == ')' || c.is_whitespace())
            .map(|t| t.trim_end_matches('.'))
            .filter(|t| !t.is_empty())
            .collect();

        let mut used = None;
        let mut free = None;
        for pair in tokens.windows(2) {
            let Some(mib) = convert_data_unit(pair[0], DataUnit::B, DataUnit::M) else {
                continue;
            };
            match pair[1] {
                "used" => used = Some(mib),
                "free" | "unused" => free = Some(mib),
                _ => {}
            }
        }

        if used.is_none() && free.is_none() {
            bail!("PhysMem line has no used/free values");
        }
        if let Some(used) = used {
            recorder.metric("system.memory.used", used);
        }
        if let Some(free) = free {
            recorder.metric("system.memory.free", free);
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct Sysctl;

impl Provider for Sysctl {
    fn descriptor(&self) -> &'static ProviderDescriptor {
        &SYSCTL
    }

    fn parse(&mut self, output: &str, recorder: &Recorder) -> anyhow::Result<()> {
        let memsize = output
            .lines()
            .find_map(|l| l.trim().strip_prefix("hw.memsize:"))
            .ok_or_else(|| anyhow!("hw.memsize not found in sysctl output"))?;
        let total = convert_data_unit(memsize, DataUnit::B, DataUnit::M)
            .ok_or_else(|| anyhow!("unparseable hw.memsize '{}'", memsize.trim()))?;
        recorder.state("system.memory.total", total);
        Ok(())
    }
}
