//! Providers backed by procfs and sysstat tools.

use crate::descriptor::{Acquisition, MetricSpec, ProviderDescriptor};
use crate::parse::{
    convert_data_unit, first_matching_line, parse_number, value_for_column, DataUnit,
};
use crate::{Provider, Recorder};
use anyhow::{anyhow, bail, Context};
use std::collections::HashMap;
use std::time::Duration;

const MEMINFO_PATH: &str = "/proc/meminfo";

static MEMINFO: ProviderDescriptor = ProviderDescriptor {
    name: "meminfo",
    description: "Detailed memory metrics from /proc/meminfo",
    metrics: &[
        MetricSpec::new("system.memory.free", "Free Memory").with_unit("MiB"),
        MetricSpec::new("system.memory.available", "Available Memory").with_unit("MiB"),
        MetricSpec::new("system.memory.active", "Active Memory").with_unit("MiB"),
        MetricSpec::new("system.memory.inactive", "Inactive Memory").with_unit("MiB"),
    ],
    states: &[],
    events: &[],
    interval: Some(Duration::from_secs(10)),
    acquisition: Acquisition::File(MEMINFO_PATH),
};

static MEMTOTAL: ProviderDescriptor = ProviderDescriptor {
    name: "memtotal",
    description: "Installed memory from /proc/meminfo",
    metrics: &[],
    states: &[MetricSpec::new("system.memory.total", "Total Memory").with_unit("MiB")],
    events: &[],
    interval: Some(Duration::from_secs(120)),
    acquisition: Acquisition::File(MEMINFO_PATH),
};

static MPSTAT: ProviderDescriptor = ProviderDescriptor {
    name: "mpstat",
    description: "CPU utilisation sampled over three seconds",
    metrics: &[
        MetricSpec::new("system.cpu.user", "CPU User").with_unit("%"),
        MetricSpec::new("system.cpu.system", "CPU System").with_unit("%"),
        MetricSpec::new("system.cpu.idle", "CPU Idle").with_unit("%"),
    ],
    states: &[],
    events: &[],
    interval: Some(Duration::from_secs(5)),
    acquisition: Acquisition::Command("mpstat 1 3"),
};

static IOSTAT: ProviderDescriptor = ProviderDescriptor {
    name: "iostat",
    description: "Per-device I/O statistics sampled over three seconds",
    metrics: &[
        MetricSpec::new("system.io.read_throughput", "Read Throughput")
            .with_unit("KiB/s")
            .per_instance(),
        MetricSpec::new("system.io.write_throughput", "Write Throughput")
            .with_unit("KiB/s")
            .per_instance(),
        MetricSpec::new("system.io.wait_time", "I/O Wait Time")
            .with_unit("ms")
            .per_instance(),
        MetricSpec::new("system.io.service_time", "I/O Service Time")
            .with_unit("ms")
            .per_instance(),
    ],
    states: &[],
    events: &[],
    interval: Some(Duration::from_secs(5)),
    acquisition: Acquisition::Command("iostat -d -x 1 3"),
};

/// `/proc/meminfo` as `field -> "value unit"`.
fn meminfo_fields(content: &str) -> HashMap<&str, &str> {
    content
        .lines()
        .filter_map(|line| {
            let (field, value) = line.split_once(':')?;
            Some((field.trim(), value.trim()))
        })
        .collect()
}

fn meminfo_mib(fields: &HashMap<&str, &str>, field: &str) -> Option<i64> {
    fields
        .get(field)
        .and_then(|value| convert_data_unit(value, DataUnit::B, DataUnit::M))
}

#[derive(Debug, Default)]
pub struct Meminfo;

impl Provider for Meminfo {
    fn descriptor(&self) -> &'static ProviderDescriptor {
        &MEMINFO
    }

    fn parse(&mut self, output: &str, recorder: &Recorder) -> anyhow::Result<()> {
        let fields = meminfo_fields(output);
        let wanted = [
            ("MemFree", "system.memory.free"),
            ("MemAvailable", "system.memory.available"),
            ("Active", "system.memory.active"),
            ("Inactive", "system.memory.inactive"),
        ];

        let mut recorded = 0;
        for (field, metric) in wanted {
            if let Some(mib) = meminfo_mib(&fields, field) {
                recorder.metric(metric, mib);
                recorded += 1;
            }
        }
        if recorded == 0 {
            bail!("no memory fields found in {MEMINFO_PATH}");
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemTotal;

impl Provider for MemTotal {
    fn descriptor(&self) -> &'static ProviderDescriptor {
        &MEMTOTAL
    }

    fn parse(&mut self, output: &str, recorder: &Recorder) -> anyhow::Result<()> {
        let total = meminfo_mib(&meminfo_fields(output), "MemTotal")
            .with_context(|| format!("MemTotal missing from {MEMINFO_PATH}"))?;
        recorder.state("system.memory.total", total);
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct Mpstat;

impl Provider for Mpstat {
    fn descriptor(&self) -> &'static ProviderDescriptor {
        &MPSTAT
    }

    fn parse(&mut self, output: &str, recorder: &Recorder) -> anyhow::Result<()> {
        let legend_line = first_matching_line(output, |l| l.contains("%usr") || l.contains("%user"))
            .ok_or_else(|| anyhow!("mpstat legend line not found"))?;
        let data_line = first_matching_line(output, |l| l.starts_with("Average"))
            .ok_or_else(|| anyhow!("mpstat average line not found"))?;

        // Columns after "CPU" line up with the trailing values of the average
        // line; the leading time column differs between locales.
        let legend: Vec<&str> = legend_line
            .split_whitespace()
            .skip_while(|t| *t != "CPU")
            .skip(1)
            .collect();
        let tokens: Vec<&str> = data_line.split_whitespace().collect();
        if legend.is_empty() || tokens.len() < legend.len() {
            bail!("mpstat average line does not match its legend");
        }
        let data = &tokens[tokens.len() - legend.len()..];

        let columns = [
            ("system.cpu.user", ["%usr", "%user"]),
            ("system.cpu.system", ["%sys", "%system"]),
            ("system.cpu.idle", ["%idle", "%idle"]),
        ];
        for (metric, keys) in columns {
            let value = keys
                .iter()
                .find_map(|key| value_for_column(&legend, data, key))
                .and_then(parse_number)
                .ok_or_else(|| anyhow!("mpstat column for {metric} not found"))?;
            recorder.metric(metric, value);
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct Iostat;

/// Position of a throughput column such as `rkB/s` or `wMB/s`, with its unit.
fn throughput_column(legend: &[&str], direction: char) -> Option<(usize, DataUnit)> {
    legend.iter().enumerate().find_map(|(idx, column)| {
        let rest = column.strip_prefix(direction)?.strip_suffix("B/s")?;
        let mut chars = rest.chars();
        let unit = DataUnit::from_letter(chars.next()?)?;
        chars.as_str().is_empty().then_some((idx, unit))
    })
}

impl Provider for Iostat {
    fn descriptor(&self) -> &'static ProviderDescriptor {
        &IOSTAT
    }

    fn parse(&mut self, output: &str, recorder: &Recorder) -> anyhow::Result<()> {
        // The first report covers the time since boot; use the last one.
        let report = output
            .trim()
            .split("\n\n")
            .filter(|block| block.contains("Device"))
            .last()
            .ok_or_else(|| anyhow!("iostat device report not found"))?;

        let mut lines = report.lines().skip_while(|l| !l.starts_with("Device"));
        let legend: Vec<&str> = lines
            .next()
            .map(|l| l.split_whitespace().skip(1).collect())
            .unwrap_or_default();

        let read = throughput_column(&legend, 'r');
        let write = throughput_column(&legend, 'w');

        for line in lines {
            let columns: Vec<&str> = line.split_whitespace().collect();
            let Some((device, data)) = columns.split_first() else {
                continue;
            };

            if let Some((idx, unit)) = read {
                let kib = data
                    .get(idx)
                    .and_then(|v| convert_data_unit(v, unit, DataUnit::K));
                if let Some(kib) = kib {
                    recorder.metric(&format!("system.io.read_throughput:{device}"), kib);
                }
            }
            if let Some((idx, unit)) = write {
                let kib = data
                    .get(idx)
                    .and_then(|v| convert_data_unit(v, unit, DataUnit::K));
                if let Some(kib) = kib {
                    recorder.metric(&format!("system.io.write_throughput:{device}"), kib);
                }
            }
            if let Some(wait) = value_for_column(&legend, data, "await").and_then(parse_number) {
                recorder.metric(&format!("system.io.wait_time:{device}"), wait);
            }
            if let Some(svctm) = value_for_column(&legend, data, "svctm").and_then(parse_number) {
                recorder.metric(&format!("system.io.service_time:{device}"), svctm);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use doppler_common::types::{Category, Scalar};

    fn metrics(recorder: &Recorder) -> HashMap<String, Option<Scalar>> {
        recorder
            .store(Category::Metrics)
            .get_all()
            .into_iter()
            .map(|s| (s.name, s.value))
            .collect()
    }

    const MEMINFO_SAMPLE: &str = "MemTotal:       16318360 kB\n\
MemFree:          524288 kB\n\
MemAvailable:    8388608 kB\n\
Buffers:          102400 kB\n\
Active:          4194304 kB\n\
Inactive:        2097152 kB\n\
HugePages_Total:       0\n";

    #[test]
    fn test_meminfo_parses_mib() {
        let recorder = Recorder::in_memory();
        Meminfo.parse(MEMINFO_SAMPLE, &recorder).unwrap();
        let m = metrics(&recorder);
        assert_eq!(m["system.memory.free"], Some(Scalar::Int(512)));
        assert_eq!(m["system.memory.available"], Some(Scalar::Int(8192)));
        assert_eq!(m["system.memory.active"], Some(Scalar::Int(4096)));
        assert_eq!(m["system.memory.inactive"], Some(Scalar::Int(2048)));
    }

    #[test]
    fn test_meminfo_rejects_unrelated_file() {
        let recorder = Recorder::in_memory();
        assert!(Meminfo.parse("hello: world\n", &recorder).is_err());
    }

    #[test]
    fn test_memtotal_is_a_deduped_state() {
        let recorder = Recorder::in_memory();
        MemTotal.parse(MEMINFO_SAMPLE, &recorder).unwrap();
        MemTotal.parse(MEMINFO_SAMPLE, &recorder).unwrap();
        let states = recorder.store(Category::States).get_all();
        assert_eq!(states.len(), 1);
        assert_eq!(states[0].value, Some(Scalar::Int(15935)));
    }

    const MPSTAT_SAMPLE: &str = "Linux 5.15.0-91-generic (web-01) \t01/15/2024 \t_x86_64_\t(4 CPU)\n\
\n\
12:00:01 PM  CPU    %usr   %nice    %sys %iowait    %irq   %soft  %steal  %guest  %gnice   %idle\n\
12:00:02 PM  all    2.01    0.00    1.00    0.25    0.00    0.00    0.00    0.00    0.00   96.74\n\
12:00:03 PM  all    3.00    0.00    0.75    0.00    0.00    0.00    0.00    0.00    0.00   96.25\n\
Average:     all    2.50    0.00    0.88    0.08    0.00    0.00    0.00    0.00    0.00   96.54\n";

    #[test]
    fn test_mpstat_reads_average_line() {
        let recorder = Recorder::in_memory();
        Mpstat.parse(MPSTAT_SAMPLE, &recorder).unwrap();
        let m = metrics(&recorder);
        assert_eq!(m["system.cpu.user"], Some(Scalar::Float(2.5)));
        assert_eq!(m["system.cpu.system"], Some(Scalar::Float(0.88)));
        assert_eq!(m["system.cpu.idle"], Some(Scalar::Float(96.54)));
    }

    #[test]
    fn test_mpstat_24h_clock() {
        let sample = "12:00:01     CPU    %usr   %nice    %sys   %idle\n\
Average:     all    1.00    0.00    2.00   97.00\n";
        let recorder = Recorder::in_memory();
        Mpstat.parse(sample, &recorder).unwrap();
        let m = metrics(&recorder);
        assert_eq!(m["system.cpu.user"], Some(Scalar::Float(1.0)));
        assert_eq!(m["system.cpu.idle"], Some(Scalar::Float(97.0)));
    }

    #[test]
    fn test_mpstat_garbage_fails() {
        let recorder = Recorder::in_memory();
        assert!(Mpstat.parse("mpstat: command not found\n", &recorder).is_err());
        assert!(recorder.store(Category::Metrics).is_empty());
    }

    const IOSTAT_SAMPLE: &str = "Linux 5.4.0 (db-01) \t01/15/2024 \t_x86_64_\t(2 CPU)\n\
\n\
Device:         rrqm/s   wrqm/s     r/s     w/s    rkB/s    wkB/s avgrq-sz avgqu-sz   await r_await w_await  svctm  %util\n\
sda               0.10     2.00    1.00    3.00    40.00   100.00    70.00     0.01    1.50    0.80    1.70   0.40   0.16\n\
\n\
Device:         rrqm/s   wrqm/s     r/s     w/s    rkB/s    wkB/s avgrq-sz avgqu-sz   await r_await w_await  svctm  %util\n\
sda               0.00     0.00    0.00    2.00     0.00    12.50    12.50     0.00    2.00    0.00    2.00   1.00   0.20\n\
sdb               0.00     0.00    1.00    0.00    64.00     0.00   128.00     0.00    0.50    0.50    0.00   0.50   0.05\n";

    #[test]
    fn test_iostat_uses_last_report() {
        let recorder = Recorder::in_memory();
        Iostat.parse(IOSTAT_SAMPLE, &recorder).unwrap();
        let m = metrics(&recorder);
        assert_eq!(m["system.io.read_throughput:sda"], Some(Scalar::Int(0)));
        assert_eq!(m["system.io.write_throughput:sda"], Some(Scalar::Int(12)));
        assert_eq!(m["system.io.read_throughput:sdb"], Some(Scalar::Int(64)));
        assert_eq!(m["system.io.wait_time:sda"], Some(Scalar::Float(2.0)));
        assert_eq!(m["system.io.service_time:sdb"], Some(Scalar::Float(0.5)));
        assert_eq!(recorder.store(Category::Metrics).len(), 8);

        for name in m.keys() {
            assert!(
                IOSTAT.metrics.iter().any(|spec| spec.matches(name)),
                "{name} is not described by the iostat descriptor"
            );
        }
    }

    #[test]
    fn test_iostat_megabyte_columns() {
        let sample = "Device            r/s     rMB/s     w/s     wMB/s\n\
nvme0n1          1.00      2.00    3.00      0.50\n";
        let recorder = Recorder::in_memory();
        Iostat.parse(sample, &recorder).unwrap();
        let m = metrics(&recorder);
        assert_eq!(m["system.io.read_throughput:nvme0n1"], Some(Scalar::Int(2048)));
        assert_eq!(m["system.io.write_throughput:nvme0n1"], Some(Scalar::Int(512)));
        assert!(!m.contains_key("system.io.service_time:nvme0n1"));
    }

    #[test]
    fn test_descriptors_are_valid() {
        for d in [&MEMINFO, &MEMTOTAL, &MPSTAT, &IOSTAT] {
            assert!(d.validate().is_ok(), "{} should validate", d.name);
        }
    }
}
