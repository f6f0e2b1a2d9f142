use crate::descriptor::{Acquisition, MetricSpec, ProviderDescriptor};
use crate::error::ProviderError;
use crate::parse::{convert_data_unit, DataUnit};
use crate::runner::read_command;
use crate::{Provider, Recorder};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::time::Duration;

const REDIS_VERSION: &str = "system.packages.version.redis";
const REDIS_USED_MEMORY: &str = "service.redis.used_memory";
const INFO_COMMAND: &str = "redis-cli info";
const INFO_TIMEOUT: Duration = Duration::from_secs(5);

static VERSION_DESCRIPTOR: ProviderDescriptor = ProviderDescriptor {
    name: "redis_version",
    description: "Installed Redis server version",
    metrics: &[],
    states: &[MetricSpec::new(REDIS_VERSION, "Redis Version")],
    events: &[],
    interval: Some(Duration::from_secs(10)),
    acquisition: Acquisition::Direct,
};

static MEMORY_DESCRIPTOR: ProviderDescriptor = ProviderDescriptor {
    name: "redis_memory",
    description: "Memory used by the local Redis server",
    metrics: &[MetricSpec::new(REDIS_USED_MEMORY, "Used Memory").with_unit("KiB")],
    states: &[],
    events: &[],
    interval: Some(Duration::from_secs(10)),
    acquisition: Acquisition::Direct,
};

/// Output of `redis-cli info`, or `None` when `redis-cli` is not installed.
async fn redis_info() -> anyhow::Result<Option<String>> {
    match read_command(INFO_COMMAND, INFO_TIMEOUT).await {
        Ok(output) => Ok(Some(output)),
        Err(ProviderError::Spawn { source, .. }) if source.kind() == ErrorKind::NotFound => {
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

/// Value of `key` in `redis-cli info` output (`key:value` lines).
fn info_field<'a>(info: &'a str, key: &str) -> Option<&'a str> {
    info.lines().find_map(|line| {
        let (name, value) = line.trim().split_once(':')?;
        (name == key).then_some(value.trim())
    })
}

#[derive(Debug, Default)]
pub struct RedisVersion;

#[async_trait]
impl Provider for RedisVersion {
    fn descriptor(&self) -> &'static ProviderDescriptor {
        &VERSION_DESCRIPTOR
    }

    async fn fetch(&mut self, recorder: &Recorder) -> anyhow::Result<()> {
        match redis_info().await?.as_deref().and_then(|info| info_field(info, "redis_version")) {
            Some(version) => recorder.state(REDIS_VERSION, version),
            None => recorder.clear_state(REDIS_VERSION),
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct RedisMemory;

#[async_trait]
impl Provider for RedisMemory {
    fn descriptor(&self) -> &'static ProviderDescriptor {
        &MEMORY_DESCRIPTOR
    }

    async fn fetch(&mut self, recorder: &Recorder) -> anyhow::Result<()> {
        let Some(info) = redis_info().await? else {
            return Ok(());
        };
        let used = info_field(&info, "used_memory")
            .ok_or_else(|| anyhow::anyhow!("used_memory missing from redis info"))?;
        let kib = convert_data_unit(used, DataUnit::B, DataUnit::K)
            .ok_or_else(|| anyhow::anyhow!("unparseable used_memory '{used}'"))?;
        recorder.metric(REDIS_USED_MEMORY, kib);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INFO: &str = concat!(
        "# Server\r\nredis_version:7.2.4\r\nredis_mode:standalone\r\n\r\n",
        "# Memory\r\nused_memory:1048576\r\nused_memory_human:1.00M\r\n",
    );

    #[test]
    fn test_info_field() {
        assert_eq!(info_field(INFO, "redis_version"), Some("7.2.4"));
        assert_eq!(info_field(INFO, "used_memory"), Some("1048576"));
        assert_eq!(info_field(INFO, "used_memory_rss"), None);
    }

    #[test]
    fn test_descriptors_are_valid() {
        assert!(VERSION_DESCRIPTOR.validate().is_ok());
        assert!(MEMORY_DESCRIPTOR.validate().is_ok());
    }
}
