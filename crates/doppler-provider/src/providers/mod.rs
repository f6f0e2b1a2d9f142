//! Built-in providers.
//!
//! `agent`, `redis`, `load` and `disk` run everywhere; `linux` and `mac`
//! scrape platform tools and files.

pub mod agent;
pub mod disk;
pub mod linux;
pub mod load;
pub mod mac;
pub mod redis;

use crate::registry::{Platform, ProviderRegistry};

/// Register every built-in provider with `registry`.
pub fn register_builtin(registry: &mut ProviderRegistry) {
    registry.register_common::<agent::AgentEvents>();
    registry.register_common::<redis::RedisVersion>();
    registry.register_common::<redis::RedisMemory>();
    registry.register_common::<load::LoadAverage>();
    registry.register_common::<disk::DiskUsage>();

    registry.register::<linux::Meminfo>(Platform::Linux);
    registry.register::<linux::MemTotal>(Platform::Linux);
    registry.register::<linux::Mpstat>(Platform::Linux);
    registry.register::<linux::Iostat>(Platform::Linux);

    registry.register::<mac::Iostat>(Platform::MacOs);
    registry.register::<mac::Top>(Platform::MacOs);
    registry.register::<mac::Sysctl>(Platform::MacOs);
}
