use sysinfo::System;
use uuid::Uuid;

/// Derive the stable machine identifier reported with every payload.
///
/// The identifier is a name-based UUID (v5) of the hostname in the DNS
/// namespace, so the same host always reports the same id.
pub fn machine_id(hostname: &str) -> String {
    Uuid::new_v5(&Uuid::NAMESPACE_DNS, hostname.as_bytes()).to_string()
}

/// Hostname reported by the operating system, if any.
pub fn local_hostname() -> Option<String> {
    System::host_name().filter(|name| !name.trim().is_empty())
}
