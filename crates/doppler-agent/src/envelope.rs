use doppler_common::id::machine_id;
use doppler_common::types::Timestamp;
use doppler_store::PayloadAccumulator;
use serde::Serialize;

/// Who is reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub api_key: String,
    pub machine_id: String,
    pub hostname: String,
}

impl Identity {
    /// Identity with the machine id derived from `hostname`.
    pub fn new(api_key: impl Into<String>, hostname: impl Into<String>) -> Self {
        let hostname = hostname.into();
        Self {
            api_key: api_key.into(),
            machine_id: machine_id(&hostname),
            hostname,
        }
    }
}

/// The JSON document posted to the collection endpoint.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope<'a> {
    pub api_key: &'a str,
    pub machine_id: &'a str,
    pub hostname: &'a str,
    pub collected_ts: Timestamp,
    pub sent_ts: Timestamp,
    pub metrics: &'a PayloadAccumulator,
    pub states: &'a PayloadAccumulator,
    pub events: &'a PayloadAccumulator,
}
