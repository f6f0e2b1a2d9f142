//! The doppler monitoring agent.
//!
//! [`Collector`] starts the providers, periodically drains their stores into
//! the payload accumulators and posts the resulting [`Envelope`] through a
//! [`Transport`]. Samples leave the stores only after the endpoint answered
//! with HTTP 200; until then the accumulated payload is resent every cycle.

pub mod collector;
pub mod config;
pub mod envelope;
pub mod error;
pub mod transport;

pub use collector::{Collector, CollectorSettings, Delivery, DrainMode};
pub use config::AgentConfig;
pub use envelope::{Envelope, Identity};
pub use error::{AgentError, Result};
pub use transport::{HttpTransport, Transport, TransportResponse};
