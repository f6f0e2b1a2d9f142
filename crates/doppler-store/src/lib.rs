//! In-memory holding area between providers and the transmission loop.
//!
//! Providers append [`Sample`]s to a [`ValueStore`] from their own tasks; the
//! collector periodically drains completed samples, folds them into a
//! [`PayloadAccumulator`] per category and removes them from the store once
//! the endpoint has acknowledged the payload.
//!
//! [`Sample`]: doppler_common::types::Sample

pub mod payload;
pub mod value_store;

pub use payload::{merge, PayloadAccumulator, PayloadNode};
pub use value_store::ValueStore;

#[cfg(test)]
mod tests;
