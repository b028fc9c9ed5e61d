//! obd-core - Shared telemetry state
//!
//! This crate holds the state every other part of the stack agrees on:
//!
//! - [`ValueStore`]: per-channel current value, running min/max and last update
//! - [`LinkState`]: the adapter link lifecycle, owned by the reconnect supervisor
//! - [`assist`]: driver hints derived from a store snapshot

pub mod assist;
pub mod state;
pub mod store;

pub use assist::{evaluate, AssistReport, ThrottleCoach};
pub use state::LinkState;
pub use store::{ChannelReading, ValueStore};

// Re-export the channel type so consumers need only this crate for reads
pub use obd_conv::ChannelId;
