//! obd-link - ELM327 acquisition client
//!
//! Owns everything between the value store and the socket:
//!
//! - [`Connector`] / [`TcpConnector`]: open the transport with a bounded timeout
//! - [`ElmLink`]: AT handshake and prompt-framed request/response
//! - [`Poller`]: fast/slow batch cadences feeding the value store
//! - [`Supervisor`]: reconnects forever and publishes [`obd_core::LinkState`]
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use obd_core::ValueStore;
//! use obd_link::{LinkConfig, Poller, Supervisor, SupervisorConfig, TcpConnector};
//!
//! # async fn example() -> obd_link::LinkResult<()> {
//! let config = LinkConfig::default();
//! let store = Arc::new(ValueStore::new());
//! let poller = Arc::new(Poller::new(config.build_plans()?, store.clone(), &config.timing));
//! let connector = Arc::new(TcpConnector::from_config(&config));
//!
//! let handle = Supervisor::new(connector, poller, SupervisorConfig::from(&config)).spawn();
//! if handle.is_polling() {
//!     println!("rpm = {}", store.value(obd_core::ChannelId::Rpm));
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod connector;
pub mod error;
pub mod poller;
pub mod supervisor;

pub use client::ElmLink;
pub use config::{ChannelConfig, LinkConfig, TimingConfig};
pub use connector::{Connector, LinkStream, TcpConnector};
pub use error::{LinkError, LinkResult};
pub use poller::{CycleReport, PollPlans, Poller};
pub use supervisor::{Supervisor, SupervisorConfig, SupervisorHandle};
