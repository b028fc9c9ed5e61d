//! obd-sim - ELM327 vehicle simulator
//!
//! Serves the ELM327 command set over TCP from a simulated vehicle, so the
//! telemetry client can be developed and tested without a car.
//!
//! - [`physics`]: scenario state machine and the continuous vehicle variables
//! - [`responder`]: command → reply, using the shared channel registry
//! - [`server`]: TCP accept loop and the physics tick task
//!
//! ```rust,no_run
//! # async fn example() -> obd_sim::SimResult<()> {
//! let sim = obd_sim::start(&obd_sim::SimConfig::default()).await?;
//! println!("listening on {}", sim.addr());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod physics;
pub mod responder;
pub mod server;

pub use config::SimConfig;
pub use error::{SimError, SimResult};
pub use physics::{PhysicsConfig, PhysicsModel, Scenario, Transition, VehicleState};
pub use responder::respond;
pub use server::{serve_connection, start, ProtocolServer, RunningSimulator, SharedState};
