//! Discrete-event collaborators for the Stowage warehouse simulation.
//!
//! Processes are plain async tasks on a current-thread tokio runtime whose
//! clock is paused: whenever every task is idle, virtual time jumps to the
//! next pending timer. That gives the single-threaded cooperative
//! scheduling of a classic discrete-event simulator without a bespoke
//! event loop.
//!
//! # Modules
//!
//! - [`environment`] -- [`Environment`] clock: current time and timeouts.
//! - [`service_point`] -- [`ServicePoint`], a priority-ordered resource.
//! - [`conveyor`] -- [`Conveyor`], a FIFO queue with conditional gets.
//! - [`ant`] -- [`Ant`] vehicle capability and the concrete [`Vehicle`].
//! - [`error`] -- Error types for the collaborators.

pub mod ant;
pub mod conveyor;
pub mod environment;
pub mod error;
pub mod service_point;

pub use ant::{Ant, Vehicle};
pub use conveyor::Conveyor;
pub use environment::Environment;
pub use error::SimError;
pub use service_point::{ServiceGrant, ServicePoint};
