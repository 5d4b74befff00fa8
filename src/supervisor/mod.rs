//! Supervisor Module
//!
//! Owns the frontend and backend processes for one development session,
//! restarts the backend on source changes and runs the shutdown protocol.
//!
//! State machine:
//!
//! ```text
//! Starting -> Running -> Reloading -> Running -> ...
//! Starting | Running | Reloading -> ShuttingDown -> Stopped
//! ```
//!
//! All transitions happen on the task driving [`Supervisor::start`] and
//! [`Supervisor::run`]; signals and restart requests arrive as messages
//! through a [`SupervisorHandle`].

mod readiness;
mod session;
mod state;

pub use readiness::{Readiness, ReadinessPolicy};
pub use session::{Supervisor, SupervisorConfig, SupervisorHandle};
pub use state::{SupervisorExit, SupervisorState, SupervisorStatus};
