//! First-launch attribution flow.
//!
//! Permissions and the remote flag resolve concurrently; the controller then
//! either fast-paths to the application or resolves a destination URL.

pub mod controller;
pub mod state;

pub use controller::{AttributionFlowController, FlowSettings};
pub use state::FlowState;
