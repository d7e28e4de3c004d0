//! Health checking.
//!
//! - [`HealthProber`] probes upstream backends of a capability and yields a
//!   [`HealthSignal`] that feeds the status fuser.
//! - [`liveness_check`] answers `/health` for the relay process itself.

mod prober;
mod routes;

pub use prober::*;
pub use routes::*;
