//! Session control: wait for the device, then poll it until cancelled.
//!
//! Two pieces run one after the other on a single task:
//! 1. **Connection gate** ([`ConnectionGate`]): blocks until `/status` answers
//! 2. **Poll loop** ([`PollLoop`]): fetches `/log`, dedups against the
//!    [`Watermark`] and appends new entries to the record

pub mod gate;
pub mod session;
pub mod watermark;

pub use gate::{ConnectionGate, GateConfig};
pub use session::{PollConfig, PollLoop, SessionState, Summary};
pub use watermark::Watermark;
