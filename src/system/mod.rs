//! Machine state shared between the main loop and the step interrupt.

mod flags;
mod state;

pub use flags::{ExecAlarm, ExecState, RunState, SuspendFlags};
pub use state::{MachineState, ProbeMonitor};
