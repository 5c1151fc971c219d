//! Step generation: segment preparation and the step interrupt.
//!
//! The [`SegmentPreparer`] runs in the main loop and slices planner blocks
//! into [`Segment`]s. The [`Stepper`] executes them from the step timer
//! interrupt through a [`StepperHal`].

mod executor;
mod hal;
mod prep;
mod ramp;
mod segment;

pub use executor::Stepper;
pub use hal::{PinPort, SimHal, StepTimer, StepperHal};
pub use prep::SegmentPreparer;
pub use ramp::{RampShape, RampType, VelocityProfile};
pub use segment::{Segment, StBlock, SEGMENT_QUEUE_CAPACITY, ST_BLOCK_BUFFER_SIZE};
