//! Step interrupt executor.
//!
//! [`Stepper::on_tick`] is the body of the periodic step timer interrupt. It
//! pops prepared segments and traces each block's line with a Bresenham
//! counter per axis, emitting at most one pulse per axis per tick.

use core::cell::RefCell;

use critical_section::Mutex;
use heapless::Deque;

use super::hal::StepperHal;
use super::segment::{Segment, StBlock, SEGMENT_QUEUE_CAPACITY, ST_BLOCK_BUFFER_SIZE};
use crate::axes::AxisMask;
use crate::config::MachineConfig;
use crate::system::{ExecState, MachineState, ProbeMonitor, RunState};
use crate::N_AXIS;

/// Output settings fixed at construction.
#[derive(Debug, Clone, Copy)]
struct OutputSettings {
    step_invert: AxisMask,
    dir_invert: AxisMask,
    pulse_microseconds: u8,
    idle_lock: bool,
}

/// Line tracing state of the segment being executed.
#[derive(Debug, Clone, Copy, Default)]
struct Tracer {
    /// Snapshot the counters were initialized for.
    block_index: Option<u8>,
    segment_loaded: bool,
    direction_bits: AxisMask,
    event_count: u32,
    counters: [u32; N_AXIS],
    /// Per-tick counter increments at the segment's smoothing level.
    increments: [u32; N_AXIS],
    ticks_left: u32,
    dir_outbits: AxisMask,
    step_outbits: AxisMask,
}

struct Inner<H> {
    hal: H,
    segments: Deque<Segment, SEGMENT_QUEUE_CAPACITY>,
    blocks: [StBlock; ST_BLOCK_BUFFER_SIZE],
    tracer: Tracer,
    settings: OutputSettings,
    running: bool,
    /// Stopped since the drivers were last energized.
    release_pending: bool,
}

impl<H: StepperHal> Inner<H> {
    fn tick(&mut self, state: &MachineState) {
        // Outputs computed on the previous tick go out first, so the pulse
        // train is jitter free
        let tracer = self.tracer;
        self.hal.output(tracer.dir_outbits, tracer.step_outbits);
        if tracer.step_outbits != self.settings.step_invert {
            self.hal.arm_pulse_reset(self.settings.pulse_microseconds);
        }

        if !self.tracer.segment_loaded && !self.load_segment() {
            self.go_idle();
            state.request(ExecState::CYCLE_STOP);
            return;
        }

        if let ProbeMonitor::Active { away } = state.probe_monitor() {
            if self.hal.probe_triggered() ^ away {
                state.probe_triggered();
            }
        }

        let tracer = &mut self.tracer;
        let mut pulses = AxisMask::empty();
        let mut position = state.position();
        for axis in 0..N_AXIS {
            tracer.counters[axis] += tracer.increments[axis];
            if tracer.counters[axis] > tracer.event_count {
                tracer.counters[axis] -= tracer.event_count;
                pulses |= AxisMask::axis(axis);
                if tracer.direction_bits.has_axis(axis) {
                    position[axis] -= 1;
                } else {
                    position[axis] += 1;
                }
            }
        }
        if !pulses.is_empty() {
            state.set_position(position);
        }

        tracer.ticks_left -= 1;
        if tracer.ticks_left == 0 {
            tracer.segment_loaded = false;
            self.segments.pop_front();
        }

        self.tracer.step_outbits = pulses ^ self.settings.step_invert;
    }

    /// Load the next segment with work in it. Returns `false` when the ring
    /// is empty.
    fn load_segment(&mut self) -> bool {
        while let Some(segment) = self.segments.front().copied() {
            if segment.n_step == 0 {
                self.segments.pop_front();
                continue;
            }

            let block = self.blocks[usize::from(segment.st_block_index)];
            let tracer = &mut self.tracer;
            if tracer.block_index != Some(segment.st_block_index) {
                tracer.block_index = Some(segment.st_block_index);
                tracer.direction_bits = block.direction_bits;
                tracer.dir_outbits = block.direction_bits ^ self.settings.dir_invert;
                tracer.event_count = block.step_event_count;
                // Rounded half so a single-step line still pulses
                tracer.counters = [(block.step_event_count + 1) >> 1; N_AXIS];
            }
            tracer.increments = block.steps.map(|s| s >> segment.smoothing_level);
            tracer.ticks_left = segment.n_step;
            tracer.segment_loaded = true;

            self.hal.set_period(segment.cycles_per_tick);
            return true;
        }
        false
    }

    /// Stop the step timer. A pulse still in flight is ended by the
    /// pulse-reset timer, and the drivers stay energized until
    /// [`Stepper::release_drivers`].
    fn go_idle(&mut self) {
        self.running = false;
        self.hal.stop_timer();
        self.tracer.step_outbits = self.settings.step_invert;
        self.release_pending = true;
    }
}

/// Step executor shared between the main loop and the step interrupt.
///
/// The segment ring and block snapshots are filled by
/// [`SegmentPreparer`](super::SegmentPreparer) and drained by
/// [`on_tick`](Self::on_tick). Can live in a `static`.
pub struct Stepper<H> {
    inner: Mutex<RefCell<Inner<H>>>,
}

impl<H: StepperHal> Stepper<H> {
    /// Wrap the hardware outputs. Pin inversion and pulse settings come
    /// from `config`.
    pub fn new(hal: H, config: &MachineConfig) -> Self {
        let mut step_invert = AxisMask::empty();
        let mut dir_invert = AxisMask::empty();
        for (axis, axis_config) in config.axes.as_array().into_iter().enumerate() {
            step_invert.set(AxisMask::axis(axis), axis_config.invert_step);
            dir_invert.set(AxisMask::axis(axis), axis_config.invert_direction);
        }

        let settings = OutputSettings {
            step_invert,
            dir_invert,
            pulse_microseconds: config.stepper.pulse_microseconds,
            idle_lock: config.stepper.idle_lock,
        };

        Self {
            inner: Mutex::new(RefCell::new(Inner {
                hal,
                segments: Deque::new(),
                blocks: [StBlock::default(); ST_BLOCK_BUFFER_SIZE],
                tracer: Tracer {
                    step_outbits: step_invert,
                    dir_outbits: dir_invert,
                    ..Tracer::default()
                },
                settings,
                running: false,
                release_pending: false,
            })),
        }
    }

    /// Step timer interrupt body.
    pub fn on_tick(&self, state: &MachineState) {
        if state.abort() {
            return;
        }
        critical_section::with(|cs| {
            let mut inner = self.inner.borrow_ref_mut(cs);
            if inner.running {
                inner.tick(state);
            }
        });
    }

    /// Pulse-reset timer interrupt body: end the step pulse.
    pub fn on_pulse_reset(&self) {
        critical_section::with(|cs| {
            let mut inner = self.inner.borrow_ref_mut(cs);
            let idle = inner.settings.step_invert;
            inner.hal.end_pulse(idle);
        });
    }

    /// Energize the drivers and start the step timer. Only takes effect in
    /// the Cycle or Homing state.
    pub fn wake_up(&self, state: &MachineState) {
        if !state.run_state().is_any(RunState::CYCLE | RunState::HOMING) {
            return;
        }
        critical_section::with(|cs| {
            let mut inner = self.inner.borrow_ref_mut(cs);
            if inner.running {
                return;
            }
            inner.tracer.step_outbits = inner.settings.step_invert;
            inner.release_pending = false;
            inner.hal.set_drivers_enabled(true);
            let period = inner
                .segments
                .front()
                .map_or(0, |segment| segment.cycles_per_tick);
            inner.hal.set_period(period);
            inner.hal.start_timer();
            inner.running = true;
        });
        debug!("stepper: wake up");
    }

    /// Stop the step timer. The drivers stay energized.
    pub fn go_idle(&self) {
        critical_section::with(|cs| self.inner.borrow_ref_mut(cs).go_idle());
    }

    /// The stepper stopped and the drivers have not been released yet.
    pub fn release_pending(&self) -> bool {
        critical_section::with(|cs| self.inner.borrow_ref(cs).release_pending)
    }

    /// Release the drivers after a stop, unless the idle lock holds them.
    ///
    /// Main-context counterpart of the step interrupt going idle, called
    /// once the idle-lock delay has passed. An alarm always releases, and
    /// homing always holds. Returns `true` if the drivers were released.
    pub fn release_drivers(&self, state: &MachineState) -> bool {
        critical_section::with(|cs| {
            let mut inner = self.inner.borrow_ref_mut(cs);
            if inner.running || !core::mem::take(&mut inner.release_pending) {
                return false;
            }
            let alarmed = !state.alarm().is_empty() || state.run_state() == RunState::ALARM;
            let release = !inner.settings.idle_lock || alarmed;
            if release && state.run_state() != RunState::HOMING {
                inner.hal.set_drivers_enabled(false);
                true
            } else {
                false
            }
        })
    }

    /// Stop, then drop every segment and all tracing state.
    pub fn reset(&self) {
        critical_section::with(|cs| {
            let mut inner = self.inner.borrow_ref_mut(cs);
            inner.go_idle();
            inner.segments.clear();
            let settings = inner.settings;
            inner.tracer = Tracer {
                step_outbits: settings.step_invert,
                dir_outbits: settings.dir_invert,
                ..Tracer::default()
            };
        });
    }

    /// Step timer is running.
    pub fn is_running(&self) -> bool {
        critical_section::with(|cs| self.inner.borrow_ref(cs).running)
    }

    /// Segments waiting or executing.
    pub fn segment_count(&self) -> usize {
        critical_section::with(|cs| self.inner.borrow_ref(cs).segments.len())
    }

    /// No room for another segment.
    pub fn is_full(&self) -> bool {
        critical_section::with(|cs| self.inner.borrow_ref(cs).segments.is_full())
    }

    /// Queue a prepared segment. Hands the segment back when the ring is
    /// full.
    pub fn push_segment(&self, segment: Segment) -> Result<(), Segment> {
        critical_section::with(|cs| self.inner.borrow_ref_mut(cs).segments.push_back(segment))
    }

    /// Store a block snapshot for segments to reference.
    pub fn store_block(&self, index: u8, block: StBlock) {
        critical_section::with(|cs| {
            if let Some(slot) = self.inner.borrow_ref_mut(cs).blocks.get_mut(usize::from(index)) {
                *slot = block;
            }
        });
    }

    /// Run `f` with the hardware outputs.
    pub fn with_hal<R>(&self, f: impl FnOnce(&mut H) -> R) -> R {
        critical_section::with(|cs| f(&mut self.inner.borrow_ref_mut(cs).hal))
    }
}
