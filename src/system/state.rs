//! Shared machine state.
//!
//! Everything here is written from both the step interrupt and the main
//! loop, so every field sits behind a critical section (or is atomic).

use core::cell::Cell;
use core::sync::atomic::{AtomicBool, Ordering};

use critical_section::Mutex;

use super::flags::{ExecAlarm, ExecState, RunState, SuspendFlags};
use crate::N_AXIS;

/// Probe monitor mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ProbeMonitor {
    /// Not watching the probe.
    #[default]
    Off,
    /// Watching the probe on every step tick.
    Active {
        /// Trigger on the probe opening instead of closing.
        away: bool,
    },
}

/// The single authoritative machine state.
///
/// Shared by reference between the coordinator, the segment preparer and
/// the step interrupt. Can live in a `static`.
pub struct MachineState {
    run_state: Mutex<Cell<RunState>>,
    suspend: Mutex<Cell<SuspendFlags>>,
    exec: Mutex<Cell<ExecState>>,
    alarm: Mutex<Cell<ExecAlarm>>,
    abort: AtomicBool,
    position: Mutex<Cell<[i32; N_AXIS]>>,
    probe: Mutex<Cell<ProbeMonitor>>,
    probe_position: Mutex<Cell<[i32; N_AXIS]>>,
    probe_succeeded: AtomicBool,
}

impl Default for MachineState {
    fn default() -> Self {
        Self::new()
    }
}

impl MachineState {
    /// Idle machine at the origin.
    pub const fn new() -> Self {
        Self {
            run_state: Mutex::new(Cell::new(RunState::IDLE)),
            suspend: Mutex::new(Cell::new(SuspendFlags::empty())),
            exec: Mutex::new(Cell::new(ExecState::empty())),
            alarm: Mutex::new(Cell::new(ExecAlarm::empty())),
            abort: AtomicBool::new(false),
            position: Mutex::new(Cell::new([0; N_AXIS])),
            probe: Mutex::new(Cell::new(ProbeMonitor::Off)),
            probe_position: Mutex::new(Cell::new([0; N_AXIS])),
            probe_succeeded: AtomicBool::new(false),
        }
    }

    /// Current run state.
    pub fn run_state(&self) -> RunState {
        critical_section::with(|cs| self.run_state.borrow(cs).get())
    }

    /// Change the run state.
    pub fn set_run_state(&self, state: RunState) {
        critical_section::with(|cs| self.run_state.borrow(cs).set(state));
    }

    /// Current suspend flags.
    pub fn suspend(&self) -> SuspendFlags {
        critical_section::with(|cs| self.suspend.borrow(cs).get())
    }

    /// Replace the suspend flags.
    pub fn set_suspend(&self, flags: SuspendFlags) {
        critical_section::with(|cs| self.suspend.borrow(cs).set(flags));
    }

    /// Add suspend flags.
    pub fn insert_suspend(&self, flags: SuspendFlags) {
        critical_section::with(|cs| {
            let cell = self.suspend.borrow(cs);
            cell.set(cell.get() | flags);
        });
    }

    /// Pending realtime requests.
    pub fn exec(&self) -> ExecState {
        critical_section::with(|cs| self.exec.borrow(cs).get())
    }

    /// Raise realtime requests. Safe from any context.
    pub fn request(&self, flags: ExecState) {
        critical_section::with(|cs| {
            let cell = self.exec.borrow(cs);
            cell.set(cell.get() | flags);
        });
    }

    /// Clear realtime requests.
    pub fn clear_exec(&self, flags: ExecState) {
        critical_section::with(|cs| {
            let cell = self.exec.borrow(cs);
            cell.set(cell.get() - flags);
        });
    }

    /// Pending alarms.
    pub fn alarm(&self) -> ExecAlarm {
        critical_section::with(|cs| self.alarm.borrow(cs).get())
    }

    /// Raise alarm flags. Safe from any context.
    pub fn raise_alarm(&self, flags: ExecAlarm) {
        critical_section::with(|cs| {
            let cell = self.alarm.borrow(cs);
            cell.set(cell.get() | flags);
        });
    }

    /// Clear every pending alarm.
    pub fn clear_alarms(&self) {
        critical_section::with(|cs| self.alarm.borrow(cs).set(ExecAlarm::empty()));
    }

    /// Check the abort latch.
    #[inline]
    pub fn abort(&self) -> bool {
        self.abort.load(Ordering::Acquire)
    }

    /// Latch abort. Only a reinitialization clears it.
    pub fn set_abort(&self) {
        self.abort.store(true, Ordering::Release);
    }

    pub(crate) fn clear_abort(&self) {
        self.abort.store(false, Ordering::Release);
    }

    /// Machine position in motor steps.
    pub fn position(&self) -> [i32; N_AXIS] {
        critical_section::with(|cs| self.position.borrow(cs).get())
    }

    /// Overwrite the machine position, e.g. after homing.
    pub fn set_position(&self, steps: [i32; N_AXIS]) {
        critical_section::with(|cs| self.position.borrow(cs).set(steps));
    }

    /// Probe monitor mode.
    pub fn probe_monitor(&self) -> ProbeMonitor {
        critical_section::with(|cs| self.probe.borrow(cs).get())
    }

    /// Arm or disarm the probe monitor.
    pub fn set_probe_monitor(&self, monitor: ProbeMonitor) {
        critical_section::with(|cs| self.probe.borrow(cs).set(monitor));
    }

    /// Position captured at the last probe trigger, in motor steps.
    pub fn probe_position(&self) -> [i32; N_AXIS] {
        critical_section::with(|cs| self.probe_position.borrow(cs).get())
    }

    pub(crate) fn set_probe_position(&self, steps: [i32; N_AXIS]) {
        critical_section::with(|cs| self.probe_position.borrow(cs).set(steps));
    }

    /// Whether the last probe cycle triggered.
    pub fn probe_succeeded(&self) -> bool {
        self.probe_succeeded.load(Ordering::Acquire)
    }

    pub(crate) fn set_probe_succeeded(&self, succeeded: bool) {
        self.probe_succeeded.store(succeeded, Ordering::Release);
    }

    /// Record a probe trigger: capture the position, disarm, and cancel
    /// the probing move.
    pub(crate) fn probe_triggered(&self) {
        critical_section::with(|cs| {
            self.probe_position
                .borrow(cs)
                .set(self.position.borrow(cs).get());
            self.probe.borrow(cs).set(ProbeMonitor::Off);
            let exec = self.exec.borrow(cs);
            exec.set(exec.get() | ExecState::MOTION_CANCEL);
        });
    }

    /// Request a feed hold.
    pub fn feed_hold(&self) {
        self.request(ExecState::FEED_HOLD);
    }

    /// Request a cycle start or resume.
    pub fn cycle_start(&self) {
        self.request(ExecState::CYCLE_START);
    }

    /// Request a motion cancel.
    pub fn motion_cancel(&self) {
        self.request(ExecState::MOTION_CANCEL);
    }

    /// Signal that the safety door opened.
    pub fn safety_door(&self) {
        self.request(ExecState::SAFETY_DOOR);
    }

    /// Request a status report.
    pub fn status_report(&self) {
        self.request(ExecState::STATUS_REPORT);
    }

    /// Clear every request, alarm, suspend flag and the abort latch.
    pub(crate) fn clear_realtime(&self) {
        critical_section::with(|cs| {
            self.exec.borrow(cs).set(ExecState::empty());
            self.alarm.borrow(cs).set(ExecAlarm::empty());
            self.suspend.borrow(cs).set(SuspendFlags::empty());
        });
        self.clear_abort();
    }
}
