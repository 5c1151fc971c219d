//! Run state and realtime flag sets.

use bitflags::bitflags;

use crate::error::Alarm;

bitflags! {
    /// Machine run state.
    ///
    /// Exactly one bit is set at any time. Bits make membership tests
    /// against several states a single mask check.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct RunState: u8 {
        /// Ready, nothing queued or executing.
        const IDLE          = 1 << 0;
        /// Locked out by an alarm until reset or unlock.
        const ALARM         = 1 << 1;
        /// Moves are validated but not executed.
        const CHECK_MODE    = 1 << 2;
        /// An external homing cycle is running.
        const HOMING        = 1 << 3;
        /// Executing queued motion.
        const CYCLE         = 1 << 4;
        /// Decelerating to, or stopped in, a feed hold.
        const HOLD          = 1 << 5;
        /// Stopped by an open safety door.
        const SAFETY_DOOR   = 1 << 6;
        /// Decelerating to a stop that discards the rest of the plan.
        const MOTION_CANCEL = 1 << 7;
    }
}

impl RunState {
    /// States in which the segment buffer must be kept fed.
    pub const MOTION: Self = Self::CYCLE
        .union(Self::HOLD)
        .union(Self::MOTION_CANCEL)
        .union(Self::SAFETY_DOOR)
        .union(Self::HOMING);

    /// States that force the executing block to decelerate to a stop.
    pub const SUSPENDING: Self = Self::HOLD
        .union(Self::MOTION_CANCEL)
        .union(Self::SAFETY_DOOR);

    /// States from which hold requests are accepted.
    pub const HOLDABLE: Self = Self::IDLE
        .union(Self::CYCLE)
        .union(Self::HOLD)
        .union(Self::SAFETY_DOOR)
        .union(Self::MOTION_CANCEL);

    /// Check whether the state is any of `states`.
    #[inline]
    pub fn is_any(self, states: Self) -> bool {
        self.intersects(states)
    }
}

bitflags! {
    /// Suspend bookkeeping for hold, safety door and motion cancel.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SuspendFlags: u8 {
        /// A hold was requested while moving; deceleration in progress.
        const HOLD_ACTIVE     = 1 << 0;
        /// Motion has fully stopped; a cycle start may resume.
        const READY_TO_RESUME = 1 << 1;
        /// Spindle and coolant must be restored on resume.
        const ENERGIZE        = 1 << 2;
        /// The rest of the plan is discarded once stopped.
        const MOTION_CANCEL   = 1 << 3;
    }
}

bitflags! {
    /// Realtime requests raised by inputs, interrupts and the main loop.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ExecState: u8 {
        /// Report the machine status.
        const STATUS_REPORT = 1 << 0;
        /// Start or resume motion.
        const CYCLE_START   = 1 << 1;
        /// The step executor ran out of segments.
        const CYCLE_STOP    = 1 << 2;
        /// Decelerate to a stop and hold.
        const FEED_HOLD     = 1 << 3;
        /// Abort everything and reinitialize.
        const RESET         = 1 << 4;
        /// The safety door opened.
        const SAFETY_DOOR   = 1 << 5;
        /// Decelerate to a stop and discard the rest of the plan.
        const MOTION_CANCEL = 1 << 6;
    }
}

impl ExecState {
    /// Requests that bring motion to a controlled stop.
    pub const HOLD_FAMILY: Self = Self::FEED_HOLD
        .union(Self::SAFETY_DOOR)
        .union(Self::MOTION_CANCEL);
}

bitflags! {
    /// Pending alarm conditions.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ExecAlarm: u8 {
        /// Limit switch hit.
        const HARD_LIMIT     = 1 << 0;
        /// Target beyond machine travel.
        const SOFT_LIMIT     = 1 << 1;
        /// Reset while moving.
        const ABORT_CYCLE    = 1 << 2;
        /// Probe failed.
        const PROBE_FAIL     = 1 << 3;
        /// Homing failed.
        const HOMING_FAIL    = 1 << 4;
        /// Freeze everything until a reset arrives.
        const CRITICAL_EVENT = 1 << 5;
    }
}

impl ExecAlarm {
    /// The alarm to report, by priority.
    pub fn alarm(self) -> Option<Alarm> {
        if self.contains(Self::HARD_LIMIT) {
            Some(Alarm::HardLimit)
        } else if self.contains(Self::SOFT_LIMIT) {
            Some(Alarm::SoftLimit)
        } else if self.contains(Self::ABORT_CYCLE) {
            Some(Alarm::AbortCycle)
        } else if self.contains(Self::PROBE_FAIL) {
            Some(Alarm::ProbeFail)
        } else if self.contains(Self::HOMING_FAIL) {
            Some(Alarm::HomingFail)
        } else {
            None
        }
    }
}

impl From<Alarm> for ExecAlarm {
    fn from(alarm: Alarm) -> Self {
        match alarm {
            Alarm::HardLimit => Self::HARD_LIMIT,
            Alarm::SoftLimit => Self::SOFT_LIMIT,
            Alarm::AbortCycle => Self::ABORT_CYCLE,
            Alarm::ProbeFail => Self::PROBE_FAIL,
            Alarm::HomingFail => Self::HOMING_FAIL,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_groups() {
        assert!(RunState::CYCLE.is_any(RunState::MOTION));
        assert!(RunState::SAFETY_DOOR.is_any(RunState::SUSPENDING));
        assert!(!RunState::IDLE.is_any(RunState::MOTION));
        assert!(!RunState::ALARM.is_any(RunState::HOLDABLE));
        assert!(!RunState::HOMING.is_any(RunState::HOLDABLE));
    }

    #[test]
    fn test_alarm_priority() {
        let pending = ExecAlarm::PROBE_FAIL | ExecAlarm::SOFT_LIMIT | ExecAlarm::CRITICAL_EVENT;
        assert_eq!(pending.alarm(), Some(Alarm::SoftLimit));
        assert_eq!(ExecAlarm::CRITICAL_EVENT.alarm(), None);
        assert_eq!(ExecAlarm::from(Alarm::HomingFail), ExecAlarm::HOMING_FAIL);
    }
}
