//! Motion gateways: the blocking entry points of the G-code layer.
//!
//! Every wait in here runs the realtime coordinator and the
//! [`Accessories::idle`] hook on each iteration, so holds, resets and the
//! segment buffer are serviced while the caller is blocked.

use embedded_hal::delay::DelayNs;
use libm::ceilf;

use super::{Accessories, Machine};
use crate::error::{Alarm, Error, Result};
use crate::planner::{BufferStatus, LineData};
use crate::stepper::StepperHal;
use crate::system::{ExecAlarm, ProbeMonitor, RunState, SuspendFlags};
use crate::N_AXIS;

/// Dwell slice between two coordinator passes, in milliseconds.
const DWELL_TIME_STEP_MS: u32 = 50;

impl<'a, H, A, D> Machine<'a, H, A, D>
where
    H: StepperHal,
    A: Accessories,
    D: DelayNs,
{
    /// Queue a straight move to the absolute machine position `target`.
    ///
    /// Blocks while the planner is full, starting the cycle if it was not
    /// running yet.
    ///
    /// # Errors
    ///
    /// - [`Error::Locked`] in the Alarm state.
    /// - [`Error::Alarm`] with [`Alarm::SoftLimit`] when soft limits are
    ///   enabled and the target lies outside the travel. Motion is stopped
    ///   and the machine locked until a reset.
    /// - [`Error::Aborted`] if a reset arrived while waiting.
    pub fn line(&mut self, target: &[f32; N_AXIS], line: &LineData) -> Result<BufferStatus> {
        if self.state.run_state() == RunState::ALARM {
            return Err(Error::Locked);
        }

        if let Some(axis) = self
            .constraints
            .soft_limits
            .and_then(|limits| limits.violation(target))
        {
            warn!("soft limit on axis {}", axis);
            self.soft_limit_alarm();
            return Err(Alarm::SoftLimit.into());
        }

        if self.state.run_state() == RunState::CHECK_MODE {
            return Ok(BufferStatus::CheckOnly);
        }

        loop {
            self.execute_realtime();
            if self.state.abort() {
                return Err(Error::Aborted);
            }
            if !self.planner.is_full() {
                break;
            }
            self.auto_cycle_start();
            self.accessories.idle();
        }

        self.planner
            .buffer_line(target, line, &self.constraints, &mut self.prep)
    }

    /// Stop any motion in progress, then lock out with a critical soft
    /// limit alarm.
    fn soft_limit_alarm(&mut self) {
        if self.state.run_state() == RunState::CYCLE {
            // Stop with a controlled deceleration so the position is kept
            self.state.feed_hold();
            loop {
                self.execute_realtime();
                if self.state.abort() {
                    return;
                }
                let stopped = self.state.suspend().contains(SuspendFlags::READY_TO_RESUME)
                    || !self.state.run_state().is_any(RunState::MOTION);
                if stopped {
                    break;
                }
                self.accessories.idle();
            }
        }

        self.request_reset();
        self.state
            .raise_alarm(ExecAlarm::SOFT_LIMIT | ExecAlarm::CRITICAL_EVENT);
        self.execute_realtime();
    }

    /// Wait for `seconds` after all queued motion has finished.
    ///
    /// The wait is sliced so the coordinator keeps running. Does nothing in
    /// check mode.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Aborted`] if a reset arrived while waiting.
    pub fn dwell(&mut self, seconds: f32) -> Result<()> {
        if self.state.run_state() == RunState::CHECK_MODE {
            return Ok(());
        }
        self.buffer_synchronize()?;

        let total_ms = ceilf(seconds.max(0.0) * 1000.0) as u32;
        self.delay.delay_ms(total_ms % DWELL_TIME_STEP_MS);
        for _ in 0..total_ms / DWELL_TIME_STEP_MS {
            self.execute_realtime();
            if self.state.abort() {
                return Err(Error::Aborted);
            }
            self.delay.delay_ms(DWELL_TIME_STEP_MS);
        }
        Ok(())
    }

    /// Probe toward `target` until the probe input changes.
    ///
    /// Waits for queued motion to finish, then runs the move with the probe
    /// monitor armed. A trigger decelerates and cancels the rest of the
    /// move. The trigger position is available from
    /// [`probe_position_mm`](Self::probe_position_mm). `away` probes for
    /// the input opening instead of closing.
    ///
    /// Returns `Ok(true)` on a trigger. With `no_error` a move that ends
    /// without a trigger returns `Ok(false)` and records the end position.
    /// In check mode nothing moves and `Ok(false)` is returned.
    ///
    /// # Errors
    ///
    /// - [`Alarm::ProbeFail`] if the probe reads triggered before moving,
    ///   or the move ends without a trigger and `no_error` is not set.
    /// - [`Error::Aborted`] if a reset arrived during the cycle.
    pub fn probe_cycle(
        &mut self,
        target: &[f32; N_AXIS],
        line: &LineData,
        away: bool,
        no_error: bool,
    ) -> Result<bool> {
        if self.state.run_state() == RunState::CHECK_MODE {
            return Ok(false);
        }
        self.buffer_synchronize()?;

        if self.stepper.with_hal(|hal| hal.probe_triggered()) ^ away {
            warn!("probe: triggered before move");
            self.state.raise_alarm(ExecAlarm::PROBE_FAIL);
            self.execute_realtime();
            return Err(Alarm::ProbeFail.into());
        }

        self.line(target, line)?;

        self.state.set_probe_succeeded(false);
        self.state.set_probe_monitor(ProbeMonitor::Active { away });
        self.state.cycle_start();
        loop {
            self.execute_realtime();
            if self.state.abort() {
                self.state.set_probe_monitor(ProbeMonitor::Off);
                return Err(Error::Aborted);
            }
            if self.state.run_state() == RunState::IDLE {
                break;
            }
            self.accessories.idle();
        }

        let result = if self.state.probe_monitor() == ProbeMonitor::Off {
            self.state.set_probe_succeeded(true);
            debug!("probe: triggered");
            Ok(true)
        } else if no_error {
            self.state.set_probe_position(self.state.position());
            Ok(false)
        } else {
            self.state.raise_alarm(ExecAlarm::PROBE_FAIL);
            Err(Alarm::ProbeFail.into())
        };

        self.state.set_probe_monitor(ProbeMonitor::Off);
        self.execute_realtime();
        self.flush_motion();
        result
    }

    /// Block until all queued motion has executed.
    ///
    /// Starts the cycle if motion is queued but idle. A hold keeps this
    /// waiting until resumed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Aborted`] if a reset arrived while waiting.
    pub fn buffer_synchronize(&mut self) -> Result<()> {
        self.auto_cycle_start();
        loop {
            self.execute_realtime();
            if self.state.abort() {
                return Err(Error::Aborted);
            }
            if self.planner.is_empty() && self.state.run_state() != RunState::CYCLE {
                return Ok(());
            }
            self.accessories.idle();
        }
    }

    /// Request a cycle start if motion is queued.
    pub fn auto_cycle_start(&mut self) {
        if self.planner.current_block().is_some() {
            self.state.cycle_start();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::units::{MmPerMin, MmPerSecSquared};
    use crate::config::{AxisConfig, Axes, MachineConfig};
    use crate::stepper::{SimHal, Stepper};
    use crate::system::{ExecState, MachineState};
    use embedded_hal_mock::eh1::delay::NoopDelay;

    /// Drives the step interrupt from the blocking waits.
    struct TickingAccessories<'s> {
        stepper: &'s Stepper<SimHal>,
        state: &'s MachineState,
        idle_calls: u32,
    }

    impl Accessories for TickingAccessories<'_> {
        fn idle(&mut self) {
            self.idle_calls += 1;
            let start = self.stepper.segment_count();
            while self.stepper.is_running() && self.stepper.segment_count() == start {
                self.stepper.on_tick(self.state);
            }
        }
    }

    fn make_config() -> MachineConfig {
        let mut config = MachineConfig {
            axes: Axes::uniform(AxisConfig::new(40.0, MmPerMin(3000.0), MmPerSecSquared(200.0))),
            ..MachineConfig::default()
        };
        config.stepper.max_timer_period = u32::MAX;
        config
    }

    #[test]
    fn test_synchronize_runs_queue_to_completion() {
        let state = MachineState::new();
        let config = make_config();
        let stepper = Stepper::new(SimHal::new(), &config);
        let accessories = TickingAccessories {
            stepper: &stepper,
            state: &state,
            idle_calls: 0,
        };
        let mut machine = Machine::new(config, &state, &stepper, accessories, NoopDelay::new()).unwrap();

        machine.line(&[-10.0, -5.0, 0.0], &LineData::feed(1500.0)).unwrap();
        machine.line(&[-10.0, -15.0, -2.0], &LineData::feed(1500.0)).unwrap();
        machine.buffer_synchronize().unwrap();

        assert_eq!(state.run_state(), RunState::IDLE);
        assert_eq!(state.position(), [-400, -600, -80]);
        assert_eq!(stepper.with_hal(|hal| hal.position), [-400, -600, -80]);
        assert_eq!(machine.queue_depth(), 0);
    }

    #[test]
    fn test_line_waits_for_free_slot() {
        let state = MachineState::new();
        let config = make_config();
        let stepper = Stepper::new(SimHal::new(), &config);
        let accessories = TickingAccessories {
            stepper: &stepper,
            state: &state,
            idle_calls: 0,
        };
        let mut machine = Machine::new(config, &state, &stepper, accessories, NoopDelay::new()).unwrap();

        // One more move than the planner holds
        for i in 0..crate::BLOCK_BUFFER_SIZE {
            let x = -((i + 1) as f32);
            machine.line(&[x, 0.0, 0.0], &LineData::feed(1500.0)).unwrap();
        }

        assert!(machine.accessories().idle_calls > 0);
        assert_eq!(state.run_state(), RunState::CYCLE);

        machine.buffer_synchronize().unwrap();
        assert_eq!(state.position()[0], -(crate::BLOCK_BUFFER_SIZE as i32) * 40);
    }

    #[test]
    fn test_dwell_synchronizes_first() {
        let state = MachineState::new();
        let config = make_config();
        let stepper = Stepper::new(SimHal::new(), &config);
        let accessories = TickingAccessories {
            stepper: &stepper,
            state: &state,
            idle_calls: 0,
        };
        let mut machine = Machine::new(config, &state, &stepper, accessories, NoopDelay::new()).unwrap();

        machine.line(&[-2.0, 0.0, 0.0], &LineData::feed(600.0)).unwrap();
        machine.dwell(0.125).unwrap();

        assert_eq!(state.position(), [-80, 0, 0]);
        assert_eq!(state.run_state(), RunState::IDLE);
    }

    #[test]
    fn test_soft_limit_locks_out() {
        let state = MachineState::new();
        let mut config = make_config();
        config.machine.soft_limits = true;
        let stepper = Stepper::new(SimHal::new(), &config);

        /// Answers the critical lockout with a reset.
        struct ResetOnIdle<'s>(&'s MachineState);
        impl Accessories for ResetOnIdle<'_> {
            fn idle(&mut self) {
                self.0.request(ExecState::RESET);
            }
        }

        let mut machine =
            Machine::new(config, &state, &stepper, ResetOnIdle(&state), NoopDelay::new()).unwrap();

        // Travel spans [-200, 0]
        let result = machine.line(&[5.0, 0.0, 0.0], &LineData::feed(600.0));

        assert_eq!(result, Err(Error::Alarm(Alarm::SoftLimit)));
        assert_eq!(state.run_state(), RunState::ALARM);
        assert!(state.abort());
        assert_eq!(machine.queue_depth(), 0);

        machine.reinitialize();
        assert_eq!(
            machine.line(&[-5.0, 0.0, 0.0], &LineData::feed(600.0)),
            Err(Error::Locked)
        );
    }

    #[test]
    fn test_probe_already_triggered_fails() {
        let state = MachineState::new();
        let config = make_config();
        let stepper = Stepper::new(
            SimHal {
                probe_after_pulses: Some(0),
                ..SimHal::default()
            },
            &config,
        );
        let mut machine = Machine::new(config, &state, &stepper, (), NoopDelay::new()).unwrap();

        let result = machine.probe_cycle(&[0.0, 0.0, -10.0], &LineData::feed(100.0), false, false);

        assert_eq!(result, Err(Error::Alarm(Alarm::ProbeFail)));
        assert_eq!(state.run_state(), RunState::ALARM);
        assert_eq!(machine.queue_depth(), 0);
    }

    #[test]
    fn test_probe_without_contact() {
        let state = MachineState::new();
        let config = make_config();
        let stepper = Stepper::new(SimHal::new(), &config);
        let accessories = TickingAccessories {
            stepper: &stepper,
            state: &state,
            idle_calls: 0,
        };
        let mut machine = Machine::new(config, &state, &stepper, accessories, NoopDelay::new()).unwrap();

        let result = machine.probe_cycle(&[0.0, 0.0, -1.0], &LineData::feed(300.0), false, true);

        assert_eq!(result, Ok(false));
        assert!(!state.probe_succeeded());
        assert_eq!(state.probe_position(), [0, 0, -40]);
        assert_eq!(state.run_state(), RunState::IDLE);
        assert_eq!(state.probe_monitor(), ProbeMonitor::Off);
    }
}
