//! Realtime command coordinator.

use embedded_hal::delay::DelayNs;

use super::{Accessories, Machine};
use crate::stepper::StepperHal;
use crate::system::{ExecAlarm, ExecState, ProbeMonitor, RunState, SuspendFlags};

impl<'a, H, A, D> Machine<'a, H, A, D>
where
    H: StepperHal,
    A: Accessories,
    D: DelayNs,
{
    /// Run one coordinator pass over the pending realtime requests.
    ///
    /// Called from every blocking wait of the gateways, and by the
    /// firmware main loop between commands. Never blocks, except for the
    /// critical alarm lockout, which freezes everything until a reset is
    /// requested.
    pub fn execute_realtime(&mut self) {
        let state = self.state;

        let alarm = state.alarm();
        if !alarm.is_empty() {
            state.set_run_state(RunState::ALARM);
            if let Some(alarm) = alarm.alarm() {
                warn!("alarm: {}", alarm);
                self.accessories.report_alarm(alarm);
            }
            if alarm.contains(ExecAlarm::CRITICAL_EVENT) {
                self.settle_drivers();
                // Only a fresh reset request releases the lockout
                state.clear_exec(ExecState::RESET);
                while !state.exec().contains(ExecState::RESET) {
                    self.accessories.idle();
                }
            }
            state.clear_alarms();
        }

        let exec = state.exec();
        if exec.contains(ExecState::RESET) {
            state.set_abort();
            return;
        }

        if exec.contains(ExecState::STATUS_REPORT) {
            let status = self.status();
            self.accessories.report_status(&status);
            state.clear_exec(ExecState::STATUS_REPORT);
        }

        if exec.intersects(ExecState::HOLD_FAMILY) {
            self.begin_hold(exec);
            state.clear_exec(ExecState::HOLD_FAMILY);
        }

        if exec.contains(ExecState::CYCLE_START) {
            if !exec.intersects(ExecState::HOLD_FAMILY) {
                self.resume_cycle();
            }
            state.clear_exec(ExecState::CYCLE_START);
        }

        // Re-read: a door opening while ready forces a cycle stop
        if state.exec().contains(ExecState::CYCLE_STOP) {
            self.complete_cycle();
            state.clear_exec(ExecState::CYCLE_STOP);
        }

        if state.run_state().is_any(RunState::MOTION) {
            self.prep
                .fill_segment_buffer(&mut self.planner, self.stepper, state);
        }

        if state.run_state() == RunState::SAFETY_DOOR
            && state.suspend().contains(SuspendFlags::ENERGIZE)
            && !self.accessories.safety_door_ajar()
        {
            debug!("realtime: safety door closed");
            state.set_run_state(RunState::HOLD);
        }

        self.settle_drivers();
    }

    fn begin_hold(&mut self, exec: ExecState) {
        let state = self.state;
        let run_state = state.run_state();
        if !run_state.is_any(RunState::HOLDABLE) {
            return;
        }

        if run_state == RunState::CYCLE {
            // Replan the executing block into a stop
            self.planner.notify_executing(&mut self.prep);
            state.set_suspend(SuspendFlags::HOLD_ACTIVE);
        }
        if run_state == RunState::IDLE {
            state.set_suspend(SuspendFlags::READY_TO_RESUME);
        }

        if exec.contains(ExecState::MOTION_CANCEL) {
            if run_state == RunState::CYCLE {
                state.set_run_state(RunState::MOTION_CANCEL);
            }
            state.insert_suspend(SuspendFlags::MOTION_CANCEL);
        }

        if exec.contains(ExecState::FEED_HOLD) && state.run_state() != RunState::SAFETY_DOOR {
            state.set_run_state(RunState::HOLD);
        }

        if exec.contains(ExecState::SAFETY_DOOR) {
            info!("realtime: safety door ajar");
            if state.suspend().contains(SuspendFlags::READY_TO_RESUME) {
                // Already stopped: de-energize right away
                state.request(ExecState::CYCLE_STOP);
            }
            state.insert_suspend(SuspendFlags::ENERGIZE);
            state.set_run_state(RunState::SAFETY_DOOR);
        }

        debug!(
            "realtime: hold, state {} suspend {}",
            state.run_state().bits(),
            state.suspend().bits()
        );
    }

    fn resume_cycle(&mut self) {
        let state = self.state;
        let run_state = state.run_state();
        let suspend = state.suspend();

        let ready = run_state.is_any(RunState::HOLD | RunState::MOTION_CANCEL)
            && suspend.contains(SuspendFlags::READY_TO_RESUME);
        if run_state != RunState::IDLE && !ready {
            return;
        }

        if suspend.contains(SuspendFlags::ENERGIZE) {
            if self.accessories.spindle_restore() {
                self.delay.delay_ms(self.config.machine.door_spindle_delay_ms);
            }
            if self.accessories.coolant_restore() {
                self.delay.delay_ms(self.config.machine.door_coolant_delay_ms);
            }
        }

        if self.planner.current_block().is_some() && !suspend.contains(SuspendFlags::MOTION_CANCEL) {
            state.set_run_state(RunState::CYCLE);
            self.prep
                .fill_segment_buffer(&mut self.planner, self.stepper, state);
            self.stepper.wake_up(state);
            debug!("realtime: cycle start, {} blocks", self.planner.block_count());
        } else {
            state.set_run_state(RunState::IDLE);
        }
        state.set_suspend(SuspendFlags::empty());
    }

    fn complete_cycle(&mut self) {
        let state = self.state;
        if state.run_state().is_any(RunState::HOLD | RunState::SAFETY_DOOR) {
            if state.suspend().contains(SuspendFlags::ENERGIZE) {
                self.accessories.spindle_stop();
                self.accessories.coolant_stop();
            }
            state.insert_suspend(SuspendFlags::READY_TO_RESUME);
            debug!("realtime: hold complete");
            return;
        }

        if state.suspend().contains(SuspendFlags::MOTION_CANCEL) {
            self.flush_motion();
        }
        state.set_suspend(SuspendFlags::empty());
        // Alarm and check mode stay put
        if state.run_state().is_any(RunState::MOTION | RunState::IDLE) {
            state.set_run_state(RunState::IDLE);
        }
    }

    /// Request a system reset.
    ///
    /// Stops spindle and coolant. When motion was in progress, kills the
    /// steppers and raises an aborted-cycle alarm (homing failure while
    /// homing), since the position is likely lost. The next
    /// [`execute_realtime`](Self::execute_realtime) latches the abort.
    pub fn request_reset(&mut self) {
        let state = self.state;
        if state.exec().contains(ExecState::RESET) {
            return;
        }
        state.request(ExecState::RESET);

        self.accessories.spindle_stop();
        self.accessories.coolant_stop();

        // A hold, cancel or door stop still decelerating is motion too
        let run_state = state.run_state();
        let suspend = state.suspend();
        let stopping = suspend.contains(SuspendFlags::HOLD_ACTIVE)
            && !suspend.contains(SuspendFlags::READY_TO_RESUME);
        if run_state.is_any(RunState::CYCLE | RunState::HOMING) || stopping {
            let alarm = if run_state == RunState::HOMING {
                ExecAlarm::HOMING_FAIL
            } else {
                ExecAlarm::ABORT_CYCLE
            };
            state.raise_alarm(alarm);
            self.stepper.go_idle();
            warn!("reset during motion, alarm {}", alarm.bits());
        }
    }

    /// Limit switch handler: reset and lock out until the next reset.
    pub fn trigger_hard_limit(&mut self) {
        if !self.state.alarm().is_empty() {
            return;
        }
        self.request_reset();
        self.state
            .raise_alarm(ExecAlarm::HARD_LIMIT | ExecAlarm::CRITICAL_EVENT);
    }

    /// Bring every component back to its boot state after an abort.
    ///
    /// Clears all requests and the abort latch, empties the planner, the
    /// preparer and the segment ring, and resyncs the planner to the
    /// machine position. An Alarm state survives; anything else becomes
    /// Idle.
    pub fn reinitialize(&mut self) {
        let state = self.state;
        state.clear_realtime();
        self.stepper.reset();
        self.prep.reset();
        self.planner.reset();
        self.sync_position();
        state.set_probe_monitor(ProbeMonitor::Off);
        self.settle_drivers();

        if state.run_state() != RunState::ALARM {
            state.set_run_state(RunState::IDLE);
        }
        info!("machine: reinitialized, state {}", state.run_state().bits());
    }

    /// Leave the Alarm state without a reset.
    ///
    /// Refused while the safety door is open. Returns `true` if the
    /// machine is no longer locked.
    pub fn unlock(&mut self) -> bool {
        if self.accessories.safety_door_ajar() {
            return false;
        }
        if self.state.run_state() == RunState::ALARM {
            info!("machine: alarm unlocked");
            self.state.set_run_state(RunState::IDLE);
        }
        true
    }

    /// Enter check mode from Idle, or leave it through a reset.
    ///
    /// Returns `false` if the machine is busy.
    pub fn toggle_check_mode(&mut self) -> bool {
        match self.state.run_state() {
            RunState::CHECK_MODE => {
                self.request_reset();
                true
            }
            RunState::IDLE => {
                self.state.set_run_state(RunState::CHECK_MODE);
                true
            }
            _ => false,
        }
    }
}
