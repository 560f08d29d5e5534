//! Cryostat device handlers.
//!
//! The vacuum train carries the interlocks: the backing pump biases the
//! electronics for the valves, the turbo pump and the 230 V current
//! monitor, so everything downstream answers HardwBlocked while it is
//! off. Disabling the backing pump first walks the shutdown cascade
//! (gate valve, solenoid valve, turbo pump); a failing step aborts the
//! cascade and leaves the partial state for the operator to recover.

use femc_bus::PortIo;
use femc_core::frame::CanFrame;
use femc_core::ring::{codes, ErrModule};
use femc_core::status::Status;
use femc_core::timer::Clock;

use super::{
    echo_last, finish_stored, reject_control, reject_monitor, reply_byte, reply_u32,
    submodule_range, Request,
};
use crate::addr;
use crate::mainloop::Femc;
use crate::state::cryostat::ValvePosition;

impl<P: PortIo, C: Clock> Femc<P, C> {
    pub(crate) fn cryostat_handler(&mut self, req: &Request, out: &mut CanFrame) {
        let sub = (req.sub & addr::CRYO_SUB_MASK) >> addr::CRYO_SUB_SHIFT;
        match sub {
            0..=12 => self.cryo_temp_point(sub as usize, req, out),
            s if s == addr::CRYO_BACKING_PUMP => self.backing_pump_enable(req, out),
            s if s == addr::CRYO_TURBO_PUMP => self.turbo_pump_point(req, out),
            s if s == addr::CRYO_GATE_VALVE => self.gate_valve_state(req, out),
            s if s == addr::CRYO_SOLENOID_VALVE => self.solenoid_valve_state(req, out),
            s if s == addr::CRYO_VACUUM_CONTROLLER => self.vacuum_point(req, out),
            s if s == addr::CRYO_SUPPLY_CURRENT => self.supply_current(req, out),
            s if s == addr::CRYO_COLD_HEAD => self.cold_head_point(req, out),
            _ => submodule_range(out, &mut self.errors, ErrModule::Cryostat),
        }
    }

    fn cryo_temp_point(&mut self, sensor: usize, req: &Request, out: &mut CanFrame) {
        if !req.is_monitor() {
            reject_control(&mut self.errors, ErrModule::CryostatTemp);
            return;
        }
        if req.on_control_rca() {
            reject_monitor(out, &mut self.errors, ErrModule::CryostatTemp);
            return;
        }
        let read = self.cryo_read_temp(sensor);
        finish_stored(
            out,
            &mut self.errors,
            ErrModule::CryostatTemp,
            &self.fe.cryostat.temp[sensor].temp,
            read,
        );
    }

    fn backing_pump_enable(&mut self, req: &Request, out: &mut CanFrame) {
        if !req.is_monitor() {
            let enable = req.byte() != 0;
            self.fe.cryostat.backing_pump.last_enable.save(&req.frame);

            // Cutting the backing pump powers down everything it biases:
            // run the shutdown cascade first. A failing step aborts and
            // the operator recovers the partial state by hand.
            if !enable {
                if self.cryo_set_gate_valve(false).is_err()
                    || self.cryo_set_solenoid_valve(false).is_err()
                    || self.cryo_set_turbo_pump(false).is_err()
                {
                    self.fe.cryostat.backing_pump.last_enable.status = Status::Error;
                    return;
                }
            }

            if self.cryo_set_backing_pump(enable).is_err() {
                self.fe.cryostat.backing_pump.last_enable.status = Status::Error;
            }
            return;
        }

        if req.on_control_rca() {
            echo_last(out, &self.fe.cryostat.backing_pump.last_enable);
            return;
        }

        // No hardware read-back: the mirror tracks the last command.
        reply_byte(out, self.fe.cryostat.backing_pump.enabled as u8);
    }

    fn turbo_pump_point(&mut self, req: &Request, out: &mut CanFrame) {
        match req.sub & addr::TURBO_SUB_MASK {
            s if s == addr::TURBO_ENABLE => self.turbo_pump_enable(req, out),
            s if s == addr::TURBO_STATE => self.turbo_pump_state(req, out),
            s if s == addr::TURBO_SPEED => self.turbo_pump_speed(req, out),
            _ => submodule_range(out, &mut self.errors, ErrModule::TurboPump),
        }
    }

    fn turbo_pump_enable(&mut self, req: &Request, out: &mut CanFrame) {
        if !req.is_monitor() {
            let enable = req.byte() != 0;
            self.fe.cryostat.turbo_pump.last_enable.save(&req.frame);

            if !self.fe.cryostat.backing_pump.enabled {
                self.fe.cryostat.turbo_pump.last_enable.status = Status::HardwBlocked;
                // Only an enable attempt against a dead supply is a fault
                // worth recording; disabling is a no-op.
                if enable {
                    self.errors
                        .store(ErrModule::TurboPump, codes::turbo_pump::BACKING_PUMP_OFF);
                }
                return;
            }

            // The pump bearing must be inside its temperature band before
            // a start. Only enforced when the FETIM is fitted to report it.
            if enable && self.fe.fetim.available && !self.fe.fetim.turbo_temp_in_range() {
                self.errors
                    .store(ErrModule::TurboPump, codes::turbo_pump::TEMP_OUT_OF_RANGE);
                self.fe.cryostat.turbo_pump.last_enable.status = Status::HardwBlocked;
                self.fe.cryostat.turbo_pump.enabled = false;
                return;
            }

            if self.cryo_set_turbo_pump(enable).is_err() {
                self.fe.cryostat.turbo_pump.last_enable.status = Status::Error;
            }
            return;
        }

        if req.on_control_rca() {
            echo_last(out, &self.fe.cryostat.turbo_pump.last_enable);
            return;
        }

        if !self.fe.cryostat.backing_pump.enabled {
            out.status = Status::HardwBlocked;
        }
        reply_byte(out, self.fe.cryostat.turbo_pump.enabled as u8);
    }

    fn turbo_pump_state(&mut self, req: &Request, out: &mut CanFrame) {
        if !req.is_monitor() {
            reject_control(&mut self.errors, ErrModule::TurboPump);
            return;
        }
        if req.on_control_rca() {
            reject_monitor(out, &mut self.errors, ErrModule::TurboPump);
            return;
        }
        if self.cryo_read_status().is_err() {
            out.status = Status::Error;
        }
        reply_byte(out, self.fe.cryostat.turbo_pump.error as u8);
    }

    fn turbo_pump_speed(&mut self, req: &Request, out: &mut CanFrame) {
        if !req.is_monitor() {
            reject_control(&mut self.errors, ErrModule::TurboPump);
            return;
        }
        if req.on_control_rca() {
            reject_monitor(out, &mut self.errors, ErrModule::TurboPump);
            return;
        }
        if self.cryo_read_status().is_err() {
            out.status = Status::Error;
        }
        reply_byte(out, self.fe.cryostat.turbo_pump.speed_ok as u8);
    }

    fn gate_valve_state(&mut self, req: &Request, out: &mut CanFrame) {
        if !req.is_monitor() {
            self.fe.cryostat.gate_valve.last_state.save(&req.frame);

            if !self.fe.cryostat.backing_pump.enabled {
                self.errors
                    .store(ErrModule::GateValve, codes::gate_valve::BACKING_PUMP_OFF);
                self.fe.cryostat.gate_valve.last_state.status = Status::HardwBlocked;
                return;
            }
            if self.cryo_read_status().is_err() {
                self.fe.cryostat.gate_valve.last_state.status = Status::Error;
                return;
            }
            if self.fe.cryostat.gate_valve.position == ValvePosition::Unknown {
                // Still driving; wait until it lands somewhere.
                self.errors
                    .store(ErrModule::GateValve, codes::gate_valve::VALVE_MOVING);
                self.fe.cryostat.gate_valve.last_state.status = Status::HardwBlocked;
                return;
            }
            if self.cryo_set_gate_valve(req.byte() != 0).is_err() {
                self.fe.cryostat.gate_valve.last_state.status = Status::Error;
            }
            return;
        }

        if req.on_control_rca() {
            echo_last(out, &self.fe.cryostat.gate_valve.last_state);
            return;
        }

        if self.cryo_read_status().is_err() {
            out.status = Status::Error;
        }
        reply_byte(out, self.fe.cryostat.gate_valve.position as u8);
    }

    fn solenoid_valve_state(&mut self, req: &Request, out: &mut CanFrame) {
        if !req.is_monitor() {
            self.fe.cryostat.solenoid_valve.last_state.save(&req.frame);

            if !self.fe.cryostat.backing_pump.enabled {
                self.errors.store(
                    ErrModule::SolenoidValve,
                    codes::solenoid_valve::BACKING_PUMP_OFF,
                );
                self.fe.cryostat.solenoid_valve.last_state.status = Status::HardwBlocked;
                return;
            }
            if self.cryo_read_status().is_err() {
                self.fe.cryostat.solenoid_valve.last_state.status = Status::Error;
                return;
            }
            if self.fe.cryostat.solenoid_valve.position == ValvePosition::Unknown {
                self.errors.store(
                    ErrModule::SolenoidValve,
                    codes::solenoid_valve::VALVE_MOVING,
                );
                self.fe.cryostat.solenoid_valve.last_state.status = Status::HardwBlocked;
                return;
            }
            if self.cryo_set_solenoid_valve(req.byte() != 0).is_err() {
                self.fe.cryostat.solenoid_valve.last_state.status = Status::Error;
            }
            return;
        }

        if req.on_control_rca() {
            echo_last(out, &self.fe.cryostat.solenoid_valve.last_state);
            return;
        }

        if self.cryo_read_status().is_err() {
            out.status = Status::Error;
        }
        reply_byte(out, self.fe.cryostat.solenoid_valve.position as u8);
    }

    fn vacuum_point(&mut self, req: &Request, out: &mut CanFrame) {
        match req.sub & addr::VAC_SUB_MASK {
            s if s == addr::VAC_SENSOR0 || s == addr::VAC_SENSOR1 => {
                if !req.is_monitor() {
                    reject_control(&mut self.errors, ErrModule::VacuumSensor);
                    return;
                }
                if req.on_control_rca() {
                    reject_monitor(out, &mut self.errors, ErrModule::VacuumSensor);
                    return;
                }
                let sensor = s as usize;
                let read = self.cryo_read_pressure(sensor);
                finish_stored(
                    out,
                    &mut self.errors,
                    ErrModule::VacuumSensor,
                    &self.fe.cryostat.vacuum.sensor[sensor].pressure,
                    read,
                );
            }
            s if s == addr::VAC_STATE => {
                if !req.is_monitor() {
                    reject_control(&mut self.errors, ErrModule::VacuumController);
                    return;
                }
                if req.on_control_rca() {
                    reject_monitor(out, &mut self.errors, ErrModule::VacuumController);
                    return;
                }
                if self.cryo_read_status().is_err() {
                    out.status = Status::Error;
                }
                reply_byte(out, self.fe.cryostat.vacuum.error as u8);
            }
            s if s == addr::VAC_ENABLE => {
                if !req.is_monitor() {
                    let enable = req.byte() != 0;
                    self.fe.cryostat.vacuum.last_enable.save(&req.frame);
                    if self.cryo_set_vacuum_controller(enable).is_err() {
                        self.fe.cryostat.vacuum.last_enable.status = Status::Error;
                    }
                    return;
                }
                if req.on_control_rca() {
                    echo_last(out, &self.fe.cryostat.vacuum.last_enable);
                    return;
                }
                reply_byte(out, self.fe.cryostat.vacuum.enabled as u8);
            }
            _ => submodule_range(out, &mut self.errors, ErrModule::VacuumController),
        }
    }

    fn supply_current(&mut self, req: &Request, out: &mut CanFrame) {
        // The 230 V current sensing rides on the backing pump electronics.
        if !self.fe.cryostat.backing_pump.enabled {
            self.errors
                .store(ErrModule::Cryostat, codes::cryostat::BACKING_PUMP_OFF);
            out.status = Status::HardwBlocked;
            return;
        }
        if !req.is_monitor() {
            reject_control(&mut self.errors, ErrModule::Cryostat);
            return;
        }
        if req.on_control_rca() {
            reject_monitor(out, &mut self.errors, ErrModule::Cryostat);
            return;
        }
        let read = self.cryo_read_supply_current();
        finish_stored(
            out,
            &mut self.errors,
            ErrModule::Cryostat,
            &self.fe.cryostat.supply_current,
            read,
        );
    }

    fn cold_head_point(&mut self, req: &Request, out: &mut CanFrame) {
        match req.sub & addr::COLD_HEAD_SUB_MASK {
            s if s == addr::COLD_HEAD_HOURS => {
                if !req.is_monitor() {
                    reject_control(&mut self.errors, ErrModule::Cryostat);
                    return;
                }
                if req.on_control_rca() {
                    reject_monitor(out, &mut self.errors, ErrModule::Cryostat);
                    return;
                }
                reply_u32(out, self.fe.cryostat.cold_head_hours);
            }
            _ => {
                // Hours reset, control only.
                if !req.is_monitor() {
                    self.fe.cryostat.last_hours_reset.save(&req.frame);
                    self.fe.cryostat.cold_head_hours = 0;
                    self.fe.cryostat.hours_dirty = true;
                    return;
                }
                if req.on_control_rca() {
                    echo_last(out, &self.fe.cryostat.last_hours_reset);
                    return;
                }
                reject_monitor(out, &mut self.errors, ErrModule::Cryostat);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use femc_core::ring::{codes, pack, ErrModule};
    use femc_core::status::Status;

    use crate::addr;
    use crate::serial::cryo;
    use crate::state::cryostat::ValvePosition;
    use crate::testing::{booted_femc, control, monitor};

    fn enable_backing_pump(femc: &mut crate::testing::BootedFemc) {
        control(
            femc,
            addr::cryostat_backing_pump() + addr::CONTROL_OFFSET,
            &[1],
        );
        assert!(femc.fe.cryostat.backing_pump.enabled);
    }

    #[test]
    fn test_gate_valve_blocked_without_backing_pump() {
        let mut femc = booted_femc();
        let writes_before = femc.bus.io.writes.len();

        control(
            &mut femc,
            addr::cryostat_gate_valve() + addr::CONTROL_OFFSET,
            &[1],
        );

        // No hardware write happened and the block is recorded.
        assert_eq!(femc.bus.io.writes.len(), writes_before);
        assert_eq!(
            femc.fe.cryostat.gate_valve.last_state.status,
            Status::HardwBlocked
        );
        assert_eq!(
            femc.errors.take_next(),
            Some(pack(ErrModule::GateValve, codes::gate_valve::BACKING_PUMP_OFF))
        );

        // A monitor on the control RCA echoes the refused command.
        let reply = monitor(&mut femc, addr::cryostat_gate_valve() + addr::CONTROL_OFFSET);
        assert_eq!(reply.payload()[0], 1);
        assert_eq!(reply.status, Status::HardwBlocked);
    }

    #[test]
    fn test_gate_valve_rejected_mid_transit() {
        let mut femc = booted_femc();
        enable_backing_pump(&mut femc);
        // Status register with valve sensors reading mid-transit, ADC ready.
        femc.bus
            .io
            .push_read([cryo::STATUS_ADC_READY, 0, 0]);

        control(
            &mut femc,
            addr::cryostat_gate_valve() + addr::CONTROL_OFFSET,
            &[0],
        );
        assert_eq!(femc.fe.cryostat.gate_valve.position, ValvePosition::Unknown);
        assert_eq!(
            femc.fe.cryostat.gate_valve.last_state.status,
            Status::HardwBlocked
        );
    }

    #[test]
    fn test_backing_pump_disable_cascade() {
        let mut femc = booted_femc();
        enable_backing_pump(&mut femc);
        control(
            &mut femc,
            addr::cryostat_turbo(addr::TURBO_ENABLE) + addr::CONTROL_OFFSET,
            &[1],
        );
        // FETIM is fitted but unread: the start is refused.
        assert_eq!(
            femc.fe.cryostat.turbo_pump.last_enable.status,
            Status::HardwBlocked
        );
        femc.fe.fetim.compressor.temp[0].temp.update(25.0);
        control(
            &mut femc,
            addr::cryostat_turbo(addr::TURBO_ENABLE) + addr::CONTROL_OFFSET,
            &[1],
        );
        assert!(femc.fe.cryostat.turbo_pump.enabled);

        // Disabling the backing pump closes both valves and stops the
        // turbo pump before the supply goes away.
        control(
            &mut femc,
            addr::cryostat_backing_pump() + addr::CONTROL_OFFSET,
            &[0],
        );
        assert!(!femc.fe.cryostat.backing_pump.enabled);
        assert!(!femc.fe.cryostat.turbo_pump.enabled);
        let breg = femc.fe.cryostat.regs.breg;
        assert_eq!(breg & cryo::BREG_GATE_VALVE, 0);
        assert_eq!(breg & cryo::BREG_SOLENOID_VALVE, 0);
        assert_eq!(breg & cryo::BREG_TURBO_PUMP, 0);
        assert_eq!(breg & cryo::BREG_BACKING_PUMP, 0);
    }

    #[test]
    fn test_turbo_pump_temperature_guard() {
        let mut femc = booted_femc();
        enable_backing_pump(&mut femc);
        femc.fe.fetim.compressor.temp[0].temp.update(50.0);
        let writes_before = femc.bus.io.writes.len();

        control(
            &mut femc,
            addr::cryostat_turbo(addr::TURBO_ENABLE) + addr::CONTROL_OFFSET,
            &[1],
        );

        assert_eq!(femc.bus.io.writes.len(), writes_before);
        assert_eq!(
            femc.fe.cryostat.turbo_pump.last_enable.status,
            Status::HardwBlocked
        );
        assert!(!femc.fe.cryostat.turbo_pump.enabled);
        assert_eq!(
            femc.errors.take_next(),
            Some(pack(ErrModule::TurboPump, codes::turbo_pump::TEMP_OUT_OF_RANGE))
        );
    }

    #[test]
    fn test_turbo_guard_skipped_without_fetim() {
        let mut femc = crate::testing::booted_femc_with(|cfg| cfg.fetim_available = false);
        enable_backing_pump(&mut femc);
        control(
            &mut femc,
            addr::cryostat_turbo(addr::TURBO_ENABLE) + addr::CONTROL_OFFSET,
            &[1],
        );
        assert!(femc.fe.cryostat.turbo_pump.enabled);
    }

    #[test]
    fn test_adc_settling_retries() {
        let mut femc = booted_femc();
        // Prime the settling counter on sensor 0.
        monitor(&mut femc, addr::cryostat_temp(0));

        // Switching to sensor 3 reloads the counter: ten retries, then a
        // good reading with the counter drained.
        for _ in 0..cryo::ANALOG_READOUTS {
            let reply = monitor(&mut femc, addr::cryostat_temp(3));
            assert_eq!(reply.status, Status::HardwRetry);
        }
        let reply = monitor(&mut femc, addr::cryostat_temp(3));
        assert_eq!(reply.status, Status::Ok);
        assert_eq!(femc.fe.cryostat.regs.readouts_left, 0);
        assert!(femc.fe.cryostat.temp[3].temp.value.is_some());
    }

    #[test]
    fn test_supply_current_needs_backing_pump() {
        let mut femc = booted_femc();
        let reply = monitor(&mut femc, addr::cryostat_supply_current());
        assert_eq!(reply.size, 1);
        assert_eq!(reply.data[0], Status::HardwBlocked as u8);
        assert_eq!(
            femc.errors.take_next(),
            Some(pack(ErrModule::Cryostat, codes::cryostat::BACKING_PUMP_OFF))
        );
    }

    #[test]
    fn test_submodule_off_by_one() {
        let mut femc = booted_femc();
        // First submodule past the declared range.
        let rca = 12 << femc_core::frame::MODULE_SHIFT
            | (addr::CRYO_SUB_COUNT << addr::CRYO_SUB_SHIFT);
        let reply = monitor(&mut femc, rca);
        assert_eq!(reply.size, 1);
        assert_eq!(reply.data[0], Status::HardwRange as u8);
    }

    #[test]
    fn test_cold_head_hours_reset() {
        let mut femc = booted_femc();
        femc.fe.cryostat.cold_head_hours = 41;
        let reply = monitor(&mut femc, addr::cryostat_cold_head(addr::COLD_HEAD_HOURS));
        assert_eq!(&reply.payload()[..4], &41u32.to_be_bytes());

        control(
            &mut femc,
            addr::cryostat_cold_head(addr::COLD_HEAD_RESET) + addr::CONTROL_OFFSET,
            &[1],
        );
        assert_eq!(femc.fe.cryostat.cold_head_hours, 0);
        assert!(femc.fe.cryostat.hours_dirty);
    }
}
