//! FETIM handlers.
//!
//! The thermal interlock module is independent safety hardware; the
//! firmware mostly mirrors its sensors and latches. Once the interlock
//! has latched a shutdown, enable-style controls answer HardwBlocked
//! until the FETIM itself is reset.

use femc_bus::PortIo;
use femc_core::frame::CanFrame;
use femc_core::oper::Analog;
use femc_core::ring::{codes, ErrModule};
use femc_core::status::Status;
use femc_core::timer::Clock;

use super::{
    echo_last, finish_analog, reject_control, reject_monitor, reply_byte, submodule_range, Request,
};
use crate::addr;
use crate::mainloop::Femc;
use crate::serial::fetim as sfetim;
use crate::state::Frontend;

impl<P: PortIo, C: Clock> Femc<P, C> {
    pub(crate) fn fetim_handler(&mut self, req: &Request, out: &mut CanFrame) {
        if !self.fe.fetim.available {
            self.errors.store(ErrModule::Fetim, codes::dev::NOT_INSTALLED);
            out.status = Status::HardwRange;
            return;
        }
        match (req.sub & addr::FETIM_SUB_MASK) >> addr::FETIM_SUB_SHIFT {
            addr::FETIM_INTERLOCK => self.interlock_point(req, out),
            addr::FETIM_COMPRESSOR => self.compressor_point(req, out),
            addr::FETIM_DEWAR => self.dewar_point(req, out),
            _ => submodule_range(out, &mut self.errors, ErrModule::Fetim),
        }
    }

    /// Monitor-only analog point on the FETIM board.
    fn fetim_analog_monitor(
        &mut self,
        req: &Request,
        out: &mut CanFrame,
        point: u16,
        scale: f32,
        module: ErrModule,
        target: fn(&mut Frontend) -> &mut Analog,
    ) {
        if !req.is_monitor() {
            reject_control(&mut self.errors, module);
            return;
        }
        if req.on_control_rca() {
            reject_monitor(out, &mut self.errors, module);
            return;
        }
        let read = self.fetim_analog_unipolar(point, scale);
        finish_analog(out, &mut self.errors, module, target(&mut self.fe), read);
    }

    /// Monitor-only digital flag refreshed from the status word.
    fn fetim_flag_monitor(
        &mut self,
        req: &Request,
        out: &mut CanFrame,
        module: ErrModule,
        flag: fn(&Frontend) -> bool,
    ) {
        if !req.is_monitor() {
            reject_control(&mut self.errors, module);
            return;
        }
        if req.on_control_rca() {
            reject_monitor(out, &mut self.errors, module);
            return;
        }
        if self.fetim_read_status().is_err() {
            out.status = Status::Error;
        }
        reply_byte(out, flag(&self.fe) as u8);
    }

    fn interlock_point(&mut self, req: &Request, out: &mut CanFrame) {
        match (req.sub & addr::INTRLK_SUB_MASK) >> addr::INTRLK_SUB_SHIFT {
            addr::INTRLK_SENSORS => self.interlock_sensors_point(req, out),
            _ => self.interlock_state_point(req, out),
        }
    }

    fn interlock_sensors_point(&mut self, req: &Request, out: &mut CanFrame) {
        match (req.sub & addr::INTRLK_SENS_MASK) >> addr::INTRLK_SENS_SHIFT {
            addr::INTRLK_SENS_TEMP => {
                let sensor = (req.sub & 0x7) as usize;
                if sensor >= addr::INTRLK_TEMP_SENSORS as usize {
                    submodule_range(out, &mut self.errors, ErrModule::InterlockTemp);
                    return;
                }
                if !req.is_monitor() {
                    reject_control(&mut self.errors, ErrModule::InterlockTemp);
                    return;
                }
                if req.on_control_rca() {
                    reject_monitor(out, &mut self.errors, ErrModule::InterlockTemp);
                    return;
                }
                let read = self.fetim_analog_unipolar(
                    sfetim::areg_interlock_temp(sensor as u8),
                    sfetim::INTERLOCK_TEMP_SCALE,
                );
                finish_analog(
                    out,
                    &mut self.errors,
                    ErrModule::InterlockTemp,
                    &mut self.fe.fetim.interlock.sensors.temp[sensor],
                    read,
                );
            }
            addr::INTRLK_SENS_FLOW => {
                let sensor = (req.sub & 0x3) as usize;
                if sensor >= addr::INTRLK_FLOW_SENSORS as usize {
                    submodule_range(out, &mut self.errors, ErrModule::InterlockFlow);
                    return;
                }
                if !req.is_monitor() {
                    reject_control(&mut self.errors, ErrModule::InterlockFlow);
                    return;
                }
                if req.on_control_rca() {
                    reject_monitor(out, &mut self.errors, ErrModule::InterlockFlow);
                    return;
                }
                let read = self.fetim_analog_unipolar(
                    sfetim::areg_interlock_flow(sensor as u8),
                    sfetim::AIRFLOW_SCALE,
                );
                finish_analog(
                    out,
                    &mut self.errors,
                    ErrModule::InterlockFlow,
                    &mut self.fe.fetim.interlock.sensors.flow[sensor],
                    read,
                );
            }
            addr::INTRLK_SENS_SINGLE_FAIL => self.fetim_flag_monitor(
                req,
                out,
                ErrModule::InterlockSensors,
                |fe| fe.fetim.interlock.sensors.single_fail,
            ),
            _ => submodule_range(out, &mut self.errors, ErrModule::InterlockSensors),
        }
    }

    fn interlock_state_point(&mut self, req: &Request, out: &mut CanFrame) {
        match (req.sub & addr::INTRLK_STATE_MASK) >> addr::INTRLK_STATE_SHIFT {
            addr::INTRLK_GLITCH => {
                match (req.sub & addr::GLITCH_SUB_MASK) >> addr::GLITCH_SUB_SHIFT {
                    addr::GLITCH_VALUE => self.fetim_analog_monitor(
                        req,
                        out,
                        sfetim::AREG_GLITCH_VALUE,
                        sfetim::GLITCH_SCALE,
                        ErrModule::InterlockGlitch,
                        |fe| &mut fe.fetim.interlock.state.glitch.value,
                    ),
                    _ => self.glitch_countdown_point(req, out),
                }
            }
            addr::INTRLK_MULTI_FAIL => self.fetim_flag_monitor(
                req,
                out,
                ErrModule::InterlockState,
                |fe| fe.fetim.interlock.state.multi_fail,
            ),
            addr::INTRLK_TEMP_OUT_RNG => self.fetim_flag_monitor(
                req,
                out,
                ErrModule::InterlockState,
                |fe| fe.fetim.interlock.state.temp_out_of_range,
            ),
            addr::INTRLK_FLOW_OUT_RNG => self.fetim_flag_monitor(
                req,
                out,
                ErrModule::InterlockState,
                |fe| fe.fetim.interlock.state.flow_out_of_range,
            ),
            addr::INTRLK_DELAY_TRIG => self.fetim_flag_monitor(
                req,
                out,
                ErrModule::InterlockState,
                |fe| fe.fetim.interlock.state.delay_triggered,
            ),
            addr::INTRLK_SHUTDOWN_TRIG => self.fetim_flag_monitor(
                req,
                out,
                ErrModule::InterlockState,
                |fe| fe.fetim.interlock.state.shutdown_triggered,
            ),
            _ => submodule_range(out, &mut self.errors, ErrModule::InterlockState),
        }
    }

    fn glitch_countdown_point(&mut self, req: &Request, out: &mut CanFrame) {
        if !req.is_monitor() {
            let enable = req.byte() != 0;
            self.fe.fetim.interlock.state.glitch.last_countdown.save(&req.frame);
            let status = match self.fetim_breg(
                if enable { sfetim::BREG_GLITCH_COUNTDOWN } else { 0 },
                sfetim::BREG_GLITCH_COUNTDOWN,
            ) {
                Ok(()) => {
                    self.fe.fetim.interlock.state.glitch.countdown_enabled = enable;
                    Status::Ok
                }
                Err(_) => Status::Error,
            };
            self.fe.fetim.interlock.state.glitch.last_countdown.status = status;
            return;
        }
        if req.on_control_rca() {
            echo_last(out, &self.fe.fetim.interlock.state.glitch.last_countdown);
            return;
        }
        if self.fetim_read_status().is_err() {
            out.status = Status::Error;
        }
        reply_byte(
            out,
            self.fe.fetim.interlock.state.glitch.countdown_enabled as u8,
        );
    }

    fn compressor_point(&mut self, req: &Request, out: &mut CanFrame) {
        let point = (req.sub & addr::COMP_POINT_MASK) >> addr::COMP_POINT_SHIFT;
        match (req.sub & addr::COMP_SUB_MASK) >> addr::COMP_SUB_SHIFT {
            sensor @ (addr::COMP_TEMP0 | addr::COMP_TEMP1) => {
                let sensor = sensor as usize;
                if point == addr::COMP_POINT_VALUE {
                    if !req.is_monitor() {
                        reject_control(&mut self.errors, ErrModule::FetimExtTemp);
                        return;
                    }
                    if req.on_control_rca() {
                        reject_monitor(out, &mut self.errors, ErrModule::FetimExtTemp);
                        return;
                    }
                    let read = self.fetim_analog_unipolar(
                        sfetim::areg_comp_temp(sensor as u8),
                        sfetim::COMP_TEMP_SCALE,
                    );
                    finish_analog(
                        out,
                        &mut self.errors,
                        ErrModule::FetimExtTemp,
                        &mut self.fe.fetim.compressor.temp[sensor].temp,
                        read,
                    );
                } else {
                    if !req.is_monitor() {
                        reject_control(&mut self.errors, ErrModule::FetimExtTemp);
                        return;
                    }
                    if req.on_control_rca() {
                        reject_monitor(out, &mut self.errors, ErrModule::FetimExtTemp);
                        return;
                    }
                    if self.fetim_read_status().is_err() {
                        out.status = Status::Error;
                    }
                    reply_byte(out, self.fe.fetim.compressor.temp[sensor].out_of_range as u8);
                }
            }
            addr::COMP_HE2_PRESS => {
                if point == addr::COMP_POINT_VALUE {
                    self.fetim_analog_monitor(
                        req,
                        out,
                        sfetim::AREG_HE2_PRESSURE,
                        sfetim::HE2_PRESSURE_SCALE,
                        ErrModule::He2Press,
                        |fe| &mut fe.fetim.compressor.he2.pressure,
                    );
                } else {
                    self.fetim_flag_monitor(req, out, ErrModule::He2Press, |fe| {
                        fe.fetim.compressor.he2.out_of_range
                    });
                }
            }
            addr::COMP_INTERLOCK_OVERRIDE => {
                if !req.is_monitor() {
                    let enable = req.byte() != 0;
                    self.fe.fetim.compressor.last_interlock_override.save(&req.frame);
                    let status = match self.fetim_breg(
                        if enable { sfetim::BREG_INTERLOCK_OVERRIDE } else { 0 },
                        sfetim::BREG_INTERLOCK_OVERRIDE,
                    ) {
                        Ok(()) => {
                            self.fe.fetim.compressor.interlock_override = enable;
                            Status::Ok
                        }
                        Err(_) => Status::Error,
                    };
                    self.fe.fetim.compressor.last_interlock_override.status = status;
                    return;
                }
                if req.on_control_rca() {
                    echo_last(out, &self.fe.fetim.compressor.last_interlock_override);
                    return;
                }
                reply_byte(out, self.fe.fetim.compressor.interlock_override as u8);
            }
            addr::COMP_FE_STATUS => {
                // The cool-down-readiness bit published for the FETIM to
                // read; a latched shutdown refuses further publishes.
                if !req.is_monitor() {
                    let ready = req.byte() != 0;
                    self.fe.fetim.compressor.last_fe_status.save(&req.frame);
                    if self.fe.fetim.interlock.state.shutdown_triggered {
                        self.errors
                            .store(ErrModule::FetimCompressor, codes::fetim::SHUTDOWN_LATCHED);
                        self.fe.fetim.compressor.last_fe_status.status = Status::HardwBlocked;
                        return;
                    }
                    let status = match self.fetim_breg(
                        if ready { sfetim::BREG_FE_STATUS } else { 0 },
                        sfetim::BREG_FE_STATUS,
                    ) {
                        Ok(()) => {
                            self.fe.fetim.compressor.fe_status = ready;
                            Status::Ok
                        }
                        Err(_) => Status::Error,
                    };
                    self.fe.fetim.compressor.last_fe_status.status = status;
                    return;
                }
                if req.on_control_rca() {
                    echo_last(out, &self.fe.fetim.compressor.last_fe_status);
                    return;
                }
                reply_byte(out, self.fe.fetim.compressor.fe_status as u8);
            }
            addr::COMP_CABINET_TEMP => self.fetim_analog_monitor(
                req,
                out,
                sfetim::AREG_CABINET_TEMP,
                sfetim::CABINET_TEMP_SCALE,
                ErrModule::FetimCompressor,
                |fe| &mut fe.fetim.compressor.cabinet_temp,
            ),
            _ => submodule_range(out, &mut self.errors, ErrModule::FetimCompressor),
        }
    }

    fn dewar_point(&mut self, req: &Request, out: &mut CanFrame) {
        if !req.is_monitor() {
            let fill = req.byte() != 0;
            self.fe.fetim.dewar.last_n2_fill.save(&req.frame);
            // Filling is refused once the interlock has shut the front
            // end down.
            if fill && self.fe.fetim.interlock.state.shutdown_triggered {
                self.errors
                    .store(ErrModule::Fetim, codes::fetim::SHUTDOWN_LATCHED);
                self.fe.fetim.dewar.last_n2_fill.status = Status::HardwBlocked;
                return;
            }
            let status = match self.fetim_breg(
                if fill { sfetim::BREG_N2_FILL } else { 0 },
                sfetim::BREG_N2_FILL,
            ) {
                Ok(()) => {
                    self.fe.fetim.dewar.n2_fill = fill;
                    Status::Ok
                }
                Err(_) => Status::Error,
            };
            self.fe.fetim.dewar.last_n2_fill.status = status;
            return;
        }
        if req.on_control_rca() {
            echo_last(out, &self.fe.fetim.dewar.last_n2_fill);
            return;
        }
        reply_byte(out, self.fe.fetim.dewar.n2_fill as u8);
    }
}

#[cfg(test)]
mod tests {
    use femc_core::ring::{codes, pack, ErrModule};
    use femc_core::status::Status;

    use crate::addr;
    use crate::serial::fetim as sfetim;
    use crate::testing::{booted_femc, booted_femc_with, control, monitor};

    #[test]
    fn test_absent_fetim_answers_range() {
        let mut femc = booted_femc_with(|cfg| cfg.fetim_available = false);
        let reply = monitor(&mut femc, addr::fetim_dewar_n2_fill());
        assert_eq!(reply.data[0], Status::HardwRange as u8);
    }

    #[test]
    fn test_interlock_flags_follow_status_word() {
        let mut femc = booted_femc();
        femc.bus.io.push_read([
            sfetim::STATUS_ADC_READY | sfetim::STATUS_MULTI_FAIL | sfetim::STATUS_DELAY_TRIG,
            0,
            0,
        ]);
        let reply = monitor(
            &mut femc,
            addr::fetim_interlock_state(addr::INTRLK_MULTI_FAIL),
        );
        assert_eq!(reply.payload()[0], 1);
        assert!(femc.fe.fetim.interlock.state.delay_triggered);
        assert!(!femc.fe.fetim.interlock.state.shutdown_triggered);
    }

    #[test]
    fn test_n2_fill_blocked_after_shutdown_latch() {
        let mut femc = booted_femc();
        femc.fe.fetim.interlock.state.shutdown_triggered = true;
        control(
            &mut femc,
            addr::fetim_dewar_n2_fill() + addr::CONTROL_OFFSET,
            &[1],
        );
        assert!(!femc.fe.fetim.dewar.n2_fill);
        assert_eq!(
            femc.fe.fetim.dewar.last_n2_fill.status,
            Status::HardwBlocked
        );
        assert_eq!(
            femc.errors.take_next(),
            Some(pack(ErrModule::Fetim, codes::fetim::SHUTDOWN_LATCHED))
        );

        // Stopping a fill is always allowed.
        control(
            &mut femc,
            addr::fetim_dewar_n2_fill() + addr::CONTROL_OFFSET,
            &[0],
        );
        assert_eq!(femc.fe.fetim.dewar.last_n2_fill.status, Status::Ok);
    }

    #[test]
    fn test_fe_status_publish() {
        let mut femc = booted_femc();
        let rca = addr::fetim_compressor(addr::COMP_FE_STATUS, addr::COMP_POINT_VALUE);
        control(&mut femc, rca + addr::CONTROL_OFFSET, &[1]);
        assert!(femc.fe.fetim.compressor.fe_status);
        assert_eq!(monitor(&mut femc, rca).payload()[0], 1);
        // The published bit lands in the control register.
        assert_ne!(femc.fe.fetim.breg & sfetim::BREG_FE_STATUS, 0);

        femc.fe.fetim.interlock.state.shutdown_triggered = true;
        control(&mut femc, rca + addr::CONTROL_OFFSET, &[1]);
        assert_eq!(
            femc.fe.fetim.compressor.last_fe_status.status,
            Status::HardwBlocked
        );
    }

    #[test]
    fn test_he2_pressure_monitor() {
        let mut femc = booted_femc();
        let reply = monitor(
            &mut femc,
            addr::fetim_compressor(addr::COMP_HE2_PRESS, addr::COMP_POINT_VALUE),
        );
        assert_eq!(reply.size, 5);
        assert_eq!(reply.status, Status::Ok);
    }

    #[test]
    fn test_glitch_countdown_control() {
        let mut femc = booted_femc();
        let rca = addr::fetim_glitch(addr::GLITCH_COUNTDOWN);
        control(&mut femc, rca + addr::CONTROL_OFFSET, &[1]);
        assert!(femc.fe.fetim.interlock.state.glitch.countdown_enabled);
        assert_ne!(femc.fe.fetim.breg & sfetim::BREG_GLITCH_COUNTDOWN, 0);
    }
}
