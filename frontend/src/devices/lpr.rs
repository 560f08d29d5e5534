//! LO photonic receiver handlers.

use femc_bus::PortIo;
use femc_core::frame::CanFrame;
use femc_core::ring::{codes, ErrModule};
use femc_core::status::Status;
use femc_core::timer::Clock;
use femc_core::wire;

use super::{
    echo_last, finish_analog, reject_control, reject_monitor, reply_byte, submodule_range, Request,
};
use crate::addr;
use crate::mainloop::Femc;
use crate::serial::lpr;
use crate::state::lpr::MAX_PORT;

impl<P: PortIo, C: Clock> Femc<P, C> {
    pub(crate) fn lpr_handler(&mut self, req: &Request, out: &mut CanFrame) {
        let sub = (req.sub & addr::LPR_SUB_MASK) >> addr::LPR_SUB_SHIFT;
        match sub {
            addr::LPR_TEMP0 | addr::LPR_TEMP1 => self.lpr_temp_point(sub as usize, req, out),
            addr::LPR_OPTICAL_SWITCH => self.optical_switch_point(req, out),
            addr::LPR_EDFA => self.edfa_point(req, out),
            _ => submodule_range(out, &mut self.errors, ErrModule::Lpr),
        }
    }

    fn lpr_temp_point(&mut self, sensor: usize, req: &Request, out: &mut CanFrame) {
        if !req.is_monitor() {
            reject_control(&mut self.errors, ErrModule::LprTemp);
            return;
        }
        if req.on_control_rca() {
            reject_monitor(out, &mut self.errors, ErrModule::LprTemp);
            return;
        }
        let point = if sensor == 0 {
            lpr::AREG_TEMP0
        } else {
            lpr::AREG_TEMP1
        };
        let read = self.lpr_analog_unipolar(point, lpr::TEMP_SCALE);
        finish_analog(
            out,
            &mut self.errors,
            ErrModule::LprTemp,
            &mut self.fe.lpr.temp[sensor],
            read,
        );
    }

    fn optical_switch_point(&mut self, req: &Request, out: &mut CanFrame) {
        match req.sub & addr::OSW_SUB_MASK {
            addr::OSW_PORT => {
                if !req.is_monitor() {
                    self.fe.lpr.optical_switch.last_port.save(&req.frame);
                    let port = req.byte();
                    let status = if port > MAX_PORT {
                        self.errors
                            .store(ErrModule::OpticalSwitch, codes::dev::SET_RANGE);
                        Status::ErrorRange
                    } else {
                        match self.lpr_set_port(port) {
                            Ok(()) => Status::Ok,
                            Err(_) => Status::Error,
                        }
                    };
                    self.fe.lpr.optical_switch.last_port.status = status;
                    return;
                }
                if req.on_control_rca() {
                    echo_last(out, &self.fe.lpr.optical_switch.last_port);
                    return;
                }
                reply_byte(out, self.fe.lpr.optical_switch.port);
            }
            addr::OSW_SHUTTER => {
                if !req.is_monitor() {
                    self.fe.lpr.optical_switch.last_shutter.save(&req.frame);
                    let status = match self.lpr_set_shutter(req.byte() != 0, false) {
                        Ok(()) => Status::Ok,
                        Err(_) => Status::Error,
                    };
                    self.fe.lpr.optical_switch.last_shutter.status = status;
                    return;
                }
                if req.on_control_rca() {
                    echo_last(out, &self.fe.lpr.optical_switch.last_shutter);
                    return;
                }
                reply_byte(out, self.fe.lpr.optical_switch.shutter as u8);
            }
            addr::OSW_FORCE_SHUTTER => {
                // Control only: slam the shutter without waiting for the
                // switch to report ready.
                if !req.is_monitor() {
                    self.fe.lpr.optical_switch.last_force_shutter.save(&req.frame);
                    let status = match self.lpr_set_shutter(true, true) {
                        Ok(()) => Status::Ok,
                        Err(_) => Status::Error,
                    };
                    self.fe.lpr.optical_switch.last_force_shutter.status = status;
                    return;
                }
                if req.on_control_rca() {
                    echo_last(out, &self.fe.lpr.optical_switch.last_force_shutter);
                    return;
                }
                reject_monitor(out, &mut self.errors, ErrModule::OpticalSwitch);
            }
            addr::OSW_STATE => {
                if !req.is_monitor() {
                    reject_control(&mut self.errors, ErrModule::OpticalSwitch);
                    return;
                }
                if req.on_control_rca() {
                    reject_monitor(out, &mut self.errors, ErrModule::OpticalSwitch);
                    return;
                }
                if self.lpr_read_status().is_err() {
                    out.status = Status::Error;
                }
                reply_byte(out, self.fe.lpr.optical_switch.error as u8);
            }
            addr::OSW_BUSY => {
                if !req.is_monitor() {
                    reject_control(&mut self.errors, ErrModule::OpticalSwitch);
                    return;
                }
                if req.on_control_rca() {
                    reject_monitor(out, &mut self.errors, ErrModule::OpticalSwitch);
                    return;
                }
                if self.lpr_read_status().is_err() {
                    out.status = Status::Error;
                }
                reply_byte(out, self.fe.lpr.optical_switch.busy as u8);
            }
            _ => submodule_range(out, &mut self.errors, ErrModule::OpticalSwitch),
        }
    }

    fn edfa_point(&mut self, req: &Request, out: &mut CanFrame) {
        match (req.sub & addr::EDFA_SUB_MASK) >> addr::EDFA_SUB_SHIFT {
            addr::EDFA_LASER => self.edfa_laser_point(req, out),
            addr::EDFA_PHOTO_DETECTOR => self.edfa_photo_detector_point(req, out),
            addr::EDFA_MODULATION_INPUT => self.edfa_modulation_point(req, out),
            _ => submodule_range(out, &mut self.errors, ErrModule::Edfa),
        }
    }

    fn edfa_laser_point(&mut self, req: &Request, out: &mut CanFrame) {
        if !req.is_monitor() {
            reject_control(&mut self.errors, ErrModule::EdfaLaser);
            return;
        }
        if req.on_control_rca() {
            reject_monitor(out, &mut self.errors, ErrModule::EdfaLaser);
            return;
        }
        match req.sub & addr::LASER_SUB_MASK {
            addr::LASER_PUMP_TEMP => {
                let read = self.lpr_analog_unipolar(lpr::AREG_LASER_PUMP_TEMP, lpr::LASER_PUMP_TEMP_SCALE);
                finish_analog(
                    out,
                    &mut self.errors,
                    ErrModule::EdfaLaser,
                    &mut self.fe.lpr.edfa.laser_pump_temp,
                    read,
                );
            }
            addr::LASER_DRIVE_CURRENT => {
                let read = self
                    .lpr_analog_unipolar(lpr::AREG_LASER_DRIVE_CURRENT, lpr::LASER_DRIVE_CURRENT_SCALE);
                finish_analog(
                    out,
                    &mut self.errors,
                    ErrModule::EdfaLaser,
                    &mut self.fe.lpr.edfa.laser_drive_current,
                    read,
                );
            }
            addr::LASER_PHOTO_DETECT_CURRENT => {
                let read = self.lpr_analog_unipolar(
                    lpr::AREG_LASER_PHOTO_DETECT_CURRENT,
                    lpr::PHOTO_DETECT_CURRENT_SCALE,
                );
                finish_analog(
                    out,
                    &mut self.errors,
                    ErrModule::EdfaLaser,
                    &mut self.fe.lpr.edfa.laser_photo_detect_current,
                    read,
                );
            }
            _ => submodule_range(out, &mut self.errors, ErrModule::EdfaLaser),
        }
    }

    fn edfa_photo_detector_point(&mut self, req: &Request, out: &mut CanFrame) {
        if !req.is_monitor() {
            reject_control(&mut self.errors, ErrModule::EdfaPhotoDetector);
            return;
        }
        if req.on_control_rca() {
            reject_monitor(out, &mut self.errors, ErrModule::EdfaPhotoDetector);
            return;
        }
        match req.sub & addr::EPD_SUB_MASK {
            addr::EPD_CURRENT => {
                let read = self.lpr_analog_unipolar(
                    lpr::AREG_PHOTO_DETECTOR_CURRENT,
                    lpr::PHOTO_DETECT_CURRENT_SCALE,
                );
                finish_analog(
                    out,
                    &mut self.errors,
                    ErrModule::EdfaPhotoDetector,
                    &mut self.fe.lpr.edfa.photo_detector_current,
                    read,
                );
            }
            _ => {
                let read = self
                    .lpr_analog_unipolar(lpr::AREG_PHOTO_DETECTOR_POWER, lpr::PHOTO_DETECT_POWER_SCALE);
                finish_analog(
                    out,
                    &mut self.errors,
                    ErrModule::EdfaPhotoDetector,
                    &mut self.fe.lpr.edfa.photo_detector_power,
                    read,
                );
            }
        }
    }

    fn edfa_modulation_point(&mut self, req: &Request, out: &mut CanFrame) {
        if !req.is_monitor() {
            self.fe.lpr.edfa.last_modulation_input.save(&req.frame);
            let status = match req.f32() {
                Some(v) if (0.0..=lpr::MODULATION_INPUT_SCALE).contains(&v) => {
                    match self.lpr_set_modulation(v) {
                        Ok(()) => Status::Ok,
                        Err(_) => Status::Error,
                    }
                }
                _ => {
                    self.errors
                        .store(ErrModule::EdfaModInput, codes::dev::SET_RANGE);
                    Status::ErrorRange
                }
            };
            self.fe.lpr.edfa.last_modulation_input.status = status;
            return;
        }
        if req.on_control_rca() {
            echo_last(out, &self.fe.lpr.edfa.last_modulation_input);
            return;
        }
        wire::put_f32(&mut out.data, 0, self.fe.lpr.edfa.modulation_input);
        out.size = 4;
    }
}

#[cfg(test)]
mod tests {
    use femc_core::status::Status;
    use femc_core::wire;

    use crate::addr;
    use crate::testing::{booted_femc, control, monitor};

    #[test]
    fn test_optical_switch_port_select() {
        let mut femc = booted_femc();
        let rca = addr::lpr_optical_switch(addr::OSW_PORT);
        control(&mut femc, rca + addr::CONTROL_OFFSET, &[4]);
        assert_eq!(femc.fe.lpr.optical_switch.port, 4);
        assert_eq!(femc.fe.lpr.optical_switch.last_port.status, Status::Ok);
        assert_eq!(monitor(&mut femc, rca).payload()[0], 4);

        control(&mut femc, rca + addr::CONTROL_OFFSET, &[12]);
        assert_eq!(femc.fe.lpr.optical_switch.last_port.status, Status::ErrorRange);
        assert_eq!(femc.fe.lpr.optical_switch.port, 4);
    }

    #[test]
    fn test_stuck_switch_times_out() {
        let mut femc = booted_femc();
        // Ready bit held low forever: the stroke never finishes.
        femc.bus.io.push_read([crate::serial::lpr::STATUS_ADC_READY, 0, 0]);
        control(
            &mut femc,
            addr::lpr_optical_switch(addr::OSW_PORT) + addr::CONTROL_OFFSET,
            &[1],
        );
        assert_eq!(femc.fe.lpr.optical_switch.last_port.status, Status::Error);
        // The port mirror keeps the previous selection.
        assert_eq!(femc.fe.lpr.optical_switch.port, 0);
    }

    #[test]
    fn test_modulation_input_round_trip() {
        let mut femc = booted_femc();
        let rca = addr::lpr_edfa_modulation_input();
        control(&mut femc, rca + addr::CONTROL_OFFSET, &2.5f32.to_be_bytes());
        assert_eq!(femc.fe.lpr.edfa.modulation_input, 2.5);
        let reply = monitor(&mut femc, rca);
        assert_eq!(wire::take_f32(reply.payload()), 2.5);

        // Outside the 0-5 V drive window.
        control(&mut femc, rca + addr::CONTROL_OFFSET, &7.0f32.to_be_bytes());
        assert_eq!(
            femc.fe.lpr.edfa.last_modulation_input.status,
            Status::ErrorRange
        );
    }

    #[test]
    fn test_laser_monitors() {
        let mut femc = booted_femc();
        let reply = monitor(&mut femc, addr::lpr_edfa_laser(addr::LASER_PUMP_TEMP));
        assert_eq!(reply.size, 5);
        assert_eq!(reply.status, Status::Ok);
    }
}
