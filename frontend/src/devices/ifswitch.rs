//! IF switch handlers.

use femc_bus::PortIo;
use femc_core::frame::CanFrame;
use femc_core::ring::{codes, ErrModule};
use femc_core::status::Status;
use femc_core::timer::Clock;

use super::{
    echo_last, finish_stored, reject_control, reject_monitor, reply_byte, submodule_range, Request,
};
use crate::addr;
use crate::mainloop::Femc;
use crate::state::ifswitch::{MAX_ATTENUATION, MAX_BAND};

impl<P: PortIo, C: Clock> Femc<P, C> {
    pub(crate) fn if_switch_handler(&mut self, req: &Request, out: &mut CanFrame) {
        let sub = (req.sub & addr::IF_SUB_MASK) >> addr::IF_SUB_SHIFT;
        match sub {
            0..=3 => self.if_channel_point(sub as u8, req, out),
            s if s == addr::IF_BAND_SELECT => self.band_select(req, out),
            _ => submodule_range(out, &mut self.errors, ErrModule::IfSwitch),
        }
    }

    fn band_select(&mut self, req: &Request, out: &mut CanFrame) {
        if !req.is_monitor() {
            self.fe.if_switch.last_band.save(&req.frame);
            let band = req.byte();
            let status = if band > MAX_BAND {
                self.errors.store(ErrModule::IfSwitch, codes::dev::SET_RANGE);
                Status::ErrorRange
            } else {
                match self.if_set_band(band) {
                    Ok(()) => {
                        // The selected band's cartridge becomes the observer.
                        self.cartridge_observe(band);
                        Status::Ok
                    }
                    Err(_) => Status::Error,
                }
            };
            self.fe.if_switch.last_band.status = status;
            return;
        }
        if req.on_control_rca() {
            echo_last(out, &self.fe.if_switch.last_band);
            return;
        }
        reply_byte(out, self.fe.if_switch.band);
    }

    fn if_channel_point(&mut self, channel: u8, req: &Request, out: &mut CanFrame) {
        let ch = channel as usize;
        match req.sub & addr::IF_CH_MASK {
            addr::IF_CH_ATTENUATION => {
                if !req.is_monitor() {
                    self.fe.if_switch.channel[ch].last_attenuation.save(&req.frame);
                    let steps = req.byte();
                    let status = if steps > MAX_ATTENUATION {
                        self.errors.store(ErrModule::IfChannel, codes::dev::SET_RANGE);
                        Status::ErrorRange
                    } else {
                        match self.if_set_attenuation(channel, steps) {
                            Ok(()) => Status::Ok,
                            Err(_) => Status::Error,
                        }
                    };
                    self.fe.if_switch.channel[ch].last_attenuation.status = status;
                    return;
                }
                if req.on_control_rca() {
                    echo_last(out, &self.fe.if_switch.channel[ch].last_attenuation);
                    return;
                }
                reply_byte(out, self.fe.if_switch.channel[ch].attenuation);
            }
            addr::IF_CH_ASSEMBLY_TEMP => {
                if !req.is_monitor() {
                    reject_control(&mut self.errors, ErrModule::IfChannel);
                    return;
                }
                if req.on_control_rca() {
                    reject_monitor(out, &mut self.errors, ErrModule::IfChannel);
                    return;
                }
                let read = self.if_read_assembly_temp(channel);
                finish_stored(
                    out,
                    &mut self.errors,
                    ErrModule::IfChannel,
                    &self.fe.if_switch.channel[ch].assembly_temp,
                    read,
                );
            }
            addr::IF_CH_TEMP_SERVO => {
                if !req.is_monitor() {
                    let enable = req.byte() != 0;
                    self.fe.if_switch.channel[ch].last_servo.save(&req.frame);
                    let status = match self.if_set_servo(channel, enable) {
                        Ok(()) => Status::Ok,
                        Err(_) => Status::Error,
                    };
                    self.fe.if_switch.channel[ch].last_servo.status = status;
                    return;
                }
                if req.on_control_rca() {
                    echo_last(out, &self.fe.if_switch.channel[ch].last_servo);
                    return;
                }
                reply_byte(out, self.fe.if_switch.channel[ch].servo_enabled as u8);
            }
            _ => submodule_range(out, &mut self.errors, ErrModule::IfChannel),
        }
    }
}

#[cfg(test)]
mod tests {
    use femc_core::status::Status;

    use crate::addr;
    use crate::testing::{booted_femc, control, monitor};

    #[test]
    fn test_band_select_round_trip() {
        let mut femc = booted_femc();
        control(&mut femc, addr::if_band_select() + addr::CONTROL_OFFSET, &[6]);
        assert_eq!(femc.fe.if_switch.band, 6);
        let reply = monitor(&mut femc, addr::if_band_select());
        assert_eq!(reply.payload(), &[6, Status::Ok as u8]);

        control(&mut femc, addr::if_band_select() + addr::CONTROL_OFFSET, &[11]);
        assert_eq!(femc.fe.if_switch.band, 6);
        assert_eq!(femc.fe.if_switch.last_band.status, Status::ErrorRange);
    }

    #[test]
    fn test_attenuation_range() {
        let mut femc = booted_femc();
        let rca = addr::if_channel(2, addr::IF_CH_ATTENUATION) + addr::CONTROL_OFFSET;
        control(&mut femc, rca, &[15]);
        assert_eq!(femc.fe.if_switch.channel[2].attenuation, 15);
        control(&mut femc, rca, &[16]);
        assert_eq!(
            femc.fe.if_switch.channel[2].last_attenuation.status,
            Status::ErrorRange
        );
        assert_eq!(femc.fe.if_switch.channel[2].attenuation, 15);
    }

    #[test]
    fn test_temp_servo_enable() {
        let mut femc = booted_femc();
        let rca = addr::if_channel(1, addr::IF_CH_TEMP_SERVO);
        control(&mut femc, rca + addr::CONTROL_OFFSET, &[1]);
        assert!(femc.fe.if_switch.channel[1].servo_enabled);
        assert_eq!(monitor(&mut femc, rca).payload()[0], 1);
    }

    #[test]
    fn test_assembly_temp_monitor() {
        let mut femc = booted_femc();
        let reply = monitor(&mut femc, addr::if_channel(0, addr::IF_CH_ASSEMBLY_TEMP));
        assert_eq!(reply.size, 5);
        assert_eq!(reply.status, Status::Ok);
    }
}
