//! Power distribution handlers.
//!
//! The distribution modules are the only place cartridge power state
//! changes: the admission policy caps how many cartridges may be powered
//! at once (three in Operational, all ten in Troubleshooting), and the
//! reduced-power Standby2 state is only reachable once a cartridge has
//! finished initializing.

use femc_bus::PortIo;
use femc_core::frame::CanFrame;
use femc_core::ring::{codes, ErrModule};
use femc_core::status::Status;
use femc_core::timer::Clock;

use super::{
    echo_last, finish_analog, reject_control, reject_monitor, reply_byte, submodule_range, Request,
};
use crate::addr;
use crate::mainloop::Femc;
use crate::serial::pd;
use crate::state::cartridge::CartState;
use crate::state::power::{PdEnable, MAX_POWERED_OPERATIONAL, MAX_POWERED_TROUBLESHOOTING};
use crate::state::FeMode;

impl<P: PortIo, C: Clock> Femc<P, C> {
    pub(crate) fn power_handler(&mut self, req: &Request, out: &mut CanFrame) {
        let sub = (req.sub & addr::PD_SUB_MASK) >> addr::PD_SUB_SHIFT;
        match sub {
            0..=9 => self.pd_module_point(sub as u8, req, out),
            s if s == addr::PD_POWERED_MODULES => self.powered_modules(req, out),
            _ => submodule_range(out, &mut self.errors, ErrModule::PowerDist),
        }
    }

    fn pd_module_point(&mut self, module: u8, req: &Request, out: &mut CanFrame) {
        let sub = (req.sub & addr::PD_MOD_SUB_MASK) >> addr::PD_MOD_SUB_SHIFT;
        match sub {
            0..=5 => self.pd_channel_point(module, sub as u8, req, out),
            s if s == addr::PD_MOD_ENABLE => self.pd_enable_point(module, req, out),
            _ => submodule_range(out, &mut self.errors, ErrModule::PdModule),
        }
    }

    fn pd_channel_point(&mut self, module: u8, channel: u8, req: &Request, out: &mut CanFrame) {
        if !req.is_monitor() {
            reject_control(&mut self.errors, ErrModule::PdChannel);
            return;
        }
        if req.on_control_rca() {
            reject_monitor(out, &mut self.errors, ErrModule::PdChannel);
            return;
        }
        let current = req.sub & addr::PD_CH_MASK == addr::PD_CH_CURRENT;
        let scale = if current {
            pd::CURRENT_SCALE
        } else {
            pd::VOLTAGE_SCALE
        };
        let read = self.pd_analog(pd::areg_channel(module, channel, current), scale);
        let point = &mut self.fe.power.module[module as usize].channel[channel as usize];
        let analog = if current {
            &mut point.current
        } else {
            &mut point.voltage
        };
        finish_analog(out, &mut self.errors, ErrModule::PdChannel, analog, read);
    }

    /// Powered cartridges allowed in the current operating mode.
    fn power_cap(&self) -> u8 {
        match self.fe.mode {
            FeMode::Troubleshooting => MAX_POWERED_TROUBLESHOOTING,
            _ => MAX_POWERED_OPERATIONAL,
        }
    }

    fn pd_enable_point(&mut self, module: u8, req: &Request, out: &mut CanFrame) {
        if !req.is_monitor() {
            self.fe.power.module[module as usize]
                .last_enable
                .save(&req.frame);

            let requested = match req.byte() {
                0 => PdEnable::Off,
                1 => PdEnable::On,
                2 => PdEnable::Standby2,
                _ => {
                    self.errors.store(ErrModule::PdModule, codes::dev::SET_RANGE);
                    self.fe.power.module[module as usize].last_enable.status = Status::ErrorRange;
                    return;
                }
            };

            if !self.fe.cartridge[module as usize].available {
                self.errors
                    .store(ErrModule::PdModule, codes::dev::NOT_INSTALLED);
                self.fe.power.module[module as usize].last_enable.status = Status::HardwBlocked;
                return;
            }

            let status = self.pd_apply_enable(module, requested);
            self.fe.power.module[module as usize].last_enable.status = status;
            return;
        }

        if req.on_control_rca() {
            echo_last(out, &self.fe.power.module[module as usize].last_enable);
            return;
        }

        reply_byte(out, self.fe.power.module[module as usize].enable as u8);
    }

    /// Apply a power state request, enforcing the admission policy and
    /// driving the cartridge lifecycle on the edges.
    fn pd_apply_enable(&mut self, module: u8, requested: PdEnable) -> Status {
        let current = self.fe.power.module[module as usize].enable;
        match requested {
            PdEnable::On => {
                if current == PdEnable::Off {
                    let powered = self.fe.power.powered_modules();
                    if powered >= self.power_cap() {
                        self.errors
                            .store(ErrModule::PdModule, codes::pd_module::POWER_CAP);
                        return Status::HardwBlocked;
                    }
                }
                if self.pd_set_enable(module, PdEnable::On).is_err() {
                    return Status::Error;
                }
                if current == PdEnable::Off {
                    self.cartridge_power_on(module);
                }
                Status::Ok
            }
            PdEnable::Standby2 => {
                // Reduced power only once the cartridge is initialized.
                let state = self.fe.cartridge[module as usize].state;
                if !matches!(state, CartState::Ready | CartState::Observing) {
                    self.errors
                        .store(ErrModule::PdModule, codes::pd_module::STANDBY2_DENIED);
                    return Status::HardwBlocked;
                }
                if self.pd_set_enable(module, PdEnable::Standby2).is_err() {
                    return Status::Error;
                }
                Status::Ok
            }
            PdEnable::Off => {
                if self.pd_set_enable(module, PdEnable::Off).is_err() {
                    return Status::Error;
                }
                if current != PdEnable::Off {
                    self.cartridge_power_off(module);
                }
                Status::Ok
            }
        }
    }

    fn powered_modules(&mut self, req: &Request, out: &mut CanFrame) {
        if !req.is_monitor() {
            reject_control(&mut self.errors, ErrModule::PowerDist);
            return;
        }
        if req.on_control_rca() {
            reject_monitor(out, &mut self.errors, ErrModule::PowerDist);
            return;
        }
        reply_byte(out, self.fe.power.powered_modules());
    }
}

#[cfg(test)]
mod tests {
    use femc_core::ring::{codes, pack, ErrModule};
    use femc_core::status::Status;

    use crate::addr;
    use crate::special;
    use crate::state::cartridge::CartState;
    use crate::state::power::PdEnable;
    use crate::testing::{booted_femc, control, monitor, power_on_ready};

    fn enable_rca(cartridge: u32) -> u32 {
        addr::pd_module_enable(cartridge) + addr::CONTROL_OFFSET
    }

    #[test]
    fn test_admission_cap_in_operational_mode() {
        let mut femc = booted_femc();
        for cart in 0..3 {
            control(&mut femc, enable_rca(cart), &[1]);
            assert_eq!(femc.fe.power.module[cart as usize].enable, PdEnable::On);
        }

        // The fourth power-on violates the cap: refused, cartridge Off.
        control(&mut femc, enable_rca(3), &[1]);
        assert_eq!(femc.fe.power.module[3].enable, PdEnable::Off);
        assert_eq!(femc.fe.cartridge[3].state, CartState::Off);
        assert_eq!(
            femc.fe.power.module[3].last_enable.status,
            Status::HardwBlocked
        );
        assert_eq!(femc.fe.power.powered_modules(), 3);

        let reply = monitor(&mut femc, addr::pd_powered_modules());
        assert_eq!(reply.payload()[0], 3);
    }

    #[test]
    fn test_troubleshooting_mode_lifts_cap() {
        let mut femc = booted_femc();
        control(
            &mut femc,
            femc_core::frame::BASE_SPECIAL_CONTROL_RCA + special::SET_FE_MODE,
            &[1],
        );
        for cart in 0..10 {
            control(&mut femc, enable_rca(cart), &[1]);
        }
        assert_eq!(femc.fe.power.powered_modules(), 10);
    }

    #[test]
    fn test_power_on_drives_lifecycle() {
        let mut femc = booted_femc();
        control(&mut femc, enable_rca(0), &[1]);
        assert_eq!(femc.fe.cartridge[0].state, CartState::On);
        while femc.step_cartridge_init() {}
        assert_eq!(femc.fe.cartridge[0].state, CartState::Ready);

        control(&mut femc, enable_rca(0), &[0]);
        assert_eq!(femc.fe.cartridge[0].state, CartState::Off);
        assert_eq!(femc.fe.power.powered_modules(), 0);
    }

    #[test]
    fn test_standby2_needs_ready_cartridge() {
        let mut femc = booted_femc();
        control(&mut femc, enable_rca(0), &[1]);
        // Still initializing: refused.
        control(&mut femc, enable_rca(0), &[2]);
        assert_eq!(
            femc.fe.power.module[0].last_enable.status,
            Status::HardwBlocked
        );
        assert_eq!(femc.fe.power.module[0].enable, PdEnable::On);
        assert_eq!(
            femc.errors.take_next(),
            Some(pack(ErrModule::PdModule, codes::pd_module::STANDBY2_DENIED))
        );

        while femc.step_cartridge_init() {}
        control(&mut femc, enable_rca(0), &[2]);
        assert_eq!(femc.fe.power.module[0].enable, PdEnable::Standby2);
        assert_eq!(femc.fe.power.module[0].last_enable.status, Status::Ok);
    }

    #[test]
    fn test_unavailable_cartridge_refused() {
        let mut femc =
            crate::testing::booted_femc_with(|cfg| cfg.cartridge[7].available = false);
        control(&mut femc, enable_rca(7), &[1]);
        assert_eq!(femc.fe.power.module[7].enable, PdEnable::Off);
        assert_eq!(
            femc.fe.power.module[7].last_enable.status,
            Status::HardwBlocked
        );
    }

    #[test]
    fn test_invalid_enable_value() {
        let mut femc = booted_femc();
        control(&mut femc, enable_rca(0), &[9]);
        assert_eq!(
            femc.fe.power.module[0].last_enable.status,
            Status::ErrorRange
        );
        assert_eq!(femc.fe.power.module[0].enable, PdEnable::Off);
    }

    #[test]
    fn test_monitor_on_enable_control_rca_echoes() {
        let mut femc = booted_femc();
        control(&mut femc, enable_rca(2), &[1]);
        let reply = monitor(&mut femc, enable_rca(2));
        // Echoed command byte plus the status the control produced.
        assert_eq!(reply.payload(), &[1, Status::Ok as u8]);
    }

    #[test]
    fn test_powered_cartridge_serves_bias_points() {
        let mut femc = booted_femc();
        power_on_ready(&mut femc, 0);
        let reply = monitor(&mut femc, addr::sis(0, 0, 1, addr::SIS_CURRENT));
        assert_eq!(reply.size, 5); // float + status
    }
}
