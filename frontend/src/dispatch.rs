//! Request dispatch.
//!
//! Decode the 29-bit RCA into class / module / submodule, run the mode
//! gate, and hand the request to the right device handler. Standard
//! monitor replies get the status byte appended here; controls never
//! produce a reply, so their failures are only visible through the
//! last-control records and the error ring.

use femc_bus::PortIo;
use femc_core::frame::{CanFrame, Class, ModuleId};
use femc_core::ring::{codes, ErrModule};
use femc_core::status::Status;
use femc_core::timer::Clock;

use crate::devices::Request;
use crate::mainloop::Femc;
use crate::state::FeMode;

impl<P: PortIo, C: Clock> Femc<P, C> {
    /// Handle one incoming frame; the returned frame, if any, is the
    /// monitor reply to ship back.
    pub fn dispatch(&mut self, frame: CanFrame) -> Option<CanFrame> {
        let rca = frame.rca();
        match rca.class() {
            Class::Reserved => {
                // Class 3 belongs to the adapter; receiving it is a bug
                // somewhere upstream.
                self.errors.store(ErrModule::Can, codes::can::CLASS_RANGE);
                None
            }
            Class::Special => self.special_handler(&frame),
            Class::Monitor | Class::Control => self.standard_handler(frame),
        }
    }

    fn standard_handler(&mut self, frame: CanFrame) -> Option<CanFrame> {
        let rca = frame.rca();
        let is_monitor = frame.is_monitor();

        // Maintenance mode shields all standard traffic from the hardware.
        if self.fe.mode == FeMode::Maintenance {
            self.errors
                .store(ErrModule::Can, codes::can::MAINTENANCE_MODE);
            if is_monitor {
                let mut out = CanFrame::monitor(frame.rca);
                out.status = Status::HardwBlocked;
                out.append_status();
                return Some(out);
            }
            return None;
        }

        // A control payload on a monitor-class RCA has no reply channel
        // and no last-control record to blame: log and drop.
        if !is_monitor && rca.class() == Class::Monitor {
            self.errors
                .store(ErrModule::Can, codes::can::CONTROL_ON_MONITOR);
            return None;
        }

        let mut out = CanFrame::monitor(frame.rca);
        let req = Request {
            frame,
            class: rca.class(),
            sub: rca.submodule(),
        };

        match rca.module() {
            None => {
                self.errors.store(ErrModule::Can, codes::can::MODULE_RANGE);
                out.status = Status::HardwRange;
            }
            Some(ModuleId::Cartridge(n)) => self.cartridge_handler(n, &req, &mut out),
            Some(ModuleId::PowerDist) => self.power_handler(&req, &mut out),
            Some(ModuleId::IfSwitch) => self.if_switch_handler(&req, &mut out),
            Some(ModuleId::Cryostat) => self.cryostat_handler(&req, &mut out),
            Some(ModuleId::Lpr) => self.lpr_handler(&req, &mut out),
            Some(ModuleId::Fetim) => self.fetim_handler(&req, &mut out),
        }

        if is_monitor {
            out.append_status();
            Some(out)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use femc_core::frame::CanFrame;
    use femc_core::ring::{codes, ErrModule};
    use femc_core::status::Status;

    use crate::addr;
    use crate::special;
    use crate::testing::{booted_femc, control, monitor};

    #[test]
    fn test_reserved_class_is_dropped() {
        let mut femc = booted_femc();
        assert!(femc.dispatch(CanFrame::monitor(0x30000)).is_none());
        assert_eq!(
            femc.errors.take_next(),
            Some(femc_core::ring::pack(ErrModule::Can, codes::can::CLASS_RANGE))
        );
    }

    #[test]
    fn test_maintenance_mode_shield() {
        let mut femc = booted_femc();
        // Switch to Maintenance over the special control RCA.
        control(
            &mut femc,
            femc_core::frame::BASE_SPECIAL_CONTROL_RCA + special::SET_FE_MODE,
            &[2],
        );

        let reply = monitor(&mut femc, addr::cryostat_temp(0));
        assert_eq!(reply.size, 1);
        assert_eq!(reply.data[0], Status::HardwBlocked as u8);
        assert_eq!(
            femc.errors.take_next(),
            Some(femc_core::ring::pack(
                ErrModule::Can,
                codes::can::MAINTENANCE_MODE
            ))
        );

        // Standard controls are silently dropped (but logged) too.
        control(
            &mut femc,
            addr::cryostat_backing_pump() + addr::CONTROL_OFFSET,
            &[1],
        );
        assert!(!femc.fe.cryostat.backing_pump.enabled);

        // Special traffic still goes through: switch back.
        control(
            &mut femc,
            femc_core::frame::BASE_SPECIAL_CONTROL_RCA + special::SET_FE_MODE,
            &[0],
        );
        let reply = monitor(&mut femc, addr::cryostat_temp(0));
        assert_ne!(reply.data[reply.size as usize - 1], Status::HardwBlocked as u8);
    }

    #[test]
    fn test_control_on_monitor_rca_is_dropped() {
        let mut femc = booted_femc();
        assert!(femc
            .dispatch(CanFrame::control(addr::cryostat_backing_pump(), &[1]))
            .is_none());
        assert_eq!(
            femc.errors.take_next(),
            Some(femc_core::ring::pack(
                ErrModule::Can,
                codes::can::CONTROL_ON_MONITOR
            ))
        );
        assert!(!femc.fe.cryostat.backing_pump.enabled);
    }

    #[test]
    fn test_unassigned_module_answers_range() {
        let mut femc = booted_femc();
        let reply = monitor(&mut femc, 0xF000);
        assert_eq!(reply.size, 1);
        assert_eq!(reply.data[0], Status::HardwRange as u8);
    }

    #[test]
    fn test_monitor_reply_appends_status() {
        let mut femc = booted_femc();
        let reply = monitor(&mut femc, addr::cryostat_backing_pump());
        // One data byte plus the status byte.
        assert_eq!(reply.size, 2);
        assert_eq!(reply.data[1], Status::Ok as u8);
    }
}
