//! Special RCAs: firmware introspection, ESN list, error ring drain,
//! operating mode, and the process-level controls.
//!
//! Unlike standard monitors, special monitor replies carry no trailing
//! status byte; their payload layouts are fixed by the adapter protocol.

use femc_bus::PortIo;
use femc_core::frame::{self, CanFrame};
use femc_core::ring::{codes, ErrModule, NO_ERROR_ENTRY};
use femc_core::status::Status;
use femc_core::timer::Clock;
use femc_core::wire;

use crate::mainloop::{Femc, Stop};
use crate::state::FeMode;
use crate::version;

// Special monitor offsets from the special-monitor base.
pub const GET_VERSION: u32 = 0x02;
pub const GET_SPECIAL_MONITOR_RCAS: u32 = 0x03;
pub const GET_SPECIAL_CONTROL_RCAS: u32 = 0x04;
pub const GET_MONITOR_RCAS: u32 = 0x05;
pub const GET_CONTROL_RCAS: u32 = 0x06;
pub const GET_PPCOMM_TIME: u32 = 0x07;
pub const GET_FPGA_VERSION: u32 = 0x08;
pub const GET_CONSOLE_ENABLE: u32 = 0x09;
pub const GET_ESNS_FOUND: u32 = 0x0A;
pub const GET_ESNS: u32 = 0x0B;
pub const GET_ERRORS_NUMBER: u32 = 0x0C;
pub const GET_NEXT_ERROR: u32 = 0x0D;
pub const GET_FE_MODE: u32 = 0x0E;
/// Ten RCAs, one per cartridge; served even while the cartridge is off.
pub const GET_PA_LIMITS_ESN: u32 = 0x10;

// Special control offsets from the special-control base.
pub const SET_EXIT_PROGRAM: u32 = 0x00;
pub const SET_REBOOT: u32 = 0x01;
pub const SET_CONSOLE_ENABLE: u32 = 0x09;
pub const SET_FE_MODE: u32 = 0x0E;
pub const SET_READ_ESN: u32 = 0x0F;

/// Devices discovered on the one-wire bus at boot (or on rescan).
#[derive(Debug, Default)]
pub struct EsnTable {
    list: Vec<[u8; 8]>,
    cursor: usize,
}

impl EsnTable {
    pub fn replace(&mut self, list: Vec<[u8; 8]>) {
        self.list = list;
        self.cursor = 0;
    }

    pub fn count(&self) -> u8 {
        self.list.len().min(u8::MAX as usize) as u8
    }

    pub fn list(&self) -> &[[u8; 8]] {
        &self.list
    }

    pub fn rewind(&mut self) {
        self.cursor = 0;
    }

    /// Next ESN for the list iterator: all-0xFF when the bus was empty,
    /// all-zero (and a rewind) after the last device.
    pub fn next(&mut self) -> [u8; 8] {
        if self.list.is_empty() {
            return [0xFF; 8];
        }
        if self.cursor == self.list.len() {
            self.cursor = 0;
            return [0x00; 8];
        }
        let esn = self.list[self.cursor];
        self.cursor += 1;
        esn
    }
}

impl<P: PortIo, C: Clock> Femc<P, C> {
    pub(crate) fn special_handler(&mut self, frame: &CanFrame) -> Option<CanFrame> {
        if frame.is_monitor() {
            Some(self.special_monitor(frame))
        } else {
            self.special_control(frame);
            None
        }
    }

    fn special_monitor(&mut self, frame: &CanFrame) -> CanFrame {
        let mut out = CanFrame::monitor(frame.rca);
        match frame.rca.wrapping_sub(frame::BASE_SPECIAL_MONITOR_RCA) {
            GET_VERSION => {
                out.data[0] = version::VERSION_MAJOR;
                out.data[1] = version::VERSION_MINOR;
                out.data[2] = version::VERSION_PATCH;
                out.size = 3;
            }
            GET_SPECIAL_MONITOR_RCAS => {
                // The two RCAs below the first addressable one are claimed
                // by the adapter's own firmware.
                wire::put_u32_le(&mut out.data, 0, frame::FIRST_SPECIAL_MONITOR_RCA);
                wire::put_u32_le(&mut out.data, 4, frame::LAST_SPECIAL_MONITOR_RCA);
                out.size = 8;
            }
            GET_SPECIAL_CONTROL_RCAS => {
                wire::put_u32_le(&mut out.data, 0, frame::BASE_SPECIAL_CONTROL_RCA);
                wire::put_u32_le(&mut out.data, 4, frame::LAST_SPECIAL_CONTROL_RCA);
                out.size = 8;
            }
            GET_MONITOR_RCAS => {
                wire::put_u32_le(&mut out.data, 0, frame::BASE_MONITOR_RCA);
                wire::put_u32_le(&mut out.data, 4, frame::LAST_MONITOR_RCA);
                out.size = 8;
            }
            GET_CONTROL_RCAS => {
                wire::put_u32_le(&mut out.data, 0, frame::BASE_CONTROL_RCA);
                wire::put_u32_le(&mut out.data, 4, frame::LAST_CONTROL_RCA);
                out.size = 8;
            }
            GET_PPCOMM_TIME => {
                // No operation performed: a full payload of 0xFF to time
                // the longest adapter round trip.
                out.data = [0xFF; 8];
                out.size = 8;
            }
            GET_FPGA_VERSION => {
                let word = self.bus.fpga_version();
                out.data[0] = (word >> 12) as u8; // major
                out.data[1] = (word >> 8 & 0xF) as u8; // minor
                out.data[2] = (word & 0xFF) as u8; // patch
                out.size = 3;
            }
            GET_CONSOLE_ENABLE => {
                out.data[0] = self.console_enabled as u8;
                out.size = 1;
            }
            GET_ESNS_FOUND => {
                self.esns.rewind();
                out.data[0] = self.esns.count();
                out.size = 1;
            }
            GET_ESNS => {
                out.data = self.esns.next();
                out.size = 8;
            }
            GET_ERRORS_NUMBER => {
                wire::put_u16(&mut out.data, 0, self.errors.len() as u16);
                out.size = 2;
            }
            GET_NEXT_ERROR => {
                let entry = self.errors.take_next().unwrap_or(NO_ERROR_ENTRY);
                wire::put_u16(&mut out.data, 0, entry);
                out.size = 2;
            }
            GET_FE_MODE => {
                out.data[0] = self.fe.mode as u8;
                out.size = 1;
            }
            n if (GET_PA_LIMITS_ESN..GET_PA_LIMITS_ESN + 10).contains(&n) => {
                let cartridge = (n - GET_PA_LIMITS_ESN) as usize;
                out.data = self.fe.cartridge[cartridge].lo.pa_limits_esn;
                out.size = 8;
            }
            _ => {
                self.errors
                    .store(ErrModule::Can, codes::can::SPECIAL_MONITOR_RANGE);
                out.status = Status::CanRange;
            }
        }
        out
    }

    fn special_control(&mut self, frame: &CanFrame) {
        match frame.rca.wrapping_sub(frame::BASE_SPECIAL_CONTROL_RCA) {
            SET_EXIT_PROGRAM => {
                log::info!("exit requested over CAN");
                self.stop = Some(Stop::Exit);
            }
            SET_REBOOT => {
                log::info!("reboot requested over CAN");
                self.stop = Some(Stop::Reboot);
            }
            SET_CONSOLE_ENABLE => {
                self.console_enabled = frame.data[0] != 0;
            }
            SET_FE_MODE => match FeMode::from_byte(frame.data[0]) {
                Some(mode) => {
                    self.fe.mode = mode;
                    log::info!("FE mode set to {:?}", mode);
                }
                None => {
                    self.errors.store(ErrModule::Can, codes::can::ILLEGAL_MODE);
                }
            },
            SET_READ_ESN => {
                // Serviced from the main loop where the one-wire
                // collaborator is reachable.
                self.rescan_esns = true;
                self.esns.rewind();
            }
            _ => {
                self.errors
                    .store(ErrModule::Can, codes::can::SPECIAL_CONTROL_RANGE);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use femc_core::frame::{BASE_SPECIAL_CONTROL_RCA, BASE_SPECIAL_MONITOR_RCA};
    use femc_core::ring::{pack, ErrModule, NO_ERROR_ENTRY};
    use femc_core::status::Status;

    use super::*;
    use crate::mainloop::Stop;
    use crate::testing::{booted_femc, control, monitor};
    use crate::version;

    fn special_monitor(femc: &mut crate::testing::BootedFemc, offset: u32) -> CanFrame {
        monitor(femc, BASE_SPECIAL_MONITOR_RCA + offset)
    }

    #[test]
    fn test_version_query() {
        let mut femc = booted_femc();
        let reply = special_monitor(&mut femc, GET_VERSION);
        assert_eq!(
            reply.payload(),
            &[version::VERSION_MAJOR, version::VERSION_MINOR, version::VERSION_PATCH]
        );
        assert_eq!(reply.status, Status::Ok);
    }

    #[test]
    fn test_rca_range_queries() {
        let mut femc = booted_femc();
        let reply = special_monitor(&mut femc, GET_SPECIAL_MONITOR_RCAS);
        assert_eq!(reply.size, 8);
        // First addressable special monitor RCA, little-endian.
        assert_eq!(&reply.data[..4], &0x20002u32.to_le_bytes());
        assert_eq!(&reply.data[4..], &0x20FFFu32.to_le_bytes());

        let reply = special_monitor(&mut femc, GET_CONTROL_RCAS);
        assert_eq!(&reply.data[..4], &0x10000u32.to_le_bytes());
        assert_eq!(&reply.data[4..], &0x1FFFFu32.to_le_bytes());
    }

    #[test]
    fn test_ppcomm_time_probe() {
        let mut femc = booted_femc();
        let reply = special_monitor(&mut femc, GET_PPCOMM_TIME);
        assert_eq!(reply.payload(), &[0xFF; 8]);
    }

    #[test]
    fn test_fpga_version_unpack() {
        let mut femc = booted_femc();
        femc.bus.io.fpga_version = 0x1234;
        let reply = special_monitor(&mut femc, GET_FPGA_VERSION);
        assert_eq!(reply.payload(), &[0x1, 0x2, 0x34]);
    }

    #[test]
    fn test_error_ring_drain() {
        let mut femc = booted_femc();
        for code in 1..=5 {
            femc.errors.store(ErrModule::Timer, code);
        }

        let reply = special_monitor(&mut femc, GET_ERRORS_NUMBER);
        assert_eq!(reply.payload(), &5u16.to_be_bytes());

        for code in 1..=5u8 {
            let reply = special_monitor(&mut femc, GET_NEXT_ERROR);
            assert_eq!(
                reply.payload(),
                &pack(ErrModule::Timer, code).to_be_bytes()
            );
        }
        // Drained: the sentinel comes back.
        let reply = special_monitor(&mut femc, GET_NEXT_ERROR);
        assert_eq!(reply.payload(), &NO_ERROR_ENTRY.to_be_bytes());
    }

    #[test]
    fn test_esn_list_iteration() {
        let mut femc = booted_femc();
        femc.esns.replace(vec![[1; 8], [2; 8]]);

        let reply = special_monitor(&mut femc, GET_ESNS_FOUND);
        assert_eq!(reply.payload(), &[2]);
        assert_eq!(special_monitor(&mut femc, GET_ESNS).payload(), &[1; 8]);
        assert_eq!(special_monitor(&mut femc, GET_ESNS).payload(), &[2; 8]);
        // End of list: all-zero and the iterator rewinds.
        assert_eq!(special_monitor(&mut femc, GET_ESNS).payload(), &[0; 8]);
        assert_eq!(special_monitor(&mut femc, GET_ESNS).payload(), &[1; 8]);
    }

    #[test]
    fn test_empty_esn_list() {
        let mut femc = booted_femc();
        assert_eq!(special_monitor(&mut femc, GET_ESNS).payload(), &[0xFF; 8]);
    }

    #[test]
    fn test_fe_mode_round_trip() {
        let mut femc = booted_femc();
        control(&mut femc, BASE_SPECIAL_CONTROL_RCA + SET_FE_MODE, &[1]);
        let reply = special_monitor(&mut femc, GET_FE_MODE);
        assert_eq!(reply.payload(), &[1]);

        // Illegal mode byte is refused and logged.
        control(&mut femc, BASE_SPECIAL_CONTROL_RCA + SET_FE_MODE, &[7]);
        assert_eq!(special_monitor(&mut femc, GET_FE_MODE).payload(), &[1]);
        assert_eq!(
            femc.errors.take_next(),
            Some(pack(ErrModule::Can, codes::can::ILLEGAL_MODE))
        );
    }

    #[test]
    fn test_console_enable_round_trip() {
        let mut femc = booted_femc();
        control(&mut femc, BASE_SPECIAL_CONTROL_RCA + SET_CONSOLE_ENABLE, &[1]);
        assert_eq!(
            special_monitor(&mut femc, GET_CONSOLE_ENABLE).payload(),
            &[1]
        );
    }

    #[test]
    fn test_exit_and_reboot_requests() {
        let mut femc = booted_femc();
        control(&mut femc, BASE_SPECIAL_CONTROL_RCA + SET_EXIT_PROGRAM, &[1]);
        assert_eq!(femc.stop, Some(Stop::Exit));
        femc.stop = None;
        control(&mut femc, BASE_SPECIAL_CONTROL_RCA + SET_REBOOT, &[1]);
        assert_eq!(femc.stop, Some(Stop::Reboot));
    }

    #[test]
    fn test_pa_limits_esn_served_while_off() {
        let mut femc = crate::testing::booted_femc_with(|cfg| {
            cfg.cartridge[4].pa_limits_esn = [0xAB; 8];
        });
        let reply = special_monitor(&mut femc, GET_PA_LIMITS_ESN + 4);
        assert_eq!(reply.payload(), &[0xAB; 8]);
        // Cartridge 4 was never powered.
        assert!(!femc.fe.cartridge[4].is_powered());
    }

    #[test]
    fn test_unknown_special_monitor() {
        let mut femc = booted_femc();
        let reply = special_monitor(&mut femc, 0x800);
        assert_eq!(reply.status, Status::CanRange);
        assert_eq!(
            femc.errors.take_next(),
            Some(pack(ErrModule::Can, codes::can::SPECIAL_MONITOR_RANGE))
        );
    }
}
