//! Power distribution serial interface.
//!
//! One board switches and monitors the ten cartridge supplies. Channel
//! voltages and currents go through the shared ADC; the per-module enable
//! states live in a write-only state register, two bits per module.

use femc_bus::{module_port, PortIo, Shift};
use femc_core::ring::ErrModule;
use femc_core::timer::{Clock, TimerId};

use super::{bipolar, AdcMap, SerialFail};
use crate::mainloop::Femc;
use crate::state::power::PdEnable;

/// Module field of the power distribution in standard RCAs (port 20).
pub const MODULE: u8 = 10;

pub const CMD_WRITE_AREG: u16 = 0x00;
pub const CMD_WRITE_BREG: u16 = 0x01;
pub const CMD_ADC_CONVERT: u16 = 0x08;
pub const CMD_ADC_READ: u16 = 0x09;
pub const CMD_PARALLEL_READ: u16 = 0x0A;

pub const AREG_SIZE: u16 = 8; // 7-bit point select + latch
pub const STATUS_SIZE: u16 = 4;
pub const STATUS_ADC_READY: u16 = 1 << 0;
pub const ADC_DATA_SIZE: u16 = 18;

/// Monitor point: module 0-9, channel 0-5, voltage or current.
pub fn areg_channel(module: u8, channel: u8, current: bool) -> u16 {
    (module as u16) << 3 | (channel as u16) << 1 | current as u16
}

/// Enable register: two bits per module (00 off, 01 on, 10 standby2).
pub const BREG_SIZE: u16 = 21; // 20 state bits + latch
pub fn breg_enable(module: u8, enable: PdEnable) -> (u32, u32) {
    let shift = 2 * module as u32;
    ((enable as u32) << shift, 0b11 << shift)
}

/// Nominal channel voltages, in channel order.
pub const CHANNEL_VOLTAGE: [f32; 6] = [6.0, -6.0, 15.0, -15.0, 8.0, 24.0];

pub const VOLTAGE_SCALE: f32 = 30.0; // V full scale
pub const CURRENT_SCALE: f32 = 10.0; // A full scale

const ADC: AdcMap = AdcMap {
    areg_cmd: CMD_WRITE_AREG,
    areg_size: AREG_SIZE,
    areg_shift: Shift::Left(1),
    strobe_cmd: CMD_ADC_CONVERT,
    strobe_size: 3,
    status_cmd: CMD_PARALLEL_READ,
    status_size: STATUS_SIZE,
    ready_mask: STATUS_ADC_READY as u64,
    data_cmd: CMD_ADC_READ,
    data_size: ADC_DATA_SIZE,
    timer: TimerId::PdAdcReady,
    err_module: ErrModule::PdSerial,
};

impl<P: PortIo, C: Clock> Femc<P, C> {
    pub(crate) fn pd_analog(&mut self, point: u16, full_scale: f32) -> Result<f32, SerialFail> {
        let adc = self.adc_sample(module_port(MODULE), &ADC, point)?;
        Ok(bipolar(adc, full_scale))
    }

    /// Program one module's enable state with rollback of the cached
    /// register on failure.
    pub(crate) fn pd_set_enable(
        &mut self,
        module: u8,
        enable: PdEnable,
    ) -> Result<(), SerialFail> {
        let (set, mask) = breg_enable(module, enable);
        let saved = self.fe.power.breg;
        let breg = (saved & !mask) | set;
        self.fe.power.breg = breg;
        let result = self.reg_write(
            module_port(MODULE),
            CMD_WRITE_BREG,
            BREG_SIZE,
            Shift::Left(1),
            breg as u64,
        );
        match result {
            Ok(()) => {
                self.fe.power.module[module as usize].enable = enable;
                Ok(())
            }
            Err(e) => {
                self.fe.power.breg = saved;
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_codes() {
        assert_eq!(areg_channel(0, 0, false), 0);
        assert_eq!(areg_channel(0, 0, true), 1);
        assert_eq!(areg_channel(9, 5, true), 0b1001_101_1);
    }

    #[test]
    fn test_enable_field() {
        let (set, mask) = breg_enable(3, PdEnable::Standby2);
        assert_eq!(mask, 0b11 << 6);
        assert_eq!(set, 0b10 << 6);
    }
}
