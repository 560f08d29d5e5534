//! IF switch serial interface.
//!
//! The IF switch matrix selects the observed band, sets per-channel
//! attenuation, and carries a temperature servo per channel. Assembly
//! temperatures go through the shared ADC.

use femc_bus::{module_port, PortIo, Shift};
use femc_core::ring::ErrModule;
use femc_core::timer::{Clock, TimerId};

use super::{unipolar, AdcMap, SerialFail};
use crate::mainloop::Femc;

/// Module field of the IF switch in standard RCAs (port 21).
pub const MODULE: u8 = 11;

pub const CMD_WRITE_AREG: u16 = 0x00;
pub const CMD_WRITE_BREG: u16 = 0x01;
pub const CMD_BAND_SELECT: u16 = 0x02;
pub const CMD_ATTENUATION: u16 = 0x03;
pub const CMD_ADC_CONVERT: u16 = 0x08;
pub const CMD_ADC_READ: u16 = 0x09;
pub const CMD_PARALLEL_READ: u16 = 0x0A;

pub const AREG_SIZE: u16 = 4; // 3-bit point select + latch
pub const STATUS_SIZE: u16 = 4;
pub const STATUS_ADC_READY: u16 = 1 << 0;
pub const ADC_DATA_SIZE: u16 = 18;
pub const BAND_SELECT_SIZE: u16 = 4;
/// Attenuation word: channel in the high bits, 4-bit step count below.
pub const ATTENUATION_SIZE: u16 = 6;

/// Assembly temperature monitor point for one channel.
pub fn areg_assembly_temp(channel: u8) -> u16 {
    channel as u16
}

/// Temperature servo enable bits.
pub const BREG_SIZE: u16 = 5; // 4 servo bits + latch
pub fn breg_servo(channel: u8) -> u16 {
    1 << channel
}

pub const ASSEMBLY_TEMP_SCALE: f32 = 100.0; // C full scale

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
    timer: TimerId::IfAdcReady,
    err_module: ErrModule::IfSerial,
};

impl<P: PortIo, C: Clock> Femc<P, C> {
    pub(crate) fn if_read_assembly_temp(&mut self, channel: u8) -> Result<(), SerialFail> {
        let adc = self.adc_sample(module_port(MODULE), &ADC, areg_assembly_temp(channel))?;
        let temp = unipolar(adc, ASSEMBLY_TEMP_SCALE);
        self.fe.if_switch.channel[channel as usize]
            .assembly_temp
            .update(temp);
        Ok(())
    }

    pub(crate) fn if_set_band(&mut self, band: u8) -> Result<(), SerialFail> {
        self.reg_write(
            module_port(MODULE),
            CMD_BAND_SELECT,
            BAND_SELECT_SIZE,
            Shift::None,
            band as u64,
        )?;
        self.fe.if_switch.band = band;
        Ok(())
    }

    pub(crate) fn if_set_attenuation(&mut self, channel: u8, steps: u8) -> Result<(), SerialFail> {
        let word = (channel as u64) << 4 | steps as u64;
        self.reg_write(
            module_port(MODULE),
            CMD_ATTENUATION,
            ATTENUATION_SIZE,
            Shift::None,
            word,
        )?;
        self.fe.if_switch.channel[channel as usize].attenuation = steps;
        Ok(())
    }

    pub(crate) fn if_set_servo(&mut self, channel: u8, enable: bool) -> Result<(), SerialFail> {
        let mask = breg_servo(channel);
        let saved = self.fe.if_switch.breg;
        let breg = if enable { saved | mask } else { saved & !mask };
        self.fe.if_switch.breg = breg;
        let result = self.reg_write(
            module_port(MODULE),
            CMD_WRITE_BREG,
            BREG_SIZE,
            Shift::Left(1),
            breg as u64,
        );
        match result {
            Ok(()) => {
                self.fe.if_switch.channel[channel as usize].servo_enabled = enable;
                Ok(())
            }
            Err(e) => {
                self.fe.if_switch.breg = saved;
                Err(e)
            }
        }
    }
}
