//! FETIM serial interface.
//!
//! The thermal interlock module is mostly a read-back device: analog
//! channels for its sensors and a status word mirroring the shutdown
//! machinery. The firmware writes only the N2 fill request, the interlock
//! override, the glitch countdown enable and the one-bit FE status flag.

use femc_bus::{module_port, PortIo, Shift};
use femc_core::ring::ErrModule;
use femc_core::timer::{Clock, TimerId};

use super::{unipolar, AdcMap, SerialFail};
use crate::mainloop::Femc;

/// Module field of the FETIM in standard RCAs (port 24).
pub const MODULE: u8 = 14;

pub const CMD_WRITE_AREG: u16 = 0x00;
pub const CMD_WRITE_BREG: u16 = 0x01;
pub const CMD_ADC_CONVERT: u16 = 0x08;
pub const CMD_ADC_READ: u16 = 0x09;
pub const CMD_PARALLEL_READ: u16 = 0x0A;

pub const AREG_SIZE: u16 = 6; // 5-bit point select + latch
pub const ADC_DATA_SIZE: u16 = 18;

// Status word, 12 bits.
pub const STATUS_SIZE: u16 = 12;
pub const STATUS_ADC_READY: u16 = 1 << 0;
pub const STATUS_SINGLE_FAIL: u16 = 1 << 1;
pub const STATUS_MULTI_FAIL: u16 = 1 << 2;
pub const STATUS_TEMP_OUT_RNG: u16 = 1 << 3;
pub const STATUS_FLOW_OUT_RNG: u16 = 1 << 4;
pub const STATUS_DELAY_TRIG: u16 = 1 << 5;
pub const STATUS_SHUTDOWN_TRIG: u16 = 1 << 6;
pub const STATUS_GLITCH_COUNTDOWN: u16 = 1 << 7;
pub const STATUS_COMP_TEMP0_OUT_RNG: u16 = 1 << 8;
pub const STATUS_COMP_TEMP1_OUT_RNG: u16 = 1 << 9;
pub const STATUS_HE2_OUT_RNG: u16 = 1 << 10;

// Control register bits.
pub const BREG_SIZE: u16 = 5; // 4 state bits + latch
pub const BREG_N2_FILL: u16 = 1 << 0;
pub const BREG_FE_STATUS: u16 = 1 << 1;
pub const BREG_INTERLOCK_OVERRIDE: u16 = 1 << 2;
pub const BREG_GLITCH_COUNTDOWN: u16 = 1 << 3;

// AREG monitor points.
pub fn areg_interlock_temp(sensor: u8) -> u16 {
    sensor as u16
}
pub fn areg_interlock_flow(sensor: u8) -> u16 {
    0x08 + sensor as u16
}
pub fn areg_comp_temp(sensor: u8) -> u16 {
    0x10 + sensor as u16
}
pub const AREG_HE2_PRESSURE: u16 = 0x12;
pub const AREG_CABINET_TEMP: u16 = 0x13;
pub const AREG_GLITCH_VALUE: u16 = 0x14;

// Full-scale spans.
pub const INTERLOCK_TEMP_SCALE: f32 = 100.0; // C
pub const AIRFLOW_SCALE: f32 = 10.0; // arbitrary flow units
pub const COMP_TEMP_SCALE: f32 = 100.0; // C
pub const HE2_PRESSURE_SCALE: f32 = 30.0; // bar
pub const CABINET_TEMP_SCALE: f32 = 100.0; // C
pub const GLITCH_SCALE: f32 = 10.0; // counter value

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
    timer: TimerId::FetimAdcReady,
    err_module: ErrModule::FetimInterlock,
};

impl<P: PortIo, C: Clock> Femc<P, C> {
    pub(crate) fn fetim_analog_unipolar(
        &mut self,
        point: u16,
        full_scale: f32,
    ) -> Result<f32, SerialFail> {
        let adc = self.adc_sample(module_port(MODULE), &ADC, point)?;
        Ok(unipolar(adc, full_scale))
    }


    /// Read the status word and refresh the interlock mirrors.
    pub(crate) fn fetim_read_status(&mut self) -> Result<u16, SerialFail> {
        let status =
            self.reg_read(module_port(MODULE), CMD_PARALLEL_READ, STATUS_SIZE, Shift::None)?;
        let status = status as u16;
        let fetim = &mut self.fe.fetim;
        fetim.interlock.sensors.single_fail = status & STATUS_SINGLE_FAIL != 0;
        fetim.interlock.state.multi_fail = status & STATUS_MULTI_FAIL != 0;
        fetim.interlock.state.temp_out_of_range = status & STATUS_TEMP_OUT_RNG != 0;
        fetim.interlock.state.flow_out_of_range = status & STATUS_FLOW_OUT_RNG != 0;
        fetim.interlock.state.delay_triggered = status & STATUS_DELAY_TRIG != 0;
        fetim.interlock.state.shutdown_triggered = status & STATUS_SHUTDOWN_TRIG != 0;
        fetim.interlock.state.glitch.countdown_enabled = status & STATUS_GLITCH_COUNTDOWN != 0;
        fetim.compressor.temp[0].out_of_range = status & STATUS_COMP_TEMP0_OUT_RNG != 0;
        fetim.compressor.temp[1].out_of_range = status & STATUS_COMP_TEMP1_OUT_RNG != 0;
        fetim.compressor.he2.out_of_range = status & STATUS_HE2_OUT_RNG != 0;
        Ok(status)
    }

    /// Update bits of the FETIM control register with rollback.
    pub(crate) fn fetim_breg(&mut self, set: u16, mask: u16) -> Result<(), SerialFail> {
        let saved = self.fe.fetim.breg;
        let breg = (saved & !mask) | (set & mask);
        self.fe.fetim.breg = breg;
        let result = self.reg_write(
            module_port(MODULE),
            CMD_WRITE_BREG,
            BREG_SIZE,
            Shift::Left(1),
            breg as u64,
        );
        if result.is_err() {
            self.fe.fetim.breg = saved;
        }
        result
    }
}
