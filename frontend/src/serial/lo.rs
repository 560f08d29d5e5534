//! LO module serial interface.
//!
//! The LO board carries the YTO coarse tuning word, the PLL read-backs
//! and mode bits, the AMC and PA bias stages, and the photomixer.

use femc_bus::{cartridge_port, CartSubsystem, PortIo, Shift};
use femc_core::ring::ErrModule;
use femc_core::timer::{Clock, TimerId};

use super::{bipolar, dac_code, unipolar, AdcMap, SerialFail};
use crate::mainloop::Femc;

// Command words.
pub const CMD_WRITE_AREG: u16 = 0x00;
pub const CMD_WRITE_BREG: u16 = 0x01;
pub const CMD_YTO_COARSE_TUNE: u16 = 0x02;
pub const CMD_ADC_CONVERT: u16 = 0x08;
pub const CMD_ADC_READ: u16 = 0x09;
pub const CMD_PARALLEL_READ: u16 = 0x0A;
pub const CMD_DAC_AMC: u16 = 0x10;
pub const CMD_DAC_PA: u16 = 0x11;

pub const AREG_SIZE: u16 = 9; // 8-bit point select + latch
pub const STATUS_SIZE: u16 = 6;
pub const STATUS_ADC_READY: u16 = 1 << 0;
/// PLL unlock-detect latch bit in the status register.
pub const STATUS_UNLOCK_LATCH: u16 = 1 << 1;
pub const ADC_DATA_SIZE: u16 = 18;

/// YTO coarse tune word is 12 bits.
pub const YTO_TUNE_SIZE: u16 = 12;
pub const YTO_TUNE_MAX: u16 = 0x0FFF;

// AREG monitor points.
pub const AREG_PMX_VOLTAGE: u16 = 0x00;
pub const AREG_PMX_CURRENT: u16 = 0x01;
pub const AREG_PLL_LOCK_VOLTAGE: u16 = 0x02;
pub const AREG_PLL_CORRECTION: u16 = 0x03;
pub const AREG_PLL_ASSEMBLY_TEMP: u16 = 0x04;
pub const AREG_PLL_YIG_HEATER_CURRENT: u16 = 0x05;
pub const AREG_PLL_REF_POWER: u16 = 0x06;
pub const AREG_PLL_IF_POWER: u16 = 0x07;
pub const AREG_AMC_GATE_A: u16 = 0x08;
pub const AREG_AMC_DRAIN_A: u16 = 0x09;
pub const AREG_AMC_GATE_B: u16 = 0x0A;
pub const AREG_AMC_DRAIN_B: u16 = 0x0B;
pub const AREG_AMC_GATE_E: u16 = 0x0C;
pub const AREG_AMC_DRAIN_E: u16 = 0x0D;
pub const AREG_AMC_MULT_CURRENT: u16 = 0x0E;
pub const AREG_AMC_SUPPLY_5V: u16 = 0x0F;
pub fn areg_pa_channel(channel: u8, point: u16) -> u16 {
    0x10 + (channel as u16) * 3 + point
}
pub const PA_POINT_GATE: u16 = 0;
pub const PA_POINT_DRAIN: u16 = 1;
pub const PA_POINT_CURRENT: u16 = 2;
pub const AREG_PA_SUPPLY_3V: u16 = 0x16;
pub const AREG_PA_SUPPLY_5V: u16 = 0x17;
/// Cartridge temperature sensors ride on the LO board.
pub fn areg_cart_temp(sensor: u8) -> u16 {
    0x18 + sensor as u16
}

// Board state register bits.
pub const BREG_SIZE: u16 = 6; // 5 state bits + latch
pub const BREG_PMX_ENABLE: u16 = 1 << 0;
pub const BREG_CLEAR_UNLOCK_LATCH: u16 = 1 << 1;
pub const BREG_LOOP_BANDWIDTH: u16 = 1 << 2;
pub const BREG_SIDEBAND_LOCK: u16 = 1 << 3;
pub const BREG_NULL_INTEGRATOR: u16 = 1 << 4;

// Full-scale spans.
pub const PMX_VOLTAGE_SCALE: f32 = 5.0; // V
pub const PMX_CURRENT_SCALE: f32 = 10.0; // mA
pub const PLL_VOLTAGE_SCALE: f32 = 10.0; // V
pub const PLL_TEMP_SCALE: f32 = 100.0; // C
pub const PLL_CURRENT_SCALE: f32 = 500.0; // mA
pub const PLL_POWER_SCALE: f32 = 10.0; // V (detector)
pub const AMC_VOLTAGE_SCALE: f32 = 10.0; // V
pub const AMC_CURRENT_SCALE: f32 = 100.0; // mA
pub const PA_VOLTAGE_SCALE: f32 = 10.0; // V
pub const PA_CURRENT_SCALE: f32 = 1000.0; // mA
pub const SUPPLY_VOLTAGE_SCALE: f32 = 10.0; // V
pub const CART_TEMP_SCALE: f32 = 300.0; // K, diode sensors

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
    timer: TimerId::LoAdcReady,
    err_module: ErrModule::LoSerial,
};

#[inline]
fn port(cartridge: u8) -> u16 {
    cartridge_port(cartridge, CartSubsystem::Lo)
}

impl<P: PortIo, C: Clock> Femc<P, C> {
    /// Bipolar analog monitor on the LO board.
    pub(crate) fn lo_analog(
        &mut self,
        cartridge: u8,
        point: u16,
        full_scale: f32,
    ) -> Result<f32, SerialFail> {
        let adc = self.adc_sample(port(cartridge), &ADC, point)?;
        Ok(bipolar(adc, full_scale))
    }

    /// Unipolar analog monitor (cartridge temperature sensors).
    pub(crate) fn lo_analog_unipolar(
        &mut self,
        cartridge: u8,
        point: u16,
        full_scale: f32,
    ) -> Result<f32, SerialFail> {
        let adc = self.adc_sample(port(cartridge), &ADC, point)?;
        Ok(unipolar(adc, full_scale))
    }

    /// Read the status register; refreshes the PLL unlock latch mirror.
    pub(crate) fn lo_read_status(&mut self, cartridge: u8) -> Result<u16, SerialFail> {
        let status = self.reg_read(port(cartridge), CMD_PARALLEL_READ, STATUS_SIZE, Shift::None)?;
        let status = status as u16;
        self.fe.cartridge[cartridge as usize].lo.pll.unlock_latched =
            status & STATUS_UNLOCK_LATCH != 0;
        Ok(status)
    }

    /// Program the YTO coarse tune word.
    pub(crate) fn lo_set_yto(&mut self, cartridge: u8, tune: u16) -> Result<(), SerialFail> {
        self.reg_write(
            port(cartridge),
            CMD_YTO_COARSE_TUNE,
            YTO_TUNE_SIZE,
            Shift::None,
            tune as u64,
        )?;
        self.fe.cartridge[cartridge as usize].lo.yto.coarse_tune = tune;
        Ok(())
    }

    /// Program one of the AMC/PA DAC streams. The data word carries the
    /// point select ahead of the 16-bit code.
    pub(crate) fn lo_dac(
        &mut self,
        cartridge: u8,
        command: u16,
        select: u16,
        value: f32,
        full_scale: f32,
    ) -> Result<(), SerialFail> {
        let code = dac_code(value, full_scale);
        let word = (select as u64) << 16 | code as u64;
        self.reg_write(port(cartridge), command, 20, Shift::None, word)
    }

    /// Update bits of the LO board state register with rollback.
    pub(crate) fn lo_breg(&mut self, cartridge: u8, set: u16, mask: u16) -> Result<(), SerialFail> {
        let saved = self.fe.cartridge[cartridge as usize].lo_breg;
        let breg = (saved & !mask) | (set & mask);
        self.fe.cartridge[cartridge as usize].lo_breg = breg;
        let result = self.reg_write(
            port(cartridge),
            CMD_WRITE_BREG,
            BREG_SIZE,
            Shift::Left(1),
            breg as u64,
        );
        if result.is_err() {
            self.fe.cartridge[cartridge as usize].lo_breg = saved;
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pa_points() {
        assert_eq!(areg_pa_channel(0, PA_POINT_GATE), 0x10);
        assert_eq!(areg_pa_channel(1, PA_POINT_CURRENT), 0x15);
        // PA channel codes stop short of the supply points
        assert!(areg_pa_channel(1, PA_POINT_CURRENT) < AREG_PA_SUPPLY_3V);
    }
}
