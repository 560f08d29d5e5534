//! Bias module serial interface.
//!
//! One bias board per cartridge serves both polarizations: SIS mixer and
//! magnet bias, the LNA stages, the SIS heaters and the LNA LEDs. Monitor
//! points go through the shared AREG/ADC machinery; setpoints go to the
//! DAC stream commands; the enables live in one board-wide state register.

use femc_bus::{cartridge_port, CartSubsystem, PortIo, Shift};
use femc_core::ring::ErrModule;
use femc_core::timer::{Clock, TimerId};

use super::{bipolar, dac_code, AdcMap, SerialFail};
use crate::mainloop::Femc;

// Command words.
pub const CMD_WRITE_AREG: u16 = 0x00;
pub const CMD_WRITE_BREG: u16 = 0x01;
pub const CMD_ADC_CONVERT: u16 = 0x08;
pub const CMD_ADC_READ: u16 = 0x09;
pub const CMD_PARALLEL_READ: u16 = 0x0A;
pub const CMD_DAC_SIS_VOLTAGE: u16 = 0x10;
pub const CMD_DAC_MAGNET_CURRENT: u16 = 0x11;
pub const CMD_DAC_LNA_DRAIN_VOLTAGE: u16 = 0x12;
pub const CMD_DAC_LNA_DRAIN_CURRENT: u16 = 0x13;

// AREG: 10-bit monitor point select + 1 latch bit.
pub const AREG_SIZE: u16 = 11;
pub const STATUS_SIZE: u16 = 4;
pub const STATUS_ADC_READY: u16 = 1 << 0;
pub const ADC_DATA_SIZE: u16 = 18;

/// AREG monitor point codes. Bit 9 selects the polarization.
pub fn areg_sis(pol: u8, sb: u8, point: u16) -> u16 {
    (pol as u16) << 9 | (sb as u16) << 4 | point
}
pub fn areg_magnet(pol: u8, sb: u8, point: u16) -> u16 {
    (pol as u16) << 9 | 0x040 | (sb as u16) << 4 | point
}
pub fn areg_heater_current(pol: u8) -> u16 {
    (pol as u16) << 9 | 0x080
}
pub fn areg_lna(pol: u8, sb: u8, stage: u8, point: u16) -> u16 {
    (pol as u16) << 9 | 0x100 | (sb as u16) << 5 | (stage as u16) << 2 | point
}
pub const POINT_VOLTAGE: u16 = 0;
pub const POINT_CURRENT: u16 = 1;
pub const POINT_GATE: u16 = 2;

// Board state register: enables and mode bits for both polarizations.
pub const BREG_SIZE: u16 = 13; // 12 state bits + latch
pub fn breg_lna_enable(pol: u8, sb: u8) -> u16 {
    1 << (pol * 2 + sb)
}
pub fn breg_lna_led(pol: u8) -> u16 {
    1 << (4 + pol)
}
pub fn breg_sis_heater(pol: u8) -> u16 {
    1 << (6 + pol)
}
pub fn breg_sis_open_loop(pol: u8, sb: u8) -> u16 {
    1 << (8 + pol * 2 + sb)
}

// Full-scale readback/setpoint spans.
pub const SIS_VOLTAGE_SCALE: f32 = 20.0; // mV
pub const SIS_CURRENT_SCALE: f32 = 100.0; // uA
pub const MAGNET_VOLTAGE_SCALE: f32 = 10.0; // V
pub const MAGNET_CURRENT_SCALE: f32 = 125.0; // mA
pub const LNA_DRAIN_VOLTAGE_SCALE: f32 = 5.0; // V
pub const LNA_DRAIN_CURRENT_SCALE: f32 = 50.0; // mA
pub const LNA_GATE_VOLTAGE_SCALE: f32 = 5.0; // V
pub const HEATER_CURRENT_SCALE: f32 = 250.0; // mA

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
    timer: TimerId::BiasAdcReady,
    err_module: ErrModule::BiasSerial,
};

#[inline]
fn port(cartridge: u8) -> u16 {
    cartridge_port(cartridge, CartSubsystem::Bias)
}

impl<P: PortIo, C: Clock> Femc<P, C> {
    /// Bipolar analog monitor on the bias board.
    pub(crate) fn bias_analog(
        &mut self,
        cartridge: u8,
        point: u16,
        full_scale: f32,
    ) -> Result<f32, SerialFail> {
        let adc = self.adc_sample(port(cartridge), &ADC, point)?;
        Ok(bipolar(adc, full_scale))
    }

    /// Program one of the bias DAC streams. The data word carries the
    /// target (polarization, sideband, stage) ahead of the 16-bit code.
    pub(crate) fn bias_dac(
        &mut self,
        cartridge: u8,
        command: u16,
        pol: u8,
        sb: u8,
        stage: u8,
        value: f32,
        full_scale: f32,
    ) -> Result<(), SerialFail> {
        let code = dac_code(value, full_scale);
        let word = (pol as u64) << 20 | (sb as u64) << 19 | (stage as u64) << 16 | code as u64;
        self.reg_write(port(cartridge), command, 21, Shift::None, word)
    }

    /// Update bits of the bias board state register, rolling the cached
    /// copy back if the write fails.
    pub(crate) fn bias_breg(
        &mut self,
        cartridge: u8,
        set: u16,
        mask: u16,
    ) -> Result<(), SerialFail> {
        let saved = self.fe.cartridge[cartridge as usize].bias_breg;
        let breg = (saved & !mask) | (set & mask);
        self.fe.cartridge[cartridge as usize].bias_breg = breg;
        let result = self.reg_write(
            port(cartridge),
            CMD_WRITE_BREG,
            BREG_SIZE,
            Shift::Left(1),
            breg as u64,
        );
        if result.is_err() {
            self.fe.cartridge[cartridge as usize].bias_breg = saved;
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_areg_codes_are_disjoint() {
        let mut seen = std::collections::HashSet::new();
        for pol in 0..2 {
            for sb in 0..2 {
                for point in [POINT_VOLTAGE, POINT_CURRENT] {
                    assert!(seen.insert(areg_sis(pol, sb, point)));
                    assert!(seen.insert(areg_magnet(pol, sb, point)));
                }
                for stage in 0..6 {
                    for point in [POINT_VOLTAGE, POINT_CURRENT, POINT_GATE] {
                        assert!(seen.insert(areg_lna(pol, sb, stage, point)));
                    }
                }
            }
            assert!(seen.insert(areg_heater_current(pol)));
        }
    }

    #[test]
    fn test_breg_bits_are_disjoint() {
        let mut all = 0u16;
        for pol in 0..2 {
            for sb in 0..2 {
                for bit in [breg_lna_enable(pol, sb), breg_sis_open_loop(pol, sb)] {
                    assert_eq!(all & bit, 0);
                    all |= bit;
                }
            }
            for bit in [breg_lna_led(pol), breg_sis_heater(pol)] {
                assert_eq!(all & bit, 0);
                all |= bit;
            }
        }
    }
}
