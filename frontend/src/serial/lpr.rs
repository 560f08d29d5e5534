//! LO photonic receiver serial interface.
//!
//! The LPR carries two temperature sensors, the optical switch routing
//! the photonic reference to one band, and the EDFA with its pump laser
//! and photodetector. Moving the optical switch is slow: the busy bit is
//! polled with a generous timeout after a port or shutter command.

use femc_bus::{module_port, PortIo, Shift};
use femc_core::ring::{codes, ErrModule};
use femc_core::timer::{timeout, Clock, TimerId, TimerState};

use super::{dac_code, unipolar, AdcMap, SerialFail};
use crate::mainloop::Femc;

/// Module field of the LPR in standard RCAs (port 23).
pub const MODULE: u8 = 13;

pub const CMD_WRITE_AREG: u16 = 0x00;
pub const CMD_SWITCH_PORT: u16 = 0x02;
pub const CMD_SWITCH_SHUTTER: u16 = 0x03;
pub const CMD_MODULATION_DAC: u16 = 0x04;
pub const CMD_ADC_CONVERT: u16 = 0x08;
pub const CMD_ADC_READ: u16 = 0x09;
pub const CMD_PARALLEL_READ: u16 = 0x0A;

pub const AREG_SIZE: u16 = 4; // 3-bit point select + latch
pub const STATUS_SIZE: u16 = 4;
pub const STATUS_ADC_READY: u16 = 1 << 0;
pub const STATUS_SWITCH_READY: u16 = 1 << 1; // clear while the stroke is in flight
pub const STATUS_SWITCH_ERROR: u16 = 1 << 2;
pub const ADC_DATA_SIZE: u16 = 18;
pub const SWITCH_PORT_SIZE: u16 = 5; // port + shutter strobe bit
pub const MODULATION_DAC_SIZE: u16 = 16;

// AREG monitor points.
pub const AREG_TEMP0: u16 = 0x00;
pub const AREG_TEMP1: u16 = 0x01;
pub const AREG_LASER_PUMP_TEMP: u16 = 0x02;
pub const AREG_LASER_DRIVE_CURRENT: u16 = 0x03;
pub const AREG_LASER_PHOTO_DETECT_CURRENT: u16 = 0x04;
pub const AREG_PHOTO_DETECTOR_CURRENT: u16 = 0x05;
pub const AREG_PHOTO_DETECTOR_POWER: u16 = 0x06;

// Full-scale spans.
pub const TEMP_SCALE: f32 = 100.0; // C
pub const LASER_PUMP_TEMP_SCALE: f32 = 100.0; // C
pub const LASER_DRIVE_CURRENT_SCALE: f32 = 1000.0; // mA
pub const PHOTO_DETECT_CURRENT_SCALE: f32 = 10.0; // mA
pub const PHOTO_DETECT_POWER_SCALE: f32 = 10.0; // mW
pub const MODULATION_INPUT_SCALE: f32 = 5.0; // V

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
    timer: TimerId::LprAdcReady,
    err_module: ErrModule::LprSerial,
};

impl<P: PortIo, C: Clock> Femc<P, C> {
    pub(crate) fn lpr_analog_unipolar(
        &mut self,
        point: u16,
        full_scale: f32,
    ) -> Result<f32, SerialFail> {
        let adc = self.adc_sample(module_port(MODULE), &ADC, point)?;
        Ok(unipolar(adc, full_scale))
    }


    /// Refresh the optical switch busy/error mirror.
    pub(crate) fn lpr_read_status(&mut self) -> Result<u16, SerialFail> {
        let status =
            self.reg_read(module_port(MODULE), CMD_PARALLEL_READ, STATUS_SIZE, Shift::None)?;
        let status = status as u16;
        self.fe.lpr.optical_switch.busy = status & STATUS_SWITCH_READY == 0;
        self.fe.lpr.optical_switch.error = status & STATUS_SWITCH_ERROR != 0;
        Ok(status)
    }

    /// Drive the optical switch to a port and wait for the stroke to
    /// finish. A stuck switch reports a timeout fault.
    pub(crate) fn lpr_set_port(&mut self, port_select: u8) -> Result<(), SerialFail> {
        self.reg_write(
            module_port(MODULE),
            CMD_SWITCH_PORT,
            SWITCH_PORT_SIZE,
            Shift::None,
            port_select as u64,
        )?;
        self.lpr_wait_switch_ready()?;
        self.fe.lpr.optical_switch.port = port_select;
        Ok(())
    }

    /// Close (or force-close) the shutter.
    pub(crate) fn lpr_set_shutter(&mut self, closed: bool, force: bool) -> Result<(), SerialFail> {
        let word = (force as u64) << 1 | closed as u64;
        self.reg_write(
            module_port(MODULE),
            CMD_SWITCH_SHUTTER,
            2,
            Shift::None,
            word,
        )?;
        if !force {
            self.lpr_wait_switch_ready()?;
        }
        self.fe.lpr.optical_switch.shutter = closed;
        Ok(())
    }

    pub(crate) fn lpr_set_modulation(&mut self, value: f32) -> Result<(), SerialFail> {
        let code = dac_code(value, MODULATION_INPUT_SCALE);
        self.reg_write(
            module_port(MODULE),
            CMD_MODULATION_DAC,
            MODULATION_DAC_SIZE,
            Shift::None,
            code as u64,
        )?;
        self.fe.lpr.edfa.modulation_input = value;
        Ok(())
    }

    fn lpr_wait_switch_ready(&mut self) -> Result<(), SerialFail> {
        self.bus
            .timers
            .start(
                &self.bus.clock,
                TimerId::LprSwitchReady,
                timeout::LPR_SWITCH_READY_MS,
                true,
            )
            .ok();
        loop {
            let status = self.lpr_read_status()?;
            if status & STATUS_SWITCH_READY != 0 {
                self.bus.timers.stop(TimerId::LprSwitchReady);
                return Ok(());
            }
            if self.bus.timers.query(&self.bus.clock, TimerId::LprSwitchReady)
                == TimerState::Expired
            {
                self.errors
                    .store(ErrModule::OpticalSwitch, codes::optical_switch::SWITCH_TIMEOUT);
                return Err(SerialFail::Hardware);
            }
        }
    }
}
