//! Per-subsystem serial interfaces.
//!
//! Every subsystem board follows the same register pattern over the
//! multiplexed serial bus: an AREG selecting the analog monitor point, a
//! BREG (or DAC registers) carrying commanded state, a read-back status
//! register with the ADC-ready bit, and the ADC itself. The shared
//! machinery lives here; the per-subsystem files carry the register maps,
//! point codes and scalings.

pub mod bias;
pub mod cryo;
pub mod fetim;
pub mod ifsw;
pub mod lo;
pub mod lpr;
pub mod pd;

use femc_bus::{AccessError, MuxError, PortIo, Shift};
use femc_core::ring::{codes, ErrModule, ErrorRing};
use femc_core::timer::{timeout, Clock, TimerId, TimerState};

use crate::mainloop::Femc;

/// Failure of a serial monitor or control operation, as seen by a device
/// handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerialFail {
    /// Bus or device communication failed.
    Hardware,
    /// The analog channel is still settling; the caller should answer
    /// HardwRetry.
    Retry,
    /// The readback could not be scaled to a physical value.
    Conversion,
}

/// Record a bus-layer failure in the error ring.
pub(crate) fn mux_fault(errors: &mut ErrorRing, err: &AccessError) {
    match err {
        AccessError::Mux(MuxError::DataLengthOutOfRange(_)) => {
            errors.store(ErrModule::SerialMux, codes::serial_mux::DATA_LENGTH)
        }
        AccessError::Mux(MuxError::BusyTimeout) => {
            errors.store(ErrModule::SerialMux, codes::serial_mux::BUSY_TIMEOUT)
        }
        AccessError::Mux(MuxError::NotReady) => {
            errors.store(ErrModule::SerialMux, codes::serial_mux::NOT_READY)
        }
        AccessError::CommandRange(_) => errors.store(
            ErrModule::SerialInterface,
            codes::serial_interface::COMMAND_RANGE,
        ),
    }
}

/// ADC access description for one subsystem board.
pub(crate) struct AdcMap {
    /// AREG write command and geometry.
    pub areg_cmd: u16,
    pub areg_size: u16,
    pub areg_shift: Shift,
    /// Conversion strobe command and width.
    pub strobe_cmd: u16,
    pub strobe_size: u16,
    /// Status register read command, width, and the ready bit.
    pub status_cmd: u16,
    pub status_size: u16,
    pub ready_mask: u64,
    /// ADC data read command and width (data is in the low 16 bits).
    pub data_cmd: u16,
    pub data_size: u16,
    /// Ready-poll timer and the module blamed for timeouts.
    pub timer: TimerId,
    pub err_module: ErrModule,
}

/// Full ADC range and input voltage span shared by the subsystem boards.
pub const ADC_RANGE: f32 = 65536.0;
pub const ADC_VOLTAGE_SCALE: f32 = 10.0;

/// Scale a raw ADC word to the 0-10 V input voltage.
#[inline]
pub fn adc_to_vin(adc: u16) -> f32 {
    ADC_VOLTAGE_SCALE * adc as f32 / ADC_RANGE
}

/// Bipolar readback: mid-scale is zero, `full_scale` at the rails.
#[inline]
pub fn bipolar(adc: u16, full_scale: f32) -> f32 {
    full_scale * (adc as f32 - 32768.0) / 32768.0
}

/// Unipolar readback: zero to `full_scale`.
#[inline]
pub fn unipolar(adc: u16, full_scale: f32) -> f32 {
    full_scale * adc as f32 / ADC_RANGE
}

/// 16-bit bipolar DAC code for a commanded value, clamped to the rails.
pub fn dac_code(value: f32, full_scale: f32) -> u16 {
    let code = (value / full_scale) * 32768.0 + 32768.0;
    code.clamp(0.0, 65535.0) as u16
}

impl<P: PortIo, C: Clock> Femc<P, C> {
    /// One complete analog acquisition: select the monitor point, strobe a
    /// conversion, poll ready, read the data word.
    pub(crate) fn adc_sample(
        &mut self,
        port: u16,
        map: &AdcMap,
        point: u16,
    ) -> Result<u16, SerialFail> {
        // Select the monitor point.
        self.reg_write(port, map.areg_cmd, map.areg_size, map.areg_shift, point as u64)?;
        // Start the conversion.
        self.reg_write(port, map.strobe_cmd, map.strobe_size, Shift::None, 0)?;

        // Poll the ready bit, bounded by the subsystem's ADC timer.
        self.bus
            .timers
            .start(&self.bus.clock, map.timer, timeout::ADC_READY_MS, true)
            .ok();
        loop {
            let status = self.reg_read(port, map.status_cmd, map.status_size, Shift::None)?;
            if status & map.ready_mask != 0 {
                self.bus.timers.stop(map.timer);
                break;
            }
            if self.bus.timers.query(&self.bus.clock, map.timer) == TimerState::Expired {
                self.errors.store(map.err_module, codes::adc::READY_TIMEOUT);
                return Err(SerialFail::Hardware);
            }
        }

        // The data word is 18 bits on the bus; the top two are padding.
        let raw = self.reg_read(port, map.data_cmd, map.data_size, Shift::None)?;
        Ok(raw as u16)
    }

    /// Register write with bus faults routed into the error ring.
    pub(crate) fn reg_write(
        &mut self,
        port: u16,
        command: u16,
        size_bits: u16,
        shift: Shift,
        value: u64,
    ) -> Result<(), SerialFail> {
        self.bus
            .reg_write(port, command, size_bits, shift, value)
            .map_err(|e| {
                mux_fault(&mut self.errors, &e);
                SerialFail::Hardware
            })
    }

    /// Register read with bus faults routed into the error ring.
    pub(crate) fn reg_read(
        &mut self,
        port: u16,
        command: u16,
        size_bits: u16,
        shift: Shift,
    ) -> Result<u64, SerialFail> {
        self.bus
            .reg_read(port, command, size_bits, shift)
            .map_err(|e| {
                mux_fault(&mut self.errors, &e);
                SerialFail::Hardware
            })
    }
}
