//! Cryostat M&C board serial interface.
//!
//! The board multiplexes one ADC across the 13 dewar temperature sensors,
//! the two vacuum sensors and the 230 V supply current. The ADC circuitry
//! lags when the analog channel changes: the first readouts after a switch
//! are discarded by answering HardwRetry until the settling counter
//! drains.

use femc_bus::{module_port, PortIo, Shift};
use femc_core::ring::ErrModule;
use femc_core::timer::{Clock, TimerId};

use super::{adc_to_vin, AdcMap, SerialFail};
use crate::mainloop::Femc;
use crate::state::cryostat::{CryoTempSensor, ValvePosition};

/// Module field of the cryostat in standard RCAs (serial port 22).
pub const MODULE: u8 = 12;

// Command words.
pub const CMD_WRITE_AREG: u16 = 0x00;
pub const CMD_WRITE_BREG: u16 = 0x01;
pub const CMD_ADC_CONVERT: u16 = 0x08;
pub const CMD_ADC_READ: u16 = 0x09;
pub const CMD_PARALLEL_READ: u16 = 0x0A;

// AREG: 11-bit monitor point select + 1 latch bit, left-aligned.
pub const AREG_SIZE: u16 = 12;
/// AREG addresses of the temperature sensors, in sensor order.
pub const AREG_TEMPERATURE: [u16; 13] = [
    0x0000, // 4K cryocooler (TVO)
    0x0004, // 4K plate near link 1 (TVO)
    0x0005, // 4K plate near link 2 (TVO)
    0x0008, // 4K plate far side 1 (TVO)
    0x000A, // 4K plate far side 2 (TVO)
    0x000C, // 12K cryocooler (TVO)
    0x0010, // 12K plate near link (TVO)
    0x0014, // 12K plate far side (TVO)
    0x0018, // 12K shield top (TVO)
    0x0100, // 90K cryocooler (PRT)
    0x0120, // 90K plate near link (PRT)
    0x0140, // 90K plate far side (PRT)
    0x0160, // 90K shield top (PRT)
];
pub fn areg_pressure(sensor: u16) -> u16 {
    0x100 * sensor + 0x200
}
pub const AREG_SUPPLY_CURRENT: u16 = 0x400;

// BREG: 5-bit relay state + 1 latch bit, left-aligned. Written as a whole.
pub const BREG_SIZE: u16 = 6;
pub const BREG_VACUUM_CONTROLLER: u16 = 1 << 0; // hardware logic inverted
pub const BREG_TURBO_PUMP: u16 = 1 << 1;
pub const BREG_BACKING_PUMP: u16 = 1 << 2;
pub const BREG_SOLENOID_VALVE: u16 = 1 << 3;
pub const BREG_GATE_VALVE: u16 = 1 << 4;

// Status register, 10 bits.
pub const STATUS_SIZE: u16 = 10;
pub const STATUS_VACUUM_OK: u16 = 1 << 0; // hardware logic inverted: 1 = OK
pub const STATUS_TURBO_ERROR: u16 = 1 << 1;
pub const STATUS_TURBO_SPEED_OK: u16 = 1 << 2;
pub const STATUS_GATE_SHIFT: u16 = 3;
pub const STATUS_GATE_MASK: u16 = 0xF;
pub const STATUS_SOLENOID_SHIFT: u16 = 7;
pub const STATUS_SOLENOID_MASK: u16 = 0x3;
pub const STATUS_ADC_READY: u16 = 1 << 9;

// Valve position sensor patterns.
pub const GATE_SENSORS_UNKNOWN: u16 = 0x0;
pub const GATE_SENSORS_OPEN: u16 = 0x5;
pub const GATE_SENSORS_CLOSE: u16 = 0xA;
pub const SOLENOID_SENSORS_UNKNOWN: u16 = 0x0;
pub const SOLENOID_SENSORS_OPEN: u16 = 0x1;
pub const SOLENOID_SENSORS_CLOSE: u16 = 0x2;

// ADC geometry.
pub const ADC_DATA_SIZE: u16 = 18; // 2 padding bits + 16 data bits

/// Discarded readouts after an analog channel switch.
pub const ANALOG_READOUTS: u8 = 10;

// Scalings.
pub const SUPPLY_CURRENT_SCALE: f32 = 1.488645855;
pub const TVO_GAIN: f32 = 454.545454;
pub const TVO_RESISTOR_SCALE: f32 = 1000.0;
pub const PRT_GAIN: f32 = 125.0;
/// PRT interpolation knee: curve A above 124 Ω (~60 K), curve B below.
pub const PRT_KNEE: f32 = 124.0;
pub const PRT_A_SCALE: f32 = 124.0;
pub const PRT_A: [f32; 7] = [
    0.513971,
    276.222931,
    -1038.573479,
    2460.959311,
    -3243.304766,
    2211.327698,
    -607.247388,
];
pub const PRT_B_SCALE: f32 = 1000.0;
pub const PRT_B: [f32; 7] = [
    28.486734,
    278.396620,
    -260.205006,
    687.754698,
    -891.652830,
    583.158140,
    -152.808821,
];
/// Pressure scalings: `p = 10^((vin + offset) / scale)`.
pub const CRYO_PRESS_OFFSET: f32 = -7.75;
pub const CRYO_PRESS_SCALE: f32 = 0.75;
pub const VAC_PORT_PRESS_OFFSET: f32 = -6.143;
pub const VAC_PORT_PRESS_SCALE: f32 = 1.286;

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
    timer: TimerId::CryoAdcReady,
    err_module: ErrModule::CryoSerial,
};

/// Evaluate a degree-6 polynomial, lowest coefficient first.
fn poly6(coeff: &[f32; 7], x: f32) -> f32 {
    coeff.iter().rev().fold(0.0, |acc, c| acc * x + c)
}

/// TVO sensor: resistance from the readout voltage, then the per-sensor
/// calibration polynomial.
pub fn tvo_temperature(coeff: &[f32; 7], vin: f32) -> Option<f32> {
    let readout = TVO_GAIN * vin;
    if readout <= 0.0 {
        return None;
    }
    let resistance = TVO_RESISTOR_SCALE / readout;
    let temp = poly6(coeff, resistance);
    temp.is_finite().then_some(temp)
}

/// PRT sensor: two fixed interpolation branches around the 124 Ω knee.
pub fn prt_temperature(vin: f32) -> Option<f32> {
    let resistance = PRT_GAIN * vin;
    let temp = if resistance >= PRT_KNEE {
        poly6(&PRT_B, resistance / PRT_B_SCALE)
    } else {
        poly6(&PRT_A, resistance / PRT_A_SCALE)
    };
    temp.is_finite().then_some(temp)
}

/// Vacuum sensor: log-scale pressure.
pub fn pressure(vin: f32, offset: f32, scale: f32) -> Option<f32> {
    let p = 10f32.powf((vin + offset) / scale);
    p.is_finite().then_some(p)
}

impl<P: PortIo, C: Clock> Femc<P, C> {
    /// Analog acquisition with the settling workaround: a channel switch
    /// reloads the readout counter, and while it drains every value is
    /// reported as HardwRetry (the readback is stored regardless).
    fn cryo_analog(&mut self, point: u16) -> Result<u16, SerialFail> {
        let regs = &mut self.fe.cryostat.regs;
        if regs.last_channel != Some(point) {
            regs.last_channel = Some(point);
            regs.readouts_left = ANALOG_READOUTS;
        }
        let adc = self.adc_sample(module_port(MODULE), &ADC, point)?;
        let regs = &mut self.fe.cryostat.regs;
        regs.areg = point;
        regs.adc = adc;
        Ok(adc)
    }

    /// Consume one settling readout. Call after storing the readback.
    fn cryo_settling(&mut self) -> Result<(), SerialFail> {
        let regs = &mut self.fe.cryostat.regs;
        if regs.readouts_left > 0 {
            regs.readouts_left -= 1;
            return Err(SerialFail::Retry);
        }
        Ok(())
    }

    /// Read one dewar temperature sensor into the tree.
    pub(crate) fn cryo_read_temp(&mut self, sensor: usize) -> Result<(), SerialFail> {
        let adc = self.cryo_analog(AREG_TEMPERATURE[sensor])?;
        let vin = adc_to_vin(adc);
        let temp = if CryoTempSensor::is_tvo(sensor) {
            tvo_temperature(&self.fe.cryostat.temp[sensor].coeff, vin)
        } else {
            prt_temperature(vin)
        };
        match temp {
            Some(t) => {
                self.fe.cryostat.temp[sensor].temp.update(t);
            }
            None => {
                self.fe.cryostat.temp[sensor].temp.invalidate();
                return Err(SerialFail::Conversion);
            }
        }
        self.cryo_settling()
    }

    /// Read one vacuum sensor into the tree.
    pub(crate) fn cryo_read_pressure(&mut self, sensor: usize) -> Result<(), SerialFail> {
        let adc = self.cryo_analog(areg_pressure(sensor as u16))?;
        let vin = adc_to_vin(adc);
        let p = if sensor == 0 {
            pressure(vin, CRYO_PRESS_OFFSET, CRYO_PRESS_SCALE)
        } else {
            pressure(vin, VAC_PORT_PRESS_OFFSET, VAC_PORT_PRESS_SCALE)
        };
        match p {
            Some(p) => {
                self.fe.cryostat.vacuum.sensor[sensor].pressure.update(p);
            }
            None => {
                self.fe.cryostat.vacuum.sensor[sensor].pressure.invalidate();
                return Err(SerialFail::Conversion);
            }
        }
        self.cryo_settling()
    }

    /// Read the 230 V supply current into the tree.
    pub(crate) fn cryo_read_supply_current(&mut self) -> Result<(), SerialFail> {
        let adc = self.cryo_analog(AREG_SUPPLY_CURRENT)?;
        let vin = adc_to_vin(adc);
        self.fe
            .cryostat
            .supply_current
            .update(SUPPLY_CURRENT_SCALE * vin);
        self.cryo_settling()
    }

    /// Read the status register and refresh the valve/pump read-backs.
    pub(crate) fn cryo_read_status(&mut self) -> Result<(), SerialFail> {
        let status = self.reg_read(
            module_port(MODULE),
            CMD_PARALLEL_READ,
            STATUS_SIZE,
            Shift::None,
        )? as u16;

        let cryo = &mut self.fe.cryostat;
        cryo.regs.status = status;
        cryo.vacuum.error = status & STATUS_VACUUM_OK == 0;
        cryo.turbo_pump.error = status & STATUS_TURBO_ERROR != 0;
        cryo.turbo_pump.speed_ok = status & STATUS_TURBO_SPEED_OK != 0;
        cryo.gate_valve.position = match (status >> STATUS_GATE_SHIFT) & STATUS_GATE_MASK {
            GATE_SENSORS_UNKNOWN => ValvePosition::Unknown,
            GATE_SENSORS_OPEN => ValvePosition::Open,
            GATE_SENSORS_CLOSE => ValvePosition::Closed,
            _ => ValvePosition::Error,
        };
        cryo.solenoid_valve.position =
            match (status >> STATUS_SOLENOID_SHIFT) & STATUS_SOLENOID_MASK {
                SOLENOID_SENSORS_UNKNOWN => ValvePosition::Unknown,
                SOLENOID_SENSORS_OPEN => ValvePosition::Open,
                SOLENOID_SENSORS_CLOSE => ValvePosition::Closed,
                _ => ValvePosition::Error,
            };
        Ok(())
    }

    /// Write BREG. On failure the cached copy is rolled back so it keeps
    /// describing the hardware state.
    fn cryo_write_breg(&mut self, set: u16, mask: u16) -> Result<(), SerialFail> {
        let saved = self.fe.cryostat.regs.breg;
        let breg = (saved & !mask) | (set & mask);
        self.fe.cryostat.regs.breg = breg;
        let result = self.reg_write(
            module_port(MODULE),
            CMD_WRITE_BREG,
            BREG_SIZE,
            Shift::Left(1),
            breg as u64,
        );
        if result.is_err() {
            self.fe.cryostat.regs.breg = saved;
        }
        result
    }

    pub(crate) fn cryo_set_backing_pump(&mut self, enable: bool) -> Result<(), SerialFail> {
        let set = if enable { BREG_BACKING_PUMP } else { 0 };
        self.cryo_write_breg(set, BREG_BACKING_PUMP)?;
        // No hardware read-back exists; mirror the command.
        self.fe.cryostat.backing_pump.enabled = enable;
        Ok(())
    }

    pub(crate) fn cryo_set_turbo_pump(&mut self, enable: bool) -> Result<(), SerialFail> {
        let set = if enable { BREG_TURBO_PUMP } else { 0 };
        self.cryo_write_breg(set, BREG_TURBO_PUMP)?;
        self.fe.cryostat.turbo_pump.enabled = enable;
        Ok(())
    }

    pub(crate) fn cryo_set_gate_valve(&mut self, open: bool) -> Result<(), SerialFail> {
        let set = if open { BREG_GATE_VALVE } else { 0 };
        self.cryo_write_breg(set, BREG_GATE_VALVE)
    }

    pub(crate) fn cryo_set_solenoid_valve(&mut self, open: bool) -> Result<(), SerialFail> {
        let set = if open { BREG_SOLENOID_VALVE } else { 0 };
        self.cryo_write_breg(set, BREG_SOLENOID_VALVE)
    }

    pub(crate) fn cryo_set_vacuum_controller(&mut self, enable: bool) -> Result<(), SerialFail> {
        // Inverted hardware logic: the bit clears to enable.
        let set = if enable { 0 } else { BREG_VACUUM_CONTROLLER };
        self.cryo_write_breg(set, BREG_VACUUM_CONTROLLER)?;
        self.fe.cryostat.vacuum.enabled = enable;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_areg_addresses() {
        assert_eq!(AREG_TEMPERATURE[0], 0x0000);
        assert_eq!(AREG_TEMPERATURE[9], 0x0100);
        assert_eq!(areg_pressure(0), 0x200);
        assert_eq!(areg_pressure(1), 0x300);
        assert_eq!(AREG_SUPPLY_CURRENT, 0x400);
    }

    #[test]
    fn test_prt_branches() {
        // 1.5 V -> 187.5 ohm: above the knee, curve B
        let above = prt_temperature(1.5).unwrap();
        // 0.5 V -> 62.5 ohm: below the knee, curve A
        let below = prt_temperature(0.5).unwrap();
        assert!(above > below);
        // Curve B at 187.5/1000 is a plausible cryogenic value
        assert!((10.0..150.0).contains(&above), "above = {above}");
    }

    #[test]
    fn test_tvo_zero_voltage_is_conversion_error() {
        let coeff = [1.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0];
        assert_eq!(tvo_temperature(&coeff, 0.0), None);
        assert!(tvo_temperature(&coeff, 1.0).is_some());
    }

    #[test]
    fn test_pressure_scaling() {
        // vin = 7.75 cancels the offset: 10^0 = 1 mbar
        let p = pressure(7.75, CRYO_PRESS_OFFSET, CRYO_PRESS_SCALE).unwrap();
        assert!((p - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_poly6_order() {
        // 1 + 2x at x=3 -> 7
        let c = [1.0, 2.0, 0.0, 0.0, 0.0, 0.0, 0.0];
        assert_eq!(poly6(&c, 3.0), 7.0);
    }
}
