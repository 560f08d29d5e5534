//! Cryostat state: temperature sensors, the vacuum train, the register
//! cache for the cryostat M&C board.

use femc_core::frame::LastControl;
use femc_core::oper::Analog;

use crate::config::CryostatConfig;

/// Number of dewar temperature sensors (9 TVO + 4 PRT).
pub const TEMP_SENSORS: usize = 13;
/// Sensors 0..TVO_SENSORS are TVO, the rest PRT.
pub const TVO_SENSORS: usize = 9;

/// Sensor indices used by the interlocks.
pub const CRYOCOOLER_4K: usize = 0;
pub const CRYOCOOLER_12K: usize = 5;

/// Position read back from a valve's position sensors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum ValvePosition {
    Closed = 0,
    Open = 1,
    /// Sensors mid-transit.
    #[default]
    Unknown = 2,
    /// Contradictory sensor pattern.
    Error = 3,
}

/// One dewar temperature sensor.
#[derive(Debug, Default)]
pub struct CryoTempSensor {
    pub temp: Analog,
    /// TVO interpolation coefficients (unused for the PRT sensors).
    pub coeff: [f32; 7],
}

impl CryoTempSensor {
    pub fn is_tvo(index: usize) -> bool {
        index < TVO_SENSORS
    }
}

#[derive(Debug, Default)]
pub struct BackingPump {
    pub enabled: bool,
    pub last_enable: LastControl,
}

#[derive(Debug, Default)]
pub struct TurboPump {
    /// Commanded state (no hardware read-back exists).
    pub enabled: bool,
    /// Error bit from the status register.
    pub error: bool,
    /// Speed-ok bit from the status register.
    pub speed_ok: bool,
    pub last_enable: LastControl,
}

#[derive(Debug, Default)]
pub struct Valve {
    pub position: ValvePosition,
    pub last_state: LastControl,
}

#[derive(Debug, Default)]
pub struct VacuumSensor {
    pub pressure: Analog,
}

#[derive(Debug, Default)]
pub struct VacuumController {
    /// Commanded state. The controller powers up enabled so the dewar
    /// pressure can be monitored before the M&C system is active.
    pub enabled: bool,
    pub error: bool,
    pub sensor: [VacuumSensor; 2],
    pub last_enable: LastControl,
}

/// Cached state of the cryostat M&C board registers.
///
/// AREG selects the analog monitor point, BREG carries the relay states,
/// the status register is the read-back word. The settling counter works
/// around the multiplexed ADC: after a channel switch the first readouts
/// are not trustworthy and the handler answers HardwRetry until the
/// counter drains.
#[derive(Debug, Default)]
pub struct CryoRegisters {
    pub areg: u16,
    pub breg: u16,
    pub status: u16,
    pub adc: u16,
    /// Last selected analog channel; a change reloads `readouts_left`.
    pub last_channel: Option<u16>,
    pub readouts_left: u8,
}

#[derive(Debug, Default)]
pub struct Cryostat {
    pub available: bool,
    pub temp: [CryoTempSensor; TEMP_SENSORS],
    pub backing_pump: BackingPump,
    pub turbo_pump: TurboPump,
    pub gate_valve: Valve,
    pub solenoid_valve: Valve,
    pub vacuum: VacuumController,
    pub supply_current: Analog,
    /// Integrated cryocooler runtime below the cold threshold.
    pub cold_head_hours: u32,
    /// Hours changed since the last persist.
    pub hours_dirty: bool,
    pub last_hours_reset: LastControl,
    pub regs: CryoRegisters,
}

impl Cryostat {
    pub fn configure(&mut self, config: &CryostatConfig) {
        self.available = config.available;
        for (sensor, coeffs) in self.temp.iter_mut().zip(config.tvo_coeffs) {
            sensor.coeff = coeffs;
        }
        self.supply_current.range = config.supply_current;
        // Power-up state of the vacuum controller is ON; mirror it so the
        // commanded-state monitor reads back correctly.
        self.vacuum.enabled = true;
    }
}
