//! LO photonic receiver state.

use femc_core::frame::LastControl;
use femc_core::oper::Analog;

/// Optical switch ports are the ten bands.
pub const MAX_PORT: u8 = 9;

#[derive(Debug, Default)]
pub struct OpticalSwitch {
    /// Selected output port.
    pub port: u8,
    pub shutter: bool,
    /// Error bit read back from the switch.
    pub error: bool,
    /// Switch still driving to the commanded port.
    pub busy: bool,
    pub last_port: LastControl,
    pub last_shutter: LastControl,
    pub last_force_shutter: LastControl,
}

#[derive(Debug, Default)]
pub struct Edfa {
    pub laser_pump_temp: Analog,
    pub laser_drive_current: Analog,
    pub laser_photo_detect_current: Analog,
    pub photo_detector_current: Analog,
    pub photo_detector_power: Analog,
    pub modulation_input: f32,
    pub last_modulation_input: LastControl,
}

#[derive(Debug, Default)]
pub struct Lpr {
    pub available: bool,
    pub temp: [Analog; 2],
    pub optical_switch: OpticalSwitch,
    pub edfa: Edfa,
}
