//! IF switch matrix state.

use femc_core::frame::LastControl;
use femc_core::oper::Analog;

/// IF channels (polarization × sideband).
pub const CHANNELS: usize = 4;

/// One IF channel.
#[derive(Debug, Default)]
pub struct IfChannel {
    /// Commanded attenuation, 0-15 dB.
    pub attenuation: u8,
    pub assembly_temp: Analog,
    pub servo_enabled: bool,
    pub last_attenuation: LastControl,
    pub last_servo: LastControl,
}

#[derive(Debug, Default)]
pub struct IfSwitch {
    pub available: bool,
    /// Selected band, 0-9.
    pub band: u8,
    pub channel: [IfChannel; CHANNELS],
    pub last_band: LastControl,
    /// Cached copy of the write-only servo enable register.
    pub breg: u16,
}

/// Attenuation steps are 0-15 dB.
pub const MAX_ATTENUATION: u8 = 15;
/// Valid band selects are 0-9.
pub const MAX_BAND: u8 = 9;
