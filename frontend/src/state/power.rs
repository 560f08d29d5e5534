//! Power distribution state.

use femc_core::frame::LastControl;
use femc_core::oper::Analog;

/// Cap on simultaneously powered cartridges per operating mode.
pub const MAX_POWERED_OPERATIONAL: u8 = 3;
pub const MAX_POWERED_TROUBLESHOOTING: u8 = 10;

/// Commanded state of one distribution module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum PdEnable {
    #[default]
    Off = 0,
    On = 1,
    /// Reduced-power observing state; only reachable from Ready/Observing.
    Standby2 = 2,
}

/// One supply channel of a distribution module.
#[derive(Debug, Default)]
pub struct PdChannel {
    pub voltage: Analog,
    pub current: Analog,
}

/// Distribution module feeding one cartridge: ±6 V, ±15 V, +8 V, +24 V.
#[derive(Debug, Default)]
pub struct PdModule {
    pub enable: PdEnable,
    pub channel: [PdChannel; 6],
    pub last_enable: LastControl,
}

#[derive(Debug, Default)]
pub struct PowerDistribution {
    pub available: bool,
    pub module: [PdModule; 10],
    /// Cached copy of the write-only enable register.
    pub breg: u32,
}

impl PowerDistribution {
    /// Cartridges currently drawing power.
    pub fn powered_modules(&self) -> u8 {
        self.module
            .iter()
            .filter(|m| m.enable != PdEnable::Off)
            .count() as u8
    }
}
