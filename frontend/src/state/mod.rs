//! The device tree.
//!
//! One value owns the complete cached state of the receiver; handlers
//! borrow it mutably for the duration of a request. Sub-components refer
//! to each other by index into the tree (cartridge number, sensor number),
//! never by pointer.

pub mod cartridge;
pub mod cryostat;
pub mod fetim;
pub mod ifswitch;
pub mod lpr;
pub mod power;

pub use cartridge::{CartState, Cartridge};
pub use cryostat::{Cryostat, ValvePosition};
pub use fetim::Fetim;
pub use ifswitch::IfSwitch;
pub use lpr::Lpr;
pub use power::{PdEnable, PowerDistribution};

use crate::config::FrontendConfig;

/// Top-level operating mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum FeMode {
    #[default]
    Operational = 0,
    Troubleshooting = 1,
    Maintenance = 2,
}

impl FeMode {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(FeMode::Operational),
            1 => Some(FeMode::Troubleshooting),
            2 => Some(FeMode::Maintenance),
            _ => None,
        }
    }
}

/// Root of the device tree. Initialized once at boot; child references
/// stay stable for the process lifetime and availability flags are never
/// cleared after init.
#[derive(Debug, Default)]
pub struct Frontend {
    pub mode: FeMode,
    pub cartridge: [Cartridge; 10],
    pub power: PowerDistribution,
    pub if_switch: IfSwitch,
    pub cryostat: Cryostat,
    pub lpr: Lpr,
    pub fetim: Fetim,
}

impl Frontend {
    /// Build the tree from the configuration handed over by the INI
    /// collaborator.
    pub fn from_config(config: &FrontendConfig) -> Self {
        let mut fe = Frontend::default();
        for (slot, cart_cfg) in config.cartridge.iter().enumerate() {
            fe.cartridge[slot].configure(cart_cfg);
        }
        fe.cryostat.configure(&config.cryostat);
        fe.fetim.available = config.fetim_available;
        fe.lpr.available = true;
        fe.if_switch.available = true;
        fe.power.available = true;
        fe
    }
}
