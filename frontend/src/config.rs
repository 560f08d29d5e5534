//! Collaborator seams: configuration, persisted state, ESN discovery.
//!
//! INI parsing, the esns/hours files and the one-wire bus protocol live
//! outside this crate. What crosses the boundary is plain data: threshold
//! tables, sensor coefficients, availability flags and 64-bit device IDs.

use femc_core::oper::OpRange;

/// Serial number size in bytes.
pub const ESN_SIZE: usize = 8;

/// Per-TVO-sensor interpolation polynomial (degree 6).
pub type TvoCoeffs = [f32; 7];

/// Cryostat configuration.
#[derive(Debug, Clone)]
pub struct CryostatConfig {
    pub available: bool,
    pub esn: [u8; ESN_SIZE],
    /// Coefficients for the nine TVO sensors, in sensor order.
    pub tvo_coeffs: [TvoCoeffs; 9],
    pub supply_current: OpRange,
}

impl Default for CryostatConfig {
    fn default() -> Self {
        CryostatConfig {
            available: true,
            esn: [0; ESN_SIZE],
            tvo_coeffs: [[0.0; 7]; 9],
            supply_current: OpRange::OPEN,
        }
    }
}

/// Per-cartridge configuration.
#[derive(Debug, Clone)]
pub struct CartridgeConfig {
    pub available: bool,
    pub esn: [u8; ESN_SIZE],
    /// ESN of the external LO PA limits table, all-zero when absent.
    pub pa_limits_esn: [u8; ESN_SIZE],
    /// Fitted LNA stages per band (≤ 6).
    pub lna_stages: u8,
    /// Temperature sensor offsets, one per cartridge sensor.
    pub temp_offset: [f32; 6],
}

impl Default for CartridgeConfig {
    fn default() -> Self {
        CartridgeConfig {
            available: false,
            esn: [0; ESN_SIZE],
            pa_limits_esn: [0; ESN_SIZE],
            lna_stages: 6,
            temp_offset: [0.0; 6],
        }
    }
}

/// LPR configuration.
#[derive(Debug, Clone, Default)]
pub struct LprConfig {
    pub esn: [u8; ESN_SIZE],
}

/// Top-level configuration handed over by the INI collaborator.
#[derive(Debug, Clone, Default)]
pub struct FrontendConfig {
    pub cartridge: [CartridgeConfig; 10],
    pub cryostat: CryostatConfig,
    pub lpr: LprConfig,
    pub fetim_available: bool,
}

/// Source of the configuration tree (the INI layer).
pub trait ConfigSource {
    fn frontend(&self) -> FrontendConfig;
}

impl ConfigSource for FrontendConfig {
    fn frontend(&self) -> FrontendConfig {
        self.clone()
    }
}

/// Persisted mutable records: cryocooler runtime and the last-discovered
/// device list.
pub trait Persist {
    fn load_cold_head_hours(&mut self) -> u32;
    fn save_cold_head_hours(&mut self, hours: u32);
    fn save_esn_list(&mut self, esns: &[[u8; ESN_SIZE]]);
}

/// One-wire bus discovery. The protocol's only role is to hand back the
/// 64-bit ROM IDs present on the bus.
pub trait OwbScan {
    fn scan(&mut self) -> Result<Vec<[u8; ESN_SIZE]>, OwbError>;
}

/// Discovery failure (presence pulse timeout, CRC storm, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("one-wire bus scan failed")]
pub struct OwbError;

/// In-memory `Persist` used by tests and bench setups.
#[derive(Debug, Default)]
pub struct MemPersist {
    pub cold_head_hours: u32,
    pub esns: Vec<[u8; ESN_SIZE]>,
    pub hours_saves: u32,
}

impl Persist for MemPersist {
    fn load_cold_head_hours(&mut self) -> u32 {
        self.cold_head_hours
    }

    fn save_cold_head_hours(&mut self, hours: u32) {
        self.cold_head_hours = hours;
        self.hours_saves += 1;
    }

    fn save_esn_list(&mut self, esns: &[[u8; ESN_SIZE]]) {
        self.esns = esns.to_vec();
    }
}
