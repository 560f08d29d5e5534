//! Front End Thermal Interlock Module state.
//!
//! The FETIM is an independent safety observer: its sensor layer exposes
//! raw out-of-range bits, its state layer the latched shutdown machinery.
//! Everything here is a read-back mirror except the FE-status publish and
//! the interlock override.

use femc_core::frame::LastControl;
use femc_core::oper::Analog;

/// Airflow/temperature sensor counts in the interlock.
pub const INTERLOCK_TEMP_SENSORS: usize = 5;
pub const INTERLOCK_FLOW_SENSORS: usize = 2;

/// Compressor external temperature sensor watching the turbo pump bay.
pub const COMP_TEMP_TURBO: usize = 0;

/// Turbo pump operating band, °C. Outside it the pump must not start.
pub const TURBO_PUMP_MIN_TEMP: f32 = 10.0;
pub const TURBO_PUMP_MAX_TEMP: f32 = 45.0;

#[derive(Debug, Default)]
pub struct InterlockSensors {
    pub temp: [Analog; INTERLOCK_TEMP_SENSORS],
    pub flow: [Analog; INTERLOCK_FLOW_SENSORS],
    /// At least one sensor failed.
    pub single_fail: bool,
}

/// Glitch counter: decrements continuously, latches shutdown on repeated
/// triggers.
#[derive(Debug, Default)]
pub struct InterlockGlitch {
    pub value: Analog,
    pub countdown_enabled: bool,
    pub last_countdown: LastControl,
}

#[derive(Debug, Default)]
pub struct InterlockState {
    pub glitch: InterlockGlitch,
    /// At least two sensors failed.
    pub multi_fail: bool,
    pub temp_out_of_range: bool,
    pub flow_out_of_range: bool,
    pub delay_triggered: bool,
    /// Final shutdown latch; there is no coming back in software.
    pub shutdown_triggered: bool,
}

#[derive(Debug, Default)]
pub struct Interlock {
    pub sensors: InterlockSensors,
    pub state: InterlockState,
}

#[derive(Debug, Default)]
pub struct CompTemp {
    pub temp: Analog,
    pub out_of_range: bool,
}

#[derive(Debug, Default)]
pub struct He2Press {
    pub pressure: Analog,
    pub out_of_range: bool,
}

#[derive(Debug, Default)]
pub struct Compressor {
    pub temp: [CompTemp; 2],
    pub he2: He2Press,
    pub interlock_override: bool,
    /// One-bit cool-down-readiness flag published to the FETIM hardware.
    pub fe_status: bool,
    pub cabinet_temp: Analog,
    pub last_interlock_override: LastControl,
    pub last_fe_status: LastControl,
}

#[derive(Debug, Default)]
pub struct Dewar {
    pub n2_fill: bool,
    pub last_n2_fill: LastControl,
}

#[derive(Debug, Default)]
pub struct Fetim {
    pub available: bool,
    pub interlock: Interlock,
    pub compressor: Compressor,
    pub dewar: Dewar,
    /// Cached copy of the write-only control register.
    pub breg: u16,
}

impl Fetim {
    /// Turbo-bay temperature is inside the band the pump may start in.
    /// An unread sensor counts as out of range: no start until the async
    /// monitor has produced a trustworthy value.
    pub fn turbo_temp_in_range(&self) -> bool {
        match self.compressor.temp[COMP_TEMP_TURBO].temp.value {
            Some(t) => (TURBO_PUMP_MIN_TEMP..=TURBO_PUMP_MAX_TEMP).contains(&t),
            None => false,
        }
    }
}
