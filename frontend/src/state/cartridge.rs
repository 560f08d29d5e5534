//! Cartridge state: bias subsystem, first local oscillator, temperatures.

use femc_core::frame::LastControl;
use femc_core::oper::Analog;

use crate::config::CartridgeConfig;

/// Lifecycle state of one cartridge.
///
/// Off↔On transitions are driven only by the power distribution module;
/// On→Initing→Ready by the init pump; Error is a sink until the next
/// power cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CartState {
    #[default]
    Off,
    On,
    Initing,
    Ready,
    Observing,
    Error,
}

impl CartState {
    /// Powered in any way (counts against the power-distribution cap).
    pub fn is_powered(self) -> bool {
        !matches!(self, CartState::Off)
    }
}

/// SIS mixer junction.
#[derive(Debug, Default)]
pub struct Sis {
    pub available: bool,
    pub voltage: Analog,
    pub current: Analog,
    pub open_loop: bool,
    pub last_voltage: LastControl,
    pub last_open_loop: LastControl,
}

/// SIS magnet coil.
#[derive(Debug, Default)]
pub struct SisMagnet {
    pub available: bool,
    pub voltage: Analog,
    pub current: Analog,
    pub last_current: LastControl,
}

/// One LNA stage.
#[derive(Debug, Default)]
pub struct LnaStage {
    pub drain_voltage: Analog,
    pub drain_current: Analog,
    pub gate_voltage: Analog,
    pub last_drain_voltage: LastControl,
    pub last_drain_current: LastControl,
}

/// Low noise amplifier: up to six stages, band dependent.
#[derive(Debug, Default)]
pub struct Lna {
    pub available: bool,
    pub enabled: bool,
    /// Fitted stages for this band (≤ 6); the rest answer HardwRange.
    pub stages_fitted: u8,
    pub stage: [LnaStage; 6],
    pub last_enable: LastControl,
}

#[derive(Debug, Default)]
pub struct LnaLed {
    pub available: bool,
    pub enabled: bool,
    pub last_enable: LastControl,
}

#[derive(Debug, Default)]
pub struct SisHeater {
    pub available: bool,
    pub enabled: bool,
    pub current: Analog,
    pub last_enable: LastControl,
}

/// One sideband: mixer, magnet, amplifier.
#[derive(Debug, Default)]
pub struct Sideband {
    pub available: bool,
    pub sis: Sis,
    pub sis_magnet: SisMagnet,
    pub lna: Lna,
}

/// One polarization of the bias subsystem.
#[derive(Debug, Default)]
pub struct Polarization {
    pub available: bool,
    pub sideband: [Sideband; 2],
    pub lna_led: LnaLed,
    pub sis_heater: SisHeater,
}

/// YIG-tuned oscillator.
#[derive(Debug, Default)]
pub struct Yto {
    pub coarse_tune: u16,
    pub last_coarse_tune: LastControl,
}

/// Phase-locked loop.
#[derive(Debug, Default)]
pub struct Pll {
    pub lock_voltage: Analog,
    pub correction_voltage: Analog,
    pub assembly_temp: Analog,
    pub yig_heater_current: Analog,
    pub ref_total_power: Analog,
    pub if_total_power: Analog,
    pub unlock_latched: bool,
    pub loop_bandwidth_alt: bool,
    pub sideband_lock_below: bool,
    pub null_integrator: bool,
    pub last_clear_unlock: LastControl,
    pub last_loop_bandwidth: LastControl,
    pub last_sideband_lock: LastControl,
    pub last_null_integrator: LastControl,
}

/// Active multiplier chain.
#[derive(Debug, Default)]
pub struct Amc {
    pub gate_a_voltage: Analog,
    pub drain_a_voltage: Analog,
    pub gate_b_voltage: Analog,
    pub drain_b_voltage: Analog,
    pub gate_e_voltage: Analog,
    pub drain_e_voltage: Analog,
    pub multiplier_counts: u8,
    pub multiplier_current: Analog,
    pub supply_5v: Analog,
    pub last_drain_b: LastControl,
    pub last_drain_e: LastControl,
    pub last_multiplier_counts: LastControl,
}

/// One power amplifier channel (per polarization).
#[derive(Debug, Default)]
pub struct PaChannel {
    pub gate_voltage: Analog,
    pub drain_voltage: Analog,
    pub drain_current: Analog,
    pub last_gate_voltage: LastControl,
    pub last_drain_voltage: LastControl,
}

/// Power amplifier.
#[derive(Debug, Default)]
pub struct Pa {
    pub channel: [PaChannel; 2],
    pub supply_3v: Analog,
    pub supply_5v: Analog,
}

#[derive(Debug, Default)]
pub struct Photomixer {
    pub available: bool,
    pub enabled: bool,
    pub voltage: Analog,
    pub current: Analog,
    pub last_enable: LastControl,
}

/// First local oscillator.
#[derive(Debug, Default)]
pub struct Lo {
    pub yto: Yto,
    pub pll: Pll,
    pub amc: Amc,
    pub pa: Pa,
    pub photomixer: Photomixer,
    /// ESN of the external PA limits safety table; all-zero when absent.
    pub pa_limits_esn: [u8; 8],
}

/// Cartridge temperature sensor.
#[derive(Debug, Default)]
pub struct CartTempSensor {
    pub available: bool,
    pub temp: Analog,
    pub offset: f32,
}

/// One receiver cartridge (band).
#[derive(Debug, Default)]
pub struct Cartridge {
    pub available: bool,
    pub state: CartState,
    pub polarization: [Polarization; 2],
    pub lo: Lo,
    pub temp: [CartTempSensor; 6],
    pub esn: [u8; 8],
    /// Cached copies of the write-only board state registers.
    pub bias_breg: u16,
    pub lo_breg: u16,
}

impl Cartridge {
    /// Apply configuration at init.
    pub fn configure(&mut self, config: &CartridgeConfig) {
        self.available = config.available;
        self.esn = config.esn;
        self.lo.pa_limits_esn = config.pa_limits_esn;
        for pol in &mut self.polarization {
            pol.available = config.available;
            pol.lna_led.available = config.available;
            pol.sis_heater.available = config.available;
            for sb in &mut pol.sideband {
                sb.available = config.available;
                sb.sis.available = config.available;
                sb.sis_magnet.available = config.available;
                sb.lna.available = config.available;
                sb.lna.stages_fitted = config.lna_stages.min(6);
            }
        }
        for (sensor, offset) in self.temp.iter_mut().zip(config.temp_offset) {
            sensor.available = config.available;
            sensor.offset = offset;
        }
    }

    /// Bias and LO hardware is only reachable while powered.
    pub fn is_powered(&self) -> bool {
        self.state.is_powered()
    }
}
