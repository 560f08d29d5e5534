//! RCA address map.
//!
//! Field layout of the standard RCAs below the class/module split, plus
//! builder functions for every monitor point. The dispatcher decodes with
//! the same masks the builders use, so this file is the single source of
//! truth for the address map. Builders return the monitor RCA; add
//! [`CONTROL_OFFSET`] for the control RCA of a controllable point.

use femc_core::frame::{BASE_CONTROL_RCA, MODULE_SHIFT};

/// Monitor RCA + this = control RCA.
pub const CONTROL_OFFSET: u32 = BASE_CONTROL_RCA;

// --- Cartridge (modules 0-9) ---------------------------------------------

/// Bit 11: 0 = bias subsystem, 1 = LO + cartridge temperatures.
pub const CART_SUBSYS_MASK: u32 = 0x800;
pub const CART_SUBSYS_SHIFT: u32 = 11;

/// Bias: bit 10 selects the polarization.
pub const POL_MASK: u32 = 0x400;
pub const POL_SHIFT: u32 = 10;
/// Bias: bits 7-9 select the polarization submodule.
pub const POL_SUB_MASK: u32 = 0x380;
pub const POL_SUB_SHIFT: u32 = 7;
pub const POL_SUB_SIDEBAND0: u32 = 0;
pub const POL_SUB_SIDEBAND1: u32 = 1;
pub const POL_SUB_LNA_LED: u32 = 2;
pub const POL_SUB_SIS_HEATER: u32 = 3;
pub const POL_SUB_COUNT: u32 = 4;

/// Sideband: bits 5-6.
pub const SB_SUB_MASK: u32 = 0x60;
pub const SB_SUB_SHIFT: u32 = 5;
pub const SB_SUB_SIS: u32 = 0;
pub const SB_SUB_SIS_MAGNET: u32 = 1;
pub const SB_SUB_LNA: u32 = 2;
pub const SB_SUB_COUNT: u32 = 3;

/// SIS: bits 3-4.
pub const SIS_SUB_MASK: u32 = 0x18;
pub const SIS_SUB_SHIFT: u32 = 3;
pub const SIS_VOLTAGE: u32 = 0;
pub const SIS_CURRENT: u32 = 1;
pub const SIS_OPEN_LOOP: u32 = 2;
pub const SIS_SUB_COUNT: u32 = 3;

/// SIS magnet: bits 3-4.
pub const SIS_MAG_SUB_MASK: u32 = 0x18;
pub const SIS_MAG_SUB_SHIFT: u32 = 3;
pub const SIS_MAG_VOLTAGE: u32 = 0;
pub const SIS_MAG_CURRENT: u32 = 1;
pub const SIS_MAG_SUB_COUNT: u32 = 2;

/// LNA: bits 2-4 (0-5 stage, 6 enable).
pub const LNA_SUB_MASK: u32 = 0x1C;
pub const LNA_SUB_SHIFT: u32 = 2;
pub const LNA_ENABLE: u32 = 6;
pub const LNA_SUB_COUNT: u32 = 7;
/// LNA stage: bits 0-1.
pub const LNA_STAGE_MASK: u32 = 0x3;
pub const LNA_STAGE_DRAIN_VOLTAGE: u32 = 0;
pub const LNA_STAGE_DRAIN_CURRENT: u32 = 1;
pub const LNA_STAGE_GATE_VOLTAGE: u32 = 2;
pub const LNA_STAGE_SUB_COUNT: u32 = 3;

/// SIS heater: bit 6.
pub const SIS_HEATER_SUB_MASK: u32 = 0x40;
pub const SIS_HEATER_SUB_SHIFT: u32 = 6;
pub const SIS_HEATER_ENABLE: u32 = 0;
pub const SIS_HEATER_CURRENT: u32 = 1;

/// LO + temps: bits 7-10 (0 = LO, 1 = cartridge temperatures).
pub const LO_TEMP_MASK: u32 = 0x780;
pub const LO_TEMP_SHIFT: u32 = 7;
pub const LO_TEMP_LO: u32 = 0;
pub const LO_TEMP_CART_TEMP: u32 = 1;
pub const LO_TEMP_COUNT: u32 = 2;

/// LO: bits 4-6.
pub const LO_SUB_MASK: u32 = 0x70;
pub const LO_SUB_SHIFT: u32 = 4;
pub const LO_SUB_YTO: u32 = 0;
pub const LO_SUB_PHOTOMIXER: u32 = 1;
pub const LO_SUB_PLL: u32 = 2;
pub const LO_SUB_AMC: u32 = 3;
pub const LO_SUB_PA: u32 = 4;
pub const LO_SUB_COUNT: u32 = 5;

/// Photomixer: bits 2-3.
pub const PMX_SUB_MASK: u32 = 0xC;
pub const PMX_SUB_SHIFT: u32 = 2;
pub const PMX_ENABLE: u32 = 0;
pub const PMX_VOLTAGE: u32 = 1;
pub const PMX_CURRENT: u32 = 2;
pub const PMX_SUB_COUNT: u32 = 3;

/// PLL: bits 0-3.
pub const PLL_SUB_MASK: u32 = 0xF;
pub const PLL_LOCK_VOLTAGE: u32 = 0;
pub const PLL_CORRECTION_VOLTAGE: u32 = 1;
pub const PLL_ASSEMBLY_TEMP: u32 = 2;
pub const PLL_YIG_HEATER_CURRENT: u32 = 3;
pub const PLL_REF_TOTAL_POWER: u32 = 4;
pub const PLL_IF_TOTAL_POWER: u32 = 5;
pub const PLL_UNLOCK_LATCH: u32 = 6;
pub const PLL_CLEAR_UNLOCK_LATCH: u32 = 7;
pub const PLL_LOOP_BANDWIDTH: u32 = 8;
pub const PLL_SIDEBAND_LOCK_SELECT: u32 = 9;
pub const PLL_NULL_INTEGRATOR: u32 = 10;
pub const PLL_SUB_COUNT: u32 = 11;

/// AMC: bits 0-3.
pub const AMC_SUB_MASK: u32 = 0xF;
pub const AMC_GATE_A_VOLTAGE: u32 = 0;
pub const AMC_DRAIN_A_VOLTAGE: u32 = 1;
pub const AMC_GATE_B_VOLTAGE: u32 = 2;
pub const AMC_DRAIN_B_VOLTAGE: u32 = 3;
pub const AMC_GATE_E_VOLTAGE: u32 = 4;
pub const AMC_DRAIN_E_VOLTAGE: u32 = 5;
pub const AMC_MULTIPLIER_COUNTS: u32 = 6;
pub const AMC_MULTIPLIER_CURRENT: u32 = 7;
pub const AMC_SUPPLY_5V: u32 = 8;
pub const AMC_SUB_COUNT: u32 = 9;

/// PA: bits 2-3.
pub const PA_SUB_MASK: u32 = 0xC;
pub const PA_SUB_SHIFT: u32 = 2;
pub const PA_CHANNEL0: u32 = 0;
pub const PA_CHANNEL1: u32 = 1;
pub const PA_SUPPLY_3V: u32 = 2;
pub const PA_SUPPLY_5V: u32 = 3;
pub const PA_SUB_COUNT: u32 = 4;
/// PA channel: bits 0-1.
pub const PA_CH_MASK: u32 = 0x3;
pub const PA_CH_GATE_VOLTAGE: u32 = 0;
pub const PA_CH_DRAIN_VOLTAGE: u32 = 1;
pub const PA_CH_DRAIN_CURRENT: u32 = 2;
pub const PA_CH_SUB_COUNT: u32 = 3;

/// Cartridge temperatures: bits 4-6 select the sensor.
pub const CART_TEMP_MASK: u32 = 0x70;
pub const CART_TEMP_SHIFT: u32 = 4;
pub const CART_TEMP_SENSORS: u32 = 6;

// --- Power distribution (module 10) --------------------------------------

pub const PD_SUB_MASK: u32 = 0xF0;
pub const PD_SUB_SHIFT: u32 = 4;
pub const PD_POWERED_MODULES: u32 = 10;
pub const PD_SUB_COUNT: u32 = 11;
/// Within a module: bits 1-3 (0-5 channel, 6 enable).
pub const PD_MOD_SUB_MASK: u32 = 0xE;
pub const PD_MOD_SUB_SHIFT: u32 = 1;
pub const PD_MOD_ENABLE: u32 = 6;
pub const PD_MOD_SUB_COUNT: u32 = 7;
/// Channel: bit 0 (0 voltage, 1 current).
pub const PD_CH_MASK: u32 = 0x1;
pub const PD_CH_VOLTAGE: u32 = 0;
pub const PD_CH_CURRENT: u32 = 1;

// --- IF switch (module 11) ------------------------------------------------

pub const IF_SUB_MASK: u32 = 0x1C;
pub const IF_SUB_SHIFT: u32 = 2;
pub const IF_BAND_SELECT: u32 = 4;
pub const IF_SUB_COUNT: u32 = 5;
/// Channel: bits 0-1.
pub const IF_CH_MASK: u32 = 0x3;
pub const IF_CH_ATTENUATION: u32 = 0;
pub const IF_CH_ASSEMBLY_TEMP: u32 = 1;
pub const IF_CH_TEMP_SERVO: u32 = 2;
pub const IF_CH_SUB_COUNT: u32 = 3;

// --- Cryostat (module 12) -------------------------------------------------

pub const CRYO_SUB_MASK: u32 = 0x7C;
pub const CRYO_SUB_SHIFT: u32 = 2;
pub const CRYO_TEMP_SENSORS: u32 = 13;
pub const CRYO_BACKING_PUMP: u32 = 13;
pub const CRYO_TURBO_PUMP: u32 = 14;
pub const CRYO_GATE_VALVE: u32 = 15;
pub const CRYO_SOLENOID_VALVE: u32 = 16;
pub const CRYO_VACUUM_CONTROLLER: u32 = 17;
pub const CRYO_SUPPLY_CURRENT: u32 = 18;
pub const CRYO_COLD_HEAD: u32 = 19;
pub const CRYO_SUB_COUNT: u32 = 20;
/// Turbo pump: bits 0-1.
pub const TURBO_SUB_MASK: u32 = 0x3;
pub const TURBO_ENABLE: u32 = 0;
pub const TURBO_STATE: u32 = 1;
pub const TURBO_SPEED: u32 = 2;
pub const TURBO_SUB_COUNT: u32 = 3;
/// Vacuum controller: bits 0-1.
pub const VAC_SUB_MASK: u32 = 0x3;
pub const VAC_SENSOR0: u32 = 0;
pub const VAC_SENSOR1: u32 = 1;
pub const VAC_STATE: u32 = 2;
pub const VAC_ENABLE: u32 = 3;
/// Cold head: bit 0 (0 hours, 1 reset).
pub const COLD_HEAD_SUB_MASK: u32 = 0x1;
pub const COLD_HEAD_HOURS: u32 = 0;
pub const COLD_HEAD_RESET: u32 = 1;

// --- LPR (module 13) ------------------------------------------------------

pub const LPR_SUB_MASK: u32 = 0x30;
pub const LPR_SUB_SHIFT: u32 = 4;
pub const LPR_TEMP0: u32 = 0;
pub const LPR_TEMP1: u32 = 1;
pub const LPR_OPTICAL_SWITCH: u32 = 2;
pub const LPR_EDFA: u32 = 3;
pub const LPR_SUB_COUNT: u32 = 4;
/// Optical switch: bits 0-3.
pub const OSW_SUB_MASK: u32 = 0xF;
pub const OSW_PORT: u32 = 0;
pub const OSW_SHUTTER: u32 = 1;
pub const OSW_FORCE_SHUTTER: u32 = 2;
pub const OSW_STATE: u32 = 3;
pub const OSW_BUSY: u32 = 4;
pub const OSW_SUB_COUNT: u32 = 5;
/// EDFA: bits 2-3.
pub const EDFA_SUB_MASK: u32 = 0xC;
pub const EDFA_SUB_SHIFT: u32 = 2;
pub const EDFA_LASER: u32 = 0;
pub const EDFA_PHOTO_DETECTOR: u32 = 1;
pub const EDFA_MODULATION_INPUT: u32 = 2;
pub const EDFA_SUB_COUNT: u32 = 3;
/// Laser: bits 0-1.
pub const LASER_SUB_MASK: u32 = 0x3;
pub const LASER_PUMP_TEMP: u32 = 0;
pub const LASER_DRIVE_CURRENT: u32 = 1;
pub const LASER_PHOTO_DETECT_CURRENT: u32 = 2;
pub const LASER_SUB_COUNT: u32 = 3;
/// Photo detector: bit 0.
pub const EPD_SUB_MASK: u32 = 0x1;
pub const EPD_CURRENT: u32 = 0;
pub const EPD_POWER: u32 = 1;

// --- FETIM (module 14) ----------------------------------------------------

pub const FETIM_SUB_MASK: u32 = 0xC0;
pub const FETIM_SUB_SHIFT: u32 = 6;
pub const FETIM_INTERLOCK: u32 = 0;
pub const FETIM_COMPRESSOR: u32 = 1;
pub const FETIM_DEWAR: u32 = 2;
pub const FETIM_SUB_COUNT: u32 = 3;
/// Interlock: bit 5 (0 sensors, 1 state).
pub const INTRLK_SUB_MASK: u32 = 0x20;
pub const INTRLK_SUB_SHIFT: u32 = 5;
pub const INTRLK_SENSORS: u32 = 0;
pub const INTRLK_STATE: u32 = 1;
/// Interlock sensors: bits 3-4 (0 temp, 1 flow, 2 single-fail).
pub const INTRLK_SENS_MASK: u32 = 0x18;
pub const INTRLK_SENS_SHIFT: u32 = 3;
pub const INTRLK_SENS_TEMP: u32 = 0;
pub const INTRLK_SENS_FLOW: u32 = 1;
pub const INTRLK_SENS_SINGLE_FAIL: u32 = 2;
pub const INTRLK_SENS_COUNT: u32 = 3;
pub const INTRLK_TEMP_SENSORS: u32 = 5; // bits 0-2
pub const INTRLK_FLOW_SENSORS: u32 = 2; // bits 0-1
/// Interlock state: bits 2-4.
pub const INTRLK_STATE_MASK: u32 = 0x1C;
pub const INTRLK_STATE_SHIFT: u32 = 2;
pub const INTRLK_GLITCH: u32 = 0;
pub const INTRLK_MULTI_FAIL: u32 = 1;
pub const INTRLK_TEMP_OUT_RNG: u32 = 2;
pub const INTRLK_FLOW_OUT_RNG: u32 = 3;
pub const INTRLK_DELAY_TRIG: u32 = 4;
pub const INTRLK_SHUTDOWN_TRIG: u32 = 5;
pub const INTRLK_STATE_COUNT: u32 = 6;
/// Glitch: bit 1 (0 value, 1 countdown enable).
pub const GLITCH_SUB_MASK: u32 = 0x2;
pub const GLITCH_SUB_SHIFT: u32 = 1;
pub const GLITCH_VALUE: u32 = 0;
pub const GLITCH_COUNTDOWN: u32 = 1;
/// Compressor: bits 3-5.
pub const COMP_SUB_MASK: u32 = 0x38;
pub const COMP_SUB_SHIFT: u32 = 3;
pub const COMP_TEMP0: u32 = 0;
pub const COMP_TEMP1: u32 = 1;
pub const COMP_HE2_PRESS: u32 = 2;
pub const COMP_INTERLOCK_OVERRIDE: u32 = 3;
pub const COMP_FE_STATUS: u32 = 4;
pub const COMP_CABINET_TEMP: u32 = 5;
pub const COMP_SUB_COUNT: u32 = 6;
/// Compressor temp / He2: bit 2 (0 value, 1 out-of-range flag).
pub const COMP_POINT_MASK: u32 = 0x4;
pub const COMP_POINT_SHIFT: u32 = 2;
pub const COMP_POINT_VALUE: u32 = 0;
pub const COMP_POINT_OUT_RNG: u32 = 1;

// --- Builders -------------------------------------------------------------

#[inline]
fn module(module: u32, sub: u32) -> u32 {
    (module << MODULE_SHIFT) | sub
}

pub fn cryostat_temp(sensor: u32) -> u32 {
    module(12, sensor << CRYO_SUB_SHIFT)
}

pub fn cryostat_backing_pump() -> u32 {
    module(12, CRYO_BACKING_PUMP << CRYO_SUB_SHIFT)
}

pub fn cryostat_turbo(point: u32) -> u32 {
    module(12, CRYO_TURBO_PUMP << CRYO_SUB_SHIFT | point)
}

pub fn cryostat_gate_valve() -> u32 {
    module(12, CRYO_GATE_VALVE << CRYO_SUB_SHIFT)
}

pub fn cryostat_solenoid_valve() -> u32 {
    module(12, CRYO_SOLENOID_VALVE << CRYO_SUB_SHIFT)
}

pub fn cryostat_vacuum(point: u32) -> u32 {
    module(12, CRYO_VACUUM_CONTROLLER << CRYO_SUB_SHIFT | point)
}

pub fn cryostat_supply_current() -> u32 {
    module(12, CRYO_SUPPLY_CURRENT << CRYO_SUB_SHIFT)
}

pub fn cryostat_cold_head(point: u32) -> u32 {
    module(12, CRYO_COLD_HEAD << CRYO_SUB_SHIFT | point)
}

pub fn pd_channel(cartridge: u32, channel: u32, point: u32) -> u32 {
    module(10, cartridge << PD_SUB_SHIFT | channel << PD_MOD_SUB_SHIFT | point)
}

pub fn pd_module_enable(cartridge: u32) -> u32 {
    module(10, cartridge << PD_SUB_SHIFT | PD_MOD_ENABLE << PD_MOD_SUB_SHIFT)
}

pub fn pd_powered_modules() -> u32 {
    module(10, PD_POWERED_MODULES << PD_SUB_SHIFT)
}

pub fn if_channel(channel: u32, point: u32) -> u32 {
    module(11, channel << IF_SUB_SHIFT | point)
}

pub fn if_band_select() -> u32 {
    module(11, IF_BAND_SELECT << IF_SUB_SHIFT)
}

pub fn lpr_temp(sensor: u32) -> u32 {
    module(13, sensor << LPR_SUB_SHIFT)
}

pub fn lpr_optical_switch(point: u32) -> u32 {
    module(13, LPR_OPTICAL_SWITCH << LPR_SUB_SHIFT | point)
}

pub fn lpr_edfa_laser(point: u32) -> u32 {
    module(13, LPR_EDFA << LPR_SUB_SHIFT | EDFA_LASER << EDFA_SUB_SHIFT | point)
}

pub fn lpr_edfa_photo_detector(point: u32) -> u32 {
    module(
        13,
        LPR_EDFA << LPR_SUB_SHIFT | EDFA_PHOTO_DETECTOR << EDFA_SUB_SHIFT | point,
    )
}

pub fn lpr_edfa_modulation_input() -> u32 {
    module(13, LPR_EDFA << LPR_SUB_SHIFT | EDFA_MODULATION_INPUT << EDFA_SUB_SHIFT)
}

fn bias(cartridge: u32, polarization: u32, sub: u32) -> u32 {
    module(cartridge, polarization << POL_SHIFT | sub)
}

pub fn sis(cartridge: u32, polarization: u32, sideband: u32, point: u32) -> u32 {
    bias(
        cartridge,
        polarization,
        sideband << POL_SUB_SHIFT | SB_SUB_SIS << SB_SUB_SHIFT | point << SIS_SUB_SHIFT,
    )
}

pub fn sis_magnet(cartridge: u32, polarization: u32, sideband: u32, point: u32) -> u32 {
    bias(
        cartridge,
        polarization,
        sideband << POL_SUB_SHIFT | SB_SUB_SIS_MAGNET << SB_SUB_SHIFT | point << SIS_MAG_SUB_SHIFT,
    )
}

pub fn lna_stage(cartridge: u32, polarization: u32, sideband: u32, stage: u32, point: u32) -> u32 {
    bias(
        cartridge,
        polarization,
        sideband << POL_SUB_SHIFT | SB_SUB_LNA << SB_SUB_SHIFT | stage << LNA_SUB_SHIFT | point,
    )
}

pub fn lna_enable(cartridge: u32, polarization: u32, sideband: u32) -> u32 {
    bias(
        cartridge,
        polarization,
        sideband << POL_SUB_SHIFT | SB_SUB_LNA << SB_SUB_SHIFT | LNA_ENABLE << LNA_SUB_SHIFT,
    )
}

pub fn lna_led_enable(cartridge: u32, polarization: u32) -> u32 {
    bias(cartridge, polarization, POL_SUB_LNA_LED << POL_SUB_SHIFT)
}

pub fn sis_heater(cartridge: u32, polarization: u32, point: u32) -> u32 {
    bias(
        cartridge,
        polarization,
        POL_SUB_SIS_HEATER << POL_SUB_SHIFT | point << SIS_HEATER_SUB_SHIFT,
    )
}

fn lo(cartridge: u32, sub: u32) -> u32 {
    module(cartridge, CART_SUBSYS_MASK | LO_TEMP_LO << LO_TEMP_SHIFT | sub)
}

pub fn yto_coarse_tune(cartridge: u32) -> u32 {
    lo(cartridge, LO_SUB_YTO << LO_SUB_SHIFT)
}

pub fn photomixer(cartridge: u32, point: u32) -> u32 {
    lo(cartridge, LO_SUB_PHOTOMIXER << LO_SUB_SHIFT | point << PMX_SUB_SHIFT)
}

pub fn pll(cartridge: u32, point: u32) -> u32 {
    lo(cartridge, LO_SUB_PLL << LO_SUB_SHIFT | point)
}

pub fn amc(cartridge: u32, point: u32) -> u32 {
    lo(cartridge, LO_SUB_AMC << LO_SUB_SHIFT | point)
}

pub fn pa_channel(cartridge: u32, channel: u32, point: u32) -> u32 {
    lo(cartridge, LO_SUB_PA << LO_SUB_SHIFT | channel << PA_SUB_SHIFT | point)
}

pub fn pa_supply(cartridge: u32, which: u32) -> u32 {
    lo(cartridge, LO_SUB_PA << LO_SUB_SHIFT | which << PA_SUB_SHIFT)
}

pub fn cartridge_temp(cartridge: u32, sensor: u32) -> u32 {
    module(
        cartridge,
        CART_SUBSYS_MASK | LO_TEMP_CART_TEMP << LO_TEMP_SHIFT | sensor << CART_TEMP_SHIFT,
    )
}

pub fn fetim_interlock_temp(sensor: u32) -> u32 {
    module(
        14,
        FETIM_INTERLOCK << FETIM_SUB_SHIFT
            | INTRLK_SENSORS << INTRLK_SUB_SHIFT
            | INTRLK_SENS_TEMP << INTRLK_SENS_SHIFT
            | sensor,
    )
}

pub fn fetim_interlock_flow(sensor: u32) -> u32 {
    module(
        14,
        FETIM_INTERLOCK << FETIM_SUB_SHIFT
            | INTRLK_SENSORS << INTRLK_SUB_SHIFT
            | INTRLK_SENS_FLOW << INTRLK_SENS_SHIFT
            | sensor,
    )
}

pub fn fetim_interlock_single_fail() -> u32 {
    module(
        14,
        FETIM_INTERLOCK << FETIM_SUB_SHIFT
            | INTRLK_SENSORS << INTRLK_SUB_SHIFT
            | INTRLK_SENS_SINGLE_FAIL << INTRLK_SENS_SHIFT,
    )
}

pub fn fetim_interlock_state(point: u32) -> u32 {
    module(
        14,
        FETIM_INTERLOCK << FETIM_SUB_SHIFT
            | INTRLK_STATE << INTRLK_SUB_SHIFT
            | point << INTRLK_STATE_SHIFT,
    )
}

pub fn fetim_glitch(point: u32) -> u32 {
    module(
        14,
        FETIM_INTERLOCK << FETIM_SUB_SHIFT
            | INTRLK_STATE << INTRLK_SUB_SHIFT
            | INTRLK_GLITCH << INTRLK_STATE_SHIFT
            | point << GLITCH_SUB_SHIFT,
    )
}

pub fn fetim_compressor(sub: u32, point: u32) -> u32 {
    module(
        14,
        FETIM_COMPRESSOR << FETIM_SUB_SHIFT | sub << COMP_SUB_SHIFT | point << COMP_POINT_SHIFT,
    )
}

pub fn fetim_dewar_n2_fill() -> u32 {
    module(14, FETIM_DEWAR << FETIM_SUB_SHIFT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use femc_core::frame::{Class, ModuleId, Rca};

    #[test]
    fn test_builders_land_in_monitor_class() {
        for rca in [
            cryostat_temp(3),
            cryostat_gate_valve(),
            pd_module_enable(9),
            sis(9, 1, 1, SIS_OPEN_LOOP),
            pll(0, PLL_NULL_INTEGRATOR),
            fetim_compressor(COMP_HE2_PRESS, COMP_POINT_OUT_RNG),
        ] {
            assert_eq!(Rca(rca).class(), Class::Monitor);
            assert_eq!(Rca(rca + CONTROL_OFFSET).class(), Class::Control);
        }
    }

    #[test]
    fn test_module_fields() {
        assert_eq!(Rca(cryostat_temp(0)).module(), Some(ModuleId::Cryostat));
        assert_eq!(Rca(pd_powered_modules()).module(), Some(ModuleId::PowerDist));
        assert_eq!(Rca(if_band_select()).module(), Some(ModuleId::IfSwitch));
        assert_eq!(Rca(lpr_temp(0)).module(), Some(ModuleId::Lpr));
        assert_eq!(
            Rca(fetim_dewar_n2_fill()).module(),
            Some(ModuleId::Fetim)
        );
        assert_eq!(
            Rca(lna_stage(4, 1, 0, 5, LNA_STAGE_GATE_VOLTAGE)).module(),
            Some(ModuleId::Cartridge(4))
        );
    }

    #[test]
    fn test_bias_lo_subsystem_bit() {
        assert_eq!(Rca(sis(0, 0, 0, 0)).submodule() & CART_SUBSYS_MASK, 0);
        assert_ne!(Rca(yto_coarse_tune(0)).submodule() & CART_SUBSYS_MASK, 0);
    }
}
