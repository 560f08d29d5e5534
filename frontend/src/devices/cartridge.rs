//! Cartridge handlers: the bias subsystem, the first LO, and the
//! cartridge temperature sensors.
//!
//! Nothing on a cartridge is reachable while it is unpowered; the power
//! distribution drives those edges. The PA drain/gate setpoints carry an
//! extra interlock: they are refused while the cryostat cold stages read
//! warmer than the PA-safe limit.

use femc_bus::PortIo;
use femc_core::frame::CanFrame;
use femc_core::ring::{codes, ErrModule};
use femc_core::status::Status;
use femc_core::timer::Clock;

use super::{
    echo_last, finish_analog, reject_control, reject_monitor, reply_byte, reply_u16,
    submodule_range, Request,
};
use crate::addr;
use crate::mainloop::Femc;
use crate::serial::{bias, lo};
use crate::state::cryostat::{CRYOCOOLER_12K, CRYOCOOLER_4K};

/// PA bias is refused above this cold-stage temperature (K).
pub const PA_MAX_ALLOWED_TEMP: f32 = 30.0;

impl<P: PortIo, C: Clock> Femc<P, C> {
    pub(crate) fn cartridge_handler(&mut self, cartridge: u8, req: &Request, out: &mut CanFrame) {
        let cart = &self.fe.cartridge[cartridge as usize];
        if !cart.available {
            self.errors
                .store(ErrModule::Cartridge, codes::dev::NOT_INSTALLED);
            out.status = Status::HardwRange;
            return;
        }
        if !cart.is_powered() {
            self.errors
                .store(ErrModule::Cartridge, codes::cartridge::NOT_POWERED);
            out.status = Status::HardwBlocked;
            return;
        }

        if req.sub & addr::CART_SUBSYS_MASK == 0 {
            self.bias_handler(cartridge, req, out)
        } else {
            self.lo_temp_handler(cartridge, req, out)
        }
    }

    // --- Bias subsystem ---------------------------------------------------

    fn bias_handler(&mut self, cartridge: u8, req: &Request, out: &mut CanFrame) {
        let pol = ((req.sub & addr::POL_MASK) >> addr::POL_SHIFT) as u8;
        let sub = (req.sub & addr::POL_SUB_MASK) >> addr::POL_SUB_SHIFT;
        match sub {
            addr::POL_SUB_SIDEBAND0 | addr::POL_SUB_SIDEBAND1 => {
                self.sideband_handler(cartridge, pol, sub as u8, req, out)
            }
            addr::POL_SUB_LNA_LED => self.lna_led_point(cartridge, pol, req, out),
            addr::POL_SUB_SIS_HEATER => self.sis_heater_point(cartridge, pol, req, out),
            _ => submodule_range(out, &mut self.errors, ErrModule::Polarization),
        }
    }

    fn sideband_handler(&mut self, cartridge: u8, pol: u8, sb: u8, req: &Request, out: &mut CanFrame) {
        match (req.sub & addr::SB_SUB_MASK) >> addr::SB_SUB_SHIFT {
            addr::SB_SUB_SIS => self.sis_point(cartridge, pol, sb, req, out),
            addr::SB_SUB_SIS_MAGNET => self.sis_magnet_point(cartridge, pol, sb, req, out),
            addr::SB_SUB_LNA => self.lna_point(cartridge, pol, sb, req, out),
            _ => submodule_range(out, &mut self.errors, ErrModule::Sideband),
        }
    }

    fn sis_point(&mut self, cartridge: u8, pol: u8, sb: u8, req: &Request, out: &mut CanFrame) {
        let (c, p, s) = (cartridge as usize, pol as usize, sb as usize);
        match (req.sub & addr::SIS_SUB_MASK) >> addr::SIS_SUB_SHIFT {
            addr::SIS_VOLTAGE => {
                if !req.is_monitor() {
                    self.fe.cartridge[c].polarization[p].sideband[s]
                        .sis
                        .last_voltage
                        .save(&req.frame);
                    let status = match req.f32() {
                        Some(v) => {
                            match self.bias_dac(
                                cartridge,
                                bias::CMD_DAC_SIS_VOLTAGE,
                                pol,
                                sb,
                                0,
                                v,
                                bias::SIS_VOLTAGE_SCALE,
                            ) {
                                Ok(()) => Status::Ok,
                                Err(_) => Status::Error,
                            }
                        }
                        None => {
                            self.errors.store(ErrModule::Sis, codes::dev::SET_RANGE);
                            Status::ErrorRange
                        }
                    };
                    self.fe.cartridge[c].polarization[p].sideband[s]
                        .sis
                        .last_voltage
                        .status = status;
                    return;
                }
                if req.on_control_rca() {
                    echo_last(
                        out,
                        &self.fe.cartridge[c].polarization[p].sideband[s].sis.last_voltage,
                    );
                    return;
                }
                let read = self.bias_analog(
                    cartridge,
                    bias::areg_sis(pol, sb, bias::POINT_VOLTAGE),
                    bias::SIS_VOLTAGE_SCALE,
                );
                finish_analog(
                    out,
                    &mut self.errors,
                    ErrModule::Sis,
                    &mut self.fe.cartridge[c].polarization[p].sideband[s].sis.voltage,
                    read,
                );
            }
            addr::SIS_CURRENT => {
                if !req.is_monitor() {
                    reject_control(&mut self.errors, ErrModule::Sis);
                    return;
                }
                if req.on_control_rca() {
                    reject_monitor(out, &mut self.errors, ErrModule::Sis);
                    return;
                }
                let read = self.bias_analog(
                    cartridge,
                    bias::areg_sis(pol, sb, bias::POINT_CURRENT),
                    bias::SIS_CURRENT_SCALE,
                );
                finish_analog(
                    out,
                    &mut self.errors,
                    ErrModule::Sis,
                    &mut self.fe.cartridge[c].polarization[p].sideband[s].sis.current,
                    read,
                );
            }
            addr::SIS_OPEN_LOOP => {
                if !req.is_monitor() {
                    let open = req.byte() != 0;
                    self.fe.cartridge[c].polarization[p].sideband[s]
                        .sis
                        .last_open_loop
                        .save(&req.frame);
                    let bit = bias::breg_sis_open_loop(pol, sb);
                    let status = match self.bias_breg(cartridge, if open { bit } else { 0 }, bit) {
                        Ok(()) => {
                            self.fe.cartridge[c].polarization[p].sideband[s].sis.open_loop = open;
                            Status::Ok
                        }
                        Err(_) => Status::Error,
                    };
                    self.fe.cartridge[c].polarization[p].sideband[s]
                        .sis
                        .last_open_loop
                        .status = status;
                    return;
                }
                if req.on_control_rca() {
                    echo_last(
                        out,
                        &self.fe.cartridge[c].polarization[p].sideband[s]
                            .sis
                            .last_open_loop,
                    );
                    return;
                }
                reply_byte(
                    out,
                    self.fe.cartridge[c].polarization[p].sideband[s].sis.open_loop as u8,
                );
            }
            _ => submodule_range(out, &mut self.errors, ErrModule::Sis),
        }
    }

    fn sis_magnet_point(&mut self, cartridge: u8, pol: u8, sb: u8, req: &Request, out: &mut CanFrame) {
        let (c, p, s) = (cartridge as usize, pol as usize, sb as usize);
        match (req.sub & addr::SIS_MAG_SUB_MASK) >> addr::SIS_MAG_SUB_SHIFT {
            addr::SIS_MAG_VOLTAGE => {
                if !req.is_monitor() {
                    reject_control(&mut self.errors, ErrModule::SisMagnet);
                    return;
                }
                if req.on_control_rca() {
                    reject_monitor(out, &mut self.errors, ErrModule::SisMagnet);
                    return;
                }
                let read = self.bias_analog(
                    cartridge,
                    bias::areg_magnet(pol, sb, bias::POINT_VOLTAGE),
                    bias::MAGNET_VOLTAGE_SCALE,
                );
                finish_analog(
                    out,
                    &mut self.errors,
                    ErrModule::SisMagnet,
                    &mut self.fe.cartridge[c].polarization[p].sideband[s].sis_magnet.voltage,
                    read,
                );
            }
            addr::SIS_MAG_CURRENT => {
                if !req.is_monitor() {
                    self.fe.cartridge[c].polarization[p].sideband[s]
                        .sis_magnet
                        .last_current
                        .save(&req.frame);
                    let status = match req.f32() {
                        Some(v) => {
                            match self.bias_dac(
                                cartridge,
                                bias::CMD_DAC_MAGNET_CURRENT,
                                pol,
                                sb,
                                0,
                                v,
                                bias::MAGNET_CURRENT_SCALE,
                            ) {
                                Ok(()) => Status::Ok,
                                Err(_) => Status::Error,
                            }
                        }
                        None => {
                            self.errors
                                .store(ErrModule::SisMagnet, codes::dev::SET_RANGE);
                            Status::ErrorRange
                        }
                    };
                    self.fe.cartridge[c].polarization[p].sideband[s]
                        .sis_magnet
                        .last_current
                        .status = status;
                    return;
                }
                if req.on_control_rca() {
                    echo_last(
                        out,
                        &self.fe.cartridge[c].polarization[p].sideband[s]
                            .sis_magnet
                            .last_current,
                    );
                    return;
                }
                let read = self.bias_analog(
                    cartridge,
                    bias::areg_magnet(pol, sb, bias::POINT_CURRENT),
                    bias::MAGNET_CURRENT_SCALE,
                );
                finish_analog(
                    out,
                    &mut self.errors,
                    ErrModule::SisMagnet,
                    &mut self.fe.cartridge[c].polarization[p].sideband[s].sis_magnet.current,
                    read,
                );
            }
            _ => submodule_range(out, &mut self.errors, ErrModule::SisMagnet),
        }
    }

    fn lna_point(&mut self, cartridge: u8, pol: u8, sb: u8, req: &Request, out: &mut CanFrame) {
        let (c, p, s) = (cartridge as usize, pol as usize, sb as usize);
        let sub = (req.sub & addr::LNA_SUB_MASK) >> addr::LNA_SUB_SHIFT;
        if sub == addr::LNA_ENABLE {
            if !req.is_monitor() {
                let enable = req.byte() != 0;
                self.fe.cartridge[c].polarization[p].sideband[s]
                    .lna
                    .last_enable
                    .save(&req.frame);
                let bit = bias::breg_lna_enable(pol, sb);
                let status = match self.bias_breg(cartridge, if enable { bit } else { 0 }, bit) {
                    Ok(()) => {
                        self.fe.cartridge[c].polarization[p].sideband[s].lna.enabled = enable;
                        Status::Ok
                    }
                    Err(_) => Status::Error,
                };
                self.fe.cartridge[c].polarization[p].sideband[s]
                    .lna
                    .last_enable
                    .status = status;
                return;
            }
            if req.on_control_rca() {
                echo_last(
                    out,
                    &self.fe.cartridge[c].polarization[p].sideband[s].lna.last_enable,
                );
                return;
            }
            reply_byte(
                out,
                self.fe.cartridge[c].polarization[p].sideband[s].lna.enabled as u8,
            );
            return;
        }

        // Stage-level points. Stages beyond the fitted count answer range.
        let stage = sub as u8;
        if stage >= self.fe.cartridge[c].polarization[p].sideband[s].lna.stages_fitted {
            submodule_range(out, &mut self.errors, ErrModule::Lna);
            return;
        }
        let st = stage as usize;
        match req.sub & addr::LNA_STAGE_MASK {
            addr::LNA_STAGE_DRAIN_VOLTAGE => {
                if !req.is_monitor() {
                    self.fe.cartridge[c].polarization[p].sideband[s].lna.stage[st]
                        .last_drain_voltage
                        .save(&req.frame);
                    let status = match req.f32() {
                        Some(v) => match self.bias_dac(
                            cartridge,
                            bias::CMD_DAC_LNA_DRAIN_VOLTAGE,
                            pol,
                            sb,
                            stage,
                            v,
                            bias::LNA_DRAIN_VOLTAGE_SCALE,
                        ) {
                            Ok(()) => Status::Ok,
                            Err(_) => Status::Error,
                        },
                        None => {
                            self.errors
                                .store(ErrModule::LnaStage, codes::dev::SET_RANGE);
                            Status::ErrorRange
                        }
                    };
                    self.fe.cartridge[c].polarization[p].sideband[s].lna.stage[st]
                        .last_drain_voltage
                        .status = status;
                    return;
                }
                if req.on_control_rca() {
                    echo_last(
                        out,
                        &self.fe.cartridge[c].polarization[p].sideband[s].lna.stage[st]
                            .last_drain_voltage,
                    );
                    return;
                }
                let read = self.bias_analog(
                    cartridge,
                    bias::areg_lna(pol, sb, stage, bias::POINT_VOLTAGE),
                    bias::LNA_DRAIN_VOLTAGE_SCALE,
                );
                finish_analog(
                    out,
                    &mut self.errors,
                    ErrModule::LnaStage,
                    &mut self.fe.cartridge[c].polarization[p].sideband[s].lna.stage[st]
                        .drain_voltage,
                    read,
                );
            }
            addr::LNA_STAGE_DRAIN_CURRENT => {
                if !req.is_monitor() {
                    self.fe.cartridge[c].polarization[p].sideband[s].lna.stage[st]
                        .last_drain_current
                        .save(&req.frame);
                    let status = match req.f32() {
                        Some(v) => match self.bias_dac(
                            cartridge,
                            bias::CMD_DAC_LNA_DRAIN_CURRENT,
                            pol,
                            sb,
                            stage,
                            v,
                            bias::LNA_DRAIN_CURRENT_SCALE,
                        ) {
                            Ok(()) => Status::Ok,
                            Err(_) => Status::Error,
                        },
                        None => {
                            self.errors
                                .store(ErrModule::LnaStage, codes::dev::SET_RANGE);
                            Status::ErrorRange
                        }
                    };
                    self.fe.cartridge[c].polarization[p].sideband[s].lna.stage[st]
                        .last_drain_current
                        .status = status;
                    return;
                }
                if req.on_control_rca() {
                    echo_last(
                        out,
                        &self.fe.cartridge[c].polarization[p].sideband[s].lna.stage[st]
                            .last_drain_current,
                    );
                    return;
                }
                let read = self.bias_analog(
                    cartridge,
                    bias::areg_lna(pol, sb, stage, bias::POINT_CURRENT),
                    bias::LNA_DRAIN_CURRENT_SCALE,
                );
                finish_analog(
                    out,
                    &mut self.errors,
                    ErrModule::LnaStage,
                    &mut self.fe.cartridge[c].polarization[p].sideband[s].lna.stage[st]
                        .drain_current,
                    read,
                );
            }
            addr::LNA_STAGE_GATE_VOLTAGE => {
                if !req.is_monitor() {
                    reject_control(&mut self.errors, ErrModule::LnaStage);
                    return;
                }
                if req.on_control_rca() {
                    reject_monitor(out, &mut self.errors, ErrModule::LnaStage);
                    return;
                }
                let read = self.bias_analog(
                    cartridge,
                    bias::areg_lna(pol, sb, stage, bias::POINT_GATE),
                    bias::LNA_GATE_VOLTAGE_SCALE,
                );
                finish_analog(
                    out,
                    &mut self.errors,
                    ErrModule::LnaStage,
                    &mut self.fe.cartridge[c].polarization[p].sideband[s].lna.stage[st]
                        .gate_voltage,
                    read,
                );
            }
            _ => submodule_range(out, &mut self.errors, ErrModule::LnaStage),
        }
    }

    fn lna_led_point(&mut self, cartridge: u8, pol: u8, req: &Request, out: &mut CanFrame) {
        let (c, p) = (cartridge as usize, pol as usize);
        if !req.is_monitor() {
            let enable = req.byte() != 0;
            self.fe.cartridge[c].polarization[p].lna_led.last_enable.save(&req.frame);
            let bit = bias::breg_lna_led(pol);
            let status = match self.bias_breg(cartridge, if enable { bit } else { 0 }, bit) {
                Ok(()) => {
                    self.fe.cartridge[c].polarization[p].lna_led.enabled = enable;
                    Status::Ok
                }
                Err(_) => Status::Error,
            };
            self.fe.cartridge[c].polarization[p].lna_led.last_enable.status = status;
            return;
        }
        if req.on_control_rca() {
            echo_last(out, &self.fe.cartridge[c].polarization[p].lna_led.last_enable);
            return;
        }
        reply_byte(out, self.fe.cartridge[c].polarization[p].lna_led.enabled as u8);
    }

    fn sis_heater_point(&mut self, cartridge: u8, pol: u8, req: &Request, out: &mut CanFrame) {
        let (c, p) = (cartridge as usize, pol as usize);
        match (req.sub & addr::SIS_HEATER_SUB_MASK) >> addr::SIS_HEATER_SUB_SHIFT {
            addr::SIS_HEATER_ENABLE => {
                if !req.is_monitor() {
                    let enable = req.byte() != 0;
                    self.fe.cartridge[c].polarization[p]
                        .sis_heater
                        .last_enable
                        .save(&req.frame);
                    let bit = bias::breg_sis_heater(pol);
                    let status = match self.bias_breg(cartridge, if enable { bit } else { 0 }, bit)
                    {
                        Ok(()) => {
                            self.fe.cartridge[c].polarization[p].sis_heater.enabled = enable;
                            Status::Ok
                        }
                        Err(_) => Status::Error,
                    };
                    self.fe.cartridge[c].polarization[p].sis_heater.last_enable.status = status;
                    return;
                }
                if req.on_control_rca() {
                    echo_last(
                        out,
                        &self.fe.cartridge[c].polarization[p].sis_heater.last_enable,
                    );
                    return;
                }
                reply_byte(out, self.fe.cartridge[c].polarization[p].sis_heater.enabled as u8);
            }
            _ => {
                // Heater current read-back.
                if !req.is_monitor() {
                    reject_control(&mut self.errors, ErrModule::SisHeater);
                    return;
                }
                if req.on_control_rca() {
                    reject_monitor(out, &mut self.errors, ErrModule::SisHeater);
                    return;
                }
                let read = self.bias_analog(
                    cartridge,
                    bias::areg_heater_current(pol),
                    bias::HEATER_CURRENT_SCALE,
                );
                finish_analog(
                    out,
                    &mut self.errors,
                    ErrModule::SisHeater,
                    &mut self.fe.cartridge[c].polarization[p].sis_heater.current,
                    read,
                );
            }
        }
    }

    // --- LO + cartridge temperatures ---------------------------------------

    fn lo_temp_handler(&mut self, cartridge: u8, req: &Request, out: &mut CanFrame) {
        match (req.sub & addr::LO_TEMP_MASK) >> addr::LO_TEMP_SHIFT {
            addr::LO_TEMP_LO => self.lo_handler(cartridge, req, out),
            addr::LO_TEMP_CART_TEMP => self.cart_temp_point(cartridge, req, out),
            _ => submodule_range(out, &mut self.errors, ErrModule::Cartridge),
        }
    }

    fn lo_handler(&mut self, cartridge: u8, req: &Request, out: &mut CanFrame) {
        match (req.sub & addr::LO_SUB_MASK) >> addr::LO_SUB_SHIFT {
            addr::LO_SUB_YTO => self.yto_point(cartridge, req, out),
            addr::LO_SUB_PHOTOMIXER => self.photomixer_point(cartridge, req, out),
            addr::LO_SUB_PLL => self.pll_point(cartridge, req, out),
            addr::LO_SUB_AMC => self.amc_point(cartridge, req, out),
            addr::LO_SUB_PA => self.pa_point(cartridge, req, out),
            _ => submodule_range(out, &mut self.errors, ErrModule::Lo),
        }
    }

    fn yto_point(&mut self, cartridge: u8, req: &Request, out: &mut CanFrame) {
        let c = cartridge as usize;
        if !req.is_monitor() {
            self.fe.cartridge[c].lo.yto.last_coarse_tune.save(&req.frame);
            let status = match req.u16() {
                Some(tune) if tune <= lo::YTO_TUNE_MAX => match self.lo_set_yto(cartridge, tune) {
                    Ok(()) => Status::Ok,
                    Err(_) => Status::Error,
                },
                _ => {
                    self.errors.store(ErrModule::Yto, codes::dev::SET_RANGE);
                    Status::ErrorRange
                }
            };
            self.fe.cartridge[c].lo.yto.last_coarse_tune.status = status;
            return;
        }
        if req.on_control_rca() {
            echo_last(out, &self.fe.cartridge[c].lo.yto.last_coarse_tune);
            return;
        }
        reply_u16(out, self.fe.cartridge[c].lo.yto.coarse_tune);
    }

    fn photomixer_point(&mut self, cartridge: u8, req: &Request, out: &mut CanFrame) {
        let c = cartridge as usize;
        match (req.sub & addr::PMX_SUB_MASK) >> addr::PMX_SUB_SHIFT {
            addr::PMX_ENABLE => {
                if !req.is_monitor() {
                    let enable = req.byte() != 0;
                    self.fe.cartridge[c].lo.photomixer.last_enable.save(&req.frame);
                    let status = match self.lo_breg(
                        cartridge,
                        if enable { lo::BREG_PMX_ENABLE } else { 0 },
                        lo::BREG_PMX_ENABLE,
                    ) {
                        Ok(()) => {
                            self.fe.cartridge[c].lo.photomixer.enabled = enable;
                            Status::Ok
                        }
                        Err(_) => Status::Error,
                    };
                    self.fe.cartridge[c].lo.photomixer.last_enable.status = status;
                    return;
                }
                if req.on_control_rca() {
                    echo_last(out, &self.fe.cartridge[c].lo.photomixer.last_enable);
                    return;
                }
                reply_byte(out, self.fe.cartridge[c].lo.photomixer.enabled as u8);
            }
            addr::PMX_VOLTAGE => self.lo_analog_monitor(
                cartridge,
                req,
                out,
                lo::AREG_PMX_VOLTAGE,
                lo::PMX_VOLTAGE_SCALE,
                ErrModule::Photomixer,
                |fe, c| &mut fe.cartridge[c].lo.photomixer.voltage,
            ),
            addr::PMX_CURRENT => self.lo_analog_monitor(
                cartridge,
                req,
                out,
                lo::AREG_PMX_CURRENT,
                lo::PMX_CURRENT_SCALE,
                ErrModule::Photomixer,
                |fe, c| &mut fe.cartridge[c].lo.photomixer.current,
            ),
            _ => submodule_range(out, &mut self.errors, ErrModule::Photomixer),
        }
    }

    /// Shared monitor-only analog path for LO points.
    fn lo_analog_monitor(
        &mut self,
        cartridge: u8,
        req: &Request,
        out: &mut CanFrame,
        point: u16,
        scale: f32,
        module: ErrModule,
        target: fn(&mut crate::state::Frontend, usize) -> &mut femc_core::oper::Analog,
    ) {
        if !req.is_monitor() {
            reject_control(&mut self.errors, module);
            return;
        }
        if req.on_control_rca() {
            reject_monitor(out, &mut self.errors, module);
            return;
        }
        let read = self.lo_analog(cartridge, point, scale);
        finish_analog(
            out,
            &mut self.errors,
            module,
            target(&mut self.fe, cartridge as usize),
            read,
        );
    }

    fn pll_point(&mut self, cartridge: u8, req: &Request, out: &mut CanFrame) {
        let c = cartridge as usize;
        match req.sub & addr::PLL_SUB_MASK {
            addr::PLL_LOCK_VOLTAGE => self.lo_analog_monitor(
                cartridge,
                req,
                out,
                lo::AREG_PLL_LOCK_VOLTAGE,
                lo::PLL_VOLTAGE_SCALE,
                ErrModule::Pll,
                |fe, c| &mut fe.cartridge[c].lo.pll.lock_voltage,
            ),
            addr::PLL_CORRECTION_VOLTAGE => self.lo_analog_monitor(
                cartridge,
                req,
                out,
                lo::AREG_PLL_CORRECTION,
                lo::PLL_VOLTAGE_SCALE,
                ErrModule::Pll,
                |fe, c| &mut fe.cartridge[c].lo.pll.correction_voltage,
            ),
            addr::PLL_ASSEMBLY_TEMP => self.lo_analog_monitor(
                cartridge,
                req,
                out,
                lo::AREG_PLL_ASSEMBLY_TEMP,
                lo::PLL_TEMP_SCALE,
                ErrModule::Pll,
                |fe, c| &mut fe.cartridge[c].lo.pll.assembly_temp,
            ),
            addr::PLL_YIG_HEATER_CURRENT => self.lo_analog_monitor(
                cartridge,
                req,
                out,
                lo::AREG_PLL_YIG_HEATER_CURRENT,
                lo::PLL_CURRENT_SCALE,
                ErrModule::Pll,
                |fe, c| &mut fe.cartridge[c].lo.pll.yig_heater_current,
            ),
            addr::PLL_REF_TOTAL_POWER => self.lo_analog_monitor(
                cartridge,
                req,
                out,
                lo::AREG_PLL_REF_POWER,
                lo::PLL_POWER_SCALE,
                ErrModule::Pll,
                |fe, c| &mut fe.cartridge[c].lo.pll.ref_total_power,
            ),
            addr::PLL_IF_TOTAL_POWER => self.lo_analog_monitor(
                cartridge,
                req,
                out,
                lo::AREG_PLL_IF_POWER,
                lo::PLL_POWER_SCALE,
                ErrModule::Pll,
                |fe, c| &mut fe.cartridge[c].lo.pll.if_total_power,
            ),
            addr::PLL_UNLOCK_LATCH => {
                if !req.is_monitor() {
                    reject_control(&mut self.errors, ErrModule::Pll);
                    return;
                }
                if req.on_control_rca() {
                    reject_monitor(out, &mut self.errors, ErrModule::Pll);
                    return;
                }
                if self.lo_read_status(cartridge).is_err() {
                    out.status = Status::Error;
                }
                reply_byte(out, self.fe.cartridge[c].lo.pll.unlock_latched as u8);
            }
            addr::PLL_CLEAR_UNLOCK_LATCH => {
                if !req.is_monitor() {
                    self.fe.cartridge[c].lo.pll.last_clear_unlock.save(&req.frame);
                    // Pulse the clear bit.
                    let status = match self
                        .lo_breg(cartridge, lo::BREG_CLEAR_UNLOCK_LATCH, lo::BREG_CLEAR_UNLOCK_LATCH)
                        .and_then(|()| self.lo_breg(cartridge, 0, lo::BREG_CLEAR_UNLOCK_LATCH))
                    {
                        Ok(()) => {
                            self.fe.cartridge[c].lo.pll.unlock_latched = false;
                            Status::Ok
                        }
                        Err(_) => Status::Error,
                    };
                    self.fe.cartridge[c].lo.pll.last_clear_unlock.status = status;
                    return;
                }
                if req.on_control_rca() {
                    echo_last(out, &self.fe.cartridge[c].lo.pll.last_clear_unlock);
                    return;
                }
                reject_monitor(out, &mut self.errors, ErrModule::Pll);
            }
            addr::PLL_LOOP_BANDWIDTH => self.pll_mode_bit(
                cartridge,
                req,
                out,
                lo::BREG_LOOP_BANDWIDTH,
                |pll| &mut pll.loop_bandwidth_alt,
                |pll| &mut pll.last_loop_bandwidth,
            ),
            addr::PLL_SIDEBAND_LOCK_SELECT => self.pll_mode_bit(
                cartridge,
                req,
                out,
                lo::BREG_SIDEBAND_LOCK,
                |pll| &mut pll.sideband_lock_below,
                |pll| &mut pll.last_sideband_lock,
            ),
            addr::PLL_NULL_INTEGRATOR => self.pll_mode_bit(
                cartridge,
                req,
                out,
                lo::BREG_NULL_INTEGRATOR,
                |pll| &mut pll.null_integrator,
                |pll| &mut pll.last_null_integrator,
            ),
            _ => submodule_range(out, &mut self.errors, ErrModule::Pll),
        }
    }

    /// Shared path for the PLL mode bits (loop bandwidth, sideband lock
    /// polarity, null integrator).
    fn pll_mode_bit(
        &mut self,
        cartridge: u8,
        req: &Request,
        out: &mut CanFrame,
        bit: u16,
        flag: fn(&mut crate::state::cartridge::Pll) -> &mut bool,
        last: fn(&mut crate::state::cartridge::Pll) -> &mut femc_core::frame::LastControl,
    ) {
        let c = cartridge as usize;
        if !req.is_monitor() {
            let enable = req.byte() != 0;
            last(&mut self.fe.cartridge[c].lo.pll).save(&req.frame);
            let status = match self.lo_breg(cartridge, if enable { bit } else { 0 }, bit) {
                Ok(()) => {
                    *flag(&mut self.fe.cartridge[c].lo.pll) = enable;
                    Status::Ok
                }
                Err(_) => Status::Error,
            };
            last(&mut self.fe.cartridge[c].lo.pll).status = status;
            return;
        }
        if req.on_control_rca() {
            let record = *last(&mut self.fe.cartridge[c].lo.pll);
            echo_last(out, &record);
            return;
        }
        reply_byte(out, *flag(&mut self.fe.cartridge[c].lo.pll) as u8);
    }

    fn amc_point(&mut self, cartridge: u8, req: &Request, out: &mut CanFrame) {
        let c = cartridge as usize;
        match req.sub & addr::AMC_SUB_MASK {
            addr::AMC_GATE_A_VOLTAGE => self.lo_analog_monitor(
                cartridge,
                req,
                out,
                lo::AREG_AMC_GATE_A,
                lo::AMC_VOLTAGE_SCALE,
                ErrModule::Amc,
                |fe, c| &mut fe.cartridge[c].lo.amc.gate_a_voltage,
            ),
            addr::AMC_DRAIN_A_VOLTAGE => self.lo_analog_monitor(
                cartridge,
                req,
                out,
                lo::AREG_AMC_DRAIN_A,
                lo::AMC_VOLTAGE_SCALE,
                ErrModule::Amc,
                |fe, c| &mut fe.cartridge[c].lo.amc.drain_a_voltage,
            ),
            addr::AMC_GATE_B_VOLTAGE => self.lo_analog_monitor(
                cartridge,
                req,
                out,
                lo::AREG_AMC_GATE_B,
                lo::AMC_VOLTAGE_SCALE,
                ErrModule::Amc,
                |fe, c| &mut fe.cartridge[c].lo.amc.gate_b_voltage,
            ),
            addr::AMC_DRAIN_B_VOLTAGE => self.amc_drain_point(
                cartridge,
                req,
                out,
                lo::AREG_AMC_DRAIN_B,
                0,
                |amc| &mut amc.drain_b_voltage,
                |amc| &mut amc.last_drain_b,
            ),
            addr::AMC_GATE_E_VOLTAGE => self.lo_analog_monitor(
                cartridge,
                req,
                out,
                lo::AREG_AMC_GATE_E,
                lo::AMC_VOLTAGE_SCALE,
                ErrModule::Amc,
                |fe, c| &mut fe.cartridge[c].lo.amc.gate_e_voltage,
            ),
            addr::AMC_DRAIN_E_VOLTAGE => self.amc_drain_point(
                cartridge,
                req,
                out,
                lo::AREG_AMC_DRAIN_E,
                1,
                |amc| &mut amc.drain_e_voltage,
                |amc| &mut amc.last_drain_e,
            ),
            addr::AMC_MULTIPLIER_COUNTS => {
                if !req.is_monitor() {
                    self.fe.cartridge[c].lo.amc.last_multiplier_counts.save(&req.frame);
                    let counts = req.byte();
                    let status = match self.lo_dac(
                        cartridge,
                        lo::CMD_DAC_AMC,
                        2,
                        counts as f32,
                        255.0,
                    ) {
                        Ok(()) => {
                            self.fe.cartridge[c].lo.amc.multiplier_counts = counts;
                            Status::Ok
                        }
                        Err(_) => Status::Error,
                    };
                    self.fe.cartridge[c].lo.amc.last_multiplier_counts.status = status;
                    return;
                }
                if req.on_control_rca() {
                    echo_last(out, &self.fe.cartridge[c].lo.amc.last_multiplier_counts);
                    return;
                }
                reply_byte(out, self.fe.cartridge[c].lo.amc.multiplier_counts);
            }
            addr::AMC_MULTIPLIER_CURRENT => self.lo_analog_monitor(
                cartridge,
                req,
                out,
                lo::AREG_AMC_MULT_CURRENT,
                lo::AMC_CURRENT_SCALE,
                ErrModule::Amc,
                |fe, c| &mut fe.cartridge[c].lo.amc.multiplier_current,
            ),
            addr::AMC_SUPPLY_5V => self.lo_analog_monitor(
                cartridge,
                req,
                out,
                lo::AREG_AMC_SUPPLY_5V,
                lo::SUPPLY_VOLTAGE_SCALE,
                ErrModule::Amc,
                |fe, c| &mut fe.cartridge[c].lo.amc.supply_5v,
            ),
            _ => submodule_range(out, &mut self.errors, ErrModule::Amc),
        }
    }

    /// Controllable AMC drain voltage (stages B and E).
    fn amc_drain_point(
        &mut self,
        cartridge: u8,
        req: &Request,
        out: &mut CanFrame,
        areg: u16,
        dac_select: u16,
        analog: fn(&mut crate::state::cartridge::Amc) -> &mut femc_core::oper::Analog,
        last: fn(&mut crate::state::cartridge::Amc) -> &mut femc_core::frame::LastControl,
    ) {
        let c = cartridge as usize;
        if !req.is_monitor() {
            last(&mut self.fe.cartridge[c].lo.amc).save(&req.frame);
            let status = match req.f32() {
                Some(v) => {
                    match self.lo_dac(cartridge, lo::CMD_DAC_AMC, dac_select, v, lo::AMC_VOLTAGE_SCALE)
                    {
                        Ok(()) => Status::Ok,
                        Err(_) => Status::Error,
                    }
                }
                None => {
                    self.errors.store(ErrModule::Amc, codes::dev::SET_RANGE);
                    Status::ErrorRange
                }
            };
            last(&mut self.fe.cartridge[c].lo.amc).status = status;
            return;
        }
        if req.on_control_rca() {
            let record = *last(&mut self.fe.cartridge[c].lo.amc);
            echo_last(out, &record);
            return;
        }
        let read = self.lo_analog(cartridge, areg, lo::AMC_VOLTAGE_SCALE);
        finish_analog(
            out,
            &mut self.errors,
            ErrModule::Amc,
            analog(&mut self.fe.cartridge[c].lo.amc),
            read,
        );
    }

    /// Cold-stage interlock for the PA bias setpoints.
    fn pa_temp_blocked(&self) -> bool {
        [CRYOCOOLER_4K, CRYOCOOLER_12K].iter().any(|&s| {
            matches!(self.fe.cryostat.temp[s].temp.value, Some(t) if t > PA_MAX_ALLOWED_TEMP)
        })
    }

    fn pa_point(&mut self, cartridge: u8, req: &Request, out: &mut CanFrame) {
        match (req.sub & addr::PA_SUB_MASK) >> addr::PA_SUB_SHIFT {
            ch @ (addr::PA_CHANNEL0 | addr::PA_CHANNEL1) => {
                self.pa_channel_point(cartridge, ch as u8, req, out)
            }
            addr::PA_SUPPLY_3V => self.lo_analog_monitor(
                cartridge,
                req,
                out,
                lo::AREG_PA_SUPPLY_3V,
                lo::SUPPLY_VOLTAGE_SCALE,
                ErrModule::Pa,
                |fe, c| &mut fe.cartridge[c].lo.pa.supply_3v,
            ),
            addr::PA_SUPPLY_5V => self.lo_analog_monitor(
                cartridge,
                req,
                out,
                lo::AREG_PA_SUPPLY_5V,
                lo::SUPPLY_VOLTAGE_SCALE,
                ErrModule::Pa,
                |fe, c| &mut fe.cartridge[c].lo.pa.supply_5v,
            ),
            _ => submodule_range(out, &mut self.errors, ErrModule::Pa),
        }
    }

    fn pa_channel_point(&mut self, cartridge: u8, channel: u8, req: &Request, out: &mut CanFrame) {
        let (c, ch) = (cartridge as usize, channel as usize);
        match req.sub & addr::PA_CH_MASK {
            point @ (addr::PA_CH_GATE_VOLTAGE | addr::PA_CH_DRAIN_VOLTAGE) => {
                let gate = point == addr::PA_CH_GATE_VOLTAGE;
                if !req.is_monitor() {
                    let last = if gate {
                        &mut self.fe.cartridge[c].lo.pa.channel[ch].last_gate_voltage
                    } else {
                        &mut self.fe.cartridge[c].lo.pa.channel[ch].last_drain_voltage
                    };
                    last.save(&req.frame);

                    // The PA must stay unbiased until the cold stages are
                    // actually cold.
                    if self.pa_temp_blocked() {
                        self.errors
                            .store(ErrModule::PaChannel, codes::pa_channel::TEMP_BLOCKED);
                        let last = if gate {
                            &mut self.fe.cartridge[c].lo.pa.channel[ch].last_gate_voltage
                        } else {
                            &mut self.fe.cartridge[c].lo.pa.channel[ch].last_drain_voltage
                        };
                        last.status = Status::HardwBlocked;
                        return;
                    }

                    let status = match req.f32() {
                        Some(v) => {
                            let select = (channel as u16) << 1 | gate as u16;
                            match self.lo_dac(
                                cartridge,
                                lo::CMD_DAC_PA,
                                select,
                                v,
                                lo::PA_VOLTAGE_SCALE,
                            ) {
                                Ok(()) => Status::Ok,
                                Err(_) => Status::Error,
                            }
                        }
                        None => {
                            self.errors
                                .store(ErrModule::PaChannel, codes::dev::SET_RANGE);
                            Status::ErrorRange
                        }
                    };
                    let last = if gate {
                        &mut self.fe.cartridge[c].lo.pa.channel[ch].last_gate_voltage
                    } else {
                        &mut self.fe.cartridge[c].lo.pa.channel[ch].last_drain_voltage
                    };
                    last.status = status;
                    return;
                }
                if req.on_control_rca() {
                    let record = if gate {
                        self.fe.cartridge[c].lo.pa.channel[ch].last_gate_voltage
                    } else {
                        self.fe.cartridge[c].lo.pa.channel[ch].last_drain_voltage
                    };
                    echo_last(out, &record);
                    return;
                }
                let areg = lo::areg_pa_channel(
                    channel,
                    if gate { lo::PA_POINT_GATE } else { lo::PA_POINT_DRAIN },
                );
                let read = self.lo_analog(cartridge, areg, lo::PA_VOLTAGE_SCALE);
                let analog = if gate {
                    &mut self.fe.cartridge[c].lo.pa.channel[ch].gate_voltage
                } else {
                    &mut self.fe.cartridge[c].lo.pa.channel[ch].drain_voltage
                };
                finish_analog(out, &mut self.errors, ErrModule::PaChannel, analog, read);
            }
            addr::PA_CH_DRAIN_CURRENT => {
                if !req.is_monitor() {
                    reject_control(&mut self.errors, ErrModule::PaChannel);
                    return;
                }
                if req.on_control_rca() {
                    reject_monitor(out, &mut self.errors, ErrModule::PaChannel);
                    return;
                }
                let read = self.lo_analog(
                    cartridge,
                    lo::areg_pa_channel(channel, lo::PA_POINT_CURRENT),
                    lo::PA_CURRENT_SCALE,
                );
                finish_analog(
                    out,
                    &mut self.errors,
                    ErrModule::PaChannel,
                    &mut self.fe.cartridge[c].lo.pa.channel[ch].drain_current,
                    read,
                );
            }
            _ => submodule_range(out, &mut self.errors, ErrModule::PaChannel),
        }
    }

    fn cart_temp_point(&mut self, cartridge: u8, req: &Request, out: &mut CanFrame) {
        let sensor = ((req.sub & addr::CART_TEMP_MASK) >> addr::CART_TEMP_SHIFT) as usize;
        if sensor >= addr::CART_TEMP_SENSORS as usize {
            submodule_range(out, &mut self.errors, ErrModule::CartridgeTemp);
            return;
        }
        if !req.is_monitor() {
            reject_control(&mut self.errors, ErrModule::CartridgeTemp);
            return;
        }
        if req.on_control_rca() {
            reject_monitor(out, &mut self.errors, ErrModule::CartridgeTemp);
            return;
        }
        let c = cartridge as usize;
        if !self.fe.cartridge[c].temp[sensor].available {
            submodule_range(out, &mut self.errors, ErrModule::CartridgeTemp);
            return;
        }
        let offset = self.fe.cartridge[c].temp[sensor].offset;
        let read = self
            .lo_analog_unipolar(cartridge, lo::areg_cart_temp(sensor as u8), lo::CART_TEMP_SCALE)
            .map(|t| t + offset);
        finish_analog(
            out,
            &mut self.errors,
            ErrModule::CartridgeTemp,
            &mut self.fe.cartridge[c].temp[sensor].temp,
            read,
        );
    }
}

#[cfg(test)]
mod tests {
    use femc_core::status::Status;
    use femc_core::wire;

    use super::PA_MAX_ALLOWED_TEMP;
    use crate::addr;
    use crate::state::cryostat::CRYOCOOLER_4K;
    use crate::testing::{booted_femc, control, monitor, power_on_ready};

    fn f32_payload(value: f32) -> [u8; 4] {
        value.to_be_bytes()
    }

    #[test]
    fn test_unpowered_cartridge_is_blocked() {
        let mut femc = booted_femc();
        let reply = monitor(&mut femc, addr::sis(0, 0, 0, addr::SIS_VOLTAGE));
        assert_eq!(reply.size, 1);
        assert_eq!(reply.data[0], Status::HardwBlocked as u8);
    }

    #[test]
    fn test_unavailable_cartridge_is_range_error() {
        let mut femc = crate::testing::booted_femc_with(|cfg| {
            cfg.cartridge[6].available = false;
        });
        let reply = monitor(&mut femc, addr::sis(6, 0, 0, addr::SIS_VOLTAGE));
        assert_eq!(reply.data[0], Status::HardwRange as u8);
    }

    #[test]
    fn test_sis_voltage_set_and_echo() {
        let mut femc = booted_femc();
        power_on_ready(&mut femc, 0);

        let rca = addr::sis(0, 1, 0, addr::SIS_VOLTAGE) + addr::CONTROL_OFFSET;
        control(&mut femc, rca, &f32_payload(8.0));
        assert_eq!(
            femc.fe.cartridge[0].polarization[1].sideband[0]
                .sis
                .last_voltage
                .status,
            Status::Ok
        );

        let reply = monitor(&mut femc, rca);
        assert_eq!(wire::take_f32(reply.payload()), 8.0);

        // A truncated payload is refused as out of range.
        control(&mut femc, rca, &[1, 2]);
        assert_eq!(
            femc.fe.cartridge[0].polarization[1].sideband[0]
                .sis
                .last_voltage
                .status,
            Status::ErrorRange
        );
    }

    #[test]
    fn test_sis_open_loop_round_trip() {
        let mut femc = booted_femc();
        power_on_ready(&mut femc, 0);
        let rca = addr::sis(0, 0, 1, addr::SIS_OPEN_LOOP);
        control(&mut femc, rca + addr::CONTROL_OFFSET, &[1]);
        assert!(femc.fe.cartridge[0].polarization[0].sideband[1].sis.open_loop);
        let reply = monitor(&mut femc, rca);
        assert_eq!(reply.payload()[0], 1);
    }

    #[test]
    fn test_lna_stage_beyond_fitted_count() {
        let mut femc = crate::testing::booted_femc_with(|cfg| {
            cfg.cartridge[0].lna_stages = 3;
        });
        power_on_ready(&mut femc, 0);
        // Stage 3 is the first missing one: off-by-one must answer range.
        let reply = monitor(
            &mut femc,
            addr::lna_stage(0, 0, 0, 3, addr::LNA_STAGE_DRAIN_VOLTAGE),
        );
        assert_eq!(reply.data[0], Status::HardwRange as u8);

        let reply = monitor(
            &mut femc,
            addr::lna_stage(0, 0, 0, 2, addr::LNA_STAGE_DRAIN_VOLTAGE),
        );
        assert_eq!(reply.size, 5);
    }

    #[test]
    fn test_pa_drain_blocked_when_warm() {
        let mut femc = booted_femc();
        power_on_ready(&mut femc, 0);
        femc.fe.cryostat.temp[CRYOCOOLER_4K]
            .temp
            .update(PA_MAX_ALLOWED_TEMP + 5.0);

        let rca = addr::pa_channel(0, 0, addr::PA_CH_DRAIN_VOLTAGE) + addr::CONTROL_OFFSET;
        control(&mut femc, rca, &f32_payload(2.0));
        assert_eq!(
            femc.fe.cartridge[0].lo.pa.channel[0].last_drain_voltage.status,
            Status::HardwBlocked
        );

        // Cold cryostat lifts the interlock.
        femc.fe.cryostat.temp[CRYOCOOLER_4K].temp.update(4.0);
        control(&mut femc, rca, &f32_payload(2.0));
        assert_eq!(
            femc.fe.cartridge[0].lo.pa.channel[0].last_drain_voltage.status,
            Status::Ok
        );
    }

    #[test]
    fn test_yto_tune_range() {
        let mut femc = booted_femc();
        power_on_ready(&mut femc, 0);
        let rca = addr::yto_coarse_tune(0) + addr::CONTROL_OFFSET;

        control(&mut femc, rca, &0x0ABCu16.to_be_bytes());
        assert_eq!(femc.fe.cartridge[0].lo.yto.coarse_tune, 0x0ABC);

        // Above the 12-bit tuning word.
        control(&mut femc, rca, &0x1000u16.to_be_bytes());
        assert_eq!(
            femc.fe.cartridge[0].lo.yto.last_coarse_tune.status,
            Status::ErrorRange
        );
        assert_eq!(femc.fe.cartridge[0].lo.yto.coarse_tune, 0x0ABC);
    }

    #[test]
    fn test_pll_clear_unlock_latch() {
        let mut femc = booted_femc();
        power_on_ready(&mut femc, 0);
        femc.fe.cartridge[0].lo.pll.unlock_latched = true;
        control(
            &mut femc,
            addr::pll(0, addr::PLL_CLEAR_UNLOCK_LATCH) + addr::CONTROL_OFFSET,
            &[1],
        );
        assert!(!femc.fe.cartridge[0].lo.pll.unlock_latched);
        assert_eq!(
            femc.fe.cartridge[0].lo.pll.last_clear_unlock.status,
            Status::Ok
        );
    }

    #[test]
    fn test_cartridge_temp_offset_applied() {
        let mut femc = crate::testing::booted_femc_with(|cfg| {
            cfg.cartridge[0].temp_offset[2] = 1.5;
        });
        power_on_ready(&mut femc, 0);
        let reply = monitor(&mut femc, addr::cartridge_temp(0, 2));
        assert_eq!(reply.status, Status::Ok);
        let value = wire::take_f32(reply.payload());
        // Full-scale mock readback plus the configured offset.
        assert!((value - (300.0 * 65535.0 / 65536.0 + 1.5)).abs() < 1e-3);
    }
}
