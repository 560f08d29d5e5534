//! Cartridge lifecycle.
//!
//! Power edges come from the power distribution handlers; everything else
//! is the cooperative init pump. Initialization is split into small steps
//! and the main loop runs one step per iteration so CAN requests keep
//! being served while a cartridge comes up.

use femc_bus::PortIo;
use femc_core::ring::{codes, ErrModule};
use femc_core::timer::Clock;

use crate::mainloop::Femc;
use crate::serial::{bias, lo};
use crate::state::cartridge::CartState;

/// Initialization steps, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InitStep {
    ReadEsn,
    LoadConfig,
    LoDefaults,
    ClearPa,
    ClearSisBias,
}

impl InitStep {
    fn next(self) -> Option<InitStep> {
        match self {
            InitStep::ReadEsn => Some(InitStep::LoadConfig),
            InitStep::LoadConfig => Some(InitStep::LoDefaults),
            InitStep::LoDefaults => Some(InitStep::ClearPa),
            InitStep::ClearPa => Some(InitStep::ClearSisBias),
            InitStep::ClearSisBias => None,
        }
    }
}

/// Pending and in-flight cartridge initializations.
#[derive(Debug, Default)]
pub(crate) struct InitPump {
    queue: Vec<u8>,
    current: Option<(u8, InitStep)>,
}

impl InitPump {
    fn enqueue(&mut self, cartridge: u8) {
        if !self.queue.contains(&cartridge) {
            self.queue.push(cartridge);
        }
    }

    fn cancel(&mut self, cartridge: u8) {
        self.queue.retain(|&c| c != cartridge);
        if matches!(self.current, Some((c, _)) if c == cartridge) {
            self.current = None;
        }
    }
}

impl<P: PortIo, C: Clock> Femc<P, C> {
    /// Power distribution switched a cartridge on.
    pub(crate) fn cartridge_power_on(&mut self, cartridge: u8) {
        self.fe.cartridge[cartridge as usize].state = CartState::On;
        self.init_pump.enqueue(cartridge);
        log::info!("cartridge {} powered, init queued", cartridge);
    }

    /// Power distribution switched a cartridge off. Also the only way out
    /// of the Error state.
    pub(crate) fn cartridge_power_off(&mut self, cartridge: u8) {
        self.init_pump.cancel(cartridge);
        self.fe.cartridge[cartridge as usize].state = CartState::Off;
        log::info!("cartridge {} powered off", cartridge);
    }

    /// Band selection marks the selected cartridge as observing; the
    /// previous observer falls back to Ready.
    pub(crate) fn cartridge_observe(&mut self, cartridge: u8) {
        for (slot, cart) in self.fe.cartridge.iter_mut().enumerate() {
            if cart.state == CartState::Observing && slot != cartridge as usize {
                cart.state = CartState::Ready;
            }
        }
        let cart = &mut self.fe.cartridge[cartridge as usize];
        if cart.state == CartState::Ready {
            cart.state = CartState::Observing;
        }
    }

    /// Run at most one initialization step. Returns whether a step ran.
    pub(crate) fn step_cartridge_init(&mut self) -> bool {
        let (cartridge, step) = match self.init_pump.current {
            Some(job) => job,
            None => {
                if self.init_pump.queue.is_empty() {
                    return false;
                }
                let cartridge = self.init_pump.queue.remove(0);
                self.fe.cartridge[cartridge as usize].state = CartState::Initing;
                let job = (cartridge, InitStep::ReadEsn);
                self.init_pump.current = Some(job);
                job
            }
        };

        let result = self.run_init_step(cartridge, step);
        match result {
            Ok(()) => match step.next() {
                Some(next) => self.init_pump.current = Some((cartridge, next)),
                None => {
                    self.init_pump.current = None;
                    self.fe.cartridge[cartridge as usize].state = CartState::Ready;
                    log::info!("cartridge {} ready", cartridge);
                }
            },
            Err(()) => {
                self.init_pump.current = None;
                self.fe.cartridge[cartridge as usize].state = CartState::Error;
                self.errors
                    .store(ErrModule::Cartridge, codes::cartridge::INIT_FAILED);
                log::warn!("cartridge {} init failed at {:?}", cartridge, step);
            }
        }
        true
    }

    fn run_init_step(&mut self, cartridge: u8, step: InitStep) -> Result<(), ()> {
        match step {
            // The ESN and configuration were captured from the collaborator
            // at boot; these steps re-validate the cached copies.
            InitStep::ReadEsn => {
                if self.fe.cartridge[cartridge as usize].esn == [0; 8] {
                    log::debug!("cartridge {} has no configured ESN", cartridge);
                }
                Ok(())
            }
            InitStep::LoadConfig => Ok(()),
            InitStep::LoDefaults => {
                self.lo_set_yto(cartridge, 0).map_err(drop)?;
                self.lo_breg(cartridge, 0, 0x1F).map_err(drop)
            }
            InitStep::ClearPa => {
                for channel in 0..2u16 {
                    for point in [lo::PA_POINT_GATE, lo::PA_POINT_DRAIN] {
                        let select = channel << 1 | point & 1;
                        self.lo_dac(cartridge, lo::CMD_DAC_PA, select, 0.0, lo::PA_VOLTAGE_SCALE)
                            .map_err(drop)?;
                    }
                }
                Ok(())
            }
            InitStep::ClearSisBias => {
                for pol in 0..2u8 {
                    for sb in 0..2u8 {
                        self.bias_dac(
                            cartridge,
                            bias::CMD_DAC_SIS_VOLTAGE,
                            pol,
                            sb,
                            0,
                            0.0,
                            bias::SIS_VOLTAGE_SCALE,
                        )
                        .map_err(drop)?;
                    }
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addr;
    use crate::testing::{booted_femc, control, power_on_ready};

    #[test]
    fn test_init_runs_one_step_per_iteration() {
        let mut femc = booted_femc();
        femc.cartridge_power_on(0);
        assert_eq!(femc.fe.cartridge[0].state, CartState::On);

        // First step claims the job and the cartridge starts initializing.
        assert!(femc.step_cartridge_init());
        assert_eq!(femc.fe.cartridge[0].state, CartState::Initing);

        let mut steps = 1;
        while femc.fe.cartridge[0].state == CartState::Initing {
            assert!(femc.step_cartridge_init());
            steps += 1;
            assert!(steps < 32, "init pump never converged");
        }
        assert_eq!(femc.fe.cartridge[0].state, CartState::Ready);
        // Nothing left to pump.
        assert!(!femc.step_cartridge_init());
    }

    #[test]
    fn test_init_failure_is_a_sink_until_power_cycle() {
        let mut femc = booted_femc();
        femc.cartridge_power_on(1);
        // Wedge the serial bus: the first hardware-touching step fails.
        femc.bus.io.stick_busy();
        while femc.step_cartridge_init() {}
        assert_eq!(femc.fe.cartridge[1].state, CartState::Error);

        // Only a power cycle clears the error state.
        femc.bus.io.stuck_busy = false;
        femc.cartridge_power_off(1);
        assert_eq!(femc.fe.cartridge[1].state, CartState::Off);
        femc.cartridge_power_on(1);
        while femc.step_cartridge_init() {}
        assert_eq!(femc.fe.cartridge[1].state, CartState::Ready);
    }

    #[test]
    fn test_observe_follows_band_selection() {
        let mut femc = booted_femc();
        power_on_ready(&mut femc, 2);
        power_on_ready(&mut femc, 3);

        control(&mut femc, addr::if_band_select() + addr::CONTROL_OFFSET, &[2]);
        assert_eq!(femc.fe.cartridge[2].state, CartState::Observing);

        // Selecting another band hands observation over.
        control(&mut femc, addr::if_band_select() + addr::CONTROL_OFFSET, &[3]);
        assert_eq!(femc.fe.cartridge[2].state, CartState::Ready);
        assert_eq!(femc.fe.cartridge[3].state, CartState::Observing);

        // Selecting an unpowered band does not promote it.
        control(&mut femc, addr::if_band_select() + addr::CONTROL_OFFSET, &[5]);
        assert_eq!(femc.fe.cartridge[5].state, CartState::Off);
        assert_eq!(femc.fe.cartridge[3].state, CartState::Ready);
    }

    #[test]
    fn test_power_off_cancels_queued_init() {
        let mut femc = booted_femc();
        femc.cartridge_power_on(4);
        femc.cartridge_power_off(4);
        assert!(!femc.step_cartridge_init());
        assert_eq!(femc.fe.cartridge[4].state, CartState::Off);
    }
}
