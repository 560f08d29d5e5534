//! Orchestration: boot, the main loop, shutdown.
//!
//! # Entry contract
//!
//! The embedding binary owns the hardware bring-up (port I/O mapping, the
//! parallel-port ISR, the tick source) and the out-of-scope collaborators
//! (INI layer, persisted records, one-wire discovery). It then drives
//! this module: [`Femc::new`] → [`Femc::init`] → [`Femc::run`] →
//! [`Femc::shutdown`], and reboots or exits on the returned [`Stop`].
//!
//! The loop itself is single-threaded and cooperative: one CAN request
//! per iteration when one is pending, otherwise one cartridge-init step
//! or one background acquisition step.

use femc_bus::{BusCtl, MuxError, PortIo};
use femc_core::ring::{codes, ErrModule, ErrorRing};
use femc_core::timer::Clock;
use thiserror::Error;

use crate::asyncmon::AsyncMonitor;
use crate::config::{ConfigSource, OwbScan, Persist};
use crate::lifecycle::InitPump;
use crate::link::CanLink;
use crate::special::EsnTable;
use crate::state::{FeMode, Frontend};

/// Why the main loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stop {
    /// Graceful exit requested.
    Exit,
    /// The operator asked for a reboot; the embedding binary resets the
    /// board after shutdown.
    Reboot,
}

/// Boot failure. All of these are fatal: the process reports and exits
/// (the embedded convention for "reboot required").
#[derive(Debug, Error)]
pub enum InitError {
    #[error("serial multiplexing board failed the readiness probe")]
    MuxNotReady(#[from] MuxError),
}

/// The firmware core: device tree, bus controller, services.
pub struct Femc<P: PortIo, C: Clock> {
    pub fe: Frontend,
    pub bus: BusCtl<P, C>,
    pub errors: ErrorRing,
    pub esns: EsnTable,
    pub console_enabled: bool,
    pub(crate) stop: Option<Stop>,
    pub(crate) rescan_esns: bool,
    pub(crate) init_pump: InitPump,
    pub(crate) asyncmon: AsyncMonitor,
}

impl<P: PortIo, C: Clock> Femc<P, C> {
    pub fn new(io: P, clock: C) -> Self {
        Femc {
            fe: Frontend::default(),
            bus: BusCtl::new(io, clock),
            errors: ErrorRing::new(),
            esns: EsnTable::default(),
            console_enabled: false,
            stop: None,
            rescan_esns: false,
            init_pump: InitPump::default(),
            asyncmon: AsyncMonitor::default(),
        }
    }

    /// Boot-time initialization.
    ///
    /// The tree is built in Maintenance mode so nothing standard is
    /// served until every subsystem is configured; the mode switches to
    /// Operational only at the very end.
    pub fn init(
        &mut self,
        config: &dyn ConfigSource,
        persist: &mut dyn Persist,
        owb: &mut dyn OwbScan,
    ) -> Result<(), InitError> {
        log::info!("initializing front end");

        // The gateware must be up before anything touches the serial bus.
        self.bus.ready()?;

        // Gather the device IDs present on the one-wire bus. A failed
        // scan is not fatal; the list just stays empty.
        match owb.scan() {
            Ok(esns) => {
                persist.save_esn_list(&esns);
                self.esns.replace(esns);
            }
            Err(_) => {
                self.errors.store(ErrModule::Owb, codes::owb::SCAN_FAILED);
            }
        }

        self.fe = Frontend::from_config(&config.frontend());
        self.fe.mode = FeMode::Maintenance;

        self.fe.cryostat.cold_head_hours = persist.load_cold_head_hours();

        self.fe.mode = FeMode::Operational;
        log::info!("front end operational");
        Ok(())
    }

    /// One main-loop iteration: serve a pending request, else advance the
    /// cooperative background work. Returns the stop request once one has
    /// been received.
    pub fn poll<L: CanLink>(
        &mut self,
        link: &mut L,
        persist: &mut dyn Persist,
        owb: &mut dyn OwbScan,
    ) -> Option<Stop> {
        if let Some(frame) = link.try_recv() {
            if let Some(reply) = self.dispatch(frame) {
                link.send(&reply);
            }
        } else if self.rescan_esns {
            self.rescan_esns = false;
            match owb.scan() {
                Ok(esns) => {
                    persist.save_esn_list(&esns);
                    self.esns.replace(esns);
                }
                Err(_) => {
                    self.errors.store(ErrModule::Owb, codes::owb::SCAN_FAILED);
                }
            }
        } else if !self.step_cartridge_init() {
            self.async_step(persist);
        }
        self.stop.take()
    }

    /// Run until an exit or reboot request arrives.
    pub fn run<L: CanLink>(
        &mut self,
        link: &mut L,
        persist: &mut dyn Persist,
        owb: &mut dyn OwbScan,
    ) -> Stop {
        loop {
            if let Some(stop) = self.poll(link, persist, owb) {
                return stop;
            }
        }
    }

    /// Orderly teardown: stop serving standard traffic, power the
    /// cartridges down, flush the hour counter.
    pub fn shutdown(&mut self, persist: &mut dyn Persist) {
        log::info!("shutting down front end");
        self.fe.mode = FeMode::Maintenance;
        for cartridge in 0..self.fe.cartridge.len() as u8 {
            if self.fe.cartridge[cartridge as usize].is_powered() {
                let _ = self.pd_set_enable(cartridge, crate::state::PdEnable::Off);
                self.cartridge_power_off(cartridge);
            }
        }
        if self.fe.cryostat.hours_dirty {
            persist.save_cold_head_hours(self.fe.cryostat.cold_head_hours);
            self.fe.cryostat.hours_dirty = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use femc_core::frame::{CanFrame, BASE_SPECIAL_CONTROL_RCA, BASE_SPECIAL_MONITOR_RCA};

    use super::*;
    use crate::config::MemPersist;
    use crate::special;
    use crate::testing::{booted_femc, FixedOwb, ScriptLink};

    #[test]
    fn test_poll_serves_requests_before_background_work() {
        let mut femc = booted_femc();
        let mut link = ScriptLink::new();
        let mut persist = MemPersist::default();
        let mut owb = FixedOwb::default();

        link.push(CanFrame::monitor(
            BASE_SPECIAL_MONITOR_RCA + special::GET_VERSION,
        ));
        assert!(femc.poll(&mut link, &mut persist, &mut owb).is_none());
        assert_eq!(link.sent.len(), 1);
        assert_eq!(link.sent[0].size, 3);

        // Idle iterations advance the background monitor instead.
        assert!(femc.poll(&mut link, &mut persist, &mut owb).is_none());
        assert_eq!(link.sent.len(), 1);
    }

    #[test]
    fn test_exit_request_stops_the_loop() {
        let mut femc = booted_femc();
        let mut link = ScriptLink::new();
        let mut persist = MemPersist::default();
        let mut owb = FixedOwb::default();

        link.push(CanFrame::control(
            BASE_SPECIAL_CONTROL_RCA + special::SET_EXIT_PROGRAM,
            &[1],
        ));
        assert_eq!(femc.run(&mut link, &mut persist, &mut owb), Stop::Exit);
        // Controls never produce replies.
        assert!(link.sent.is_empty());
    }

    #[test]
    fn test_esn_rescan_serviced_from_the_loop() {
        let mut femc = booted_femc();
        let mut link = ScriptLink::new();
        let mut persist = MemPersist::default();
        let mut owb = FixedOwb {
            esns: vec![[9; 8]],
            fail: false,
        };

        link.push(CanFrame::control(
            BASE_SPECIAL_CONTROL_RCA + special::SET_READ_ESN,
            &[1],
        ));
        femc.poll(&mut link, &mut persist, &mut owb);
        assert_eq!(femc.esns.count(), 0); // not yet serviced
        femc.poll(&mut link, &mut persist, &mut owb);
        assert_eq!(femc.esns.count(), 1);
        assert_eq!(persist.esns, vec![[9; 8]]);
    }

    #[test]
    fn test_boot_fails_without_gateware() {
        let mut femc = Femc::new(
            femc_bus::testing::MockBus::new(),
            femc_core::timer::testing::FakeClock::new(),
        );
        femc.bus.io.fpga_ready = 0;
        let mut persist = MemPersist::default();
        let mut owb = FixedOwb::default();
        let config = crate::config::FrontendConfig::default();
        assert!(femc.init(&config, &mut persist, &mut owb).is_err());
    }

    #[test]
    fn test_shutdown_powers_cartridges_down() {
        let mut femc = booted_femc();
        crate::testing::power_on_ready(&mut femc, 1);
        let mut persist = MemPersist::default();
        femc.shutdown(&mut persist);
        assert!(!femc.fe.cartridge[1].is_powered());
        assert_eq!(femc.fe.mode, FeMode::Maintenance);
    }
}
