//! Test support: scripted CAN link, no-op collaborators, a fully wired
//! [`Femc`] over the mock bus.

use std::collections::VecDeque;

use femc_bus::testing::MockBus;
use femc_core::frame::CanFrame;
use femc_core::timer::testing::FakeClock;

use crate::config::{FrontendConfig, MemPersist, OwbError, OwbScan};
use crate::link::CanLink;
use crate::mainloop::Femc;

/// Queue-backed link: push requests, collect replies.
#[derive(Debug, Default)]
pub struct ScriptLink {
    pub inbound: VecDeque<CanFrame>,
    pub sent: Vec<CanFrame>,
}

impl ScriptLink {
    pub fn new() -> Self {
        ScriptLink::default()
    }

    pub fn push(&mut self, frame: CanFrame) {
        self.inbound.push_back(frame);
    }
}

impl CanLink for ScriptLink {
    fn try_recv(&mut self) -> Option<CanFrame> {
        self.inbound.pop_front()
    }

    fn send(&mut self, frame: &CanFrame) {
        self.sent.push(*frame);
    }
}

/// One-wire scan returning a fixed device list.
#[derive(Debug, Default)]
pub struct FixedOwb {
    pub esns: Vec<[u8; 8]>,
    pub fail: bool,
}

impl OwbScan for FixedOwb {
    fn scan(&mut self) -> Result<Vec<[u8; 8]>, OwbError> {
        if self.fail {
            Err(OwbError)
        } else {
            Ok(self.esns.clone())
        }
    }
}

/// The controller type every unit test drives.
pub type BootedFemc = Femc<MockBus, FakeClock>;

/// Dispatch a monitor request and unwrap the reply.
pub fn monitor(femc: &mut Femc<MockBus, FakeClock>, rca: u32) -> CanFrame {
    femc.dispatch(CanFrame::monitor(rca))
        .expect("monitor requests always produce a reply")
}

/// Dispatch a control request (controls never reply).
pub fn control(femc: &mut Femc<MockBus, FakeClock>, rca: u32, payload: &[u8]) {
    assert!(femc.dispatch(CanFrame::control(rca, payload)).is_none());
}

/// Power a cartridge on through the power distribution and pump its
/// initialization to Ready.
pub fn power_on_ready(femc: &mut Femc<MockBus, FakeClock>, cartridge: u8) {
    control(
        femc,
        crate::addr::pd_module_enable(cartridge as u32) + crate::addr::CONTROL_OFFSET,
        &[1],
    );
    while femc.step_cartridge_init() {}
}

/// A booted controller over the mock bus with every cartridge configured
/// as installed.
pub fn booted_femc() -> Femc<MockBus, FakeClock> {
    booted_femc_with(|_| {})
}

/// Same, with a configuration tweak applied before boot.
pub fn booted_femc_with(tweak: impl FnOnce(&mut FrontendConfig)) -> Femc<MockBus, FakeClock> {
    let mut config = FrontendConfig::default();
    for cart in &mut config.cartridge {
        cart.available = true;
    }
    config.fetim_available = true;
    tweak(&mut config);

    let mut femc = Femc::new(MockBus::new(), FakeClock::auto_advancing(1));
    let mut persist = MemPersist::default();
    let mut owb = FixedOwb::default();
    femc.init(&config, &mut persist, &mut owb)
        .expect("mock boot cannot fail the readiness probe");
    femc
}
