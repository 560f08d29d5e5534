//! Front-end monitor and control firmware core.
//!
//! A supervisory host drives this node over the CAN bus; every request is
//! a 29-bit relative CAN address decoded into class / module / submodule
//! and routed to a device handler. Handlers read and write the cached
//! device tree and, where needed, reach the hardware through the
//! synchronous serial bus. Between requests the main loop steps the
//! cooperative background jobs: cartridge initialization and the slow
//! cryogenic temperature/pressure acquisition.
//!
//! The hardware seams are traits: [`femc_bus::PortIo`] for the serial
//! multiplexing board, [`link::CanLink`] for the parallel-port CAN
//! adapter, and the collaborator traits in [`config`] for INI
//! configuration, persisted state and one-wire ESN discovery.

pub mod addr;
pub mod asyncmon;
pub mod config;
pub mod devices;
pub mod dispatch;
pub mod lifecycle;
pub mod link;
pub mod mainloop;
pub mod serial;
pub mod special;
pub mod state;
pub mod testing;
pub mod version;

pub use config::{ConfigSource, OwbScan, Persist};
pub use link::{CanLink, Mailbox};
pub use mainloop::{Femc, Stop};
pub use state::{FeMode, Frontend};
