//! Synchronous serial bus access.
//!
//! All remote devices hang off one multiplexing board mapped into the ISA
//! I/O space. This crate owns the two layers between a device handler and
//! that board:
//!
//! - [`mux`]: the board driver. Frame build, busy-wait with timeout, the
//!   write and read cycles, and the boot-time readiness probe.
//! - [`access`]: value-level register access on top of the raw frames.
//!   64-bit intermediate, pre/post shifting, low-word-first packing, and
//!   the port selection rule.
//!
//! Hardware access goes through the [`PortIo`] seam so the whole stack runs
//! against a mock in tests.

pub mod access;
pub mod io;
pub mod mux;
pub mod testing;

pub use access::{cartridge_port, module_port, AccessError, BusCtl, CartSubsystem, Shift};
pub use io::{regs, PortIo};
pub use mux::{MuxError, MuxFrame, FRAME_DATA_BITS};
