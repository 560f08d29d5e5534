//! Shared foundation for the front-end monitor and control firmware.
//!
//! This crate carries the pieces every other layer depends on: the CAN
//! message container and RCA decode, the wire status byte, the explicit
//! endian flips at the protocol boundary, operation ranges, the lossy
//! error history ring drained over CAN, and the named timer service.
//!
//! Nothing in here touches hardware.

pub mod frame;
pub mod oper;
pub mod ring;
pub mod status;
pub mod timer;
pub mod wire;

pub use frame::{CanFrame, Class, LastControl, ModuleId, Rca};
pub use oper::{Analog, OpRange, RangeCheck};
pub use ring::{codes, ErrModule, ErrorRing};
pub use status::Status;
pub use timer::{Clock, TimerBank, TimerError, TimerId, TimerState};
