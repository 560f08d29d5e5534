//! Device handlers.
//!
//! Every handler follows the same three-way split on an incoming request:
//!
//! - control on a control RCA: save the payload into the last-control
//!   record, run the guards, touch the hardware, store the outcome status;
//! - monitor on a control RCA: echo the last-control record verbatim;
//! - monitor on a monitor RCA: read hardware (or the cache), grade the
//!   value against its ranges, fill the reply payload.
//!
//! Controls never emit a reply; their outcome is only observable through
//! the last-control record and the error ring.

pub mod cartridge;
pub mod cryostat;
pub mod fetim;
pub mod ifswitch;
pub mod lpr;
pub mod power;

use femc_core::frame::{CanFrame, Class, LastControl};
use femc_core::oper::Analog;
use femc_core::ring::{codes, ErrModule, ErrorRing};
use femc_core::status::Status;
use femc_core::wire;

use crate::serial::SerialFail;

/// A decoded standard request.
#[derive(Debug, Clone, Copy)]
pub struct Request {
    pub frame: CanFrame,
    pub class: Class,
    /// Submodule field (bits 0-11).
    pub sub: u32,
}

impl Request {
    pub fn is_monitor(&self) -> bool {
        self.frame.is_monitor()
    }

    /// Monitor request that landed on a control RCA.
    pub fn on_control_rca(&self) -> bool {
        self.class == Class::Control
    }

    pub fn byte(&self) -> u8 {
        self.frame.data[0]
    }

    /// Extract a float control payload.
    pub fn f32(&self) -> Option<f32> {
        (self.frame.size >= 4).then(|| wire::take_f32(self.frame.payload()))
    }

    /// Extract a u16 control payload.
    pub fn u16(&self) -> Option<u16> {
        (self.frame.size >= 2).then(|| wire::take_u16(self.frame.payload()))
    }
}

/// Echo a last-control record into the reply.
pub(crate) fn echo_last(out: &mut CanFrame, last: &LastControl) {
    last.echo(out);
}

/// Store a fresh analog reading (or its failure) and fill the reply.
pub(crate) fn finish_analog(
    out: &mut CanFrame,
    errors: &mut ErrorRing,
    module: ErrModule,
    analog: &mut Analog,
    read: Result<f32, SerialFail>,
) {
    let read = read.map(|v| {
        analog.update(v);
    });
    if read == Err(SerialFail::Conversion) {
        analog.invalidate();
    }
    finish_stored(out, errors, module, analog, read);
}

/// Fill the reply for an analog point whose value is already stored in
/// the tree.
pub(crate) fn finish_stored(
    out: &mut CanFrame,
    errors: &mut ErrorRing,
    module: ErrModule,
    analog: &Analog,
    read: Result<(), SerialFail>,
) {
    out.status = match read {
        Ok(()) => {
            let status = analog.status();
            match status {
                Status::ErrorRange => errors.store(module, codes::dev::ERROR_RANGE),
                Status::WarnRange => errors.store(module, codes::dev::WARN_RANGE),
                _ => {}
            }
            status
        }
        // The last known value still goes out with the failure status.
        Err(SerialFail::Hardware) => Status::Error,
        Err(SerialFail::Retry) => Status::HardwRetry,
        Err(SerialFail::Conversion) => Status::HardwConvError,
    };
    wire::put_readback(&mut out.data, 0, analog.value);
    out.size = 4;
}

/// Reply with one byte.
pub(crate) fn reply_byte(out: &mut CanFrame, value: u8) {
    out.data[0] = value;
    out.size = 1;
}

/// Reply with a big-endian u16.
pub(crate) fn reply_u16(out: &mut CanFrame, value: u16) {
    wire::put_u16(&mut out.data, 0, value);
    out.size = 2;
}

/// Reply with a big-endian u32 (cold-head hours).
pub(crate) fn reply_u32(out: &mut CanFrame, value: u32) {
    out.data[..4].copy_from_slice(&value.to_be_bytes());
    out.size = 4;
}

/// Control message arrived on a monitor-only point: log and drop.
pub(crate) fn reject_control(errors: &mut ErrorRing, module: ErrModule) {
    errors.store(module, codes::dev::ILLEGAL_CONTROL);
}

/// Monitor arrived on the control RCA of a point that has no control:
/// range error on the reply.
pub(crate) fn reject_monitor(out: &mut CanFrame, errors: &mut ErrorRing, module: ErrModule) {
    errors.store(module, codes::dev::ILLEGAL_MONITOR);
    out.status = Status::CanRange;
}

/// Submodule decode fell outside the device's declared range.
pub(crate) fn submodule_range(out: &mut CanFrame, errors: &mut ErrorRing, module: ErrModule) {
    errors.store(module, codes::dev::SUBMODULE_RANGE);
    out.status = Status::HardwRange;
}
