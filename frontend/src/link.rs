//! CAN link seam and the interrupt mailbox.
//!
//! The parallel-port collaborator owns byte-level framing and the
//! handshake with the bus adapter; this crate consumes fully framed
//! messages through [`CanLink`]. The [`Mailbox`] is the handover point
//! for an interrupt-driven implementation: the ISR posts the frame and
//! raises the flag, the main loop drains it outside interrupt context.

use core::sync::atomic::{AtomicBool, Ordering};

use femc_core::frame::CanFrame;

/// Framed CAN traffic with the bus adapter.
pub trait CanLink {
    /// A received frame, if one is pending. Non-blocking.
    fn try_recv(&mut self) -> Option<CanFrame>;

    /// Ship a monitor reply back to the adapter.
    fn send(&mut self, frame: &CanFrame);
}

/// Single-slot frame mailbox between the receive ISR and the main loop.
///
/// The ISR only touches the slot and the flag; the main loop owns
/// everything else. A frame arriving before the previous one was drained
/// overwrites it, matching the single-outstanding-request bus protocol.
#[derive(Default)]
pub struct Mailbox {
    slot: spin::Mutex<Option<CanFrame>>,
    pending: AtomicBool,
}

impl Mailbox {
    pub const fn new() -> Self {
        Mailbox {
            slot: spin::Mutex::new(None),
            pending: AtomicBool::new(false),
        }
    }

    /// ISR side: deposit a received frame.
    pub fn post(&self, frame: CanFrame) {
        *self.slot.lock() = Some(frame);
        self.pending.store(true, Ordering::Release);
    }

    /// Main-loop side: drain the pending frame, if any.
    pub fn take(&self) -> Option<CanFrame> {
        if !self.pending.swap(false, Ordering::Acquire) {
            return None;
        }
        self.slot.lock().take()
    }

    /// Whether a frame is waiting (cheap flag probe).
    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_post_take() {
        let mailbox = Mailbox::new();
        assert!(!mailbox.is_pending());
        mailbox.post(CanFrame::monitor(0x20002));
        assert!(mailbox.is_pending());
        let frame = mailbox.take().unwrap();
        assert_eq!(frame.rca, 0x20002);
        assert!(mailbox.take().is_none());
    }

    #[test]
    fn test_late_drain_sees_newest() {
        let mailbox = Mailbox::new();
        mailbox.post(CanFrame::monitor(0x1));
        mailbox.post(CanFrame::monitor(0x2));
        assert_eq!(mailbox.take().unwrap().rca, 0x2);
    }
}
