//! CAN message container and 29-bit RCA decode.
//!
//! The Relative CAN Address partitions into class (bits 16–17), module
//! (bits 12–15) and submodule (bits 0–11). Payload size zero is the only
//! thing that distinguishes a monitor request from a control request.

use crate::status::Status;

/// Maximum CAN payload.
pub const PAYLOAD_SIZE: usize = 8;

/// Class field extraction.
pub const CLASS_MASK: u32 = 0x30000;
pub const CLASS_SHIFT: u32 = 16;
/// Module field extraction.
pub const MODULE_MASK: u32 = 0x0F000;
pub const MODULE_SHIFT: u32 = 12;
/// Submodule field (decoded further by each device).
pub const SUBMODULE_MASK: u32 = 0x00FFF;

/// Standard RCA ranges. Address 0x00000 is reserved by the bus adapter to
/// return its ID, so the first addressable monitor RCA is 1.
pub const BASE_MONITOR_RCA: u32 = 0x00001;
pub const LAST_MONITOR_RCA: u32 = BASE_MONITOR_RCA + 0x0FFFF;
pub const BASE_CONTROL_RCA: u32 = 0x10000;
pub const LAST_CONTROL_RCA: u32 = BASE_CONTROL_RCA + 0x0FFFF;

/// Special RCA ranges. 0x20000 and 0x20001 are registered inside the bus
/// adapter firmware; 0x20002 is the first special monitor served here.
pub const BASE_SPECIAL_MONITOR_RCA: u32 = 0x20000;
pub const FIRST_SPECIAL_MONITOR_RCA: u32 = BASE_SPECIAL_MONITOR_RCA + 0x02;
pub const LAST_SPECIAL_MONITOR_RCA: u32 = BASE_SPECIAL_MONITOR_RCA + 0x0FFF;
pub const BASE_SPECIAL_CONTROL_RCA: u32 = 0x21000;
pub const LAST_SPECIAL_CONTROL_RCA: u32 = BASE_SPECIAL_CONTROL_RCA + 0x0FFF;

/// Number of cartridge slots in the receiver.
pub const CARTRIDGES: usize = 10;

/// RCA class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Class {
    Monitor,
    Control,
    Special,
    Reserved,
}

/// Module field of a standard RCA.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleId {
    /// Cartridge slot 0–9 (band 1–10).
    Cartridge(u8),
    PowerDist,
    IfSwitch,
    Cryostat,
    Lpr,
    Fetim,
}

impl ModuleId {
    /// Decode bits 12–15. Slot 15 is unassigned.
    pub fn from_field(field: u8) -> Option<Self> {
        match field {
            0..=9 => Some(ModuleId::Cartridge(field)),
            10 => Some(ModuleId::PowerDist),
            11 => Some(ModuleId::IfSwitch),
            12 => Some(ModuleId::Cryostat),
            13 => Some(ModuleId::Lpr),
            14 => Some(ModuleId::Fetim),
            _ => None,
        }
    }

    /// Raw module number as used in serial-bus port selection.
    pub fn index(self) -> u8 {
        match self {
            ModuleId::Cartridge(n) => n,
            ModuleId::PowerDist => 10,
            ModuleId::IfSwitch => 11,
            ModuleId::Cryostat => 12,
            ModuleId::Lpr => 13,
            ModuleId::Fetim => 14,
        }
    }
}

/// Decoded 29-bit relative CAN address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rca(pub u32);

impl Rca {
    #[inline]
    pub fn class_field(self) -> u8 {
        ((self.0 & CLASS_MASK) >> CLASS_SHIFT) as u8
    }

    pub fn class(self) -> Class {
        match self.class_field() {
            0 => Class::Monitor,
            1 => Class::Control,
            2 => Class::Special,
            _ => Class::Reserved,
        }
    }

    #[inline]
    pub fn module_field(self) -> u8 {
        ((self.0 & MODULE_MASK) >> MODULE_SHIFT) as u8
    }

    pub fn module(self) -> Option<ModuleId> {
        ModuleId::from_field(self.module_field())
    }

    #[inline]
    pub fn submodule(self) -> u32 {
        self.0 & SUBMODULE_MASK
    }
}

/// A CAN message as exchanged with the bus adapter.
///
/// `size == 0` marks a monitor request. For monitor replies the device
/// payload is followed by one status byte appended by the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanFrame {
    pub rca: u32,
    pub size: u8,
    pub data: [u8; PAYLOAD_SIZE],
    pub status: Status,
}

impl CanFrame {
    /// Build a monitor request (empty payload).
    pub fn monitor(rca: u32) -> Self {
        CanFrame {
            rca,
            size: 0,
            data: [0; PAYLOAD_SIZE],
            status: Status::Ok,
        }
    }

    /// Build a control request carrying `payload`.
    ///
    /// Payloads longer than eight bytes are a collaborator protocol
    /// error; the excess is truncated.
    pub fn control(rca: u32, payload: &[u8]) -> Self {
        let mut frame = CanFrame::monitor(rca);
        let n = payload.len().min(PAYLOAD_SIZE);
        frame.data[..n].copy_from_slice(&payload[..n]);
        frame.size = n as u8;
        frame
    }

    #[inline]
    pub fn rca(&self) -> Rca {
        Rca(self.rca)
    }

    #[inline]
    pub fn is_monitor(&self) -> bool {
        self.size == 0
    }

    /// Valid payload bytes.
    pub fn payload(&self) -> &[u8] {
        &self.data[..self.size as usize]
    }

    /// Reset payload before a handler fills it in.
    pub fn clear_payload(&mut self) {
        self.size = 0;
        self.data = [0; PAYLOAD_SIZE];
    }

    /// Append the status byte after the payload, if it fits.
    pub fn append_status(&mut self) {
        if (self.size as usize) < PAYLOAD_SIZE {
            self.data[self.size as usize] = self.status as u8;
            self.size += 1;
        }
    }
}

/// Record of the last control command issued to a control point.
///
/// A monitor request landing on a control RCA is answered with this record
/// verbatim, including the status the control produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LastControl {
    pub size: u8,
    pub data: [u8; PAYLOAD_SIZE],
    pub status: Status,
}

impl LastControl {
    /// Store the incoming control payload with a fresh Ok status.
    pub fn save(&mut self, frame: &CanFrame) {
        self.size = frame.size;
        self.data = frame.data;
        self.status = Status::Ok;
    }

    /// Copy the record into an outgoing reply.
    pub fn echo(&self, reply: &mut CanFrame) {
        reply.size = self.size;
        reply.data = self.data;
        reply.status = self.status;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rca_decode() {
        // Control class, cryostat module, submodule 0x05C
        let rca = Rca(0x1C05C);
        assert_eq!(rca.class(), Class::Control);
        assert_eq!(rca.module(), Some(ModuleId::Cryostat));
        assert_eq!(rca.submodule(), 0x05C);
    }

    #[test]
    fn test_cartridge_modules() {
        for band in 0..10u8 {
            let rca = Rca((band as u32) << MODULE_SHIFT);
            assert_eq!(rca.module(), Some(ModuleId::Cartridge(band)));
        }
        assert_eq!(Rca(0xF000).module(), None);
    }

    #[test]
    fn test_monitor_vs_control() {
        assert!(CanFrame::monitor(0x1).is_monitor());
        assert!(!CanFrame::control(0x10001, &[1]).is_monitor());
    }

    #[test]
    fn test_control_truncates_oversize_payload() {
        let frame = CanFrame::control(0x10001, &[0; 12]);
        assert_eq!(frame.size, 8);
    }

    #[test]
    fn test_append_status_fits() {
        let mut frame = CanFrame::monitor(0x1);
        frame.data[0] = 0xAB;
        frame.size = 1;
        frame.status = Status::HardwBlocked;
        frame.append_status();
        assert_eq!(frame.payload(), &[0xAB, 0xFD]);
    }

    #[test]
    fn test_append_status_full_payload() {
        let mut frame = CanFrame::monitor(0x1);
        frame.size = 8;
        frame.append_status();
        assert_eq!(frame.size, 8); // no room, payload unchanged
    }

    #[test]
    fn test_last_control_round_trip() {
        let control = CanFrame::control(0x10001, &[7, 8, 9]);
        let mut last = LastControl::default();
        last.save(&control);
        last.status = Status::HardwBlocked;

        let mut reply = CanFrame::monitor(0x10001);
        last.echo(&mut reply);
        assert_eq!(reply.payload(), &[7, 8, 9]);
        assert_eq!(reply.status, Status::HardwBlocked);
    }
}
