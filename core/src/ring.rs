//! Error history ring.
//!
//! Faults are recorded as `(module, code)` pairs packed into a `u16` and
//! kept in a fixed lossy ring: the writer never blocks and the oldest entry
//! is dropped once the ring is full. The supervisory host reconstructs the
//! firmware's view of faults by polling the outstanding count and draining
//! entries one at a time over CAN.

/// Ring capacity. After more insertions than this, exactly the most recent
/// `HISTORY_LENGTH` entries remain.
pub const HISTORY_LENGTH: usize = 255;

/// Wire value returned when draining an empty ring.
pub const NO_ERROR_ENTRY: u16 = 0xFFFF;

/// Module identifiers used in error entries (high byte).
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrModule {
    Error = 0x00,
    ParallelPort = 0x02,
    Can = 0x03,
    Cartridge = 0x04,
    CartridgeTemp = 0x05,
    Lo = 0x06,
    Pll = 0x07,
    Yto = 0x08,
    Photomixer = 0x09,
    Amc = 0x0A,
    Pa = 0x0B,
    PaChannel = 0x0C,
    Polarization = 0x0D,
    Sideband = 0x0E,
    LnaLed = 0x0F,
    SisHeater = 0x10,
    Sis = 0x12,
    SisMagnet = 0x13,
    Lna = 0x14,
    LnaStage = 0x15,
    SerialInterface = 0x18,
    SerialMux = 0x19,
    Timer = 0x1A,
    BiasSerial = 0x1B,
    LoSerial = 0x1C,
    PowerDist = 0x1D,
    PdModule = 0x1E,
    PdChannel = 0x1F,
    PdSerial = 0x20,
    IfChannel = 0x21,
    IfSwitch = 0x22,
    IfSerial = 0x23,
    Cryostat = 0x24,
    TurboPump = 0x25,
    VacuumController = 0x26,
    GateValve = 0x27,
    SolenoidValve = 0x28,
    VacuumSensor = 0x29,
    CryostatTemp = 0x2A,
    CryoSerial = 0x2B,
    EdfaModInput = 0x2C,
    EdfaPhotoDetector = 0x2D,
    EdfaLaser = 0x2E,
    Edfa = 0x2F,
    OpticalSwitch = 0x30,
    Lpr = 0x31,
    LprTemp = 0x32,
    LprSerial = 0x33,
    Ini = 0x35,
    Owb = 0x36,
    Fetim = 0x37,
    FetimInterlock = 0x38,
    FetimCompressor = 0x39,
    InterlockSensors = 0x3A,
    InterlockState = 0x3B,
    InterlockTemp = 0x3C,
    InterlockFlow = 0x3D,
    InterlockGlitch = 0x3E,
    FetimExtTemp = 0x3F,
    He2Press = 0x40,
}

/// Error codes (low byte of an entry).
pub mod codes {
    /// Codes shared by every device handler.
    pub mod dev {
        pub const SUBMODULE_RANGE: u8 = 0x01; // Addressed submodule does not exist
        pub const ILLEGAL_CONTROL: u8 = 0x02; // Control message on a monitor-only point
        pub const ILLEGAL_MONITOR: u8 = 0x03; // Monitor request on a control-only point
        pub const SET_RANGE: u8 = 0x04; // Commanded value outside the settable window
        pub const ERROR_RANGE: u8 = 0x05; // Readback in the error range
        pub const WARN_RANGE: u8 = 0x06; // Readback in the warning range
        pub const NOT_INSTALLED: u8 = 0x07; // Device flagged unavailable at init
    }

    pub mod can {
        pub const CLASS_RANGE: u8 = 0x01;
        pub const MODULE_RANGE: u8 = 0x02;
        pub const CONTROL_ON_MONITOR: u8 = 0x04;
        pub const SPECIAL_MONITOR_RANGE: u8 = 0x05;
        pub const SPECIAL_CONTROL_RANGE: u8 = 0x06;
        pub const ILLEGAL_MODE: u8 = 0x07;
        pub const MAINTENANCE_MODE: u8 = 0x08;
    }

    pub mod serial_mux {
        pub const DATA_LENGTH: u8 = 0x01;
        pub const BUSY_TIMEOUT: u8 = 0x02;
        pub const NOT_READY: u8 = 0x03;
    }

    pub mod serial_interface {
        pub const COMMAND_RANGE: u8 = 0x01;
    }

    pub mod timer {
        pub const ALREADY_RUNNING: u8 = 0x02;
    }

    pub mod adc {
        pub const READY_TIMEOUT: u8 = 0x01;
    }

    pub mod cryostat {
        pub const BACKING_PUMP_OFF: u8 = 0x06; // 230 V current needs the pump electronics
    }

    pub mod gate_valve {
        pub const BACKING_PUMP_OFF: u8 = 0x03;
        pub const VALVE_MOVING: u8 = 0x04;
    }

    pub mod solenoid_valve {
        pub const BACKING_PUMP_OFF: u8 = 0x03;
        pub const VALVE_MOVING: u8 = 0x04;
    }

    pub mod turbo_pump {
        pub const BACKING_PUMP_OFF: u8 = 0x08;
        pub const TEMP_OUT_OF_RANGE: u8 = 0x09;
    }

    pub mod pd_module {
        pub const POWER_CAP: u8 = 0x08; // Powered-module cap reached
        pub const STANDBY2_DENIED: u8 = 0x09; // Cartridge not Ready/Observing
    }

    pub mod cartridge {
        pub const NOT_POWERED: u8 = 0x08;
        pub const INIT_FAILED: u8 = 0x09;
    }

    pub mod pa_channel {
        pub const TEMP_BLOCKED: u8 = 0x08; // Cryostat above the PA-safe temperature
    }

    pub mod optical_switch {
        pub const SWITCH_TIMEOUT: u8 = 0x08;
    }

    pub mod fetim {
        pub const SHUTDOWN_LATCHED: u8 = 0x08;
    }

    pub mod owb {
        pub const SCAN_FAILED: u8 = 0x01;
    }
}

/// Pack a `(module, code)` pair the way it goes on the wire.
#[inline]
pub fn pack(module: ErrModule, code: u8) -> u16 {
    ((module as u16) << 8) | code as u16
}

/// Lossy fault history.
#[derive(Clone)]
pub struct ErrorRing {
    entries: [u16; HISTORY_LENGTH],
    head: usize,
    tail: usize,
    len: usize,
}

impl ErrorRing {
    pub fn new() -> Self {
        ErrorRing {
            entries: [0; HISTORY_LENGTH],
            head: 0,
            tail: 0,
            len: 0,
        }
    }

    /// Record a fault. Never blocks; drops the oldest entry when full.
    pub fn store(&mut self, module: ErrModule, code: u8) {
        log::warn!("fault: {:?} code {:#04x}", module, code);
        if self.len == HISTORY_LENGTH {
            self.tail = (self.tail + 1) % HISTORY_LENGTH;
        } else {
            self.len += 1;
        }
        self.entries[self.head] = pack(module, code);
        self.head = (self.head + 1) % HISTORY_LENGTH;
    }

    /// Outstanding (unread) entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Drain the oldest unread entry.
    pub fn take_next(&mut self) -> Option<u16> {
        if self.len == 0 {
            return None;
        }
        let entry = self.entries[self.tail];
        self.tail = (self.tail + 1) % HISTORY_LENGTH;
        self.len -= 1;
        Some(entry)
    }
}

impl Default for ErrorRing {
    fn default() -> Self {
        ErrorRing::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drain_in_order() {
        let mut ring = ErrorRing::new();
        ring.store(ErrModule::Can, 0x01);
        ring.store(ErrModule::GateValve, 0x03);
        assert_eq!(ring.len(), 2);
        assert_eq!(ring.take_next(), Some(pack(ErrModule::Can, 0x01)));
        assert_eq!(ring.take_next(), Some(pack(ErrModule::GateValve, 0x03)));
        assert_eq!(ring.take_next(), None);
    }

    #[test]
    fn test_overflow_keeps_most_recent() {
        let mut ring = ErrorRing::new();
        for i in 0..(HISTORY_LENGTH + 10) {
            ring.store(ErrModule::Timer, (i % 251) as u8);
        }
        assert_eq!(ring.len(), HISTORY_LENGTH);
        // Oldest surviving entry is insert number 10
        assert_eq!(ring.take_next(), Some(pack(ErrModule::Timer, 10)));
        // Drain the rest; count matches capacity
        let mut drained = 1;
        while ring.take_next().is_some() {
            drained += 1;
        }
        assert_eq!(drained, HISTORY_LENGTH);
    }

    #[test]
    fn test_pack_layout() {
        assert_eq!(pack(ErrModule::GateValve, 0x03), 0x2703);
    }
}
