//! Value-level serial access.
//!
//! [`BusCtl`] owns the port I/O implementation, the tick source and the
//! timer bank, and layers the register semantics over the raw mux cycles:
//! a 64-bit intermediate value, an optional shift applied before a write
//! and inverted after a read, and the port selection rule shared by every
//! device interface.

use femc_core::timer::{timeout, Clock, TimerBank, TimerId, TimerState};
use thiserror::Error;

use crate::io::{regs, PortIo};
use crate::mux::{self, MuxError, MuxFrame, COMMAND_MAX, FRAME_DATA_BITS};

/// Number of cartridge slots; used by the port selection rule.
const CARTRIDGES: u16 = 10;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AccessError {
    #[error(transparent)]
    Mux(#[from] MuxError),
    #[error("serial command {0:#x} exceeds the 5-bit command field")]
    CommandRange(u16),
}

/// Shift declared by a register description. Writes apply it as declared;
/// reads apply the inverse, so a register that is left-aligned for the
/// hardware latch comes back right-aligned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shift {
    None,
    Left(u8),
    Right(u8),
}

/// Cartridge subsystems sharing one serial port pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum CartSubsystem {
    Bias = 0,
    Lo = 1,
}

/// Serial port for a cartridge subsystem. Each cartridge has two ports:
/// LO on the even port, bias on the odd one.
pub fn cartridge_port(cartridge: u8, subsystem: CartSubsystem) -> u16 {
    2 * cartridge as u16 + (1 - subsystem as u16)
}

/// Serial port for a non-cartridge module (module field of the RCA).
pub fn module_port(module: u8) -> u16 {
    CARTRIDGES + module as u16
}

/// Bus controller: port I/O + clock + timers.
pub struct BusCtl<P: PortIo, C: Clock> {
    pub io: P,
    pub clock: C,
    pub timers: TimerBank,
}

impl<P: PortIo, C: Clock> BusCtl<P, C> {
    pub fn new(io: P, clock: C) -> Self {
        BusCtl {
            io,
            clock,
            timers: TimerBank::new(),
        }
    }

    /// Boot-time readiness probe. Failure is fatal: the FPGA never came up
    /// and nothing downstream can work.
    pub fn ready(&mut self) -> Result<(), MuxError> {
        if self.io.read16(regs::FPGA_READY) != regs::FPGA_READY_MAGIC {
            return Err(MuxError::NotReady);
        }
        Ok(())
    }

    /// FPGA gateware version word (major:4 / minor:4 / patch:8).
    pub fn fpga_version(&mut self) -> u16 {
        self.io.read16(regs::FPGA_VERSION)
    }

    /// Transmit a frame to the selected device.
    pub fn mux_write(&mut self, frame: &MuxFrame) -> Result<(), MuxError> {
        if frame.length > FRAME_DATA_BITS {
            return Err(MuxError::DataLengthOutOfRange(frame.length));
        }
        self.wait_on_busy()?;
        mux::write_cycle(&mut self.io, frame);
        Ok(())
    }

    /// Read a frame back from the selected device.
    pub fn mux_read(&mut self, frame: &mut MuxFrame) -> Result<(), MuxError> {
        if frame.length > FRAME_DATA_BITS {
            return Err(MuxError::DataLengthOutOfRange(frame.length));
        }
        self.wait_on_busy()?;
        mux::read_setup(&mut self.io, frame);
        // The transfer is in flight once the command register is written;
        // wait for it to complete before touching the data registers.
        self.wait_on_busy()?;
        mux::read_data(&mut self.io, frame);
        Ok(())
    }

    /// Write `value` to a device register.
    pub fn reg_write(
        &mut self,
        port: u16,
        command: u16,
        size_bits: u16,
        shift: Shift,
        value: u64,
    ) -> Result<(), AccessError> {
        if command > COMMAND_MAX {
            return Err(AccessError::CommandRange(command));
        }
        let shifted = match shift {
            Shift::None => value,
            Shift::Left(n) => value << n,
            Shift::Right(n) => value >> n,
        };
        let mut frame = MuxFrame {
            port,
            command,
            length: size_bits,
            ..MuxFrame::default()
        };
        frame.pack(shifted);
        self.mux_write(&frame)?;
        Ok(())
    }

    /// Read a device register of `size_bits`.
    pub fn reg_read(
        &mut self,
        port: u16,
        command: u16,
        size_bits: u16,
        shift: Shift,
    ) -> Result<u64, AccessError> {
        if command > COMMAND_MAX {
            return Err(AccessError::CommandRange(command));
        }
        let mut frame = MuxFrame {
            port,
            command,
            length: size_bits,
            ..MuxFrame::default()
        };
        self.mux_read(&mut frame)?;
        let raw = frame.unpack();
        // Inverse of the declared shift.
        let value = match shift {
            Shift::None => raw,
            Shift::Left(n) => raw >> n,
            Shift::Right(n) => raw << n,
        };
        // Mask to the declared register size.
        let mask = if size_bits >= 64 {
            u64::MAX
        } else {
            (1u64 << size_bits) - 1
        };
        Ok(value & mask)
    }

    fn wait_on_busy(&mut self) -> Result<(), MuxError> {
        self.timers
            .start(&self.clock, TimerId::SerialMux, timeout::SERIAL_MUX_MS, true)
            .ok();
        while self.io.read16(regs::BUSY) & regs::BUSY_MASK != 0 {
            if self.timers.query(&self.clock, TimerId::SerialMux) == TimerState::Expired {
                return Err(MuxError::BusyTimeout);
            }
        }
        self.timers.stop(TimerId::SerialMux);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockBus;
    use femc_core::timer::testing::FakeClock;

    fn bus() -> BusCtl<MockBus, FakeClock> {
        BusCtl::new(MockBus::new(), FakeClock::new())
    }

    #[test]
    fn test_port_selection_rule() {
        // Cartridge 0: LO on port 0, bias on port 1
        assert_eq!(cartridge_port(0, CartSubsystem::Lo), 0);
        assert_eq!(cartridge_port(0, CartSubsystem::Bias), 1);
        // Cartridge 9: ports 18/19
        assert_eq!(cartridge_port(9, CartSubsystem::Lo), 18);
        assert_eq!(cartridge_port(9, CartSubsystem::Bias), 19);
        // Non-cartridge modules are offset past the cartridge pairs
        assert_eq!(module_port(10), 20); // power distribution
        assert_eq!(module_port(12), 22); // cryostat
    }

    #[test]
    fn test_write_cycle_order() {
        let mut bus = bus();
        bus.reg_write(22, 0x01, 6, Shift::Left(1), 0b10110).unwrap();
        // Last write is the command register; length precedes it
        let w = &bus.io.writes;
        assert_eq!(w[w.len() - 1], (regs::COMMAND, 0x01));
        assert_eq!(w[w.len() - 2], (regs::WLENGTH, 6));
        // Data word carries the latched (shifted) value
        assert!(w.contains(&(regs::data(0), 0b101100)));
        assert!(w.contains(&(regs::PORT, 22)));
    }

    #[test]
    fn test_read_applies_inverse_shift_and_mask() {
        let mut bus = bus();
        bus.io.push_read([0b10110 << 1, 0, 0]);
        let v = bus.reg_read(22, 0x0A, 5, Shift::Left(1)).unwrap();
        assert_eq!(v, 0b10110);
    }

    #[test]
    fn test_oversize_payload_rejected() {
        let mut bus = bus();
        let err = bus.reg_write(0, 0x01, 48, Shift::None, 0).unwrap_err();
        assert_eq!(err, AccessError::Mux(MuxError::DataLengthOutOfRange(48)));
        // Nothing was written to the hardware
        assert!(bus.io.writes.is_empty());
    }

    #[test]
    fn test_command_width_guard() {
        let mut bus = bus();
        let err = bus.reg_read(0, 0x20, 8, Shift::None).unwrap_err();
        assert_eq!(err, AccessError::CommandRange(0x20));
    }

    #[test]
    fn test_busy_timeout() {
        let mut bus = BusCtl::new(MockBus::new(), FakeClock::auto_advancing(10));
        bus.io.stick_busy();
        let err = bus.mux_write(&MuxFrame::default()).unwrap_err();
        assert_eq!(err, MuxError::BusyTimeout);
    }

    #[test]
    fn test_ready_probe() {
        let mut bus = bus();
        assert!(bus.ready().is_ok());
        bus.io.fpga_ready = 0;
        assert_eq!(bus.ready(), Err(MuxError::NotReady));
    }
}
