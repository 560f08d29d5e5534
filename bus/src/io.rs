//! Port I/O seam for the multiplexing board.
//!
//! The board occupies a small 16-bit register file in the ISA I/O space.
//! Register offsets are relative to the board base; the embedding binary
//! maps them onto real port I/O, tests substitute a mock.

/// Register offsets on the multiplexing board.
pub mod regs {
    /// Port select register.
    pub const PORT: u16 = 0x00;
    /// Data word registers, low word first.
    pub const DATA0: u16 = 0x02;
    pub const DATA1: u16 = 0x04;
    pub const DATA2: u16 = 0x06;
    /// Outgoing bit-length register.
    pub const WLENGTH: u16 = 0x08;
    /// Incoming bit-length register.
    pub const RLENGTH: u16 = 0x0A;
    /// Command register; writing initiates the serial transfer.
    pub const COMMAND: u16 = 0x0C;
    /// Busy status register (shares the command address on read).
    pub const BUSY: u16 = 0x0C;
    pub const BUSY_MASK: u16 = 0x0001;

    /// FPGA readiness word.
    pub const FPGA_READY: u16 = 0x10;
    /// Expected content of `FPGA_READY` once the gateware is up.
    pub const FPGA_READY_MAGIC: u16 = 0x5A5A;
    /// FPGA version word: major:4 / minor:4 / patch:8.
    pub const FPGA_VERSION: u16 = 0x12;

    pub fn data(word: usize) -> u16 {
        DATA0 + 2 * word as u16
    }
}

/// 16-bit register access to the multiplexing board.
pub trait PortIo {
    fn read16(&mut self, reg: u16) -> u16;
    fn write16(&mut self, reg: u16, value: u16);
}

#[cfg(test)]
mod tests {
    use super::regs;

    #[test]
    fn test_register_offsets() {
        assert_eq!(regs::PORT, 0x00);
        assert_eq!(regs::data(0), 0x02);
        assert_eq!(regs::data(2), 0x06);
        assert_eq!(regs::COMMAND, regs::BUSY);
        assert_eq!(regs::FPGA_READY, 0x10);
    }
}
