//! Mock multiplexing board for unit tests.

use std::collections::VecDeque;

use crate::io::{regs, PortIo};

/// Scriptable board: records every register write, serves queued read
/// frames, and can simulate a busy or absent controller.
pub struct MockBus {
    /// FPGA readiness word (defaults to the ready magic).
    pub fpga_ready: u16,
    /// FPGA version word.
    pub fpga_version: u16,
    /// Number of busy-register reads that still report busy.
    pub busy_reads: u32,
    /// Report busy forever.
    pub stuck_busy: bool,
    /// Every `(register, value)` write, in order.
    pub writes: Vec<(u16, u16)>,
    read_queue: VecDeque<[u16; 3]>,
    current: [u16; 3],
}

impl MockBus {
    pub fn new() -> Self {
        MockBus {
            fpga_ready: regs::FPGA_READY_MAGIC,
            fpga_version: 0,
            busy_reads: 0,
            stuck_busy: false,
            writes: Vec::new(),
            read_queue: VecDeque::new(),
            // All-ones keeps status polls (ready bits) satisfied unless a
            // test scripts something else.
            current: [0xFFFF; 3],
        }
    }

    /// Queue the data words served by the next read transfer. Once the
    /// queue drains, the last frame keeps being served.
    pub fn push_read(&mut self, words: [u16; 3]) {
        self.read_queue.push_back(words);
    }

    pub fn stick_busy(&mut self) {
        self.stuck_busy = true;
    }

    /// Writes to one register, in order.
    pub fn writes_to(&self, reg: u16) -> Vec<u16> {
        self.writes
            .iter()
            .filter(|(r, _)| *r == reg)
            .map(|(_, v)| *v)
            .collect()
    }

    /// Last value written to one register.
    pub fn last_write(&self, reg: u16) -> Option<u16> {
        self.writes_to(reg).last().copied()
    }
}

impl Default for MockBus {
    fn default() -> Self {
        MockBus::new()
    }
}

impl PortIo for MockBus {
    fn read16(&mut self, reg: u16) -> u16 {
        match reg {
            regs::BUSY => {
                if self.stuck_busy {
                    1
                } else if self.busy_reads > 0 {
                    self.busy_reads -= 1;
                    1
                } else {
                    0
                }
            }
            regs::FPGA_READY => self.fpga_ready,
            regs::FPGA_VERSION => self.fpga_version,
            regs::DATA0 => self.current[0],
            regs::DATA1 => self.current[1],
            regs::DATA2 => self.current[2],
            _ => 0,
        }
    }

    fn write16(&mut self, reg: u16, value: u16) {
        self.writes.push((reg, value));
        // A command write starts a transfer; latch the next queued frame.
        if reg == regs::COMMAND {
            if let Some(frame) = self.read_queue.pop_front() {
                self.current = frame;
            }
        }
    }
}
