//! Named asynchronous timers.
//!
//! Busy-waits on hardware status bits are bounded by one of these timers so
//! a wedged device produces a structured error instead of a hang. A timer
//! is started, polled for expiry from the wait loop, and stopped once the
//! condition clears. Starting a timer that is already running is refused
//! unless the caller asks for a reload.

use thiserror::Error;

/// Millisecond monotonic clock. The embedding binary supplies the tick
/// source; tests use a fake.
pub trait Clock {
    fn now_ms(&self) -> u64;

    /// Synchronous delay. Only used by slow device sequences (relay
    /// settling, optical switch strokes).
    fn sleep_ms(&self, ms: u64);
}

/// The named timers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(usize)]
pub enum TimerId {
    SerialMux = 0,
    BiasAdcReady,
    BiasDacReady,
    LoAdcReady,
    PdAdcReady,
    IfAdcReady,
    CryoAdcReady,
    LprAdcReady,
    LprSwitchReady,
    FetimAdcReady,
    OwbIrq,
    OwbReset,
    InitWait,
    ColdHeadLog,
}

/// Timeout table, milliseconds.
pub mod timeout {
    pub const SERIAL_MUX_MS: u64 = 1_000;
    pub const ADC_READY_MS: u64 = 1_000;
    pub const LPR_SWITCH_READY_MS: u64 = 5_000;
    pub const OWB_IRQ_MS: u64 = 1_000;
    pub const OWB_RESET_MS: u64 = 10_000;
    pub const INIT_WAIT_MS: u64 = 20_000;
    pub const COLD_HEAD_LOG_MS: u64 = 3_600_000;
}

const MAX_TIMERS: usize = 20;

/// Result of polling a timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    Running,
    Expired,
    NotRunning,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TimerError {
    #[error("timer {0:?} already running")]
    AlreadyRunning(TimerId),
}

#[derive(Debug, Clone, Copy, Default)]
struct Slot {
    start: u64,
    duration: u64,
    running: bool,
}

/// Bank of named timers.
#[derive(Debug, Default)]
pub struct TimerBank {
    slots: [Slot; MAX_TIMERS],
}

impl TimerBank {
    pub fn new() -> Self {
        TimerBank::default()
    }

    /// Start (or with `reload`, restart) a timer.
    pub fn start(
        &mut self,
        clock: &dyn Clock,
        id: TimerId,
        duration_ms: u64,
        reload: bool,
    ) -> Result<(), TimerError> {
        let slot = &mut self.slots[id as usize];
        if slot.running && !reload {
            return Err(TimerError::AlreadyRunning(id));
        }
        slot.start = clock.now_ms();
        slot.duration = duration_ms;
        slot.running = true;
        Ok(())
    }

    /// Poll a timer. Expiry stops the timer.
    pub fn query(&mut self, clock: &dyn Clock, id: TimerId) -> TimerState {
        let slot = &mut self.slots[id as usize];
        if !slot.running {
            return TimerState::NotRunning;
        }
        if clock.now_ms().wrapping_sub(slot.start) < slot.duration {
            TimerState::Running
        } else {
            slot.running = false;
            TimerState::Expired
        }
    }

    /// Clear a timer.
    pub fn stop(&mut self, id: TimerId) {
        self.slots[id as usize].running = false;
    }

    #[inline]
    pub fn is_running(&self, id: TimerId) -> bool {
        self.slots[id as usize].running
    }
}

pub mod testing {
    //! Deterministic clock for unit tests.

    use super::Clock;
    use std::cell::Cell;

    #[derive(Default)]
    pub struct FakeClock {
        now: Cell<u64>,
        auto_step: Cell<u64>,
    }

    impl FakeClock {
        pub fn new() -> Self {
            FakeClock::default()
        }

        /// A clock that advances by `step` on every read, so bounded
        /// busy-wait loops terminate without a cooperating device.
        pub fn auto_advancing(step: u64) -> Self {
            let clock = FakeClock::default();
            clock.auto_step.set(step);
            clock
        }

        pub fn advance(&self, ms: u64) {
            self.now.set(self.now.get() + ms);
        }
    }

    impl Clock for FakeClock {
        fn now_ms(&self) -> u64 {
            let now = self.now.get();
            self.now.set(now + self.auto_step.get());
            now
        }

        fn sleep_ms(&self, ms: u64) {
            self.advance(ms);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::FakeClock;
    use super::*;

    #[test]
    fn test_expiry() {
        let clock = FakeClock::new();
        let mut bank = TimerBank::new();
        bank.start(&clock, TimerId::SerialMux, 100, false).unwrap();
        assert_eq!(bank.query(&clock, TimerId::SerialMux), TimerState::Running);
        clock.advance(99);
        assert_eq!(bank.query(&clock, TimerId::SerialMux), TimerState::Running);
        clock.advance(1);
        assert_eq!(bank.query(&clock, TimerId::SerialMux), TimerState::Expired);
        // Expiry cleared the timer
        assert_eq!(
            bank.query(&clock, TimerId::SerialMux),
            TimerState::NotRunning
        );
    }

    #[test]
    fn test_start_refuses_running_timer() {
        let clock = FakeClock::new();
        let mut bank = TimerBank::new();
        bank.start(&clock, TimerId::CryoAdcReady, 50, false).unwrap();
        assert_eq!(
            bank.start(&clock, TimerId::CryoAdcReady, 50, false),
            Err(TimerError::AlreadyRunning(TimerId::CryoAdcReady))
        );
        // Reload is allowed
        clock.advance(10);
        bank.start(&clock, TimerId::CryoAdcReady, 50, true).unwrap();
        clock.advance(49);
        assert_eq!(
            bank.query(&clock, TimerId::CryoAdcReady),
            TimerState::Running
        );
    }

    #[test]
    fn test_stop_clears() {
        let clock = FakeClock::new();
        let mut bank = TimerBank::new();
        bank.start(&clock, TimerId::OwbReset, 1_000, false).unwrap();
        bank.stop(TimerId::OwbReset);
        assert_eq!(bank.query(&clock, TimerId::OwbReset), TimerState::NotRunning);
    }
}
