//! Background acquisition.
//!
//! The slow cryogenic readings are refreshed from the main loop while no
//! CAN request is pending: one acquisition per idle iteration, never more
//! than one in flight. The same pass keeps the cold-head hour counter:
//! while a cryocooler stage reads valid and below the threshold, a
//! one-hour timer accumulates runtime that is persisted on every tick.

use femc_bus::PortIo;
use femc_core::timer::{timeout, Clock, TimerId, TimerState};

use crate::config::Persist;
use crate::mainloop::Femc;
use crate::state::cryostat::{CRYOCOOLER_12K, CRYOCOOLER_4K, TEMP_SENSORS};

/// Cryocooler temperature below which cold-head hours accumulate (K).
pub const COLD_HEAD_LOG_THRESHOLD: f32 = 265.0;

/// Plausibility window for dewar temperatures (K); readings outside it
/// are ignored by the hour counter.
pub const TEMP_SANITY_LOW: f32 = 0.0;
pub const TEMP_SANITY_HIGH: f32 = 350.0;

/// Round-robin position of the background monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Step {
    #[default]
    CryoTemp,
    CryoPressure,
    SupplyCurrent,
    FetimCompTemp,
    FetimHe2,
    ColdHead,
}

#[derive(Debug, Default)]
pub(crate) struct AsyncMonitor {
    step: Step,
    cryo_sensor: usize,
    pressure_sensor: usize,
    fetim_sensor: usize,
}

fn sane(temp: Option<f32>) -> Option<f32> {
    temp.filter(|t| (TEMP_SANITY_LOW..TEMP_SANITY_HIGH).contains(t))
}

impl<P: PortIo, C: Clock> Femc<P, C> {
    /// Run one background acquisition step.
    pub(crate) fn async_step(&mut self, persist: &mut dyn Persist) {
        match self.asyncmon.step {
            Step::CryoTemp => {
                let sensor = self.asyncmon.cryo_sensor;
                // Settling retries are part of normal operation here: the
                // next pass reads the same channel again.
                let _ = self.cryo_read_temp(sensor);
                self.asyncmon.cryo_sensor = (sensor + 1) % TEMP_SENSORS;
                if self.asyncmon.cryo_sensor == 0 {
                    self.asyncmon.step = Step::CryoPressure;
                }
            }
            Step::CryoPressure => {
                let sensor = self.asyncmon.pressure_sensor;
                let _ = self.cryo_read_pressure(sensor);
                self.asyncmon.pressure_sensor = (sensor + 1) % 2;
                if self.asyncmon.pressure_sensor == 0 {
                    self.asyncmon.step = Step::SupplyCurrent;
                }
            }
            Step::SupplyCurrent => {
                // The current monitor electronics ride on the backing pump.
                if self.fe.cryostat.backing_pump.enabled {
                    let _ = self.cryo_read_supply_current();
                }
                self.asyncmon.step = Step::FetimCompTemp;
            }
            Step::FetimCompTemp => {
                if self.fe.fetim.available {
                    let sensor = self.asyncmon.fetim_sensor;
                    let read = self.fetim_analog_unipolar(
                        crate::serial::fetim::areg_comp_temp(sensor as u8),
                        crate::serial::fetim::COMP_TEMP_SCALE,
                    );
                    match read {
                        Ok(t) => {
                            self.fe.fetim.compressor.temp[sensor].temp.update(t);
                        }
                        Err(_) => self.fe.fetim.compressor.temp[sensor].temp.invalidate(),
                    }
                    self.asyncmon.fetim_sensor = (sensor + 1) % 2;
                    if self.asyncmon.fetim_sensor != 0 {
                        return;
                    }
                }
                self.asyncmon.step = Step::FetimHe2;
            }
            Step::FetimHe2 => {
                if self.fe.fetim.available {
                    let read = self.fetim_analog_unipolar(
                        crate::serial::fetim::AREG_HE2_PRESSURE,
                        crate::serial::fetim::HE2_PRESSURE_SCALE,
                    );
                    match read {
                        Ok(p) => {
                            self.fe.fetim.compressor.he2.pressure.update(p);
                        }
                        Err(_) => self.fe.fetim.compressor.he2.pressure.invalidate(),
                    }
                }
                self.asyncmon.step = Step::ColdHead;
            }
            Step::ColdHead => {
                self.cold_head_bookkeeping(persist);
                self.asyncmon.step = Step::CryoTemp;
            }
        }
    }

    /// Accumulate cryocooler runtime while a cold stage is actually cold.
    fn cold_head_bookkeeping(&mut self, persist: &mut dyn Persist) {
        let cold = [CRYOCOOLER_4K, CRYOCOOLER_12K].iter().any(|&s| {
            matches!(sane(self.fe.cryostat.temp[s].temp.value), Some(t) if t < COLD_HEAD_LOG_THRESHOLD)
        });

        if cold {
            if !self.bus.timers.is_running(TimerId::ColdHeadLog) {
                self.bus
                    .timers
                    .start(
                        &self.bus.clock,
                        TimerId::ColdHeadLog,
                        timeout::COLD_HEAD_LOG_MS,
                        true,
                    )
                    .ok();
            } else if self.bus.timers.query(&self.bus.clock, TimerId::ColdHeadLog)
                == TimerState::Expired
            {
                self.fe.cryostat.cold_head_hours =
                    self.fe.cryostat.cold_head_hours.saturating_add(1);
                self.fe.cryostat.hours_dirty = true;
                self.bus
                    .timers
                    .start(
                        &self.bus.clock,
                        TimerId::ColdHeadLog,
                        timeout::COLD_HEAD_LOG_MS,
                        true,
                    )
                    .ok();
            }
        } else {
            self.bus.timers.stop(TimerId::ColdHeadLog);
        }

        if self.fe.cryostat.hours_dirty {
            persist.save_cold_head_hours(self.fe.cryostat.cold_head_hours);
            self.fe.cryostat.hours_dirty = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MemPersist;
    use crate::testing::booted_femc;

    #[test]
    fn test_round_robin_fills_the_tree() {
        let mut femc = booted_femc();
        let mut persist = MemPersist::default();
        // Drive enough steps for a few full passes; the settling counter
        // needs eleven visits per analog channel before a value sticks.
        for _ in 0..2000 {
            femc.async_step(&mut persist);
        }
        assert!(femc.fe.cryostat.temp[0].temp.value.is_some());
        assert!(femc.fe.cryostat.temp[12].temp.value.is_some());
        assert!(femc.fe.cryostat.vacuum.sensor[0].pressure.value.is_some());
        assert!(femc.fe.fetim.compressor.he2.pressure.value.is_some());
        // Supply current stays unread while the backing pump is off.
        assert!(femc.fe.cryostat.supply_current.value.is_none());
    }

    #[test]
    fn test_cold_head_hours_accumulate_below_threshold() {
        let mut femc = booted_femc();
        let mut persist = MemPersist::default();

        femc.fe.cryostat.temp[CRYOCOOLER_4K].temp.update(4.2);
        femc.cold_head_bookkeeping(&mut persist);
        assert_eq!(femc.fe.cryostat.cold_head_hours, 0);

        // One hour later the counter ticks and is persisted.
        femc.bus.clock.advance(timeout::COLD_HEAD_LOG_MS);
        femc.cold_head_bookkeeping(&mut persist);
        assert_eq!(femc.fe.cryostat.cold_head_hours, 1);
        assert_eq!(persist.cold_head_hours, 1);
        assert!(!femc.fe.cryostat.hours_dirty);

        femc.bus.clock.advance(timeout::COLD_HEAD_LOG_MS);
        femc.cold_head_bookkeeping(&mut persist);
        assert_eq!(persist.cold_head_hours, 2);
    }

    #[test]
    fn test_warm_cryostat_stops_the_hour_timer() {
        let mut femc = booted_femc();
        let mut persist = MemPersist::default();

        femc.fe.cryostat.temp[CRYOCOOLER_12K].temp.update(100.0);
        femc.cold_head_bookkeeping(&mut persist);

        // Warm-up wipes the running timer; no tick accumulates.
        femc.fe.cryostat.temp[CRYOCOOLER_12K].temp.update(290.0);
        femc.cold_head_bookkeeping(&mut persist);
        femc.bus.clock.advance(timeout::COLD_HEAD_LOG_MS);
        femc.cold_head_bookkeeping(&mut persist);
        assert_eq!(femc.fe.cryostat.cold_head_hours, 0);
    }

    #[test]
    fn test_sentinel_temperatures_do_not_count_as_cold() {
        let mut femc = booted_femc();
        let mut persist = MemPersist::default();
        // A negative reading is a conversion artifact, not a cold stage.
        femc.fe.cryostat.temp[CRYOCOOLER_4K].temp.update(-1.0);
        femc.cold_head_bookkeeping(&mut persist);
        assert!(!femc.bus.timers.is_running(femc_core::timer::TimerId::ColdHeadLog));
    }
}
