//! Tick timing statistics.  Without the `instrumentation` feature these are
//! all no-ops.

use std::time::Duration;

#[cfg(feature = "instrumentation")]
use ringbuffer::{AllocRingBuffer, RingBuffer};

/// Number of tick durations kept
pub const HISTORY_LEN: usize = 256;

/// A running measurement, handed back to [TickStats::end]
#[cfg(feature = "instrumentation")]
pub struct Measurement(std::time::Instant);

/// A running measurement, handed back to [TickStats::end]
#[cfg(not(feature = "instrumentation"))]
pub struct Measurement();

/// Recent tick durations and the number of missed deadlines
pub struct TickStats {
    #[cfg(feature = "instrumentation")]
    history: AllocRingBuffer<u32>,
    missed: u64,
}

impl Default for TickStats {
    fn default() -> Self {
        Self::new()
    }
}

impl TickStats {
    /// Empty statistics
    pub fn new() -> Self {
        Self {
            #[cfg(feature = "instrumentation")]
            history: AllocRingBuffer::new(HISTORY_LEN),
            missed: 0,
        }
    }

    /// Start timing a tick
    pub fn begin(&self) -> Measurement {
        #[cfg(feature = "instrumentation")]
        {
            Measurement(std::time::Instant::now())
        }
        #[cfg(not(feature = "instrumentation"))]
        {
            Measurement()
        }
    }

    /// Finish timing a tick
    pub fn end(&mut self, _m: Measurement) {
        #[cfg(feature = "instrumentation")]
        {
            let us = _m.0.elapsed().as_micros().min(u32::MAX as u128) as u32;
            self.history.push(us);
        }
    }

    /// Count ticks that were dropped because the driver fell behind
    pub fn record_missed(&mut self, ticks: u64) {
        self.missed += ticks;
    }

    /// Total number of dropped ticks
    pub fn missed(&self) -> u64 {
        self.missed
    }

    /// The most recent tick duration
    pub fn last(&self) -> Option<Duration> {
        #[cfg(feature = "instrumentation")]
        {
            self.history.back().map(|us| Duration::from_micros(*us as u64))
        }
        #[cfg(not(feature = "instrumentation"))]
        {
            None
        }
    }

    /// The longest tick duration in the history
    pub fn worst(&self) -> Option<Duration> {
        #[cfg(feature = "instrumentation")]
        {
            self.history.iter().max().map(|us| Duration::from_micros(*us as u64))
        }
        #[cfg(not(feature = "instrumentation"))]
        {
            None
        }
    }

    /// The mean tick duration over the history
    pub fn mean(&self) -> Option<Duration> {
        #[cfg(feature = "instrumentation")]
        {
            let n = self.history.len() as u64;
            let sum: u64 = self.history.iter().map(|us| *us as u64).sum();
            sum.checked_div(n).map(Duration::from_micros)
        }
        #[cfg(not(feature = "instrumentation"))]
        {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missed_ticks_accumulate() {
        let mut stats = TickStats::new();
        stats.record_missed(2);
        stats.record_missed(3);
        assert_eq!(stats.missed(), 5);
    }

    #[cfg(feature = "instrumentation")]
    #[test]
    fn history_is_bounded() {
        let mut stats = TickStats::new();
        assert!(stats.mean().is_none());
        for _ in 0..HISTORY_LEN + 10 {
            let m = stats.begin();
            stats.end(m);
        }
        assert!(stats.last().is_some());
        assert!(stats.worst() >= stats.mean());
        assert!(stats.mean().is_some());
    }
}
