//! This module provides objects to reason about the processing context.
//! Currently, the only information wrapped is the update speed factor, which
//! determines how often the engine is ticked.

/// The base period of one engine tick at an update speed factor of 1, in
/// microseconds
pub const BASE_TICK_PERIOD_US: u32 = 2000;

#[derive(Clone, Copy, Debug, PartialEq)]
/// The engine processing context, passed explicitly to every tick.
pub struct EngineContext {
    update_speed_factor: UpdateSpeed,
}

impl EngineContext {
    /// Create a new context for a given update speed
    pub const fn new(update_speed_factor: UpdateSpeed) -> Self {
        Self {
            update_speed_factor,
        }
    }
    /// Create a context if the update speed factor provided is supported, or
    /// return `None` otherwise.
    pub fn maybe_create(factor: u8) -> Option<Self> {
        UpdateSpeed::try_from(factor).ok().map(Self::new)
    }
    /// The update speed factor, between 1 and 8
    pub const fn update_speed_factor(&self) -> u8 {
        self.update_speed_factor.value()
    }
    /// The period between two ticks, in microseconds
    pub const fn tick_period_us(&self) -> u32 {
        BASE_TICK_PERIOD_US / self.update_speed_factor.value() as u32
    }
    /// Scale a per-tick increment that was calibrated for an update speed
    /// factor of 1, never returning zero for a non-zero input.
    pub const fn scale_increment(&self, inc: u16) -> u16 {
        if inc == 0 {
            return 0;
        }
        let scaled = inc / self.update_speed_factor.value() as u16;
        if scaled == 0 {
            1
        } else {
            scaled
        }
    }
    /// Scale a tick count that was calibrated for an update speed factor of 1
    pub const fn scale_ticks(&self, ticks: u16) -> u16 {
        ticks.saturating_mul(self.update_speed_factor.value() as u16)
    }
}

impl Default for EngineContext {
    fn default() -> Self {
        Self::new(UpdateSpeed::default())
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
/// A validated update speed factor.  The engine ticks every 2ms divided by
/// this value.
pub struct UpdateSpeed(u8);

impl UpdateSpeed {
    /// The slowest supported speed (one tick every 2ms)
    pub const MIN: u8 = 1;
    /// The fastest supported speed (one tick every 250us)
    pub const MAX: u8 = 8;
    /// The raw factor
    pub const fn value(&self) -> u8 {
        self.0
    }
}

impl Default for UpdateSpeed {
    /// The default factor of 2 yields a 1ms tick
    fn default() -> Self {
        Self(2)
    }
}

impl TryFrom<u8> for UpdateSpeed {
    type Error = &'static str;
    fn try_from(value: u8) -> Result<Self, Self::Error> {
        if (Self::MIN..=Self::MAX).contains(&value) {
            Ok(Self(value))
        } else {
            Err("Unsupported Update Speed Factor")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn periods() {
        assert_eq!(EngineContext::default().tick_period_us(), 1000);
        let ctx = EngineContext::maybe_create(4).unwrap();
        assert_eq!(ctx.tick_period_us(), 500);
        assert!(EngineContext::maybe_create(0).is_none());
        assert!(EngineContext::maybe_create(9).is_none());
    }

    #[test]
    fn scaling() {
        let ctx = EngineContext::maybe_create(4).unwrap();
        assert_eq!(ctx.scale_increment(100), 25);
        assert_eq!(ctx.scale_increment(2), 1);
        assert_eq!(ctx.scale_increment(0), 0);
        assert_eq!(ctx.scale_ticks(10), 40);
    }
}
