//! Hand-driven implementation of EngineContext for unit tests.

use crate::EngineContext;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Context whose clock only moves when told to and whose random draws
/// are scripted.
///
/// Rolls queued with [`ManualContext::push_rolls`] are consumed first;
/// after that every draw returns the fallback roll (0.0 by default, which
/// maps to "go straight" for turn intentions).
pub struct ManualContext {
    /// Current time since creation
    time: Mutex<Duration>,

    /// Scripted random draws, consumed front to back
    rolls: Mutex<VecDeque<f64>>,

    /// Value returned once the script is exhausted
    fallback_roll: Mutex<f64>,

    /// Wall-clock time at `now() == 0`
    epoch: SystemTime,
}

impl ManualContext {
    /// Creates a context at time zero with a fixed wall-clock epoch.
    pub fn new() -> Self {
        Self {
            time: Mutex::new(Duration::ZERO),
            rolls: Mutex::new(VecDeque::new()),
            fallback_roll: Mutex::new(0.0),
            epoch: UNIX_EPOCH + Duration::from_secs(1704067200), // 2024-01-01 00:00:00 UTC
        }
    }

    /// Creates an Arc-wrapped context.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Advances the clock.
    pub fn advance(&self, duration: Duration) {
        let mut time = self.time.lock().unwrap_or_else(|e| e.into_inner());
        *time += duration;
    }

    /// Advances the clock by fractional seconds.
    pub fn advance_secs(&self, secs: f64) {
        self.advance(Duration::from_secs_f64(secs.max(0.0)));
    }

    /// Queues random draws.
    pub fn push_rolls(&self, rolls: &[f64]) {
        let mut queue = self.rolls.lock().unwrap_or_else(|e| e.into_inner());
        queue.extend(rolls.iter().copied());
    }

    /// Sets the value returned once queued rolls run out.
    pub fn set_fallback_roll(&self, roll: f64) {
        *self.fallback_roll.lock().unwrap_or_else(|e| e.into_inner()) = roll;
    }
}

impl Default for ManualContext {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EngineContext for ManualContext {
    fn now(&self) -> Duration {
        *self.time.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn system_time(&self) -> SystemTime {
        self.epoch + self.now()
    }

    async fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }

    fn random_unit(&self) -> f64 {
        let mut queue = self.rolls.lock().unwrap_or_else(|e| e.into_inner());
        match queue.pop_front() {
            Some(roll) => roll,
            None => *self.fallback_roll.lock().unwrap_or_else(|e| e.into_inner()),
        }
    }

    fn seed(&self) -> u64 {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock() {
        let ctx = ManualContext::new();
        assert_eq!(ctx.now(), Duration::ZERO);

        ctx.advance(Duration::from_millis(250));
        ctx.advance_secs(0.75);
        assert_eq!(ctx.now(), Duration::from_secs(1));
        assert_eq!(ctx.wall_clock_ms(), 1_704_067_201_000.0);
    }

    #[test]
    fn test_scripted_rolls() {
        let ctx = ManualContext::new();
        ctx.push_rolls(&[0.9, 0.6]);
        ctx.set_fallback_roll(0.3);

        assert_eq!(ctx.random_unit(), 0.9);
        assert_eq!(ctx.random_unit(), 0.6);
        assert_eq!(ctx.random_unit(), 0.3);
        assert_eq!(ctx.random_unit(), 0.3);
    }

    #[tokio::test]
    async fn test_sleep_advances_clock() {
        let ctx = ManualContext::new();
        ctx.sleep(Duration::from_millis(16)).await;
        assert_eq!(ctx.now(), Duration::from_millis(16));
    }
}
