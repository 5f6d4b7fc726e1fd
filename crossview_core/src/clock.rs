//! Clock reconciliation: estimated server time from the last snapshot anchor.

use std::time::Duration;

/// Pairing of server time and local monotonic time at the last snapshot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClockAnchor {
    /// Server wall-clock time carried by the last snapshot (ms)
    pub server_time_ms: f64,

    /// Local monotonic time at which that snapshot was ingested
    pub local_time: Duration,
}

/// Linear extrapolation of server time between snapshots.
///
/// No skew correction: between two anchors the estimate advances exactly as
/// fast as the local clock, so it never runs backwards while snapshots are
/// missing.
#[derive(Debug, Clone, Default)]
pub struct ServerClock {
    anchor: Option<ClockAnchor>,
}

impl ServerClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a new anchor.
    pub fn anchor(&mut self, server_time_ms: f64, local_time: Duration) {
        self.anchor = Some(ClockAnchor {
            server_time_ms,
            local_time,
        });
    }

    pub fn current_anchor(&self) -> Option<ClockAnchor> {
        self.anchor
    }

    /// Estimated server time at `local_now`.
    ///
    /// Falls back to `wall_clock_ms` until the first snapshot arrives.
    pub fn estimated_server_now(&self, local_now: Duration, wall_clock_ms: f64) -> f64 {
        match self.anchor {
            Some(anchor) => {
                let elapsed = local_now.saturating_sub(anchor.local_time);
                anchor.server_time_ms + elapsed.as_secs_f64() * 1000.0
            }
            None => wall_clock_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_fallback_without_anchor() {
        let clock = ServerClock::new();
        assert_eq!(clock.estimated_server_now(Duration::from_secs(3), 42.0), 42.0);
    }

    #[test]
    fn test_linear_extrapolation() {
        let mut clock = ServerClock::new();
        clock.anchor(1_000_000.0, Duration::from_millis(200));

        assert_relative_eq!(
            clock.estimated_server_now(Duration::from_millis(700), 0.0),
            1_000_500.0
        );
    }

    #[test]
    fn test_never_runs_backwards_before_anchor_time() {
        let mut clock = ServerClock::new();
        clock.anchor(5_000.0, Duration::from_secs(10));

        // A local timestamp older than the anchor clamps to the anchor
        assert_eq!(clock.estimated_server_now(Duration::from_secs(9), 0.0), 5_000.0);

        let mut last = f64::MIN;
        for ms in (10_000..12_000).step_by(16) {
            let now = clock.estimated_server_now(Duration::from_millis(ms), 0.0);
            assert!(now >= last);
            last = now;
        }
    }
}
