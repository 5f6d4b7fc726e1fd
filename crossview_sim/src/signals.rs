//! Server-side signal controller.
//!
//! N/S and E/W run as two pairs. A pair goes GREEN → YELLOW → RED; when it
//! turns RED the opposite pair turns GREEN. The engine never sees this logic,
//! only the colors and countdowns it produces.

use crossview_core::{Direction, LightColor};
use std::collections::BTreeMap;

/// Phase durations in seconds.
#[derive(Debug, Clone, Copy)]
pub struct SignalTiming {
    pub green_secs: f64,
    pub yellow_secs: f64,
}

impl Default for SignalTiming {
    fn default() -> Self {
        Self {
            green_secs: 30.0,
            yellow_secs: 3.0,
        }
    }
}

/// One light as the server sees it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalState {
    pub color: LightColor,
    /// Seconds until the next change
    pub timer: f64,
}

/// Two-pair fixed-time signal controller.
#[derive(Debug, Clone)]
pub struct SignalController {
    timing: SignalTiming,
    lights: BTreeMap<Direction, SignalState>,
}

impl SignalController {
    /// N/S start GREEN, E/W start RED.
    pub fn new(timing: SignalTiming) -> Self {
        let mut lights = BTreeMap::new();
        for d in [Direction::N, Direction::S] {
            lights.insert(d, SignalState { color: LightColor::Green, timer: timing.green_secs });
        }
        for d in [Direction::E, Direction::W] {
            lights.insert(d, SignalState { color: LightColor::Red, timer: timing.green_secs });
        }
        Self { timing, lights }
    }

    /// Counts all timers down by `dt` and applies due transitions.
    ///
    /// Returns true if any color changed.
    pub fn update(&mut self, dt: f64) -> bool {
        let before = self.colors();

        for state in self.lights.values_mut() {
            state.timer -= dt;
        }
        self.check_transition([Direction::N, Direction::S], [Direction::E, Direction::W]);
        self.check_transition([Direction::E, Direction::W], [Direction::N, Direction::S]);

        before != self.colors()
    }

    fn check_transition(&mut self, pair: [Direction; 2], opposite: [Direction; 2]) {
        let lead = self.get(pair[0]);
        if lead.timer > 0.0 {
            return;
        }

        match lead.color {
            LightColor::Green => {
                self.set_pair(pair, LightColor::Yellow, self.timing.yellow_secs);
            }
            LightColor::Yellow => {
                self.set_pair(pair, LightColor::Red, self.timing.green_secs + self.timing.yellow_secs);
                self.set_pair(opposite, LightColor::Green, self.timing.green_secs);
            }
            // A red pair waits for the opposite pair's yellow to end
            LightColor::Red => {}
        }
    }

    fn set_pair(&mut self, pair: [Direction; 2], color: LightColor, timer: f64) {
        for d in pair {
            self.lights.insert(d, SignalState { color, timer });
        }
    }

    pub fn get(&self, direction: Direction) -> SignalState {
        self.lights
            .get(&direction)
            .copied()
            .unwrap_or(SignalState { color: LightColor::Red, timer: 0.0 })
    }

    /// Current colors in display order.
    pub fn colors(&self) -> [LightColor; 4] {
        Direction::ALL.map(|d| self.get(d).color)
    }

    /// Current states in display order, timers clamped at zero.
    pub fn states(&self) -> Vec<(Direction, SignalState)> {
        Direction::ALL
            .iter()
            .map(|&d| {
                let s = self.get(d);
                (d, SignalState { color: s.color, timer: s.timer.max(0.0) })
            })
            .collect()
    }

    /// Forces a pair into a color (used by scripted scenarios).
    pub fn force(&mut self, pair: [Direction; 2], color: LightColor, timer: f64) {
        self.set_pair(pair, color, timer);
    }
}

impl Default for SignalController {
    fn default() -> Self {
        Self::new(SignalTiming::default())
    }
}
