//! Light state tracker.
//!
//! Holds the last color and absolute expiry reported for each direction.
//! The server owns signal phasing; the tracker never changes a color on its
//! own, it only counts down towards the expiry it was told about.

use crate::snapshot::LightRecord;
use crate::types::{Direction, LightColor};
use serde::Serialize;
use std::collections::BTreeMap;

/// Current state of one light.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightState {
    pub color: LightColor,

    /// Estimated server time (ms) at which the color is expected to change
    pub expires_at_ms: f64,
}

impl Default for LightState {
    fn default() -> Self {
        Self {
            color: LightColor::Green,
            expires_at_ms: 0.0,
        }
    }
}

/// What the renderer needs to draw a light.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LightView {
    pub direction: Direction,
    pub label: &'static str,
    pub color: LightColor,
    pub remaining_ms: f64,
    /// Countdown text, e.g. "4.5s"
    pub display: String,
}

/// Formats a countdown the way the light displays show it.
pub fn format_remaining(remaining_ms: f64) -> String {
    if remaining_ms > 0.0 {
        format!("{:.1}s", remaining_ms / 1000.0)
    } else {
        "0.0s".to_string()
    }
}

/// Per-direction light states, all four present from construction.
#[derive(Debug, Clone)]
pub struct LightTracker {
    lights: BTreeMap<Direction, LightState>,
}

impl LightTracker {
    pub fn new() -> Self {
        let lights = Direction::ALL
            .iter()
            .map(|&d| (d, LightState::default()))
            .collect();
        Self { lights }
    }

    /// Overwrites a light from a snapshot record.
    ///
    /// `anchor_server_ms` is the snapshot's server time; it converts relative
    /// remaining seconds into an absolute expiry when the record carries no
    /// absolute timestamp.
    pub fn apply(&mut self, record: &LightRecord, anchor_server_ms: f64) {
        let expires_at_ms = record
            .absolute_expiry_ms
            .unwrap_or(anchor_server_ms + record.remaining_seconds * 1000.0);

        self.lights.insert(
            record.direction,
            LightState {
                color: record.color,
                expires_at_ms,
            },
        );
    }

    pub fn get(&self, direction: Direction) -> LightState {
        self.lights.get(&direction).copied().unwrap_or_default()
    }

    pub fn color(&self, direction: Direction) -> LightColor {
        self.get(direction).color
    }

    /// Signed time to expiry; negative once the expiry has passed.
    pub fn remaining_ms_raw(&self, direction: Direction, server_now_ms: f64) -> f64 {
        self.get(direction).expires_at_ms - server_now_ms
    }

    /// Time to expiry for display, clamped to zero.
    pub fn remaining_ms(&self, direction: Direction, server_now_ms: f64) -> f64 {
        self.remaining_ms_raw(direction, server_now_ms).max(0.0)
    }

    /// Render views for all four lights.
    pub fn views(&self, server_now_ms: f64) -> Vec<LightView> {
        self.lights
            .iter()
            .map(|(&direction, state)| {
                let remaining_ms = (state.expires_at_ms - server_now_ms).max(0.0);
                LightView {
                    direction,
                    label: direction.display_name(),
                    color: state.color,
                    remaining_ms,
                    display: format_remaining(remaining_ms),
                }
            })
            .collect()
    }
}

impl Default for LightTracker {
    fn default() -> Self {
        Self::new()
    }
}
