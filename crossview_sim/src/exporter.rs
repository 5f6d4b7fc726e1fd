//! JSON exporter for offline playback.
//!
//! Exports sampled frames (vehicle and light views exactly as a renderer
//! would receive them) so a run can be replayed or plotted.

use crate::world::SimWorld;
use crossview_core::{LightView, VehicleView};
use serde::Serialize;
use std::fs::File;
use std::io::Write;

/// A single sampled frame.
#[derive(Debug, Clone, Serialize)]
pub struct SimFrame {
    /// Simulation time in seconds
    pub time_sec: f64,

    /// Engine's estimate of server time (ms)
    pub server_time_ms: f64,

    pub vehicles: Vec<VehicleView>,
    pub lights: Vec<LightView>,

    /// Collisions counted so far
    pub collisions: u64,

    /// Notable events since the previous sample
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<SimEvent>,
}

impl SimFrame {
    pub fn capture(world: &SimWorld) -> Self {
        Self {
            time_sec: world.time(),
            server_time_ms: world.engine.server_now(),
            vehicles: world.engine.vehicle_views(),
            lights: world.engine.light_views(),
            collisions: world.engine.collision_count(),
            events: Vec::new(),
        }
    }
}

/// Simulation event.
#[derive(Debug, Clone, Serialize)]
pub struct SimEvent {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
}

/// Complete simulation export.
#[derive(Debug, Clone, Serialize)]
pub struct SimExport {
    /// Scenario name
    pub scenario: String,

    /// Seed used
    pub seed: u64,

    /// Duration in seconds
    pub duration_sec: f64,

    /// Sampled frames
    pub frames: Vec<SimFrame>,

    /// Final results
    pub passed: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

impl SimExport {
    /// Creates a new export container.
    pub fn new(scenario: &str, seed: u64) -> Self {
        Self {
            scenario: scenario.to_string(),
            seed,
            duration_sec: 0.0,
            frames: Vec::new(),
            passed: false,
            failure_reason: None,
        }
    }

    /// Adds a frame.
    pub fn add_frame(&mut self, frame: SimFrame) {
        self.duration_sec = frame.time_sec;
        self.frames.push(frame);
    }

    /// Finalizes the export.
    pub fn finalize(&mut self, passed: bool, failure_reason: Option<String>) {
        self.passed = passed;
        self.failure_reason = failure_reason;
    }

    /// Writes to a JSON file.
    pub fn write_to_file(&self, path: &str) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}

/// Samples every `every`-th frame of a run into an optional export.
#[derive(Debug)]
pub struct Recorder {
    export: Option<SimExport>,
    every: u64,
    pending_events: Vec<SimEvent>,
}

impl Recorder {
    /// A recorder that keeps nothing.
    pub fn disabled() -> Self {
        Self {
            export: None,
            every: 1,
            pending_events: Vec::new(),
        }
    }

    pub fn new(scenario: &str, seed: u64, every: u64) -> Self {
        Self {
            export: Some(SimExport::new(scenario, seed)),
            every: every.max(1),
            pending_events: Vec::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.export.is_some()
    }

    /// Notes an event; it is attached to the next sampled frame.
    pub fn event(&mut self, message: impl Into<String>) {
        if self.export.is_some() {
            self.pending_events.push(SimEvent {
                message: message.into(),
                level: None,
            });
        }
    }

    /// Samples the world if this frame is due.
    pub fn capture(&mut self, world: &SimWorld) {
        let Some(export) = self.export.as_mut() else {
            return;
        };
        if world.tick_count() % self.every != 0 {
            return;
        }
        let mut frame = SimFrame::capture(world);
        frame.events = std::mem::take(&mut self.pending_events);
        export.add_frame(frame);
    }

    pub fn into_export(self) -> Option<SimExport> {
        self.export
    }
}
