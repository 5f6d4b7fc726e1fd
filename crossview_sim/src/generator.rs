//! Snapshot generator - the server side of the feed.
//!
//! Produces the same message stream the live traffic server does:
//! - a full state every `interval_secs` (`reset = true`, fresh vehicles,
//!   current lights, a random traffic event)
//! - light-only updates whenever a color changes or every
//!   `light_update_secs`
//!
//! All randomness comes from a seeded ChaCha8 RNG so a run is reproducible.

use crate::signals::{SignalController, SignalTiming};
use crossview_core::{Direction, LightColor};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Uniform};
use serde::Serialize;
use serde_json::{json, Value};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info};

// ============================================================================
// WIRE RECORDS
// ============================================================================

/// Field naming used when serializing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WireStyle {
    /// `vehicles`, `direction`, `remainingSeconds`, ...
    #[default]
    Current,
    /// `Vehicles`, `Sens`, `Timer`, ... as sent by older servers
    Legacy,
}

impl fmt::Display for WireStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WireStyle::Current => f.write_str("current"),
            WireStyle::Legacy => f.write_str("legacy"),
        }
    }
}

impl FromStr for WireStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "current" => Ok(WireStyle::Current),
            "legacy" => Ok(WireStyle::Legacy),
            _ => Err(format!("Unknown wire style: {}", s)),
        }
    }
}

/// Vehicle record as sent by the server.
pub fn vehicle_json(style: WireStyle, id: u64, direction: Direction, lane: u8, position: f64, speed: f64) -> Value {
    let lane = format!("Lane{}", lane);
    match style {
        WireStyle::Current => json!({
            "id": id,
            "direction": direction.as_str(),
            "lane": lane,
            "position": position,
            "speed": speed,
        }),
        WireStyle::Legacy => json!({
            "Id": id,
            "Sens": direction.as_str(),
            "Voie": lane,
            "Position": position,
            "Speed": speed,
            "Waiting": false,
        }),
    }
}

/// Light record as sent by the server. Negative timers are sent as zero.
pub fn light_json(style: WireStyle, direction: Direction, color: LightColor, timer_secs: f64, server_time_ms: f64) -> Value {
    let timer = timer_secs.max(0.0);
    let expires_at = (server_time_ms + timer * 1000.0).round();
    match style {
        WireStyle::Current => json!({
            "direction": direction.as_str(),
            "color": color.as_str(),
            "remainingSeconds": timer,
            "absoluteExpiryMs": expires_at,
        }),
        WireStyle::Legacy => json!({
            "Sens": direction.as_str(),
            "Couleur": color.as_str(),
            "Timer": timer,
            "TimerMs": (timer * 1000.0).round(),
            "ExpiresAt": expires_at,
        }),
    }
}

// ============================================================================
// TRAFFIC EVENTS
// ============================================================================

/// Random event scaling traffic flow for one interval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrafficEvent {
    pub name: &'static str,
    pub flow_mult: f64,
}

/// Event table; `None` entries weight the draw towards normal traffic.
pub const EVENTS: [Option<TrafficEvent>; 8] = [
    Some(TrafficEvent { name: "Rush Hour", flow_mult: 1.8 }),
    Some(TrafficEvent { name: "Accident", flow_mult: 0.4 }),
    Some(TrafficEvent { name: "Bad Weather", flow_mult: 0.6 }),
    Some(TrafficEvent { name: "Event Nearby", flow_mult: 2.0 }),
    Some(TrafficEvent { name: "Construction", flow_mult: 0.5 }),
    None,
    None,
    None,
];

// ============================================================================
// GENERATOR
// ============================================================================

/// Generator parameters.
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// Seconds between full states (default: 60)
    pub interval_secs: f64,

    /// Seconds between light-only updates when no color changes (default: 1)
    pub light_update_secs: f64,

    pub timing: SignalTiming,

    /// Vehicles per minute per direction before event scaling (default: 10)
    pub base_flow: f64,

    /// Cap on vehicles generated per direction per state (default: 6)
    pub max_vehicles_per_direction: usize,

    /// Range for the front vehicle's declared position (default: -10..30)
    pub nearest_position: (f64, f64),

    /// Range for the gap between consecutive vehicles (default: 8..15)
    pub spacing: (f64, f64),

    /// Range for declared speeds (default: 8..15)
    pub speed: (f64, f64),

    /// Lowest declared position (default: -50)
    pub min_position: f64,

    pub wire_style: WireStyle,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            interval_secs: 60.0,
            light_update_secs: 1.0,
            timing: SignalTiming::default(),
            base_flow: 10.0,
            max_vehicles_per_direction: 6,
            nearest_position: (-10.0, 30.0),
            spacing: (8.0, 15.0),
            speed: (8.0, 15.0),
            min_position: -50.0,
            wire_style: WireStyle::Current,
        }
    }
}

/// Kind of message produced by [`SnapshotGenerator::tick`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    FullState,
    LightUpdate,
}

/// A generated server message.
#[derive(Debug, Clone)]
pub struct GeneratedMessage {
    pub kind: MessageKind,
    pub payload: Value,
    pub server_time_ms: f64,
}

fn sample(rng: &mut ChaCha8Rng, (low, high): (f64, f64)) -> f64 {
    if high > low {
        Uniform::new(low, high).sample(rng)
    } else {
        low
    }
}

/// Deterministic stand-in for the traffic server.
pub struct SnapshotGenerator {
    config: GeneratorConfig,
    rng: ChaCha8Rng,
    signals: SignalController,

    /// Last id handed out
    vehicle_counter: u64,

    /// Server wall clock at generator time 0 (ms)
    server_epoch_ms: f64,

    /// Generator time (seconds)
    clock_secs: f64,

    since_full: f64,
    since_lights: f64,
    last_colors: [LightColor; 4],

    /// Full states produced so far
    pub intervals: u64,
}

impl SnapshotGenerator {
    pub fn new(config: GeneratorConfig, seed: u64, server_epoch_ms: f64) -> Self {
        let signals = SignalController::new(config.timing);
        let last_colors = signals.colors();
        Self {
            config,
            rng: ChaCha8Rng::seed_from_u64(seed),
            signals,
            vehicle_counter: 0,
            server_epoch_ms,
            clock_secs: 0.0,
            since_full: 0.0,
            since_lights: 0.0,
            last_colors,
            intervals: 0,
        }
    }

    pub fn server_time_ms(&self) -> f64 {
        self.server_epoch_ms + self.clock_secs * 1000.0
    }

    pub fn signals(&self) -> &SignalController {
        &self.signals
    }

    pub fn signals_mut(&mut self) -> &mut SignalController {
        &mut self.signals
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    fn lights_json(&self) -> Vec<Value> {
        let now = self.server_time_ms();
        self.signals
            .states()
            .into_iter()
            .map(|(d, s)| light_json(self.config.wire_style, d, s.color, s.timer, now))
            .collect()
    }

    /// Builds a full state: `reset = true`, a fresh batch of vehicles, the
    /// current lights and a random event.
    pub fn full_state(&mut self) -> GeneratedMessage {
        let style = self.config.wire_style;
        let event = EVENTS.choose(&mut self.rng).copied().flatten();
        let flow_mult = event.map_or(1.0, |e| e.flow_mult);

        let mut vehicles = Vec::new();
        let mut traffic = Vec::new();

        for direction in Direction::ALL {
            let flow = (self.config.base_flow * flow_mult * sample(&mut self.rng, (0.8, 1.2))).floor();
            let count = (flow.max(0.0) as usize).clamp(1, self.config.max_vehicles_per_direction.max(1));
            let nearest = sample(&mut self.rng, self.config.nearest_position);

            for i in 0..count {
                self.vehicle_counter += 1;
                let spacing = sample(&mut self.rng, self.config.spacing);
                let position = (nearest - i as f64 * spacing).max(self.config.min_position);
                let speed = sample(&mut self.rng, self.config.speed);
                vehicles.push(vehicle_json(style, self.vehicle_counter, direction, 1, position, speed));
            }

            traffic.push(json!({
                "direction": direction.as_str(),
                "flow": flow,
                "event": event,
            }));
        }

        let vehicle_count = vehicles.len();
        let server_time_ms = self.server_time_ms();
        let payload = match style {
            WireStyle::Current => json!({
                "lights": self.lights_json(),
                "vehicles": vehicles,
                "traffic": traffic,
                "event": event,
                "interval": self.config.interval_secs,
                "reset": true,
                "serverTimestampMs": server_time_ms,
            }),
            WireStyle::Legacy => json!({
                "Lights": self.lights_json(),
                "Vehicles": vehicles,
                "Traffic": traffic,
                "Event": event,
                "Interval": self.config.interval_secs,
                "Reset": true,
                "ServerTime": server_time_ms,
            }),
        };

        self.intervals += 1;
        info!(
            event = event.map_or("Normal", |e| e.name),
            vehicles = vehicle_count,
            "New traffic state"
        );

        GeneratedMessage {
            kind: MessageKind::FullState,
            payload,
            server_time_ms,
        }
    }

    /// Builds a light-only update.
    pub fn light_update(&self) -> GeneratedMessage {
        let server_time_ms = self.server_time_ms();
        let payload = match self.config.wire_style {
            WireStyle::Current => json!({
                "lights": self.lights_json(),
                "reset": false,
                "serverTimestampMs": server_time_ms,
            }),
            WireStyle::Legacy => json!({
                "Lights": self.lights_json(),
                "Reset": false,
                "ServerTime": server_time_ms,
            }),
        };
        GeneratedMessage {
            kind: MessageKind::LightUpdate,
            payload,
            server_time_ms,
        }
    }

    /// Advances the server by `dt` seconds.
    ///
    /// Returns at most one message: a full state when the interval elapses,
    /// otherwise a light update on a color change or once the light update
    /// period has passed.
    pub fn tick(&mut self, dt: f64) -> Option<GeneratedMessage> {
        if !dt.is_finite() || dt <= 0.0 {
            return None;
        }

        self.clock_secs += dt;
        self.since_full += dt;
        self.since_lights += dt;
        self.signals.update(dt);

        if self.since_full >= self.config.interval_secs {
            self.since_full = 0.0;
            self.since_lights = 0.0;
            self.last_colors = self.signals.colors();
            return Some(self.full_state());
        }

        let colors = self.signals.colors();
        let colors_changed = colors != self.last_colors;
        if colors_changed || self.since_lights >= self.config.light_update_secs {
            if colors_changed {
                debug!(?colors, "Light change");
            }
            self.last_colors = colors;
            self.since_lights = 0.0;
            return Some(self.light_update());
        }

        None
    }
}
