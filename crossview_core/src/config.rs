//! Engine configuration and per-map topology.
//!
//! All physics thresholds are distances in scene units along a vehicle's
//! odometer (`current_position`) unless noted otherwise.

use nalgebra::Vector2;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

// ============================================================================
// PHYSICS
// ============================================================================

/// Car-following, stop-line and collision constants.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsConfig {
    /// Odometer value where vehicles stop for a red light (default: 35)
    pub stop_line: f64,

    /// Minimum gap to the vehicle ahead (default: 4)
    pub safe_distance: f64,

    /// Extra margin before braking starts (default: 2)
    pub stopping_buffer: f64,

    /// Lane-ordinal and straight-vs-straight contact distance (default: 2.5)
    pub collision_threshold: f64,

    /// Contact distance when a rotating vehicle is involved (default: 3.0)
    pub turn_collision_radius: f64,

    /// Acceleration toward target speed, u/s² (default: 15)
    pub acceleration: f64,

    /// Normal braking rate, u/s² (default: 15)
    pub braking: f64,

    /// Braking rate within `near_stop_distance` of the target, u/s² (default: 20)
    pub hard_braking: f64,

    /// Distance from the stop target where hard braking kicks in (default: 5)
    pub near_stop_distance: f64,

    /// Distance from the stop target where speed snaps to zero (default: 0.5)
    pub snap_distance: f64,

    /// Deceleration assumed when deciding whether a stop is needed, u/s² (default: 25)
    pub planning_deceleration: f64,

    /// Remaining light time under which a close vehicle commits, seconds (default: 1.0)
    pub commit_time_secs: f64,

    /// Distance before the stop line inside which a vehicle may commit (default: 10)
    pub commit_distance: f64,

    /// Seconds a reset vehicle takes to fade out (default: 2.0)
    pub fade_secs: f64,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            stop_line: 35.0,
            safe_distance: 4.0,
            stopping_buffer: 2.0,
            collision_threshold: 2.5,
            turn_collision_radius: 3.0,
            acceleration: 15.0,
            braking: 15.0,
            hard_braking: 20.0,
            near_stop_distance: 5.0,
            snap_distance: 0.5,
            planning_deceleration: 25.0,
            commit_time_secs: 1.0,
            commit_distance: 10.0,
            fade_secs: 2.0,
        }
    }
}

// ============================================================================
// TURNS
// ============================================================================

/// Turn manoeuvre geometry. Every phase threshold is distance-based.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TurnConfig {
    /// Odometer value after which a turn may start (default: 38)
    pub trigger_position: f64,

    /// Radius around an intersection centre that arms a turn (default: 10)
    pub trigger_radius: f64,

    /// Offset applied to both axes of an intersection centre for the trigger test (default: 0.2)
    pub trigger_center_offset: f64,

    /// Straight run-in before rotation starts (default: 2)
    pub entering_distance: f64,

    /// Base distance covered during the 90° rotation (default: 9.54)
    pub rotation_distance: f64,

    /// Rotation distance multiplier for right turns (default: 0.8)
    pub right_scale: f64,

    /// Rotation distance multiplier for left turns (default: 0.9)
    pub left_scale: f64,

    /// Straight run-out after rotation (default: 2)
    pub exiting_distance: f64,

    /// Speed multiplier while rotating (default: 0.8)
    pub speed_factor: f64,

    /// Peak outward push of the left-turn swing (default: 0.4)
    pub left_swing: f64,
}

impl Default for TurnConfig {
    fn default() -> Self {
        Self {
            trigger_position: 38.0,
            trigger_radius: 10.0,
            trigger_center_offset: 0.2,
            entering_distance: 2.0,
            rotation_distance: 9.54,
            right_scale: 0.8,
            left_scale: 0.9,
            exiting_distance: 2.0,
            speed_factor: 0.8,
            left_swing: 0.4,
        }
    }
}

/// Full engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub physics: PhysicsConfig,
    pub turns: TurnConfig,
}

impl EngineConfig {
    /// Parses a (possibly partial) JSON override on top of the defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

// ============================================================================
// TOPOLOGY
// ============================================================================

#[derive(Debug, Error, PartialEq)]
pub enum TopologyError {
    #[error("Unknown map: {0}")]
    UnknownMap(String),
}

/// Circle around the signalised area in which lights are obeyed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LightZone {
    pub center: Vector2<f64>,
    pub radius: f64,
}

/// Per-map layout supplied to the engine at construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapTopology {
    /// Map identifier (e.g. "intersection", "cityGrid")
    pub map_id: String,

    /// Intersection centres in world (x, z); index is the intersection id
    pub intersections: Vec<Vector2<f64>>,

    /// Where traffic lights apply
    pub light_zone: LightZone,

    /// Vehicles beyond this |x| or |z| are removed
    pub scene_boundary: f64,

    /// Distance from the origin at which declared position 0 spawns
    pub spawn_offset: f64,

    /// Base lane offset from the road axis
    pub lane_offset: f64,
}

impl MapTopology {
    /// Single 4-way intersection at the origin.
    pub fn single(map_id: &str) -> Self {
        Self {
            map_id: map_id.to_string(),
            intersections: vec![Vector2::zeros()],
            light_zone: LightZone {
                center: Vector2::zeros(),
                radius: 45.0,
            },
            scene_boundary: 140.0,
            spawn_offset: 50.0,
            lane_offset: 2.5,
        }
    }

    /// 3x3 grid of intersections spaced `spacing` apart, centred on the origin.
    pub fn city_grid(spacing: f64) -> Self {
        let offsets = [-spacing, 0.0, spacing];
        let intersections = offsets
            .iter()
            .flat_map(|&x| offsets.iter().map(move |&z| Vector2::new(x, z)))
            .collect();

        Self {
            intersections,
            ..Self::single("cityGrid")
        }
    }

    /// Identifiers accepted by [`MapTopology::from_str`].
    pub fn known_maps() -> &'static [&'static str] {
        &[
            "intersection",
            "rainyIntersection",
            "desertIntersection",
            "snowyIntersection",
            "cityGrid",
        ]
    }
}

impl Default for MapTopology {
    fn default() -> Self {
        Self::single("intersection")
    }
}

impl FromStr for MapTopology {
    type Err = TopologyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            // Weather variants only differ in decoration
            "intersection" | "rainyIntersection" | "desertIntersection" | "snowyIntersection" => {
                Ok(Self::single(s))
            }
            "cityGrid" => Ok(Self::city_grid(60.0)),
            _ => Err(TopologyError::UnknownMap(s.to_string())),
        }
    }
}
