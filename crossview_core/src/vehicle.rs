//! Locally predicted vehicle state.

use crate::config::MapTopology;
use crate::snapshot::VehicleRecord;
use crate::types::{Direction, Lane, TurnDirection, TurnState};
use nalgebra::Vector2;
use serde::Serialize;
use std::collections::HashSet;
use std::time::Duration;

/// A vehicle as predicted by the engine.
///
/// Created from the first snapshot record carrying its id and never resynced
/// afterwards: from then on the local integrator is authoritative.
#[derive(Debug, Clone)]
pub struct Vehicle {
    /// Server-assigned id
    pub id: u64,

    // === Route ===

    /// Current compass direction of travel (changes after a turn)
    pub direction: Direction,

    /// Current lane within `direction`
    pub lane: Lane,

    /// Intention for the next intersection
    pub turn_direction: TurnDirection,

    // === Kinematics ===

    /// Server-declared desired speed
    pub target_speed: f64,

    /// Locally simulated speed, always in [0, target_speed]
    pub current_speed: f64,

    /// Odometer: distance travelled since spawn
    pub current_position: f64,

    /// World (x, z); `.y` is world z
    pub position: Vector2<f64>,

    /// Render heading (radians)
    pub rotation: f64,

    /// True while braking for a light or a car ahead
    pub waiting: bool,

    // === Turn state machine ===

    pub turn_state: TurnState,

    /// Heading captured when rotation starts
    pub initial_rotation: f64,

    /// Heading at the end of the rotation
    pub target_rotation: f64,

    /// Odometer value at the start of the active turn phase
    pub turn_start_position: f64,

    /// Intersection used by the turn in progress
    pub turn_intersection: Option<usize>,

    /// Intersections already used for a turn
    pub visited_intersections: HashSet<usize>,

    // === Lifecycle ===

    /// Set by a server reset; the vehicle fades out and is then removed
    pub fading: bool,

    /// Local time at which fading started
    pub fade_start: Option<Duration>,

    /// Current render opacity in [0, 1]
    pub opacity: f64,
}

/// World position for a declared odometer value on a straight approach.
///
/// Vehicles spawn `spawn_offset` away from the origin on the side they come
/// from and move towards it; the lane offset is perpendicular to travel.
pub fn placement(topology: &MapTopology, direction: Direction, lane: Lane, position: f64) -> Vector2<f64> {
    let off = lane.offset(topology.lane_offset);
    let spawn = topology.spawn_offset;

    match direction {
        Direction::N => Vector2::new(-off, spawn - position),
        Direction::S => Vector2::new(off, -spawn + position),
        Direction::E => Vector2::new(-spawn + position, -off),
        Direction::W => Vector2::new(spawn - position, off),
    }
}

impl Vehicle {
    /// Seeds a vehicle from its first snapshot record.
    pub fn spawn(record: &VehicleRecord, topology: &MapTopology, turn_direction: TurnDirection) -> Self {
        let heading = record.direction.heading();

        Self {
            id: record.id,
            direction: record.direction,
            lane: record.lane,
            turn_direction,
            target_speed: record.speed,
            current_speed: record.speed,
            current_position: record.position,
            position: placement(topology, record.direction, record.lane, record.position),
            rotation: heading,
            waiting: false,
            turn_state: TurnState::Straight,
            initial_rotation: heading,
            target_rotation: heading,
            turn_start_position: 0.0,
            turn_intersection: None,
            visited_intersections: HashSet::new(),
            fading: false,
            fade_start: None,
            opacity: 1.0,
        }
    }

    /// Moves the vehicle `distance` along `direction` (incremental integration).
    pub fn advance_straight(&mut self, distance: f64) {
        self.position += self.direction.unit() * distance;
        self.current_position += distance;
    }

    /// Distance covered since the active turn phase started.
    pub fn phase_distance(&self) -> f64 {
        self.current_position - self.turn_start_position
    }

    pub fn is_turning(&self) -> bool {
        self.turn_state != TurnState::Straight
    }

    /// Heading the renderer should use.
    pub fn render_heading(&self) -> f64 {
        match self.turn_state {
            TurnState::Straight => self.direction.heading(),
            _ => self.rotation,
        }
    }

    pub fn view(&self) -> VehicleView {
        VehicleView {
            id: self.id,
            x: self.position.x,
            z: self.position.y,
            heading: self.render_heading(),
            waiting: self.waiting,
            opacity: self.opacity,
            turn_state: self.turn_state,
        }
    }
}

/// Per-frame output for the renderer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VehicleView {
    pub id: u64,
    pub x: f64,
    pub z: f64,
    pub heading: f64,
    /// Brake lights on
    pub waiting: bool,
    pub opacity: f64,
    pub turn_state: TurnState,
}
