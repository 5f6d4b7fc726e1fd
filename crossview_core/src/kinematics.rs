//! Straight-line kinematics: car-following, light compliance and integration.
//!
//! Vehicles are processed lane by lane from the front of the queue backwards,
//! so a follower always sees the position its predecessor reached this frame.

use crate::config::{MapTopology, PhysicsConfig, TurnConfig};
use crate::lights::LightTracker;
use crate::types::{Direction, Lane, TurnDirection, TurnState};
use crate::vehicle::Vehicle;
use nalgebra::Vector2;
use std::collections::BTreeMap;

/// Queue key: vehicles sharing a direction and lane follow each other.
pub type LaneKey = (Direction, Lane);

/// Groups STRAIGHT vehicles by lane, each queue ordered front to back
/// (`current_position` descending, ties broken by id).
pub fn lane_groups(vehicles: &BTreeMap<u64, Vehicle>) -> BTreeMap<LaneKey, Vec<u64>> {
    let mut groups: BTreeMap<LaneKey, Vec<(f64, u64)>> = BTreeMap::new();

    for v in vehicles.values() {
        if v.turn_state == TurnState::Straight {
            groups
                .entry((v.direction, v.lane))
                .or_default()
                .push((v.current_position, v.id));
        }
    }

    groups
        .into_iter()
        .map(|(key, mut queue)| {
            queue.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)));
            (key, queue.into_iter().map(|(_, id)| id).collect())
        })
        .collect()
}

/// Read-only inputs shared by every vehicle in one frame.
pub struct FrameInputs<'a> {
    pub physics: &'a PhysicsConfig,
    pub turns: &'a TurnConfig,
    pub topology: &'a MapTopology,
    pub lights: &'a LightTracker,

    /// Estimated server time for this frame (ms)
    pub server_now_ms: f64,

    /// Frame delta (seconds)
    pub dt: f64,
}

/// What happened to a STRAIGHT vehicle during a frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StraightOutcome {
    /// Moved along its lane
    Moved,
    /// Armed a turn at the given intersection; no motion this frame
    TurnStarted(usize),
}

/// Finds an unvisited intersection close enough to arm a turn.
fn turn_trigger(v: &Vehicle, turns: &TurnConfig, topology: &MapTopology) -> Option<usize> {
    let offset = Vector2::new(turns.trigger_center_offset, turns.trigger_center_offset);

    topology
        .intersections
        .iter()
        .enumerate()
        .filter(|(idx, _)| !v.visited_intersections.contains(idx))
        .find(|(_, center)| (v.position - (*center + offset)).norm() <= turns.trigger_radius)
        .map(|(idx, _)| idx)
}

/// Light rule: returns the stop target when the vehicle has to brake.
fn light_stop_target(v: &Vehicle, inputs: &FrameInputs<'_>) -> Option<f64> {
    let physics = inputs.physics;
    let zone = &inputs.topology.light_zone;

    if (v.position - zone.center).norm() > zone.radius {
        return None;
    }

    let color = inputs.lights.color(v.direction);
    if !color.requires_stop() || v.current_position >= physics.stop_line {
        return None;
    }

    let remaining_secs = inputs.lights.remaining_ms(v.direction, inputs.server_now_ms) / 1000.0;
    let committed = remaining_secs <= physics.commit_time_secs
        && v.current_position >= physics.stop_line - physics.commit_distance;
    if committed {
        return None;
    }

    let stopping_distance =
        v.current_speed * v.current_speed / (2.0 * physics.planning_deceleration);
    if v.current_position + stopping_distance >= physics.stop_line - physics.stopping_buffer {
        Some(physics.stop_line)
    } else {
        None
    }
}

/// Advances one STRAIGHT vehicle by a frame.
///
/// `ahead_position` is the odometer of the vehicle directly in front in the
/// same lane queue, if any.
pub fn step_straight(
    v: &mut Vehicle,
    ahead_position: Option<f64>,
    inputs: &FrameInputs<'_>,
) -> StraightOutcome {
    let physics = inputs.physics;
    let turns = inputs.turns;
    let dt = inputs.dt;

    // 1. Turn initiation
    if v.turn_direction != TurnDirection::Straight && v.current_position >= turns.trigger_position {
        if let Some(idx) = turn_trigger(v, turns, inputs.topology) {
            v.visited_intersections.insert(idx);
            v.turn_intersection = Some(idx);
            v.turn_state = TurnState::EnteringTurn;
            v.turn_start_position = v.current_position;
            v.rotation = v.direction.heading();
            return StraightOutcome::TurnStarted(idx);
        }
    }

    // 2. Car-following
    let mut stop_target = ahead_position
        .filter(|ahead| ahead - v.current_position < physics.safe_distance + physics.stopping_buffer)
        .map(|ahead| ahead - physics.safe_distance);

    // 3. Lights
    if stop_target.is_none() {
        stop_target = light_stop_target(v, inputs);
    }

    // 4. Speed
    match stop_target {
        Some(target) => {
            let distance = target - v.current_position;
            if distance < physics.snap_distance {
                v.current_speed = 0.0;
            } else {
                let rate = if distance < physics.near_stop_distance {
                    physics.hard_braking
                } else {
                    physics.braking
                };
                v.current_speed = (v.current_speed - rate * dt).max(0.0);
            }
            v.waiting = true;
        }
        None => {
            v.current_speed = (v.current_speed + physics.acceleration * dt).min(v.target_speed);
            v.waiting = false;
        }
    }

    // 5. Position
    v.advance_straight(v.current_speed * dt);
    StraightOutcome::Moved
}
