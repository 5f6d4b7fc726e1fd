//! Turn state machine.
//!
//! Every phase boundary is measured in odometer distance, never in time, so
//! the swept geometry is the same at any frame rate. Turning vehicles keep
//! their speed and ignore lights and car-following.

use crate::config::TurnConfig;
use crate::types::{Lane, TurnDirection, TurnState};
use crate::vehicle::Vehicle;
use nalgebra::Vector2;
use std::f64::consts::{FRAC_PI_2, PI};
use tracing::debug;

/// Phase transition reported back to the engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TurnEvent {
    /// Still in the same phase
    None,
    RotationStarted,
    RotationFinished,
    /// Back to STRAIGHT with a freshly rolled intention
    Completed(TurnDirection),
}

/// Advances a turning vehicle by one frame.
///
/// `roll` supplies a uniform value in [0, 1) for the next intention and is
/// only called when the manoeuvre completes.
pub fn step_turn(
    v: &mut Vehicle,
    dt: f64,
    turns: &TurnConfig,
    roll: impl FnOnce() -> f64,
) -> TurnEvent {
    match v.turn_state {
        TurnState::Straight => TurnEvent::None,
        TurnState::EnteringTurn => step_entering(v, dt, turns),
        TurnState::Rotating => step_rotating(v, dt, turns),
        TurnState::ExitingTurn => step_exiting(v, dt, turns, roll),
    }
}

fn step_entering(v: &mut Vehicle, dt: f64, turns: &TurnConfig) -> TurnEvent {
    v.advance_straight(v.current_speed * dt);

    if v.phase_distance() < turns.entering_distance {
        return TurnEvent::None;
    }

    v.turn_state = TurnState::Rotating;
    v.initial_rotation = v.direction.heading();
    v.target_rotation = v.initial_rotation + v.turn_direction.heading_delta();
    v.rotation = v.initial_rotation;
    v.turn_start_position = v.current_position;
    TurnEvent::RotationStarted
}

/// Distance the 90° rotation is spread over for a given intention.
pub fn rotation_distance(turn: TurnDirection, turns: &TurnConfig) -> f64 {
    match turn {
        TurnDirection::Right => turns.rotation_distance * turns.right_scale,
        TurnDirection::Left => turns.rotation_distance * turns.left_scale,
        TurnDirection::Straight => turns.rotation_distance,
    }
}

/// Movement direction during rotation for eased progress `e`.
///
/// Right turns cut the corner; left turns swing out first and pull in late.
fn blend_direction(
    turn: TurnDirection,
    old: Vector2<f64>,
    new: Vector2<f64>,
    e: f64,
    turns: &TurnConfig,
) -> Vector2<f64> {
    match turn {
        TurnDirection::Left => {
            let early = e.powf(0.7);
            let late = e.powf(1.5);
            old * (2.0 - early) + new * late + new * (e * PI).sin() * turns.left_swing
        }
        TurnDirection::Right => old * (1.5 - e) + new * e,
        TurnDirection::Straight => old,
    }
}

fn step_rotating(v: &mut Vehicle, dt: f64, turns: &TurnConfig) -> TurnEvent {
    let total = rotation_distance(v.turn_direction, turns);
    let progress = (v.phase_distance() / total).clamp(0.0, 1.0);

    v.rotation = v.initial_rotation + (v.target_rotation - v.initial_rotation) * progress;

    let new_direction = v.direction.turned(v.turn_direction);
    let eased = (progress * FRAC_PI_2).sin();
    let heading = blend_direction(
        v.turn_direction,
        v.direction.unit(),
        new_direction.unit(),
        eased,
        turns,
    );

    let distance = v.current_speed * dt * turns.speed_factor;
    v.position += heading * distance;
    v.current_position += distance;

    if v.phase_distance() < total {
        return TurnEvent::None;
    }

    v.direction = new_direction;
    v.rotation = v.target_rotation;
    v.lane = Lane::Second;
    v.turn_start_position = v.current_position;
    v.turn_state = TurnState::ExitingTurn;
    TurnEvent::RotationFinished
}

fn step_exiting(
    v: &mut Vehicle,
    dt: f64,
    turns: &TurnConfig,
    roll: impl FnOnce() -> f64,
) -> TurnEvent {
    v.advance_straight(v.current_speed * dt);

    if v.phase_distance() < turns.exiting_distance {
        return TurnEvent::None;
    }

    let next = TurnDirection::from_roll(roll());
    debug!(
        vehicle = v.id,
        direction = %v.direction,
        next = ?next,
        "Turn completed"
    );

    v.turn_state = TurnState::Straight;
    v.turn_direction = next;
    v.turn_intersection = None;
    v.turn_start_position = 0.0;
    v.rotation = v.direction.heading();
    v.initial_rotation = v.rotation;
    v.target_rotation = v.rotation;
    TurnEvent::Completed(next)
}
