//! Shared vocabulary: compass directions, lanes, turn intentions, light colors.
//!
//! World convention: the ground plane is (x, z). Vectors are stored as
//! `Vector2<f64>` with `.x` = world x and `.y` = world z.

use nalgebra::Vector2;
use serde::{Deserialize, Serialize};
use std::f64::consts::{FRAC_PI_2, PI};
use std::fmt;
use std::str::FromStr;

/// Compass direction of travel.
///
/// A `N` vehicle is heading north, i.e. it came FROM the south.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Direction {
    N,
    E,
    S,
    W,
}

impl Direction {
    /// All four directions in display order.
    pub const ALL: [Direction; 4] = [Direction::N, Direction::S, Direction::E, Direction::W];

    /// Unit movement vector in world (x, z).
    pub fn unit(&self) -> Vector2<f64> {
        match self {
            Direction::N => Vector2::new(0.0, -1.0),
            Direction::S => Vector2::new(0.0, 1.0),
            Direction::E => Vector2::new(1.0, 0.0),
            Direction::W => Vector2::new(-1.0, 0.0),
        }
    }

    /// Render heading (yaw, radians) for a vehicle travelling this way.
    pub fn heading(&self) -> f64 {
        match self {
            Direction::N => PI,
            Direction::E => FRAC_PI_2,
            Direction::S => 0.0,
            Direction::W => -FRAC_PI_2,
        }
    }

    /// Direction after completing a turn.
    pub fn turned(&self, turn: TurnDirection) -> Direction {
        match (self, turn) {
            (_, TurnDirection::Straight) => *self,
            (Direction::N, TurnDirection::Left) => Direction::W,
            (Direction::N, TurnDirection::Right) => Direction::E,
            (Direction::E, TurnDirection::Left) => Direction::N,
            (Direction::E, TurnDirection::Right) => Direction::S,
            (Direction::S, TurnDirection::Left) => Direction::E,
            (Direction::S, TurnDirection::Right) => Direction::W,
            (Direction::W, TurnDirection::Left) => Direction::S,
            (Direction::W, TurnDirection::Right) => Direction::N,
        }
    }

    /// Single-letter wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::N => "N",
            Direction::E => "E",
            Direction::S => "S",
            Direction::W => "W",
        }
    }

    /// Long name used on light displays.
    pub fn display_name(&self) -> &'static str {
        match self {
            Direction::N => "NORTH",
            Direction::E => "EAST",
            Direction::S => "SOUTH",
            Direction::W => "WEST",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "N" => Ok(Direction::N),
            "E" => Ok(Direction::E),
            "S" => Ok(Direction::S),
            "W" => Ok(Direction::W),
            _ => Err(format!("Unknown direction: {}", s)),
        }
    }
}

/// Logical lane within one direction of travel.
///
/// The server sends free-form lane labels ("Lane1", "1", "Lane2"). Anything
/// containing the digit `1` is the first lane; everything else is the second.
/// Vehicles that complete a turn are moved to the second lane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Lane {
    First,
    Second,
}

impl Lane {
    /// Resolves a server lane label.
    pub fn from_label(label: &str) -> Lane {
        if label.contains('1') {
            Lane::First
        } else {
            Lane::Second
        }
    }

    /// Perpendicular offset of the lane centre line from the road axis.
    pub fn offset(&self, lane_offset: f64) -> f64 {
        match self {
            Lane::First => -lane_offset * 0.8,
            Lane::Second => lane_offset * 0.8,
        }
    }
}

/// What a vehicle intends to do at its next intersection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnDirection {
    Straight,
    Left,
    Right,
}

impl TurnDirection {
    /// Categorical draw: 50% straight, 25% left, 25% right.
    pub fn from_roll(roll: f64) -> TurnDirection {
        if roll < 0.5 {
            TurnDirection::Straight
        } else if roll < 0.75 {
            TurnDirection::Left
        } else {
            TurnDirection::Right
        }
    }

    /// Signed heading change of the full manoeuvre.
    pub fn heading_delta(&self) -> f64 {
        match self {
            TurnDirection::Straight => 0.0,
            TurnDirection::Left => FRAC_PI_2,
            TurnDirection::Right => -FRAC_PI_2,
        }
    }
}

/// Phase of the per-vehicle turn state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TurnState {
    Straight,
    EnteringTurn,
    Rotating,
    ExitingTurn,
}

/// Traffic light color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LightColor {
    Red,
    Yellow,
    Green,
}

impl LightColor {
    /// True for colors a vehicle has to stop for.
    pub fn requires_stop(&self) -> bool {
        matches!(self, LightColor::Red | LightColor::Yellow)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LightColor::Red => "RED",
            LightColor::Yellow => "YELLOW",
            LightColor::Green => "GREEN",
        }
    }
}

impl FromStr for LightColor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "RED" => Ok(LightColor::Red),
            "YELLOW" => Ok(LightColor::Yellow),
            "GREEN" => Ok(LightColor::Green),
            _ => Err(format!("Unknown light color: {}", s)),
        }
    }
}

impl fmt::Display for LightColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_turn_map_is_consistent_with_headings() {
        for dir in Direction::ALL {
            for turn in [TurnDirection::Left, TurnDirection::Right] {
                let new_dir = dir.turned(turn);
                let expected = dir.heading() + turn.heading_delta();
                // Compare modulo 2π
                let diff = (expected - new_dir.heading()).rem_euclid(2.0 * PI);
                assert!(diff < 1e-9 || (2.0 * PI - diff) < 1e-9, "{dir} {turn:?} -> {new_dir}");
            }
        }
    }

    #[test]
    fn test_unit_vectors() {
        assert_eq!(Direction::N.unit(), Vector2::new(0.0, -1.0));
        assert_eq!(Direction::W.unit(), Vector2::new(-1.0, 0.0));
        assert_relative_eq!(Direction::E.unit().norm(), 1.0);
    }

    #[test]
    fn test_lane_labels() {
        assert_eq!(Lane::from_label("Lane1"), Lane::First);
        assert_eq!(Lane::from_label("1"), Lane::First);
        assert_eq!(Lane::from_label("Lane2"), Lane::Second);
        assert_eq!(Lane::from_label(""), Lane::Second);
        assert_relative_eq!(Lane::First.offset(2.5), -2.0);
    }

    #[test]
    fn test_turn_roll_buckets() {
        assert_eq!(TurnDirection::from_roll(0.0), TurnDirection::Straight);
        assert_eq!(TurnDirection::from_roll(0.49), TurnDirection::Straight);
        assert_eq!(TurnDirection::from_roll(0.5), TurnDirection::Left);
        assert_eq!(TurnDirection::from_roll(0.74), TurnDirection::Left);
        assert_eq!(TurnDirection::from_roll(0.75), TurnDirection::Right);
        assert_eq!(TurnDirection::from_roll(0.99), TurnDirection::Right);
    }

    #[test]
    fn test_parse_wire_names() {
        assert_eq!("S".parse::<Direction>(), Ok(Direction::S));
        assert!("X".parse::<Direction>().is_err());
        assert_eq!("YELLOW".parse::<LightColor>(), Ok(LightColor::Yellow));
        assert!("BLUE".parse::<LightColor>().is_err());
    }
}
