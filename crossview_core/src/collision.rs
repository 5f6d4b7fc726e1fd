//! Collision detection and the collision registry.
//!
//! Two passes per frame:
//! 1. Lane-ordinal: adjacent vehicles in a STRAIGHT lane queue whose odometers
//!    are closer than the collision threshold.
//! 2. Spatial: only when something is ROTATING, Euclidean distance between all
//!    pairs involving at least one turning vehicle.
//!
//! The registry counts a pair once when it starts colliding and forgets it as
//! soon as it stops, so separating and re-overlapping counts again.

use crate::config::PhysicsConfig;
use crate::kinematics::LaneKey;
use crate::types::TurnState;
use crate::vehicle::Vehicle;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Unordered vehicle pair, stored with the lower id first.
pub type PairKey = (u64, u64);

pub fn pair_key(a: u64, b: u64) -> PairKey {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Pairs in contact this frame.
pub fn detect(
    vehicles: &BTreeMap<u64, Vehicle>,
    groups: &BTreeMap<LaneKey, Vec<u64>>,
    physics: &PhysicsConfig,
) -> BTreeSet<PairKey> {
    let mut pairs = BTreeSet::new();

    // Lane-ordinal pass
    for queue in groups.values() {
        for window in queue.windows(2) {
            let (Some(a), Some(b)) = (vehicles.get(&window[0]), vehicles.get(&window[1])) else {
                continue;
            };
            if (a.current_position - b.current_position).abs() < physics.collision_threshold {
                pairs.insert(pair_key(a.id, b.id));
            }
        }
    }

    // Spatial pass
    let any_rotating = vehicles.values().any(|v| v.turn_state == TurnState::Rotating);
    if !any_rotating {
        return pairs;
    }

    let all: Vec<&Vehicle> = vehicles.values().collect();
    for (i, a) in all.iter().enumerate() {
        for b in &all[i + 1..] {
            if !a.is_turning() && !b.is_turning() {
                continue;
            }
            let radius = if a.turn_state == TurnState::Rotating || b.turn_state == TurnState::Rotating {
                physics.turn_collision_radius
            } else {
                physics.collision_threshold
            };
            if (a.position - b.position).norm() < radius {
                pairs.insert(pair_key(a.id, b.id));
            }
        }
    }

    pairs
}

/// Pairs currently in contact plus the running total of distinct contacts.
#[derive(Debug, Clone, Default)]
pub struct CollisionRegistry {
    active: BTreeSet<PairKey>,
    count: u64,
}

impl CollisionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the active set with this frame's contacts.
    ///
    /// Returns the pairs that were not in contact last frame; each of those
    /// increments the counter.
    pub fn update(&mut self, current: BTreeSet<PairKey>) -> Vec<PairKey> {
        let new_pairs: Vec<PairKey> = current.difference(&self.active).copied().collect();

        for &(a, b) in &new_pairs {
            debug!(vehicle_a = a, vehicle_b = b, "Collision detected");
        }

        self.count += new_pairs.len() as u64;
        self.active = current;
        new_pairs
    }

    /// Drops every pair involving `id`.
    pub fn forget_vehicle(&mut self, id: u64) {
        self.active.retain(|&(a, b)| a != id && b != id);
    }

    pub fn is_active(&self, a: u64, b: u64) -> bool {
        self.active.contains(&pair_key(a, b))
    }

    pub fn active_pairs(&self) -> impl Iterator<Item = &PairKey> {
        self.active.iter()
    }

    /// Distinct collisions since the engine started.
    pub fn count(&self) -> u64 {
        self.count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MapTopology;
    use crate::kinematics::lane_groups;
    use crate::snapshot::VehicleRecord;
    use crate::types::{Direction, Lane, TurnDirection};

    fn vehicle(id: u64, direction: Direction, position: f64) -> Vehicle {
        let record = VehicleRecord {
            id,
            direction,
            lane: Lane::First,
            position,
            speed: 10.0,
        };
        Vehicle::spawn(&record, &MapTopology::default(), TurnDirection::Straight)
    }

    fn map(vehicles: Vec<Vehicle>) -> BTreeMap<u64, Vehicle> {
        vehicles.into_iter().map(|v| (v.id, v)).collect()
    }

    fn set(pairs: &[PairKey]) -> BTreeSet<PairKey> {
        pairs.iter().copied().collect()
    }

    #[test]
    fn test_pair_key_is_canonical() {
        assert_eq!(pair_key(9, 3), (3, 9));
        assert_eq!(pair_key(3, 9), (3, 9));
    }

    #[test]
    fn test_lane_ordinal_detection() {
        let vehicles = map(vec![
            vehicle(1, Direction::N, 20.0),
            vehicle(2, Direction::N, 18.0),
            vehicle(3, Direction::N, 10.0),
            // Different lane queue, same odometer
            vehicle(4, Direction::E, 20.0),
        ]);
        let groups = lane_groups(&vehicles);

        let pairs = detect(&vehicles, &groups, &PhysicsConfig::default());
        assert_eq!(pairs, set(&[(1, 2)]));
    }

    #[test]
    fn test_spatial_pass_only_with_rotation() {
        let mut turning = vehicle(1, Direction::N, 40.0);
        turning.turn_state = TurnState::ExitingTurn;
        let mut other = vehicle(2, Direction::E, 0.0);
        other.position = turning.position + nalgebra::Vector2::new(2.0, 0.0);

        let mut vehicles = map(vec![turning, other]);
        let physics = PhysicsConfig::default();

        // No one rotating: spatial pass skipped
        let groups = lane_groups(&vehicles);
        assert!(detect(&vehicles, &groups, &physics).is_empty());

        if let Some(v) = vehicles.get_mut(&1) {
            v.turn_state = TurnState::Rotating;
        }
        let groups = lane_groups(&vehicles);
        assert_eq!(detect(&vehicles, &groups, &physics), set(&[(1, 2)]));
    }

    #[test]
    fn test_rotating_radius_is_wider() {
        let mut rotating = vehicle(1, Direction::N, 40.0);
        rotating.turn_state = TurnState::Rotating;
        let mut exiting = vehicle(2, Direction::S, 40.0);
        exiting.turn_state = TurnState::ExitingTurn;
        let mut near_exiting = vehicle(3, Direction::W, 0.0);
        let mut near_rotating = vehicle(4, Direction::W, 20.0);

        exiting.position = nalgebra::Vector2::new(100.0, 100.0);
        near_exiting.position = exiting.position + nalgebra::Vector2::new(2.7, 0.0);
        near_rotating.position = rotating.position + nalgebra::Vector2::new(2.7, 0.0);

        let vehicles = map(vec![rotating, exiting, near_exiting, near_rotating]);
        let groups = lane_groups(&vehicles);

        // 2.7 apart: inside the rotating radius, outside the straight threshold
        let pairs = detect(&vehicles, &groups, &PhysicsConfig::default());
        assert_eq!(pairs, set(&[(1, 4)]));
    }

    #[test]
    fn test_overlap_separate_reoverlap_counts_twice() {
        let mut registry = CollisionRegistry::new();

        for _ in 0..5 {
            registry.update(set(&[(1, 2)]));
        }
        assert_eq!(registry.count(), 1);
        assert!(registry.is_active(2, 1));

        registry.update(BTreeSet::new());
        assert!(!registry.is_active(1, 2));

        let fresh = registry.update(set(&[(1, 2)]));
        assert_eq!(fresh, vec![(1, 2)]);
        assert_eq!(registry.count(), 2);
    }

    #[test]
    fn test_forget_vehicle() {
        let mut registry = CollisionRegistry::new();
        registry.update(set(&[(1, 2), (2, 3), (4, 5)]));

        registry.forget_vehicle(2);
        let remaining: Vec<_> = registry.active_pairs().copied().collect();
        assert_eq!(remaining, vec![(4, 5)]);
        assert_eq!(registry.count(), 3);
    }
}
