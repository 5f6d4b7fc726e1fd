//! Engine - owns all predicted state and advances it frame by frame.
//!
//! # Frame pipeline
//!
//! ```text
//!   snapshot JSON ──► ingest() ──► vehicles (spawn only) / lights / clock anchor
//!
//!   step(dt):
//!     lane queues ──► straight kinematics ──► turn state machine
//!                 ──► collision detection ──► bounds + fade GC
//! ```
//!
//! The engine is generic over [`EngineContext`] so the same code runs against
//! the tokio clock in production and a hand-driven clock in tests.

use crate::clock::ServerClock;
use crate::collision::{self, CollisionRegistry, PairKey};
use crate::config::{EngineConfig, MapTopology};
use crate::kinematics::{self, FrameInputs, StraightOutcome};
use crate::lifecycle;
use crate::lights::{LightTracker, LightView};
use crate::snapshot::{Snapshot, SnapshotError};
use crate::turning::{self, TurnEvent};
use crate::types::{TurnDirection, TurnState};
use crate::vehicle::{Vehicle, VehicleView};
use crossview_env::EngineContext;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, warn};

/// Summary of one ingested snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngestReport {
    /// New vehicles created
    pub spawned: usize,
    /// Records for ids that were already tracked (left untouched)
    pub known: usize,
    /// Records dropped during validation
    pub rejected: usize,
    /// Lights overwritten
    pub lights: usize,
    /// Vehicles that started (or restarted) fading because of a reset
    pub faded: usize,
    /// Tracked vehicles dropped because a non-reset list omitted them
    pub removed: usize,
}

/// Summary of one frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepReport {
    pub turns_started: usize,
    pub turns_completed: usize,
    pub new_collisions: Vec<PairKey>,
    /// Vehicles removed (out of bounds or fully faded)
    pub removed: Vec<u64>,
}

/// Local prediction engine for one map.
pub struct Engine<Ctx: EngineContext> {
    /// Environment context (clock + randomness)
    pub context: Arc<Ctx>,

    config: EngineConfig,
    topology: MapTopology,

    vehicles: BTreeMap<u64, Vehicle>,
    lights: LightTracker,
    clock: ServerClock,
    collisions: CollisionRegistry,

    /// Last `event` / `events` payload, for HUD collaborators
    last_event: Option<Value>,

    paused: bool,
    frame_count: u64,
}

impl<Ctx: EngineContext> Engine<Ctx> {
    pub fn new(context: Arc<Ctx>, config: EngineConfig, topology: MapTopology) -> Self {
        debug!(
            map = %topology.map_id,
            intersections = topology.intersections.len(),
            "Engine created"
        );

        Self {
            context,
            config,
            topology,
            vehicles: BTreeMap::new(),
            lights: LightTracker::new(),
            clock: ServerClock::new(),
            collisions: CollisionRegistry::new(),
            last_event: None,
            paused: false,
            frame_count: 0,
        }
    }

    // ========================================================================
    // INGESTION
    // ========================================================================

    /// Parses and ingests a raw server message.
    ///
    /// On a message-level failure the error is logged and returned, and no
    /// state is touched.
    pub fn ingest_json(&mut self, payload: &str) -> Result<IngestReport, SnapshotError> {
        match Snapshot::from_json(payload) {
            Ok(snapshot) => Ok(self.ingest(snapshot)),
            Err(e) => {
                warn!(error = %e, bytes = payload.len(), "Discarding snapshot");
                Err(e)
            }
        }
    }

    /// Applies a validated snapshot.
    ///
    /// Known vehicle ids are never resynced: the local integrator stays
    /// authoritative once a vehicle exists. A non-reset snapshot that carries
    /// a vehicle list is the full id set: tracked ids missing from it are
    /// removed. On a reset, missing vehicles fade out instead.
    pub fn ingest(&mut self, snapshot: Snapshot) -> IngestReport {
        let now = self.context.now();
        let mut report = IngestReport {
            rejected: snapshot.rejected_records,
            ..IngestReport::default()
        };

        if snapshot.reset {
            for v in self.vehicles.values_mut() {
                lifecycle::begin_fade(v, now);
                report.faded += 1;
            }
            debug!(faded = report.faded, "Reset received");
        } else if let Some(records) = &snapshot.vehicles {
            let listed: BTreeSet<u64> = records.iter().map(|r| r.id).collect();
            let absent: Vec<u64> = self
                .vehicles
                .keys()
                .filter(|id| !listed.contains(id))
                .copied()
                .collect();
            report.removed = absent.len();
            for id in absent {
                self.vehicles.remove(&id);
                self.collisions.forget_vehicle(id);
                debug!(vehicle = id, "Vehicle absent from snapshot");
            }
        }

        for record in snapshot.vehicles.iter().flatten() {
            if self.vehicles.contains_key(&record.id) {
                report.known += 1;
                continue;
            }

            let turn = TurnDirection::from_roll(self.context.random_unit());
            let vehicle = Vehicle::spawn(record, &self.topology, turn);
            debug!(
                vehicle = record.id,
                direction = %record.direction,
                position = record.position,
                speed = record.speed,
                turn = ?turn,
                "Vehicle spawned"
            );
            self.vehicles.insert(record.id, vehicle);
            report.spawned += 1;
        }

        let anchor_ms = snapshot
            .server_timestamp_ms
            .unwrap_or_else(|| self.context.wall_clock_ms());
        self.clock.anchor(anchor_ms, now);

        for light in snapshot.lights.iter().flatten() {
            self.lights.apply(light, anchor_ms);
            report.lights += 1;
        }

        if let Some(event) = snapshot.event.or(snapshot.events) {
            self.last_event = Some(event);
        }

        report
    }

    // ========================================================================
    // FRAME STEP
    // ========================================================================

    /// Advances the prediction by `dt` seconds.
    ///
    /// A no-op while paused or for a non-positive / non-finite `dt`.
    pub fn step(&mut self, dt: f64) -> StepReport {
        let mut report = StepReport::default();
        if self.paused || !dt.is_finite() || dt <= 0.0 {
            return report;
        }

        self.frame_count += 1;
        let now = self.context.now();
        let server_now_ms = self.server_now();

        // Turning vehicles are collected first so a turn armed this frame
        // does not also move this frame.
        let turning_ids: Vec<u64> = self
            .vehicles
            .values()
            .filter(|v| v.is_turning())
            .map(|v| v.id)
            .collect();

        let inputs = FrameInputs {
            physics: &self.config.physics,
            turns: &self.config.turns,
            topology: &self.topology,
            lights: &self.lights,
            server_now_ms,
            dt,
        };

        for queue in kinematics::lane_groups(&self.vehicles).values() {
            let mut ahead: Option<f64> = None;
            for id in queue {
                let Some(v) = self.vehicles.get_mut(id) else {
                    continue;
                };
                if let StraightOutcome::TurnStarted(intersection) =
                    kinematics::step_straight(v, ahead, &inputs)
                {
                    debug!(vehicle = v.id, intersection, turn = ?v.turn_direction, "Turn started");
                    report.turns_started += 1;
                }
                ahead = Some(v.current_position);
            }
        }

        let context = &self.context;
        for id in turning_ids {
            let Some(v) = self.vehicles.get_mut(&id) else {
                continue;
            };
            if let TurnEvent::Completed(_) =
                turning::step_turn(v, dt, &self.config.turns, || context.random_unit())
            {
                report.turns_completed += 1;
            }
        }

        let groups = kinematics::lane_groups(&self.vehicles);
        let contacts = collision::detect(&self.vehicles, &groups, &self.config.physics);
        report.new_collisions = self.collisions.update(contacts);

        report.removed = self.collect_garbage(now);
        report
    }

    /// Removes vehicles that left the scene or finished fading.
    fn collect_garbage(&mut self, now: std::time::Duration) -> Vec<u64> {
        let boundary = self.topology.scene_boundary;
        let fade_secs = self.config.physics.fade_secs;

        let removed: Vec<u64> = self
            .vehicles
            .values_mut()
            .filter_map(|v| {
                let faded = lifecycle::update_fade(v, now, fade_secs);
                (faded || lifecycle::out_of_bounds(v, boundary)).then_some(v.id)
            })
            .collect();

        for id in &removed {
            self.vehicles.remove(id);
            self.collisions.forget_vehicle(*id);
            debug!(vehicle = *id, "Vehicle removed");
        }
        removed
    }

    // ========================================================================
    // QUERIES
    // ========================================================================

    /// Estimated server time (ms) at the context's current local time.
    pub fn server_now(&self) -> f64 {
        self.clock
            .estimated_server_now(self.context.now(), self.context.wall_clock_ms())
    }

    pub fn vehicle_views(&self) -> Vec<VehicleView> {
        self.vehicles.values().map(Vehicle::view).collect()
    }

    pub fn light_views(&self) -> Vec<LightView> {
        self.lights.views(self.server_now())
    }

    pub fn vehicle(&self, id: u64) -> Option<&Vehicle> {
        self.vehicles.get(&id)
    }

    pub fn vehicles(&self) -> impl Iterator<Item = &Vehicle> {
        self.vehicles.values()
    }

    pub fn vehicle_count(&self) -> usize {
        self.vehicles.len()
    }

    /// Number of vehicles currently in any turn phase.
    pub fn turning_count(&self) -> usize {
        self.vehicles
            .values()
            .filter(|v| v.turn_state != TurnState::Straight)
            .count()
    }

    pub fn lights(&self) -> &LightTracker {
        &self.lights
    }

    pub fn collision_count(&self) -> u64 {
        self.collisions.count()
    }

    pub fn collisions(&self) -> &CollisionRegistry {
        &self.collisions
    }

    pub fn last_event(&self) -> Option<&Value> {
        self.last_event.as_ref()
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn topology(&self) -> &MapTopology {
        &self.topology
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Direction, LightColor};
    use nalgebra::Vector2;
    use approx::assert_relative_eq;
    use crossview_env::ManualContext;
    use serde_json::json;

    const DT: f64 = 1.0 / 60.0;

    fn engine() -> (Arc<ManualContext>, Engine<ManualContext>) {
        let ctx = ManualContext::shared();
        let engine = Engine::new(ctx.clone(), EngineConfig::default(), MapTopology::default());
        (ctx, engine)
    }

    fn run(ctx: &ManualContext, engine: &mut Engine<ManualContext>, frames: usize, dt: f64) {
        for _ in 0..frames {
            ctx.advance_secs(dt);
            engine.step(dt);
        }
    }

    fn light(direction: &str, color: &str, secs: f64) -> Value {
        json!({"direction": direction, "color": color, "remainingSeconds": secs})
    }

    fn vehicle(id: u64, position: f64, speed: f64) -> Value {
        json!({"id": id, "direction": "N", "lane": "Lane1", "position": position, "speed": speed})
    }

    #[test]
    fn test_free_flow_end_to_end() {
        let (ctx, mut engine) = engine();
        let msg = json!({
            "vehicles": [vehicle(1, 0.0, 10.0)],
            "lights": [light("N", "GREEN", 30.0)],
            "serverTimestampMs": 1_000_000.0,
        });
        let report = engine.ingest_json(&msg.to_string()).unwrap();
        assert_eq!(report.spawned, 1);
        assert_eq!(report.lights, 1);

        run(&ctx, &mut engine, 210, DT);

        let v = engine.vehicle(1).unwrap();
        assert_relative_eq!(v.current_position, 35.0, epsilon = 0.5);
        assert!(!v.waiting);
    }

    // The planning rule brakes once `cp + v^2/50` reaches `stop_line -
    // stopping_buffer`, so the rest point lands anywhere in [33, 35].
    #[test]
    fn test_red_light_settles_between_buffer_and_stop_line() {
        let (ctx, mut engine) = engine();
        let msg = json!({
            "vehicles": [vehicle(1, 0.0, 10.0)],
            "lights": [light("N", "RED", 10.0)],
            "serverTimestampMs": 1_000_000.0,
        });
        engine.ingest_json(&msg.to_string()).unwrap();

        run(&ctx, &mut engine, 300, DT);

        let v = engine.vehicle(1).unwrap();
        let physics = &engine.config().physics;
        assert_eq!(v.current_speed, 0.0);
        assert!(v.waiting);
        assert!(v.current_position >= physics.stop_line - physics.stopping_buffer);
        assert!(v.current_position <= physics.stop_line);
    }

    #[test]
    fn test_platoon_keeps_gap() {
        let (ctx, mut engine) = engine();
        let msg = json!({
            "vehicles": [vehicle(1, 40.0, 10.0), vehicle(2, 36.0, 10.0)],
            "lights": [light("N", "GREEN", 30.0)],
        });
        engine.ingest_json(&msg.to_string()).unwrap();

        for _ in 0..300 {
            ctx.advance_secs(DT);
            engine.step(DT);
            let (Some(lead), Some(follower)) = (engine.vehicle(1), engine.vehicle(2)) else {
                break;
            };
            assert!(lead.current_position - follower.current_position >= 4.0);
        }
        assert_eq!(engine.collision_count(), 0);
    }

    #[test]
    fn test_known_id_never_resynced() {
        let (ctx, mut engine) = engine();
        engine
            .ingest_json(&json!({"vehicles": [vehicle(1, 0.0, 10.0)]}).to_string())
            .unwrap();
        run(&ctx, &mut engine, 60, DT);

        let before = engine.vehicle(1).cloned().unwrap();
        let report = engine
            .ingest_json(&json!({"vehicles": [vehicle(1, 0.0, 99.0)]}).to_string())
            .unwrap();
        assert_eq!(report.known, 1);
        assert_eq!(report.spawned, 0);

        let after = engine.vehicle(1).unwrap();
        assert_eq!(after.current_position, before.current_position);
        assert_eq!(after.current_speed, before.current_speed);
        assert_eq!(after.target_speed, 10.0);
        assert_eq!(after.position, before.position);
    }

    #[test]
    fn test_light_countdown_between_snapshots() {
        let (ctx, mut engine) = engine();
        let msg = json!({
            "lights": [light("E", "YELLOW", 5.0)],
            "serverTimestampMs": 50_000.0,
        });
        engine.ingest_json(&msg.to_string()).unwrap();

        ctx.advance_secs(0.5);
        let view = engine
            .light_views()
            .into_iter()
            .find(|l| l.direction == Direction::E)
            .unwrap();
        assert_eq!(view.color, LightColor::Yellow);
        assert_relative_eq!(view.remaining_ms, 4_500.0, epsilon = 1.0);
        assert_eq!(view.display, "4.5s");

        // Feed stalls: countdown clamps at zero, color is kept
        ctx.advance_secs(30.0);
        let view = engine
            .light_views()
            .into_iter()
            .find(|l| l.direction == Direction::E)
            .unwrap();
        assert_eq!(view.display, "0.0s");
        assert_eq!(view.color, LightColor::Yellow);
    }

    #[test]
    fn test_anchor_falls_back_to_wall_clock() {
        let (ctx, mut engine) = engine();
        engine
            .ingest_json(&json!({"lights": [light("S", "RED", 2.0)]}).to_string())
            .unwrap();

        let remaining = engine.lights().remaining_ms(Direction::S, engine.server_now());
        assert_relative_eq!(remaining, 2_000.0, epsilon = 1.0);

        ctx.advance_secs(1.0);
        let remaining = engine.lights().remaining_ms(Direction::S, engine.server_now());
        assert_relative_eq!(remaining, 1_000.0, epsilon = 1.0);
    }

    #[test]
    fn test_reset_fades_then_removes() {
        let (ctx, mut engine) = engine();
        engine
            .ingest_json(&json!({"vehicles": [vehicle(1, 0.0, 0.0), vehicle(2, 20.0, 0.0)]}).to_string())
            .unwrap();

        let report = engine
            .ingest_json(&json!({"reset": true, "vehicles": [vehicle(3, 0.0, 0.0)]}).to_string())
            .unwrap();
        assert_eq!(report.faded, 2);
        assert_eq!(report.spawned, 1);

        run(&ctx, &mut engine, 1, 1.0);
        let faded: Vec<_> = engine.vehicle_views().into_iter().filter(|v| v.id != 3).collect();
        assert_eq!(faded.len(), 2);
        for view in faded {
            assert_relative_eq!(view.opacity, 0.5, epsilon = 1e-9);
        }

        run(&ctx, &mut engine, 2, 0.6);
        assert!(engine.vehicle(1).is_none());
        assert!(engine.vehicle(2).is_none());
        assert_eq!(engine.vehicle(3).map(|v| v.opacity), Some(1.0));
    }

    #[test]
    fn test_second_reset_restarts_fade() {
        let (ctx, mut engine) = engine();
        engine
            .ingest_json(&json!({"vehicles": [vehicle(1, 0.0, 0.0)]}).to_string())
            .unwrap();

        engine.ingest_json(&json!({"reset": true}).to_string()).unwrap();
        run(&ctx, &mut engine, 1, 1.5);
        assert_relative_eq!(engine.vehicle(1).unwrap().opacity, 0.25, epsilon = 1e-9);

        let report = engine.ingest_json(&json!({"reset": true}).to_string()).unwrap();
        assert_eq!(report.faded, 1);

        run(&ctx, &mut engine, 1, 0.6);
        let v = engine.vehicle(1).expect("fade restarted at the second reset");
        assert_relative_eq!(v.opacity, 0.7, epsilon = 1e-9);

        run(&ctx, &mut engine, 1, 1.5);
        assert!(engine.vehicle(1).is_none());
    }

    #[test]
    fn test_absent_id_removed_without_reset() {
        let (ctx, mut engine) = engine();
        engine
            .ingest_json(&json!({"vehicles": [vehicle(1, 11.0, 0.0), vehicle(2, 10.0, 0.0)]}).to_string())
            .unwrap();
        run(&ctx, &mut engine, 1, DT);
        assert!(engine.collisions().is_active(1, 2));

        let report = engine
            .ingest_json(&json!({"vehicles": [vehicle(1, 11.0, 0.0)]}).to_string())
            .unwrap();
        assert_eq!(report.removed, 1);
        assert_eq!(report.known, 1);
        assert!(engine.vehicle(2).is_none());
        assert!(!engine.collisions().is_active(1, 2));

        run(&ctx, &mut engine, 1, DT);
        assert_eq!(engine.vehicle_count(), 1);
        assert_eq!(engine.collision_count(), 1);
    }

    #[test]
    fn test_missing_or_reset_list_keeps_absent_ids() {
        let (_ctx, mut engine) = engine();
        engine
            .ingest_json(&json!({"vehicles": [vehicle(1, 0.0, 10.0), vehicle(2, 20.0, 10.0)]}).to_string())
            .unwrap();

        // Light-only update: no vehicle list at all
        let report = engine
            .ingest_json(&json!({"lights": [light("N", "RED", 5.0)]}).to_string())
            .unwrap();
        assert_eq!(report.removed, 0);
        assert_eq!(engine.vehicle_count(), 2);

        // Reset: absent vehicles fade instead of vanishing
        let report = engine
            .ingest_json(&json!({"reset": true, "vehicles": [vehicle(3, 0.0, 10.0)]}).to_string())
            .unwrap();
        assert_eq!(report.removed, 0);
        assert_eq!(report.faded, 2);
        assert_eq!(engine.vehicle_count(), 3);
        assert!(engine.vehicle(1).unwrap().fading);
    }

    #[test]
    fn test_rotating_pair_separates_and_reoverlaps_counts_twice() {
        let (ctx, mut engine) = engine();
        // Vehicle 1 plans a left turn, vehicle 2 goes straight
        ctx.push_rolls(&[0.6, 0.1]);
        engine
            .ingest_json(&json!({
                "vehicles": [
                    vehicle(1, 40.0, 0.0),
                    {"id": 2, "direction": "E", "lane": "Lane1", "position": 0.0, "speed": 0.0},
                ],
            }).to_string())
            .unwrap();

        // Hold vehicle 1 mid-rotation; at zero speed it stays put
        let anchor = {
            let v = engine.vehicles.get_mut(&1).unwrap();
            assert_eq!(v.turn_direction, TurnDirection::Left);
            v.turn_state = TurnState::Rotating;
            v.turn_start_position = v.current_position;
            v.initial_rotation = v.rotation;
            v.target_rotation = v.rotation + v.turn_direction.heading_delta();
            v.position
        };
        let place = |engine: &mut Engine<ManualContext>, offset: Vector2<f64>| {
            engine.vehicles.get_mut(&2).unwrap().position = anchor + offset;
        };

        place(&mut engine, Vector2::new(1.0, 0.0));
        run(&ctx, &mut engine, 5, DT);
        assert_eq!(engine.collision_count(), 1);
        assert!(engine.collisions().is_active(1, 2));

        place(&mut engine, Vector2::new(20.0, 0.0));
        run(&ctx, &mut engine, 1, DT);
        assert!(!engine.collisions().is_active(1, 2));
        assert_eq!(engine.collision_count(), 1);

        place(&mut engine, Vector2::new(0.0, 1.0));
        run(&ctx, &mut engine, 3, DT);
        assert_eq!(engine.collision_count(), 2);
        assert_eq!(engine.vehicle(1).unwrap().turn_state, TurnState::Rotating);
    }

    #[test]
    fn test_out_of_bounds_removed() {
        let (_ctx, mut engine) = engine();
        engine
            .ingest_json(&json!({"vehicles": [vehicle(1, 200.0, 10.0), vehicle(2, 0.0, 10.0)]}).to_string())
            .unwrap();

        let report = engine.step(DT);
        assert_eq!(report.removed, vec![1]);
        assert_eq!(engine.vehicle_count(), 1);
    }

    #[test]
    fn test_pause_freezes_frames_not_ingestion() {
        let (ctx, mut engine) = engine();
        engine.set_paused(true);
        engine
            .ingest_json(&json!({"vehicles": [vehicle(1, 0.0, 10.0)]}).to_string())
            .unwrap();

        run(&ctx, &mut engine, 30, DT);
        assert_eq!(engine.vehicle(1).map(|v| v.current_position), Some(0.0));
        assert_eq!(engine.frame_count(), 0);
        assert_eq!(engine.vehicle_views().len(), 1);

        engine.set_paused(false);
        run(&ctx, &mut engine, 30, DT);
        assert!(engine.vehicle(1).unwrap().current_position > 0.0);
    }

    #[test]
    fn test_malformed_message_keeps_state() {
        let (_ctx, mut engine) = engine();
        engine
            .ingest_json(&json!({"vehicles": [vehicle(1, 5.0, 10.0)]}).to_string())
            .unwrap();

        assert!(engine.ingest_json("{not json").is_err());
        assert!(engine.ingest_json("[1, 2, 3]").is_err());
        assert_eq!(engine.vehicle_count(), 1);
    }

    #[test]
    fn test_bad_records_dropped() {
        let (_ctx, mut engine) = engine();
        let msg = json!({
            "vehicles": [
                vehicle(1, 0.0, 10.0),
                {"id": 0, "direction": "N", "lane": "Lane1", "position": 0.0, "speed": 10.0},
                {"id": 5, "direction": "Q", "lane": "Lane1", "position": 0.0, "speed": 10.0},
            ],
            "lights": [light("N", "PURPLE", 3.0)],
        });
        let report = engine.ingest_json(&msg.to_string()).unwrap();

        assert_eq!(report.spawned, 1);
        assert_eq!(report.rejected, 3);
        assert_eq!(report.lights, 0);
        assert_eq!(engine.lights().color(Direction::N), LightColor::Green);
    }

    #[test]
    fn test_event_pass_through() {
        let (_ctx, mut engine) = engine();
        assert!(engine.last_event().is_none());

        engine
            .ingest_json(&json!({"event": {"name": "Rush Hour", "multiplier": 1.8}}).to_string())
            .unwrap();
        assert_eq!(engine.last_event().unwrap()["name"], "Rush Hour");

        // Messages without an event keep the last one
        engine.ingest_json(&json!({"vehicles": []}).to_string()).unwrap();
        assert_eq!(engine.last_event().unwrap()["multiplier"], 1.8);
    }

    #[test]
    fn test_turn_roll_from_context() {
        let (ctx, mut engine) = engine();
        // Spawn roll: left. Post-turn roll: straight.
        ctx.push_rolls(&[0.6, 0.1]);
        engine
            .ingest_json(&json!({
                "vehicles": [vehicle(1, 36.0, 10.0)],
                "lights": [light("N", "GREEN", 30.0)],
            }).to_string())
            .unwrap();
        assert_eq!(engine.vehicle(1).unwrap().turn_direction, TurnDirection::Left);

        let mut started = 0;
        let mut completed = 0;
        for _ in 0..240 {
            ctx.advance_secs(DT);
            let report = engine.step(DT);
            started += report.turns_started;
            completed += report.turns_completed;
        }

        let v = engine.vehicle(1).unwrap();
        assert_eq!(started, 1);
        assert_eq!(completed, 1);
        assert_eq!(v.direction, Direction::W);
        assert_eq!(v.turn_state, TurnState::Straight);
        assert_eq!(v.turn_direction, TurnDirection::Straight);
        assert!(v.visited_intersections.contains(&0));
    }

    #[test]
    fn test_stationary_overlap_counted_once() {
        let (ctx, mut engine) = engine();
        engine
            .ingest_json(&json!({"vehicles": [vehicle(1, 11.0, 0.0), vehicle(2, 10.0, 0.0)]}).to_string())
            .unwrap();

        run(&ctx, &mut engine, 5, DT);
        assert_eq!(engine.collision_count(), 1);
        assert!(engine.collisions().is_active(1, 2));
    }

    #[test]
    fn test_degenerate_dt_is_ignored() {
        let (_ctx, mut engine) = engine();
        engine
            .ingest_json(&json!({"vehicles": [vehicle(1, 0.0, 10.0)]}).to_string())
            .unwrap();

        engine.step(0.0);
        engine.step(-1.0);
        engine.step(f64::NAN);
        assert_eq!(engine.frame_count(), 0);
        assert_eq!(engine.vehicle(1).unwrap().current_position, 0.0);
    }
}
