//! Scenario runner - executes deterministic engine scenarios.
//!
//! Every scenario builds a [`SimWorld`], drives it frame by frame and checks
//! invariants after each frame. The first violated invariant fails the run.

use crate::exporter::{Recorder, SimExport};
use crate::generator::{light_json, vehicle_json, WireStyle};
use crate::scenarios::ScenarioId;
use crate::world::{SimConfig, SimWorld};

use crossview_core::{Direction, LightColor, MapTopology, StepReport, TurnState};
use crossview_env::{EngineContext, FeedController};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

/// Seconds a scripted light holds its color (longer than any run).
const HOLD_SECS: f64 = 3600.0;

/// Float slack for position/speed invariants.
const EPS: f64 = 1e-6;

/// Results from running a scenario.
#[derive(Debug, Clone)]
pub struct ScenarioResult {
    /// Scenario that was run
    pub scenario: ScenarioId,

    /// Seed used
    pub seed: u64,

    /// Whether scenario passed all assertions
    pub passed: bool,

    /// Total frames executed
    pub total_ticks: u64,

    /// Final simulation time in seconds
    pub final_time_secs: f64,

    /// Number of predicted vehicles at end
    pub final_entity_count: usize,

    /// Failure message if any
    pub failure_reason: Option<String>,

    /// Metrics collected during run
    pub metrics: ScenarioMetrics,
}

/// Metrics collected during scenario execution.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScenarioMetrics {
    pub snapshots_ingested: u64,
    pub frames_sent: u64,
    pub frames_dropped: u64,
    pub vehicles_spawned: u64,
    pub records_rejected: u64,
    pub turns_started: u64,
    pub turns_completed: u64,
    pub collisions: u64,
    pub vehicles_removed: u64,
    pub max_vehicles: usize,
}

/// Runs engine scenarios.
pub struct ScenarioRunner {
    /// Configuration seed
    seed: u64,

    /// Engine frame rate in Hz
    frame_rate_hz: u32,

    /// Maximum duration in seconds
    max_duration_secs: f64,
}

// ============================================================================
// SHARED CHECKS
// ============================================================================

/// Invariants every scenario holds on every frame.
fn check_sanity(world: &SimWorld) -> Result<(), String> {
    for v in world.engine.vehicles() {
        if !(v.position.x.is_finite() && v.position.y.is_finite() && v.rotation.is_finite()) {
            return Err(format!("vehicle {} has a non-finite pose", v.id));
        }
        if v.current_speed < -EPS || v.current_speed > v.target_speed + EPS {
            return Err(format!(
                "vehicle {} speed {:.3} outside [0, {:.3}]",
                v.id, v.current_speed, v.target_speed
            ));
        }
        if !(0.0..=1.0).contains(&v.opacity) {
            return Err(format!("vehicle {} opacity {}", v.id, v.opacity));
        }
    }

    let views = world.engine.light_views();
    if views.len() != 4 {
        return Err(format!("{} lights tracked", views.len()));
    }
    if let Some(view) = views.iter().find(|l| l.remaining_ms < 0.0) {
        return Err(format!("{} countdown negative", view.label));
    }
    Ok(())
}

/// Odometers never run backwards.
#[derive(Default)]
struct OdometerWatch {
    last: HashMap<u64, f64>,
}

impl OdometerWatch {
    fn check(&mut self, world: &SimWorld) -> Result<(), String> {
        for v in world.engine.vehicles() {
            let previous = self.last.insert(v.id, v.current_position);
            if let Some(previous) = previous {
                if v.current_position + EPS < previous {
                    return Err(format!(
                        "vehicle {} odometer went back {:.3} -> {:.3}",
                        v.id, previous, v.current_position
                    ));
                }
            }
        }
        Ok(())
    }
}

fn scripted_lights(world: &SimWorld, red: &[Direction]) -> Value {
    let now = world.context.wall_clock_ms();
    let lights: Vec<Value> = Direction::ALL
        .iter()
        .map(|&d| {
            let color = if red.contains(&d) { LightColor::Red } else { LightColor::Green };
            light_json(WireStyle::Current, d, color, HOLD_SECS, now)
        })
        .collect();
    json!({ "lights": lights, "serverTimestampMs": now })
}

/// `(id, position, speed)` on lane 1 of `direction`.
fn scripted_vehicles(world: &SimWorld, direction: Direction, vehicles: &[(u64, f64, f64)]) -> Value {
    let records: Vec<Value> = vehicles
        .iter()
        .map(|&(id, position, speed)| vehicle_json(WireStyle::Current, id, direction, 1, position, speed))
        .collect();
    json!({
        "vehicles": records,
        "serverTimestampMs": world.context.wall_clock_ms(),
    })
}

impl ScenarioRunner {
    /// Creates a new scenario runner.
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            frame_rate_hz: 60,
            max_duration_secs: 60.0,
        }
    }

    /// Sets the frame rate.
    pub fn with_frame_rate(mut self, hz: u32) -> Self {
        self.frame_rate_hz = hz.max(1);
        self
    }

    /// Sets the maximum duration.
    pub fn with_duration(mut self, secs: f64) -> Self {
        self.max_duration_secs = secs;
        self
    }

    /// Runs a scenario and returns the result.
    pub fn run(&self, scenario: ScenarioId) -> ScenarioResult {
        self.execute(scenario, &mut Recorder::disabled())
    }

    /// Runs a scenario, sampling every `every`-th frame into an export.
    pub fn run_recorded(&self, scenario: ScenarioId, every: u64) -> (ScenarioResult, SimExport) {
        let mut recorder = Recorder::new(scenario.name(), self.seed, every);
        let result = self.execute(scenario, &mut recorder);

        let mut export = recorder
            .into_export()
            .unwrap_or_else(|| SimExport::new(scenario.name(), self.seed));
        export.finalize(result.passed, result.failure_reason.clone());
        (result, export)
    }

    fn execute(&self, scenario: ScenarioId, rec: &mut Recorder) -> ScenarioResult {
        info!("Starting scenario: {} (seed={})", scenario.name(), self.seed);

        if scenario.is_transport() {
            warn!("Transport faults injected for {}", scenario.name());
        }

        match scenario {
            ScenarioId::FreeFlow => self.run_free_flow(rec),
            ScenarioId::RedLight => self.run_red_light(rec),
            ScenarioId::Platoon => self.run_platoon(rec),
            ScenarioId::TurnSweep => self.run_turn_sweep(rec),
            ScenarioId::ResetFade => self.run_reset_fade(rec),
            ScenarioId::StaleFeed => self.run_stale_feed(rec),
            ScenarioId::CityGrid => self.run_city_grid(rec),
            ScenarioId::LossyFeed => self.run_lossy_feed(rec),
            ScenarioId::LegacyWire => self.run_legacy_wire(rec),
        }
    }

    // ========================================================================
    // WORLD SETUP
    // ========================================================================

    /// World driven by the generated server loop.
    fn live_config(&self) -> SimConfig {
        SimConfig {
            seed: self.seed,
            frame_rate_hz: self.frame_rate_hz,
            max_duration_secs: self.max_duration_secs,
            ..SimConfig::default()
        }
    }

    /// World with the server loop off; scenarios inject every message.
    fn scripted_config(&self) -> SimConfig {
        SimConfig {
            server_tick_secs: 0.0,
            ..self.live_config()
        }
    }

    /// Runs frames, sampling into the recorder and checking after each one.
    fn drive<F>(&self, world: &mut SimWorld, secs: f64, rec: &mut Recorder, mut check: F) -> Result<(), String>
    where
        F: FnMut(&SimWorld, &StepReport) -> Result<(), String>,
    {
        world.run_for(secs, |w, report| {
            rec.capture(w);
            for (a, b) in &report.new_collisions {
                debug!(a, b, t = w.time(), "Collision");
            }
            check_sanity(w)?;
            check(w, report)
        })
    }

    fn finish(&self, scenario: ScenarioId, world: &SimWorld, outcome: Result<(), String>) -> ScenarioResult {
        let feed = world.feed.stats();
        let stats = &world.stats;
        let metrics = ScenarioMetrics {
            snapshots_ingested: stats.snapshots_ingested,
            frames_sent: feed.sent,
            frames_dropped: feed.dropped,
            vehicles_spawned: stats.vehicles_spawned,
            records_rejected: stats.records_rejected,
            turns_started: stats.turns_started,
            turns_completed: stats.turns_completed,
            collisions: stats.collisions,
            vehicles_removed: stats.vehicles_removed,
            max_vehicles: stats.max_vehicles,
        };

        match &outcome {
            Ok(()) => info!(
                "✓ {} complete: {} frames, {} vehicles spawned, {} turns",
                scenario.name(),
                stats.frames,
                stats.vehicles_spawned,
                stats.turns_completed
            ),
            Err(reason) => warn!("✗ {} failed at t={:.2}s: {}", scenario.name(), world.time(), reason),
        }

        ScenarioResult {
            scenario,
            seed: self.seed,
            passed: outcome.is_ok(),
            total_ticks: world.tick_count(),
            final_time_secs: world.time(),
            final_entity_count: world.engine.vehicle_count(),
            failure_reason: outcome.err(),
            metrics,
        }
    }

    // ========================================================================
    // SCRIPTED SCENARIOS
    // ========================================================================

    /// SIM-001: FreeFlow - one vehicle on an all-green intersection.
    ///
    /// **Assertion**: odometer is monotonic, speed stays within target and
    /// the vehicle actually moves.
    fn run_free_flow(&self, rec: &mut Recorder) -> ScenarioResult {
        info!("SIM-001: FreeFlow");
        let mut world = SimWorld::new(self.scripted_config());

        world.inject(&scripted_lights(&world, &[]));
        world.inject(&scripted_vehicles(&world, Direction::N, &[(1, 0.0, 10.0)]));
        rec.event("spawn vehicle 1 on N");

        let mut odometer = OdometerWatch::default();
        let mut outcome = self.drive(&mut world, self.max_duration_secs, rec, |w, _| {
            odometer.check(w)?;
            if w.engine.collision_count() > 0 {
                return Err("collision with a single vehicle".to_string());
            }
            Ok(())
        });

        if outcome.is_ok() && world.stats.vehicles_spawned != 1 {
            outcome = Err(format!("{} vehicles spawned", world.stats.vehicles_spawned));
        }
        if outcome.is_ok() {
            if let Some(v) = world.engine.vehicle(1) {
                if world.time() >= 0.5 && v.current_position <= 0.0 {
                    outcome = Err("vehicle never moved".to_string());
                }
            }
        }

        self.finish(ScenarioId::FreeFlow, &world, outcome)
    }

    /// SIM-002: RedLight - a queue approaching a red that never changes.
    ///
    /// **Assertion**: no vehicle passes the stop line, the queue keeps its
    /// order and the leader is waiting once it has had time to stop.
    fn run_red_light(&self, rec: &mut Recorder) -> ScenarioResult {
        info!("SIM-002: RedLight");
        let mut world = SimWorld::new(self.scripted_config());
        let stop_line = world.engine.config().physics.stop_line;

        let queue = [(1, 0.0, 12.0), (2, -10.0, 12.0), (3, -20.0, 12.0), (4, -30.0, 12.0)];
        world.inject(&scripted_lights(&world, &[Direction::N]));
        world.inject(&scripted_vehicles(&world, Direction::N, &queue));

        let mut outcome = self.drive(&mut world, self.max_duration_secs, rec, |w, _| {
            for v in w.engine.vehicles() {
                if v.current_position > stop_line + EPS {
                    return Err(format!(
                        "vehicle {} ran the red at {:.2}",
                        v.id, v.current_position
                    ));
                }
            }
            for pair in queue.windows(2) {
                let (Some(lead), Some(follow)) = (w.engine.vehicle(pair[0].0), w.engine.vehicle(pair[1].0)) else {
                    continue;
                };
                if follow.current_position > lead.current_position + EPS {
                    return Err(format!("vehicle {} overtook {}", follow.id, lead.id));
                }
            }
            Ok(())
        });

        if outcome.is_ok() && world.time() >= 8.0 {
            match world.engine.vehicle(1) {
                Some(lead) if lead.waiting && lead.current_speed < 0.5 => {}
                Some(lead) => {
                    outcome = Err(format!(
                        "leader not stopped: speed {:.2} at {:.2}",
                        lead.current_speed, lead.current_position
                    ))
                }
                None => outcome = Err("leader disappeared".to_string()),
            }
        }

        self.finish(ScenarioId::RedLight, &world, outcome)
    }

    /// SIM-003: Platoon - six vehicles, 5 units apart, mixed speeds.
    ///
    /// **Assertion**: while two vehicles share the straight E approach, the
    /// one that started behind stays behind.
    fn run_platoon(&self, rec: &mut Recorder) -> ScenarioResult {
        info!("SIM-003: Platoon");
        let mut world = SimWorld::new(self.scripted_config());

        let platoon = [
            (1, 0.0, 14.0),
            (2, -5.0, 10.0),
            (3, -10.0, 13.0),
            (4, -15.0, 9.0),
            (5, -20.0, 15.0),
            (6, -25.0, 11.0),
        ];
        world.inject(&scripted_lights(&world, &[]));
        world.inject(&scripted_vehicles(&world, Direction::E, &platoon));

        let on_approach = |w: &SimWorld, id: u64| {
            w.engine
                .vehicle(id)
                .filter(|v| v.direction == Direction::E && v.turn_state == TurnState::Straight)
                .map(|v| v.current_position)
        };

        let outcome = self.drive(&mut world, self.max_duration_secs, rec, |w, _| {
            for (i, lead) in platoon.iter().enumerate() {
                for follow in &platoon[i + 1..] {
                    if let (Some(a), Some(b)) = (on_approach(w, lead.0), on_approach(w, follow.0)) {
                        if b > a + EPS {
                            return Err(format!("vehicle {} overtook {}", follow.0, lead.0));
                        }
                    }
                }
            }
            Ok(())
        });

        self.finish(ScenarioId::Platoon, &world, outcome)
    }

    // ========================================================================
    // GENERATED TRAFFIC
    // ========================================================================

    /// SIM-004: TurnSweep - generated traffic with random turn intentions.
    ///
    /// **Assertion**: sanity holds through every turn phase and completions
    /// never outnumber starts.
    fn run_turn_sweep(&self, rec: &mut Recorder) -> ScenarioResult {
        info!("SIM-004: TurnSweep");
        let mut world = SimWorld::new(self.live_config());
        world.connect();

        let mut odometer = OdometerWatch::default();
        let outcome = self.drive(&mut world, self.max_duration_secs, rec, |w, _| {
            odometer.check(w)?;
            if w.stats.turns_completed > w.stats.turns_started {
                return Err("more turns completed than started".to_string());
            }
            for v in w.engine.vehicles() {
                if v.turn_state == TurnState::Rotating && v.turn_intersection.is_none() {
                    return Err(format!("vehicle {} rotating without an intersection", v.id));
                }
            }
            Ok(())
        });

        self.finish(ScenarioId::TurnSweep, &world, outcome)
    }

    /// SIM-005: ResetFade - the server resets 0.2s in.
    ///
    /// **Assertion**: vehicles from before the reset fade instead of
    /// vanishing and are all gone once the fade window has passed.
    fn run_reset_fade(&self, rec: &mut Recorder) -> ScenarioResult {
        info!("SIM-005: ResetFade");
        let mut world = SimWorld::new(self.live_config());
        world.connect();

        let warmup = self.drive(&mut world, 0.2, rec, |_, _| Ok(()));
        if let Err(e) = warmup {
            return self.finish(ScenarioId::ResetFade, &world, Err(e));
        }

        let before: HashSet<u64> = world.engine.vehicles().map(|v| v.id).collect();
        let reset = world.generator.full_state();
        world.inject(&reset.payload);
        rec.event("server reset");
        let reset_at = world.time();

        let fade_secs = world.engine.config().physics.fade_secs;
        let grace = 2.0 * world.dt();
        let secs = (self.max_duration_secs - 0.2).max(fade_secs + 0.5);

        let mut outcome = self.drive(&mut world, secs, rec, |w, _| {
            let elapsed = w.time() - reset_at;
            for id in &before {
                let Some(v) = w.engine.vehicle(*id) else {
                    continue;
                };
                if elapsed > fade_secs + grace {
                    return Err(format!("vehicle {} outlived the fade", id));
                }
                if !v.fading {
                    return Err(format!("vehicle {} not fading after reset", id));
                }
            }
            Ok(())
        });

        let fresh = world.engine.vehicles().filter(|v| !before.contains(&v.id)).count();
        if outcome.is_ok() && fresh == 0 {
            outcome = Err("no vehicles after reset".to_string());
        }

        self.finish(ScenarioId::ResetFade, &world, outcome)
    }

    /// SIM-006: StaleFeed - the server goes silent for the middle third.
    ///
    /// **Assertion**: nothing is ingested while stalled, prediction keeps
    /// running and countdowns never go negative.
    fn run_stale_feed(&self, rec: &mut Recorder) -> ScenarioResult {
        info!("SIM-006: StaleFeed");
        let mut world = SimWorld::new(self.live_config());
        world.connect();
        let third = self.max_duration_secs / 3.0;

        let mut outcome = self.drive(&mut world, third, rec, |_, _| Ok(()));

        if outcome.is_ok() {
            world.controller.set_stalled(true);
            rec.event("feed stalled");
            // Drain anything already in flight before counting
            world.drain_feed();
            let ingested = world.stats.snapshots_ingested;
            let frames = world.engine.frame_count();

            outcome = self.drive(&mut world, third, rec, |w, _| {
                if w.stats.snapshots_ingested != ingested {
                    return Err("ingested a snapshot while stalled".to_string());
                }
                Ok(())
            });

            let expected = (third * self.frame_rate_hz as f64).round() as u64;
            if outcome.is_ok() && world.engine.frame_count() - frames != expected {
                outcome = Err("prediction stopped while stalled".to_string());
            }
        }

        if outcome.is_ok() {
            world.controller.heal_all();
            rec.event("feed healed");
            outcome = self.drive(&mut world, third, rec, |_, _| Ok(()));
        }

        self.finish(ScenarioId::StaleFeed, &world, outcome)
    }

    /// SIM-007: CityGrid - nine intersections 60 units apart.
    ///
    /// **Assertion**: no vehicle survives outside the scene and a turn in
    /// progress always belongs to a visited intersection.
    fn run_city_grid(&self, rec: &mut Recorder) -> ScenarioResult {
        info!("SIM-007: CityGrid");
        let mut world = SimWorld::new(SimConfig {
            topology: MapTopology::city_grid(60.0),
            ..self.live_config()
        });
        world.connect();
        let boundary = world.engine.topology().scene_boundary;

        let outcome = self.drive(&mut world, self.max_duration_secs, rec, |w, _| {
            for v in w.engine.vehicles() {
                if v.position.x.abs() > boundary || v.position.y.abs() > boundary {
                    return Err(format!("vehicle {} outside the scene", v.id));
                }
                if let Some(idx) = v.turn_intersection {
                    if !v.visited_intersections.contains(&idx) {
                        return Err(format!("vehicle {} turning at unvisited {}", v.id, idx));
                    }
                }
            }
            Ok(())
        });

        self.finish(ScenarioId::CityGrid, &world, outcome)
    }

    /// SIM-008: LossyFeed - 30% loss and 250 ms latency.
    ///
    /// **Assertion**: whatever arrives parses, and the engine stays sane.
    fn run_lossy_feed(&self, rec: &mut Recorder) -> ScenarioResult {
        info!("SIM-008: LossyFeed");
        let mut world = SimWorld::new(self.live_config());
        world.controller.set_loss(0.3);
        world.controller.set_latency(250);
        world.connect();

        let outcome = self.drive(&mut world, self.max_duration_secs, rec, |w, _| {
            if w.stats.parse_errors > 0 {
                return Err(format!("{} parse errors", w.stats.parse_errors));
            }
            Ok(())
        });

        info!(
            "LossyFeed: {} sent, {} dropped",
            world.feed.stats().sent,
            world.feed.stats().dropped
        );
        self.finish(ScenarioId::LossyFeed, &world, outcome)
    }

    /// SIM-009: LegacyWire - the server uses the older field names.
    ///
    /// **Assertion**: every record is accepted.
    fn run_legacy_wire(&self, rec: &mut Recorder) -> ScenarioResult {
        info!("SIM-009: LegacyWire");
        let mut config = self.live_config();
        config.generator.wire_style = WireStyle::Legacy;
        let mut world = SimWorld::new(config);
        world.connect();

        let mut outcome = self.drive(&mut world, self.max_duration_secs, rec, |w, _| {
            if w.stats.records_rejected > 0 || w.stats.parse_errors > 0 {
                return Err(format!(
                    "{} records rejected, {} parse errors",
                    w.stats.records_rejected, w.stats.parse_errors
                ));
            }
            Ok(())
        });

        if outcome.is_ok() && world.stats.vehicles_spawned == 0 {
            outcome = Err("no vehicles spawned from legacy records".to_string());
        }

        self.finish(ScenarioId::LegacyWire, &world, outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_free_flow_scenario() {
        let runner = ScenarioRunner::new(42).with_duration(1.0); // 1 second for fast test

        let result = runner.run(ScenarioId::FreeFlow);

        assert!(result.passed, "{:?}", result.failure_reason);
        assert_eq!(result.total_ticks, 60);
        assert_eq!(result.final_entity_count, 1);
    }

    #[test]
    fn test_red_light_holds_queue() {
        let runner = ScenarioRunner::new(42).with_duration(10.0);

        let result = runner.run(ScenarioId::RedLight);

        assert!(result.passed, "{:?}", result.failure_reason);
        assert_eq!(result.metrics.collisions, 0);
    }

    #[test]
    fn test_reset_fade_scenario() {
        let runner = ScenarioRunner::new(7).with_duration(1.0);

        let result = runner.run(ScenarioId::ResetFade);

        assert!(result.passed, "{:?}", result.failure_reason);
        assert!(result.metrics.vehicles_removed > 0);
    }

    #[test]
    fn test_all_scenarios_short() {
        let runner = ScenarioRunner::new(42).with_duration(1.0);
        for scenario in ScenarioId::all() {
            let result = runner.run(scenario);
            assert!(result.passed, "{}: {:?}", scenario, result.failure_reason);
        }
    }

    #[test]
    fn test_lossy_feed_deterministic() {
        // Same seed should give the same losses
        let runner1 = ScenarioRunner::new(42).with_duration(3.0);
        let runner2 = ScenarioRunner::new(42).with_duration(3.0);

        let result1 = runner1.run(ScenarioId::LossyFeed);
        let result2 = runner2.run(ScenarioId::LossyFeed);

        assert_eq!(result1.metrics.frames_dropped, result2.metrics.frames_dropped);
        assert_eq!(result1.final_entity_count, result2.final_entity_count);
    }

    #[test]
    fn test_run_recorded_exports_frames() {
        let runner = ScenarioRunner::new(42).with_duration(1.0);

        let (result, export) = runner.run_recorded(ScenarioId::TurnSweep, 6);

        assert!(result.passed);
        assert_eq!(export.frames.len(), 10);
        assert!(export.passed);
        assert!(!export.frames[0].vehicles.is_empty());
    }
}
