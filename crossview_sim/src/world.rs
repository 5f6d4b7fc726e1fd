//! SimWorld - server, feed and engine on one virtual clock.
//!
//! ```text
//!   SnapshotGenerator ──send──► SimFeed ──try_recv──► Engine::ingest_json
//!        (10 Hz)             (latency/loss)               │
//!                                                   Engine::step (60 Hz)
//! ```

use crate::context::SimContext;
use crate::feed::{SimFeed, SimFeedController};
use crate::generator::{GeneratorConfig, GeneratedMessage, SnapshotGenerator};

use crossview_core::{Engine, EngineConfig, MapTopology, StepReport};
use crossview_env::{EngineContext, SnapshotFeed};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;

/// Configuration for a simulation run.
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Master seed for determinism
    pub seed: u64,

    /// Engine frame rate in Hz
    pub frame_rate_hz: u32,

    /// Server loop period in seconds
    pub server_tick_secs: f64,

    /// Maximum simulation duration in seconds
    pub max_duration_secs: f64,

    /// Offset of the server's wall clock from the local one (ms)
    pub server_clock_offset_ms: f64,

    pub generator: GeneratorConfig,
    pub engine: EngineConfig,
    pub topology: MapTopology,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            frame_rate_hz: 60,
            server_tick_secs: 0.1,
            max_duration_secs: 60.0,
            server_clock_offset_ms: 0.0,
            generator: GeneratorConfig::default(),
            engine: EngineConfig::default(),
            topology: MapTopology::default(),
        }
    }
}

/// Counters accumulated over a run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct WorldStats {
    pub frames: u64,
    pub snapshots_ingested: u64,
    pub parse_errors: u64,
    pub vehicles_spawned: u64,
    pub records_rejected: u64,
    pub turns_started: u64,
    pub turns_completed: u64,
    pub collisions: u64,
    pub vehicles_removed: u64,
    pub max_vehicles: usize,
}

/// The SimWorld - container for the entire simulation.
pub struct SimWorld {
    pub config: SimConfig,

    /// Shared simulation context (virtual clock + turn rolls)
    pub context: Arc<SimContext>,

    /// Stand-in traffic server
    pub generator: SnapshotGenerator,

    /// Transport between server and engine
    pub feed: SimFeed<SimContext>,

    /// Fault injection for the feed
    pub controller: SimFeedController,

    pub engine: Engine<SimContext>,

    pub stats: WorldStats,

    /// Time not yet consumed by the server loop
    server_backlog: f64,
}

impl SimWorld {
    pub fn new(config: SimConfig) -> Self {
        // Derive separate seeds for different subsystems
        let context_seed = config.seed;
        let server_seed = config.seed.wrapping_mul(0x9e3779b97f4a7c15);
        let loss_seed = config.seed.wrapping_mul(0x517cc1b727220a95);

        let context = SimContext::shared(context_seed);
        let server_epoch_ms = context.wall_clock_ms() + config.server_clock_offset_ms;
        let generator = SnapshotGenerator::new(config.generator.clone(), server_seed, server_epoch_ms);

        let controller = SimFeedController::new();
        let feed = SimFeed::new(context.clone(), controller.clone(), loss_seed);
        let engine = Engine::new(context.clone(), config.engine.clone(), config.topology.clone());

        Self {
            config,
            context,
            generator,
            feed,
            controller,
            engine,
            stats: WorldStats::default(),
            server_backlog: 0.0,
        }
    }

    /// Frame period in seconds.
    pub fn dt(&self) -> f64 {
        1.0 / self.config.frame_rate_hz.max(1) as f64
    }

    /// Sends the state a newly connected client receives.
    pub fn connect(&mut self) {
        let msg = self.generator.full_state();
        self.publish(msg);
    }

    /// Publishes an arbitrary payload through the feed (scripted scenarios).
    pub fn inject(&self, payload: &Value) {
        if let Err(e) = self.feed.send(payload.to_string()) {
            trace!(error = %e, "Injected frame not delivered");
        }
    }

    fn publish(&self, msg: GeneratedMessage) {
        if let Err(e) = self.feed.send(msg.payload.to_string()) {
            trace!(kind = ?msg.kind, error = %e, "Frame not delivered");
        }
    }

    /// Advances the world by one frame.
    ///
    /// Order: clock, server loop, feed drain + ingestion, engine step.
    pub fn tick(&mut self) -> StepReport {
        let dt = self.dt();
        self.context.advance_time(Duration::from_secs_f64(dt));

        let server_tick = self.config.server_tick_secs;
        if server_tick > 0.0 {
            self.server_backlog += dt;
            while self.server_backlog >= server_tick {
                self.server_backlog -= server_tick;
                if let Some(msg) = self.generator.tick(server_tick) {
                    self.publish(msg);
                }
            }
        }

        self.drain_feed();

        let report = self.engine.step(dt);
        self.stats.frames += 1;
        self.stats.turns_started += report.turns_started as u64;
        self.stats.turns_completed += report.turns_completed as u64;
        self.stats.collisions += report.new_collisions.len() as u64;
        self.stats.vehicles_removed += report.removed.len() as u64;
        self.stats.max_vehicles = self.stats.max_vehicles.max(self.engine.vehicle_count());
        report
    }

    /// Ingests every frame that is due. Returns how many were ingested.
    pub fn drain_feed(&mut self) -> usize {
        let mut ingested = 0;
        while let Some(frame) = self.feed.try_recv() {
            match self.engine.ingest_json(&frame.payload) {
                Ok(report) => {
                    self.stats.snapshots_ingested += 1;
                    self.stats.vehicles_spawned += report.spawned as u64;
                    self.stats.records_rejected += report.rejected as u64;
                    ingested += 1;
                }
                Err(_) => self.stats.parse_errors += 1,
            }
        }
        ingested
    }

    /// Runs `secs` seconds of frames, calling `check` after each one.
    ///
    /// Stops at the first error returned by `check`.
    pub fn run_for<F>(&mut self, secs: f64, mut check: F) -> Result<(), String>
    where
        F: FnMut(&SimWorld, &StepReport) -> Result<(), String>,
    {
        let frames = (secs.max(0.0) * self.config.frame_rate_hz as f64).round() as u64;
        for _ in 0..frames {
            let report = self.tick();
            check(self, &report)?;
        }
        Ok(())
    }

    /// Current simulation time in seconds.
    pub fn time(&self) -> f64 {
        self.context.now().as_secs_f64()
    }

    pub fn tick_count(&self) -> u64 {
        self.stats.frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossview_env::FeedController;

    #[test]
    fn test_sim_world_tick() {
        let mut world = SimWorld::new(SimConfig::default());
        assert_eq!(world.tick_count(), 0);
        assert_eq!(world.time(), 0.0);

        world.tick();

        assert_eq!(world.tick_count(), 1);
        assert!((world.time() - 1.0 / 60.0).abs() < 0.0001);
    }

    #[test]
    fn test_connect_spawns_vehicles() {
        let mut world = SimWorld::new(SimConfig::default());
        world.connect();
        world.tick();

        assert_eq!(world.stats.snapshots_ingested, 1);
        assert!(world.engine.vehicle_count() >= 4);
        assert_eq!(world.stats.records_rejected, 0);
    }

    #[test]
    fn test_light_updates_flow() {
        let mut world = SimWorld::new(SimConfig::default());
        world.connect();
        world.run_for(3.0, |_, _| Ok(())).unwrap();

        // Initial state plus roughly one light update per second
        assert!(world.stats.snapshots_ingested >= 3);
        assert_eq!(world.stats.parse_errors, 0);
    }

    #[test]
    fn test_stalled_feed_ingests_nothing() {
        let mut world = SimWorld::new(SimConfig::default());
        world.controller.set_stalled(true);
        world.connect();
        world.run_for(2.0, |_, _| Ok(())).unwrap();

        assert_eq!(world.stats.snapshots_ingested, 0);
        assert_eq!(world.engine.vehicle_count(), 0);
    }

    #[test]
    fn test_sim_world_determinism() {
        let run = || {
            let mut world = SimWorld::new(SimConfig::default());
            world.connect();
            world.run_for(5.0, |_, _| Ok(())).unwrap();
            world.engine.vehicle_views()
        };
        assert_eq!(run(), run());
    }
}
