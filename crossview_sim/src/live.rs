//! Live mode - the engine on the tokio clock.
//!
//! The generator runs as its own task on a 100 ms interval and publishes into
//! a [`SimFeed`]; the frame loop drains the feed between frames, so ingestion
//! never interleaves with a step.

use crate::error::SimError;
use crate::feed::{FeedStats, SimFeed, SimFeedController};
use crate::generator::{GeneratorConfig, SnapshotGenerator};

use crossview_core::{Engine, EngineConfig, MapTopology};
use crossview_env::{EngineContext, EnvError, FeedController, SnapshotFeed, TokioContext};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace, warn};

/// Settings for a live run.
#[derive(Debug, Clone)]
pub struct LiveOptions {
    /// Seed for the generator and feed loss
    pub seed: u64,

    /// Wall-clock run time in seconds
    pub duration_secs: f64,

    pub frame_rate_hz: u32,
    pub server_tick_secs: f64,

    pub latency_ms: u64,
    pub loss_rate: f64,

    /// Seconds between status lines
    pub report_every_secs: f64,

    pub generator: GeneratorConfig,
    pub engine: EngineConfig,
    pub topology: MapTopology,
}

impl Default for LiveOptions {
    fn default() -> Self {
        Self {
            seed: 42,
            duration_secs: 30.0,
            frame_rate_hz: 60,
            server_tick_secs: 0.1,
            latency_ms: 0,
            loss_rate: 0.0,
            report_every_secs: 5.0,
            generator: GeneratorConfig::default(),
            engine: EngineConfig::default(),
            topology: MapTopology::default(),
        }
    }
}

/// What a live run did.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LiveSummary {
    pub frames: u64,
    pub snapshots_ingested: u64,
    pub parse_errors: u64,
    pub vehicles_spawned: u64,
    pub turns_completed: u64,
    pub collisions: u64,
    pub final_vehicles: usize,
    pub feed: FeedStats,
}

fn status_line<Ctx: EngineContext>(engine: &Engine<Ctx>) -> String {
    engine
        .light_views()
        .iter()
        .map(|l| format!("{}:{} {}", l.direction, l.color.as_str(), l.display))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Runs the engine against a generated feed in real time.
pub async fn run_live(options: LiveOptions) -> Result<LiveSummary, SimError> {
    if options.frame_rate_hz == 0 {
        return Err(SimError::InvalidArgument("frame rate must be positive".to_string()));
    }
    if !(options.server_tick_secs.is_finite() && options.server_tick_secs > 0.0) {
        return Err(SimError::InvalidArgument("server tick must be positive".to_string()));
    }

    let ctx = TokioContext::shared();
    let controller = SimFeedController::new();
    controller.set_latency(options.latency_ms);
    controller.set_loss(options.loss_rate);

    let feed = Arc::new(SimFeed::new(ctx.clone(), controller, options.seed));
    let mut generator = SnapshotGenerator::new(options.generator.clone(), options.seed, ctx.wall_clock_ms());
    let mut engine = Engine::new(ctx.clone(), options.engine.clone(), options.topology.clone());

    info!(
        map = %options.topology.map_id,
        seed = options.seed,
        duration = options.duration_secs,
        "Live run starting"
    );

    // A connecting client gets the current state first
    let initial = generator.full_state();
    if let Err(e) = feed.send(initial.payload.to_string()) {
        warn!(error = %e, "Initial state lost");
    }

    let server_feed = feed.clone();
    let server_tick = Duration::from_secs_f64(options.server_tick_secs);
    let server = tokio::spawn(async move {
        let mut interval = tokio::time::interval(server_tick);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval.tick().await;
        loop {
            interval.tick().await;
            let Some(msg) = generator.tick(server_tick.as_secs_f64()) else {
                continue;
            };
            match server_feed.send(msg.payload.to_string()) {
                Ok(sequence) => trace!(sequence, kind = ?msg.kind, "Published"),
                Err(EnvError::FeedClosed(_)) => break,
                Err(e) => debug!(error = %e, "Publish failed"),
            }
        }
    });

    let frame_period = Duration::from_secs_f64(1.0 / options.frame_rate_hz as f64);
    let report_every = ((options.report_every_secs * options.frame_rate_hz as f64).round() as u64).max(1);
    let deadline = ctx.now() + Duration::from_secs_f64(options.duration_secs.max(0.0));

    let mut interval = tokio::time::interval(frame_period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut summary = LiveSummary::default();
    let mut last = ctx.now();

    while ctx.now() < deadline {
        interval.tick().await;

        while let Some(frame) = feed.try_recv() {
            match engine.ingest_json(&frame.payload) {
                Ok(report) => {
                    summary.snapshots_ingested += 1;
                    summary.vehicles_spawned += report.spawned as u64;
                }
                Err(_) => summary.parse_errors += 1,
            }
        }

        let now = ctx.now();
        let dt = now.saturating_sub(last).as_secs_f64();
        last = now;

        let report = engine.step(dt);
        summary.frames += 1;
        summary.turns_completed += report.turns_completed as u64;
        summary.collisions += report.new_collisions.len() as u64;

        if summary.frames % report_every == 0 {
            info!(
                vehicles = engine.vehicle_count(),
                turning = engine.turning_count(),
                collisions = engine.collision_count(),
                "{}",
                status_line(&engine)
            );
        }
    }

    feed.close();
    server.abort();
    if let Err(e) = server.await {
        if !e.is_cancelled() {
            warn!(error = %e, "Server task failed");
        }
    }

    summary.final_vehicles = engine.vehicle_count();
    summary.feed = feed.stats();
    info!(
        frames = summary.frames,
        snapshots = summary.snapshots_ingested,
        vehicles = summary.final_vehicles,
        "Live run finished"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_live_run_short() {
        let options = LiveOptions {
            duration_secs: 0.3,
            ..LiveOptions::default()
        };

        let summary = run_live(options).await.unwrap();

        assert!(summary.frames > 0);
        assert!(summary.snapshots_ingested >= 1);
        assert!(summary.vehicles_spawned >= 4);
        assert_eq!(summary.parse_errors, 0);
    }

    #[tokio::test]
    async fn test_live_rejects_zero_frame_rate() {
        let options = LiveOptions {
            frame_rate_hz: 0,
            ..LiveOptions::default()
        };
        assert!(matches!(run_live(options).await, Err(SimError::InvalidArgument(_))));
    }
}
