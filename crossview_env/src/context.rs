//! Core environment context trait for the Crossview engine.

use async_trait::async_trait;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// The central interface for Environment Interaction.
///
/// This trait abstracts the "real world" so that the prediction engine can run
/// inside a real frame loop (tokio) as well as in deterministic simulation.
///
/// # Implementations
///
/// - **Production**: `TokioContext` - wraps `std::time::Instant`, thread RNG
/// - **Tests**: `ManualContext` - hand-driven clock, scripted random rolls
/// - **Simulation**: `SimContext` (crossview_sim) - virtual clock, `ChaCha8Rng(seed)`
///
/// # Determinism
///
/// Every source of non-determinism the engine touches (local time, wall-clock
/// fallback, turn rolls) goes through this trait.
#[async_trait]
pub trait EngineContext: Send + Sync + 'static {
    /// Returns the current monotonic time since context creation.
    ///
    /// This is the engine's "local performance clock": snapshot receipt
    /// times, fade starts and clock-anchor extrapolation are all measured
    /// against it.
    fn now(&self) -> Duration;

    /// Returns the wall-clock time.
    ///
    /// Used as the server-time stand-in when a snapshot carries no
    /// timestamp, and before any snapshot has arrived.
    fn system_time(&self) -> SystemTime;

    /// Returns the wall-clock time in milliseconds since the Unix epoch.
    fn wall_clock_ms(&self) -> f64 {
        self.system_time()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64() * 1000.0)
            .unwrap_or(0.0)
    }

    /// Suspends execution for the given duration.
    ///
    /// In production: wraps `tokio::time::sleep`
    /// In simulation: advances the virtual clock
    async fn sleep(&self, duration: Duration);

    /// Draws a uniform sample in `[0, 1)`.
    ///
    /// The engine uses it for categorical draws such as a vehicle's turn
    /// intention. Simulation contexts derive it from the master seed.
    fn random_unit(&self) -> f64;

    /// Returns the context's seed (for logging/debugging).
    ///
    /// In production, returns 0 (not seeded).
    fn seed(&self) -> u64;
}
