//! Snapshot feed abstraction between the simulation server and the engine.

use async_trait::async_trait;
use crate::types::FeedFrame;

/// Abstraction for the inbound side of a snapshot stream.
///
/// # Implementations
///
/// - **Production**: wraps a WebSocket client (external collaborator)
/// - **Simulation**: channel-based with configurable latency/loss/stall
///
/// # Frame Flow
///
/// ```text
/// Server                     Feed                      Engine host
///   |                          |                            |
///   |-- publish(frame) ------->|                            |
///   |                          |-- [latency/loss] --------->|
///   |                          |                            |-- recv() -> frame
///   |                          |                            |-- engine.ingest_json()
/// ```
#[async_trait]
pub trait SnapshotFeed: Send + Sync + 'static {
    /// Receives the next frame.
    ///
    /// # Returns
    /// * `Some(frame)` - A frame was received
    /// * `None` - The feed was closed (shutdown)
    async fn recv(&self) -> Option<FeedFrame>;

    /// Returns a frame if one is already waiting, without blocking.
    ///
    /// Frame loops use this to drain the feed between frames so that
    /// ingestion never interleaves with a frame step.
    fn try_recv(&self) -> Option<FeedFrame>;
}

/// Fault injection on a simulated feed.
pub trait FeedController: Send + Sync {
    /// Sets a fixed delivery latency in milliseconds.
    fn set_latency(&self, latency_ms: u64);

    /// Sets frame loss probability (0.0 - 1.0).
    fn set_loss(&self, loss_rate: f64);

    /// Stops (or resumes) all delivery, simulating a silent server.
    fn set_stalled(&self, stalled: bool);

    /// Clears every injected fault.
    fn heal_all(&self);
}
