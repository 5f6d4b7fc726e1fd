//! Simulated snapshot feed with fault injection.
//!
//! Frames are queued with a delivery time on the shared virtual clock and
//! handed out in send order, like a WebSocket would. Loss and stalls are
//! decided at send time.

use async_trait::async_trait;
use crossview_env::{EngineContext, EnvError, FeedController, FeedFrame, SnapshotFeed};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::trace;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// Poll interval used by [`SnapshotFeed::recv`] while nothing is due.
const RECV_POLL: Duration = Duration::from_millis(1);

/// Fault settings shared between a feed and its controller.
#[derive(Debug, Clone, Copy, Default)]
struct Faults {
    latency_ms: u64,
    loss_rate: f64,
    stalled: bool,
}

/// Fault injection handle for a [`SimFeed`].
///
/// Cloning yields another handle onto the same settings.
#[derive(Debug, Clone, Default)]
pub struct SimFeedController {
    faults: Arc<Mutex<Faults>>,
}

impl SimFeedController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn latency_ms(&self) -> u64 {
        lock(&self.faults).latency_ms
    }

    pub fn loss_rate(&self) -> f64 {
        lock(&self.faults).loss_rate
    }

    pub fn is_stalled(&self) -> bool {
        lock(&self.faults).stalled
    }
}

impl FeedController for SimFeedController {
    fn set_latency(&self, latency_ms: u64) {
        lock(&self.faults).latency_ms = latency_ms;
    }

    fn set_loss(&self, loss_rate: f64) {
        let rate = if loss_rate.is_finite() { loss_rate.clamp(0.0, 1.0) } else { 0.0 };
        lock(&self.faults).loss_rate = rate;
    }

    fn set_stalled(&self, stalled: bool) {
        lock(&self.faults).stalled = stalled;
    }

    fn heal_all(&self) {
        *lock(&self.faults) = Faults::default();
    }
}

/// Delivery counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FeedStats {
    pub sent: u64,
    pub delivered: u64,
    pub dropped: u64,
}

/// In-process snapshot feed driven by an [`EngineContext`] clock.
pub struct SimFeed<Ctx: EngineContext> {
    context: Arc<Ctx>,
    controller: SimFeedController,

    /// Frames in flight with their delivery time
    pending: Mutex<VecDeque<(Duration, FeedFrame)>>,

    /// Loss decisions use their own stream so they never shift turn rolls
    loss_rng: Mutex<ChaCha8Rng>,

    sequence: AtomicU64,
    stats: Mutex<FeedStats>,
    closed: AtomicBool,
}

impl<Ctx: EngineContext> SimFeed<Ctx> {
    pub fn new(context: Arc<Ctx>, controller: SimFeedController, loss_seed: u64) -> Self {
        Self {
            context,
            controller,
            pending: Mutex::new(VecDeque::new()),
            loss_rng: Mutex::new(ChaCha8Rng::seed_from_u64(loss_seed)),
            sequence: AtomicU64::new(0),
            stats: Mutex::new(FeedStats::default()),
            closed: AtomicBool::new(false),
        }
    }

    pub fn controller(&self) -> &SimFeedController {
        &self.controller
    }

    /// Publishes a payload.
    ///
    /// Returns the frame's sequence number, or `FrameDropped` when a stall
    /// or simulated loss ate it.
    pub fn send(&self, payload: impl Into<String>) -> Result<u64, EnvError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(EnvError::closed("feed shut down"));
        }

        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        lock(&self.stats).sent += 1;

        let faults = *lock(&self.controller.faults);
        let reason = if faults.stalled {
            Some("stalled")
        } else if faults.loss_rate > 0.0 && lock(&self.loss_rng).gen::<f64>() < faults.loss_rate {
            Some("loss")
        } else {
            None
        };
        if let Some(reason) = reason {
            lock(&self.stats).dropped += 1;
            trace!(sequence, reason, "Frame dropped");
            return Err(EnvError::dropped(reason));
        }

        let now = self.context.now();
        let sent_at_ms = self.context.wall_clock_ms().max(0.0) as u64;
        let deliver_at = now + Duration::from_millis(faults.latency_ms);
        let frame = FeedFrame::new(payload, sequence, sent_at_ms);
        lock(&self.pending).push_back((deliver_at, frame));
        Ok(sequence)
    }

    /// Stops accepting frames; frames already in flight still arrive.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    pub fn in_flight(&self) -> usize {
        lock(&self.pending).len()
    }

    pub fn stats(&self) -> FeedStats {
        *lock(&self.stats)
    }
}

#[async_trait]
impl<Ctx: EngineContext> SnapshotFeed for SimFeed<Ctx> {
    async fn recv(&self) -> Option<FeedFrame> {
        loop {
            if let Some(frame) = self.try_recv() {
                return Some(frame);
            }
            if self.closed.load(Ordering::Acquire) && lock(&self.pending).is_empty() {
                return None;
            }
            self.context.sleep(RECV_POLL).await;
        }
    }

    fn try_recv(&self) -> Option<FeedFrame> {
        let now = self.context.now();
        let mut pending = lock(&self.pending);
        match pending.front() {
            Some((deliver_at, _)) if *deliver_at <= now => {
                let (_, frame) = pending.pop_front()?;
                lock(&self.stats).delivered += 1;
                Some(frame)
            }
            _ => None,
        }
    }
}
