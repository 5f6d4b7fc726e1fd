//! Crossview Environment Abstraction Layer
//!
//! This crate provides the "Sans-IO" abstraction allowing the Crossview
//! prediction engine to run inside a real frame loop (tokio) or inside a
//! deterministic simulation harness.
//!
//! # Core Concept
//!
//! Everything the engine would otherwise pull from the outside world is
//! intercepted:
//! - Time (`now()`, `system_time()`, `sleep()`)
//! - Randomness (`random_unit()`)
//! - Server snapshots (`SnapshotFeed::recv()`)
//!
//! # Example
//!
//! ```ignore
//! use crossview_env::{EngineContext, SnapshotFeed};
//!
//! async fn frame_loop<Ctx: EngineContext, Feed: SnapshotFeed>(
//!     ctx: &Ctx,
//!     feed: &Feed,
//! ) {
//!     loop {
//!         tokio::select! {
//!             frame = feed.recv() => ingest(frame),
//!             _ = ctx.sleep(Duration::from_millis(16)) => step(),
//!         }
//!     }
//! }
//! ```

mod context;
mod feed;
mod types;
mod error;
mod tokio_impl;
mod manual_impl;

pub use context::EngineContext;
pub use feed::{SnapshotFeed, FeedController};
pub use types::FeedFrame;
pub use error::EnvError;
pub use tokio_impl::TokioContext;
pub use manual_impl::ManualContext;
