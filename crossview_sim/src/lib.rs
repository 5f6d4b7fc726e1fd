//! Crossview Deterministic Simulation Harness
//!
//! This crate runs the Crossview prediction engine against a stand-in
//! traffic server inside a controlled environment.
//!
//! # Core Principle
//!
//! All sources of non-determinism are intercepted and controlled:
//! - **Time**: a virtual clock advanced one frame at a time
//! - **Feed**: an in-process queue with configurable latency, loss and stalls
//! - **Randomness**: turn rolls, traffic and losses all derived from one seed
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         SimWorld                            │
//! │  ┌──────────────────────────────────────────────────────┐   │
//! │  │ SimContext (virtual clock + ChaCha8 turn rolls)      │   │
//! │  └──────────────────────────────────────────────────────┘   │
//! │                                                             │
//! │  ┌───────────────────┐    ┌─────────┐    ┌──────────────┐   │
//! │  │ SnapshotGenerator │───►│ SimFeed │───►│    Engine    │   │
//! │  │ (signals, events) │    │ (fault) │    │ (prediction) │   │
//! │  └───────────────────┘    └─────────┘    └──────────────┘   │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use crossview_sim::{ScenarioRunner, ScenarioId};
//!
//! let result = ScenarioRunner::new(42)
//!     .with_duration(10.0)
//!     .run(ScenarioId::RedLight);
//! assert!(result.passed);
//! ```

mod context;
mod error;
mod exporter;
mod feed;
mod generator;
mod live;
mod runner;
pub mod scenarios;
mod signals;
mod world;

pub use context::SimContext;
pub use error::SimError;
pub use exporter::{Recorder, SimEvent, SimExport, SimFrame};
pub use feed::{FeedStats, SimFeed, SimFeedController};
pub use generator::{
    light_json, vehicle_json, GeneratedMessage, GeneratorConfig, MessageKind, SnapshotGenerator,
    TrafficEvent, WireStyle, EVENTS,
};
pub use live::{run_live, LiveOptions, LiveSummary};
pub use runner::{ScenarioMetrics, ScenarioResult, ScenarioRunner};
pub use scenarios::ScenarioId;
pub use signals::{SignalController, SignalState, SignalTiming};
pub use world::{SimConfig, SimWorld, WorldStats};

#[cfg(test)]
mod proptests;
