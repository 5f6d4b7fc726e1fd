//! Crossview Core - Client-side prediction for a live intersection feed
//!
//! The server streams sparse snapshots (vehicle spawns, light states, resets)
//! at low frequency. This library turns them into smooth per-frame motion:
//! 1. **Ingestion**: strictly typed snapshots, per-record validation
//! 2. **Kinematics**: car-following and red-light compliance on straight lanes
//! 3. **Turns**: a distance-driven state machine with eased heading blends
//! 4. **Collisions**: lane-ordinal plus spatial detection with a pair registry
//! 5. **Lifecycle**: scene bounds and reset fade-out
//!
//! Time and randomness come from a [`crossview_env::EngineContext`], so every
//! frame is reproducible under a manual clock.

pub mod clock;
pub mod collision;
pub mod config;
pub mod engine;
pub mod kinematics;
pub mod lifecycle;
pub mod lights;
pub mod snapshot;
pub mod turning;
pub mod types;
pub mod vehicle;

// Re-export key types for convenience
pub use config::{EngineConfig, LightZone, MapTopology, PhysicsConfig, TopologyError, TurnConfig};
pub use engine::{Engine, IngestReport, StepReport};
pub use lights::{format_remaining, LightTracker, LightView};
pub use snapshot::{LightRecord, RecordError, Snapshot, SnapshotError, VehicleRecord};
pub use types::{Direction, Lane, LightColor, TurnDirection, TurnState};
pub use vehicle::{Vehicle, VehicleView};
