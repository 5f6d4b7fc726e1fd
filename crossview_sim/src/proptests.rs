//! Property tests across the engine and the generator.

use crate::generator::{GeneratorConfig, SnapshotGenerator};
use crate::signals::SignalController;
use crossview_core::{Direction, Engine, EngineConfig, LightColor, MapTopology, Snapshot};
use crossview_env::{ManualContext, EngineContext};
use proptest::prelude::*;
use serde_json::json;

fn direction_strategy() -> impl Strategy<Value = Direction> {
    prop_oneof![
        Just(Direction::N),
        Just(Direction::S),
        Just(Direction::E),
        Just(Direction::W),
    ]
}

fn color_strategy() -> impl Strategy<Value = &'static str> {
    prop_oneof![Just("RED"), Just("YELLOW"), Just("GREEN")]
}

proptest! {
    #[test]
    fn prop_generated_states_always_parse(seed in any::<u64>()) {
        let mut gen = SnapshotGenerator::new(GeneratorConfig::default(), seed, 1_700_000_000_000.0);
        let snapshot = Snapshot::from_value(gen.full_state().payload).unwrap();

        prop_assert_eq!(snapshot.rejected_records, 0);
        let vehicles = snapshot.vehicles.unwrap();
        prop_assert!(!vehicles.is_empty());
        for v in vehicles {
            prop_assert!(v.position >= -50.0);
            prop_assert!(v.speed > 0.0);
        }
    }

    #[test]
    fn prop_speed_bounded_and_odometer_monotonic(
        direction in direction_strategy(),
        color in color_strategy(),
        remaining in 0.0f64..20.0,
        position in -50.0f64..30.0,
        speed in 0.0f64..30.0,
        hz in 20u32..144,
        rolls in proptest::collection::vec(0.0f64..1.0, 4),
    ) {
        let ctx = ManualContext::shared();
        ctx.push_rolls(&rolls);
        let mut engine = Engine::new(ctx.clone(), EngineConfig::default(), MapTopology::default());

        let now = ctx.wall_clock_ms();
        let payload = json!({
            "vehicles": [{
                "id": 1,
                "direction": direction.as_str(),
                "lane": "Lane1",
                "position": position,
                "speed": speed,
            }],
            "lights": [{
                "direction": direction.as_str(),
                "color": color,
                "remainingSeconds": remaining,
            }],
            "serverTimestampMs": now,
        });
        engine.ingest_json(&payload.to_string()).unwrap();

        let dt = 1.0 / hz as f64;
        let mut last = position;
        for _ in 0..(hz * 5) {
            ctx.advance_secs(dt);
            engine.step(dt);
            let Some(v) = engine.vehicle(1) else { break };
            prop_assert!(v.current_speed >= 0.0);
            prop_assert!(v.current_speed <= v.target_speed + 1e-9);
            prop_assert!(v.current_position + 1e-9 >= last);
            prop_assert!(v.rotation.is_finite());
            last = v.current_position;
        }
    }

    #[test]
    fn prop_signal_pairs_never_both_green(steps in proptest::collection::vec(0.01f64..2.0, 1..400)) {
        let mut signals = SignalController::default();
        for dt in steps {
            signals.update(dt);
            let ns = signals.get(Direction::N).color;
            let ew = signals.get(Direction::E).color;
            prop_assert!(!(ns == LightColor::Green && ew == LightColor::Green));
            prop_assert_eq!(signals.get(Direction::N).color, signals.get(Direction::S).color);
        }
    }
}
