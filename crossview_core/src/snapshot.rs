//! Snapshot ingestion boundary: raw server JSON -> strictly typed records.
//!
//! The server is assumed cooperative but not perfect. A message that is not
//! JSON (or not a JSON object) is rejected as a whole with a
//! [`SnapshotError`]; a single bad vehicle or light record is rejected on its
//! own with a [`RecordError`] and the rest of the message is kept.
//!
//! Both the current field names and the legacy server names are accepted:
//!
//! | current              | legacy       |
//! |----------------------|--------------|
//! | `vehicles`           | `Vehicles`   |
//! | `id`                 | `Id`         |
//! | `direction`          | `Sens`       |
//! | `lane`               | `Voie`       |
//! | `position`           | `Position`   |
//! | `speed`              | `Speed`      |
//! | `lights`             | `Lights`     |
//! | `color`              | `Couleur`    |
//! | `remainingSeconds`   | `Timer`      |
//! | `absoluteExpiryMs`   | `ExpiresAt`  |
//! | `reset`              | `Reset`      |
//! | `serverTimestampMs`  | `ServerTime` |
//! | `event` / `events`   | `Event` / `Events` |

use crate::types::{Direction, Lane, LightColor};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::trace;

/// Whole-message failures. Prior engine state is kept when these occur.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("Snapshot is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Snapshot root must be a JSON object, got {0}")]
    NotAnObject(&'static str),
}

/// Single-record failures. These are dropped without surfacing to the host.
#[derive(Debug, Error, PartialEq)]
pub enum RecordError {
    #[error("vehicle record has no id")]
    MissingId,

    #[error("vehicle id must be a positive integer, got {0}")]
    InvalidId(String),

    #[error("record has no direction")]
    MissingDirection,

    #[error("invalid direction: {0}")]
    InvalidDirection(String),

    #[error("invalid light color: {0}")]
    InvalidColor(String),

    #[error("malformed record: {0}")]
    Malformed(String),
}

// ============================================================================
// WIRE FORMAT (lenient)
// ============================================================================

#[derive(Debug, Deserialize)]
struct WireSnapshot {
    #[serde(default, alias = "Vehicles")]
    vehicles: Option<Vec<Value>>,

    #[serde(default, alias = "Lights")]
    lights: Option<Vec<Value>>,

    #[serde(default, alias = "Reset")]
    reset: Option<bool>,

    #[serde(default, rename = "serverTimestampMs", alias = "ServerTime")]
    server_timestamp_ms: Option<f64>,

    #[serde(default, alias = "Event")]
    event: Option<Value>,

    #[serde(default, alias = "Events")]
    events: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct WireVehicle {
    #[serde(default, alias = "Id")]
    id: Option<Value>,

    #[serde(default, alias = "Sens")]
    direction: Option<String>,

    #[serde(default, alias = "Voie")]
    lane: Option<Value>,

    #[serde(default, alias = "Position")]
    position: Option<f64>,

    #[serde(default, alias = "Speed")]
    speed: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct WireLight {
    #[serde(default, alias = "Sens")]
    direction: Option<String>,

    #[serde(default, alias = "Couleur")]
    color: Option<String>,

    #[serde(default, rename = "remainingSeconds", alias = "Timer")]
    remaining_seconds: Option<f64>,

    #[serde(default, rename = "absoluteExpiryMs", alias = "ExpiresAt")]
    absolute_expiry_ms: Option<f64>,
}

// ============================================================================
// VALIDATED RECORDS
// ============================================================================

/// A validated vehicle record.
#[derive(Debug, Clone, PartialEq)]
pub struct VehicleRecord {
    pub id: u64,
    pub direction: Direction,
    pub lane: Lane,
    /// Declared distance travelled since spawn
    pub position: f64,
    /// Declared target speed (units/sec)
    pub speed: f64,
}

/// A validated light record.
#[derive(Debug, Clone, PartialEq)]
pub struct LightRecord {
    pub direction: Direction,
    pub color: LightColor,
    pub remaining_seconds: f64,
    pub absolute_expiry_ms: Option<f64>,
}

/// One inbound server message after validation.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    /// `None` when the message carried no vehicle list at all
    pub vehicles: Option<Vec<VehicleRecord>>,

    /// `None` when the message carried no light list at all
    pub lights: Option<Vec<LightRecord>>,

    pub reset: bool,

    pub server_timestamp_ms: Option<f64>,

    /// Opaque HUD metadata, passed through untouched
    pub event: Option<Value>,
    pub events: Option<Value>,

    /// Number of records dropped during validation
    pub rejected_records: usize,
}

impl Snapshot {
    /// Parses and validates a raw server message.
    pub fn from_json(payload: &str) -> Result<Self, SnapshotError> {
        let root: Value = serde_json::from_str(payload)?;
        Self::from_value(root)
    }

    /// Validates an already-decoded message.
    pub fn from_value(root: Value) -> Result<Self, SnapshotError> {
        let kind = match &root {
            Value::Object(_) => None,
            Value::Null => Some("null"),
            Value::Bool(_) => Some("bool"),
            Value::Number(_) => Some("number"),
            Value::String(_) => Some("string"),
            Value::Array(_) => Some("array"),
        };
        if let Some(kind) = kind {
            return Err(SnapshotError::NotAnObject(kind));
        }

        let wire: WireSnapshot = serde_json::from_value(root)?;
        let mut rejected_records = 0;

        let vehicles = wire.vehicles.map(|records| {
            records
                .into_iter()
                .filter_map(|raw| match VehicleRecord::from_value(raw) {
                    Ok(record) => Some(record),
                    Err(e) => {
                        trace!("dropping vehicle record: {}", e);
                        rejected_records += 1;
                        None
                    }
                })
                .collect()
        });

        let lights = wire.lights.map(|records| {
            records
                .into_iter()
                .filter_map(|raw| match LightRecord::from_value(raw) {
                    Ok(record) => Some(record),
                    Err(e) => {
                        trace!("dropping light record: {}", e);
                        rejected_records += 1;
                        None
                    }
                })
                .collect()
        });

        Ok(Self {
            vehicles,
            lights,
            reset: wire.reset.unwrap_or(false),
            server_timestamp_ms: wire.server_timestamp_ms.filter(|t| t.is_finite()),
            event: wire.event,
            events: wire.events,
            rejected_records,
        })
    }
}

fn parse_direction(raw: Option<String>) -> Result<Direction, RecordError> {
    let raw = raw.ok_or(RecordError::MissingDirection)?;
    raw.parse().map_err(|_| RecordError::InvalidDirection(raw))
}

fn finite_or_zero(value: Option<f64>) -> f64 {
    value.filter(|v| v.is_finite()).unwrap_or(0.0)
}

impl VehicleRecord {
    /// Validates one raw vehicle record.
    pub fn from_value(raw: Value) -> Result<Self, RecordError> {
        let wire: WireVehicle =
            serde_json::from_value(raw).map_err(|e| RecordError::Malformed(e.to_string()))?;

        let id = match wire.id {
            None | Some(Value::Null) => return Err(RecordError::MissingId),
            Some(Value::Number(n)) => match n.as_u64() {
                Some(id) if id > 0 => id,
                _ => return Err(RecordError::InvalidId(n.to_string())),
            },
            Some(other) => return Err(RecordError::InvalidId(other.to_string())),
        };

        let direction = parse_direction(wire.direction)?;

        let lane = match wire.lane {
            Some(Value::String(label)) => Lane::from_label(&label),
            Some(Value::Number(n)) => Lane::from_label(&n.to_string()),
            _ => Lane::Second,
        };

        Ok(Self {
            id,
            direction,
            lane,
            position: finite_or_zero(wire.position),
            speed: finite_or_zero(wire.speed).max(0.0),
        })
    }
}

impl LightRecord {
    /// Validates one raw light record.
    pub fn from_value(raw: Value) -> Result<Self, RecordError> {
        let wire: WireLight =
            serde_json::from_value(raw).map_err(|e| RecordError::Malformed(e.to_string()))?;

        let direction = parse_direction(wire.direction)?;
        let color_raw = wire.color.unwrap_or_default();
        let color = color_raw
            .parse()
            .map_err(|_| RecordError::InvalidColor(color_raw))?;

        Ok(Self {
            direction,
            color,
            remaining_seconds: finite_or_zero(wire.remaining_seconds).max(0.0),
            absolute_expiry_ms: wire.absolute_expiry_ms.filter(|t| t.is_finite() && *t > 0.0),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_current_field_names() {
        let payload = r#"{
            "vehicles": [{"id": 1, "direction": "N", "lane": "Lane1", "position": 0, "speed": 10}],
            "lights": [{"direction": "N", "color": "GREEN", "remainingSeconds": 10}],
            "serverTimestampMs": 1000.0
        }"#;
        let snapshot = Snapshot::from_json(payload).unwrap();

        let vehicles = snapshot.vehicles.unwrap();
        assert_eq!(vehicles.len(), 1);
        assert_eq!(vehicles[0].id, 1);
        assert_eq!(vehicles[0].direction, Direction::N);
        assert_eq!(vehicles[0].lane, Lane::First);
        assert_eq!(vehicles[0].speed, 10.0);

        let lights = snapshot.lights.unwrap();
        assert_eq!(lights[0].color, LightColor::Green);
        assert_eq!(lights[0].remaining_seconds, 10.0);
        assert_eq!(lights[0].absolute_expiry_ms, None);

        assert!(!snapshot.reset);
        assert_eq!(snapshot.server_timestamp_ms, Some(1000.0));
    }

    #[test]
    fn test_parse_legacy_field_names() {
        let payload = json!({
            "Vehicles": [{"Id": 7, "Sens": "W", "Voie": "Lane2", "Position": 12.5, "Speed": 9.0, "Waiting": false}],
            "Lights": [{"Sens": "E", "Couleur": "RED", "Timer": 4.2, "TimerMs": 4200, "ExpiresAt": 1704067204200u64}],
            "Reset": true,
            "ServerTime": 1704067200000u64,
            "Event": {"name": "Rush Hour", "flow_mult": 1.8}
        });
        let snapshot = Snapshot::from_value(payload).unwrap();

        let vehicle = &snapshot.vehicles.as_ref().unwrap()[0];
        assert_eq!(vehicle.id, 7);
        assert_eq!(vehicle.direction, Direction::W);
        assert_eq!(vehicle.lane, Lane::Second);
        assert_eq!(vehicle.position, 12.5);

        let light = &snapshot.lights.as_ref().unwrap()[0];
        assert_eq!(light.color, LightColor::Red);
        assert_eq!(light.absolute_expiry_ms, Some(1704067204200.0));

        assert!(snapshot.reset);
        assert_eq!(snapshot.event.unwrap()["name"], "Rush Hour");
    }

    #[test]
    fn test_invalid_records_dropped_individually() {
        let payload = json!({
            "vehicles": [
                {"id": 1, "direction": "N", "lane": "1", "position": 0, "speed": 10},
                {"direction": "N"},
                {"id": 0, "direction": "S"},
                {"id": 3, "direction": "Q"},
                {"id": "four", "direction": "E"},
                {"id": 5},
                {"id": 6, "direction": "E", "speed": "fast"}
            ],
            "lights": [
                {"direction": "N", "color": "PURPLE"},
                {"direction": "S", "color": "RED"}
            ]
        });
        let snapshot = Snapshot::from_value(payload).unwrap();

        assert_eq!(snapshot.vehicles.unwrap().len(), 1);
        assert_eq!(snapshot.lights.unwrap().len(), 1);
        assert_eq!(snapshot.rejected_records, 7);
    }

    #[test]
    fn test_record_errors() {
        assert_eq!(
            VehicleRecord::from_value(json!({"direction": "N"})),
            Err(RecordError::MissingId)
        );
        assert_eq!(
            VehicleRecord::from_value(json!({"id": 2, "direction": "X"})),
            Err(RecordError::InvalidDirection("X".to_string()))
        );
        assert_eq!(
            VehicleRecord::from_value(json!({"id": 2})),
            Err(RecordError::MissingDirection)
        );
        assert!(matches!(
            VehicleRecord::from_value(json!({"id": -2, "direction": "N"})),
            Err(RecordError::InvalidId(_))
        ));
    }

    #[test]
    fn test_missing_lists_are_distinguished_from_empty() {
        let snapshot = Snapshot::from_json(r#"{"lights": []}"#).unwrap();
        assert!(snapshot.vehicles.is_none());
        assert_eq!(snapshot.lights.map(|l| l.len()), Some(0));
    }

    #[test]
    fn test_message_level_errors() {
        assert!(matches!(Snapshot::from_json("{not json"), Err(SnapshotError::Json(_))));
        assert!(matches!(
            Snapshot::from_json("[1, 2, 3]"),
            Err(SnapshotError::NotAnObject("array"))
        ));
        assert!(matches!(
            Snapshot::from_json(r#"{"reset": "yes"}"#),
            Err(SnapshotError::Json(_))
        ));
    }

    #[test]
    fn test_negative_speed_clamped() {
        let record = VehicleRecord::from_value(json!({"id": 9, "direction": "S", "speed": -3.0})).unwrap();
        assert_eq!(record.speed, 0.0);
        assert_eq!(record.lane, Lane::Second);
    }
}
