//! Data models for the sensor fleet: registry identities and readings.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::FleetError;

// ---

/// Default lifecycle state written for freshly created sensors.
pub const DEFAULT_STATUS: &str = "active";

/// Mounting orientation of a sensor on the building.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Face {
    North,
    East,
    South,
    West,
}

impl Face {
    // ---
    pub const ALL: [Face; 4] = [Face::North, Face::East, Face::South, Face::West];

    pub fn as_str(&self) -> &'static str {
        match self {
            Face::North => "north",
            Face::East => "east",
            Face::South => "south",
            Face::West => "west",
        }
    }
}

impl fmt::Display for Face {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Face {
    type Err = FleetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // ---
        Face::ALL
            .into_iter()
            .find(|face| face.as_str() == s)
            .ok_or_else(|| FleetError::InvalidFace(s.to_string()))
    }
}

impl TryFrom<String> for Face {
    type Error = FleetError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// A row of the `sensors` relation.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct Sensor {
    // ---
    pub id: i32,
    pub sensor_code: i32,
    #[sqlx(try_from = "String")]
    pub face: Face,
    /// Unix seconds.
    pub installed_at: i64,
    pub status: String,
}

/// Sensor fields supplied on insert or update; `id` is store-assigned.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSensor {
    // ---
    pub sensor_code: i32,
    pub face: Face,
    pub installed_at: i64,
    pub status: String,
}

impl NewSensor {
    /// An `active` sensor installed at `installed_at`.
    pub fn active(sensor_code: i32, face: Face, installed_at: i64) -> Self {
        Self {
            sensor_code,
            face,
            installed_at,
            status: DEFAULT_STATUS.to_string(),
        }
    }
}

/// A row of the `sensor_data` relation.
///
/// `sensor_id` references `sensors.sensor_code`, not the surrogate key.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct Reading {
    // ---
    pub id: i32,
    pub sensor_id: i32,
    pub timestamp: i64,
    pub temperature_value: f64,
}

/// A reading prepared by the generator, not yet persisted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NewReading {
    pub sensor_id: i32,
    pub timestamp: i64,
    pub temperature_value: f64,
}

/// Inclusive Unix-second bounds on reading timestamps. Either side may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: Option<i64>,
    pub end: Option<i64>,
}

impl TimeWindow {
    // ---
    /// No bounds: the whole history.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn between(start: i64, end: i64) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
        }
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn face_round_trips_through_its_column_text() {
        // ---
        for face in Face::ALL {
            assert_eq!(face.as_str().parse::<Face>().unwrap(), face);
        }
        assert_eq!(Face::try_from("west".to_string()).unwrap(), Face::West);
    }

    #[test]
    fn unknown_face_is_rejected() {
        // ---
        let err = "up".parse::<Face>().unwrap_err();
        assert!(matches!(err, FleetError::InvalidFace(ref s) if s == "up"));
        assert!("North".parse::<Face>().is_err());
    }

    #[test]
    fn sensor_serializes_face_lowercase() {
        // ---
        let sensor = Sensor {
            id: 7,
            sensor_code: 42,
            face: Face::South,
            installed_at: 1_700_000_000,
            status: DEFAULT_STATUS.to_string(),
        };
        let json = serde_json::to_value(&sensor).unwrap();
        assert_eq!(json["face"], "south");
        assert_eq!(json["sensor_code"], 42);
        assert_eq!(json["status"], "active");
    }

    #[test]
    fn new_sensor_defaults_to_active() {
        // ---
        let s = NewSensor::active(3, Face::East, 10);
        assert_eq!(s.status, "active");
        assert_eq!(s.sensor_code, 3);
    }
}
