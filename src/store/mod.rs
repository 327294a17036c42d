//! Persistence gateway: the Sensor Registry and the Reading Store.
//!
//! Each submodule owns the SQL for one relation. Callers go through the
//! re-exports below so they do not depend on the file layout.

mod readings;
mod sensors;

pub use readings::{insert_readings, latest_reading, readings_by_sensor};
pub use sensors::{
    count_sensors, create_sensor, delete_sensor, get_sensor, insert_sensors, list_codes,
    list_sensors, update_sensor,
};
