//! Class schedule sidecar for the school calendar.
//!
//! - `schedule`: expansion of recurring weekly classes into calendar events
//! - `day_codes`: the stored weekday code convention
//! - `db`: SQLite workspace (teachers, rooms, classes, settings)
//! - `ipc`: line-delimited JSON request handling

pub mod day_codes;
pub mod db;
pub mod ipc;
pub mod schedule;
