pub mod classes;
pub mod core;
pub mod directory;
pub mod schedule;
pub mod setup;
