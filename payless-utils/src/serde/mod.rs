//! Utility module for serde of types.

pub mod timestamp_map;

pub use timestamp_map::format_timestamp;
