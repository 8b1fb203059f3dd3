//! Utility library for the payless monitoring project

pub mod other;
pub mod serde;
