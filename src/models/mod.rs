//! Core data models for location records.

pub mod location;

pub use location::{BorderCoordinates, GeoBorder, LocationRecord, Position, Ring};
