//! Typed spatial queries over the location collection.

mod facade;
pub mod predicate;
mod scope;

pub use facade::GeoQuery;
pub use predicate::{GeoPredicate, BORDER_FIELD, EARTH_RADIUS_METERS};
pub use scope::{ExecutionScope, ScopeStats};
