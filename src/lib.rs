//! Geosaw - typed geospatial queries over a MongoDB location collection
//!
//! Builds GeoJSON filter documents for the `border` field of administrative
//! area records and runs them through the document store's own geo engine.

pub mod config;
pub mod error;
pub mod geoquery;
pub mod models;
pub mod store;

pub use error::{GeoQueryError, Result};
pub use geoquery::{GeoPredicate, GeoQuery};
pub use models::{GeoBorder, LocationRecord, Position};
pub use store::{LocationStore, MemoryStore, MongoStore};
