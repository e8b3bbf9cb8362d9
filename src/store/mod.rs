//! Document store backends for location records.

mod geometry;
mod memory;
mod mongo;

use std::future::Future;

use mongodb::bson::Document;

use crate::error::Result;

pub use memory::MemoryStore;
pub use mongo::MongoStore;

/// A collection that can run a find with a filter document.
///
/// Implementations drain the whole result set before returning and release
/// any cursor they opened, including when the returned future is dropped.
pub trait LocationStore {
    fn find(&self, filter: Document) -> impl Future<Output = Result<Vec<Document>>> + Send;
}

