//! Query façade: one method per predicate, one shared execution path.

use std::sync::Arc;

use mongodb::bson::{self, Document};
use tracing::debug;

use super::predicate::GeoPredicate;
use super::scope::{ExecutionScope, ScopeLedger, ScopeStats};
use crate::config::QueryConfig;
use crate::error::{GeoQueryError, Result};
use crate::models::{LocationRecord, Position};
use crate::store::LocationStore;

/// Spatial queries against a location store.
///
/// Every call runs under its own execution scope with the configured time
/// budget, drains the full result set and returns either every matching
/// record or an error.
pub struct GeoQuery<S> {
    store: S,
    config: QueryConfig,
    ledger: Arc<ScopeLedger>,
}

impl<S: LocationStore> GeoQuery<S> {
    pub fn new(store: S) -> Self {
        Self::with_config(store, QueryConfig::default())
    }

    pub fn with_config(store: S, config: QueryConfig) -> Self {
        Self {
            store,
            config,
            ledger: Arc::new(ScopeLedger::default()),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &QueryConfig {
        &self.config
    }

    /// Opened and released execution scopes so far
    pub fn scope_stats(&self) -> ScopeStats {
        self.ledger.stats()
    }

    /// Records whose border intersects `polygon`
    pub async fn intersects(&self, polygon: &[Position]) -> Result<Vec<LocationRecord>> {
        self.execute(&GeoPredicate::Intersects {
            polygon: polygon.to_vec(),
        })
        .await
    }

    /// Records whose border lies wholly within `polygon`
    pub async fn within(&self, polygon: &[Position]) -> Result<Vec<LocationRecord>> {
        self.execute(&GeoPredicate::Within {
            polygon: polygon.to_vec(),
        })
        .await
    }

    /// Records within `max_distance` meters of `polygon`, nearest first
    pub async fn near(&self, polygon: &[Position], max_distance: f64) -> Result<Vec<LocationRecord>> {
        self.execute(&GeoPredicate::Near {
            polygon: polygon.to_vec(),
            max_distance,
        })
        .await
    }

    /// Spherical variant of [`GeoQuery::near`]
    pub async fn near_sphere(&self, polygon: &[Position], radius: f64) -> Result<Vec<LocationRecord>> {
        self.execute(&GeoPredicate::NearSphere {
            polygon: polygon.to_vec(),
            radius,
        })
        .await
    }

    pub async fn within_box(
        &self,
        lower_left: Position,
        upper_right: Position,
    ) -> Result<Vec<LocationRecord>> {
        self.execute(&GeoPredicate::Box {
            lower_left,
            upper_right,
        })
        .await
    }

    /// Records within `radius` meters of `center`
    pub async fn within_center(&self, center: Position, radius: f64) -> Result<Vec<LocationRecord>> {
        self.execute(&GeoPredicate::Center { center, radius }).await
    }

    /// Records within a caller-supplied GeoJSON geometry
    pub async fn within_geometry(&self, geometry: Document) -> Result<Vec<LocationRecord>> {
        self.execute(&GeoPredicate::Geometry { geometry }).await
    }

    pub async fn max_distance(&self, point: Position, max_distance: f64) -> Result<Vec<LocationRecord>> {
        self.execute(&GeoPredicate::MaxDistance {
            point,
            max_distance,
        })
        .await
    }

    pub async fn min_distance(&self, point: Position, min_distance: f64) -> Result<Vec<LocationRecord>> {
        self.execute(&GeoPredicate::MinDistance {
            point,
            min_distance,
        })
        .await
    }

    pub async fn execute(&self, predicate: &GeoPredicate) -> Result<Vec<LocationRecord>> {
        self.find(predicate.operator(), predicate.to_filter()).await
    }

    /// Run one find under a fresh execution scope and decode every result.
    ///
    /// The scope is dropped on every return path, including when the budget
    /// elapses and the in-flight store call is cancelled.
    pub async fn find(&self, operator: &'static str, filter: Document) -> Result<Vec<LocationRecord>> {
        let scope = ExecutionScope::open(Arc::clone(&self.ledger), operator, self.config.timeout());
        debug!("Running {} query: {}", operator, filter);

        let documents = tokio::time::timeout_at(scope.deadline(), self.store.find(filter))
            .await
            .map_err(|_| GeoQueryError::Timeout(scope.budget()))??;

        let records = documents
            .into_iter()
            .map(bson::from_document::<LocationRecord>)
            .collect::<std::result::Result<Vec<_>, _>>()?;

        debug!(
            "{} query returned {} records in {:?}",
            operator,
            records.len(),
            scope.elapsed()
        );
        Ok(records)
    }
}
