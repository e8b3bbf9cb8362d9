//! In-process location store.
//!
//! Evaluates the same geo filter grammar the façade emits against documents
//! held in an R-tree. Intended for tests and local development; distances
//! are haversine meters on a sphere of `EARTH_RADIUS_METERS`.

use std::sync::{Arc, PoisonError, RwLock};

use geo::{
    BoundingRect, Centroid, Closest, CoordsIter, Distance, Geometry, HaversineClosestPoint,
    HaversineMeasure, Intersects, Point, Relate,
};
use mongodb::bson::{self, Bson, Document};
use rstar::{RTree, RTreeObject, AABB};
use tracing::debug;

use super::geometry::{field_geometry, parse_geometry, parse_number, parse_pair};
use super::LocationStore;
use crate::error::{GeoQueryError, Result};
use crate::geoquery::{BORDER_FIELD, EARTH_RADIUS_METERS};
use crate::models::LocationRecord;

/// Stored document with its parsed border
struct IndexedDocument {
    seq: u64,
    document: Document,
    geometry: Geometry<f64>,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for IndexedDocument {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

#[derive(Default)]
struct MemoryIndex {
    tree: RTree<IndexedDocument>,
    next_seq: u64,
}

/// Location store backed by an in-memory R-tree
#[derive(Clone, Default)]
pub struct MemoryStore {
    index: Arc<RwLock<MemoryIndex>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store holding `records`, in order
    pub fn with_records<'a>(records: impl IntoIterator<Item = &'a LocationRecord>) -> Result<Self> {
        let store = Self::new();
        for record in records {
            store.insert_record(record)?;
        }
        Ok(store)
    }

    /// Insert a raw document. Its border must be valid GeoJSON.
    pub fn insert(&self, document: Document) -> Result<()> {
        let geometry = field_geometry(&document, BORDER_FIELD)?;
        let envelope = envelope_of(&geometry)
            .ok_or_else(|| GeoQueryError::rejected("border geometry is empty"))?;

        let mut index = self.index.write().unwrap_or_else(PoisonError::into_inner);
        let seq = index.next_seq;
        index.next_seq += 1;
        index.tree.insert(IndexedDocument {
            seq,
            document,
            geometry,
            envelope,
        });
        Ok(())
    }

    pub fn insert_record(&self, record: &LocationRecord) -> Result<()> {
        self.insert(bson::to_document(record)?)
    }

    pub fn len(&self) -> usize {
        self.index
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .tree
            .size()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn evaluate(&self, filter: &Document) -> Result<Vec<Document>> {
        let (field, clause) = single_entry(filter, "filter")?;
        if field != BORDER_FIELD {
            return Err(GeoQueryError::rejected(format!(
                "no geo index on field '{}'",
                field
            )));
        }
        let clause = clause
            .as_document()
            .ok_or_else(|| GeoQueryError::rejected("geo clause must be a document"))?;
        let (operator, spec) = single_entry(clause, "geo clause")?;
        let spec = spec
            .as_document()
            .ok_or_else(|| GeoQueryError::rejected(format!("{} expects a document", operator)))?;

        let index = self.index.read().unwrap_or_else(PoisonError::into_inner);
        let results = match operator {
            "$geoIntersects" => {
                let query = parse_geometry(spec_geometry(spec, operator)?)?;
                let envelope = query_envelope(&query)?;
                let hits = index
                    .tree
                    .locate_in_envelope_intersecting(&envelope)
                    .filter(|item| item.geometry.relate(&query).is_intersects());
                in_insertion_order(hits)
            }
            "$geoWithin" => within(&index, spec)?,
            "$near" | "$nearSphere" => near(&index, spec, operator)?,
            other => {
                return Err(GeoQueryError::rejected(format!(
                    "unsupported operator {}",
                    other
                )))
            }
        };

        debug!("Memory store matched {} documents with {}", results.len(), operator);
        Ok(results)
    }
}

impl LocationStore for MemoryStore {
    async fn find(&self, filter: Document) -> Result<Vec<Document>> {
        self.evaluate(&filter)
    }
}

fn within(index: &MemoryIndex, spec: &Document) -> Result<Vec<Document>> {
    if spec.contains_key("$geometry") {
        let query = parse_geometry(spec_geometry(spec, "$geoWithin")?)?;
        let envelope = query_envelope(&query)?;
        let hits = index
            .tree
            .locate_in_envelope(&envelope)
            .filter(|item| item.geometry.relate(&query).is_within());
        return Ok(in_insertion_order(hits));
    }

    if let Some(sphere) = spec.get("$centerSphere") {
        let (center, radius) = match sphere.as_array().map(|a| a.as_slice()) {
            Some([center, radius]) => (parse_pair(center)?, parse_number(radius)?),
            _ => {
                return Err(GeoQueryError::rejected(
                    "$centerSphere expects [[lon, lat], radius]",
                ))
            }
        };
        let meters = radius * EARTH_RADIUS_METERS;
        let sphere = sphere_measure();
        let hits = index.tree.iter().filter(|item| {
            item.geometry
                .coords_iter()
                .all(|coord| sphere.distance(center, Point::from(coord)) <= meters)
        });
        return Ok(in_insertion_order(hits));
    }

    Err(GeoQueryError::rejected(
        "$geoWithin expects $geometry or $centerSphere",
    ))
}

fn near(index: &MemoryIndex, spec: &Document, operator: &str) -> Result<Vec<Document>> {
    let query = parse_geometry(spec_geometry(spec, operator)?)?;
    let origin = match query {
        Geometry::Point(point) => point,
        ref other => other
            .centroid()
            .ok_or_else(|| GeoQueryError::rejected("near geometry is empty"))?,
    };
    let max_distance = optional_number(spec, "$maxDistance")?;
    let min_distance = optional_number(spec, "$minDistance")?;

    let mut hits: Vec<(f64, &IndexedDocument)> = index
        .tree
        .iter()
        .map(|item| (distance_to(&item.geometry, origin), item))
        .filter(|(distance, _)| {
            max_distance.map_or(true, |max| *distance <= max)
                && min_distance.map_or(true, |min| *distance >= min)
        })
        .collect();

    hits.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.seq.cmp(&b.1.seq)));
    Ok(hits
        .into_iter()
        .map(|(_, item)| item.document.clone())
        .collect())
}

/// Meters from `origin` to the closest point of the geometry, zero when it
/// covers the point.
fn distance_to(geometry: &Geometry<f64>, origin: Point<f64>) -> f64 {
    if geometry.intersects(&origin) {
        return 0.0;
    }
    let sphere = sphere_measure();
    match geometry.haversine_closest_point(&origin) {
        Closest::Intersection(_) => 0.0,
        Closest::SinglePoint(closest) => sphere.distance(origin, closest),
        // Degenerate geometry: fall back to the nearest vertex
        Closest::Indeterminate => geometry
            .coords_iter()
            .map(|coord| sphere.distance(origin, Point::from(coord)))
            .fold(f64::INFINITY, f64::min),
    }
}

fn sphere_measure() -> HaversineMeasure {
    HaversineMeasure::new(EARTH_RADIUS_METERS)
}

fn in_insertion_order<'a>(hits: impl Iterator<Item = &'a IndexedDocument>) -> Vec<Document> {
    let mut hits: Vec<&IndexedDocument> = hits.collect();
    hits.sort_by_key(|item| item.seq);
    hits.into_iter().map(|item| item.document.clone()).collect()
}

fn envelope_of(geometry: &Geometry<f64>) -> Option<AABB<[f64; 2]>> {
    geometry
        .bounding_rect()
        .map(|rect| AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]))
}

fn query_envelope(query: &Geometry<f64>) -> Result<AABB<[f64; 2]>> {
    envelope_of(query).ok_or_else(|| GeoQueryError::rejected("query geometry is empty"))
}

fn spec_geometry<'a>(spec: &'a Document, operator: &str) -> Result<&'a Document> {
    spec.get_document("$geometry")
        .map_err(|_| GeoQueryError::rejected(format!("{} requires $geometry", operator)))
}

fn optional_number(spec: &Document, key: &str) -> Result<Option<f64>> {
    spec.get(key).map(parse_number).transpose()
}

fn single_entry<'a>(document: &'a Document, what: &str) -> Result<(&'a str, &'a Bson)> {
    let mut entries = document.iter();
    match (entries.next(), entries.next()) {
        (Some((key, value)), None) => Ok((key.as_str(), value)),
        _ => Err(GeoQueryError::rejected(format!(
            "{} must have exactly one key",
            what
        ))),
    }
}
