//! Spatial predicate construction.
//!
//! Every predicate targets the `border` field and uses the GeoJSON query
//! operators of the document store. Inputs are forwarded as given: ring
//! closure and orientation are left for the engine to judge.

use mongodb::bson::{doc, Bson, Document};

use crate::models::Position;

/// Field holding the GeoJSON border of each location
pub const BORDER_FIELD: &str = "border";

/// Mean Earth radius used to turn meters into an angular radius
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// One spatial query against the border field
#[derive(Debug, Clone, PartialEq)]
pub enum GeoPredicate {
    /// Border intersects the polygon
    Intersects { polygon: Vec<Position> },
    /// Border lies wholly within the polygon
    Within { polygon: Vec<Position> },
    /// Border within `max_distance` meters of the polygon, nearest first
    Near {
        polygon: Vec<Position>,
        max_distance: f64,
    },
    /// Like `Near`, measured on the sphere
    NearSphere { polygon: Vec<Position>, radius: f64 },
    /// Border within the axis-aligned rectangle
    Box {
        lower_left: Position,
        upper_right: Position,
    },
    /// Border within the circle of `radius` meters around `center`
    Center { center: Position, radius: f64 },
    /// Border within an arbitrary GeoJSON geometry
    Geometry { geometry: Document },
    MaxDistance { point: Position, max_distance: f64 },
    MinDistance { point: Position, min_distance: f64 },
}

impl GeoPredicate {
    /// Short operation name, used in logs
    pub fn operator(&self) -> &'static str {
        match self {
            GeoPredicate::Intersects { .. } => "intersects",
            GeoPredicate::Within { .. } => "within",
            GeoPredicate::Near { .. } => "near",
            GeoPredicate::NearSphere { .. } => "near_sphere",
            GeoPredicate::Box { .. } => "box",
            GeoPredicate::Center { .. } => "center",
            GeoPredicate::Geometry { .. } => "geometry",
            GeoPredicate::MaxDistance { .. } => "max_distance",
            GeoPredicate::MinDistance { .. } => "min_distance",
        }
    }

    /// Build the find filter for this predicate
    pub fn to_filter(&self) -> Document {
        match self {
            GeoPredicate::Intersects { polygon } => intersects_filter(polygon),
            GeoPredicate::Within { polygon } => within_filter(polygon),
            GeoPredicate::Near {
                polygon,
                max_distance,
            } => near_filter(polygon, *max_distance),
            GeoPredicate::NearSphere { polygon, radius } => near_sphere_filter(polygon, *radius),
            GeoPredicate::Box {
                lower_left,
                upper_right,
            } => box_filter(*lower_left, *upper_right),
            GeoPredicate::Center { center, radius } => center_filter(*center, *radius),
            GeoPredicate::Geometry { geometry } => geometry_filter(geometry.clone()),
            GeoPredicate::MaxDistance {
                point,
                max_distance,
            } => max_distance_filter(*point, *max_distance),
            GeoPredicate::MinDistance {
                point,
                min_distance,
            } => min_distance_filter(*point, *min_distance),
        }
    }
}

fn position_bson(position: Position) -> Bson {
    Bson::Array(vec![Bson::Double(position[0]), Bson::Double(position[1])])
}

fn ring_bson(ring: &[Position]) -> Bson {
    Bson::Array(ring.iter().copied().map(position_bson).collect())
}

/// GeoJSON Polygon with `ring` as its only (exterior) ring
pub fn polygon_geometry(ring: &[Position]) -> Document {
    doc! {
        "type": "Polygon",
        "coordinates": [ring_bson(ring)],
    }
}

pub fn point_geometry(point: Position) -> Document {
    doc! {
        "type": "Point",
        "coordinates": position_bson(point),
    }
}

/// Wrap an operator clause under the border field
fn border_clause(operator: &str, clause: impl Into<Bson>) -> Document {
    let mut inner = Document::new();
    inner.insert(operator, clause);
    let mut filter = Document::new();
    filter.insert(BORDER_FIELD, inner);
    filter
}

pub fn intersects_filter(polygon: &[Position]) -> Document {
    border_clause(
        "$geoIntersects",
        doc! { "$geometry": polygon_geometry(polygon) },
    )
}

pub fn within_filter(polygon: &[Position]) -> Document {
    geometry_filter(polygon_geometry(polygon))
}

pub fn near_filter(polygon: &[Position], max_distance: f64) -> Document {
    border_clause(
        "$near",
        doc! {
            "$geometry": polygon_geometry(polygon),
            "$maxDistance": max_distance,
        },
    )
}

pub fn near_sphere_filter(polygon: &[Position], radius: f64) -> Document {
    border_clause(
        "$nearSphere",
        doc! {
            "$geometry": polygon_geometry(polygon),
            "$maxDistance": radius,
        },
    )
}

/// Closed rectangle ring: lower-left, lower-right, upper-right, upper-left, lower-left
pub fn box_ring(lower_left: Position, upper_right: Position) -> Vec<Position> {
    vec![
        [lower_left[0], lower_left[1]],
        [upper_right[0], lower_left[1]],
        [upper_right[0], upper_right[1]],
        [lower_left[0], upper_right[1]],
        [lower_left[0], lower_left[1]],
    ]
}

pub fn box_filter(lower_left: Position, upper_right: Position) -> Document {
    within_filter(&box_ring(lower_left, upper_right))
}

/// Meters to radians on a sphere of `EARTH_RADIUS_METERS`
pub fn angular_radius(radius_meters: f64) -> f64 {
    radius_meters / EARTH_RADIUS_METERS
}

pub fn center_filter(center: Position, radius: f64) -> Document {
    border_clause(
        "$geoWithin",
        doc! {
            "$centerSphere": [position_bson(center), angular_radius(radius)],
        },
    )
}

pub fn geometry_filter(geometry: Document) -> Document {
    border_clause("$geoWithin", doc! { "$geometry": geometry })
}

pub fn max_distance_filter(point: Position, max_distance: f64) -> Document {
    border_clause(
        "$near",
        doc! {
            "$geometry": point_geometry(point),
            "$maxDistance": max_distance,
        },
    )
}

pub fn min_distance_filter(point: Position, min_distance: f64) -> Document {
    border_clause(
        "$near",
        doc! {
            "$geometry": point_geometry(point),
            "$minDistance": min_distance,
        },
    )
}
