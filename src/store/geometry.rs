//! GeoJSON geometry parsing for BSON documents.

use geo::{Geometry, Point};
use mongodb::bson::{Bson, Document};

use crate::error::{GeoQueryError, Result};

/// Parse a GeoJSON geometry document into a `geo` geometry.
///
/// Polygon rings must be closed and have at least four positions, the same
/// rule a 2dsphere index applies.
pub(crate) fn parse_geometry(document: &Document) -> Result<Geometry<f64>> {
    let json = Bson::Document(document.clone()).into_relaxed_extjson();
    let geometry: geojson::Geometry = serde_json::from_value(json)
        .map_err(|e| GeoQueryError::rejected(format!("invalid GeoJSON geometry: {}", e)))?;

    check_rings(&geometry.value)?;

    Geometry::<f64>::try_from(geometry)
        .map_err(|e| GeoQueryError::rejected(format!("unsupported geometry: {}", e)))
}

/// Parse the geometry stored under `field`
pub(crate) fn field_geometry(document: &Document, field: &str) -> Result<Geometry<f64>> {
    let geometry = document
        .get_document(field)
        .map_err(|_| GeoQueryError::rejected(format!("document has no '{}' geometry", field)))?;
    parse_geometry(geometry)
}

/// Legacy `[lon, lat]` coordinate pair
pub(crate) fn parse_pair(value: &Bson) -> Result<Point<f64>> {
    let pair = value
        .as_array()
        .ok_or_else(|| GeoQueryError::rejected("expected a [lon, lat] pair"))?;
    match pair.as_slice() {
        [lon, lat] => Ok(Point::new(parse_number(lon)?, parse_number(lat)?)),
        _ => Err(GeoQueryError::rejected("expected a [lon, lat] pair")),
    }
}

pub(crate) fn parse_number(value: &Bson) -> Result<f64> {
    match value {
        Bson::Double(v) => Ok(*v),
        Bson::Int32(v) => Ok(f64::from(*v)),
        Bson::Int64(v) => Ok(*v as f64),
        other => Err(GeoQueryError::rejected(format!(
            "expected a number, found {}",
            other
        ))),
    }
}

fn check_rings(value: &geojson::Value) -> Result<()> {
    match value {
        geojson::Value::Polygon(rings) => rings.iter().try_for_each(|ring| check_ring(ring)),
        geojson::Value::MultiPolygon(polygons) => polygons
            .iter()
            .flatten()
            .try_for_each(|ring| check_ring(ring)),
        geojson::Value::GeometryCollection(geometries) => geometries
            .iter()
            .try_for_each(|geometry| check_rings(&geometry.value)),
        _ => Ok(()),
    }
}

fn check_ring(ring: &[Vec<f64>]) -> Result<()> {
    if ring.len() < 4 {
        return Err(GeoQueryError::rejected(format!(
            "loop must have at least 4 positions, found {}",
            ring.len()
        )));
    }
    if ring.first() != ring.last() {
        return Err(GeoQueryError::rejected("loop is not closed"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::{bson, doc};

    #[test]
    fn test_parse_polygon() {
        let document = doc! {
            "type": "Polygon",
            "coordinates": [[[0.0, 0.0], [0, 1], [1.0, 1.0], [1.0, 0.0], [0.0, 0.0]]],
        };
        assert!(matches!(parse_geometry(&document).unwrap(), Geometry::Polygon(_)));
    }

    #[test]
    fn test_parse_point() {
        let document = doc! { "type": "Point", "coordinates": [106.8, -6.2] };
        assert_eq!(
            parse_geometry(&document).unwrap(),
            Geometry::Point(Point::new(106.8, -6.2))
        );
    }

    #[test]
    fn test_open_ring_rejected() {
        let document = doc! {
            "type": "Polygon",
            "coordinates": [[[0.0, 0.0], [0.0, 1.0], [1.0, 1.0], [1.0, 0.0]]],
        };
        let err = parse_geometry(&document).unwrap_err();
        assert!(err.to_string().contains("not closed"));
    }

    #[test]
    fn test_flat_ring_rejected() {
        // A bare ring where a ring list is expected
        let document = doc! {
            "type": "Polygon",
            "coordinates": [[0.0, 0.0], [0.0, 1.0], [1.0, 1.0], [0.0, 0.0]],
        };
        assert!(matches!(
            parse_geometry(&document),
            Err(GeoQueryError::Rejected(_))
        ));
    }

    #[test]
    fn test_parse_pair() {
        assert_eq!(
            parse_pair(&bson!([1, 2.5])).unwrap(),
            Point::new(1.0, 2.5)
        );
        assert!(parse_pair(&bson!([1.0])).is_err());
        assert!(parse_pair(&bson!("1,2")).is_err());
    }

    #[test]
    fn test_missing_field() {
        let document = doc! { "_id": "x" };
        assert!(field_geometry(&document, "border").is_err());
    }
}
