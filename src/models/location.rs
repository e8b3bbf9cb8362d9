//! Location record as stored in the `location` collection.

use geo::{Coord, LineString, MultiPolygon, Polygon};
use serde::{Deserialize, Serialize};

/// Input coordinate for query arguments: `[lon, lat]`
pub type Position = [f64; 2];

/// One linear ring of a stored border. Positions stay loose (`Vec<f64>`) so
/// documents carrying an altitude still decode.
pub type Ring = Vec<Vec<f64>>;

/// Coordinates of a border, nested according to the geometry type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BorderCoordinates {
    /// Ring list: exterior first, then holes
    Polygon(Vec<Ring>),
    MultiPolygon(Vec<Vec<Ring>>),
}

/// GeoJSON geometry of an administrative border
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoBorder {
    #[serde(rename = "type")]
    pub geo_type: String,
    pub coordinates: BorderCoordinates,
}

impl GeoBorder {
    /// Build a single-ring polygon border
    pub fn polygon(ring: &[Position]) -> Self {
        Self {
            geo_type: "Polygon".to_string(),
            coordinates: BorderCoordinates::Polygon(vec![ring
                .iter()
                .map(|p| p.to_vec())
                .collect()]),
        }
    }

    /// Convert to a `geo` multipolygon.
    ///
    /// Returns `None` when a position has fewer than two ordinates or a ring
    /// is empty. Ring closure is not checked here.
    pub fn to_multi_polygon(&self) -> Option<MultiPolygon<f64>> {
        let polygons = match &self.coordinates {
            BorderCoordinates::Polygon(rings) => vec![rings_to_polygon(rings)?],
            BorderCoordinates::MultiPolygon(polygons) => polygons
                .iter()
                .map(|rings| rings_to_polygon(rings))
                .collect::<Option<Vec<_>>>()?,
        };
        Some(MultiPolygon::new(polygons))
    }
}

fn rings_to_polygon(rings: &[Ring]) -> Option<Polygon<f64>> {
    let (exterior, holes) = rings.split_first()?;
    let interiors = holes
        .iter()
        .map(|ring| ring_to_line_string(ring))
        .collect::<Option<Vec<_>>>()?;
    Some(Polygon::new(ring_to_line_string(exterior)?, interiors))
}

fn ring_to_line_string(ring: &Ring) -> Option<LineString<f64>> {
    if ring.is_empty() {
        return None;
    }
    let coords = ring
        .iter()
        .map(|position| match position.as_slice() {
            [x, y, ..] => Some(Coord { x: *x, y: *y }),
            _ => None,
        })
        .collect::<Option<Vec<_>>>()?;
    Some(LineString::new(coords))
}

/// One administrative unit (village level) with its border
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationRecord {
    #[serde(rename = "_id")]
    pub id: String,
    pub province: String,
    pub district: String,
    pub sub_district: String,
    pub village: String,
    pub border: GeoBorder,
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::{self, doc};

    fn unit_square() -> Vec<Position> {
        vec![[0.0, 0.0], [0.0, 1.0], [1.0, 1.0], [1.0, 0.0], [0.0, 0.0]]
    }

    #[test]
    fn test_decode_wire_shape() {
        let document = doc! {
            "_id": "3201010001",
            "province": "Jawa Barat",
            "district": "Bogor",
            "sub_district": "Nanggung",
            "village": "Malasari",
            "border": {
                "type": "Polygon",
                "coordinates": [[[0.0, 0.0], [0, 1], [1.0, 1.0], [1.0, 0.0], [0.0, 0.0]]],
            },
        };

        let record: LocationRecord = bson::from_document(document).unwrap();
        assert_eq!(record.id, "3201010001");
        assert_eq!(record.sub_district, "Nanggung");
        assert_eq!(record.border, GeoBorder::polygon(&unit_square()));
    }

    #[test]
    fn test_decode_multi_polygon() {
        let document = doc! {
            "type": "MultiPolygon",
            "coordinates": [
                [[[0.0, 0.0], [0.0, 1.0], [1.0, 1.0], [0.0, 0.0]]],
                [[[5.0, 5.0], [5.0, 6.0], [6.0, 6.0], [5.0, 5.0]]],
            ],
        };

        let border: GeoBorder = bson::from_document(document).unwrap();
        assert!(matches!(border.coordinates, BorderCoordinates::MultiPolygon(ref p) if p.len() == 2));
        assert_eq!(border.to_multi_polygon().unwrap().0.len(), 2);
    }

    #[test]
    fn test_missing_field_fails_decode() {
        let document = doc! { "_id": "x", "province": "p" };
        assert!(bson::from_document::<LocationRecord>(document).is_err());
    }

    #[test]
    fn test_short_position_has_no_geometry() {
        let border = GeoBorder {
            geo_type: "Polygon".to_string(),
            coordinates: BorderCoordinates::Polygon(vec![vec![vec![1.0]]]),
        };
        assert!(border.to_multi_polygon().is_none());
    }

    #[test]
    fn test_serialize_round_trips_field_names() {
        let record = LocationRecord {
            id: "a".to_string(),
            province: "p".to_string(),
            district: "d".to_string(),
            sub_district: "s".to_string(),
            village: "v".to_string(),
            border: GeoBorder::polygon(&unit_square()),
        };
        let document = bson::to_document(&record).unwrap();
        assert_eq!(document.get_str("_id").unwrap(), "a");
        assert_eq!(document.get_str("sub_district").unwrap(), "s");
        assert_eq!(
            document.get_document("border").unwrap().get_str("type").unwrap(),
            "Polygon"
        );
    }
}
