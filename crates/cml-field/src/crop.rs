//! Polygon cropping: masks a gridded field to the union of polygons in
//! a GeoJSON file (§4.6, display boundary masking).

use std::fs;
use std::path::Path;

use geo::{Contains, Coord, LineString, MultiPolygon, Point, Polygon};
use geojson::{GeoJson, Value};

use crate::error::{CmlError, CmlResult};

fn ring_to_linestring(ring: &[Vec<f64>]) -> LineString<f64> {
    LineString::new(ring.iter().map(|c| Coord { x: c[0], y: c[1] }).collect())
}

fn polygon_rings_to_polygon(rings: &[Vec<Vec<f64>>]) -> Option<Polygon<f64>> {
    let (exterior, holes) = rings.split_first()?;
    let exterior = ring_to_linestring(exterior);
    let interiors = holes.iter().map(|r| ring_to_linestring(r)).collect();
    Some(Polygon::new(exterior, interiors))
}

fn value_to_polygons(value: &Value, out: &mut Vec<Polygon<f64>>) {
    match value {
        Value::Polygon(rings) => {
            if let Some(p) = polygon_rings_to_polygon(rings) {
                out.push(p);
            }
        }
        Value::MultiPolygon(polys) => {
            for rings in polys {
                if let Some(p) = polygon_rings_to_polygon(rings) {
                    out.push(p);
                }
            }
        }
        _ => {}
    }
}

/// Loads every polygon found in a GeoJSON document (Feature,
/// FeatureCollection, or a bare Geometry) into a single multi-polygon.
pub fn load_polygons(path: &Path) -> CmlResult<MultiPolygon<f64>> {
    let raw = fs::read_to_string(path).map_err(CmlError::Io)?;
    let geojson: GeoJson = raw
        .parse()
        .map_err(|err| CmlError::InvalidParameters(format!("invalid geojson: {err}")))?;

    let mut polygons = Vec::new();
    match &geojson {
        GeoJson::FeatureCollection(fc) => {
            for feature in &fc.features {
                if let Some(geom) = &feature.geometry {
                    value_to_polygons(&geom.value, &mut polygons);
                }
            }
        }
        GeoJson::Feature(feature) => {
            if let Some(geom) = &feature.geometry {
                value_to_polygons(&geom.value, &mut polygons);
            }
        }
        GeoJson::Geometry(geom) => {
            value_to_polygons(&geom.value, &mut polygons);
        }
    }

    if polygons.is_empty() {
        return Err(CmlError::InvalidParameters("geojson contains no polygons".into()));
    }
    Ok(MultiPolygon::new(polygons))
}

/// Sets every grid cell whose centre falls outside `polygons` to NaN.
pub fn crop_to_polygons(grid: &mut [Vec<f64>], lons: &[f64], lats: &[f64], polygons: &MultiPolygon<f64>) {
    for (row, lat) in lats.iter().enumerate() {
        for (col, lon) in lons.iter().enumerate() {
            let point = Point::new(*lon, *lat);
            if !polygons.contains(&point) {
                grid[row][col] = f64::NAN;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn square_polygon_crops_outside_points() {
        let square = MultiPolygon::new(vec![Polygon::new(
            LineString::from(vec![(0.0, 0.0), (0.0, 2.0), (2.0, 2.0), (2.0, 0.0), (0.0, 0.0)]),
            vec![],
        )]);
        let lons = vec![1.0, 5.0];
        let lats = vec![1.0];
        let mut grid = vec![vec![10.0, 10.0]];
        crop_to_polygons(&mut grid, &lons, &lats, &square);
        assert_eq!(grid[0][0], 10.0);
        assert!(grid[0][1].is_nan());
    }

    #[test]
    fn load_polygons_parses_feature_collection() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"type":"FeatureCollection","features":[{{"type":"Feature","properties":{{}},"geometry":{{"type":"Polygon","coordinates":[[[0,0],[0,1],[1,1],[1,0],[0,0]]]}}}}]}}"#
        )
        .unwrap();
        let polygons = load_polygons(file.path()).unwrap();
        assert_eq!(polygons.0.len(), 1);
    }
}
