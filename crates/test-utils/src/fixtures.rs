//! Common test fixtures for the CML rainfall pipeline.
//!
//! Pre-defined constants and snippets that recur across the core crates'
//! and services' test suites: bounding boxes, grid specs, and a minimal
//! configuration YAML matching `rain-scheduler`'s `Config`.

/// Common bounding boxes for testing the field generator and renderer.
pub mod bbox {
    /// Czech Republic, the deployment region the rain scale and example
    /// link geometry in this workspace are tuned for.
    pub const CZECHIA: (f64, f64, f64, f64) = (12.0, 48.5, 19.0, 51.5);

    /// A small tile around Prague, big enough for a handful of synthetic
    /// links without degenerate IDW geometry.
    pub const PRAGUE: (f64, f64, f64, f64) = (14.2, 49.9, 14.6, 50.2);

    /// Single point (degenerate bbox), for edge-case tests.
    pub const POINT: (f64, f64, f64, f64) = (14.4, 50.08, 14.4, 50.08);

    /// Invalid bbox (min > max), for validation tests.
    pub const INVALID: (f64, f64, f64, f64) = (10.0, 10.0, 5.0, 5.0);
}

/// Common grid specifications for testing the field generator.
pub mod grid {
    use cml_field::accumulate::GridSpec;

    /// A coarse grid covering the Prague test area at 0.05 degree
    /// resolution — cheap enough for IDW tests, fine enough to show
    /// spatial variation between a handful of links.
    pub fn prague_coarse() -> GridSpec {
        GridSpec {
            x_min: super::bbox::PRAGUE.0,
            y_min: super::bbox::PRAGUE.1,
            x_max: super::bbox::PRAGUE.2,
            y_max: super::bbox::PRAGUE.3,
            resolution: 0.05,
        }
    }

    /// A single-cell grid, useful for exact-value round-trip assertions.
    pub fn single_cell_at(lon: f64, lat: f64) -> GridSpec {
        GridSpec { x_min: lon, x_max: lon, y_min: lat, y_max: lat, resolution: 1.0 }
    }
}

/// A minimal `rain-scheduler` configuration YAML, valid on its own and
/// meant to be concatenated with overrides in individual tests (mirrors
/// the `MINIMAL_YAML` fixture embedded in `rain-scheduler::config`'s own
/// tests).
pub const MINIMAL_CONFIG_YAML: &str = r#"
mariadb:
  address: localhost
  user: cml
  pass: secret
  db_metadata: cml_meta
  db_output: cml_meta

influx2:
  base_url: http://localhost:9000
  bucket_old: old_cmls
  bucket_new: new_cmls
  bucket_out_cml: rain_out
  old_new_data_border: 2022-01-01T00:00:00Z

directories:
  outputs_web: ./out/web
  outputs_raw: ./out/raw

rendering:
  x_min: 12.0
  x_max: 19.0
  y_min: 48.0
  y_max: 51.5
"#;

/// A link-sets INI fixture: three links, one overridden in a named subset.
pub const SAMPLE_LINKSET_INI: &str = r#"
[default]
101 = 3
102 = 3
103 = 3

[storm_2024]
102 = 0
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prague_grid_covers_the_prague_bbox() {
        let spec = grid::prague_coarse();
        assert!((spec.x_min - bbox::PRAGUE.0).abs() < 1e-9);
        assert!((spec.y_max - bbox::PRAGUE.3).abs() < 1e-9);
    }

    #[test]
    fn single_cell_grid_has_one_point_in_each_axis() {
        let spec = grid::single_cell_at(14.4, 50.08);
        assert_eq!(spec.lons().len(), 1);
        assert_eq!(spec.lats().len(), 1);
    }

    #[test]
    fn minimal_config_yaml_parses() {
        let config: serde_yaml::Value = serde_yaml::from_str(MINIMAL_CONFIG_YAML).unwrap();
        assert!(config.get("mariadb").is_some());
        assert!(config.get("rendering").is_some());
    }
}
