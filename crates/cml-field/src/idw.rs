//! Inverse-distance-weighted spatial interpolation of segment rain
//! values onto a regular lon/lat grid (§4.6).

use kdtree::distance::squared_euclidean;
use kdtree::KdTree;

#[derive(Debug, Clone, Copy)]
pub struct IdwParams {
    /// Number of nearest segment points considered per grid cell.
    pub nnear: usize,
    /// Power applied to inverse distance; higher values localize more.
    pub power: f64,
    /// Segment points beyond this distance (degrees) are not considered.
    pub max_distance: f64,
}

impl Default for IdwParams {
    fn default() -> Self {
        Self { nnear: 8, power: 2.0, max_distance: 1.0 }
    }
}

/// Interpolates `points` (lon, lat, value) onto the `grid_lons` x
/// `grid_lats` grid, row-major by latitude. A cell exactly coincident
/// with an input point takes that point's value directly; a cell with
/// no points within `max_distance` is left as NaN.
pub fn interpolate_grid(points: &[(f64, f64, f64)], grid_lons: &[f64], grid_lats: &[f64], params: &IdwParams) -> Vec<Vec<f64>> {
    let mut grid = vec![vec![f64::NAN; grid_lons.len()]; grid_lats.len()];
    if points.is_empty() {
        return grid;
    }

    let mut tree: KdTree<f64, usize, [f64; 2]> = KdTree::new(2);
    for (i, (lon, lat, _)) in points.iter().enumerate() {
        let _ = tree.add([*lon, *lat], i);
    }

    let nnear = params.nnear.max(1).min(points.len());

    for (row, lat) in grid_lats.iter().enumerate() {
        for (col, lon) in grid_lons.iter().enumerate() {
            let query = [*lon, *lat];
            let Ok(neighbors) = tree.nearest(&query, nnear, &squared_euclidean) else {
                continue;
            };

            let mut exact = None;
            let mut weighted_sum = 0.0;
            let mut weight_total = 0.0;
            for entry in neighbors.iter() {
                let sq_dist: f64 = entry.0;
                let idx: usize = *entry.1;
                let dist = sq_dist.sqrt();
                if dist < 1e-12 {
                    exact = Some(points[idx].2);
                    break;
                }
                if dist > params.max_distance {
                    continue;
                }
                let w = 1.0 / dist.powf(params.power);
                weighted_sum += w * points[idx].2;
                weight_total += w;
            }

            grid[row][col] = if let Some(v) = exact {
                v
            } else if weight_total > 0.0 {
                weighted_sum / weight_total
            } else {
                f64::NAN
            };
        }
    }

    grid
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_match_short_circuits_weighting() {
        let points = vec![(0.0, 0.0, 5.0), (1.0, 1.0, 10.0)];
        let grid = interpolate_grid(&points, &[0.0], &[0.0], &IdwParams::default());
        assert!((grid[0][0] - 5.0).abs() < 1e-9);
    }

    #[test]
    fn points_beyond_max_distance_are_excluded() {
        let points = vec![(10.0, 10.0, 99.0)];
        let params = IdwParams { nnear: 1, power: 2.0, max_distance: 0.01 };
        let grid = interpolate_grid(&points, &[0.0], &[0.0], &params);
        assert!(grid[0][0].is_nan());
    }

    #[test]
    fn equidistant_points_average_evenly() {
        let points = vec![(-1.0, 0.0, 2.0), (1.0, 0.0, 4.0)];
        let params = IdwParams { nnear: 2, power: 2.0, max_distance: 10.0 };
        let grid = interpolate_grid(&points, &[0.0], &[0.0], &params);
        assert!((grid[0][0] - 3.0).abs() < 1e-9);
    }
}
