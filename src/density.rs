//! Spatial density scoring of gaze points for heatmap colouring.
//!
//! Every point is compared with every other point: the nearest neighbour
//! distance and the number of neighbours closer than `max_point_distance`
//! decide whether the point belongs to a cluster and how intense it is.
//!
//! The exact scan is O(n²) in time. That is fine for single-session logs of
//! a few thousand samples; for longer recordings enable `use_grid`, which
//! buckets points into cells of `max_point_distance` and produces the same
//! scores.

use std::collections::HashMap;

use log::{debug, info};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::data::model::{ColumnTriple, Dataset, Point3};
use crate::error::{AnalysisError, Result};

// ---------------------------------------------------------------------------
// Configuration & results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DensityConfig {
    /// Neighbour radius (scene units, exclusive).
    pub max_point_distance: f64,
    /// Minimum neighbour count for a point to be part of a cluster.
    pub min_cluster_size: usize,
    /// Score records on the rayon thread pool.
    pub parallel: bool,
    /// Use the uniform grid index instead of the all-pairs scan.
    pub use_grid: bool,
}

impl Default for DensityConfig {
    fn default() -> Self {
        DensityConfig {
            max_point_distance: 0.05,
            min_cluster_size: 5,
            parallel: false,
            use_grid: false,
        }
    }
}

impl DensityConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.max_point_distance.is_finite() && self.max_point_distance > 0.0) {
            return Err(AnalysisError::Config(format!(
                "max_point_distance must be a positive number, got {}",
                self.max_point_distance
            )));
        }
        Ok(())
    }
}

/// Density score of one point, aligned with the dataset by index.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PointScore {
    /// Distance to the closest other point (`inf` if there is none).
    pub nearest_distance: f64,
    /// Points strictly closer than `max_point_distance`.
    pub neighbor_count: usize,
    /// `neighbor_count / max_neighbor_count`; `None` when below threshold.
    pub intensity: Option<f64>,
}

impl PointScore {
    pub fn is_clustered(&self) -> bool {
        self.intensity.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DensityReport {
    pub scores: Vec<PointScore>,
    pub max_neighbor_count: usize,
    pub clustered: usize,
    pub below_threshold: usize,
}

// ---------------------------------------------------------------------------
// Scoring
// ---------------------------------------------------------------------------

/// Score the gaze points of a dataset. An empty dataset yields no scores.
pub fn score_dataset(
    dataset: &Dataset,
    columns: &ColumnTriple,
    config: &DensityConfig,
) -> Result<DensityReport> {
    if dataset.is_empty() {
        debug!("density: empty dataset, nothing to score");
        return Ok(DensityReport::default());
    }
    let points = dataset.points(columns)?;
    Ok(score_points(&points, config))
}

/// Score raw points.
pub fn score_points(points: &[Point3], config: &DensityConfig) -> DensityReport {
    let radius = config.max_point_distance;
    let stats: Vec<(f64, usize)> = match (config.use_grid, config.parallel) {
        (false, false) => (0..points.len())
            .map(|i| pairwise_stats(points, i, radius))
            .collect(),
        (false, true) => (0..points.len())
            .into_par_iter()
            .map(|i| pairwise_stats(points, i, radius))
            .collect(),
        (true, parallel) => {
            let grid = Grid::build(points, radius);
            if parallel {
                (0..points.len())
                    .into_par_iter()
                    .map(|i| grid.stats(points, i, radius))
                    .collect()
            } else {
                (0..points.len())
                    .map(|i| grid.stats(points, i, radius))
                    .collect()
            }
        }
    };

    let report = classify(&stats, config);
    info!(
        "density: {} points, {} clustered, {} below threshold, max neighbours {}",
        points.len(),
        report.clustered,
        report.below_threshold,
        report.max_neighbor_count
    );
    report
}

/// Nearest distance and neighbour count of point `i` against all others.
fn pairwise_stats(points: &[Point3], i: usize, radius: f64) -> (f64, usize) {
    let here = &points[i];
    let mut nearest = f64::INFINITY;
    let mut count = 0;
    for (j, other) in points.iter().enumerate() {
        if i == j {
            continue;
        }
        let d = here.distance(other);
        if d < nearest {
            nearest = d;
        }
        if d < radius {
            count += 1;
        }
    }
    (nearest, count)
}

fn classify(stats: &[(f64, usize)], config: &DensityConfig) -> DensityReport {
    let max_neighbor_count = stats.iter().map(|(_, c)| *c).max().unwrap_or(0);
    let scores: Vec<PointScore> = stats
        .iter()
        .map(|&(nearest_distance, neighbor_count)| {
            let below = nearest_distance > config.max_point_distance
                || neighbor_count < config.min_cluster_size;
            let intensity = if below {
                None
            } else if max_neighbor_count == 0 {
                Some(0.0)
            } else {
                Some(neighbor_count as f64 / max_neighbor_count as f64)
            };
            PointScore {
                nearest_distance,
                neighbor_count,
                intensity,
            }
        })
        .collect();
    let clustered = scores.iter().filter(|s| s.is_clustered()).count();
    DensityReport {
        below_threshold: scores.len() - clustered,
        clustered,
        max_neighbor_count,
        scores,
    }
}

// ---------------------------------------------------------------------------
// Uniform grid index
// ---------------------------------------------------------------------------

type Cell = (i64, i64, i64);

/// Points bucketed by cells of edge `radius`; every point within `radius`
/// of a point lies in its own or one of the 26 surrounding cells.
struct Grid {
    cell_size: f64,
    cells: HashMap<Cell, Vec<usize>>,
}

impl Grid {
    fn build(points: &[Point3], cell_size: f64) -> Self {
        let mut cells: HashMap<Cell, Vec<usize>> = HashMap::new();
        for (i, p) in points.iter().enumerate() {
            cells.entry(cell_of(p, cell_size)).or_default().push(i);
        }
        debug!("density grid: {} points in {} cells", points.len(), cells.len());
        Grid { cell_size, cells }
    }

    fn stats(&self, points: &[Point3], i: usize, radius: f64) -> (f64, usize) {
        let here = &points[i];
        let (cx, cy, cz) = cell_of(here, self.cell_size);
        let mut nearest = f64::INFINITY;
        let mut count = 0;
        for dx in -1..=1 {
            for dy in -1..=1 {
                for dz in -1..=1 {
                    // Cells past the i64 range do not exist.
                    let Some(cell) = neighbour_cell((cx, cy, cz), (dx, dy, dz)) else {
                        continue;
                    };
                    let Some(bucket) = self.cells.get(&cell) else {
                        continue;
                    };
                    for &j in bucket {
                        if j == i {
                            continue;
                        }
                        let d = here.distance(&points[j]);
                        if d < nearest {
                            nearest = d;
                        }
                        if d < radius {
                            count += 1;
                        }
                    }
                }
            }
        }
        // Anything outside the neighbourhood is farther than `radius`, so a
        // local nearest beyond it may not be the global one.
        if nearest > radius {
            nearest = pairwise_stats(points, i, radius).0;
        }
        (nearest, count)
    }
}

fn neighbour_cell(cell: Cell, offset: Cell) -> Option<Cell> {
    Some((
        cell.0.checked_add(offset.0)?,
        cell.1.checked_add(offset.1)?,
        cell.2.checked_add(offset.2)?,
    ))
}

/// Coordinates beyond the i64 cell range saturate into the outermost cell.
fn cell_of(p: &Point3, size: f64) -> Cell {
    (
        (p.x / size).floor() as i64,
        (p.y / size).floor() as i64,
        (p.z / size).floor() as i64,
    )
}

// ---------------------------------------------------------------------------
// Trails
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrailConfig {
    /// Connect consecutive points at all.
    pub enabled: bool,
    /// Drop segments longer than `max_distance`.
    pub close_only: bool,
    pub max_distance: f64,
}

impl Default for TrailConfig {
    fn default() -> Self {
        TrailConfig {
            enabled: false,
            close_only: false,
            max_distance: 1.0,
        }
    }
}

/// A line between two consecutive samples.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrailSegment {
    pub from: usize,
    pub to: usize,
    pub length: f64,
}

/// Segments joining consecutive points. With `close_only` a long jump
/// drops the segment, never the point.
pub fn trail_segments(points: &[Point3], config: &TrailConfig) -> Vec<TrailSegment> {
    if !config.enabled {
        return Vec::new();
    }
    let segments: Vec<TrailSegment> = points
        .windows(2)
        .enumerate()
        .map(|(i, pair)| TrailSegment {
            from: i,
            to: i + 1,
            length: pair[0].distance(&pair[1]),
        })
        .filter(|seg| !config.close_only || seg.length <= config.max_distance)
        .collect();
    debug!(
        "trail: {} segments over {} points",
        segments.len(),
        points.len()
    );
    segments
}
