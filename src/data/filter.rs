use log::{debug, warn};
use serde::{Deserialize, Serialize};

use super::model::{ColumnTriple, Dataset, Point3};
use crate::error::Result;

// ---------------------------------------------------------------------------
// Cull predicates
// ---------------------------------------------------------------------------

/// Axis-aligned box used to keep only the points inside a region of the scene.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min: Point3,
    pub max: Point3,
}

impl BoundingBox {
    /// Build a box from two opposite corners in any order.
    pub fn new(a: Point3, b: Point3) -> Self {
        BoundingBox {
            min: Point3::new(a.x.min(b.x), a.y.min(b.y), a.z.min(b.z)),
            max: Point3::new(a.x.max(b.x), a.y.max(b.y), a.z.max(b.z)),
        }
    }

    /// Inclusive on every face. Each axis is tested against its own bounds.
    pub fn contains(&self, p: &Point3) -> bool {
        (self.min.x..=self.max.x).contains(&p.x)
            && (self.min.y..=self.max.y).contains(&p.y)
            && (self.min.z..=self.max.z).contains(&p.z)
    }
}

/// Inclusive index range `[from, to]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexRange {
    pub from: usize,
    pub to: usize,
}

/// Which cull modes to apply. Both absent → the dataset passes through.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CullOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<IndexRange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounds: Option<BoundingBox>,
}

impl CullOptions {
    pub fn is_empty(&self) -> bool {
        self.range.is_none() && self.bounds.is_none()
    }
}

// ---------------------------------------------------------------------------
// Culling
// ---------------------------------------------------------------------------

/// Keep records at indices `from..=to`.
///
/// Bounds outside `from < to <= len` are not an error: the dataset is
/// returned unchanged.
pub fn range_cull(dataset: &Dataset, from: usize, to: usize) -> Dataset {
    if !(from < to && to <= dataset.len()) {
        warn!(
            "range cull [{from}, {to}] invalid for {} records, keeping all",
            dataset.len()
        );
        return dataset.clone();
    }
    // `to == len` is accepted; the inclusive upper index then stops at the last row.
    let kept = dataset
        .records()
        .iter()
        .enumerate()
        .filter(|(i, _)| *i >= from && *i <= to)
        .map(|(_, rec)| rec.clone())
        .collect::<Vec<_>>();
    debug!("range cull: {} -> {} records", dataset.len(), kept.len());
    dataset.derive(kept)
}

/// Keep records whose point lies inside `bounds`.
pub fn bbox_cull(dataset: &Dataset, bounds: &BoundingBox, columns: &ColumnTriple) -> Result<Dataset> {
    let indices = columns.resolve(dataset)?;
    let mut kept = Vec::new();
    for (row, rec) in dataset.records().iter().enumerate() {
        if bounds.contains(&dataset.point_at(row, indices)?) {
            kept.push(rec.clone());
        }
    }
    debug!("bounding-box cull: {} -> {} records", dataset.len(), kept.len());
    Ok(dataset.derive(kept))
}

/// Apply the range cull first, then the box cull to its result.
pub fn cull(dataset: &Dataset, options: &CullOptions, columns: &ColumnTriple) -> Result<Dataset> {
    let ranged = match options.range {
        Some(IndexRange { from, to }) => range_cull(dataset, from, to),
        None => dataset.clone(),
    };
    match &options.bounds {
        Some(bounds) => bbox_cull(&ranged, bounds, columns),
        None => Ok(ranged),
    }
}
