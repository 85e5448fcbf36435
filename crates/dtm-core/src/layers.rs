//! Layer correspondence across points, keyed by normalized instruction text.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::types::BuildResult;

/// Serialized cell value for "this point has no layer with this identity".
pub const LAYER_ABSENT: i64 = -1;

/// Size of one identity in one point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerCell {
    pub point_id: String,
    /// `None` when the point has no layer with this identity.
    pub size: Option<u64>,
}

impl LayerCell {
    /// Size in bytes, or [`LAYER_ABSENT`].
    pub fn raw(&self) -> i64 {
        self.size.map_or(LAYER_ABSENT, |s| s as i64)
    }
}

/// One instruction identity and its size in every examined point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerComparisonRow {
    pub identity: String,
    /// One cell per successful result, in result order.
    pub cells: Vec<LayerCell>,
}

impl LayerComparisonRow {
    /// Size in `point_id`, or [`LAYER_ABSENT`] when absent or unknown.
    pub fn size_for(&self, point_id: &str) -> i64 {
        self.cells
            .iter()
            .find(|c| c.point_id == point_id)
            .map_or(LAYER_ABSENT, LayerCell::raw)
    }
}

/// Identity-by-point table over the successful results of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerTable {
    /// Column order: point identities of the successful results.
    pub points: Vec<String>,
    pub rows: Vec<LayerComparisonRow>,
}

impl LayerTable {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Build the layer table from `results`, ignoring failed ones.
///
/// Row order: identities of the first result in layer order, then new
/// identities from later results in order of first appearance. Repeated
/// identities within one result are summed into a single cell.
pub fn build_layer_table(results: &[BuildResult]) -> LayerTable {
    let successful: Vec<&BuildResult> = results.iter().filter(|r| r.is_success()).collect();

    let mut identities: Vec<&str> = Vec::new();
    let mut seen: HashSet<&str> = HashSet::new();
    for r in &successful {
        for layer in r.layers() {
            if seen.insert(layer.identity.as_str()) {
                identities.push(layer.identity.as_str());
            }
        }
    }

    let per_point: Vec<HashMap<&str, u64>> = successful
        .iter()
        .map(|r| {
            let mut sizes: HashMap<&str, u64> = HashMap::new();
            for layer in r.layers() {
                *sizes.entry(layer.identity.as_str()).or_insert(0) += layer.size;
            }
            sizes
        })
        .collect();

    let rows = identities
        .iter()
        .map(|identity| LayerComparisonRow {
            identity: identity.to_string(),
            cells: successful
                .iter()
                .zip(&per_point)
                .map(|(r, sizes)| LayerCell {
                    point_id: r.point.id.clone(),
                    size: sizes.get(identity).copied(),
                })
                .collect(),
        })
        .collect();

    LayerTable {
        points: successful.iter().map(|r| r.point.id.clone()).collect(),
        rows,
    }
}
