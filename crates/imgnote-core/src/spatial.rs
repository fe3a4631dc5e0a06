use std::collections::HashSet;

use rstar::{RTree, RTreeObject, AABB};

use crate::geometry::{BBox, Point};
use crate::shape::ShapeKey;

/// An entry in the R-tree: a cached shape's pixel bounding box.
#[derive(Debug, Clone)]
pub struct SpatialEntry {
    pub key: ShapeKey,
    pub bbox: BBox,
}

impl RTreeObject for SpatialEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(
            [self.bbox.min.x, self.bbox.min.y],
            [self.bbox.max.x, self.bbox.max.y],
        )
    }
}

/// Broad phase for hit-testing: candidates whose bounding box covers a point
/// or overlaps a region. Callers still run the exact containment test.
pub struct SpatialIndex {
    tree: RTree<SpatialEntry>,
}

impl SpatialIndex {
    pub fn new() -> Self {
        Self { tree: RTree::new() }
    }

    pub fn build(entries: Vec<SpatialEntry>) -> Self {
        Self {
            tree: RTree::bulk_load(entries),
        }
    }

    /// Keys of every shape whose bounding box covers `point`, edges included.
    pub fn keys_at(&self, point: &Point) -> HashSet<ShapeKey> {
        self.keys_in_envelope(&AABB::from_point([point.x, point.y]))
    }

    /// Keys of every shape whose bounding box overlaps `region`.
    pub fn keys_in(&self, region: &BBox) -> HashSet<ShapeKey> {
        self.keys_in_envelope(&AABB::from_corners(
            [region.min.x, region.min.y],
            [region.max.x, region.max.y],
        ))
    }

    fn keys_in_envelope(&self, envelope: &AABB<[f64; 2]>) -> HashSet<ShapeKey> {
        self.tree
            .locate_in_envelope_intersecting(envelope)
            .map(|e| e.key)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }
}

impl Default for SpatialIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SpatialIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpatialIndex")
            .field("entries", &self.tree.size())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_and_region_queries() {
        let index = SpatialIndex::build(vec![
            SpatialEntry {
                key: ShapeKey(1),
                bbox: BBox::new(Point::new(0.0, 0.0), Point::new(10.0, 10.0)),
            },
            SpatialEntry {
                key: ShapeKey(2),
                bbox: BBox::new(Point::new(5.0, 5.0), Point::new(30.0, 30.0)),
            },
        ]);

        let both: HashSet<ShapeKey> = [ShapeKey(1), ShapeKey(2)].into_iter().collect();
        assert_eq!(index.keys_at(&Point::new(7.0, 7.0)), both);
        assert_eq!(
            index.keys_at(&Point::new(20.0, 20.0)),
            HashSet::from([ShapeKey(2)])
        );
        // Bounding box edges are inclusive.
        assert_eq!(index.keys_at(&Point::new(0.0, 0.0)).len(), 1);
        assert!(index.keys_at(&Point::new(31.0, 0.0)).is_empty());

        let region = BBox::new(Point::new(-5.0, -5.0), Point::new(2.0, 2.0));
        assert_eq!(index.keys_in(&region), HashSet::from([ShapeKey(1)]));
        assert_eq!(index.len(), 2);
    }
}
