use crate::types::Region;
use geo::algorithm::bounding_rect::BoundingRect;
use geo::algorithm::contains::Contains;
use geo::Point;
use rstar::{RTree, RTreeObject, AABB};

// Bounding box of one region, pointing back into the region slice
pub struct AreaIndex {
    index: usize,
    aabb: AABB<[f64; 2]>,
}

impl RTreeObject for AreaIndex {
    type Envelope = AABB<[f64; 2]>;
    fn envelope(&self) -> Self::Envelope {
        self.aabb
    }
}

/// R-tree over region bounding boxes, for point lookups and tile culling.
pub struct RegionIndex {
    tree: RTree<AreaIndex>,
}

impl RegionIndex {
    /// Regions with empty geometry are left out.
    pub fn build(regions: &[Region]) -> Self {
        let items: Vec<AreaIndex> = regions
            .iter()
            .enumerate()
            .filter_map(|(i, region)| {
                let rect = region.geometry.bounding_rect()?;
                Some(AreaIndex {
                    index: i,
                    aabb: AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]),
                })
            })
            .collect();

        Self { tree: RTree::bulk_load(items) }
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// Index of the first region whose geometry contains the point.
    pub fn locate(&self, regions: &[Region], lon: f64, lat: f64) -> Option<usize> {
        let point = Point::new(lon, lat);
        let envelope = AABB::from_point([lon, lat]);

        self.tree
            .locate_in_envelope_intersecting(&envelope)
            .map(|candidate| candidate.index)
            .filter(|&i| regions.get(i).is_some_and(|r| r.geometry.contains(&point)))
            .min()
    }

    /// Whether any region's bounding box touches the given lon/lat box.
    pub fn intersects_box(&self, min: [f64; 2], max: [f64; 2]) -> bool {
        let envelope = AABB::from_corners(min, max);
        self.tree.locate_in_envelope_intersecting(&envelope).next().is_some()
    }

    /// Lon/lat extent of all indexed regions.
    pub fn bounds(&self) -> Option<([f64; 2], [f64; 2])> {
        if self.is_empty() {
            return None;
        }
        let envelope = self.tree.root().envelope();
        Some((envelope.lower(), envelope.upper()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{polygon, MultiPolygon};

    fn square(id: &str, x: f64, y: f64) -> Region {
        let poly = polygon![
            (x: x, y: y),
            (x: x + 1.0, y: y),
            (x: x + 1.0, y: y + 1.0),
            (x: x, y: y + 1.0),
            (x: x, y: y),
        ];
        Region {
            id: id.into(),
            name: id.into(),
            total: 1,
            counts: vec![],
            geometry: MultiPolygon::new(vec![poly]),
        }
    }

    fn regions() -> Vec<Region> {
        vec![
            square("west", -100.0, 40.0),
            square("east", -99.0, 40.0),
            Region { geometry: MultiPolygon::new(vec![]), ..square("empty", 0.0, 0.0) },
        ]
    }

    #[test]
    fn locates_containing_region() {
        let regions = regions();
        let index = RegionIndex::build(&regions);

        assert_eq!(index.len(), 2);
        assert_eq!(index.locate(&regions, -99.5, 40.5), Some(0));
        assert_eq!(index.locate(&regions, -98.5, 40.5), Some(1));
        assert_eq!(index.locate(&regions, -50.0, 40.5), None);
    }

    #[test]
    fn bounds_and_box_queries() {
        let regions = regions();
        let index = RegionIndex::build(&regions);

        assert_eq!(index.bounds(), Some(([-100.0, 40.0], [-98.0, 41.0])));
        assert!(index.intersects_box([-99.2, 40.2], [-99.1, 40.3]));
        assert!(!index.intersects_box([10.0, 10.0], [11.0, 11.0]));
        assert_eq!(RegionIndex::build(&[]).bounds(), None);
    }
}
