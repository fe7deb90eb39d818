use geo::{Coord, Line};
use rstar::primitives::{GeomWithData, Line as IndexedLine};
use rstar::{AABB, RTree};

use crate::model::{LineFeature, PointFeature};

/// Segment `seg` of arc `arc`.
pub type SegmentEntry = GeomWithData<IndexedLine<[f64; 2]>, (usize, usize)>;
pub type PointEntry = GeomWithData<[f64; 2], usize>;

pub struct SegmentIndex {
    tree: RTree<SegmentEntry>,
}

impl SegmentIndex {
    pub fn build(arcs: &[LineFeature]) -> Self {
        let segments: Vec<SegmentEntry> = arcs
            .iter()
            .enumerate()
            .flat_map(|(arc, feature)| {
                feature.geometry.lines().enumerate().map(move |(seg, line)| {
                    GeomWithData::new(
                        IndexedLine::new([line.start.x, line.start.y], [line.end.x, line.end.y]),
                        (arc, seg),
                    )
                })
            })
            .collect();
        SegmentIndex {
            tree: RTree::bulk_load(segments),
        }
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn intersecting(&self, envelope: &AABB<[f64; 2]>) -> impl Iterator<Item = (usize, usize)> {
        self.tree
            .locate_in_envelope_intersecting(envelope)
            .map(|entry| entry.data)
    }

    /// Segments passing within `distance` of `coord`.
    pub fn within(&self, coord: Coord, distance: f64) -> impl Iterator<Item = (usize, usize)> {
        self.tree
            .locate_within_distance([coord.x, coord.y], distance * distance)
            .map(|entry| entry.data)
    }
}

pub fn segment_of(arcs: &[LineFeature], (arc, seg): (usize, usize)) -> Line {
    let coords = &arcs[arc].geometry.0;
    Line::new(coords[seg], coords[seg + 1])
}

pub struct PointIndex {
    tree: RTree<PointEntry>,
}

impl PointIndex {
    pub fn build(points: &[PointFeature]) -> Self {
        Self::from_coords(points.iter().map(|p| p.geometry.0))
    }

    /// Indexes coordinates by their position in the iterator.
    pub fn from_coords(coords: impl IntoIterator<Item = Coord>) -> Self {
        let entries: Vec<PointEntry> = coords
            .into_iter()
            .enumerate()
            .map(|(i, c)| GeomWithData::new([c.x, c.y], i))
            .collect();
        PointIndex {
            tree: RTree::bulk_load(entries),
        }
    }

    pub fn within(&self, coord: Coord, distance: f64) -> impl Iterator<Item = usize> {
        self.tree
            .locate_within_distance([coord.x, coord.y], distance * distance)
            .map(|entry| entry.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Feature;
    use geo::{coord, line_string, point};

    #[test]
    fn finds_segments_near_a_coordinate() {
        let arcs = vec![
            Feature::new("a", line_string![(x: 0.0, y: 0.0), (x: 10.0, y: 0.0), (x: 10.0, y: 10.0)]),
            Feature::new("b", line_string![(x: 50.0, y: 50.0), (x: 60.0, y: 50.0)]),
        ];
        let index = SegmentIndex::build(&arcs);
        assert_eq!(index.len(), 3);

        let mut near: Vec<_> = index.within(coord! { x: 11.0, y: 5.0 }, 2.0).collect();
        near.sort();
        assert_eq!(near, vec![(0, 1)]);
        assert_eq!(segment_of(&arcs, (0, 1)).end, coord! { x: 10.0, y: 10.0 });
    }

    #[test]
    fn finds_points_within_distance() {
        let points = vec![
            Feature::new("p", point!(x: 0.0, y: 0.0)),
            Feature::new("q", point!(x: 3.0, y: 4.0)),
        ];
        let index = PointIndex::build(&points);
        assert_eq!(index.within(coord! { x: 0.0, y: 0.0 }, 5.0).count(), 2);
        assert_eq!(index.within(coord! { x: 0.0, y: 0.0 }, 4.9).count(), 1);
    }
}
