use geo::{Coord, Point};
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

/// Grid cell a coordinate falls in once snapped to `precision` metres.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeKey {
    x_snapped: i64,
    y_snapped: i64,
}

impl NodeKey {
    pub fn new(coord: Coord, precision: f64) -> Self {
        NodeKey {
            x_snapped: (coord.x / precision).round() as i64,
            y_snapped: (coord.y / precision).round() as i64,
        }
    }
}

/// A vertex that compares equal to any other vertex in the same grid cell,
/// while remembering where it really was.
#[derive(Clone, Debug)]
pub struct SnappedCoord {
    key: NodeKey,
    original: Coord,
}

impl SnappedCoord {
    pub fn new(coord: Coord, precision: f64) -> Self {
        SnappedCoord {
            key: NodeKey::new(coord, precision),
            original: coord,
        }
    }

    pub fn key(&self) -> NodeKey {
        self.key
    }

    pub fn original(&self) -> Coord {
        self.original
    }
}

impl PartialEq for SnappedCoord {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for SnappedCoord {}

impl Hash for SnappedCoord {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl From<SnappedCoord> for Point {
    fn from(snapped: SnappedCoord) -> Self {
        Point::from(snapped.original)
    }
}

/// Groups item indices by the node their coordinate snaps to, keeping only
/// groups with more than one member. Groups come back ordered by their
/// smallest index.
pub fn coincident_groups<I>(coords: I, precision: f64) -> Vec<Vec<usize>>
where
    I: IntoIterator<Item = Coord>,
{
    let mut by_key: HashMap<NodeKey, Vec<usize>> = HashMap::new();
    for (index, coord) in coords.into_iter().enumerate() {
        by_key
            .entry(NodeKey::new(coord, precision))
            .or_default()
            .push(index);
    }

    let mut groups: Vec<Vec<usize>> = by_key
        .into_values()
        .filter(|members| members.len() > 1)
        .collect();
    groups.sort_by_key(|members| members[0]);
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::coord;

    #[test]
    fn coordinates_within_precision_share_a_key() {
        let a = NodeKey::new(coord! { x: 100.001, y: 200.004 }, 0.01);
        let b = NodeKey::new(coord! { x: 99.998, y: 199.996 }, 0.01);
        let c = NodeKey::new(coord! { x: 100.02, y: 200.0 }, 0.01);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn snapped_coord_keeps_original() {
        let snapped = SnappedCoord::new(coord! { x: 1.234, y: 5.678 }, 1.0);
        assert_eq!(snapped, SnappedCoord::new(coord! { x: 1.0, y: 6.0 }, 1.0));
        assert_eq!(Point::from(snapped), Point::new(1.234, 5.678));
    }

    #[test]
    fn groups_only_repeated_nodes() {
        let coords = vec![
            coord! { x: 0.0, y: 0.0 },
            coord! { x: 5.0, y: 5.0 },
            coord! { x: 0.001, y: 0.0 },
            coord! { x: 9.0, y: 9.0 },
            coord! { x: 5.0, y: 5.0 },
        ];
        assert_eq!(coincident_groups(coords, 0.01), vec![vec![0, 2], vec![1, 4]]);
    }
}
