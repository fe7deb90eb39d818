//! Planar measurements on projected coordinates.

use geo::{Coord, Line, LineString};

pub fn segment_length(line: &Line) -> f64 {
    line.dx().hypot(line.dy())
}

pub fn planar_length(line_string: &LineString) -> f64 {
    line_string.lines().map(|l| segment_length(&l)).sum()
}

pub fn distance(a: Coord, b: Coord) -> f64 {
    (a.x - b.x).hypot(a.y - b.y)
}

pub fn point_segment_distance(p: Coord, line: &Line) -> f64 {
    let (dx, dy) = (line.dx(), line.dy());
    let len_sq = dx * dx + dy * dy;
    if len_sq == 0.0 {
        return distance(p, line.start);
    }
    let t = (((p.x - line.start.x) * dx + (p.y - line.start.y) * dy) / len_sq).clamp(0.0, 1.0);
    distance(
        p,
        Coord {
            x: line.start.x + t * dx,
            y: line.start.y + t * dy,
        },
    )
}

pub fn point_line_string_distance(p: Coord, line_string: &LineString) -> f64 {
    match line_string.0.as_slice() {
        [] => f64::INFINITY,
        [only] => distance(p, *only),
        _ => line_string
            .lines()
            .map(|l| point_segment_distance(p, &l))
            .fold(f64::INFINITY, f64::min),
    }
}

/// Bearing in degrees from `from` towards `to`, in `[0, 360)`.
pub fn bearing(from: Coord, to: Coord) -> f64 {
    (to.y - from.y).atan2(to.x - from.x).to_degrees().rem_euclid(360.0)
}

/// Smallest angle between two bearings, in `[0, 180]`.
pub fn angle_between(a: f64, b: f64) -> f64 {
    let diff = (a - b).rem_euclid(360.0);
    diff.min(360.0 - diff)
}

/// Vertices plus intermediate points so that no two consecutive samples
/// are further than `step` apart.
pub fn densify(line_string: &LineString, step: f64) -> Vec<Coord> {
    let mut samples = Vec::with_capacity(line_string.0.len());
    if let Some(first) = line_string.0.first() {
        samples.push(*first);
    }
    for line in line_string.lines() {
        let length = segment_length(&line);
        let pieces = (length / step).ceil().max(1.0) as usize;
        for i in 1..=pieces {
            let t = i as f64 / pieces as f64;
            samples.push(Coord {
                x: line.start.x + t * line.dx(),
                y: line.start.y + t * line.dy(),
            });
        }
    }
    samples
}

/// Envelope of a segment grown by `margin` on all sides, in rstar form.
pub fn segment_envelope(line: &Line, margin: f64) -> rstar::AABB<[f64; 2]> {
    rstar::AABB::from_corners(
        [
            line.start.x.min(line.end.x) - margin,
            line.start.y.min(line.end.y) - margin,
        ],
        [
            line.start.x.max(line.end.x) + margin,
            line.start.y.max(line.end.y) + margin,
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{coord, line_string};

    #[test]
    fn length_sums_segments() {
        let ls = line_string![(x: 0.0, y: 0.0), (x: 3.0, y: 4.0), (x: 3.0, y: 10.0)];
        assert!((planar_length(&ls) - 11.0).abs() < 1e-9);
    }

    #[test]
    fn distance_to_segment_clamps_to_ends() {
        let line = Line::new(coord! { x: 0.0, y: 0.0 }, coord! { x: 10.0, y: 0.0 });
        assert!((point_segment_distance(coord! { x: 5.0, y: 3.0 }, &line) - 3.0).abs() < 1e-9);
        assert!((point_segment_distance(coord! { x: 13.0, y: 4.0 }, &line) - 5.0).abs() < 1e-9);
    }

    #[test]
    fn angles_wrap_around_north() {
        assert!((angle_between(355.0, 5.0) - 10.0).abs() < 1e-9);
        assert!((angle_between(90.0, 270.0) - 180.0).abs() < 1e-9);
        assert!((bearing(coord! { x: 0.0, y: 0.0 }, coord! { x: 0.0, y: -1.0 }) - 270.0).abs() < 1e-9);
    }

    #[test]
    fn densify_respects_step() {
        let ls = line_string![(x: 0.0, y: 0.0), (x: 10.0, y: 0.0)];
        let samples = densify(&ls, 2.5);
        assert_eq!(samples.len(), 5);
        assert_eq!(samples[4], coord! { x: 10.0, y: 0.0 });
    }
}
