use float_ord::FloatOrd;
use geo::{ConvexHull, Coord, LineString, MinimumRotatedRect, Polygon};
use serde::Serialize;
use tracing::instrument;

use crate::{CardOcrError, Result};

/// A 2D coordinate in image pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point) -> f32 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// An axis-aligned box, normalized so `x_min <= x_max` and `y_min <= y_max`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BoundingBox {
    pub x_min: f32,
    pub y_min: f32,
    pub x_max: f32,
    pub y_max: f32,
}

impl BoundingBox {
    pub fn new(x_min: f32, y_min: f32, x_max: f32, y_max: f32) -> Self {
        Self {
            x_min: x_min.min(x_max),
            y_min: y_min.min(y_max),
            x_max: x_min.max(x_max),
            y_max: y_min.max(y_max),
        }
    }

    /// Envelope of an arbitrary polygon, `None` for an empty point set.
    pub fn from_points(points: &[Point]) -> Option<Self> {
        let first = points.first()?;
        let init = Self::new(first.x, first.y, first.x, first.y);
        Some(points.iter().skip(1).fold(init, |acc, p| Self {
            x_min: acc.x_min.min(p.x),
            y_min: acc.y_min.min(p.y),
            x_max: acc.x_max.max(p.x),
            y_max: acc.y_max.max(p.y),
        }))
    }

    pub fn center(&self) -> Point {
        Point::new(
            (self.x_min + self.x_max) / 2.0,
            (self.y_min + self.y_max) / 2.0,
        )
    }

    pub fn width(&self) -> f32 {
        self.x_max - self.x_min
    }

    pub fn height(&self) -> f32 {
        self.y_max - self.y_min
    }

    /// Smallest box containing both operands.
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            x_min: self.x_min.min(other.x_min),
            y_min: self.y_min.min(other.y_min),
            x_max: self.x_max.max(other.x_max),
            y_max: self.y_max.max(other.y_max),
        }
    }

    pub fn contains_box(&self, other: &BoundingBox) -> bool {
        self.x_min <= other.x_min
            && self.y_min <= other.y_min
            && self.x_max >= other.x_max
            && self.y_max >= other.y_max
    }
}

/// Named card corner, in cyclic order around the perimeter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Corner {
    TopLeft,
    TopRight,
    BottomRight,
    BottomLeft,
}

impl Corner {
    pub const ALL: [Corner; 4] = [
        Corner::TopLeft,
        Corner::TopRight,
        Corner::BottomRight,
        Corner::BottomLeft,
    ];

    pub fn index(self) -> usize {
        match self {
            Corner::TopLeft => 0,
            Corner::TopRight => 1,
            Corner::BottomRight => 2,
            Corner::BottomLeft => 3,
        }
    }
}

/// Four points indexed by [`Corner`], fully populated before rectification.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quadrilateral([Point; 4]);

impl Quadrilateral {
    pub fn new(points: [Point; 4]) -> Self {
        Self(points)
    }

    pub fn corner(&self, corner: Corner) -> Point {
        self.0[corner.index()]
    }

    pub fn points(&self) -> [Point; 4] {
        self.0
    }
}

/// Canonical corner assignment for four unordered points: top-left has the
/// smallest coordinate sum, bottom-right the largest; top-right minimizes
/// `y - x`, bottom-left maximizes it. Idempotent.
pub fn order_points(points: [Point; 4]) -> Quadrilateral {
    let by_sum = |p: &&Point| FloatOrd(p.x + p.y);
    let by_diff = |p: &&Point| FloatOrd(p.y - p.x);
    let tl = *points.iter().min_by_key(by_sum).unwrap();
    let br = *points.iter().max_by_key(by_sum).unwrap();
    let tr = *points.iter().min_by_key(by_diff).unwrap();
    let bl = *points.iter().max_by_key(by_diff).unwrap();
    Quadrilateral([tl, tr, br, bl])
}

/// Centroid of a detection polygon, `None` when the polygon is empty.
pub(crate) fn centroid(polygon: &[Point]) -> Option<Point> {
    if polygon.is_empty() {
        return None;
    }
    let n = polygon.len() as f32;
    let (sx, sy) = polygon
        .iter()
        .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
    Some(Point::new(sx / n, sy / n))
}

fn to_geo_poly(points: &[Point]) -> Polygon<f32> {
    let coords = points
        .iter()
        .map(|point| Coord {
            x: point.x,
            y: point.y,
        })
        .collect();
    Polygon::new(LineString::new(coords), vec![])
}

/// Recovers the one missing corner from a card segmentation mask.
///
/// The mask's convex boundary is enclosed in a minimum-area rotated rectangle;
/// each rectangle corner is snapped to its nearest boundary vertex, giving four
/// candidates. The three known corners each greedily claim their nearest
/// candidate, and the single leftover candidate fills the empty slot.
#[instrument(level = "debug", skip(mask))]
pub(crate) fn recover_missing_corner(
    known: &[Option<Point>; 4],
    mask: &[Point],
) -> Result<Quadrilateral> {
    if mask.len() < 3 {
        return Err(CardOcrError::EmptyMask);
    }
    let hull = to_geo_poly(mask).convex_hull();
    let rect = hull
        .minimum_rotated_rect()
        .ok_or(CardOcrError::EmptyMask)?;
    let boundary: Vec<Point> = hull
        .exterior()
        .coords()
        .map(|c| Point::new(c.x, c.y))
        .collect();
    if boundary.is_empty() {
        return Err(CardOcrError::EmptyMask);
    }

    // One candidate per enclosing-rectangle corner: the nearest mask
    // boundary vertex. The exterior ring is closed, so only four coords.
    let mut candidates: Vec<Point> = rect
        .exterior()
        .coords()
        .take(4)
        .map(|c| {
            let corner = Point::new(c.x, c.y);
            *boundary
                .iter()
                .min_by_key(|p| FloatOrd(corner.distance(p)))
                .unwrap()
        })
        .collect();
    if candidates.len() != 4 {
        return Err(CardOcrError::EmptyMask);
    }

    // Greedy nearest-distance assignment, each matched candidate leaves the
    // pool. Known corners are snapped to the mask candidate they claim.
    let mut slots: [Option<Point>; 4] = [None; 4];
    for (slot, point) in slots.iter_mut().zip(known.iter()) {
        let Some(point) = point else { continue };
        let (idx, _) = candidates
            .iter()
            .enumerate()
            .min_by_key(|(_, c)| FloatOrd(point.distance(c)))
            .ok_or(CardOcrError::EmptyMask)?;
        *slot = Some(candidates.swap_remove(idx));
    }

    let missing = slots
        .iter()
        .position(|s| s.is_none())
        .ok_or(CardOcrError::EmptyMask)?;
    slots[missing] = candidates.pop();
    log::debug!("recovered corner slot {missing} as {:?}", slots[missing]);

    match slots {
        [Some(tl), Some(tr), Some(br), Some(bl)] => Ok(Quadrilateral([tl, tr, br, bl])),
        _ => Err(CardOcrError::EmptyMask),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(x: f32, y: f32) -> Point {
        Point::new(x, y)
    }

    #[test]
    fn order_points_assigns_canonical_corners() {
        let quad = order_points([p(98.0, 5.0), p(3.0, 102.0), p(1.0, 2.0), p(100.0, 99.0)]);
        assert_eq!(quad.corner(Corner::TopLeft), p(1.0, 2.0));
        assert_eq!(quad.corner(Corner::TopRight), p(98.0, 5.0));
        assert_eq!(quad.corner(Corner::BottomRight), p(100.0, 99.0));
        assert_eq!(quad.corner(Corner::BottomLeft), p(3.0, 102.0));
    }

    #[test]
    fn order_points_is_idempotent() {
        let quad = order_points([p(0.0, 0.0), p(50.0, 2.0), p(52.0, 40.0), p(1.0, 41.0)]);
        let reordered = order_points(quad.points());
        assert_eq!(quad, reordered);
    }

    #[test]
    fn union_contains_both_operands() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 5.0);
        let b = BoundingBox::new(8.0, 3.0, 20.0, 12.0);
        let merged = a.union(&b);
        assert!(merged.contains_box(&a));
        assert!(merged.contains_box(&b));
        assert_eq!(merged, BoundingBox::new(0.0, 0.0, 20.0, 12.0));
    }

    #[test]
    fn bounding_box_normalizes_inverted_coordinates() {
        let bx = BoundingBox::new(10.0, 8.0, 2.0, 1.0);
        assert_eq!(bx, BoundingBox::new(2.0, 1.0, 10.0, 8.0));
        assert_eq!(bx.center(), p(6.0, 4.5));
    }

    #[test]
    fn recovers_missing_bottom_left_corner() {
        let known = [
            Some(p(1.0, 1.0)),    // top-left
            Some(p(99.0, 2.0)),   // top-right
            Some(p(101.0, 98.0)), // bottom-right
            None,
        ];
        // Roughly square mask boundary with intermediate vertices.
        let mask = vec![
            p(0.0, 0.0),
            p(50.0, 0.0),
            p(100.0, 0.0),
            p(100.0, 50.0),
            p(100.0, 100.0),
            p(50.0, 100.0),
            p(0.0, 100.0),
            p(0.0, 50.0),
        ];
        let quad = recover_missing_corner(&known, &mask).unwrap();
        let bl = quad.corner(Corner::BottomLeft);
        assert!(bl.distance(&p(0.0, 100.0)) < 1e-3, "got {bl:?}");
        // Known corners snap to their nearest mask candidates.
        assert!(quad.corner(Corner::TopLeft).distance(&p(0.0, 0.0)) < 1e-3);
        assert!(quad.corner(Corner::BottomRight).distance(&p(100.0, 100.0)) < 1e-3);
    }

    #[test]
    fn empty_mask_is_rejected() {
        let known = [Some(p(0.0, 0.0)), Some(p(1.0, 0.0)), Some(p(1.0, 1.0)), None];
        assert!(matches!(
            recover_missing_corner(&known, &[]),
            Err(CardOcrError::EmptyMask)
        ));
    }
}
