use crate::error::Error;
use anyhow::Result;
use serde::{Deserialize, Serialize};

/// A point in normalized frame coordinates ([0,1] on both axes).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// An axis-aligned detection bounding box in normalized frame coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x_min: f64,
    pub y_min: f64,
    pub x_max: f64,
    pub y_max: f64,
}

impl BoundingBox {
    pub fn new(x_min: f64, y_min: f64, x_max: f64, y_max: f64) -> Self {
        Self {
            x_min,
            y_min,
            x_max,
            y_max,
        }
    }

    pub fn area(&self) -> f64 {
        let w = (self.x_max - self.x_min).max(0.0);
        let h = (self.y_max - self.y_min).max(0.0);
        w * h
    }

    /// Anchor point used for track trajectories.
    pub fn anchor(&self) -> Point {
        Point::new(
            (self.x_min + self.x_max) / 2.0,
            (self.y_min + self.y_max) / 2.0,
        )
    }

    fn corners(&self) -> Vec<Point> {
        vec![
            Point::new(self.x_min, self.y_min),
            Point::new(self.x_max, self.y_min),
            Point::new(self.x_max, self.y_max),
            Point::new(self.x_min, self.y_max),
        ]
    }
}

/// Which side-transition of a directed line counts as a crossing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineDirection {
    Left,
    Right,
}

/// Spatial predicate applied to detections. `All` matches everything (an
/// empty region of interest means the whole frame).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RegionFilter {
    All,
    Rect {
        coord_min: Point,
        coord_max: Point,
        intersection_ratio_threshold: f64,
    },
    Polygon {
        points: Vec<Point>,
        intersection_ratio_threshold: f64,
    },
    LineCrossing {
        a: Point,
        b: Point,
        direction: LineDirection,
    },
}

impl RegionFilter {
    pub fn rect(coord_min: Point, coord_max: Point, intersection_ratio_threshold: f64) -> Self {
        RegionFilter::Rect {
            coord_min,
            coord_max,
            intersection_ratio_threshold,
        }
    }

    /// A polygon region must have at least 3 points; fewer is rejected at
    /// query time rather than silently matching nothing.
    pub fn polygon(points: Vec<Point>, intersection_ratio_threshold: f64) -> Result<Self> {
        if points.len() < 3 {
            return Err(Error::InvalidGeometry(format!(
                "polygon requires at least 3 points, got {}",
                points.len()
            ))
            .into());
        }
        Ok(RegionFilter::Polygon {
            points,
            intersection_ratio_threshold,
        })
    }

    pub fn line_crossing(a: Point, b: Point, direction: LineDirection) -> Self {
        RegionFilter::LineCrossing { a, b, direction }
    }

    /// Evaluate the predicate for one detection. `prior_anchor` is the
    /// detection's bounding-box anchor 5 samples earlier in the same track;
    /// `None` means the track has no such history yet, so a line-crossing
    /// filter never matches (cold start).
    pub fn matches(&self, bbox: &BoundingBox, prior_anchor: Option<Point>) -> bool {
        match self {
            RegionFilter::All => true,
            RegionFilter::Rect {
                coord_min,
                coord_max,
                intersection_ratio_threshold,
            } => rect_intersection_ratio(bbox, *coord_min, *coord_max) > *intersection_ratio_threshold,
            RegionFilter::Polygon {
                points,
                intersection_ratio_threshold,
            } => polygon_intersection_ratio(bbox, points) > *intersection_ratio_threshold,
            RegionFilter::LineCrossing { a, b, direction } => match prior_anchor {
                Some(prev) => crossed_line(prev, bbox.anchor(), *a, *b, *direction),
                None => false,
            },
        }
    }
}

/// Intersection-over-box-area against an axis-aligned rectangle. A zero-area
/// box yields 0 (never matches) instead of dividing by zero.
pub fn rect_intersection_ratio(bbox: &BoundingBox, coord_min: Point, coord_max: Point) -> f64 {
    let box_area = bbox.area();
    if box_area <= 0.0 {
        return 0.0;
    }
    let w = (bbox.x_max.min(coord_max.x) - bbox.x_min.max(coord_min.x)).max(0.0);
    let h = (bbox.y_max.min(coord_max.y) - bbox.y_min.max(coord_min.y)).max(0.0);
    (w * h) / box_area
}

/// Intersection-over-box-area against a convex polygon, via
/// Sutherland-Hodgman clipping of the box by the polygon.
pub fn polygon_intersection_ratio(bbox: &BoundingBox, polygon: &[Point]) -> f64 {
    let box_area = bbox.area();
    if box_area <= 0.0 || polygon.len() < 3 {
        return 0.0;
    }

    let mut clip = polygon.to_vec();
    if signed_area(&clip) < 0.0 {
        clip.reverse();
    }

    let mut subject = bbox.corners();
    for i in 0..clip.len() {
        let edge_start = clip[i];
        let edge_end = clip[(i + 1) % clip.len()];
        subject = clip_by_edge(&subject, edge_start, edge_end);
        if subject.is_empty() {
            return 0.0;
        }
    }

    signed_area(&subject).abs() / box_area
}

fn signed_area(polygon: &[Point]) -> f64 {
    let mut sum = 0.0;
    for i in 0..polygon.len() {
        let p = polygon[i];
        let q = polygon[(i + 1) % polygon.len()];
        sum += p.x * q.y - q.x * p.y;
    }
    sum / 2.0
}

fn cross(a: Point, b: Point, p: Point) -> f64 {
    (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x)
}

fn clip_by_edge(subject: &[Point], edge_start: Point, edge_end: Point) -> Vec<Point> {
    let mut output = Vec::with_capacity(subject.len() + 1);
    for i in 0..subject.len() {
        let current = subject[i];
        let previous = subject[(i + subject.len() - 1) % subject.len()];
        let current_inside = cross(edge_start, edge_end, current) >= 0.0;
        let previous_inside = cross(edge_start, edge_end, previous) >= 0.0;

        if current_inside {
            if !previous_inside {
                if let Some(p) = line_intersection(previous, current, edge_start, edge_end) {
                    output.push(p);
                }
            }
            output.push(current);
        } else if previous_inside {
            if let Some(p) = line_intersection(previous, current, edge_start, edge_end) {
                output.push(p);
            }
        }
    }
    output
}

fn line_intersection(p1: Point, p2: Point, q1: Point, q2: Point) -> Option<Point> {
    let d1 = Point::new(p2.x - p1.x, p2.y - p1.y);
    let d2 = Point::new(q2.x - q1.x, q2.y - q1.y);
    let denom = d1.x * d2.y - d1.y * d2.x;
    if denom.abs() < f64::EPSILON {
        return None;
    }
    let t = ((q1.x - p1.x) * d2.y - (q1.y - p1.y) * d2.x) / denom;
    Some(Point::new(p1.x + t * d1.x, p1.y + t * d1.y))
}

fn on_segment(a: Point, b: Point, p: Point) -> bool {
    p.x >= a.x.min(b.x) && p.x <= a.x.max(b.x) && p.y >= a.y.min(b.y) && p.y <= a.y.max(b.y)
}

/// Whether segments [p1,p2] and [q1,q2] intersect.
pub fn segments_intersect(p1: Point, p2: Point, q1: Point, q2: Point) -> bool {
    let o1 = cross(p1, p2, q1);
    let o2 = cross(p1, p2, q2);
    let o3 = cross(q1, q2, p1);
    let o4 = cross(q1, q2, p2);

    if ((o1 > 0.0 && o2 < 0.0) || (o1 < 0.0 && o2 > 0.0))
        && ((o3 > 0.0 && o4 < 0.0) || (o3 < 0.0 && o4 > 0.0))
    {
        return true;
    }

    (o1 == 0.0 && on_segment(p1, p2, q1))
        || (o2 == 0.0 && on_segment(p1, p2, q2))
        || (o3 == 0.0 && on_segment(q1, q2, p1))
        || (o4 == 0.0 && on_segment(q1, q2, p2))
}

/// A crossing of the directed line a->b is detected when the anchor moved
/// from one side to the other across the segment, ending on the configured
/// side.
pub fn crossed_line(prev: Point, current: Point, a: Point, b: Point, direction: LineDirection) -> bool {
    if !segments_intersect(prev, current, a, b) {
        return false;
    }
    let prev_side = cross(a, b, prev);
    let current_side = cross(a, b, current);
    if prev_side * current_side >= 0.0 {
        // touched the line without a strict side change
        return false;
    }
    match direction {
        LineDirection::Left => current_side > 0.0,
        LineDirection::Right => current_side < 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_box() -> BoundingBox {
        BoundingBox::new(0.2, 0.2, 0.4, 0.4)
    }

    #[test]
    fn rect_ratio_full_containment() {
        let ratio = rect_intersection_ratio(&unit_box(), Point::new(0.0, 0.0), Point::new(1.0, 1.0));
        assert!((ratio - 1.0).abs() < 1e-9);
    }

    #[test]
    fn rect_ratio_half_overlap() {
        // rectangle covers the left half of the box
        let ratio = rect_intersection_ratio(&unit_box(), Point::new(0.0, 0.0), Point::new(0.3, 1.0));
        assert!((ratio - 0.5).abs() < 1e-9);
    }

    #[test]
    fn rect_ratio_disjoint() {
        let ratio = rect_intersection_ratio(&unit_box(), Point::new(0.8, 0.8), Point::new(0.9, 0.9));
        assert_eq!(ratio, 0.0);
    }

    #[test]
    fn zero_area_box_never_matches() {
        let degenerate = BoundingBox::new(0.5, 0.5, 0.5, 0.9);
        let ratio =
            rect_intersection_ratio(&degenerate, Point::new(0.0, 0.0), Point::new(1.0, 1.0));
        assert_eq!(ratio, 0.0);
        let filter = RegionFilter::rect(Point::new(0.0, 0.0), Point::new(1.0, 1.0), 0.0);
        assert!(!filter.matches(&degenerate, None));
    }

    #[test]
    fn polygon_ratio_triangle() {
        // triangle covering the lower-left half of the frame, split along the
        // box diagonal: half the box area lies inside
        let polygon = vec![
            Point::new(0.0, 0.0),
            Point::new(1.0, 0.0),
            Point::new(0.0, 1.0),
        ];
        let bbox = BoundingBox::new(0.4, 0.4, 0.6, 0.6);
        let ratio = polygon_intersection_ratio(&bbox, &polygon);
        assert!((ratio - 0.5).abs() < 1e-9);
    }

    #[test]
    fn polygon_winding_does_not_matter() {
        let ccw = vec![
            Point::new(0.0, 0.0),
            Point::new(1.0, 0.0),
            Point::new(1.0, 1.0),
            Point::new(0.0, 1.0),
        ];
        let cw: Vec<Point> = ccw.iter().rev().copied().collect();
        let bbox = unit_box();
        assert_eq!(
            polygon_intersection_ratio(&bbox, &ccw),
            polygon_intersection_ratio(&bbox, &cw)
        );
    }

    #[test]
    fn degenerate_polygon_rejected() {
        let result = RegionFilter::polygon(vec![Point::new(0.0, 0.0), Point::new(1.0, 1.0)], 0.0);
        assert!(result.is_err());
    }

    #[test]
    fn line_crossing_cold_start_never_matches() {
        let filter = RegionFilter::line_crossing(
            Point::new(0.5, 0.0),
            Point::new(0.5, 1.0),
            LineDirection::Right,
        );
        let bbox = BoundingBox::new(0.6, 0.4, 0.8, 0.6);
        assert!(!filter.matches(&bbox, None));
    }

    #[test]
    fn line_crossing_directional() {
        // vertical line x=0.5 directed upward: right side is x > 0.5
        let a = Point::new(0.5, 0.0);
        let b = Point::new(0.5, 1.0);
        let left = Point::new(0.3, 0.5);
        let right = Point::new(0.7, 0.5);

        assert!(crossed_line(left, right, a, b, LineDirection::Right));
        assert!(!crossed_line(left, right, a, b, LineDirection::Left));
        assert!(crossed_line(right, left, a, b, LineDirection::Left));
        assert!(!crossed_line(right, left, a, b, LineDirection::Right));
    }

    #[test]
    fn movement_on_one_side_is_not_a_crossing() {
        let a = Point::new(0.5, 0.0);
        let b = Point::new(0.5, 1.0);
        assert!(!crossed_line(
            Point::new(0.6, 0.2),
            Point::new(0.9, 0.8),
            a,
            b,
            LineDirection::Right
        ));
    }
}
