//! Planar geometry for detection postprocessing: convex hulls, minimum-area
//! rectangles and polygon offsetting.

/// A point with floating-point coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    #[inline]
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    fn sub(self, other: Point) -> Point {
        Point::new(self.x - other.x, self.y - other.y)
    }

    fn norm(self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }
}

fn cross(o: Point, a: Point, b: Point) -> f32 {
    (a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x)
}

/// Convex hull in counter-clockwise order (monotone chain).
///
/// Collinear points are dropped. Fewer than three distinct input points yield
/// the distinct points themselves.
pub fn convex_hull(points: &[Point]) -> Vec<Point> {
    let mut sorted = points.to_vec();
    sorted.sort_by(|a, b| a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y)));
    sorted.dedup();
    if sorted.len() < 3 {
        return sorted;
    }

    let mut hull: Vec<Point> = Vec::with_capacity(sorted.len() * 2);
    for &p in &sorted {
        while hull.len() >= 2 && cross(hull[hull.len() - 2], hull[hull.len() - 1], p) <= 0.0 {
            hull.pop();
        }
        hull.push(p);
    }
    let lower_len = hull.len() + 1;
    for &p in sorted.iter().rev().skip(1) {
        while hull.len() >= lower_len && cross(hull[hull.len() - 2], hull[hull.len() - 1], p) <= 0.0
        {
            hull.pop();
        }
        hull.push(p);
    }
    hull.pop();
    hull
}

/// Shoelace area of a simple polygon (always non-negative).
pub fn polygon_area(points: &[Point]) -> f32 {
    signed_area(points).abs()
}

fn signed_area(points: &[Point]) -> f32 {
    let n = points.len();
    if n < 3 {
        return 0.0;
    }
    let twice: f32 = (0..n)
        .map(|i| {
            let (a, b) = (points[i], points[(i + 1) % n]);
            a.x * b.y - b.x * a.y
        })
        .sum();
    twice / 2.0
}

/// Length of the closed polygon outline.
pub fn polygon_perimeter(points: &[Point]) -> f32 {
    let n = points.len();
    (0..n)
        .map(|i| points[(i + 1) % n].sub(points[i]).norm())
        .sum()
}

/// A rotated rectangle given by its center, side lengths and the unit
/// direction of its `width` side.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotatedRect {
    pub center: Point,
    pub width: f32,
    pub height: f32,
    /// Unit vector along the width side.
    pub axis: Point,
}

impl RotatedRect {
    pub fn longer_side(&self) -> f32 {
        self.width.max(self.height)
    }

    pub fn area(&self) -> f32 {
        self.width * self.height
    }

    /// Corners in order around the rectangle.
    pub fn points(&self) -> [Point; 4] {
        let (ux, uy) = (self.axis.x * self.width / 2.0, self.axis.y * self.width / 2.0);
        let (vx, vy) = (-self.axis.y * self.height / 2.0, self.axis.x * self.height / 2.0);
        let c = self.center;
        [
            Point::new(c.x - ux - vx, c.y - uy - vy),
            Point::new(c.x + ux - vx, c.y + uy - vy),
            Point::new(c.x + ux + vx, c.y + uy + vy),
            Point::new(c.x - ux + vx, c.y - uy + vy),
        ]
    }
}

/// Minimum-area enclosing rectangle, by rotating calipers over the hull edges.
///
/// Returns `None` when the points have no area (fewer than three
/// non-collinear points).
pub fn min_area_rect(points: &[Point]) -> Option<RotatedRect> {
    let hull = convex_hull(points);
    if hull.len() < 3 {
        return None;
    }

    let n = hull.len();
    let mut best: Option<(f32, RotatedRect)> = None;
    for i in 0..n {
        let origin = hull[i];
        let edge = hull[(i + 1) % n].sub(origin);
        let len = edge.norm();
        if len < f32::EPSILON {
            continue;
        }
        let axis = Point::new(edge.x / len, edge.y / len);
        let normal = Point::new(-axis.y, axis.x);

        let (mut min_u, mut max_u) = (f32::MAX, f32::MIN);
        let (mut min_v, mut max_v) = (f32::MAX, f32::MIN);
        for p in &hull {
            let d = p.sub(origin);
            let u = d.x * axis.x + d.y * axis.y;
            let v = d.x * normal.x + d.y * normal.y;
            min_u = min_u.min(u);
            max_u = max_u.max(u);
            min_v = min_v.min(v);
            max_v = max_v.max(v);
        }

        let (width, height) = (max_u - min_u, max_v - min_v);
        let area = width * height;
        if best.map_or(true, |(best_area, _)| area < best_area) {
            let cu = (min_u + max_u) / 2.0;
            let cv = (min_v + max_v) / 2.0;
            let center = Point::new(
                origin.x + cu * axis.x + cv * normal.x,
                origin.y + cu * axis.y + cv * normal.y,
            );
            best = Some((
                area,
                RotatedRect {
                    center,
                    width,
                    height,
                    axis,
                },
            ));
        }
    }
    best.map(|(_, rect)| rect)
}

/// Offset a convex polygon outward by `distance`.
///
/// Each edge is moved along its outward normal and consecutive moved edges
/// are intersected to give the new corners. Parallel neighbours (which only
/// occur with duplicate points) keep the moved endpoint.
pub fn offset_convex_polygon(points: &[Point], distance: f32) -> Vec<Point> {
    let n = points.len();
    if n < 3 {
        return points.to_vec();
    }
    // For counter-clockwise winding (positive signed area in y-down space
    // this is clockwise on screen) the outward normal is (dy, -dx).
    let orientation = if signed_area(points) >= 0.0 { 1.0 } else { -1.0 };

    let shifted: Vec<(Point, Point)> = (0..n)
        .map(|i| {
            let (a, b) = (points[i], points[(i + 1) % n]);
            let d = b.sub(a);
            let len = d.norm();
            let normal = if len > 0.0 {
                Point::new(orientation * d.y / len, -orientation * d.x / len)
            } else {
                Point::new(0.0, 0.0)
            };
            let offset = Point::new(normal.x * distance, normal.y * distance);
            (
                Point::new(a.x + offset.x, a.y + offset.y),
                Point::new(b.x + offset.x, b.y + offset.y),
            )
        })
        .collect();

    (0..n)
        .map(|i| {
            let prev = shifted[(i + n - 1) % n];
            let next = shifted[i];
            line_intersection(prev, next).unwrap_or(next.0)
        })
        .collect()
}

fn line_intersection(l1: (Point, Point), l2: (Point, Point)) -> Option<Point> {
    let d1 = l1.1.sub(l1.0);
    let d2 = l2.1.sub(l2.0);
    let denom = d1.x * d2.y - d1.y * d2.x;
    if denom.abs() < 1e-6 {
        return None;
    }
    let w = l2.0.sub(l1.0);
    let t = (w.x * d2.y - w.y * d2.x) / denom;
    Some(Point::new(l1.0.x + t * d1.x, l1.0.y + t * d1.y))
}

/// Expand a fitted rectangle to undo the detector's learned shrinkage.
///
/// The offset distance is `area * ratio / perimeter` of the rectangle's own
/// corners. Returns the expanded corners and the rectangle fitted to them.
pub fn unclip(rect: &RotatedRect, ratio: f32) -> Option<([Point; 4], RotatedRect)> {
    let corners = rect.points();
    let perimeter = polygon_perimeter(&corners);
    if perimeter <= 0.0 {
        return None;
    }
    let distance = polygon_area(&corners) * ratio / perimeter;
    let expanded = offset_convex_polygon(&corners, distance);
    let fitted = min_area_rect(&expanded)?;
    let mut out = [Point::new(0.0, 0.0); 4];
    out.copy_from_slice(&expanded[..4]);
    Some((out, fitted))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-3
    }

    fn rect_points(x0: f32, y0: f32, x1: f32, y1: f32) -> Vec<Point> {
        vec![
            Point::new(x0, y0),
            Point::new(x1, y0),
            Point::new(x1, y1),
            Point::new(x0, y1),
        ]
    }

    #[test]
    fn test_convex_hull_drops_interior_and_collinear_points() {
        let mut points = rect_points(0.0, 0.0, 4.0, 2.0);
        points.push(Point::new(2.0, 1.0));
        points.push(Point::new(2.0, 0.0));
        let hull = convex_hull(&points);
        assert_eq!(hull.len(), 4);
        assert!(approx(polygon_area(&hull), 8.0));
    }

    #[test]
    fn test_convex_hull_degenerate() {
        let points = vec![Point::new(0.0, 0.0), Point::new(1.0, 0.0), Point::new(0.0, 0.0)];
        assert_eq!(convex_hull(&points).len(), 2);
    }

    #[test]
    fn test_area_and_perimeter() {
        let points = rect_points(0.0, 0.0, 3.0, 2.0);
        assert!(approx(polygon_area(&points), 6.0));
        assert!(approx(polygon_perimeter(&points), 10.0));
    }

    #[test]
    fn test_min_area_rect_axis_aligned() {
        let rect = min_area_rect(&rect_points(10.0, 20.0, 50.0, 30.0)).unwrap();
        assert!(approx(rect.center.x, 30.0));
        assert!(approx(rect.center.y, 25.0));
        assert!(approx(rect.area(), 400.0));
        assert!(approx(rect.longer_side(), 40.0));
    }

    #[test]
    fn test_min_area_rect_rotated() {
        // A 10x2 rectangle rotated 45 degrees around the origin.
        let s = std::f32::consts::FRAC_1_SQRT_2;
        let corners: Vec<Point> = [(-5.0, -1.0), (5.0, -1.0), (5.0, 1.0), (-5.0, 1.0)]
            .iter()
            .map(|&(x, y)| Point::new(x * s - y * s, x * s + y * s))
            .collect();
        let rect = min_area_rect(&corners).unwrap();
        assert!(approx(rect.area(), 20.0));
        assert!(approx(rect.longer_side(), 10.0));
    }

    #[test]
    fn test_min_area_rect_collinear_is_none() {
        let points = vec![Point::new(0.0, 0.0), Point::new(5.0, 0.0), Point::new(9.0, 0.0)];
        assert!(min_area_rect(&points).is_none());
    }

    #[test]
    fn test_rect_points_round_trip() {
        let rect = min_area_rect(&rect_points(0.0, 0.0, 8.0, 4.0)).unwrap();
        let again = min_area_rect(&rect.points()).unwrap();
        assert!(approx(again.area(), 32.0));
    }

    #[test]
    fn test_offset_polygon_grows_each_side() {
        for points in [
            rect_points(0.0, 0.0, 10.0, 4.0),
            rect_points(0.0, 0.0, 10.0, 4.0).into_iter().rev().collect(),
        ] {
            let grown = offset_convex_polygon(&points, 1.0);
            let xs: Vec<f32> = grown.iter().map(|p| p.x).collect();
            let ys: Vec<f32> = grown.iter().map(|p| p.y).collect();
            assert!(approx(xs.iter().cloned().fold(f32::MAX, f32::min), -1.0));
            assert!(approx(xs.iter().cloned().fold(f32::MIN, f32::max), 11.0));
            assert!(approx(ys.iter().cloned().fold(f32::MAX, f32::min), -1.0));
            assert!(approx(ys.iter().cloned().fold(f32::MIN, f32::max), 5.0));
        }
    }

    #[test]
    fn test_unclip_distance() {
        // 40x20: area 800, perimeter 120, distance 800 * 1.5 / 120 = 10.
        let rect = min_area_rect(&rect_points(0.0, 0.0, 40.0, 20.0)).unwrap();
        let (_, expanded) = unclip(&rect, 1.5).unwrap();
        assert!(approx(expanded.longer_side(), 60.0));
        assert!(approx(expanded.width.min(expanded.height), 40.0));
        assert!(approx(expanded.center.x, 20.0));
        assert!(approx(expanded.center.y, 10.0));
    }
}
