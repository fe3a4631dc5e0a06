use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// A 2D point. Which coordinate space it lives in is decided by the
/// [`Shape`](crate::shape::Shape) that owns it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: &Point) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// An axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub min: Point,
    pub max: Point,
}

impl BBox {
    pub fn new(min: Point, max: Point) -> Self {
        Self { min, max }
    }

    pub fn from_points(points: &[Point]) -> Option<Self> {
        if points.is_empty() {
            return None;
        }
        let mut min_x = f64::MAX;
        let mut min_y = f64::MAX;
        let mut max_x = f64::MIN;
        let mut max_y = f64::MIN;
        for p in points {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        Some(Self {
            min: Point::new(min_x, min_y),
            max: Point::new(max_x, max_y),
        })
    }

    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }

    pub fn contains_point(&self, p: &Point) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }

    pub fn intersects(&self, other: &BBox) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
    }
}

/// A rectangle given by its top-left corner and extent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Rectangle {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rectangle {
    /// Build a rectangle, rejecting non-finite numbers and negative extents.
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Result<Self, CoreError> {
        if ![x, y, width, height].iter().all(|v| v.is_finite()) {
            return Err(CoreError::InvalidGeometry(format!(
                "rectangle has non-finite component ({x}, {y}, {width}, {height})"
            )));
        }
        if width < 0.0 || height < 0.0 {
            return Err(CoreError::InvalidGeometry(format!(
                "rectangle has negative extent {width}x{height}"
            )));
        }
        Ok(Self {
            x,
            y,
            width,
            height,
        })
    }

    /// Build a rectangle spanning two arbitrary corners.
    pub fn from_corners(a: Point, b: Point) -> Result<Self, CoreError> {
        Self::new(
            a.x.min(b.x),
            a.y.min(b.y),
            (a.x - b.x).abs(),
            (a.y - b.y).abs(),
        )
    }

    pub fn top_left(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn bottom_right(&self) -> Point {
        Point::new(self.x + self.width, self.y + self.height)
    }

    pub fn bbox(&self) -> BBox {
        BBox::new(self.top_left(), self.bottom_right())
    }

    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    pub fn contains_point(&self, p: &Point) -> bool {
        self.bbox().contains_point(p)
    }
}

/// A closed polygon. Vertex order defines the boundary; convexity is not required.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Polygon {
    points: Vec<Point>,
}

impl Polygon {
    pub fn new(points: Vec<Point>) -> Result<Self, CoreError> {
        if points.len() < 3 {
            return Err(CoreError::InvalidGeometry(format!(
                "polygon needs at least 3 points, got {}",
                points.len()
            )));
        }
        if let Some(p) = points.iter().find(|p| !p.is_finite()) {
            return Err(CoreError::InvalidGeometry(format!(
                "polygon has non-finite vertex ({}, {})",
                p.x, p.y
            )));
        }
        Ok(Self { points })
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn bbox(&self) -> BBox {
        // Construction guarantees at least three vertices.
        BBox::from_points(&self.points).unwrap_or(BBox::new(self.points[0], self.points[0]))
    }

    pub fn vertex_count(&self) -> usize {
        self.points.len()
    }

    /// Shoelace area, always non-negative.
    pub fn area(&self) -> f64 {
        let n = self.points.len();
        let mut sum = 0.0;
        for i in 0..n {
            let a = &self.points[i];
            let b = &self.points[(i + 1) % n];
            sum += a.x * b.y - b.x * a.y;
        }
        sum.abs() / 2.0
    }

    /// Even-odd ray crossing. Points exactly on an edge may land either way,
    /// but always the same way for the same input.
    pub fn contains_point(&self, p: &Point) -> bool {
        let n = self.points.len();
        let mut inside = false;
        let mut j = n - 1;
        for i in 0..n {
            let vi = &self.points[i];
            let vj = &self.points[j];
            if ((vi.y > p.y) != (vj.y > p.y))
                && (p.x < (vj.x - vi.x) * (p.y - vi.y) / (vj.y - vi.y) + vi.x)
            {
                inside = !inside;
            }
            j = i;
        }
        inside
    }
}

/// The geometry of a shape: the unit-agnostic tagged union.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Geometry {
    Rectangle(Rectangle),
    Polygon(Polygon),
}

/// Shape type discriminant, spelled the way hosts spell it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShapeType {
    #[serde(rename = "rect")]
    Rect,
    #[serde(rename = "polygon")]
    Polygon,
}

impl ShapeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShapeType::Rect => "rect",
            ShapeType::Polygon => "polygon",
        }
    }
}

impl Geometry {
    pub fn shape_type(&self) -> ShapeType {
        match self {
            Geometry::Rectangle(_) => ShapeType::Rect,
            Geometry::Polygon(_) => ShapeType::Polygon,
        }
    }

    pub fn bounds(&self) -> BBox {
        match self {
            Geometry::Rectangle(r) => r.bbox(),
            Geometry::Polygon(p) => p.bbox(),
        }
    }

    pub fn area(&self) -> f64 {
        match self {
            Geometry::Rectangle(r) => r.area(),
            Geometry::Polygon(p) => p.area(),
        }
    }

    pub fn contains(&self, p: &Point) -> bool {
        match self {
            Geometry::Rectangle(r) => r.contains_point(p),
            Geometry::Polygon(poly) => poly.contains_point(p),
        }
    }

    /// Apply `f` to every coordinate. A rectangle maps its two corners and is
    /// rebuilt from them, so a mirroring `f` still yields a valid rectangle.
    pub fn transform<F>(&self, f: F) -> Result<Geometry, CoreError>
    where
        F: Fn(Point) -> Point,
    {
        match self {
            Geometry::Rectangle(r) => {
                let a = f(r.top_left());
                let b = f(r.bottom_right());
                Ok(Geometry::Rectangle(Rectangle::from_corners(a, b)?))
            }
            Geometry::Polygon(poly) => Ok(Geometry::Polygon(Polygon::new(
                poly.points.iter().map(|p| f(*p)).collect(),
            )?)),
        }
    }

    /// Hash the geometry content. Equal geometry always hashes equal; the
    /// unit tag is mixed in by [`Shape::identity_key`](crate::shape::Shape::identity_key).
    pub(crate) fn hash_content<H: Hasher>(&self, state: &mut H) {
        self.shape_type().hash(state);
        match self {
            Geometry::Rectangle(r) => {
                for v in [r.x, r.y, r.width, r.height] {
                    canonical_bits(v).hash(state);
                }
            }
            Geometry::Polygon(poly) => {
                poly.points.len().hash(state);
                for p in &poly.points {
                    canonical_bits(p.x).hash(state);
                    canonical_bits(p.y).hash(state);
                }
            }
        }
    }

    pub fn content_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.hash_content(&mut hasher);
        hasher.finish()
    }
}

/// `-0.0` and `0.0` compare equal, so they must hash equal too.
fn canonical_bits(v: f64) -> u64 {
    if v == 0.0 {
        0.0f64.to_bits()
    } else {
        v.to_bits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_square() -> Polygon {
        Polygon::new(vec![
            Point::new(0.0, 0.0),
            Point::new(1.0, 0.0),
            Point::new(1.0, 1.0),
            Point::new(0.0, 1.0),
        ])
        .unwrap()
    }

    #[test]
    fn test_rect_contains_is_closed_range() {
        let r = Rectangle::new(10.0, 20.0, 30.0, 40.0).unwrap();
        assert!(r.contains_point(&Point::new(10.0, 20.0)));
        assert!(r.contains_point(&Point::new(40.0, 60.0)));
        assert!(r.contains_point(&Point::new(25.0, 30.0)));
        assert!(!r.contains_point(&Point::new(9.999, 30.0)));
        assert!(!r.contains_point(&Point::new(25.0, 60.001)));
    }

    #[test]
    fn test_polygon_contains_unit_square() {
        let sq = unit_square();
        assert!(sq.contains_point(&Point::new(0.5, 0.5)));
        assert!(!sq.contains_point(&Point::new(2.0, 2.0)));
        assert!(!sq.contains_point(&Point::new(-0.1, 0.5)));
    }

    #[test]
    fn test_polygon_contains_concave() {
        // An L shape; the notch at the top right is outside.
        let l = Polygon::new(vec![
            Point::new(0.0, 0.0),
            Point::new(2.0, 0.0),
            Point::new(2.0, 1.0),
            Point::new(1.0, 1.0),
            Point::new(1.0, 2.0),
            Point::new(0.0, 2.0),
        ])
        .unwrap();
        assert!(l.contains_point(&Point::new(0.5, 1.5)));
        assert!(l.contains_point(&Point::new(1.5, 0.5)));
        assert!(!l.contains_point(&Point::new(1.5, 1.5)));
    }

    #[test]
    fn test_polygon_rejects_too_few_points() {
        let err = Polygon::new(vec![Point::new(0.0, 0.0), Point::new(1.0, 1.0)]).unwrap_err();
        assert!(matches!(err, CoreError::InvalidGeometry(_)));
    }

    #[test]
    fn test_non_finite_rejected() {
        assert!(Rectangle::new(f64::NAN, 0.0, 1.0, 1.0).is_err());
        assert!(Rectangle::new(0.0, 0.0, f64::INFINITY, 1.0).is_err());
        assert!(Polygon::new(vec![
            Point::new(0.0, 0.0),
            Point::new(1.0, f64::NAN),
            Point::new(0.0, 1.0),
        ])
        .is_err());
    }

    #[test]
    fn test_polygon_bounds_and_area() {
        let tri = Polygon::new(vec![
            Point::new(0.0, 0.0),
            Point::new(4.0, 0.0),
            Point::new(0.0, 3.0),
        ])
        .unwrap();
        let bb = tri.bbox();
        assert!((bb.max.x - 4.0).abs() < 1e-10);
        assert!((bb.max.y - 3.0).abs() < 1e-10);
        assert!((tri.area() - 6.0).abs() < 1e-10);
    }

    #[test]
    fn test_transform_rebuilds_rect_from_corners() {
        let g = Geometry::Rectangle(Rectangle::new(1.0, 1.0, 2.0, 3.0).unwrap());
        // Mirror across the y axis: corners swap sides.
        let mirrored = g.transform(|p| Point::new(-p.x, p.y)).unwrap();
        match mirrored {
            Geometry::Rectangle(r) => {
                assert!((r.x + 3.0).abs() < 1e-10);
                assert!((r.width - 2.0).abs() < 1e-10);
                assert!((r.height - 3.0).abs() < 1e-10);
            }
            other => panic!("expected rectangle, got {other:?}"),
        }
    }

    #[test]
    fn test_content_hash_distinguishes_type_and_values() {
        let rect = Geometry::Rectangle(Rectangle::new(0.0, 0.0, 1.0, 1.0).unwrap());
        let same = Geometry::Rectangle(Rectangle::new(0.0, 0.0, 1.0, 1.0).unwrap());
        let moved = Geometry::Rectangle(Rectangle::new(0.0, 0.1, 1.0, 1.0).unwrap());
        let poly = Geometry::Polygon(unit_square());
        assert_eq!(rect.content_hash(), same.content_hash());
        assert_ne!(rect.content_hash(), moved.content_hash());
        assert_ne!(rect.content_hash(), poly.content_hash());
    }

    #[test]
    fn test_bbox_intersection() {
        let a = BBox::new(Point::new(0.0, 0.0), Point::new(10.0, 10.0));
        let b = BBox::new(Point::new(5.0, 5.0), Point::new(15.0, 15.0));
        let c = BBox::new(Point::new(20.0, 20.0), Point::new(30.0, 30.0));
        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));
    }
}
