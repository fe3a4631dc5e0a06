//! Unit-typed shapes.
//!
//! A shape's numbers only mean something relative to its coordinate space.
//! The space is carried in the type: [`NormalizedShape`] lives in the
//! resize-independent `[0,1]` fraction space used for storage, and
//! [`DeviceShape`] lives in on-screen pixels for the current layout. The only
//! way between the two is [`CoordinateTransformer`](crate::transform::CoordinateTransformer).

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::geometry::{BBox, Geometry, Point, Polygon, Rectangle, ShapeType};
use crate::style::StyleSet;

/// Runtime tag for the coordinate space of a shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnitKind {
    #[serde(rename = "fraction")]
    Fraction,
    #[serde(rename = "pixel")]
    Pixel,
}

mod sealed {
    pub trait Sealed {}
    impl Sealed for super::Fraction {}
    impl Sealed for super::Pixel {}
}

/// Compile-time coordinate space marker.
pub trait Unit: sealed::Sealed + fmt::Debug + Clone + Copy + PartialEq + 'static {
    const KIND: UnitKind;
}

/// Image-relative coordinates in `[0,1]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fraction;

/// On-screen device pixels, valid for the current layout only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pixel;

impl Unit for Fraction {
    const KIND: UnitKind = UnitKind::Fraction;
}

impl Unit for Pixel {
    const KIND: UnitKind = UnitKind::Pixel;
}

/// Stable content key used to find a shape's cached render state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShapeKey(pub u64);

impl fmt::Display for ShapeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// A rectangle or polygon in the coordinate space `U`, with an optional
/// style set of its own.
#[derive(Debug, Clone, PartialEq)]
pub struct Shape<U: Unit> {
    geometry: Geometry,
    style: Option<StyleSet>,
    unit: PhantomData<U>,
}

pub type NormalizedShape = Shape<Fraction>;
pub type DeviceShape = Shape<Pixel>;

impl<U: Unit> Shape<U> {
    pub fn new(geometry: Geometry) -> Self {
        Self {
            geometry,
            style: None,
            unit: PhantomData,
        }
    }

    pub fn rectangle(x: f64, y: f64, width: f64, height: f64) -> Result<Self, CoreError> {
        Ok(Self::new(Geometry::Rectangle(Rectangle::new(
            x, y, width, height,
        )?)))
    }

    pub fn polygon(points: Vec<Point>) -> Result<Self, CoreError> {
        Ok(Self::new(Geometry::Polygon(Polygon::new(points)?)))
    }

    pub fn with_style(mut self, style: StyleSet) -> Self {
        self.style = Some(style);
        self
    }

    pub fn set_style(&mut self, style: Option<StyleSet>) {
        self.style = style;
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    pub fn style(&self) -> Option<&StyleSet> {
        self.style.as_ref()
    }

    pub fn shape_type(&self) -> ShapeType {
        self.geometry.shape_type()
    }

    pub fn unit(&self) -> UnitKind {
        U::KIND
    }

    pub fn bounds(&self) -> BBox {
        self.geometry.bounds()
    }

    pub fn area(&self) -> f64 {
        self.geometry.area()
    }

    /// `point` must be expressed in the same space as the shape.
    pub fn contains(&self, point: &Point) -> bool {
        self.geometry.contains(point)
    }

    /// Deterministic over shape type, unit and numeric fields. Style is not
    /// part of identity.
    pub fn identity_key(&self) -> ShapeKey {
        let mut hasher = DefaultHasher::new();
        U::KIND.hash(&mut hasher);
        self.geometry.hash_content(&mut hasher);
        ShapeKey(hasher.finish())
    }

    /// Map every coordinate through `f`. The caller names the resulting
    /// space through `V`; the style set is carried over unchanged.
    pub fn map_points<V, F>(&self, f: F) -> Result<Shape<V>, CoreError>
    where
        V: Unit,
        F: Fn(Point) -> Point,
    {
        Ok(Shape {
            geometry: self.geometry.transform(f)?,
            style: self.style.clone(),
            unit: PhantomData,
        })
    }
}
