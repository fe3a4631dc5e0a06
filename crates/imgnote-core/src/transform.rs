use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::geometry::Point;
use crate::shape::{DeviceShape, NormalizedShape};

/// Rendered size of an image in device pixels. Origin is the image's top-left.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImageSize {
    pub width: f64,
    pub height: f64,
}

impl ImageSize {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// False until the image has been loaded and laid out.
    pub fn is_ready(&self) -> bool {
        self.width > 0.0 && self.height > 0.0 && self.width.is_finite() && self.height.is_finite()
    }

    fn ensure_ready(&self) -> Result<(), CoreError> {
        if self.is_ready() {
            Ok(())
        } else {
            Err(CoreError::NotReady {
                width: self.width,
                height: self.height,
            })
        }
    }
}

/// Pixel point to fraction point: `x / width`, `y / height`.
pub fn to_fraction(pixel: Point, size: ImageSize) -> Result<Point, CoreError> {
    size.ensure_ready()?;
    Ok(Point::new(pixel.x / size.width, pixel.y / size.height))
}

/// Fraction point to pixel point; inverse of [`to_fraction`].
pub fn to_pixel(fraction: Point, size: ImageSize) -> Result<Point, CoreError> {
    size.ensure_ready()?;
    Ok(Point::new(fraction.x * size.width, fraction.y * size.height))
}

/// The bridge between [`NormalizedShape`] and [`DeviceShape`] for one image
/// layout. Construction fails with `NotReady` for a zero-sized image, so every
/// transformer in existence has a usable size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinateTransformer {
    size: ImageSize,
}

impl CoordinateTransformer {
    pub fn new(size: ImageSize) -> Result<Self, CoreError> {
        size.ensure_ready()?;
        Ok(Self { size })
    }

    pub fn size(&self) -> ImageSize {
        self.size
    }

    pub fn to_fraction(&self, pixel: Point) -> Point {
        Point::new(pixel.x / self.size.width, pixel.y / self.size.height)
    }

    pub fn to_pixel(&self, fraction: Point) -> Point {
        Point::new(fraction.x * self.size.width, fraction.y * self.size.height)
    }

    pub fn normalize(&self, shape: &DeviceShape) -> Result<NormalizedShape, CoreError> {
        shape.map_points(|p| self.to_fraction(p))
    }

    pub fn to_device(&self, shape: &NormalizedShape) -> Result<DeviceShape, CoreError> {
        shape.map_points(|p| self.to_pixel(p))
    }
}
