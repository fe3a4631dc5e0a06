//! The JSON shape exchanged with hosts.
//!
//! ```json
//! {"type": "rect", "geometry": {"x": 0.1, "y": 0.2, "width": 0.3, "height": 0.4}, "units": "fraction"}
//! {"type": "polygon", "geometry": {"points": [{"x": 0.1, "y": 0.1}, ...]}, "units": "fraction"}
//! ```
//!
//! Field names and order are fixed; other adapters parse this exact form.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use imgnote_core::{
    Annotation, CoreError, Geometry, NormalizedShape, Point, Polygon, Rectangle, ShapeType,
};

// ── Errors ────────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum WireError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Shape declared as '{declared}' but geometry is a {found}")]
    TypeMismatch {
        declared: &'static str,
        found: &'static str,
    },

    #[error(transparent)]
    Geometry(#[from] CoreError),
}

// ── Wire types ────────────────────────────────────────────────────────

/// Only fractional coordinates are ever exchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireUnits {
    #[default]
    Fraction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WireGeometry {
    Rect {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
    },
    Polygon {
        points: Vec<Point>,
    },
}

impl WireGeometry {
    fn shape_type(&self) -> ShapeType {
        match self {
            WireGeometry::Rect { .. } => ShapeType::Rect,
            WireGeometry::Polygon { .. } => ShapeType::Polygon,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireShape {
    #[serde(rename = "type")]
    pub shape_type: ShapeType,
    pub geometry: WireGeometry,
    pub units: WireUnits,
}

impl WireShape {
    /// Validate and convert into a fraction-space shape.
    pub fn into_shape(self) -> Result<NormalizedShape, WireError> {
        let found = self.geometry.shape_type();
        if found != self.shape_type {
            return Err(WireError::TypeMismatch {
                declared: self.shape_type.as_str(),
                found: found.as_str(),
            });
        }
        let geometry = match self.geometry {
            WireGeometry::Rect {
                x,
                y,
                width,
                height,
            } => Geometry::Rectangle(Rectangle::new(x, y, width, height)?),
            WireGeometry::Polygon { points } => Geometry::Polygon(Polygon::new(points)?),
        };
        let shape = NormalizedShape::new(geometry);
        let bb = shape.bounds();
        if bb.min.x < 0.0 || bb.min.y < 0.0 || bb.max.x > 1.0 || bb.max.y > 1.0 {
            log::warn!("Wire shape extends outside the image: {:?}", bb);
        }
        Ok(shape)
    }
}

impl From<&NormalizedShape> for WireShape {
    fn from(shape: &NormalizedShape) -> Self {
        let geometry = match shape.geometry() {
            Geometry::Rectangle(r) => WireGeometry::Rect {
                x: r.x,
                y: r.y,
                width: r.width,
                height: r.height,
            },
            Geometry::Polygon(p) => WireGeometry::Polygon {
                points: p.points().to_vec(),
            },
        };
        Self {
            shape_type: shape.shape_type(),
            geometry,
            units: WireUnits::Fraction,
        }
    }
}

/// An annotation as handed back to a host: its identifier, whether it is
/// still waiting for a permanent id, the wire shape and the opaque payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WireAnnotation {
    pub id: String,
    pub pending: bool,
    pub shape: WireShape,
    pub payload: Value,
}

impl From<&Annotation> for WireAnnotation {
    fn from(ann: &Annotation) -> Self {
        Self {
            id: ann.id.to_string(),
            pending: ann.id.is_temporary(),
            shape: WireShape::from(&ann.shape),
            payload: ann.payload.clone(),
        }
    }
}

// ── Entry points ──────────────────────────────────────────────────────

pub fn encode_shape(shape: &NormalizedShape) -> Result<String, WireError> {
    Ok(serde_json::to_string(&WireShape::from(shape))?)
}

pub fn decode_shape(json: &str) -> Result<NormalizedShape, WireError> {
    serde_json::from_str::<WireShape>(json)?.into_shape()
}

/// Decode from an already-parsed value, e.g. a field of a larger document.
pub fn shape_from_value(value: Value) -> Result<NormalizedShape, WireError> {
    serde_json::from_value::<WireShape>(value)?.into_shape()
}

/// A JSON array of wire shapes, in the order given.
pub fn encode_shapes<'a, I>(shapes: I) -> Result<String, WireError>
where
    I: IntoIterator<Item = &'a NormalizedShape>,
{
    let wire: Vec<WireShape> = shapes.into_iter().map(WireShape::from).collect();
    Ok(serde_json::to_string(&wire)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_rect_wire_form_is_exact() {
        let shape = NormalizedShape::rectangle(0.1, 0.2, 0.3, 0.4).unwrap();
        assert_eq!(
            encode_shape(&shape).unwrap(),
            r#"{"type":"rect","geometry":{"x":0.1,"y":0.2,"width":0.3,"height":0.4},"units":"fraction"}"#
        );
    }

    #[test]
    fn test_polygon_wire_form_is_exact() {
        let shape = NormalizedShape::polygon(vec![
            Point::new(0.0, 0.0),
            Point::new(0.5, 0.0),
            Point::new(0.25, 0.5),
        ])
        .unwrap();
        assert_eq!(
            encode_shape(&shape).unwrap(),
            r#"{"type":"polygon","geometry":{"points":[{"x":0.0,"y":0.0},{"x":0.5,"y":0.0},{"x":0.25,"y":0.5}]},"units":"fraction"}"#
        );
    }

    #[test]
    fn test_decode_host_json() {
        let shape = decode_shape(
            r#"{"type":"polygon","units":"fraction","geometry":{"points":[{"x":0.1,"y":0.1},{"x":0.9,"y":0.1},{"x":0.5,"y":0.8}]}}"#,
        )
        .unwrap();
        assert_eq!(shape.shape_type(), ShapeType::Polygon);
        assert!((shape.bounds().max.y - 0.8).abs() < 1e-12);
        // Re-encoding preserves every coordinate.
        let again = decode_shape(&encode_shape(&shape).unwrap()).unwrap();
        assert_eq!(again, shape);
    }

    #[test]
    fn test_type_mismatch_rejected() {
        let err = shape_from_value(json!({
            "type": "polygon",
            "geometry": {"x": 0.1, "y": 0.1, "width": 0.2, "height": 0.2},
            "units": "fraction"
        }))
        .unwrap_err();
        assert!(matches!(err, WireError::TypeMismatch { declared: "polygon", found: "rect" }));
    }

    #[test]
    fn test_invalid_geometry_rejected() {
        let two_points = json!({
            "type": "polygon",
            "geometry": {"points": [{"x": 0.0, "y": 0.0}, {"x": 1.0, "y": 1.0}]},
            "units": "fraction"
        });
        assert!(matches!(
            shape_from_value(two_points),
            Err(WireError::Geometry(CoreError::InvalidGeometry(_)))
        ));

        let negative = json!({
            "type": "rect",
            "geometry": {"x": 0.0, "y": 0.0, "width": -0.1, "height": 0.2},
            "units": "fraction"
        });
        assert!(shape_from_value(negative).is_err());
    }

    #[test]
    fn test_pixel_units_rejected() {
        let err = shape_from_value(json!({
            "type": "rect",
            "geometry": {"x": 1.0, "y": 1.0, "width": 20.0, "height": 20.0},
            "units": "pixel"
        }))
        .unwrap_err();
        assert!(matches!(err, WireError::Json(_)));
    }

    #[test]
    fn test_wire_annotation_marks_pending() {
        let ann = Annotation::pending(NormalizedShape::rectangle(0.0, 0.0, 0.5, 0.5).unwrap())
            .with_payload(json!({"text": "hi"}));
        let wire = WireAnnotation::from(&ann);
        assert!(wire.pending);
        assert!(wire.id.starts_with("tmp:"));
        let value = serde_json::to_value(&wire).unwrap();
        assert_eq!(value["shape"]["type"], "rect");
        assert_eq!(value["payload"]["text"], "hi");
    }
}
