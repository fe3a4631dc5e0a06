//! # imgnote Core
//!
//! The reusable part of image annotation: rectangle/polygon geometry, shapes
//! typed by coordinate space, the fraction <-> pixel transform, annotation
//! identity, the synchronous event broker and the selection state machine.
//!
//! Host integrations sit on top of this crate and talk to it through the
//! viewer and annotator crates.

pub mod geometry;
pub mod shape;
pub mod style;
pub mod transform;
pub mod annotation;
pub mod events;
pub mod selection;
pub mod spatial;
pub mod error;

pub use annotation::{Annotation, AnnotationId, Lifecycle, TemporaryId};
pub use error::CoreError;
pub use events::{
    BoxError, Event, EventBroker, EventKind, HandlerError, HandlerId, HandlerResult,
    WeakEventBroker,
};
pub use geometry::{BBox, Geometry, Point, Polygon, Rectangle, ShapeType};
pub use selection::{SelectionOutcome, SelectionState, Selector, SelectorKind, SelectorSettings};
pub use shape::{DeviceShape, Fraction, NormalizedShape, Pixel, Shape, ShapeKey, Unit, UnitKind};
pub use style::{ShapeStyle, StyleItem, StyleSet};
pub use transform::{CoordinateTransformer, ImageSize};
