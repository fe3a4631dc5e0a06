//! Interactive shape creation from pointer input.
//!
//! `Idle -> Selecting -> {Completed, Canceled} -> Idle`. Everything here is in
//! device pixels; converting the result to fractions is the caller's job.

use std::mem;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::events::{Event, EventBroker, HandlerError};
use crate::geometry::{Geometry, Point, Polygon, Rectangle};
use crate::shape::DeviceShape;

/// Consecutive polygon vertices closer than this are merged.
const VERTEX_EPSILON: f64 = 0.5;

/// Polygons with less area than this are collapsed to a line or point.
const MIN_POLYGON_AREA: f64 = 1e-9;

/// The drawing tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectorKind {
    /// Drag from corner to corner.
    Rectangle,
    /// Click vertex by vertex; click near the first vertex to close.
    Polygon,
}

impl SelectorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SelectorKind::Rectangle => "rectangle",
            SelectorKind::Polygon => "polygon",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SelectorSettings {
    /// A rectangle narrower or shorter than this (pixels) is degenerate.
    pub min_size: f64,
    /// Clicking within this distance (pixels) of the first vertex closes a polygon.
    pub close_tolerance: f64,
}

impl Default for SelectorSettings {
    fn default() -> Self {
        Self {
            min_size: 1.0,
            close_tolerance: 10.0,
        }
    }
}

/// The in-progress gesture.
#[derive(Debug, Clone, PartialEq)]
pub enum Draft {
    Rectangle { anchor: Point, current: Point },
    Polygon { vertices: Vec<Point>, cursor: Point },
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum SelectionState {
    #[default]
    Idle,
    Selecting(Draft),
}

#[derive(Debug, Clone, PartialEq)]
pub enum SelectionOutcome {
    Completed(DeviceShape),
    Canceled,
}

/// The active drawing tool for one image.
#[derive(Debug)]
pub struct Selector {
    kind: SelectorKind,
    settings: SelectorSettings,
    state: SelectionState,
    broker: EventBroker,
}

impl Selector {
    pub fn new(kind: SelectorKind, broker: EventBroker) -> Self {
        Self {
            kind,
            settings: SelectorSettings::default(),
            state: SelectionState::Idle,
            broker,
        }
    }

    pub fn with_settings(mut self, settings: SelectorSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn kind(&self) -> SelectorKind {
        self.kind
    }

    pub fn settings(&self) -> &SelectorSettings {
        &self.settings
    }

    pub fn state(&self) -> &SelectionState {
        &self.state
    }

    pub fn is_selecting(&self) -> bool {
        matches!(self.state, SelectionState::Selecting(_))
    }

    /// Switch tools. Only allowed while idle.
    pub fn set_kind(&mut self, kind: SelectorKind) -> Result<(), CoreError> {
        if kind == self.kind {
            return Ok(());
        }
        if self.is_selecting() {
            return Err(CoreError::SelectorBusy {
                requested: kind.as_str(),
            });
        }
        log::debug!("Selector switched from {} to {}", self.kind.as_str(), kind.as_str());
        self.kind = kind;
        Ok(())
    }

    /// Record the anchor and enter `Selecting`. A gesture already in progress
    /// is canceled first.
    pub fn start_selection(&mut self, x: f64, y: f64) -> Result<(), HandlerError> {
        if self.is_selecting() {
            self.cancel()?;
        }
        let anchor = Point::new(x, y);
        self.state = SelectionState::Selecting(match self.kind {
            SelectorKind::Rectangle => Draft::Rectangle {
                anchor,
                current: anchor,
            },
            SelectorKind::Polygon => Draft::Polygon {
                vertices: vec![anchor],
                cursor: anchor,
            },
        });
        log::debug!("Selection started at ({x}, {y}) with {}", self.kind.as_str());
        self.broker.fire(&Event::SelectionStarted { anchor })
    }

    /// Drag (rectangle) or rubber-band (polygon) update. Ignored while idle.
    pub fn pointer_move(&mut self, x: f64, y: f64) {
        match &mut self.state {
            SelectionState::Idle => {}
            SelectionState::Selecting(Draft::Rectangle { current, .. }) => {
                *current = Point::new(x, y);
            }
            SelectionState::Selecting(Draft::Polygon { cursor, .. }) => {
                *cursor = Point::new(x, y);
            }
        }
    }

    /// Polygon mode: append a vertex, or close the ring when the click lands
    /// near the first vertex. Returns the outcome if the ring was closed.
    pub fn add_vertex(&mut self, x: f64, y: f64) -> Result<Option<SelectionOutcome>, HandlerError> {
        let point = Point::new(x, y);
        let close = match &mut self.state {
            SelectionState::Selecting(Draft::Polygon { vertices, cursor }) => {
                *cursor = point;
                let near_first = vertices.len() >= 3
                    && vertices[0].distance_to(&point) <= self.settings.close_tolerance;
                if !near_first {
                    let repeated = vertices
                        .last()
                        .is_some_and(|last| last.distance_to(&point) < VERTEX_EPSILON);
                    if !repeated {
                        vertices.push(point);
                    }
                }
                near_first
            }
            _ => return Ok(None),
        };
        if close {
            self.complete_selection().map(Some)
        } else {
            Ok(None)
        }
    }

    /// The shape the current gesture would produce, for rubber-band drawing.
    pub fn preview(&self) -> Option<DeviceShape> {
        match &self.state {
            SelectionState::Idle => None,
            SelectionState::Selecting(Draft::Rectangle { anchor, current }) => {
                Rectangle::from_corners(*anchor, *current)
                    .ok()
                    .map(|r| DeviceShape::new(Geometry::Rectangle(r)))
            }
            SelectionState::Selecting(Draft::Polygon { vertices, cursor }) => {
                let mut points = vertices.clone();
                points.push(*cursor);
                Polygon::new(points)
                    .ok()
                    .map(|p| DeviceShape::new(Geometry::Polygon(p)))
            }
        }
    }

    /// Finish the gesture. Degenerate shapes become a cancel. Either way the
    /// selector is idle again by the time handlers run.
    pub fn complete_selection(&mut self) -> Result<SelectionOutcome, HandlerError> {
        let SelectionState::Selecting(draft) = mem::take(&mut self.state) else {
            return Ok(SelectionOutcome::Canceled);
        };
        match self.finalize(draft) {
            Some(shape) => {
                log::debug!("Selection completed: {:?}", shape.bounds());
                self.broker.fire(&Event::SelectionCompleted {
                    shape: shape.clone(),
                })?;
                Ok(SelectionOutcome::Completed(shape))
            }
            None => {
                log::debug!("Degenerate selection canceled");
                self.broker.fire(&Event::SelectionCanceled)?;
                Ok(SelectionOutcome::Canceled)
            }
        }
    }

    /// Discard the gesture and fire `SELECTION_CANCELED`. No-op while idle.
    pub fn cancel(&mut self) -> Result<(), HandlerError> {
        if let SelectionState::Selecting(_) = mem::take(&mut self.state) {
            log::debug!("Selection canceled");
            self.broker.fire(&Event::SelectionCanceled)?;
        }
        Ok(())
    }

    fn finalize(&self, draft: Draft) -> Option<DeviceShape> {
        match draft {
            Draft::Rectangle { anchor, current } => {
                let rect = Rectangle::from_corners(anchor, current).ok()?;
                if rect.width < self.settings.min_size || rect.height < self.settings.min_size {
                    return None;
                }
                Some(DeviceShape::new(Geometry::Rectangle(rect)))
            }
            Draft::Polygon { vertices, .. } => {
                let poly = Polygon::new(vertices).ok()?;
                if poly.area() < MIN_POLYGON_AREA {
                    return None;
                }
                Some(DeviceShape::new(Geometry::Polygon(poly)))
            }
        }
    }
}
