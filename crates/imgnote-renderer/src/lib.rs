//! # imgnote Renderer
//!
//! Keeps the pixel-space render cache for a set of annotations, answers
//! hit-tests against it and repaints a [`Canvas`] whenever anything changes.

pub mod canvas;
pub mod viewer;

pub use canvas::{Canvas, DrawCommand, DrawList};
pub use viewer::{RenderEntry, Viewer};
