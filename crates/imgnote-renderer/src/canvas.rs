use serde::Serialize;

use imgnote_core::geometry::{Geometry, ShapeType};
use imgnote_core::style::{ShapeStyle, StyleItem};
use imgnote_core::{DeviceShape, ImageSize};

/// A drawing surface the viewer paints annotations onto. Surfaces cannot be
/// erased selectively, so every redraw starts with `clear`.
pub trait Canvas {
    fn clear(&mut self, size: ImageSize);
    fn draw_shape(&mut self, shape: &DeviceShape, style: &ShapeStyle);
}

/// One recorded drawing operation, ready to be replayed by a frontend.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum DrawCommand {
    Clear {
        width: f64,
        height: f64,
    },
    Shape {
        #[serde(rename = "type")]
        shape_type: ShapeType,
        geometry: Geometry,
        #[serde(skip_serializing_if = "Option::is_none")]
        outline: Option<StyleItem>,
        #[serde(skip_serializing_if = "Option::is_none")]
        stroke: Option<StyleItem>,
        #[serde(skip_serializing_if = "Option::is_none")]
        fill: Option<StyleItem>,
    },
}

/// A canvas that records the current frame as a list of commands.
///
/// `clear` drops the previous frame, mirroring what a real surface shows.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DrawList {
    commands: Vec<DrawCommand>,
    #[serde(skip)]
    frames: usize,
}

impl DrawList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    /// Shape commands in the current frame.
    pub fn shapes(&self) -> impl Iterator<Item = &DrawCommand> {
        self.commands
            .iter()
            .filter(|c| matches!(c, DrawCommand::Shape { .. }))
    }

    /// Number of times the surface has been cleared.
    pub fn frame_count(&self) -> usize {
        self.frames
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.commands)
    }
}

impl Canvas for DrawList {
    fn clear(&mut self, size: ImageSize) {
        self.commands.clear();
        self.frames += 1;
        self.commands.push(DrawCommand::Clear {
            width: size.width,
            height: size.height,
        });
    }

    fn draw_shape(&mut self, shape: &DeviceShape, style: &ShapeStyle) {
        self.commands.push(DrawCommand::Shape {
            shape_type: shape.shape_type(),
            geometry: shape.geometry().clone(),
            outline: style.outline.clone(),
            stroke: style.stroke.clone(),
            fill: style.fill.clone(),
        });
    }
}
