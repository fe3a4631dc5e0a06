//! Scripted annotation sessions: a JSON list of pointer and host steps
//! replayed against a fresh [`ImageAnnotator`].
//!
//! ```json
//! {
//!   "image": {"width": 200, "height": 100},
//!   "config": {"selector": "rectangle"},
//!   "annotations": [{"id": "a", "shape": {"type": "rect", ...}}],
//!   "steps": [
//!     {"op": "down", "x": 10, "y": 10},
//!     {"op": "move", "x": 80, "y": 60},
//!     {"op": "up", "x": 80, "y": 60},
//!     {"op": "commit", "id": "note-1", "payload": {"text": "hello"}}
//!   ]
//! }
//! ```

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use imgnote_core::{
    Annotation, AnnotationId, CoreError, Event, EventKind, ImageSize, SelectorKind, TemporaryId,
};
use imgnote_io::{AnnotatorConfig, WireAnnotation, WireShape};

use crate::annotator::ImageAnnotator;
use crate::error::AnnotatorError;

#[derive(Debug, Clone, Deserialize)]
pub struct Script {
    pub image: ImageSize,
    #[serde(default)]
    pub config: AnnotatorConfig,
    #[serde(default)]
    pub annotations: Vec<ScriptAnnotation>,
    #[serde(default)]
    pub steps: Vec<Step>,
}

/// An annotation the host hands over before any interaction.
#[derive(Debug, Clone, Deserialize)]
pub struct ScriptAnnotation {
    pub id: String,
    pub shape: WireShape,
    #[serde(default)]
    pub payload: Value,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum Step {
    Enter,
    Leave,
    Down { x: f64, y: f64 },
    Move { x: f64, y: f64 },
    Up { x: f64, y: f64 },
    /// Close the polygon in progress.
    Complete,
    Cancel,
    Tool { kind: SelectorKind },
    Resize { width: f64, height: f64 },
    /// Commit the oldest pending annotation under `id`.
    Commit {
        id: String,
        #[serde(default)]
        payload: Value,
    },
    /// `tmp:<token>` names a pending annotation.
    Remove { id: String },
    Highlight { id: Option<String> },
}

/// What a replayed session produced.
#[derive(Debug, Clone, Serialize)]
pub struct Replay {
    pub annotations: Vec<WireAnnotation>,
    pub events: Vec<String>,
}

impl Script {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn run(self) -> Result<Replay, AnnotatorError> {
        let mut annotator = ImageAnnotator::new(self.config);

        let events = Rc::new(RefCell::new(Vec::new()));
        for kind in EventKind::ALL {
            let events = Rc::clone(&events);
            annotator.broker().add_handler(kind, move |_| {
                events.borrow_mut().push(kind.as_str().to_string());
                Ok(())
            });
        }
        let pending = Rc::new(RefCell::new(VecDeque::new()));
        {
            let pending = Rc::clone(&pending);
            annotator
                .broker()
                .add_handler(EventKind::AnnotationCreated, move |event| {
                    if let Event::AnnotationCreated {
                        id: AnnotationId::Temporary(token),
                        ..
                    } = event
                    {
                        pending.borrow_mut().push_back(token.clone());
                    }
                    Ok(())
                });
        }

        for ann in self.annotations {
            let shape = ann.shape.into_shape()?;
            let annotation =
                Annotation::new(AnnotationId::parse(&ann.id), shape).with_payload(ann.payload);
            annotator.add_annotation(annotation, None)?;
        }
        annotator.attach(self.image)?;

        for step in self.steps {
            log::debug!("Replaying {:?}", step);
            match step {
                Step::Enter => annotator.pointer_enter()?,
                Step::Leave => annotator.pointer_leave()?,
                Step::Down { x, y } => annotator.pointer_down(x, y)?,
                Step::Move { x, y } => annotator.pointer_move(x, y)?,
                Step::Up { x, y } => annotator.pointer_up(x, y)?,
                Step::Complete => {
                    annotator.complete_selection()?;
                }
                Step::Cancel => annotator.stop_selection(None)?,
                Step::Tool { kind } => annotator.set_selector(kind)?,
                Step::Resize { width, height } => annotator.resize(ImageSize::new(width, height))?,
                Step::Commit { id, payload } => {
                    let token: Option<TemporaryId> = pending.borrow_mut().pop_front();
                    match token {
                        Some(token) => {
                            annotator.commit_annotation(&token, id, payload)?;
                        }
                        None => log::warn!("Commit of {} skipped: nothing pending", id),
                    }
                }
                Step::Remove { id } => {
                    if annotator
                        .remove_annotation(&AnnotationId::parse(&id))?
                        .is_none()
                    {
                        return Err(CoreError::UnknownAnnotation(id).into());
                    }
                }
                Step::Highlight { id } => {
                    let id = id.as_deref().map(AnnotationId::parse);
                    annotator.highlight_annotation(id.as_ref())?;
                }
            }
        }

        let annotations = annotator.export_annotations()?;
        let events = events.borrow().clone();
        Ok(Replay {
            annotations,
            events,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drag_and_commit() {
        let script = Script::from_json(
            r#"{
                "image": {"width": 200, "height": 100},
                "steps": [
                    {"op": "down", "x": 40, "y": 20},
                    {"op": "move", "x": 100, "y": 50},
                    {"op": "up", "x": 100, "y": 50},
                    {"op": "commit", "id": "note-1", "payload": {"text": "hello"}}
                ]
            }"#,
        )
        .unwrap();
        let replay = script.run().unwrap();

        assert_eq!(replay.annotations.len(), 1);
        let ann = &replay.annotations[0];
        assert_eq!(ann.id, "note-1");
        assert!(!ann.pending);
        let value = serde_json::to_value(&ann.shape).unwrap();
        assert!((value["geometry"]["x"].as_f64().unwrap() - 0.2).abs() < 1e-10);
        assert!((value["geometry"]["width"].as_f64().unwrap() - 0.3).abs() < 1e-10);
        assert_eq!(
            replay.events,
            vec![
                "SELECTION_STARTED",
                "ANNOTATION_CREATED",
                "SELECTION_COMPLETED",
                "ANNOTATION_COMMITTED"
            ]
        );
    }

    #[test]
    fn test_initial_annotations_and_click() {
        let script = Script::from_json(
            r#"{
                "image": {"width": 100, "height": 100},
                "annotations": [
                    {"id": "a", "shape": {"type": "rect", "geometry": {"x": 0.1, "y": 0.1, "width": 0.5, "height": 0.5}, "units": "fraction"}}
                ],
                "steps": [
                    {"op": "down", "x": 30, "y": 30},
                    {"op": "up", "x": 30, "y": 30},
                    {"op": "remove", "id": "a"}
                ]
            }"#,
        )
        .unwrap();
        let replay = script.run().unwrap();
        assert!(replay.annotations.is_empty());
        assert_eq!(
            replay.events,
            vec![
                "SELECTION_STARTED",
                "SELECTION_CANCELED",
                "ANNOTATIONS_CLICKED",
                "ANNOTATION_REMOVED"
            ]
        );
    }

    #[test]
    fn test_pending_ids_use_tmp_prefix() {
        let script = Script::from_json(
            r#"{
                "image": {"width": 100, "height": 100},
                "annotations": [
                    {"id": "tmp:draft", "shape": {"type": "rect", "geometry": {"x": 0.1, "y": 0.1, "width": 0.2, "height": 0.2}, "units": "fraction"}},
                    {"id": "kept", "shape": {"type": "rect", "geometry": {"x": 0.5, "y": 0.5, "width": 0.2, "height": 0.2}, "units": "fraction"}}
                ],
                "steps": [
                    {"op": "highlight", "id": "tmp:draft"},
                    {"op": "remove", "id": "tmp:draft"}
                ]
            }"#,
        )
        .unwrap();
        let replay = script.run().unwrap();
        assert_eq!(replay.annotations.len(), 1);
        assert_eq!(replay.annotations[0].id, "kept");
        assert_eq!(replay.events, vec!["ANNOTATION_REMOVED"]);
    }

    #[test]
    fn test_unknown_op_rejected() {
        let err = Script::from_json(r#"{"image": {"width": 1, "height": 1}, "steps": [{"op": "fly"}]}"#)
            .unwrap_err();
        assert!(err.to_string().contains("fly"));
    }
}
