use std::cell::{Ref, RefCell};
use std::rc::Rc;
use std::time::{Duration, Instant};

use serde_json::Value;

use imgnote_core::{
    Annotation, AnnotationId, CoreError, DeviceShape, Event, EventBroker, EventKind, HandlerId,
    ImageSize, Point, SelectionOutcome, Selector, SelectorKind, StyleSet, TemporaryId,
};
use imgnote_io::{encode_shapes, AnnotatorConfig, WireAnnotation, WireError};
use imgnote_renderer::{DrawList, Viewer};

use crate::error::AnnotatorError;
use crate::popup::Popup;

/// Everything needed to annotate one image: the event broker, the viewer,
/// the active drawing tool and the popup timer.
///
/// Pointer coordinates are pixels relative to the image's top-left corner.
#[derive(Debug)]
pub struct ImageAnnotator {
    config: AnnotatorConfig,
    broker: EventBroker,
    viewer: Rc<RefCell<Viewer>>,
    selector: Selector,
    selection_enabled: bool,
    /// Annotations handed over before the image was laid out.
    deferred: Vec<Annotation>,
    hovered: Vec<AnnotationId>,
    popup: Popup,
    default_handler: HandlerId,
}

impl ImageAnnotator {
    pub fn new(config: AnnotatorConfig) -> Self {
        let broker = EventBroker::new();
        let viewer = Rc::new(RefCell::new(
            Viewer::new(DrawList::new()).with_styles(config.styles.clone()),
        ));
        let selector =
            Selector::new(config.selector, broker.clone()).with_settings(config.selector_settings());
        let default_handler = install_default_handler(&broker, &viewer);
        let popup = Popup::new(Duration::from_millis(config.popup_hide_delay_ms));

        Self {
            selection_enabled: config.selection_enabled,
            config,
            broker,
            viewer,
            selector,
            deferred: Vec::new(),
            hovered: Vec::new(),
            popup,
            default_handler,
        }
    }

    pub fn config(&self) -> &AnnotatorConfig {
        &self.config
    }

    /// Hosts register their callbacks here.
    pub fn broker(&self) -> &EventBroker {
        &self.broker
    }

    /// The built-in handler that turns a completed selection into a pending
    /// annotation. Remove it to take over annotation creation.
    pub fn default_selection_handler(&self) -> HandlerId {
        self.default_handler
    }

    pub fn viewer(&self) -> Ref<'_, Viewer> {
        self.viewer.borrow()
    }

    pub fn selector(&self) -> &Selector {
        &self.selector
    }

    /// The in-progress selection, for rubber-band drawing.
    pub fn preview(&self) -> Option<DeviceShape> {
        self.selector.preview()
    }

    pub fn is_attached(&self) -> bool {
        self.viewer.borrow().is_ready()
    }

    pub fn deferred_count(&self) -> usize {
        self.deferred.len()
    }

    pub fn selection_enabled(&self) -> bool {
        self.selection_enabled
    }

    pub fn hovered(&self) -> &[AnnotationId] {
        &self.hovered
    }

    // ── Layout ───────────────────────────────────────────────────────

    /// First layout of the image. Queued annotations are added now.
    pub fn attach(&mut self, size: ImageSize) -> Result<(), AnnotatorError> {
        self.layout(size)?;
        log::info!(
            "Annotator attached to {}x{} image with {} annotation(s)",
            size.width,
            size.height,
            self.viewer.borrow().len()
        );
        Ok(())
    }

    pub fn resize(&mut self, size: ImageSize) -> Result<(), AnnotatorError> {
        self.layout(size)
    }

    fn layout(&mut self, size: ImageSize) -> Result<(), AnnotatorError> {
        self.viewer.borrow_mut().set_image_size(size)?;
        let queued = std::mem::take(&mut self.deferred);
        if !queued.is_empty() {
            log::debug!("Flushing {} deferred annotation(s)", queued.len());
        }
        let mut viewer = self.viewer.borrow_mut();
        for annotation in queued {
            let id = annotation.id.clone();
            // A failed add drops only that annotation.
            if let Err(err) = viewer.add_annotation(annotation, None) {
                log::warn!("Dropping deferred annotation {}: {}", id, err);
            }
        }
        Ok(())
    }

    fn ensure_attached(&self) -> Result<(), CoreError> {
        self.viewer.borrow().transformer().map(|_| ())
    }

    // ── Tools ────────────────────────────────────────────────────────

    pub fn set_selector(&mut self, kind: SelectorKind) -> Result<(), AnnotatorError> {
        Ok(self.selector.set_kind(kind)?)
    }

    /// Disabling drops any selection in progress.
    pub fn set_selection_enabled(&mut self, enabled: bool) -> Result<(), AnnotatorError> {
        if !enabled && self.selector.is_selecting() {
            self.selector.cancel()?;
        }
        self.selection_enabled = enabled;
        Ok(())
    }

    /// Abort the current gesture. When an existing annotation was being
    /// edited, `original` puts it back unchanged.
    pub fn stop_selection(&mut self, original: Option<Annotation>) -> Result<(), AnnotatorError> {
        self.selector.cancel()?;
        if let Some(annotation) = original {
            self.add_annotation(annotation, None)?;
        }
        Ok(())
    }

    // ── Pointer routing ──────────────────────────────────────────────

    pub fn pointer_enter(&mut self) -> Result<(), AnnotatorError> {
        Ok(self.broker.fire(&Event::MouseOverAnnotatableItem)?)
    }

    pub fn pointer_leave(&mut self) -> Result<(), AnnotatorError> {
        let left = std::mem::take(&mut self.hovered);
        if !left.is_empty() {
            self.broker.fire(&Event::MouseOutOfAnnotation { ids: left })?;
        }
        Ok(self.broker.fire(&Event::MouseOutOfAnnotatableItem)?)
    }

    pub fn pointer_down(&mut self, x: f64, y: f64) -> Result<(), AnnotatorError> {
        self.ensure_attached()?;
        self.viewer.borrow_mut().highlight_annotation(None)?;

        if !self.selection_enabled {
            let ids = self.ids_at(x, y);
            if let Some(top) = ids.first() {
                self.viewer.borrow_mut().highlight_annotation(Some(top))?;
            }
            self.broker.fire(&Event::AnnotationsClicked {
                point: Point::new(x, y),
                ids,
            })?;
            return Ok(());
        }

        match self.selector.kind() {
            SelectorKind::Rectangle => self.selector.start_selection(x, y)?,
            SelectorKind::Polygon => {
                if self.selector.is_selecting() {
                    self.selector.add_vertex(x, y)?;
                } else {
                    self.selector.start_selection(x, y)?;
                }
            }
        }
        Ok(())
    }

    pub fn pointer_move(&mut self, x: f64, y: f64) -> Result<(), AnnotatorError> {
        if self.selector.is_selecting() {
            self.selector.pointer_move(x, y);
            return Ok(());
        }
        self.track_hover(x, y)
    }

    /// Rectangle mode completes on release; a release that produces no
    /// shape is a click. Polygon mode ignores releases.
    pub fn pointer_up(&mut self, x: f64, y: f64) -> Result<(), AnnotatorError> {
        if self.selector.kind() != SelectorKind::Rectangle || !self.selector.is_selecting() {
            return Ok(());
        }
        self.selector.pointer_move(x, y);
        if let SelectionOutcome::Canceled = self.selector.complete_selection()? {
            let ids = self.ids_at(x, y);
            self.broker.fire(&Event::AnnotationsClicked {
                point: Point::new(x, y),
                ids,
            })?;
        }
        Ok(())
    }

    /// Close the polygon being drawn, e.g. on double click or Enter.
    pub fn complete_selection(&mut self) -> Result<SelectionOutcome, AnnotatorError> {
        Ok(self.selector.complete_selection()?)
    }

    fn track_hover(&mut self, x: f64, y: f64) -> Result<(), AnnotatorError> {
        let current = self.ids_at(x, y);
        let left: Vec<AnnotationId> = self
            .hovered
            .iter()
            .filter(|id| !current.contains(id))
            .cloned()
            .collect();
        let entered: Vec<AnnotationId> = current
            .iter()
            .filter(|id| !self.hovered.contains(id))
            .cloned()
            .collect();
        self.hovered = current;

        if !left.is_empty() {
            self.broker.fire(&Event::MouseOutOfAnnotation { ids: left })?;
        }
        if !entered.is_empty() {
            self.broker.fire(&Event::MouseOverAnnotation { ids: entered })?;
        }
        Ok(())
    }

    fn ids_at(&self, x: f64, y: f64) -> Vec<AnnotationId> {
        self.viewer
            .borrow()
            .get_annotations_at(x, y)
            .into_iter()
            .map(|a| a.id.clone())
            .collect()
    }

    // ── Annotations ──────────────────────────────────────────────────

    /// Add or replace an annotation. Before the image is laid out the
    /// annotation is queued and added on [`attach`](Self::attach).
    pub fn add_annotation(
        &mut self,
        annotation: Annotation,
        replacing: Option<&AnnotationId>,
    ) -> Result<(), AnnotatorError> {
        if !self.is_attached() {
            let existing = self
                .deferred
                .iter()
                .position(|a| Some(&a.id) == replacing || a.id == annotation.id);
            log::debug!("Image not laid out, deferring annotation {}", annotation.id);
            match existing {
                Some(index) => self.deferred[index] = annotation,
                None => self.deferred.push(annotation),
            }
            return Ok(());
        }
        Ok(self
            .viewer
            .borrow_mut()
            .add_annotation(annotation, replacing)?)
    }

    pub fn remove_annotation(
        &mut self,
        id: &AnnotationId,
    ) -> Result<Option<Annotation>, AnnotatorError> {
        if let Some(index) = self.deferred.iter().position(|a| &a.id == id) {
            return Ok(Some(self.deferred.remove(index)));
        }
        let Some(removed) = self.viewer.borrow_mut().remove_annotation(id) else {
            return Ok(None);
        };
        self.hovered.retain(|h| h != id);
        if self.popup.shown() == Some(id) {
            if let Some(hidden) = self.popup.hide() {
                self.broker.fire(&Event::BeforePopupHide { id: hidden })?;
            }
        }
        self.broker.fire(&Event::AnnotationRemoved { id: id.clone() })?;
        Ok(Some(removed))
    }

    /// The host confirmed a pending annotation under `permanent`.
    pub fn commit_annotation(
        &mut self,
        temporary: &TemporaryId,
        permanent: impl Into<String>,
        payload: Value,
    ) -> Result<Annotation, AnnotatorError> {
        let committed = {
            let mut viewer = self.viewer.borrow_mut();
            match viewer.commit(temporary, permanent.into(), payload) {
                Ok(ann) => ann.clone(),
                Err(err) => {
                    log::warn!("Cannot commit {}: {}", temporary, err);
                    return Err(err.into());
                }
            }
        };
        let pending = AnnotationId::Temporary(temporary.clone());
        self.popup.rename(&pending, committed.id.clone());
        for hovered in &mut self.hovered {
            if *hovered == pending {
                *hovered = committed.id.clone();
            }
        }
        self.broker.fire(&Event::AnnotationCommitted {
            temporary: temporary.clone(),
            id: committed.id.clone(),
        })?;
        Ok(committed)
    }

    /// Annotations under a pixel point, smallest first.
    pub fn get_annotations_at(&self, x: f64, y: f64) -> Vec<Annotation> {
        self.viewer
            .borrow()
            .get_annotations_at(x, y)
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn highlight_annotation(&mut self, id: Option<&AnnotationId>) -> Result<bool, AnnotatorError> {
        Ok(self.viewer.borrow_mut().highlight_annotation(id)?)
    }

    pub fn update_shape_style(
        &mut self,
        id: &AnnotationId,
        style: Option<StyleSet>,
    ) -> Result<(), AnnotatorError> {
        Ok(self.viewer.borrow_mut().update_shape_style(id, style)?)
    }

    pub fn to_fraction(&self, x: f64, y: f64) -> Result<Point, AnnotatorError> {
        Ok(self.viewer.borrow().transformer()?.to_fraction(Point::new(x, y)))
    }

    pub fn to_pixel(&self, x: f64, y: f64) -> Result<Point, AnnotatorError> {
        Ok(self.viewer.borrow().transformer()?.to_pixel(Point::new(x, y)))
    }

    /// All shapes as a JSON array in the wire format, laid-out annotations
    /// first, then any still deferred.
    pub fn export_shapes(&self) -> Result<String, AnnotatorError> {
        let viewer = self.viewer.borrow();
        let shapes = viewer
            .annotations()
            .iter()
            .chain(self.deferred.iter())
            .map(|a| &a.shape);
        Ok(encode_shapes(shapes)?)
    }

    /// Like [`export_shapes`](Self::export_shapes) with ids and payloads.
    pub fn export_annotations(&self) -> Result<Vec<WireAnnotation>, AnnotatorError> {
        let viewer = self.viewer.borrow();
        Ok(viewer
            .annotations()
            .iter()
            .chain(self.deferred.iter())
            .map(WireAnnotation::from)
            .collect())
    }

    pub fn export_annotations_json(&self) -> Result<String, AnnotatorError> {
        let wire = self.export_annotations()?;
        serde_json::to_string_pretty(&wire).map_err(|e| WireError::from(e).into())
    }

    // ── Popup ────────────────────────────────────────────────────────

    pub fn popup(&self) -> &Popup {
        &self.popup
    }

    pub fn show_popup(&mut self, id: &AnnotationId) -> Result<(), AnnotatorError> {
        if self.viewer.borrow().get(id).is_none() {
            return Err(CoreError::UnknownAnnotation(id.to_string()).into());
        }
        self.popup.show(id.clone());
        Ok(self.broker.fire(&Event::PopupShown { id: id.clone() })?)
    }

    pub fn start_hide_timer(&mut self, now: Instant) {
        self.popup.start_hide_timer(now);
    }

    pub fn cancel_hide(&mut self) {
        self.popup.cancel_hide();
    }

    /// Drive the hide timer. Returns whether the popup was hidden.
    pub fn poll(&mut self, now: Instant) -> Result<bool, AnnotatorError> {
        match self.popup.poll(now) {
            Some(id) => {
                self.broker.fire(&Event::BeforePopupHide { id })?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

impl Default for ImageAnnotator {
    fn default() -> Self {
        Self::new(AnnotatorConfig::default())
    }
}

/// Completed selection -> pending annotation. Holds weak handles so the
/// broker's registry never keeps itself or the viewer alive.
fn install_default_handler(broker: &EventBroker, viewer: &Rc<RefCell<Viewer>>) -> HandlerId {
    let broker_handle = broker.downgrade();
    let viewer = Rc::downgrade(viewer);
    broker.add_handler(EventKind::SelectionCompleted, move |event| {
        let Event::SelectionCompleted { shape } = event else {
            return Ok(());
        };
        let Some(viewer) = viewer.upgrade() else {
            return Ok(());
        };
        let (id, normalized) = {
            let mut viewer = viewer.borrow_mut();
            let normalized = viewer.transformer()?.normalize(shape)?;
            let annotation = Annotation::pending(normalized.clone());
            let id = annotation.id.clone();
            viewer.add_annotation(annotation, None)?;
            (id, normalized)
        };
        log::info!("Created pending annotation {}", id);
        if let Some(broker) = broker_handle.upgrade() {
            broker.fire(&Event::AnnotationCreated {
                id,
                shape: normalized,
            })?;
        }
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use imgnote_core::NormalizedShape;

    fn rect(id: &str, x: f64, y: f64, w: f64, h: f64) -> Annotation {
        Annotation::new(
            AnnotationId::permanent(id),
            NormalizedShape::rectangle(x, y, w, h).unwrap(),
        )
    }

    #[test]
    fn test_annotations_deferred_until_attach() {
        let mut annotator = ImageAnnotator::default();
        annotator.add_annotation(rect("a", 0.1, 0.1, 0.2, 0.2), None).unwrap();
        annotator.add_annotation(rect("a", 0.1, 0.1, 0.3, 0.3), None).unwrap();
        assert_eq!(annotator.deferred_count(), 1);
        assert!(annotator.get_annotations_at(15.0, 15.0).is_empty());

        annotator.attach(ImageSize::new(100.0, 100.0)).unwrap();
        assert_eq!(annotator.deferred_count(), 0);
        assert_eq!(annotator.get_annotations_at(35.0, 35.0).len(), 1);
    }

    #[test]
    fn test_attach_flush_skips_unplaceable_annotation() {
        let mut annotator = ImageAnnotator::default();
        annotator.add_annotation(rect("huge", 1e308, 0.0, 0.1, 0.1), None).unwrap();
        annotator.add_annotation(rect("ok", 0.1, 0.1, 0.2, 0.2), None).unwrap();

        annotator.attach(ImageSize::new(200.0, 100.0)).unwrap();
        assert!(annotator.is_attached());
        assert_eq!(annotator.deferred_count(), 0);
        assert_eq!(annotator.viewer().len(), 1);
        let hits = annotator.get_annotations_at(30.0, 15.0);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, AnnotationId::permanent("ok"));
    }

    #[test]
    fn test_transforms_need_layout() {
        let mut annotator = ImageAnnotator::default();
        assert!(matches!(
            annotator.to_fraction(10.0, 10.0),
            Err(AnnotatorError::Core(CoreError::NotReady { .. }))
        ));
        assert!(annotator.pointer_down(1.0, 1.0).is_err());

        annotator.attach(ImageSize::new(200.0, 100.0)).unwrap();
        let p = annotator.to_fraction(50.0, 50.0).unwrap();
        assert!((p.x - 0.25).abs() < 1e-10);
        assert!((p.y - 0.5).abs() < 1e-10);
        let back = annotator.to_pixel(p.x, p.y).unwrap();
        assert!((back.x - 50.0).abs() < 1e-10);
    }

    #[test]
    fn test_disabled_selection_highlights_instead() {
        let mut annotator = ImageAnnotator::default();
        annotator.attach(ImageSize::new(100.0, 100.0)).unwrap();
        annotator.add_annotation(rect("big", 0.0, 0.0, 0.9, 0.9), None).unwrap();
        annotator.add_annotation(rect("small", 0.1, 0.1, 0.2, 0.2), None).unwrap();
        annotator.set_selection_enabled(false).unwrap();

        annotator.pointer_down(15.0, 15.0).unwrap();
        assert!(!annotator.selector().is_selecting());
        assert_eq!(
            annotator.viewer().highlighted().map(|a| a.id.clone()),
            Some(AnnotationId::permanent("small"))
        );
    }

    #[test]
    fn test_selector_switch_blocked_mid_gesture() {
        let mut annotator = ImageAnnotator::default();
        annotator.attach(ImageSize::new(100.0, 100.0)).unwrap();
        annotator.pointer_down(10.0, 10.0).unwrap();
        assert!(matches!(
            annotator.set_selector(SelectorKind::Polygon),
            Err(AnnotatorError::Core(CoreError::SelectorBusy { .. }))
        ));
        annotator.stop_selection(None).unwrap();
        annotator.set_selector(SelectorKind::Polygon).unwrap();
        assert_eq!(annotator.selector().kind(), SelectorKind::Polygon);
    }

    #[test]
    fn test_stop_selection_restores_original() {
        let mut annotator = ImageAnnotator::default();
        annotator.attach(ImageSize::new(100.0, 100.0)).unwrap();
        let original = rect("edited", 0.5, 0.5, 0.2, 0.2);
        annotator.pointer_down(10.0, 10.0).unwrap();
        annotator.stop_selection(Some(original)).unwrap();
        assert_eq!(annotator.get_annotations_at(60.0, 60.0).len(), 1);
    }

    #[test]
    fn test_show_popup_requires_known_annotation() {
        let mut annotator = ImageAnnotator::default();
        annotator.attach(ImageSize::new(100.0, 100.0)).unwrap();
        assert!(annotator.show_popup(&AnnotationId::permanent("nope")).is_err());
        annotator.add_annotation(rect("a", 0.0, 0.0, 0.5, 0.5), None).unwrap();
        annotator.show_popup(&AnnotationId::permanent("a")).unwrap();
        assert_eq!(annotator.popup().shown(), Some(&AnnotationId::permanent("a")));
    }
}
