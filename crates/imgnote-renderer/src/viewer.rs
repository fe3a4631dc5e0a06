use std::collections::HashMap;

use serde_json::Value;

use imgnote_core::spatial::{SpatialEntry, SpatialIndex};
use imgnote_core::{
    Annotation, AnnotationId, BBox, CoordinateTransformer, CoreError, DeviceShape, ImageSize,
    Point, ShapeKey, StyleSet, TemporaryId,
};

use crate::canvas::{Canvas, DrawList};

/// The pixel-space form of one fraction-space shape for the current layout.
///
/// Entries are keyed by the identity key of the *normalized* shape and hold
/// only the *device* shape, so the two spaces cannot be confused.
#[derive(Debug, Clone)]
pub struct RenderEntry {
    pub shape: DeviceShape,
    pub bbox: BBox,
    pub area: f64,
    /// Annotations currently sharing this entry.
    users: usize,
}

impl RenderEntry {
    fn new(shape: DeviceShape) -> Self {
        Self {
            bbox: shape.bounds(),
            area: shape.area(),
            shape,
            users: 0,
        }
    }
}

/// Owns the annotations of one image, their render cache and the surface
/// they are drawn on. All mutation goes through these methods.
pub struct Viewer<C: Canvas = DrawList> {
    canvas: C,
    transformer: Option<CoordinateTransformer>,
    styles: StyleSet,
    annotations: Vec<Annotation>,
    /// Identity key of each annotation's shape, parallel to `annotations`.
    keys: Vec<ShapeKey>,
    entries: HashMap<ShapeKey, RenderEntry>,
    index: SpatialIndex,
}

impl<C: Canvas> std::fmt::Debug for Viewer<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Viewer")
            .field("image_size", &self.image_size())
            .field("annotations", &self.annotations.len())
            .field("entries", &self.entries.len())
            .finish()
    }
}

impl<C: Canvas> Viewer<C> {
    /// A viewer for an image that has not been laid out yet.
    pub fn new(canvas: C) -> Self {
        Self {
            canvas,
            transformer: None,
            styles: StyleSet::default(),
            annotations: Vec::new(),
            keys: Vec::new(),
            entries: HashMap::new(),
            index: SpatialIndex::new(),
        }
    }

    pub fn with_styles(mut self, styles: StyleSet) -> Self {
        self.styles = styles;
        self
    }

    pub fn styles(&self) -> &StyleSet {
        &self.styles
    }

    pub fn set_styles(&mut self, styles: StyleSet) {
        self.styles = styles;
        self.redraw();
    }

    pub fn canvas(&self) -> &C {
        &self.canvas
    }

    pub fn canvas_mut(&mut self) -> &mut C {
        &mut self.canvas
    }

    pub fn image_size(&self) -> Option<ImageSize> {
        self.transformer.map(|t| t.size())
    }

    pub fn is_ready(&self) -> bool {
        self.transformer.is_some()
    }

    pub fn transformer(&self) -> Result<&CoordinateTransformer, CoreError> {
        self.transformer.as_ref().ok_or(CoreError::NotReady {
            width: 0.0,
            height: 0.0,
        })
    }

    /// Lay the viewer out at a new on-screen size. Every RenderEntry is
    /// recomputed before anything is drawn again. An annotation with no valid
    /// pixel shape at this size keeps its place but gets no entry, so it is
    /// neither drawn nor hit until a later layout can place it.
    pub fn set_image_size(&mut self, size: ImageSize) -> Result<(), CoreError> {
        let transformer = CoordinateTransformer::new(size)?;
        let mut entries: HashMap<ShapeKey, RenderEntry> =
            HashMap::with_capacity(self.entries.len());
        for (ann, key) in self.annotations.iter().zip(&self.keys) {
            if let Some(entry) = entries.get_mut(key) {
                entry.users += 1;
                continue;
            }
            match transformer.to_device(&ann.shape) {
                Ok(device) => {
                    let mut entry = RenderEntry::new(device);
                    entry.users = 1;
                    entries.insert(*key, entry);
                }
                Err(err) => log::warn!(
                    "Annotation {} cannot be placed at {}x{}: {}",
                    ann.id,
                    size.width,
                    size.height,
                    err
                ),
            }
        }
        log::debug!(
            "Viewer resized to {}x{}, {} render entries rebuilt",
            size.width,
            size.height,
            entries.len()
        );
        self.transformer = Some(transformer);
        self.entries = entries;
        self.rebuild_index();
        self.redraw();
        Ok(())
    }

    /// Insert an annotation, or replace `replacing` in place. An annotation
    /// whose id is already present replaces that one, so no two annotations
    /// ever share an id.
    pub fn add_annotation(
        &mut self,
        annotation: Annotation,
        replacing: Option<&AnnotationId>,
    ) -> Result<(), CoreError> {
        let device = self.transformer()?.to_device(&annotation.shape)?;

        let mut position = replacing
            .and_then(|id| self.position(id))
            .or_else(|| self.position(&annotation.id));
        // Replacing one entry with an id another entry already uses: the
        // other one goes.
        if let (Some(target), Some(clash)) = (position, self.position(&annotation.id)) {
            if clash != target {
                self.annotations.remove(clash);
                let dropped = self.keys.remove(clash);
                self.release_entry(dropped);
                position = Some(if clash < target { target - 1 } else { target });
            }
        }

        if annotation.highlighted {
            self.clear_highlight_flags();
        }

        let key = annotation.shape.identity_key();
        match position {
            Some(index) => {
                let old = std::mem::replace(&mut self.annotations[index], annotation);
                let old_key = std::mem::replace(&mut self.keys[index], key);
                self.release_entry(old_key);
                log::debug!("Replaced annotation {} at position {}", old.id, index);
            }
            None => {
                log::debug!("Added annotation {}", annotation.id);
                self.annotations.push(annotation);
                self.keys.push(key);
            }
        }
        self.entries
            .entry(key)
            .or_insert_with(|| RenderEntry::new(device))
            .users += 1;

        self.rebuild_index();
        self.redraw();
        Ok(())
    }

    pub fn remove_annotation(&mut self, id: &AnnotationId) -> Option<Annotation> {
        let index = self.position(id)?;
        let removed = self.annotations.remove(index);
        let key = self.keys.remove(index);
        self.release_entry(key);
        log::debug!("Removed annotation {}", removed.id);
        self.rebuild_index();
        self.redraw();
        Some(removed)
    }

    /// Re-key a pending annotation under its permanent identifier. The shape
    /// is unchanged, so the render cache is left alone.
    pub fn commit(
        &mut self,
        temporary: &TemporaryId,
        permanent: String,
        payload: Value,
    ) -> Result<&Annotation, CoreError> {
        let pending_id = AnnotationId::Temporary(temporary.clone());
        let index = self
            .position(&pending_id)
            .ok_or_else(|| CoreError::UnknownAnnotation(pending_id.to_string()))?;

        let permanent_id = AnnotationId::Permanent(permanent.clone());
        let index = match self.position(&permanent_id) {
            // The host already handed us this annotation; keep its copy.
            Some(existing) => {
                log::warn!(
                    "Annotation {} already present, dropping pending {}",
                    permanent_id,
                    pending_id
                );
                self.annotations.remove(index);
                let dropped = self.keys.remove(index);
                self.release_entry(dropped);
                let existing = if existing > index { existing - 1 } else { existing };
                self.annotations[existing].commit(permanent, payload);
                self.rebuild_index();
                self.redraw();
                existing
            }
            None => {
                self.annotations[index].commit(permanent, payload);
                log::info!("Committed {} as {}", pending_id, permanent_id);
                index
            }
        };
        Ok(&self.annotations[index])
    }

    pub fn get(&self, id: &AnnotationId) -> Option<&Annotation> {
        self.annotations.iter().find(|a| &a.id == id)
    }

    /// All annotations, in insertion (and drawing) order.
    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    pub fn len(&self) -> usize {
        self.annotations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.annotations.is_empty()
    }

    pub fn render_entry(&self, id: &AnnotationId) -> Option<&RenderEntry> {
        let index = self.position(id)?;
        self.entries.get(&self.keys[index])
    }

    /// Annotations whose pixel shape contains `(x, y)`, smallest area first.
    /// Equal areas keep collection order.
    pub fn get_annotations_at(&self, x: f64, y: f64) -> Vec<&Annotation> {
        let point = Point::new(x, y);
        let candidates = self.index.keys_at(&point);
        if candidates.is_empty() {
            return Vec::new();
        }

        let mut hits: Vec<(f64, &Annotation)> = self
            .annotations
            .iter()
            .zip(&self.keys)
            .filter_map(|(ann, key)| {
                if !candidates.contains(key) {
                    return None;
                }
                let entry = self.entries.get(key)?;
                entry.shape.contains(&point).then_some((entry.area, ann))
            })
            .collect();
        hits.sort_by(|a, b| a.0.total_cmp(&b.0));
        hits.into_iter().map(|(_, ann)| ann).collect()
    }

    /// Annotations whose pixel bounding box overlaps `region`, in collection order.
    pub fn annotations_in(&self, region: &BBox) -> Vec<&Annotation> {
        let keys = self.index.keys_in(region);
        self.annotations
            .iter()
            .zip(&self.keys)
            .filter(|(_, key)| keys.contains(key))
            .map(|(ann, _)| ann)
            .collect()
    }

    /// Highlight one annotation, or none. Returns whether anything changed.
    pub fn highlight_annotation(&mut self, id: Option<&AnnotationId>) -> Result<bool, CoreError> {
        if let Some(id) = id {
            if self.position(id).is_none() {
                return Err(CoreError::UnknownAnnotation(id.to_string()));
            }
        }
        let mut changed = false;
        for ann in &mut self.annotations {
            let wanted = Some(&ann.id) == id;
            if ann.highlighted != wanted {
                ann.highlighted = wanted;
                changed = true;
            }
        }
        if changed {
            self.redraw();
        }
        Ok(changed)
    }

    pub fn highlighted(&self) -> Option<&Annotation> {
        self.annotations.iter().find(|a| a.highlighted)
    }

    /// Give one annotation its own style set, or drop it with `None`.
    pub fn update_shape_style(
        &mut self,
        id: &AnnotationId,
        style: Option<StyleSet>,
    ) -> Result<(), CoreError> {
        let index = self
            .position(id)
            .ok_or_else(|| CoreError::UnknownAnnotation(id.to_string()))?;
        self.annotations[index].shape.set_style(style);
        self.redraw();
        Ok(())
    }

    /// Clear the surface and paint every annotation with a current entry, in
    /// collection order.
    pub fn redraw(&mut self) {
        let Some(transformer) = self.transformer else {
            return;
        };
        self.canvas.clear(transformer.size());
        let mut drawn = 0;
        for (ann, key) in self.annotations.iter().zip(&self.keys) {
            let Some(entry) = self.entries.get(key) else {
                continue;
            };
            let style = ann
                .shape
                .style()
                .unwrap_or(&self.styles)
                .resolve(ann.highlighted);
            self.canvas.draw_shape(&entry.shape, style);
            drawn += 1;
        }
        log::debug!("Redrew {} annotation(s)", drawn);
    }

    fn position(&self, id: &AnnotationId) -> Option<usize> {
        self.annotations.iter().position(|a| &a.id == id)
    }

    fn clear_highlight_flags(&mut self) {
        for ann in &mut self.annotations {
            ann.highlighted = false;
        }
    }

    fn release_entry(&mut self, key: ShapeKey) {
        if let Some(entry) = self.entries.get_mut(&key) {
            entry.users = entry.users.saturating_sub(1);
            if entry.users == 0 {
                self.entries.remove(&key);
            }
        }
    }

    fn rebuild_index(&mut self) {
        let items = self
            .entries
            .iter()
            .map(|(key, entry)| SpatialEntry {
                key: *key,
                bbox: entry.bbox,
            })
            .collect();
        self.index = SpatialIndex::build(items);
    }
}
