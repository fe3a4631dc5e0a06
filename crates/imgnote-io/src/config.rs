use serde::{Deserialize, Serialize};

use imgnote_core::{SelectorKind, SelectorSettings, StyleSet};

use crate::wire::WireError;

/// Per-image annotator settings. Every field has a default, so an empty
/// JSON object is a valid configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnotatorConfig {
    /// Tool active when the annotator is attached.
    pub selector: SelectorKind,
    /// False for read-only hosts: clicks highlight instead of drawing.
    pub selection_enabled: bool,
    pub min_selection_size: f64,
    pub polygon_close_tolerance: f64,
    pub popup_hide_delay_ms: u64,
    pub styles: StyleSet,
}

impl Default for AnnotatorConfig {
    fn default() -> Self {
        let selector = SelectorSettings::default();
        Self {
            selector: SelectorKind::Rectangle,
            selection_enabled: true,
            min_selection_size: selector.min_size,
            polygon_close_tolerance: selector.close_tolerance,
            popup_hide_delay_ms: 300,
            styles: StyleSet::default(),
        }
    }
}

impl AnnotatorConfig {
    pub fn from_json(json: &str) -> Result<Self, WireError> {
        let config: Self = serde_json::from_str(json)?;
        log::debug!(
            "Loaded annotator config: selector={}, selection_enabled={}",
            config.selector.as_str(),
            config.selection_enabled
        );
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, WireError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn selector_settings(&self) -> SelectorSettings {
        SelectorSettings {
            min_size: self.min_selection_size,
            close_tolerance: self.polygon_close_tolerance,
        }
    }
}
