use thiserror::Error;

/// Errors raised by the shape, transform and selection core.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    /// Malformed shape input, rejected at construction time.
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    /// A coordinate transform was attempted before the image was laid out.
    #[error("Image not ready: rendered size is {width}x{height}")]
    NotReady { width: f64, height: f64 },

    #[error("Unknown event kind '{0}'")]
    UnknownEventKind(String),

    /// Tools can only be switched while no selection is in progress.
    #[error("Selector busy: cannot switch to {requested} while a selection is in progress")]
    SelectorBusy { requested: &'static str },

    #[error("No annotation with id '{0}'")]
    UnknownAnnotation(String),
}
