//! # imgnote Annotator
//!
//! One [`ImageAnnotator`] per image binds the pieces of `imgnote-core`,
//! `imgnote-renderer` and `imgnote-io` into the surface hosts program
//! against: pointer routing, annotation add/remove/commit, hit-testing,
//! coordinate transforms, wire export and the popup hide timer.
//! [`Script`] replays a recorded session against one.

pub mod annotator;
pub mod error;
pub mod popup;
pub mod script;

pub use annotator::ImageAnnotator;
pub use error::AnnotatorError;
pub use popup::Popup;
pub use script::{Replay, Script, Step};
