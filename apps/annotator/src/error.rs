use thiserror::Error;

use imgnote_core::{CoreError, HandlerError};
use imgnote_io::WireError;

#[derive(Error, Debug)]
pub enum AnnotatorError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Handler(#[from] HandlerError),

    #[error(transparent)]
    Wire(#[from] WireError),
}
