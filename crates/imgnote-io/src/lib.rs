//! # imgnote I/O
//!
//! The JSON forms imgnote exchanges with hosts: the fraction-unit wire
//! shape every adapter agrees on, and the annotator configuration file.

pub mod wire;
pub mod config;

pub use config::AnnotatorConfig;
pub use wire::{
    decode_shape, encode_shape, encode_shapes, shape_from_value, WireAnnotation, WireError,
    WireShape,
};
