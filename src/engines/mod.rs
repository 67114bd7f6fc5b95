//! Speech synthesis engines.
//!
//! This module contains implementations of [`Synthesizer`](crate::Synthesizer).
//!
//! # Available Engines
//!
//! Enable engines via Cargo features:
//! - `vits` - multi-speaker VITS (ONNX format, espeak-ng required)

#[cfg(feature = "vits")]
pub mod vits;
