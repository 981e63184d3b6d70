//! Native synthesis backends.
//!
//! Each backend provides a [`ModelLoader`](crate::ModelLoader) for the engine.
//!
//! # Available Engines
//!
//! Enable engines via Cargo features:
//! - `piper` - Piper VITS voices (ONNX format, espeak-ng required)

#[cfg(feature = "piper")]
pub mod piper;
