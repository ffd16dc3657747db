//! Speech synthesis backends.
//!
//! This module contains [`Synthesizer`](crate::Synthesizer) implementations
//! for concrete inference engines.
//!
//! # Available Engines
//!
//! Enable engines via Cargo features:
//! - `kokoro` - Kokoro TTS through sherpa-onnx (ONNX format, bundled espeak-ng data)

#[cfg(feature = "kokoro")]
pub mod kokoro;
