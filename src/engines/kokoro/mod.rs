//! Kokoro text-to-speech through sherpa-onnx.
//!
//! [`KokoroSynthesizer`] hands a [`SynthesisConfig`](crate::SynthesisConfig)
//! to sherpa-onnx's offline Kokoro TTS. Phonemization, voice embeddings and
//! ONNX inference all happen inside the native library.
//!
//! # Model Directory Layout
//!
//! ```text
//! kokoro-en-v0_19/
//! ├── model.onnx          # Kokoro acoustic model
//! ├── voices.bin          # Speaker embeddings
//! ├── tokens.txt          # Token map (optional)
//! └── espeak-ng-data/     # Phonemizer data
//! ```
//!
//! Download: <https://github.com/k2-fsa/sherpa-onnx/releases/tag/tts-models>
//!
//! Asset identifiers must be filesystem paths for this backend; extract
//! packaged assets to disk first.
//!
//! # Example
//!
//! ```rust,no_run
//! use kokoro_speak::engines::kokoro::KokoroSynthesizer;
//! use kokoro_speak::{SynthesisConfig, SynthesisRequest, Synthesizer};
//!
//! let config = SynthesisConfig::from_asset_root("models/kokoro-en-v0_19")?;
//! let mut tts = KokoroSynthesizer::new();
//! tts.load(&config)?;
//!
//! let result = tts.synthesize(&SynthesisRequest::new("Hello, world!").with_speaker(3))?;
//! println!("Generated {} samples at {}Hz", result.samples.len(), result.sample_rate);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod engine;

pub use engine::{KokoroSynthesizer, SAMPLE_RATE};
