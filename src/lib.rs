//! # kokoro-speak
//!
//! Text-to-audio playback pipeline around an offline Kokoro TTS synthesizer.
//!
//! The synthesizer itself is opaque: it is reached only through the
//! [`Synthesizer`] trait. This crate supplies everything around it:
//!
//! - **Configuration**: [`SynthesisConfig`] with a validating builder
//! - **Asset checks**: [`assets::verify`] reports which model files exist
//! - **Orchestration**: [`TtsEngine`] synthesizes, converts to 16-bit PCM
//!   and streams the audio to an [`audio::AudioOutput`]
//!
//! ## Quick Start
//!
//! ```toml
//! [dependencies]
//! kokoro-speak = { version = "2026.10", features = ["kokoro", "playback"] }
//! ```
//!
//! ```ignore
//! use kokoro_speak::assets::{verify, DirAssetStore};
//! use kokoro_speak::audio::CpalOutput;
//! use kokoro_speak::engines::kokoro::KokoroSynthesizer;
//! use kokoro_speak::{SynthesisConfig, TtsEngine};
//!
//! let config = SynthesisConfig::from_asset_root("models/kokoro-en-v0_19")?;
//! verify(&DirAssetStore::new("."), config.required_assets())
//!     .require(config.essential_assets())?;
//!
//! let engine = TtsEngine::new(KokoroSynthesizer::new(), CpalOutput::new());
//! engine.initialize(&config)?;
//! engine.speak("Hello, world!")?;
//! engine.close();
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod assets;
pub mod audio;
pub mod config;
pub mod engine;
pub mod engines;
pub mod error;
pub mod pcm;

use std::path::Path;

pub use config::{ExecutionBackend, SynthesisConfig, SynthesisConfigBuilder};
pub use engine::{EngineState, SpeakReport, TtsEngine};
pub use error::{BackendError, ConfigError, DeviceError, ErrorCategory, TtsError};

/// One request to the synthesizer.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisRequest {
    pub text: String,
    /// Voice index for multi-speaker models.
    pub speaker_id: u32,
    /// Speech rate multiplier, 1.0 is normal.
    pub speed: f32,
}

impl SynthesisRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            speaker_id: 0,
            speed: 1.0,
        }
    }

    pub fn with_speaker(mut self, speaker_id: u32) -> Self {
        self.speaker_id = speaker_id;
        self
    }

    pub fn with_speed(mut self, speed: f32) -> Self {
        self.speed = speed;
        self
    }

    /// Reject requests that would be pointless to send to the synthesizer.
    pub fn validate(&self) -> Result<(), TtsError> {
        if self.text.trim().is_empty() {
            return Err(TtsError::InvalidRequest("text is empty".to_string()));
        }
        if !(self.speed.is_finite() && self.speed > 0.0) {
            return Err(TtsError::InvalidRequest(format!(
                "speed must be a positive number, got {}",
                self.speed
            )));
        }
        Ok(())
    }
}

/// The result of a synthesis (text-to-speech) operation.
///
/// Contains raw f32 audio samples and the sample rate of the output audio.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisResult {
    /// Raw audio samples, nominally in `[-1.0, 1.0]`
    pub samples: Vec<f32>,
    /// Sample rate of the audio (24000 for Kokoro)
    pub sample_rate: u32,
}

impl SynthesisResult {
    /// Write the audio to a 16-bit PCM WAV file.
    pub fn write_wav(&self, path: &Path) -> Result<(), hound::Error> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec)?;
        for &sample in &self.samples {
            writer.write_sample(pcm::pcm_of(sample))?;
        }
        writer.finalize()?;
        Ok(())
    }

    /// Duration of the audio in seconds.
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Opaque speech synthesizer.
///
/// Implementations wrap an external inference engine. The engine is
/// created unloaded, loaded once per [`SynthesisConfig`] and released
/// exactly once by its owner.
pub trait Synthesizer {
    /// Load the model assets named by `config`.
    fn load(&mut self, config: &SynthesisConfig) -> Result<(), BackendError>;

    /// Synthesize speech for one request.
    fn synthesize(&mut self, request: &SynthesisRequest) -> Result<SynthesisResult, BackendError>;

    /// Native output sample rate of the loaded model.
    fn sample_rate(&self) -> u32;

    /// Unload the model and free associated resources.
    fn release(&mut self);
}
