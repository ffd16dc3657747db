use std::path::Path;

use sherpa_rs::tts::{CommonTtsConfig, KokoroTts, KokoroTtsConfig};
use sherpa_rs::OnnxConfig;

use crate::config::SynthesisConfig;
use crate::error::BackendError;
use crate::{SynthesisRequest, SynthesisResult, Synthesizer};

/// Output sample rate of Kokoro models.
pub const SAMPLE_RATE: u32 = 24000;

/// Kokoro synthesizer backed by sherpa-onnx.
///
/// Created unloaded; [`Synthesizer::load`] builds the native instance.
#[derive(Default)]
pub struct KokoroSynthesizer {
    tts: Option<KokoroTts>,
}

impl KokoroSynthesizer {
    pub fn new() -> Self {
        Self { tts: None }
    }

    pub fn is_loaded(&self) -> bool {
        self.tts.is_some()
    }
}

impl Drop for KokoroSynthesizer {
    fn drop(&mut self) {
        self.release();
    }
}

/// The native loader aborts on missing files instead of returning an error.
fn require_file(kind: &str, path: &str) -> Result<(), BackendError> {
    if Path::new(path).is_file() {
        Ok(())
    } else {
        Err(BackendError::new(format!("{kind} file not found at {path}")))
    }
}

impl Synthesizer for KokoroSynthesizer {
    fn load(&mut self, config: &SynthesisConfig) -> Result<(), BackendError> {
        require_file("Model", &config.model_path)?;
        require_file("Voices", &config.voices_path)?;
        if !config.tokens_path.is_empty() {
            require_file("Tokens", &config.tokens_path)?;
        }
        if !config.data_dir_path.is_empty() && !Path::new(&config.data_dir_path).is_dir() {
            return Err(BackendError::new(format!(
                "espeak-ng data directory not found at {}",
                config.data_dir_path
            )));
        }

        let num_threads = i32::try_from(config.num_threads)
            .map_err(|_| BackendError::new(format!("too many threads: {}", config.num_threads)))?;
        let max_num_sentences = i32::try_from(config.max_batch_sentences).map_err(|_| {
            BackendError::new(format!(
                "too many sentences per batch: {}",
                config.max_batch_sentences
            ))
        })?;

        let tts_config = KokoroTtsConfig {
            model: config.model_path.clone(),
            voices: config.voices_path.clone(),
            tokens: config.tokens_path.clone(),
            data_dir: config.data_dir_path.clone(),
            dict_dir: config.dict_dir_path.clone(),
            lexicon: config.lexicon.clone(),
            lang: config.language.clone(),
            length_scale: config.length_scale,
            onnx_config: OnnxConfig {
                provider: config.execution_backend.as_provider().to_string(),
                num_threads,
                debug: config.debug,
            },
            common_config: CommonTtsConfig {
                max_num_sentences,
                ..Default::default()
            },
        };

        log::info!("Loading Kokoro model from {}", config.model_path);
        self.release();
        self.tts = Some(KokoroTts::new(tts_config));
        Ok(())
    }

    fn synthesize(&mut self, request: &SynthesisRequest) -> Result<SynthesisResult, BackendError> {
        let tts = self
            .tts
            .as_mut()
            .ok_or_else(|| BackendError::new("Model not loaded. Call load() first."))?;
        let sid = i32::try_from(request.speaker_id)
            .map_err(|_| BackendError::new(format!("invalid speaker id {}", request.speaker_id)))?;

        let audio = tts
            .create(&request.text, sid, request.speed)
            .map_err(|e| BackendError::new(format!("TTS generation failed: {e}")))?;
        let sample_rate = match u32::try_from(audio.sample_rate) {
            Ok(rate) if rate > 0 => rate,
            _ => SAMPLE_RATE,
        };
        Ok(SynthesisResult {
            samples: audio.samples,
            sample_rate,
        })
    }

    fn sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }

    fn release(&mut self) {
        if self.tts.take().is_some() {
            log::debug!("Released Kokoro model");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_rejects_missing_model_files() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().to_string_lossy().into_owned();
        let config = SynthesisConfig::from_asset_root(&root).unwrap();

        let mut tts = KokoroSynthesizer::new();
        let err = tts.load(&config).unwrap_err();
        assert!(err.0.contains("model.onnx"));
        assert!(!tts.is_loaded());
    }

    #[test]
    fn synthesize_before_load_fails() {
        let mut tts = KokoroSynthesizer::new();
        assert!(tts.synthesize(&SynthesisRequest::new("hello")).is_err());
    }
}
