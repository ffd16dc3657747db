//! Synthesizer configuration.
//!
//! A [`SynthesisConfig`] names the model assets to load and the parameters
//! the synthesizer is created with. Asset identifiers are logical strings
//! (`kokoro-en-v0_19/model.onnx`), not necessarily filesystem paths; they
//! are resolved by an [`AssetStore`](crate::assets::AssetStore) or handed
//! through to the backend untouched.
//!
//! ```rust
//! use kokoro_speak::{ExecutionBackend, SynthesisConfig};
//!
//! let config = SynthesisConfig::builder_for("kokoro-en-v0_19")
//!     .num_threads(4u32)
//!     .execution_backend(ExecutionBackend::Cpu)
//!     .build()?;
//! assert_eq!(config.voices_path, "kokoro-en-v0_19/voices.bin");
//! # Ok::<(), kokoro_speak::ConfigError>(())
//! ```

use std::fmt;
use std::path::Path;

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const MODEL_FILE: &str = "model.onnx";
pub const VOICES_FILE: &str = "voices.bin";
pub const TOKENS_FILE: &str = "tokens.txt";
pub const DATA_DIR: &str = "espeak-ng-data";

/// Compute backend the synthesizer runs on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionBackend {
    #[default]
    Cpu,
    Cuda,
    CoreMl,
}

impl ExecutionBackend {
    /// Provider name as understood by onnxruntime-based backends.
    pub fn as_provider(&self) -> &'static str {
        match self {
            ExecutionBackend::Cpu => "cpu",
            ExecutionBackend::Cuda => "cuda",
            ExecutionBackend::CoreMl => "coreml",
        }
    }
}

impl fmt::Display for ExecutionBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_provider())
    }
}

/// Parameters the synthesizer is loaded with.
///
/// Empty optional identifiers (`tokens_path`, `data_dir_path`, `lexicon`,
/// `dict_dir_path`) mean "not used". An empty `tokens_path` lets the
/// synthesizer fall back to its implicit tokenization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Builder)]
#[builder(
    setter(into),
    build_fn(private, name = "build_unvalidated", error = "ConfigError")
)]
pub struct SynthesisConfig {
    pub model_path: String,
    pub voices_path: String,
    #[serde(default)]
    #[builder(default)]
    pub tokens_path: String,
    #[serde(default)]
    #[builder(default)]
    pub data_dir_path: String,
    #[serde(default)]
    #[builder(default)]
    pub lexicon: String,
    #[serde(default)]
    #[builder(default)]
    pub dict_dir_path: String,
    #[serde(default = "default_language")]
    #[builder(default = "default_language()")]
    pub language: String,
    /// Duration multiplier, 1.0 is the model's natural pace.
    #[serde(default = "default_length_scale")]
    #[builder(default = "default_length_scale()")]
    pub length_scale: f32,
    #[serde(default = "default_num_threads")]
    #[builder(default = "default_num_threads()")]
    pub num_threads: u32,
    #[serde(default)]
    #[builder(default)]
    pub execution_backend: ExecutionBackend,
    /// Kokoro handles a single sentence per call.
    #[serde(default = "default_max_batch_sentences")]
    #[builder(default = "default_max_batch_sentences()")]
    pub max_batch_sentences: u32,
    #[serde(default)]
    #[builder(default)]
    pub debug: bool,
}

fn default_language() -> String {
    "en".to_string()
}

fn default_length_scale() -> f32 {
    1.0
}

fn default_num_threads() -> u32 {
    2
}

fn default_max_batch_sentences() -> u32 {
    1
}

/// Join a logical asset root and a relative entry with `/`.
pub fn join_asset(root: &str, name: &str) -> String {
    let root = root.trim_end_matches('/');
    if root.is_empty() {
        name.to_string()
    } else {
        format!("{root}/{name}")
    }
}

impl SynthesisConfigBuilder {
    /// Build the config and check every field against the validation rules.
    pub fn build(&self) -> Result<SynthesisConfig, ConfigError> {
        let config = self.build_unvalidated()?;
        config.validate()?;
        Ok(config)
    }
}

impl SynthesisConfig {
    /// Builder pre-filled with the standard Kokoro layout under `asset_root`.
    pub fn builder_for(asset_root: &str) -> SynthesisConfigBuilder {
        let mut builder = SynthesisConfigBuilder::default();
        builder
            .model_path(join_asset(asset_root, MODEL_FILE))
            .voices_path(join_asset(asset_root, VOICES_FILE))
            .tokens_path(join_asset(asset_root, TOKENS_FILE))
            .data_dir_path(join_asset(asset_root, DATA_DIR));
        builder
    }

    /// Default config for a Kokoro model laid out under `asset_root`.
    pub fn from_asset_root(asset_root: &str) -> Result<Self, ConfigError> {
        Self::builder_for(asset_root).build()
    }

    /// Load a config from a JSON file. Omitted fields take their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Parse(format!("{}: {e}", path.display())))?;
        Self::from_json_str(&content)
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: SynthesisConfig =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.model_path.is_empty() {
            return Err(ConfigError::EmptyPath("model_path"));
        }
        if self.voices_path.is_empty() {
            return Err(ConfigError::EmptyPath("voices_path"));
        }
        if self.num_threads == 0 {
            return Err(ConfigError::NoThreads);
        }
        if !(self.length_scale.is_finite() && self.length_scale > 0.0) {
            return Err(ConfigError::LengthScale(self.length_scale));
        }
        if self.max_batch_sentences == 0 {
            return Err(ConfigError::NoSentences);
        }
        Ok(())
    }

    /// Every asset identifier this config refers to.
    pub fn required_assets(&self) -> Vec<&str> {
        [
            &self.model_path,
            &self.voices_path,
            &self.tokens_path,
            &self.data_dir_path,
            &self.dict_dir_path,
        ]
        .into_iter()
        .map(String::as_str)
        .filter(|p| !p.is_empty())
        .collect()
    }

    /// Assets without which the synthesizer cannot load at all.
    pub fn essential_assets(&self) -> Vec<&str> {
        vec![self.model_path.as_str(), self.voices_path.as_str()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_paths_from_asset_root() {
        let config = SynthesisConfig::from_asset_root("kokoro-en-v0_19").unwrap();
        assert_eq!(config.model_path, "kokoro-en-v0_19/model.onnx");
        assert_eq!(config.voices_path, "kokoro-en-v0_19/voices.bin");
        assert_eq!(config.tokens_path, "kokoro-en-v0_19/tokens.txt");
        assert_eq!(config.data_dir_path, "kokoro-en-v0_19/espeak-ng-data");
        assert_eq!(config.language, "en");
        assert_eq!(config.length_scale, 1.0);
        assert_eq!(config.num_threads, 2);
        assert_eq!(config.execution_backend, ExecutionBackend::Cpu);
        assert_eq!(config.max_batch_sentences, 1);
    }

    #[test]
    fn join_does_not_double_separator() {
        assert_eq!(join_asset("models/", "model.onnx"), "models/model.onnx");
        assert_eq!(join_asset("", "model.onnx"), "model.onnx");
    }

    #[test]
    fn empty_tokens_path_is_valid() {
        let config = SynthesisConfig::builder_for("m")
            .tokens_path("")
            .build()
            .unwrap();
        assert!(config.tokens_path.is_empty());
        assert_eq!(
            config.required_assets(),
            vec!["m/model.onnx", "m/voices.bin", "m/espeak-ng-data"]
        );
    }

    #[test]
    fn rejects_structurally_invalid_overrides() {
        assert_eq!(
            SynthesisConfig::builder_for("m").num_threads(0u32).build(),
            Err(ConfigError::NoThreads)
        );
        assert_eq!(
            SynthesisConfig::builder_for("m").length_scale(0.0f32).build(),
            Err(ConfigError::LengthScale(0.0))
        );
        assert!(matches!(
            SynthesisConfig::builder_for("m").length_scale(f32::NAN).build(),
            Err(ConfigError::LengthScale(_))
        ));
        assert_eq!(
            SynthesisConfig::builder_for("m").voices_path("").build(),
            Err(ConfigError::EmptyPath("voices_path"))
        );
        assert_eq!(
            SynthesisConfig::builder_for("m")
                .max_batch_sentences(0u32)
                .build(),
            Err(ConfigError::NoSentences)
        );
    }

    #[test]
    fn builder_without_model_path_reports_missing_field() {
        let err = SynthesisConfigBuilder::default()
            .voices_path("voices.bin")
            .build()
            .unwrap_err();
        assert_eq!(err, ConfigError::MissingField("model_path".to_string()));
    }

    #[test]
    fn loads_json_with_defaults() {
        let config = SynthesisConfig::from_json_str(
            r#"{"model_path": "k/model.onnx", "voices_path": "k/voices.bin", "execution_backend": "cuda"}"#,
        )
        .unwrap();
        assert_eq!(config.execution_backend, ExecutionBackend::Cuda);
        assert_eq!(config.language, "en");
        assert!(config.tokens_path.is_empty());
    }

    #[test]
    fn json_is_validated() {
        let err = SynthesisConfig::from_json_str(
            r#"{"model_path": "k/model.onnx", "voices_path": ""}"#,
        )
        .unwrap_err();
        assert_eq!(err, ConfigError::EmptyPath("voices_path"));
        assert!(matches!(
            SynthesisConfig::from_json_str("{"),
            Err(ConfigError::Parse(_))
        ));
    }
}
