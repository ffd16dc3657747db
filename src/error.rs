use std::time::Duration;

/// Rejections produced while building or validating a [`SynthesisConfig`](crate::SynthesisConfig).
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("`{0}` must not be empty")]
    EmptyPath(&'static str),
    #[error("`num_threads` must be at least 1")]
    NoThreads,
    #[error("`length_scale` must be a positive number, got {0}")]
    LengthScale(f32),
    #[error("`max_batch_sentences` must be at least 1")]
    NoSentences,
    #[error("missing config field `{0}`")]
    MissingField(String),
    #[error("invalid config file: {0}")]
    Parse(String),
}

impl From<derive_builder::UninitializedFieldError> for ConfigError {
    fn from(e: derive_builder::UninitializedFieldError) -> Self {
        ConfigError::MissingField(e.field_name().to_string())
    }
}

/// Coarse grouping of [`TtsError`]s for deciding what to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Reconfigure or re-initialize before trying again.
    Setup,
    /// Only this request failed; the engine is ready for the next one.
    Request,
    /// Another request is still in flight; retry later.
    Busy,
}

/// Every way a pipeline operation can fail.
#[derive(thiserror::Error, Debug)]
pub enum TtsError {
    #[error("Invalid configuration: {0}")]
    Configuration(#[from] ConfigError),
    #[error("Missing model assets: {}", missing.join(", "))]
    MissingAsset { missing: Vec<String> },
    #[error("TTS engine failed to load: {0}")]
    EngineInit(String),
    #[error("TTS engine not ready. Call initialize() first.")]
    NotReady,
    #[error("TTS engine already closed")]
    Closed,
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Speech synthesis failed: {0}")]
    Synthesis(String),
    #[error("Speech synthesis timed out after {0:?}")]
    Timeout(Duration),
    #[error("Audio output failed: {0}")]
    Device(String),
    #[error("TTS engine busy with another request")]
    Busy,
}

impl TtsError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            TtsError::Configuration(_)
            | TtsError::MissingAsset { .. }
            | TtsError::EngineInit(_)
            | TtsError::NotReady
            | TtsError::Closed => ErrorCategory::Setup,
            TtsError::InvalidRequest(_)
            | TtsError::Synthesis(_)
            | TtsError::Timeout(_)
            | TtsError::Device(_) => ErrorCategory::Request,
            TtsError::Busy => ErrorCategory::Busy,
        }
    }
}

/// Failure reported by a synthesizer backend.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct BackendError(pub String);

impl BackendError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// Failure reported by an audio output device.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct DeviceError(pub String);

impl DeviceError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

impl From<DeviceError> for TtsError {
    fn from(e: DeviceError) -> Self {
        TtsError::Device(e.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories_separate_setup_request_and_busy() {
        assert_eq!(
            TtsError::EngineInit("bad model".into()).category(),
            ErrorCategory::Setup
        );
        assert_eq!(
            TtsError::Configuration(ConfigError::NoThreads).category(),
            ErrorCategory::Setup
        );
        assert_eq!(
            TtsError::Device("unplugged".into()).category(),
            ErrorCategory::Request
        );
        assert_eq!(
            TtsError::Timeout(Duration::from_secs(1)).category(),
            ErrorCategory::Request
        );
        assert_eq!(TtsError::Busy.category(), ErrorCategory::Busy);
    }

    #[test]
    fn missing_asset_message_lists_paths() {
        let err = TtsError::MissingAsset {
            missing: vec!["a/model.onnx".into(), "a/voices.bin".into()],
        };
        assert_eq!(
            err.to_string(),
            "Missing model assets: a/model.onnx, a/voices.bin"
        );
    }
}
