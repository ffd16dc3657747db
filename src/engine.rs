//! Synthesis and playback orchestration.
//!
//! [`TtsEngine`] owns one [`Synthesizer`] for its whole lifetime and opens
//! its [`AudioOutput`] once per request. One request runs at a time: a
//! call made while another is in flight is rejected with
//! [`TtsError::Busy`] rather than queued.
//!
//! ```text
//! Uninitialized --initialize--> Ready --speak--> Synthesizing --> Playing --> Ready
//!       |                        ^                    |              |
//!       +--> InitFailed          +---- request error -+--------------+
//! any state --close--> Closed
//! ```

use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError};
use std::time::{Duration, Instant};

use crate::audio::{play_pcm16, AudioOutput};
use crate::config::SynthesisConfig;
use crate::error::TtsError;
use crate::pcm::{pcm16_le_bytes, to_pcm16};
use crate::{SynthesisRequest, SynthesisResult, Synthesizer};

/// Where a [`TtsEngine`] is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Uninitialized,
    /// The synthesizer rejected its configuration; initialize again.
    InitFailed,
    Ready,
    Synthesizing,
    Playing,
    Closed,
}

/// Outcome of a successful [`TtsEngine::speak`].
#[derive(Debug, Clone)]
pub struct SpeakReport {
    pub result: SynthesisResult,
    /// PCM bytes handed to the audio device.
    pub bytes_written: usize,
}

struct Lifecycle {
    loaded: bool,
    sample_rate: u32,
    init_error: Option<String>,
}

/// Text-to-speech pipeline over one synthesizer and one audio output.
pub struct TtsEngine<S: Synthesizer, O: AudioOutput> {
    synthesizer: Arc<Mutex<S>>,
    output: O,
    /// Held for the duration of every request and lifecycle change.
    lifecycle: Mutex<Lifecycle>,
    state: Mutex<EngineState>,
    synthesis_timeout: Option<Duration>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Puts the engine back to `Ready` if a request unwinds.
struct ResetOnUnwind<'a> {
    state: &'a Mutex<EngineState>,
}

impl Drop for ResetOnUnwind<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            log::error!("TTS request panicked, engine reset to ready");
            *lock(self.state) = EngineState::Ready;
        }
    }
}

fn try_lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, TtsError> {
    match mutex.try_lock() {
        Ok(guard) => Ok(guard),
        Err(TryLockError::Poisoned(poisoned)) => Ok(poisoned.into_inner()),
        Err(TryLockError::WouldBlock) => Err(TtsError::Busy),
    }
}

impl<S: Synthesizer, O: AudioOutput> TtsEngine<S, O> {
    /// Wrap `synthesizer` and `output`; nothing is loaded until `initialize`.
    pub fn new(synthesizer: S, output: O) -> Self {
        Self {
            synthesizer: Arc::new(Mutex::new(synthesizer)),
            output,
            lifecycle: Mutex::new(Lifecycle {
                loaded: false,
                sample_rate: 0,
                init_error: None,
            }),
            state: Mutex::new(EngineState::Uninitialized),
            synthesis_timeout: None,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> EngineState {
        *lock(&self.state)
    }

    /// Sample rate of the loaded model, `None` until initialized.
    ///
    /// Waits for an in-flight request.
    pub fn sample_rate(&self) -> Option<u32> {
        let lifecycle = lock(&self.lifecycle);
        lifecycle.loaded.then_some(lifecycle.sample_rate)
    }

    pub fn output(&self) -> &O {
        &self.output
    }

    pub fn synthesis_timeout(&self) -> Option<Duration> {
        self.synthesis_timeout
    }

    fn set_state(&self, state: EngineState) {
        *lock(&self.state) = state;
    }

    /// Load the synthesizer from `config`.
    ///
    /// A rejected config leaves the engine unusable until the next
    /// successful `initialize`. Re-initializing a ready engine releases
    /// the previous model first.
    pub fn initialize(&self, config: &SynthesisConfig) -> Result<(), TtsError> {
        let mut lifecycle = try_lock(&self.lifecycle)?;
        if self.state() == EngineState::Closed {
            return Err(TtsError::Closed);
        }
        config.validate()?;

        let mut synthesizer = try_lock(&self.synthesizer)?;
        if lifecycle.loaded {
            log::info!("Re-initializing TTS engine, releasing previous model");
            synthesizer.release();
            lifecycle.loaded = false;
        }

        log::info!(
            "Loading TTS model {} ({} threads, {} backend)",
            config.model_path,
            config.num_threads,
            config.execution_backend
        );
        let start = Instant::now();
        if let Err(e) = synthesizer.load(config) {
            log::error!("TTS engine failed to load: {e}");
            lifecycle.init_error = Some(e.0.clone());
            self.set_state(EngineState::InitFailed);
            return Err(TtsError::EngineInit(e.0));
        }

        lifecycle.loaded = true;
        lifecycle.init_error = None;
        lifecycle.sample_rate = synthesizer.sample_rate();
        self.set_state(EngineState::Ready);
        log::info!(
            "TTS engine ready in {:.2?} ({} Hz)",
            start.elapsed(),
            lifecycle.sample_rate
        );
        Ok(())
    }

    /// Release the synthesizer. Valid in any state; later calls are no-ops.
    ///
    /// Waits for an in-flight request, including inference abandoned after
    /// a timeout. Returns whether a loaded model was released.
    pub fn close(&self) -> bool {
        let mut lifecycle = lock(&self.lifecycle);
        if self.state() == EngineState::Closed {
            log::debug!("TTS engine already closed");
            return false;
        }

        let released = lifecycle.loaded;
        if released {
            lock(&self.synthesizer).release();
            lifecycle.loaded = false;
        }
        self.set_state(EngineState::Closed);
        log::info!("TTS engine closed");
        released
    }

    fn check_ready(&self, lifecycle: &Lifecycle) -> Result<(), TtsError> {
        match self.state() {
            EngineState::Ready => Ok(()),
            EngineState::Closed => Err(TtsError::Closed),
            EngineState::InitFailed => Err(TtsError::EngineInit(
                lifecycle.init_error.clone().unwrap_or_default(),
            )),
            EngineState::Uninitialized => Err(TtsError::NotReady),
            EngineState::Synthesizing | EngineState::Playing => Err(TtsError::Busy),
        }
    }

    /// Pick the rate to play at, preferring what the synthesizer reported.
    fn playback_rate(
        &self,
        result: &SynthesisResult,
        lifecycle: &Lifecycle,
    ) -> Result<u32, TtsError> {
        match (result.sample_rate, lifecycle.sample_rate) {
            (0, 0) => Err(TtsError::Synthesis(
                "synthesizer reported no sample rate".to_string(),
            )),
            (0, model) => Ok(model),
            (reported, _) => Ok(reported),
        }
    }
}

impl<S, O> TtsEngine<S, O>
where
    S: Synthesizer + Send + 'static,
    O: AudioOutput,
{
    /// Bound how long a single synthesis may take.
    ///
    /// Inference cannot be interrupted: after a timeout it keeps running in
    /// the background and requests are rejected as busy until it finishes.
    pub fn with_synthesis_timeout(mut self, timeout: Duration) -> Self {
        self.synthesis_timeout = Some(timeout);
        self
    }

    /// Speak `text` with the default voice and speed.
    pub fn speak(&self, text: &str) -> Result<SpeakReport, TtsError> {
        self.speak_request(&SynthesisRequest::new(text))
    }

    /// Synthesize `request` and play it to completion.
    pub fn speak_request(&self, request: &SynthesisRequest) -> Result<SpeakReport, TtsError> {
        request.validate()?;
        let lifecycle = try_lock(&self.lifecycle)?;
        self.check_ready(&lifecycle)?;
        let _reset = ResetOnUnwind { state: &self.state };

        let result = self.run_synthesis(request, &lifecycle)?;
        let sample_rate = result.sample_rate;

        if result.samples.is_empty() {
            log::warn!("Synthesizer produced no audio for {:?}", request.text);
            self.set_state(EngineState::Ready);
            return Ok(SpeakReport {
                result,
                bytes_written: 0,
            });
        }

        self.set_state(EngineState::Playing);
        let bytes = pcm16_le_bytes(&to_pcm16(&result.samples));
        let played = play_pcm16(&self.output, sample_rate, &bytes);
        self.set_state(EngineState::Ready);

        match played {
            Ok(bytes_written) => {
                log::debug!(
                    "Played {:.2}s of audio ({bytes_written} bytes)",
                    result.duration_secs()
                );
                Ok(SpeakReport {
                    result,
                    bytes_written,
                })
            }
            Err(e) => {
                log::error!("Audio output failed: {e}");
                Err(e.into())
            }
        }
    }

    /// Synthesize without playing, for callers that handle audio themselves.
    pub fn synthesize(&self, request: &SynthesisRequest) -> Result<SynthesisResult, TtsError> {
        request.validate()?;
        let lifecycle = try_lock(&self.lifecycle)?;
        self.check_ready(&lifecycle)?;
        let _reset = ResetOnUnwind { state: &self.state };

        let result = self.run_synthesis(request, &lifecycle)?;
        self.set_state(EngineState::Ready);
        Ok(result)
    }

    /// Run one synthesis, leaving the engine `Ready` on failure.
    ///
    /// The returned result always carries a non-zero sample rate.
    fn run_synthesis(
        &self,
        request: &SynthesisRequest,
        lifecycle: &Lifecycle,
    ) -> Result<SynthesisResult, TtsError> {
        // An inference abandoned after a timeout may still hold the synthesizer.
        let synthesizer = try_lock(&self.synthesizer)?;
        self.set_state(EngineState::Synthesizing);
        log::debug!(
            "Synthesizing {} chars (speaker {}, speed {})",
            request.text.chars().count(),
            request.speaker_id,
            request.speed
        );

        let start = Instant::now();
        let synthesized = match self.synthesis_timeout {
            None => {
                let mut synthesizer = synthesizer;
                synthesizer
                    .synthesize(request)
                    .map_err(|e| TtsError::Synthesis(e.0))
            }
            Some(limit) => {
                drop(synthesizer);
                self.synthesize_with_timeout(request.clone(), limit)
            }
        };
        let outcome = synthesized.and_then(|mut result| {
            result.sample_rate = self.playback_rate(&result, lifecycle)?;
            Ok(result)
        });

        match &outcome {
            Ok(result) => log::debug!(
                "Synthesized {} samples in {:.2?}",
                result.samples.len(),
                start.elapsed()
            ),
            Err(e) => {
                log::error!("{e}");
                self.set_state(EngineState::Ready);
            }
        }
        outcome
    }

    fn synthesize_with_timeout(
        &self,
        request: SynthesisRequest,
        limit: Duration,
    ) -> Result<SynthesisResult, TtsError> {
        let synthesizer = Arc::clone(&self.synthesizer);
        let (tx, rx) = mpsc::channel();
        std::thread::Builder::new()
            .name("tts-synthesis".to_string())
            .spawn(move || {
                let result = lock(&synthesizer).synthesize(&request);
                // The caller may have given up already.
                let _ = tx.send(result);
            })
            .map_err(|e| TtsError::Synthesis(format!("failed to start synthesis worker: {e}")))?;

        match rx.recv_timeout(limit) {
            Ok(result) => result.map_err(|e| TtsError::Synthesis(e.0)),
            Err(RecvTimeoutError::Timeout) => Err(TtsError::Timeout(limit)),
            Err(RecvTimeoutError::Disconnected) => Err(TtsError::Synthesis(
                "synthesis worker exited without a result".to_string(),
            )),
        }
    }
}

impl<S: Synthesizer, O: AudioOutput> Drop for TtsEngine<S, O> {
    fn drop(&mut self) {
        self.close();
    }
}
