//! Playback through the default speaker device.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use ::cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use ::cpal::{SampleFormat, SampleRate, Stream, StreamConfig};

use super::{AudioOutput, ChannelLayout, PlaybackSession, SampleEncoding, StreamSpec};
use crate::error::DeviceError;
use crate::pcm::pcm16_from_le_bytes;

/// Extra time allowed on top of the queued audio length before `drain` gives up.
const DRAIN_SLACK: Duration = Duration::from_secs(2);

/// Default output device of the default host.
#[derive(Debug, Default, Clone, Copy)]
pub struct CpalOutput;

impl CpalOutput {
    pub fn new() -> Self {
        Self
    }
}

impl AudioOutput for CpalOutput {
    type Session = CpalSession;

    /// 100 ms; desktop hosts underrun on anything much shorter.
    fn min_buffer_size(
        &self,
        sample_rate: u32,
        channels: ChannelLayout,
        encoding: SampleEncoding,
    ) -> usize {
        (sample_rate as usize / 10).max(1)
            * channels.channels() as usize
            * encoding.bytes_per_sample()
    }

    fn open(&self, spec: &StreamSpec) -> Result<CpalSession, DeviceError> {
        let host = ::cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| DeviceError::new("No audio output device available"))?;

        // Prefer an f32 config at the requested rate, else the device default.
        let config: StreamConfig = device
            .supported_output_configs()
            .map_err(|e| DeviceError::new(format!("Error querying audio configs: {e}")))?
            .filter(|c| c.sample_format() == SampleFormat::F32)
            .find(|c| {
                c.min_sample_rate().0 <= spec.sample_rate
                    && c.max_sample_rate().0 >= spec.sample_rate
            })
            .map(|c| c.with_sample_rate(SampleRate(spec.sample_rate)))
            .or_else(|| device.default_output_config().ok())
            .ok_or_else(|| DeviceError::new("No suitable audio config found"))?
            .into();

        let out_channels = config.channels as usize;
        let src_channels = spec.channels.channels() as usize;
        // Source samples consumed per output frame.
        let step = spec.sample_rate as f64 / config.sample_rate.0 as f64;
        log::debug!(
            "cpal stream: {} Hz x{} for {} Hz source",
            config.sample_rate.0,
            out_channels,
            spec.sample_rate
        );

        let queue: Arc<Mutex<VecDeque<i16>>> = Arc::new(Mutex::new(VecDeque::new()));
        let failure: Arc<Mutex<Option<String>>> = Arc::new(Mutex::new(None));

        let cb_queue = Arc::clone(&queue);
        let cb_failure = Arc::clone(&failure);
        let mut phase = 0.0f64;
        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &::cpal::OutputCallbackInfo| {
                    let Ok(mut queue) = cb_queue.lock() else {
                        data.fill(0.0);
                        return;
                    };
                    for frame in data.chunks_mut(out_channels) {
                        for (i, out) in frame.iter_mut().enumerate() {
                            let sample = queue.get(i % src_channels).copied().unwrap_or(0);
                            *out = sample as f32 / 32768.0;
                        }
                        phase += step;
                        while phase >= 1.0 {
                            for _ in 0..src_channels {
                                queue.pop_front();
                            }
                            phase -= 1.0;
                        }
                    }
                },
                move |err| {
                    log::error!("Audio playback error: {err}");
                    if let Ok(mut slot) = cb_failure.lock() {
                        *slot = Some(err.to_string());
                    }
                },
                None,
            )
            .map_err(|e| DeviceError::new(format!("Failed to build output stream: {e}")))?;

        stream
            .play()
            .map_err(|e| DeviceError::new(format!("Failed to play audio stream: {e}")))?;

        Ok(CpalSession {
            stream: Some(stream),
            queue,
            failure,
            frame_rate: spec.sample_rate * src_channels as u32,
            carry: None,
        })
    }
}

pub struct CpalSession {
    stream: Option<Stream>,
    queue: Arc<Mutex<VecDeque<i16>>>,
    failure: Arc<Mutex<Option<String>>>,
    /// Source samples per second across all channels.
    frame_rate: u32,
    carry: Option<u8>,
}

impl CpalSession {
    fn check_failure(&self) -> Result<(), DeviceError> {
        match self.failure.lock() {
            Ok(slot) => match slot.as_ref() {
                Some(msg) => Err(DeviceError::new(msg.clone())),
                None => Ok(()),
            },
            Err(_) => Err(DeviceError::new("playback state poisoned")),
        }
    }

    fn queued(&self) -> Result<usize, DeviceError> {
        self.queue
            .lock()
            .map(|q| q.len())
            .map_err(|_| DeviceError::new("playback queue poisoned"))
    }
}

impl PlaybackSession for CpalSession {
    fn write(&mut self, bytes: &[u8]) -> Result<usize, DeviceError> {
        if self.stream.is_none() {
            return Err(DeviceError::new("playback session already closed"));
        }
        self.check_failure()?;

        let mut joined = Vec::with_capacity(bytes.len() + 1);
        joined.extend(self.carry.take());
        joined.extend_from_slice(bytes);
        if joined.len() % 2 == 1 {
            self.carry = joined.pop();
        }

        let mut queue = self
            .queue
            .lock()
            .map_err(|_| DeviceError::new("playback queue poisoned"))?;
        queue.extend(pcm16_from_le_bytes(&joined));
        Ok(bytes.len())
    }

    fn drain(&mut self) -> Result<(), DeviceError> {
        let pending = self.queued()?;
        let deadline = Instant::now()
            + Duration::from_secs_f64(pending as f64 / self.frame_rate.max(1) as f64)
            + DRAIN_SLACK;

        while self.queued()? > 0 {
            self.check_failure()?;
            if Instant::now() >= deadline {
                return Err(DeviceError::new("timed out waiting for playback to finish"));
            }
            std::thread::sleep(Duration::from_millis(10));
        }

        // Let the device flush its own buffer.
        std::thread::sleep(Duration::from_millis(50));
        self.check_failure()
    }

    fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.pause() {
                log::debug!("Failed to pause output stream: {e}");
            }
        }
        if let Ok(mut queue) = self.queue.lock() {
            queue.clear();
        }
    }
}
