//! Audio output capability and the scoped playback path.
//!
//! An [`AudioOutput`] opens one [`PlaybackSession`] per request. The
//! session is wrapped in a [`SessionGuard`] so it is closed exactly once,
//! whichever way playback ends, and the device is never held between
//! requests.
//!
//! Outputs:
//! - [`WavOutput`] — writes each session to a 16-bit PCM WAV file
//! - `CpalOutput` — default speaker device (feature `playback`)

#[cfg(feature = "playback")]
pub mod cpal;
pub mod wav;

#[cfg(feature = "playback")]
pub use self::cpal::CpalOutput;
pub use wav::WavOutput;

use crate::error::DeviceError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelLayout {
    Mono,
    Stereo,
}

impl ChannelLayout {
    pub fn channels(&self) -> u16 {
        match self {
            ChannelLayout::Mono => 1,
            ChannelLayout::Stereo => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleEncoding {
    /// Signed 16-bit little-endian PCM.
    Pcm16Le,
}

impl SampleEncoding {
    pub fn bytes_per_sample(&self) -> usize {
        match self {
            SampleEncoding::Pcm16Le => 2,
        }
    }
}

/// Parameters a playback session is opened with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamSpec {
    pub sample_rate: u32,
    pub channels: ChannelLayout,
    pub encoding: SampleEncoding,
    /// Device buffer size; never below the output's minimum.
    pub buffer_size_bytes: usize,
}

impl StreamSpec {
    pub fn frame_bytes(&self) -> usize {
        self.channels.channels() as usize * self.encoding.bytes_per_sample()
    }
}

/// An audio device that can be opened for streaming playback.
pub trait AudioOutput {
    type Session: PlaybackSession;

    /// Smallest buffer the device accepts for this stream shape.
    ///
    /// Defaults to 20 ms of audio.
    fn min_buffer_size(
        &self,
        sample_rate: u32,
        channels: ChannelLayout,
        encoding: SampleEncoding,
    ) -> usize {
        (sample_rate as usize / 50).max(1)
            * channels.channels() as usize
            * encoding.bytes_per_sample()
    }

    fn open(&self, spec: &StreamSpec) -> Result<Self::Session, DeviceError>;
}

/// An open output stream.
pub trait PlaybackSession {
    /// Queue bytes for playback, returning how many were accepted.
    fn write(&mut self, bytes: &[u8]) -> Result<usize, DeviceError>;

    /// Block until everything written so far has been played.
    fn drain(&mut self) -> Result<(), DeviceError>;

    /// Release the device. Called exactly once per session.
    fn close(&mut self);
}

/// Owns a session and closes it on every exit path.
pub struct SessionGuard<S: PlaybackSession> {
    session: S,
    closed: bool,
}

impl<S: PlaybackSession> SessionGuard<S> {
    pub fn new(session: S) -> Self {
        Self {
            session,
            closed: false,
        }
    }

    pub fn session(&mut self) -> &mut S {
        &mut self.session
    }

    pub fn close(mut self) {
        self.close_once();
    }

    fn close_once(&mut self) {
        if !self.closed {
            self.closed = true;
            self.session.close();
        }
    }
}

impl<S: PlaybackSession> Drop for SessionGuard<S> {
    fn drop(&mut self) {
        self.close_once();
    }
}

/// Stream mono PCM16 bytes to `output`: open, write all, drain, close.
///
/// Returns the number of bytes written.
pub fn play_pcm16<O: AudioOutput + ?Sized>(
    output: &O,
    sample_rate: u32,
    bytes: &[u8],
) -> Result<usize, DeviceError> {
    let channels = ChannelLayout::Mono;
    let encoding = SampleEncoding::Pcm16Le;
    let min = output.min_buffer_size(sample_rate, channels, encoding);
    let spec = StreamSpec {
        sample_rate,
        channels,
        encoding,
        buffer_size_bytes: min.max(encoding.bytes_per_sample()),
    };

    let mut guard = SessionGuard::new(output.open(&spec)?);
    log::debug!(
        "Opened playback session: {} Hz, buffer {} bytes",
        spec.sample_rate,
        spec.buffer_size_bytes
    );

    let mut written = 0;
    while written < bytes.len() {
        let end = (written + spec.buffer_size_bytes).min(bytes.len());
        let n = guard.session().write(&bytes[written..end])?;
        if n == 0 {
            return Err(DeviceError::new(format!(
                "device accepted no data after {written} of {} bytes",
                bytes.len()
            )));
        }
        if n > end - written {
            return Err(DeviceError::new(format!(
                "device reported {n} bytes accepted out of {} offered",
                end - written
            )));
        }
        written += n;
    }

    guard.session().drain()?;
    guard.close();
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Default)]
    struct Log {
        opened: usize,
        closed: usize,
        drained: usize,
        bytes: Vec<u8>,
        spec: Option<StreamSpec>,
    }

    struct ChokingOutput {
        log: Rc<RefCell<Log>>,
        /// Max bytes accepted per write.
        chunk: usize,
        /// Stop accepting after this many bytes.
        capacity: usize,
        overcount: usize,
    }

    struct ChokingSession {
        log: Rc<RefCell<Log>>,
        chunk: usize,
        capacity: usize,
        /// Added to every accepted count.
        overcount: usize,
    }

    impl AudioOutput for ChokingOutput {
        type Session = ChokingSession;

        fn open(&self, spec: &StreamSpec) -> Result<ChokingSession, DeviceError> {
            let mut log = self.log.borrow_mut();
            log.opened += 1;
            log.spec = Some(*spec);
            Ok(ChokingSession {
                log: Rc::clone(&self.log),
                chunk: self.chunk,
                capacity: self.capacity,
                overcount: self.overcount,
            })
        }
    }

    impl PlaybackSession for ChokingSession {
        fn write(&mut self, bytes: &[u8]) -> Result<usize, DeviceError> {
            let mut log = self.log.borrow_mut();
            let room = self.capacity.saturating_sub(log.bytes.len());
            let n = bytes.len().min(self.chunk).min(room);
            log.bytes.extend_from_slice(&bytes[..n]);
            Ok(n + self.overcount)
        }

        fn drain(&mut self) -> Result<(), DeviceError> {
            self.log.borrow_mut().drained += 1;
            Ok(())
        }

        fn close(&mut self) {
            self.log.borrow_mut().closed += 1;
        }
    }

    #[test]
    fn writes_everything_across_partial_writes() {
        let log = Rc::new(RefCell::new(Log::default()));
        let output = ChokingOutput {
            log: Rc::clone(&log),
            chunk: 3,
            capacity: usize::MAX,
            overcount: 0,
        };
        let bytes: Vec<u8> = (0..=255).collect();
        let written = play_pcm16(&output, 24_000, &bytes).unwrap();

        let log = log.borrow();
        assert_eq!(written, 256);
        assert_eq!(log.bytes, bytes);
        assert_eq!((log.opened, log.drained, log.closed), (1, 1, 1));

        let spec = log.spec.unwrap();
        assert_eq!(spec.channels, ChannelLayout::Mono);
        assert_eq!(spec.encoding, SampleEncoding::Pcm16Le);
        let min = output.min_buffer_size(24_000, ChannelLayout::Mono, SampleEncoding::Pcm16Le);
        assert!(spec.buffer_size_bytes >= min);
    }

    #[test]
    fn stalled_device_fails_and_still_closes() {
        let log = Rc::new(RefCell::new(Log::default()));
        let output = ChokingOutput {
            log: Rc::clone(&log),
            chunk: 64,
            capacity: 100,
            overcount: 0,
        };
        let err = play_pcm16(&output, 24_000, &[0u8; 400]).unwrap_err();
        assert!(err.0.contains("accepted no data"));

        let log = log.borrow();
        assert_eq!(log.drained, 0);
        assert_eq!(log.closed, 1);
    }

    #[test]
    fn overreported_write_fails_and_still_closes() {
        let log = Rc::new(RefCell::new(Log::default()));
        let output = ChokingOutput {
            log: Rc::clone(&log),
            chunk: usize::MAX,
            capacity: usize::MAX,
            overcount: 1,
        };
        let err = play_pcm16(&output, 24_000, &[0u8; 400]).unwrap_err();
        assert!(err.0.contains("401 bytes accepted out of 400"));

        let log = log.borrow();
        assert_eq!(log.drained, 0);
        assert_eq!(log.closed, 1);
    }

    #[test]
    fn default_min_buffer_is_twenty_milliseconds() {
        let log = Rc::new(RefCell::new(Log::default()));
        let output = ChokingOutput {
            log,
            chunk: 1,
            capacity: 0,
            overcount: 0,
        };
        assert_eq!(
            output.min_buffer_size(24_000, ChannelLayout::Mono, SampleEncoding::Pcm16Le),
            960
        );
    }
}
