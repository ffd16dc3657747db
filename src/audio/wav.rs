use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use super::{AudioOutput, PlaybackSession, StreamSpec};
use crate::error::DeviceError;
use crate::pcm::pcm16_from_le_bytes;

/// Writes every playback session to a 16-bit PCM WAV file at `path`,
/// replacing the previous one.
#[derive(Debug, Clone)]
pub struct WavOutput {
    path: PathBuf,
}

impl WavOutput {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AudioOutput for WavOutput {
    type Session = WavSession;

    fn open(&self, spec: &StreamSpec) -> Result<WavSession, DeviceError> {
        let wav_spec = hound::WavSpec {
            channels: spec.channels.channels(),
            sample_rate: spec.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let writer = hound::WavWriter::create(&self.path, wav_spec).map_err(|e| {
            DeviceError::new(format!("Failed to create {}: {e}", self.path.display()))
        })?;
        Ok(WavSession {
            writer: Some(writer),
            carry: None,
        })
    }
}

pub struct WavSession {
    writer: Option<hound::WavWriter<BufWriter<File>>>,
    /// Low byte of a sample split across two writes.
    carry: Option<u8>,
}

impl PlaybackSession for WavSession {
    fn write(&mut self, bytes: &[u8]) -> Result<usize, DeviceError> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| DeviceError::new("WAV session already closed"))?;

        let mut rest = bytes;
        if let (Some(low), Some((&high, tail))) = (self.carry, rest.split_first()) {
            writer
                .write_sample(i16::from_le_bytes([low, high]))
                .map_err(|e| DeviceError::new(e.to_string()))?;
            self.carry = None;
            rest = tail;
        }

        for sample in pcm16_from_le_bytes(rest) {
            writer
                .write_sample(sample)
                .map_err(|e| DeviceError::new(e.to_string()))?;
        }
        if rest.len() % 2 == 1 {
            self.carry = rest.last().copied();
        }
        Ok(bytes.len())
    }

    fn drain(&mut self) -> Result<(), DeviceError> {
        match self.writer.as_mut() {
            Some(writer) => writer.flush().map_err(|e| DeviceError::new(e.to_string())),
            None => Ok(()),
        }
    }

    fn close(&mut self) {
        if self.carry.take().is_some() {
            log::warn!("Dropping trailing half sample at end of WAV session");
        }
        if let Some(writer) = self.writer.take() {
            if let Err(e) = writer.finalize() {
                log::warn!("Failed to finalize WAV file: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::play_pcm16;
    use crate::pcm::pcm16_le_bytes;

    #[test]
    fn session_produces_readable_wav() {
        let tmp = tempfile::tempdir().unwrap();
        let output = WavOutput::new(tmp.path().join("out.wav"));
        let pcm: Vec<i16> = vec![0, 1000, -1000, i16::MAX, i16::MIN];
        let bytes = pcm16_le_bytes(&pcm);

        assert_eq!(play_pcm16(&output, 24_000, &bytes).unwrap(), 10);

        let mut reader = hound::WavReader::open(output.path()).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.sample_rate, 24_000);
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.bits_per_sample, 16);
        let read: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(read, pcm);
    }

    #[test]
    fn samples_split_across_writes_are_reassembled() {
        let tmp = tempfile::tempdir().unwrap();
        let output = WavOutput::new(tmp.path().join("split.wav"));
        let spec = StreamSpec {
            sample_rate: 16_000,
            channels: crate::audio::ChannelLayout::Mono,
            encoding: crate::audio::SampleEncoding::Pcm16Le,
            buffer_size_bytes: 2,
        };
        let bytes = pcm16_le_bytes(&[0x1234, -2]);

        let mut session = output.open(&spec).unwrap();
        assert_eq!(session.write(&bytes[..1]).unwrap(), 1);
        assert_eq!(session.write(&bytes[1..]).unwrap(), 3);
        session.drain().unwrap();
        session.close();
        session.close();

        let mut reader = hound::WavReader::open(output.path()).unwrap();
        let read: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(read, vec![0x1234, -2]);
        assert!(session.write(&bytes).is_err());
    }
}
