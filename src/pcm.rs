//! Float to 16-bit PCM conversion.

/// Convert one nominally `[-1.0, 1.0]` sample to signed 16-bit PCM.
///
/// Out-of-range input saturates at the `i16` bounds instead of wrapping.
/// NaN maps to silence.
pub fn pcm_of(sample: f32) -> i16 {
    if sample.is_nan() {
        return 0;
    }
    (sample * 32767.0)
        .round()
        .clamp(i16::MIN as f32, i16::MAX as f32) as i16
}

/// Convert a float buffer to PCM16, preserving order.
pub fn to_pcm16(samples: &[f32]) -> Vec<i16> {
    samples.iter().copied().map(pcm_of).collect()
}

/// Pack PCM16 samples as little-endian bytes, two per sample.
pub fn pcm16_le_bytes(pcm: &[i16]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(pcm.len() * 2);
    for sample in pcm {
        bytes.extend_from_slice(&sample.to_le_bytes());
    }
    bytes
}

/// Inverse of [`pcm16_le_bytes`]. A trailing odd byte is ignored.
pub fn pcm16_from_le_bytes(bytes: &[u8]) -> Vec<i16> {
    bytes
        .chunks_exact(2)
        .map(|b| i16::from_le_bytes([b[0], b[1]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn saturates_instead_of_wrapping() {
        assert_eq!(pcm_of(1.5), 32767);
        assert_eq!(pcm_of(-1.5), -32768);
        assert_eq!(pcm_of(f32::INFINITY), 32767);
        assert_eq!(pcm_of(f32::NEG_INFINITY), -32768);
        assert_eq!(pcm_of(1.0000001), 32767);
    }

    #[test]
    fn maps_reference_points() {
        assert_eq!(pcm_of(0.0), 0);
        assert_eq!(pcm_of(1.0), 32767);
        assert_eq!(pcm_of(-1.0), -32767);
        assert_eq!(pcm_of(0.5), 16384);
        assert_eq!(pcm_of(f32::NAN), 0);
    }

    #[test]
    fn order_preserving_on_unit_interval() {
        let mut prev = pcm_of(-1.0);
        for i in -1000..=1000 {
            let cur = pcm_of(i as f32 / 1000.0);
            assert!(cur >= prev, "pcm_of must be monotonic at {i}");
            prev = cur;
        }
    }

    #[test]
    fn packs_little_endian() {
        let pcm = to_pcm16(&[0.0, 1.0, -1.5]);
        assert_eq!(pcm, vec![0, 32767, -32768]);
        let bytes = pcm16_le_bytes(&pcm);
        assert_eq!(bytes, vec![0x00, 0x00, 0xff, 0x7f, 0x00, 0x80]);
        assert_eq!(pcm16_from_le_bytes(&bytes), pcm);
    }
}
