use crate::audio::consts::{BYTES_PER_SAMPLE, BYTES_PER_STEREO_SAMPLE};
use crate::error::FrameError;

/// One playback unit of interleaved signed 16-bit samples.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    samples: Vec<i16>,
}

impl Frame {
    #[must_use]
    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    #[must_use]
    pub fn into_samples(self) -> Vec<i16> {
        self.samples
    }
}

/// Decode a raw s16le stereo chunk into a frame.
///
/// # Errors
/// Returns [`FrameError::Misaligned`] unless the chunk holds whole stereo samples.
pub fn decode_frame(chunk: &[u8]) -> Result<Frame, FrameError> {
    if chunk.len() % BYTES_PER_STEREO_SAMPLE != 0 {
        return Err(FrameError::Misaligned { len: chunk.len() });
    }
    Ok(Frame {
        samples: decode_samples(chunk)?,
    })
}

/// Decode little-endian 16-bit samples.
///
/// # Errors
/// Returns [`FrameError::OddLength`] if the buffer ends halfway through a sample.
pub fn decode_samples(bytes: &[u8]) -> Result<Vec<i16>, FrameError> {
    if bytes.len() % BYTES_PER_SAMPLE != 0 {
        return Err(FrameError::OddLength { len: bytes.len() });
    }
    Ok(bytes
        .chunks_exact(BYTES_PER_SAMPLE)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect())
}

/// Inverse of [`decode_samples`].
#[must_use]
pub fn encode_samples(samples: &[i16]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{CHUNK_BYTES, FRAME_SAMPLES};

    #[test]
    fn decodes_little_endian_pairs() {
        let frame = decode_frame(&[0x01, 0x00, 0xFF, 0xFF, 0x00, 0x80, 0xFF, 0x7F]).unwrap();
        assert_eq!(frame.samples(), &[1, -1, i16::MIN, i16::MAX]);
    }

    #[test]
    fn full_chunk_yields_one_frame_of_samples() {
        let frame = decode_frame(&[0u8; CHUNK_BYTES]).unwrap();
        assert_eq!(frame.len(), FRAME_SAMPLES);
        assert_eq!(frame.len(), 1920);
    }

    #[test]
    fn rejects_chunk_that_splits_a_stereo_pair() {
        assert_eq!(decode_frame(&[0u8; 6]), Err(FrameError::Misaligned { len: 6 }));
        assert_eq!(decode_samples(&[0u8; 3]), Err(FrameError::OddLength { len: 3 }));
    }

    #[test]
    fn empty_chunk_is_an_empty_frame() {
        assert!(decode_frame(&[]).unwrap().is_empty());
    }

    #[test]
    fn decode_then_encode_restores_bytes() {
        // Pseudo-random bytes for a spread of even lengths, including odd sample counts.
        let mut state = 0x2545_F491_u32;
        for len in (0..=64).step_by(2).chain([CHUNK_BYTES, CHUNK_BYTES * 3]) {
            let bytes: Vec<u8> = (0..len)
                .map(|_| {
                    state ^= state << 13;
                    state ^= state >> 17;
                    state ^= state << 5;
                    state.to_le_bytes()[0]
                })
                .collect();

            let samples = decode_samples(&bytes).unwrap();
            assert_eq!(samples.len(), len / 2);
            assert_eq!(encode_samples(&samples), bytes, "length {len}");
        }
    }
}
