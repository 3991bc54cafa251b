//! Fixed PCM parameters shared by the decoder and the voice transport.

pub const SAMPLE_RATE: u32 = 48000;
pub const CHANNELS: usize = 2;
pub const FRAME_SIZE: usize = 960; // 20ms at 48kHz, per channel
pub const FRAME_DURATION_MS: u64 = 20;

/// Interleaved samples in one frame.
pub const FRAME_SAMPLES: usize = FRAME_SIZE * CHANNELS;

/// Bytes read from the decoder per frame (2 bytes per s16le sample).
pub const CHUNK_BYTES: usize = FRAME_SAMPLES * 2;

pub(crate) const BYTES_PER_SAMPLE: usize = 2;
pub(crate) const BYTES_PER_STEREO_SAMPLE: usize = BYTES_PER_SAMPLE * CHANNELS;
