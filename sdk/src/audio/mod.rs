pub mod consts;
pub mod frame;

pub use consts::{CHANNELS, CHUNK_BYTES, FRAME_DURATION_MS, FRAME_SAMPLES, FRAME_SIZE, SAMPLE_RATE};
pub use frame::{decode_frame, decode_samples, encode_samples, Frame};
