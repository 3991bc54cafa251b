//! Configuration constants for the radiocast bot.

use std::env;
use std::time::Duration;

use radiocast_sdk::PipelineConfig;

pub const RADIO_FLAMINGO: &str = "https://live.radioflamingo.at/rf";
pub const RADIO_BOLLERWAGEN: &str = "http://player.ffn.de/radiobollerwagen.mp3";

/// Default address of the UDP voice relay.
pub const DEFAULT_VOICE_RELAY_ADDR: &str = "127.0.0.1:9002";

pub const DEFAULT_FFMPEG_PATH: &str = "ffmpeg";

/// Opus bitrate for music (bits per second).
pub const DEFAULT_OPUS_BITRATE: i32 = 96000;

/// Returns the voice relay address from `VOICE_RELAY_ADDR` env var or default.
#[must_use]
pub fn voice_relay_addr() -> String {
    env::var("VOICE_RELAY_ADDR").unwrap_or_else(|_| DEFAULT_VOICE_RELAY_ADDR.to_string())
}

/// Returns the decoder executable from `FFMPEG_PATH` env var or default.
#[must_use]
pub fn ffmpeg_path() -> String {
    env::var("FFMPEG_PATH").unwrap_or_else(|_| DEFAULT_FFMPEG_PATH.to_string())
}

#[must_use]
pub fn flamingo_url() -> String {
    env::var("RADIO_FLAMINGO_URL").unwrap_or_else(|_| RADIO_FLAMINGO.to_string())
}

#[must_use]
pub fn bollerwagen_url() -> String {
    env::var("RADIO_BOLLERWAGEN_URL").unwrap_or_else(|_| RADIO_BOLLERWAGEN.to_string())
}

/// Returns the Opus bitrate from `OPUS_BITRATE` env var or default.
#[must_use]
pub fn opus_bitrate() -> i32 {
    parsed("OPUS_BITRATE").unwrap_or(DEFAULT_OPUS_BITRATE)
}

/// Pipeline tuning from `FRAME_BUFFER` and `DECODER_TERMINATE_TIMEOUT_MS`.
#[must_use]
pub fn pipeline_config() -> PipelineConfig {
    let mut config = PipelineConfig::default();
    if let Some(frames) = parsed("FRAME_BUFFER") {
        config.frame_buffer = frames;
    }
    if let Some(millis) = parsed("DECODER_TERMINATE_TIMEOUT_MS") {
        config.terminate_timeout = Duration::from_millis(millis);
    }
    config
}

fn parsed<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.parse().ok())
}
