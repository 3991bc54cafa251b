//! Streams an external audio source into per-guild voice connections.
//!
//! A decoder subprocess turns the source into raw PCM, [`pump::StreamPump`]
//! cuts it into 20ms frames and [`pipeline::Pipeline`] relays them to a
//! [`transport::VoiceConnection`]. [`SessionRegistry`] keeps at most one such
//! pipeline per guild.

pub mod audio;
pub mod decoder;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod pump;
pub mod session;
pub mod transport;

#[cfg(test)]
mod test_support;

pub use audio::Frame;
pub use decoder::{DecoderCommand, DecoderProcess};
pub use error::{DecoderError, FrameError, SessionError, StreamError, TransportError};
pub use model::{ChannelId, GuildId, UserId};
pub use pipeline::{Pipeline, PipelineConfig, PipelineExit};
pub use session::{SessionRegistry, SessionState};
pub use transport::{VoiceConnection, VoiceDirectory, VoiceTransport};
