//! Error types for the streaming pipeline and session registry.

use std::io;
use thiserror::Error;

/// Raw PCM could not be split into samples.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    #[error("chunk of {len} bytes is not a whole number of stereo samples")]
    Misaligned { len: usize },

    #[error("buffer of {len} bytes has a dangling half sample")]
    OddLength { len: usize },
}

/// The decoder subprocess could not be started.
#[derive(Error, Debug)]
pub enum DecoderError {
    #[error("failed to spawn decoder '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("decoder output stream is not attached")]
    MissingOutput,
}

/// Why a running stream stopped before its source ended cleanly.
#[derive(Error, Debug)]
pub enum StreamError {
    #[error("decoder output read failed: {0}")]
    Read(#[from] io::Error),

    #[error("decoder output is not valid PCM: {0}")]
    Frame(#[from] FrameError),

    #[error("frame channel closed by the transport sender")]
    FramesClosed,
}

/// Failures reported by a voice transport implementation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("voice connection is closed")]
    Disconnected,

    #[error("failed to encode frame: {0}")]
    Encode(String),
}

/// Errors surfaced to whoever issued a join or leave.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("requester is not in a voice channel")]
    NotInVoiceChannel,

    #[error("failed to join voice channel: {0}")]
    Join(#[source] TransportError),

    #[error(transparent)]
    Spawn(#[from] DecoderError),

    #[error("no active voice session for this guild")]
    NoActiveSession,
}
