//! Reads fixed-size PCM chunks from the decoder and feeds frames to the transport.

use std::io::ErrorKind;
use std::sync::Arc;

use async_channel::{Receiver, Sender};
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, warn};

use crate::audio::{decode_frame, Frame, CHUNK_BYTES};
use crate::error::StreamError;
use crate::transport::VoiceConnection;

/// Marks a connection as speaking for as long as it is alive.
struct SpeakingGuard<'a> {
    connection: &'a dyn VoiceConnection,
}

impl<'a> SpeakingGuard<'a> {
    fn new(connection: &'a dyn VoiceConnection) -> Self {
        connection.set_speaking(true);
        Self { connection }
    }
}

impl Drop for SpeakingGuard<'_> {
    fn drop(&mut self) {
        self.connection.set_speaking(false);
    }
}

/// Producer half of a pipeline.
pub struct StreamPump {
    connection: Arc<dyn VoiceConnection>,
}

impl StreamPump {
    pub fn new(connection: Arc<dyn VoiceConnection>) -> Self {
        Self { connection }
    }

    /// Pump until the reader ends, fails, or nobody receives frames anymore.
    ///
    /// Returns the number of frames sent. A trailing partial chunk counts as a
    /// clean end and is discarded. `frames` is dropped on return, which closes
    /// the channel for the consumer; the same happens if this future is dropped.
    ///
    /// # Errors
    /// [`StreamError::Read`] on an I/O error other than end of stream,
    /// [`StreamError::Frame`] if a chunk does not split into stereo samples,
    /// [`StreamError::FramesClosed`] if the receiving side went away.
    pub async fn run<R>(&self, mut reader: R, frames: Sender<Frame>) -> Result<u64, StreamError>
    where
        R: AsyncRead + Unpin,
    {
        let _speaking = SpeakingGuard::new(self.connection.as_ref());
        let mut buffer = vec![0u8; CHUNK_BYTES];
        let mut sent = 0u64;

        loop {
            if let Err(e) = reader.read_exact(&mut buffer).await {
                if e.kind() == ErrorKind::UnexpectedEof {
                    debug!("Decoder output ended after {} frames", sent);
                    return Ok(sent);
                }
                return Err(StreamError::Read(e));
            }

            let frame = decode_frame(&buffer)?;

            if frames.send(frame).await.is_err() {
                return Err(StreamError::FramesClosed);
            }
            sent += 1;
        }
    }
}

/// Consumer half of a pipeline: hands frames to the connection in order.
///
/// Returns when the pump closes the channel or the connection rejects a frame;
/// in the latter case the receiver is dropped so the pump stops at its next send.
pub async fn forward_frames(frames: Receiver<Frame>, connection: &dyn VoiceConnection) -> u64 {
    let mut forwarded = 0u64;
    while let Ok(frame) = frames.recv().await {
        if let Err(e) = connection.send_frame(frame).await {
            warn!("Voice connection rejected frame: {}", e);
            break;
        }
        forwarded += 1;
    }
    forwarded
}
