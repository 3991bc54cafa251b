//! Supervised task running one decoder → pump → connection chain.

use std::sync::Arc;
use std::time::Duration;

use tokio::process::ChildStdout;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::decoder::DecoderProcess;
use crate::error::StreamError;
use crate::model::GuildId;
use crate::pump::{forward_frames, StreamPump};
use crate::transport::VoiceConnection;

/// Frames buffered between the pump and the connection (160ms).
pub const DEFAULT_FRAME_BUFFER: usize = 8;

/// How long a killed decoder gets to exit before we stop waiting for it.
pub const DEFAULT_TERMINATE_TIMEOUT: Duration = Duration::from_secs(2);

/// Upper bound on tearing down a pipeline before its task is aborted.
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub frame_buffer: usize,
    pub terminate_timeout: Duration,
    pub stop_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            frame_buffer: DEFAULT_FRAME_BUFFER,
            terminate_timeout: DEFAULT_TERMINATE_TIMEOUT,
            stop_timeout: DEFAULT_STOP_TIMEOUT,
        }
    }
}

/// How a pipeline task ended.
#[derive(Debug)]
pub enum PipelineExit {
    /// The source ended.
    Finished { frames: u64 },
    /// Reading or delivering failed.
    Failed(StreamError),
    /// Stopped from outside.
    Cancelled,
}

/// Handle to a running stream. Dropping it cancels the stream without waiting.
pub struct Pipeline {
    guild_id: GuildId,
    source_url: String,
    cancel: Option<oneshot::Sender<()>>,
    task: JoinHandle<PipelineExit>,
    stop_timeout: Duration,
}

impl Pipeline {
    /// Start streaming `output` to `connection` on a new task.
    pub fn spawn(
        guild_id: GuildId,
        source_url: String,
        decoder: DecoderProcess,
        output: ChildStdout,
        connection: Arc<dyn VoiceConnection>,
        config: &PipelineConfig,
    ) -> Self {
        let (cancel_tx, cancel_rx) = oneshot::channel();

        let task = tokio::spawn(run(
            guild_id,
            decoder,
            output,
            connection,
            cancel_rx,
            config.frame_buffer.max(1),
            config.terminate_timeout,
        ));

        info!("[guild {}] Streaming {}", guild_id, source_url);

        Pipeline {
            guild_id,
            source_url,
            cancel: Some(cancel_tx),
            task,
            stop_timeout: config.stop_timeout,
        }
    }

    #[must_use]
    pub fn source_url(&self) -> &str {
        &self.source_url
    }

    /// True once the stream has ended on its own or been stopped.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Cancel the stream and wait until the decoder is gone and the
    /// connection is no longer marked speaking.
    ///
    /// Returns `None` if the task panicked or had to be aborted.
    pub async fn stop(mut self) -> Option<PipelineExit> {
        if let Some(cancel) = self.cancel.take() {
            // Err means the task already returned.
            let _ = cancel.send(());
        }

        match tokio::time::timeout(self.stop_timeout, &mut self.task).await {
            Ok(Ok(exit)) => Some(exit),
            Ok(Err(e)) => {
                error!("[guild {}] Pipeline task failed: {}", self.guild_id, e);
                None
            }
            Err(_) => {
                warn!(
                    "[guild {}] Pipeline did not stop within {:?}, aborting",
                    self.guild_id, self.stop_timeout
                );
                self.task.abort();
                // The aborted future drops the decoder, which kills it.
                let _ = (&mut self.task).await;
                None
            }
        }
    }
}

async fn run(
    guild_id: GuildId,
    mut decoder: DecoderProcess,
    output: ChildStdout,
    connection: Arc<dyn VoiceConnection>,
    mut cancel_rx: oneshot::Receiver<()>,
    frame_buffer: usize,
    terminate_timeout: Duration,
) -> PipelineExit {
    let (frames_tx, frames_rx) = async_channel::bounded(frame_buffer);
    let pump = StreamPump::new(Arc::clone(&connection));

    let exit = tokio::select! {
        (pumped, forwarded) = async {
            tokio::join!(
                pump.run(output, frames_tx),
                forward_frames(frames_rx, connection.as_ref()),
            )
        } => {
            debug!("[guild {}] Forwarded {} frames", guild_id, forwarded);
            match pumped {
                Ok(frames) => PipelineExit::Finished { frames },
                Err(e) => PipelineExit::Failed(e),
            }
        }
        _ = &mut cancel_rx => PipelineExit::Cancelled,
    };

    let status = decoder.terminate(terminate_timeout).await;
    debug!("[guild {}] Decoder terminated, status={:?}", guild_id, status);

    match &exit {
        PipelineExit::Finished { frames } => {
            info!("[guild {}] Source ended after {} frames", guild_id, frames);
        }
        PipelineExit::Failed(e) => warn!("[guild {}] Stream stopped: {}", guild_id, e),
        PipelineExit::Cancelled => info!("[guild {}] Stream cancelled", guild_id),
    }

    exit
}
