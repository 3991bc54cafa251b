//! Decoder subprocess: pulls a source URL and emits raw s16le stereo PCM on stdout.

use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::process::{Child, ChildStdout, Command};
use tracing::{debug, warn};

use crate::audio::{CHANNELS, SAMPLE_RATE};
use crate::error::DecoderError;

/// Placeholder in the argument template replaced by the source URL.
pub const URL_PLACEHOLDER: &str = "{url}";

/// How to launch the decoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecoderCommand {
    program: String,
    args: Vec<String>,
}

impl DecoderCommand {
    /// Arbitrary program; every `{url}` in `args` is substituted at start.
    pub fn new(
        program: impl Into<String>,
        args: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// ffmpeg producing the PCM format the pump expects. Only errors reach stderr.
    pub fn ffmpeg(program: impl Into<String>) -> Self {
        let sample_rate = SAMPLE_RATE.to_string();
        let channels = CHANNELS.to_string();
        Self::new(
            program,
            [
                "-hide_banner",
                "-loglevel",
                "error",
                "-i",
                URL_PLACEHOLDER,
                "-f",
                "s16le",
                "-ar",
                sample_rate.as_str(),
                "-ac",
                channels.as_str(),
                "pipe:1",
            ],
        )
    }

    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    #[must_use]
    pub fn args_for(&self, source_url: &str) -> Vec<String> {
        self.args
            .iter()
            .map(|arg| arg.replace(URL_PLACEHOLDER, source_url))
            .collect()
    }

    /// Spawn the decoder for `source_url`.
    ///
    /// # Errors
    /// [`DecoderError::Spawn`] if the process cannot be created,
    /// [`DecoderError::MissingOutput`] if its stdout is not attached.
    pub fn start(&self, source_url: &str) -> Result<DecoderProcess, DecoderError> {
        let mut child = Command::new(&self.program)
            .args(self.args_for(source_url))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| DecoderError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        let Some(output) = child.stdout.take() else {
            // kill_on_drop reaps it
            return Err(DecoderError::MissingOutput);
        };

        debug!("Decoder started, pid={:?}", child.id());

        Ok(DecoderProcess {
            child,
            output: Some(output),
            exit_status: None,
        })
    }
}

/// A running decoder. Dropping it kills the process.
pub struct DecoderProcess {
    child: Child,
    output: Option<ChildStdout>,
    exit_status: Option<ExitStatus>,
}

impl DecoderProcess {
    /// OS process id while the process has not been reaped.
    #[must_use]
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// The PCM stream. Available once.
    ///
    /// # Errors
    /// [`DecoderError::MissingOutput`] if the stream was already taken.
    pub fn take_output(&mut self) -> Result<ChildStdout, DecoderError> {
        self.output.take().ok_or(DecoderError::MissingOutput)
    }

    /// Stop the process and reap it, waiting at most `timeout`.
    ///
    /// Safe to call repeatedly; returns the exit status once known.
    pub async fn terminate(&mut self, timeout: Duration) -> Option<ExitStatus> {
        if self.exit_status.is_some() {
            return self.exit_status;
        }

        // Closing our end first unblocks a decoder stuck writing into a full pipe.
        self.output = None;

        match self.child.try_wait() {
            Ok(Some(status)) => {
                self.exit_status = Some(status);
                return self.exit_status;
            }
            Ok(None) => {}
            Err(e) => warn!("Failed to poll decoder status: {}", e),
        }

        if let Err(e) = self.child.start_kill() {
            debug!("Decoder kill request failed: {}", e);
        }

        match tokio::time::timeout(timeout, self.child.wait()).await {
            Ok(Ok(status)) => {
                debug!("Decoder exited with {}", status);
                self.exit_status = Some(status);
            }
            Ok(Err(e)) => warn!("Failed to reap decoder: {}", e),
            Err(_) => warn!("Decoder did not exit within {:?}", timeout),
        }

        self.exit_status
    }
}
