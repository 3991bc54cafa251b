use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::audio::Frame;
use crate::error::TransportError;
use crate::model::ChannelId;
use crate::transport::VoiceConnection;

/// Connection double that records what a pipeline did to it.
#[derive(Default)]
pub(crate) struct RecordingConnection {
    pub speaking: Mutex<Vec<bool>>,
    pub frames: Mutex<Vec<Frame>>,
    pub reject_after: Option<usize>,
    pub pace: Duration,
    pub disconnected: AtomicBool,
}

impl RecordingConnection {
    pub fn paced(pace: Duration) -> Self {
        Self {
            pace,
            ..Self::default()
        }
    }

    pub fn speaking_log(&self) -> Vec<bool> {
        self.speaking.lock().unwrap().clone()
    }

    pub fn frame_count(&self) -> usize {
        self.frames.lock().unwrap().len()
    }
}

#[async_trait]
impl VoiceConnection for RecordingConnection {
    fn channel_id(&self) -> ChannelId {
        ChannelId(1)
    }

    fn set_speaking(&self, speaking: bool) {
        self.speaking.lock().unwrap().push(speaking);
    }

    async fn send_frame(&self, frame: Frame) -> Result<(), TransportError> {
        if self.disconnected.load(Ordering::SeqCst) {
            return Err(TransportError::Disconnected);
        }
        {
            let mut frames = self.frames.lock().unwrap();
            if self.reject_after.is_some_and(|limit| frames.len() >= limit) {
                return Err(TransportError::Disconnected);
            }
            frames.push(frame);
        }
        if !self.pace.is_zero() {
            tokio::time::sleep(self.pace).await;
        }
        Ok(())
    }

    async fn disconnect(&self) {
        self.disconnected.store(true, Ordering::SeqCst);
    }
}
