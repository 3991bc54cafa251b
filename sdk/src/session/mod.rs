mod registry;

pub use registry::{SessionRegistry, SessionState};

use std::sync::Arc;

use tracing::info;

use crate::model::{ChannelId, GuildId};
use crate::pipeline::Pipeline;
use crate::transport::VoiceConnection;

/// The voice connection a guild holds and the stream currently playing on it.
pub struct Session {
    guild_id: GuildId,
    connection: Arc<dyn VoiceConnection>,
    pipeline: Option<Pipeline>,
}

impl Session {
    pub(crate) fn new(
        guild_id: GuildId,
        connection: Arc<dyn VoiceConnection>,
        pipeline: Pipeline,
    ) -> Self {
        Self {
            guild_id,
            connection,
            pipeline: Some(pipeline),
        }
    }

    #[must_use]
    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    #[must_use]
    pub fn channel_id(&self) -> ChannelId {
        self.connection.channel_id()
    }

    #[must_use]
    pub fn source_url(&self) -> Option<&str> {
        self.pipeline.as_ref().map(Pipeline::source_url)
    }

    #[must_use]
    pub fn is_streaming(&self) -> bool {
        self.pipeline.as_ref().is_some_and(|p| !p.is_finished())
    }

    pub(crate) fn connection(&self) -> &Arc<dyn VoiceConnection> {
        &self.connection
    }

    /// Stop the stream but keep the connection.
    pub(crate) async fn stop_stream(&mut self) {
        if let Some(pipeline) = self.pipeline.take() {
            pipeline.stop().await;
        }
    }

    /// Stop the stream, then release the connection.
    pub(crate) async fn close(mut self) {
        self.stop_stream().await;
        self.connection.disconnect().await;
        info!("[guild {}] Disconnected from channel {}", self.guild_id, self.channel_id());
    }
}
