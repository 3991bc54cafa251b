//! Seams to the outside world: where a user is, and how frames reach listeners.

use std::sync::Arc;

use async_trait::async_trait;

use crate::audio::Frame;
use crate::error::TransportError;
use crate::model::{ChannelId, GuildId, UserId};

/// Looks up which voice channel a user currently occupies.
#[async_trait]
pub trait VoiceDirectory: Send + Sync {
    async fn voice_channel_of(&self, guild_id: GuildId, user_id: UserId) -> Option<ChannelId>;
}

/// Establishes voice connections.
#[async_trait]
pub trait VoiceTransport: Send + Sync {
    /// Join `channel_id` in `guild_id`.
    ///
    /// A new join for a guild may be requested while that guild's previous
    /// connection is still open; the registry disconnects the old one afterwards.
    async fn join(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<Arc<dyn VoiceConnection>, TransportError>;
}

/// A live voice connection. Only one pipeline sends on it at a time.
#[async_trait]
pub trait VoiceConnection: Send + Sync {
    fn channel_id(&self) -> ChannelId;

    /// Must not block: it is called from `Drop` when a stream stops.
    fn set_speaking(&self, speaking: bool);

    /// Deliver one frame. Implementations pace delivery to real time, so this
    /// resolves roughly once per frame duration.
    async fn send_frame(&self, frame: Frame) -> Result<(), TransportError>;

    async fn disconnect(&self);
}
