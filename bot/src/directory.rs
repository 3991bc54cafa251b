use async_trait::async_trait;
use dashmap::DashMap;
use radiocast_sdk::{ChannelId, GuildId, UserId, VoiceDirectory};
use tracing::debug;

/// Voice channel membership, fed by voice state updates.
#[derive(Default)]
pub struct VoiceStateDirectory {
    states: DashMap<(GuildId, UserId), ChannelId>,
}

impl VoiceStateDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `user_id` moved to `channel_id`, or left voice on `None`.
    pub fn update(&self, guild_id: GuildId, user_id: UserId, channel_id: Option<ChannelId>) {
        match channel_id {
            Some(channel_id) => {
                self.states.insert((guild_id, user_id), channel_id);
                debug!("[guild {}] User {} is in channel {}", guild_id, user_id, channel_id);
            }
            None => {
                self.states.remove(&(guild_id, user_id));
                debug!("[guild {}] User {} left voice", guild_id, user_id);
            }
        }
    }
}

#[async_trait]
impl VoiceDirectory for VoiceStateDirectory {
    async fn voice_channel_of(&self, guild_id: GuildId, user_id: UserId) -> Option<ChannelId> {
        self.states.get(&(guild_id, user_id)).map(|entry| *entry.value())
    }
}
