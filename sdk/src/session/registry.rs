use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

use crate::decoder::DecoderCommand;
use crate::error::SessionError;
use crate::model::{ChannelId, GuildId, UserId};
use crate::pipeline::{Pipeline, PipelineConfig};
use crate::session::Session;
use crate::transport::{VoiceDirectory, VoiceTransport};

type Slot = Arc<Mutex<Option<Session>>>;
type SlotGuard = OwnedMutexGuard<Option<Session>>;

/// What a guild is doing right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No voice connection.
    Idle,
    /// Connected, but the stream has ended.
    Connected,
    /// Connected and relaying audio.
    Streaming,
}

/// Owns every guild's voice session and enforces one stream per guild.
///
/// Each guild has its own lock, so a slow teardown in one guild never
/// delays commands for another.
pub struct SessionRegistry {
    directory: Arc<dyn VoiceDirectory>,
    transport: Arc<dyn VoiceTransport>,
    decoder: DecoderCommand,
    config: PipelineConfig,
    sessions: DashMap<GuildId, Slot>,
}

impl SessionRegistry {
    pub fn new(
        directory: Arc<dyn VoiceDirectory>,
        transport: Arc<dyn VoiceTransport>,
        decoder: DecoderCommand,
        config: PipelineConfig,
    ) -> Self {
        Self {
            directory,
            transport,
            decoder,
            config,
            sessions: DashMap::new(),
        }
    }

    /// Join the requester's voice channel and stream `source_url` there,
    /// replacing whatever the guild was playing.
    ///
    /// On error the guild keeps its previous session untouched.
    ///
    /// The new decoder is started, and the channel joined, before the old
    /// stream is stopped. Until the old decoder is reaped (at most the
    /// configured terminate timeout) the guild briefly has two decoder
    /// processes pulling from their sources. No frame of the old stream is
    /// sent once the new one starts speaking.
    ///
    /// # Errors
    /// [`SessionError::NotInVoiceChannel`], [`SessionError::Spawn`] or
    /// [`SessionError::Join`].
    pub async fn join_and_play(
        &self,
        guild_id: GuildId,
        requester: UserId,
        source_url: &str,
    ) -> Result<ChannelId, SessionError> {
        let channel_id = self
            .directory
            .voice_channel_of(guild_id, requester)
            .await
            .ok_or(SessionError::NotInVoiceChannel)?;

        let (slot, mut current) = self.lock_or_insert(guild_id).await;
        let result = self.replace_stream(guild_id, channel_id, source_url, &mut current).await;

        if result.is_err() && current.is_none() {
            self.remove_slot(guild_id, &slot);
        }
        result.map(|()| channel_id)
    }

    /// Stop the guild's stream and disconnect.
    ///
    /// # Errors
    /// [`SessionError::NoActiveSession`] if the guild has no session; nothing changes.
    pub async fn leave(&self, guild_id: GuildId) -> Result<(), SessionError> {
        let Some((slot, mut current)) = self.lock_existing(guild_id).await else {
            warn!("[guild {}] Leave requested without a voice session", guild_id);
            return Err(SessionError::NoActiveSession);
        };
        let Some(session) = current.take() else {
            warn!("[guild {}] Leave requested without a voice session", guild_id);
            return Err(SessionError::NoActiveSession);
        };

        session.close().await;
        self.remove_slot(guild_id, &slot);
        Ok(())
    }

    pub async fn state(&self, guild_id: GuildId) -> SessionState {
        let Some(slot) = self.slot(guild_id) else {
            return SessionState::Idle;
        };
        let current = slot.lock().await;
        match current.as_ref() {
            None => SessionState::Idle,
            Some(session) if session.is_streaming() => SessionState::Streaming,
            Some(_) => SessionState::Connected,
        }
    }

    /// Guilds that currently hold a voice connection.
    pub async fn active_guilds(&self) -> Vec<GuildId> {
        let guilds: Vec<GuildId> = self.sessions.iter().map(|entry| *entry.key()).collect();
        let mut active = Vec::with_capacity(guilds.len());
        for guild_id in guilds {
            if self.state(guild_id).await != SessionState::Idle {
                active.push(guild_id);
            }
        }
        active.sort_unstable();
        active
    }

    /// Leave every guild. Used when the process shuts down.
    pub async fn shutdown(&self) {
        let guilds: Vec<GuildId> = self.sessions.iter().map(|entry| *entry.key()).collect();
        for guild_id in guilds {
            match self.leave(guild_id).await {
                Ok(()) | Err(SessionError::NoActiveSession) => {}
                Err(e) => warn!("[guild {}] Failed to leave on shutdown: {}", guild_id, e),
            }
        }
        info!("All voice sessions closed");
    }

    async fn replace_stream(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
        source_url: &str,
        current: &mut Option<Session>,
    ) -> Result<(), SessionError> {
        let mut decoder = self.decoder.start(source_url)?;
        let output = decoder.take_output()?;

        let reusable = current
            .as_ref()
            .filter(|session| session.channel_id() == channel_id)
            .map(|session| Arc::clone(session.connection()));
        let reused = reusable.is_some();

        let connection = match reusable {
            Some(connection) => {
                debug!("[guild {}] Reusing connection to channel {}", guild_id, channel_id);
                connection
            }
            None => match self.transport.join(guild_id, channel_id).await {
                Ok(connection) => {
                    info!("[guild {}] Joined voice channel {}", guild_id, channel_id);
                    connection
                }
                Err(e) => {
                    warn!("[guild {}] Failed to join channel {}: {}", guild_id, channel_id, e);
                    decoder.terminate(self.config.terminate_timeout).await;
                    return Err(SessionError::Join(e));
                }
            },
        };

        if let Some(mut previous) = current.take() {
            if reused {
                previous.stop_stream().await;
            } else {
                previous.close().await;
            }
        }

        let pipeline = Pipeline::spawn(
            guild_id,
            source_url.to_string(),
            decoder,
            output,
            Arc::clone(&connection),
            &self.config,
        );
        *current = Some(Session::new(guild_id, connection, pipeline));
        Ok(())
    }

    fn slot(&self, guild_id: GuildId) -> Option<Slot> {
        self.sessions.get(&guild_id).map(|entry| Arc::clone(entry.value()))
    }

    fn is_current(&self, guild_id: GuildId, slot: &Slot) -> bool {
        self.sessions
            .get(&guild_id)
            .is_some_and(|entry| Arc::ptr_eq(entry.value(), slot))
    }

    fn remove_slot(&self, guild_id: GuildId, slot: &Slot) {
        self.sessions.remove_if(&guild_id, |_, current| Arc::ptr_eq(current, slot));
    }

    // A slot may be removed by `leave` while another caller waits on its lock;
    // such a caller must start over with the fresh slot.

    async fn lock_or_insert(&self, guild_id: GuildId) -> (Slot, SlotGuard) {
        loop {
            let slot = Arc::clone(self.sessions.entry(guild_id).or_default().value());
            let guard = Arc::clone(&slot).lock_owned().await;
            if self.is_current(guild_id, &slot) {
                return (slot, guard);
            }
        }
    }

    async fn lock_existing(&self, guild_id: GuildId) -> Option<(Slot, SlotGuard)> {
        loop {
            let slot = self.slot(guild_id)?;
            let guard = Arc::clone(&slot).lock_owned().await;
            if self.is_current(guild_id, &slot) {
                return Some((slot, guard));
            }
        }
    }
}
