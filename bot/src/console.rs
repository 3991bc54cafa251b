//! Line-based stand-in for a chat gateway.
//!
//! Each input line is either a chat message, `<guild> <user> <text>`, or a
//! voice state update, `voice <guild> <user> <channel|->`. Replies go to the
//! output as `<guild> <reply>`, one per line.

use std::io;
use std::str::FromStr;
use std::sync::Arc;

use radiocast_sdk::{ChannelId, GuildId, SessionError, SessionRegistry, UserId};
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use crate::commands::{Command, Stations};
use crate::directory::VoiceStateDirectory;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleEvent {
    Message {
        guild_id: GuildId,
        user_id: UserId,
        text: String,
    },
    VoiceState {
        guild_id: GuildId,
        user_id: UserId,
        channel_id: Option<ChannelId>,
    },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("missing {0}")]
    MissingField(&'static str),

    #[error("invalid id '{0}'")]
    InvalidId(String),

    #[error("unexpected trailing input '{0}'")]
    TrailingInput(String),
}

/// Split off the first whitespace-delimited field.
fn next_field(input: &str) -> Option<(&str, &str)> {
    let input = input.trim_start();
    if input.is_empty() {
        return None;
    }
    Some(input.split_once(char::is_whitespace).unwrap_or((input, "")))
}

fn parse_id<'a, T: From<u64>>(input: &'a str, name: &'static str) -> Result<(T, &'a str), ParseError> {
    let (field, rest) = next_field(input).ok_or(ParseError::MissingField(name))?;
    let id = field
        .parse::<u64>()
        .map_err(|_| ParseError::InvalidId(field.to_string()))?;
    Ok((T::from(id), rest))
}

impl FromStr for ConsoleEvent {
    type Err = ParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let (first, rest) = next_field(line).ok_or(ParseError::MissingField("guild"))?;

        if first == "voice" {
            let (guild_id, rest) = parse_id(rest, "guild")?;
            let (user_id, rest) = parse_id(rest, "user")?;
            let (channel, rest) = next_field(rest).ok_or(ParseError::MissingField("channel"))?;
            if !rest.trim().is_empty() {
                return Err(ParseError::TrailingInput(rest.trim().to_string()));
            }
            let channel_id = match channel {
                "-" => None,
                id => Some(ChannelId(
                    id.parse().map_err(|_| ParseError::InvalidId(id.to_string()))?,
                )),
            };
            return Ok(ConsoleEvent::VoiceState {
                guild_id,
                user_id,
                channel_id,
            });
        }

        let guild_id = GuildId(
            first
                .parse()
                .map_err(|_| ParseError::InvalidId(first.to_string()))?,
        );
        let (user_id, text) = parse_id(rest, "user")?;
        let text = text.trim();
        if text.is_empty() {
            return Err(ParseError::MissingField("text"));
        }

        Ok(ConsoleEvent::Message {
            guild_id,
            user_id,
            text: text.to_string(),
        })
    }
}

/// Dispatches console events to the directory and the session registry.
pub struct Console {
    registry: Arc<SessionRegistry>,
    directory: Arc<VoiceStateDirectory>,
    stations: Stations,
}

impl Console {
    pub fn new(
        registry: Arc<SessionRegistry>,
        directory: Arc<VoiceStateDirectory>,
        stations: Stations,
    ) -> Self {
        Self {
            registry,
            directory,
            stations,
        }
    }

    /// Handle one line to completion. Returns the reply, if any.
    pub async fn handle_line(&self, line: &str) -> Option<String> {
        let (guild_id, user_id, command) = self.dispatch(line)?;
        Some(self.handle_command(guild_id, user_id, command).await)
    }

    pub async fn handle_command(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        command: Command,
    ) -> String {
        match command {
            Command::Play(station) => {
                let url = self.stations.url(station);
                match self.registry.join_and_play(guild_id, user_id, url).await {
                    Ok(channel_id) => {
                        debug!(
                            "[guild {}] {} playing in channel {}",
                            guild_id, station, channel_id
                        );
                        format!("Now playing {station}.")
                    }
                    Err(SessionError::NotInVoiceChannel) => {
                        "You're not in a voice channel.".to_string()
                    }
                    Err(e @ SessionError::Spawn(_)) => {
                        error!("[guild {}] Failed to start {}: {}", guild_id, station, e);
                        "Failed to start the stream.".to_string()
                    }
                    Err(e) => {
                        error!("[guild {}] Failed to join for {}: {}", guild_id, station, e);
                        "Failed to join the voice channel.".to_string()
                    }
                }
            }
            Command::Leave => match self.registry.leave(guild_id).await {
                Ok(()) => "Left the voice channel.".to_string(),
                Err(_) => "Not in a voice channel.".to_string(),
            },
        }
    }

    /// Read lines until `input` ends, answering commands on `output`.
    ///
    /// Voice state updates apply in input order. Commands run concurrently,
    /// so a slow join in one guild never holds up another.
    ///
    /// # Errors
    /// Returns the first I/O error on either stream.
    pub async fn run<R, W>(self: Arc<Self>, input: R, mut output: W) -> io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let (reply_tx, mut reply_rx) = mpsc::unbounded_channel::<String>();
        let mut lines = input.lines();

        let reader = async {
            while let Some(line) = lines.next_line().await? {
                let Some((guild_id, user_id, command)) = self.dispatch(&line) else {
                    continue;
                };
                let console = Arc::clone(&self);
                let reply_tx = reply_tx.clone();
                tokio::spawn(async move {
                    let reply = console.handle_command(guild_id, user_id, command).await;
                    // Err only if the writer already failed.
                    let _ = reply_tx.send(format!("{guild_id} {reply}"));
                });
            }
            drop(reply_tx);
            Ok::<(), io::Error>(())
        };

        let writer = async {
            while let Some(reply) = reply_rx.recv().await {
                output.write_all(reply.as_bytes()).await?;
                output.write_all(b"\n").await?;
                output.flush().await?;
            }
            Ok::<(), io::Error>(())
        };

        let (read, write) = tokio::join!(reader, writer);
        read?;
        write
    }

    /// Apply voice state updates; return the command a message carries.
    fn dispatch(&self, line: &str) -> Option<(GuildId, UserId, Command)> {
        if line.trim().is_empty() {
            return None;
        }
        match line.parse::<ConsoleEvent>() {
            Ok(ConsoleEvent::VoiceState {
                guild_id,
                user_id,
                channel_id,
            }) => {
                self.directory.update(guild_id, user_id, channel_id);
                None
            }
            Ok(ConsoleEvent::Message {
                guild_id,
                user_id,
                text,
            }) => Command::parse(&text).map(|command| (guild_id, user_id, command)),
            Err(e) => {
                warn!("Skipping console line {:?}: {}", line, e);
                None
            }
        }
    }
}
