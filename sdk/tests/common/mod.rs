#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use radiocast_sdk::decoder::URL_PLACEHOLDER;
use radiocast_sdk::{
    ChannelId, DecoderCommand, Frame, GuildId, PipelineConfig, SessionRegistry, TransportError,
    UserId, VoiceConnection, VoiceDirectory, VoiceTransport,
};

/// Everything the fake transport saw, in order, across all connections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Joined { connection: u64, guild: GuildId, channel: ChannelId },
    Speaking { connection: u64, speaking: bool },
    /// First sample of the frame identifies the source.
    Frame { connection: u64, first_sample: i16 },
    Disconnected { connection: u64 },
}

pub type EventLog = Arc<Mutex<Vec<Event>>>;

#[derive(Default)]
pub struct FakeDirectory {
    channels: Mutex<HashMap<(GuildId, UserId), ChannelId>>,
}

impl FakeDirectory {
    pub fn place(&self, guild: GuildId, user: UserId, channel: ChannelId) {
        self.channels.lock().unwrap().insert((guild, user), channel);
    }
}

#[async_trait]
impl VoiceDirectory for FakeDirectory {
    async fn voice_channel_of(&self, guild_id: GuildId, user_id: UserId) -> Option<ChannelId> {
        self.channels.lock().unwrap().get(&(guild_id, user_id)).copied()
    }
}

#[derive(Default)]
pub struct FakeTransport {
    pub events: EventLog,
    next_connection: AtomicU64,
    unreachable: Mutex<HashSet<ChannelId>>,
}

impl FakeTransport {
    pub fn refuse(&self, channel: ChannelId) {
        self.unreachable.lock().unwrap().insert(channel);
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl VoiceTransport for FakeTransport {
    async fn join(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<Arc<dyn VoiceConnection>, TransportError> {
        if self.unreachable.lock().unwrap().contains(&channel_id) {
            return Err(TransportError::ConnectionFailed("voice server unreachable".to_string()));
        }
        let id = self.next_connection.fetch_add(1, Ordering::SeqCst);
        self.events.lock().unwrap().push(Event::Joined {
            connection: id,
            guild: guild_id,
            channel: channel_id,
        });
        Ok(Arc::new(FakeConnection {
            id,
            channel_id,
            events: Arc::clone(&self.events),
            closed: AtomicBool::new(false),
        }))
    }
}

struct FakeConnection {
    id: u64,
    channel_id: ChannelId,
    events: EventLog,
    closed: AtomicBool,
}

#[async_trait]
impl VoiceConnection for FakeConnection {
    fn channel_id(&self) -> ChannelId {
        self.channel_id
    }

    fn set_speaking(&self, speaking: bool) {
        self.events.lock().unwrap().push(Event::Speaking {
            connection: self.id,
            speaking,
        });
    }

    async fn send_frame(&self, frame: Frame) -> Result<(), TransportError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Disconnected);
        }
        self.events.lock().unwrap().push(Event::Frame {
            connection: self.id,
            first_sample: frame.samples()[0],
        });
        // Stand-in for real-time pacing.
        tokio::time::sleep(Duration::from_millis(1)).await;
        Ok(())
    }

    async fn disconnect(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.events.lock().unwrap().push(Event::Disconnected { connection: self.id });
    }
}

/// `yes <url>` repeats the two bytes `<url>\n` forever, so a one-letter
/// source yields frames whose samples all equal `sample_of(letter)`.
pub fn endless_decoder() -> DecoderCommand {
    DecoderCommand::new("yes", [URL_PLACEHOLDER])
}

pub fn sample_of(letter: u8) -> i16 {
    i16::from_le_bytes([letter, b'\n'])
}

pub struct Harness {
    pub directory: Arc<FakeDirectory>,
    pub transport: Arc<FakeTransport>,
    pub registry: SessionRegistry,
}

impl Harness {
    pub fn new(decoder: DecoderCommand) -> Self {
        let directory = Arc::new(FakeDirectory::default());
        let transport = Arc::new(FakeTransport::default());
        let registry = SessionRegistry::new(
            directory.clone(),
            transport.clone(),
            decoder,
            PipelineConfig::default(),
        );
        Self {
            directory,
            transport,
            registry,
        }
    }

    /// Wait until at least `count` frames from `source` were delivered.
    pub async fn wait_for_frames(&self, source: i16, count: usize) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        loop {
            let seen = self
                .transport
                .events()
                .iter()
                .filter(|e| {
                    matches!(e, Event::Frame { first_sample, .. } if *first_sample == source)
                })
                .count();
            if seen >= count {
                return;
            }
            assert!(tokio::time::Instant::now() < deadline, "timed out waiting for frames");
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

/// Live `yes <source>` processes spawned by this test binary.
#[cfg(target_os = "linux")]
pub fn decoders_running(source: &str) -> usize {
    let parent = std::process::id().to_string();
    let Ok(entries) = std::fs::read_dir("/proc") else {
        return 0;
    };
    entries
        .filter_map(Result::ok)
        .filter(|entry| {
            let Ok(stat) = std::fs::read_to_string(entry.path().join("stat")) else {
                return false;
            };
            // After the parenthesised command name: state, then parent pid.
            let Some((_, rest)) = stat.rsplit_once(')') else {
                return false;
            };
            let mut fields = rest.split_whitespace();
            let state = fields.next();
            let ppid = fields.next();
            state != Some("Z") && ppid == Some(parent.as_str())
        })
        .filter(|entry| {
            std::fs::read(entry.path().join("cmdline")).is_ok_and(|cmdline| {
                cmdline
                    .split(|&b| b == 0)
                    .filter(|arg| !arg.is_empty())
                    .eq([b"yes".as_slice(), source.as_bytes()])
            })
        })
        .count()
}

/// Highest number of connections marked speaking at the same moment.
pub fn max_concurrent_speakers(events: &[Event]) -> usize {
    let mut speaking = HashSet::new();
    let mut max = 0;
    for event in events {
        if let Event::Speaking { connection, speaking: on } = event {
            if *on {
                // A connection that is already speaking counts as a second pipeline.
                if !speaking.insert(*connection) {
                    return usize::MAX;
                }
            } else {
                speaking.remove(connection);
            }
            max = max.max(speaking.len());
        }
    }
    max
}
