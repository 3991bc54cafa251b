//! Voice transport sending Opus frames to a UDP voice relay.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use opus::{Application, Bitrate, Channels};
use radiocast_protocol::Packet;
use radiocast_sdk::audio::{FRAME_DURATION_MS, FRAME_SIZE, SAMPLE_RATE};
use radiocast_sdk::{ChannelId, Frame, GuildId, TransportError, VoiceConnection, VoiceTransport};
use tokio::net::UdpSocket;
use tokio::runtime::Handle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Largest Opus packet we ask the encoder for.
const MAX_OPUS_PACKET: usize = 4000;

/// How far sending may fall behind the clock before pacing restarts from now.
const MAX_LAG: Duration = Duration::from_millis(100);

const FRAME_PERIOD: Duration = Duration::from_millis(FRAME_DURATION_MS);

/// Stream identifier of a guild's connection to one channel.
#[must_use]
pub fn ssrc_for(guild_id: GuildId, channel_id: ChannelId) -> u64 {
    guild_id.get().rotate_left(32) ^ channel_id.get()
}

/// Opus-encodes stereo frames into voice packets.
pub struct FrameEncoder {
    encoder: opus::Encoder,
    sequence: u32,
    timestamp: u32,
}

impl FrameEncoder {
    /// # Errors
    /// [`TransportError::Encode`] if the encoder rejects the settings.
    pub fn new(bitrate: i32) -> Result<Self, TransportError> {
        let mut encoder = opus::Encoder::new(SAMPLE_RATE, Channels::Stereo, Application::Audio)
            .map_err(|e| TransportError::Encode(format!("opus error: {e}")))?;

        encoder
            .set_bitrate(Bitrate::Bits(bitrate))
            .map_err(|e| TransportError::Encode(format!("invalid bitrate {bitrate}: {e}")))?;

        Ok(FrameEncoder {
            encoder,
            sequence: 0,
            timestamp: 0,
        })
    }

    /// Sequence number the next packet will carry.
    #[must_use]
    pub fn sequence(&self) -> u32 {
        self.sequence
    }

    /// RTP-style timestamp, in samples per channel, of the next packet.
    #[must_use]
    pub fn timestamp(&self) -> u32 {
        self.timestamp
    }

    /// Encode one interleaved stereo frame.
    ///
    /// # Errors
    /// [`TransportError::Encode`] if Opus fails on the frame.
    pub fn encode(&mut self, ssrc: u64, frame: &Frame) -> Result<Packet, TransportError> {
        let mut data = vec![0u8; MAX_OPUS_PACKET];
        let encoded_size = self
            .encoder
            .encode(frame.samples(), &mut data)
            .map_err(|e| TransportError::Encode(format!("failed to encode Opus frame: {e}")))?;
        data.truncate(encoded_size);

        let packet = Packet::VoiceData {
            ssrc,
            sequence: self.sequence,
            timestamp: self.timestamp,
            data,
        };

        self.sequence = self.sequence.wrapping_add(1);
        #[allow(clippy::cast_possible_truncation)]
        {
            self.timestamp = self.timestamp.wrapping_add(FRAME_SIZE as u32);
        }

        Ok(packet)
    }
}

/// Spaces frames 20ms apart against a monotonic schedule.
#[derive(Debug, Default)]
pub struct Pacer {
    next: Option<Instant>,
}

impl Pacer {
    /// Forget the schedule; the next frame starts a new one.
    pub fn reset(&mut self) {
        self.next = None;
    }

    /// Called after a frame went out at `now`. Returns when the next one is due.
    pub fn advance(&mut self, now: Instant) -> Instant {
        let next = match self.next {
            Some(next) if now.saturating_duration_since(next) <= MAX_LAG => next + FRAME_PERIOD,
            Some(_) => {
                debug!("Fell behind the frame schedule, resyncing");
                now + FRAME_PERIOD
            }
            None => now + FRAME_PERIOD,
        };
        self.next = Some(next);
        next
    }
}

struct SendState {
    encoder: FrameEncoder,
    pacer: Pacer,
}

/// Joins voice channels by opening a UDP flow to the relay.
pub struct UdpVoiceTransport {
    relay_addr: String,
    bitrate: i32,
}

impl UdpVoiceTransport {
    pub fn new(relay_addr: impl Into<String>, bitrate: i32) -> Self {
        Self {
            relay_addr: relay_addr.into(),
            bitrate,
        }
    }
}

#[async_trait]
impl VoiceTransport for UdpVoiceTransport {
    async fn join(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<Arc<dyn VoiceConnection>, TransportError> {
        let socket = UdpSocket::bind("0.0.0.0:0")
            .await
            .map_err(|e| TransportError::ConnectionFailed(format!("bind failed: {e}")))?;
        socket.connect(self.relay_addr.as_str()).await.map_err(|e| {
            TransportError::ConnectionFailed(format!("relay {}: {e}", self.relay_addr))
        })?;

        let ssrc = ssrc_for(guild_id, channel_id);
        let encoder = FrameEncoder::new(self.bitrate)?;

        info!(
            "[guild {}] Voice connection to {} opened, ssrc={:#x}",
            guild_id, self.relay_addr, ssrc
        );

        Ok(Arc::new(UdpVoiceConnection {
            socket: Arc::new(socket),
            guild_id,
            channel_id,
            ssrc,
            state: Mutex::new(SendState {
                encoder,
                pacer: Pacer::default(),
            }),
            closed: AtomicBool::new(false),
        }))
    }
}

pub struct UdpVoiceConnection {
    socket: Arc<UdpSocket>,
    guild_id: GuildId,
    channel_id: ChannelId,
    ssrc: u64,
    state: Mutex<SendState>,
    closed: AtomicBool,
}

impl UdpVoiceConnection {
    #[must_use]
    pub fn ssrc(&self) -> u64 {
        self.ssrc
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

#[async_trait]
impl VoiceConnection for UdpVoiceConnection {
    fn channel_id(&self) -> ChannelId {
        self.channel_id
    }

    fn set_speaking(&self, speaking: bool) {
        if self.is_closed() {
            return;
        }
        if speaking {
            if let Ok(mut state) = self.state.lock() {
                state.pacer.reset();
            }
        }

        let bytes = Packet::Speaking {
            ssrc: self.ssrc,
            speaking,
        }
        .encode();

        match self.socket.try_send(&bytes) {
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                // Socket not known writable yet; finish the send in the background.
                let Ok(runtime) = Handle::try_current() else {
                    warn!("[guild {}] Speaking state dropped: no runtime", self.guild_id);
                    return;
                };
                let socket = Arc::clone(&self.socket);
                let guild_id = self.guild_id;
                runtime.spawn(async move {
                    if let Err(e) = socket.send(&bytes).await {
                        warn!("[guild {}] Failed to send speaking state: {}", guild_id, e);
                    }
                });
            }
            Err(e) => warn!("[guild {}] Failed to send speaking state: {}", self.guild_id, e),
        }
    }

    async fn send_frame(&self, frame: Frame) -> Result<(), TransportError> {
        if self.is_closed() {
            return Err(TransportError::Disconnected);
        }

        let (bytes, next_due) = {
            let mut state = self
                .state
                .lock()
                .map_err(|_| TransportError::Encode("encoder state poisoned".to_string()))?;
            let packet = state.encoder.encode(self.ssrc, &frame)?;
            let next_due = state.pacer.advance(Instant::now());
            (packet.encode(), next_due)
        };

        self.socket
            .send(&bytes)
            .await
            .map_err(|e| TransportError::ConnectionFailed(format!("send failed: {e}")))?;

        tokio::time::sleep_until(next_due).await;
        Ok(())
    }

    async fn disconnect(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            info!("[guild {}] Voice connection closed", self.guild_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use radiocast_sdk::audio::{decode_frame, encode_samples, FRAME_SAMPLES};

    fn silent_frame() -> Frame {
        decode_frame(&encode_samples(&[0i16; FRAME_SAMPLES])).unwrap()
    }

    async fn relay() -> (UdpSocket, String) {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap().to_string();
        (socket, addr)
    }

    async fn recv_packet(relay: &UdpSocket) -> Packet {
        let mut buf = [0u8; 8192];
        let n = tokio::time::timeout(Duration::from_secs(5), relay.recv(&mut buf))
            .await
            .expect("relay received nothing")
            .unwrap();
        let (packet, consumed) = Packet::decode(&buf[..n]).unwrap();
        assert_eq!(consumed, n);
        packet
    }

    #[test]
    fn encoder_numbers_packets() {
        let mut encoder = FrameEncoder::new(96000).unwrap();
        let frame = silent_frame();

        let first = encoder.encode(9, &frame).unwrap();
        let second = encoder.encode(9, &frame).unwrap();

        let Packet::VoiceData { ssrc, sequence, timestamp, data } = first else {
            panic!("expected voice data");
        };
        assert_eq!((ssrc, sequence, timestamp), (9, 0, 0));
        assert!(!data.is_empty());
        assert!(matches!(second, Packet::VoiceData { sequence: 1, timestamp: 960, .. }));
        assert_eq!((encoder.sequence(), encoder.timestamp()), (2, 1920));
    }

    #[test]
    fn pacer_keeps_a_steady_schedule() {
        let start = Instant::now();
        let mut pacer = Pacer::default();

        assert_eq!(pacer.advance(start), start + FRAME_PERIOD);
        // Sending late but within the allowed lag keeps the schedule.
        let second = pacer.advance(start + Duration::from_millis(35));
        assert_eq!(second, start + FRAME_PERIOD * 2);
        assert_eq!(pacer.advance(second), start + FRAME_PERIOD * 3);
    }

    #[test]
    fn pacer_resyncs_after_a_stall() {
        let start = Instant::now();
        let mut pacer = Pacer::default();
        pacer.advance(start);

        let late = start + Duration::from_secs(1);
        assert_eq!(pacer.advance(late), late + FRAME_PERIOD);

        pacer.reset();
        let later = late + Duration::from_secs(1);
        assert_eq!(pacer.advance(later), later + FRAME_PERIOD);
    }

    #[test]
    fn ssrc_differs_per_guild_and_channel() {
        let a = ssrc_for(GuildId(1), ChannelId(2));
        assert_ne!(a, ssrc_for(GuildId(2), ChannelId(2)));
        assert_ne!(a, ssrc_for(GuildId(1), ChannelId(3)));
        assert_eq!(a, ssrc_for(GuildId(1), ChannelId(2)));
    }

    #[tokio::test]
    async fn connection_sends_speaking_and_voice_packets() {
        let (relay, addr) = relay().await;
        let transport = UdpVoiceTransport::new(addr, 96000);
        let connection = transport.join(GuildId(1), ChannelId(2)).await.unwrap();
        let ssrc = ssrc_for(GuildId(1), ChannelId(2));
        assert_eq!(connection.channel_id(), ChannelId(2));

        connection.set_speaking(true);
        assert_eq!(recv_packet(&relay).await, Packet::Speaking { ssrc, speaking: true });

        connection.send_frame(silent_frame()).await.unwrap();
        connection.send_frame(silent_frame()).await.unwrap();
        assert!(matches!(
            recv_packet(&relay).await,
            Packet::VoiceData { sequence: 0, timestamp: 0, ssrc: s, .. } if s == ssrc
        ));
        assert!(matches!(
            recv_packet(&relay).await,
            Packet::VoiceData { sequence: 1, timestamp: 960, .. }
        ));

        connection.set_speaking(false);
        assert_eq!(recv_packet(&relay).await, Packet::Speaking { ssrc, speaking: false });
    }

    #[tokio::test]
    async fn frames_are_paced_to_real_time() {
        let (_relay, addr) = relay().await;
        let connection = UdpVoiceTransport::new(addr, 96000)
            .join(GuildId(1), ChannelId(2))
            .await
            .unwrap();

        let started = std::time::Instant::now();
        for _ in 0..5 {
            connection.send_frame(silent_frame()).await.unwrap();
        }
        assert!(started.elapsed() >= FRAME_PERIOD * 5);
    }

    #[tokio::test]
    async fn disconnected_connection_rejects_frames() {
        let (_relay, addr) = relay().await;
        let connection = UdpVoiceTransport::new(addr, 96000)
            .join(GuildId(1), ChannelId(2))
            .await
            .unwrap();

        connection.disconnect().await;
        assert_eq!(
            connection.send_frame(silent_frame()).await,
            Err(TransportError::Disconnected)
        );
    }

    #[tokio::test]
    async fn bad_relay_address_fails_to_join() {
        let result = UdpVoiceTransport::new("no-port", 96000)
            .join(GuildId(1), ChannelId(2))
            .await;
        assert!(matches!(result, Err(TransportError::ConnectionFailed(_))));
    }
}
