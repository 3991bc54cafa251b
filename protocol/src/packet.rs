use crate::error::ProtocolError;
use crate::io::{Reader, Writer};
use crate::packet_id::PacketId;

/// Packets sent from a voice connection to the relay.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Packet {
    /// Speaking indicator for the stream identified by `ssrc`.
    Speaking {
        ssrc: u64,
        speaking: bool,
    },

    /// One Opus-encoded 20ms frame.
    VoiceData {
        ssrc: u64,
        sequence: u32,
        timestamp: u32,
        data: Vec<u8>,
    },
}

impl Packet {
    /// Encode packet to wire format.
    ///
    /// Format: `[packet_id: u8][payload_len: u16][payload...]`
    ///
    /// # Panics
    /// Panics if the payload exceeds 65535 bytes.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut w = Writer::with_capacity(self.encoded_len_hint());
        w.write_u8(self.id());

        let len_pos = w.reserve_u16();
        let payload_start = w.position();

        match self {
            Self::Speaking { ssrc, speaking } => {
                w.write_u64(*ssrc);
                w.write_bool(*speaking);
            }
            Self::VoiceData {
                ssrc,
                sequence,
                timestamp,
                data,
            } => {
                w.write_u64(*ssrc);
                w.write_u32(*sequence);
                w.write_u32(*timestamp);
                w.write_bytes(data);
            }
        }

        w.write_u16_at(
            len_pos,
            (w.position() - payload_start)
                .try_into()
                .expect("payload too large"),
        );
        w.into_vec()
    }

    /// Decode packet from wire format.
    ///
    /// Returns decoded packet and number of bytes consumed from the buffer.
    ///
    /// # Errors
    /// Returns error if buffer is incomplete or contains invalid data.
    pub fn decode(buf: &[u8]) -> Result<(Self, usize), ProtocolError> {
        let mut header = Reader::new(buf);
        let packet_id = PacketId::try_from(header.read_u8()?)?;
        let payload_len = header.read_u16()? as usize;
        let remaining = header.remaining();

        if remaining.len() < payload_len {
            return Err(ProtocolError::IncompletePayload {
                expected: payload_len,
                got: remaining.len(),
            });
        }

        let mut r = Reader::new(&remaining[..payload_len]);

        let packet = match packet_id {
            PacketId::Speaking => Self::Speaking {
                ssrc: r.read_u64()?,
                speaking: r.read_bool()?,
            },
            PacketId::VoiceData => Self::VoiceData {
                ssrc: r.read_u64()?,
                sequence: r.read_u32()?,
                timestamp: r.read_u32()?,
                data: r.remaining().to_vec(),
            },
        };

        Ok((packet, header.position() + payload_len))
    }

    /// Returns the packet type ID.
    #[must_use]
    pub fn id(&self) -> u8 {
        match self {
            Self::Speaking { .. } => PacketId::Speaking,
            Self::VoiceData { .. } => PacketId::VoiceData,
        }
        .as_u8()
    }

    fn encoded_len_hint(&self) -> usize {
        const HEADER: usize = 3;
        match self {
            Self::Speaking { .. } => HEADER + 9,
            Self::VoiceData { data, .. } => HEADER + 16 + data.len(),
        }
    }
}
