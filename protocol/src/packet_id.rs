use crate::error::ProtocolError;

macro_rules! packet_ids {
    ($($name:ident = $val:expr),* $(,)?) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub(crate) enum PacketId { $($name = $val,)* }

        impl PacketId {
            pub(crate) const fn as_u8(self) -> u8 { self as u8 }
        }

        impl TryFrom<u8> for PacketId {
            type Error = ProtocolError;

            fn try_from(value: u8) -> Result<Self, Self::Error> {
                match value {
                    $($val => Ok(Self::$name),)*
                    _ => Err(ProtocolError::UnknownPacketId(value)),
                }
            }
        }
    };
}

packet_ids! {
    // Session state (0x50-0x5F)
    Speaking = 0x51,

    // Audio (0x60+)
    VoiceData = 0x61,
}
