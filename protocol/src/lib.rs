mod error;
mod io;
mod packet;
mod packet_id;

pub use error::ProtocolError;
pub use packet::Packet;
