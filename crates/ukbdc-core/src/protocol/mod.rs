//! USB framing protocol: packets, messages, chunking and device status.

pub mod chunker;
pub mod crc;
pub mod message;
pub mod packet;
pub mod status;

pub use chunker::{chunk_bytes, chunk_message, Reassembler};
pub use message::{paginate, Message, MessageType, Page, PAGE_SIZE};
pub use packet::{Packet, PacketKind, ProtocolError};
pub use status::Status;
