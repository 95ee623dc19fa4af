//! Fixed-size USB packets exchanged with the controller.
//!
//! Wire format of every packet:
//! ```text
//! [opcode:1][payload:N]        N <= max_packet_size - 1
//! ```
//!
//! | Opcode | Packet  | Payload                                  |
//! |--------|---------|------------------------------------------|
//! | `0x00` | `Ping`  | empty – asks the device for its status   |
//! | `0x02` | `Start` | `[total_len:u8][crc16:u16 LE][chunk]`    |
//! | `0x03` | `Cont`  | next chunk of the message                |
//! | `0x04` | `Reset` | empty – abandon any half-received message|
//!
//! The maximum packet size is negotiated by the transport (the OUT
//! endpoint's `wMaxPacketSize`); this module only enforces it.

use thiserror::Error;

/// Size of the `[total_len][crc16]` prefix of a `Start` payload.
pub const START_PREFIX_SIZE: usize = 3;

/// Errors raised while framing, chunking or reassembling packets.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// A packet would not fit the negotiated endpoint size.
    #[error("packet of {len} bytes exceeds max packet size {max}")]
    Overflow { len: usize, max: usize },

    /// The negotiated packet size cannot carry a `Start` packet.
    #[error("max packet size {0} is too small for the framing protocol")]
    PacketSizeTooSmall(usize),

    /// A message is longer than the 8-bit total-length field allows.
    #[error("message of {0} bytes exceeds the 255-byte message limit")]
    MessageTooLong(usize),

    /// A binary needs more pages than an 8-bit page index can address.
    #[error("binary of {len} bytes needs {pages} pages, at most 255 allowed")]
    PageOverflow { len: usize, pages: usize },

    /// A `Cont` packet arrived with no message in progress.
    #[error("continuation packet without a preceding start packet")]
    UnexpectedCont,

    /// A reassembled message does not match the checksum in its `Start` packet.
    #[error("crc mismatch: expected 0x{expected:04X}, computed 0x{computed:04X}")]
    CrcMismatch { expected: u16, computed: u16 },

    /// A packet or message is shorter than its format requires.
    #[error("truncated {what}: need at least {needed} bytes, got {available}")]
    Truncated {
        what: &'static str,
        needed: usize,
        available: usize,
    },

    /// The opcode byte is not a known packet or message type.
    #[error("unknown opcode: 0x{0:02X}")]
    UnknownOpcode(u8),
}

/// Packet opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PacketKind {
    Ping = 0x00,
    Start = 0x02,
    Cont = 0x03,
    Reset = 0x04,
}

impl TryFrom<u8> for PacketKind {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x00 => Ok(PacketKind::Ping),
            0x02 => Ok(PacketKind::Start),
            0x03 => Ok(PacketKind::Cont),
            0x04 => Ok(PacketKind::Reset),
            other => Err(ProtocolError::UnknownOpcode(other)),
        }
    }
}

/// One USB packet: an opcode and its payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub kind: PacketKind,
    pub payload: Vec<u8>,
}

impl Packet {
    pub fn ping() -> Self {
        Self {
            kind: PacketKind::Ping,
            payload: Vec::new(),
        }
    }

    pub fn reset() -> Self {
        Self {
            kind: PacketKind::Reset,
            payload: Vec::new(),
        }
    }

    /// First packet of a message: total length, checksum and the first chunk.
    pub fn start(total_len: u8, crc: u16, first_chunk: &[u8]) -> Self {
        let mut payload = Vec::with_capacity(START_PREFIX_SIZE + first_chunk.len());
        payload.push(total_len);
        payload.extend_from_slice(&crc.to_le_bytes());
        payload.extend_from_slice(first_chunk);
        Self {
            kind: PacketKind::Start,
            payload,
        }
    }

    pub fn cont(chunk: &[u8]) -> Self {
        Self {
            kind: PacketKind::Cont,
            payload: chunk.to_vec(),
        }
    }

    /// Total size on the wire, opcode included.
    pub fn len(&self) -> usize {
        1 + self.payload.len()
    }

    /// A packet always carries at least its opcode.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Serialises the packet, refusing anything larger than `max_packet_size`.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Overflow`]; oversize packets are never
    /// truncated.
    pub fn frame(&self, max_packet_size: usize) -> Result<Vec<u8>, ProtocolError> {
        if self.len() > max_packet_size {
            return Err(ProtocolError::Overflow {
                len: self.len(),
                max: max_packet_size,
            });
        }
        let mut buf = Vec::with_capacity(self.len());
        buf.push(self.kind as u8);
        buf.extend_from_slice(&self.payload);
        Ok(buf)
    }

    /// Parses a packet received from the wire.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Truncated`] for an empty buffer and
    /// [`ProtocolError::UnknownOpcode`] for an unknown opcode.
    pub fn parse(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let (&opcode, payload) = bytes.split_first().ok_or(ProtocolError::Truncated {
            what: "packet",
            needed: 1,
            available: 0,
        })?;
        Ok(Self {
            kind: PacketKind::try_from(opcode)?,
            payload: payload.to_vec(),
        })
    }
}
