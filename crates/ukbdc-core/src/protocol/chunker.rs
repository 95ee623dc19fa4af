//! Splitting messages into packets, and putting them back together.
//!
//! # Chunking (for beginners)
//!
//! USB bulk endpoints move data in packets of at most `P` bytes, where `P` is
//! the endpoint's negotiated maximum packet size (64 on full-speed devices).
//! A message such as `WritePage` (130 bytes) does not fit in one packet, so it
//! is cut into pieces:
//!
//! ```text
//! message M = opcode ++ payload, length L (at most 255)
//!
//! Start: [0x02][L][crc16(M) LE][M[0 .. P-4]]          <= P bytes
//! Cont:  [0x03][next P-1 bytes of M]                  <= P bytes
//! Cont:  ...                                          (last may be shorter)
//! ```
//!
//! The receiver knows the total length from the `Start` packet, appends
//! continuation chunks until it has `L` bytes, and then checks the CRC.
//! [`Reassembler`] implements that receiving side; the host uses it in tests
//! and in the mock device.

use tracing::trace;

use crate::protocol::crc::crc16;
use crate::protocol::message::Message;
use crate::protocol::packet::{Packet, PacketKind, ProtocolError, START_PREFIX_SIZE};

/// Bytes of a `Start` packet taken by the opcode and the length/CRC prefix.
const START_OVERHEAD: usize = 1 + START_PREFIX_SIZE;

/// Largest message the 8-bit length field can describe.
pub const MAX_MESSAGE_LEN: usize = u8::MAX as usize;

/// Splits `message` into a `Start` packet followed by `Cont` packets.
///
/// # Errors
///
/// - [`ProtocolError::PacketSizeTooSmall`] if `max_packet_size` cannot hold a
///   `Start` packet with at least one message byte.
/// - [`ProtocolError::MessageTooLong`] if the message exceeds [`MAX_MESSAGE_LEN`] bytes.
/// - [`ProtocolError::Overflow`] if any packet would exceed `max_packet_size`.
///
/// # Examples
///
/// ```rust
/// use ukbdc_core::protocol::{chunk_message, Message, PacketKind};
///
/// let packets = chunk_message(&Message::ActivateLayout, 64).unwrap();
/// assert_eq!(packets.len(), 1);
/// assert_eq!(packets[0].kind, PacketKind::Start);
/// ```
pub fn chunk_message(message: &Message, max_packet_size: usize) -> Result<Vec<Packet>, ProtocolError> {
    chunk_bytes(&message.to_bytes(), max_packet_size)
}

/// Splits already-serialised message bytes.  See [`chunk_message`].
///
/// # Errors
///
/// Same as [`chunk_message`].
pub fn chunk_bytes(message: &[u8], max_packet_size: usize) -> Result<Vec<Packet>, ProtocolError> {
    if max_packet_size <= START_OVERHEAD {
        return Err(ProtocolError::PacketSizeTooSmall(max_packet_size));
    }
    if message.len() > MAX_MESSAGE_LEN {
        return Err(ProtocolError::MessageTooLong(message.len()));
    }
    let total_len = message.len() as u8;

    let first_len = message.len().min(max_packet_size - START_OVERHEAD);
    let (first, rest) = message.split_at(first_len);

    let mut packets = Vec::with_capacity(1 + rest.len().div_ceil(max_packet_size - 1));
    packets.push(Packet::start(total_len, crc16(message), first));
    packets.extend(rest.chunks(max_packet_size - 1).map(Packet::cont));

    if let Some(oversize) = packets.iter().find(|p| p.len() > max_packet_size) {
        return Err(ProtocolError::Overflow {
            len: oversize.len(),
            max: max_packet_size,
        });
    }
    trace!(
        message_len = message.len(),
        packets = packets.len(),
        "chunked message"
    );
    Ok(packets)
}

/// Rebuilds messages from a stream of `Start`/`Cont` packets.
#[derive(Debug, Default)]
pub struct Reassembler {
    pending: Option<Pending>,
}

#[derive(Debug)]
struct Pending {
    total_len: usize,
    crc: u16,
    buf: Vec<u8>,
}

impl Reassembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// `true` while a message has started but not all bytes have arrived.
    pub fn in_progress(&self) -> bool {
        self.pending.is_some()
    }

    /// Drops any half-received message, as the `Reset` packet does.
    pub fn reset(&mut self) {
        self.pending = None;
    }

    /// Feeds one packet.  Returns the complete message bytes once the last
    /// chunk arrives and the checksum matches.
    ///
    /// `Ping` and `Reset` packets are not part of a message; `Reset` clears
    /// the pending state and both yield `Ok(None)`.
    ///
    /// # Errors
    ///
    /// - [`ProtocolError::UnexpectedCont`] for a `Cont` with nothing pending.
    /// - [`ProtocolError::CrcMismatch`] when the completed message is corrupt.
    /// - [`ProtocolError::Truncated`] for a `Start` without its prefix.
    /// - [`ProtocolError::Overflow`] if chunks exceed the announced length.
    pub fn push(&mut self, packet: &Packet) -> Result<Option<Vec<u8>>, ProtocolError> {
        match packet.kind {
            PacketKind::Ping => Ok(None),
            PacketKind::Reset => {
                self.reset();
                Ok(None)
            }
            PacketKind::Start => {
                let p = &packet.payload;
                if p.len() < START_PREFIX_SIZE {
                    return Err(ProtocolError::Truncated {
                        what: "start packet",
                        needed: START_PREFIX_SIZE,
                        available: p.len(),
                    });
                }
                let pending = Pending {
                    total_len: p[0] as usize,
                    crc: u16::from_le_bytes([p[1], p[2]]),
                    buf: p[START_PREFIX_SIZE..].to_vec(),
                };
                self.pending = Some(pending);
                self.try_complete()
            }
            PacketKind::Cont => {
                let pending = self.pending.as_mut().ok_or(ProtocolError::UnexpectedCont)?;
                pending.buf.extend_from_slice(&packet.payload);
                self.try_complete()
            }
        }
    }

    /// Feeds one packet and parses the completed message.
    ///
    /// # Errors
    ///
    /// Same as [`Reassembler::push`], plus message parsing errors.
    pub fn push_message(&mut self, packet: &Packet) -> Result<Option<Message>, ProtocolError> {
        self.push(packet)?.map(|bytes| Message::parse(&bytes)).transpose()
    }

    fn try_complete(&mut self) -> Result<Option<Vec<u8>>, ProtocolError> {
        let Some(pending) = self.pending.as_ref() else {
            return Ok(None);
        };
        if pending.buf.len() < pending.total_len {
            return Ok(None);
        }
        let Some(done) = self.pending.take() else {
            return Ok(None);
        };
        if done.buf.len() > done.total_len {
            return Err(ProtocolError::Overflow {
                len: done.buf.len(),
                max: done.total_len,
            });
        }
        let computed = crc16(&done.buf);
        if computed != done.crc {
            return Err(ProtocolError::CrcMismatch {
                expected: done.crc,
                computed,
            });
        }
        Ok(Some(done.buf))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
