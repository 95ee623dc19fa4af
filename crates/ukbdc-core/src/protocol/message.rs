//! Application messages carried over the packet layer.
//!
//! A message is `[opcode:1][payload:N]`.  It only exists transiently: the
//! chunker splits it into one `Start` packet and zero or more `Cont` packets.
//!
//! | Opcode | Message            | Payload                         |
//! |--------|--------------------|---------------------------------|
//! | `0x00` | `Dfu`              | empty – reboot into bootloader  |
//! | `0x01` | `WritePage`        | `[page_index:u8][page:128]`     |
//! | `0x02` | `ActivateLayout`   | empty                           |
//! | `0x03` | `DeactivateLayout` | empty                           |

use crate::protocol::packet::ProtocolError;

/// Size of one device-memory programming page.
pub const PAGE_SIZE: usize = 128;

/// Highest number of pages a binary may span (the page index is one byte).
pub const MAX_PAGES: usize = 255;

/// One page of device memory.
pub type Page = [u8; PAGE_SIZE];

/// Message opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    Dfu = 0x00,
    WritePage = 0x01,
    ActivateLayout = 0x02,
    DeactivateLayout = 0x03,
}

impl TryFrom<u8> for MessageType {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x00 => Ok(MessageType::Dfu),
            0x01 => Ok(MessageType::WritePage),
            0x02 => Ok(MessageType::ActivateLayout),
            0x03 => Ok(MessageType::DeactivateLayout),
            other => Err(ProtocolError::UnknownOpcode(other)),
        }
    }
}

/// A message understood by the controller firmware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Jump into the DFU bootloader.
    Dfu,
    /// Flash one page of the layout area.
    WritePage { index: u8, page: Box<Page> },
    /// Start using the layout stored in flash.
    ActivateLayout,
    /// Stop using the stored layout while it is being rewritten.
    DeactivateLayout,
}

impl Message {
    pub fn message_type(&self) -> MessageType {
        match self {
            Message::Dfu => MessageType::Dfu,
            Message::WritePage { .. } => MessageType::WritePage,
            Message::ActivateLayout => MessageType::ActivateLayout,
            Message::DeactivateLayout => MessageType::DeactivateLayout,
        }
    }

    /// Builds a `WritePage`, zero-padding `data` to a full page.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Overflow`] if `data` is longer than a page.
    pub fn write_page(index: u8, data: &[u8]) -> Result<Self, ProtocolError> {
        if data.len() > PAGE_SIZE {
            return Err(ProtocolError::Overflow {
                len: data.len(),
                max: PAGE_SIZE,
            });
        }
        let mut page = Box::new([0u8; PAGE_SIZE]);
        page[..data.len()].copy_from_slice(data);
        Ok(Message::WritePage { index, page })
    }

    /// Serialises the message as `opcode ++ payload`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = vec![self.message_type() as u8];
        if let Message::WritePage { index, page } = self {
            buf.reserve(1 + PAGE_SIZE);
            buf.push(*index);
            buf.extend_from_slice(page.as_slice());
        }
        buf
    }

    /// Parses a reassembled message.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::UnknownOpcode`] or [`ProtocolError::Truncated`]
    /// for malformed input.
    pub fn parse(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let (&opcode, payload) = bytes.split_first().ok_or(ProtocolError::Truncated {
            what: "message",
            needed: 1,
            available: 0,
        })?;
        match MessageType::try_from(opcode)? {
            MessageType::Dfu => Ok(Message::Dfu),
            MessageType::ActivateLayout => Ok(Message::ActivateLayout),
            MessageType::DeactivateLayout => Ok(Message::DeactivateLayout),
            MessageType::WritePage => {
                if payload.len() != 1 + PAGE_SIZE {
                    return Err(ProtocolError::Truncated {
                        what: "WritePage",
                        needed: 1 + PAGE_SIZE,
                        available: payload.len(),
                    });
                }
                Message::write_page(payload[0], &payload[1..])
            }
        }
    }
}

/// Splits a device binary into zero-padded 128-byte pages.
///
/// # Errors
///
/// Returns [`ProtocolError::PageOverflow`] if more than [`MAX_PAGES`] pages
/// are needed.
pub fn paginate(binary: &[u8]) -> Result<Vec<Message>, ProtocolError> {
    let pages = binary.len().div_ceil(PAGE_SIZE);
    if pages > MAX_PAGES {
        return Err(ProtocolError::PageOverflow {
            len: binary.len(),
            pages,
        });
    }
    binary
        .chunks(PAGE_SIZE)
        .enumerate()
        .map(|(index, chunk)| Message::write_page(index as u8, chunk))
        .collect()
}
