//! CRC16 used to protect messages split across several USB packets.
//!
//! The checksum is computed over the whole message (opcode byte followed by
//! the payload) before it is chunked, and travels in the `Start` packet.
//!
//! The controller firmware uses the reflected 0x8005 polynomial with an
//! initial value of `0xFFFF` and no final XOR (the avr-libc `_crc16_update`
//! routine seeded with `0xFFFF`), catalogued as CRC-16/MODBUS.  This is a
//! wire contract: changing it breaks compatibility with deployed devices.

use crc::{Crc, CRC_16_MODBUS};

const CRC16: Crc<u16> = Crc::<u16>::new(&CRC_16_MODBUS);

/// Computes the message checksum of `bytes`.
///
/// # Examples
///
/// ```rust
/// use ukbdc_core::protocol::crc::crc16;
///
/// assert_eq!(crc16(b"123456789"), 0x4B37);
/// ```
pub fn crc16(bytes: &[u8]) -> u16 {
    CRC16.checksum(bytes)
}
