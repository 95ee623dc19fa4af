//! Scripted mock device for unit and integration testing.
//!
//! [`MockBackend`] behaves like a controller on the other end of the cable:
//! it reassembles `Start`/`Cont` packets into messages, answers each `Ping`
//! with the next scripted status code (or `Idle` once the script runs out),
//! and records everything it receives so tests can assert on the exact
//! sequence sent by the host.

use std::collections::VecDeque;
use std::time::Duration;

use ukbdc_core::protocol::{Message, Packet, PacketKind, Reassembler, Status};

use super::{Endpoints, UsbBackend, UsbError};

/// Bulk OUT endpoint address used by the mock.
pub const MOCK_EP_OUT: u8 = 0x03;
/// Bulk IN endpoint address used by the mock.
pub const MOCK_EP_IN: u8 = 0x82;

/// A mock implementation of [`UsbBackend`] emulating the controller firmware.
#[derive(Debug)]
pub struct MockBackend {
    present: bool,
    max_packet_size: usize,
    claim_failures: usize,
    fail_reads: bool,
    statuses: VecDeque<u8>,

    open: bool,
    claimed: bool,
    kernel_driver_detached: bool,
    claim_attempts: usize,
    release_count: usize,
    ping_pending: bool,

    packets: Vec<Vec<u8>>,
    messages: Vec<Message>,
    reassembler: Reassembler,
}

impl MockBackend {
    /// A connected device with 64-byte endpoints that always reports `Idle`.
    pub fn new() -> Self {
        Self {
            present: true,
            max_packet_size: 64,
            claim_failures: 0,
            fail_reads: false,
            statuses: VecDeque::new(),
            open: false,
            claimed: false,
            kernel_driver_detached: false,
            claim_attempts: 0,
            release_count: 0,
            ping_pending: false,
            packets: Vec::new(),
            messages: Vec::new(),
            reassembler: Reassembler::new(),
        }
    }

    /// No device is connected.
    pub fn absent() -> Self {
        Self {
            present: false,
            ..Self::new()
        }
    }

    pub fn with_max_packet_size(mut self, size: usize) -> Self {
        self.max_packet_size = size;
        self
    }

    /// The first `n` claim attempts fail as if another driver held the interface.
    pub fn with_claim_failures(mut self, n: usize) -> Self {
        self.claim_failures = n;
        self
    }

    /// Every status read times out.
    pub fn with_read_timeouts(mut self) -> Self {
        self.fail_reads = true;
        self
    }

    /// Appends statuses to the reply script, in order.
    pub fn with_statuses(mut self, statuses: impl IntoIterator<Item = Status>) -> Self {
        self.statuses.extend(statuses.into_iter().map(|s| s.code()));
        self
    }

    /// Raw packets written to the OUT endpoint, in order.
    pub fn packets(&self) -> &[Vec<u8>] {
        &self.packets
    }

    /// Complete messages reassembled from the packet stream, in order.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Number of `Ping` packets received.
    pub fn ping_count(&self) -> usize {
        self.packets
            .iter()
            .filter(|p| p.first() == Some(&(PacketKind::Ping as u8)))
            .count()
    }

    /// Number of `Reset` packets received.
    pub fn reset_count(&self) -> usize {
        self.packets
            .iter()
            .filter(|p| p.first() == Some(&(PacketKind::Reset as u8)))
            .count()
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn is_claimed(&self) -> bool {
        self.claimed
    }

    pub fn kernel_driver_detached(&self) -> bool {
        self.kernel_driver_detached
    }

    pub fn claim_attempts(&self) -> usize {
        self.claim_attempts
    }

    pub fn release_count(&self) -> usize {
        self.release_count
    }

    /// Statuses left unread in the script.
    pub fn remaining_statuses(&self) -> usize {
        self.statuses.len()
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl UsbBackend for MockBackend {
    fn open(&mut self, vendor_id: u16, product_id: u16) -> Result<(), UsbError> {
        if !self.present {
            return Err(UsbError::NotFound {
                vendor_id,
                product_id,
            });
        }
        self.open = true;
        Ok(())
    }

    fn endpoints(&self, _interface: u8) -> Result<Endpoints, UsbError> {
        if !self.open {
            return Err(UsbError::NotOpen);
        }
        Ok(Endpoints {
            ep_in: MOCK_EP_IN,
            ep_out: MOCK_EP_OUT,
            in_max_packet_size: self.max_packet_size,
            out_max_packet_size: self.max_packet_size,
        })
    }

    fn claim_interface(&mut self, _interface: u8) -> Result<(), UsbError> {
        self.claim_attempts += 1;
        if self.claim_failures > 0 {
            self.claim_failures -= 1;
            return Err(UsbError::Busy);
        }
        self.claimed = true;
        Ok(())
    }

    fn detach_kernel_driver(&mut self, _interface: u8) -> Result<(), UsbError> {
        self.kernel_driver_detached = true;
        Ok(())
    }

    fn release_interface(&mut self, _interface: u8) -> Result<(), UsbError> {
        self.release_count += 1;
        self.claimed = false;
        Ok(())
    }

    fn write_bulk(&mut self, endpoint: u8, data: &[u8], _timeout: Duration) -> Result<usize, UsbError> {
        if !self.claimed {
            return Err(UsbError::Other("interface not claimed".to_string()));
        }
        if endpoint != MOCK_EP_OUT {
            return Err(UsbError::Other(format!("write to endpoint {endpoint:#04x}")));
        }
        if data.len() > self.max_packet_size {
            return Err(UsbError::Other(format!("oversize packet of {} bytes", data.len())));
        }
        self.packets.push(data.to_vec());

        let packet = Packet::parse(data).map_err(|e| UsbError::Other(e.to_string()))?;
        if packet.kind == PacketKind::Ping {
            self.ping_pending = true;
        }
        match self.reassembler.push_message(&packet) {
            Ok(Some(message)) => self.messages.push(message),
            Ok(None) => {}
            Err(e) => return Err(UsbError::Other(e.to_string())),
        }
        Ok(data.len())
    }

    fn read_bulk(&mut self, endpoint: u8, buf: &mut [u8], _timeout: Duration) -> Result<usize, UsbError> {
        if endpoint != MOCK_EP_IN {
            return Err(UsbError::Other(format!("read from endpoint {endpoint:#04x}")));
        }
        if self.fail_reads || !self.ping_pending || buf.len() < 2 {
            return Err(UsbError::Timeout);
        }
        self.ping_pending = false;
        let status = self.statuses.pop_front().unwrap_or(Status::Idle.code());
        buf[0] = PacketKind::Ping as u8;
        buf[1] = status;
        Ok(2)
    }

    fn close(&mut self) {
        self.open = false;
    }
}
