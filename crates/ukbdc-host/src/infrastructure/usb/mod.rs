//! USB transport infrastructure.
//!
//! The controller exposes one vendor-specific interface with a bulk OUT
//! endpoint (host → device packets) and a bulk IN endpoint (status replies).
//! Everything above this module talks to the device through the
//! [`UsbBackend`] trait, which covers exactly the primitives the protocol
//! needs: open by vendor/product ID, claim/release the interface, look up the
//! two endpoints, and blocking bulk transfers with a timeout.
//!
//! # Testability
//!
//! The production implementation is [`rusb_backend::RusbBackend`] (libusb via
//! `rusb`).  Tests use [`mock::MockBackend`], which emulates the firmware's
//! packet reassembly and replies to status pings from a script.

use std::time::Duration;

use thiserror::Error;

pub mod mock;
pub mod rusb_backend;

/// Errors reported by a [`UsbBackend`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UsbError {
    /// No device with the requested vendor/product ID is connected.
    #[error("no device {vendor_id:04x}:{product_id:04x} found")]
    NotFound { vendor_id: u16, product_id: u16 },

    /// The interface is claimed by another driver or process.
    #[error("interface busy")]
    Busy,

    /// The OS refused access to the device.
    #[error("access denied")]
    Access,

    /// A transfer did not complete before its deadline.
    #[error("transfer timed out")]
    Timeout,

    /// An operation needed an open device.
    #[error("device not open")]
    NotOpen,

    /// The interface lacks an endpoint for the given direction.
    #[error("interface {interface} has no {direction} endpoint")]
    MissingEndpoint {
        interface: u8,
        direction: &'static str,
    },

    /// Any other libusb failure.
    #[error("usb error: {0}")]
    Other(String),
}

/// Addresses and packet sizes of the interface's two bulk endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Endpoints {
    pub ep_in: u8,
    pub ep_out: u8,
    pub in_max_packet_size: usize,
    /// Negotiated packet size used for chunking outgoing messages.
    pub out_max_packet_size: usize,
}

/// Blocking USB primitives needed by the device session.
#[cfg_attr(test, mockall::automock)]
pub trait UsbBackend {
    /// Opens the first device matching `vendor_id`/`product_id`.
    fn open(&mut self, vendor_id: u16, product_id: u16) -> Result<(), UsbError>;

    /// Looks up the bulk IN/OUT endpoints of `interface` (alternate setting 0).
    fn endpoints(&self, interface: u8) -> Result<Endpoints, UsbError>;

    fn claim_interface(&mut self, interface: u8) -> Result<(), UsbError>;

    /// Detaches whatever kernel driver currently holds `interface`.
    fn detach_kernel_driver(&mut self, interface: u8) -> Result<(), UsbError>;

    fn release_interface(&mut self, interface: u8) -> Result<(), UsbError>;

    /// Writes one packet; returns the number of bytes written.
    fn write_bulk(&mut self, endpoint: u8, data: &[u8], timeout: Duration) -> Result<usize, UsbError>;

    /// Reads one packet into `buf`; returns the number of bytes read.
    fn read_bulk(&mut self, endpoint: u8, buf: &mut [u8], timeout: Duration) -> Result<usize, UsbError>;

    /// Closes the device handle.  Closing an unopened backend is a no-op.
    fn close(&mut self);
}
