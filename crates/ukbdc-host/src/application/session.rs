//! DeviceSession: the host side of the controller's USB protocol.
//!
//! # Session lifecycle (for beginners)
//!
//! ```text
//! DeviceSession ──attach()──►  AttachedSession  ──detach() / drop──►  DeviceSession
//!   (detached)                  (interface claimed,                    (detached)
//!                                Reset sent)
//! ```
//!
//! [`DeviceSession`] owns a [`UsbBackend`] and the connection settings.
//! Calling [`DeviceSession::attach`] opens the device, claims its interface
//! and returns an [`AttachedSession`] guard.  Every protocol operation lives
//! on the guard, so it is impossible to send a message to a detached device.
//!
//! The guard releases the interface when it is detached explicitly *or* when
//! it goes out of scope, so an error half-way through [`AttachedSession::program_layout`]
//! still leaves the interface free for the next run.
//!
//! # Programming sequence
//!
//! ```text
//! DeactivateLayout
//! for each page:  WritePage(i)  ──►  Ping* while Executing  ──►  Ping  (must be Idle)
//! ActivateLayout
//! ```

use std::thread;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};
use ukbdc_core::protocol::{chunk_message, paginate, Message, Packet, ProtocolError, Status};

use crate::infrastructure::usb::{Endpoints, UsbBackend, UsbError};

/// USB vendor ID of the keyboard controller.
pub const DEFAULT_VENDOR_ID: u16 = 0x16c0;
/// USB product ID of the keyboard controller.
pub const DEFAULT_PRODUCT_ID: u16 = 0x047c;
/// Interface carrying the bulk protocol endpoints.
pub const DEFAULT_INTERFACE: u8 = 1;

/// Errors raised while talking to the controller.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("keyboard controller {vendor_id:04x}:{product_id:04x} not found")]
    DeviceNotFound { vendor_id: u16, product_id: u16 },

    /// The interface could not be claimed even after detaching the kernel driver.
    #[error("could not claim interface {interface}: {source}")]
    InterfaceClaim {
        interface: u8,
        #[source]
        source: UsbError,
    },

    /// A packet write or status read did not complete in time.
    #[error("device did not respond in time")]
    Timeout,

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The device reported a non-idle status after a page write.
    #[error("device reported \"{status}\" (code {}) after writing page {page}", .status.code())]
    DeviceProgramming { page: u8, status: Status },

    /// A status reply was too short to carry a status byte.
    #[error("status reply of {len} bytes is too short")]
    MalformedStatus { len: usize },

    #[error(transparent)]
    Usb(UsbError),
}

impl From<UsbError> for SessionError {
    fn from(e: UsbError) -> Self {
        match e {
            UsbError::Timeout => SessionError::Timeout,
            other => SessionError::Usb(other),
        }
    }
}

/// Connection settings for a [`DeviceSession`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub vendor_id: u16,
    pub product_id: u16,
    pub interface: u8,
    /// Deadline for every single packet write or read.
    pub timeout: Duration,
    /// Pause between status polls while the device is flashing.
    pub poll_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            vendor_id: DEFAULT_VENDOR_ID,
            product_id: DEFAULT_PRODUCT_ID,
            interface: DEFAULT_INTERFACE,
            timeout: Duration::from_millis(1000),
            poll_interval: Duration::from_millis(1),
        }
    }
}

/// A detached session; owns the transport.
pub struct DeviceSession<B: UsbBackend> {
    backend: B,
    config: SessionConfig,
}

impl<B: UsbBackend> DeviceSession<B> {
    pub fn new(backend: B, config: SessionConfig) -> Self {
        Self { backend, config }
    }

    /// Read access to the transport, mainly for inspecting test doubles.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn into_backend(self) -> B {
        self.backend
    }

    /// Opens the device, claims its interface and sends `Reset`.
    ///
    /// If the first claim fails because the interface is busy, the kernel
    /// driver is detached and the claim retried exactly once.  Any other claim
    /// error is returned without a retry.
    ///
    /// # Errors
    ///
    /// - [`SessionError::DeviceNotFound`] if no matching device is connected.
    /// - [`SessionError::InterfaceClaim`] if the claim fails for a reason other
    ///   than busy, or the retried claim also fails.
    /// - [`SessionError::Timeout`] / [`SessionError::Usb`] for transport failures.
    pub fn attach(&mut self) -> Result<AttachedSession<'_, B>, SessionError> {
        let cfg = &self.config;
        let backend = &mut self.backend;

        backend
            .open(cfg.vendor_id, cfg.product_id)
            .map_err(|e| match e {
                UsbError::NotFound { .. } => SessionError::DeviceNotFound {
                    vendor_id: cfg.vendor_id,
                    product_id: cfg.product_id,
                },
                other => SessionError::from(other),
            })?;

        let endpoints = match backend.endpoints(cfg.interface) {
            Ok(endpoints) => endpoints,
            Err(e) => {
                backend.close();
                return Err(e.into());
            }
        };

        match backend.claim_interface(cfg.interface) {
            Ok(()) => {}
            Err(UsbError::Busy) => {
                warn!(
                    interface = cfg.interface,
                    "interface busy; detaching kernel driver and retrying"
                );
                if let Err(e) = backend.detach_kernel_driver(cfg.interface) {
                    debug!(error = %e, "kernel driver detach failed");
                }
                if let Err(source) = backend.claim_interface(cfg.interface) {
                    backend.close();
                    return Err(SessionError::InterfaceClaim {
                        interface: cfg.interface,
                        source,
                    });
                }
            }
            Err(source) => {
                backend.close();
                return Err(SessionError::InterfaceClaim {
                    interface: cfg.interface,
                    source,
                });
            }
        }

        let mut attached = AttachedSession {
            backend,
            config: cfg,
            endpoints,
            released: false,
        };
        attached.reset()?;
        info!(
            vendor_id = cfg.vendor_id,
            product_id = cfg.product_id,
            max_packet_size = endpoints.out_max_packet_size,
            "attached to keyboard controller"
        );
        Ok(attached)
    }
}

/// An attached session.  Releases the interface when dropped.
pub struct AttachedSession<'a, B: UsbBackend> {
    backend: &'a mut B,
    config: &'a SessionConfig,
    endpoints: Endpoints,
    released: bool,
}

impl<'a, B: UsbBackend> AttachedSession<'a, B> {
    /// Negotiated maximum packet size of the OUT endpoint.
    pub fn max_packet_size(&self) -> usize {
        self.endpoints.out_max_packet_size
    }

    fn write_packet(&mut self, packet: &Packet) -> Result<(), SessionError> {
        let bytes = packet.frame(self.endpoints.out_max_packet_size)?;
        self.backend
            .write_bulk(self.endpoints.ep_out, &bytes, self.config.timeout)?;
        Ok(())
    }

    /// Sends `Reset`, discarding any half-received message on the device.
    pub fn reset(&mut self) -> Result<(), SessionError> {
        self.write_packet(&Packet::reset())
    }

    /// Chunks `message` and writes its packets in order.
    ///
    /// # Errors
    ///
    /// Chunking errors surface as [`SessionError::Protocol`] before anything
    /// is written.
    pub fn send(&mut self, message: &Message) -> Result<(), SessionError> {
        let packets = chunk_message(message, self.endpoints.out_max_packet_size)?;
        debug!(
            message = ?message.message_type(),
            packets = packets.len(),
            "sending message"
        );
        for packet in &packets {
            self.write_packet(packet)?;
        }
        Ok(())
    }

    /// Sends `Ping` and reads the device status from the reply.
    ///
    /// # Errors
    ///
    /// [`SessionError::Timeout`] if no reply arrives in time (never retried),
    /// [`SessionError::MalformedStatus`] for a reply shorter than two bytes.
    pub fn status(&mut self) -> Result<Status, SessionError> {
        self.write_packet(&Packet::ping())?;
        let mut buf = vec![0u8; self.endpoints.in_max_packet_size.max(2)];
        let len = self
            .backend
            .read_bulk(self.endpoints.ep_in, &mut buf, self.config.timeout)?;
        if len < 2 {
            return Err(SessionError::MalformedStatus { len });
        }
        let status = Status::from_code(buf[1]);
        if status.is_error() {
            warn!(%status, code = status.code(), "device reported an error status");
        } else {
            debug!(%status, code = status.code(), "device status");
        }
        Ok(status)
    }

    /// Reboots the controller into its DFU bootloader.
    pub fn dfu(&mut self) -> Result<(), SessionError> {
        info!("requesting reboot into bootloader");
        self.send(&Message::Dfu)
    }

    /// Writes `binary` (a device-format layout) page by page and activates it.
    ///
    /// The binary is paginated before anything is sent.  After each page the
    /// device is polled while it reports `Executing`; the status read after
    /// that must be `Idle`, otherwise programming stops and neither the
    /// remaining pages nor `ActivateLayout` are sent.
    ///
    /// # Errors
    ///
    /// - [`SessionError::Protocol`] if the binary needs more than 255 pages.
    /// - [`SessionError::DeviceProgramming`] with the reported status.
    /// - [`SessionError::Timeout`] / [`SessionError::Usb`] for transport failures.
    pub fn program_layout(&mut self, binary: &[u8]) -> Result<(), SessionError> {
        let pages = paginate(binary)?;
        info!(bytes = binary.len(), pages = pages.len(), "programming layout");

        self.send(&Message::DeactivateLayout)?;

        for message in &pages {
            let Message::WritePage { index, .. } = message else {
                continue;
            };
            let index = *index;
            debug!(page = index, "writing page");
            self.send(message)?;

            let mut status = self.status()?;
            while status == Status::Executing {
                thread::sleep(self.config.poll_interval);
                status = self.status()?;
            }
            let status = self.status()?;
            if status != Status::Idle {
                warn!(page = index, %status, code = status.code(), "page write failed");
                return Err(SessionError::DeviceProgramming {
                    page: index,
                    status,
                });
            }
        }

        self.send(&Message::ActivateLayout)?;
        info!(pages = pages.len(), "layout programmed and activated");
        Ok(())
    }

    /// Releases the interface and closes the device.
    ///
    /// # Errors
    ///
    /// Returns the transport error if the release fails; the device is
    /// closed either way.
    pub fn detach(mut self) -> Result<(), SessionError> {
        self.released = true;
        let result = self.backend.release_interface(self.config.interface);
        self.backend.close();
        debug!("detached from keyboard controller");
        result.map_err(SessionError::from)
    }
}

impl<B: UsbBackend> Drop for AttachedSession<'_, B> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = self.backend.release_interface(self.config.interface) {
            warn!(error = %e, "failed to release interface");
        }
        self.backend.close();
        debug!("session dropped; interface released");
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
