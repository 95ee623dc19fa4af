//! Application layer use cases for the host tool.
//!
//! # What is the "application" layer? (for beginners)
//!
//! The application layer sits between the pure domain types in `ukbdc_core`
//! (layouts, messages, packets) and the infrastructure that touches the OS
//! (USB, files).  It depends on the [`UsbBackend`](crate::infrastructure::usb::UsbBackend)
//! trait rather than on libusb directly, so every use case can run against
//! the scripted mock device in tests.
//!
//! # Sub-modules
//!
//! - **`session`** – The protocol state machine: attach, send, status,
//!   page-by-page programming, detach.
//!
//! - **`program`** – User-level operations built on a session: upload a
//!   layout, reboot into DFU, query status.

pub mod program;
pub mod session;
