//! Infrastructure layer for the host tool.
//!
//! Contains OS-facing adapters: the USB transport and file-system storage.
//!
//! **Dependency rule**: this layer may depend on `ukbdc_core`, and the
//! `application` layer reaches the device only through the
//! [`usb::UsbBackend`] trait.

pub mod storage;
pub mod usb;
