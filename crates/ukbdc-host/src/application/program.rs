//! Device use cases: program a layout, reboot into DFU, query status.
//!
//! Each use case follows the same bracket:
//!
//! 1. Do every check that does not need the device (layout validation,
//!    device encoding, pagination).
//! 2. `attach()` to the controller.
//! 3. Run the protocol operation.
//! 4. `detach()`; on the error path the session guard releases the
//!    interface when it is dropped.

use thiserror::Error;
use tracing::info;
use ukbdc_core::protocol::{paginate, Status};
use ukbdc_core::{Layout, LayoutError};

use crate::application::session::{DeviceSession, SessionError};
use crate::infrastructure::usb::UsbBackend;

/// Errors returned by the device use cases.
#[derive(Debug, Error)]
pub enum ProgramError {
    /// The layout could not be encoded for the device.
    #[error("layout cannot be programmed: {0}")]
    Layout(#[from] LayoutError),

    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Summary of a successful [`upload_layout`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadReport {
    pub bytes: usize,
    pub pages: usize,
}

/// Encodes `layout` in device format and writes it to the controller.
///
/// Inheritance is resolved and pagination checked before the device is
/// opened, so an unprogrammable layout never touches the hardware.
///
/// # Errors
///
/// - [`ProgramError::Layout`] for inheritance cycles or invalid slots.
/// - [`ProgramError::Session`] for page overflow and every device failure.
pub fn upload_layout<B: UsbBackend>(
    session: &mut DeviceSession<B>,
    layout: &Layout,
) -> Result<UploadReport, ProgramError> {
    let binary = layout.to_bytes(true)?;
    let pages = paginate(&binary).map_err(SessionError::from)?.len();

    let mut attached = session.attach()?;
    attached.program_layout(&binary)?;
    attached.detach()?;

    info!(bytes = binary.len(), pages, "upload complete");
    Ok(UploadReport {
        bytes: binary.len(),
        pages,
    })
}

/// Reboots the controller into its DFU bootloader.
///
/// The device disappears from the bus right after accepting the message.
pub fn reboot_to_dfu<B: UsbBackend>(session: &mut DeviceSession<B>) -> Result<(), ProgramError> {
    let mut attached = session.attach()?;
    attached.dfu()?;
    attached.detach()?;
    Ok(())
}

/// Reads the controller's current status.
pub fn query_status<B: UsbBackend>(session: &mut DeviceSession<B>) -> Result<Status, ProgramError> {
    let mut attached = session.attach()?;
    let status = attached.status()?;
    attached.detach()?;
    Ok(status)
}
