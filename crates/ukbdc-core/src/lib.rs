//! # ukbdc-core
//!
//! Shared library for the ukbdc keyboard controller tools, containing the
//! layout data model, its binary encodings and the USB framing protocol.
//!
//! It has zero dependencies on USB libraries, the file system or the CLI, so
//! everything in it can be tested on any machine without hardware.
//!
//! # Architecture overview (for beginners)
//!
//! The ukbdc controller is a programmable USB keyboard controller.  Which
//! scancode each key sends, and which keys switch between layers, is decided
//! by a *layout* stored in the controller's flash.  The host tool edits such
//! layouts and uploads them.
//!
//! - **`domain`** – The layout itself: layers of key definitions, where a key
//!   may inherit its behaviour from the same key on a parent layer.  Layouts
//!   are stored in a compact binary form, either the editable host format or
//!   the fully resolved device format.
//!
//! - **`protocol`** – How bytes reach the controller.  Messages (write a page,
//!   activate the layout, …) are cut into fixed-size USB packets protected by
//!   a CRC16, and the device reports its progress through status codes.

pub mod domain;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `ukbdc_core::Layout` instead of `ukbdc_core::domain::layout::Layout`.
pub use domain::action::{Action, ActionKind, ValidationError};
pub use domain::keydef::{KeyDef, MnemonicTable, ScancodeTable};
pub use domain::layout::{Layout, LayoutError};
pub use protocol::{Message, Packet, PacketKind, ProtocolError, Status};
