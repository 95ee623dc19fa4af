//! Domain entities for the keyboard layout.
//!
//! This module contains the pure data model of a layout with no knowledge of
//! USB or files:
//!
//! - [`action`] – layer-switching actions and their nibble-packed codec.
//! - [`keydef`] – one key definition and its 4-byte record.
//! - [`layout`] – the layered, inheritance-aware layout and its binary formats.
//!
//! Code in the protocol layer and in the host application depends on the
//! domain, but the domain never depends on them.

pub mod action;
pub mod keydef;
pub mod layout;
