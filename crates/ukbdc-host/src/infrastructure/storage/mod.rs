//! Storage infrastructure: configuration and layout files.
//!
//! - **`config`** – the TOML configuration file in the platform config
//!   directory, with defaults for every setting.
//! - **`layout_file`** – `.lay` files holding the editable host-format
//!   layout binary.

pub mod config;
pub mod layout_file;
