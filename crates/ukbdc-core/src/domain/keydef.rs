//! Key definitions and their 4-byte record encoding.
//!
//! A [`KeyDef`] describes what one physical key does on one layer: the
//! scancode reported to the host plus the layer actions run on press and on
//! release.  A key may instead be *inherited*, deferring to the same key
//! position on the parent layer.
//!
//! ```text
//! byte 0: scancode
//! byte 1: press.kind << 4 | release.kind
//! byte 2: press.arg   (i8)
//! byte 3: release.arg (i8)
//! ```
//!
//! Inherited keys are stored as the sentinel `FF FF FF FF` in the host format.

use std::collections::HashMap;

use crate::domain::action::{self, Action, ValidationError, INVALID_KIND_NIBBLE};

/// Size in bytes of one encoded key definition.
pub const RECORD_SIZE: usize = 4;

/// Record marking an inherited key in the host format.
pub const INHERITED_RECORD: [u8; RECORD_SIZE] = [0xFF; RECORD_SIZE];

/// Lookup between symbolic key names and scancodes.
///
/// The name table itself lives outside this crate; any source of names can be
/// plugged in by implementing this trait.
pub trait ScancodeTable {
    /// Returns the scancode for `mnemonic`, if known.
    fn scancode(&self, mnemonic: &str) -> Option<u8>;

    /// Returns the preferred name of `scancode`, if known.
    fn mnemonic(&self, scancode: u8) -> Option<&str>;
}

/// A bidirectional in-memory [`ScancodeTable`].
///
/// Name lookup is case-insensitive.  When several names map to the same
/// scancode, the first one inserted is used for display.
#[derive(Debug, Clone, Default)]
pub struct MnemonicTable {
    by_name: HashMap<String, u8>,
    by_code: HashMap<u8, String>,
}

impl MnemonicTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `name` as a mnemonic for `scancode`.
    pub fn insert(&mut self, name: &str, scancode: u8) {
        self.by_name.insert(name.to_ascii_uppercase(), scancode);
        self.by_code
            .entry(scancode)
            .or_insert_with(|| name.to_string());
    }
}

impl<'a> FromIterator<(&'a str, u8)> for MnemonicTable {
    fn from_iter<I: IntoIterator<Item = (&'a str, u8)>>(iter: I) -> Self {
        let mut table = Self::new();
        for (name, code) in iter {
            table.insert(name, code);
        }
        table
    }
}

impl ScancodeTable for MnemonicTable {
    fn scancode(&self, mnemonic: &str) -> Option<u8> {
        self.by_name.get(&mnemonic.to_ascii_uppercase()).copied()
    }

    fn mnemonic(&self, scancode: u8) -> Option<&str> {
        self.by_code.get(&scancode).map(String::as_str)
    }
}

/// The behaviour bound to one key position on one layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KeyDef {
    /// Scancode reported when the key is pressed.
    pub scancode: u8,
    /// Layer action executed on key press.
    pub press: Action,
    /// Layer action executed on key release.
    pub release: Action,
    /// Whether the effective value comes from the parent layer.
    pub inherited: bool,
}

impl KeyDef {
    /// A concrete (non-inherited) key definition.
    pub fn new(scancode: u8, press: Action, release: Action) -> Self {
        Self {
            scancode,
            press,
            release,
            inherited: false,
        }
    }

    /// A key that defers to the same position on its parent layer.
    pub fn inherited() -> Self {
        Self {
            inherited: true,
            ..Self::default()
        }
    }

    /// Builds a key definition from a symbolic scancode name.
    ///
    /// A name that parses as a decimal or `0x`-prefixed number is used as the
    /// scancode directly; anything else is looked up in `table`.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::UnresolvedScancode`] if the name is neither a
    /// number in `0..=255` nor a known mnemonic.
    pub fn from_mnemonic(
        table: &dyn ScancodeTable,
        name: &str,
        press: Action,
        release: Action,
    ) -> Result<Self, ValidationError> {
        let scancode = resolve_scancode(table, name)?;
        Ok(Self::new(scancode, press, release))
    }

    /// Human-readable name: the table mnemonic, `""` for scancode 0, or hex.
    pub fn display_name(&self, table: &dyn ScancodeTable) -> String {
        match table.mnemonic(self.scancode) {
            Some(name) => name.to_string(),
            None if self.scancode == 0 => String::new(),
            None => format!("{:#x}", self.scancode),
        }
    }

    /// Encodes the fields of this definition, ignoring the inherited flag.
    pub fn to_record(&self) -> [u8; RECORD_SIZE] {
        let [kinds, press_arg, release_arg] = action::encode_pair(&self.press, &self.release);
        debug_assert_ne!(kinds >> 4, INVALID_KIND_NIBBLE);
        debug_assert_ne!(kinds & 0x0F, INVALID_KIND_NIBBLE);
        [self.scancode, kinds, press_arg, release_arg]
    }

    /// Encodes this definition for the host format, where inherited keys
    /// become [`INHERITED_RECORD`].
    pub fn to_host_record(&self) -> [u8; RECORD_SIZE] {
        if self.inherited {
            INHERITED_RECORD
        } else {
            self.to_record()
        }
    }

    /// Decodes a host-format record.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] if the record is not the inherited sentinel
    /// and carries an unknown kind nibble or an out-of-range argument.
    pub fn from_record(record: [u8; RECORD_SIZE]) -> Result<Self, ValidationError> {
        if record == INHERITED_RECORD {
            return Ok(Self::inherited());
        }
        let (press, release) = action::decode_pair([record[1], record[2], record[3]])?;
        Ok(Self::new(record[0], press, release))
    }
}

/// Resolves a numeric or symbolic scancode.
///
/// # Errors
///
/// Returns [`ValidationError::UnresolvedScancode`] when `name` is unknown.
pub fn resolve_scancode(table: &dyn ScancodeTable, name: &str) -> Result<u8, ValidationError> {
    let trimmed = name.trim();
    let numeric = match trimmed.strip_prefix("0x").or_else(|| trimmed.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16).ok(),
        None => trimmed.parse::<u8>().ok(),
    };
    numeric
        .or_else(|| table.scancode(trimmed))
        .ok_or_else(|| ValidationError::UnresolvedScancode(name.to_string()))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
