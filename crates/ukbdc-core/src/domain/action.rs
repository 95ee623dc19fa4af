//! Layer-switching actions attached to key press and key release.
//!
//! Every key definition carries two actions: one executed when the key goes
//! down and one executed when it comes back up.  An action either does nothing,
//! shifts the active layer by a relative offset, or jumps to an absolute layer.
//!
//! # Wire representation
//!
//! The two action kinds of a key share one byte, press in the high nibble and
//! release in the low nibble.  The two arguments follow as separate signed
//! bytes:
//!
//! ```text
//! [press.kind:4 | release.kind:4][press.arg:i8][release.arg:i8]
//! ```
//!
//! Valid kind codes are `0..=2`, so a kind byte of `0xFF` can never be produced
//! by a real pair of actions.  The layout format relies on this to mark
//! inherited keys with an all-`0xFF` record.

use std::fmt;

use thiserror::Error;

/// Smallest argument accepted by a [`ActionKind::Relative`] action.
pub const RELATIVE_MIN: i8 = -16;
/// Largest argument accepted by a [`ActionKind::Relative`] action.
pub const RELATIVE_MAX: i8 = 16;
/// Smallest argument accepted by an [`ActionKind::Absolute`] action.
pub const ABSOLUTE_MIN: i8 = 0;
/// Largest argument accepted by an [`ActionKind::Absolute`] action.
pub const ABSOLUTE_MAX: i8 = 16;

/// Nibble value that never belongs to a valid kind.
pub(crate) const INVALID_KIND_NIBBLE: u8 = 0x0F;

// Kind codes must stay below the nibble reserved for the inherited sentinel.
const _: () = assert!((ActionKind::Absolute as u8) < INVALID_KIND_NIBBLE);
const _: () = assert!((ActionKind::Relative as u8) < INVALID_KIND_NIBBLE);

/// Errors raised when an action, key definition or scancode is out of range.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The argument does not fit the bounds allowed for the action kind.
    #[error("{kind} action argument {arg} out of range [{min}, {max}]")]
    ArgumentOutOfRange {
        kind: ActionKind,
        arg: i8,
        min: i8,
        max: i8,
    },

    /// The kind nibble does not name a known action kind.
    #[error("unknown action kind code: 0x{0:X}")]
    UnknownKind(u8),

    /// A symbolic scancode name could not be found in the mnemonic table.
    #[error("unknown scancode mnemonic: {0:?}")]
    UnresolvedScancode(String),
}

/// What an action does to the active layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum ActionKind {
    /// No layer change.
    #[default]
    None = 0x00,
    /// Shift the active layer by a signed offset.
    Relative = 0x01,
    /// Jump to a fixed layer index.
    Absolute = 0x02,
}

impl TryFrom<u8> for ActionKind {
    type Error = ValidationError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x00 => Ok(ActionKind::None),
            0x01 => Ok(ActionKind::Relative),
            0x02 => Ok(ActionKind::Absolute),
            other => Err(ValidationError::UnknownKind(other)),
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ActionKind::None => "none",
            ActionKind::Relative => "relative",
            ActionKind::Absolute => "absolute",
        };
        f.write_str(name)
    }
}

/// A validated layer-switching action.
///
/// Fields are private so that an out-of-range action can never be built:
/// construct one through [`Action::new`] or the kind-specific helpers.
///
/// # Examples
///
/// ```rust
/// use ukbdc_core::domain::action::{Action, ActionKind};
///
/// let up = Action::relative(1).unwrap();
/// assert_eq!(up.kind(), ActionKind::Relative);
/// assert!(Action::absolute(-1).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Action {
    kind: ActionKind,
    arg: i8,
}

impl Action {
    /// Builds an action after checking `arg` against the bounds of `kind`.
    ///
    /// A [`ActionKind::None`] action ignores its argument; it is stored as 0.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::ArgumentOutOfRange`] when `arg` is outside the
    /// bounds of `kind`.  Values are never clamped.
    pub fn new(kind: ActionKind, arg: i8) -> Result<Self, ValidationError> {
        let (min, max) = match kind {
            ActionKind::None => return Ok(Self::none()),
            ActionKind::Relative => (RELATIVE_MIN, RELATIVE_MAX),
            ActionKind::Absolute => (ABSOLUTE_MIN, ABSOLUTE_MAX),
        };
        if !(min..=max).contains(&arg) {
            return Err(ValidationError::ArgumentOutOfRange {
                kind,
                arg,
                min,
                max,
            });
        }
        Ok(Self { kind, arg })
    }

    /// The empty action.
    pub const fn none() -> Self {
        Self {
            kind: ActionKind::None,
            arg: 0,
        }
    }

    /// Shift the active layer by `offset`.
    pub fn relative(offset: i8) -> Result<Self, ValidationError> {
        Self::new(ActionKind::Relative, offset)
    }

    /// Jump to layer `layer`.
    pub fn absolute(layer: i8) -> Result<Self, ValidationError> {
        Self::new(ActionKind::Absolute, layer)
    }

    pub fn kind(&self) -> ActionKind {
        self.kind
    }

    pub fn arg(&self) -> i8 {
        self.arg
    }

    pub fn is_none(&self) -> bool {
        self.kind == ActionKind::None
    }
}

impl fmt::Display for Action {
    /// Relative offsets are shown signed (`+2`, `-1`), absolute layers plain,
    /// and the empty action as an empty string.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ActionKind::None => Ok(()),
            ActionKind::Relative => write!(f, "{:+}", self.arg),
            ActionKind::Absolute => write!(f, "{}", self.arg),
        }
    }
}

// ── Codec ─────────────────────────────────────────────────────────────────────

/// Packs the kinds of a press/release pair into one byte.
pub fn encode_kinds(press: &Action, release: &Action) -> u8 {
    ((press.kind as u8) << 4) | (release.kind as u8)
}

/// Splits a packed kind byte into its press and release kinds.
///
/// # Errors
///
/// Returns [`ValidationError::UnknownKind`] if either nibble is not a valid
/// kind code.
pub fn decode_kinds(byte: u8) -> Result<(ActionKind, ActionKind), ValidationError> {
    let press = ActionKind::try_from(byte >> 4)?;
    let release = ActionKind::try_from(byte & 0x0F)?;
    Ok((press, release))
}

/// Encodes a press/release pair as `[kinds, press.arg, release.arg]`.
pub fn encode_pair(press: &Action, release: &Action) -> [u8; 3] {
    [
        encode_kinds(press, release),
        press.arg as u8,
        release.arg as u8,
    ]
}

/// Decodes the three bytes produced by [`encode_pair`], validating both actions.
///
/// The argument byte of a `None` action is ignored and decodes as 0, so a
/// stray argument in a file is dropped when the layout is saved again.
///
/// # Errors
///
/// Returns [`ValidationError`] for an unknown kind nibble or an argument out of
/// range for its kind.
pub fn decode_pair(bytes: [u8; 3]) -> Result<(Action, Action), ValidationError> {
    let (press_kind, release_kind) = decode_kinds(bytes[0])?;
    let press = Action::new(press_kind, bytes[1] as i8)?;
    let release = Action::new(release_kind, bytes[2] as i8)?;
    Ok((press, release))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_rejects_argument_above_sixteen() {
        let result = Action::new(ActionKind::Relative, 17);
        assert_eq!(
            result,
            Err(ValidationError::ArgumentOutOfRange {
                kind: ActionKind::Relative,
                arg: 17,
                min: -16,
                max: 16,
            })
        );
    }

    #[test]
    fn test_relative_accepts_lower_bound() {
        let action = Action::new(ActionKind::Relative, -16).expect("-16 is in range");
        assert_eq!(action.arg(), -16);
    }

    #[test]
    fn test_relative_rejects_argument_below_minus_sixteen() {
        assert!(Action::relative(-17).is_err());
    }

    #[test]
    fn test_absolute_rejects_negative_layer() {
        assert!(Action::new(ActionKind::Absolute, -1).is_err());
    }

    #[test]
    fn test_absolute_accepts_upper_bound() {
        let action = Action::new(ActionKind::Absolute, 16).expect("16 is in range");
        assert_eq!(action.kind(), ActionKind::Absolute);
        assert_eq!(action.arg(), 16);
    }

    #[test]
    fn test_none_ignores_argument() {
        let action = Action::new(ActionKind::None, 100).expect("none never fails");
        assert_eq!(action, Action::none());
        assert_eq!(action.arg(), 0);
    }

    #[test]
    fn test_encode_kinds_puts_press_in_high_nibble() {
        let press = Action::absolute(1).unwrap();
        let release = Action::relative(-1).unwrap();
        assert_eq!(encode_kinds(&press, &release), 0x21);
    }

    #[test]
    fn test_encode_pair_writes_twos_complement_arguments() {
        let press = Action::relative(-2).unwrap();
        let release = Action::absolute(3).unwrap();
        assert_eq!(encode_pair(&press, &release), [0x12, 0xFE, 0x03]);
    }

    #[test]
    fn test_decode_pair_restores_signed_arguments() {
        let (press, release) = decode_pair([0x12, 0xFE, 0x03]).unwrap();
        assert_eq!(press, Action::relative(-2).unwrap());
        assert_eq!(release, Action::absolute(3).unwrap());
    }

    #[test]
    fn test_decode_pair_normalises_none_argument_to_zero() {
        // Arrange: both kinds None, with non-zero argument bytes
        let bytes = [0x00, 0x05, 0x07];

        // Act
        let (press, release) = decode_pair(bytes).unwrap();

        // Assert
        assert_eq!(press, Action::none());
        assert_eq!(release, Action::none());
        assert_eq!(encode_pair(&press, &release), [0x00, 0x00, 0x00]);
    }

    #[test]
    fn test_decode_kinds_rejects_sentinel_nibble() {
        assert_eq!(decode_kinds(0xF0), Err(ValidationError::UnknownKind(0x0F)));
        assert_eq!(decode_kinds(0x0F), Err(ValidationError::UnknownKind(0x0F)));
    }

    #[test]
    fn test_decode_pair_rejects_out_of_range_argument() {
        // Absolute press with argument -1
        let result = decode_pair([0x20, 0xFF, 0x00]);
        assert!(matches!(
            result,
            Err(ValidationError::ArgumentOutOfRange { arg: -1, .. })
        ));
    }

    #[test]
    fn test_display_formats_relative_with_sign() {
        assert_eq!(Action::relative(2).unwrap().to_string(), "+2");
        assert_eq!(Action::relative(-1).unwrap().to_string(), "-1");
        assert_eq!(Action::relative(0).unwrap().to_string(), "+0");
        assert_eq!(Action::absolute(3).unwrap().to_string(), "3");
        assert_eq!(Action::none().to_string(), "");
    }
}
