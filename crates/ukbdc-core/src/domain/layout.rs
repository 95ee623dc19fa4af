//! Layered key-mapping domain entity.
//!
//! A [`Layout`] holds `no_layers` layers of `no_keys` key definitions each.
//! Every layer may name a parent layer; keys marked as inherited take their
//! effective value from the same key position on the parent, recursively.
//!
//! # Storage (for beginners)
//!
//! Key positions are dense integers `0..no_keys`, and layers are dense integers
//! `0..no_layers`, so all slots live in one flat `Vec` indexed by
//! `layer * no_keys + key`.  A parent link is just a layer index, resolved
//! every time a key is read.  Because nothing holds a reference to another
//! slot, overwriting a slot with [`Layout::set`] is immediately visible through
//! every layer that inherits from it.
//!
//! # Binary formats
//!
//! ```text
//! [no_keys:u8][no_layers:u8]
//! no_layers * no_keys * [record:4]
//! no_layers * [parent:i8]        (host format only, -1 = none)
//! ```
//!
//! The device format omits the parent trailer and stores every key fully
//! resolved, so the `FF FF FF FF` inherited sentinel never appears in it.

use thiserror::Error;

use crate::domain::action::ValidationError;
use crate::domain::keydef::{KeyDef, RECORD_SIZE};

/// Size of the `[no_keys][no_layers]` header.
pub const HEADER_SIZE: usize = 2;

/// Encoded parent value for a layer without a parent.
const NO_PARENT: u8 = 0xFF;

/// Errors that can occur when building, editing or decoding a layout.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LayoutError {
    /// The persisted buffer does not have the size its header announces.
    #[error("malformed layout: expected {expected} bytes, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    /// The persisted buffer is structurally invalid.
    #[error("malformed layout: {0}")]
    Format(String),

    /// Inheritance resolution visited the same layer twice.
    #[error("inheritance cycle through layer {layer} while resolving key {key}")]
    InheritanceCycle { layer: u8, key: u8 },

    /// A layout must have between 1 and 255 keys and layers.
    #[error("layout dimensions {no_keys} keys x {no_layers} layers are out of range 1..=255")]
    InvalidDimensions { no_keys: usize, no_layers: usize },

    #[error("layer {layer} out of range (layout has {no_layers} layers)")]
    LayerOutOfRange { layer: usize, no_layers: u8 },

    #[error("key {key} out of range (layout has {no_keys} keys)")]
    KeyOutOfRange { key: usize, no_keys: u8 },

    /// A key definition inside the layout failed validation.
    #[error("invalid key definition: {0}")]
    Validation(#[from] ValidationError),
}

/// A layered, inheritance-aware key mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    no_keys: u8,
    no_layers: u8,
    /// Flat slot arena, `layer * no_keys + key`.
    keys: Vec<KeyDef>,
    parents: Vec<Option<u8>>,
}

impl Layout {
    /// Creates a layout where every key is empty (scancode 0, no actions).
    ///
    /// Layer 0 has no parent; every other layer inherits from layer 0.
    ///
    /// # Errors
    ///
    /// Returns [`LayoutError::InvalidDimensions`] if either count is 0 or
    /// above 255 (both must fit the 8-bit header fields).
    pub fn new(no_keys: usize, no_layers: usize) -> Result<Self, LayoutError> {
        let dims_err = LayoutError::InvalidDimensions { no_keys, no_layers };
        let keys_u8 = u8::try_from(no_keys).map_err(|_| dims_err.clone())?;
        let layers_u8 = u8::try_from(no_layers).map_err(|_| dims_err.clone())?;
        if keys_u8 == 0 || layers_u8 == 0 {
            return Err(dims_err);
        }

        let mut parents = vec![Some(0); no_layers];
        parents[0] = None;

        Ok(Self {
            no_keys: keys_u8,
            no_layers: layers_u8,
            keys: vec![KeyDef::default(); no_keys * no_layers],
            parents,
        })
    }

    pub fn no_keys(&self) -> u8 {
        self.no_keys
    }

    pub fn no_layers(&self) -> u8 {
        self.no_layers
    }

    /// Returns the effective definition of `key` on `layer`.
    ///
    /// Non-inherited slots are returned as stored.  Inherited slots are
    /// resolved by walking parent links; an inherited slot on a layer with no
    /// parent resolves to itself.
    ///
    /// # Errors
    ///
    /// - [`LayoutError::LayerOutOfRange`] / [`LayoutError::KeyOutOfRange`] for
    ///   bad indices.
    /// - [`LayoutError::InheritanceCycle`] if the walk reaches a layer it has
    ///   already visited.
    pub fn get(&self, layer: usize, key: usize) -> Result<&KeyDef, LayoutError> {
        self.check_layer(layer)?;
        self.check_key(key)?;

        let mut visited = vec![false; self.no_layers as usize];
        let mut current = layer;
        loop {
            let slot = &self.keys[self.slot_index(current, key)];
            if !slot.inherited {
                return Ok(slot);
            }
            visited[current] = true;
            match self.parents[current] {
                None => return Ok(slot),
                Some(parent) if visited[parent as usize] => {
                    return Err(LayoutError::InheritanceCycle {
                        layer: parent,
                        key: key as u8,
                    });
                }
                Some(parent) => current = parent as usize,
            }
        }
    }

    /// Returns the slot of `key` on `layer` exactly as stored.
    ///
    /// # Errors
    ///
    /// Returns an out-of-range error for bad indices.
    pub fn stored(&self, layer: usize, key: usize) -> Result<&KeyDef, LayoutError> {
        self.check_layer(layer)?;
        self.check_key(key)?;
        Ok(&self.keys[self.slot_index(layer, key)])
    }

    /// Overwrites the fields of the slot at (`layer`, `key`) in place.
    ///
    /// An inherited definition carries no fields of its own: its scancode and
    /// actions are stored zeroed, matching what the host format can hold.
    ///
    /// # Errors
    ///
    /// Returns an out-of-range error for bad indices.
    pub fn set(&mut self, layer: usize, key: usize, def: KeyDef) -> Result<(), LayoutError> {
        self.check_layer(layer)?;
        self.check_key(key)?;
        let def = if def.inherited { KeyDef::inherited() } else { def };
        let idx = self.slot_index(layer, key);
        let slot = &mut self.keys[idx];
        slot.inherited = def.inherited;
        slot.scancode = def.scancode;
        slot.press = def.press;
        slot.release = def.release;
        Ok(())
    }

    /// Returns the parent of `layer`, or `None` for a root layer.
    ///
    /// # Errors
    ///
    /// Returns [`LayoutError::LayerOutOfRange`] for a bad index.
    pub fn parent(&self, layer: usize) -> Result<Option<u8>, LayoutError> {
        self.check_layer(layer)?;
        Ok(self.parents[layer])
    }

    /// Changes the parent of `layer`.
    ///
    /// Cycles are not rejected here; they surface as
    /// [`LayoutError::InheritanceCycle`] when an inherited key is resolved.
    ///
    /// # Errors
    ///
    /// Returns [`LayoutError::LayerOutOfRange`] if either index is bad.
    pub fn set_parent(&mut self, layer: usize, parent: Option<u8>) -> Result<(), LayoutError> {
        self.check_layer(layer)?;
        if let Some(p) = parent {
            self.check_layer(p as usize)?;
        }
        self.parents[layer] = parent;
        Ok(())
    }

    /// Resolves every key of every layer, reporting the first cycle found.
    ///
    /// # Errors
    ///
    /// Returns [`LayoutError::InheritanceCycle`] if any inherited key cannot be
    /// resolved.
    pub fn validate(&self) -> Result<(), LayoutError> {
        for layer in 0..self.no_layers as usize {
            for key in 0..self.no_keys as usize {
                self.get(layer, key)?;
            }
        }
        Ok(())
    }

    /// Encodes the layout.
    ///
    /// With `for_device == false` the host format is produced: inherited keys
    /// as sentinels plus the parent trailer.  With `for_device == true` every
    /// key is resolved first and the trailer is omitted.
    ///
    /// # Errors
    ///
    /// Returns [`LayoutError::InheritanceCycle`] when encoding for the device
    /// and a key cannot be resolved.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use ukbdc_core::Layout;
    ///
    /// let layout = Layout::new(2, 2).unwrap();
    /// let host = layout.to_bytes(false).unwrap();
    /// assert_eq!(host.len(), 2 + 2 * 2 * 4 + 2);
    /// assert_eq!(Layout::from_bytes(&host).unwrap(), layout);
    /// ```
    pub fn to_bytes(&self, for_device: bool) -> Result<Vec<u8>, LayoutError> {
        let trailer = if for_device { 0 } else { self.no_layers as usize };
        let mut buf = Vec::with_capacity(HEADER_SIZE + self.keys.len() * RECORD_SIZE + trailer);
        buf.push(self.no_keys);
        buf.push(self.no_layers);

        for layer in 0..self.no_layers as usize {
            for key in 0..self.no_keys as usize {
                let record = if for_device {
                    self.get(layer, key)?.to_record()
                } else {
                    self.keys[self.slot_index(layer, key)].to_host_record()
                };
                buf.extend_from_slice(&record);
            }
        }

        if !for_device {
            buf.extend(self.parents.iter().map(|p| p.unwrap_or(NO_PARENT)));
        }
        Ok(buf)
    }

    /// Decodes a host-format buffer produced by `to_bytes(false)`.
    ///
    /// # Errors
    ///
    /// - [`LayoutError::LengthMismatch`] if the size differs from
    ///   `2 + no_layers * no_keys * 4 + no_layers`.
    /// - [`LayoutError::Format`] for zero dimensions or a parent index that
    ///   names a missing layer.
    /// - [`LayoutError::Validation`] for records with bad kinds or arguments.
    pub fn from_bytes(data: &[u8]) -> Result<Self, LayoutError> {
        if data.len() < HEADER_SIZE {
            return Err(LayoutError::LengthMismatch {
                expected: HEADER_SIZE,
                actual: data.len(),
            });
        }
        let no_keys = data[0];
        let no_layers = data[1];
        let expected = encoded_len(no_keys, no_layers);
        if data.len() != expected {
            return Err(LayoutError::LengthMismatch {
                expected,
                actual: data.len(),
            });
        }
        if no_keys == 0 || no_layers == 0 {
            return Err(LayoutError::Format(format!(
                "empty layout header ({no_keys} keys, {no_layers} layers)"
            )));
        }

        let records_end = HEADER_SIZE + no_layers as usize * no_keys as usize * RECORD_SIZE;
        let keys = data[HEADER_SIZE..records_end]
            .chunks_exact(RECORD_SIZE)
            .map(|c| KeyDef::from_record([c[0], c[1], c[2], c[3]]))
            .collect::<Result<Vec<_>, _>>()?;

        let parents = data[records_end..]
            .iter()
            .enumerate()
            .map(|(layer, &byte)| match byte {
                NO_PARENT => Ok(None),
                p if p < no_layers => Ok(Some(p)),
                p => Err(LayoutError::Format(format!(
                    "layer {layer} names parent {} but only {no_layers} layers exist",
                    p as i8
                ))),
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            no_keys,
            no_layers,
            keys,
            parents,
        })
    }

    fn slot_index(&self, layer: usize, key: usize) -> usize {
        layer * self.no_keys as usize + key
    }

    fn check_layer(&self, layer: usize) -> Result<(), LayoutError> {
        if layer < self.no_layers as usize {
            Ok(())
        } else {
            Err(LayoutError::LayerOutOfRange {
                layer,
                no_layers: self.no_layers,
            })
        }
    }

    fn check_key(&self, key: usize) -> Result<(), LayoutError> {
        if key < self.no_keys as usize {
            Ok(())
        } else {
            Err(LayoutError::KeyOutOfRange {
                key,
                no_keys: self.no_keys,
            })
        }
    }
}

/// Host-format size of a layout with the given dimensions.
pub fn encoded_len(no_keys: u8, no_layers: u8) -> usize {
    HEADER_SIZE + no_layers as usize * no_keys as usize * RECORD_SIZE + no_layers as usize
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::action::Action;

    fn chain_layout() -> Layout {
        // layer 0 key 5 concrete; layer 1 (parent 0) and layer 2 (parent 1) inherit it
        let mut layout = Layout::new(8, 3).unwrap();
        layout
            .set(0, 5, KeyDef::new(4, Action::absolute(1).unwrap(), Action::none()))
            .unwrap();
        layout.set(1, 5, KeyDef::inherited()).unwrap();
        layout.set(2, 5, KeyDef::inherited()).unwrap();
        layout.set_parent(2, Some(1)).unwrap();
        layout
    }

    #[test]
    fn test_new_defaults_parents_to_layer_zero() {
        let layout = Layout::new(4, 3).unwrap();
        assert_eq!(layout.parent(0).unwrap(), None);
        assert_eq!(layout.parent(1).unwrap(), Some(0));
        assert_eq!(layout.parent(2).unwrap(), Some(0));
    }

    #[test]
    fn test_new_defaults_keys_to_empty() {
        let layout = Layout::new(4, 2).unwrap();
        let kd = layout.get(1, 3).unwrap();
        assert_eq!(kd.scancode, 0);
        assert!(kd.press.is_none());
        assert!(kd.release.is_none());
        assert!(!kd.inherited);
    }

    #[test]
    fn test_new_rejects_dimensions_outside_header_range() {
        assert!(Layout::new(256, 1).is_err());
        assert!(Layout::new(1, 256).is_err());
        assert!(Layout::new(0, 1).is_err());
        assert!(Layout::new(255, 255).is_ok());
    }

    #[test]
    fn test_get_resolves_through_two_levels_of_inheritance() {
        let layout = chain_layout();
        let kd = layout.get(2, 5).unwrap();
        assert_eq!(kd.scancode, 4);
        assert_eq!(kd.press, Action::absolute(1).unwrap());
        assert!(!kd.inherited);
    }

    #[test]
    fn test_set_on_root_is_visible_through_inheriting_layers() {
        let mut layout = chain_layout();
        layout
            .set(0, 5, KeyDef::new(41, Action::none(), Action::relative(-1).unwrap()))
            .unwrap();
        assert_eq!(layout.get(2, 5).unwrap().scancode, 41);
    }

    #[test]
    fn test_set_on_child_does_not_touch_parent() {
        let mut layout = chain_layout();
        layout
            .set(2, 5, KeyDef::new(9, Action::none(), Action::none()))
            .unwrap();
        assert_eq!(layout.get(0, 5).unwrap().scancode, 4);
        assert_eq!(layout.get(2, 5).unwrap().scancode, 9);
    }

    #[test]
    fn test_get_inherited_key_without_parent_returns_own_slot() {
        let mut layout = Layout::new(2, 1).unwrap();
        layout.set(0, 1, KeyDef::inherited()).unwrap();
        let kd = layout.get(0, 1).unwrap();
        assert!(kd.inherited);
        assert_eq!(kd.scancode, 0);
    }

    #[test]
    fn test_get_reports_cycle_instead_of_recursing() {
        let mut layout = Layout::new(2, 2).unwrap();
        layout.set_parent(0, Some(1)).unwrap();
        layout.set_parent(1, Some(0)).unwrap();
        layout.set(0, 0, KeyDef::inherited()).unwrap();
        layout.set(1, 0, KeyDef::inherited()).unwrap();

        let result = layout.get(0, 0);

        assert!(matches!(result, Err(LayoutError::InheritanceCycle { key: 0, .. })));
    }

    #[test]
    fn test_get_reports_self_parent_cycle() {
        let mut layout = Layout::new(1, 2).unwrap();
        layout.set_parent(1, Some(1)).unwrap();
        layout.set(1, 0, KeyDef::inherited()).unwrap();
        assert_eq!(
            layout.get(1, 0),
            Err(LayoutError::InheritanceCycle { layer: 1, key: 0 })
        );
    }

    #[test]
    fn test_cycle_is_harmless_when_keys_are_concrete() {
        let mut layout = Layout::new(2, 2).unwrap();
        layout.set_parent(0, Some(1)).unwrap();
        assert!(layout.validate().is_ok());
    }

    #[test]
    fn test_get_rejects_out_of_range_indices() {
        let layout = Layout::new(4, 2).unwrap();
        assert_eq!(
            layout.get(2, 0),
            Err(LayoutError::LayerOutOfRange { layer: 2, no_layers: 2 })
        );
        assert_eq!(
            layout.get(0, 4),
            Err(LayoutError::KeyOutOfRange { key: 4, no_keys: 4 })
        );
    }

    #[test]
    fn test_host_bytes_contain_sentinel_and_signed_parents() {
        let layout = chain_layout();
        let bytes = layout.to_bytes(false).unwrap();

        assert_eq!(bytes.len(), encoded_len(8, 3));
        assert_eq!(&bytes[..2], &[8, 3]);
        let layer1_key5 = HEADER_SIZE + (8 + 5) * RECORD_SIZE;
        assert_eq!(&bytes[layer1_key5..layer1_key5 + 4], &[0xFF; 4]);
        // parents: -1, 0, 1
        assert_eq!(&bytes[bytes.len() - 3..], &[0xFF, 0x00, 0x01]);
    }

    #[test]
    fn test_device_bytes_are_resolved_and_have_no_trailer() {
        let layout = chain_layout();
        let bytes = layout.to_bytes(true).unwrap();

        assert_eq!(bytes.len(), HEADER_SIZE + 3 * 8 * RECORD_SIZE);
        let layer2_key5 = HEADER_SIZE + (16 + 5) * RECORD_SIZE;
        assert_eq!(&bytes[layer2_key5..layer2_key5 + 4], &[4, 0x20, 1, 0]);
        assert!(bytes[HEADER_SIZE..]
            .chunks_exact(RECORD_SIZE)
            .all(|r| r != [0xFF; 4]));
    }

    #[test]
    fn test_device_bytes_fail_on_cycle() {
        let mut layout = Layout::new(1, 2).unwrap();
        layout.set_parent(0, Some(1)).unwrap();
        layout.set(0, 0, KeyDef::inherited()).unwrap();
        layout.set(1, 0, KeyDef::inherited()).unwrap();
        assert!(layout.to_bytes(false).is_ok());
        assert!(matches!(
            layout.to_bytes(true),
            Err(LayoutError::InheritanceCycle { .. })
        ));
    }

    #[test]
    fn test_from_bytes_round_trips_inheritance_and_parents() {
        let layout = chain_layout();
        let restored = Layout::from_bytes(&layout.to_bytes(false).unwrap()).unwrap();
        assert_eq!(restored, layout);
        assert_eq!(restored.parent(2).unwrap(), Some(1));
        assert!(restored.stored(1, 5).unwrap().inherited);
    }

    #[test]
    fn test_from_bytes_rejects_length_mismatch() {
        let mut bytes = Layout::new(2, 2).unwrap().to_bytes(false).unwrap();
        bytes.pop();
        assert_eq!(
            Layout::from_bytes(&bytes),
            Err(LayoutError::LengthMismatch {
                expected: 20,
                actual: 19
            })
        );
        assert!(Layout::from_bytes(&[2]).is_err());
    }

    #[test]
    fn test_from_bytes_rejects_parent_outside_layout() {
        let mut bytes = Layout::new(1, 2).unwrap().to_bytes(false).unwrap();
        let last = bytes.len() - 1;
        bytes[last] = 5;
        assert!(matches!(
            Layout::from_bytes(&bytes),
            Err(LayoutError::Format(_))
        ));
    }

    #[test]
    fn test_from_bytes_rejects_invalid_record() {
        let mut bytes = Layout::new(1, 1).unwrap().to_bytes(false).unwrap();
        bytes[3] = 0x30; // press kind 3
        assert!(matches!(
            Layout::from_bytes(&bytes),
            Err(LayoutError::Validation(ValidationError::UnknownKind(3)))
        ));
    }
}
