//! Layout files (`.lay`): the host-format layout binary on disk.
//!
//! The file is exactly the output of `Layout::to_bytes(false)`, so inherited
//! slots and parent links survive a save/load cycle unchanged.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;
use ukbdc_core::{Layout, LayoutError};

/// Conventional extension for layout files.
pub const LAYOUT_EXTENSION: &str = "lay";

#[derive(Debug, Error)]
pub enum LayoutFileError {
    #[error("I/O error accessing layout file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid layout file {path}: {source}")]
    Layout {
        path: PathBuf,
        #[source]
        source: LayoutError,
    },
}

/// Reads and decodes a layout file.
///
/// # Errors
///
/// Returns [`LayoutFileError::Io`] if the file cannot be read and
/// [`LayoutFileError::Layout`] if its contents are not a valid layout.
pub fn load_layout(path: &Path) -> Result<Layout, LayoutFileError> {
    let data = std::fs::read(path).map_err(|source| LayoutFileError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let layout = Layout::from_bytes(&data).map_err(|source| LayoutFileError::Layout {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(
        path = %path.display(),
        no_keys = layout.no_keys(),
        no_layers = layout.no_layers(),
        "loaded layout"
    );
    Ok(layout)
}

/// Encodes `layout` in host format and writes it to `path`.
///
/// # Errors
///
/// Returns [`LayoutFileError::Layout`] if the layout cannot be encoded and
/// [`LayoutFileError::Io`] if the write fails.
pub fn save_layout(layout: &Layout, path: &Path) -> Result<(), LayoutFileError> {
    let data = layout
        .to_bytes(false)
        .map_err(|source| LayoutFileError::Layout {
            path: path.to_path_buf(),
            source,
        })?;
    std::fs::write(path, &data).map_err(|source| LayoutFileError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), bytes = data.len(), "saved layout");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ukbdc_core::{Action, KeyDef};

    fn temp_path(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "ukbdc_layout_{tag}_{}.{LAYOUT_EXTENSION}",
            std::process::id()
        ))
    }

    #[test]
    fn test_save_and_load_preserves_inheritance() {
        // Arrange
        let path = temp_path("roundtrip");
        let mut layout = Layout::new(16, 3).unwrap();
        layout
            .set(0, 2, KeyDef::new(0x1e, Action::none(), Action::relative(1).unwrap()))
            .unwrap();
        layout.set(1, 2, KeyDef::inherited()).unwrap();
        layout.set_parent(2, None).unwrap();

        // Act
        save_layout(&layout, &path).unwrap();
        let loaded = load_layout(&path).unwrap();

        // Assert
        assert_eq!(loaded, layout);
        assert!(loaded.stored(1, 2).unwrap().inherited);
        assert_eq!(loaded.get(1, 2).unwrap().scancode, 0x1e);

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let result = load_layout(Path::new("/nonexistent/ukbdc/missing.lay"));
        assert!(matches!(result, Err(LayoutFileError::Io { .. })));
    }

    #[test]
    fn test_load_truncated_file_is_layout_error() {
        let path = temp_path("truncated");
        std::fs::write(&path, [4u8, 2, 0, 0]).unwrap();

        let result = load_layout(&path);

        assert!(matches!(
            result,
            Err(LayoutFileError::Layout {
                source: LayoutError::LengthMismatch { .. },
                ..
            })
        ));
        std::fs::remove_file(&path).ok();
    }
}
