//! Format detection for uploaded model files.
//!
//! Uploads are classified purely by file extension (case-insensitive):
//!
//! - **Wavefront OBJ** (`.obj`): converted natively
//! - **STL** (`.stl`, binary or ASCII): converted natively
//! - **AutoCAD DWG** (`.dwg`): recognized, but conversion is not implemented
//!
//! Anything else is rejected as unsupported.

use std::path::Path;

use crate::error::FormatError;

// =============================================================================
// ModelFormat
// =============================================================================

/// A source format that has a glTF converter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelFormat {
    /// Wavefront OBJ text format
    Obj,

    /// Stereolithography, binary or ASCII
    Stl,
}

impl ModelFormat {
    /// Get a human-readable name for the format.
    pub const fn name(&self) -> &'static str {
        match self {
            ModelFormat::Obj => "Wavefront OBJ",
            ModelFormat::Stl => "STL",
        }
    }

    /// Classify an upload by its original file name.
    ///
    /// Same as [`detect_format`].
    pub fn from_filename(filename: &str) -> Result<Self, FormatError> {
        detect_format(filename)
    }

    /// Canonical lowercase extension, including the leading dot.
    pub const fn extension(&self) -> &'static str {
        match self {
            ModelFormat::Obj => ".obj",
            ModelFormat::Stl => ".stl",
        }
    }
}

// =============================================================================
// Format Detection
// =============================================================================

/// Extensions that are recognized but have no converter.
const NOT_IMPLEMENTED_EXTENSIONS: &[&str] = &[".dwg"];

/// Lowercased extension of `filename` with its leading dot, or an empty string.
pub fn extension_of(filename: &str) -> String {
    Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{}", ext.to_lowercase()))
        .unwrap_or_default()
}

/// Detect the model format of an uploaded file from its original name.
///
/// # Returns
/// * `Ok(ModelFormat)` - A convertible format
/// * `Err(FormatError::NotImplemented)` - Known format without a converter (DWG)
/// * `Err(FormatError::Unsupported)` - Unknown extension, or none at all
pub fn detect_format(filename: &str) -> Result<ModelFormat, FormatError> {
    let extension = extension_of(filename);

    match extension.as_str() {
        ".obj" => Ok(ModelFormat::Obj),
        ".stl" => Ok(ModelFormat::Stl),
        ext if NOT_IMPLEMENTED_EXTENSIONS.contains(&ext) => Err(FormatError::NotImplemented {
            extension: ext.trim_start_matches('.').to_uppercase(),
        }),
        _ => Err(FormatError::Unsupported { extension }),
    }
}

// =============================================================================
// Tests
// =============================================================================
