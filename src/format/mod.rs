//! Model format parsers and glTF conversion.
//!
//! Uploaded CAD meshes are converted to self-contained glTF 2.0 documents
//! that the viewer can load directly.
//!
//! # Format Detection
//!
//! Use [`detect::detect_format`] to classify an upload by its original file name.
//! Currently supported formats:
//!
//! - **Wavefront OBJ**: one glTF node per `o`/`g` group
//! - **STL**: binary or ASCII, a single node named after the solid
//!
//! DWG is recognized but reported as not implemented.

pub mod detect;
pub mod gltf;
pub mod mesh;
pub mod obj;
pub mod stl;

use std::path::Path;

use crate::error::ConvertError;

pub use detect::{detect_format, extension_of, ModelFormat};
pub use gltf::{build_document, decode_buffer, Document};
pub use mesh::MeshGroup;
pub use obj::parse_obj;
pub use stl::{is_binary_stl, parse_stl};

/// Convert raw model bytes of a known format into a glTF document.
///
/// `default_name` names geometry that carries no name of its own.
pub fn convert_bytes(
    format: ModelFormat,
    data: &[u8],
    default_name: &str,
) -> Result<Document, ConvertError> {
    let groups = match format {
        ModelFormat::Obj => {
            let text = std::str::from_utf8(data).map_err(|_| ConvertError::InvalidEncoding)?;
            parse_obj(text, default_name)?
        }
        ModelFormat::Stl => vec![parse_stl(data, default_name)?],
    };
    Ok(build_document(&groups))
}

/// Read a model file from disk and convert it.
///
/// This is blocking; async callers should run it on the blocking pool.
pub fn convert_file(
    format: ModelFormat,
    path: &Path,
    default_name: &str,
) -> Result<Document, ConvertError> {
    let data = std::fs::read(path)?;
    convert_bytes(format, &data, default_name)
}
