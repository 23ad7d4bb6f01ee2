//! STL parser (binary and ASCII).
//!
//! # Binary Layout
//!
//! ```text
//! 80 bytes   header (ignored)
//!  4 bytes   triangle count (u32, little-endian)
//! 50 bytes   per triangle: normal (3 x f32), 3 vertices (9 x f32), attribute (u16)
//! ```
//!
//! A file is treated as binary when its size is exactly `84 + 50 * count`.
//! Binary files are allowed to start with `solid`, so the header text alone
//! cannot be trusted; everything else is parsed as ASCII.

use crate::error::ConvertError;

use super::mesh::MeshGroup;

/// Size of the binary STL header including the triangle count.
pub const BINARY_HEADER_SIZE: usize = 84;

/// Size of one binary STL triangle record.
pub const BINARY_TRIANGLE_SIZE: usize = 50;

/// Check whether the data is laid out as a binary STL.
pub fn is_binary_stl(data: &[u8]) -> bool {
    if data.len() < BINARY_HEADER_SIZE {
        return false;
    }
    let count = read_u32_le(data, 80) as u64;
    BINARY_HEADER_SIZE as u64 + BINARY_TRIANGLE_SIZE as u64 * count == data.len() as u64
}

/// Parse STL bytes into a single named group.
///
/// ASCII files take their name from the first `solid` line; binary files
/// (and unnamed solids) use `default_name`.
pub fn parse_stl(data: &[u8], default_name: &str) -> Result<MeshGroup, ConvertError> {
    let group = if is_binary_stl(data) {
        parse_binary(data, default_name)?
    } else if looks_like_ascii(data) {
        let text = std::str::from_utf8(data).map_err(|_| ConvertError::InvalidEncoding)?;
        parse_ascii(text, default_name)?
    } else if data.len() >= BINARY_HEADER_SIZE {
        let count = read_u32_le(data, 80) as u64;
        return Err(ConvertError::Truncated {
            expected: BINARY_HEADER_SIZE as u64 + BINARY_TRIANGLE_SIZE as u64 * count,
            actual: data.len() as u64,
        });
    } else {
        return Err(ConvertError::Truncated {
            expected: BINARY_HEADER_SIZE as u64,
            actual: data.len() as u64,
        });
    };

    if group.is_empty() {
        return Err(ConvertError::EmptyMesh);
    }
    Ok(group)
}

fn looks_like_ascii(data: &[u8]) -> bool {
    let trimmed = data
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .map(|start| &data[start..])
        .unwrap_or(&[]);
    trimmed.len() >= 5 && trimmed[..5].eq_ignore_ascii_case(b"solid")
}

fn parse_binary(data: &[u8], default_name: &str) -> Result<MeshGroup, ConvertError> {
    let count = read_u32_le(data, 80) as usize;
    let mut group = MeshGroup::new(default_name);

    for i in 0..count {
        let base = BINARY_HEADER_SIZE + i * BINARY_TRIANGLE_SIZE;
        let normal = read_vec3(data, base);
        let corners = [
            read_vec3(data, base + 12),
            read_vec3(data, base + 24),
            read_vec3(data, base + 36),
        ];
        let finite = std::iter::once(&normal)
            .chain(corners.iter())
            .flatten()
            .all(|c| c.is_finite());
        if !finite {
            return Err(ConvertError::NonFinite { triangle: i });
        }
        group.push_flat_triangle(corners, Some(normal));
    }
    Ok(group)
}

fn parse_ascii(text: &str, default_name: &str) -> Result<MeshGroup, ConvertError> {
    let mut group = MeshGroup::new(default_name);
    let mut named = false;
    let mut facet_normal: Option<[f32; 3]> = None;
    let mut corners: Vec<[f32; 3]> = Vec::with_capacity(3);
    let mut in_facet = false;

    for (line_index, raw_line) in text.lines().enumerate() {
        let line_no = line_index + 1;
        let mut tokens = raw_line.split_whitespace();
        let Some(keyword) = tokens.next() else {
            continue;
        };

        match keyword.to_ascii_lowercase().as_str() {
            "solid" => {
                let name: Vec<&str> = tokens.collect();
                if !named && !name.is_empty() {
                    group.name = name.join(" ");
                }
                named = true;
            }
            "facet" => {
                if in_facet {
                    return Err(parse_error(line_no, "nested facet"));
                }
                in_facet = true;
                corners.clear();
                facet_normal = match tokens.next() {
                    Some(word) if word.eq_ignore_ascii_case("normal") => {
                        let args: Vec<&str> = tokens.collect();
                        Some(parse_floats(&args, line_no)?)
                    }
                    _ => None,
                };
            }
            "vertex" => {
                if !in_facet {
                    return Err(parse_error(line_no, "vertex outside of facet"));
                }
                let args: Vec<&str> = tokens.collect();
                corners.push(parse_floats(&args, line_no)?);
            }
            "endfacet" => {
                if !in_facet || corners.len() != 3 {
                    return Err(parse_error(
                        line_no,
                        &format!("facet must have exactly 3 vertices, got {}", corners.len()),
                    ));
                }
                group.push_flat_triangle([corners[0], corners[1], corners[2]], facet_normal);
                in_facet = false;
            }
            "outer" | "endloop" | "endsolid" => {}
            other => {
                return Err(parse_error(line_no, &format!("unexpected '{}'", other)));
            }
        }
    }

    if in_facet {
        return Err(parse_error(text.lines().count(), "unterminated facet"));
    }
    Ok(group)
}

fn parse_error(line: usize, message: &str) -> ConvertError {
    ConvertError::Parse {
        line,
        message: message.to_string(),
    }
}

fn parse_floats(args: &[&str], line: usize) -> Result<[f32; 3], ConvertError> {
    if args.len() != 3 {
        return Err(parse_error(
            line,
            &format!("expected 3 numbers, got {}", args.len()),
        ));
    }
    let mut out = [0.0f32; 3];
    for (slot, token) in out.iter_mut().zip(args) {
        let value: f32 = token
            .parse()
            .map_err(|_| parse_error(line, &format!("invalid number '{}'", token)))?;
        if !value.is_finite() {
            return Err(parse_error(line, &format!("non-finite number '{}'", token)));
        }
        *slot = value;
    }
    Ok(out)
}

fn read_u32_le(data: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ])
}

fn read_f32_le(data: &[u8], offset: usize) -> f32 {
    f32::from_bits(read_u32_le(data, offset))
}

fn read_vec3(data: &[u8], offset: usize) -> [f32; 3] {
    [
        read_f32_le(data, offset),
        read_f32_le(data, offset + 4),
        read_f32_le(data, offset + 8),
    ]
}

// =============================================================================
// Tests
// =============================================================================
