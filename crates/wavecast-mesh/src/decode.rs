//! STL decoding into a triangle soup.
//!
//! Binary STL is read directly with `byteorder`; ASCII STL goes through the
//! `stl_io` crate. The binary layout is checked up front so a truncated buffer
//! is rejected before any triangle is produced.

use crate::types::{Position, TriangleSoup};
use byteorder::{ByteOrder, LittleEndian, ReadBytesExt};
use std::io::Cursor;
use thiserror::Error;
use tracing::{debug, trace};

/// Size of the free-form binary STL header
pub const BINARY_HEADER_LEN: usize = 80;

/// Header plus the little-endian `u32` triangle count
pub const BINARY_PREAMBLE_LEN: usize = BINARY_HEADER_LEN + 4;

/// Normal (12) + three vertices (36) + attribute word (2)
pub const BINARY_TRIANGLE_LEN: usize = 50;

/// Errors that can occur when decoding an STL buffer.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Buffer too short for a binary STL header: {len} bytes, need at least 84")]
    TooShort { len: usize },

    #[error("Binary STL declares {declared} triangles ({expected} bytes) but the buffer holds only {actual} bytes")]
    Truncated {
        declared: u32,
        expected: u64,
        actual: usize,
    },

    #[error("Malformed STL data: {0}")]
    Malformed(#[from] std::io::Error),
}

/// STL encoding of a buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StlFormat {
    Binary,
    Ascii,
}

/// Guess the encoding of an STL buffer.
///
/// A buffer whose length exactly matches its declared triangle count is
/// binary even when the header happens to start with `solid`.
pub fn detect_format(bytes: &[u8]) -> StlFormat {
    if let Some(expected) = expected_binary_len(bytes) {
        if expected == bytes.len() as u64 {
            return StlFormat::Binary;
        }
    }

    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    if bytes[start..].starts_with(b"solid") {
        StlFormat::Ascii
    } else {
        StlFormat::Binary
    }
}

/// Read the declared triangle count of a binary STL, if the preamble is present
pub fn declared_triangle_count(bytes: &[u8]) -> Option<u32> {
    bytes
        .get(BINARY_HEADER_LEN..BINARY_PREAMBLE_LEN)
        .map(LittleEndian::read_u32)
}

fn binary_len(triangles: u32) -> u64 {
    BINARY_PREAMBLE_LEN as u64 + triangles as u64 * BINARY_TRIANGLE_LEN as u64
}

fn expected_binary_len(bytes: &[u8]) -> Option<u64> {
    declared_triangle_count(bytes).map(binary_len)
}

/// Check that a binary buffer is long enough for the triangles it declares.
/// Trailing bytes after the last declared triangle are tolerated.
fn check_binary_layout(bytes: &[u8]) -> Result<u32, DecodeError> {
    let Some(declared) = declared_triangle_count(bytes) else {
        return Err(DecodeError::TooShort { len: bytes.len() });
    };
    let expected = binary_len(declared);

    if (bytes.len() as u64) < expected {
        return Err(DecodeError::Truncated {
            declared,
            expected,
            actual: bytes.len(),
        });
    }

    if (bytes.len() as u64) > expected {
        trace!(
            "Ignoring {} trailing bytes after {} declared triangles",
            bytes.len() as u64 - expected,
            declared
        );
    }

    Ok(declared)
}

/// Decode a raw STL buffer into a non-indexed triangle soup.
///
/// Face normals stored in the file are discarded; the scene only needs
/// positions.
pub fn decode(bytes: &[u8]) -> Result<TriangleSoup, DecodeError> {
    let format = detect_format(bytes);
    debug!("Decoding {:?} STL from {} bytes", format, bytes.len());

    let soup = match format {
        StlFormat::Binary => decode_binary(bytes)?,
        StlFormat::Ascii => decode_ascii(bytes)?,
    };

    debug!("Decoded {} triangles", soup.triangle_count());
    Ok(soup)
}

fn decode_binary(bytes: &[u8]) -> Result<TriangleSoup, DecodeError> {
    let declared = check_binary_layout(bytes)?;
    let mut reader = Cursor::new(&bytes[BINARY_PREAMBLE_LEN..]);

    let mut positions: Vec<Position> = Vec::with_capacity(declared as usize * 3);
    for _ in 0..declared {
        // Face normal
        for _ in 0..3 {
            reader.read_f32::<LittleEndian>()?;
        }
        for _ in 0..3 {
            positions.push([
                reader.read_f32::<LittleEndian>()?,
                reader.read_f32::<LittleEndian>()?,
                reader.read_f32::<LittleEndian>()?,
            ]);
        }
        // Attribute byte count
        reader.read_u16::<LittleEndian>()?;
    }

    Ok(TriangleSoup::from_positions(positions))
}

fn decode_ascii(bytes: &[u8]) -> Result<TriangleSoup, DecodeError> {
    let mut cursor = Cursor::new(bytes);
    let reader = stl_io::create_stl_reader(&mut cursor)?;

    let mut positions: Vec<Position> = Vec::new();
    for triangle in reader {
        let triangle = triangle?;
        for vertex in triangle.vertices {
            positions.push(vertex.into());
        }
    }

    Ok(TriangleSoup::from_positions(positions))
}
