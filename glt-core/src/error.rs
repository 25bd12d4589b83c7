//! Error types for geometry generation and image decoding.

use thiserror::Error;

/// Errors raised while setting up a mesh or validating solid parameters.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GeometryError {
    /// A builder was begun with room for zero triangles
    #[error("mesh capacity must be at least one triangle")]
    ZeroCapacity,

    /// A generator argument is outside the range it can tessellate
    #[error("invalid {name} ({value}): {reason}")]
    InvalidParameter {
        name: &'static str,
        value: f32,
        reason: &'static str,
    },
}

impl GeometryError {
    pub fn invalid(name: &'static str, value: impl Into<f64>, reason: &'static str) -> Self {
        Self::InvalidParameter {
            name,
            value: value.into() as f32,
            reason,
        }
    }
}

/// Errors raised while reading or writing TGA/BMP images.
#[derive(Debug, Error)]
pub enum ImageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The buffer ends before the header or pixel data does
    #[error("image data truncated: needed {needed} bytes, found {found}")]
    Truncated { needed: usize, found: usize },

    /// Compressed, paletted or otherwise unsupported layout
    #[error("unsupported image format: {0}")]
    UnsupportedFormat(String),

    #[error("unsupported bit depth: {0}")]
    UnsupportedDepth(u16),

    /// Header fields that contradict each other
    #[error("malformed image header: {0}")]
    Malformed(String),
}

pub type ImageResult<T> = Result<T, ImageError>;
