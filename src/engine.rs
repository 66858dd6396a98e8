// src/engine.rs
//
// The transform engine. Each action decodes the current buffer,
// transforms it, and re-encodes; the executor threads the evolving
// simple-type state between steps. This file is a facade over the
// decomposed modules in engine/.

// =============================================================================
// SECURITY LIMITS
// =============================================================================

/// Maximum allowed image dimension (width or height).
/// Images larger than 32768x32768 are rejected to prevent decompression bombs.
pub const MAX_DIMENSION: u32 = 32768;

/// Maximum allowed total pixels (width * height).
/// 100 megapixels = 400MB uncompressed RGBA. Beyond this is likely malicious.
pub const MAX_PIXELS: u64 = 100_000_000;

// =============================================================================
// MODULE DECOMPOSITION
// =============================================================================

mod adjust;
mod common;
mod compress;
mod decoder;
mod encoder;
pub mod executor;
mod geometry;
mod mask;

pub use adjust::{brightness, contrast, sharpen};
pub use common::TypeSupport;
pub use compress::{compress, DEFAULT_QUALITY_MAX, DEFAULT_QUALITY_MIN};
pub use decoder::{check_dimensions, decode_image, detect_format};
pub use encoder::{encode, encode_indexed_png, DEFAULT_JPEG_QUALITY};
pub use executor::{run, ExecutionResult};
pub use geometry::{crop, resize, rotate};
pub use mask::{circle_crop, corner_alpha, rounded_corners};
