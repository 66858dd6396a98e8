// src/engine/common.rs
//
// Common utilities shared across engine modules: per-subtype codec
// support flags and the codec panic policy.

use crate::error::FlyImageError;
use crate::ops::TargetFormat;
use bitflags::bitflags;
use image::DynamicImage;

/// Outcome of one pipeline step: `Ok(None)` means the input buffer
/// passes through untouched (missing parameters make a step a defined
/// no-op, never an error).
pub type StepOutput = Result<Option<Vec<u8>>, FlyImageError>;

/// Outcome of a type-changing step: the new bytes plus the format the
/// working simple type must be rewritten to.
pub type RetypeOutput = Result<Option<(Vec<u8>, TargetFormat)>, FlyImageError>;

bitflags! {
    /// Which codecs a simple-type string matches. Matching is a
    /// case-insensitive substring test, so `x-png` still counts as PNG.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct TypeSupport: u8 {
        const PNG  = 1 << 0;
        const JPEG = 1 << 1;
        const BMP  = 1 << 2;
        const GIF  = 1 << 3;
        const WEBP = 1 << 4;
    }
}

impl TypeSupport {
    pub fn from_simple_type(simple_type: &str) -> Self {
        let t = simple_type.to_ascii_lowercase();
        let mut support = TypeSupport::empty();
        if t.contains("png") {
            support |= TypeSupport::PNG;
        }
        if t.contains("jpeg") {
            support |= TypeSupport::JPEG;
        }
        if t.contains("bmp") {
            support |= TypeSupport::BMP;
        }
        if t.contains("gif") {
            support |= TypeSupport::GIF;
        }
        if t.contains("webp") {
            support |= TypeSupport::WEBP;
        }
        support
    }

    /// The format a transformed buffer re-encodes to, in the fixed
    /// priority order PNG, JPEG, GIF, BMP, WEBP.
    pub fn encode_format(self) -> Option<TargetFormat> {
        if self.contains(TypeSupport::PNG) {
            Some(TargetFormat::Png)
        } else if self.contains(TypeSupport::JPEG) {
            Some(TargetFormat::Jpeg)
        } else if self.contains(TypeSupport::GIF) {
            Some(TargetFormat::Gif)
        } else if self.contains(TypeSupport::BMP) {
            Some(TargetFormat::Bmp)
        } else if self.contains(TypeSupport::WEBP) {
            Some(TargetFormat::WebP)
        } else {
            None
        }
    }
}

/// Require codec support for a subtype, the shared precondition of every
/// pipeline step: unsupported subtypes short-circuit before any decode
/// attempt.
pub fn require_support(simple_type: &str) -> Result<TypeSupport, FlyImageError> {
    let support = TypeSupport::from_simple_type(simple_type);
    if support.is_empty() {
        return Err(FlyImageError::unsupported_format(simple_type.to_string()));
    }
    Ok(support)
}

/// Re-encode a transformed buffer in the format implied by the current
/// simple type, so non-type-changing steps keep the wire format stable.
pub fn encode_same_type(
    img: &DynamicImage,
    support: TypeSupport,
) -> Result<Vec<u8>, FlyImageError> {
    let format = support
        .encode_format()
        .ok_or_else(|| FlyImageError::unsupported_format("no codec for subtype"))?;
    crate::engine::encoder::encode(img, format, None)
}

/// Run a codec closure under the global panic policy: panics in foreign
/// codec code are caught and converted to errors instead of unwinding
/// across the pipeline boundary.
pub fn run_with_panic_policy<T>(
    stage: &'static str,
    f: impl FnOnce() -> Result<T, FlyImageError>,
) -> Result<T, FlyImageError> {
    match std::panic::catch_unwind(std::panic::AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| (*s).to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            Err(FlyImageError::internal_panic(format!("{stage}: {message}")))
        }
    }
}
