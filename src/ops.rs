// src/ops.rs
//
// Typed pipeline actions.
// These are cheap to create and store - the expensive pixel work happens
// in the engine modules.

use image::Rgba;

/// One stage in a processing pipeline.
///
/// Design principle: a closed sum type where each variant carries only
/// the parameters that govern it. Parameters arrive pre-clamped from the
/// parser; `None` means the caller never supplied the field, which makes
/// the action a no-op rather than an error.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Action {
    /// Extract a rectangle from the image
    Crop {
        width: Option<u32>,
        height: Option<u32>,
        x: u32,
        y: u32,
    },

    /// Scale to a target box under one of five aspect policies
    Resize {
        width: Option<u32>,
        height: Option<u32>,
        mode: ResizeMode,
        pad_color: Rgba<u8>,
    },

    /// Reduce encoded size within a [min, max] quality band
    Compress {
        quality_min: Option<u8>,
        quality_max: Option<u8>,
    },

    /// Re-encode into another wire format
    Format { format: Option<TargetFormat> },

    /// Crop to a centered circle of the given radius
    CircleCrop { radius: Option<u32> },

    /// Mask the corners with quarter-circle cutouts
    RoundedCorners { radius: Option<u32> },

    /// Add a signed delta to every R/G/B channel (-100..=100)
    Brightness { value: Option<i32> },

    /// Stretch channels away from the fixed 128 midpoint (-100..=100)
    Contrast { value: Option<i32> },

    /// Rotate counter-clockwise by whole degrees (0..=360)
    Rotate { degrees: Option<u32> },

    /// Unsharp-mask detail boost (50..=399)
    Sharpen { strength: Option<i32> },
}

impl Action {
    /// Grammar name of the action, for diagnostics and logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Crop { .. } => "crop",
            Self::Resize { .. } => "resize",
            Self::Compress { .. } => "quality",
            Self::Format { .. } => "format",
            Self::CircleCrop { .. } => "circle",
            Self::RoundedCorners { .. } => "rounded-corners",
            Self::Brightness { .. } => "bright",
            Self::Contrast { .. } => "contrast",
            Self::Rotate { .. } => "rotate",
            Self::Sharpen { .. } => "sharpen",
        }
    }
}

/// Aspect-ratio policy for [`Action::Resize`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ResizeMode {
    /// Scale each axis independently to the requested box ("fixed")
    ExactFit,
    /// Scale by min(wR, hR); output fits inside the box ("lfit")
    #[default]
    LargestFit,
    /// Scale by max(wR, hR); output covers the box ("mfit")
    SmallestFit,
    /// Scale by max(wR, hR), then center-crop to the box ("fill")
    Fill,
    /// Scale by min(wR, hR), then center on a padded canvas ("pad")
    PadToFit,
}

impl ResizeMode {
    /// Map a grammar mode token. Unknown tokens fall back to the
    /// default policy, matching the parser's never-reject contract.
    pub fn from_token(token: &str) -> Self {
        match token {
            "fixed" => Self::ExactFit,
            "lfit" => Self::LargestFit,
            "mfit" => Self::SmallestFit,
            "fill" => Self::Fill,
            "pad" => Self::PadToFit,
            _ => Self::default(),
        }
    }
}

/// Output wire format for format-changing actions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TargetFormat {
    Jpeg,
    Png,
    Gif,
    Bmp,
    WebP,
}

impl TargetFormat {
    /// Map a grammar format token. Unknown tokens fall back to JPEG,
    /// the documented default.
    pub fn from_token(token: &str) -> Self {
        match token {
            "jpg" | "jpeg" => Self::Jpeg,
            "png" => Self::Png,
            "gif" => Self::Gif,
            "bmp" => Self::Bmp,
            "webp" => Self::WebP,
            _ => Self::Jpeg,
        }
    }

    /// Simple subtype string as reported in `image/<subtype>`.
    pub fn simple_type(&self) -> &'static str {
        match self {
            Self::Jpeg => "jpeg",
            Self::Png => "png",
            Self::Gif => "gif",
            Self::Bmp => "bmp",
            Self::WebP => "webp",
        }
    }
}
