// src/engine/mask.rs
//
// Rounded-rectangle/circle alpha masking. The mask itself is a pure
// function of (x, y, width, height, radius); the two actions composite
// the source through it onto a transparent (PNG) or opaque white (JPEG)
// background and re-encode.

use crate::engine::common::{require_support, RetypeOutput};
use crate::engine::decoder::decode_image;
use crate::engine::encoder::encode;
use crate::ops::TargetFormat;
use image::{DynamicImage, GenericImageView, Rgba, RgbaImage};

/// Mask alpha at (x, y) for a rounded rectangle of the given size.
///
/// Returns 0 only inside the four corner exclusion zones, where the
/// Euclidean distance from the corner's inset-by-radius anchor exceeds
/// the radius; 255 everywhere else, including the full non-corner
/// interior. Radius 0 masks nothing.
pub fn corner_alpha(x: u32, y: u32, width: u32, height: u32, radius: u32) -> u8 {
    if radius == 0 {
        return 255;
    }
    let r = radius as i64;
    let x = x as i64;
    let y = y as i64;
    let w = width as i64 - 1;
    let h = height as i64 - 1;
    let r_sq = r * r;

    let outside = |dx: i64, dy: i64| r_sq < dx * dx + dy * dy;

    if x < r && y < r && outside(r - x, r - y) {
        return 0; // top left
    }
    if x > w - r && y < r && outside(w - r - x, r - y) {
        return 0; // top right
    }
    if x < r && y > h - r && outside(r - x, h - r - y) {
        return 0; // bottom left
    }
    if x > w - r && y > h - r && outside(w - r - x, h - r - y) {
        return 0; // bottom right
    }
    255
}

/// Crop to a centered circle: a square of side `2 * radius` is cut from
/// the image center, then corner-masked with that radius. The output is
/// PNG when the pipeline's last requested format was PNG, JPEG otherwise.
pub fn circle_crop(
    buffer: &[u8],
    simple_type: &str,
    radius: Option<u32>,
    last_format: Option<TargetFormat>,
) -> RetypeOutput {
    let Some(radius) = radius else { return Ok(None) };
    if radius == 0 {
        return Ok(None);
    }

    require_support(simple_type)?;
    let (img, _) = decode_image(buffer)?;
    let (width, height) = img.dimensions();

    // After clamping, radius never exceeds half of either dimension,
    // so the centered square stays inside the source
    let radius = clamp_radius(radius, width, height);
    let side = radius * 2;
    let x = (width as f64 * 0.5) as u32 - radius;
    let y = (height as f64 * 0.5) as u32 - radius;
    let square = img.crop_imm(x, y, side, side).to_rgba8();

    composite_masked(&square, side, side, radius, last_format)
}

/// Mask the full canvas with quarter-circle corner cutouts. Unlike
/// [`circle_crop`] the source is not pre-cropped.
pub fn rounded_corners(
    buffer: &[u8],
    simple_type: &str,
    radius: Option<u32>,
    last_format: Option<TargetFormat>,
) -> RetypeOutput {
    let Some(radius) = radius else { return Ok(None) };
    if radius == 0 {
        return Ok(None);
    }

    require_support(simple_type)?;
    let (img, _) = decode_image(buffer)?;
    let (width, height) = img.dimensions();

    let radius = clamp_radius(radius, width, height);
    let source = img.to_rgba8();

    composite_masked(&source, width, height, radius, last_format)
}

fn clamp_radius(radius: u32, width: u32, height: u32) -> u32 {
    let max = (width.min(height) as f64 * 0.5) as u32;
    radius.min(max)
}

fn composite_masked(
    source: &RgbaImage,
    width: u32,
    height: u32,
    radius: u32,
    last_format: Option<TargetFormat>,
) -> RetypeOutput {
    let to_png = last_format == Some(TargetFormat::Png);

    // PNG keeps a transparent background; every other output gets
    // opaque white behind the mask
    let background = if to_png {
        Rgba([0, 0, 0, 0])
    } else {
        Rgba([255, 255, 255, 255])
    };

    let mut canvas = RgbaImage::from_pixel(width, height, background);
    for y in 0..height {
        for x in 0..width {
            if corner_alpha(x, y, width, height, radius) == 0 {
                continue;
            }
            let src = source
                .get_pixel_checked(x, y)
                .copied()
                .unwrap_or(Rgba([0, 0, 0, 0]));
            let blended = blend_over(*canvas.get_pixel(x, y), src);
            canvas.put_pixel(x, y, blended);
        }
    }

    let format = if to_png {
        TargetFormat::Png
    } else {
        TargetFormat::Jpeg
    };
    let bytes = encode(&DynamicImage::ImageRgba8(canvas), format, None)?;
    Ok(Some((bytes, format)))
}

/// Source-over composite of one pixel.
fn blend_over(dst: Rgba<u8>, src: Rgba<u8>) -> Rgba<u8> {
    let src_a = src[3] as u32;
    if src_a == 255 {
        return src;
    }
    let dst_a = dst[3] as u32;
    let inv = 255 - src_a;
    let out_a = src_a + dst_a * inv / 255;
    if out_a == 0 {
        return Rgba([0, 0, 0, 0]);
    }
    let channel = |s: u8, d: u8| {
        let s = s as u32;
        let d = d as u32;
        ((s * src_a + d * dst_a * inv / 255) / out_a) as u8
    };
    Rgba([
        channel(src[0], dst[0]),
        channel(src[1], dst[1]),
        channel(src[2], dst[2]),
        out_a as u8,
    ])
}
