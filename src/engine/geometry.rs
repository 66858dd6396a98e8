// src/engine/geometry.rs
//
// Geometric transforms: crop, multi-mode resize, rotation.
// Resize sampling is nearest-neighbor throughout; rotation reverse-maps
// with truncating coordinates. Both are fixed for output parity.

use crate::engine::common::{encode_same_type, require_support, StepOutput};
use crate::engine::decoder::decode_image;
use crate::error::FlyImageError;
use crate::ops::ResizeMode;
use fast_image_resize::{self as fir, PixelType, ResizeOptions};
use image::{imageops, DynamicImage, Rgba, RgbaImage, RgbImage};

/// Extract the rectangle `[x, y]..[x+w, y+h]`.
///
/// Both dimensions absent is a no-op. A rectangle with a zero side or
/// one that falls outside the source bounds is a defined failure: the
/// caller receives the pre-crop buffer unchanged.
pub fn crop(
    buffer: &[u8],
    simple_type: &str,
    width: Option<u32>,
    height: Option<u32>,
    x: u32,
    y: u32,
) -> StepOutput {
    if width.is_none() && height.is_none() {
        return Ok(None);
    }
    let w = width.unwrap_or(0);
    let h = height.unwrap_or(0);
    if w == 0 && h == 0 {
        return Ok(None);
    }

    let support = require_support(simple_type)?;
    let (img, _) = decode_image(buffer)?;

    if w == 0 || h == 0 {
        return Err(FlyImageError::invalid_crop_dimensions(w, h));
    }
    let (img_w, img_h) = (img.width(), img.height());
    if x + w > img_w || y + h > img_h {
        return Err(FlyImageError::invalid_crop_bounds(x, y, w, h, img_w, img_h));
    }

    let cropped = img.crop_imm(x, y, w, h);
    Ok(Some(encode_same_type(&cropped, support)?))
}

/// Scale to a target box under one of five aspect policies.
///
/// With `wR = w/srcW` and `hR = h/srcH`: ExactFit scales each axis
/// independently, LargestFit scales by min(wR, hR), SmallestFit by
/// max(wR, hR), Fill by max then center-crops to the box, PadToFit by
/// min then centers the result on a padded canvas. Scaled dimensions
/// truncate; the centering offset per axis is `abs((target-scaled)/2)`.
pub fn resize(
    buffer: &[u8],
    simple_type: &str,
    width: Option<u32>,
    height: Option<u32>,
    mode: ResizeMode,
    pad_color: Rgba<u8>,
) -> StepOutput {
    if width.is_none() && height.is_none() {
        return Ok(None);
    }
    let w = width.unwrap_or(0);
    let h = height.unwrap_or(0);
    if w == 0 && h == 0 {
        return Ok(None);
    }

    let support = require_support(simple_type)?;
    let (img, _) = decode_image(buffer)?;

    let src_w = img.width();
    let src_h = img.height();
    if src_w == 0 || src_h == 0 {
        return Err(FlyImageError::corrupted_image());
    }
    let w_ratio = w as f64 / src_w as f64;
    let h_ratio = h as f64 / src_h as f64;

    let resized = match mode {
        ResizeMode::ExactFit => scale_to(img, w, h)?,
        ResizeMode::LargestFit => scale_by_ratio(img, w_ratio.min(h_ratio))?,
        ResizeMode::SmallestFit => scale_by_ratio(img, w_ratio.max(h_ratio))?,
        ResizeMode::Fill => {
            if w == 0 || h == 0 {
                return Err(FlyImageError::invalid_crop_dimensions(w, h));
            }
            let scaled = scale_by_ratio(img, w_ratio.max(h_ratio))?;
            let off_x = center_offset(w, scaled.width());
            let off_y = center_offset(h, scaled.height());
            // crop_imm clips to the raster, absorbing the one-pixel
            // shortfall ratio truncation can leave on an axis
            scaled.crop_imm(off_x, off_y, w, h)
        }
        ResizeMode::PadToFit => {
            if w == 0 || h == 0 {
                return Err(FlyImageError::invalid_crop_dimensions(w, h));
            }
            let scaled = scale_by_ratio(img, w_ratio.min(h_ratio))?;
            let off_x = center_offset(w, scaled.width());
            let off_y = center_offset(h, scaled.height());
            let mut canvas = RgbaImage::from_pixel(w, h, pad_color);
            imageops::replace(&mut canvas, &scaled.to_rgba8(), off_x as i64, off_y as i64);
            DynamicImage::ImageRgba8(canvas)
        }
    };

    Ok(Some(encode_same_type(&resized, support)?))
}

fn center_offset(target: u32, scaled: u32) -> u32 {
    ((target as f64 - scaled as f64) * 0.5).abs() as u32
}

/// Scale both axes by one ratio, truncating the target dimensions.
/// Both axes truncating to zero leaves the raster unscaled; a single
/// zero axis is derived from the source aspect ratio.
fn scale_by_ratio(img: DynamicImage, ratio: f64) -> Result<DynamicImage, FlyImageError> {
    let target_w = (img.width() as f64 * ratio) as u32;
    let target_h = (img.height() as f64 * ratio) as u32;
    scale_to(img, target_w, target_h)
}

/// Resize to the target box; a zero dimension is derived from the
/// source aspect ratio, and a fully zero target is the identity.
fn scale_to(img: DynamicImage, width: u32, height: u32) -> Result<DynamicImage, FlyImageError> {
    let src_w = img.width();
    let src_h = img.height();
    let (width, height) = match (width, height) {
        (0, 0) => return Ok(img),
        (0, h) => (
            ((src_w as f64 / src_h as f64) * h as f64).round().max(1.0) as u32,
            h,
        ),
        (w, 0) => (
            w,
            ((src_h as f64 / src_w as f64) * w as f64).round().max(1.0) as u32,
        ),
        (w, h) => (w, h),
    };
    if (width, height) == (src_w, src_h) {
        return Ok(img);
    }
    resize_nearest(img, width, height)
}

/// Nearest-neighbor resize through fast_image_resize.
fn resize_nearest(
    img: DynamicImage,
    dst_width: u32,
    dst_height: u32,
) -> Result<DynamicImage, FlyImageError> {
    let src_width = img.width();
    let src_height = img.height();
    if src_width == 0 || src_height == 0 || dst_width == 0 || dst_height == 0 {
        return Err(FlyImageError::resize_failed(
            (src_width, src_height),
            (dst_width, dst_height),
            "invalid dimensions for resize",
        ));
    }

    // Select pixel layout without forcing RGBA when not needed;
    // into_raw() transfers ownership of the pixel buffer
    let (pixel_type, mut src_pixels): (PixelType, Vec<u8>) = match img {
        DynamicImage::ImageRgb8(rgb) => (PixelType::U8x3, rgb.into_raw()),
        DynamicImage::ImageRgba8(rgba) => (PixelType::U8x4, rgba.into_raw()),
        other => (PixelType::U8x4, other.to_rgba8().into_raw()),
    };

    let src_image = fir::images::Image::from_slice_u8(
        src_width,
        src_height,
        src_pixels.as_mut_slice(),
        pixel_type,
    )
    .map_err(|e| {
        FlyImageError::resize_failed(
            (src_width, src_height),
            (dst_width, dst_height),
            format!("fir source image error: {e:?}"),
        )
    })?;

    let mut dst_image = fir::images::Image::new(dst_width, dst_height, pixel_type);
    let mut resizer = fir::Resizer::new();
    resizer
        .resize(
            &src_image,
            &mut dst_image,
            &ResizeOptions::new().resize_alg(fir::ResizeAlg::Nearest),
        )
        .map_err(|e| {
            FlyImageError::resize_failed(
                (src_width, src_height),
                (dst_width, dst_height),
                format!("fir resize error: {e:?}"),
            )
        })?;

    let buf = dst_image.buffer().to_vec();
    let rebuilt = match pixel_type {
        PixelType::U8x3 => {
            RgbImage::from_raw(dst_width, dst_height, buf).map(DynamicImage::ImageRgb8)
        }
        _ => RgbaImage::from_raw(dst_width, dst_height, buf).map(DynamicImage::ImageRgba8),
    };
    rebuilt.ok_or_else(|| {
        FlyImageError::resize_failed(
            (src_width, src_height),
            (dst_width, dst_height),
            "failed to rebuild image from resized buffer",
        )
    })
}

/// Rotate counter-clockwise by whole degrees about the image center.
///
/// The output canvas is the bounding box of the four rotated corners.
/// Each destination pixel reverse-maps through rotation by `360 - v`;
/// sources outside the original half-extents fill opaque white.
/// Fractional coordinates truncate - no interpolation.
pub fn rotate(buffer: &[u8], simple_type: &str, degrees: Option<u32>) -> StepOutput {
    let Some(v) = degrees else { return Ok(None) };
    if v % 360 == 0 {
        return Ok(None);
    }

    let support = require_support(simple_type)?;
    let (img, _) = decode_image(buffer)?;
    let src = img.to_rgba8();
    let (src_w, src_h) = src.dimensions();

    let half_w = src_w as f64 / 2.0;
    let half_h = src_h as f64 / 2.0;

    let theta = (v as f64).to_radians();
    let (sin, cos) = theta.sin_cos();

    let (lt_x, lt_y) = rotate_position(-half_w, half_h, sin, cos);
    let (rt_x, rt_y) = rotate_position(half_w, half_h, sin, cos);
    let (lb_x, lb_y) = rotate_position(-half_w, -half_h, sin, cos);
    let (rb_x, rb_y) = rotate_position(half_w, -half_h, sin, cos);

    let max_width = (rb_x - lt_x).abs().max((rt_x - lb_x).abs()) as u32;
    let max_height = (rb_y - lt_y).abs().max((rt_y - lb_y).abs()) as u32;

    let out_half_w = max_width as f64 / 2.0;
    let out_half_h = max_height as f64 / 2.0;
    let inverse = ((360 - v) as f64).to_radians();
    let (sin_r, cos_r) = inverse.sin_cos();

    let mut canvas = RgbaImage::new(max_width, max_height);
    for y in 0..max_height {
        for x in 0..max_width {
            let tx = ((x as f64 - out_half_w) * cos_r + (-(y as f64) + out_half_h) * sin_r) as i64;
            let ty = (-(x as f64 - out_half_w) * sin_r + (-(y as f64) + out_half_h) * cos_r) as i64;
            let tx_f = tx as f64;
            let ty_f = ty as f64;
            let mut pixel = Rgba([255, 255, 255, 255]);
            if !(tx_f > half_w || tx_f < -half_w || ty_f > half_h || ty_f < -half_h) {
                let sample_x = (tx_f + half_w) as u32;
                let sample_y = (ty_f - half_h).abs() as u32;
                pixel = if sample_x < src_w && sample_y < src_h {
                    *src.get_pixel(sample_x, sample_y)
                } else {
                    Rgba([0, 0, 0, 0])
                };
            }
            canvas.put_pixel(x, y, pixel);
        }
    }

    Ok(Some(encode_same_type(
        &DynamicImage::ImageRgba8(canvas),
        support,
    )?))
}

fn rotate_position(x: f64, y: f64, sin: f64, cos: f64) -> (f64, f64) {
    (x * cos + y * sin, -x * sin + y * cos)
}
