// src/engine/adjust.rs
//
// Color transforms: brightness, contrast, and the unsharp-mask sharpen.
// All three walk an owned rgba8 buffer and re-encode in the same format.

use crate::color::clamp_channel;
use crate::engine::common::{encode_same_type, require_support, StepOutput};
use crate::engine::decoder::decode_image;
use image::{DynamicImage, Rgba, RgbaImage};

/// Fixed midpoint the contrast stretch pivots on.
const CONTRAST_MIDPOINT: i32 = 128;

/// Texture level above which sharpen adds detail back to a pixel.
const SHARPEN_TEXTURE_THRESHOLD: i32 = 128;

/// Gaussian-like 3x3 blur kernel, weights summing to 16.
const SHARPEN_KERNEL: [i32; 9] = [1, 2, 1, 2, 4, 2, 1, 2, 1];

/// Add a signed delta to every R/G/B channel, clamped to 0..=255.
/// Alpha is unchanged.
pub fn brightness(buffer: &[u8], simple_type: &str, value: Option<i32>) -> StepOutput {
    let Some(delta) = value else { return Ok(None) };
    if delta == 0 {
        return Ok(None);
    }
    remap_channels(buffer, simple_type, |channel| channel + delta)
}

/// Stretch every R/G/B channel away from the fixed 128 midpoint:
/// `out = in + (in - 128) * delta / 255`, clamped to 0..=255.
pub fn contrast(buffer: &[u8], simple_type: &str, value: Option<i32>) -> StepOutput {
    let Some(delta) = value else { return Ok(None) };
    if delta == 0 {
        return Ok(None);
    }
    remap_channels(buffer, simple_type, |channel| {
        channel + (channel - CONTRAST_MIDPOINT) * delta / 255
    })
}

fn remap_channels(
    buffer: &[u8],
    simple_type: &str,
    remap: impl Fn(i32) -> i32,
) -> StepOutput {
    let support = require_support(simple_type)?;
    let (img, _) = decode_image(buffer)?;
    let mut rgba = img.to_rgba8();
    for pixel in rgba.pixels_mut() {
        pixel[0] = clamp_channel(remap(pixel[0] as i32));
        pixel[1] = clamp_channel(remap(pixel[1] as i32));
        pixel[2] = clamp_channel(remap(pixel[2] as i32));
    }
    Ok(Some(encode_same_type(
        &DynamicImage::ImageRgba8(rgba),
        support,
    )?))
}

/// Unsharp-mask variant: for every interior pixel, blur the 3x3
/// neighborhood (kernel sum shifted right by 4), take
/// `texture = clamp(center - blurred)`, and when texture exceeds the
/// fixed threshold add `detail = (texture * strength) >> 5` back to the
/// center. The border ring passes through unmodified.
pub fn sharpen(buffer: &[u8], simple_type: &str, strength: Option<i32>) -> StepOutput {
    let Some(strength) = strength else { return Ok(None) };
    if strength < 1 {
        return Ok(None);
    }

    let support = require_support(simple_type)?;
    let (img, _) = decode_image(buffer)?;
    let src = img.to_rgba8();
    let (width, height) = src.dimensions();

    let mut out = RgbaImage::new(width, height);
    for y in 0..height {
        for x in 0..width {
            let pixel = src.get_pixel(x, y);
            let mut channels = [pixel[0] as i32, pixel[1] as i32, pixel[2] as i32];
            if x > 0 && x + 1 < width && y > 0 && y + 1 < height {
                for (channel, value) in channels.iter_mut().enumerate() {
                    *value = sharpen_channel(&src, x, y, channel, strength);
                }
            }
            out.put_pixel(
                x,
                y,
                Rgba([
                    clamp_channel(channels[0]),
                    clamp_channel(channels[1]),
                    clamp_channel(channels[2]),
                    pixel[3],
                ]),
            );
        }
    }

    Ok(Some(encode_same_type(
        &DynamicImage::ImageRgba8(out),
        support,
    )?))
}

fn sharpen_channel(src: &RgbaImage, x: u32, y: u32, channel: usize, strength: i32) -> i32 {
    let mut sum = 0;
    let mut tap = 0;
    for dx in -1i32..=1 {
        for dy in -1i32..=1 {
            let sample = src.get_pixel((x as i32 + dx) as u32, (y as i32 + dy) as u32);
            sum += sample[channel] as i32 * SHARPEN_KERNEL[tap];
            tap += 1;
        }
    }

    let center = src.get_pixel(x, y)[channel] as i32;
    let blurred = sum >> 4;
    let texture = clamp_channel(center - blurred) as i32;
    if texture > SHARPEN_TEXTURE_THRESHOLD {
        clamp_channel(center + ((texture * strength) >> 5)) as i32
    } else {
        center
    }
}
