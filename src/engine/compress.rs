// src/engine/compress.rs
//
// Compression/quantization within a [min, max] quality band.
// JPEG re-encodes once at the band midpoint; PNG goes through palette
// quantization; animated GIF quantizes every frame concurrently and
// reassembles them in original order.

use crate::engine::common::{StepOutput, TypeSupport};
use crate::engine::decoder::decode_image;
use crate::engine::encoder::{encode_indexed_png, encode_jpeg};
use crate::error::FlyImageError;
use image::codecs::gif::{GifDecoder, GifEncoder, Repeat};
use image::{AnimationDecoder, Frame, RgbaImage};
use std::io::Cursor;
use std::sync::mpsc;
use tracing::warn;

/// Default quality band when the action carries no explicit bounds.
pub const DEFAULT_QUALITY_MIN: u8 = 40;
pub const DEFAULT_QUALITY_MAX: u8 = 90;

/// libimagequant speed/quality trade-off; 10 is the fastest setting.
const QUANTIZE_SPEED: i32 = 10;

/// Reduce encoded size by lowering color fidelity within the quality
/// band. Only PNG, JPEG and GIF are compressible; anything else is a
/// fail-soft no-op.
pub fn compress(
    buffer: &[u8],
    simple_type: &str,
    quality_min: Option<u8>,
    quality_max: Option<u8>,
) -> StepOutput {
    let support = TypeSupport::from_simple_type(simple_type);
    if !support.intersects(TypeSupport::PNG | TypeSupport::JPEG | TypeSupport::GIF) {
        return Err(FlyImageError::unsupported_format(simple_type.to_string()));
    }

    let min = quality_min.unwrap_or(DEFAULT_QUALITY_MIN);
    let max = quality_max.unwrap_or(DEFAULT_QUALITY_MAX);

    let bytes = if support.contains(TypeSupport::PNG) {
        compress_png(buffer, min, max)?
    } else if support.contains(TypeSupport::JPEG) {
        compress_jpeg(buffer, min, max)?
    } else {
        compress_gif(buffer, min, max)?
    };
    Ok(Some(bytes))
}

/// JPEG has no palette to shrink; re-encode once at the band midpoint.
fn compress_jpeg(buffer: &[u8], min: u8, max: u8) -> Result<Vec<u8>, FlyImageError> {
    let (img, _) = decode_image(buffer)?;
    let quality = min + ((max - min) as f64 * 0.5) as u8;
    encode_jpeg(&img, quality)
}

fn compress_png(buffer: &[u8], min: u8, max: u8) -> Result<Vec<u8>, FlyImageError> {
    let (img, _) = decode_image(buffer)?;
    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();
    let (palette, indices) = quantize_rgba(&rgba, min, max)?;
    encode_indexed_png(&palette, &indices, width, height)
}

/// Quantize every frame independently and concurrently, then reassemble
/// in original order.
///
/// Each task is handed its frame plus its slot index; results come back
/// over a channel as `(index, buffer)` pairs and the fan-in loop below
/// waits for exactly one result per frame before writing it into its
/// original position. Order is never inferred from completion order.
fn compress_gif(buffer: &[u8], min: u8, max: u8) -> Result<Vec<u8>, FlyImageError> {
    let decoder = GifDecoder::new(Cursor::new(buffer))
        .map_err(|e| FlyImageError::decode_failed(format!("gif: decode failed: {e}")))?;
    let frames = decoder
        .into_frames()
        .collect_frames()
        .map_err(|e| FlyImageError::decode_failed(format!("gif: frame extraction failed: {e}")))?;
    if frames.is_empty() {
        return Err(FlyImageError::decode_failed("gif: no frames"));
    }
    let count = frames.len();

    let (tx, rx) = mpsc::channel::<(usize, RgbaImage)>();
    rayon::scope(|scope| {
        for (index, frame) in frames.iter().enumerate() {
            let tx = tx.clone();
            scope.spawn(move |_| {
                let quantized = match quantize_frame(frame.buffer(), min, max) {
                    Ok(frame_buffer) => frame_buffer,
                    Err(error) => {
                        warn!(frame = index, %error, "frame quantization failed, falling back to web-safe palette");
                        fallback_palette(frame.buffer())
                    }
                };
                let _ = tx.send((index, quantized));
            });
        }
    });
    drop(tx);

    let mut slots: Vec<Option<RgbaImage>> = (0..count).map(|_| None).collect();
    for _ in 0..count {
        let Ok((index, frame_buffer)) = rx.recv() else {
            break;
        };
        slots[index] = Some(frame_buffer);
    }

    let mut out = Vec::new();
    {
        let mut encoder = GifEncoder::new(&mut out);
        encoder
            .set_repeat(Repeat::Infinite)
            .map_err(|e| FlyImageError::encode_failed("gif", format!("set repeat failed: {e}")))?;
        for (frame, slot) in frames.into_iter().zip(slots) {
            let left = frame.left();
            let top = frame.top();
            let delay = frame.delay();
            let frame_buffer = match slot {
                Some(frame_buffer) => frame_buffer,
                None => frame.into_buffer(),
            };
            encoder
                .encode_frame(Frame::from_parts(frame_buffer, left, top, delay))
                .map_err(|e| {
                    FlyImageError::encode_failed("gif", format!("frame encode failed: {e}"))
                })?;
        }
    }
    Ok(out)
}

/// Palette-quantize an RGBA buffer, returning the palette and one index
/// per pixel.
fn quantize_rgba(
    rgba: &RgbaImage,
    min: u8,
    max: u8,
) -> Result<(Vec<imagequant::RGBA>, Vec<u8>), FlyImageError> {
    let quantize_err = |e: imagequant::Error| FlyImageError::quantize_failed(e.to_string());

    let (width, height) = rgba.dimensions();
    let pixels: Vec<imagequant::RGBA> = rgba
        .pixels()
        .map(|p| imagequant::RGBA::new(p[0], p[1], p[2], p[3]))
        .collect();

    let mut attr = imagequant::new();
    attr.set_speed(QUANTIZE_SPEED).map_err(quantize_err)?;
    attr.set_quality(min, max).map_err(quantize_err)?;

    let mut image = attr
        .new_image(&pixels[..], width as usize, height as usize, 0.0)
        .map_err(quantize_err)?;
    let mut result = attr.quantize(&mut image).map_err(quantize_err)?;
    result.set_dithering_level(1.0).map_err(quantize_err)?;
    let (palette, indices) = result.remapped(&mut image).map_err(quantize_err)?;
    Ok((palette, indices))
}

/// Expand a quantized frame back into RGBA for GIF reassembly.
fn quantize_frame(frame: &RgbaImage, min: u8, max: u8) -> Result<RgbaImage, FlyImageError> {
    let (width, height) = frame.dimensions();
    let (palette, indices) = quantize_rgba(frame, min, max)?;

    let mut raw = Vec::with_capacity(indices.len() * 4);
    for &index in &indices {
        let entry = palette
            .get(index as usize)
            .copied()
            .unwrap_or(imagequant::RGBA::new(0, 0, 0, 0));
        raw.extend_from_slice(&[entry.r, entry.g, entry.b, entry.a]);
    }
    RgbaImage::from_raw(width, height, raw).ok_or_else(FlyImageError::corrupted_image)
}

/// Deterministic fallback for frames the quantizer rejects: snap every
/// color channel onto the 6x6x6 web-safe cube (nearest multiple of 51).
fn fallback_palette(frame: &RgbaImage) -> RgbaImage {
    let mut out = frame.clone();
    for pixel in out.pixels_mut() {
        for channel in 0..3 {
            pixel[channel] = ((pixel[channel] as u32 + 25) / 51 * 51).min(255) as u8;
        }
    }
    out
}
