// src/engine/encoder.rs
//
// Encoder operations: JPEG (mozjpeg), PNG, GIF, BMP, WebP, plus the
// indexed-PNG writeback used by the quantization engine.

use crate::engine::common::run_with_panic_policy;
use crate::engine::MAX_DIMENSION;
use crate::error::FlyImageError;
use crate::ops::TargetFormat;
use image::{DynamicImage, ImageFormat};
use mozjpeg::{ColorSpace, Compress, ScanMode};
use std::borrow::Cow;
use std::io::Cursor;

type EncoderResult<T> = std::result::Result<T, FlyImageError>;

/// Quality used when a step re-encodes JPEG without an explicit band,
/// matching the stock libjpeg default.
pub const DEFAULT_JPEG_QUALITY: u8 = 75;

/// Encode a buffer into the given wire format. `quality` only affects
/// JPEG; every other format here is lossless (WebP deliberately so).
pub fn encode(
    img: &DynamicImage,
    format: TargetFormat,
    quality: Option<u8>,
) -> EncoderResult<Vec<u8>> {
    match format {
        TargetFormat::Jpeg => encode_jpeg(img, quality.unwrap_or(DEFAULT_JPEG_QUALITY)),
        TargetFormat::Png => encode_with_image_crate(img, ImageFormat::Png, "png"),
        TargetFormat::Gif => encode_with_image_crate(img, ImageFormat::Gif, "gif"),
        TargetFormat::Bmp => encode_with_image_crate(img, ImageFormat::Bmp, "bmp"),
        TargetFormat::WebP => encode_webp_lossless(img),
    }
}

/// Encode to JPEG using mozjpeg with web-optimized settings
/// (progressive scan, optimized coding).
pub fn encode_jpeg(img: &DynamicImage, quality: u8) -> EncoderResult<Vec<u8>> {
    run_with_panic_policy("encode:jpeg", || {
        let quality = quality.min(100);

        // Zero-copy when already RGB8
        let rgb: Cow<'_, image::RgbImage> = match img {
            DynamicImage::ImageRgb8(rgb_img) => Cow::Borrowed(rgb_img),
            _ => Cow::Owned(img.to_rgb8()),
        };
        let (w, h) = rgb.dimensions();
        let pixels: &[u8] = rgb.as_raw();

        if w == 0 || h == 0 {
            return Err(FlyImageError::encode_failed(
                "jpeg",
                "invalid image dimensions: width or height is zero",
            ));
        }
        if w > MAX_DIMENSION || h > MAX_DIMENSION {
            return Err(FlyImageError::dimension_exceeds_limit(
                w.max(h),
                MAX_DIMENSION,
            ));
        }

        let expected_len = (w as usize) * (h as usize) * 3;
        if pixels.len() != expected_len {
            return Err(FlyImageError::corrupted_image());
        }

        let mut comp = Compress::new(ColorSpace::JCS_RGB);
        comp.set_size(w as usize, h as usize);
        comp.set_color_space(ColorSpace::JCS_YCbCr);
        comp.set_quality(quality as f32);
        comp.set_chroma_sampling_pixel_sizes((2, 2), (2, 2));
        comp.set_progressive_mode();
        comp.set_optimize_coding(true);
        comp.set_optimize_scans(true);
        comp.set_scan_optimization_mode(ScanMode::AllComponentsTogether);

        let estimated_size = (w as usize * h as usize * 3 / 10).max(4096);
        let mut output = Vec::with_capacity(estimated_size);

        let mut writer = comp.start_compress(&mut output).map_err(|e| {
            FlyImageError::encode_failed("jpeg", format!("mozjpeg: failed to start compress: {e:?}"))
        })?;

        let stride = w as usize * 3;
        for row in pixels.chunks(stride) {
            writer.write_scanlines(row).map_err(|e| {
                FlyImageError::encode_failed(
                    "jpeg",
                    format!("mozjpeg: failed to write scanlines: {e:?}"),
                )
            })?;
        }

        writer.finish().map_err(|e| {
            FlyImageError::encode_failed("jpeg", format!("mozjpeg: failed to finish: {e:?}"))
        })?;

        Ok(output)
    })
}

/// Encode to lossless WebP using libwebp.
pub fn encode_webp_lossless(img: &DynamicImage) -> EncoderResult<Vec<u8>> {
    run_with_panic_policy("encode:webp", || {
        // libwebp only accepts RGB8/RGBA8 input
        let normalized: Cow<'_, DynamicImage> = match img {
            DynamicImage::ImageRgb8(_) | DynamicImage::ImageRgba8(_) => Cow::Borrowed(img),
            _ => Cow::Owned(DynamicImage::ImageRgba8(img.to_rgba8())),
        };
        let encoder = webp::Encoder::from_image(normalized.as_ref())
            .map_err(|e| FlyImageError::encode_failed("webp", format!("webp: {e}")))?;
        Ok(encoder.encode_lossless().to_vec())
    })
}

fn encode_with_image_crate(
    img: &DynamicImage,
    format: ImageFormat,
    name: &'static str,
) -> EncoderResult<Vec<u8>> {
    run_with_panic_policy("encode:image", || {
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), format)
            .map_err(|e| FlyImageError::encode_failed(name, format!("encode failed: {e}")))?;
        Ok(buf)
    })
}

/// Write a quantized image as an indexed PNG: PLTE from the palette,
/// tRNS only when any entry is non-opaque.
pub fn encode_indexed_png(
    palette: &[imagequant::RGBA],
    indices: &[u8],
    width: u32,
    height: u32,
) -> EncoderResult<Vec<u8>> {
    run_with_panic_policy("encode:indexed-png", || {
        if indices.len() != (width as usize) * (height as usize) {
            return Err(FlyImageError::corrupted_image());
        }

        let mut plte = Vec::with_capacity(palette.len() * 3);
        let mut trns = Vec::with_capacity(palette.len());
        for entry in palette {
            plte.extend_from_slice(&[entry.r, entry.g, entry.b]);
            trns.push(entry.a);
        }

        let mut buf = Vec::new();
        {
            let mut encoder = png::Encoder::new(&mut buf, width, height);
            encoder.set_color(png::ColorType::Indexed);
            encoder.set_depth(png::BitDepth::Eight);
            encoder.set_palette(plte);
            if trns.iter().any(|&a| a != 255) {
                encoder.set_trns(trns);
            }
            let mut writer = encoder.write_header().map_err(|e| {
                FlyImageError::encode_failed("png", format!("indexed header failed: {e}"))
            })?;
            writer.write_image_data(indices).map_err(|e| {
                FlyImageError::encode_failed("png", format!("indexed data failed: {e}"))
            })?;
            writer.finish().map_err(|e| {
                FlyImageError::encode_failed("png", format!("indexed finish failed: {e}"))
            })?;
        }
        Ok(buf)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, Rgb, RgbImage};

    fn test_image(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, 128])
        }))
    }

    #[test]
    fn test_encode_roundtrips_each_format() {
        let img = test_image(8, 6);
        for format in [
            TargetFormat::Jpeg,
            TargetFormat::Png,
            TargetFormat::Gif,
            TargetFormat::Bmp,
            TargetFormat::WebP,
        ] {
            let bytes = encode(&img, format, None).unwrap();
            let decoded = image::load_from_memory(&bytes).unwrap();
            assert_eq!(decoded.dimensions(), (8, 6), "{format:?}");
        }
    }

    #[test]
    fn test_jpeg_quality_orders_sizes() {
        let img = test_image(64, 64);
        let low = encode_jpeg(&img, 20).unwrap();
        let high = encode_jpeg(&img, 95).unwrap();
        assert!(low.len() < high.len());
    }

    #[test]
    fn test_indexed_png_roundtrip() {
        let palette = vec![
            imagequant::RGBA::new(255, 0, 0, 255),
            imagequant::RGBA::new(0, 255, 0, 255),
        ];
        let indices = vec![0, 1, 1, 0];
        let bytes = encode_indexed_png(&palette, &indices, 2, 2).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap().to_rgba8();
        assert_eq!(decoded.get_pixel(0, 0).0, [255, 0, 0, 255]);
        assert_eq!(decoded.get_pixel(1, 0).0, [0, 255, 0, 255]);
    }

    #[test]
    fn test_indexed_png_rejects_bad_lengths() {
        let palette = vec![imagequant::RGBA::new(0, 0, 0, 255)];
        let err = encode_indexed_png(&palette, &[0u8; 3], 2, 2).unwrap_err();
        assert_eq!(err, FlyImageError::corrupted_image());
    }
}
