// tests/integration_tests.rs
//
// End-to-end tests through the public process_object entry point:
// real encoded buffers in, real encoded buffers out.

use fly_image::{process_object, FlyImageError};
use image::{DynamicImage, GenericImageView, ImageFormat, Rgb, RgbImage};
use std::io::Cursor;

fn encode(img: RgbImage, format: ImageFormat) -> Vec<u8> {
    let mut buf = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut buf), format)
        .unwrap();
    buf
}

fn gradient(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    })
}

#[test]
fn test_unknown_domain_returns_input_unchanged() {
    let src = encode(gradient(50, 50), ImageFormat::Png);
    let out = process_object(src.clone(), "unknown/foo");
    assert_eq!(out.bytes, src);
    assert_eq!(out.bytes.len(), src.len());
    assert_eq!(out.content_type, None);
}

#[test]
fn test_brighten_then_convert_jpeg_to_png() {
    // Solid mid-gray survives the JPEG round-trip nearly exactly, so
    // the +20 shift is measurable against the decoded original
    let src = encode(
        RgbImage::from_pixel(32, 32, Rgb([128, 128, 128])),
        ImageFormat::Jpeg,
    );
    let original = image::load_from_memory(&src).unwrap().to_rgba8();

    let out = process_object(src, "image/bright,20/format,png");
    assert_eq!(out.content_type.as_deref(), Some("image/png"));
    assert_eq!(image::guess_format(&out.bytes).unwrap(), ImageFormat::Png);

    let result = image::load_from_memory(&out.bytes).unwrap().to_rgba8();
    assert_eq!(result.dimensions(), original.dimensions());
    for (result_pixel, original_pixel) in result.pixels().zip(original.pixels()) {
        for channel in 0..3 {
            let expected = (original_pixel[channel] as i32 + 20).min(255);
            let delta = (result_pixel[channel] as i32 - expected).abs();
            assert!(delta <= 2, "channel off by {delta}");
        }
    }
    assert!(out.diagnostics.is_empty());
}

#[test]
fn test_oversized_crop_returns_input_unchanged() {
    let src = encode(gradient(100, 100), ImageFormat::Png);
    let out = process_object(src.clone(), "image/crop,w_9999,h_9999,x_0,y_0");
    assert_eq!(out.bytes, src);
    assert_eq!(out.content_length, Some(src.len() as u64));
    assert_eq!(out.diagnostics.len(), 1);
    assert!(matches!(
        out.diagnostics[0].error,
        FlyImageError::InvalidCropBounds { .. }
    ));
}

#[test]
fn test_resize_exact_fit_dimensions() {
    let src = encode(gradient(80, 40), ImageFormat::Png);
    let out = process_object(src, "image/resize,w_20,h_30,m_fixed");
    let img = image::load_from_memory(&out.bytes).unwrap();
    assert_eq!(img.dimensions(), (20, 30));
}

#[test]
fn test_resize_largest_fit_respects_box() {
    let src = encode(gradient(80, 40), ImageFormat::Png);
    let out = process_object(src, "image/resize,w_30,h_30");
    let (w, h) = image::load_from_memory(&out.bytes).unwrap().dimensions();
    assert!(w <= 30 && h <= 30);
    assert!(w == 30 || h == 30);
}

#[test]
fn test_rotate_180_twice_is_roughly_identity() {
    let src = encode(gradient(21, 13), ImageFormat::Png);
    let once = process_object(src, "image/rotate,180");
    let twice = process_object(once.bytes, "image/rotate,180");
    let img = image::load_from_memory(&twice.bytes).unwrap();
    let (w, h) = img.dimensions();
    // Truncating corner math may shave a pixel per pass
    assert!((w as i64 - 21).abs() <= 2);
    assert!((h as i64 - 13).abs() <= 2);
}

#[test]
fn test_circle_crop_square_output() {
    let src = encode(gradient(60, 40), ImageFormat::Png);
    let out = process_object(src, "image/circle,r_15");
    assert_eq!(out.content_type.as_deref(), Some("image/jpeg"));
    let img = image::load_from_memory(&out.bytes).unwrap();
    assert_eq!(img.dimensions(), (30, 30));
    // JPEG output composites the cut corners over white (allowing
    // ringing near the circle edge)
    let rgba = img.to_rgba8();
    let corner = rgba.get_pixel(0, 0);
    assert!(corner[0] > 200 && corner[1] > 200 && corner[2] > 200);
}

#[test]
fn test_circle_crop_png_keeps_transparency() {
    let src = encode(gradient(60, 60), ImageFormat::Png);
    let out = process_object(src, "image/format,png/circle,r_20");
    assert_eq!(out.content_type.as_deref(), Some("image/png"));
    let rgba = image::load_from_memory(&out.bytes).unwrap().to_rgba8();
    assert_eq!(rgba.dimensions(), (40, 40));
    assert_eq!(rgba.get_pixel(0, 0)[3], 0);
    assert_eq!(rgba.get_pixel(20, 20)[3], 255);
}

#[test]
fn test_quality_band_quantizes_png_to_indexed() {
    let src = encode(gradient(128, 128), ImageFormat::Png);
    let out = process_object(src, "image/quality,q_50");
    assert!(out.diagnostics.is_empty());
    let img = image::load_from_memory(&out.bytes).unwrap();
    assert_eq!(img.dimensions(), (128, 128));
    // IHDR color type byte: 3 = indexed-color
    assert_eq!(out.bytes[25], 3);
}

#[test]
fn test_chained_pipeline() {
    let src = encode(gradient(120, 90), ImageFormat::Jpeg);
    let out = process_object(
        src,
        "image/resize,w_60,h_60,m_fill/bright,10/format,webp",
    );
    assert_eq!(out.content_type.as_deref(), Some("image/webp"));
    assert_eq!(image::guess_format(&out.bytes).unwrap(), ImageFormat::WebP);
    let img = image::load_from_memory(&out.bytes).unwrap();
    assert_eq!(img.dimensions(), (60, 60));
}

#[test]
fn test_pad_resize_through_pipeline() {
    let src = encode(gradient(40, 20), ImageFormat::Png);
    let out = process_object(src, "image/resize,w_40,h_40,m_pad,color_#FF0000");
    let rgba = image::load_from_memory(&out.bytes).unwrap().to_rgba8();
    assert_eq!(rgba.dimensions(), (40, 40));
    // Top band is padding
    assert_eq!(rgba.get_pixel(0, 0).0, [255, 0, 0, 255]);
    // Vertical center holds scaled source
    assert_ne!(rgba.get_pixel(20, 20).0, [255, 0, 0, 255]);
}

#[test]
fn test_unsupported_object_is_untouched() {
    let src = b"%PDF-1.4 not an image at all".to_vec();
    let out = process_object(src.clone(), "image/resize,w_100");
    assert_eq!(out.bytes, src);
    assert_eq!(out.content_type, None);
}

#[test]
fn test_spec_with_only_unknown_actions_is_fast_path() {
    let src = encode(gradient(10, 10), ImageFormat::Png);
    let out = process_object(src.clone(), "image/emboss,5/vignette");
    assert_eq!(out.bytes, src);
    // Fast path: nothing parsed, so not even a length is reported
    assert_eq!(out.content_length, None);
}
