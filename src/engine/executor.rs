// src/engine/executor.rs
//
// Walks the action list in order, dispatching each action to its engine
// and threading the evolving simple-type / content-type state between
// steps. Every step error is converted into a passthrough plus a
// diagnostic - the executor itself never fails.

use crate::engine::common::require_support;
use crate::engine::decoder::decode_image;
use crate::engine::encoder::encode;
use crate::engine::{adjust, compress, geometry, mask};
use crate::error::{Diagnostic, FlyImageError};
use crate::ops::{Action, TargetFormat};
use crate::sniff::ObjectTypeInfo;
use crate::spec::PipelineSpec;
use tracing::warn;

/// Result of running a pipeline over one object.
#[derive(Debug)]
pub struct ExecutionResult {
    pub bytes: Vec<u8>,
    /// `Some("image/<fmt>")` once a format-changing action has run.
    pub content_type: Option<String>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Execute the pipeline strictly in list order. Each action receives the
/// buffer produced by the previous action plus the current simple type,
/// so a format change mid-chain governs which actions remain supported
/// for subsequent steps.
pub fn run(spec: &PipelineSpec, type_info: &ObjectTypeInfo, buffer: Vec<u8>) -> ExecutionResult {
    let mut bytes = buffer;
    let mut simple_type = type_info.simple_type.clone();
    let mut content_type = None;
    let mut diagnostics = Vec::new();

    for action in &spec.actions {
        let outcome: Result<Option<(Vec<u8>, Option<TargetFormat>)>, FlyImageError> = match action {
            Action::Crop {
                width,
                height,
                x,
                y,
            } => geometry::crop(&bytes, &simple_type, *width, *height, *x, *y)
                .map(|step| step.map(|bytes| (bytes, None))),

            Action::Resize {
                width,
                height,
                mode,
                pad_color,
            } => geometry::resize(&bytes, &simple_type, *width, *height, *mode, *pad_color)
                .map(|step| step.map(|bytes| (bytes, None))),

            Action::Rotate { degrees } => geometry::rotate(&bytes, &simple_type, *degrees)
                .map(|step| step.map(|bytes| (bytes, None))),

            Action::Brightness { value } => adjust::brightness(&bytes, &simple_type, *value)
                .map(|step| step.map(|bytes| (bytes, None))),

            Action::Contrast { value } => adjust::contrast(&bytes, &simple_type, *value)
                .map(|step| step.map(|bytes| (bytes, None))),

            Action::Sharpen { strength } => adjust::sharpen(&bytes, &simple_type, *strength)
                .map(|step| step.map(|bytes| (bytes, None))),

            Action::Compress {
                quality_min,
                quality_max,
            } => compress::compress(&bytes, &simple_type, *quality_min, *quality_max)
                .map(|step| step.map(|bytes| (bytes, None))),

            Action::Format { format } => format_action(&bytes, &simple_type, *format),

            Action::CircleCrop { radius } => {
                mask::circle_crop(&bytes, &simple_type, *radius, spec.last_format)
                    .map(|step| step.map(|(bytes, format)| (bytes, Some(format))))
            }

            Action::RoundedCorners { radius } => {
                mask::rounded_corners(&bytes, &simple_type, *radius, spec.last_format)
                    .map(|step| step.map(|(bytes, format)| (bytes, Some(format))))
            }
        };

        match outcome {
            Ok(Some((new_bytes, retype))) => {
                bytes = new_bytes;
                if let Some(format) = retype {
                    simple_type = format.simple_type().to_string();
                    content_type = Some(format!("image/{}", format.simple_type()));
                }
            }
            Ok(None) => {}
            Err(error) => {
                warn!(
                    action = action.name(),
                    category = ?error.category(),
                    %error,
                    "action failed, passing buffer through unchanged"
                );
                diagnostics.push(Diagnostic {
                    action: action.name(),
                    error,
                });
            }
        }
    }

    ExecutionResult {
        bytes,
        content_type,
        diagnostics,
    }
}

/// Re-encode into the requested wire format. A `format` action with no
/// format token is a no-op.
fn format_action(
    buffer: &[u8],
    simple_type: &str,
    format: Option<TargetFormat>,
) -> Result<Option<(Vec<u8>, Option<TargetFormat>)>, FlyImageError> {
    let Some(format) = format else { return Ok(None) };
    require_support(simple_type)?;
    let (img, _) = decode_image(buffer)?;
    let bytes = encode(&img, format, None)?;
    Ok(Some((bytes, Some(format))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sniff::sniff_object_type;
    use crate::spec;
    use image::{DynamicImage, GenericImageView, ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, 77])
        });
        let mut buf = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf
    }

    fn execute(spec_str: &str, buffer: Vec<u8>) -> ExecutionResult {
        let parsed = spec::parse(spec_str);
        let info = sniff_object_type(&buffer);
        run(&parsed, &info, buffer)
    }

    #[test]
    fn test_actions_execute_in_order() {
        // Crop to 20x10, then rotate 90: final dims prove the order
        let result = execute("image/crop,w_20,h_10/rotate,90", png_bytes(64, 64));
        let img = image::load_from_memory(&result.bytes).unwrap();
        let (w, h) = img.dimensions();
        assert!((w as i64 - 10).abs() <= 1);
        assert!((h as i64 - 20).abs() <= 1);
        assert!(result.diagnostics.is_empty());
    }

    #[test]
    fn test_format_action_rewrites_content_type() {
        let result = execute("image/format,bmp", png_bytes(8, 8));
        assert_eq!(result.content_type.as_deref(), Some("image/bmp"));
        assert_eq!(
            image::guess_format(&result.bytes).unwrap(),
            ImageFormat::Bmp
        );
    }

    #[test]
    fn test_type_state_threads_between_steps() {
        // After format,bmp the working type is bmp, so a later quality
        // action (png/jpeg/gif only) must fail soft and leave the BMP
        // bytes untouched
        let result = execute("image/format,bmp/quality,q_50", png_bytes(8, 8));
        assert_eq!(
            image::guess_format(&result.bytes).unwrap(),
            ImageFormat::Bmp
        );
        assert_eq!(result.diagnostics.len(), 1);
        assert_eq!(result.diagnostics[0].action, "quality");
    }

    #[test]
    fn test_failed_step_passes_buffer_through() {
        let src = png_bytes(100, 100);
        let result = execute("image/crop,w_9999,h_9999,x_0,y_0", src.clone());
        assert_eq!(result.bytes, src);
        assert_eq!(result.diagnostics.len(), 1);
        assert!(matches!(
            result.diagnostics[0].error,
            FlyImageError::InvalidCropBounds { .. }
        ));
    }

    #[test]
    fn test_noop_actions_produce_no_diagnostics() {
        let src = png_bytes(16, 16);
        let result = execute("image/bright,0/rotate,360/crop", src.clone());
        assert_eq!(result.bytes, src);
        assert!(result.diagnostics.is_empty());
        assert_eq!(result.content_type, None);
    }

    #[test]
    fn test_circle_crop_defaults_to_jpeg_content_type() {
        let result = execute("image/circle,r_8", png_bytes(32, 32));
        assert_eq!(result.content_type.as_deref(), Some("image/jpeg"));
        assert_eq!(
            image::guess_format(&result.bytes).unwrap(),
            ImageFormat::Jpeg
        );
    }

    #[test]
    fn test_circle_crop_honors_earlier_format_request() {
        let result = execute("image/format,png/circle,r_8", png_bytes(32, 32));
        assert_eq!(result.content_type.as_deref(), Some("image/png"));
        assert_eq!(
            image::guess_format(&result.bytes).unwrap(),
            ImageFormat::Png
        );
    }
}
