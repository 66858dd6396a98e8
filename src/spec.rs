// src/spec.rs
//
// Pipeline specification parser.
// Turns the slash/comma-delimited transform string into an ordered,
// typed action list. Parsing is a single left-to-right pass and never
// fails: unknown names are skipped, unknown keys ignored, malformed
// numbers replaced by per-field defaults, and every value clamped into
// its declared range.

use crate::color::parse_hex_color;
use crate::ops::{Action, ResizeMode, TargetFormat};
use image::Rgba;

/// Pixel dimensions are capped at 4096 on every axis.
pub const MAX_PARAM_DIMENSION: i64 = 4096;

/// Ordered action list plus the format carried forward for masking
/// actions. Built once by [`parse`], immutable afterward.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PipelineSpec {
    pub actions: Vec<Action>,

    /// Format requested by the most recent `format` action, used as the
    /// default output format of `circle` / `rounded-corners` steps.
    pub last_format: Option<TargetFormat>,
}

impl PipelineSpec {
    /// Fast-path check: does this spec do any image work at all?
    ///
    /// The action list only ever holds image actions (the sum type is
    /// closed over them), so an empty list means the object passes
    /// through without sniffing or decoding.
    pub fn is_process_image(&self) -> bool {
        !self.actions.is_empty()
    }
}

/// Parse a pipeline spec of the shape `"image/<action>/<action>/..."`.
///
/// Any domain other than `image` yields an empty (no-op) spec.
pub fn parse(spec: &str) -> PipelineSpec {
    let mut parsed = PipelineSpec::default();
    let spec = spec.trim();
    if spec.is_empty() {
        return parsed;
    }

    let mut segments = spec.split('/');
    if segments.next() != Some("image") {
        return parsed;
    }

    for segment in segments {
        let segment = segment.trim();
        if segment.is_empty() {
            continue;
        }
        let fields: Vec<&str> = segment.split(',').collect();
        match fields[0].trim() {
            "resize" => parsed.actions.push(parse_resize(&fields)),
            "quality" => parsed.actions.push(parse_quality(&fields)),
            "crop" => parsed.actions.push(parse_crop(&fields)),
            "format" => {
                let action = parse_format(&fields);
                if let Action::Format { format } = &action {
                    parsed.last_format = *format;
                }
                parsed.actions.push(action);
            }
            "circle" => parsed.actions.push(Action::CircleCrop {
                radius: parse_radius(&fields),
            }),
            "rounded-corners" => parsed.actions.push(Action::RoundedCorners {
                radius: parse_radius(&fields),
            }),
            "bright" => parsed.actions.push(Action::Brightness {
                value: parse_signed_value(&fields, 0, -100, 100),
            }),
            "contrast" => parsed.actions.push(Action::Contrast {
                value: parse_signed_value(&fields, 0, -100, 100),
            }),
            "rotate" => parsed.actions.push(Action::Rotate {
                degrees: parse_signed_value(&fields, 0, 0, 360).map(|v| v as u32),
            }),
            "sharpen" => parsed.actions.push(Action::Sharpen {
                strength: parse_signed_value(&fields, 50, 50, 399),
            }),
            _ => {} // unrecognized action names are silently skipped
        }
    }

    parsed
}

fn parse_resize(fields: &[&str]) -> Action {
    let mut width = None;
    let mut height = None;
    let mut mode = ResizeMode::default();
    let mut pad_color = Rgba([0, 0, 0, 255]);

    for_each_param(fields, |key, value| match key {
        "w" => width = Some(conv_param(value, 4096, 1, MAX_PARAM_DIMENSION) as u32),
        "h" => height = Some(conv_param(value, 4096, 1, MAX_PARAM_DIMENSION) as u32),
        "m" => {
            if let Some(token) = value {
                mode = ResizeMode::from_token(token);
            }
        }
        "color" => {
            if let Some(hex) = value {
                pad_color = parse_hex_color(hex);
            }
        }
        _ => {}
    });

    Action::Resize {
        width,
        height,
        mode,
        pad_color,
    }
}

fn parse_quality(fields: &[&str]) -> Action {
    let mut quality_min = None;
    let mut quality_max = None;

    for_each_param(fields, |key, value| {
        if key != "q" {
            return;
        }
        let Some(value) = value else { return };
        let mut bounds = value.split('-');
        let mut min = conv_param(bounds.next(), 100, 1, 100);
        let mut max = min;
        if let Some(upper) = bounds.next() {
            max = conv_param(Some(upper), 100, 1, 100);
            if max < min {
                std::mem::swap(&mut min, &mut max);
            }
        } else if min > 40 {
            // Single-value quality widens into an asymmetric search band
            // so the optimizer has room below (or above, for low q) the
            // requested point.
            min -= 4;
        } else {
            max = min + 4;
        }
        quality_min = Some(min as u8);
        quality_max = Some(max as u8);
    });

    Action::Compress {
        quality_min,
        quality_max,
    }
}

fn parse_crop(fields: &[&str]) -> Action {
    let mut width = None;
    let mut height = None;
    let mut x = 0;
    let mut y = 0;

    for_each_param(fields, |key, value| match key {
        "w" => width = Some(conv_param(value, 4096, 1, MAX_PARAM_DIMENSION) as u32),
        "h" => height = Some(conv_param(value, 4096, 1, MAX_PARAM_DIMENSION) as u32),
        "x" => x = conv_param(value, 4096, 0, MAX_PARAM_DIMENSION) as u32,
        "y" => y = conv_param(value, 4096, 0, MAX_PARAM_DIMENSION) as u32,
        _ => {}
    });

    Action::Crop {
        width,
        height,
        x,
        y,
    }
}

fn parse_format(fields: &[&str]) -> Action {
    let format = fields.get(1).map(|token| TargetFormat::from_token(token));
    Action::Format { format }
}

fn parse_radius(fields: &[&str]) -> Option<u32> {
    let mut radius = None;
    for_each_param(fields, |key, value| {
        if key == "r" {
            radius = Some(conv_param(value, 0, 1, MAX_PARAM_DIMENSION) as u32);
        }
    });
    radius
}

/// Positional second-field form shared by bright/contrast/rotate/sharpen.
/// A resolved value of 0 leaves the parameter absent, which downstream
/// treats as a no-op.
fn parse_signed_value(fields: &[&str], default: i64, min: i64, max: i64) -> Option<i32> {
    let raw = *fields.get(1)?;
    let value = conv_param(Some(raw), default, min, max);
    (value != 0).then_some(value as i32)
}

/// Convert one numeric parameter: malformed input falls back to the
/// per-field default, and the result is clamped into [min, max].
fn conv_param(value: Option<&str>, default: i64, min: i64, max: i64) -> i64 {
    let parsed = value
        .and_then(|v| v.trim().parse::<i64>().ok())
        .unwrap_or(default);
    parsed.clamp(min, max)
}

/// Walk the `key_value` parameters of an action segment. Only the text
/// between the first and second underscore counts as the value, so
/// `w_10_5` reads as `("w", Some("10"))` and a bare `w` as `("w", None)`.
fn for_each_param<'a>(fields: &[&'a str], mut handler: impl FnMut(&'a str, Option<&'a str>)) {
    for field in &fields[1..] {
        let mut parts = field.trim().split('_');
        let Some(key) = parts.next() else { continue };
        handler(key, parts.next());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_and_unknown_domain() {
        assert!(!parse("").is_process_image());
        assert!(!parse("   ").is_process_image());
        assert!(!parse("unknown/foo").is_process_image());
        assert!(!parse("video/resize,w_100").is_process_image());
        // Domain matching is exact, not prefixed
        assert!(!parse("images/resize,w_100").is_process_image());
    }

    #[test]
    fn test_unrecognized_actions_are_skipped() {
        let spec = parse("image/blur,5/resize,w_100/frobnicate");
        assert_eq!(spec.actions.len(), 1);
        assert!(matches!(spec.actions[0], Action::Resize { .. }));
    }

    #[test]
    fn test_resize_params() {
        let spec = parse("image/resize,w_200,h_100,m_fill,color_#FF0000");
        assert_eq!(
            spec.actions[0],
            Action::Resize {
                width: Some(200),
                height: Some(100),
                mode: ResizeMode::Fill,
                pad_color: Rgba([255, 0, 0, 255]),
            }
        );
    }

    #[test]
    fn test_resize_clamps_and_defaults() {
        // Oversized width clamps to 4096; malformed height falls back to
        // the field default (4096) before clamping.
        let spec = parse("image/resize,w_99999,h_abc");
        assert_eq!(
            spec.actions[0],
            Action::Resize {
                width: Some(4096),
                height: Some(4096),
                mode: ResizeMode::LargestFit,
                pad_color: Rgba([0, 0, 0, 255]),
            }
        );
    }

    #[test]
    fn test_resize_unknown_keys_ignored() {
        let spec = parse("image/resize,w_64,zoom_3,m");
        assert_eq!(
            spec.actions[0],
            Action::Resize {
                width: Some(64),
                height: None,
                mode: ResizeMode::LargestFit,
                pad_color: Rgba([0, 0, 0, 255]),
            }
        );
    }

    #[test]
    fn test_quality_band_above_forty() {
        let spec = parse("image/quality,q_50");
        assert_eq!(
            spec.actions[0],
            Action::Compress {
                quality_min: Some(46),
                quality_max: Some(50),
            }
        );
    }

    #[test]
    fn test_quality_band_at_or_below_forty() {
        let spec = parse("image/quality,q_30");
        assert_eq!(
            spec.actions[0],
            Action::Compress {
                quality_min: Some(30),
                quality_max: Some(34),
            }
        );
    }

    #[test]
    fn test_quality_explicit_band_swaps_into_order() {
        let spec = parse("image/quality,q_80-20");
        assert_eq!(
            spec.actions[0],
            Action::Compress {
                quality_min: Some(20),
                quality_max: Some(80),
            }
        );
    }

    #[test]
    fn test_quality_without_value_defaults_downstream() {
        let spec = parse("image/quality");
        assert_eq!(
            spec.actions[0],
            Action::Compress {
                quality_min: None,
                quality_max: None,
            }
        );
    }

    #[test]
    fn test_crop_offsets_clamp_to_zero_floor() {
        let spec = parse("image/crop,w_50,h_50,x_-3,y_20");
        assert_eq!(
            spec.actions[0],
            Action::Crop {
                width: Some(50),
                height: Some(50),
                x: 0,
                y: 20,
            }
        );
    }

    #[test]
    fn test_format_tracks_last_format() {
        let spec = parse("image/format,png/circle,r_10");
        assert_eq!(spec.last_format, Some(TargetFormat::Png));
        assert_eq!(spec.actions.len(), 2);

        // A later format action overwrites the carried format
        let spec = parse("image/format,png/format,webp/rounded-corners,r_4");
        assert_eq!(spec.last_format, Some(TargetFormat::WebP));
    }

    #[test]
    fn test_bare_format_clears_last_format() {
        let spec = parse("image/format,png/format");
        assert_eq!(spec.last_format, None);
        assert_eq!(spec.actions[1], Action::Format { format: None });
    }

    #[test]
    fn test_signed_values() {
        let spec = parse("image/bright,150/contrast,-40/rotate,90/sharpen,100");
        assert_eq!(spec.actions[0], Action::Brightness { value: Some(100) });
        assert_eq!(spec.actions[1], Action::Contrast { value: Some(-40) });
        assert_eq!(spec.actions[2], Action::Rotate { degrees: Some(90) });
        assert_eq!(spec.actions[3], Action::Sharpen { strength: Some(100) });
    }

    #[test]
    fn test_zero_signed_value_is_absent() {
        let spec = parse("image/bright,0/rotate,0");
        assert_eq!(spec.actions[0], Action::Brightness { value: None });
        assert_eq!(spec.actions[1], Action::Rotate { degrees: None });
    }

    #[test]
    fn test_sharpen_malformed_falls_back_to_default() {
        let spec = parse("image/sharpen,soft");
        assert_eq!(spec.actions[0], Action::Sharpen { strength: Some(50) });
    }

    #[test]
    fn test_radius_floor_is_one() {
        let spec = parse("image/circle,r_0");
        assert_eq!(spec.actions[0], Action::CircleCrop { radius: Some(1) });
        let spec = parse("image/circle");
        assert_eq!(spec.actions[0], Action::CircleCrop { radius: None });
    }

    #[test]
    fn test_value_keeps_first_underscore_field_only() {
        let spec = parse("image/crop,w_10_5,h_20");
        assert_eq!(
            spec.actions[0],
            Action::Crop {
                width: Some(10),
                height: Some(20),
                x: 0,
                y: 0,
            }
        );
    }

    #[test]
    fn test_execution_order_is_insertion_order() {
        let spec = parse("image/rotate,90/crop,w_10,h_10/bright,5");
        let names: Vec<_> = spec.actions.iter().map(Action::name).collect();
        assert_eq!(names, ["rotate", "crop", "bright"]);
    }
}
