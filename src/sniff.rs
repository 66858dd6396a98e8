// src/sniff.rs
//
// Content-type sniffing from the leading bytes of an object.
// The pipeline only needs to know "is this a raster image, and which
// one"; everything unrecognized reports as an opaque octet stream.

use image::ImageFormat;

/// How many leading bytes the sniffer inspects.
const SNIFF_WINDOW: usize = 512;

const OCTET_STREAM: &str = "application/octet-stream";

/// Content-type information derived once from the first bytes of an
/// object; read-only afterward.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectTypeInfo {
    /// Full content type, e.g. `image/png`
    pub content_type: String,
    /// Type group, e.g. `image`
    pub type_group: String,
    /// Simple subtype, e.g. `png`
    pub simple_type: String,
    pub is_image: bool,
}

/// Sniff the object type from up to the first 512 bytes.
pub fn sniff_object_type(buffer: &[u8]) -> ObjectTypeInfo {
    let window = &buffer[..buffer.len().min(SNIFF_WINDOW)];
    let content_type = match image::guess_format(window) {
        Ok(ImageFormat::Png) => "image/png",
        Ok(ImageFormat::Jpeg) => "image/jpeg",
        Ok(ImageFormat::Gif) => "image/gif",
        Ok(ImageFormat::Bmp) => "image/bmp",
        Ok(ImageFormat::WebP) => "image/webp",
        Ok(ImageFormat::Tiff) => "image/tiff",
        Ok(ImageFormat::Ico) => "image/x-icon",
        Ok(ImageFormat::Avif) => "image/avif",
        _ => OCTET_STREAM,
    };

    let (type_group, simple_type) = content_type.split_once('/').unwrap_or((content_type, ""));
    ObjectTypeInfo {
        content_type: content_type.to_string(),
        type_group: type_group.to_string(),
        simple_type: simple_type.to_string(),
        is_image: type_group == "image",
    }
}
