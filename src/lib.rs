// lib.rs
//
// fly-image: an on-the-fly image transform engine for process-on-fetch
// object storage.
//
// Design goals:
// - Pure function from (bytes, pipeline spec) to (bytes, content type)
// - Fail-soft: the worst case output is the unchanged input
// - No state survives a call; nothing is shared across requests

pub mod color;
pub mod engine;
pub mod error;
pub mod ops;
pub mod sniff;
pub mod spec;

pub use error::{Diagnostic, ErrorCategory, FlyImageError};
pub use ops::{Action, ResizeMode, TargetFormat};
pub use sniff::{sniff_object_type, ObjectTypeInfo};
pub use spec::{parse, PipelineSpec};

/// Result of [`process_object`].
///
/// `content_length` and `content_type` are `None` whenever the input
/// passed through untouched on the fast path; `content_type` stays
/// `None` until a format-changing action runs.
#[derive(Debug)]
pub struct ProcessOutput {
    pub bytes: Vec<u8>,
    pub content_length: Option<u64>,
    pub content_type: Option<String>,
    /// Why individual steps became no-ops, if any did. Callers that
    /// ignore this see exactly the never-fails byte contract.
    pub diagnostics: Vec<Diagnostic>,
}

impl ProcessOutput {
    fn passthrough(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            content_length: None,
            content_type: None,
            diagnostics: Vec::new(),
        }
    }
}

/// Process one object through a pipeline spec.
///
/// - Empty spec string or empty buffer: input returned unchanged.
/// - Spec parses to zero image actions: input returned unchanged, with
///   no sniffing or decoding performed.
/// - Otherwise the content type is sniffed from the first bytes, and
///   the pipeline runs only when the object is an image.
pub fn process_object(buffer: Vec<u8>, pipeline_spec: &str) -> ProcessOutput {
    if pipeline_spec.trim().is_empty() || buffer.is_empty() {
        return ProcessOutput::passthrough(buffer);
    }

    let spec = spec::parse(pipeline_spec);
    if !spec.is_process_image() {
        return ProcessOutput::passthrough(buffer);
    }

    let type_info = sniff::sniff_object_type(&buffer);
    let (bytes, content_type, diagnostics) = if type_info.is_image {
        let result = engine::executor::run(&spec, &type_info, buffer);
        (result.bytes, result.content_type, result.diagnostics)
    } else {
        (buffer, None, Vec::new())
    };

    ProcessOutput {
        content_length: Some(bytes.len() as u64),
        content_type,
        diagnostics,
        bytes,
    }
}
