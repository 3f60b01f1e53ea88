//! Metadata enrichment applied while sources are assembled
//!
//! Everything here is a pure function of the text it is handed: bitrate
//! and quality inference, DRM license normalization and request-header
//! extraction. None of it fails; unrecognized input degrades to "absent"
//! or to an opaque raw value.

pub mod drm;
pub mod headers;
pub mod quality;

pub use drm::{build_drm, normalize_clearkey_pair, parse_clearkey, ClearKeyMaterial};
pub use headers::{merge_headers, split_pipe_headers, HeaderKey};
pub use quality::{estimate_quality, QualityEstimate};
