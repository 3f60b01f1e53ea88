//! Centralized error handling for the playlist aggregator
//!
//! The parsing, merge and generation stages recover from malformed input
//! locally and never fail. Errors only surface at the edges of the crate:
//! loading configuration, decoding pre-structured JSON directories and
//! reading input files.
//!
//! # Usage
//!
//! ```rust
//! use m3u_merge::errors::{AggregatorError, AggregatorResult};
//!
//! fn example_function() -> AggregatorResult<String> {
//!     Ok("success".to_string())
//! }
//! ```

pub mod types;

pub use types::*;

/// Convenience type alias for Results using AggregatorError
pub type AggregatorResult<T> = Result<T, AggregatorError>;
