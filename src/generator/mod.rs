//! Extended-M3U output
//!
//! [`M3uGenerator`] produces the playlist as a lazy sequence of text
//! chunks. [`M3uGenerator::render_to_string`] concatenates them eagerly;
//! [`stream::byte_stream`] forwards them one at a time. Both consume the
//! same sequence, so their output is byte-identical.

pub mod m3u;
pub mod stream;

pub use m3u::{GeneratorOptions, M3uGenerator, PlaylistChunks};
pub use stream::{byte_stream, write_stream};
