//! Utility modules shared by the parsing, merge and generation stages

pub mod logo;
pub mod text;
pub mod url;

pub use logo::LogoResolver;
pub use text::{fold_key, is_decorative_line, is_noise_text, slugify_id};
pub use url::UrlUtils;
