pub mod text;

pub use text::{clip_to_bytes, truncate_with_ellipsis};
