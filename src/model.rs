pub use id::*;
pub use video::*;

mod id;
mod video;

const MAX_ID_LENGTH: usize = 128;

/// Whether `text` can be used as a video or viewer identifier.
pub(crate) fn is_valid_id(text: &str) -> bool {
    !text.is_empty()
        && text.len() <= MAX_ID_LENGTH
        && text
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}
