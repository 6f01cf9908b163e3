/// Errors for a frame of the right length with malformed content.
///
/// These fail the whole decode call; nothing is merged into any cache.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// A numeric slot contains non-numeric text.
    #[error("field {field} is not numeric: {text:?}")]
    BadNumber { field: &'static str, text: String },

    /// The status slot is not a hexadecimal bitmask.
    #[error("field {field} is not a hex bitmask: {text:?}")]
    BadBitmask { field: &'static str, text: String },
}

pub type Result<T> = std::result::Result<T, DecodeError>;
