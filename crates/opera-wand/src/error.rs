use thiserror::Error;

/// Errors produced while decrypting or parsing a wand credential store.
///
/// None of these are recoverable: the store has no resynchronization
/// points, so the first structural failure aborts the whole parse.
#[derive(Debug, Error)]
pub enum WandError {
    /// The file's version marker is outside the known 2..=6 range.
    #[error("unsupported wand file version {version}")]
    UnsupportedVersion { version: u32 },

    /// An encrypted blob violates the salted-blob layout (embedded salt
    /// length, ciphertext alignment, or final-block padding).
    #[error("malformed encrypted blob: {reason}")]
    MalformedBlob { reason: &'static str },

    /// A length prefix was negative.
    #[error("negative field length {length}")]
    MalformedLength { length: i32 },

    /// A profile flags byte held something other than 0 or 1.
    #[error("profile flags byte {value:#04x} at offset {offset} is neither 0 nor 1")]
    InvalidProfileFlags { value: u8, offset: u64 },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
