//! Main Crate Error

#[derive(thiserror::Error, Debug)]
/// Refdht crate error enum.
pub enum Error {
    /// Id is not 20 bytes long.
    #[error("Invalid Id size, expected 20, got {0}")]
    InvalidIdSize(usize),

    /// Id string is not valid hex.
    #[error("Invalid Id encoding: {0}")]
    InvalidIdEncoding(String),

    /// The callsign carries neither the mrefd nor the urfd prefix.
    #[error("Don't know how to get '{0}'")]
    UnknownFamily(String),

    /// Modules are single letters `A` to `Z`.
    #[error("Invalid module {0:?}, expected a single letter")]
    InvalidModule(String),

    #[error("Failed to encode document: {0}")]
    BencodeError(#[from] serde_bencode::Error),
}
