use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TextError {
    #[error("Position {pos} outside of text with length {len}")]
    InvalidPosition { pos: u64, len: u64 },

    #[error("Scratch block allocation failed")]
    OutOfMemory,

    #[error("IO operation failed")]
    Io(#[from] io::Error),

    #[error("Save method not supported for this file")]
    Unsupported,

    #[error("Failed to render formatted text")]
    Format,
}
