//! Error types for the fallible edges of the emulator
//!
//! Running code never fails: memory is total and arithmetic wraps. Only
//! loading images and parsing configuration can be rejected.

use thiserror::Error;

/// Errors raised while placing a binary image into RAM
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LoadError {
    #[error("image is empty")]
    Empty,

    #[error("image of {len} bytes at 0x{origin:04X} extends past the end of RAM (0xDFFF)")]
    TooLarge { origin: u16, len: usize },

    #[error("image of {len} bytes is too short for its 2-byte load address header")]
    MissingHeader { len: usize },
}

impl LoadError {
    /// Negative status code used by the C ABI
    pub fn code(&self) -> i32 {
        match self {
            LoadError::Empty => -2,
            LoadError::TooLarge { .. } => -3,
            LoadError::MissingHeader { .. } => -4,
        }
    }
}

/// Errors raised while parsing or validating a machine configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("clock frequency must be non-zero (got {0} Hz)")]
    InvalidClock(u32),

    #[error("interrupt queue depth must be non-zero (got {0})")]
    InvalidQueueDepth(usize),
}

pub type LoadResult<T> = Result<T, LoadError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_error_codes_are_distinct_and_negative() {
        let codes = [
            LoadError::Empty.code(),
            LoadError::TooLarge { origin: 0, len: 0 }.code(),
            LoadError::MissingHeader { len: 1 }.code(),
        ];
        assert!(codes.iter().all(|&c| c < 0));
        assert_ne!(codes[0], codes[1]);
        assert_ne!(codes[1], codes[2]);
    }

    #[test]
    fn test_too_large_message_names_origin() {
        let err = LoadError::TooLarge { origin: 0xD000, len: 0x2000 };
        let msg = err.to_string();
        assert!(msg.contains("0xD000"), "{}", msg);
        assert!(msg.contains("8192"), "{}", msg);
    }
}
