//! Binary image formats accepted by the loader
//!
//! Two layouts are supported:
//! - Raw images: the payload alone, with the load address supplied by the
//!   caller (`Machine::load_image`).
//! - Prefixed images: a 2-byte little-endian load address followed by the
//!   payload (the `.prg` convention).
//!
//! File format (prefixed):
//!   [origin lo] [origin hi] [payload...]

use std::fmt;

use crate::error::{LoadError, LoadResult};
use crate::memory::addr;

/// Size of the load address header
pub const HEADER_SIZE: usize = 2;

/// A parsed header-prefixed image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefixedImage {
    /// Address the first payload byte is placed at
    pub origin: u16,
    pub payload: Vec<u8>,
}

impl PrefixedImage {
    /// Split a prefixed image into its load address and payload
    ///
    /// Only the header is checked here. Whether the payload fits in RAM is
    /// decided when it is loaded.
    pub fn parse(data: &[u8]) -> LoadResult<Self> {
        if data.len() < HEADER_SIZE {
            return Err(LoadError::MissingHeader { len: data.len() });
        }
        let origin = u16::from_le_bytes([data[0], data[1]]);
        let payload = &data[HEADER_SIZE..];
        if payload.is_empty() {
            return Err(LoadError::Empty);
        }
        Ok(Self {
            origin,
            payload: payload.to_vec(),
        })
    }

    /// Last address the payload occupies, `None` if it runs past RAM
    pub fn end(&self) -> Option<u16> {
        let last = self.origin as usize + self.payload.len() - 1;
        if last < addr::RAM_SIZE {
            Some(last as u16)
        } else {
            None
        }
    }

    /// Serialize back to the prefixed layout
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_SIZE + self.payload.len());
        out.extend_from_slice(&self.origin.to_le_bytes());
        out.extend_from_slice(&self.payload);
        out
    }
}

impl fmt::Display for PrefixedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "image at 0x{:04X}, {} bytes",
            self.origin,
            self.payload.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_origin_little_endian() {
        let image = PrefixedImage::parse(&[0x00, 0x80, 0x3E, 0x41, 0x76]).unwrap();
        assert_eq!(image.origin, 0x8000);
        assert_eq!(image.payload, vec![0x3E, 0x41, 0x76]);
        assert_eq!(image.end(), Some(0x8002));
        assert_eq!(image.to_string(), "image at 0x8000, 3 bytes");
    }

    #[test]
    fn test_reject_too_short() {
        assert_eq!(
            PrefixedImage::parse(&[]),
            Err(LoadError::MissingHeader { len: 0 })
        );
        assert_eq!(
            PrefixedImage::parse(&[0x00]),
            Err(LoadError::MissingHeader { len: 1 })
        );
    }

    #[test]
    fn test_reject_header_only() {
        assert_eq!(PrefixedImage::parse(&[0x00, 0x10]), Err(LoadError::Empty));
    }

    #[test]
    fn test_end_past_ram() {
        let image = PrefixedImage::parse(&[0xFF, 0xDF, 0x00]).unwrap();
        assert_eq!(image.end(), Some(0xDFFF));

        let image = PrefixedImage::parse(&[0xFF, 0xDF, 0x00, 0x00]).unwrap();
        assert_eq!(image.end(), None);
    }

    #[test]
    fn test_to_bytes_restores_layout() {
        let data = [0x34, 0x12, 0xAA, 0xBB];
        let image = PrefixedImage::parse(&data).unwrap();
        assert_eq!(image.to_bytes(), data.to_vec());
    }
}
