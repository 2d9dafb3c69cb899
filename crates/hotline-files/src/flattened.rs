//! The flattened file object: the `FILP` wire container.
//!
//! ```text
//! "FILP"[4] Version=1[2] Reserved[16] ForkCount[2]
//! ForkHeader: FourCC[4] CompressionType[4] Reserved[4] DataSize[4]
//! ```
//!
//! A transfer is the container header, then an `INFO` fork header and the
//! information fork, then a `DATA` fork header and the raw data bytes, then
//! (when a resource fork exists) a `MACR` fork header and the resource
//! bytes. ForkCount is 2 without a resource fork and 3 with one. On a
//! resumed download the data header's `DataSize` already has the restart
//! offset subtracted.

use crate::error::FileError;
use hotline_protocol::error::ProtocolError;

/// Container tag
pub const FILP: [u8; 4] = *b"FILP";

/// Container version
pub const FLAT_FILE_VERSION: u16 = 1;

/// Fork tag for the information fork
pub const FORK_TYPE_INFO: [u8; 4] = *b"INFO";
/// Fork tag for the data fork
pub const FORK_TYPE_DATA: [u8; 4] = *b"DATA";
/// Fork tag for the Macintosh resource fork
pub const FORK_TYPE_RSRC: [u8; 4] = *b"MACR";

/// The 24-byte container header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlatFileHeader {
    /// 2 forks (info + data) or 3 (info + data + resource)
    pub fork_count: u16,
}

impl FlatFileHeader {
    /// Wire size of the container header
    pub const SIZE: usize = 24;

    /// Header for a file with or without a resource fork
    #[must_use]
    pub fn new(has_resource_fork: bool) -> Self {
        Self {
            fork_count: if has_resource_fork { 3 } else { 2 },
        }
    }

    /// Encode to wire bytes
    #[must_use]
    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        out[0..4].copy_from_slice(&FILP);
        out[4..6].copy_from_slice(&FLAT_FILE_VERSION.to_be_bytes());
        out[22..24].copy_from_slice(&self.fork_count.to_be_bytes());
        out
    }

    /// Parse and validate the container header.
    ///
    /// # Errors
    ///
    /// Returns `BadMagic` for a non-`FILP` tag, `UnsupportedVersion` for
    /// any version other than 1, or `TooShort` on truncation.
    pub fn parse(data: &[u8]) -> Result<Self, FileError> {
        if data.len() < Self::SIZE {
            return Err(ProtocolError::TooShort {
                expected: Self::SIZE,
                actual: data.len(),
            }
            .into());
        }
        let magic = [data[0], data[1], data[2], data[3]];
        if magic != FILP {
            return Err(ProtocolError::BadMagic {
                expected: FILP,
                actual: magic,
            }
            .into());
        }
        let version = u16::from_be_bytes([data[4], data[5]]);
        if version != FLAT_FILE_VERSION {
            return Err(ProtocolError::UnsupportedVersion(version).into());
        }
        Ok(Self {
            fork_count: u16::from_be_bytes([data[22], data[23]]),
        })
    }
}

/// A 16-byte fork header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForkHeader {
    /// Fork tag (`INFO`, `DATA` or `MACR`)
    pub fork_type: [u8; 4],
    /// Compression id; always 0, carried for the wire contract
    pub compression_type: u32,
    /// Bytes of fork content following this header
    pub data_size: u32,
}

impl ForkHeader {
    /// Wire size of a fork header
    pub const SIZE: usize = 16;

    /// Uncompressed fork header
    #[must_use]
    pub fn new(fork_type: [u8; 4], data_size: u32) -> Self {
        Self {
            fork_type,
            compression_type: 0,
            data_size,
        }
    }

    /// Encode to wire bytes
    #[must_use]
    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        out[0..4].copy_from_slice(&self.fork_type);
        out[4..8].copy_from_slice(&self.compression_type.to_be_bytes());
        out[12..16].copy_from_slice(&self.data_size.to_be_bytes());
        out
    }

    /// Parse a fork header.
    ///
    /// # Errors
    ///
    /// Returns `TooShort` on truncation.
    pub fn parse(data: &[u8]) -> Result<Self, FileError> {
        if data.len() < Self::SIZE {
            return Err(ProtocolError::TooShort {
                expected: Self::SIZE,
                actual: data.len(),
            }
            .into());
        }
        Ok(Self {
            fork_type: [data[0], data[1], data[2], data[3]],
            compression_type: u32::from_be_bytes([data[4], data[5], data[6], data[7]]),
            data_size: u32::from_be_bytes([data[12], data[13], data[14], data[15]]),
        })
    }
}
