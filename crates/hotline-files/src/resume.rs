//! Resume records: the `RFLT` blob.
//!
//! A client resuming a download (or the server resuming an upload through
//! a folder transfer) exchanges per-fork restart offsets:
//!
//! ```text
//! "RFLT"[4] Version=1[2] Reserved[34] ForkCount[2]
//! ForkInfo: FourCC[4] DataSize[4] ReservedA[4] ReservedB[4]
//! ```
//!
//! `DataSize` is the byte count already on disk for that fork, i.e. the
//! offset streaming restarts from.

use crate::error::FileError;
use crate::flattened::{FORK_TYPE_DATA, FORK_TYPE_RSRC};
use hotline_protocol::error::ProtocolError;

/// Record tag
pub const RFLT: [u8; 4] = *b"RFLT";

/// Record version
pub const RESUME_VERSION: u16 = 1;

/// Fixed bytes before the fork list
const FIXED_PREFIX: usize = 42;

/// Restart offset for one fork
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForkOffset {
    /// Fork tag (`DATA` or `MACR`)
    pub fork_type: [u8; 4],
    /// Bytes already transferred for this fork
    pub data_size: u32,
}

/// A parsed resume blob
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResumeData {
    /// Per-fork restart offsets in wire order
    pub forks: Vec<ForkOffset>,
}

impl ResumeData {
    /// Resume record for a data fork (and optionally a resource fork)
    /// restarting at the given offsets
    #[must_use]
    pub fn at_offsets(data_offset: u32, rsrc_offset: Option<u32>) -> Self {
        let mut forks = vec![ForkOffset {
            fork_type: FORK_TYPE_DATA,
            data_size: data_offset,
        }];
        if let Some(off) = rsrc_offset {
            forks.push(ForkOffset {
                fork_type: FORK_TYPE_RSRC,
                data_size: off,
            });
        }
        Self { forks }
    }

    /// Restart offset of the data fork (0 when absent)
    #[must_use]
    pub fn data_offset(&self) -> u32 {
        self.fork_offset(FORK_TYPE_DATA)
    }

    /// Restart offset of the resource fork (0 when absent)
    #[must_use]
    pub fn rsrc_offset(&self) -> u32 {
        self.fork_offset(FORK_TYPE_RSRC)
    }

    fn fork_offset(&self, tag: [u8; 4]) -> u32 {
        self.forks
            .iter()
            .find(|f| f.fork_type == tag)
            .map_or(0, |f| f.data_size)
    }

    /// Encode to wire bytes
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(FIXED_PREFIX + self.forks.len() * 16);
        buf.extend_from_slice(&RFLT);
        buf.extend_from_slice(&RESUME_VERSION.to_be_bytes());
        buf.extend_from_slice(&[0u8; 34]);
        buf.extend_from_slice(&(self.forks.len() as u16).to_be_bytes());
        for fork in &self.forks {
            buf.extend_from_slice(&fork.fork_type);
            buf.extend_from_slice(&fork.data_size.to_be_bytes());
            buf.extend_from_slice(&[0u8; 8]);
        }
        buf
    }

    /// Parse a resume blob.
    ///
    /// # Errors
    ///
    /// Returns `BadMagic` for a non-`RFLT` tag or `TooShort` when the
    /// declared fork count overruns the buffer.
    pub fn parse(data: &[u8]) -> Result<Self, FileError> {
        if data.len() < FIXED_PREFIX {
            return Err(ProtocolError::TooShort {
                expected: FIXED_PREFIX,
                actual: data.len(),
            }
            .into());
        }
        let magic = [data[0], data[1], data[2], data[3]];
        if magic != RFLT {
            return Err(ProtocolError::BadMagic {
                expected: RFLT,
                actual: magic,
            }
            .into());
        }

        let count = u16::from_be_bytes([data[40], data[41]]) as usize;
        let need = FIXED_PREFIX + count * 16;
        if data.len() < need {
            return Err(ProtocolError::TooShort {
                expected: need,
                actual: data.len(),
            }
            .into());
        }

        let mut forks = Vec::with_capacity(count);
        for i in 0..count {
            let off = FIXED_PREFIX + i * 16;
            forks.push(ForkOffset {
                fork_type: [data[off], data[off + 1], data[off + 2], data[off + 3]],
                data_size: u32::from_be_bytes([
                    data[off + 4],
                    data[off + 5],
                    data[off + 6],
                    data[off + 7],
                ]),
            });
        }

        Ok(Self { forks })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_data_only() {
        let rd = ResumeData::at_offsets(1024, None);
        let parsed = ResumeData::parse(&rd.encode()).unwrap();
        assert_eq!(parsed, rd);
        assert_eq!(parsed.data_offset(), 1024);
        assert_eq!(parsed.rsrc_offset(), 0);
    }

    #[test]
    fn test_roundtrip_both_forks() {
        let rd = ResumeData::at_offsets(4096, Some(256));
        let parsed = ResumeData::parse(&rd.encode()).unwrap();
        assert_eq!(parsed.data_offset(), 4096);
        assert_eq!(parsed.rsrc_offset(), 256);
    }

    #[test]
    fn test_layout() {
        let bytes = ResumeData::at_offsets(7, None).encode();
        assert_eq!(&bytes[0..4], b"RFLT");
        assert_eq!(&bytes[4..6], &[0, 1]);
        assert_eq!(&bytes[40..42], &[0, 1]); // fork count
        assert_eq!(&bytes[42..46], b"DATA");
        assert_eq!(&bytes[46..50], &7u32.to_be_bytes());
    }

    #[test]
    fn test_bad_magic_rejected() {
        let mut bytes = ResumeData::at_offsets(0, None).encode();
        bytes[0] = b'x';
        assert!(ResumeData::parse(&bytes).is_err());
    }

    #[test]
    fn test_overrunning_fork_count_rejected() {
        let mut bytes = ResumeData::at_offsets(0, None).encode();
        bytes[41] = 5;
        assert!(ResumeData::parse(&bytes).is_err());
    }
}
