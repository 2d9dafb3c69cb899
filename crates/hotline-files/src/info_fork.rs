//! The information fork record.
//!
//! ```text
//! Platform[4] Type[4] Creator[4] Flags[4] PlatformFlags[4]
//! Reserved[32] CreateDate[8] ModifyDate[8] NameScript[2]
//! NameSize[2] Name[NameSize] CommentSize[2] Comment[CommentSize]
//! ```
//!
//! When a file has no `.info_NAME` sidecar, the record is synthesized from
//! filesystem metadata and the extension table below. The NameScript and
//! PlatformFlags values are the ones classic clients emit; they are carried
//! verbatim and never interpreted.

use crate::error::FileError;
use hotline_protocol::HotlineDate;
use hotline_protocol::error::ProtocolError;

/// Platform tag emitted for every record
pub const PLATFORM_AMAC: [u8; 4] = *b"AMAC";

/// PlatformFlags value observed from classic clients
pub const PLATFORM_FLAGS: u32 = 0x0000_0100;

/// Type/creator reported for a partial upload
pub const INCOMPLETE_TYPE: [u8; 4] = *b"HTft";
/// Creator reported for a partial upload
pub const INCOMPLETE_CREATOR: [u8; 4] = *b"HTLC";

/// Type/creator reported for a folder
pub const FOLDER_TYPE: [u8; 4] = *b"fldr";

/// Fixed bytes before the variable name/comment tail
const FIXED_PREFIX: usize = 70;

/// A file's metadata fork
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InformationFork {
    /// Platform tag (`AMAC`)
    pub platform: [u8; 4],
    /// Four-character type code
    pub type_code: [u8; 4],
    /// Four-character creator code
    pub creator_code: [u8; 4],
    /// Finder flags, carried opaquely
    pub flags: u32,
    /// Platform flags, carried opaquely
    pub platform_flags: u32,
    /// Creation time
    pub create_date: HotlineDate,
    /// Modification time
    pub modify_date: HotlineDate,
    /// Script code, carried opaquely
    pub name_script: u16,
    /// File name as shown to clients
    pub name: Vec<u8>,
    /// Free-form comment
    pub comment: Vec<u8>,
}

impl InformationFork {
    /// Synthesize a record for a file with no sidecar
    #[must_use]
    pub fn synthesized(name: &[u8], create: HotlineDate, modify: HotlineDate) -> Self {
        let (type_code, creator_code) = type_creator_for_name(name);
        Self {
            platform: PLATFORM_AMAC,
            type_code,
            creator_code,
            flags: 0,
            platform_flags: PLATFORM_FLAGS,
            create_date: create,
            modify_date: modify,
            name_script: 0,
            name: name.to_vec(),
            comment: Vec::new(),
        }
    }

    /// Synthesize the record for a partial upload
    #[must_use]
    pub fn incomplete(name: &[u8], create: HotlineDate, modify: HotlineDate) -> Self {
        let mut fork = Self::synthesized(name, create, modify);
        fork.type_code = INCOMPLETE_TYPE;
        fork.creator_code = INCOMPLETE_CREATOR;
        fork
    }

    /// Wire size of the encoded record
    #[must_use]
    pub fn size(&self) -> usize {
        FIXED_PREFIX + 2 + self.name.len() + 2 + self.comment.len()
    }

    /// Encode to wire bytes
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.size());
        buf.extend_from_slice(&self.platform);
        buf.extend_from_slice(&self.type_code);
        buf.extend_from_slice(&self.creator_code);
        buf.extend_from_slice(&self.flags.to_be_bytes());
        buf.extend_from_slice(&self.platform_flags.to_be_bytes());
        buf.extend_from_slice(&[0u8; 32]);
        buf.extend_from_slice(&self.create_date.to_bytes());
        buf.extend_from_slice(&self.modify_date.to_bytes());
        buf.extend_from_slice(&self.name_script.to_be_bytes());
        buf.extend_from_slice(&(self.name.len() as u16).to_be_bytes());
        buf.extend_from_slice(&self.name);
        buf.extend_from_slice(&(self.comment.len() as u16).to_be_bytes());
        buf.extend_from_slice(&self.comment);
        buf
    }

    /// Parse a record.
    ///
    /// # Errors
    ///
    /// Returns `FileError::Protocol` on truncation.
    pub fn parse(data: &[u8]) -> Result<Self, FileError> {
        if data.len() < FIXED_PREFIX + 2 {
            return Err(ProtocolError::TooShort {
                expected: FIXED_PREFIX + 2,
                actual: data.len(),
            }
            .into());
        }

        let mut create = [0u8; 8];
        create.copy_from_slice(&data[52..60]);
        let mut modify = [0u8; 8];
        modify.copy_from_slice(&data[60..68]);

        let name_size = u16::from_be_bytes([data[70], data[71]]) as usize;
        let name_end = 72 + name_size;
        if data.len() < name_end + 2 {
            return Err(ProtocolError::TooShort {
                expected: name_end + 2,
                actual: data.len(),
            }
            .into());
        }
        let comment_size = u16::from_be_bytes([data[name_end], data[name_end + 1]]) as usize;
        let comment_end = name_end + 2 + comment_size;
        if data.len() < comment_end {
            return Err(ProtocolError::TooShort {
                expected: comment_end,
                actual: data.len(),
            }
            .into());
        }

        Ok(Self {
            platform: [data[0], data[1], data[2], data[3]],
            type_code: [data[4], data[5], data[6], data[7]],
            creator_code: [data[8], data[9], data[10], data[11]],
            flags: u32::from_be_bytes([data[12], data[13], data[14], data[15]]),
            platform_flags: u32::from_be_bytes([data[16], data[17], data[18], data[19]]),
            create_date: HotlineDate::from_bytes(create),
            modify_date: HotlineDate::from_bytes(modify),
            name_script: u16::from_be_bytes([data[68], data[69]]),
            name: data[72..name_end].to_vec(),
            comment: data[name_end + 2..comment_end].to_vec(),
        })
    }
}

/// Map a file name to its type/creator pair via the extension table
#[must_use]
pub fn type_creator_for_name(name: &[u8]) -> ([u8; 4], [u8; 4]) {
    let lower = name.to_ascii_lowercase();
    let ext = lower
        .rsplit(|b| *b == b'.')
        .next()
        .filter(|e| e.len() < lower.len());

    match ext {
        Some(b"txt") => (*b"TEXT", *b"ttxt"),
        Some(b"zip") => (*b"ZIP ", *b"SITx"),
        Some(b"sit") => (*b"SIT!", *b"SIT!"),
        Some(b"hqx") => (*b"TEXT", *b"SITx"),
        Some(b"pdf") => (*b"PDF ", *b"CARO"),
        Some(b"gif") => (*b"GIFf", *b"ogle"),
        Some(b"jpg" | b"jpeg") => (*b"JPEG", *b"ogle"),
        Some(b"mp3") => (*b"MPG3", *b"TVOD"),
        Some(b"mov") => (*b"MooV", *b"TVOD"),
        Some(b"img") => (*b"rohd", *b"ddsk"),
        _ => (*b"TEXT", *b"TTXT"),
    }
}
