//! Handshake records for both listeners.
//!
//! Control port: the client opens with 12 bytes (`TRTP` + sub-protocol +
//! version + sub-version) and the server answers with 8 (`TRTP` + error).
//! Transfer port: the client opens with 16 bytes (`HTXF` + reference +
//! payload size + reserved) and the server answers nothing; a bad reference
//! just closes the socket.

use crate::error::ProtocolError;
use crate::{PROTOCOL_SUB_VERSION, PROTOCOL_VERSION};

/// Record tag shared by both control-port handshake directions
pub const TRTP: [u8; 4] = *b"TRTP";

/// Sub-protocol id current clients send
pub const HOTL: [u8; 4] = *b"HOTL";

/// Record tag opening every transfer-port connection
pub const HTXF: [u8; 4] = *b"HTXF";

/// The 12-byte client hello on the control port
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientHandshake {
    /// Sub-protocol id (`HOTL` from known clients)
    pub sub_protocol: [u8; 4],
    /// Protocol version (must be 1)
    pub version: u16,
    /// Client sub-version, informational
    pub sub_version: u16,
}

impl ClientHandshake {
    /// Wire size of the client hello
    pub const SIZE: usize = 12;

    /// The hello a current client sends
    #[must_use]
    pub fn current() -> Self {
        Self {
            sub_protocol: HOTL,
            version: PROTOCOL_VERSION,
            sub_version: PROTOCOL_SUB_VERSION,
        }
    }

    /// Parse and validate a client hello.
    ///
    /// # Errors
    ///
    /// Returns `TooShort`, `BadMagic` on a non-`TRTP` opener, or
    /// `UnsupportedVersion` for any version other than 1.
    pub fn parse(data: &[u8]) -> Result<Self, ProtocolError> {
        if data.len() < Self::SIZE {
            return Err(ProtocolError::TooShort {
                expected: Self::SIZE,
                actual: data.len(),
            });
        }

        let magic = [data[0], data[1], data[2], data[3]];
        if magic != TRTP {
            return Err(ProtocolError::BadMagic {
                expected: TRTP,
                actual: magic,
            });
        }

        let hello = Self {
            sub_protocol: [data[4], data[5], data[6], data[7]],
            version: u16::from_be_bytes([data[8], data[9]]),
            sub_version: u16::from_be_bytes([data[10], data[11]]),
        };

        if hello.version != PROTOCOL_VERSION {
            return Err(ProtocolError::UnsupportedVersion(hello.version));
        }

        Ok(hello)
    }

    /// Encode to wire bytes
    #[must_use]
    pub fn encode(&self) -> [u8; 12] {
        let mut out = [0u8; 12];
        out[0..4].copy_from_slice(&TRTP);
        out[4..8].copy_from_slice(&self.sub_protocol);
        out[8..10].copy_from_slice(&self.version.to_be_bytes());
        out[10..12].copy_from_slice(&self.sub_version.to_be_bytes());
        out
    }
}

/// The 8-byte server answer on the control port
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandshakeReply {
    /// 0 accepts the session; anything else refuses it
    pub error: u32,
}

impl HandshakeReply {
    /// Wire size of the reply
    pub const SIZE: usize = 8;

    /// The accepting reply
    #[must_use]
    pub fn ok() -> Self {
        Self { error: 0 }
    }

    /// Encode to wire bytes
    #[must_use]
    pub fn encode(&self) -> [u8; 8] {
        let mut out = [0u8; 8];
        out[0..4].copy_from_slice(&TRTP);
        out[4..8].copy_from_slice(&self.error.to_be_bytes());
        out
    }

    /// Parse wire bytes.
    ///
    /// # Errors
    ///
    /// Returns `TooShort` or `BadMagic`.
    pub fn parse(data: &[u8]) -> Result<Self, ProtocolError> {
        if data.len() < Self::SIZE {
            return Err(ProtocolError::TooShort {
                expected: Self::SIZE,
                actual: data.len(),
            });
        }
        let magic = [data[0], data[1], data[2], data[3]];
        if magic != TRTP {
            return Err(ProtocolError::BadMagic {
                expected: TRTP,
                actual: magic,
            });
        }
        Ok(Self {
            error: u32::from_be_bytes([data[4], data[5], data[6], data[7]]),
        })
    }
}

/// The 16-byte opener on the transfer port
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferHandshake {
    /// One-shot reference number issued on the control port
    pub reference: u32,
    /// Declared payload size; 0 when the client does not know it
    pub data_size: u32,
}

impl TransferHandshake {
    /// Wire size of the opener
    pub const SIZE: usize = 16;

    /// Parse and validate the opener.
    ///
    /// # Errors
    ///
    /// Returns `TooShort` or `BadMagic` on a non-`HTXF` opener.
    pub fn parse(data: &[u8]) -> Result<Self, ProtocolError> {
        if data.len() < Self::SIZE {
            return Err(ProtocolError::TooShort {
                expected: Self::SIZE,
                actual: data.len(),
            });
        }
        let magic = [data[0], data[1], data[2], data[3]];
        if magic != HTXF {
            return Err(ProtocolError::BadMagic {
                expected: HTXF,
                actual: magic,
            });
        }
        Ok(Self {
            reference: u32::from_be_bytes([data[4], data[5], data[6], data[7]]),
            data_size: u32::from_be_bytes([data[8], data[9], data[10], data[11]]),
        })
    }

    /// Encode to wire bytes
    #[must_use]
    pub fn encode(&self) -> [u8; 16] {
        let mut out = [0u8; 16];
        out[0..4].copy_from_slice(&HTXF);
        out[4..8].copy_from_slice(&self.reference.to_be_bytes());
        out[8..12].copy_from_slice(&self.data_size.to_be_bytes());
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_hello_literal_bytes() {
        // TRTP HOTL 0001 0002
        let wire = [
            0x54, 0x52, 0x54, 0x50, 0x48, 0x4F, 0x54, 0x4C, 0x00, 0x01, 0x00, 0x02,
        ];
        let hello = ClientHandshake::parse(&wire).unwrap();
        assert_eq!(hello, ClientHandshake::current());
        assert_eq!(hello.encode(), wire);
    }

    #[test]
    fn test_server_reply_literal_bytes() {
        // TRTP 00000000
        let wire = [0x54, 0x52, 0x54, 0x50, 0x00, 0x00, 0x00, 0x00];
        assert_eq!(HandshakeReply::ok().encode(), wire);
        assert_eq!(HandshakeReply::parse(&wire).unwrap().error, 0);
    }

    #[test]
    fn test_bad_magic_rejected() {
        let wire = *b"HTTP/1.1 200";
        assert!(matches!(
            ClientHandshake::parse(&wire),
            Err(ProtocolError::BadMagic { .. })
        ));
    }

    #[test]
    fn test_wrong_version_rejected() {
        let mut wire = ClientHandshake::current().encode();
        wire[9] = 2;
        assert!(matches!(
            ClientHandshake::parse(&wire),
            Err(ProtocolError::UnsupportedVersion(2))
        ));
    }

    #[test]
    fn test_transfer_handshake_roundtrip() {
        let hs = TransferHandshake {
            reference: 0xDEAD_BEEF,
            data_size: 1024,
        };
        assert_eq!(TransferHandshake::parse(&hs.encode()).unwrap(), hs);
    }

    #[test]
    fn test_transfer_handshake_bad_magic() {
        let mut wire = TransferHandshake {
            reference: 1,
            data_size: 0,
        }
        .encode();
        wire[0] = b'X';
        assert!(matches!(
            TransferHandshake::parse(&wire),
            Err(ProtocolError::BadMagic { .. })
        ));
    }
}
