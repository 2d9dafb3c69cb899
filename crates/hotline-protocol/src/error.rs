//! Error types for the Hotline wire codec.

use thiserror::Error;

/// Wire-level protocol errors
///
/// Any of these at the framing layer means the peer is broken or hostile;
/// the connection is closed rather than resynchronized.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Record too short to parse
    #[error("record too short: expected at least {expected}, got {actual}")]
    TooShort {
        /// Expected minimum size
        expected: usize,
        /// Actual size received
        actual: usize,
    },

    /// Magic bytes did not match the expected record tag
    #[error("bad magic: expected {expected:?}, got {actual:?}")]
    BadMagic {
        /// The four-byte tag this record must start with
        expected: [u8; 4],
        /// What the peer sent
        actual: [u8; 4],
    },

    /// Peer requested a protocol version we do not speak
    #[error("unsupported protocol version {0}")]
    UnsupportedVersion(u16),

    /// Transaction type byte pair is not a known operation
    #[error("unknown transaction type 0x{0:04X}")]
    UnknownTransactionType(u16),

    /// Declared field count disagrees with the payload bytes
    #[error("field count mismatch: declared {declared}, payload holds {parsed}")]
    FieldCountMismatch {
        /// Count from the two-byte prefix
        declared: u16,
        /// Fields actually recovered before the payload ran out
        parsed: u16,
    },

    /// Payload bytes left over after the declared fields were read
    #[error("{0} trailing bytes after last field")]
    TrailingBytes(usize),

    /// A field's length prefix points past the end of the payload
    #[error("field length exceeds payload")]
    FieldOverrun,

    /// Declared payload size exceeds the frame limit
    #[error("payload size {0} exceeds limit")]
    PayloadTooLarge(u32),

    /// I/O failure while reading a record from a stream
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
