//! # Hotline Protocol
//!
//! Wire-level codec for the Hotline protocol family.
//!
//! This crate provides:
//! - **Transaction framing**: the 20-byte header + field list layout used on
//!   the control port, with an incremental scanner for stream input
//! - **Fixed-layout records**: control and transfer handshakes, file path
//!   lists, tracker registration and listing records
//! - **Credential obfuscation**: the involutive byte transform applied to
//!   logins and passwords on the wire
//! - **Access bitmap**: the 39-bit capability set carried on accounts
//! - **Date encoding**: the 8-byte year/milliseconds/seconds form
//!
//! All multi-byte integers are big-endian (network byte order). Strings are
//! treated as opaque byte runs with length prefixes; the codec never assumes
//! a text encoding.
//!
//! ## Module Structure
//!
//! - [`transaction`]: Transaction/Field framing and the stream scanner
//! - [`types`]: transaction type and field id assignments
//! - [`handshake`]: control-port and transfer-port handshake records
//! - [`obfuscate`]: credential obfuscation transform
//! - [`filepath`]: count-prefixed path item lists (files and news paths)
//! - [`access`]: access bitmap and named capability bits
//! - [`date`]: Hotline 8-byte date record
//! - [`tracker`]: tracker registration payload and server records
//! - [`error`]: error types

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod access;
pub mod date;
pub mod error;
pub mod filepath;
pub mod handshake;
pub mod obfuscate;
pub mod tracker;
pub mod transaction;
pub mod types;

pub use access::{Access, AccessBitmap};
pub use date::HotlineDate;
pub use error::ProtocolError;
pub use filepath::FilePath;
pub use handshake::{ClientHandshake, HandshakeReply, TransferHandshake};
pub use transaction::{Field, Transaction, TransactionScanner};
pub use types::TransactionType;

/// Size of the fixed transaction header (through the part-size word)
pub const TRANSACTION_HEADER_SIZE: usize = 20;

/// Protocol version expected in the control handshake
pub const PROTOCOL_VERSION: u16 = 1;

/// Sub-version sent by current clients
pub const PROTOCOL_SUB_VERSION: u16 = 2;

/// Upper bound on a single transaction payload; larger frames are rejected
/// before buffering to keep a hostile peer from ballooning the scanner
pub const MAX_PAYLOAD_SIZE: u32 = 16 * 1024 * 1024;
