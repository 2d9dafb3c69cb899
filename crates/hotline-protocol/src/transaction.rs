//! Transaction and field framing for the control port.
//!
//! A transaction is a 20-byte fixed header followed by a payload holding a
//! two-byte field count and that many type/length/value fields:
//!
//! ```text
//! Flags[1] IsReply[1] Type[2] ID[4] ErrorCode[4] TotalSize[4] DataSize[4]
//! FieldCount[2] ( FieldID[2] FieldSize[2] FieldData[FieldSize] )*
//! ```
//!
//! `TotalSize` counts the payload only (field count word included), so a
//! complete frame is `20 + TotalSize` bytes. This implementation never
//! fragments, so `DataSize == TotalSize` on everything it emits.

use crate::MAX_PAYLOAD_SIZE;
use crate::TRANSACTION_HEADER_SIZE;
use crate::error::ProtocolError;

/// A typed length-prefixed chunk inside a transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    /// Field type id (see [`crate::types::fields`])
    pub id: u16,
    /// Raw field bytes; numeric fields are big-endian
    pub data: Vec<u8>,
}

impl Field {
    /// Create a field from raw bytes
    #[must_use]
    pub fn new(id: u16, data: impl Into<Vec<u8>>) -> Self {
        Self {
            id,
            data: data.into(),
        }
    }

    /// Create a two-byte big-endian integer field
    #[must_use]
    pub fn u16(id: u16, value: u16) -> Self {
        Self::new(id, value.to_be_bytes().to_vec())
    }

    /// Create a four-byte big-endian integer field
    #[must_use]
    pub fn u32(id: u16, value: u32) -> Self {
        Self::new(id, value.to_be_bytes().to_vec())
    }

    /// Wire size of this field including its 4-byte type/size prefix
    #[must_use]
    pub fn wire_size(&self) -> usize {
        4 + self.data.len()
    }

    /// Interpret the field as an unsigned integer.
    ///
    /// Clients disagree about the width of numeric fields (icon ids arrive
    /// as two bytes, transfer sizes as four), so any length up to eight is
    /// accepted and widened.
    #[must_use]
    pub fn as_int(&self) -> Option<u64> {
        if self.data.is_empty() || self.data.len() > 8 {
            return None;
        }
        let mut v: u64 = 0;
        for b in &self.data {
            v = (v << 8) | u64::from(*b);
        }
        Some(v)
    }

    /// Field data as a lossily decoded string, for logging and messages
    #[must_use]
    pub fn as_text(&self) -> String {
        String::from_utf8_lossy(&self.data).into_owned()
    }
}

/// A single framed request or reply on the control port
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    /// Reserved flag byte (always 0 from known clients)
    pub flags: u8,
    /// 1 when this transaction answers an earlier request
    pub is_reply: u8,
    /// Operation code (see [`crate::types`])
    pub type_code: u16,
    /// Request id; replies echo the id of the request they answer
    pub id: u32,
    /// 0 on success, 1 when the Error field carries a reason
    pub error_code: u32,
    /// Ordered field list
    pub fields: Vec<Field>,
}

impl Transaction {
    /// Build a request with a fresh random nonzero id
    #[must_use]
    pub fn new(type_code: u16, fields: Vec<Field>) -> Self {
        Self {
            flags: 0,
            is_reply: 0,
            type_code,
            id: random_id(),
            error_code: 0,
            fields,
        }
    }

    /// Build the success reply to `request`, echoing its id
    #[must_use]
    pub fn reply_to(request: &Transaction, fields: Vec<Field>) -> Self {
        Self {
            flags: 0,
            is_reply: 1,
            type_code: request.type_code,
            id: request.id,
            error_code: 0,
            fields,
        }
    }

    /// Build an error reply carrying a human-readable reason
    #[must_use]
    pub fn error_reply(request: &Transaction, message: impl Into<Vec<u8>>) -> Self {
        Self {
            flags: 0,
            is_reply: 1,
            type_code: request.type_code,
            id: request.id,
            error_code: 1,
            fields: vec![Field::new(crate::types::fields::ERROR, message)],
        }
    }

    /// First field with the given id, if present
    #[must_use]
    pub fn field(&self, id: u16) -> Option<&Field> {
        self.fields.iter().find(|f| f.id == id)
    }

    /// Payload size: field count word plus every field's wire size
    #[must_use]
    pub fn payload_size(&self) -> usize {
        2 + self.fields.iter().map(Field::wire_size).sum::<usize>()
    }

    /// Encode into a complete wire frame
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let payload = self.payload_size();
        let mut buf = Vec::with_capacity(TRANSACTION_HEADER_SIZE + payload);

        buf.push(self.flags);
        buf.push(self.is_reply);
        buf.extend_from_slice(&self.type_code.to_be_bytes());
        buf.extend_from_slice(&self.id.to_be_bytes());
        buf.extend_from_slice(&self.error_code.to_be_bytes());
        buf.extend_from_slice(&(payload as u32).to_be_bytes());
        buf.extend_from_slice(&(payload as u32).to_be_bytes());

        buf.extend_from_slice(&(self.fields.len() as u16).to_be_bytes());
        for field in &self.fields {
            buf.extend_from_slice(&field.id.to_be_bytes());
            buf.extend_from_slice(&(field.data.len() as u16).to_be_bytes());
            buf.extend_from_slice(&field.data);
        }

        buf
    }

    /// Parse one complete frame.
    ///
    /// The slice must hold exactly the frame: header plus `TotalSize`
    /// payload bytes. Fields are validated strictly against the declared
    /// count; a short payload or leftover bytes both fail.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError::TooShort` when the header is incomplete,
    /// `FieldCountMismatch`/`FieldOverrun` when the declared field count is
    /// inconsistent with the payload, and `TrailingBytes` when bytes remain
    /// after the last declared field.
    pub fn parse(frame: &[u8]) -> Result<Self, ProtocolError> {
        if frame.len() < TRANSACTION_HEADER_SIZE + 2 {
            return Err(ProtocolError::TooShort {
                expected: TRANSACTION_HEADER_SIZE + 2,
                actual: frame.len(),
            });
        }

        let flags = frame[0];
        let is_reply = frame[1];
        let type_code = u16::from_be_bytes([frame[2], frame[3]]);
        let id = u32::from_be_bytes([frame[4], frame[5], frame[6], frame[7]]);
        let error_code = u32::from_be_bytes([frame[8], frame[9], frame[10], frame[11]]);
        let total_size = u32::from_be_bytes([frame[12], frame[13], frame[14], frame[15]]);

        // The payload always holds at least the field-count word.
        if total_size < 2 {
            return Err(ProtocolError::TooShort {
                expected: TRANSACTION_HEADER_SIZE + 2,
                actual: TRANSACTION_HEADER_SIZE + total_size as usize,
            });
        }

        let expected = TRANSACTION_HEADER_SIZE + total_size as usize;
        if frame.len() < expected {
            return Err(ProtocolError::TooShort {
                expected,
                actual: frame.len(),
            });
        }

        let payload = &frame[TRANSACTION_HEADER_SIZE..expected];
        let declared = u16::from_be_bytes([payload[0], payload[1]]);

        let mut fields = Vec::with_capacity(declared as usize);
        let mut off = 2usize;
        for parsed in 0..declared {
            if payload.len() < off + 4 {
                return Err(ProtocolError::FieldCountMismatch { declared, parsed });
            }
            let field_id = u16::from_be_bytes([payload[off], payload[off + 1]]);
            let size = u16::from_be_bytes([payload[off + 2], payload[off + 3]]) as usize;
            off += 4;
            if payload.len() < off + size {
                return Err(ProtocolError::FieldOverrun);
            }
            fields.push(Field::new(field_id, payload[off..off + size].to_vec()));
            off += size;
        }

        if off != payload.len() {
            return Err(ProtocolError::TrailingBytes(payload.len() - off));
        }

        Ok(Self {
            flags,
            is_reply,
            type_code,
            id,
            error_code,
            fields,
        })
    }
}

/// Four random nonzero bytes from the system CSPRNG
fn random_id() -> u32 {
    loop {
        let mut bytes = [0u8; 4];
        getrandom::getrandom(&mut bytes).expect("CSPRNG failure");
        let id = u32::from_be_bytes(bytes);
        if id != 0 {
            return id;
        }
    }
}

/// Incremental transaction splitter for stream input.
///
/// Feed raw socket bytes with [`TransactionScanner::extend`] and drain
/// complete transactions with [`TransactionScanner::next`]. Partial input is
/// retained across calls; nothing is yielded until the header and the full
/// declared payload have arrived.
#[derive(Debug, Default)]
pub struct TransactionScanner {
    buf: Vec<u8>,
}

impl TransactionScanner {
    /// Create an empty scanner
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append raw bytes from the stream
    pub fn extend(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Bytes currently buffered but not yet consumed
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Pop the next complete transaction, if one has fully arrived.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError::PayloadTooLarge` for frames over the payload
    /// limit, or any parse error from [`Transaction::parse`]; both mean the
    /// stream is unrecoverable.
    pub fn next(&mut self) -> Result<Option<Transaction>, ProtocolError> {
        // Total size lives at [12:16]; no decision before that word arrives.
        if self.buf.len() < 16 {
            return Ok(None);
        }

        let total_size =
            u32::from_be_bytes([self.buf[12], self.buf[13], self.buf[14], self.buf[15]]);
        if total_size > MAX_PAYLOAD_SIZE {
            return Err(ProtocolError::PayloadTooLarge(total_size));
        }

        let need = TRANSACTION_HEADER_SIZE + total_size as usize;
        if self.buf.len() < need {
            return Ok(None);
        }

        let tx = Transaction::parse(&self.buf[..need])?;
        self.buf.drain(..need);
        Ok(Some(tx))
    }
}
