//! Tracker wire records.
//!
//! Servers announce themselves to trackers over UDP and clients fetch
//! listings over TCP. Both directions use small fixed-prefix records with
//! length-prefixed strings.

use crate::error::ProtocolError;

/// Record tag for the TCP listing handshake
pub const HTRK: [u8; 4] = *b"HTRK";

/// Tracker protocol version
pub const TRACKER_VERSION: u16 = 1;

/// The UDP announce payload
///
/// ```text
/// Magic[2]=0x0001 Port[2] UserCount[2] Reserved[2]=0
/// PassID[4] NameLen[1] Name[NameLen] DescLen[1] Desc[DescLen]
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerRegistration {
    /// Control-port number clients should connect to
    pub port: u16,
    /// Currently connected users
    pub user_count: u16,
    /// Random id distinguishing re-registrations from new servers
    pub pass_id: [u8; 4],
    /// Server name
    pub name: Vec<u8>,
    /// Server description
    pub description: Vec<u8>,
}

impl TrackerRegistration {
    /// Encode the announce payload
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(12 + 2 + self.name.len() + self.description.len());
        buf.extend_from_slice(&1u16.to_be_bytes());
        buf.extend_from_slice(&self.port.to_be_bytes());
        buf.extend_from_slice(&self.user_count.to_be_bytes());
        buf.extend_from_slice(&[0, 0]);
        buf.extend_from_slice(&self.pass_id);
        buf.push(self.name.len().min(255) as u8);
        buf.extend_from_slice(&self.name[..self.name.len().min(255)]);
        buf.push(self.description.len().min(255) as u8);
        buf.extend_from_slice(&self.description[..self.description.len().min(255)]);
        buf
    }

    /// Parse an announce payload.
    ///
    /// # Errors
    ///
    /// Returns `TooShort` on truncation or `UnsupportedVersion` when the
    /// magic word is not 0x0001.
    pub fn parse(data: &[u8]) -> Result<Self, ProtocolError> {
        if data.len() < 14 {
            return Err(ProtocolError::TooShort {
                expected: 14,
                actual: data.len(),
            });
        }
        let magic = u16::from_be_bytes([data[0], data[1]]);
        if magic != 1 {
            return Err(ProtocolError::UnsupportedVersion(magic));
        }

        let port = u16::from_be_bytes([data[2], data[3]]);
        let user_count = u16::from_be_bytes([data[4], data[5]]);
        let pass_id = [data[8], data[9], data[10], data[11]];

        let (name, off) = read_pstring(data, 12)?;
        let (description, off) = read_pstring(data, off)?;
        if off != data.len() {
            return Err(ProtocolError::TrailingBytes(data.len() - off));
        }

        Ok(Self {
            port,
            user_count,
            pass_id,
            name,
            description,
        })
    }
}

/// One server entry in a tracker listing
///
/// ```text
/// Addr[4] Port[2] UserCount[2] Reserved[2]
/// NameLen[1] Name[NameLen] DescLen[1] Desc[DescLen]
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerRecord {
    /// IPv4 address, network order
    pub addr: [u8; 4],
    /// Control-port number
    pub port: u16,
    /// Currently connected users
    pub user_count: u16,
    /// Server name
    pub name: Vec<u8>,
    /// Server description
    pub description: Vec<u8>,
}

impl ServerRecord {
    /// Encode one listing entry
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(12 + self.name.len() + self.description.len());
        buf.extend_from_slice(&self.addr);
        buf.extend_from_slice(&self.port.to_be_bytes());
        buf.extend_from_slice(&self.user_count.to_be_bytes());
        buf.extend_from_slice(&[0, 0]);
        buf.push(self.name.len().min(255) as u8);
        buf.extend_from_slice(&self.name[..self.name.len().min(255)]);
        buf.push(self.description.len().min(255) as u8);
        buf.extend_from_slice(&self.description[..self.description.len().min(255)]);
        buf
    }

    /// Try to parse one entry from the front of `data`.
    ///
    /// Listing entries are variable-length, so the TCP reader calls this
    /// repeatedly against its buffer. Returns the record and the bytes it
    /// consumed, or `None` when more input is needed.
    pub fn parse_prefix(data: &[u8]) -> Option<(Self, usize)> {
        if data.len() < 11 {
            return None;
        }
        let name_len = data[10] as usize;
        if data.len() < 11 + name_len + 1 {
            return None;
        }
        let desc_len = data[11 + name_len] as usize;
        let total = 12 + name_len + desc_len;
        if data.len() < total {
            return None;
        }

        Some((
            Self {
                addr: [data[0], data[1], data[2], data[3]],
                port: u16::from_be_bytes([data[4], data[5]]),
                user_count: u16::from_be_bytes([data[6], data[7]]),
                name: data[11..11 + name_len].to_vec(),
                description: data[12 + name_len..total].to_vec(),
            },
            total,
        ))
    }
}

fn read_pstring(data: &[u8], off: usize) -> Result<(Vec<u8>, usize), ProtocolError> {
    if data.len() < off + 1 {
        return Err(ProtocolError::TooShort {
            expected: off + 1,
            actual: data.len(),
        });
    }
    let len = data[off] as usize;
    if data.len() < off + 1 + len {
        return Err(ProtocolError::TooShort {
            expected: off + 1 + len,
            actual: data.len(),
        });
    }
    Ok((data[off + 1..off + 1 + len].to_vec(), off + 1 + len))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_registration() -> TrackerRegistration {
        TrackerRegistration {
            port: 5500,
            user_count: 3,
            pass_id: [1, 2, 3, 4],
            name: b"The Vault".to_vec(),
            description: b"files and chat".to_vec(),
        }
    }

    #[test]
    fn test_registration_roundtrip() {
        let reg = sample_registration();
        assert_eq!(TrackerRegistration::parse(&reg.encode()).unwrap(), reg);
    }

    #[test]
    fn test_registration_layout() {
        let bytes = sample_registration().encode();
        assert_eq!(&bytes[0..2], &[0x00, 0x01]);
        assert_eq!(u16::from_be_bytes([bytes[2], bytes[3]]), 5500);
        assert_eq!(&bytes[6..8], &[0, 0]);
        assert_eq!(bytes[12], 9); // name length
    }

    #[test]
    fn test_server_record_prefix_parsing() {
        let rec = ServerRecord {
            addr: [10, 0, 0, 1],
            port: 5500,
            user_count: 12,
            name: b"alpha".to_vec(),
            description: b"first".to_vec(),
        };
        let mut stream = rec.encode();
        let tail_start = stream.len();
        stream.extend_from_slice(&rec.encode());

        // Partial input yields nothing.
        assert!(ServerRecord::parse_prefix(&stream[..tail_start - 1]).is_none());

        let (parsed, used) = ServerRecord::parse_prefix(&stream).unwrap();
        assert_eq!(parsed, rec);
        assert_eq!(used, tail_start);

        let (parsed2, _) = ServerRecord::parse_prefix(&stream[used..]).unwrap();
        assert_eq!(parsed2, rec);
    }

    #[test]
    fn test_empty_strings() {
        let rec = ServerRecord {
            addr: [127, 0, 0, 1],
            port: 5500,
            user_count: 0,
            name: Vec::new(),
            description: Vec::new(),
        };
        let (parsed, used) = ServerRecord::parse_prefix(&rec.encode()).unwrap();
        assert_eq!(parsed, rec);
        assert_eq!(used, 12);
    }
}
