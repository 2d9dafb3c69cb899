//! Count-prefixed path item lists.
//!
//! File paths (and news paths, which reuse the layout) cross the wire as:
//!
//! ```text
//! ItemCount[2] ( Reserved[2] NameLen[1] Name[NameLen] )*
//! ```
//!
//! Components are opaque byte runs; nothing here touches the filesystem.
//! Sandbox resolution lives with the file store.

use crate::error::ProtocolError;

/// A decoded path item list
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilePath {
    /// Path components, root first
    pub components: Vec<Vec<u8>>,
}

impl FilePath {
    /// The empty path (the sandbox root)
    #[must_use]
    pub fn root() -> Self {
        Self::default()
    }

    /// Build from string components, for tests and internal callers
    #[must_use]
    pub fn from_components<S: AsRef<[u8]>>(parts: &[S]) -> Self {
        Self {
            components: parts.iter().map(|p| p.as_ref().to_vec()).collect(),
        }
    }

    /// Parse a wire path item list.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError::TooShort` when an item's declared length
    /// extends past the buffer, or `TrailingBytes` when bytes remain after
    /// the declared item count.
    pub fn parse(data: &[u8]) -> Result<Self, ProtocolError> {
        if data.is_empty() {
            return Ok(Self::root());
        }
        if data.len() < 2 {
            return Err(ProtocolError::TooShort {
                expected: 2,
                actual: data.len(),
            });
        }

        let count = u16::from_be_bytes([data[0], data[1]]);
        let mut components = Vec::with_capacity(count as usize);
        let mut off = 2usize;

        for _ in 0..count {
            if data.len() < off + 3 {
                return Err(ProtocolError::TooShort {
                    expected: off + 3,
                    actual: data.len(),
                });
            }
            let len = data[off + 2] as usize;
            off += 3;
            if data.len() < off + len {
                return Err(ProtocolError::TooShort {
                    expected: off + len,
                    actual: data.len(),
                });
            }
            components.push(data[off..off + len].to_vec());
            off += len;
        }

        if off != data.len() {
            return Err(ProtocolError::TrailingBytes(data.len() - off));
        }

        Ok(Self { components })
    }

    /// Encode to the wire form
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(
            2 + self
                .components
                .iter()
                .map(|c| 3 + c.len())
                .sum::<usize>(),
        );
        buf.extend_from_slice(&(self.components.len() as u16).to_be_bytes());
        for component in &self.components {
            buf.extend_from_slice(&[0, 0]);
            buf.push(component.len().min(255) as u8);
            buf.extend_from_slice(&component[..component.len().min(255)]);
        }
        buf
    }

    /// Number of components
    #[must_use]
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// True for the sandbox root
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Components lossily decoded to strings
    #[must_use]
    pub fn components_lossy(&self) -> Vec<String> {
        self.components
            .iter()
            .map(|c| String::from_utf8_lossy(c).into_owned())
            .collect()
    }

    /// Append a component
    pub fn push(&mut self, component: impl Into<Vec<u8>>) {
        self.components.push(component.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip() {
        let path = FilePath::from_components(&["Uploads", "music", "demo.sit"]);
        assert_eq!(FilePath::parse(&path.encode()).unwrap(), path);
    }

    #[test]
    fn test_empty_input_is_root() {
        let path = FilePath::parse(&[]).unwrap();
        assert!(path.is_empty());
        assert_eq!(FilePath::root().encode(), vec![0, 0]);
    }

    #[test]
    fn test_wire_layout() {
        let path = FilePath::from_components(&["ab"]);
        assert_eq!(path.encode(), vec![0, 1, 0, 0, 2, b'a', b'b']);
    }

    #[test]
    fn test_truncated_item_rejected() {
        let mut bytes = FilePath::from_components(&["abcdef"]).encode();
        bytes.truncate(bytes.len() - 2);
        assert!(matches!(
            FilePath::parse(&bytes),
            Err(ProtocolError::TooShort { .. })
        ));
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let mut bytes = FilePath::from_components(&["x"]).encode();
        bytes.push(0);
        assert!(matches!(
            FilePath::parse(&bytes),
            Err(ProtocolError::TrailingBytes(1))
        ));
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_roundtrip(
                parts in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..64), 0..8)
            ) {
                let path = FilePath { components: parts };
                prop_assert_eq!(FilePath::parse(&path.encode()).unwrap(), path);
            }

            #[test]
            fn prop_parse_doesnt_panic(data in prop::collection::vec(any::<u8>(), 0..512)) {
                let _ = FilePath::parse(&data);
            }
        }
    }
}
