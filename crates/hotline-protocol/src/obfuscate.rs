//! Credential obfuscation.
//!
//! Logins and passwords cross the wire bitwise-complemented, byte for byte.
//! This is an interoperability requirement, not security; the transform is
//! its own inverse and the server stores passwords only in this form.

/// Obfuscate (or de-obfuscate) a credential byte run.
///
/// The transform maps each byte `b` to `255 - b` and is involutive:
/// applying it twice yields the input.
#[must_use]
pub fn obfuscate(input: &[u8]) -> Vec<u8> {
    input.iter().map(|b| 255 - b).collect()
}

/// In-place variant of [`obfuscate`]
pub fn obfuscate_in_place(data: &mut [u8]) {
    for b in data.iter_mut() {
        *b = 255 - *b;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_vector() {
        // obf("guest") from the wire contract
        assert_eq!(obfuscate(b"guest"), vec![0x98, 0x8A, 0x9A, 0x8C, 0x8B]);
    }

    #[test]
    fn test_empty_input() {
        assert!(obfuscate(b"").is_empty());
    }

    #[test]
    fn test_in_place_matches_allocating() {
        let mut data = b"admin".to_vec();
        obfuscate_in_place(&mut data);
        assert_eq!(data, obfuscate(b"admin"));
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_involution(data in prop::collection::vec(any::<u8>(), 0..512)) {
                prop_assert_eq!(obfuscate(&obfuscate(&data)), data);
            }
        }
    }
}
