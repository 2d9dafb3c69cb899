//! Cross-crate property suites for the wire invariants.

use hotline_files::{FileStore, ResumeData};
use hotline_protocol::obfuscate::obfuscate;
use hotline_protocol::transaction::{Field, Transaction, TransactionScanner};
use hotline_protocol::FilePath;
use proptest::prelude::*;

fn arb_transaction() -> impl Strategy<Value = Transaction> {
    (
        any::<u16>(),
        1u32..,
        prop::collection::vec(
            (any::<u16>(), prop::collection::vec(any::<u8>(), 0..128)),
            0..8,
        ),
    )
        .prop_map(|(type_code, id, fields)| Transaction {
            flags: 0,
            is_reply: 0,
            type_code,
            id,
            error_code: 0,
            fields: fields
                .into_iter()
                .map(|(id, data)| Field::new(id, data))
                .collect(),
        })
}

proptest! {
    // Every encoded transaction decodes to a structurally equal value.
    #[test]
    fn prop_transaction_roundtrip(tx in arb_transaction()) {
        prop_assert_eq!(Transaction::parse(&tx.encode()).unwrap(), tx);
    }

    // A byte stream of transactions reconstructs the original sequence
    // regardless of how the reads split it, with no bytes left over.
    #[test]
    fn prop_scan_reassembles_any_chunking(
        txs in prop::collection::vec(arb_transaction(), 1..6),
        chunk in 1usize..97
    ) {
        let mut stream = Vec::new();
        for tx in &txs {
            stream.extend_from_slice(&tx.encode());
        }

        let mut scanner = TransactionScanner::new();
        let mut decoded = Vec::new();
        for piece in stream.chunks(chunk) {
            scanner.extend(piece);
            while let Some(tx) = scanner.next().unwrap() {
                decoded.push(tx);
            }
        }

        prop_assert_eq!(decoded, txs);
        prop_assert_eq!(scanner.buffered(), 0);
    }

    // The credential transform is an involution.
    #[test]
    fn prop_obfuscation_involution(data in prop::collection::vec(any::<u8>(), 0..256)) {
        prop_assert_eq!(obfuscate(&obfuscate(&data)), data);
    }

    // Every client-supplied path resolves inside the file root.
    #[test]
    fn prop_resolved_paths_contained(
        parts in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..24), 0..6),
        name in prop::collection::vec(any::<u8>(), 0..24)
    ) {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path()).unwrap();
        let path = FilePath { components: parts };
        if let Ok(resolved) = store.resolve(&path, Some(&name)) {
            prop_assert!(resolved.starts_with(store.root()));
        }
    }

    // Resume blobs round-trip their fork offsets.
    #[test]
    fn prop_resume_blob_roundtrip(data_off in any::<u32>(), rsrc in proptest::option::of(any::<u32>())) {
        let blob = ResumeData::at_offsets(data_off, rsrc);
        let parsed = ResumeData::parse(&blob.encode()).unwrap();
        prop_assert_eq!(parsed.data_offset(), data_off);
        prop_assert_eq!(parsed.rsrc_offset(), rsrc.unwrap_or(0));
    }

    // Path item lists round-trip arbitrary byte-run components.
    #[test]
    fn prop_filepath_roundtrip(
        parts in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..48), 0..6)
    ) {
        let path = FilePath { components: parts };
        prop_assert_eq!(FilePath::parse(&path.encode()).unwrap(), path);
    }
}
