//! Transfer tickets.
//!
//! A control-port handler that grants a transfer registers a ticket here
//! and hands the client its 4-byte reference number. The transfer-port
//! accept path consumes the ticket atomically: one connection per
//! reference, ever. Tickets expire unconsumed after 60 seconds.

use crate::TICKET_TTL_SECS;
use dashmap::DashMap;
use hotline_files::ResumeData;
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// What a consumed ticket authorizes
#[derive(Debug, Clone)]
pub enum TransferKind {
    /// Single-file download; `resume` skips already-held bytes
    Download {
        /// Resolved data-file path
        path: PathBuf,
        /// Restart offsets from the client, if resuming
        resume: Option<ResumeData>,
    },
    /// Single-file upload into `NAME.incomplete`
    Upload {
        /// Resolved final data-file path
        path: PathBuf,
    },
    /// Recursive folder download
    FolderDownload {
        /// Resolved folder path
        path: PathBuf,
    },
    /// Recursive folder upload
    FolderUpload {
        /// Resolved destination folder path
        path: PathBuf,
        /// Item count the client declared
        item_count: u16,
    },
    /// Server banner fetch
    Banner,
}

/// One pending transfer authorization
#[derive(Debug, Clone)]
pub struct Ticket {
    /// The one-shot reference number
    pub reference: u32,
    /// What the ticket authorizes
    pub kind: TransferKind,
    /// Session that requested the transfer
    pub session_id: u16,
    created: Instant,
}

impl Ticket {
    fn expired(&self, ttl: Duration) -> bool {
        self.created.elapsed() > ttl
    }
}

/// The pending-transfer table
#[derive(Debug, Default)]
pub struct TicketRegistry {
    tickets: DashMap<u32, Ticket>,
}

impl TicketRegistry {
    /// Empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a transfer and return its fresh reference number.
    ///
    /// References are 4 random bytes from the system CSPRNG, nonzero and
    /// unique among pending tickets.
    pub fn register(&self, kind: TransferKind, session_id: u16) -> u32 {
        loop {
            let mut bytes = [0u8; 4];
            getrandom::getrandom(&mut bytes).expect("CSPRNG failure");
            let reference = u32::from_be_bytes(bytes);
            if reference == 0 {
                continue;
            }

            // Entry-based insert keeps generation and reservation atomic.
            let entry = self.tickets.entry(reference);
            match entry {
                dashmap::mapref::entry::Entry::Occupied(_) => continue,
                dashmap::mapref::entry::Entry::Vacant(v) => {
                    v.insert(Ticket {
                        reference,
                        kind,
                        session_id,
                        created: Instant::now(),
                    });
                    return reference;
                }
            }
        }
    }

    /// Consume a ticket: the single permitted use of a reference.
    ///
    /// Returns `None` for unknown, expired or already-consumed references.
    #[must_use]
    pub fn consume(&self, reference: u32) -> Option<Ticket> {
        let (_, ticket) = self.tickets.remove(&reference)?;
        if ticket.expired(Duration::from_secs(TICKET_TTL_SECS)) {
            tracing::debug!(reference, "ticket expired");
            return None;
        }
        Some(ticket)
    }

    /// Drop every pending ticket for a session (disconnect teardown)
    pub fn cancel_for_session(&self, session_id: u16) {
        self.tickets.retain(|_, t| t.session_id != session_id);
    }

    /// Drop expired tickets; called from a periodic sweep
    pub fn purge_expired(&self) {
        let ttl = Duration::from_secs(TICKET_TTL_SECS);
        self.tickets.retain(|_, t| !t.expired(ttl));
    }

    /// Pending ticket count
    #[must_use]
    pub fn len(&self) -> usize {
        self.tickets.len()
    }

    /// True when no tickets are pending
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tickets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn download_kind() -> TransferKind {
        TransferKind::Download {
            path: PathBuf::from("/tmp/x"),
            resume: None,
        }
    }

    #[test]
    fn test_reference_is_single_use() {
        let registry = TicketRegistry::new();
        let reference = registry.register(download_kind(), 1);
        assert_ne!(reference, 0);

        assert!(registry.consume(reference).is_some());
        assert!(registry.consume(reference).is_none());
    }

    #[test]
    fn test_unknown_reference_rejected() {
        let registry = TicketRegistry::new();
        assert!(registry.consume(0xDEAD_BEEF).is_none());
    }

    #[test]
    fn test_references_are_distinct() {
        let registry = TicketRegistry::new();
        let a = registry.register(download_kind(), 1);
        let b = registry.register(download_kind(), 1);
        assert_ne!(a, b);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_cancel_for_session() {
        let registry = TicketRegistry::new();
        let a = registry.register(download_kind(), 1);
        let b = registry.register(download_kind(), 2);

        registry.cancel_for_session(1);
        assert!(registry.consume(a).is_none());
        assert!(registry.consume(b).is_some());
    }
}
