//! Per-connection session state.
//!
//! A session is the authenticated state of one control-port connection.
//! The connection's reader task drives the state machine:
//!
//! ```text
//! New -> Handshaken -> LoggedIn -> Agreed -> Closed
//! ```
//!
//! Only agreed sessions appear in the user list and receive chat. Every
//! outbound transaction goes through a bounded queue drained by the
//! connection's writer task; a full queue closes the session rather than
//! stalling a broadcast.

use crate::OUTBOUND_QUEUE_DEPTH;
use crate::accounts::Account;
use crate::error::ServerError;
use hotline_protocol::access::{Access, AccessBitmap};
use hotline_protocol::transaction::Transaction;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, RwLock};
use tokio::sync::mpsc;

/// User status flag bits (field 112)
pub mod user_flags {
    /// User is idle
    pub const AWAY: u16 = 1 << 0;
    /// User is an admin (disconnect capability)
    pub const ADMIN: u16 = 1 << 1;
    /// User refuses private messages
    pub const REFUSE_PM: u16 = 1 << 2;
    /// User refuses private chat invites
    pub const REFUSE_CHAT: u16 = 1 << 3;
}

/// Option bits clients send in `SetClientUserInfo` / `Agreed` (field 113)
pub mod user_options {
    /// Refuse private messages
    pub const REFUSE_PM: u16 = 1 << 0;
    /// Refuse private chat invites
    pub const REFUSE_CHAT: u16 = 1 << 1;
    /// An automatic reply text is supplied
    pub const AUTO_RESPONSE: u16 = 1 << 2;
}

/// Lifecycle of a control-port connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Socket accepted, handshake pending
    New,
    /// Handshake done, login pending
    Handshaken,
    /// Login accepted, agreement pending
    LoggedIn,
    /// Fully active: in the user list, receives chat
    Agreed,
    /// Torn down
    Closed,
}

impl SessionState {
    /// Whether `next` is a legal successor state
    #[must_use]
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::{Agreed, Closed, Handshaken, LoggedIn, New};
        matches!(
            (self, next),
            (New, Handshaken)
                | (Handshaken, LoggedIn)
                | (LoggedIn, Agreed)
                | (New | Handshaken | LoggedIn | Agreed, Closed)
        )
    }
}

/// Mutable per-user presentation state
#[derive(Debug, Clone, Default)]
pub struct SessionInfo {
    /// Display name
    pub name: Vec<u8>,
    /// Icon id
    pub icon_id: u16,
    /// Status flag bits
    pub flags: u16,
    /// Automatic reply to private messages, empty when unset
    pub auto_reply: Vec<u8>,
}

/// One control-port session
pub struct Session {
    /// Unique user id among active sessions
    pub id: u16,
    /// Peer address, for client info text and logs
    pub remote_addr: SocketAddr,
    state: RwLock<SessionState>,
    info: RwLock<SessionInfo>,
    account: RwLock<Option<Account>>,
    access: RwLock<AccessBitmap>,
    outbound: mpsc::Sender<Transaction>,
    pending_requests: Mutex<HashMap<u32, u16>>,
    close_requested: AtomicBool,
    close_notify: tokio::sync::Notify,
}

impl Session {
    /// Create a session and the receiver its writer task drains
    #[must_use]
    pub fn new(id: u16, remote_addr: SocketAddr) -> (std::sync::Arc<Self>, mpsc::Receiver<Transaction>) {
        let (tx, rx) = mpsc::channel(OUTBOUND_QUEUE_DEPTH);
        let session = std::sync::Arc::new(Self {
            id,
            remote_addr,
            state: RwLock::new(SessionState::New),
            info: RwLock::new(SessionInfo::default()),
            account: RwLock::new(None),
            access: RwLock::new(AccessBitmap::new()),
            outbound: tx,
            pending_requests: Mutex::new(HashMap::new()),
            close_requested: AtomicBool::new(false),
            close_notify: tokio::sync::Notify::new(),
        });
        (session, rx)
    }

    /// Current lifecycle state
    #[must_use]
    pub fn state(&self) -> SessionState {
        *self.state.read().expect("session state lock")
    }

    /// Advance the state machine; an illegal transition is refused
    ///
    /// # Errors
    ///
    /// `ServerError::UnknownSession` is never returned here; an illegal
    /// transition yields a protocol-shaped error for the caller to log.
    pub fn transition_to(&self, next: SessionState) -> Result<(), ServerError> {
        let mut state = self.state.write().expect("session state lock");
        if !state.can_transition_to(next) {
            return Err(ServerError::Config(format!(
                "illegal session transition {:?} -> {next:?}",
                *state
            )));
        }
        tracing::debug!(session = self.id, from = ?*state, to = ?next, "session transition");
        *state = next;
        Ok(())
    }

    /// True once the session is in the user list
    #[must_use]
    pub fn is_agreed(&self) -> bool {
        self.state() == SessionState::Agreed
    }

    /// Queue a transaction for the writer task.
    ///
    /// Requests (not replies) are remembered for reply correlation.
    ///
    /// # Errors
    ///
    /// `Backpressure` when the bounded queue is full; the caller closes
    /// the session.
    pub fn send(&self, tx: Transaction) -> Result<(), ServerError> {
        if tx.is_reply == 0 {
            let mut pending = self.pending_requests.lock().expect("pending lock");
            // Notifications never get answered, so the table would grow
            // with every broadcast; correlation is best-effort past this
            // bound.
            if pending.len() >= 256 {
                pending.clear();
            }
            pending.insert(tx.id, tx.type_code);
        }
        match self.outbound.try_send(tx) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => Err(ServerError::Backpressure(self.id)),
            // Writer already gone; the reader will notice shortly.
            Err(mpsc::error::TrySendError::Closed(_)) => Ok(()),
        }
    }

    /// Resolve an inbound reply to the type of the request it answers.
    ///
    /// Returns `None` for replies nothing is waiting on; those are logged
    /// and dropped by the caller.
    #[must_use]
    pub fn resolve_reply(&self, request_id: u32) -> Option<u16> {
        self.pending_requests
            .lock()
            .expect("pending lock")
            .remove(&request_id)
    }

    /// Copy of the presentation state
    #[must_use]
    pub fn info(&self) -> SessionInfo {
        self.info.read().expect("session info lock").clone()
    }

    /// Mutate the presentation state
    pub fn update_info(&self, f: impl FnOnce(&mut SessionInfo)) {
        f(&mut self.info.write().expect("session info lock"));
    }

    /// The logged-in account, if past login
    #[must_use]
    pub fn account(&self) -> Option<Account> {
        self.account.read().expect("session account lock").clone()
    }

    /// Install the account and its effective access at login
    pub fn set_account(&self, account: Account, access: AccessBitmap) {
        *self.account.write().expect("session account lock") = Some(account);
        *self.access.write().expect("session access lock") = access;
    }

    /// Effective access bitmap
    #[must_use]
    pub fn access(&self) -> AccessBitmap {
        *self.access.read().expect("session access lock")
    }

    /// Check one capability
    #[must_use]
    pub fn has_access(&self, bit: Access) -> bool {
        self.access().contains(bit)
    }

    /// Ask the reader loop to wind the session down
    pub fn request_close(&self) {
        self.close_requested.store(true, Ordering::Release);
        self.close_notify.notify_waiters();
    }

    /// Whether a close has been requested
    #[must_use]
    pub fn close_pending(&self) -> bool {
        self.close_requested.load(Ordering::Acquire)
    }

    /// Resolve once a close is requested; lets the reader loop wake from
    /// a blocked read when another task kicks this session
    pub async fn wait_close(&self) {
        let notified = self.close_notify.notified();
        if self.close_pending() {
            return;
        }
        notified.await;
    }

    /// Display name, or the placeholder for sessions that never set one
    #[must_use]
    pub fn display_name(&self) -> Vec<u8> {
        let info = self.info();
        if info.name.is_empty() {
            b"unnamed".to_vec()
        } else {
            info.name
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hotline_protocol::types::TransactionType;

    fn session() -> (std::sync::Arc<Session>, mpsc::Receiver<Transaction>) {
        Session::new(1, "127.0.0.1:12345".parse().unwrap())
    }

    #[test]
    fn test_state_machine_happy_path() {
        let (s, _rx) = session();
        assert_eq!(s.state(), SessionState::New);
        s.transition_to(SessionState::Handshaken).unwrap();
        s.transition_to(SessionState::LoggedIn).unwrap();
        s.transition_to(SessionState::Agreed).unwrap();
        assert!(s.is_agreed());
        s.transition_to(SessionState::Closed).unwrap();
    }

    #[test]
    fn test_illegal_transitions_refused() {
        let (s, _rx) = session();
        assert!(s.transition_to(SessionState::LoggedIn).is_err());
        assert!(s.transition_to(SessionState::Agreed).is_err());

        s.transition_to(SessionState::Handshaken).unwrap();
        s.transition_to(SessionState::Closed).unwrap();
        assert!(s.transition_to(SessionState::Handshaken).is_err());
    }

    #[test]
    fn test_send_queues_and_backpressure_closes() {
        let (s, mut rx) = session();
        let tx = Transaction::new(TransactionType::ChatMsg.code(), vec![]);
        s.send(tx.clone()).unwrap();
        assert_eq!(rx.try_recv().unwrap().type_code, tx.type_code);

        // Fill the queue without draining.
        let mut overflowed = false;
        for _ in 0..=OUTBOUND_QUEUE_DEPTH {
            if matches!(s.send(tx.clone()), Err(ServerError::Backpressure(_))) {
                overflowed = true;
                break;
            }
        }
        assert!(overflowed);
    }

    #[test]
    fn test_reply_correlation() {
        let (s, _rx) = session();
        let request = Transaction::new(TransactionType::GetUserNameList.code(), vec![]);
        let id = request.id;
        s.send(request).unwrap();

        assert_eq!(
            s.resolve_reply(id),
            Some(TransactionType::GetUserNameList.code())
        );
        // Second resolution (or an unmatched id) finds nothing.
        assert_eq!(s.resolve_reply(id), None);
        assert_eq!(s.resolve_reply(0xFFFF_FFFF), None);
    }

    #[test]
    fn test_replies_are_not_tracked() {
        let (s, _rx) = session();
        let request = Transaction::new(TransactionType::ChatSend.code(), vec![]);
        let reply = Transaction::reply_to(&request, vec![]);
        let id = reply.id;
        s.send(reply).unwrap();
        assert_eq!(s.resolve_reply(id), None);
    }

    #[test]
    fn test_display_name_placeholder() {
        let (s, _rx) = session();
        assert_eq!(s.display_name(), b"unnamed");
        s.update_info(|i| i.name = b"alice".to_vec());
        assert_eq!(s.display_name(), b"alice");
    }
}
