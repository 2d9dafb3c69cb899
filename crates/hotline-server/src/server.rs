//! Shared server state and the two accept loops.
//!
//! The `Server` owns every registry: sessions, private chat rooms,
//! transfer tickets, accounts, the news store and the sandboxed file
//! store. Handlers reach all of it through an `Arc<Server>`.
//!
//! Broadcast discipline: recipients are snapshotted out of the session
//! registry first, then sends happen queue-by-queue with no registry lock
//! held. A session whose bounded queue overflows is closed instead of
//! slowing the others down.

use crate::accounts::AccountStore;
use crate::chat::ChatRegistry;
use crate::config::{Config, ConfigPaths};
use crate::dispatch;
use crate::error::ServerError;
use crate::session::{Session, SessionState};
use crate::stats::Stats;
use crate::tickets::TicketRegistry;
use crate::{HANDSHAKE_TIMEOUT_SECS, KEEPALIVE_IDLE_SECS};
use dashmap::DashMap;
use hotline_files::FileStore;
use hotline_news::NewsStore;
use hotline_protocol::handshake::{ClientHandshake, HandshakeReply};
use hotline_protocol::transaction::{Field, Transaction, TransactionScanner};
use hotline_protocol::types::{fields, TransactionType};
use std::sync::Arc;
use std::sync::atomic::{AtomicU16, Ordering};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

/// The shared server core
pub struct Server {
    /// Loaded configuration
    pub config: Config,
    /// Config-directory layout
    pub paths: ConfigPaths,
    /// Sandboxed file tree
    pub files: FileStore,
    /// Threaded news store
    pub news: NewsStore,
    /// Account registry
    pub accounts: AccountStore,
    /// Private chat rooms
    pub chats: ChatRegistry,
    /// Pending transfer tickets
    pub tickets: TicketRegistry,
    /// Process counters
    pub stats: Stats,
    sessions: DashMap<u16, Arc<Session>>,
    next_user_id: AtomicU16,
}

impl Server {
    /// Assemble a server from a validated config and its directory.
    ///
    /// Opens the file store, news snapshot and account registry; creates
    /// the files root when missing.
    ///
    /// # Errors
    ///
    /// Any store that fails to open is fatal.
    pub fn new(config: Config, paths: ConfigPaths) -> Result<Arc<Self>, ServerError> {
        let files_root = paths.files_root(&config);
        std::fs::create_dir_all(&files_root)?;
        let files = FileStore::new(&files_root)
            .map_err(|e| ServerError::Config(format!("files root: {e}")))?;

        let news = NewsStore::open(paths.news())
            .map_err(|e| ServerError::Config(format!("news snapshot: {e}")))?;

        let accounts = AccountStore::open(paths.users_dir())?;

        Ok(Arc::new(Self {
            config,
            paths,
            files,
            news,
            accounts,
            chats: ChatRegistry::new(),
            tickets: TicketRegistry::new(),
            stats: Stats::new(),
            sessions: DashMap::new(),
            next_user_id: AtomicU16::new(1),
        }))
    }

    // ---- session registry ----------------------------------------------

    /// Register a new session for an accepted connection
    #[must_use]
    pub fn register_session(
        &self,
        remote_addr: std::net::SocketAddr,
    ) -> (Arc<Session>, mpsc::Receiver<Transaction>) {
        let id = self.allocate_user_id();
        let (session, rx) = Session::new(id, remote_addr);
        self.sessions.insert(id, Arc::clone(&session));
        self.stats.session_connected();
        tracing::info!(session = id, peer = %remote_addr, "session registered");
        (session, rx)
    }

    fn allocate_user_id(&self) -> u16 {
        loop {
            let id = self.next_user_id.fetch_add(1, Ordering::Relaxed);
            if id != 0 && !self.sessions.contains_key(&id) {
                return id;
            }
        }
    }

    /// Look up a session by user id
    #[must_use]
    pub fn session(&self, id: u16) -> Option<Arc<Session>> {
        self.sessions.get(&id).map(|e| Arc::clone(e.value()))
    }

    /// Snapshot of every registered session
    #[must_use]
    pub fn sessions_snapshot(&self) -> Vec<Arc<Session>> {
        self.sessions.iter().map(|e| Arc::clone(e.value())).collect()
    }

    /// Agreed sessions, ordered by user id (the user-list order)
    #[must_use]
    pub fn agreed_sessions(&self) -> Vec<Arc<Session>> {
        let mut out: Vec<Arc<Session>> = self
            .sessions
            .iter()
            .filter(|e| e.value().is_agreed())
            .map(|e| Arc::clone(e.value()))
            .collect();
        out.sort_by_key(|s| s.id);
        out
    }

    // ---- fan-out --------------------------------------------------------

    /// Send to one session; queue overflow closes it
    pub fn send_to(&self, user_id: u16, tx: Transaction) {
        if let Some(session) = self.session(user_id) {
            if session.send(tx).is_err() {
                tracing::warn!(session = user_id, "outbound queue overflow, closing");
                self.drop_session(&session);
            }
        }
    }

    /// Send to every session the predicate selects.
    ///
    /// Recipients are snapshotted before any send, so no registry lock is
    /// held across queue operations.
    pub fn broadcast(&self, tx: &Transaction, pred: impl Fn(&Session) -> bool) {
        for session in self.sessions_snapshot() {
            if pred(&session) && session.send(tx.clone()).is_err() {
                tracing::warn!(session = session.id, "outbound queue overflow, closing");
                self.drop_session(&session);
            }
        }
    }

    /// Send to every agreed session
    pub fn broadcast_agreed(&self, tx: &Transaction) {
        self.broadcast(tx, Session::is_agreed);
    }

    /// Send to the joined members of a private room
    pub fn broadcast_room(&self, chat_id: u32, tx: &Transaction) {
        let members = self.chats.members(chat_id);
        for user_id in members {
            self.send_to(user_id, tx.clone());
        }
    }

    // ---- teardown -------------------------------------------------------

    /// Tear a session down: rooms, tickets, user list, registry, stats.
    ///
    /// Idempotent; the reader task also lands here on its way out.
    pub fn drop_session(&self, session: &Arc<Session>) {
        if self.sessions.remove(&session.id).is_none() {
            return; // already torn down
        }

        let was_agreed = session.is_agreed();
        session.request_close();
        let _ = session.transition_to(SessionState::Closed);

        self.tickets.cancel_for_session(session.id);

        for chat_id in self.chats.leave_all(session.id) {
            let notify = Transaction::new(
                TransactionType::NotifyChatDeleteUser.code(),
                vec![
                    Field::u32(fields::CHAT_ID, chat_id),
                    Field::u16(fields::USER_ID, session.id),
                ],
            );
            self.broadcast_room(chat_id, &notify);
        }

        if was_agreed {
            let notify = Transaction::new(
                TransactionType::NotifyDeleteUser.code(),
                vec![Field::u16(fields::USER_ID, session.id)],
            );
            self.broadcast_agreed(&notify);
        }

        self.stats.session_disconnected();
        tracing::info!(session = session.id, "session closed");
    }

    // ---- config-directory documents -------------------------------------

    /// The agreement text, when one is configured
    #[must_use]
    pub fn agreement_text(&self) -> Option<Vec<u8>> {
        match std::fs::read(self.paths.agreement()) {
            Ok(bytes) if !bytes.is_empty() => Some(bytes),
            _ => None,
        }
    }

    /// Current message board contents
    #[must_use]
    pub fn message_board(&self) -> Vec<u8> {
        std::fs::read(self.paths.message_board()).unwrap_or_default()
    }

    /// Prepend a post to the message board, write-then-rename
    ///
    /// # Errors
    ///
    /// Propagates write failures.
    pub fn post_message_board(&self, poster: &[u8], text: &[u8]) -> Result<(), ServerError> {
        let stamp = chrono::Local::now().format("%b %e %Y, %l:%M %p");
        let mut board = Vec::new();
        board.extend_from_slice(format!("From {} ({stamp}):\r\r", String::from_utf8_lossy(poster)).as_bytes());
        board.extend_from_slice(text);
        board.extend_from_slice(b"\r\r_________________________________\r\r");
        board.extend_from_slice(&self.message_board());

        let path = self.paths.message_board();
        let tmp = path.with_extension("txt.tmp");
        std::fs::write(&tmp, &board)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    // ---- listeners ------------------------------------------------------

    /// Bind both listeners and serve until the process is stopped.
    ///
    /// # Errors
    ///
    /// Bind failures are fatal; per-connection failures are not.
    pub async fn run(self: Arc<Self>) -> Result<(), ServerError> {
        let control = TcpListener::bind(self.config.parse_listen()?).await?;
        let transfer = TcpListener::bind(self.config.parse_transfer_listen()?).await?;
        self.run_with_listeners(control, transfer).await
    }

    /// Serve on listeners the caller already bound (tests bind on port 0)
    ///
    /// # Errors
    ///
    /// As for [`Server::run`].
    pub async fn run_with_listeners(
        self: Arc<Self>,
        control: TcpListener,
        transfer: TcpListener,
    ) -> Result<(), ServerError> {
        tracing::info!(
            control = %control.local_addr()?,
            transfer = %transfer.local_addr()?,
            "listening"
        );

        let transfer_server = Arc::clone(&self);
        tokio::spawn(async move {
            crate::xfer::run_transfer_listener(transfer_server, transfer).await;
        });

        if !self.config.trackers.is_empty() {
            let tracker_server = Arc::clone(&self);
            tokio::spawn(async move {
                crate::tracker::run_announcer(tracker_server).await;
            });
        }

        let sweep_server = Arc::clone(&self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(30));
            loop {
                interval.tick().await;
                sweep_server.tickets.purge_expired();
            }
        });

        loop {
            let (socket, addr) = control.accept().await?;
            let server = Arc::clone(&self);
            tokio::spawn(async move {
                if let Err(e) = server.clone().handle_control_connection(socket).await {
                    tracing::debug!(peer = %addr, error = %e, "control connection ended");
                }
            });
        }
    }

    /// Drive one control-port connection from handshake to teardown
    async fn handle_control_connection(
        self: Arc<Self>,
        mut socket: TcpStream,
    ) -> Result<(), ServerError> {
        let peer = socket.peer_addr()?;

        // Handshake, under its own deadline.
        let mut hello = [0u8; ClientHandshake::SIZE];
        let read = tokio::time::timeout(
            Duration::from_secs(HANDSHAKE_TIMEOUT_SECS),
            socket.read_exact(&mut hello),
        )
        .await;
        match read {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => {
                tracing::debug!(peer = %peer, "handshake timeout");
                return Ok(());
            }
        }

        if let Err(e) = ClientHandshake::parse(&hello) {
            tracing::debug!(peer = %peer, error = %e, "handshake rejected");
            let _ = socket.write_all(&HandshakeReply { error: 1 }.encode()).await;
            return Ok(());
        }
        socket.write_all(&HandshakeReply::ok().encode()).await?;

        let (session, mut outbound_rx) = self.register_session(peer);
        session.transition_to(SessionState::Handshaken)?;

        let (mut read_half, mut write_half) = socket.into_split();

        // Writer task: the only place bytes leave this session, which
        // preserves per-session ordering.
        let writer_session_id = session.id;
        let mut writer = tokio::spawn(async move {
            while let Some(tx) = outbound_rx.recv().await {
                if write_half.write_all(&tx.encode()).await.is_err() {
                    break;
                }
            }
            let _ = write_half.shutdown().await;
            tracing::debug!(session = writer_session_id, "writer task done");
        });

        // Reader loop: scan transactions, dispatch, emit keepalives when
        // idle.
        let mut scanner = TransactionScanner::new();
        let mut buf = vec![0u8; 4096];
        let result: Result<(), ServerError> = loop {
            if session.close_pending() {
                break Ok(());
            }

            let read = tokio::select! {
                // A kick from another task must not wait out a blocked read.
                () = session.wait_close() => break Ok(()),
                read = tokio::time::timeout(
                    Duration::from_secs(KEEPALIVE_IDLE_SECS),
                    read_half.read(&mut buf),
                ) => read,
            };

            let n = match read {
                Ok(Ok(0)) => break Ok(()),
                Ok(Ok(n)) => n,
                Ok(Err(e)) => break Err(e.into()),
                Err(_) => {
                    let keepalive =
                        Transaction::new(TransactionType::KeepAlive.code(), vec![]);
                    if session.send(keepalive).is_err() {
                        break Ok(());
                    }
                    continue;
                }
            };

            scanner.extend(&buf[..n]);
            loop {
                match scanner.next() {
                    Ok(Some(tx)) => {
                        self.process_transaction(&session, tx).await;
                        if session.close_pending() {
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        tracing::warn!(session = session.id, error = %e, "framing error");
                        session.request_close();
                        break;
                    }
                }
            }
        };

        self.drop_session(&session);

        // Dropping the last Arc closes the outbound channel; the writer
        // drains what is queued (error replies, the disconnect notice) and
        // exits. The timeout covers a peer that has stopped reading.
        drop(session);
        if tokio::time::timeout(Duration::from_secs(5), &mut writer)
            .await
            .is_err()
        {
            writer.abort();
        }
        result
    }

    /// Route one inbound transaction: reply correlation, then dispatch
    async fn process_transaction(&self, session: &Arc<Session>, mut tx: Transaction) {
        if tx.is_reply == 1 {
            match session.resolve_reply(tx.id) {
                Some(original_type) => {
                    tx.type_code = original_type;
                    dispatch::handle_reply(self, session, &tx);
                }
                None => {
                    tracing::warn!(
                        session = session.id,
                        id = tx.id,
                        "unmatched reply dropped"
                    );
                }
            }
            return;
        }

        let outcome = dispatch::handle(self, session, &tx).await;
        for reply in outcome.replies {
            if session.send(reply).is_err() {
                self.drop_session(session);
                return;
            }
        }
        if outcome.close {
            session.request_close();
        }
    }
}
