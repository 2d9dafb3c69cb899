//! A throwaway server instance plus a minimal protocol client, enough to
//! exercise both ports end to end.

use hotline_protocol::handshake::{ClientHandshake, HandshakeReply, TransferHandshake};
use hotline_protocol::obfuscate::obfuscate;
use hotline_protocol::transaction::{Field, Transaction, TransactionScanner};
use hotline_protocol::types::{fields, TransactionType};
use hotline_server::{Config, ConfigPaths, Server};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// A running server on ephemeral ports, rooted in a temp directory
pub struct TestServer {
    /// Control-port address
    pub addr: SocketAddr,
    /// Transfer-port address
    pub xfer_addr: SocketAddr,
    /// The shared core, for poking registries directly
    pub server: Arc<Server>,
    /// Keeps the config/files directories alive
    pub dir: tempfile::TempDir,
    _task: tokio::task::JoinHandle<()>,
}

impl TestServer {
    /// Files-root path
    pub fn files_root(&self) -> PathBuf {
        self.dir.path().join("Files")
    }
}

/// Boot a server with seeded accounts and no agreement text
pub async fn spawn_server() -> TestServer {
    let dir = tempfile::tempdir().unwrap();
    let paths = ConfigPaths::new(dir.path());
    let config = Config::default();
    std::fs::create_dir_all(paths.files_root(&config)).unwrap();

    let server = Server::new(config, paths).unwrap();
    server.accounts.seed_defaults().unwrap();

    let control = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let transfer = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = control.local_addr().unwrap();
    let xfer_addr = transfer.local_addr().unwrap();

    let run_server = Arc::clone(&server);
    let task = tokio::spawn(async move {
        let _ = run_server.run_with_listeners(control, transfer).await;
    });

    TestServer {
        addr,
        xfer_addr,
        server,
        dir,
        _task: task,
    }
}

/// A control-port client: handshake done, transactions in and out
pub struct Client {
    stream: TcpStream,
    scanner: TransactionScanner,
}

impl Client {
    /// Connect and run the 12-byte handshake, asserting the literal reply
    pub async fn connect(addr: SocketAddr) -> Self {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(&ClientHandshake::current().encode())
            .await
            .unwrap();

        let mut reply = [0u8; HandshakeReply::SIZE];
        stream.read_exact(&mut reply).await.unwrap();
        assert_eq!(reply, [0x54, 0x52, 0x54, 0x50, 0, 0, 0, 0]);

        Self {
            stream,
            scanner: TransactionScanner::new(),
        }
    }

    /// Send one transaction
    pub async fn send(&mut self, tx: &Transaction) {
        self.stream.write_all(&tx.encode()).await.unwrap();
    }

    /// Read the next transaction, whatever it is
    pub async fn next(&mut self) -> Transaction {
        loop {
            if let Some(tx) = self.scanner.next().unwrap() {
                return tx;
            }
            let mut buf = [0u8; 4096];
            let n = self.stream.read(&mut buf).await.unwrap();
            assert!(n > 0, "connection closed while waiting for a transaction");
            self.scanner.extend(&buf[..n]);
        }
    }

    /// Read until the reply to `request_id` arrives, skipping unrelated
    /// traffic (notifies, agreements)
    pub async fn reply_for(&mut self, request_id: u32) -> Transaction {
        loop {
            let tx = self.next().await;
            if tx.is_reply == 1 && tx.id == request_id {
                return tx;
            }
        }
    }

    /// Read transactions until one of the given type arrives
    pub async fn next_of_type(&mut self, ty: TransactionType) -> Transaction {
        loop {
            let tx = self.next().await;
            if tx.type_code == ty.code() {
                return tx;
            }
        }
    }

    /// Log in and agree, returning the login reply
    pub async fn login(&mut self, login: &str, password: &str, name: &str) -> Transaction {
        let login_tx = Transaction::new(
            TransactionType::Login.code(),
            vec![
                Field::new(fields::USER_LOGIN, obfuscate(login.as_bytes())),
                Field::new(fields::USER_PASSWORD, obfuscate(password.as_bytes())),
                Field::new(fields::USER_NAME, name.as_bytes().to_vec()),
                Field::u16(fields::USER_ICON_ID, 0x0007),
            ],
        );
        let id = login_tx.id;
        self.send(&login_tx).await;
        let reply = self.reply_for(id).await;
        assert_eq!(reply.error_code, 0, "login failed");

        let agreed = Transaction::new(
            TransactionType::Agreed.code(),
            vec![
                Field::new(fields::USER_NAME, name.as_bytes().to_vec()),
                Field::u16(fields::USER_ICON_ID, 0x0007),
                Field::u16(fields::OPTIONS, 0),
            ],
        );
        let agreed_id = agreed.id;
        self.send(&agreed).await;
        self.reply_for(agreed_id).await;
        reply
    }
}

/// The three forks of a downloaded flattened file object
#[derive(Debug, Default, PartialEq, Eq)]
pub struct DownloadedFile {
    /// Raw information-fork record bytes
    pub info: Vec<u8>,
    /// Data fork
    pub data: Vec<u8>,
    /// Resource fork, empty when absent
    pub rsrc: Vec<u8>,
}

/// Open a transfer connection for `reference` and read a whole flattened
/// file object
pub async fn download(xfer_addr: SocketAddr, reference: u32) -> DownloadedFile {
    let mut stream = TcpStream::connect(xfer_addr).await.unwrap();
    stream
        .write_all(
            &TransferHandshake {
                reference,
                data_size: 0,
            }
            .encode(),
        )
        .await
        .unwrap();

    let mut header = [0u8; 24];
    stream.read_exact(&mut header).await.unwrap();
    assert_eq!(&header[0..4], b"FILP");
    let fork_count = u16::from_be_bytes([header[22], header[23]]);

    let mut out = DownloadedFile::default();
    for _ in 0..fork_count {
        let mut fork_header = [0u8; 16];
        stream.read_exact(&mut fork_header).await.unwrap();
        let size = u32::from_be_bytes([
            fork_header[12],
            fork_header[13],
            fork_header[14],
            fork_header[15],
        ]) as usize;
        let mut payload = vec![0u8; size];
        stream.read_exact(&mut payload).await.unwrap();

        match &fork_header[0..4] {
            b"INFO" => out.info = payload,
            b"DATA" => out.data = payload,
            b"MACR" => out.rsrc = payload,
            other => panic!("unexpected fork {other:?}"),
        }
    }
    out
}

/// Open a transfer connection for `reference` and push a flattened file
/// object with the given forks
pub async fn upload(
    xfer_addr: SocketAddr,
    reference: u32,
    info: &[u8],
    data: &[u8],
    rsrc: Option<&[u8]>,
) {
    let mut stream = TcpStream::connect(xfer_addr).await.unwrap();

    let mut payload = Vec::new();
    payload.extend_from_slice(
        &hotline_files::flattened::FlatFileHeader::new(rsrc.is_some()).encode(),
    );
    payload.extend_from_slice(
        &hotline_files::flattened::ForkHeader::new(*b"INFO", info.len() as u32).encode(),
    );
    payload.extend_from_slice(info);
    payload.extend_from_slice(
        &hotline_files::flattened::ForkHeader::new(*b"DATA", data.len() as u32).encode(),
    );
    payload.extend_from_slice(data);
    if let Some(rsrc) = rsrc {
        payload.extend_from_slice(
            &hotline_files::flattened::ForkHeader::new(*b"MACR", rsrc.len() as u32).encode(),
        );
        payload.extend_from_slice(rsrc);
    }

    stream
        .write_all(
            &TransferHandshake {
                reference,
                data_size: payload.len() as u32,
            }
            .encode(),
        )
        .await
        .unwrap();
    stream.write_all(&payload).await.unwrap();
    stream.flush().await.unwrap();

    // Wait for the server to finish and close before returning, so the
    // rename has happened.
    let mut sink = [0u8; 16];
    let _ = stream.read(&mut sink).await;
}
