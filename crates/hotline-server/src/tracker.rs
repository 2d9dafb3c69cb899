//! Tracker announce task and listing client.
//!
//! Announcing is fire-and-forget UDP on a timer: one registration
//! datagram per configured tracker, carrying the live user count. The
//! listing side is a small TCP client used by tooling to browse a
//! tracker's directory.

use crate::error::ServerError;
use crate::server::Server;
use hotline_protocol::tracker::{ServerRecord, TrackerRegistration, HTRK, TRACKER_VERSION};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, UdpSocket};

/// Announce to every configured tracker until shutdown
pub async fn run_announcer(server: Arc<Server>) {
    // One pass id per process lifetime: trackers use it to tell a restart
    // from a distinct server at the same address.
    let mut pass_id = [0u8; 4];
    getrandom::getrandom(&mut pass_id).expect("CSPRNG failure");

    let port = match server.config.parse_listen() {
        Ok(addr) => addr.port(),
        Err(e) => {
            tracing::error!(error = %e, "announcer disabled");
            return;
        }
    };

    let mut interval =
        tokio::time::interval(Duration::from_secs(server.config.tracker_interval_secs));
    loop {
        interval.tick().await;

        let registration = TrackerRegistration {
            port,
            user_count: server.stats.connected().min(u64::from(u16::MAX)) as u16,
            pass_id,
            name: server.config.name.clone().into_bytes(),
            description: server.config.description.clone().into_bytes(),
        };
        let payload = registration.encode();

        for tracker in &server.config.trackers {
            if let Err(e) = announce(tracker, &payload).await {
                tracing::warn!(%tracker, error = %e, "tracker announce failed");
            } else {
                tracing::debug!(%tracker, "announced");
            }
        }
    }
}

async fn announce(tracker: &str, payload: &[u8]) -> std::io::Result<()> {
    let socket = UdpSocket::bind("0.0.0.0:0").await?;
    socket.send_to(payload, tracker).await?;
    Ok(())
}

/// Fetch a tracker's server directory over TCP.
///
/// The exchange: send `HTRK` + version, read the echoed header, read the
/// listing header with the server count, then variable-length records
/// until the count is satisfied.
///
/// # Errors
///
/// Protocol and socket failures; a truncated listing is an error.
pub async fn fetch_listing(tracker: &str) -> Result<Vec<ServerRecord>, ServerError> {
    let mut socket = TcpStream::connect(tracker).await?;

    let mut hello = [0u8; 6];
    hello[0..4].copy_from_slice(&HTRK);
    hello[4..6].copy_from_slice(&TRACKER_VERSION.to_be_bytes());
    socket.write_all(&hello).await?;

    let mut reply = [0u8; 6];
    socket.read_exact(&mut reply).await?;
    if reply[0..4] != HTRK {
        return Err(ServerError::Protocol(
            hotline_protocol::ProtocolError::BadMagic {
                expected: HTRK,
                actual: [reply[0], reply[1], reply[2], reply[3]],
            },
        ));
    }

    // MsgType[2] DataSize[2] ServerCount[2] ServerCount[2] (sent twice).
    let mut header = [0u8; 8];
    socket.read_exact(&mut header).await?;
    let count = u16::from_be_bytes([header[4], header[5]]) as usize;

    let mut records = Vec::with_capacity(count);
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    while records.len() < count {
        while let Some((record, used)) = ServerRecord::parse_prefix(&buf) {
            buf.drain(..used);
            records.push(record);
            if records.len() == count {
                break;
            }
        }
        if records.len() == count {
            break;
        }

        let n = socket.read(&mut chunk).await?;
        if n == 0 {
            return Err(ServerError::Protocol(
                hotline_protocol::ProtocolError::TooShort {
                    expected: count,
                    actual: records.len(),
                },
            ));
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    Ok(records)
}
