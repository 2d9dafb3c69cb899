//! Transfer-port drivers.
//!
//! Each accepted connection authenticates with a 16-byte `HTXF` handshake
//! whose reference number consumes exactly one pending ticket, then runs
//! one driver to completion: file download or upload, folder download or
//! upload, or the banner fetch. A failed transfer leaves any `.incomplete`
//! file in place for a later resume; the connection just ends.

use crate::error::ServerError;
use crate::server::Server;
use crate::tickets::TransferKind;
use crate::{HANDSHAKE_TIMEOUT_SECS, NEXT_ACTION_TIMEOUT_SECS};
use hotline_files::flattened::{FlatFileHeader, ForkHeader, FORK_TYPE_DATA, FORK_TYPE_INFO, FORK_TYPE_RSRC};
use hotline_files::info_fork::InformationFork;
use hotline_files::{FileError, FileStore, ResumeData};
use hotline_protocol::filepath::FilePath;
use hotline_protocol::handshake::TransferHandshake;
use hotline_protocol::types::next_action;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeekExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// Accept transfer-port connections until shutdown
pub async fn run_transfer_listener(server: Arc<Server>, listener: TcpListener) {
    loop {
        match listener.accept().await {
            Ok((socket, addr)) => {
                let server = Arc::clone(&server);
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(server, socket).await {
                        tracing::debug!(peer = %addr, error = %e, "transfer ended");
                    }
                });
            }
            Err(e) => {
                tracing::warn!(error = %e, "transfer accept failed");
            }
        }
    }
}

async fn handle_connection(server: Arc<Server>, mut socket: TcpStream) -> Result<(), ServerError> {
    let mut hello = [0u8; TransferHandshake::SIZE];
    let read = tokio::time::timeout(
        Duration::from_secs(HANDSHAKE_TIMEOUT_SECS),
        socket.read_exact(&mut hello),
    )
    .await;
    match read {
        Ok(Ok(_)) => {}
        Ok(Err(e)) => return Err(e.into()),
        Err(_) => return Ok(()),
    }

    let handshake = TransferHandshake::parse(&hello)?;
    let Some(ticket) = server.tickets.consume(handshake.reference) else {
        tracing::warn!(
            reference = handshake.reference,
            "transfer with unknown reference refused"
        );
        return Ok(());
    };

    tracing::info!(
        session = ticket.session_id,
        reference = ticket.reference,
        "transfer started"
    );

    match ticket.kind {
        TransferKind::Download { path, resume } => {
            server.stats.download_started();
            let result = send_file(&server.files, &path, resume.as_ref(), &mut socket).await;
            server.stats.download_finished();
            result?;
        }
        TransferKind::Upload { path } => {
            server.stats.upload_started();
            let result = receive_file(
                &server.files,
                &path,
                &mut socket,
                server.config.preserve_forks,
            )
            .await;
            server.stats.upload_finished();
            result?;
        }
        TransferKind::FolderDownload { path } => {
            server.stats.download_started();
            let result = send_folder(&server.files, &path, &mut socket).await;
            server.stats.download_finished();
            result?;
        }
        TransferKind::FolderUpload { path, item_count } => {
            server.stats.upload_started();
            let result = receive_folder(
                &server.files,
                &path,
                item_count,
                &mut socket,
                server.config.preserve_forks,
            )
            .await;
            server.stats.upload_finished();
            result?;
        }
        TransferKind::Banner => {
            let mut file = tokio::fs::File::open(server.paths.banner()).await?;
            tokio::io::copy(&mut file, &mut socket).await?;
        }
    }

    socket.flush().await?;
    Ok(())
}

/// Bytes a download will put on the wire, for the `TransferSize` reply
/// field.
///
/// A resumed download resends neither the container header, the info
/// fork, nor the data fork header; only the remaining fork bytes (plus a
/// resource fork header when one applies) count.
///
/// # Errors
///
/// Propagates info-fork synthesis failures.
pub fn download_wire_size(
    store: &FileStore,
    path: &Path,
    resume: Option<&ResumeData>,
) -> Result<u64, FileError> {
    let data_len = store.data_size(path);
    let rsrc_len = store.rsrc_size(path);

    match resume {
        None => {
            let info = store.info_fork(path)?;
            let mut total = (FlatFileHeader::SIZE
                + ForkHeader::SIZE
                + info.size()
                + ForkHeader::SIZE) as u64
                + data_len;
            if rsrc_len > 0 {
                total += ForkHeader::SIZE as u64 + rsrc_len;
            }
            Ok(total)
        }
        Some(resume) => {
            let mut total = data_len.saturating_sub(u64::from(resume.data_offset()));
            if rsrc_len > 0 {
                total += ForkHeader::SIZE as u64
                    + rsrc_len.saturating_sub(u64::from(resume.rsrc_offset()));
            }
            Ok(total)
        }
    }
}

/// Stream one file as a flattened file object (or its resumed tail)
async fn send_file<W: AsyncWrite + Unpin>(
    store: &FileStore,
    path: &Path,
    resume: Option<&ResumeData>,
    writer: &mut W,
) -> Result<(), ServerError> {
    let data_len = store.data_size(path);
    let rsrc_path = store.rsrc_sidecar(path);
    let rsrc_len = store.rsrc_size(path);

    match resume {
        None => {
            let info = store.info_fork(path).map_err(file_io)?;
            let info_bytes = info.encode();

            writer
                .write_all(&FlatFileHeader::new(rsrc_len > 0).encode())
                .await?;
            writer
                .write_all(&ForkHeader::new(FORK_TYPE_INFO, info_bytes.len() as u32).encode())
                .await?;
            writer.write_all(&info_bytes).await?;
            writer
                .write_all(&ForkHeader::new(FORK_TYPE_DATA, data_len as u32).encode())
                .await?;
            stream_from(path, 0, writer).await?;

            if rsrc_len > 0 {
                writer
                    .write_all(&ForkHeader::new(FORK_TYPE_RSRC, rsrc_len as u32).encode())
                    .await?;
                stream_from(&rsrc_path, 0, writer).await?;
            }
        }
        Some(resume) => {
            // The client holds the headers from the first attempt; it gets
            // raw fork bytes from its offsets onward.
            let offset = u64::from(resume.data_offset()).min(data_len);
            stream_from(path, offset, writer).await?;

            if rsrc_len > 0 {
                let rsrc_offset = u64::from(resume.rsrc_offset()).min(rsrc_len);
                writer
                    .write_all(
                        &ForkHeader::new(FORK_TYPE_RSRC, (rsrc_len - rsrc_offset) as u32).encode(),
                    )
                    .await?;
                stream_from(&rsrc_path, rsrc_offset, writer).await?;
            }
        }
    }
    Ok(())
}

/// Copy exactly `size` bytes; anything less is a truncated transfer
async fn copy_exact<R: AsyncRead + Unpin, W: AsyncWrite + Unpin>(
    reader: &mut R,
    writer: &mut W,
    size: u64,
) -> Result<(), ServerError> {
    let mut remaining = size;
    let mut buf = vec![0u8; 32 * 1024];
    while remaining > 0 {
        let want = remaining.min(buf.len() as u64) as usize;
        let n = reader.read(&mut buf[..want]).await?;
        if n == 0 {
            return Err(truncated());
        }
        writer.write_all(&buf[..n]).await?;
        remaining -= n as u64;
    }
    Ok(())
}

async fn stream_from<W: AsyncWrite + Unpin>(
    path: &Path,
    offset: u64,
    writer: &mut W,
) -> Result<(), ServerError> {
    let mut file = tokio::fs::File::open(path).await?;
    if offset > 0 {
        file.seek(SeekFrom::Start(offset)).await?;
    }
    tokio::io::copy(&mut file, writer).await?;
    Ok(())
}

/// Receive one flattened file object into `NAME.incomplete`, renaming to
/// the final name on success.
///
/// An interrupted transfer keeps the partial file for resume. If the
/// client never delivered the container header, a partial file this call
/// created is removed again.
async fn receive_file<R: AsyncRead + Unpin>(
    store: &FileStore,
    path: &Path,
    reader: &mut R,
    preserve_forks: bool,
) -> Result<(), ServerError> {
    let incomplete = store.incomplete_path(path);
    let fresh = !incomplete.exists();

    let mut header_bytes = [0u8; FlatFileHeader::SIZE];
    if let Err(e) = reader.read_exact(&mut header_bytes).await {
        if fresh {
            let _ = tokio::fs::remove_file(&incomplete).await;
        }
        return Err(e.into());
    }
    let header = FlatFileHeader::parse(&header_bytes).map_err(file_io)?;

    let mut out = tokio::fs::OpenOptions::new()
        .append(true)
        .create(true)
        .open(&incomplete)
        .await?;

    for _ in 0..header.fork_count {
        let mut fork_bytes = [0u8; ForkHeader::SIZE];
        reader.read_exact(&mut fork_bytes).await?;
        let fork = ForkHeader::parse(&fork_bytes).map_err(file_io)?;
        let size = u64::from(fork.data_size);

        match fork.fork_type {
            t if t == FORK_TYPE_INFO => {
                let mut info = vec![0u8; fork.data_size as usize];
                reader.read_exact(&mut info).await?;
                if preserve_forks {
                    let fork = InformationFork::parse(&info).map_err(file_io)?;
                    store.write_info_fork(path, &fork).map_err(file_io)?;
                }
            }
            t if t == FORK_TYPE_DATA => {
                copy_exact(reader, &mut out, size).await?;
            }
            t if t == FORK_TYPE_RSRC => {
                let mut rsrc = tokio::fs::OpenOptions::new()
                    .append(true)
                    .create(true)
                    .open(store.rsrc_sidecar(path))
                    .await?;
                copy_exact(reader, &mut rsrc, size).await?;
            }
            other => {
                tracing::warn!(fork = ?other, "unknown fork skipped");
                copy_exact(reader, &mut tokio::io::sink(), size).await?;
            }
        }
    }

    out.flush().await?;
    drop(out);
    store.complete_upload(path).map_err(file_io)?;
    tracing::info!(file = %path.display(), "upload complete");
    Ok(())
}

// ---- folder download ----------------------------------------------------

/// Per-entry header in a folder download:
/// `Size[2] Type[2] PathData` where `Size` counts the type word plus the
/// encoded path, and `Type` is 0 for a file and 1 for a directory.
fn folder_entry_header(rel: &FilePath, is_dir: bool) -> Vec<u8> {
    let path_bytes = rel.encode();
    let mut out = Vec::with_capacity(4 + path_bytes.len());
    out.extend_from_slice(&((2 + path_bytes.len()) as u16).to_be_bytes());
    out.extend_from_slice(&u16::from(is_dir).to_be_bytes());
    out.extend_from_slice(&path_bytes);
    out
}

async fn read_next_action<R: AsyncRead + Unpin>(reader: &mut R) -> Result<u16, ServerError> {
    let mut action = [0u8; 2];
    tokio::time::timeout(
        Duration::from_secs(NEXT_ACTION_TIMEOUT_SECS),
        reader.read_exact(&mut action),
    )
    .await
    .map_err(|_| {
        ServerError::Io(std::io::Error::new(
            std::io::ErrorKind::TimedOut,
            "next-action timeout",
        ))
    })??;
    Ok(u16::from_be_bytes(action))
}

/// Walk a folder in lexical order, announcing each entry and acting on
/// the client's next-action answer
async fn send_folder(
    store: &FileStore,
    root: &Path,
    socket: &mut TcpStream,
) -> Result<(), ServerError> {
    let mut pending: Vec<(PathBuf, FilePath)> = vec![(root.to_path_buf(), FilePath::root())];

    while let Some((dir, rel)) = pending.pop() {
        // Children are pushed in reverse so the pop order stays lexical.
        let mut children = Vec::new();
        for entry in store.list_dir(&dir).map_err(file_io)? {
            let mut child_rel = rel.clone();
            child_rel.push(entry.name.clone());
            let child_path = dir.join(String::from_utf8_lossy(&entry.name).into_owned());
            let is_dir = matches!(entry.kind, hotline_files::EntryKind::Folder);
            children.push((child_path, child_rel, is_dir));
        }

        let mut descend = Vec::new();
        for (child_path, child_rel, is_dir) in children {
            socket
                .write_all(&folder_entry_header(&child_rel, is_dir))
                .await?;
            socket.flush().await?;

            let action = read_next_action(socket).await?;
            if is_dir {
                // A skip prunes the whole subtree; anything else descends.
                if action != next_action::NEXT_FILE {
                    descend.push((child_path, child_rel));
                }
            } else {
                match action {
                    next_action::NEXT_FILE => {}
                    next_action::SEND_FILE => {
                        send_file(store, &child_path, None, socket).await?;
                    }
                    next_action::RESUME_FILE => {
                        let mut len = [0u8; 2];
                        socket.read_exact(&mut len).await?;
                        let mut blob = vec![0u8; u16::from_be_bytes(len) as usize];
                        socket.read_exact(&mut blob).await?;
                        let resume = ResumeData::parse(&blob).map_err(file_io)?;
                        send_file(store, &child_path, Some(&resume), socket).await?;
                    }
                    other => {
                        tracing::warn!(action = other, "unknown next-action, aborting");
                        return Ok(());
                    }
                }
            }
        }

        for entry in descend.into_iter().rev() {
            pending.push(entry);
        }
    }
    Ok(())
}

// ---- folder upload ------------------------------------------------------

/// One item announcement in a folder upload:
/// `DataSize[2] IsFolder[2] PathItemCount[2] PathItems`, where `DataSize`
/// counts everything after itself and the path items carry no count
/// prefix of their own.
fn parse_folder_upload_item(data: &[u8]) -> Result<(bool, FilePath), ServerError> {
    if data.len() < 4 {
        return Err(truncated());
    }
    let is_folder = u16::from_be_bytes([data[0], data[1]]) != 0;
    let count = u16::from_be_bytes([data[2], data[3]]);

    let mut components = Vec::with_capacity(count as usize);
    let mut off = 4usize;
    for _ in 0..count {
        if data.len() < off + 3 {
            return Err(truncated());
        }
        let len = data[off + 2] as usize;
        off += 3;
        if data.len() < off + len {
            return Err(truncated());
        }
        components.push(data[off..off + len].to_vec());
        off += len;
    }

    Ok((is_folder, FilePath { components }))
}

/// Resolve an upload item's relative path under the destination folder,
/// rejecting separators and stripping dot segments like the file store
/// proper
fn resolve_relative(store: &FileStore, dest: &Path, rel: &FilePath) -> Result<PathBuf, ServerError> {
    let mut out = dest.to_path_buf();
    for component in &rel.components {
        if component.contains(&b'/') || component.contains(&b'\\') || component.contains(&0) {
            return Err(ServerError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "invalid path component",
            )));
        }
        let text = String::from_utf8_lossy(component).into_owned();
        if text.is_empty() || text == "." || text == ".." || text.starts_with('.') {
            continue;
        }
        out.push(text);
    }
    if !out.starts_with(store.root()) {
        return Err(ServerError::Io(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "path escapes file root",
        )));
    }
    Ok(out)
}

async fn send_action(socket: &mut TcpStream, action: u16) -> Result<(), ServerError> {
    socket.write_all(&action.to_be_bytes()).await?;
    socket.flush().await?;
    Ok(())
}

/// Receive a declared number of folder items, directing the client file
/// by file: skip what exists, resume what is partial, transfer the rest
async fn receive_folder(
    store: &FileStore,
    dest: &Path,
    item_count: u16,
    socket: &mut TcpStream,
    preserve_forks: bool,
) -> Result<(), ServerError> {
    send_action(socket, next_action::NEXT_FILE).await?;

    for _ in 0..item_count {
        let mut size = [0u8; 2];
        tokio::time::timeout(
            Duration::from_secs(NEXT_ACTION_TIMEOUT_SECS),
            socket.read_exact(&mut size),
        )
        .await
        .map_err(|_| {
            ServerError::Io(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "folder item timeout",
            ))
        })??;

        let mut item = vec![0u8; u16::from_be_bytes(size) as usize];
        socket.read_exact(&mut item).await?;
        let (is_folder, rel) = parse_folder_upload_item(&item)?;
        let target = resolve_relative(store, dest, &rel)?;

        if is_folder {
            tokio::fs::create_dir_all(&target).await?;
            send_action(socket, next_action::NEXT_FILE).await?;
            continue;
        }

        if target.exists() {
            send_action(socket, next_action::NEXT_FILE).await?;
            continue;
        }

        let incomplete = store.incomplete_path(&target);
        if incomplete.exists() {
            let offset = tokio::fs::metadata(&incomplete)
                .await
                .map(|m| m.len())
                .unwrap_or(0)
                .min(u64::from(u32::MAX)) as u32;
            let blob = ResumeData::at_offsets(offset, None).encode();
            send_action(socket, next_action::RESUME_FILE).await?;
            socket
                .write_all(&(blob.len() as u16).to_be_bytes())
                .await?;
            socket.write_all(&blob).await?;
            socket.flush().await?;
        } else {
            send_action(socket, next_action::SEND_FILE).await?;
        }

        // The client leads each file with its total flattened size.
        let mut declared = [0u8; 4];
        socket.read_exact(&mut declared).await?;
        receive_file(store, &target, socket, preserve_forks).await?;
        send_action(socket, next_action::NEXT_FILE).await?;
    }
    Ok(())
}

fn file_io(e: FileError) -> ServerError {
    match e {
        FileError::Io(io) => ServerError::Io(io),
        other => ServerError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            other.to_string(),
        )),
    }
}

fn truncated() -> ServerError {
    ServerError::Io(std::io::Error::new(
        std::io::ErrorKind::UnexpectedEof,
        "transfer truncated",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn store() -> (tempfile::TempDir, FileStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path()).unwrap();
        (dir, store)
    }

    #[test]
    fn test_download_wire_size_fresh() {
        let (_dir, store) = store();
        let path = store.root().join("file.bin");
        fs::write(&path, vec![0u8; 1000]).unwrap();

        let info_len = store.info_fork(&path).unwrap().size() as u64;
        let total = download_wire_size(&store, &path, None).unwrap();
        assert_eq!(total, 24 + 16 + info_len + 16 + 1000);

        // A resource fork adds its header and bytes.
        fs::write(store.rsrc_sidecar(&path), vec![0u8; 100]).unwrap();
        let total = download_wire_size(&store, &path, None).unwrap();
        assert_eq!(total, 24 + 16 + info_len + 16 + 1000 + 16 + 100);
    }

    #[test]
    fn test_download_wire_size_resumed_resends_no_data_header() {
        let (_dir, store) = store();
        let path = store.root().join("file.bin");
        fs::write(&path, vec![0u8; 2048]).unwrap();

        let resume = ResumeData::at_offsets(1024, None);
        let total = download_wire_size(&store, &path, Some(&resume)).unwrap();
        // Only the remaining data bytes; offset plus remainder covers the
        // whole fork.
        assert_eq!(total, 1024);
        assert_eq!(total + 1024, 2048);
    }

    #[tokio::test]
    async fn test_file_roundtrip_through_flattened_stream() {
        let (_src_dir, src) = store();
        let (_dst_dir, dst) = store();

        let src_path = src.root().join("demo.sit");
        fs::write(&src_path, b"data fork bytes").unwrap();
        fs::write(src.rsrc_sidecar(&src_path), b"resource!").unwrap();
        let mut fork = src.info_fork(&src_path).unwrap();
        fork.comment = b"kept comment".to_vec();
        src.write_info_fork(&src_path, &fork).unwrap();

        let dst_path = dst.root().join("demo.sit");

        let (mut client, mut server_end) = tokio::io::duplex(64 * 1024);
        let send = send_file(&src, &src_path, None, &mut client);
        let recv = receive_file(&dst, &dst_path, &mut server_end, true);
        let (sent, received) = tokio::join!(send, recv);
        sent.unwrap();
        received.unwrap();

        assert_eq!(fs::read(&dst_path).unwrap(), b"data fork bytes");
        assert_eq!(fs::read(dst.rsrc_sidecar(&dst_path)).unwrap(), b"resource!");
        let fork = dst.read_info_fork(&dst_path).unwrap().unwrap();
        assert_eq!(fork.comment, b"kept comment");
        assert!(!dst.incomplete_path(&dst_path).exists());
    }

    #[tokio::test]
    async fn test_resumed_download_streams_from_offset() {
        let (_dir, store) = store();
        let path = store.root().join("big");
        fs::write(&path, (0u16..512).map(|v| v as u8).collect::<Vec<u8>>()).unwrap();

        let resume = ResumeData::at_offsets(100, None);
        let mut out = Vec::new();
        send_file(&store, &path, Some(&resume), &mut out).await.unwrap();

        let expected: Vec<u8> = (0u16..512).map(|v| v as u8).collect();
        assert_eq!(out, expected[100..]);
    }

    #[tokio::test]
    async fn test_resumed_upload_appends() {
        let (_dir, store) = store();
        let path = store.root().join("file.bin");
        fs::write(store.incomplete_path(&path), b"first half ").unwrap();

        // A resuming client sends a flattened object whose data fork holds
        // only the remainder.
        let info = InformationFork::synthesized(b"file.bin", Default::default(), Default::default());
        let info_bytes = info.encode();
        let mut stream = Vec::new();
        stream.extend_from_slice(&FlatFileHeader::new(false).encode());
        stream.extend_from_slice(&ForkHeader::new(FORK_TYPE_INFO, info_bytes.len() as u32).encode());
        stream.extend_from_slice(&info_bytes);
        stream.extend_from_slice(&ForkHeader::new(FORK_TYPE_DATA, 11).encode());
        stream.extend_from_slice(b"second half");

        let mut reader = stream.as_slice();
        receive_file(&store, &path, &mut reader, false).await.unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"first half second half");
    }

    #[tokio::test]
    async fn test_truncated_upload_keeps_incomplete() {
        let (_dir, store) = store();
        let path = store.root().join("file.bin");

        let mut stream = Vec::new();
        stream.extend_from_slice(&FlatFileHeader::new(false).encode());
        stream.extend_from_slice(&ForkHeader::new(FORK_TYPE_INFO, 0).encode());
        stream.extend_from_slice(&ForkHeader::new(FORK_TYPE_DATA, 1000).encode());
        stream.extend_from_slice(b"only a little");

        let mut reader = stream.as_slice();
        assert!(receive_file(&store, &path, &mut reader, false).await.is_err());
        assert!(store.incomplete_path(&path).exists());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_upload_that_never_started_is_cleaned_up() {
        let (_dir, store) = store();
        let path = store.root().join("file.bin");

        let mut reader: &[u8] = &[];
        assert!(receive_file(&store, &path, &mut reader, false).await.is_err());
        assert!(!store.incomplete_path(&path).exists());
    }

    #[test]
    fn test_folder_upload_item_roundtrip() {
        let rel = FilePath::from_components(&["sub", "file.txt"]);
        let path_bytes = rel.encode();
        // Item data: isFolder + count + items (count carried separately).
        let mut data = Vec::new();
        data.extend_from_slice(&0u16.to_be_bytes());
        data.extend_from_slice(&path_bytes);

        let (is_folder, parsed) = parse_folder_upload_item(&data).unwrap();
        assert!(!is_folder);
        assert_eq!(parsed, rel);
    }

    #[test]
    fn test_folder_entry_header_layout() {
        let rel = FilePath::from_components(&["a"]);
        let header = folder_entry_header(&rel, true);
        let size = u16::from_be_bytes([header[0], header[1]]) as usize;
        assert_eq!(size, header.len() - 2);
        assert_eq!(u16::from_be_bytes([header[2], header[3]]), 1);
    }

    #[test]
    fn test_resolve_relative_stays_in_dest() {
        let (_dir, store) = store();
        let dest = store.root().join("dropbox");
        fs::create_dir(&dest).unwrap();

        let rel = FilePath::from_components(&["..", "sub", "x"]);
        let resolved = resolve_relative(&store, &dest, &rel).unwrap();
        assert_eq!(resolved, dest.join("sub/x"));

        let bad = FilePath::from_components(&["a/b"]);
        assert!(resolve_relative(&store, &dest, &bad).is_err());
    }
}
