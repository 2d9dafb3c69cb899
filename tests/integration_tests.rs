// Integration tests: real sockets against a real server on both ports.

use hotline_integration_tests::test_helpers::{download, spawn_server, upload, Client};
use hotline_protocol::obfuscate::obfuscate;
use hotline_protocol::transaction::{Field, Transaction};
use hotline_protocol::types::{fields, TransactionType};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

#[tokio::test]
async fn test_handshake_literal_bytes() {
    let ts = spawn_server().await;
    let mut stream = TcpStream::connect(ts.addr).await.unwrap();

    stream
        .write_all(&[
            0x54, 0x52, 0x54, 0x50, 0x48, 0x4F, 0x54, 0x4C, 0x00, 0x01, 0x00, 0x02,
        ])
        .await
        .unwrap();

    let mut reply = [0u8; 8];
    stream.read_exact(&mut reply).await.unwrap();
    assert_eq!(reply, [0x54, 0x52, 0x54, 0x50, 0x00, 0x00, 0x00, 0x00]);
}

#[tokio::test]
async fn test_bad_handshake_closes_connection() {
    let ts = spawn_server().await;
    let mut stream = TcpStream::connect(ts.addr).await.unwrap();

    stream.write_all(b"GET / HTTP/1.1\r\n").await.unwrap();

    // The server answers with a nonzero error (or just closes).
    let mut reply = [0u8; 8];
    match stream.read_exact(&mut reply).await {
        Ok(_) => assert_ne!(&reply[4..8], &[0, 0, 0, 0]),
        Err(_) => {}
    }
}

#[tokio::test]
async fn test_guest_login_reply_carries_access() {
    let ts = spawn_server().await;
    let mut client = Client::connect(ts.addr).await;

    let login_tx = Transaction::new(
        TransactionType::Login.code(),
        vec![
            Field::new(fields::USER_NAME, b"guest user".to_vec()),
            Field::u16(fields::USER_ICON_ID, 0x0007),
            Field::new(fields::USER_LOGIN, obfuscate(b"guest")),
            Field::new(fields::USER_PASSWORD, obfuscate(b"")),
        ],
    );
    let id = login_tx.id;
    client.send(&login_tx).await;

    let reply = client.reply_for(id).await;
    assert_eq!(reply.error_code, 0);
    let access = reply.field(fields::USER_ACCESS).unwrap();
    assert_eq!(access.data.len(), 8);
    assert_ne!(access.data, vec![0u8; 8]);
    assert!(reply.field(fields::SERVER_NAME).is_some());
}

#[tokio::test]
async fn test_wrong_password_rejected() {
    let ts = spawn_server().await;
    let mut client = Client::connect(ts.addr).await;

    let login_tx = Transaction::new(
        TransactionType::Login.code(),
        vec![
            Field::new(fields::USER_LOGIN, obfuscate(b"admin")),
            Field::new(fields::USER_PASSWORD, obfuscate(b"nope")),
        ],
    );
    let id = login_tx.id;
    client.send(&login_tx).await;

    let reply = client.reply_for(id).await;
    assert_eq!(reply.error_code, 1);
    assert!(reply.field(fields::ERROR).is_some());
}

#[tokio::test]
async fn test_public_chat_reaches_both_sides_with_formatting() {
    let ts = spawn_server().await;
    let mut alice = Client::connect(ts.addr).await;
    alice.login("guest", "", "alice").await;
    let mut bob = Client::connect(ts.addr).await;
    bob.login("guest", "", "bob").await;

    alice
        .send(&Transaction::new(
            TransactionType::ChatSend.code(),
            vec![Field::new(fields::DATA, b"hello".to_vec())],
        ))
        .await;

    for client in [&mut alice, &mut bob] {
        let msg = client.next_of_type(TransactionType::ChatMsg).await;
        let data = msg.field(fields::DATA).unwrap();
        assert!(data.data.starts_with(b"\r alice: hello"));
    }
}

#[tokio::test]
async fn test_user_list_shows_agreed_sessions() {
    let ts = spawn_server().await;
    let mut alice = Client::connect(ts.addr).await;
    alice.login("guest", "", "alice").await;

    let list = Transaction::new(TransactionType::GetUserNameList.code(), vec![]);
    let id = list.id;
    alice.send(&list).await;
    let reply = alice.reply_for(id).await;

    let roster: Vec<_> = reply
        .fields
        .iter()
        .filter(|f| f.id == fields::USER_NAME_WITH_INFO)
        .collect();
    assert_eq!(roster.len(), 1);
    // Name sits after id/icon/flags/len, 8 bytes in.
    assert_eq!(&roster[0].data[8..], b"alice");
}

#[tokio::test]
async fn test_download_roundtrips_all_three_forks() {
    let ts = spawn_server().await;
    std::fs::write(ts.files_root().join("demo.sit"), b"data bytes").unwrap();
    std::fs::write(ts.files_root().join(".rsrc_demo.sit"), b"rsrc bytes").unwrap();

    let mut client = Client::connect(ts.addr).await;
    client.login("admin", "admin", "op").await;

    let req = Transaction::new(
        TransactionType::DownloadFile.code(),
        vec![Field::new(fields::FILE_NAME, b"demo.sit".to_vec())],
    );
    let id = req.id;
    client.send(&req).await;
    let reply = client.reply_for(id).await;
    assert_eq!(reply.error_code, 0);

    let reference = reply.field(fields::REF_NUM).unwrap().as_int().unwrap() as u32;
    let transfer_size = reply.field(fields::TRANSFER_SIZE).unwrap().as_int().unwrap();

    let file = download(ts.xfer_addr, reference).await;
    assert_eq!(file.data, b"data bytes");
    assert_eq!(file.rsrc, b"rsrc bytes");
    assert!(!file.info.is_empty());

    // TransferSize counted exactly the bytes that crossed the wire.
    let on_wire = 24 + 16 + file.info.len() + 16 + file.data.len() + 16 + file.rsrc.len();
    assert_eq!(transfer_size as usize, on_wire);
}

#[tokio::test]
async fn test_upload_then_download_is_byte_identical() {
    let ts = spawn_server().await;
    std::fs::create_dir(ts.files_root().join("Uploads")).unwrap();

    let mut client = Client::connect(ts.addr).await;
    client.login("admin", "admin", "op").await;

    let path = hotline_protocol::FilePath::from_components(&["Uploads"]);
    let req = Transaction::new(
        TransactionType::UploadFile.code(),
        vec![
            Field::new(fields::FILE_NAME, b"art.bin".to_vec()),
            Field::new(fields::FILE_PATH, path.encode()),
        ],
    );
    let id = req.id;
    client.send(&req).await;
    let reply = client.reply_for(id).await;
    assert_eq!(reply.error_code, 0);
    let reference = reply.field(fields::REF_NUM).unwrap().as_int().unwrap() as u32;

    let info = hotline_files::InformationFork::synthesized(
        b"art.bin",
        Default::default(),
        Default::default(),
    )
    .encode();
    upload(ts.xfer_addr, reference, &info, b"payload", Some(b"forked")).await;

    // The incomplete file was promoted.
    let final_path = ts.files_root().join("Uploads/art.bin");
    assert_eq!(std::fs::read(&final_path).unwrap(), b"payload");

    // And a download returns the identical forks.
    let req = Transaction::new(
        TransactionType::DownloadFile.code(),
        vec![
            Field::new(fields::FILE_NAME, b"art.bin".to_vec()),
            Field::new(fields::FILE_PATH, path.encode()),
        ],
    );
    let id = req.id;
    client.send(&req).await;
    let reply = client.reply_for(id).await;
    let reference = reply.field(fields::REF_NUM).unwrap().as_int().unwrap() as u32;

    let file = download(ts.xfer_addr, reference).await;
    assert_eq!(file.data, b"payload");
    assert_eq!(file.rsrc, b"forked");
}

#[tokio::test]
async fn test_transfer_reference_is_single_use() {
    let ts = spawn_server().await;
    std::fs::write(ts.files_root().join("once.txt"), b"x").unwrap();

    let mut client = Client::connect(ts.addr).await;
    client.login("admin", "admin", "op").await;

    let req = Transaction::new(
        TransactionType::DownloadFile.code(),
        vec![Field::new(fields::FILE_NAME, b"once.txt".to_vec())],
    );
    let id = req.id;
    client.send(&req).await;
    let reply = client.reply_for(id).await;
    let reference = reply.field(fields::REF_NUM).unwrap().as_int().unwrap() as u32;

    download(ts.xfer_addr, reference).await;

    // Second use: the server closes without a payload.
    let mut stream = TcpStream::connect(ts.xfer_addr).await.unwrap();
    stream
        .write_all(
            &hotline_protocol::TransferHandshake {
                reference,
                data_size: 0,
            }
            .encode(),
        )
        .await
        .unwrap();
    let mut buf = [0u8; 1];
    assert_eq!(stream.read(&mut buf).await.unwrap(), 0);
}

#[tokio::test]
async fn test_access_denied_for_guest_news_post() {
    let ts = spawn_server().await;
    let mut client = Client::connect(ts.addr).await;
    client.login("guest", "", "visitor").await;

    let req = Transaction::new(
        TransactionType::OldPostNews.code(),
        vec![Field::new(fields::DATA, b"spam".to_vec())],
    );
    let id = req.id;
    client.send(&req).await;
    let reply = client.reply_for(id).await;

    assert_eq!(reply.error_code, 1);
    let error = reply.field(fields::ERROR).unwrap();
    assert!(error.as_text().starts_with("You are not allowed"));
}

#[tokio::test]
async fn test_news_threading_over_the_wire() {
    let ts = spawn_server().await;
    ts.server
        .news
        .create_grouping(&[], "general", hotline_news::NodeKind::Category)
        .await
        .unwrap();

    let mut client = Client::connect(ts.addr).await;
    client.login("admin", "admin", "op").await;

    let path = hotline_protocol::FilePath::from_components(&["general"]).encode();
    for (parent, title) in [(0u32, "first"), (1, "reply")] {
        let req = Transaction::new(
            TransactionType::PostNewsArt.code(),
            vec![
                Field::new(fields::NEWS_PATH, path.clone()),
                Field::u32(fields::NEWS_ART_ID, parent),
                Field::new(fields::NEWS_ART_TITLE, title.as_bytes().to_vec()),
                Field::new(fields::NEWS_ART_DATA, b"body".to_vec()),
            ],
        );
        let id = req.id;
        client.send(&req).await;
        assert_eq!(client.reply_for(id).await.error_code, 0);
    }

    let req = Transaction::new(
        TransactionType::GetNewsArtData.code(),
        vec![
            Field::new(fields::NEWS_PATH, path.clone()),
            Field::u32(fields::NEWS_ART_ID, 1),
        ],
    );
    let id = req.id;
    client.send(&req).await;
    let reply = client.reply_for(id).await;

    let first_child = reply
        .field(fields::NEWS_ART_FIRST_CHILD_ART)
        .unwrap()
        .as_int()
        .unwrap();
    assert_eq!(first_child, 2);
}

#[tokio::test]
async fn test_disconnect_updates_user_list() {
    let ts = spawn_server().await;
    let mut alice = Client::connect(ts.addr).await;
    alice.login("guest", "", "alice").await;
    let mut bob = Client::connect(ts.addr).await;
    bob.login("guest", "", "bob").await;

    // Alice sees bob arrive, then drop.
    alice.next_of_type(TransactionType::NotifyChangeUser).await;
    drop(bob);
    let gone = alice.next_of_type(TransactionType::NotifyDeleteUser).await;
    assert!(gone.field(fields::USER_ID).is_some());
}
