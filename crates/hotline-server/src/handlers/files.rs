//! File-area handlers: listings, metadata, and the control-port half of
//! every transfer (the ticket grant; the streaming happens in
//! [`crate::xfer`]).

use super::{int_field, required_field};
use crate::error::HandlerError;
use crate::server::Server;
use crate::session::Session;
use crate::tickets::TransferKind;
use hotline_protocol::access::Access;
use hotline_protocol::transaction::{Field, Transaction};
use hotline_protocol::types::fields;
use hotline_protocol::FilePath;
use hotline_files::store::is_drop_box;
use hotline_files::{EntryKind, FileEntry, ResumeData};
use std::path::Path;
use std::sync::Arc;

/// Parse the request's `FilePath` field (absent means the root)
fn request_path(tx: &Transaction) -> Result<FilePath, HandlerError> {
    match tx.field(fields::FILE_PATH) {
        Some(f) => Ok(FilePath::parse(&f.data)?),
        None => Ok(FilePath::root()),
    }
}

/// The request's `FileName` field
fn request_name(tx: &Transaction) -> Result<Vec<u8>, HandlerError> {
    Ok(required_field(tx, fields::FILE_NAME, "file name")?.data.clone())
}

/// Deny paths that pass through a drop box unless the session may view
/// them
fn gate_drop_boxes(session: &Session, path: &FilePath) -> Result<(), HandlerError> {
    if session.has_access(Access::ViewDropBoxes) {
        return Ok(());
    }
    if path.components.iter().any(|c| is_drop_box(c)) {
        return Err(HandlerError::Denied(
            "You are not allowed to view drop boxes.".to_string(),
        ));
    }
    Ok(())
}

/// Whether uploads may land in this folder without the upload-anywhere
/// capability: drop boxes and upload folders only
fn is_upload_location(path: &FilePath) -> bool {
    path.components.last().is_some_and(|c| {
        is_drop_box(c) || String::from_utf8_lossy(c).to_lowercase().contains("upload")
    })
}

/// Upload name rules shared by files and folders
fn gate_upload_name(name: &[u8]) -> Result<(), HandlerError> {
    if name.is_empty() || name.starts_with(b".") {
        return Err(HandlerError::BadRequest(
            "You cannot upload files whose names begin with a period.".to_string(),
        ));
    }
    Ok(())
}

/// `FileNameWithInfo` (field 200):
/// `Type[4] Creator[4] FileSize[4] Reserved[4] NameScript[2] NameLen[2] Name`
fn file_name_with_info(entry: &FileEntry) -> Field {
    let size = match entry.kind {
        EntryKind::Folder => u64::from(entry.item_count),
        _ => entry.size,
    };
    let mut data = Vec::with_capacity(20 + entry.name.len());
    data.extend_from_slice(&entry.type_code);
    data.extend_from_slice(&entry.creator_code);
    data.extend_from_slice(&(size.min(u64::from(u32::MAX)) as u32).to_be_bytes());
    data.extend_from_slice(&[0u8; 4]);
    data.extend_from_slice(&[0u8; 2]);
    data.extend_from_slice(&(entry.name.len() as u16).to_be_bytes());
    data.extend_from_slice(&entry.name);
    Field::new(fields::FILE_NAME_WITH_INFO, data)
}

/// `GetFileNameList` (200)
pub fn get_file_name_list(
    server: &Server,
    session: &Arc<Session>,
    tx: &Transaction,
) -> Result<Vec<Transaction>, HandlerError> {
    let path = request_path(tx)?;
    gate_drop_boxes(session, &path)?;
    let dir = server.files.resolve(&path, None)?;
    let entries = server.files.list_dir(&dir)?;

    Ok(vec![Transaction::reply_to(
        tx,
        entries.iter().map(file_name_with_info).collect(),
    )])
}

/// `DownloadFile` (202): grant a download ticket
pub fn download_file(
    server: &Server,
    session: &Arc<Session>,
    tx: &Transaction,
) -> Result<Vec<Transaction>, HandlerError> {
    let path = request_path(tx)?;
    gate_drop_boxes(session, &path)?;
    let name = request_name(tx)?;
    let data_path = server.files.resolve(&path, Some(&name))?;

    if !data_path.is_file() {
        return Err(HandlerError::NotFound(format!(
            "Cannot find the file \"{}\".",
            String::from_utf8_lossy(&name)
        )));
    }

    let resume = match tx.field(fields::FILE_RESUME_DATA) {
        Some(f) => Some(ResumeData::parse(&f.data)?),
        None => None,
    };

    let transfer_size = crate::xfer::download_wire_size(&server.files, &data_path, resume.as_ref())
        .map_err(HandlerError::from)?;
    let file_size = server.files.data_size(&data_path);

    let reference = server.tickets.register(
        TransferKind::Download {
            path: data_path,
            resume,
        },
        session.id,
    );

    Ok(vec![Transaction::reply_to(
        tx,
        vec![
            Field::u32(fields::REF_NUM, reference),
            Field::u32(fields::TRANSFER_SIZE, transfer_size.min(u64::from(u32::MAX)) as u32),
            Field::u32(fields::FILE_SIZE, file_size.min(u64::from(u32::MAX)) as u32),
            Field::u16(fields::WAITING_COUNT, 0),
        ],
    )])
}

/// `UploadFile` (203): grant an upload ticket; a waiting `.incomplete`
/// comes back as resume data
pub fn upload_file(
    server: &Server,
    session: &Arc<Session>,
    tx: &Transaction,
) -> Result<Vec<Transaction>, HandlerError> {
    let path = request_path(tx)?;
    let name = request_name(tx)?;
    gate_upload_name(&name)?;

    if !session.has_access(Access::UploadAnywhere) && !is_upload_location(&path) {
        return Err(HandlerError::Denied(
            "You are not allowed to upload here.".to_string(),
        ));
    }

    let dir = server.files.resolve(&path, None)?;
    if !dir.is_dir() {
        return Err(HandlerError::NotFound("Cannot find that folder.".to_string()));
    }
    let data_path = server.files.resolve(&path, Some(&name))?;
    if data_path.exists() {
        return Err(HandlerError::AlreadyExists(format!(
            "There is already a file named \"{}\".",
            String::from_utf8_lossy(&name)
        )));
    }

    let mut reply_fields = Vec::new();
    let incomplete = server.files.incomplete_path(&data_path);
    if incomplete.is_file() {
        let offset = std::fs::metadata(&incomplete)
            .map(|m| m.len())
            .unwrap_or(0)
            .min(u64::from(u32::MAX)) as u32;
        reply_fields.push(Field::new(
            fields::FILE_RESUME_DATA,
            ResumeData::at_offsets(offset, None).encode(),
        ));
    }

    let reference = server
        .tickets
        .register(TransferKind::Upload { path: data_path }, session.id);
    reply_fields.insert(0, Field::u32(fields::REF_NUM, reference));

    Ok(vec![Transaction::reply_to(tx, reply_fields)])
}

/// `DeleteFile` (204); folders need the folder capability
pub fn delete_file(
    server: &Server,
    session: &Arc<Session>,
    tx: &Transaction,
) -> Result<Vec<Transaction>, HandlerError> {
    let path = request_path(tx)?;
    let name = request_name(tx)?;
    let data_path = server.files.resolve(&path, Some(&name))?;

    let required = if data_path.is_dir() {
        (Access::DeleteFolder, "You are not allowed to delete folders.")
    } else {
        (Access::DeleteFile, "You are not allowed to delete files.")
    };
    if !session.has_access(required.0) {
        return Err(HandlerError::Denied(required.1.to_string()));
    }

    server.files.delete(&data_path)?;
    tracing::info!(session = session.id, file = %data_path.display(), "deleted");
    Ok(vec![Transaction::reply_to(tx, vec![])])
}

/// `NewFolder` (205)
pub fn new_folder(
    server: &Server,
    session: &Arc<Session>,
    tx: &Transaction,
) -> Result<Vec<Transaction>, HandlerError> {
    let path = request_path(tx)?;
    let name = request_name(tx)?;
    gate_upload_name(&name)?;

    let dir = server.files.resolve(&path, Some(&name))?;
    server.files.make_dir(&dir)?;
    tracing::info!(session = session.id, folder = %dir.display(), "folder created");
    Ok(vec![Transaction::reply_to(tx, vec![])])
}

/// `GetFileInfo` (206)
pub fn get_file_info(
    server: &Server,
    session: &Arc<Session>,
    tx: &Transaction,
) -> Result<Vec<Transaction>, HandlerError> {
    let path = request_path(tx)?;
    gate_drop_boxes(session, &path)?;
    let name = request_name(tx)?;
    let data_path = server.files.resolve(&path, Some(&name))?;

    let fork = server.files.info_fork(&data_path)?;
    let is_dir = data_path.is_dir();

    let type_string: Vec<u8> = if is_dir {
        b"Folder".to_vec()
    } else {
        fork.type_code.to_vec()
    };

    let mut reply_fields = vec![
        Field::new(fields::FILE_NAME, name),
        Field::new(fields::FILE_TYPE_STRING, type_string),
        Field::new(fields::FILE_CREATOR_STRING, fork.creator_code.to_vec()),
        Field::new(fields::FILE_TYPE, fork.type_code.to_vec()),
        Field::new(fields::FILE_CREATE_DATE, fork.create_date.to_bytes().to_vec()),
        Field::new(fields::FILE_MODIFY_DATE, fork.modify_date.to_bytes().to_vec()),
    ];
    if !fork.comment.is_empty() {
        reply_fields.push(Field::new(fields::FILE_COMMENT, fork.comment.clone()));
    }
    if !is_dir {
        let size = server.files.data_size(&data_path);
        reply_fields.push(Field::u32(
            fields::FILE_SIZE,
            size.min(u64::from(u32::MAX)) as u32,
        ));
    }

    Ok(vec![Transaction::reply_to(tx, reply_fields)])
}

/// `SetFileInfo` (207): rename and/or comment update
pub fn set_file_info(
    server: &Server,
    session: &Arc<Session>,
    tx: &Transaction,
) -> Result<Vec<Transaction>, HandlerError> {
    let path = request_path(tx)?;
    let name = request_name(tx)?;
    let mut data_path = server.files.resolve(&path, Some(&name))?;
    let is_dir = data_path.is_dir();

    if let Some(comment) = tx.field(fields::FILE_COMMENT) {
        let required = if is_dir {
            (Access::SetFolderComment, "You are not allowed to set comments for folders.")
        } else {
            (Access::SetFileComment, "You are not allowed to set comments for files.")
        };
        if !session.has_access(required.0) {
            return Err(HandlerError::Denied(required.1.to_string()));
        }
        let mut fork = server.files.info_fork(&data_path)?;
        fork.comment = comment.data.clone();
        server.files.write_info_fork(&data_path, &fork)?;
    }

    if let Some(new_name) = tx.field(fields::FILE_NEW_NAME) {
        let required = if is_dir {
            (Access::RenameFolder, "You are not allowed to rename folders.")
        } else {
            (Access::RenameFile, "You are not allowed to rename files.")
        };
        if !session.has_access(required.0) {
            return Err(HandlerError::Denied(required.1.to_string()));
        }
        data_path = server.files.rename(&data_path, &new_name.data)?;
        // Keep the info fork's name in step with the file.
        if !is_dir {
            if let Some(mut fork) = server.files.read_info_fork(&data_path)? {
                fork.name = new_name.data.clone();
                server.files.write_info_fork(&data_path, &fork)?;
            }
        }
    }

    Ok(vec![Transaction::reply_to(tx, vec![])])
}

/// `MoveFile` (208); folders need the folder capability
pub fn move_file(
    server: &Server,
    session: &Arc<Session>,
    tx: &Transaction,
) -> Result<Vec<Transaction>, HandlerError> {
    let path = request_path(tx)?;
    let name = request_name(tx)?;
    let data_path = server.files.resolve(&path, Some(&name))?;

    let required = if data_path.is_dir() {
        (Access::MoveFolder, "You are not allowed to move folders.")
    } else {
        (Access::MoveFile, "You are not allowed to move files.")
    };
    if !session.has_access(required.0) {
        return Err(HandlerError::Denied(required.1.to_string()));
    }

    let new_path = match tx.field(fields::FILE_NEW_PATH) {
        Some(f) => FilePath::parse(&f.data)?,
        None => FilePath::root(),
    };
    let dest_dir = server.files.resolve(&new_path, None)?;
    server.files.move_into(&data_path, &dest_dir)?;
    Ok(vec![Transaction::reply_to(tx, vec![])])
}

/// `MakeFileAlias` (209): an independent copy of the triad
pub fn make_file_alias(
    server: &Server,
    _session: &Arc<Session>,
    tx: &Transaction,
) -> Result<Vec<Transaction>, HandlerError> {
    let path = request_path(tx)?;
    let name = request_name(tx)?;
    let data_path = server.files.resolve(&path, Some(&name))?;

    let new_path = match tx.field(fields::FILE_NEW_PATH) {
        Some(f) => FilePath::parse(&f.data)?,
        None => FilePath::root(),
    };
    let dest_dir = server.files.resolve(&new_path, None)?;
    server.files.copy_into(&data_path, &dest_dir)?;
    Ok(vec![Transaction::reply_to(tx, vec![])])
}

/// `DownloadFolder` (210): grant a folder-download ticket
pub fn download_folder(
    server: &Server,
    session: &Arc<Session>,
    tx: &Transaction,
) -> Result<Vec<Transaction>, HandlerError> {
    let path = request_path(tx)?;
    gate_drop_boxes(session, &path)?;
    let name = request_name(tx)?;
    let dir = server.files.resolve(&path, Some(&name))?;
    if !dir.is_dir() {
        return Err(HandlerError::NotFound("Cannot find that folder.".to_string()));
    }

    let (items, bytes) = folder_totals(server, &dir)?;
    let reference = server
        .tickets
        .register(TransferKind::FolderDownload { path: dir }, session.id);

    Ok(vec![Transaction::reply_to(
        tx,
        vec![
            Field::u32(fields::REF_NUM, reference),
            Field::u32(fields::TRANSFER_SIZE, bytes.min(u64::from(u32::MAX)) as u32),
            Field::u16(fields::FOLDER_ITEM_COUNT, items.min(u32::from(u16::MAX)) as u16),
            Field::u16(fields::WAITING_COUNT, 0),
        ],
    )])
}

fn folder_totals(server: &Server, dir: &Path) -> Result<(u32, u64), HandlerError> {
    let mut items = 0u32;
    let mut bytes = 0u64;
    for entry in server.files.list_dir(dir)? {
        items += 1;
        let child = dir.join(String::from_utf8_lossy(&entry.name).into_owned());
        match entry.kind {
            EntryKind::Folder => {
                let (sub_items, sub_bytes) = folder_totals(server, &child)?;
                items += sub_items;
                bytes += sub_bytes;
            }
            _ => {
                bytes += crate::xfer::download_wire_size(&server.files, &child, None)
                    .map_err(HandlerError::from)?;
            }
        }
    }
    Ok((items, bytes))
}

/// `UploadFolder` (213): grant a folder-upload ticket
pub fn upload_folder(
    server: &Server,
    session: &Arc<Session>,
    tx: &Transaction,
) -> Result<Vec<Transaction>, HandlerError> {
    let path = request_path(tx)?;
    let name = request_name(tx)?;
    gate_upload_name(&name)?;

    if !session.has_access(Access::UploadAnywhere) && !is_upload_location(&path) {
        return Err(HandlerError::Denied(
            "You are not allowed to upload here.".to_string(),
        ));
    }

    let dest = server.files.resolve(&path, Some(&name))?;
    if !dest.exists() {
        server.files.make_dir(&dest)?;
    }

    let item_count = int_field(tx, fields::FOLDER_ITEM_COUNT).unwrap_or(0) as u16;
    let reference = server.tickets.register(
        TransferKind::FolderUpload {
            path: dest,
            item_count,
        },
        session.id,
    );

    Ok(vec![Transaction::reply_to(
        tx,
        vec![Field::u32(fields::REF_NUM, reference)],
    )])
}

/// `DownloadBanner` (212)
pub fn download_banner(
    server: &Server,
    session: &Arc<Session>,
    tx: &Transaction,
) -> Result<Vec<Transaction>, HandlerError> {
    let banner = server.paths.banner();
    let size = std::fs::metadata(&banner)
        .map(|m| m.len())
        .map_err(|_| HandlerError::NotFound("No banner is configured.".to_string()))?;

    let reference = server
        .tickets
        .register(TransferKind::Banner, session.id);

    Ok(vec![Transaction::reply_to(
        tx,
        vec![
            Field::u32(fields::REF_NUM, reference),
            Field::u32(fields::TRANSFER_SIZE, size.min(u64::from(u32::MAX)) as u32),
        ],
    )])
}
