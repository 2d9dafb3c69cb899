//! The sandboxed file store.
//!
//! All client-visible files live under one configured root. Every path a
//! client supplies is rebuilt from its components with `.` and `..`
//! segments stripped and separators rejected, then checked against the
//! root prefix; nothing outside the sandbox is ever touched.
//!
//! Beside each data file the store keeps up to two sidecars: `.info_NAME`
//! (the information fork) and `.rsrc_NAME` (the resource fork). Uploads in
//! flight are `NAME.incomplete` and become the data file by rename on
//! completion. Dot-prefixed names are invisible to listings, which hides
//! the sidecars themselves.

use crate::error::FileError;
use crate::info_fork::{self, InformationFork};
use crate::{INCOMPLETE_SUFFIX, INFO_SIDECAR_PREFIX, RSRC_SIDECAR_PREFIX};
use hotline_protocol::{FilePath, HotlineDate};
use std::fs;
use std::path::{Path, PathBuf};

/// What a directory entry is, as reported to clients
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// A complete data file
    File,
    /// A directory
    Folder,
    /// A partial upload awaiting resume
    Incomplete,
}

/// One row of a file listing
#[derive(Debug, Clone)]
pub struct FileEntry {
    /// Entry name as shown to clients (without the `.incomplete` suffix)
    pub name: Vec<u8>,
    /// File, folder or partial upload
    pub kind: EntryKind,
    /// Data-fork size for files; 0 for folders
    pub size: u64,
    /// Four-character type code (`fldr` for folders)
    pub type_code: [u8; 4],
    /// Four-character creator code
    pub creator_code: [u8; 4],
    /// Visible children for folders; 0 for files
    pub item_count: u32,
}

/// The sandboxed file tree
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Open a store rooted at `root`.
    ///
    /// # Errors
    ///
    /// Returns an error when the root does not exist or cannot be
    /// canonicalized.
    pub fn new(root: impl AsRef<Path>) -> Result<Self, FileError> {
        let root = fs::canonicalize(root.as_ref())?;
        Ok(Self { root })
    }

    /// The sandbox root
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a client path (and optional trailing name) inside the
    /// sandbox.
    ///
    /// `.` and `..` segments are stripped before joining. The joined result
    /// must still start with the root; anything else fails with
    /// [`FileError::PathEscape`].
    ///
    /// # Errors
    ///
    /// `InvalidComponent` for separators or NUL inside a component;
    /// `PathEscape` when the result leaves the root.
    pub fn resolve(&self, path: &FilePath, name: Option<&[u8]>) -> Result<PathBuf, FileError> {
        let mut out = self.root.clone();

        for component in path
            .components
            .iter()
            .map(Vec::as_slice)
            .chain(name.into_iter())
        {
            let text = sanitize_component(component)?;
            if text.is_empty() || text == "." || text == ".." {
                continue;
            }
            out.push(text);
        }

        if !out.starts_with(&self.root) {
            return Err(FileError::PathEscape(out));
        }
        Ok(out)
    }

    /// Sibling `.info_NAME` sidecar for a resolved data path
    #[must_use]
    pub fn info_sidecar(&self, data_path: &Path) -> PathBuf {
        sidecar(data_path, INFO_SIDECAR_PREFIX)
    }

    /// Sibling `.rsrc_NAME` sidecar for a resolved data path
    #[must_use]
    pub fn rsrc_sidecar(&self, data_path: &Path) -> PathBuf {
        sidecar(data_path, RSRC_SIDECAR_PREFIX)
    }

    /// `NAME.incomplete` for a resolved data path
    #[must_use]
    pub fn incomplete_path(&self, data_path: &Path) -> PathBuf {
        let mut name = data_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        name.push_str(INCOMPLETE_SUFFIX);
        data_path.with_file_name(name)
    }

    /// List a directory in lexical order, hiding dot-prefixed names.
    ///
    /// # Errors
    ///
    /// Propagates directory read failures.
    pub fn list_dir(&self, dir: &Path) -> Result<Vec<FileEntry>, FileError> {
        let mut names: Vec<String> = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') {
                continue;
            }
            names.push(name);
        }
        names.sort();

        let mut out = Vec::with_capacity(names.len());
        for name in names {
            let path = dir.join(&name);
            let meta = fs::metadata(&path)?;

            if meta.is_dir() {
                out.push(FileEntry {
                    name: name.clone().into_bytes(),
                    kind: EntryKind::Folder,
                    size: 0,
                    type_code: info_fork::FOLDER_TYPE,
                    creator_code: [0; 4],
                    item_count: self.count_visible(&path)?,
                });
            } else if let Some(stem) = name.strip_suffix(INCOMPLETE_SUFFIX) {
                out.push(FileEntry {
                    name: stem.as_bytes().to_vec(),
                    kind: EntryKind::Incomplete,
                    size: meta.len(),
                    type_code: info_fork::INCOMPLETE_TYPE,
                    creator_code: info_fork::INCOMPLETE_CREATOR,
                    item_count: 0,
                });
            } else {
                let (type_code, creator_code) = match self.read_info_fork(&path)? {
                    Some(fork) => (fork.type_code, fork.creator_code),
                    None => info_fork::type_creator_for_name(name.as_bytes()),
                };
                out.push(FileEntry {
                    name: name.into_bytes(),
                    kind: EntryKind::File,
                    size: meta.len(),
                    type_code,
                    creator_code,
                    item_count: 0,
                });
            }
        }
        Ok(out)
    }

    fn count_visible(&self, dir: &Path) -> Result<u32, FileError> {
        let mut count = 0u32;
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            if !entry.file_name().to_string_lossy().starts_with('.') {
                count += 1;
            }
        }
        Ok(count)
    }

    /// Read the info sidecar, if one exists
    ///
    /// # Errors
    ///
    /// Propagates read failures; a malformed sidecar is an error, a missing
    /// one is `Ok(None)`.
    pub fn read_info_fork(&self, data_path: &Path) -> Result<Option<InformationFork>, FileError> {
        let sidecar = self.info_sidecar(data_path);
        match fs::read(&sidecar) {
            Ok(bytes) => Ok(Some(InformationFork::parse(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// The info fork for a path: the sidecar when present, synthesized from
    /// metadata otherwise.
    ///
    /// # Errors
    ///
    /// `NotFound` when the data file itself is missing.
    pub fn info_fork(&self, data_path: &Path) -> Result<InformationFork, FileError> {
        if let Some(fork) = self.read_info_fork(data_path)? {
            return Ok(fork);
        }

        let meta = fs::metadata(data_path)
            .map_err(|_| FileError::NotFound(data_path.to_path_buf()))?;
        let modify = meta
            .modified()
            .map(HotlineDate::from_system_time)
            .unwrap_or_default();
        let create = meta
            .created()
            .map(HotlineDate::from_system_time)
            .unwrap_or(modify);
        let name = data_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned().into_bytes())
            .unwrap_or_default();

        if meta.is_dir() {
            let mut fork = InformationFork::synthesized(&name, create, modify);
            fork.type_code = info_fork::FOLDER_TYPE;
            fork.creator_code = [0; 4];
            Ok(fork)
        } else {
            Ok(InformationFork::synthesized(&name, create, modify))
        }
    }

    /// Persist an info fork to its sidecar
    ///
    /// # Errors
    ///
    /// Propagates write failures.
    pub fn write_info_fork(
        &self,
        data_path: &Path,
        fork: &InformationFork,
    ) -> Result<(), FileError> {
        Ok(fs::write(self.info_sidecar(data_path), fork.encode())?)
    }

    /// Data-fork size; 0 for a missing file
    #[must_use]
    pub fn data_size(&self, data_path: &Path) -> u64 {
        fs::metadata(data_path).map(|m| m.len()).unwrap_or(0)
    }

    /// Resource-fork size; 0 when no sidecar exists
    #[must_use]
    pub fn rsrc_size(&self, data_path: &Path) -> u64 {
        fs::metadata(self.rsrc_sidecar(data_path))
            .map(|m| m.len())
            .unwrap_or(0)
    }

    /// Delete a file's whole triad, or a directory.
    ///
    /// # Errors
    ///
    /// `NotFound` when nothing exists at the path.
    pub fn delete(&self, data_path: &Path) -> Result<(), FileError> {
        let meta =
            fs::metadata(data_path).map_err(|_| FileError::NotFound(data_path.to_path_buf()))?;
        if meta.is_dir() {
            fs::remove_dir_all(data_path)?;
            return Ok(());
        }
        fs::remove_file(data_path)?;
        let _ = fs::remove_file(self.info_sidecar(data_path));
        let _ = fs::remove_file(self.rsrc_sidecar(data_path));
        Ok(())
    }

    /// Move a file's triad (or a directory) into another directory.
    ///
    /// # Errors
    ///
    /// `NotFound` for a missing source, `AlreadyExists` when the target
    /// name is taken.
    pub fn move_into(&self, data_path: &Path, dest_dir: &Path) -> Result<(), FileError> {
        let name = data_path
            .file_name()
            .ok_or_else(|| FileError::NotFound(data_path.to_path_buf()))?;
        let dest = dest_dir.join(name);
        if dest.exists() {
            return Err(FileError::AlreadyExists(dest));
        }
        let meta =
            fs::metadata(data_path).map_err(|_| FileError::NotFound(data_path.to_path_buf()))?;

        fs::rename(data_path, &dest)?;
        if !meta.is_dir() {
            for prefix in [INFO_SIDECAR_PREFIX, RSRC_SIDECAR_PREFIX] {
                let from = sidecar(data_path, prefix);
                if from.exists() {
                    fs::rename(&from, sidecar(&dest, prefix))?;
                }
            }
        }
        Ok(())
    }

    /// Copy a file's triad under a new name in another directory (alias
    /// semantics: an independent copy of all three forks).
    ///
    /// # Errors
    ///
    /// `NotFound` for a missing source, `AlreadyExists` for a taken target.
    pub fn copy_into(&self, data_path: &Path, dest_dir: &Path) -> Result<(), FileError> {
        let name = data_path
            .file_name()
            .ok_or_else(|| FileError::NotFound(data_path.to_path_buf()))?;
        let dest = dest_dir.join(name);
        if dest.exists() {
            return Err(FileError::AlreadyExists(dest));
        }
        if !data_path.is_file() {
            return Err(FileError::NotFound(data_path.to_path_buf()));
        }

        fs::copy(data_path, &dest)?;
        for prefix in [INFO_SIDECAR_PREFIX, RSRC_SIDECAR_PREFIX] {
            let from = sidecar(data_path, prefix);
            if from.exists() {
                fs::copy(&from, sidecar(&dest, prefix))?;
            }
        }
        Ok(())
    }

    /// Rename a file's triad in place.
    ///
    /// # Errors
    ///
    /// `NotFound` / `AlreadyExists` as for [`FileStore::move_into`];
    /// `InvalidComponent` for an unusable new name.
    pub fn rename(&self, data_path: &Path, new_name: &[u8]) -> Result<PathBuf, FileError> {
        let text = sanitize_component(new_name)?;
        if text.is_empty() || text.starts_with('.') {
            return Err(FileError::InvalidComponent);
        }
        let dest = data_path.with_file_name(&text);
        if dest.exists() {
            return Err(FileError::AlreadyExists(dest));
        }
        let meta =
            fs::metadata(data_path).map_err(|_| FileError::NotFound(data_path.to_path_buf()))?;

        fs::rename(data_path, &dest)?;
        if !meta.is_dir() {
            for prefix in [INFO_SIDECAR_PREFIX, RSRC_SIDECAR_PREFIX] {
                let from = sidecar(data_path, prefix);
                if from.exists() {
                    fs::rename(&from, sidecar(&dest, prefix))?;
                }
            }
        }
        Ok(dest)
    }

    /// Create a directory.
    ///
    /// # Errors
    ///
    /// `AlreadyExists` when the name is taken.
    pub fn make_dir(&self, path: &Path) -> Result<(), FileError> {
        if path.exists() {
            return Err(FileError::AlreadyExists(path.to_path_buf()));
        }
        Ok(fs::create_dir_all(path)?)
    }

    /// Promote a finished upload: rename `NAME.incomplete` to `NAME`.
    ///
    /// # Errors
    ///
    /// Propagates the rename failure.
    pub fn complete_upload(&self, data_path: &Path) -> Result<(), FileError> {
        fs::rename(self.incomplete_path(data_path), data_path)?;
        tracing::debug!(path = %data_path.display(), "upload promoted");
        Ok(())
    }
}

/// Whether a folder name marks a drop box (upload-only without the
/// view-drop-boxes capability)
#[must_use]
pub fn is_drop_box(name: &[u8]) -> bool {
    let lower = String::from_utf8_lossy(name).to_lowercase();
    lower.contains("drop box")
}

fn sidecar(data_path: &Path, prefix: &str) -> PathBuf {
    let mut name = String::from(prefix);
    name.push_str(&data_path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default());
    data_path.with_file_name(name)
}

fn sanitize_component(component: &[u8]) -> Result<String, FileError> {
    if component.contains(&0) || component.contains(&b'/') || component.contains(&b'\\') {
        return Err(FileError::InvalidComponent);
    }
    Ok(String::from_utf8_lossy(component).into_owned())
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
    fn test_resolve_stays_in_root() {
        let (_dir, store) = store();
        let path = FilePath::from_components(&["sub", "deeper"]);
        let resolved = store.resolve(&path, Some(b"file.txt")).unwrap();
        assert!(resolved.starts_with(store.root()));
        assert!(resolved.ends_with("sub/deeper/file.txt"));
    }

    #[test]
    fn test_dot_segments_stripped() {
        let (_dir, store) = store();
        let path = FilePath::from_components(&["..", ".", "..", "sub"]);
        let resolved = store.resolve(&path, Some(b"x")).unwrap();
        assert_eq!(resolved, store.root().join("sub/x"));
    }

    #[test]
    fn test_separator_in_component_rejected() {
        let (_dir, store) = store();
        let path = FilePath::from_components(&["a/b"]);
        assert!(matches!(
            store.resolve(&path, None),
            Err(FileError::InvalidComponent)
        ));
        let path = FilePath::from_components(&["a\\b"]);
        assert!(store.resolve(&path, None).is_err());
    }

    #[test]
    fn test_sidecar_names() {
        let (_dir, store) = store();
        let data = store.root().join("demo.sit");
        assert!(store.info_sidecar(&data).ends_with(".info_demo.sit"));
        assert!(store.rsrc_sidecar(&data).ends_with(".rsrc_demo.sit"));
        assert!(store.incomplete_path(&data).ends_with("demo.sit.incomplete"));
    }

    #[test]
    fn test_listing_hides_dotfiles_and_sorts() {
        let (_dir, store) = store();
        fs::write(store.root().join("beta.txt"), b"b").unwrap();
        fs::write(store.root().join("alpha.txt"), b"a").unwrap();
        fs::write(store.root().join(".info_beta.txt"), b"x").unwrap();
        fs::create_dir(store.root().join("stuff")).unwrap();
        fs::write(store.root().join("stuff/one"), b"1").unwrap();

        let entries = store.list_dir(store.root()).unwrap();
        let names: Vec<&[u8]> = entries.iter().map(|e| e.name.as_slice()).collect();
        assert_eq!(names, vec![&b"alpha.txt"[..], b"beta.txt", b"stuff"]);

        assert_eq!(entries[0].kind, EntryKind::File);
        assert_eq!(entries[0].size, 1);
        assert_eq!(entries[2].kind, EntryKind::Folder);
        assert_eq!(entries[2].item_count, 1);
    }

    #[test]
    fn test_listing_reports_incomplete_under_final_name() {
        let (_dir, store) = store();
        fs::write(store.root().join("big.iso.incomplete"), b"half").unwrap();

        let entries = store.list_dir(store.root()).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, b"big.iso");
        assert_eq!(entries[0].kind, EntryKind::Incomplete);
        assert_eq!(entries[0].type_code, *b"HTft");
    }

    #[test]
    fn test_info_fork_synthesis_and_sidecar_priority() {
        let (_dir, store) = store();
        let data = store.root().join("notes.txt");
        fs::write(&data, b"text").unwrap();

        let fork = store.info_fork(&data).unwrap();
        assert_eq!(fork.type_code, *b"TEXT");
        assert_eq!(fork.name, b"notes.txt");

        let mut custom = fork.clone();
        custom.comment = b"kept".to_vec();
        store.write_info_fork(&data, &custom).unwrap();

        let reread = store.info_fork(&data).unwrap();
        assert_eq!(reread.comment, b"kept");
    }

    #[test]
    fn test_delete_removes_sidecars() {
        let (_dir, store) = store();
        let data = store.root().join("doc");
        fs::write(&data, b"d").unwrap();
        fs::write(store.info_sidecar(&data), b"i").unwrap();
        fs::write(store.rsrc_sidecar(&data), b"r").unwrap();

        store.delete(&data).unwrap();
        assert!(!data.exists());
        assert!(!store.info_sidecar(&data).exists());
        assert!(!store.rsrc_sidecar(&data).exists());
    }

    #[test]
    fn test_move_carries_sidecars() {
        let (_dir, store) = store();
        let data = store.root().join("doc");
        fs::write(&data, b"d").unwrap();
        fs::write(store.rsrc_sidecar(&data), b"r").unwrap();
        let dest = store.root().join("sub");
        fs::create_dir(&dest).unwrap();

        store.move_into(&data, &dest).unwrap();
        assert!(dest.join("doc").exists());
        assert!(dest.join(".rsrc_doc").exists());
        assert!(!data.exists());
    }

    #[test]
    fn test_move_refuses_clobber() {
        let (_dir, store) = store();
        let data = store.root().join("doc");
        fs::write(&data, b"d").unwrap();
        let dest = store.root().join("sub");
        fs::create_dir(&dest).unwrap();
        fs::write(dest.join("doc"), b"other").unwrap();

        assert!(matches!(
            store.move_into(&data, &dest),
            Err(FileError::AlreadyExists(_))
        ));
    }

    #[test]
    fn test_rename_refuses_dot_names() {
        let (_dir, store) = store();
        let data = store.root().join("doc");
        fs::write(&data, b"d").unwrap();
        assert!(store.rename(&data, b".sneaky").is_err());
    }

    #[test]
    fn test_complete_upload_renames() {
        let (_dir, store) = store();
        let data = store.root().join("file.bin");
        fs::write(store.incomplete_path(&data), b"payload").unwrap();

        store.complete_upload(&data).unwrap();
        assert!(data.exists());
        assert!(!store.incomplete_path(&data).exists());
    }

    #[test]
    fn test_drop_box_detection() {
        assert!(is_drop_box(b"Drop Box"));
        assert!(is_drop_box(b"staff drop box"));
        assert!(!is_drop_box(b"Uploads"));
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_resolved_paths_stay_in_root(
                parts in prop::collection::vec("[a-zA-Z0-9. _-]{0,12}", 0..6)
            ) {
                let dir = tempfile::tempdir().unwrap();
                let store = FileStore::new(dir.path()).unwrap();
                let path = FilePath::from_components(&parts);
                if let Ok(resolved) = store.resolve(&path, None) {
                    prop_assert!(resolved.starts_with(store.root()));
                }
            }
        }
    }
}
