//! Account records and per-login persistence.
//!
//! Each account is one YAML file, `Users/LOGIN.yaml`. Passwords never
//! exist in the clear on disk or in memory: the wire form (each byte
//! complemented) is what gets stored, hex-encoded for the YAML.

use crate::error::{HandlerError, ServerError};
use dashmap::DashMap;
use hotline_protocol::access::{Access, AccessBitmap};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

/// One account record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    /// Unique login
    pub login: String,
    /// Display name
    pub name: String,
    /// Obfuscated password, hex-encoded
    pub password: String,
    /// Capability bits
    pub access: AccessBitmap,
}

impl Account {
    /// Check a wire password (already obfuscated) against this account
    #[must_use]
    pub fn verify(&self, wire_password: &[u8]) -> bool {
        hex::encode(wire_password) == self.password
    }

    /// Store an obfuscated wire password
    pub fn set_password(&mut self, wire_password: &[u8]) {
        self.password = hex::encode(wire_password);
    }
}

/// The account registry, backed by `Users/*.yaml`
pub struct AccountStore {
    dir: PathBuf,
    accounts: DashMap<String, Arc<Account>>,
}

impl AccountStore {
    /// Load every account file under `dir`.
    ///
    /// A missing directory is created empty.
    ///
    /// # Errors
    ///
    /// Propagates directory and file failures; a malformed account file is
    /// an error rather than a silent skip.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, ServerError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;

        let accounts = DashMap::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().is_some_and(|e| e == "yaml") {
                let text = fs::read_to_string(&path)?;
                let account: Account = serde_yaml::from_str(&text)
                    .map_err(|e| ServerError::Config(format!("{}: {e}", path.display())))?;
                accounts.insert(account.login.clone(), Arc::new(account));
            }
        }

        tracing::info!(count = accounts.len(), dir = %dir.display(), "accounts loaded");
        Ok(Self { dir, accounts })
    }

    /// Write the stock `admin` and `guest` accounts if none exist.
    ///
    /// # Errors
    ///
    /// Propagates persistence failures.
    pub fn seed_defaults(&self) -> Result<(), ServerError> {
        if !self.accounts.is_empty() {
            return Ok(());
        }

        let mut admin = Account {
            login: "admin".to_string(),
            name: "Administrator".to_string(),
            password: String::new(),
            access: AccessBitmap::all(),
        };
        admin.set_password(&hotline_protocol::obfuscate::obfuscate(b"admin"));

        let mut guest = Account {
            login: "guest".to_string(),
            name: "Guest".to_string(),
            password: String::new(),
            access: guest_access(),
        };
        guest.set_password(&hotline_protocol::obfuscate::obfuscate(b""));

        self.create(admin).map_err(internal)?;
        self.create(guest).map_err(internal)?;
        Ok(())
    }

    /// Look up an account
    #[must_use]
    pub fn get(&self, login: &str) -> Option<Arc<Account>> {
        self.accounts.get(login).map(|e| Arc::clone(e.value()))
    }

    /// Every login, sorted
    #[must_use]
    pub fn logins(&self) -> Vec<String> {
        let mut out: Vec<String> = self.accounts.iter().map(|e| e.key().clone()).collect();
        out.sort();
        out
    }

    /// Every account, sorted by login
    #[must_use]
    pub fn all(&self) -> Vec<Arc<Account>> {
        let mut out: Vec<Arc<Account>> =
            self.accounts.iter().map(|e| Arc::clone(e.value())).collect();
        out.sort_by(|a, b| a.login.cmp(&b.login));
        out
    }

    /// Create an account and persist it.
    ///
    /// # Errors
    ///
    /// `AlreadyExists` on a duplicate login; `BadRequest` for an unusable
    /// login string.
    pub fn create(&self, account: Account) -> Result<(), HandlerError> {
        validate_login(&account.login)?;
        if self.accounts.contains_key(&account.login) {
            return Err(HandlerError::AlreadyExists(format!(
                "An account with the login \"{}\" already exists.",
                account.login
            )));
        }
        self.persist(&account)?;
        self.accounts
            .insert(account.login.clone(), Arc::new(account));
        Ok(())
    }

    /// Replace an existing account and persist it.
    ///
    /// # Errors
    ///
    /// `NotFound` when the login does not exist.
    pub fn update(&self, account: Account) -> Result<(), HandlerError> {
        if !self.accounts.contains_key(&account.login) {
            return Err(HandlerError::NotFound(format!(
                "Cannot find the account \"{}\".",
                account.login
            )));
        }
        self.persist(&account)?;
        self.accounts
            .insert(account.login.clone(), Arc::new(account));
        Ok(())
    }

    /// Delete an account and its file.
    ///
    /// # Errors
    ///
    /// `NotFound` when the login does not exist.
    pub fn delete(&self, login: &str) -> Result<(), HandlerError> {
        if self.accounts.remove(login).is_none() {
            return Err(HandlerError::NotFound(format!(
                "Cannot find the account \"{login}\"."
            )));
        }
        let _ = fs::remove_file(self.account_path(login));
        Ok(())
    }

    fn account_path(&self, login: &str) -> PathBuf {
        self.dir.join(format!("{login}.yaml"))
    }

    fn persist(&self, account: &Account) -> Result<(), HandlerError> {
        let yaml = serde_yaml::to_string(account)
            .map_err(|e| HandlerError::Internal(e.to_string()))?;
        let path = self.account_path(&account.login);
        let tmp = path.with_extension("yaml.tmp");
        fs::write(&tmp, yaml).map_err(|e| HandlerError::Internal(e.to_string()))?;
        fs::rename(&tmp, &path).map_err(|e| HandlerError::Internal(e.to_string()))?;
        Ok(())
    }
}

/// The stock guest capability set: chat, news reading, downloads
#[must_use]
pub fn guest_access() -> AccessBitmap {
    AccessBitmap::new()
        .with(Access::ReadChat)
        .with(Access::SendChat)
        .with(Access::OpenChat)
        .with(Access::ShowInList)
        .with(Access::DownloadFile)
        .with(Access::NewsReadArt)
        .with(Access::SendPrivMsg)
        .with(Access::GetClientInfo)
}

fn validate_login(login: &str) -> Result<(), HandlerError> {
    if login.is_empty()
        || login.len() > 64
        || login
            .chars()
            .any(|c| c.is_control() || c == '/' || c == '\\' || c == '.')
    {
        return Err(HandlerError::BadRequest("Invalid login.".to_string()));
    }
    Ok(())
}

fn internal(e: HandlerError) -> ServerError {
    ServerError::Config(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use hotline_protocol::obfuscate::obfuscate;

    fn store() -> (tempfile::TempDir, AccountStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = AccountStore::open(dir.path().join("Users")).unwrap();
        (dir, store)
    }

    #[test]
    fn test_seed_defaults_once() {
        let (_dir, store) = store();
        store.seed_defaults().unwrap();
        assert_eq!(store.logins(), vec!["admin", "guest"]);

        // A second seed with accounts present is a no-op.
        store.delete("guest").unwrap();
        store.seed_defaults().unwrap();
        assert_eq!(store.logins(), vec!["admin"]);
    }

    #[test]
    fn test_password_verification_uses_wire_form() {
        let (_dir, store) = store();
        store.seed_defaults().unwrap();

        let admin = store.get("admin").unwrap();
        assert!(admin.verify(&obfuscate(b"admin")));
        assert!(!admin.verify(&obfuscate(b"wrong")));
        assert!(!admin.verify(b"admin")); // cleartext never matches

        let guest = store.get("guest").unwrap();
        assert!(guest.verify(&obfuscate(b"")));
    }

    #[test]
    fn test_create_duplicate_rejected() {
        let (_dir, store) = store();
        store.seed_defaults().unwrap();

        let dup = Account {
            login: "guest".to_string(),
            name: "Another".to_string(),
            password: String::new(),
            access: AccessBitmap::new(),
        };
        assert!(matches!(
            store.create(dup),
            Err(HandlerError::AlreadyExists(_))
        ));
    }

    #[test]
    fn test_login_validation() {
        let (_dir, store) = store();
        for bad in ["", "../etc", "a/b", "dot.ted"] {
            let account = Account {
                login: bad.to_string(),
                name: String::new(),
                password: String::new(),
                access: AccessBitmap::new(),
            };
            assert!(store.create(account).is_err(), "login {bad:?} accepted");
        }
    }

    #[test]
    fn test_accounts_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let users = dir.path().join("Users");
        {
            let store = AccountStore::open(&users).unwrap();
            store.seed_defaults().unwrap();
            let mut admin = (*store.get("admin").unwrap()).clone();
            admin.name = "Renamed".to_string();
            store.update(admin).unwrap();
        }

        let store = AccountStore::open(&users).unwrap();
        assert_eq!(store.get("admin").unwrap().name, "Renamed");
        assert!(store.get("admin").unwrap().access.contains(Access::Broadcast));
    }

    #[test]
    fn test_delete_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let users = dir.path().join("Users");
        let store = AccountStore::open(&users).unwrap();
        store.seed_defaults().unwrap();

        store.delete("guest").unwrap();
        assert!(store.get("guest").is_none());
        assert!(!users.join("guest.yaml").exists());
        assert!(matches!(
            store.delete("guest"),
            Err(HandlerError::NotFound(_))
        ));
    }
}
