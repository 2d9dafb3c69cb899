//! Account administration handlers.
//!
//! Logins travel obfuscated in the `UserLogin` field, like the login
//! transaction itself. Passwords are taken in wire form and stored as-is;
//! nothing here ever sees a cleartext password.

use super::required_field;
use crate::accounts::Account;
use crate::error::HandlerError;
use crate::server::Server;
use crate::session::Session;
use hotline_protocol::access::AccessBitmap;
use hotline_protocol::obfuscate::obfuscate;
use hotline_protocol::transaction::{Field, Transaction};
use hotline_protocol::types::fields;
use std::sync::Arc;

fn login_from(tx: &Transaction) -> Result<String, HandlerError> {
    let raw = required_field(tx, fields::USER_LOGIN, "login")?;
    Ok(String::from_utf8_lossy(&obfuscate(&raw.data)).into_owned())
}

fn access_from(tx: &Transaction) -> Option<AccessBitmap> {
    tx.field(fields::USER_ACCESS).and_then(|f| {
        let bytes: [u8; 8] = f.data.as_slice().try_into().ok()?;
        Some(AccessBitmap::from_bytes(bytes))
    })
}

/// One account as a `Data` field: a field-count-prefixed field list, the
/// same layout a transaction payload uses
fn account_as_data(account: &Account) -> Field {
    let inner = [
        Field::new(fields::USER_LOGIN, obfuscate(account.login.as_bytes())),
        Field::new(fields::USER_NAME, account.name.clone().into_bytes()),
        Field::new(fields::USER_ACCESS, account.access.to_bytes().to_vec()),
    ];

    let mut data = Vec::new();
    data.extend_from_slice(&(inner.len() as u16).to_be_bytes());
    for field in &inner {
        data.extend_from_slice(&field.id.to_be_bytes());
        data.extend_from_slice(&(field.data.len() as u16).to_be_bytes());
        data.extend_from_slice(&field.data);
    }
    Field::new(fields::DATA, data)
}

/// `ListUsers` (348): every account, one `Data` field each
pub fn list_users(
    server: &Server,
    _session: &Arc<Session>,
    tx: &Transaction,
) -> Result<Vec<Transaction>, HandlerError> {
    let reply_fields = server
        .accounts
        .all()
        .iter()
        .map(|a| account_as_data(a))
        .collect();
    Ok(vec![Transaction::reply_to(tx, reply_fields)])
}

/// `OpenUser` (350): one account for the editor window
pub fn open_user(
    server: &Server,
    _session: &Arc<Session>,
    tx: &Transaction,
) -> Result<Vec<Transaction>, HandlerError> {
    let login = login_from(tx)?;
    let account = server
        .accounts
        .get(&login)
        .ok_or_else(|| HandlerError::NotFound(format!("Cannot find the account \"{login}\".")))?;

    Ok(vec![Transaction::reply_to(
        tx,
        vec![
            Field::new(fields::USER_NAME, account.name.clone().into_bytes()),
            Field::new(fields::USER_LOGIN, obfuscate(account.login.as_bytes())),
            // The stored password never leaves the server; a placeholder
            // tells the editor one is set.
            Field::new(fields::USER_PASSWORD, vec![b'x']),
            Field::new(fields::USER_ACCESS, account.access.to_bytes().to_vec()),
        ],
    )])
}

/// `NewUser` (351)
pub fn new_user(
    server: &Server,
    session: &Arc<Session>,
    tx: &Transaction,
) -> Result<Vec<Transaction>, HandlerError> {
    let login = login_from(tx)?;
    let name = tx
        .field(fields::USER_NAME)
        .map(|f| f.as_text())
        .unwrap_or_else(|| login.clone());
    let password = tx
        .field(fields::USER_PASSWORD)
        .map(|f| f.data.clone())
        .unwrap_or_default();
    let access = access_from(tx).unwrap_or_default();

    let mut account = Account {
        login: login.clone(),
        name,
        password: String::new(),
        access,
    };
    account.set_password(&password);

    server.accounts.create(account)?;
    tracing::info!(session = session.id, %login, "account created");
    Ok(vec![Transaction::reply_to(tx, vec![])])
}

/// `DeleteUser` (352): delete the account and kick its sessions
pub fn delete_user(
    server: &Server,
    session: &Arc<Session>,
    tx: &Transaction,
) -> Result<Vec<Transaction>, HandlerError> {
    let login = login_from(tx)?;
    server.accounts.delete(&login)?;
    tracing::info!(session = session.id, %login, "account deleted");

    for other in server.sessions_snapshot() {
        if other.account().is_some_and(|a| a.login == login) {
            server.drop_session(&other);
        }
    }
    Ok(vec![Transaction::reply_to(tx, vec![])])
}

/// `UpdateUser` (349): edit name, password and access of one account
pub fn update_user(
    server: &Server,
    session: &Arc<Session>,
    tx: &Transaction,
) -> Result<Vec<Transaction>, HandlerError> {
    let login = login_from(tx)?;
    let existing = server
        .accounts
        .get(&login)
        .ok_or_else(|| HandlerError::NotFound(format!("Cannot find the account \"{login}\".")))?;

    let mut account = (*existing).clone();
    if let Some(name) = tx.field(fields::USER_NAME) {
        account.name = name.as_text();
    }
    if let Some(password) = tx.field(fields::USER_PASSWORD) {
        // The editor echoes the placeholder back when unchanged.
        if password.data != vec![b'x'] {
            account.set_password(&password.data);
        }
    }
    if let Some(access) = access_from(tx) {
        account.access = access;
    }

    server.accounts.update(account)?;
    tracing::info!(session = session.id, %login, "account updated");
    Ok(vec![Transaction::reply_to(tx, vec![])])
}
