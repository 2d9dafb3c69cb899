//! Login, agreement and user-presence handlers.

use super::{int_field, notify_change_user, required_field, user_name_with_info};
use crate::error::HandlerError;
use crate::server::Server;
use crate::session::{user_flags, user_options, Session, SessionState};
use hotline_protocol::access::Access;
use hotline_protocol::obfuscate::obfuscate;
use hotline_protocol::transaction::{Field, Transaction};
use hotline_protocol::types::{fields, TransactionType};
use std::sync::Arc;

/// Protocol version reported in the login reply
const SERVER_VERSION: u16 = 151;

/// `Login` (107): authenticate and move to `LoggedIn`.
///
/// An empty login means the guest account. A failed login produces an
/// error reply and then the session closes (the dispatcher handles the
/// close on `HandlerError::Auth`).
pub async fn login(
    server: &Server,
    session: &Arc<Session>,
    tx: &Transaction,
) -> Result<Vec<Transaction>, HandlerError> {
    let login_field = tx
        .field(fields::USER_LOGIN)
        .map(|f| obfuscate(&f.data))
        .unwrap_or_default();
    let login = if login_field.is_empty() {
        "guest".to_string()
    } else {
        String::from_utf8_lossy(&login_field).into_owned()
    };

    let account = server
        .accounts
        .get(&login)
        .ok_or_else(|| HandlerError::Auth("Incorrect login.".to_string()))?;

    let wire_password = tx
        .field(fields::USER_PASSWORD)
        .map(|f| f.data.clone())
        .unwrap_or_default();
    if !account.verify(&wire_password) {
        tracing::info!(session = session.id, %login, "login rejected");
        return Err(HandlerError::Auth("Incorrect password.".to_string()));
    }

    session.set_account((*account).clone(), account.access);
    session.transition_to(SessionState::LoggedIn).map_err(|e| {
        HandlerError::Internal(e.to_string())
    })?;

    // Presentation defaults to the account name; Agreed overrides it.
    let name = tx
        .field(fields::USER_NAME)
        .map(|f| f.data.clone())
        .unwrap_or_else(|| account.name.clone().into_bytes());
    let icon = int_field(tx, fields::USER_ICON_ID).unwrap_or(0) as u16;
    session.update_info(|info| {
        info.name = name;
        info.icon_id = icon;
        if account.access.contains(Access::DisconnectUser) {
            info.flags |= user_flags::ADMIN;
        }
    });

    tracing::info!(session = session.id, %login, "login accepted");

    let reply = Transaction::reply_to(
        tx,
        vec![
            Field::u16(fields::VERSION, SERVER_VERSION),
            Field::u16(fields::COMMUNITY_BANNER_ID, server.config.banner_id),
            Field::new(fields::SERVER_NAME, server.config.name.clone().into_bytes()),
            Field::new(fields::USER_ACCESS, session.access().to_bytes().to_vec()),
        ],
    );

    // Agreement delivery, or implicit agreement when there is nothing to
    // agree to.
    let agreement = server.agreement_text();
    let skip = session.has_access(Access::NoAgreement) || agreement.is_none();
    let show = if skip {
        mark_agreed(server, session);
        Transaction::new(
            TransactionType::ShowAgreement.code(),
            vec![Field::u16(fields::NO_SERVER_AGREEMENT, 1)],
        )
    } else {
        Transaction::new(
            TransactionType::ShowAgreement.code(),
            vec![Field::new(fields::DATA, agreement.unwrap_or_default())],
        )
    };

    Ok(vec![reply, show])
}

/// `Agreed` (121): accept the agreement, set presentation, go active.
pub fn agreed(
    server: &Server,
    session: &Arc<Session>,
    tx: &Transaction,
) -> Result<Vec<Transaction>, HandlerError> {
    if let Some(name) = tx.field(fields::USER_NAME) {
        let name = name.data.clone();
        let icon = int_field(tx, fields::USER_ICON_ID).unwrap_or(0) as u16;
        let options = int_field(tx, fields::OPTIONS).unwrap_or(0) as u16;
        let auto_reply = tx
            .field(fields::AUTOMATIC_RESPONSE)
            .map(|f| f.data.clone())
            .unwrap_or_default();

        session.update_info(|info| {
            info.name = name;
            info.icon_id = icon;
            info.flags &= !(user_flags::REFUSE_PM | user_flags::REFUSE_CHAT);
            if options & user_options::REFUSE_PM != 0 {
                info.flags |= user_flags::REFUSE_PM;
            }
            if options & user_options::REFUSE_CHAT != 0 {
                info.flags |= user_flags::REFUSE_CHAT;
            }
            info.auto_reply = if options & user_options::AUTO_RESPONSE != 0 {
                auto_reply
            } else {
                Vec::new()
            };
        });
    }

    // Idempotent: a client agreeing after an implicit agreement is fine.
    if session.state() == SessionState::LoggedIn {
        mark_agreed(server, session);
    } else {
        server.broadcast_agreed(&notify_change_user(session));
    }

    Ok(vec![Transaction::reply_to(tx, vec![])])
}

fn mark_agreed(server: &Server, session: &Arc<Session>) {
    if session.transition_to(SessionState::Agreed).is_ok() {
        server.broadcast_agreed(&notify_change_user(session));
    }
}

/// `GetUserNameList` (300): the agreed-session roster
pub fn get_user_name_list(
    server: &Server,
    _session: &Arc<Session>,
    tx: &Transaction,
) -> Result<Vec<Transaction>, HandlerError> {
    let roster = server
        .agreed_sessions()
        .iter()
        .map(|s| user_name_with_info(s))
        .collect();
    Ok(vec![Transaction::reply_to(tx, roster)])
}

/// `GetClientInfoText` (303): a human-readable sheet about one session
pub fn get_client_info_text(
    server: &Server,
    _session: &Arc<Session>,
    tx: &Transaction,
) -> Result<Vec<Transaction>, HandlerError> {
    let target_id = required_field(tx, fields::USER_ID, "user id")?
        .as_int()
        .ok_or_else(|| HandlerError::BadRequest("Malformed user id.".to_string()))? as u16;

    let target = server
        .session(target_id)
        .ok_or_else(|| HandlerError::NotFound("That user is no longer connected.".to_string()))?;

    let name = String::from_utf8_lossy(&target.display_name()).into_owned();
    let login = target.account().map(|a| a.login).unwrap_or_default();
    let text = format!(
        "Name:     {name}\rAccount:  {login}\rAddress:  {}\r",
        target.remote_addr
    );

    Ok(vec![Transaction::reply_to(
        tx,
        vec![
            Field::new(fields::DATA, text.into_bytes()),
            Field::new(fields::USER_NAME, target.display_name()),
        ],
    )])
}

/// `SetClientUserInfo` (304): name/icon/options change, no reply
pub fn set_client_user_info(
    server: &Server,
    session: &Arc<Session>,
    tx: &Transaction,
) -> Result<Vec<Transaction>, HandlerError> {
    if let Some(name) = tx.field(fields::USER_NAME) {
        let name = name.data.clone();
        session.update_info(|info| info.name = name);
    }
    if let Some(icon) = int_field(tx, fields::USER_ICON_ID) {
        session.update_info(|info| info.icon_id = icon as u16);
    }
    if let Some(options) = int_field(tx, fields::OPTIONS) {
        let options = options as u16;
        let auto_reply = tx
            .field(fields::AUTOMATIC_RESPONSE)
            .map(|f| f.data.clone())
            .unwrap_or_default();
        session.update_info(|info| {
            info.flags &= !(user_flags::REFUSE_PM | user_flags::REFUSE_CHAT);
            if options & user_options::REFUSE_PM != 0 {
                info.flags |= user_flags::REFUSE_PM;
            }
            if options & user_options::REFUSE_CHAT != 0 {
                info.flags |= user_flags::REFUSE_CHAT;
            }
            info.auto_reply = if options & user_options::AUTO_RESPONSE != 0 {
                auto_reply
            } else {
                Vec::new()
            };
        });
    }

    if session.is_agreed() {
        server.broadcast_agreed(&notify_change_user(session));
    }
    Ok(vec![])
}

/// `DisconnectUser` (110): kick a session
pub fn disconnect_user(
    server: &Server,
    session: &Arc<Session>,
    tx: &Transaction,
) -> Result<Vec<Transaction>, HandlerError> {
    let target_id = required_field(tx, fields::USER_ID, "user id")?
        .as_int()
        .ok_or_else(|| HandlerError::BadRequest("Malformed user id.".to_string()))? as u16;

    let target = server
        .session(target_id)
        .ok_or_else(|| HandlerError::NotFound("That user is no longer connected.".to_string()))?;

    if target
        .account()
        .is_some_and(|a| a.access.contains(Access::CannotBeDisconnected))
    {
        let name = String::from_utf8_lossy(&target.display_name()).into_owned();
        return Err(HandlerError::Denied(format!(
            "{name} cannot be disconnected."
        )));
    }

    tracing::info!(session = session.id, target = target_id, "user disconnected");

    let mut notice_fields = Vec::new();
    if let Some(data) = tx.field(fields::DATA) {
        notice_fields.push(Field::new(fields::DATA, data.data.clone()));
    }
    let _ = target.send(Transaction::new(
        TransactionType::DisconnectMsg.code(),
        notice_fields,
    ));
    server.drop_session(&target);

    Ok(vec![Transaction::reply_to(tx, vec![])])
}
