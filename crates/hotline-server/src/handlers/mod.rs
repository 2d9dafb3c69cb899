//! Control-port handlers, split by domain.
//!
//! Every handler has the same shape: it reads fields off the request,
//! works against the shared [`crate::Server`], performs any broadcasts
//! through the server's fan-out methods, and returns the transactions to
//! queue for the calling session (reply first, by convention).

pub mod accounts;
pub mod files;
pub mod messaging;
pub mod news;
pub mod users;

use crate::error::HandlerError;
use crate::session::Session;
use hotline_protocol::transaction::{Field, Transaction};
use hotline_protocol::types::{fields, TransactionType};

/// A field the request must carry
pub(crate) fn required_field<'a>(
    tx: &'a Transaction,
    id: u16,
    what: &str,
) -> Result<&'a Field, HandlerError> {
    tx.field(id)
        .ok_or_else(|| HandlerError::BadRequest(format!("Missing {what}.")))
}

/// An integer field, any width the client chose
pub(crate) fn int_field(tx: &Transaction, id: u16) -> Option<u64> {
    tx.field(id).and_then(Field::as_int)
}

/// The `UserNameWithInfo` record used in user lists and chat rosters:
/// `UserID[2] IconID[2] Flags[2] NameLen[2] Name`
pub(crate) fn user_name_with_info(session: &Session) -> Field {
    let info = session.info();
    let name = session.display_name();
    let mut data = Vec::with_capacity(8 + name.len());
    data.extend_from_slice(&session.id.to_be_bytes());
    data.extend_from_slice(&info.icon_id.to_be_bytes());
    data.extend_from_slice(&info.flags.to_be_bytes());
    data.extend_from_slice(&(name.len() as u16).to_be_bytes());
    data.extend_from_slice(&name);
    Field::new(fields::USER_NAME_WITH_INFO, data)
}

/// The `NotifyChangeUser` broadcast announcing a session's current
/// presentation to the user list
pub(crate) fn notify_change_user(session: &Session) -> Transaction {
    let info = session.info();
    Transaction::new(
        TransactionType::NotifyChangeUser.code(),
        vec![
            Field::u16(fields::USER_ID, session.id),
            Field::u16(fields::USER_ICON_ID, info.icon_id),
            Field::u16(fields::USER_FLAGS, info.flags),
            Field::new(fields::USER_NAME, session.display_name()),
        ],
    )
}
