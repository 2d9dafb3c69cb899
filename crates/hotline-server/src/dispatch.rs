//! Transaction dispatch.
//!
//! A declarative table maps each transaction type to a handler name and
//! the access bits it requires; the denial strings match what classic
//! clients show their users verbatim. Gating runs before any handler
//! code. Handler errors become error replies; only a failed login closes
//! the session afterwards.

use crate::error::HandlerError;
use crate::handlers;
use crate::server::Server;
use crate::session::{Session, SessionState};
use hotline_protocol::access::Access;
use hotline_protocol::transaction::Transaction;
use hotline_protocol::types::TransactionType;
use std::sync::Arc;

/// What the reader loop does with a handled transaction
#[derive(Debug, Default)]
pub struct DispatchOutcome {
    /// Transactions to queue for the calling session, reply first
    pub replies: Vec<Transaction>,
    /// Close the session once the replies are queued
    pub close: bool,
}

/// Gating row: required access bit and the client-facing denial text
struct Gate {
    bit: Access,
    denial: &'static str,
}

/// Dispatch-table row
struct HandlerSpec {
    ty: TransactionType,
    name: &'static str,
    gates: &'static [Gate],
}

macro_rules! gate {
    ($bit:ident, $denial:expr) => {
        Gate {
            bit: Access::$bit,
            denial: $denial,
        }
    };
}

static TABLE: &[HandlerSpec] = &[
    HandlerSpec { ty: TransactionType::Login, name: "Login", gates: &[] },
    HandlerSpec { ty: TransactionType::Agreed, name: "Agreed", gates: &[] },
    HandlerSpec { ty: TransactionType::KeepAlive, name: "KeepAlive", gates: &[] },
    HandlerSpec {
        ty: TransactionType::ChatSend,
        name: "ChatSend",
        gates: &[gate!(SendChat, "You are not allowed to participate in chat.")],
    },
    HandlerSpec {
        ty: TransactionType::SendInstantMsg,
        name: "SendInstantMsg",
        gates: &[gate!(SendPrivMsg, "You are not allowed to send private messages.")],
    },
    HandlerSpec {
        ty: TransactionType::UserBroadcast,
        name: "UserBroadcast",
        gates: &[gate!(Broadcast, "You are not allowed to send broadcast messages.")],
    },
    HandlerSpec {
        ty: TransactionType::DisconnectUser,
        name: "DisconnectUser",
        gates: &[gate!(DisconnectUser, "You are not allowed to disconnect users.")],
    },
    HandlerSpec { ty: TransactionType::GetUserNameList, name: "GetUserNameList", gates: &[] },
    HandlerSpec {
        ty: TransactionType::GetClientInfoText,
        name: "GetClientInfoText",
        gates: &[gate!(GetClientInfo, "You are not allowed to get client info.")],
    },
    HandlerSpec { ty: TransactionType::SetClientUserInfo, name: "SetClientUserInfo", gates: &[] },
    HandlerSpec {
        ty: TransactionType::InviteNewChat,
        name: "InviteNewChat",
        gates: &[gate!(OpenChat, "You are not allowed to request private chat.")],
    },
    HandlerSpec {
        ty: TransactionType::InviteToChat,
        name: "InviteToChat",
        gates: &[gate!(OpenChat, "You are not allowed to request private chat.")],
    },
    HandlerSpec { ty: TransactionType::RejectChatInvite, name: "RejectChatInvite", gates: &[] },
    HandlerSpec { ty: TransactionType::JoinChat, name: "JoinChat", gates: &[] },
    HandlerSpec { ty: TransactionType::LeaveChat, name: "LeaveChat", gates: &[] },
    HandlerSpec { ty: TransactionType::SetChatSubject, name: "SetChatSubject", gates: &[] },
    HandlerSpec {
        ty: TransactionType::GetMsgs,
        name: "GetMsgs",
        gates: &[gate!(NewsReadArt, "You are not allowed to read the message board.")],
    },
    HandlerSpec {
        ty: TransactionType::OldPostNews,
        name: "OldPostNews",
        gates: &[gate!(NewsPostArt, "You are not allowed to post on the message board.")],
    },
    HandlerSpec { ty: TransactionType::GetFileNameList, name: "GetFileNameList", gates: &[] },
    HandlerSpec {
        ty: TransactionType::DownloadFile,
        name: "DownloadFile",
        gates: &[gate!(DownloadFile, "You are not allowed to download files.")],
    },
    HandlerSpec {
        ty: TransactionType::UploadFile,
        name: "UploadFile",
        gates: &[gate!(UploadFile, "You are not allowed to upload files.")],
    },
    // Deleting and moving check the file or folder bit inside the handler,
    // once the target's kind is known.
    HandlerSpec { ty: TransactionType::DeleteFile, name: "DeleteFile", gates: &[] },
    HandlerSpec {
        ty: TransactionType::NewFolder,
        name: "NewFolder",
        gates: &[gate!(CreateFolder, "You are not allowed to create folders.")],
    },
    HandlerSpec { ty: TransactionType::GetFileInfo, name: "GetFileInfo", gates: &[] },
    HandlerSpec { ty: TransactionType::SetFileInfo, name: "SetFileInfo", gates: &[] },
    HandlerSpec { ty: TransactionType::MoveFile, name: "MoveFile", gates: &[] },
    HandlerSpec {
        ty: TransactionType::MakeFileAlias,
        name: "MakeFileAlias",
        gates: &[gate!(MakeAlias, "You are not allowed to make aliases.")],
    },
    HandlerSpec {
        ty: TransactionType::DownloadFolder,
        name: "DownloadFolder",
        gates: &[gate!(DownloadFile, "You are not allowed to download folders.")],
    },
    HandlerSpec {
        ty: TransactionType::UploadFolder,
        name: "UploadFolder",
        gates: &[gate!(UploadFolder, "You are not allowed to upload folders.")],
    },
    HandlerSpec { ty: TransactionType::DownloadBanner, name: "DownloadBanner", gates: &[] },
    HandlerSpec {
        ty: TransactionType::GetNewsCatNameList,
        name: "GetNewsCatNameList",
        gates: &[gate!(NewsReadArt, "You are not allowed to read news.")],
    },
    HandlerSpec {
        ty: TransactionType::GetNewsArtNameList,
        name: "GetNewsArtNameList",
        gates: &[gate!(NewsReadArt, "You are not allowed to read news.")],
    },
    HandlerSpec {
        ty: TransactionType::GetNewsArtData,
        name: "GetNewsArtData",
        gates: &[gate!(NewsReadArt, "You are not allowed to read news.")],
    },
    HandlerSpec {
        ty: TransactionType::PostNewsArt,
        name: "PostNewsArt",
        gates: &[gate!(NewsPostArt, "You are not allowed to post news articles.")],
    },
    HandlerSpec {
        ty: TransactionType::DelNewsArt,
        name: "DelNewsArt",
        gates: &[gate!(NewsDeleteArt, "You are not allowed to delete news articles.")],
    },
    HandlerSpec { ty: TransactionType::DelNewsItem, name: "DelNewsItem", gates: &[] },
    HandlerSpec {
        ty: TransactionType::NewNewsFolder,
        name: "NewNewsFolder",
        gates: &[gate!(NewsCreateFolder, "You are not allowed to create news bundles.")],
    },
    HandlerSpec {
        ty: TransactionType::NewNewsCategory,
        name: "NewNewsCategory",
        gates: &[gate!(NewsCreateCat, "You are not allowed to create news categories.")],
    },
    HandlerSpec {
        ty: TransactionType::ListUsers,
        name: "ListUsers",
        gates: &[gate!(OpenUser, "You are not allowed to view accounts.")],
    },
    HandlerSpec {
        ty: TransactionType::OpenUser,
        name: "OpenUser",
        gates: &[gate!(OpenUser, "You are not allowed to view accounts.")],
    },
    HandlerSpec {
        ty: TransactionType::NewUser,
        name: "NewUser",
        gates: &[gate!(CreateUser, "You are not allowed to create new accounts.")],
    },
    HandlerSpec {
        ty: TransactionType::DeleteUser,
        name: "DeleteUser",
        gates: &[gate!(DeleteUser, "You are not allowed to delete accounts.")],
    },
    HandlerSpec {
        ty: TransactionType::UpdateUser,
        name: "UpdateUser",
        gates: &[gate!(ModifyUser, "You are not allowed to modify accounts.")],
    },
];

fn spec_for(ty: TransactionType) -> Option<&'static HandlerSpec> {
    TABLE.iter().find(|spec| spec.ty == ty)
}

/// Handle one inbound request and produce the outcome for the reader loop
pub async fn handle(
    server: &Server,
    session: &Arc<Session>,
    tx: &Transaction,
) -> DispatchOutcome {
    let Ok(ty) = TransactionType::try_from(tx.type_code) else {
        tracing::debug!(session = session.id, type_code = tx.type_code, "unknown type");
        return DispatchOutcome {
            replies: vec![Transaction::error_reply(tx, "Unsupported transaction type.")],
            close: false,
        };
    };

    let Some(spec) = spec_for(ty) else {
        return DispatchOutcome {
            replies: vec![Transaction::error_reply(tx, "Unsupported transaction type.")],
            close: false,
        };
    };

    // State gating: only Login is legal before LoggedIn.
    let state = session.state();
    let state_ok = match ty {
        TransactionType::Login => state == SessionState::Handshaken,
        _ => matches!(state, SessionState::LoggedIn | SessionState::Agreed),
    };
    if !state_ok {
        tracing::warn!(session = session.id, handler = spec.name, state = ?state, "out-of-state transaction");
        return DispatchOutcome {
            replies: vec![Transaction::error_reply(tx, "Not logged in.")],
            close: ty == TransactionType::Login,
        };
    }

    // Access gating, declarative.
    for gate in spec.gates {
        if !session.has_access(gate.bit) {
            tracing::info!(session = session.id, handler = spec.name, "access denied");
            return DispatchOutcome {
                replies: vec![Transaction::error_reply(tx, gate.denial)],
                close: false,
            };
        }
    }

    match route(server, session, ty, tx).await {
        Ok(replies) => DispatchOutcome {
            replies,
            close: false,
        },
        Err(e) => {
            let close = matches!(e, HandlerError::Auth(_));
            match &e {
                HandlerError::Internal(detail) => {
                    tracing::error!(session = session.id, handler = spec.name, %detail, "handler failed");
                }
                HandlerError::PathEscape => {
                    tracing::warn!(session = session.id, handler = spec.name, "sandbox violation");
                }
                other => {
                    tracing::debug!(session = session.id, handler = spec.name, error = %other, "handler error");
                }
            }
            DispatchOutcome {
                replies: vec![Transaction::error_reply(tx, e.client_message())],
                close,
            }
        }
    }
}

/// Handle a correlated reply.
///
/// No current handler acts on client replies; correlation recovers the
/// original type for the log, and the reply is dropped.
pub fn handle_reply(_server: &Server, session: &Arc<Session>, tx: &Transaction) {
    match TransactionType::try_from(tx.type_code) {
        Ok(ty) => {
            tracing::debug!(session = session.id, original = ?ty, "reply correlated")
        }
        Err(_) => tracing::debug!(session = session.id, "reply to unknown type"),
    }
}

async fn route(
    server: &Server,
    session: &Arc<Session>,
    ty: TransactionType,
    tx: &Transaction,
) -> Result<Vec<Transaction>, HandlerError> {
    use TransactionType as T;
    match ty {
        T::Login => handlers::users::login(server, session, tx).await,
        T::Agreed => handlers::users::agreed(server, session, tx),
        T::KeepAlive => Ok(vec![Transaction::reply_to(tx, vec![])]),
        T::GetUserNameList => handlers::users::get_user_name_list(server, session, tx),
        T::GetClientInfoText => handlers::users::get_client_info_text(server, session, tx),
        T::SetClientUserInfo => handlers::users::set_client_user_info(server, session, tx),
        T::DisconnectUser => handlers::users::disconnect_user(server, session, tx),
        T::ChatSend => handlers::messaging::chat_send(server, session, tx),
        T::SendInstantMsg => handlers::messaging::send_instant_msg(server, session, tx),
        T::UserBroadcast => handlers::messaging::user_broadcast(server, session, tx),
        T::InviteNewChat => handlers::messaging::invite_new_chat(server, session, tx),
        T::InviteToChat => handlers::messaging::invite_to_chat(server, session, tx),
        T::RejectChatInvite => handlers::messaging::reject_chat_invite(server, session, tx),
        T::JoinChat => handlers::messaging::join_chat(server, session, tx),
        T::LeaveChat => handlers::messaging::leave_chat(server, session, tx),
        T::SetChatSubject => handlers::messaging::set_chat_subject(server, session, tx),
        T::GetMsgs => handlers::messaging::get_msgs(server, session, tx),
        T::OldPostNews => handlers::messaging::old_post_news(server, session, tx),
        T::GetFileNameList => handlers::files::get_file_name_list(server, session, tx),
        T::DownloadFile => handlers::files::download_file(server, session, tx),
        T::UploadFile => handlers::files::upload_file(server, session, tx),
        T::DeleteFile => handlers::files::delete_file(server, session, tx),
        T::NewFolder => handlers::files::new_folder(server, session, tx),
        T::GetFileInfo => handlers::files::get_file_info(server, session, tx),
        T::SetFileInfo => handlers::files::set_file_info(server, session, tx),
        T::MoveFile => handlers::files::move_file(server, session, tx),
        T::MakeFileAlias => handlers::files::make_file_alias(server, session, tx),
        T::DownloadFolder => handlers::files::download_folder(server, session, tx),
        T::UploadFolder => handlers::files::upload_folder(server, session, tx),
        T::DownloadBanner => handlers::files::download_banner(server, session, tx),
        T::GetNewsCatNameList => handlers::news::get_news_cat_name_list(server, session, tx).await,
        T::GetNewsArtNameList => handlers::news::get_news_art_name_list(server, session, tx).await,
        T::GetNewsArtData => handlers::news::get_news_art_data(server, session, tx).await,
        T::PostNewsArt => handlers::news::post_news_art(server, session, tx).await,
        T::DelNewsArt => handlers::news::del_news_art(server, session, tx).await,
        T::DelNewsItem => handlers::news::del_news_item(server, session, tx).await,
        T::NewNewsFolder => handlers::news::new_news_folder(server, session, tx).await,
        T::NewNewsCategory => handlers::news::new_news_category(server, session, tx).await,
        T::ListUsers => handlers::accounts::list_users(server, session, tx),
        T::OpenUser => handlers::accounts::open_user(server, session, tx),
        T::NewUser => handlers::accounts::new_user(server, session, tx),
        T::DeleteUser => handlers::accounts::delete_user(server, session, tx),
        T::UpdateUser => handlers::accounts::update_user(server, session, tx),
        // Outbound-only types a client should never send.
        _ => Err(HandlerError::BadRequest(
            "Unsupported transaction type.".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_has_no_duplicate_types() {
        for (i, a) in TABLE.iter().enumerate() {
            for b in &TABLE[i + 1..] {
                assert_ne!(a.ty, b.ty, "duplicate spec for {:?}", a.ty);
            }
        }
    }

    #[test]
    fn test_gated_handlers_carry_denial_text() {
        for spec in TABLE {
            for gate in spec.gates {
                assert!(
                    gate.denial.starts_with("You are not allowed"),
                    "{} has nonstandard denial text",
                    spec.name
                );
            }
        }
    }
}
