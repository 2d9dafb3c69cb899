//! Chat, private messages, broadcast and the message board.

use super::{int_field, required_field, user_name_with_info};
use crate::error::HandlerError;
use crate::server::Server;
use crate::session::{user_flags, Session};
use hotline_protocol::access::Access;
use hotline_protocol::transaction::{Field, Transaction};
use hotline_protocol::types::{fields, TransactionType};
use std::sync::Arc;

/// Chat options bit marking an emote line
const CHAT_OPT_EMOTE: u64 = 1;

/// `ChatSend` (105): public or private chat.
///
/// The server formats the line; clients display `Data` verbatim. Public
/// chat goes to every agreed session that may read chat, the sender
/// included; private chat goes to the room's members.
pub fn chat_send(
    server: &Server,
    session: &Arc<Session>,
    tx: &Transaction,
) -> Result<Vec<Transaction>, HandlerError> {
    let text = required_field(tx, fields::DATA, "chat text")?.data.clone();
    let name = session.display_name();

    let emote = int_field(tx, fields::CHAT_OPTIONS).unwrap_or(0) & CHAT_OPT_EMOTE != 0;
    let mut line = Vec::with_capacity(name.len() + text.len() + 8);
    if emote {
        line.extend_from_slice(b"\r *** ");
        line.extend_from_slice(&name);
        line.push(b' ');
    } else {
        line.extend_from_slice(b"\r ");
        line.extend_from_slice(&name);
        line.extend_from_slice(b": ");
    }
    line.extend_from_slice(&text);

    match int_field(tx, fields::CHAT_ID).map(|v| v as u32).filter(|id| *id != 0) {
        Some(chat_id) => {
            if !server.chats.is_member(chat_id, session.id) {
                return Err(HandlerError::NotFound("No such chat.".to_string()));
            }
            let msg = Transaction::new(
                TransactionType::ChatMsg.code(),
                vec![
                    Field::u32(fields::CHAT_ID, chat_id),
                    Field::new(fields::DATA, line),
                ],
            );
            server.broadcast_room(chat_id, &msg);
        }
        None => {
            let msg = Transaction::new(
                TransactionType::ChatMsg.code(),
                vec![Field::new(fields::DATA, line)],
            );
            server.broadcast(&msg, |s| {
                s.is_agreed() && s.has_access(Access::ReadChat)
            });
        }
    }

    Ok(vec![])
}

/// `SendInstantMsg` (108): point-to-point message
pub fn send_instant_msg(
    server: &Server,
    session: &Arc<Session>,
    tx: &Transaction,
) -> Result<Vec<Transaction>, HandlerError> {
    let target_id = required_field(tx, fields::USER_ID, "user id")?
        .as_int()
        .ok_or_else(|| HandlerError::BadRequest("Malformed user id.".to_string()))? as u16;
    let text = required_field(tx, fields::DATA, "message text")?.data.clone();

    let target = server
        .session(target_id)
        .ok_or_else(|| HandlerError::NotFound("That user is no longer connected.".to_string()))?;

    let target_name = String::from_utf8_lossy(&target.display_name()).into_owned();
    if target.info().flags & user_flags::REFUSE_PM != 0 {
        return Err(HandlerError::Denied(format!(
            "{target_name} does not accept private messages."
        )));
    }

    let mut msg_fields = vec![
        Field::new(fields::USER_NAME, session.display_name()),
        Field::u16(fields::USER_ID, session.id),
        Field::u16(fields::OPTIONS, 1),
        Field::new(fields::DATA, text),
    ];
    if let Some(quoting) = tx.field(fields::QUOTING_MSG) {
        msg_fields.push(Field::new(fields::QUOTING_MSG, quoting.data.clone()));
    }
    server.send_to(
        target_id,
        Transaction::new(TransactionType::ServerMsg.code(), msg_fields),
    );

    // An away message answers on the target's behalf.
    let auto_reply = target.info().auto_reply;
    if !auto_reply.is_empty() {
        server.send_to(
            session.id,
            Transaction::new(
                TransactionType::ServerMsg.code(),
                vec![
                    Field::new(fields::USER_NAME, target.display_name()),
                    Field::u16(fields::USER_ID, target.id),
                    Field::u16(fields::OPTIONS, 1),
                    Field::new(fields::DATA, auto_reply),
                    Field::new(fields::AUTOMATIC_RESPONSE, vec![1]),
                ],
            ),
        );
    }

    Ok(vec![Transaction::reply_to(tx, vec![])])
}

/// `UserBroadcast` (355): server-wide announcement
pub fn user_broadcast(
    server: &Server,
    session: &Arc<Session>,
    tx: &Transaction,
) -> Result<Vec<Transaction>, HandlerError> {
    let text = required_field(tx, fields::DATA, "broadcast text")?.data.clone();
    tracing::info!(session = session.id, "server broadcast");

    let msg = Transaction::new(
        TransactionType::ServerMsg.code(),
        vec![Field::new(fields::DATA, text)],
    );
    server.broadcast_agreed(&msg);
    Ok(vec![Transaction::reply_to(tx, vec![])])
}

/// `InviteNewChat` (112): create a room and invite one user
pub fn invite_new_chat(
    server: &Server,
    session: &Arc<Session>,
    tx: &Transaction,
) -> Result<Vec<Transaction>, HandlerError> {
    let invitee_id = required_field(tx, fields::USER_ID, "user id")?
        .as_int()
        .ok_or_else(|| HandlerError::BadRequest("Malformed user id.".to_string()))? as u16;

    let invitee = server
        .session(invitee_id)
        .ok_or_else(|| HandlerError::NotFound("That user is no longer connected.".to_string()))?;

    let chat_id = server.chats.create(session.id);

    let info = session.info();
    let reply = Transaction::reply_to(
        tx,
        vec![
            Field::u32(fields::CHAT_ID, chat_id),
            Field::new(fields::USER_NAME, session.display_name()),
            Field::u16(fields::USER_ID, session.id),
            Field::u16(fields::USER_ICON_ID, info.icon_id),
            Field::u16(fields::USER_FLAGS, info.flags),
        ],
    );

    if invitee.info().flags & user_flags::REFUSE_CHAT != 0 {
        // Decline on the invitee's behalf, into the new room.
        let name = invitee.display_name();
        let mut line = b"\r ".to_vec();
        line.extend_from_slice(&name);
        line.extend_from_slice(b" does not accept private chats.");
        server.broadcast_room(
            chat_id,
            &Transaction::new(
                TransactionType::ChatMsg.code(),
                vec![
                    Field::u32(fields::CHAT_ID, chat_id),
                    Field::new(fields::DATA, line),
                ],
            ),
        );
        return Ok(vec![reply]);
    }

    server.chats.invite(chat_id, invitee_id);
    server.send_to(
        invitee_id,
        Transaction::new(
            TransactionType::InviteToChat.code(),
            vec![
                Field::u32(fields::CHAT_ID, chat_id),
                Field::new(fields::USER_NAME, session.display_name()),
                Field::u16(fields::USER_ID, session.id),
            ],
        ),
    );

    Ok(vec![reply])
}

/// `InviteToChat` (113): invite another user into an existing room
pub fn invite_to_chat(
    server: &Server,
    session: &Arc<Session>,
    tx: &Transaction,
) -> Result<Vec<Transaction>, HandlerError> {
    let invitee_id = required_field(tx, fields::USER_ID, "user id")?
        .as_int()
        .ok_or_else(|| HandlerError::BadRequest("Malformed user id.".to_string()))? as u16;
    let chat_id = required_field(tx, fields::CHAT_ID, "chat id")?
        .as_int()
        .ok_or_else(|| HandlerError::BadRequest("Malformed chat id.".to_string()))? as u32;

    if !server.chats.is_member(chat_id, session.id) {
        return Err(HandlerError::NotFound("No such chat.".to_string()));
    }
    server
        .session(invitee_id)
        .ok_or_else(|| HandlerError::NotFound("That user is no longer connected.".to_string()))?;

    server.chats.invite(chat_id, invitee_id);
    server.send_to(
        invitee_id,
        Transaction::new(
            TransactionType::InviteToChat.code(),
            vec![
                Field::u32(fields::CHAT_ID, chat_id),
                Field::new(fields::USER_NAME, session.display_name()),
                Field::u16(fields::USER_ID, session.id),
            ],
        ),
    );
    Ok(vec![])
}

/// `RejectChatInvite` (114)
pub fn reject_chat_invite(
    server: &Server,
    session: &Arc<Session>,
    tx: &Transaction,
) -> Result<Vec<Transaction>, HandlerError> {
    let chat_id = required_field(tx, fields::CHAT_ID, "chat id")?
        .as_int()
        .ok_or_else(|| HandlerError::BadRequest("Malformed chat id.".to_string()))? as u32;

    server.chats.leave(chat_id, session.id);

    let mut line = b"\r ".to_vec();
    line.extend_from_slice(&session.display_name());
    line.extend_from_slice(b" declined the invitation to chat.");
    server.broadcast_room(
        chat_id,
        &Transaction::new(
            TransactionType::ChatMsg.code(),
            vec![
                Field::u32(fields::CHAT_ID, chat_id),
                Field::new(fields::DATA, line),
            ],
        ),
    );
    Ok(vec![])
}

/// `JoinChat` (115): join an invited room; the reply is the roster
pub fn join_chat(
    server: &Server,
    session: &Arc<Session>,
    tx: &Transaction,
) -> Result<Vec<Transaction>, HandlerError> {
    let chat_id = required_field(tx, fields::CHAT_ID, "chat id")?
        .as_int()
        .ok_or_else(|| HandlerError::BadRequest("Malformed chat id.".to_string()))? as u32;

    if !server.chats.may_join(chat_id, session.id) {
        return Err(HandlerError::NotFound("No such chat.".to_string()));
    }

    let existing = server
        .chats
        .join(chat_id, session.id)
        .ok_or_else(|| HandlerError::NotFound("No such chat.".to_string()))?;

    // Tell the room about the newcomer.
    let info = session.info();
    let notify = Transaction::new(
        TransactionType::NotifyChatChangeUser.code(),
        vec![
            Field::u32(fields::CHAT_ID, chat_id),
            Field::u16(fields::USER_ID, session.id),
            Field::u16(fields::USER_ICON_ID, info.icon_id),
            Field::u16(fields::USER_FLAGS, info.flags),
            Field::new(fields::USER_NAME, session.display_name()),
        ],
    );
    for member in existing.iter().copied() {
        server.send_to(member, notify.clone());
    }

    // Roster + subject back to the joiner.
    let mut reply_fields = vec![Field::new(
        fields::CHAT_SUBJECT,
        server.chats.subject(chat_id),
    )];
    for member in server.chats.members(chat_id) {
        if let Some(s) = server.session(member) {
            reply_fields.push(user_name_with_info(&s));
        }
    }
    Ok(vec![Transaction::reply_to(tx, reply_fields)])
}

/// `LeaveChat` (116)
pub fn leave_chat(
    server: &Server,
    session: &Arc<Session>,
    tx: &Transaction,
) -> Result<Vec<Transaction>, HandlerError> {
    let chat_id = required_field(tx, fields::CHAT_ID, "chat id")?
        .as_int()
        .ok_or_else(|| HandlerError::BadRequest("Malformed chat id.".to_string()))? as u32;

    server.chats.leave(chat_id, session.id);
    server.broadcast_room(
        chat_id,
        &Transaction::new(
            TransactionType::NotifyChatDeleteUser.code(),
            vec![
                Field::u32(fields::CHAT_ID, chat_id),
                Field::u16(fields::USER_ID, session.id),
            ],
        ),
    );
    Ok(vec![])
}

/// `SetChatSubject` (120)
pub fn set_chat_subject(
    server: &Server,
    session: &Arc<Session>,
    tx: &Transaction,
) -> Result<Vec<Transaction>, HandlerError> {
    let chat_id = required_field(tx, fields::CHAT_ID, "chat id")?
        .as_int()
        .ok_or_else(|| HandlerError::BadRequest("Malformed chat id.".to_string()))? as u32;
    let subject = required_field(tx, fields::CHAT_SUBJECT, "chat subject")?.data.clone();

    if !server.chats.is_member(chat_id, session.id) {
        return Err(HandlerError::NotFound("No such chat.".to_string()));
    }
    server.chats.set_subject(chat_id, &subject);
    server.broadcast_room(
        chat_id,
        &Transaction::new(
            TransactionType::NotifyChatSubject.code(),
            vec![
                Field::u32(fields::CHAT_ID, chat_id),
                Field::new(fields::CHAT_SUBJECT, subject),
            ],
        ),
    );
    Ok(vec![])
}

/// `GetMsgs` (101): fetch the message board
pub fn get_msgs(
    server: &Server,
    _session: &Arc<Session>,
    tx: &Transaction,
) -> Result<Vec<Transaction>, HandlerError> {
    Ok(vec![Transaction::reply_to(
        tx,
        vec![Field::new(fields::DATA, server.message_board())],
    )])
}

/// `OldPostNews` (103): post to the message board
pub fn old_post_news(
    server: &Server,
    session: &Arc<Session>,
    tx: &Transaction,
) -> Result<Vec<Transaction>, HandlerError> {
    let text = required_field(tx, fields::DATA, "post text")?.data.clone();
    let poster = session.display_name();

    server
        .post_message_board(&poster, &text)
        .map_err(|e| HandlerError::Internal(e.to_string()))?;

    // Push the fresh board to readers.
    let notify = Transaction::new(
        TransactionType::NewMsg.code(),
        vec![Field::new(fields::DATA, server.message_board())],
    );
    server.broadcast(&notify, |s| {
        s.is_agreed() && s.has_access(Access::NewsReadArt)
    });

    Ok(vec![Transaction::reply_to(tx, vec![])])
}
