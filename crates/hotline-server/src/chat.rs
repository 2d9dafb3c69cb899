//! Private chat rooms.
//!
//! Public chat is not a room here: chat id 0 (or an absent ChatID field)
//! routes to a broadcast over every agreed session, so the "public room
//! contains all logged-in users" invariant holds by construction. This
//! registry tracks only private rooms, which exist from the first invite
//! until the last member leaves.

use dashmap::DashMap;
use std::collections::HashSet;

/// One private chat room
#[derive(Debug, Clone, Default)]
pub struct ChatRoom {
    /// Current subject line
    pub subject: Vec<u8>,
    /// User ids of joined members
    pub members: HashSet<u16>,
    /// User ids invited but not yet joined
    pub invitees: HashSet<u16>,
}

/// The private-room registry
#[derive(Debug, Default)]
pub struct ChatRegistry {
    rooms: DashMap<u32, ChatRoom>,
}

impl ChatRegistry {
    /// Empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a room containing only `creator`, returning its fresh
    /// random id
    pub fn create(&self, creator: u16) -> u32 {
        loop {
            let mut bytes = [0u8; 4];
            getrandom::getrandom(&mut bytes).expect("CSPRNG failure");
            let id = u32::from_be_bytes(bytes);
            if id == 0 {
                continue;
            }

            match self.rooms.entry(id) {
                dashmap::mapref::entry::Entry::Occupied(_) => continue,
                dashmap::mapref::entry::Entry::Vacant(v) => {
                    let mut room = ChatRoom::default();
                    room.members.insert(creator);
                    v.insert(room);
                    return id;
                }
            }
        }
    }

    /// Record an invitation
    pub fn invite(&self, chat_id: u32, invitee: u16) -> bool {
        match self.rooms.get_mut(&chat_id) {
            Some(mut room) => {
                room.invitees.insert(invitee);
                true
            }
            None => false,
        }
    }

    /// Join a room; returns the member list before the join, or `None`
    /// for an unknown room
    pub fn join(&self, chat_id: u32, user_id: u16) -> Option<Vec<u16>> {
        let mut room = self.rooms.get_mut(&chat_id)?;
        let before: Vec<u16> = room.members.iter().copied().collect();
        room.invitees.remove(&user_id);
        room.members.insert(user_id);
        Some(before)
    }

    /// Leave a room (or decline an invite); the room dies with its last
    /// member
    pub fn leave(&self, chat_id: u32, user_id: u16) {
        let mut destroy = false;
        if let Some(mut room) = self.rooms.get_mut(&chat_id) {
            room.members.remove(&user_id);
            room.invitees.remove(&user_id);
            destroy = room.members.is_empty();
        }
        if destroy {
            self.rooms.remove(&chat_id);
            tracing::debug!(chat_id, "empty chat room destroyed");
        }
    }

    /// Remove a user from every room (session teardown); returns the
    /// rooms they were in
    pub fn leave_all(&self, user_id: u16) -> Vec<u32> {
        let affected: Vec<u32> = self
            .rooms
            .iter()
            .filter(|e| e.value().members.contains(&user_id) || e.value().invitees.contains(&user_id))
            .map(|e| *e.key())
            .collect();
        for chat_id in &affected {
            self.leave(*chat_id, user_id);
        }
        affected
    }

    /// Member ids of a room
    #[must_use]
    pub fn members(&self, chat_id: u32) -> Vec<u16> {
        self.rooms
            .get(&chat_id)
            .map(|r| r.members.iter().copied().collect())
            .unwrap_or_default()
    }

    /// True when the user has joined the room
    #[must_use]
    pub fn is_member(&self, chat_id: u32, user_id: u16) -> bool {
        self.rooms
            .get(&chat_id)
            .is_some_and(|r| r.members.contains(&user_id))
    }

    /// True when the user has been invited (or already joined)
    #[must_use]
    pub fn may_join(&self, chat_id: u32, user_id: u16) -> bool {
        self.rooms
            .get(&chat_id)
            .is_some_and(|r| r.invitees.contains(&user_id) || r.members.contains(&user_id))
    }

    /// Set a room's subject; returns false for an unknown room
    pub fn set_subject(&self, chat_id: u32, subject: &[u8]) -> bool {
        match self.rooms.get_mut(&chat_id) {
            Some(mut room) => {
                room.subject = subject.to_vec();
                true
            }
            None => false,
        }
    }

    /// A room's subject
    #[must_use]
    pub fn subject(&self, chat_id: u32) -> Vec<u8> {
        self.rooms
            .get(&chat_id)
            .map(|r| r.subject.clone())
            .unwrap_or_default()
    }

    /// Number of live rooms
    #[must_use]
    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    /// True when no rooms exist
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }
}
