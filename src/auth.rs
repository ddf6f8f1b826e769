//! Sender allow-list gate.

use std::collections::HashSet;

use crate::update::TelegramMessage;

/// Decide whether a sender may create tasks.
///
/// With both allow-sets empty every sender is authorized. Otherwise the
/// message must name a chat id or sender id on the lists; a missing
/// message, chat, or sender is denied.
pub fn is_authorized(
    message: Option<&TelegramMessage>,
    allowed_users: &HashSet<i64>,
    allowed_chats: &HashSet<i64>,
) -> bool {
    if allowed_users.is_empty() && allowed_chats.is_empty() {
        return true;
    }
    let Some(message) = message else {
        return false;
    };
    let chat_allowed = message
        .chat
        .as_ref()
        .is_some_and(|chat| allowed_chats.contains(&chat.id));
    let user_allowed = message
        .from
        .as_ref()
        .is_some_and(|user| allowed_users.contains(&user.id));
    chat_allowed || user_allowed
}

// ── Tests ───────────────────────────────────────────────────────────
