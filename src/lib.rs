//! Inbox Relay — Telegram webhook to Todoist task relay.

pub mod auth;
pub mod config;
pub mod dedupe;
pub mod error;
pub mod normalize;
pub mod server;
pub mod telegram;
pub mod todoist;
pub mod transcribe;
pub mod update;
