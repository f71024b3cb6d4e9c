//! Domain types shared by the runtime and its adapters.

mod chat;

pub use chat::{ChatMessage, ChatOptions, MessageRole};
