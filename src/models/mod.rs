//! Data models for Talk to Refugee entities

mod chat;
mod interlocutor;
mod message;

pub use chat::*;
pub use interlocutor::*;
pub use message::*;
