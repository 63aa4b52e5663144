//! API client module for the Talk to Refugee backend

mod chat;
pub mod client;
mod interlocutor;

pub use chat::{
    create_chat, list_chats, list_chats_data, preview, read_messages, read_messages_data,
    send_message, send_message_with_client,
};
pub use interlocutor::{
    get_profile_data, print_profile, search, show_profile, sign_in_data, sign_up,
    update_profile_data,
};
