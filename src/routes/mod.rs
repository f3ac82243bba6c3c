pub mod chat;
pub mod messages;
