pub mod attachment;
pub mod chat;
pub mod message;

pub use attachment::{Attachment, AttachmentText};
pub use chat::Chat;
pub use message::Message;
