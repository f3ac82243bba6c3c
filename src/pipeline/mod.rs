pub mod attachments;
pub mod context;
pub mod extract;
pub mod generate;
pub mod normalize;
pub mod vision;
