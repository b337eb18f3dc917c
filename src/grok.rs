pub mod chat;
pub mod client;
