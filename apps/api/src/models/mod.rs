pub mod chat;
pub mod consultation;
