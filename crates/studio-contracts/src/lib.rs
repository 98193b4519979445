pub mod chat;
pub mod encoded;
pub mod events;
pub mod mode;
pub mod presenter;
pub mod prompts;
pub mod session;
pub mod upload;
