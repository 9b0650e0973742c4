pub mod chat;
pub mod error;
pub mod interaction;
pub mod network;
pub mod traits;
