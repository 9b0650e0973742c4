pub mod chat;
pub mod stoppable;
