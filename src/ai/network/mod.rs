mod client;
mod stream;
mod types;

pub use client::{ApiClient, DefaultApiClient};
pub use stream::{StreamChunk, StreamFormat, StreamParser, TokenUsage};
pub use types::*;
