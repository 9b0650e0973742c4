pub mod ollama;
pub mod openai;

use std::sync::Arc;

use serde_json::{json, Value};

use crate::ai::network::{StreamChunk, TokenUsage};
use crate::ai::traits::chat::{ChatResponse, MessageType};
use crate::constants::{TOKENS, TOKENS_COMPLETION, TOKENS_PER_SECOND, TOKENS_PROMPT, TOKENS_TOTAL};

/// Appends fragment contents to the accumulator and forwards each as a `Text`
/// notification; remembers the last reported token usage.
fn forward_fragments(
    chat_id: &str,
    chunks: Vec<StreamChunk>,
    full_response: &mut String,
    token_usage: &mut TokenUsage,
    callback: &(impl Fn(Arc<ChatResponse>) + Send + 'static),
) {
    for chunk in chunks {
        if let Some(usage) = chunk.usage {
            *token_usage = usage;
        }
        if let Some(content) = chunk.content {
            if !content.is_empty() {
                full_response.push_str(&content);
                callback(ChatResponse::new_with_arc(
                    chat_id.to_string(),
                    content,
                    MessageType::Text,
                    None,
                ));
            }
        }
    }
}

/// Builds the token usage metadata attached to a finished notification.
fn usage_metadata(token_usage: &TokenUsage) -> Value {
    let mut tokens = serde_json::Map::new();
    tokens.insert(TOKENS_TOTAL.to_string(), json!(token_usage.total_tokens));
    tokens.insert(TOKENS_PROMPT.to_string(), json!(token_usage.prompt_tokens));
    tokens.insert(
        TOKENS_COMPLETION.to_string(),
        json!(token_usage.completion_tokens),
    );
    tokens.insert(
        TOKENS_PER_SECOND.to_string(),
        json!(token_usage.tokens_per_second),
    );

    let mut metadata = serde_json::Map::new();
    metadata.insert(TOKENS.to_string(), Value::Object(tokens));
    Value::Object(metadata)
}
