use super::stoppable::Stoppable;
use crate::ai::error::AiError;
use async_trait::async_trait;
use log::warn;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::{default::Default, sync::Arc};

/// Kind of a notification sent from the request relay to the panel.
///
/// `Text` is a non-final fragment; the other three are terminal, and exactly
/// one terminal notification is sent per request.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    /// A plain-text error message; terminal.
    Error,
    /// The request completed; the chunk carries the full accumulated text.
    Finished,
    /// The request was cancelled; the chunk carries the text streamed so far.
    Stopped,
    /// A streamed fragment to append to the accumulator.
    Text,
}

impl Default for MessageType {
    fn default() -> Self {
        MessageType::Text
    }
}

impl<'de> Deserialize<'de> for MessageType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(MessageType::from_str(&s).unwrap_or_else(|| {
            warn!("Invalid message type: {}, defaulting to Text", s);
            MessageType::Text
        }))
    }
}

impl From<MessageType> for &str {
    fn from(value: MessageType) -> Self {
        match value {
            MessageType::Error => "error",
            MessageType::Finished => "finished",
            MessageType::Stopped => "stopped",
            MessageType::Text => "text",
        }
    }
}

impl MessageType {
    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "error" => Some(MessageType::Error),
            "finished" => Some(MessageType::Finished),
            "stopped" => Some(MessageType::Stopped),
            "text" => Some(MessageType::Text),
            _ => {
                warn!("Invalid message type: {}, returning Text", value);
                Some(MessageType::Text)
            }
        }
    }

    /// Whether this notification ends its request.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, MessageType::Text)
    }
}

/// A single notification for the panel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub chat_id: String,
    pub chunk: String,
    pub r#type: MessageType,
    pub metadata: Option<Value>,
}

impl ChatResponse {
    pub fn new_with_arc(
        chat_id: String,
        chunk: String,
        r#type: MessageType,
        metadata: Option<Value>,
    ) -> Arc<Self> {
        Arc::new(Self {
            chat_id,
            chunk,
            r#type,
            metadata,
        })
    }
}

/// Streaming chat backend.
///
/// Implementations send each produced fragment through `callback` as a `Text`
/// notification and finish with exactly one terminal notification, whether the
/// request completed, was stopped or failed.
#[async_trait]
pub trait AiChatTrait: Send + Sync + Stoppable {
    /// Sends a chat request and streams the response.
    ///
    /// # Arguments
    /// - `api_url`: Base URL of the chat service.
    /// - `model`: The model to be used for the chat.
    /// - `api_key`: Optional bearer token.
    /// - `chat_id`: Unique identifier for this request.
    /// - `messages`: The conversation, each message a JSON object with a
    ///   `role` and a `content` string.
    /// - `callback`: Receives every notification for this request.
    ///
    /// # Returns
    /// The full accumulated response text, or an error when the request
    /// failed. Failures are also reported through `callback` so callers may
    /// ignore the returned error.
    async fn chat(
        &self,
        api_url: &str,
        model: &str,
        api_key: Option<&str>,
        chat_id: String,
        messages: Vec<Value>,
        callback: impl Fn(Arc<ChatResponse>) + Send + 'static,
    ) -> Result<String, AiError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_type_round_trip() {
        for name in ["error", "finished", "stopped", "text"] {
            let parsed = MessageType::from_str(name).unwrap();
            let back: &str = parsed.into();
            assert_eq!(back, name);
        }
    }

    #[test]
    fn unknown_message_type_defaults_to_text() {
        assert_eq!(MessageType::from_str("plan"), Some(MessageType::Text));
    }

    #[test]
    fn terminal_kinds() {
        assert!(MessageType::Error.is_terminal());
        assert!(MessageType::Finished.is_terminal());
        assert!(MessageType::Stopped.is_terminal());
        assert!(!MessageType::Text.is_terminal());
    }

    #[test]
    fn serializes_lowercase() {
        let response = ChatResponse::new_with_arc(
            "id".to_string(),
            "hi".to_string(),
            MessageType::Finished,
            None,
        );
        let json = serde_json::to_value(&*response).unwrap();
        assert_eq!(json["type"], "finished");
        assert_eq!(json["chatId"], "id");
    }
}
