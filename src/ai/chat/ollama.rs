use async_trait::async_trait;
use reqwest::Response;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::Mutex;

use super::{forward_fragments, usage_metadata};
use crate::ai::error::AiError;
use crate::ai::network::{
    ApiClient, ApiConfig, DefaultApiClient, ErrorFormat, StreamFormat, StreamParser, TokenUsage,
};
use crate::ai::traits::chat::{AiChatTrait, ChatResponse, MessageType};
use crate::ai::traits::stoppable::Stoppable;
use crate::impl_stoppable;

const PROVIDER: &str = "ollama";

/// Chat implementation for the native Ollama `/api/chat` endpoint.
#[derive(Clone)]
pub struct OllamaChat {
    stop_flag: Arc<Mutex<bool>>,
    client: DefaultApiClient,
}

impl OllamaChat {
    pub fn new() -> Self {
        Self {
            stop_flag: Arc::new(Mutex::new(false)),
            client: DefaultApiClient::new(ErrorFormat::Ollama),
        }
    }

    /// Consumes the NDJSON stream, forwarding each fragment and finishing
    /// with exactly one terminal notification.
    ///
    /// The stop flag is checked between successive chunks; once it is
    /// observed no further fragments are forwarded and a single `Stopped`
    /// notification carries the text streamed so far.
    async fn handle_stream_response(
        &self,
        chat_id: String,
        mut response: Response,
        callback: impl Fn(Arc<ChatResponse>) + Send + 'static,
    ) -> Result<String, AiError> {
        let mut parser = StreamParser::new(StreamFormat::Ollama);
        let mut full_response = String::new();
        let mut token_usage = TokenUsage::default();

        loop {
            let bytes = match response.chunk().await {
                Ok(Some(bytes)) => bytes,
                Ok(None) => break,
                Err(e) => {
                    let details = format!("failed to read stream: {}", e);
                    callback(ChatResponse::new_with_arc(
                        chat_id,
                        details.clone(),
                        MessageType::Error,
                        None,
                    ));
                    return Err(AiError::StreamProcessingFailed {
                        provider: PROVIDER.to_string(),
                        details,
                    });
                }
            };

            if self.should_stop().await {
                callback(ChatResponse::new_with_arc(
                    chat_id,
                    full_response.clone(),
                    MessageType::Stopped,
                    None,
                ));
                return Ok(full_response);
            }

            match parser.push(bytes) {
                Ok(chunks) => forward_fragments(
                    &chat_id,
                    chunks,
                    &mut full_response,
                    &mut token_usage,
                    &callback,
                ),
                Err(details) => {
                    callback(ChatResponse::new_with_arc(
                        chat_id,
                        details.clone(),
                        MessageType::Error,
                        None,
                    ));
                    return Err(AiError::ResponseParseFailed {
                        provider: PROVIDER.to_string(),
                        details,
                    });
                }
            }
        }

        match parser.finish() {
            Ok(chunks) => forward_fragments(
                &chat_id,
                chunks,
                &mut full_response,
                &mut token_usage,
                &callback,
            ),
            Err(details) => {
                callback(ChatResponse::new_with_arc(
                    chat_id,
                    details.clone(),
                    MessageType::Error,
                    None,
                ));
                return Err(AiError::ResponseParseFailed {
                    provider: PROVIDER.to_string(),
                    details,
                });
            }
        }

        callback(ChatResponse::new_with_arc(
            chat_id,
            full_response.clone(),
            MessageType::Finished,
            Some(usage_metadata(&token_usage)),
        ));
        Ok(full_response)
    }
}

impl_stoppable!(OllamaChat);

#[async_trait]
impl AiChatTrait for OllamaChat {
    async fn chat(
        &self,
        api_url: &str,
        model: &str,
        api_key: Option<&str>,
        chat_id: String,
        messages: Vec<Value>,
        callback: impl Fn(Arc<ChatResponse>) + Send + 'static,
    ) -> Result<String, AiError> {
        let response = self
            .client
            .post_request(
                &ApiConfig::new(Some(api_url.to_string()), api_key.map(String::from), None),
                "api/chat",
                json!({
                    "model": model,
                    "messages": messages,
                    "stream": true,
                }),
                true,
            )
            .await;

        let response = match response {
            Ok(response) => response,
            Err(details) => {
                callback(ChatResponse::new_with_arc(
                    chat_id,
                    details.clone(),
                    MessageType::Error,
                    None,
                ));
                return Err(AiError::ApiRequestFailed {
                    provider: PROVIDER.to_string(),
                    details,
                });
            }
        };

        if response.is_error {
            callback(ChatResponse::new_with_arc(
                chat_id,
                response.content.clone(),
                MessageType::Error,
                None,
            ));
            return Err(AiError::ApiRequestFailed {
                provider: PROVIDER.to_string(),
                details: response.content,
            });
        }

        if let Some(raw_response) = response.raw_response {
            self.handle_stream_response(chat_id, raw_response, callback)
                .await
        } else {
            // Non-streaming fallback, the whole body arrived at once.
            callback(ChatResponse::new_with_arc(
                chat_id,
                response.content.clone(),
                MessageType::Finished,
                None,
            ));
            Ok(response.content)
        }
    }
}
