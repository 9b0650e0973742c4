use bytes::Bytes;
use serde::Deserialize;
use serde_json::Value;

use crate::ai::traits::chat::MessageType;

/// Represents different types of stream response formats
#[derive(Debug, Clone, Copy)]
pub enum StreamFormat {
    /// Ollama native format, one JSON object per line:
    /// `{"message":{"content":"Hello"},"done":false}`
    Ollama,

    /// OpenAI compatible SSE format:
    /// `data: {"choices":[{"delta":{"content":"Hello"},"index":0}]}`
    OpenAI,
}

/// Token usage information
#[derive(Debug, Default, Clone, PartialEq)]
pub struct TokenUsage {
    pub total_tokens: u64,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    /// The speed of token generation in tokens per second (tokens/s)
    pub tokens_per_second: f64,
}

/// Stream chunk parsing result
#[derive(Debug)]
pub struct StreamChunk {
    /// The content of the chunk
    pub content: Option<String>,
    /// Token usage information
    pub usage: Option<TokenUsage>,
    /// Message type when the chunk signals a terminal condition
    pub msg_type: Option<MessageType>,
}

#[derive(Debug, Deserialize)]
struct OllamaStreamResponse {
    #[serde(default)]
    message: Option<OllamaMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    prompt_eval_count: Option<u64>,
    #[serde(default)]
    eval_count: Option<u64>,
    #[serde(default)]
    eval_duration: Option<u64>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OllamaMessage {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct OpenAIStreamResponse {
    #[serde(default)]
    choices: Vec<OpenAIStreamChoice>,
    #[serde(default)]
    usage: Option<OpenAIUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAIStreamChoice {
    delta: OpenAIDelta,
}

#[derive(Debug, Deserialize)]
struct OpenAIDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIUsage {
    #[serde(default)]
    total_tokens: u64,
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

/// Stream response parser.
///
/// HTTP chunk boundaries do not align with line boundaries, so the parser
/// buffers the trailing partial line between calls to [`Self::push`].
pub struct StreamParser {
    format: StreamFormat,
    buf: String,
}

impl StreamParser {
    pub fn new(format: StreamFormat) -> Self {
        Self {
            format,
            buf: String::new(),
        }
    }

    /// Feeds a raw response chunk to the parser and returns the chunks parsed
    /// from every completed line.
    ///
    /// An error payload embedded in the stream is returned as `Err` with a
    /// plain-text message; unparseable lines are logged and skipped.
    pub fn push(&mut self, chunk: Bytes) -> Result<Vec<StreamChunk>, String> {
        // Lossy conversion keeps the stream alive on invalid UTF-8 sequences.
        self.buf.push_str(&String::from_utf8_lossy(&chunk));

        let mut chunks = Vec::new();
        while let Some(pos) = self.buf.find('\n') {
            let line: String = self.buf.drain(..=pos).collect();
            self.parse_line(line.trim_end(), &mut chunks)?;
        }
        Ok(chunks)
    }

    /// Flushes the remaining buffered partial line once the stream is
    /// exhausted.
    pub fn finish(&mut self) -> Result<Vec<StreamChunk>, String> {
        let rest = std::mem::take(&mut self.buf);
        let mut chunks = Vec::new();
        self.parse_line(rest.trim_end(), &mut chunks)?;
        Ok(chunks)
    }

    fn parse_line(&self, line: &str, chunks: &mut Vec<StreamChunk>) -> Result<(), String> {
        if line.is_empty() {
            return Ok(());
        }
        match self.format {
            StreamFormat::Ollama => Self::parse_ollama(line, chunks),
            StreamFormat::OpenAI => Self::parse_openai(line, chunks),
        }
    }

    /// Parse one line of Ollama NDJSON
    fn parse_ollama(line: &str, chunks: &mut Vec<StreamChunk>) -> Result<(), String> {
        match serde_json::from_str::<OllamaStreamResponse>(line) {
            Ok(response) => {
                if let Some(error) = response.error {
                    return Err(error);
                }

                if let Some(message) = response.message {
                    if !message.content.is_empty() {
                        chunks.push(StreamChunk {
                            content: Some(message.content),
                            usage: None,
                            msg_type: None,
                        });
                    }
                }

                if response.done {
                    let completion = response.eval_count.unwrap_or_default();
                    let prompt = response.prompt_eval_count.unwrap_or_default();
                    let tokens_per_second = match response.eval_duration {
                        Some(ns) if ns > 0 => completion as f64 / (ns as f64 / 1e9),
                        _ => 0.0,
                    };
                    chunks.push(StreamChunk {
                        content: None,
                        usage: Some(TokenUsage {
                            total_tokens: prompt + completion,
                            prompt_tokens: prompt,
                            completion_tokens: completion,
                            tokens_per_second,
                        }),
                        msg_type: Some(MessageType::Finished),
                    });
                }
            }
            Err(e) => {
                if let Ok(json) = serde_json::from_str::<Value>(line) {
                    if let Some(error) = json.get("error") {
                        let emsg = error
                            .as_str()
                            .map(String::from)
                            .unwrap_or_else(|| "Unknown Error".to_string());
                        return Err(emsg);
                    }
                }
                log::error!("Failed to parse Ollama response: {}, error:{}", line, e);
            }
        }
        Ok(())
    }

    /// Parse one line of an OpenAI compatible SSE stream
    fn parse_openai(line: &str, chunks: &mut Vec<StreamChunk>) -> Result<(), String> {
        let Some(data) = line.strip_prefix("data:") else {
            // SSE comments and event lines carry no payload here
            return Ok(());
        };
        let data = data.trim();
        if data == "[DONE]" {
            chunks.push(StreamChunk {
                content: None,
                usage: None,
                msg_type: Some(MessageType::Finished),
            });
            return Ok(());
        }

        match serde_json::from_str::<OpenAIStreamResponse>(data) {
            Ok(response) => {
                let usage = response.usage.as_ref().map(|usage| TokenUsage {
                    total_tokens: usage.total_tokens,
                    prompt_tokens: usage.prompt_tokens,
                    completion_tokens: usage.completion_tokens,
                    tokens_per_second: 0.0,
                });

                for choice in response.choices {
                    chunks.push(StreamChunk {
                        content: choice.delta.content,
                        usage: usage.clone(),
                        msg_type: None,
                    });
                }

                // usage-only final frame, no choices
                if let Some(usage) = usage {
                    if chunks.is_empty() {
                        chunks.push(StreamChunk {
                            content: None,
                            usage: Some(usage),
                            msg_type: None,
                        });
                    }
                }
            }
            Err(e) => {
                if let Ok(json) = serde_json::from_str::<Value>(data) {
                    if let Some(error) = json.get("error") {
                        let emsg = error["message"]
                            .as_str()
                            .map(String::from)
                            .unwrap_or_else(|| "Unknown Error".to_string());
                        return Err(emsg);
                    }
                }
                log::error!("Failed to parse OpenAI response: {}, error:{}", data, e);
            }
        }
        Ok(())
    }
}
