use reqwest::Response;
use serde_json::Value;
use std::fmt;

/// Configuration for API requests
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub api_url: Option<String>,
    pub api_key: Option<String>,
    pub headers: Option<Value>,
}

impl ApiConfig {
    /// Creates a new ApiConfig with minimal required parameters
    pub fn new(api_url: Option<String>, api_key: Option<String>, headers: Option<Value>) -> Self {
        Self {
            api_url,
            api_key,
            headers,
        }
    }
}

/// Response wrapper for API calls
#[derive(Debug)]
pub struct ApiResponse {
    /// The response content
    pub content: String,
    /// Indicates if this is an error message
    pub is_error: bool,
    /// Raw response for stream processing
    pub raw_response: Option<Response>,
}

impl ApiResponse {
    /// Creates a new successful response
    pub fn success(content: String) -> Self {
        Self {
            content,
            is_error: false,
            raw_response: None,
        }
    }

    /// Creates a new successful stream response
    pub fn success_stream(response: Response) -> Self {
        Self {
            content: String::new(),
            is_error: false,
            raw_response: Some(response),
        }
    }

    /// Creates a new error response
    pub fn error(message: String) -> Self {
        Self {
            content: message,
            is_error: true,
            raw_response: None,
        }
    }
}

/// Represents different error response formats
#[derive(Clone)]
pub enum ErrorFormat {
    /// Ollama format: `{"error": "..."}`
    Ollama,
    /// OpenAI format: `{"error": {"type": "...", "message": "..."}}`
    OpenAI,
}

impl fmt::Debug for ErrorFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ollama => write!(f, "ErrorFormat::Ollama"),
            Self::OpenAI => write!(f, "ErrorFormat::OpenAI"),
        }
    }
}

impl Default for ErrorFormat {
    fn default() -> Self {
        Self::Ollama
    }
}

impl ErrorFormat {
    /// Parse error message from response
    ///
    /// Returns (error_type, error_message) if parsing succeeds
    pub fn parse_error(&self, error_text: &str) -> Option<(String, String)> {
        match self {
            Self::Ollama => {
                if let Ok(json) = serde_json::from_str::<Value>(error_text) {
                    json.get("error")
                        .and_then(Value::as_str)
                        .map(|message| ("error".to_string(), message.to_string()))
                } else {
                    None
                }
            }
            Self::OpenAI => {
                if let Ok(json) = serde_json::from_str::<Value>(error_text) {
                    json.get("error").map(|error| {
                        (
                            error
                                .get("type")
                                .and_then(Value::as_str)
                                .unwrap_or("unknown")
                                .to_string(),
                            error
                                .get("message")
                                .and_then(Value::as_str)
                                .unwrap_or(error_text)
                                .to_string(),
                        )
                    })
                } else {
                    None
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ollama_error() {
        let parsed = ErrorFormat::Ollama.parse_error(r#"{"error":"model not found"}"#);
        assert_eq!(
            parsed,
            Some(("error".to_string(), "model not found".to_string()))
        );
    }

    #[test]
    fn parses_openai_error() {
        let parsed = ErrorFormat::OpenAI
            .parse_error(r#"{"error":{"type":"invalid_request_error","message":"bad model"}}"#);
        assert_eq!(
            parsed,
            Some((
                "invalid_request_error".to_string(),
                "bad model".to_string()
            ))
        );
    }

    #[test]
    fn non_json_error_is_none() {
        assert!(ErrorFormat::Ollama.parse_error("<html>502</html>").is_none());
    }
}
