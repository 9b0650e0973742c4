/// Default endpoint of a locally running Ollama service.
pub const DEFAULT_API_URL: &str = "http://localhost:11434";

/// Default model identifier sent with every chat request.
pub const DEFAULT_MODEL: &str = "deepseek-r1:1.5b";

/// Token usage keys used in the metadata of a finished notification.
pub const TOKENS: &str = "tokens";
pub const TOKENS_TOTAL: &str = "total";
pub const TOKENS_PROMPT: &str = "prompt";
pub const TOKENS_COMPLETION: &str = "completion";
pub const TOKENS_PER_SECOND: &str = "tokensPerSecond";
