use thiserror::Error;

#[derive(Error, Debug)]
pub enum AiError {
    #[error("chat request to {provider} failed: {details}")]
    ApiRequestFailed { provider: String, details: String },

    #[error("failed to parse {provider} response: {details}")]
    ResponseParseFailed { provider: String, details: String },

    #[error("stream processing for {provider} failed: {details}")]
    StreamProcessingFailed { provider: String, details: String },
}
