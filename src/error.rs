use thiserror::Error;

/// The single, unified error type for the entire application.
///
/// This enum wraps all module-specific errors, providing a consistent
/// structure for error handling across the crate.
#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Ai(#[from] crate::ai::error::AiError),

    #[error(transparent)]
    Settings(#[from] crate::settings::SettingsError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A universal Result type for fallible functions in this crate.
pub type Result<T> = std::result::Result<T, AppError>;
