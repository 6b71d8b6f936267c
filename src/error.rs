use thiserror::Error;

/// Request-facing error kinds
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad or missing input; reported to the caller verbatim
    #[error("{0}")]
    Validation(String),

    /// Store failure; the cause is logged server-side only
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation(message.into())
    }
}

pub type AppResult<T> = std::result::Result<T, AppError>;
