use std::path::PathBuf;

/// Central error type for repoman.
#[derive(Debug, thiserror::Error)]
pub enum RepomanError {
    #[error("authentication failed: {message}")]
    AuthFailed { message: String },

    #[error("unable to find {owner:?} as user or organization")]
    OwnerNotFound { owner: String },

    #[error("API error ({status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("rate limited by {host}, retry after {retry_after_secs}s")]
    RateLimited { host: String, retry_after_secs: u64 },

    #[error("git error: {message}")]
    GitError { message: String },

    #[error("path not found: {path}")]
    PathNotFound { path: PathBuf },

    #[error("not a directory: {path}")]
    NotADirectory { path: PathBuf },

    #[error("config error: {message}")]
    Config { message: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("credential error: {message}")]
    CredentialError { message: String },

    #[error("{0}")]
    CommandParse(String),

    #[error("{0}")]
    Other(String),
}

