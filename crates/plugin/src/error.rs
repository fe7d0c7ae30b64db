use thiserror::Error;

#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid declaration file: {0}")]
    Json(#[from] serde_json::Error),
    #[error("type `{0}` is declared more than once")]
    DuplicateType(String),
}

pub type Result<T> = std::result::Result<T, RepositoryError>;
