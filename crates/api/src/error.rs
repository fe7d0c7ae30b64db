#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Invalid type reference `{input}`: {reason}")]
    InvalidType { input: String, reason: String },
    #[error("Component path must not be empty")]
    EmptyComponentPath,
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;
