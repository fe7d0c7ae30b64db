use thiserror::Error;

#[derive(Error, Debug)]
pub enum BindscopeError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization/deserialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Repository error: {0}")]
    Repository(#[from] bindscope_plugin::RepositoryError),

    #[error("Malformed declaration {element}: {reason}")]
    MalformedDeclaration { element: String, reason: String },

    #[error("Type resolution error in {element}: {ty} could not be resolved")]
    TypeResolution { element: String, ty: String },

    #[error("{0} is not available yet")]
    NotYetAvailable(String),

    #[error("Unknown type: {0}")]
    UnknownType(String),

    #[error("Invalid value `{value}` for option {key}")]
    InvalidOption { key: String, value: String },

    #[error("Node is not part of the binding graph: {0}")]
    NodeNotInGraph(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl BindscopeError {
    pub fn malformed(element: impl ToString, reason: impl Into<String>) -> Self {
        BindscopeError::MalformedDeclaration {
            element: element.to_string(),
            reason: reason.into(),
        }
    }

    /// User-facing declaration problems, as opposed to engine failures.
    pub fn is_declaration_error(&self) -> bool {
        matches!(
            self,
            BindscopeError::MalformedDeclaration { .. } | BindscopeError::TypeResolution { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, BindscopeError>;
