use thiserror::Error;

/// Errors raised while validating input or assembling a reply.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    #[error("invalid or missing {field}")]
    InvalidArgument { field: String },
    #[error("escape input of {len} bytes exceeds limit of {max} bytes")]
    EscapeInputTooLong { len: usize, max: usize },
    #[error("reply needs {needed} bytes but is limited to {max} bytes")]
    ReplyOverflow { needed: usize, max: usize },
    #[error("command template '{template}' requires an argument")]
    MissingArgument { template: String },
    #[error("command template '{template}' does not accept an argument")]
    UnexpectedArgument { template: String },
}

impl StorageError {
    /// Builds the validation failure for one named request field.
    pub fn invalid_argument(field: impl Into<String>) -> Self {
        Self::InvalidArgument {
            field: field.into(),
        }
    }
}
