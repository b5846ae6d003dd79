//! Error types shared across PromoReel crates.

/// Top-level error type for PromoReel operations.
#[derive(Debug, thiserror::Error)]
pub enum PromoreelError {
    #[error("Layout error: {message}")]
    Layout { message: String },

    #[error("Probe error: {message}")]
    Probe { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using PromoreelError.
pub type PromoreelResult<T> = Result<T, PromoreelError>;

impl PromoreelError {
    pub fn layout(msg: impl Into<String>) -> Self {
        Self::Layout {
            message: msg.into(),
        }
    }

    pub fn probe(msg: impl Into<String>) -> Self {
        Self::Probe {
            message: msg.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_helper_messages() {
        assert_eq!(
            PromoreelError::layout("budget too small").to_string(),
            "Layout error: budget too small"
        );
        assert_eq!(
            PromoreelError::probe("no streams").to_string(),
            "Probe error: no streams"
        );
    }

    #[test]
    fn test_json_errors_convert() {
        let err: PromoreelError = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert!(matches!(err, PromoreelError::Json(_)));
    }
}
