//! Error handling for Quill

use crate::utils::Span;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Compiler error
///
/// Both front-end error kinds are fatal: the first one raised aborts the pass.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Syntax error at {span}: {message}")]
    Syntax { message: String, span: Span },

    #[error("Semantic error at {span}: {message}")]
    Semantic { message: String, span: Span },
}

impl Error {
    pub fn syntax(message: impl Into<String>, span: Span) -> Self {
        Self::Syntax {
            message: message.into(),
            span,
        }
    }

    pub fn semantic(message: impl Into<String>, span: Span) -> Self {
        Self::Semantic {
            message: message.into(),
            span,
        }
    }

    /// Get the span associated with this error
    pub fn span(&self) -> Span {
        match self {
            Self::Syntax { span, .. } | Self::Semantic { span, .. } => *span,
        }
    }

    /// The bare message, without location prefix
    pub fn message(&self) -> &str {
        match self {
            Self::Syntax { message, .. } | Self::Semantic { message, .. } => message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_location() {
        let err = Error::semantic("Identifier f not declared", Span::new(0, 1, 3, 7));
        assert_eq!(err.to_string(), "Semantic error at 3:7: Identifier f not declared");
        assert_eq!(err.message(), "Identifier f not declared");
        assert_eq!(err.span(), Span::new(0, 1, 3, 7));
    }

    #[test]
    fn test_every_error_is_located() {
        let errors = [
            Error::syntax("Expected ';', found '}'", Span::new(8, 9, 1, 9)),
            Error::semantic("Break can only appear in a loop", Span::new(0, 5, 1, 1)),
        ];
        for err in &errors {
            assert!(err.to_string().starts_with(&format!("{} error at {}: ", kind(err), err.span())));
            assert!(err.to_string().ends_with(err.message()));
        }
    }

    fn kind(err: &Error) -> &'static str {
        match err {
            Error::Syntax { .. } => "Syntax",
            Error::Semantic { .. } => "Semantic",
        }
    }
}
