use miette::{Diagnostic, NamedSource, SourceSpan};
use retrofy_cst::{ParseError, Span};
use thiserror::Error;

/// Source that can't be rewritten.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DesugarError {
    /// A construct with no older equivalent.
    #[error("{what} is not supported")]
    UnsupportedConstruct {
        /// Where the construct starts.
        span: Span,
        /// What it is.
        what: String,
    },
    /// An inline assignment to something other than a name.
    #[error("complex targets not supported in inline assignments")]
    ComplexTarget {
        /// Where the target starts.
        span: Span,
    },
}

impl DesugarError {
    pub(crate) fn unsupported(span: Span, what: impl Into<String>) -> Self {
        Self::UnsupportedConstruct {
            span,
            what: what.into(),
        }
    }

    /// Where the error occurred.
    pub fn span(&self) -> Span {
        match self {
            Self::UnsupportedConstruct { span, .. } | Self::ComplexTarget { span } => *span,
        }
    }

    /// Create a pretty error report.
    pub fn into_report(self, name: impl AsRef<str>, input: String) -> DesugarErrorReport {
        let span = self.span();
        DesugarErrorReport {
            input: NamedSource::new(name, input),
            location: (
                span.start_offset,
                span.end_offset.saturating_sub(span.start_offset),
            )
                .into(),
            message: self.to_string(),
        }
    }
}

/// A pretty desugaring error.
#[derive(Error, Debug, Diagnostic)]
#[error("{message}")]
#[diagnostic(severity(Error))]
pub struct DesugarErrorReport {
    /// The offending input.
    #[source_code]
    pub input: NamedSource,
    /// Where the error occurred.
    #[label("here")]
    pub location: SourceSpan,
    /// What went wrong.
    pub message: String,
}

/// Anything that stops a conversion.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// The input isn't valid Python.
    #[error(transparent)]
    Parse(#[from] ParseError),
    /// The input can't be rewritten.
    #[error(transparent)]
    Desugar(#[from] DesugarError),
}

impl Error {
    /// Create a pretty error report.
    pub fn into_report(self, name: impl AsRef<str>, input: String) -> miette::Report {
        match self {
            Self::Parse(err) => err.into_report(name, input).into(),
            Self::Desugar(err) => err.into_report(name, input).into(),
        }
    }
}
