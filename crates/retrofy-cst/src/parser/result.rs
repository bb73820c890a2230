use crate::Span;
use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

pub(super) type Result<T> = std::result::Result<T, ParseError>;

/// There was a problem parsing the source.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("syntax error at byte {}: {message}", span.start_offset)]
pub struct ParseError {
    /// Where the error occurred.
    pub span: Span,
    /// What went wrong.
    pub message: String,
}

impl ParseError {
    pub(crate) fn new(span: Span, message: impl Into<String>) -> Self {
        Self {
            span,
            message: message.into(),
        }
    }

    /// Create a pretty error report.
    pub fn into_report(self, name: impl AsRef<str>, input: String) -> ParseErrorReport {
        let input = if input.is_empty() {
            // miette needs at least one line to point at
            NamedSource::new(name, String::from("\n"))
        } else {
            NamedSource::new(name, input)
        };
        let location = (
            self.span.start_offset,
            self.span.end_offset.saturating_sub(self.span.start_offset),
        )
            .into();
        ParseErrorReport {
            input,
            location,
            message: self.message,
        }
    }
}

/// A pretty parsing error.
#[derive(Error, Debug, Diagnostic)]
#[error("syntax error")]
#[diagnostic(severity(Error))]
pub struct ParseErrorReport {
    /// The offending input.
    #[source_code]
    pub input: NamedSource,
    /// Where the error occurred.
    #[label("{message}")]
    pub location: SourceSpan,
    /// What went wrong.
    pub message: String,
}
