use serde::{Deserialize, Serialize};

/// A source span.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Span {
    /// The start byte offset.
    pub start_offset: usize,
    /// The end byte offset.
    pub end_offset: usize,
}

impl Span {
    /// Merge two spans, returning a new [Span] spanning `self` and `other`.
    #[must_use]
    pub fn merge(&self, other: &Self) -> Self {
        Self {
            start_offset: self.start_offset.min(other.start_offset),
            end_offset: self.end_offset.max(other.end_offset),
        }
    }
}

/// A syntactic element.
///
/// Each token consists of its source location, the trivia that precedes it on
/// the same logical line, and the token text itself.
///
/// ```python
/// foo(  # trivia of `bar`
///     bar)
/// ```
///
/// Trivia is anything the grammar doesn't care about: spaces, comments inside
/// brackets, line continuations and newlines inside brackets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    /// The source location of this token.
    ///
    /// Tokens that were built rather than parsed have an empty span.
    pub span: Span,
    /// Whitespace and comments preceding the token.
    pub leading_trivia: String,
    /// The token text.
    pub text: String,
}

impl Token {
    /// Build a token with no leading trivia.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            span: Span::default(),
            leading_trivia: String::new(),
            text: text.into(),
        }
    }

    /// Build a token preceded by a single space.
    pub fn spaced(text: impl Into<String>) -> Self {
        Self::new(text).with_leading_trivia(" ")
    }

    /// Replace the leading trivia of this token.
    #[must_use]
    pub fn with_leading_trivia(mut self, trivia: impl Into<String>) -> Self {
        self.leading_trivia = trivia.into();
        self
    }

    /// Does the leading trivia contain a comment?
    pub fn has_comments(&self) -> bool {
        self.leading_trivia.contains('#')
    }

    /// Is this token the given text?
    pub fn is(&self, text: &str) -> bool {
        self.text == text
    }
}

/// A line holding nothing but (optional) whitespace and an optional comment.
///
/// These hang off the statement (or block) that follows them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmptyLine {
    /// Whether the line starts with the indentation of the block it belongs to.
    ///
    /// Indented lines are re-indented when rendered, so they follow a statement
    /// that moves between blocks.
    pub indent: bool,
    /// Whitespace after the block indentation (or all of it, if `indent` is false).
    pub whitespace: String,
    /// The comment, including the leading `#`.
    pub comment: Option<String>,
    /// The line ending, empty for a last line without one.
    pub newline: String,
}

impl EmptyLine {
    /// A blank line.
    pub fn blank() -> Self {
        Self {
            indent: false,
            whitespace: String::new(),
            comment: None,
            newline: String::from("\n"),
        }
    }

    /// Split a raw line into an [EmptyLine], relative to `indentation`.
    pub(crate) fn from_raw(whitespace: &str, rest: &str, indentation: &str) -> Self {
        let (indent, whitespace) = match whitespace.strip_prefix(indentation) {
            Some(remainder) if !indentation.is_empty() => (true, remainder),
            _ => (false, whitespace),
        };
        let newline_start = rest.find(['\r', '\n']).unwrap_or(rest.len());
        let (comment, newline) = rest.split_at(newline_start);
        Self {
            indent,
            whitespace: whitespace.to_owned(),
            comment: if comment.is_empty() {
                None
            } else {
                Some(comment.to_owned())
            },
            newline: newline.to_owned(),
        }
    }

    /// Is this line a comment line?
    pub fn is_comment(&self) -> bool {
        self.comment.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::EmptyLine;

    #[test]
    fn it_splits_raw_lines() {
        let line = EmptyLine::from_raw("        ", "# hi\n", "    ");
        assert!(line.indent);
        assert_eq!(line.whitespace, "    ");
        assert_eq!(line.comment.as_deref(), Some("# hi"));
        assert_eq!(line.newline, "\n");

        let line = EmptyLine::from_raw("  ", "\r\n", "    ");
        assert!(!line.indent);
        assert_eq!(line.whitespace, "  ");
        assert!(line.comment.is_none());
        assert_eq!(line.newline, "\r\n");

        let line = EmptyLine::from_raw("", "", "");
        assert!(!line.indent);
        assert_eq!(line.newline, "");
    }
}
