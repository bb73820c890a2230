mod expression;
mod pattern;
mod result;
mod statement;

use crate::{
    lexer::{tokenize, Lexeme, TokenKind},
    EmptyLine, Expression, Module, Token,
};
pub use result::*;

/// Hard keywords, which are never names.
const KEYWORDS: &[&str] = &[
    "False", "None", "True", "and", "as", "assert", "async", "await", "break", "class",
    "continue", "def", "del", "elif", "else", "except", "finally", "for", "from", "global", "if",
    "import", "in", "is", "lambda", "nonlocal", "not", "or", "pass", "raise", "return", "try",
    "while", "with", "yield",
];

/// Keywords that can still start an expression.
const EXPRESSION_KEYWORDS: &[&str] = &["False", "None", "True", "await", "lambda", "not", "yield"];

impl Module {
    /// Parse a module.
    pub fn parse(input: &str) -> std::result::Result<Self, ParseError> {
        let mut parser = Parser::new(input)?;
        parser.parse_module()
    }
}

impl Expression {
    /// Parse a single expression, for building trees from source snippets.
    pub fn parse(input: &str) -> std::result::Result<Self, ParseError> {
        let mut parser = Parser::new(input)?;
        let expression = parser.parse_star_expressions()?;
        parser.expect_kind(TokenKind::Newline)?;
        parser.expect_kind(TokenKind::EndOfFile)?;
        Ok(expression)
    }
}

/// A recursive descent parser over the lexeme stream, with cheap backtracking.
pub(crate) struct Parser {
    lexemes: Vec<Lexeme>,
    position: usize,
    /// Absolute indentation of each open block.
    indents: Vec<String>,
    /// Blank lines seen but not yet claimed by a statement.
    pending_lines: Vec<Lexeme>,
}

impl Parser {
    fn new(input: &str) -> Result<Self> {
        Ok(Self {
            lexemes: tokenize(input)?,
            position: 0,
            indents: vec![String::new()],
            pending_lines: Vec::new(),
        })
    }

    fn parse_module(&mut self) -> Result<Module> {
        let default_indent = self
            .lexemes
            .iter()
            .find(|lexeme| lexeme.kind == TokenKind::Indent)
            .map_or_else(|| String::from("    "), |lexeme| lexeme.token.text.clone());
        let default_newline = self
            .lexemes
            .iter()
            .find(|lexeme| lexeme.kind == TokenKind::Newline && !lexeme.token.text.is_empty())
            .map_or_else(|| String::from("\n"), |lexeme| lexeme.token.text.clone());

        let mut body = Vec::new();
        loop {
            self.collect_blank_lines();
            match self.peek().kind {
                TokenKind::EndOfFile => break,
                TokenKind::Indent => return Err(self.error("unexpected indent")),
                _ => body.push(self.parse_statement()?),
            }
        }
        let footer = self.take_leading_lines();
        Ok(Module {
            body,
            footer,
            default_indent,
            default_newline,
        })
    }

    // Cursor

    fn peek(&self) -> &Lexeme {
        self.peek_nth(0)
    }

    fn peek_nth(&self, n: usize) -> &Lexeme {
        let index = (self.position + n).min(self.lexemes.len() - 1);
        &self.lexemes[index]
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().token.clone();
        if self.position < self.lexemes.len() - 1 {
            self.position += 1;
        }
        token
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        let span = self.peek().token.span;
        ParseError::new(span, message)
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        let found = match self.peek().kind {
            TokenKind::Newline => String::from("end of line"),
            TokenKind::Indent => String::from("indent"),
            TokenKind::Dedent => String::from("dedent"),
            TokenKind::EndOfFile => String::from("end of file"),
            _ => format!("`{}`", self.peek().token.text),
        };
        self.error(format!("expected {expected}, found {found}"))
    }

    fn at_kind(&self, kind: TokenKind) -> bool {
        self.peek().kind == kind
    }

    fn expect_kind(&mut self, kind: TokenKind) -> Result<Token> {
        if self.at_kind(kind) {
            Ok(self.advance())
        } else {
            Err(self.unexpected(&format!("{kind:?}").to_lowercase()))
        }
    }

    fn at_op(&self, op: &str) -> bool {
        self.nth_is_op(0, op)
    }

    fn nth_is_op(&self, n: usize, op: &str) -> bool {
        let lexeme = self.peek_nth(n);
        lexeme.kind == TokenKind::Operator && lexeme.token.text == op
    }

    fn eat_op(&mut self, op: &str) -> Option<Token> {
        if self.at_op(op) {
            Some(self.advance())
        } else {
            None
        }
    }

    fn expect_op(&mut self, op: &str) -> Result<Token> {
        self.eat_op(op)
            .ok_or_else(|| self.unexpected(&format!("`{op}`")))
    }

    fn at_keyword(&self, keyword: &str) -> bool {
        self.nth_is_keyword(0, keyword)
    }

    fn nth_is_keyword(&self, n: usize, keyword: &str) -> bool {
        let lexeme = self.peek_nth(n);
        lexeme.kind == TokenKind::Name && lexeme.token.text == keyword
    }

    fn eat_keyword(&mut self, keyword: &str) -> Option<Token> {
        if self.at_keyword(keyword) {
            Some(self.advance())
        } else {
            None
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<Token> {
        self.eat_keyword(keyword)
            .ok_or_else(|| self.unexpected(&format!("`{keyword}`")))
    }

    fn at_name(&self) -> bool {
        self.nth_is_name(0)
    }

    fn nth_is_name(&self, n: usize) -> bool {
        let lexeme = self.peek_nth(n);
        lexeme.kind == TokenKind::Name && !KEYWORDS.contains(&lexeme.token.text.as_str())
    }

    fn expect_name(&mut self) -> Result<Token> {
        if self.at_name() {
            Ok(self.advance())
        } else {
            Err(self.unexpected("a name"))
        }
    }

    /// Can the next token start an expression?
    fn at_expression_start(&self) -> bool {
        let lexeme = self.peek();
        match lexeme.kind {
            TokenKind::Name => {
                !KEYWORDS.contains(&lexeme.token.text.as_str())
                    || EXPRESSION_KEYWORDS.contains(&lexeme.token.text.as_str())
            }
            TokenKind::Number | TokenKind::String => true,
            TokenKind::Operator => matches!(
                lexeme.token.text.as_str(),
                "(" | "[" | "{" | "-" | "+" | "~" | "*" | "..."
            ),
            _ => false,
        }
    }

    /// Run `parse`, rewinding to where we started if it fails.
    fn speculate<T>(&mut self, parse: impl FnOnce(&mut Self) -> Result<T>) -> Option<T> {
        let position = self.position;
        match parse(self) {
            Ok(value) => Some(value),
            Err(_) => {
                self.position = position;
                None
            }
        }
    }

    // Blank lines and indentation

    fn collect_blank_lines(&mut self) {
        while self.at_kind(TokenKind::BlankLine) {
            let lexeme = self.peek().clone();
            self.advance();
            self.pending_lines.push(lexeme);
        }
    }

    fn current_indent(&self) -> &str {
        self.indents.last().map_or("", String::as_str)
    }

    /// Claim the pending blank lines for a statement at the current indentation.
    fn take_leading_lines(&mut self) -> Vec<EmptyLine> {
        self.collect_blank_lines();
        let indent = self.current_indent().to_owned();
        std::mem::take(&mut self.pending_lines)
            .into_iter()
            .map(|lexeme| to_empty_line(&lexeme, &indent))
            .collect()
    }

    /// Claim the pending comment lines that are indented like the closing block.
    fn take_footer(&mut self) -> Vec<EmptyLine> {
        let indent = self.current_indent().to_owned();
        let mut claimed = 0;
        for (index, lexeme) in self.pending_lines.iter().enumerate() {
            let is_comment = !lexeme.token.text.trim_end_matches(['\r', '\n']).is_empty();
            if !is_comment {
                continue;
            }
            if lexeme.token.leading_trivia.starts_with(&indent) {
                claimed = index + 1;
            } else {
                break;
            }
        }
        self.pending_lines
            .drain(..claimed)
            .map(|lexeme| to_empty_line(&lexeme, &indent))
            .collect()
    }

    fn push_indent(&mut self, relative: &str) {
        let absolute = format!("{}{}", self.current_indent(), relative);
        self.indents.push(absolute);
    }

    fn pop_indent(&mut self) {
        self.indents.pop();
    }
}

fn to_empty_line(lexeme: &Lexeme, indent: &str) -> EmptyLine {
    EmptyLine::from_raw(&lexeme.token.leading_trivia, &lexeme.token.text, indent)
}
