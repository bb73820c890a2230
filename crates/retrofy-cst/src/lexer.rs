use crate::{ParseError, Span, Token};
use logos::Logos;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TokenKind {
    Name,
    Number,
    String,
    Operator,
    /// End of a logical line.
    Newline,
    /// Start of a block, text is the indentation relative to the parent block.
    Indent,
    Dedent,
    /// A blank or comment-only line, text is the comment (if any) and line ending.
    BlankLine,
    EndOfFile,
}

#[derive(Debug, Clone)]
pub(crate) struct Lexeme {
    pub kind: TokenKind,
    pub token: Token,
}

impl Lexeme {
    fn new(kind: TokenKind, start: usize, end: usize, leading_trivia: String, text: &str) -> Self {
        Self {
            kind,
            token: Token {
                span: Span {
                    start_offset: start,
                    end_offset: end,
                },
                leading_trivia,
                text: text.to_owned(),
            },
        }
    }
}

/// Split `source` into lexemes, computing indentation the way the Python tokenizer does.
pub(crate) fn tokenize(source: &str) -> Result<Vec<Lexeme>, ParseError> {
    let mut raw = RawToken::lexer(source).spanned().peekable();
    let mut lexemes = Vec::new();
    let mut indents: Vec<String> = vec![String::new()];
    let mut depth: usize = 0;
    let mut at_line_start = true;
    let mut trivia = String::new();

    loop {
        if at_line_start && depth == 0 {
            let mut whitespace = String::new();
            let mut line_start = source.len();
            if let Some((RawToken::Whitespace, range)) = raw.peek().cloned() {
                whitespace.push_str(&source[range.clone()]);
                line_start = range.start;
                raw.next();
            }
            let (next, range) = match raw.peek().cloned() {
                Some(next) => next,
                None => {
                    if !whitespace.is_empty() {
                        lexemes.push(Lexeme::new(
                            TokenKind::BlankLine,
                            line_start,
                            source.len(),
                            whitespace,
                            "",
                        ));
                    }
                    break;
                }
            };
            match next {
                RawToken::Newline => {
                    raw.next();
                    lexemes.push(Lexeme::new(
                        TokenKind::BlankLine,
                        range.start,
                        range.end,
                        whitespace,
                        &source[range],
                    ));
                    continue;
                }
                RawToken::Comment => {
                    raw.next();
                    let mut text = source[range.clone()].to_owned();
                    let mut end = range.end;
                    if let Some((RawToken::Newline, newline)) = raw.peek().cloned() {
                        text.push_str(&source[newline.clone()]);
                        end = newline.end;
                        raw.next();
                    }
                    lexemes.push(Lexeme::new(
                        TokenKind::BlankLine,
                        range.start,
                        end,
                        whitespace,
                        &text,
                    ));
                    continue;
                }
                _ => {}
            }

            let current = indents.last().cloned().unwrap_or_default();
            if whitespace != current {
                if whitespace.starts_with(&current) {
                    let relative = &whitespace[current.len()..];
                    lexemes.push(Lexeme::new(
                        TokenKind::Indent,
                        range.start,
                        range.start,
                        String::new(),
                        relative,
                    ));
                    indents.push(whitespace);
                } else {
                    while indents.len() > 1
                        && indents.last().map_or(false, |top| top.len() > whitespace.len())
                    {
                        indents.pop();
                        lexemes.push(Lexeme::new(
                            TokenKind::Dedent,
                            range.start,
                            range.start,
                            String::new(),
                            "",
                        ));
                    }
                    if indents.last() != Some(&whitespace) {
                        return Err(ParseError::new(
                            Span {
                                start_offset: range.start,
                                end_offset: range.start,
                            },
                            "unindent does not match any outer indentation level",
                        ));
                    }
                }
            }
            at_line_start = false;
        }

        let (next, range) = match raw.next() {
            Some(next) => next,
            None => break,
        };
        let text = &source[range.clone()];
        match next {
            RawToken::Error => {
                return Err(ParseError::new(
                    Span {
                        start_offset: range.start,
                        end_offset: range.end,
                    },
                    "invalid token",
                ))
            }
            RawToken::Whitespace | RawToken::Continuation => trivia.push_str(text),
            RawToken::Comment => trivia.push_str(text),
            RawToken::Newline if depth > 0 => trivia.push_str(text),
            RawToken::Newline => {
                lexemes.push(Lexeme::new(
                    TokenKind::Newline,
                    range.start,
                    range.end,
                    std::mem::take(&mut trivia),
                    text,
                ));
                at_line_start = true;
            }
            RawToken::Name => lexemes.push(Lexeme::new(
                TokenKind::Name,
                range.start,
                range.end,
                std::mem::take(&mut trivia),
                text,
            )),
            RawToken::Number => lexemes.push(Lexeme::new(
                TokenKind::Number,
                range.start,
                range.end,
                std::mem::take(&mut trivia),
                text,
            )),
            RawToken::String => lexemes.push(Lexeme::new(
                TokenKind::String,
                range.start,
                range.end,
                std::mem::take(&mut trivia),
                text,
            )),
            RawToken::Operator => {
                match text {
                    "(" | "[" | "{" => depth += 1,
                    ")" | "]" | "}" => depth = depth.saturating_sub(1),
                    _ => {}
                }
                lexemes.push(Lexeme::new(
                    TokenKind::Operator,
                    range.start,
                    range.end,
                    std::mem::take(&mut trivia),
                    text,
                ))
            }
        }
    }

    if !at_line_start || !trivia.is_empty() {
        // Last line without a line ending.
        lexemes.push(Lexeme::new(
            TokenKind::Newline,
            source.len(),
            source.len(),
            std::mem::take(&mut trivia),
            "",
        ));
    }
    for _ in 1..indents.len() {
        lexemes.push(Lexeme::new(
            TokenKind::Dedent,
            source.len(),
            source.len(),
            String::new(),
            "",
        ));
    }
    lexemes.push(Lexeme::new(
        TokenKind::EndOfFile,
        source.len(),
        source.len(),
        String::new(),
        "",
    ));
    Ok(lexemes)
}

fn lex_string(lex: &mut logos::Lexer<RawToken>) -> bool {
    let slice = lex.slice().as_bytes();
    let quote = slice[slice.len() - 1];
    let rest = lex.remainder().as_bytes();
    let triple = rest.len() >= 2 && rest[0] == quote && rest[1] == quote;
    let mut i = if triple { 2 } else { 0 };
    loop {
        match rest.get(i) {
            None => return false,
            Some(b'\\') => i += 2,
            Some(&byte) if byte == quote => {
                if !triple {
                    lex.bump(i + 1);
                    return true;
                }
                if rest.get(i + 1) == Some(&quote) && rest.get(i + 2) == Some(&quote) {
                    lex.bump(i + 3);
                    return true;
                }
                i += 1;
            }
            Some(b'\n') if !triple => return false,
            Some(_) => i += 1,
        }
    }
}

#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
enum RawToken {
    #[regex(r"[ \t\x0C]+")]
    Whitespace,

    #[regex(r"\\\r?\n")]
    Continuation,

    #[regex(r"\r?\n")]
    Newline,

    #[regex(r"#[^\r\n]*")]
    Comment,

    #[regex(r"[A-Za-z_\x{80}-\x{10FFFF}][A-Za-z0-9_\x{80}-\x{10FFFF}]*")]
    Name,

    #[regex(r"0[xX](_?[0-9a-fA-F])+")]
    #[regex(r"0[oO](_?[0-7])+")]
    #[regex(r"0[bB](_?[01])+")]
    #[regex(r"[0-9](_?[0-9])*(\.([0-9](_?[0-9])*)?)?([eE][+-]?[0-9](_?[0-9])*)?[jJ]?")]
    #[regex(r"\.[0-9](_?[0-9])*([eE][+-]?[0-9](_?[0-9])*)?[jJ]?")]
    Number,

    #[regex(r#"([rRbBuUfF]|[rR][bBfF]|[bBfF][rR])?["']"#, lex_string)]
    String,

    #[token("(")]
    #[token(")")]
    #[token("[")]
    #[token("]")]
    #[token("{")]
    #[token("}")]
    #[token(",")]
    #[token(":")]
    #[token(";")]
    #[token(".")]
    #[token("...")]
    #[token("@")]
    #[token("=")]
    #[token("->")]
    #[token(":=")]
    #[token("+=")]
    #[token("-=")]
    #[token("*=")]
    #[token("/=")]
    #[token("//=")]
    #[token("%=")]
    #[token("@=")]
    #[token("&=")]
    #[token("|=")]
    #[token("^=")]
    #[token(">>=")]
    #[token("<<=")]
    #[token("**=")]
    #[token("+")]
    #[token("-")]
    #[token("*")]
    #[token("/")]
    #[token("//")]
    #[token("%")]
    #[token("**")]
    #[token("<<")]
    #[token(">>")]
    #[token("&")]
    #[token("|")]
    #[token("^")]
    #[token("~")]
    #[token("<")]
    #[token(">")]
    #[token("<=")]
    #[token(">=")]
    #[token("==")]
    #[token("!=")]
    Operator,

    #[error]
    Error,
}

#[cfg(test)]
mod tests {
    use super::{tokenize, TokenKind};

    fn kinds(source: &str) -> Vec<(TokenKind, String)> {
        tokenize(source)
            .unwrap()
            .into_iter()
            .map(|lexeme| (lexeme.kind, lexeme.token.text))
            .collect()
    }

    macro_rules! assert_single_token {
        ($input:expr, $want:expr) => {{
            let lexemes = tokenize($input).unwrap();
            assert_eq!(lexemes[0].kind, $want, "{:?}", lexemes);
            assert_eq!(lexemes[0].token.text, $input);
        }};
    }

    #[test]
    fn it_lexes_names() {
        assert_single_token!("this_is_a_name", TokenKind::Name);
        assert_single_token!("_private", TokenKind::Name);
        assert_single_token!("a123456789", TokenKind::Name);
        assert_single_token!("héllö", TokenKind::Name);
        assert_single_token!("r", TokenKind::Name);
    }

    #[test]
    fn it_lexes_numbers() {
        assert_single_token!("0", TokenKind::Number);
        assert_single_token!("1_000", TokenKind::Number);
        assert_single_token!("3.14", TokenKind::Number);
        assert_single_token!("1.", TokenKind::Number);
        assert_single_token!(".5", TokenKind::Number);
        assert_single_token!("1e-10", TokenKind::Number);
        assert_single_token!("2j", TokenKind::Number);
        assert_single_token!("0xFF", TokenKind::Number);
        assert_single_token!("0o17", TokenKind::Number);
        assert_single_token!("0b1010", TokenKind::Number);
    }

    #[test]
    fn it_lexes_strings() {
        assert_single_token!(r#""double""#, TokenKind::String);
        assert_single_token!("'single'", TokenKind::String);
        assert_single_token!(r#"'it\'s'"#, TokenKind::String);
        assert_single_token!(r#"rb"\d+""#, TokenKind::String);
        assert_single_token!(r#"f"{x!r}""#, TokenKind::String);
        assert_single_token!("''", TokenKind::String);
        assert_single_token!("'''a\n'b'\n'''", TokenKind::String);
        assert_single_token!(r#""""doc "string" """"#, TokenKind::String);
        assert!(tokenize("'unterminated\n'").is_err());
    }

    #[test]
    fn it_tracks_indentation() {
        let lexemes = kinds("if x:\n    y\n\n    # note\nz\n");
        assert_eq!(
            lexemes,
            vec![
                (TokenKind::Name, "if".to_string()),
                (TokenKind::Name, "x".to_string()),
                (TokenKind::Operator, ":".to_string()),
                (TokenKind::Newline, "\n".to_string()),
                (TokenKind::Indent, "    ".to_string()),
                (TokenKind::Name, "y".to_string()),
                (TokenKind::Newline, "\n".to_string()),
                (TokenKind::BlankLine, "\n".to_string()),
                (TokenKind::BlankLine, "# note\n".to_string()),
                (TokenKind::Dedent, "".to_string()),
                (TokenKind::Name, "z".to_string()),
                (TokenKind::Newline, "\n".to_string()),
                (TokenKind::EndOfFile, "".to_string()),
            ]
        );
    }

    #[test]
    fn it_keeps_trivia_inside_brackets() {
        let lexemes = tokenize("f(  # hi\n    a,\n)\n").unwrap();
        let a = lexemes.iter().find(|lexeme| lexeme.token.text == "a").unwrap();
        assert_eq!(a.token.leading_trivia, "  # hi\n    ");
        assert!(lexemes.iter().all(|lexeme| lexeme.kind != TokenKind::Indent));
    }

    #[test]
    fn it_closes_a_final_line_without_newline() {
        let lexemes = kinds("pass  # done");
        assert_eq!(lexemes[1], (TokenKind::Newline, "".to_string()));
        let lexemes = tokenize("pass  # done").unwrap();
        assert_eq!(lexemes[1].token.leading_trivia, "  # done");
    }

    #[test]
    fn it_rejects_inconsistent_dedents() {
        assert!(tokenize("if x:\n    y\n  z\n").is_err());
    }
}
