use super::{Parser, Result};
use crate::{
    lexer::TokenKind, AnnAssign, Assign, AugAssign, ClassDef, Decorator, Else, EmptyLine,
    ExceptHandler, Expression, For, FunctionDef, If, Import, ImportAlias, ImportFrom, ImportNames,
    IndentedBlock, Match, MatchCase, OrElse, SimpleStatementLine, SimpleSuite, SmallStatement,
    SmallStatementKind, Statement, Suite, Token, Try, TypeAlias, TypeParam, TypeParams, While,
    With, WithItem,
};

const AUGMENTED_ASSIGNMENT_OPS: &[&str] = &[
    "+=", "-=", "*=", "/=", "//=", "%=", "@=", "&=", "|=", "^=", ">>=", "<<=", "**=",
];

impl Parser {
    pub(super) fn parse_statement(&mut self) -> Result<Statement> {
        let leading_lines = self.take_leading_lines();
        let lexeme = self.peek();
        if lexeme.kind == TokenKind::Operator && lexeme.token.text == "@" {
            return self.parse_decorated(leading_lines);
        }
        if lexeme.kind != TokenKind::Name {
            return self.parse_simple_statement_line(leading_lines);
        }
        let keyword = lexeme.token.text.clone();
        match keyword.as_str() {
            "if" => Ok(Statement::If(self.parse_if(leading_lines, "if")?)),
            "while" => self.parse_while(leading_lines),
            "for" => self.parse_for(leading_lines, None),
            "try" => self.parse_try(leading_lines),
            "with" => self.parse_with(leading_lines, None),
            "def" => self.parse_function_def(leading_lines, vec![], vec![], None),
            "class" => self.parse_class_def(leading_lines, vec![], vec![]),
            "async" => {
                let async_keyword = self.advance();
                if self.at_keyword("for") {
                    self.parse_for(leading_lines, Some(async_keyword))
                } else if self.at_keyword("with") {
                    self.parse_with(leading_lines, Some(async_keyword))
                } else {
                    self.parse_function_def(leading_lines, vec![], vec![], Some(async_keyword))
                }
            }
            "match" => match self.speculate(Self::parse_match_header) {
                Some((keyword, subject, colon, newline)) => {
                    self.parse_match_cases(leading_lines, keyword, subject, colon, newline)
                }
                None => self.parse_simple_statement_line(leading_lines),
            },
            _ => self.parse_simple_statement_line(leading_lines),
        }
    }

    fn parse_simple_statement_line(&mut self, leading_lines: Vec<EmptyLine>) -> Result<Statement> {
        let body = self.parse_small_statements()?;
        let newline = self.expect_kind(TokenKind::Newline)?;
        Ok(Statement::Simple(SimpleStatementLine {
            leading_lines,
            body,
            newline,
        }))
    }

    fn parse_small_statements(&mut self) -> Result<Vec<SmallStatement>> {
        let mut body = Vec::new();
        loop {
            let kind = self.parse_small_statement()?;
            let semicolon = self.eat_op(";");
            let done = semicolon.is_none();
            body.push(SmallStatement { kind, semicolon });
            if done || self.at_kind(TokenKind::Newline) {
                break;
            }
        }
        Ok(body)
    }

    fn parse_small_statement(&mut self) -> Result<SmallStatementKind> {
        let keyword = if self.at_kind(TokenKind::Name) {
            self.peek().token.text.clone()
        } else {
            String::new()
        };
        match keyword.as_str() {
            "pass" => return Ok(SmallStatementKind::Pass(self.advance())),
            "break" => return Ok(SmallStatementKind::Break(self.advance())),
            "continue" => return Ok(SmallStatementKind::Continue(self.advance())),
            "return" => {
                let keyword = self.advance();
                let value = if self.at_expression_start() {
                    Some(self.parse_star_expressions()?)
                } else {
                    None
                };
                return Ok(SmallStatementKind::Return { keyword, value });
            }
            "raise" => {
                let keyword = self.advance();
                let exception = if self.at_expression_start() {
                    Some(self.parse_expression()?)
                } else {
                    None
                };
                let cause = match self.eat_keyword("from") {
                    Some(from) => Some((from, self.parse_expression()?)),
                    None => None,
                };
                return Ok(SmallStatementKind::Raise {
                    keyword,
                    exception,
                    cause,
                });
            }
            "global" | "nonlocal" => {
                let keyword = self.advance();
                let mut names = Vec::new();
                loop {
                    let name = self.expect_name()?;
                    let comma = self.eat_op(",");
                    let done = comma.is_none();
                    names.push((name, comma));
                    if done {
                        break;
                    }
                }
                return Ok(SmallStatementKind::Global { keyword, names });
            }
            "del" => {
                let keyword = self.advance();
                let target = self.parse_target_list()?;
                return Ok(SmallStatementKind::Del { keyword, target });
            }
            "assert" => {
                let keyword = self.advance();
                let test = self.parse_expression()?;
                let message = match self.eat_op(",") {
                    Some(comma) => Some((comma, self.parse_expression()?)),
                    None => None,
                };
                return Ok(SmallStatementKind::Assert {
                    keyword,
                    test,
                    message,
                });
            }
            "import" => return self.parse_import(),
            "from" => return self.parse_import_from(),
            "type" => {
                if let Some(alias) = self.speculate(Self::parse_type_alias) {
                    return Ok(SmallStatementKind::TypeAlias(alias));
                }
            }
            _ => {}
        }
        self.parse_expression_statement()
    }

    fn parse_expression_statement(&mut self) -> Result<SmallStatementKind> {
        let first = self.parse_assignment_value()?;
        if let Some(colon) = self.eat_op(":") {
            let annotation = self.parse_expression()?;
            let value = match self.eat_op("=") {
                Some(equals) => Some((equals, self.parse_assignment_value()?)),
                None => None,
            };
            return Ok(SmallStatementKind::AnnAssign(AnnAssign {
                target: first,
                colon,
                annotation,
                value,
            }));
        }
        if AUGMENTED_ASSIGNMENT_OPS.iter().any(|op| self.at_op(op)) {
            let op = self.advance();
            let value = self.parse_assignment_value()?;
            return Ok(SmallStatementKind::AugAssign(AugAssign {
                target: first,
                op,
                value,
            }));
        }
        if !self.at_op("=") {
            return Ok(SmallStatementKind::Expr(first));
        }
        let mut targets = Vec::new();
        let mut value = first;
        while let Some(equals) = self.eat_op("=") {
            targets.push((value, equals));
            value = self.parse_assignment_value()?;
        }
        Ok(SmallStatementKind::Assign(Assign { targets, value }))
    }

    fn parse_dotted_name(&mut self) -> Result<Expression> {
        let mut name = Expression::Name(self.expect_name()?);
        while let Some(dot) = self.eat_op(".") {
            let attr = self.expect_name()?;
            name = Expression::Attribute(crate::Attribute {
                value: Box::new(name),
                dot,
                attr,
            });
        }
        Ok(name)
    }

    fn parse_import_alias(&mut self, dotted: bool) -> Result<ImportAlias> {
        let name = if dotted {
            self.parse_dotted_name()?
        } else {
            Expression::Name(self.expect_name()?)
        };
        let asname = match self.eat_keyword("as") {
            Some(as_keyword) => Some((as_keyword, self.expect_name()?)),
            None => None,
        };
        let comma = self.eat_op(",");
        Ok(ImportAlias {
            name,
            asname,
            comma,
        })
    }

    fn parse_import(&mut self) -> Result<SmallStatementKind> {
        let keyword = self.expect_keyword("import")?;
        let mut names = Vec::new();
        loop {
            let alias = self.parse_import_alias(true)?;
            let done = alias.comma.is_none();
            names.push(alias);
            if done {
                break;
            }
        }
        Ok(SmallStatementKind::Import(Import { keyword, names }))
    }

    fn parse_import_from(&mut self) -> Result<SmallStatementKind> {
        let from_keyword = self.expect_keyword("from")?;
        let mut relative = Vec::new();
        while self.at_op(".") || self.at_op("...") {
            relative.push(self.advance());
        }
        let module = if self.at_keyword("import") && !relative.is_empty() {
            None
        } else {
            Some(self.parse_dotted_name()?)
        };
        let import_keyword = self.expect_keyword("import")?;
        let names = if let Some(star) = self.eat_op("*") {
            ImportNames::Star(star)
        } else {
            let open = self.eat_op("(");
            let mut names = Vec::new();
            loop {
                let alias = self.parse_import_alias(false)?;
                let done = alias.comma.is_none();
                names.push(alias);
                if done || self.at_op(")") {
                    break;
                }
            }
            let close = match open {
                Some(_) => Some(self.expect_op(")")?),
                None => None,
            };
            ImportNames::Aliases { open, names, close }
        };
        Ok(SmallStatementKind::ImportFrom(ImportFrom {
            from_keyword,
            relative,
            module,
            import_keyword,
            names,
        }))
    }

    fn parse_type_alias(&mut self) -> Result<TypeAlias> {
        let keyword = self.expect_keyword("type")?;
        let name = self.expect_name()?;
        let type_params = self.parse_optional_type_params()?;
        let equals = self.expect_op("=")?;
        let value = self.parse_expression()?;
        Ok(TypeAlias {
            keyword,
            name,
            type_params,
            equals,
            value,
        })
    }

    fn parse_optional_type_params(&mut self) -> Result<Option<TypeParams>> {
        let open = match self.eat_op("[") {
            Some(open) => open,
            None => return Ok(None),
        };
        let mut params = Vec::new();
        while !self.at_op("]") {
            let star = ["**", "*"]
                .into_iter()
                .find(|op| self.at_op(op))
                .map(|_| self.advance());
            let name = self.expect_name()?;
            let bound = match self.eat_op(":") {
                Some(colon) => Some((colon, self.parse_expression()?)),
                None => None,
            };
            let comma = self.eat_op(",");
            let done = comma.is_none();
            params.push(TypeParam {
                star,
                name,
                bound,
                comma,
            });
            if done {
                break;
            }
        }
        let close = self.expect_op("]")?;
        Ok(Some(TypeParams {
            open,
            params,
            close,
        }))
    }

    /// The body after a compound statement header's `:`.
    fn parse_suite(&mut self) -> Result<Suite> {
        if !self.at_kind(TokenKind::Newline) {
            let body = self.parse_small_statements()?;
            let newline = self.expect_kind(TokenKind::Newline)?;
            return Ok(Suite::Simple(SimpleSuite { body, newline }));
        }
        let newline = self.advance();
        self.collect_blank_lines();
        let indent = self.expect_kind(TokenKind::Indent)?.text;
        self.push_indent(&indent);
        let mut body = Vec::new();
        loop {
            self.collect_blank_lines();
            match self.peek().kind {
                TokenKind::Dedent => break,
                TokenKind::EndOfFile => return Err(self.unexpected("a dedent")),
                TokenKind::Indent => return Err(self.error("unexpected indent")),
                _ => body.push(self.parse_statement()?),
            }
        }
        let footer = self.take_footer();
        self.advance();
        self.pop_indent();
        Ok(Suite::Indented(IndentedBlock {
            newline,
            indent,
            body,
            footer,
        }))
    }

    /// Claim pending lines for a clause (`elif`, `else`, `except`...) if one follows.
    fn at_clause(&mut self, keyword: &str) -> bool {
        self.collect_blank_lines();
        self.at_keyword(keyword)
    }

    fn parse_if(&mut self, leading_lines: Vec<EmptyLine>, keyword: &str) -> Result<If> {
        let keyword = self.expect_keyword(keyword)?;
        let test = self.parse_named_expression()?;
        let colon = self.expect_op(":")?;
        let body = self.parse_suite()?;
        let orelse = if self.at_clause("elif") {
            let leading_lines = self.take_leading_lines();
            Some(Box::new(OrElse::Elif(self.parse_if(leading_lines, "elif")?)))
        } else {
            self.parse_else("else")?.map(|orelse| Box::new(OrElse::Else(orelse)))
        };
        Ok(If {
            leading_lines,
            keyword,
            test,
            colon,
            body,
            orelse,
        })
    }

    /// `else:` or `finally:`, if present.
    fn parse_else(&mut self, keyword: &str) -> Result<Option<Else>> {
        if !self.at_clause(keyword) {
            return Ok(None);
        }
        let leading_lines = self.take_leading_lines();
        let keyword = self.advance();
        let colon = self.expect_op(":")?;
        let body = self.parse_suite()?;
        Ok(Some(Else {
            leading_lines,
            keyword,
            colon,
            body,
        }))
    }

    fn parse_while(&mut self, leading_lines: Vec<EmptyLine>) -> Result<Statement> {
        let keyword = self.expect_keyword("while")?;
        let test = self.parse_named_expression()?;
        let colon = self.expect_op(":")?;
        let body = self.parse_suite()?;
        let orelse = self.parse_else("else")?;
        Ok(Statement::While(While {
            leading_lines,
            keyword,
            test,
            colon,
            body,
            orelse,
        }))
    }

    fn parse_for(
        &mut self,
        leading_lines: Vec<EmptyLine>,
        async_keyword: Option<Token>,
    ) -> Result<Statement> {
        let for_keyword = self.expect_keyword("for")?;
        let target = self.parse_target_list()?;
        let in_keyword = self.expect_keyword("in")?;
        let iter = self.parse_star_expressions()?;
        let colon = self.expect_op(":")?;
        let body = self.parse_suite()?;
        let orelse = self.parse_else("else")?;
        Ok(Statement::For(For {
            leading_lines,
            async_keyword,
            for_keyword,
            target,
            in_keyword,
            iter,
            colon,
            body,
            orelse,
        }))
    }

    fn parse_try(&mut self, leading_lines: Vec<EmptyLine>) -> Result<Statement> {
        let keyword = self.expect_keyword("try")?;
        let colon = self.expect_op(":")?;
        let body = self.parse_suite()?;
        let mut handlers = Vec::new();
        while self.at_clause("except") {
            let leading_lines = self.take_leading_lines();
            let keyword = self.advance();
            let star = self.eat_op("*");
            let type_ = if self.at_op(":") {
                None
            } else {
                Some(self.parse_expression()?)
            };
            let name = match self.eat_keyword("as") {
                Some(as_keyword) => Some((as_keyword, self.expect_name()?)),
                None => None,
            };
            let colon = self.expect_op(":")?;
            let body = self.parse_suite()?;
            handlers.push(ExceptHandler {
                leading_lines,
                keyword,
                star,
                type_,
                name,
                colon,
                body,
            });
        }
        let orelse = self.parse_else("else")?;
        let finalbody = self.parse_else("finally")?;
        Ok(Statement::Try(Try {
            leading_lines,
            keyword,
            colon,
            body,
            handlers,
            orelse,
            finalbody,
        }))
    }

    fn parse_with_items(&mut self, close: Option<&str>) -> Result<Vec<WithItem>> {
        let mut items = Vec::new();
        loop {
            let item = self.parse_expression()?;
            let asname = match self.eat_keyword("as") {
                Some(as_keyword) => Some((as_keyword, self.parse_target()?)),
                None => None,
            };
            let comma = self.eat_op(",");
            let done = comma.is_none();
            items.push(WithItem {
                item,
                asname,
                comma,
            });
            if done || close.map_or(false, |close| self.at_op(close)) {
                break;
            }
        }
        Ok(items)
    }

    fn parse_with(
        &mut self,
        leading_lines: Vec<EmptyLine>,
        async_keyword: Option<Token>,
    ) -> Result<Statement> {
        let keyword = self.expect_keyword("with")?;
        let parenthesized = self.speculate(|parser| {
            let open = parser.expect_op("(")?;
            let items = parser.parse_with_items(Some(")"))?;
            let close = parser.expect_op(")")?;
            let colon = parser.expect_op(":")?;
            Ok((open, items, close, colon))
        });
        let (open, items, close, colon) = match parenthesized {
            Some((open, items, close, colon)) => (Some(open), items, Some(close), colon),
            None => {
                let items = self.parse_with_items(None)?;
                let colon = self.expect_op(":")?;
                (None, items, None, colon)
            }
        };
        let body = self.parse_suite()?;
        Ok(Statement::With(With {
            leading_lines,
            async_keyword,
            keyword,
            open,
            items,
            close,
            colon,
            body,
        }))
    }

    fn parse_decorated(&mut self, leading_lines: Vec<EmptyLine>) -> Result<Statement> {
        let mut decorators = Vec::new();
        let mut decorator_lines = Vec::new();
        while let Some(at) = self.eat_op("@") {
            let expression = self.parse_named_expression()?;
            let newline = self.expect_kind(TokenKind::Newline)?;
            decorators.push(Decorator {
                leading_lines: decorator_lines,
                at,
                expression,
                newline,
            });
            decorator_lines = self.take_leading_lines();
        }
        if self.at_keyword("class") {
            return self.parse_class_def(leading_lines, decorators, decorator_lines);
        }
        let async_keyword = self.eat_keyword("async");
        self.parse_function_def(leading_lines, decorators, decorator_lines, async_keyword)
    }

    fn parse_function_def(
        &mut self,
        leading_lines: Vec<EmptyLine>,
        decorators: Vec<Decorator>,
        lines_after_decorators: Vec<EmptyLine>,
        async_keyword: Option<Token>,
    ) -> Result<Statement> {
        let keyword = self.expect_keyword("def")?;
        let name = self.expect_name()?;
        let type_params = self.parse_optional_type_params()?;
        let open = self.expect_op("(")?;
        let params = self.parse_parameters(")", true)?;
        let close = self.expect_op(")")?;
        let returns = match self.eat_op("->") {
            Some(arrow) => Some((arrow, self.parse_expression()?)),
            None => None,
        };
        let colon = self.expect_op(":")?;
        let body = self.parse_suite()?;
        Ok(Statement::FunctionDef(FunctionDef {
            leading_lines,
            decorators,
            lines_after_decorators,
            async_keyword,
            keyword,
            name,
            type_params,
            open,
            params,
            close,
            returns,
            colon,
            body,
        }))
    }

    fn parse_class_def(
        &mut self,
        leading_lines: Vec<EmptyLine>,
        decorators: Vec<Decorator>,
        lines_after_decorators: Vec<EmptyLine>,
    ) -> Result<Statement> {
        let keyword = self.expect_keyword("class")?;
        let name = self.expect_name()?;
        let type_params = self.parse_optional_type_params()?;
        let (open, args, close) = if self.at_op("(") {
            let (open, args, close) = self.parse_arguments()?;
            (Some(open), args, Some(close))
        } else {
            (None, vec![], None)
        };
        let colon = self.expect_op(":")?;
        let body = self.parse_suite()?;
        Ok(Statement::ClassDef(ClassDef {
            leading_lines,
            decorators,
            lines_after_decorators,
            keyword,
            name,
            type_params,
            open,
            args,
            close,
            colon,
            body,
        }))
    }

    fn parse_match_header(&mut self) -> Result<(Token, Expression, Token, Token)> {
        let keyword = self.expect_keyword("match")?;
        let first = self.parse_named_expression()?;
        let subject = if self.at_op(",") {
            let mut elements = Vec::new();
            let mut value = first;
            loop {
                let comma = self.eat_op(",");
                let done = comma.is_none();
                elements.push(crate::Element { value, comma });
                if done || self.at_op(":") {
                    break;
                }
                value = self.parse_named_expression()?;
            }
            Expression::Tuple(crate::Tuple {
                open: None,
                elements,
                close: None,
            })
        } else {
            first
        };
        let colon = self.expect_op(":")?;
        let newline = self.expect_kind(TokenKind::Newline)?;
        Ok((keyword, subject, colon, newline))
    }

    fn parse_match_cases(
        &mut self,
        leading_lines: Vec<EmptyLine>,
        keyword: Token,
        subject: Expression,
        colon: Token,
        newline: Token,
    ) -> Result<Statement> {
        self.collect_blank_lines();
        let indent = self.expect_kind(TokenKind::Indent)?.text;
        self.push_indent(&indent);
        let mut cases = Vec::new();
        loop {
            self.collect_blank_lines();
            if self.at_kind(TokenKind::Dedent) {
                break;
            }
            let leading_lines = self.take_leading_lines();
            let case_keyword = self.expect_keyword("case")?;
            let pattern = self.parse_case_patterns()?;
            let guard = match self.eat_keyword("if") {
                Some(if_keyword) => Some((if_keyword, self.parse_named_expression()?)),
                None => None,
            };
            let case_colon = self.expect_op(":")?;
            let body = self.parse_suite()?;
            cases.push(MatchCase {
                leading_lines,
                keyword: case_keyword,
                pattern,
                guard,
                colon: case_colon,
                body,
            });
        }
        if cases.is_empty() {
            return Err(self.unexpected("`case`"));
        }
        let footer = self.take_footer();
        self.advance();
        self.pop_indent();
        Ok(Statement::Match(Match {
            leading_lines,
            keyword,
            subject,
            colon,
            newline,
            indent,
            cases,
            footer,
        }))
    }
}

#[cfg(test)]
mod tests {
    use crate::{Module, SmallStatementKind, Statement, Suite};

    macro_rules! assert_round_trips {
        ($input:expr) => {{
            let module = Module::parse($input).unwrap_or_else(|err| panic!("{err}"));
            similar_asserts::assert_eq!(module.render(), $input);
            module
        }};
    }

    #[test]
    fn it_parses_simple_statements() {
        let module = assert_round_trips!("a = b = 1; c += 2  # note\nx: int = 3\n");
        assert_eq!(module.body.len(), 2);
        match &module.body[0] {
            Statement::Simple(line) => {
                assert_eq!(line.body.len(), 2);
                assert!(matches!(line.body[0].kind, SmallStatementKind::Assign(_)));
                assert!(matches!(line.body[1].kind, SmallStatementKind::AugAssign(_)));
                assert_eq!(line.newline.leading_trivia, "  # note");
            }
            other => panic!("{other:#?}"),
        }
    }

    #[test]
    fn it_parses_imports() {
        assert_round_trips!("from __future__ import annotations\nimport os.path as p, sys\nfrom . import x\nfrom .. a import (b,\n  c as d,)\nfrom m import *\n");
    }

    #[test]
    fn it_parses_compound_statements() {
        assert_round_trips!(
            "if a:\n    pass\nelif b:\n    pass\nelse:\n    pass\nwhile x: y()\nelse:\n    z()\n"
        );
        assert_round_trips!("for a, *b in c:\n    continue\nasync def f(x: int = 1, /, *, y) -> None:\n    async with a as b, c:\n        await b\n");
        assert_round_trips!(
            "try:\n    pass\nexcept (A, B) as e:\n    raise\nexcept* C:\n    pass\nelse:\n    pass\nfinally:\n    pass\n"
        );
        assert_round_trips!("with (\n    open(a) as f,\n    open(b) as g,\n):\n    pass\nwith (yield):\n    pass\n");
        assert_round_trips!("@dataclass(frozen=True)\n# between\n@other\nclass A(B, metaclass=M):\n    x: int\n");
    }

    #[test]
    fn it_parses_soft_keywords() {
        let module = assert_round_trips!("match = 1\ntype = 2\nmatch(x)\ntype X = int\n");
        assert!(matches!(module.body[0], Statement::Simple(_)));
        match &module.body[3] {
            Statement::Simple(line) => {
                assert!(matches!(line.body[0].kind, SmallStatementKind::TypeAlias(_)))
            }
            other => panic!("{other:#?}"),
        }
        let module = assert_round_trips!("match x:\n    case 1:\n        pass\n");
        assert!(matches!(module.body[0], Statement::Match(_)));
    }

    #[test]
    fn it_keeps_comments_and_blank_lines() {
        let module = assert_round_trips!(
            "# header\n\ndef f():\n    # inside\n    a = 1\n\n    # trailing\n\n# module level\nx = 2\n# end\n"
        );
        match &module.body[0] {
            Statement::FunctionDef(def) => {
                assert_eq!(def.leading_lines.len(), 2);
                match &def.body {
                    Suite::Indented(block) => {
                        assert_eq!(block.footer.len(), 2);
                        assert!(block.footer[1].indent);
                    }
                    other => panic!("{other:#?}"),
                }
            }
            other => panic!("{other:#?}"),
        }
        assert_eq!(module.footer.len(), 1);
    }

    #[test]
    fn it_round_trips_odd_layouts() {
        assert_round_trips!("x = 1 + \\\n    2\n");
        assert_round_trips!("if x:\n\tpass\n");
        assert_round_trips!("x = 1");
        assert_round_trips!("");
        assert_round_trips!("\n\n");
        assert_round_trips!("a = 1\r\nb = 2\r\n");
        assert_round_trips!("def f():\n    return 1\n   \n");
    }

    #[test]
    fn it_reports_syntax_errors() {
        assert!(Module::parse("if x\n    pass\n").is_err());
        assert!(Module::parse("  x = 1\n").is_err());
        assert!(Module::parse("def f(:\n").is_err());
        assert!(Module::parse("match x:\n    y\n").is_err());
    }
}
