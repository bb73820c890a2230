//! Inline assignments (`name := value`) become plain assignments placed
//! before the statement that contained them.

use crate::{build, DesugarError};
use retrofy_cst::{
    visit::{walk_expression, walk_statement, walk_suite},
    CompFor, Comprehension, ComprehensionKind, Else, Expression, If, IndentedBlock, Match,
    Module, NamedExpr, OrElse, SmallStatement, SmallStatementKind, Statement, Suite, Token,
    Transformer, Tuple,
};

pub(crate) fn desugar(mut module: Module) -> Result<Module, DesugarError> {
    let mut walrus = Walrus {
        pending: Vec::new(),
        indent: crate::block_indent(&module),
        lambda_depth: 0,
        in_guard: false,
    };
    walrus.transform_module(&mut module)?;
    Ok(module)
}

/// An assignment waiting to be placed.
struct Hoisted {
    name: Token,
    value: Expression,
}

impl Hoisted {
    fn into_assign(self) -> SmallStatementKind {
        build::assign(Expression::Name(self.name), self.value)
    }
}

fn assigns(hoisted: Vec<Hoisted>) -> Vec<SmallStatementKind> {
    hoisted.into_iter().map(Hoisted::into_assign).collect()
}

struct Walrus {
    /// One entry per open context, innermost last.
    pending: Vec<Vec<Hoisted>>,
    indent: String,
    lambda_depth: usize,
    in_guard: bool,
}

impl Walrus {
    /// Run `f` in a fresh context and return what it hoisted.
    fn scoped<F>(&mut self, f: F) -> Result<Vec<Hoisted>, DesugarError>
    where
        F: FnOnce(&mut Self) -> Result<(), DesugarError>,
    {
        self.pending.push(Vec::new());
        let result = f(self);
        let hoisted = self.pending.pop().unwrap_or_default();
        result.map(|()| hoisted)
    }

    fn hoist(&mut self, named: NamedExpr, trivia: String) -> Result<Expression, DesugarError> {
        let span = named.target.start();
        let name = match *named.target {
            Expression::Name(name) => name,
            _ => return Err(DesugarError::ComplexTarget { span }),
        };
        if self.lambda_depth > 0 {
            return Err(DesugarError::unsupported(span, "inline assignment in a lambda"));
        }
        if self.in_guard {
            return Err(DesugarError::unsupported(span, "inline assignment in a case guard"));
        }
        let mut value = *named.value;
        self.transform_expression(&mut value)?;
        let scope = self
            .pending
            .last_mut()
            .ok_or_else(|| DesugarError::unsupported(span, "inline assignment here"))?;
        tracing::trace!(name = %name.text, "hoisting inline assignment");
        scope.push(Hoisted {
            name: name.clone().with_leading_trivia(""),
            value,
        });
        Ok(Expression::Name(name.with_leading_trivia(trivia)))
    }

    /// Rewrite a run of `;`-separated small statements, placing each one's
    /// hoisted assignments right before it on the same line.
    fn rewrite_small_statements(
        &mut self,
        body: &mut Vec<SmallStatement>,
    ) -> Result<(), DesugarError> {
        let old = std::mem::take(body);
        for mut small in old {
            let hoisted = self.scoped(|this| this.transform_small_statement(&mut small))?;
            if hoisted.is_empty() {
                body.push(small);
                continue;
            }
            let trivia = std::mem::take(&mut small.kind.first_token_mut().leading_trivia);
            let mut line = build::join_small(assigns(hoisted));
            if let Some(first) = line.first_mut() {
                first.kind.first_token_mut().leading_trivia = trivia;
            }
            if let Some(last) = line.last_mut() {
                last.semicolon = Some(Token::new(";"));
            }
            small.kind.first_token_mut().leading_trivia = String::from(" ");
            body.extend(line);
            body.push(small);
        }
        Ok(())
    }

    fn rewrite_statement(&mut self, statement: Statement) -> Result<Vec<Statement>, DesugarError> {
        match statement {
            Statement::Simple(mut line) => {
                self.rewrite_small_statements(&mut line.body)?;
                Ok(vec![Statement::Simple(line)])
            }
            Statement::If(mut statement) => {
                let hoisted = self.scoped(|this| this.transform_expression(&mut statement.test))?;
                self.transform_suite(&mut statement.body)?;
                if let Some(orelse) = statement.orelse.take() {
                    statement.orelse = Some(Box::new(self.rewrite_orelse(*orelse)?));
                }
                Ok(with_hoisted(hoisted, Statement::If(statement)))
            }
            Statement::While(mut statement) => {
                let hoisted = self.scoped(|this| this.transform_expression(&mut statement.test))?;
                self.transform_suite(&mut statement.body)?;
                if let Some(orelse) = &mut statement.orelse {
                    self.transform_suite(&mut orelse.body)?;
                }
                if hoisted.is_empty() {
                    return Ok(vec![Statement::While(statement)]);
                }
                let test = std::mem::replace(
                    &mut statement.test,
                    build::spaced(build::name("True")),
                );
                let not_test = build::not(test.with_leading_trivia(""));
                let exit = match statement.orelse.take() {
                    Some(orelse) => {
                        let (_, mut body, _) = build::suite_statements(orelse.body);
                        body.push(build::line(vec![SmallStatementKind::Break(Token::new(
                            "break",
                        ))]));
                        build::if_block("if", not_test, &self.indent, body)
                    }
                    None => build::if_inline(
                        not_test,
                        vec![SmallStatementKind::Break(Token::new("break"))],
                    ),
                };
                let body = std::mem::replace(&mut statement.body, Suite::indented("", Vec::new()));
                let indent = match &body {
                    Suite::Indented(block) => block.indent.clone(),
                    Suite::Simple(_) => self.indent.clone(),
                };
                let (newline, rest, footer) = build::suite_statements(body);
                let mut statements = vec![build::line(assigns(hoisted)), Statement::If(exit)];
                statements.extend(rest);
                statement.body = Suite::Indented(IndentedBlock {
                    newline,
                    indent,
                    body: statements,
                    footer,
                });
                Ok(vec![Statement::While(statement)])
            }
            Statement::Match(statement) => self.rewrite_match(statement),
            mut statement @ (Statement::For(_)
            | Statement::Try(_)
            | Statement::With(_)
            | Statement::FunctionDef(_)
            | Statement::ClassDef(_)) => {
                let hoisted = self.scoped(|this| walk_statement(this, &mut statement))?;
                Ok(with_hoisted(hoisted, statement))
            }
        }
    }

    /// An `elif` that hoists becomes `else:` around the assignments and a
    /// nested `if`, so its test still runs only when the previous ones failed.
    fn rewrite_orelse(&mut self, orelse: OrElse) -> Result<OrElse, DesugarError> {
        match orelse {
            OrElse::Else(mut orelse) => {
                self.transform_suite(&mut orelse.body)?;
                Ok(OrElse::Else(orelse))
            }
            OrElse::Elif(mut elif) => {
                let hoisted = self.scoped(|this| this.transform_expression(&mut elif.test))?;
                self.transform_suite(&mut elif.body)?;
                if let Some(rest) = elif.orelse.take() {
                    elif.orelse = Some(Box::new(self.rewrite_orelse(*rest)?));
                }
                if hoisted.is_empty() {
                    return Ok(OrElse::Elif(elif));
                }
                let leading_lines = std::mem::take(&mut elif.leading_lines);
                let nested = If {
                    keyword: Token::new("if"),
                    ..elif
                };
                Ok(OrElse::Else(Else {
                    leading_lines,
                    keyword: Token::new("else"),
                    colon: Token::new(":"),
                    body: Suite::indented(
                        self.indent.clone(),
                        vec![build::line(assigns(hoisted)), Statement::If(nested)],
                    ),
                }))
            }
        }
    }

    fn rewrite_match(&mut self, mut statement: Match) -> Result<Vec<Statement>, DesugarError> {
        let hoisted = self.scoped(|this| this.transform_expression(&mut statement.subject))?;
        for case in statement.cases.iter_mut() {
            if let Some((_, guard)) = &mut case.guard {
                self.in_guard = true;
                let result = self.transform_expression(guard);
                self.in_guard = false;
                result?;
            }
            self.transform_suite(&mut case.body)?;
        }
        Ok(with_hoisted(hoisted, Statement::Match(statement)))
    }

    fn rewrite_comprehension(
        &mut self,
        comprehension: &mut Comprehension,
    ) -> Result<(), DesugarError> {
        // The outermost iterable is evaluated in the enclosing context.
        if let Some(first) = comprehension.clauses.first_mut() {
            self.transform_expression(&mut first.iter)?;
        }
        let hoisted = self.scoped(|this| {
            this.transform_expression(&mut comprehension.element)?;
            if let Some((_, value)) = &mut comprehension.value {
                this.transform_expression(value)?;
            }
            for (index, clause) in comprehension.clauses.iter_mut().enumerate() {
                this.transform_expression(&mut clause.target)?;
                if index > 0 {
                    this.transform_expression(&mut clause.iter)?;
                }
                for condition in clause.ifs.iter_mut() {
                    this.transform_expression(&mut condition.test)?;
                }
            }
            Ok(())
        })?;
        if hoisted.is_empty() {
            return Ok(());
        }
        let clause = match comprehension.clauses.as_mut_slice() {
            [clause] => clause,
            [_, nested, ..] => {
                return Err(DesugarError::unsupported(
                    nested.for_keyword.span,
                    "inline assignment in a nested comprehension",
                ))
            }
            [] => return Ok(()),
        };

        let target = std::mem::replace(&mut clause.target, build::name("_"));
        let iter = std::mem::replace(&mut clause.iter, build::name("_"));
        let mut elements: Vec<Expression> = match &target {
            Expression::Tuple(Tuple {
                open: None,
                elements,
                ..
            }) => elements.iter().map(|element| build::detached(&element.value)).collect(),
            other => vec![build::detached(other)],
        };
        let (names, values): (Vec<_>, Vec<_>) = hoisted
            .into_iter()
            .map(|hoisted| (Expression::Name(hoisted.name), hoisted.value))
            .unzip();

        let mut produced = elements.clone();
        produced.extend(values);
        let inner = Comprehension {
            kind: ComprehensionKind::Generator,
            open: Some(Token::new("(")),
            element: build::list(produced),
            value: None,
            clauses: vec![CompFor {
                async_keyword: clause.async_keyword.as_ref().map(|_| Token::spaced("async")),
                for_keyword: Token::spaced("for"),
                target: build::spaced(target),
                in_keyword: Token::spaced("in"),
                iter: build::spaced(iter),
                ifs: Vec::new(),
            }],
            close: Some(Token::new(")")),
        };

        elements.extend(names);
        clause.target = build::spaced(build::bare_tuple(elements));
        clause.iter = build::spaced(Expression::Comprehension(Box::new(inner)));
        Ok(())
    }
}

/// `statement`, preceded by a line of hoisted assignments if there are any.
fn with_hoisted(hoisted: Vec<Hoisted>, mut statement: Statement) -> Vec<Statement> {
    if hoisted.is_empty() {
        return vec![statement];
    }
    let mut line = build::line(assigns(hoisted));
    *line.leading_lines_mut() = std::mem::take(statement.leading_lines_mut());
    vec![line, statement]
}

fn strip_parens(expression: Expression) -> Expression {
    match expression {
        Expression::Parenthesized(parenthesized) => strip_parens(*parenthesized.value),
        other => other,
    }
}

impl Transformer for Walrus {
    type Error = DesugarError;

    fn transform_statements(
        &mut self,
        statements: &mut Vec<Statement>,
    ) -> Result<(), DesugarError> {
        let old = std::mem::take(statements);
        for statement in old {
            statements.extend(self.rewrite_statement(statement)?);
        }
        Ok(())
    }

    fn transform_suite(&mut self, suite: &mut Suite) -> Result<(), DesugarError> {
        match suite {
            Suite::Simple(simple) => self.rewrite_small_statements(&mut simple.body),
            Suite::Indented(_) => walk_suite(self, suite),
        }
    }

    fn transform_expression(&mut self, expression: &mut Expression) -> Result<(), DesugarError> {
        if let Expression::NamedExpr(_) = expression.unparenthesized() {
            let trivia = expression.leading_trivia().to_owned();
            let placeholder = build::name("_");
            if let Expression::NamedExpr(named) =
                strip_parens(std::mem::replace(expression, placeholder))
            {
                *expression = self.hoist(named, trivia)?;
            }
            return Ok(());
        }
        match expression {
            Expression::Lambda(lambda) => {
                for param in lambda.params.params.iter_mut() {
                    if let Some((_, default)) = &mut param.default {
                        self.transform_expression(default)?;
                    }
                }
                self.lambda_depth += 1;
                let result = self.transform_expression(&mut lambda.body);
                self.lambda_depth -= 1;
                result
            }
            Expression::Comprehension(comprehension) => self.rewrite_comprehension(comprehension),
            _ => walk_expression(self, expression),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{desugar_walrus, DesugarError};
    use retrofy_cst::Module;

    fn convert(source: &str) -> Result<String, DesugarError> {
        let module = Module::parse(source).unwrap_or_else(|err| panic!("{err:?}"));
        desugar_walrus(module).map(|module| module.render())
    }

    macro_rules! assert_converts {
        ($source:expr, $want:expr) => {{
            let got = convert($source).unwrap_or_else(|err| panic!("{err}"));
            similar_asserts::assert_eq!(got, $want);
        }};
    }

    #[test]
    fn it_hoists_out_of_small_statements() {
        assert_converts!("result = (x := calc())\n", "x = calc(); result = x\n");
        assert_converts!("print((y0 := (y1 := f(x))))\n", "y1 = f(x); y0 = y1; print(y0)\n");
        assert_converts!(
            "def f():\n    return [(a := 1), (b := 2)]\n",
            "def f():\n    a = 1; b = 2; return [a, b]\n"
        );
        assert_converts!("if c: y = (a := 1)\n", "if c: a = 1; y = a\n");
    }

    #[test]
    fn it_hoists_before_if() {
        assert_converts!(
            "# check\nif (n := len(a)) > 10:\n    print(n)\n",
            "# check\nn = len(a)\nif n > 10:\n    print(n)\n"
        );
        assert_converts!(
            "if (a := f()) and (b := g()):\n    pass\n",
            "a = f(); b = g()\nif a and b:\n    pass\n"
        );
    }

    #[test]
    fn it_keeps_elif_tests_lazy() {
        assert_converts!(
            "if a:\n    pass\nelif (m := search(s)):\n    use(m)\nelse:\n    other()\n",
            "if a:\n    pass\nelse:\n    m = search(s)\n    if m:\n        use(m)\n    else:\n        other()\n"
        );
    }

    #[test]
    fn it_rewrites_while_loops() {
        assert_converts!(
            "while (chunk := file.read(8192)):\n    process(chunk)\n",
            "while True:\n    chunk = file.read(8192)\n    if not chunk: break\n    process(chunk)\n"
        );
        assert_converts!(
            "while (n := next_value()) > 0: total += n\n",
            "while True:\n    n = next_value()\n    if not (n > 0): break\n    total += n\n"
        );
        assert_converts!(
            "while (line := read()):\n    handle(line)\nelse:\n    done()\n",
            "while True:\n    line = read()\n    if not line:\n        done()\n        break\n    handle(line)\n"
        );
    }

    #[test]
    fn it_hoists_nested_contexts_at_their_own_level() {
        assert_converts!(
            "if (a := f()):\n    if (b := g(a)):\n        pass\n",
            "a = f()\nif a:\n    b = g(a)\n    if b:\n        pass\n"
        );
        assert_converts!(
            "for x in (items := load()):\n    pass\n",
            "items = load()\nfor x in items:\n    pass\n"
        );
    }

    #[test]
    fn it_rewrites_comprehensions() {
        assert_converts!(
            "result = [y for x in data if (y := f(x))]\n",
            "result = [y for x, y in ([x, f(x)] for x in data) if y]\n"
        );
        assert_converts!(
            "pairs = {k: v for k, x in items if (v := g(x)) is not None}\n",
            "pairs = {k: v for k, x, v in ([k, x, g(x)] for k, x in items) if v is not None}\n"
        );
    }

    #[test]
    fn it_rejects_unsupported_forms() {
        assert!(matches!(
            convert("r = [y for a in b for x in a if (y := x)]\n"),
            Err(DesugarError::UnsupportedConstruct { .. })
        ));
        assert!(matches!(
            convert("f = lambda: (x := 1)\n"),
            Err(DesugarError::UnsupportedConstruct { .. })
        ));
        assert!(matches!(
            convert("match p:\n    case x if (y := x):\n        pass\n"),
            Err(DesugarError::UnsupportedConstruct { .. })
        ));
    }

    #[test]
    fn it_leaves_other_code_alone() {
        let source = "x = 1  # one\nif x:\n    y = [i for i in range(3) if i]\n";
        assert_converts!(source, source);
    }
}
