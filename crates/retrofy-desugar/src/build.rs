//! Constructors for synthesized nodes.
//!
//! Built expressions carry no leading trivia; whoever places them decides the
//! spacing, usually with [spaced].

use retrofy_cst::{
    Arg, Assign, Attribute, BinaryOp, BoolOp, Call, Collection, Compare, Comparison, Dict,
    Element, Else, EmptyLine, Expression, If, Import, ImportAlias, ImportFrom, ImportNames,
    Lambda, OrElse, Param, Parameters, Parenthesized, SimpleStatementLine, SimpleSuite, Slice,
    SmallStatement, SmallStatementKind, Statement, Subscript, SubscriptElement, Suite, Token,
    Tuple, UnaryOp,
};

pub(crate) fn newline() -> Token {
    Token::new("\n")
}

pub(crate) fn name(text: &str) -> Expression {
    Expression::Name(Token::new(text))
}

/// `a.b.c`
pub(crate) fn dotted(path: &str) -> Expression {
    let mut parts = path.split('.');
    let mut expression = name(parts.next().unwrap_or(path));
    for part in parts {
        expression = attribute(expression, part);
    }
    expression
}

pub(crate) fn spaced(expression: Expression) -> Expression {
    expression.with_leading_trivia(" ")
}

pub(crate) fn attribute(value: Expression, attr: &str) -> Expression {
    Expression::Attribute(Attribute {
        value: Box::new(value),
        dot: Token::new("."),
        attr: Token::new(attr),
    })
}

pub(crate) fn number(value: usize) -> Expression {
    Expression::Number(Token::new(value.to_string()))
}

/// A string literal in the given quote style.
pub(crate) fn string(value: &str, quote: char) -> Expression {
    let mut literal = String::with_capacity(value.len() + 2);
    literal.push(quote);
    for c in value.chars() {
        if c == quote || c == '\\' {
            literal.push('\\');
        }
        literal.push(c);
    }
    literal.push(quote);
    Expression::String(vec![Token::new(literal)])
}

pub(crate) fn paren(expression: Expression) -> Expression {
    let trivia = expression.leading_trivia().to_owned();
    Expression::Parenthesized(Parenthesized {
        open: Token::new("(").with_leading_trivia(trivia),
        value: Box::new(expression.with_leading_trivia("")),
        close: Token::new(")"),
    })
}

/// Comma separated elements, with a space after each comma.
fn elements(values: Vec<Expression>, trailing_comma: bool) -> Vec<Element> {
    let count = values.len();
    values
        .into_iter()
        .enumerate()
        .map(|(index, value)| Element {
            value: if index == 0 {
                value.with_leading_trivia("")
            } else {
                spaced(value)
            },
            comma: (index + 1 < count || trailing_comma).then(|| Token::new(",")),
        })
        .collect()
}

/// `(a, b)`, or `(a,)` for a single element.
pub(crate) fn tuple(values: Vec<Expression>) -> Expression {
    let trailing_comma = values.len() == 1;
    Expression::Tuple(Tuple {
        open: Some(Token::new("(")),
        elements: elements(values, trailing_comma),
        close: Some(Token::new(")")),
    })
}

/// `a, b` without parentheses.
pub(crate) fn bare_tuple(values: Vec<Expression>) -> Expression {
    Expression::Tuple(Tuple {
        open: None,
        elements: elements(values, false),
        close: None,
    })
}

pub(crate) fn list(values: Vec<Expression>) -> Expression {
    Expression::List(Collection {
        open: Token::new("["),
        elements: elements(values, false),
        close: Token::new("]"),
    })
}

/// `{}`
pub(crate) fn empty_dict() -> Expression {
    Expression::Dict(Dict {
        open: Token::new("{"),
        elements: Vec::new(),
        close: Token::new("}"),
    })
}

pub(crate) fn arg(value: Expression) -> Arg {
    Arg {
        star: None,
        keyword: None,
        value,
        comma: None,
    }
}

pub(crate) fn keyword_arg(keyword: &str, value: Expression) -> Arg {
    Arg {
        star: None,
        keyword: Some((Token::new(keyword), Token::new("="))),
        value,
        comma: None,
    }
}

/// `func(args)`, fixing up commas and spacing.
pub(crate) fn call(func: Expression, args: Vec<Arg>) -> Expression {
    let count = args.len();
    let args = args
        .into_iter()
        .enumerate()
        .map(|(index, mut arg)| {
            let trivia = if index == 0 { "" } else { " " };
            match (&mut arg.star, &mut arg.keyword) {
                (Some(star), _) => star.leading_trivia = trivia.to_owned(),
                (None, Some((keyword, _))) => keyword.leading_trivia = trivia.to_owned(),
                (None, None) => arg.value.first_token_mut().leading_trivia = trivia.to_owned(),
            }
            if arg.keyword.is_some() || arg.star.is_some() {
                arg.value.first_token_mut().leading_trivia = String::new();
            }
            arg.comma = (index + 1 < count).then(|| Token::new(","));
            arg
        })
        .collect();
    Expression::Call(Call {
        func: Box::new(func),
        open: Token::new("("),
        args,
        close: Token::new(")"),
    })
}

/// `func(a, b)` with positional arguments only.
pub(crate) fn call_positional(func: Expression, args: Vec<Expression>) -> Expression {
    call(func, args.into_iter().map(arg).collect())
}

pub(crate) fn subscript(value: Expression, index: Expression) -> Expression {
    Expression::Subscript(Subscript {
        value: Box::new(value),
        open: Token::new("["),
        slices: vec![SubscriptElement {
            slice: Slice::Index(index.with_leading_trivia("")),
            comma: None,
        }],
        close: Token::new("]"),
    })
}

/// `value[a, b]`
pub(crate) fn subscript_many(value: Expression, indices: Vec<Expression>) -> Expression {
    let count = indices.len();
    let slices = indices
        .into_iter()
        .enumerate()
        .map(|(index, expression)| SubscriptElement {
            slice: Slice::Index(if index == 0 {
                expression.with_leading_trivia("")
            } else {
                spaced(expression)
            }),
            comma: (index + 1 < count).then(|| Token::new(",")),
        })
        .collect();
    Expression::Subscript(Subscript {
        value: Box::new(value),
        open: Token::new("["),
        slices,
        close: Token::new("]"),
    })
}

/// `value[lower:upper]`
pub(crate) fn slice(
    value: Expression,
    lower: Option<Expression>,
    upper: Option<Expression>,
) -> Expression {
    Expression::Subscript(Subscript {
        value: Box::new(value),
        open: Token::new("["),
        slices: vec![SubscriptElement {
            slice: Slice::Range {
                lower,
                first_colon: Token::new(":"),
                upper,
                second_colon: None,
                step: None,
            },
            comma: None,
        }],
        close: Token::new("]"),
    })
}

/// `-value`
pub(crate) fn negative(value: Expression) -> Expression {
    Expression::UnaryOp(UnaryOp {
        op: Token::new("-"),
        operand: Box::new(value.with_leading_trivia("")),
    })
}

/// `left op right`, where `op` may be two words like `not in`.
pub(crate) fn compare(left: Expression, op: &str, right: Expression) -> Expression {
    Expression::Compare(Compare {
        left: Box::new(left.with_leading_trivia("")),
        comparisons: vec![Comparison {
            op: op.split(' ').map(Token::spaced).collect(),
            right: spaced(binds_tighter_than_comparison(right)),
        }],
    })
}

fn binds_tighter_than_comparison(expression: Expression) -> Expression {
    let loose = matches!(
        expression,
        Expression::Compare(_)
            | Expression::BoolOp(_)
            | Expression::IfExp(_)
            | Expression::Lambda(_)
            | Expression::NamedExpr(_)
            | Expression::Yield(_)
            | Expression::Tuple(Tuple { open: None, .. })
    ) || matches!(&expression, Expression::UnaryOp(UnaryOp { op, .. }) if op.is("not"));
    if loose {
        paren(expression)
    } else {
        expression
    }
}

/// `not value`
pub(crate) fn not(value: Expression) -> Expression {
    let loose = matches!(
        value,
        Expression::BinaryOp(_)
            | Expression::BoolOp(_)
            | Expression::Compare(_)
            | Expression::IfExp(_)
            | Expression::Lambda(_)
            | Expression::NamedExpr(_)
            | Expression::Yield(_)
            | Expression::Tuple(Tuple { open: None, .. })
    );
    let operand = if loose { paren(value) } else { value };
    Expression::UnaryOp(UnaryOp {
        op: Token::new("not"),
        operand: Box::new(spaced(operand)),
    })
}

fn bool_chain(
    op: &str,
    terms: Vec<Expression>,
    needs_parens: fn(&Expression) -> bool,
) -> Option<Expression> {
    terms
        .into_iter()
        .map(|term| {
            let term = term.with_leading_trivia("");
            if needs_parens(&term) {
                paren(term)
            } else {
                term
            }
        })
        .reduce(|left, right| {
            Expression::BoolOp(BoolOp {
                left: Box::new(left),
                op: Token::spaced(op),
                right: Box::new(spaced(right)),
            })
        })
}

/// `a and b and c`, `None` for no terms.
pub(crate) fn and_all(terms: Vec<Expression>) -> Option<Expression> {
    bool_chain("and", terms, |term| match term {
        Expression::BoolOp(BoolOp { op, .. }) => op.is("or"),
        Expression::IfExp(_) | Expression::Lambda(_) | Expression::NamedExpr(_) => true,
        _ => false,
    })
}

/// `a or b or c`, `None` for no terms.
pub(crate) fn or_all(terms: Vec<Expression>) -> Option<Expression> {
    bool_chain("or", terms, |term| {
        matches!(
            term,
            Expression::IfExp(_) | Expression::Lambda(_) | Expression::NamedExpr(_)
        )
    })
}

/// `a | b`
pub(crate) fn bit_or(left: Expression, right: Expression) -> Expression {
    Expression::BinaryOp(BinaryOp {
        left: Box::new(left),
        op: Token::spaced("|"),
        right: Box::new(spaced(right)),
    })
}

pub(crate) fn small(kind: SmallStatementKind) -> SmallStatement {
    SmallStatement {
        kind,
        semicolon: None,
    }
}

/// `target = value`
pub(crate) fn assign(target: Expression, value: Expression) -> SmallStatementKind {
    SmallStatementKind::Assign(Assign {
        targets: vec![(target.with_leading_trivia(""), Token::spaced("="))],
        value: spaced(value),
    })
}

/// `import module`
pub(crate) fn import(module: &str) -> SmallStatementKind {
    SmallStatementKind::Import(Import {
        keyword: Token::new("import"),
        names: vec![ImportAlias {
            name: spaced(dotted(module)),
            asname: None,
            comma: None,
        }],
    })
}

/// `from module import a, b as c`
pub(crate) fn from_import(module: &str, names: &[(String, Option<String>)]) -> SmallStatementKind {
    let count = names.len();
    let names = names
        .iter()
        .enumerate()
        .map(|(index, (name, alias))| ImportAlias {
            name: spaced(self::name(name)),
            asname: alias
                .as_ref()
                .map(|alias| (Token::spaced("as"), Token::spaced(alias.as_str()))),
            comma: (index + 1 < count).then(|| Token::new(",")),
        })
        .collect();
    SmallStatementKind::ImportFrom(ImportFrom {
        from_keyword: Token::new("from"),
        relative: Vec::new(),
        module: Some(spaced(dotted(module))),
        import_keyword: Token::spaced("import"),
        names: ImportNames::Aliases {
            open: None,
            names,
            close: None,
        },
    })
}

/// `lambda param: body`
pub(crate) fn lambda(param: &str, body: Expression) -> Expression {
    Expression::Lambda(Lambda {
        keyword: Token::new("lambda"),
        params: Parameters {
            params: vec![Param {
                star: None,
                name: Some(Token::spaced(param)),
                annotation: None,
                default: None,
                comma: None,
            }],
        },
        colon: Token::new(":"),
        body: Box::new(spaced(body)),
    })
}

/// Join small statements with `; `.
pub(crate) fn join_small(kinds: Vec<SmallStatementKind>) -> Vec<SmallStatement> {
    let count = kinds.len();
    kinds
        .into_iter()
        .enumerate()
        .map(|(index, mut kind)| {
            kind.first_token_mut().leading_trivia = if index == 0 {
                String::new()
            } else {
                String::from(" ")
            };
            SmallStatement {
                kind,
                semicolon: (index + 1 < count).then(|| Token::new(";")),
            }
        })
        .collect()
}

/// A line of `; `-separated small statements.
pub(crate) fn line(kinds: Vec<SmallStatementKind>) -> Statement {
    Statement::Simple(SimpleStatementLine {
        leading_lines: Vec::new(),
        body: join_small(kinds),
        newline: newline(),
    })
}

/// `if test:` followed by an indented block.
pub(crate) fn if_block(keyword: &str, test: Expression, indent: &str, body: Vec<Statement>) -> If {
    If {
        leading_lines: Vec::new(),
        keyword: Token::new(keyword),
        test: spaced(test),
        colon: Token::new(":"),
        body: Suite::indented(indent, body),
        orelse: None,
    }
}

/// `if test: statement`, on one line.
pub(crate) fn if_inline(test: Expression, kinds: Vec<SmallStatementKind>) -> If {
    let mut body = join_small(kinds);
    if let Some(first) = body.first_mut() {
        first.kind.first_token_mut().leading_trivia = String::from(" ");
    }
    If {
        leading_lines: Vec::new(),
        keyword: Token::new("if"),
        test: spaced(test),
        colon: Token::new(":"),
        body: Suite::Simple(SimpleSuite {
            body,
            newline: newline(),
        }),
        orelse: None,
    }
}

/// `else:` followed by an indented block.
pub(crate) fn else_block(indent: &str, body: Vec<Statement>) -> Else {
    Else {
        leading_lines: Vec::new(),
        keyword: Token::new("else"),
        colon: Token::new(":"),
        body: Suite::indented(indent, body),
    }
}

/// Chain `ifs` into `if`/`elif`, with an optional final `else`.
pub(crate) fn if_chain(ifs: Vec<If>, orelse: Option<Else>) -> Option<If> {
    let mut tail = orelse.map(OrElse::Else);
    let mut chain = None;
    for mut branch in ifs.into_iter().rev() {
        branch.keyword.text = String::from("elif");
        branch.orelse = tail.take().map(Box::new);
        tail = Some(OrElse::Elif(branch));
    }
    if let Some(OrElse::Elif(mut head)) = tail {
        head.keyword.text = String::from("if");
        chain = Some(head);
    }
    chain
}

/// Turn a suite into a statement list, for splicing into a block.
///
/// The newline of an indented suite belongs to its header line and is returned
/// so the caller can keep any trailing comment on it.
pub(crate) fn suite_statements(suite: Suite) -> (Token, Vec<Statement>, Vec<EmptyLine>) {
    match suite {
        Suite::Indented(block) => (block.newline, block.body, block.footer),
        Suite::Simple(SimpleSuite { mut body, newline }) => {
            if let Some(first) = body.first_mut() {
                first.kind.first_token_mut().leading_trivia = String::new();
            }
            let line = Statement::Simple(SimpleStatementLine {
                leading_lines: Vec::new(),
                body,
                newline,
            });
            (self::newline(), vec![line], Vec::new())
        }
    }
}

/// Strip the comments and spacing off an expression that gets duplicated.
pub(crate) fn detached(expression: &Expression) -> Expression {
    expression.clone().with_leading_trivia("")
}

#[cfg(test)]
mod tests {
    use super::*;
    use retrofy_cst::Render;

    #[test]
    fn it_builds_conditions() {
        let path = dotted("point.x");
        let test = and_all(vec![
            call_positional(
                name("isinstance"),
                vec![name("p"), dotted("collections.abc.Sequence")]
            ),
            not(call_positional(name("isinstance"), vec![name("p"), tuple(vec![name("str")])])),
            compare(path, "not in", tuple(vec![number(1), string("a'b", '\'')])),
            or_all(vec![name("a"), name("b")]).unwrap(),
        ])
        .unwrap();
        assert_eq!(
            test.to_source(),
            "isinstance(p, collections.abc.Sequence) and not isinstance(p, (str,)) and point.x not in (1, 'a\\'b') and (a or b)"
        );
    }

    #[test]
    fn it_builds_statements() {
        let statement = line(vec![
            assign(name("x"), subscript(name("p"), negative(number(1)))),
            assign(name("y"), slice(name("p"), Some(number(1)), None)),
        ]);
        assert_eq!(statement.render(), "x = p[-1]; y = p[1:]\n");

        let chain = if_chain(
            vec![
                if_block("if", name("a"), "    ", vec![line(vec![assign(name("x"), number(1))])]),
                if_block("if", name("b"), "    ", vec![line(vec![assign(name("x"), number(2))])]),
            ],
            Some(else_block("    ", vec![line(vec![assign(name("x"), number(3))])])),
        )
        .unwrap();
        assert_eq!(
            Statement::If(chain).render(),
            "if a:\n    x = 1\nelif b:\n    x = 2\nelse:\n    x = 3\n"
        );
    }
}
