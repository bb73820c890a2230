use super::{Parser, Result};
use crate::{
    lexer::TokenKind, Arg, Attribute, Await, BinaryOp, BoolOp, Call, Collection, CompFor, CompIf,
    Compare, Comparison, Comprehension, ComprehensionKind, Dict, DictElement, Element, Expression,
    IfExp, Lambda, NamedExpr, Param, Parameters, Parenthesized, Slice, Starred, Subscript,
    SubscriptElement, Token, Tuple, UnaryOp, Yield,
};

impl Parser {
    /// `a, *b, c` as a bare tuple, or a single expression.
    pub(super) fn parse_star_expressions(&mut self) -> Result<Expression> {
        let first = self.parse_star_expression()?;
        if !self.at_op(",") {
            return Ok(first);
        }
        let mut elements = vec![];
        let mut value = first;
        loop {
            let comma = self.eat_op(",");
            let done = comma.is_none();
            elements.push(Element { value, comma });
            if done || !self.at_expression_start() {
                break;
            }
            value = self.parse_star_expression()?;
        }
        Ok(Expression::Tuple(Tuple {
            open: None,
            elements,
            close: None,
        }))
    }

    /// Right hand side of an assignment: `yield x` or star expressions.
    pub(super) fn parse_assignment_value(&mut self) -> Result<Expression> {
        if self.at_keyword("yield") {
            self.parse_yield()
        } else {
            self.parse_star_expressions()
        }
    }

    fn parse_star_expression(&mut self) -> Result<Expression> {
        if let Some(star) = self.eat_op("*") {
            let value = self.parse_bitwise_or()?;
            return Ok(Expression::Starred(Starred {
                star,
                value: Box::new(value),
            }));
        }
        self.parse_expression()
    }

    fn parse_star_named_expression(&mut self) -> Result<Expression> {
        if let Some(star) = self.eat_op("*") {
            let value = self.parse_bitwise_or()?;
            return Ok(Expression::Starred(Starred {
                star,
                value: Box::new(value),
            }));
        }
        self.parse_named_expression()
    }

    /// `name := value`, or any expression.
    pub(super) fn parse_named_expression(&mut self) -> Result<Expression> {
        if self.at_name() && self.nth_is_op(1, ":=") {
            let target = Expression::Name(self.advance());
            let op = self.advance();
            let value = self.parse_expression()?;
            return Ok(Expression::NamedExpr(NamedExpr {
                target: Box::new(target),
                op,
                value: Box::new(value),
            }));
        }
        self.parse_expression()
    }

    /// A full expression, including conditional expressions and lambdas.
    pub(super) fn parse_expression(&mut self) -> Result<Expression> {
        if self.at_keyword("lambda") {
            return self.parse_lambda();
        }
        let body = self.parse_disjunction()?;
        if self.at_keyword("if") {
            let if_keyword = self.advance();
            let test = self.parse_disjunction()?;
            let else_keyword = self.expect_keyword("else")?;
            let orelse = self.parse_expression()?;
            return Ok(Expression::IfExp(IfExp {
                body: Box::new(body),
                if_keyword,
                test: Box::new(test),
                else_keyword,
                orelse: Box::new(orelse),
            }));
        }
        Ok(body)
    }

    fn parse_lambda(&mut self) -> Result<Expression> {
        let keyword = self.expect_keyword("lambda")?;
        let params = self.parse_parameters(":", false)?;
        let colon = self.expect_op(":")?;
        let body = self.parse_expression()?;
        Ok(Expression::Lambda(Lambda {
            keyword,
            params,
            colon,
            body: Box::new(body),
        }))
    }

    /// Parameters up to (not including) `terminator`.
    pub(super) fn parse_parameters(
        &mut self,
        terminator: &str,
        annotated: bool,
    ) -> Result<Parameters> {
        let mut params = Vec::new();
        while !self.at_op(terminator) {
            let star = ["**", "*", "/"]
                .into_iter()
                .find(|op| self.at_op(op))
                .map(|_| self.advance());
            let bare_marker = match &star {
                Some(star) if star.text == "/" => true,
                Some(star) if star.text == "*" => self.at_op(",") || self.at_op(terminator),
                _ => false,
            };
            let name = if bare_marker {
                None
            } else {
                Some(self.expect_name()?)
            };
            let annotation = match (annotated && name.is_some(), self.at_op(":")) {
                (true, true) => {
                    let colon = self.advance();
                    let annotation = self.parse_star_expression()?;
                    Some((colon, annotation))
                }
                _ => None,
            };
            let default = match self.eat_op("=") {
                Some(equals) => Some((equals, self.parse_expression()?)),
                None => None,
            };
            let comma = self.eat_op(",");
            let done = comma.is_none();
            params.push(Param {
                star,
                name,
                annotation,
                default,
                comma,
            });
            if done {
                break;
            }
        }
        Ok(Parameters { params })
    }

    pub(super) fn parse_disjunction(&mut self) -> Result<Expression> {
        let mut left = self.parse_conjunction()?;
        while let Some(op) = self.eat_keyword("or") {
            let right = self.parse_conjunction()?;
            left = Expression::BoolOp(BoolOp {
                left: Box::new(left),
                op,
                right: Box::new(right),
            });
        }
        Ok(left)
    }

    fn parse_conjunction(&mut self) -> Result<Expression> {
        let mut left = self.parse_inversion()?;
        while let Some(op) = self.eat_keyword("and") {
            let right = self.parse_inversion()?;
            left = Expression::BoolOp(BoolOp {
                left: Box::new(left),
                op,
                right: Box::new(right),
            });
        }
        Ok(left)
    }

    fn parse_inversion(&mut self) -> Result<Expression> {
        if let Some(op) = self.eat_keyword("not") {
            let operand = self.parse_inversion()?;
            return Ok(Expression::UnaryOp(UnaryOp {
                op,
                operand: Box::new(operand),
            }));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expression> {
        let left = self.parse_bitwise_or()?;
        let mut comparisons = Vec::new();
        loop {
            let op = if ["==", "!=", "<", "<=", ">", ">="]
                .into_iter()
                .any(|op| self.at_op(op))
            {
                vec![self.advance()]
            } else if self.at_keyword("in") {
                vec![self.advance()]
            } else if self.at_keyword("not") && self.nth_is_keyword(1, "in") {
                vec![self.advance(), self.advance()]
            } else if self.at_keyword("is") {
                let is = self.advance();
                match self.eat_keyword("not") {
                    Some(not) => vec![is, not],
                    None => vec![is],
                }
            } else {
                break;
            };
            let right = self.parse_bitwise_or()?;
            comparisons.push(Comparison { op, right });
        }
        if comparisons.is_empty() {
            Ok(left)
        } else {
            Ok(Expression::Compare(Compare {
                left: Box::new(left),
                comparisons,
            }))
        }
    }

    fn parse_binary_level(
        &mut self,
        ops: &[&str],
        operand: fn(&mut Self) -> Result<Expression>,
    ) -> Result<Expression> {
        let mut left = operand(self)?;
        while ops.iter().any(|op| self.at_op(op)) {
            let op = self.advance();
            let right = operand(self)?;
            left = Expression::BinaryOp(BinaryOp {
                left: Box::new(left),
                op,
                right: Box::new(right),
            });
        }
        Ok(left)
    }

    pub(super) fn parse_bitwise_or(&mut self) -> Result<Expression> {
        self.parse_binary_level(&["|"], Self::parse_bitwise_xor)
    }

    fn parse_bitwise_xor(&mut self) -> Result<Expression> {
        self.parse_binary_level(&["^"], Self::parse_bitwise_and)
    }

    fn parse_bitwise_and(&mut self) -> Result<Expression> {
        self.parse_binary_level(&["&"], Self::parse_shift)
    }

    fn parse_shift(&mut self) -> Result<Expression> {
        self.parse_binary_level(&["<<", ">>"], Self::parse_sum)
    }

    pub(super) fn parse_sum(&mut self) -> Result<Expression> {
        self.parse_binary_level(&["+", "-"], Self::parse_term)
    }

    fn parse_term(&mut self) -> Result<Expression> {
        self.parse_binary_level(&["*", "/", "//", "%", "@"], Self::parse_factor)
    }

    fn parse_factor(&mut self) -> Result<Expression> {
        if ["+", "-", "~"].into_iter().any(|op| self.at_op(op)) {
            let op = self.advance();
            let operand = self.parse_factor()?;
            return Ok(Expression::UnaryOp(UnaryOp {
                op,
                operand: Box::new(operand),
            }));
        }
        self.parse_power()
    }

    fn parse_power(&mut self) -> Result<Expression> {
        let left = self.parse_await_primary()?;
        if let Some(op) = self.eat_op("**") {
            let right = self.parse_factor()?;
            return Ok(Expression::BinaryOp(BinaryOp {
                left: Box::new(left),
                op,
                right: Box::new(right),
            }));
        }
        Ok(left)
    }

    fn parse_await_primary(&mut self) -> Result<Expression> {
        if let Some(keyword) = self.eat_keyword("await") {
            let value = self.parse_primary()?;
            return Ok(Expression::Await(Await {
                keyword,
                value: Box::new(value),
            }));
        }
        self.parse_primary()
    }

    pub(super) fn parse_primary(&mut self) -> Result<Expression> {
        let mut value = self.parse_atom()?;
        loop {
            if let Some(dot) = self.eat_op(".") {
                let attr = self.expect_name()?;
                value = Expression::Attribute(Attribute {
                    value: Box::new(value),
                    dot,
                    attr,
                });
            } else if self.at_op("(") {
                let (open, args, close) = self.parse_arguments()?;
                value = Expression::Call(Call {
                    func: Box::new(value),
                    open,
                    args,
                    close,
                });
            } else if let Some(open) = self.eat_op("[") {
                let slices = self.parse_slices()?;
                let close = self.expect_op("]")?;
                value = Expression::Subscript(Subscript {
                    value: Box::new(value),
                    open,
                    slices,
                    close,
                });
            } else {
                return Ok(value);
            }
        }
    }

    /// `(args)` of a call or a class definition.
    pub(super) fn parse_arguments(&mut self) -> Result<(Token, Vec<Arg>, Token)> {
        let open = self.expect_op("(")?;
        let mut args = Vec::new();
        while !self.at_op(")") {
            let star = ["**", "*"]
                .into_iter()
                .find(|op| self.at_op(op))
                .map(|_| self.advance());
            let keyword = if star.is_none() && self.at_name() && self.nth_is_op(1, "=") {
                Some((self.advance(), self.advance()))
            } else {
                None
            };
            let mut value = if star.is_some() {
                self.parse_expression()?
            } else {
                self.parse_named_expression()?
            };
            if star.is_none() && keyword.is_none() && self.at_comprehension_start() {
                let clauses = self.parse_comprehension_clauses()?;
                value = Expression::Comprehension(Box::new(Comprehension {
                    kind: ComprehensionKind::Generator,
                    open: None,
                    element: value,
                    value: None,
                    clauses,
                    close: None,
                }));
            }
            let comma = self.eat_op(",");
            let done = comma.is_none();
            args.push(Arg {
                star,
                keyword,
                value,
                comma,
            });
            if done {
                break;
            }
        }
        let close = self.expect_op(")")?;
        Ok((open, args, close))
    }

    fn parse_slices(&mut self) -> Result<Vec<SubscriptElement>> {
        let mut slices = Vec::new();
        loop {
            let slice = self.parse_slice()?;
            let comma = self.eat_op(",");
            let done = comma.is_none();
            slices.push(SubscriptElement { slice, comma });
            if done || self.at_op("]") {
                break;
            }
        }
        Ok(slices)
    }

    fn parse_slice(&mut self) -> Result<Slice> {
        let lower = if self.at_op(":") {
            None
        } else {
            let value = self.parse_star_named_expression()?;
            if !self.at_op(":") {
                return Ok(Slice::Index(value));
            }
            Some(value)
        };
        let first_colon = self.expect_op(":")?;
        let upper = if self.at_op(":") || self.at_op(",") || self.at_op("]") {
            None
        } else {
            Some(self.parse_expression()?)
        };
        let second_colon = self.eat_op(":");
        let step = if second_colon.is_some() && !(self.at_op(",") || self.at_op("]")) {
            Some(self.parse_expression()?)
        } else {
            None
        };
        Ok(Slice::Range {
            lower,
            first_colon,
            upper,
            second_colon,
            step,
        })
    }

    fn parse_atom(&mut self) -> Result<Expression> {
        match self.peek().kind {
            TokenKind::Name => {
                let text = self.peek().token.text.as_str();
                if matches!(text, "True" | "False" | "None") || self.at_name() {
                    Ok(Expression::Name(self.advance()))
                } else {
                    Err(self.unexpected("an expression"))
                }
            }
            TokenKind::Number => Ok(Expression::Number(self.advance())),
            TokenKind::String => {
                let mut strings = vec![self.advance()];
                while self.at_kind(TokenKind::String) {
                    strings.push(self.advance());
                }
                Ok(Expression::String(strings))
            }
            TokenKind::Operator => match self.peek().token.text.as_str() {
                "..." => Ok(Expression::Ellipsis(self.advance())),
                "(" => self.parse_parenthesized(),
                "[" => self.parse_list(),
                "{" => self.parse_brace(),
                _ => Err(self.unexpected("an expression")),
            },
            _ => Err(self.unexpected("an expression")),
        }
    }

    fn parse_parenthesized(&mut self) -> Result<Expression> {
        let open = self.expect_op("(")?;
        if let Some(close) = self.eat_op(")") {
            return Ok(Expression::Tuple(Tuple {
                open: Some(open),
                elements: vec![],
                close: Some(close),
            }));
        }
        if self.at_keyword("yield") {
            let value = self.parse_yield()?;
            let close = self.expect_op(")")?;
            return Ok(Expression::Parenthesized(Parenthesized {
                open,
                value: Box::new(value),
                close,
            }));
        }
        let first = self.parse_star_named_expression()?;
        if self.at_comprehension_start() {
            let clauses = self.parse_comprehension_clauses()?;
            let close = self.expect_op(")")?;
            return Ok(Expression::Comprehension(Box::new(Comprehension {
                kind: ComprehensionKind::Generator,
                open: Some(open),
                element: first,
                value: None,
                clauses,
                close: Some(close),
            })));
        }
        if let Some(close) = self.eat_op(")") {
            return Ok(Expression::Parenthesized(Parenthesized {
                open,
                value: Box::new(first),
                close,
            }));
        }
        let elements = self.parse_elements_after(first, ")")?;
        let close = self.expect_op(")")?;
        Ok(Expression::Tuple(Tuple {
            open: Some(open),
            elements,
            close: Some(close),
        }))
    }

    fn parse_list(&mut self) -> Result<Expression> {
        let open = self.expect_op("[")?;
        if let Some(close) = self.eat_op("]") {
            return Ok(Expression::List(Collection {
                open,
                elements: vec![],
                close,
            }));
        }
        let first = self.parse_star_named_expression()?;
        if self.at_comprehension_start() {
            let clauses = self.parse_comprehension_clauses()?;
            let close = self.expect_op("]")?;
            return Ok(Expression::Comprehension(Box::new(Comprehension {
                kind: ComprehensionKind::List,
                open: Some(open),
                element: first,
                value: None,
                clauses,
                close: Some(close),
            })));
        }
        let elements = self.parse_elements_after(first, "]")?;
        let close = self.expect_op("]")?;
        Ok(Expression::List(Collection {
            open,
            elements,
            close,
        }))
    }

    fn parse_brace(&mut self) -> Result<Expression> {
        let open = self.expect_op("{")?;
        if let Some(close) = self.eat_op("}") {
            return Ok(Expression::Dict(Dict {
                open,
                elements: vec![],
                close,
            }));
        }
        if self.at_op("**") {
            return self.parse_dict_after(open, None);
        }
        let first = self.parse_star_named_expression()?;
        if self.at_op(":") {
            return self.parse_dict_after(open, Some(first));
        }
        if self.at_comprehension_start() {
            let clauses = self.parse_comprehension_clauses()?;
            let close = self.expect_op("}")?;
            return Ok(Expression::Comprehension(Box::new(Comprehension {
                kind: ComprehensionKind::Set,
                open: Some(open),
                element: first,
                value: None,
                clauses,
                close: Some(close),
            })));
        }
        let elements = self.parse_elements_after(first, "}")?;
        let close = self.expect_op("}")?;
        Ok(Expression::Set(Collection {
            open,
            elements,
            close,
        }))
    }

    fn parse_dict_after(
        &mut self,
        open: Token,
        first_key: Option<Expression>,
    ) -> Result<Expression> {
        let mut elements = Vec::new();
        let mut key = first_key;
        loop {
            let element = match key.take() {
                Some(key) => {
                    let colon = self.expect_op(":")?;
                    let value = self.parse_expression()?;
                    if elements.is_empty() && self.at_comprehension_start() {
                        let clauses = self.parse_comprehension_clauses()?;
                        let close = self.expect_op("}")?;
                        return Ok(Expression::Comprehension(Box::new(Comprehension {
                            kind: ComprehensionKind::Dict,
                            open: Some(open),
                            element: key,
                            value: Some((colon, value)),
                            clauses,
                            close: Some(close),
                        })));
                    }
                    let comma = self.eat_op(",");
                    DictElement::KeyValue {
                        key,
                        colon,
                        value,
                        comma,
                    }
                }
                None => {
                    let stars = self.expect_op("**")?;
                    let value = self.parse_bitwise_or()?;
                    let comma = self.eat_op(",");
                    DictElement::Unpack {
                        stars,
                        value,
                        comma,
                    }
                }
            };
            let done = match &element {
                DictElement::KeyValue { comma, .. } | DictElement::Unpack { comma, .. } => {
                    comma.is_none()
                }
            };
            elements.push(element);
            if done || self.at_op("}") {
                break;
            }
            if !self.at_op("**") {
                key = Some(self.parse_expression()?);
            }
        }
        let close = self.expect_op("}")?;
        Ok(Expression::Dict(Dict {
            open,
            elements,
            close,
        }))
    }

    /// Remaining comma separated elements of a display, up to `close`.
    fn parse_elements_after(&mut self, first: Expression, close: &str) -> Result<Vec<Element>> {
        let mut elements = Vec::new();
        let mut value = first;
        loop {
            let comma = self.eat_op(",");
            let done = comma.is_none();
            elements.push(Element { value, comma });
            if done || self.at_op(close) {
                break;
            }
            value = self.parse_star_named_expression()?;
        }
        Ok(elements)
    }

    fn at_comprehension_start(&self) -> bool {
        self.at_keyword("for") || (self.at_keyword("async") && self.nth_is_keyword(1, "for"))
    }

    fn parse_comprehension_clauses(&mut self) -> Result<Vec<CompFor>> {
        let mut clauses = Vec::new();
        while self.at_comprehension_start() {
            let async_keyword = self.eat_keyword("async");
            let for_keyword = self.expect_keyword("for")?;
            let target = self.parse_target_list()?;
            let in_keyword = self.expect_keyword("in")?;
            let iter = self.parse_disjunction()?;
            let mut ifs = Vec::new();
            while let Some(if_keyword) = self.eat_keyword("if") {
                let test = self.parse_disjunction()?;
                ifs.push(CompIf { if_keyword, test });
            }
            clauses.push(CompFor {
                async_keyword,
                for_keyword,
                target,
                in_keyword,
                iter,
                ifs,
            });
        }
        Ok(clauses)
    }

    /// Loop targets: `a`, `a, b`, `(a, *b)`.
    pub(super) fn parse_target_list(&mut self) -> Result<Expression> {
        let first = self.parse_target()?;
        if !self.at_op(",") {
            return Ok(first);
        }
        let mut elements = Vec::new();
        let mut value = first;
        loop {
            let comma = self.eat_op(",");
            let done = comma.is_none();
            elements.push(Element { value, comma });
            if done || self.at_keyword("in") || self.at_op("=") {
                break;
            }
            value = self.parse_target()?;
        }
        Ok(Expression::Tuple(Tuple {
            open: None,
            elements,
            close: None,
        }))
    }

    pub(super) fn parse_target(&mut self) -> Result<Expression> {
        if let Some(star) = self.eat_op("*") {
            let value = self.parse_bitwise_or()?;
            return Ok(Expression::Starred(Starred {
                star,
                value: Box::new(value),
            }));
        }
        self.parse_bitwise_or()
    }

    pub(super) fn parse_yield(&mut self) -> Result<Expression> {
        let keyword = self.expect_keyword("yield")?;
        if let Some(from_keyword) = self.eat_keyword("from") {
            let value = self.parse_expression()?;
            return Ok(Expression::Yield(Yield {
                keyword,
                from_keyword: Some(from_keyword),
                value: Some(Box::new(value)),
            }));
        }
        let value = if self.at_expression_start() {
            Some(Box::new(self.parse_star_expressions()?))
        } else {
            None
        };
        Ok(Expression::Yield(Yield {
            keyword,
            from_keyword: None,
            value,
        }))
    }
}

#[cfg(test)]
mod tests {
    use crate::{ComprehensionKind, Expression, Render};

    macro_rules! assert_parses {
        ($input:expr, $want:pat_param) => {{
            let parsed = Expression::parse($input);
            assert!(matches!(parsed, Ok($want)), "{:#?}", parsed);
            assert_eq!(parsed.unwrap().to_source(), $input);
        }};
    }

    #[test]
    fn it_parses_atoms() {
        assert_parses!("foo", Expression::Name(_));
        assert_parses!("None", Expression::Name(_));
        assert_parses!("1_000.5e3", Expression::Number(_));
        assert_parses!("'a' \"b\"", Expression::String(_));
        assert_parses!("...", Expression::Ellipsis(_));
        assert_parses!("()", Expression::Tuple(_));
        assert_parses!("(1,)", Expression::Tuple(_));
        assert_parses!("( x )", Expression::Parenthesized(_));
        assert_parses!("[1, *rest]", Expression::List(_));
        assert_parses!("{1, 2}", Expression::Set(_));
        assert_parses!("{}", Expression::Dict(_));
        assert_parses!("{'a': 1, **b}", Expression::Dict(_));
    }

    #[test]
    fn it_parses_operators() {
        assert_parses!("a + b * c", Expression::BinaryOp(_));
        assert_parses!("-x ** 2", Expression::UnaryOp(_));
        assert_parses!("not a and b or c", Expression::BoolOp(_));
        assert_parses!("a < b <= c", Expression::Compare(_));
        assert_parses!("a not in b", Expression::Compare(_));
        assert_parses!("a is not None", Expression::Compare(_));
        assert_parses!("a if b else c", Expression::IfExp(_));
        assert_parses!("lambda x, *a, k=1, **kw: x", Expression::Lambda(_));
        assert_parses!("await f()", Expression::Await(_));
        assert_parses!("int | str | None", Expression::BinaryOp(_));
    }

    #[test]
    fn it_parses_trailers() {
        assert_parses!("a.b.c", Expression::Attribute(_));
        assert_parses!("f(x, *args, key=1, **kwargs)", Expression::Call(_));
        assert_parses!("f(x for x in y)", Expression::Call(_));
        assert_parses!("f(y := 1)", Expression::Call(_));
        assert_parses!("x[1:2, ::3, :]", Expression::Subscript(_));
        assert_parses!("dict[str, list[int]]", Expression::Subscript(_));
    }

    #[test]
    fn it_parses_comprehensions() {
        let parsed = Expression::parse("[y for x in data if (y := f(x)) is not None]").unwrap();
        match parsed {
            Expression::Comprehension(comprehension) => {
                assert_eq!(comprehension.kind, ComprehensionKind::List);
                assert_eq!(comprehension.clauses.len(), 1);
                assert_eq!(comprehension.clauses[0].ifs.len(), 1);
            }
            other => panic!("{other:#?}"),
        }
        assert_parses!("{k: v for k, v in items}", Expression::Comprehension(_));
        assert_parses!("{x async for x in y}", Expression::Comprehension(_));
        assert_parses!("(a for b in c for a in b)", Expression::Comprehension(_));
    }

    #[test]
    fn it_keeps_trivia_in_brackets() {
        let input = "foo(  # first\n    a,\n    b,  # second\n)";
        assert_eq!(Expression::parse(input).unwrap().to_source(), input);
    }

    #[test]
    fn it_rejects_keywords_as_names() {
        assert!(Expression::parse("class").is_err());
        assert!(Expression::parse("a +").is_err());
    }
}
