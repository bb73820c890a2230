use super::{Parser, Result};
use crate::{
    lexer::TokenKind, AsPattern, Attribute, ClassPattern, Expression, GroupPattern,
    KeywordPattern, MappingElement, MappingPattern, MappingRest, OrPattern, Pattern,
    PatternElement, SequencePattern, StarPattern,
};

impl Parser {
    /// The pattern of a `case` clause, where a bare comma makes a sequence.
    pub(super) fn parse_case_patterns(&mut self) -> Result<Pattern> {
        let first = self.parse_maybe_star_pattern()?;
        if !self.at_op(",") {
            if let Pattern::Star(_) = first {
                return Err(self.error("star pattern outside of a sequence"));
            }
            return Ok(first);
        }
        let elements = self.parse_pattern_elements_after(first, None)?;
        self.check_single_star(&elements)?;
        Ok(Pattern::Sequence(SequencePattern {
            open: None,
            elements,
            close: None,
        }))
    }

    fn parse_maybe_star_pattern(&mut self) -> Result<Pattern> {
        if let Some(star) = self.eat_op("*") {
            let name = self.expect_name()?;
            return Ok(Pattern::Star(StarPattern { star, name }));
        }
        self.parse_pattern()
    }

    fn parse_pattern(&mut self) -> Result<Pattern> {
        let pattern = self.parse_or_pattern()?;
        match self.eat_keyword("as") {
            Some(as_keyword) => {
                let name = self.expect_name()?;
                Ok(Pattern::As(AsPattern {
                    pattern: Box::new(pattern),
                    as_keyword,
                    name,
                }))
            }
            None => Ok(pattern),
        }
    }

    fn parse_or_pattern(&mut self) -> Result<Pattern> {
        let first = self.parse_closed_pattern()?;
        if !self.at_op("|") {
            return Ok(first);
        }
        let mut rest = Vec::new();
        while let Some(bar) = self.eat_op("|") {
            rest.push((bar, self.parse_closed_pattern()?));
        }
        Ok(Pattern::Or(OrPattern {
            first: Box::new(first),
            rest,
        }))
    }

    fn parse_closed_pattern(&mut self) -> Result<Pattern> {
        let kind = self.peek().kind;
        let text = self.peek().token.text.clone();
        match (kind, text.as_str()) {
            (TokenKind::Number | TokenKind::String, _) => self.parse_literal_pattern(),
            (TokenKind::Operator, "-") => self.parse_literal_pattern(),
            (TokenKind::Operator, "(") => self.parse_group_or_sequence(),
            (TokenKind::Operator, "[") => {
                let open = self.advance();
                let elements = if self.at_op("]") {
                    vec![]
                } else {
                    let first = self.parse_maybe_star_pattern()?;
                    self.parse_pattern_elements_after(first, Some("]"))?
                };
                let close = self.expect_op("]")?;
                self.check_single_star(&elements)?;
                Ok(Pattern::Sequence(SequencePattern {
                    open: Some(open),
                    elements,
                    close: Some(close),
                }))
            }
            (TokenKind::Operator, "{") => self.parse_mapping_pattern(),
            (TokenKind::Name, "None" | "True" | "False") => {
                Ok(Pattern::Literal(Expression::Name(self.advance())))
            }
            (TokenKind::Name, _) => {
                let name = self.expect_name()?;
                if !self.at_op(".") && !self.at_op("(") {
                    return Ok(Pattern::Capture(name));
                }
                let mut value = Expression::Name(name);
                while let Some(dot) = self.eat_op(".") {
                    let attr = self.expect_name()?;
                    value = Expression::Attribute(Attribute {
                        value: Box::new(value),
                        dot,
                        attr,
                    });
                }
                if self.at_op("(") {
                    self.parse_class_pattern(value)
                } else {
                    Ok(Pattern::Value(value))
                }
            }
            _ => Err(self.unexpected("a pattern")),
        }
    }

    /// Numbers (with sign and imaginary part) and strings.
    fn parse_literal_pattern(&mut self) -> Result<Pattern> {
        if self.at_kind(TokenKind::String) {
            let mut strings = vec![self.advance()];
            while self.at_kind(TokenKind::String) {
                strings.push(self.advance());
            }
            return Ok(Pattern::Literal(Expression::String(strings)));
        }
        let value = self.parse_sum()?;
        Ok(Pattern::Literal(value))
    }

    fn parse_group_or_sequence(&mut self) -> Result<Pattern> {
        let open = self.expect_op("(")?;
        if let Some(close) = self.eat_op(")") {
            return Ok(Pattern::Sequence(SequencePattern {
                open: Some(open),
                elements: vec![],
                close: Some(close),
            }));
        }
        let first = self.parse_maybe_star_pattern()?;
        if !self.at_op(",") {
            if let Pattern::Star(_) = first {
                return Err(self.error("star pattern outside of a sequence"));
            }
            let close = self.expect_op(")")?;
            return Ok(Pattern::Group(GroupPattern {
                open,
                pattern: Box::new(first),
                close,
            }));
        }
        let elements = self.parse_pattern_elements_after(first, Some(")"))?;
        let close = self.expect_op(")")?;
        self.check_single_star(&elements)?;
        Ok(Pattern::Sequence(SequencePattern {
            open: Some(open),
            elements,
            close: Some(close),
        }))
    }

    fn parse_pattern_elements_after(
        &mut self,
        first: Pattern,
        close: Option<&str>,
    ) -> Result<Vec<PatternElement>> {
        let mut elements = Vec::new();
        let mut pattern = first;
        loop {
            let comma = self.eat_op(",");
            let done = comma.is_none();
            elements.push(PatternElement { pattern, comma });
            let at_end = match close {
                Some(close) => self.at_op(close),
                None => self.at_op(":") || self.at_keyword("if"),
            };
            if done || at_end {
                break;
            }
            pattern = self.parse_maybe_star_pattern()?;
        }
        Ok(elements)
    }

    fn check_single_star(&self, elements: &[PatternElement]) -> Result<()> {
        let stars = elements
            .iter()
            .filter(|element| matches!(element.pattern, Pattern::Star(_)))
            .count();
        if stars > 1 {
            Err(self.error("multiple starred names in sequence pattern"))
        } else {
            Ok(())
        }
    }

    fn parse_mapping_pattern(&mut self) -> Result<Pattern> {
        let open = self.expect_op("{")?;
        let mut elements = Vec::new();
        let mut rest = None;
        while !self.at_op("}") {
            if let Some(stars) = self.eat_op("**") {
                let name = self.expect_name()?;
                let comma = self.eat_op(",");
                rest = Some(MappingRest { stars, name, comma });
                break;
            }
            let key = match self.parse_closed_pattern()? {
                Pattern::Literal(key) | Pattern::Value(key) => key,
                _ => return Err(self.error("mapping pattern keys must be literals or values")),
            };
            let colon = self.expect_op(":")?;
            let pattern = self.parse_pattern()?;
            let comma = self.eat_op(",");
            let done = comma.is_none();
            elements.push(MappingElement {
                key,
                colon,
                pattern,
                comma,
            });
            if done {
                break;
            }
        }
        let close = self.expect_op("}")?;
        Ok(Pattern::Mapping(MappingPattern {
            open,
            elements,
            rest,
            close,
        }))
    }

    fn parse_class_pattern(&mut self, cls: Expression) -> Result<Pattern> {
        let open = self.expect_op("(")?;
        let mut positional = Vec::new();
        let mut keywords = Vec::new();
        while !self.at_op(")") {
            if self.at_name() && self.nth_is_op(1, "=") {
                let name = self.advance();
                let equals = self.advance();
                let pattern = self.parse_pattern()?;
                let comma = self.eat_op(",");
                let done = comma.is_none();
                keywords.push(KeywordPattern {
                    name,
                    equals,
                    pattern,
                    comma,
                });
                if done {
                    break;
                }
                continue;
            }
            if !keywords.is_empty() {
                return Err(self.error("positional patterns follow keyword patterns"));
            }
            let pattern = self.parse_pattern()?;
            let comma = self.eat_op(",");
            let done = comma.is_none();
            positional.push(PatternElement { pattern, comma });
            if done {
                break;
            }
        }
        let close = self.expect_op(")")?;
        Ok(Pattern::Class(ClassPattern {
            cls,
            open,
            positional,
            keywords,
            close,
        }))
    }
}

#[cfg(test)]
mod tests {
    use crate::{Module, Pattern, Statement};

    fn first_pattern(source: &str) -> Pattern {
        let module = Module::parse(source).unwrap_or_else(|err| panic!("{err}"));
        similar_asserts::assert_eq!(module.render(), source);
        match module.body.into_iter().next() {
            Some(Statement::Match(mut statement)) => statement.cases.remove(0).pattern,
            other => panic!("{other:#?}"),
        }
    }

    macro_rules! assert_pattern {
        ($pattern:expr, $want:pat_param) => {{
            let source = format!("match x:\n    case {}:\n        pass\n", $pattern);
            let pattern = first_pattern(&source);
            assert!(matches!(pattern, $want), "{:#?}", pattern);
        }};
    }

    #[test]
    fn it_parses_patterns() {
        assert_pattern!("1", Pattern::Literal(_));
        assert_pattern!("-1.5", Pattern::Literal(_));
        assert_pattern!("1 + 2j", Pattern::Literal(_));
        assert_pattern!("'a' 'b'", Pattern::Literal(_));
        assert_pattern!("None", Pattern::Literal(_));
        assert_pattern!("_", Pattern::Capture(_));
        assert_pattern!("name", Pattern::Capture(_));
        assert_pattern!("Color.RED", Pattern::Value(_));
        assert_pattern!("[a, *rest]", Pattern::Sequence(_));
        assert_pattern!("(a, b)", Pattern::Sequence(_));
        assert_pattern!("a, *_", Pattern::Sequence(_));
        assert_pattern!("()", Pattern::Sequence(_));
        assert_pattern!("(a)", Pattern::Group(_));
        assert_pattern!("{'k': v, **rest}", Pattern::Mapping(_));
        assert_pattern!("Point(x, y=0)", Pattern::Class(_));
        assert_pattern!("mod.Point()", Pattern::Class(_));
        assert_pattern!("1 | 2 | 3", Pattern::Or(_));
        assert_pattern!("[x] as whole", Pattern::As(_));
    }

    #[test]
    fn it_rejects_invalid_patterns() {
        assert!(Module::parse("match x:\n    case *a:\n        pass\n").is_err());
        assert!(Module::parse("match x:\n    case [*a, *b]:\n        pass\n").is_err());
        assert!(Module::parse("match x:\n    case P(a=1, b):\n        pass\n").is_err());
    }

    #[test]
    fn it_binds_names_in_order() {
        let pattern = first_pattern(
            "match x:\n    case Point(x=[a, *b], y={'k': c, **d}) as e:\n        pass\n",
        );
        assert_eq!(pattern.bound_names(), vec!["a", "b", "c", "d", "e"]);
    }
}
