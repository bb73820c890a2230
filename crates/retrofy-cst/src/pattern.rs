use crate::{Expression, Token};
use serde::{Deserialize, Serialize};

/// A `case` pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Pattern {
    /// `1`, `-2.5`, `1 + 2j`, `"text"`, `None`, `True`, `False`
    Literal(Expression),
    /// `Color.RED`
    Value(Expression),
    /// `name`, or the wildcard `_`.
    Capture(Token),
    /// `*name` or `*_`, only inside a sequence pattern.
    Star(StarPattern),
    /// `[a, b]`, `(a, b)` or `a, b`
    Sequence(SequencePattern),
    /// `{"key": value, **rest}`
    Mapping(MappingPattern),
    /// `Point(x, y=0)`
    Class(ClassPattern),
    /// `a | b`
    Or(OrPattern),
    /// `pattern as name`
    As(AsPattern),
    /// `(pattern)`
    Group(GroupPattern),
}

/// `*name`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StarPattern {
    /// `*`
    pub star: Token,
    /// The captured name, `_` to discard.
    pub name: Token,
}

/// A comma separated pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternElement {
    /// The pattern.
    pub pattern: Pattern,
    /// Optional trailing `,`
    pub comma: Option<Token>,
}

/// `[a, *rest]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequencePattern {
    /// `[` or `(`, absent for an open sequence.
    pub open: Option<Token>,
    /// The element patterns, at most one of them a [Pattern::Star].
    pub elements: Vec<PatternElement>,
    /// `]` or `)`
    pub close: Option<Token>,
}

/// `{key: pattern, **rest}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingPattern {
    /// `{`
    pub open: Token,
    /// The key patterns.
    pub elements: Vec<MappingElement>,
    /// `**rest`
    pub rest: Option<MappingRest>,
    /// `}`
    pub close: Token,
}

/// `key: pattern`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingElement {
    /// A literal or dotted value.
    pub key: Expression,
    /// `:`
    pub colon: Token,
    /// The value pattern.
    pub pattern: Pattern,
    /// Optional trailing `,`
    pub comma: Option<Token>,
}

/// `**rest`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingRest {
    /// `**`
    pub stars: Token,
    /// The captured name.
    pub name: Token,
    /// Optional trailing `,`
    pub comma: Option<Token>,
}

/// `Class(positional, keyword=pattern)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassPattern {
    /// The (dotted) class name.
    pub cls: Expression,
    /// `(`
    pub open: Token,
    /// Positional sub-patterns.
    pub positional: Vec<PatternElement>,
    /// Keyword sub-patterns.
    pub keywords: Vec<KeywordPattern>,
    /// `)`
    pub close: Token,
}

/// `name=pattern`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordPattern {
    /// The attribute name.
    pub name: Token,
    /// `=`
    pub equals: Token,
    /// The attribute pattern.
    pub pattern: Pattern,
    /// Optional trailing `,`
    pub comma: Option<Token>,
}

/// `a | b | c`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrPattern {
    /// The first alternative.
    pub first: Box<Pattern>,
    /// The remaining alternatives, each with its `|`.
    pub rest: Vec<(Token, Pattern)>,
}

impl OrPattern {
    /// All alternatives, in source order.
    pub fn alternatives(&self) -> impl Iterator<Item = &Pattern> {
        std::iter::once(&*self.first).chain(self.rest.iter().map(|(_, pattern)| pattern))
    }
}

/// `pattern as name`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AsPattern {
    /// The wrapped pattern.
    pub pattern: Box<Pattern>,
    /// `as`
    pub as_keyword: Token,
    /// The captured name.
    pub name: Token,
}

/// `(pattern)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupPattern {
    /// `(`
    pub open: Token,
    /// The wrapped pattern.
    pub pattern: Box<Pattern>,
    /// `)`
    pub close: Token,
}

impl Pattern {
    /// Is this the `_` wildcard?
    pub fn is_wildcard(&self) -> bool {
        matches!(self, Self::Capture(token) if token.text == "_")
    }

    /// Does this pattern match any subject?
    pub fn is_irrefutable(&self) -> bool {
        match self {
            Self::Capture(_) => true,
            Self::Group(GroupPattern { pattern, .. }) | Self::As(AsPattern { pattern, .. }) => {
                pattern.is_irrefutable()
            }
            Self::Or(or) => or.alternatives().any(Self::is_irrefutable),
            _ => false,
        }
    }

    /// The names this pattern binds, in binding order.
    pub fn bound_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        self.collect_bound_names(&mut names);
        names
    }

    fn collect_bound_names(&self, names: &mut Vec<String>) {
        match self {
            Self::Literal(_) | Self::Value(_) => {}
            Self::Capture(token) | Self::Star(StarPattern { name: token, .. }) => {
                if token.text != "_" && !names.contains(&token.text) {
                    names.push(token.text.clone());
                }
            }
            Self::Sequence(sequence) => sequence
                .elements
                .iter()
                .for_each(|element| element.pattern.collect_bound_names(names)),
            Self::Mapping(mapping) => {
                mapping
                    .elements
                    .iter()
                    .for_each(|element| element.pattern.collect_bound_names(names));
                if let Some(rest) = &mapping.rest {
                    names.push(rest.name.text.clone());
                }
            }
            Self::Class(class) => {
                class
                    .positional
                    .iter()
                    .for_each(|element| element.pattern.collect_bound_names(names));
                class
                    .keywords
                    .iter()
                    .for_each(|keyword| keyword.pattern.collect_bound_names(names));
            }
            Self::Or(or) => or
                .alternatives()
                .for_each(|alternative| alternative.collect_bound_names(names)),
            Self::As(AsPattern { pattern, name, .. }) => {
                pattern.collect_bound_names(names);
                if !names.contains(&name.text) {
                    names.push(name.text.clone());
                }
            }
            Self::Group(GroupPattern { pattern, .. }) => pattern.collect_bound_names(names),
        }
    }
}
