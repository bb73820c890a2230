use crate::{Parameters, Span, Token};
use serde::{Deserialize, Serialize};

/// An expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Expression {
    /// `foo`, also `True`, `False` and `None`.
    Name(Token),
    /// `5`, `0xFF`, `1.5e3`, `2j`
    Number(Token),
    /// One or more adjacent string literals.
    ///
    /// ```python
    /// "a" 'b' f"{c}"
    /// ```
    String(Vec<Token>),
    /// `...`
    Ellipsis(Token),
    /// `(expression)`
    Parenthesized(Parenthesized),
    /// `a, b` or `(a, b)`
    Tuple(Tuple),
    /// `[a, b]`
    List(Collection),
    /// `{a, b}`
    Set(Collection),
    /// `{k: v, **rest}`
    Dict(Dict),
    /// `[x for x in y]` and friends.
    Comprehension(Box<Comprehension>),
    /// `value.attr`
    Attribute(Attribute),
    /// `value[slice]`
    Subscript(Subscript),
    /// `func(args)`
    Call(Call),
    /// `-x`, `not x`
    UnaryOp(UnaryOp),
    /// `a + b`
    BinaryOp(BinaryOp),
    /// `a and b`
    BoolOp(BoolOp),
    /// `a < b <= c`
    Compare(Compare),
    /// `body if test else orelse`
    IfExp(IfExp),
    /// `lambda params: body`
    Lambda(Lambda),
    /// `target := value`
    NamedExpr(NamedExpr),
    /// `await value`
    Await(Await),
    /// `yield value`, `yield from value`
    Yield(Yield),
    /// `*value`
    Starred(Starred),
}

/// `(expression)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parenthesized {
    /// `(`
    pub open: Token,
    /// The wrapped expression.
    pub value: Box<Expression>,
    /// `)`
    pub close: Token,
}

/// A comma-separated element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Element {
    /// The element.
    pub value: Expression,
    /// Optional trailing `,`
    pub comma: Option<Token>,
}

/// A tuple, with or without parentheses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tuple {
    /// `(`
    pub open: Option<Token>,
    /// The elements.
    pub elements: Vec<Element>,
    /// `)`
    pub close: Option<Token>,
}

/// A bracketed list or set display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collection {
    /// `[` or `{`
    pub open: Token,
    /// The elements.
    pub elements: Vec<Element>,
    /// `]` or `}`
    pub close: Token,
}

/// `{k: v, **rest}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dict {
    /// `{`
    pub open: Token,
    /// The entries.
    pub elements: Vec<DictElement>,
    /// `}`
    pub close: Token,
}

/// An entry in a dict display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DictElement {
    /// `key: value`
    KeyValue {
        /// The key.
        key: Expression,
        /// `:`
        colon: Token,
        /// The value.
        value: Expression,
        /// Optional trailing `,`
        comma: Option<Token>,
    },
    /// `**value`
    Unpack {
        /// `**`
        stars: Token,
        /// The unpacked mapping.
        value: Expression,
        /// Optional trailing `,`
        comma: Option<Token>,
    },
}

/// What a comprehension builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComprehensionKind {
    /// `[x for x in y]`
    List,
    /// `{x for x in y}`
    Set,
    /// `{k: v for k, v in y}`
    Dict,
    /// `(x for x in y)`
    Generator,
}

/// A list, set or dict comprehension, or a generator expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comprehension {
    /// What this comprehension builds.
    pub kind: ComprehensionKind,
    /// Opening bracket, absent for a generator that is a sole call argument.
    pub open: Option<Token>,
    /// The produced element (the key, for dict comprehensions).
    pub element: Expression,
    /// `: value`, for dict comprehensions.
    pub value: Option<(Token, Expression)>,
    /// The `for` clauses, outermost first.
    pub clauses: Vec<CompFor>,
    /// Closing bracket.
    pub close: Option<Token>,
}

/// `async for target in iter if condition`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompFor {
    /// `async`
    pub async_keyword: Option<Token>,
    /// `for`
    pub for_keyword: Token,
    /// The loop target.
    pub target: Expression,
    /// `in`
    pub in_keyword: Token,
    /// The iterable.
    pub iter: Expression,
    /// Trailing `if` filters.
    pub ifs: Vec<CompIf>,
}

/// `if condition` inside a comprehension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompIf {
    /// `if`
    pub if_keyword: Token,
    /// The filter.
    pub test: Expression,
}

/// `value.attr`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    /// The object.
    pub value: Box<Expression>,
    /// `.`
    pub dot: Token,
    /// The attribute name.
    pub attr: Token,
}

/// `value[slices]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscript {
    /// The subscripted object.
    pub value: Box<Expression>,
    /// `[`
    pub open: Token,
    /// The comma separated slices.
    pub slices: Vec<SubscriptElement>,
    /// `]`
    pub close: Token,
}

/// A single slice in a subscript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptElement {
    /// The slice.
    pub slice: Slice,
    /// Optional trailing `,`
    pub comma: Option<Token>,
}

/// An index or a `lower:upper:step` slice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Slice {
    /// `x[index]`
    Index(Expression),
    /// `x[lower:upper:step]`
    Range {
        /// Lower bound.
        lower: Option<Expression>,
        /// First `:`
        first_colon: Token,
        /// Upper bound.
        upper: Option<Expression>,
        /// Second `:`
        second_colon: Option<Token>,
        /// Step.
        step: Option<Expression>,
    },
}

/// `func(args)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Call {
    /// The callee.
    pub func: Box<Expression>,
    /// `(`
    pub open: Token,
    /// The arguments.
    pub args: Vec<Arg>,
    /// `)`
    pub close: Token,
}

/// A call (or class base) argument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Arg {
    /// `*` or `**`
    pub star: Option<Token>,
    /// `keyword=`
    pub keyword: Option<(Token, Token)>,
    /// The argument value.
    pub value: Expression,
    /// Optional trailing `,`
    pub comma: Option<Token>,
}

/// `op operand`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnaryOp {
    /// `-`, `+`, `~` or `not`
    pub op: Token,
    /// The operand.
    pub operand: Box<Expression>,
}

/// `left op right`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinaryOp {
    /// Left operand.
    pub left: Box<Expression>,
    /// The operator.
    pub op: Token,
    /// Right operand.
    pub right: Box<Expression>,
}

/// `left and right`, `left or right`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoolOp {
    /// Left operand.
    pub left: Box<Expression>,
    /// `and` or `or`
    pub op: Token,
    /// Right operand.
    pub right: Box<Expression>,
}

/// A (possibly chained) comparison.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Compare {
    /// The leftmost operand.
    pub left: Box<Expression>,
    /// Each operator with its right-hand operand.
    pub comparisons: Vec<Comparison>,
}

/// `op right` in a [Compare].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comparison {
    /// The operator tokens, two for `not in` and `is not`.
    pub op: Vec<Token>,
    /// The right operand.
    pub right: Expression,
}

/// `body if test else orelse`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IfExp {
    /// Value when the test holds.
    pub body: Box<Expression>,
    /// `if`
    pub if_keyword: Token,
    /// The test.
    pub test: Box<Expression>,
    /// `else`
    pub else_keyword: Token,
    /// Value otherwise.
    pub orelse: Box<Expression>,
}

/// `lambda params: body`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lambda {
    /// `lambda`
    pub keyword: Token,
    /// Parameters, without annotations.
    pub params: Parameters,
    /// `:`
    pub colon: Token,
    /// The body.
    pub body: Box<Expression>,
}

/// `target := value`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedExpr {
    /// The target, a [Expression::Name] in valid code.
    pub target: Box<Expression>,
    /// `:=`
    pub op: Token,
    /// The value.
    pub value: Box<Expression>,
}

/// `await value`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Await {
    /// `await`
    pub keyword: Token,
    /// The awaited value.
    pub value: Box<Expression>,
}

/// `yield value` or `yield from value`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Yield {
    /// `yield`
    pub keyword: Token,
    /// `from`
    pub from_keyword: Option<Token>,
    /// The yielded value.
    pub value: Option<Box<Expression>>,
}

/// `*value`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Starred {
    /// `*`
    pub star: Token,
    /// The starred value.
    pub value: Box<Expression>,
}

impl Expression {
    /// The first token of this expression, which owns its leading trivia.
    pub fn first_token_mut(&mut self) -> &mut Token {
        match self {
            Self::Name(token) | Self::Number(token) | Self::Ellipsis(token) => token,
            Self::String(tokens) => &mut tokens[0],
            Self::Parenthesized(Parenthesized { open, .. }) => open,
            Self::Tuple(Tuple {
                open: Some(open), ..
            }) => open,
            Self::Tuple(Tuple { elements, .. }) => elements[0].value.first_token_mut(),
            Self::List(Collection { open, .. })
            | Self::Set(Collection { open, .. })
            | Self::Dict(Dict { open, .. }) => open,
            Self::Comprehension(comprehension) => match comprehension.open {
                Some(ref mut open) => open,
                None => comprehension.element.first_token_mut(),
            },
            Self::Attribute(Attribute { value, .. })
            | Self::Subscript(Subscript { value, .. })
            | Self::Call(Call { func: value, .. })
            | Self::BinaryOp(BinaryOp { left: value, .. })
            | Self::BoolOp(BoolOp { left: value, .. })
            | Self::Compare(Compare { left: value, .. })
            | Self::IfExp(IfExp { body: value, .. })
            | Self::NamedExpr(NamedExpr { target: value, .. }) => value.first_token_mut(),
            Self::UnaryOp(UnaryOp { op: token, .. })
            | Self::Lambda(Lambda { keyword: token, .. })
            | Self::Await(Await { keyword: token, .. })
            | Self::Yield(Yield { keyword: token, .. })
            | Self::Starred(Starred { star: token, .. }) => token,
        }
    }

    /// Replace the leading trivia of this expression.
    #[must_use]
    pub fn with_leading_trivia(mut self, trivia: impl Into<String>) -> Self {
        self.first_token_mut().leading_trivia = trivia.into();
        self
    }

    /// The first token of this expression.
    pub fn first_token(&self) -> &Token {
        match self {
            Self::Name(token) | Self::Number(token) | Self::Ellipsis(token) => token,
            Self::String(tokens) => &tokens[0],
            Self::Parenthesized(Parenthesized { open, .. }) => open,
            Self::Tuple(Tuple {
                open: Some(open), ..
            }) => open,
            Self::Tuple(Tuple { elements, .. }) => elements[0].value.first_token(),
            Self::List(Collection { open, .. })
            | Self::Set(Collection { open, .. })
            | Self::Dict(Dict { open, .. }) => open,
            Self::Comprehension(comprehension) => match comprehension.open {
                Some(ref open) => open,
                None => comprehension.element.first_token(),
            },
            Self::Attribute(Attribute { value, .. })
            | Self::Subscript(Subscript { value, .. })
            | Self::Call(Call { func: value, .. })
            | Self::BinaryOp(BinaryOp { left: value, .. })
            | Self::BoolOp(BoolOp { left: value, .. })
            | Self::Compare(Compare { left: value, .. })
            | Self::IfExp(IfExp { body: value, .. })
            | Self::NamedExpr(NamedExpr { target: value, .. }) => value.first_token(),
            Self::UnaryOp(UnaryOp { op: token, .. })
            | Self::Lambda(Lambda { keyword: token, .. })
            | Self::Await(Await { keyword: token, .. })
            | Self::Yield(Yield { keyword: token, .. })
            | Self::Starred(Starred { star: token, .. }) => token,
        }
    }

    /// The leading trivia of this expression.
    pub fn leading_trivia(&self) -> &str {
        &self.first_token().leading_trivia
    }

    /// Where this expression starts.
    pub fn start(&self) -> Span {
        self.first_token().span
    }

    /// The name, if this is a plain [Expression::Name].
    pub fn as_name(&self) -> Option<&str> {
        match self {
            Self::Name(token) => Some(&token.text),
            _ => None,
        }
    }

    /// The dotted path this expression spells, e.g. `"typing.Literal"`.
    ///
    /// Returns `None` for anything but names and attribute chains.
    pub fn dotted_name(&self) -> Option<String> {
        match self {
            Self::Name(token) => Some(token.text.clone()),
            Self::Attribute(Attribute { value, attr, .. }) => {
                let mut path = value.dotted_name()?;
                path.push('.');
                path.push_str(&attr.text);
                Some(path)
            }
            _ => None,
        }
    }

    /// Strip any number of redundant parentheses.
    pub fn unparenthesized(&self) -> &Self {
        match self {
            Self::Parenthesized(Parenthesized { value, .. }) => value.unparenthesized(),
            _ => self,
        }
    }

    /// Is this a literal `True`, `False` or `None`?
    pub fn is_singleton(&self) -> bool {
        matches!(self.as_name(), Some("True" | "False" | "None"))
    }

    /// Would this expression need parentheses as the operand of `not` or a comparison?
    pub fn is_compound(&self) -> bool {
        matches!(
            self,
            Self::BinaryOp(_)
                | Self::BoolOp(_)
                | Self::Compare(_)
                | Self::IfExp(_)
                | Self::Lambda(_)
                | Self::NamedExpr(_)
                | Self::UnaryOp(_)
                | Self::Yield(_)
                | Self::Tuple(Tuple { open: None, .. })
        )
    }
}
