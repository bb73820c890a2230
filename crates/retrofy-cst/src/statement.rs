use crate::{Arg, EmptyLine, Expression, Pattern, Token};
use serde::{Deserialize, Serialize};

/// A statement occupying one or more whole lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Statement {
    /// One or more `;`-separated small statements on a line.
    Simple(SimpleStatementLine),
    /// `if`
    If(If),
    /// `while`
    While(While),
    /// `for`
    For(For),
    /// `try`
    Try(Try),
    /// `with`
    With(With),
    /// `def`
    FunctionDef(FunctionDef),
    /// `class`
    ClassDef(ClassDef),
    /// `match`
    Match(Match),
}

/// `a = 1; b = 2`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimpleStatementLine {
    /// Blank and comment lines before this one.
    pub leading_lines: Vec<EmptyLine>,
    /// The statements on this line.
    pub body: Vec<SmallStatement>,
    /// The line ending, with any trailing comment as trivia.
    pub newline: Token,
}

/// A small statement with its optional `;`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmallStatement {
    /// The statement.
    pub kind: SmallStatementKind,
    /// Optional trailing `;`
    pub semicolon: Option<Token>,
}

/// A statement that fits on one line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SmallStatementKind {
    /// A bare expression.
    Expr(Expression),
    /// `a = b = value`
    Assign(Assign),
    /// `target: annotation = value`
    AnnAssign(AnnAssign),
    /// `target += value`
    AugAssign(AugAssign),
    /// `return value`
    Return {
        /// `return`
        keyword: Token,
        /// The returned value.
        value: Option<Expression>,
    },
    /// `pass`
    Pass(Token),
    /// `break`
    Break(Token),
    /// `continue`
    Continue(Token),
    /// `raise exc from cause`
    Raise {
        /// `raise`
        keyword: Token,
        /// The exception.
        exception: Option<Expression>,
        /// `from cause`
        cause: Option<(Token, Expression)>,
    },
    /// `global a, b` or `nonlocal a, b`
    Global {
        /// `global` or `nonlocal`
        keyword: Token,
        /// The names, each with an optional trailing `,`.
        names: Vec<(Token, Option<Token>)>,
    },
    /// `del a, b`
    Del {
        /// `del`
        keyword: Token,
        /// The targets.
        target: Expression,
    },
    /// `assert test, message`
    Assert {
        /// `assert`
        keyword: Token,
        /// The asserted condition.
        test: Expression,
        /// `, message`
        message: Option<(Token, Expression)>,
    },
    /// `import a.b as c`
    Import(Import),
    /// `from a import b`
    ImportFrom(ImportFrom),
    /// `type Alias[T] = value`
    TypeAlias(TypeAlias),
}

impl SmallStatementKind {
    /// The first token of this statement, which owns its leading trivia.
    pub fn first_token_mut(&mut self) -> &mut Token {
        match self {
            Self::Expr(value) => value.first_token_mut(),
            Self::Assign(Assign { targets, value }) => match targets.first_mut() {
                Some((target, _)) => target.first_token_mut(),
                None => value.first_token_mut(),
            },
            Self::AnnAssign(AnnAssign { target, .. })
            | Self::AugAssign(AugAssign { target, .. }) => target.first_token_mut(),
            Self::Pass(keyword)
            | Self::Break(keyword)
            | Self::Continue(keyword)
            | Self::Return { keyword, .. }
            | Self::Raise { keyword, .. }
            | Self::Global { keyword, .. }
            | Self::Del { keyword, .. }
            | Self::Assert { keyword, .. }
            | Self::Import(Import { keyword, .. })
            | Self::ImportFrom(ImportFrom {
                from_keyword: keyword,
                ..
            })
            | Self::TypeAlias(TypeAlias { keyword, .. }) => keyword,
        }
    }
}

/// `a = b = value`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assign {
    /// The targets, each with its `=`.
    pub targets: Vec<(Expression, Token)>,
    /// The assigned value.
    pub value: Expression,
}

/// `target: annotation = value`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnAssign {
    /// The target.
    pub target: Expression,
    /// `:`
    pub colon: Token,
    /// The annotation.
    pub annotation: Expression,
    /// `= value`
    pub value: Option<(Token, Expression)>,
}

/// `target op= value`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AugAssign {
    /// The target.
    pub target: Expression,
    /// `+=`, `-=` and friends.
    pub op: Token,
    /// The value.
    pub value: Expression,
}

/// `import a, b.c as d`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Import {
    /// `import`
    pub keyword: Token,
    /// The imported modules.
    pub names: Vec<ImportAlias>,
}

/// `name as alias`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportAlias {
    /// A name or dotted name.
    pub name: Expression,
    /// `as alias`
    pub asname: Option<(Token, Token)>,
    /// Optional trailing `,`
    pub comma: Option<Token>,
}

impl ImportAlias {
    /// The name this import binds locally.
    pub fn local_name(&self) -> Option<String> {
        match &self.asname {
            Some((_, alias)) => Some(alias.text.clone()),
            None => self.name.dotted_name(),
        }
    }
}

/// `from .module import a, b as c`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportFrom {
    /// `from`
    pub from_keyword: Token,
    /// Leading dots of a relative import.
    pub relative: Vec<Token>,
    /// The module, absent for `from . import x`.
    pub module: Option<Expression>,
    /// `import`
    pub import_keyword: Token,
    /// The imported names.
    pub names: ImportNames,
}

impl ImportFrom {
    /// The absolute module path, `None` for relative imports.
    pub fn module_name(&self) -> Option<String> {
        if !self.relative.is_empty() {
            return None;
        }
        self.module.as_ref().and_then(Expression::dotted_name)
    }
}

/// What a `from` import imports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImportNames {
    /// `*`
    Star(Token),
    /// `a, b` or `(a, b)`
    Aliases {
        /// `(`
        open: Option<Token>,
        /// The names.
        names: Vec<ImportAlias>,
        /// `)`
        close: Option<Token>,
    },
}

/// `type Alias[T] = value`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeAlias {
    /// `type`
    pub keyword: Token,
    /// The alias name.
    pub name: Token,
    /// `[T, U]`
    pub type_params: Option<TypeParams>,
    /// `=`
    pub equals: Token,
    /// The aliased type.
    pub value: Expression,
}

/// `[T: Bound, *Ts, **P]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeParams {
    /// `[`
    pub open: Token,
    /// The parameters.
    pub params: Vec<TypeParam>,
    /// `]`
    pub close: Token,
}

/// A single type parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeParam {
    /// `*` for a type variable tuple, `**` for a parameter specification.
    pub star: Option<Token>,
    /// The name.
    pub name: Token,
    /// `: bound` or `: (constraint, ...)`
    pub bound: Option<(Token, Expression)>,
    /// Optional trailing `,`
    pub comma: Option<Token>,
}

/// The body of a compound statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Suite {
    /// An indented block on the following lines.
    Indented(IndentedBlock),
    /// Small statements on the header line: `if x: pass`
    Simple(SimpleSuite),
}

/// An indented block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndentedBlock {
    /// The header's line ending, with any trailing comment as trivia.
    pub newline: Token,
    /// The indentation relative to the parent block.
    pub indent: String,
    /// The statements.
    pub body: Vec<Statement>,
    /// Comment lines after the last statement, indented like the block.
    pub footer: Vec<EmptyLine>,
}

/// `if x: a; b`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimpleSuite {
    /// The statements.
    pub body: Vec<SmallStatement>,
    /// The line ending.
    pub newline: Token,
}

/// `if test:` or `elif test:` and everything after it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct If {
    /// Blank and comment lines before the clause.
    pub leading_lines: Vec<EmptyLine>,
    /// `if` or `elif`
    pub keyword: Token,
    /// The condition.
    pub test: Expression,
    /// `:`
    pub colon: Token,
    /// The body.
    pub body: Suite,
    /// `elif ...` or `else: ...`
    pub orelse: Option<Box<OrElse>>,
}

/// What follows an `if` body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrElse {
    /// `elif test: ...`, whose keyword is `elif`.
    Elif(If),
    /// `else: ...`
    Else(Else),
}

/// `else: ...`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Else {
    /// Blank and comment lines before the clause.
    pub leading_lines: Vec<EmptyLine>,
    /// `else`
    pub keyword: Token,
    /// `:`
    pub colon: Token,
    /// The body.
    pub body: Suite,
}

/// `while test: ...`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct While {
    /// Blank and comment lines before the statement.
    pub leading_lines: Vec<EmptyLine>,
    /// `while`
    pub keyword: Token,
    /// The loop condition.
    pub test: Expression,
    /// `:`
    pub colon: Token,
    /// The loop body.
    pub body: Suite,
    /// `else: ...`
    pub orelse: Option<Else>,
}

/// `for target in iter: ...`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct For {
    /// Blank and comment lines before the statement.
    pub leading_lines: Vec<EmptyLine>,
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
    /// `:`
    pub colon: Token,
    /// The loop body.
    pub body: Suite,
    /// `else: ...`
    pub orelse: Option<Else>,
}

/// `try: ... except: ... else: ... finally: ...`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Try {
    /// Blank and comment lines before the statement.
    pub leading_lines: Vec<EmptyLine>,
    /// `try`
    pub keyword: Token,
    /// `:`
    pub colon: Token,
    /// The guarded body.
    pub body: Suite,
    /// The `except` clauses.
    pub handlers: Vec<ExceptHandler>,
    /// `else: ...`
    pub orelse: Option<Else>,
    /// `finally: ...`
    pub finalbody: Option<Else>,
}

/// `except* Type as name: ...`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExceptHandler {
    /// Blank and comment lines before the clause.
    pub leading_lines: Vec<EmptyLine>,
    /// `except`
    pub keyword: Token,
    /// `*` of an exception group handler.
    pub star: Option<Token>,
    /// The caught exception type.
    pub type_: Option<Expression>,
    /// `as name`
    pub name: Option<(Token, Token)>,
    /// `:`
    pub colon: Token,
    /// The handler body.
    pub body: Suite,
}

/// `with a as b, c: ...`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct With {
    /// Blank and comment lines before the statement.
    pub leading_lines: Vec<EmptyLine>,
    /// `async`
    pub async_keyword: Option<Token>,
    /// `with`
    pub keyword: Token,
    /// `(` around the items.
    pub open: Option<Token>,
    /// The context managers.
    pub items: Vec<WithItem>,
    /// `)` around the items.
    pub close: Option<Token>,
    /// `:`
    pub colon: Token,
    /// The body.
    pub body: Suite,
}

/// `manager as target`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithItem {
    /// The context manager.
    pub item: Expression,
    /// `as target`
    pub asname: Option<(Token, Expression)>,
    /// Optional trailing `,`
    pub comma: Option<Token>,
}

/// `@decorator`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decorator {
    /// Blank and comment lines before the decorator.
    pub leading_lines: Vec<EmptyLine>,
    /// `@`
    pub at: Token,
    /// The decorator expression.
    pub expression: Expression,
    /// The line ending.
    pub newline: Token,
}

/// `def name(params) -> returns: ...`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionDef {
    /// Blank and comment lines before the first decorator, or the `def`.
    pub leading_lines: Vec<EmptyLine>,
    /// The decorators.
    pub decorators: Vec<Decorator>,
    /// Blank and comment lines between the decorators and the `def`.
    pub lines_after_decorators: Vec<EmptyLine>,
    /// `async`
    pub async_keyword: Option<Token>,
    /// `def`
    pub keyword: Token,
    /// The function name.
    pub name: Token,
    /// `[T]`
    pub type_params: Option<TypeParams>,
    /// `(`
    pub open: Token,
    /// The parameters.
    pub params: Parameters,
    /// `)`
    pub close: Token,
    /// `-> annotation`
    pub returns: Option<(Token, Expression)>,
    /// `:`
    pub colon: Token,
    /// The body.
    pub body: Suite,
}

/// A parameter list, for functions and lambdas.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Parameters {
    /// The parameters, including the bare `*` and `/` markers.
    pub params: Vec<Param>,
}

/// A single parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Param {
    /// `*`, `**` or `/`
    pub star: Option<Token>,
    /// The name, absent for the bare `*` and `/` markers.
    pub name: Option<Token>,
    /// `: annotation`
    pub annotation: Option<(Token, Expression)>,
    /// `= default`
    pub default: Option<(Token, Expression)>,
    /// Optional trailing `,`
    pub comma: Option<Token>,
}

/// `class Name(bases): ...`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassDef {
    /// Blank and comment lines before the first decorator, or the `class`.
    pub leading_lines: Vec<EmptyLine>,
    /// The decorators.
    pub decorators: Vec<Decorator>,
    /// Blank and comment lines between the decorators and the `class`.
    pub lines_after_decorators: Vec<EmptyLine>,
    /// `class`
    pub keyword: Token,
    /// The class name.
    pub name: Token,
    /// `[T]`
    pub type_params: Option<TypeParams>,
    /// `(`
    pub open: Option<Token>,
    /// Bases and keywords.
    pub args: Vec<Arg>,
    /// `)`
    pub close: Option<Token>,
    /// `:`
    pub colon: Token,
    /// The class body.
    pub body: Suite,
}

/// `match subject: case ...`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Match {
    /// Blank and comment lines before the statement.
    pub leading_lines: Vec<EmptyLine>,
    /// `match`
    pub keyword: Token,
    /// The value being matched.
    pub subject: Expression,
    /// `:`
    pub colon: Token,
    /// The header's line ending.
    pub newline: Token,
    /// The indentation of the `case` lines, relative to the `match`.
    pub indent: String,
    /// The cases, in source order.
    pub cases: Vec<MatchCase>,
    /// Comment lines after the last case.
    pub footer: Vec<EmptyLine>,
}

/// `case pattern if guard: ...`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchCase {
    /// Blank and comment lines before the clause.
    pub leading_lines: Vec<EmptyLine>,
    /// `case`
    pub keyword: Token,
    /// The pattern.
    pub pattern: Pattern,
    /// `if guard`
    pub guard: Option<(Token, Expression)>,
    /// `:`
    pub colon: Token,
    /// The body.
    pub body: Suite,
}

impl Statement {
    /// The blank and comment lines before this statement.
    pub fn leading_lines_mut(&mut self) -> &mut Vec<EmptyLine> {
        match self {
            Self::Simple(SimpleStatementLine { leading_lines, .. })
            | Self::If(If { leading_lines, .. })
            | Self::While(While { leading_lines, .. })
            | Self::For(For { leading_lines, .. })
            | Self::Try(Try { leading_lines, .. })
            | Self::With(With { leading_lines, .. })
            | Self::FunctionDef(FunctionDef { leading_lines, .. })
            | Self::ClassDef(ClassDef { leading_lines, .. })
            | Self::Match(Match { leading_lines, .. }) => leading_lines,
        }
    }

    /// The small statements, if this is a simple statement line.
    pub fn as_simple(&self) -> Option<&[SmallStatement]> {
        match self {
            Self::Simple(line) => Some(&line.body),
            _ => None,
        }
    }

    /// Is this an `import` or `from ... import` line?
    pub fn is_import(&self) -> bool {
        self.as_simple().map_or(false, |body| {
            body.iter().all(|small| {
                matches!(
                    small.kind,
                    SmallStatementKind::Import(_) | SmallStatementKind::ImportFrom(_)
                )
            })
        })
    }

    /// Is this a `from __future__ import ...` line?
    pub fn is_future_import(&self) -> bool {
        self.as_simple().map_or(false, |body| {
            body.iter().all(|small| match &small.kind {
                SmallStatementKind::ImportFrom(import) => {
                    import.module_name().as_deref() == Some("__future__")
                }
                _ => false,
            })
        })
    }

    /// Is this a lone string expression?
    pub fn is_docstring(&self) -> bool {
        matches!(
            self.as_simple(),
            Some([SmallStatement {
                kind: SmallStatementKind::Expr(Expression::String(_)),
                ..
            }])
        )
    }
}

impl Suite {
    /// A block of statements.
    pub fn indented(indent: impl Into<String>, body: Vec<Statement>) -> Self {
        Self::Indented(IndentedBlock {
            newline: Token::new("\n"),
            indent: indent.into(),
            body,
            footer: Vec::new(),
        })
    }
}
