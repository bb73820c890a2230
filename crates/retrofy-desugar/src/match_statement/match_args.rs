//! What the module itself says about the `__match_args__` of its classes.

use crate::{build, dataclass::DataclassFields};
use indexmap::IndexMap;
use retrofy_cst::{
    EmptyLine, Expression, FunctionDef, OrElse, Param, Parameters, SmallStatementKind, Statement,
    Suite, Token, Tuple,
};

/// Name of the function that checks positional sub-pattern counts at run time.
pub(super) const HELPER: &str = "_retrofy_match_args";

/// A class's `__match_args__`, as the module spells them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct MatchArgs {
    pub(super) fields: Vec<String>,
    /// Every instance has each field as an attribute, because they're the
    /// fields of a dataclass whose `__init__` sets them all.
    pub(super) exposed: bool,
}

/// Statically known `__match_args__`, by class name.
///
/// A name declared with different tables in different places maps to `None`,
/// so patterns against it fall back to the run time lookup.
#[derive(Debug, Default)]
pub(super) struct MatchArgsTable {
    classes: IndexMap<String, Option<MatchArgs>>,
}

impl MatchArgsTable {
    pub(super) fn scan(body: &[Statement]) -> Self {
        let mut table = Self::default();
        let mut dataclasses = DataclassFields::new(body);
        table.scan_statements(body, &mut dataclasses);
        table
    }

    /// The `__match_args__` of `class`, if they're known.
    pub(super) fn get(&self, class: &str) -> Option<&MatchArgs> {
        self.classes.get(class)?.as_ref()
    }

    fn scan_statements(&mut self, statements: &[Statement], dataclasses: &mut DataclassFields) {
        for statement in statements {
            if let Statement::ClassDef(class) = statement {
                let generated = dataclasses.record(class);
                if let Some(fields) = declared_match_args(&class.body) {
                    let exposed = generated.map_or(false, |generated| {
                        generated.always_set && generated.names == fields
                    });
                    self.declare(&class.name.text, MatchArgs { fields, exposed });
                }
            }
            for suite in nested_suites(statement) {
                if let Suite::Indented(block) = suite {
                    self.scan_statements(&block.body, dataclasses);
                }
            }
        }
    }

    fn declare(&mut self, class: &str, match_args: MatchArgs) {
        let known = self
            .classes
            .entry(class.to_owned())
            .or_insert_with(|| Some(match_args.clone()));
        match known {
            Some(seen) if seen.fields == match_args.fields => {
                seen.exposed &= match_args.exposed;
            }
            _ => *known = None,
        }
    }
}

fn nested_suites(statement: &Statement) -> Vec<&Suite> {
    match statement {
        Statement::Simple(_) => Vec::new(),
        Statement::If(statement) => {
            let mut suites = vec![&statement.body];
            let mut orelse = statement.orelse.as_deref();
            while let Some(next) = orelse {
                match next {
                    OrElse::Elif(elif) => {
                        suites.push(&elif.body);
                        orelse = elif.orelse.as_deref();
                    }
                    OrElse::Else(orelse_block) => {
                        suites.push(&orelse_block.body);
                        orelse = None;
                    }
                }
            }
            suites
        }
        Statement::While(statement) => std::iter::once(&statement.body)
            .chain(statement.orelse.iter().map(|orelse| &orelse.body))
            .collect(),
        Statement::For(statement) => std::iter::once(&statement.body)
            .chain(statement.orelse.iter().map(|orelse| &orelse.body))
            .collect(),
        Statement::Try(statement) => std::iter::once(&statement.body)
            .chain(statement.handlers.iter().map(|handler| &handler.body))
            .chain(statement.orelse.iter().map(|orelse| &orelse.body))
            .chain(statement.finalbody.iter().map(|finalbody| &finalbody.body))
            .collect(),
        Statement::With(statement) => vec![&statement.body],
        Statement::FunctionDef(statement) => vec![&statement.body],
        Statement::ClassDef(statement) => vec![&statement.body],
        Statement::Match(statement) => statement.cases.iter().map(|case| &case.body).collect(),
    }
}

/// `__match_args__ = ("a", "b")` in a class body, if every entry is a plain string.
fn declared_match_args(body: &Suite) -> Option<Vec<String>> {
    let statements: Vec<&SmallStatementKind> = match body {
        Suite::Simple(simple) => simple.body.iter().map(|small| &small.kind).collect(),
        Suite::Indented(block) => block
            .body
            .iter()
            .filter_map(Statement::as_simple)
            .flatten()
            .map(|small| &small.kind)
            .collect(),
    };
    statements.into_iter().rev().find_map(|kind| {
        let value = match kind {
            SmallStatementKind::Assign(assign)
                if assign
                    .targets
                    .iter()
                    .any(|(target, _)| target.as_name() == Some("__match_args__")) =>
            {
                &assign.value
            }
            SmallStatementKind::AnnAssign(assign)
                if assign.target.as_name() == Some("__match_args__") =>
            {
                &assign.value.as_ref()?.1
            }
            _ => return None,
        };
        let elements = match value.unparenthesized() {
            Expression::Tuple(Tuple { elements, .. }) => elements,
            Expression::List(list) => &list.elements,
            _ => return None,
        };
        elements
            .iter()
            .map(|element| identifier_string(&element.value))
            .collect()
    })
}

/// The value of a plain string literal that spells an identifier.
fn identifier_string(expression: &Expression) -> Option<String> {
    let Expression::String(tokens) = expression else {
        return None;
    };
    let [token] = tokens.as_slice() else {
        return None;
    };
    let text = token.text.as_str();
    let quote = ["\"\"\"", "'''", "\"", "'"]
        .into_iter()
        .find(|quote| text.starts_with(quote))?;
    let value = text.strip_prefix(quote)?.strip_suffix(quote)?;
    let is_identifier = !value.is_empty()
        && !value.starts_with(|c: char| c.is_ascii_digit())
        && value.chars().all(|c| c.is_alphanumeric() || c == '_');
    is_identifier.then(|| value.to_owned())
}

/// Does `body` already define the run time helper?
pub(super) fn defines_helper(body: &[Statement]) -> bool {
    body.iter()
        .any(|statement| matches!(statement, Statement::FunctionDef(def) if def.name.is(HELPER)))
}

/// The run time helper:
///
/// ```python
/// def _retrofy_match_args(cls, count):
///     match_args = getattr(cls, "__match_args__", ())
///     if len(match_args) < count:
///         raise TypeError("{}() accepts {} positional sub-patterns ({} given)".format(cls.__name__, len(match_args), count))
///     return match_args
/// ```
pub(super) fn helper(indent: &str) -> Statement {
    let lookup = build::assign(
        build::name("match_args"),
        build::call_positional(
            build::name("getattr"),
            vec![
                build::name("cls"),
                build::string("__match_args__", '"'),
                build::tuple(Vec::new()),
            ],
        ),
    );
    let available = || build::call_positional(build::name("len"), vec![build::name("match_args")]);
    let message = build::call_positional(
        build::attribute(
            build::string("{}() accepts {} positional sub-patterns ({} given)", '"'),
            "format",
        ),
        vec![
            build::dotted("cls.__name__"),
            available(),
            build::name("count"),
        ],
    );
    let raise = SmallStatementKind::Raise {
        keyword: Token::new("raise"),
        exception: Some(build::spaced(build::call_positional(
            build::name("TypeError"),
            vec![message],
        ))),
        cause: None,
    };
    let check = build::if_block(
        "if",
        build::compare(available(), "<", build::name("count")),
        indent,
        vec![build::line(vec![raise])],
    );
    let give_back = SmallStatementKind::Return {
        keyword: Token::new("return"),
        value: Some(build::spaced(build::name("match_args"))),
    };

    let param = |name: Token, comma: Option<Token>| Param {
        star: None,
        name: Some(name),
        annotation: None,
        default: None,
        comma,
    };
    Statement::FunctionDef(FunctionDef {
        leading_lines: Vec::new(),
        decorators: Vec::new(),
        lines_after_decorators: Vec::new(),
        async_keyword: None,
        keyword: Token::new("def"),
        name: Token::spaced(HELPER),
        type_params: None,
        open: Token::new("("),
        params: Parameters {
            params: vec![
                param(Token::new("cls"), Some(Token::new(","))),
                param(Token::spaced("count"), None),
            ],
        },
        close: Token::new(")"),
        returns: None,
        colon: Token::new(":"),
        body: Suite::indented(
            indent,
            vec![
                build::line(vec![lookup]),
                Statement::If(check),
                build::line(vec![give_back]),
            ],
        ),
    })
}

/// Blank lines to set a top-level definition apart.
pub(super) fn separator() -> Vec<EmptyLine> {
    vec![EmptyLine::blank(), EmptyLine::blank()]
}

#[cfg(test)]
mod tests {
    use super::{helper, MatchArgsTable};
    use retrofy_cst::Module;

    fn fields<'a>(table: &'a MatchArgsTable, class: &str) -> Option<(Vec<&'a str>, bool)> {
        let match_args = table.get(class)?;
        let fields = match_args.fields.iter().map(String::as_str).collect();
        Some((fields, match_args.exposed))
    }

    #[test]
    fn it_scans_class_bodies() {
        let module = Module::parse(concat!(
            "class Point:\n",
            "    __match_args__ = ('x', \"y\")\n",
            "def f():\n",
            "    class Local: __match_args__ = ['a']\n",
            "class Odd:\n",
            "    __match_args__ = ('x', 1)\n",
            "class Twice:\n",
            "    __match_args__ = ('a',)\n",
            "class Twice:\n",
            "    __match_args__ = ('b',)\n",
        ))
        .unwrap();
        let table = MatchArgsTable::scan(&module.body);
        assert_eq!(fields(&table, "Point"), Some((vec!["x", "y"], false)));
        assert_eq!(fields(&table, "Local"), Some((vec!["a"], false)));
        assert_eq!(fields(&table, "Odd"), None);
        assert_eq!(fields(&table, "Twice"), None);
        assert_eq!(fields(&table, "Missing"), None);
    }

    #[test]
    fn it_trusts_only_tables_naming_dataclass_fields() {
        let module = Module::parse(concat!(
            "from dataclasses import dataclass, field\n",
            "@dataclass\n",
            "class Base:\n",
            "    x: int\n",
            "    __match_args__ = ('x',)\n",
            "@dataclass(frozen=True)\n",
            "class Derived(Base):\n",
            "    y: int = 0\n",
            "    __match_args__ = ('x', 'y')\n",
            "@dataclass\n",
            "class Renamed:\n",
            "    x: int\n",
            "    __match_args__ = ('y',)\n",
            "@dataclass\n",
            "class Lazy:\n",
            "    x: int = field(init=False)\n",
            "    __match_args__ = ('x',)\n",
            "@dataclass(init=False)\n",
            "class Manual:\n",
            "    x: int\n",
            "    __match_args__ = ('x',)\n",
        ))
        .unwrap();
        let table = MatchArgsTable::scan(&module.body);
        assert_eq!(fields(&table, "Base"), Some((vec!["x"], true)));
        assert_eq!(fields(&table, "Derived"), Some((vec!["x", "y"], true)));
        assert_eq!(fields(&table, "Renamed"), Some((vec!["y"], false)));
        assert_eq!(fields(&table, "Lazy"), Some((vec!["x"], false)));
        assert_eq!(fields(&table, "Manual"), Some((vec!["x"], false)));
    }

    #[test]
    fn it_builds_the_helper() {
        similar_asserts::assert_eq!(
            helper("    ").render(),
            concat!(
                "def _retrofy_match_args(cls, count):\n",
                "    match_args = getattr(cls, \"__match_args__\", ())\n",
                "    if len(match_args) < count:\n",
                "        raise TypeError(\"{}() accepts {} positional sub-patterns ({} given)\".format(cls.__name__, len(match_args), count))\n",
                "    return match_args\n",
            )
        );
    }
}
