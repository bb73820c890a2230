//! `__match_args__` for dataclasses, so positional class patterns can be
//! compiled without asking the class at run time.

use crate::{
    build,
    imports::{ImportTable, SymbolMatcher},
    DesugarError,
};
use indexmap::IndexMap;
use retrofy_cst::{
    visit::walk_statement, Arg, ClassDef, Expression, Module, SimpleSuite, SmallStatementKind,
    Statement, Suite, Token, Transformer,
};

pub(crate) fn desugar(mut module: Module) -> Result<Module, DesugarError> {
    let mut dataclasses = Dataclasses {
        known: DataclassFields::new(&module.body),
    };
    if dataclasses.known.is_imported() {
        dataclasses.transform_module(&mut module)?;
    }
    Ok(module)
}

struct Dataclasses {
    known: DataclassFields,
}

/// The positional fields of a dataclass, inherited ones first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Fields {
    pub(crate) names: Vec<String>,
    /// Whether the generated `__init__` sets every one of `names`.
    pub(crate) always_set: bool,
}

/// Positional fields of the dataclasses seen so far, by class name.
pub(crate) struct DataclassFields {
    decorator: SymbolMatcher,
    classes: IndexMap<String, Fields>,
}

/// Is `keyword=value` among `args`, with `value` the given name?
fn has_keyword(args: &[Arg], keyword: &str, value: &str) -> bool {
    args.iter().any(|arg| match &arg.keyword {
        Some((name, _)) => name.is(keyword) && arg.value.as_name() == Some(value),
        None => false,
    })
}

fn passes_keyword(args: &[Arg], keyword: &str) -> bool {
    args.iter()
        .any(|arg| matches!(&arg.keyword, Some((name, _)) if name.is(keyword)))
}

/// The last component of the dotted name of `annotation`, or of its subscripted base.
fn annotation_kind(annotation: &Expression) -> Option<String> {
    let base = match annotation.unparenthesized() {
        Expression::Subscript(subscript) => subscript.value.as_ref(),
        other => other,
    };
    let path = base.dotted_name()?;
    Some(path.rsplit('.').next().unwrap_or(&path).to_owned())
}

/// The arguments of `value`, if it's a `field(...)` call.
fn field_call(value: &Expression) -> Option<&[Arg]> {
    match value.unparenthesized() {
        Expression::Call(call) => {
            let is_field = call
                .func
                .dotted_name()
                .map_or(false, |path| path == "field" || path.ends_with(".field"));
            is_field.then_some(call.args.as_slice())
        }
        _ => None,
    }
}

fn class_statements(body: &Suite) -> Vec<&SmallStatementKind> {
    match body {
        Suite::Simple(SimpleSuite { body, .. }) => body.iter().map(|small| &small.kind).collect(),
        Suite::Indented(block) => block
            .body
            .iter()
            .filter_map(Statement::as_simple)
            .flatten()
            .map(|small| &small.kind)
            .collect(),
    }
}

fn declares_match_args(statements: &[&SmallStatementKind]) -> bool {
    statements.iter().any(|kind| match kind {
        SmallStatementKind::Assign(assign) => assign
            .targets
            .iter()
            .any(|(target, _)| target.as_name() == Some("__match_args__")),
        SmallStatementKind::AnnAssign(assign) => assign.target.as_name() == Some("__match_args__"),
        _ => false,
    })
}

/// The positional `__init__` parameters declared in a class body, each with
/// whether `__init__` is sure to set it.
fn declared_fields(statements: &[&SmallStatementKind]) -> Vec<(String, bool)> {
    let mut fields = Vec::new();
    for kind in statements {
        let SmallStatementKind::AnnAssign(assign) = kind else {
            continue;
        };
        match annotation_kind(&assign.annotation).as_deref() {
            Some("KW_ONLY") => break,
            Some("ClassVar" | "InitVar") => continue,
            _ => {}
        }
        let mut always_set = true;
        if let Some(args) = assign.value.as_ref().and_then(|(_, value)| field_call(value)) {
            if has_keyword(args, "kw_only", "True") {
                continue;
            }
            always_set = !has_keyword(args, "init", "False")
                || passes_keyword(args, "default")
                || passes_keyword(args, "default_factory");
        }
        if let Some(name) = assign.target.as_name() {
            fields.push((name.to_owned(), always_set));
        }
    }
    fields
}

impl DataclassFields {
    pub(crate) fn new(body: &[Statement]) -> Self {
        let table = ImportTable::scan(body);
        Self {
            decorator: SymbolMatcher::new(&table, "dataclasses", "dataclass"),
            classes: IndexMap::new(),
        }
    }

    pub(crate) fn is_imported(&self) -> bool {
        self.decorator.is_imported()
    }

    /// The `@dataclass` decorator's arguments, if the class has one.
    fn dataclass_args<'a>(&self, class: &'a ClassDef) -> Option<&'a [Arg]> {
        class.decorators.iter().find_map(|decorator| {
            if !self.decorator.matches_callee(&decorator.expression) {
                return None;
            }
            match decorator.expression.unparenthesized() {
                Expression::Call(call) => Some(call.args.as_slice()),
                _ => Some(&[][..]),
            }
        })
    }

    /// Work out and remember the fields of `class`, if it's a dataclass whose
    /// `__match_args__` are generated.
    ///
    /// Bases must be recorded before the classes deriving from them.
    pub(crate) fn record(&mut self, class: &ClassDef) -> Option<Fields> {
        let args = self.dataclass_args(class)?;
        if has_keyword(args, "match_args", "False") || has_keyword(args, "kw_only", "True") {
            return None;
        }
        let mut fields = Fields {
            names: Vec::new(),
            always_set: !has_keyword(args, "init", "False"),
        };
        let bases = class
            .args
            .iter()
            .filter(|arg| arg.keyword.is_none() && arg.star.is_none());
        for base in bases {
            let inherited = base.value.as_name().and_then(|name| self.classes.get(name));
            let Some(inherited) = inherited else {
                continue;
            };
            fields.always_set &= inherited.always_set;
            for name in inherited.names.iter() {
                if !fields.names.contains(name) {
                    fields.names.push(name.clone());
                }
            }
        }
        for (name, always_set) in declared_fields(&class_statements(&class.body)) {
            fields.always_set &= always_set;
            if !fields.names.contains(&name) {
                fields.names.push(name);
            }
        }
        self.classes.insert(class.name.text.clone(), fields.clone());
        Some(fields)
    }
}

impl Dataclasses {
    fn add_match_args(&mut self, class: &mut ClassDef) {
        let Some(Fields { names, .. }) = self.known.record(class) else {
            return;
        };
        if names.is_empty() || declares_match_args(&class_statements(&class.body)) {
            return;
        }

        tracing::debug!(class = %class.name.text, fields = ?names, "adding __match_args__");
        let value = build::tuple(
            names
                .iter()
                .map(|field| build::string(field, '\''))
                .collect(),
        );
        let assign = build::assign(build::name("__match_args__"), value);
        match &mut class.body {
            Suite::Indented(block) => block.body.push(build::line(vec![assign])),
            Suite::Simple(simple) => {
                if let Some(last) = simple.body.last_mut() {
                    last.semicolon = Some(Token::new(";"));
                }
                let mut small = build::small(assign);
                small.kind.first_token_mut().leading_trivia = String::from(" ");
                simple.body.push(small);
            }
        }
    }
}

impl Transformer for Dataclasses {
    type Error = DesugarError;

    fn transform_statement(&mut self, statement: &mut Statement) -> Result<(), DesugarError> {
        walk_statement(self, statement)?;
        if let Statement::ClassDef(class) = statement {
            self.add_match_args(class);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::desugar_dataclass;
    use retrofy_cst::Module;

    macro_rules! assert_converts {
        ($source:expr, $want:expr) => {{
            let module = Module::parse($source).unwrap_or_else(|err| panic!("{err:?}"));
            let got = desugar_dataclass(module).unwrap_or_else(|err| panic!("{err}"));
            similar_asserts::assert_eq!(got.render(), $want);
        }};
    }

    macro_rules! assert_unchanged {
        ($source:expr) => {{
            assert_converts!($source, $source);
        }};
    }

    #[test]
    fn it_adds_match_args() {
        assert_converts!(
            "from dataclasses import dataclass\n\n@dataclass\nclass Point:\n    x: int\n    y: int = 0\n\n    def norm(self):\n        return 0\n",
            "from dataclasses import dataclass\n\n@dataclass\nclass Point:\n    x: int\n    y: int = 0\n\n    def norm(self):\n        return 0\n    __match_args__ = ('x', 'y')\n"
        );
        assert_converts!(
            "import dataclasses\n@dataclasses.dataclass(frozen=True)\nclass One:\n    value: str\n",
            "import dataclasses\n@dataclasses.dataclass(frozen=True)\nclass One:\n    value: str\n    __match_args__ = ('value',)\n"
        );
    }

    #[test]
    fn it_skips_non_positional_fields() {
        assert_converts!(
            concat!(
                "from dataclasses import dataclass, field, KW_ONLY\n",
                "from typing import ClassVar\n",
                "@dataclass\n",
                "class C:\n",
                "    a: int\n",
                "    count: ClassVar[int] = 0\n",
                "    b: list = field(default_factory=list)\n",
                "    c: int = field(kw_only=True, default=1)\n",
                "    _: KW_ONLY\n",
                "    d: int = 2\n",
            ),
            concat!(
                "from dataclasses import dataclass, field, KW_ONLY\n",
                "from typing import ClassVar\n",
                "@dataclass\n",
                "class C:\n",
                "    a: int\n",
                "    count: ClassVar[int] = 0\n",
                "    b: list = field(default_factory=list)\n",
                "    c: int = field(kw_only=True, default=1)\n",
                "    _: KW_ONLY\n",
                "    d: int = 2\n",
                "    __match_args__ = ('a', 'b')\n",
            )
        );
    }

    #[test]
    fn it_includes_inherited_fields() {
        assert_converts!(
            "from dataclasses import dataclass\n@dataclass\nclass A:\n    x: int\n@dataclass\nclass B(A):\n    y: int\n",
            "from dataclasses import dataclass\n@dataclass\nclass A:\n    x: int\n    __match_args__ = ('x',)\n@dataclass\nclass B(A):\n    y: int\n    __match_args__ = ('x', 'y')\n"
        );
    }

    #[test]
    fn it_inherits_from_bases_with_their_own_match_args() {
        assert_converts!(
            concat!(
                "from dataclasses import dataclass\n",
                "@dataclass\n",
                "class A:\n",
                "    x: int\n",
                "    __match_args__ = ('x',)\n",
                "@dataclass\n",
                "class B(A):\n",
                "    y: int\n",
            ),
            concat!(
                "from dataclasses import dataclass\n",
                "@dataclass\n",
                "class A:\n",
                "    x: int\n",
                "    __match_args__ = ('x',)\n",
                "@dataclass\n",
                "class B(A):\n",
                "    y: int\n",
                "    __match_args__ = ('x', 'y')\n",
            )
        );
    }

    #[test]
    fn it_respects_opt_outs() {
        assert_unchanged!(
            "from dataclasses import dataclass\n@dataclass(match_args=False)\nclass P:\n    x: int\n"
        );
        assert_unchanged!(
            "from dataclasses import dataclass\n@dataclass(kw_only=True)\nclass P:\n    x: int\n"
        );
        assert_unchanged!(
            "from dataclasses import dataclass\n@dataclass\nclass P:\n    x: int\n    __match_args__ = ()\n"
        );
        assert_unchanged!("from dataclasses import dataclass\n@dataclass\nclass Empty:\n    pass\n");
        assert_unchanged!("@dataclass\nclass NotImported:\n    x: int\n");
        assert_unchanged!("from dataclasses import dataclass\nclass Plain:\n    x: int\n");
    }

    #[test]
    fn it_is_idempotent() {
        let source = "from dataclasses import dataclass\n@dataclass\nclass P:\n    x: int\n";
        let once = desugar_dataclass(Module::parse(source).unwrap()).unwrap().render();
        let twice = desugar_dataclass(Module::parse(&once).unwrap()).unwrap().render();
        similar_asserts::assert_eq!(once, twice);
    }
}
