//! `type` statements become assignments, with `TypeVar`s for generic aliases.

use crate::{build, imports, DesugarError};
use retrofy_cst::{
    visit::{walk_statement, walk_suite},
    AnnAssign, Assign, Expression, Module, SmallStatement, SmallStatementKind, Statement, Suite,
    Token, Transformer, Tuple, TypeAlias, TypeParam,
};

pub(crate) fn desugar(mut module: Module) -> Result<Module, DesugarError> {
    let mut aliases = TypeAliases::default();
    aliases.transform_module(&mut module)?;
    if aliases.needs_typing_extensions {
        imports::ensure_module_import(&mut module.body, "typing_extensions");
    }
    if aliases.needs_typing {
        imports::ensure_module_import(&mut module.body, "typing");
    }
    Ok(module)
}

#[derive(Default)]
struct TypeAliases {
    needs_typing: bool,
    needs_typing_extensions: bool,
}

fn is_type_alias(small: &SmallStatement) -> bool {
    matches!(small.kind, SmallStatementKind::TypeAlias(_))
}

impl TypeAliases {
    /// `T = typing.TypeVar("T")` and friends.
    fn type_var(&mut self, param: TypeParam) -> SmallStatementKind {
        let name = param.name.text;
        let label = build::string(&name, '"');
        let (factory, args) = match param.star.as_ref().map(|star| star.text.as_str()) {
            Some("*") => {
                self.needs_typing_extensions = true;
                ("typing_extensions.TypeVarTuple", vec![build::arg(label)])
            }
            Some(_) => {
                self.needs_typing_extensions = true;
                ("typing_extensions.ParamSpec", vec![build::arg(label)])
            }
            None => {
                let mut args = vec![build::arg(label)];
                match param.bound {
                    Some((
                        _,
                        Expression::Tuple(Tuple {
                            open: Some(_),
                            elements,
                            ..
                        }),
                    )) => args.extend(
                        elements
                            .into_iter()
                            .map(|element| build::arg(element.value)),
                    ),
                    Some((_, bound)) => args.push(build::keyword_arg("bound", bound)),
                    None => {}
                }
                ("typing.TypeVar", args)
            }
        };
        build::assign(build::name(&name), build::call(build::dotted(factory), args))
    }

    /// The statement replacing `alias`, and the `TypeVar`s it needs first.
    fn convert(&mut self, alias: TypeAlias) -> (Vec<SmallStatementKind>, SmallStatementKind) {
        let TypeAlias {
            keyword,
            name,
            type_params,
            equals,
            value,
        } = alias;
        tracing::debug!(
            alias = %name.text,
            generic = type_params.is_some(),
            "rewriting type alias"
        );
        let target = Expression::Name(Token {
            leading_trivia: keyword.leading_trivia,
            ..name
        });
        match type_params {
            None => (
                Vec::new(),
                SmallStatementKind::Assign(Assign {
                    targets: vec![(target, equals)],
                    value,
                }),
            ),
            Some(params) => {
                self.needs_typing = true;
                let type_vars = params
                    .params
                    .into_iter()
                    .map(|param| self.type_var(param))
                    .collect();
                let statement = SmallStatementKind::AnnAssign(AnnAssign {
                    target,
                    colon: Token::new(":"),
                    annotation: build::spaced(build::dotted("typing.TypeAlias")),
                    value: Some((equals, value)),
                });
                (type_vars, statement)
            }
        }
    }

    /// Convert the aliases in `body`, returning the `TypeVar`s they need.
    fn convert_small_statements(
        &mut self,
        body: &mut [SmallStatement],
    ) -> Vec<SmallStatementKind> {
        let mut type_vars = Vec::new();
        for small in body.iter_mut().filter(|small| is_type_alias(small)) {
            let placeholder = SmallStatementKind::Pass(Token::new("pass"));
            if let SmallStatementKind::TypeAlias(alias) =
                std::mem::replace(&mut small.kind, placeholder)
            {
                let (vars, statement) = self.convert(alias);
                type_vars.extend(vars);
                small.kind = statement;
            }
        }
        type_vars
    }
}

impl Transformer for TypeAliases {
    type Error = DesugarError;

    fn transform_statements(
        &mut self,
        statements: &mut Vec<Statement>,
    ) -> Result<(), DesugarError> {
        let old = std::mem::take(statements);
        for mut statement in old {
            let Statement::Simple(line) = &mut statement else {
                walk_statement(self, &mut statement)?;
                statements.push(statement);
                continue;
            };
            let type_vars = self.convert_small_statements(&mut line.body);
            let mut lines: Vec<Statement> = type_vars
                .into_iter()
                .map(|type_var| build::line(vec![type_var]))
                .collect();
            if let Some(first) = lines.first_mut() {
                *first.leading_lines_mut() = std::mem::take(&mut line.leading_lines);
            }
            statements.extend(lines);
            statements.push(statement);
        }
        Ok(())
    }

    fn transform_suite(&mut self, suite: &mut Suite) -> Result<(), DesugarError> {
        let Suite::Simple(simple) = suite else {
            return walk_suite(self, suite);
        };
        let type_vars = self.convert_small_statements(&mut simple.body);
        if type_vars.is_empty() {
            return Ok(());
        }
        let mut body = build::join_small(type_vars);
        if let Some(first) = simple.body.first_mut() {
            let trivia = std::mem::replace(
                &mut first.kind.first_token_mut().leading_trivia,
                String::from(" "),
            );
            if let Some(first_var) = body.first_mut() {
                first_var.kind.first_token_mut().leading_trivia = trivia;
            }
        }
        if let Some(last) = body.last_mut() {
            last.semicolon = Some(Token::new(";"));
        }
        body.append(&mut simple.body);
        simple.body = body;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::desugar_type_alias;
    use retrofy_cst::Module;

    macro_rules! assert_converts {
        ($source:expr, $want:expr) => {{
            let module = Module::parse($source).unwrap_or_else(|err| panic!("{err:?}"));
            let got = desugar_type_alias(module).unwrap_or_else(|err| panic!("{err}"));
            similar_asserts::assert_eq!(got.render(), $want);
        }};
    }

    #[test]
    fn it_rewrites_plain_aliases() {
        assert_converts!(
            "type Point = tuple[float, float]  # xy\n",
            "Point = tuple[float, float]  # xy\n"
        );
    }

    #[test]
    fn it_declares_type_variables() {
        assert_converts!(
            "# aliases\ntype Pair[T] = tuple[T, T]\n",
            "# aliases\nimport typing\nT = typing.TypeVar(\"T\")\nPair: typing.TypeAlias = tuple[T, T]\n"
        );
        assert_converts!(
            "type Fn[T, U: int, V: (str, bytes), *Ts, **P] = Callable[P, T]\n",
            concat!(
                "import typing\n",
                "import typing_extensions\n",
                "T = typing.TypeVar(\"T\")\n",
                "U = typing.TypeVar(\"U\", bound=int)\n",
                "V = typing.TypeVar(\"V\", str, bytes)\n",
                "Ts = typing_extensions.TypeVarTuple(\"Ts\")\n",
                "P = typing_extensions.ParamSpec(\"P\")\n",
                "Fn: typing.TypeAlias = Callable[P, T]\n",
            )
        );
    }

    #[test]
    fn it_rewrites_nested_aliases() {
        assert_converts!(
            "import typing\ndef f():\n    type A[T] = list[T]\n    return A\nif x: type B = int\n",
            "import typing\ndef f():\n    T = typing.TypeVar(\"T\")\n    A: typing.TypeAlias = list[T]\n    return A\nif x: B = int\n"
        );
        assert_converts!(
            "from __future__ import annotations\nif x: type B[T] = T\n",
            "from __future__ import annotations\nimport typing\nif x: T = typing.TypeVar(\"T\"); B: typing.TypeAlias = T\n"
        );
    }
}
