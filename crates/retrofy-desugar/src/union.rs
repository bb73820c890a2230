//! `A | B` annotations become `typing.Union[A, B]`.

use crate::{build, imports, DesugarError};
use retrofy_cst::{
    visit::walk_small_statement, BinaryOp, Expression, Module, Slice, SmallStatement,
    SmallStatementKind, Token, Transformer,
};

pub(crate) fn desugar(mut module: Module) -> Result<Module, DesugarError> {
    let mut unions = Unions::default();
    unions.transform_module(&mut module)?;
    if unions.rewritten > 0 {
        tracing::debug!(count = unions.rewritten, "rewrote union annotations");
        imports::ensure_module_import(&mut module.body, "typing");
    }
    Ok(module)
}

/// Is this the `TypeAlias` marker of `Alias: TypeAlias = value`?
pub(crate) fn is_type_alias_marker(annotation: &Expression) -> bool {
    annotation
        .dotted_name()
        .map_or(false, |path| path == "TypeAlias" || path.ends_with(".TypeAlias"))
}

/// Is this `Literal[...]`, whose contents are values rather than types?
pub(crate) fn is_literal(value: &Expression) -> bool {
    value
        .dotted_name()
        .map_or(false, |path| path == "Literal" || path.ends_with(".Literal"))
}

/// The value of an annotated type alias, which is a type too.
pub(crate) fn aliased_type(statement: &mut SmallStatement) -> Option<&mut Expression> {
    match &mut statement.kind {
        SmallStatementKind::AnnAssign(assign) if is_type_alias_marker(&assign.annotation) => {
            assign.value.as_mut().map(|(_, value)| value)
        }
        _ => None,
    }
}

#[derive(Default)]
struct Unions {
    rewritten: usize,
}

fn is_union(expression: &Expression) -> bool {
    matches!(expression, Expression::BinaryOp(BinaryOp { op, .. }) if op.is("|"))
}

/// The members of an unparenthesized `a | b | c` chain, left to right.
fn members(expression: Expression, into: &mut Vec<Expression>) {
    match expression {
        Expression::BinaryOp(BinaryOp { left, op, right }) if op.is("|") => {
            members(*left, into);
            members(*right, into);
        }
        other => into.push(other),
    }
}

impl Unions {
    fn rewrite(&mut self, expression: &mut Expression) {
        if is_union(expression) {
            let trivia = expression.leading_trivia().to_owned();
            let placeholder = Expression::Ellipsis(Token::new("..."));
            let mut found = Vec::new();
            members(std::mem::replace(expression, placeholder), &mut found);
            for member in found.iter_mut() {
                self.rewrite(member);
            }
            self.rewritten += 1;
            *expression = build::subscript_many(build::dotted("typing.Union"), found)
                .with_leading_trivia(trivia);
            return;
        }
        match expression {
            Expression::Parenthesized(parenthesized) => self.rewrite(&mut parenthesized.value),
            Expression::Subscript(subscript) if !is_literal(&subscript.value) => {
                for element in subscript.slices.iter_mut() {
                    if let Slice::Index(index) = &mut element.slice {
                        self.rewrite(index);
                    }
                }
            }
            Expression::Tuple(tuple) => {
                for element in tuple.elements.iter_mut() {
                    self.rewrite(&mut element.value);
                }
            }
            Expression::List(list) => {
                for element in list.elements.iter_mut() {
                    self.rewrite(&mut element.value);
                }
            }
            _ => {}
        }
    }
}

impl Transformer for Unions {
    type Error = DesugarError;

    fn transform_small_statement(
        &mut self,
        statement: &mut SmallStatement,
    ) -> Result<(), DesugarError> {
        if let Some(value) = aliased_type(statement) {
            self.rewrite(value);
        }
        walk_small_statement(self, statement)
    }

    fn transform_annotation(&mut self, annotation: &mut Expression) -> Result<(), DesugarError> {
        self.rewrite(annotation);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::desugar_union;
    use retrofy_cst::Module;

    macro_rules! assert_converts {
        ($source:expr, $want:expr) => {{
            let module = Module::parse($source).unwrap_or_else(|err| panic!("{err:?}"));
            let got = desugar_union(module).unwrap_or_else(|err| panic!("{err}"));
            similar_asserts::assert_eq!(got.render(), $want);
        }};
    }

    #[test]
    fn it_rewrites_annotations() {
        assert_converts!(
            "def f(a: int | str | None, b=x | y) -> list[int | None]:\n    c: (bytes | str) = a\n",
            "import typing\ndef f(a: typing.Union[int, str, None], b=x | y) -> list[typing.Union[int, None]]:\n    c: (typing.Union[bytes, str]) = a\n"
        );
        assert_converts!(
            "import typing\nAlias: typing.TypeAlias = int | Callable[[str | bytes], None]\n",
            "import typing\nAlias: typing.TypeAlias = typing.Union[int, Callable[[typing.Union[str, bytes]], None]]\n"
        );
    }

    #[test]
    fn it_leaves_values_alone() {
        let source = "flags = A | B\ndef f(x: Literal[1 | 2] = 3 | 4):\n    return x | 1\n";
        let module = desugar_union(Module::parse(source).unwrap()).unwrap();
        similar_asserts::assert_eq!(module.render(), source);
    }
}
