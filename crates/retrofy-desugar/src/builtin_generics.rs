//! `list[int]` annotations become `typing.List[int]`.

use crate::{
    build, imports,
    union::{aliased_type, is_literal},
    DesugarError,
};
use lazy_static::lazy_static;
use retrofy_cst::{
    visit::walk_small_statement, Expression, Module, Slice, SmallStatement, Transformer,
};
use std::collections::HashMap;

lazy_static! {
    /// Builtins that only became subscriptable in Python 3.9, with their `typing` spelling.
    static ref GENERIC_ALIASES: HashMap<&'static str, &'static str> = HashMap::from([
        ("list", "List"),
        ("dict", "Dict"),
        ("set", "Set"),
        ("frozenset", "FrozenSet"),
        ("tuple", "Tuple"),
        ("type", "Type"),
    ]);
}

pub(crate) fn desugar(mut module: Module) -> Result<Module, DesugarError> {
    let mut generics = BuiltinGenerics::default();
    generics.transform_module(&mut module)?;
    if generics.rewritten > 0 {
        tracing::debug!(count = generics.rewritten, "rewrote builtin generics");
        imports::ensure_module_import(&mut module.body, "typing");
    }
    Ok(module)
}

#[derive(Default)]
struct BuiltinGenerics {
    rewritten: usize,
}

impl BuiltinGenerics {
    fn rewrite(&mut self, expression: &mut Expression) {
        match expression {
            Expression::Subscript(subscript) => {
                if is_literal(&subscript.value) {
                    return;
                }
                let alias = subscript
                    .value
                    .as_name()
                    .and_then(|name| GENERIC_ALIASES.get(name));
                if let Some(alias) = alias {
                    let trivia = subscript.value.leading_trivia().to_owned();
                    *subscript.value =
                        build::dotted(&format!("typing.{alias}")).with_leading_trivia(trivia);
                    self.rewritten += 1;
                }
                for element in subscript.slices.iter_mut() {
                    if let Slice::Index(index) = &mut element.slice {
                        self.rewrite(index);
                    }
                }
            }
            Expression::Parenthesized(parenthesized) => self.rewrite(&mut parenthesized.value),
            Expression::BinaryOp(binary) if binary.op.is("|") => {
                self.rewrite(&mut binary.left);
                self.rewrite(&mut binary.right);
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

impl Transformer for BuiltinGenerics {
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
    use crate::desugar_builtin_generics;
    use retrofy_cst::Module;

    macro_rules! assert_converts {
        ($source:expr, $want:expr) => {{
            let module = Module::parse($source).unwrap_or_else(|err| panic!("{err:?}"));
            let got = desugar_builtin_generics(module).unwrap_or_else(|err| panic!("{err}"));
            similar_asserts::assert_eq!(got.render(), $want);
        }};
    }

    #[test]
    fn it_rewrites_annotations() {
        assert_converts!(
            "def f(a: list[int], b: dict[str, tuple[int, ...]] | None = None) -> type[A]:\n    seen: set[frozenset[str]] = set()\n",
            "import typing\ndef f(a: typing.List[int], b: typing.Dict[str, typing.Tuple[int, ...]] | None = None) -> typing.Type[A]:\n    seen: typing.Set[typing.FrozenSet[str]] = set()\n"
        );
        assert_converts!(
            "type Pairs = list[tuple[int, int]]\n",
            "import typing\ntype Pairs = typing.List[typing.Tuple[int, int]]\n"
        );
    }

    #[test]
    fn it_leaves_values_alone() {
        let source = "import typing\nx = list[int]()\ny: typing.List[int] = []\nz: Literal[\"list[int]\"]\n";
        let module = desugar_builtin_generics(Module::parse(source).unwrap()).unwrap();
        similar_asserts::assert_eq!(module.render(), source);
    }
}
