//! Version-guarded fallbacks for `typing` features newer than the target.
//!
//! Analysis first records, per block, which features are imported from
//! `typing` and which are reached through the `typing` module. The rewrite
//! then consumes those facts block by block, walking in the same order.

use crate::{block_indent, build, imports, imports::ImportTable, DesugarError};
use indexmap::IndexMap;
use retrofy_config::{FeatureTable, PythonVersion};
use retrofy_cst::{
    visit::{walk_expression, walk_statement},
    Compare, Comparison, EmptyLine, Expression, If, Module, OrElse, SmallStatementKind, Statement,
    Suite, Transformer, Tuple,
};

/// What to fall back to when `typing` lacks a feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Fallback {
    /// The same name from `typing_extensions`.
    TypingExtensions,
    /// `lambda cls: cls`
    Identity,
}

/// The features to guard, with the Python version that added each of them.
#[derive(Debug, Clone)]
pub(crate) struct Features {
    versions: FeatureTable,
    fallback: Fallback,
}

impl Features {
    /// Fall back to `typing_extensions` for everything in `table`.
    pub(crate) fn typing(table: &FeatureTable) -> Self {
        Self {
            versions: table.clone(),
            fallback: Fallback::TypingExtensions,
        }
    }

    /// Fall back to an identity decorator for `typing.final`.
    pub(crate) fn final_marker() -> Self {
        Self {
            versions: FeatureTable::from_iter([(String::from("final"), PythonVersion::new(3, 8))]),
            fallback: Fallback::Identity,
        }
    }

    fn version(&self, name: &str) -> Option<PythonVersion> {
        self.versions.get(name).copied()
    }
}

pub(crate) fn desugar(mut module: Module, features: &Features) -> Result<Module, DesugarError> {
    let mut analysis = Analysis {
        features,
        facts: IndexMap::new(),
        next_scope: 0,
        scopes: Vec::new(),
    };
    analysis.transform_module(&mut module)?;
    if analysis.facts.is_empty() {
        return Ok(module);
    }

    let mut guards = Guards {
        fallback: features.fallback,
        indent: block_indent(&module),
        facts: analysis.facts,
        next_scope: 0,
    };
    guards.transform_module(&mut module)?;
    Ok(module)
}

/// `from typing import name [as alias]`
#[derive(Debug, Clone)]
struct FromImport {
    statement: usize,
    name: String,
    version: PythonVersion,
}

/// What one block needs guarded.
#[derive(Debug, Default)]
struct ScopeFacts {
    imports: Vec<FromImport>,
    /// Features reached as `<path>.<feature>`, with the first path seen.
    dotted: IndexMap<String, (PythonVersion, String)>,
}

/// Recognize `sys.version_info >= (3, 8)` style tests.
fn version_test(test: &Expression) -> Option<(&str, PythonVersion)> {
    let Expression::Compare(Compare { left, comparisons }) = test.unparenthesized() else {
        return None;
    };
    if left.dotted_name().as_deref() != Some("sys.version_info") {
        return None;
    }
    let [Comparison { op, right }] = comparisons.as_slice() else {
        return None;
    };
    let [op] = op.as_slice() else {
        return None;
    };
    let Expression::Tuple(Tuple { elements, .. }) = right.unparenthesized() else {
        return None;
    };
    let number = |index: usize| match elements.get(index).map(|element| &element.value) {
        Some(Expression::Number(token)) => token.text.parse::<u32>().ok(),
        _ => None,
    };
    let version = PythonVersion::new(number(0)?, number(1)?);
    Some((op.text.as_str(), version))
}

fn is_version_guard(statement: &Statement) -> bool {
    matches!(statement, Statement::If(If { test, .. }) if version_test(test).is_some())
}

/// Features assigned onto a module by existing `sys.version_info < ...` guards.
fn assigned_by_guards(statements: &[Statement]) -> Vec<String> {
    let mut assigned = Vec::new();
    for statement in statements {
        let Statement::If(If {
            test,
            body: Suite::Indented(block),
            ..
        }) = statement
        else {
            continue;
        };
        if !matches!(version_test(test), Some(("<", _))) {
            continue;
        }
        for small in block.body.iter().filter_map(Statement::as_simple).flatten() {
            if let SmallStatementKind::Assign(assign) = &small.kind {
                for (target, _) in &assign.targets {
                    if let Expression::Attribute(attribute) = target {
                        assigned.push(attribute.attr.text.clone());
                    }
                }
            }
        }
    }
    assigned
}

struct Scope {
    id: usize,
    /// Local paths of `import typing [as t]` in this block.
    typing_paths: Vec<String>,
    guarded: Vec<String>,
}

struct Analysis<'a> {
    features: &'a Features,
    facts: IndexMap<usize, ScopeFacts>,
    next_scope: usize,
    scopes: Vec<Scope>,
}

impl Analysis<'_> {
    fn record_dotted(&mut self, path: &str, feature: &str) {
        let Some(version) = self.features.version(feature) else {
            return;
        };
        let Some(scope) = self
            .scopes
            .iter()
            .rev()
            .find(|scope| scope.typing_paths.iter().any(|typing| typing == path))
        else {
            return;
        };
        if scope.guarded.iter().any(|guarded| guarded == feature) {
            return;
        }
        let facts = self.facts.entry(scope.id).or_default();
        facts
            .dotted
            .entry(feature.to_owned())
            .or_insert_with(|| (version, path.to_owned()));
    }
}

impl Transformer for Analysis<'_> {
    type Error = DesugarError;

    fn transform_statements(
        &mut self,
        statements: &mut Vec<Statement>,
    ) -> Result<(), DesugarError> {
        let id = self.next_scope;
        self.next_scope += 1;

        let table = ImportTable::scan(statements);
        for import in table.names.iter().filter(|import| import.module == "typing") {
            if let Some(version) = self.features.version(&import.name) {
                self.facts.entry(id).or_default().imports.push(FromImport {
                    statement: import.statement,
                    name: import.name.clone(),
                    version,
                });
            }
        }
        self.scopes.push(Scope {
            id,
            typing_paths: table
                .modules
                .iter()
                .filter(|import| import.module == "typing")
                .map(|import| import.local_path().to_owned())
                .collect(),
            guarded: assigned_by_guards(statements),
        });

        for statement in statements.iter_mut() {
            if !is_version_guard(statement) {
                walk_statement(self, statement)?;
            }
        }
        self.scopes.pop();
        Ok(())
    }

    fn transform_expression(&mut self, expression: &mut Expression) -> Result<(), DesugarError> {
        if let Expression::Attribute(attribute) = expression {
            if let Some(path) = attribute.value.dotted_name() {
                let feature = attribute.attr.text.clone();
                self.record_dotted(&path, &feature);
            }
        }
        walk_expression(self, expression)
    }
}

struct Guards {
    fallback: Fallback,
    indent: String,
    facts: IndexMap<usize, ScopeFacts>,
    next_scope: usize,
}

/// Group imported names by the version that added them, oldest first.
fn by_version<T>(
    items: impl IntoIterator<Item = (PythonVersion, T)>,
) -> Vec<(PythonVersion, Vec<T>)> {
    let mut groups: IndexMap<PythonVersion, Vec<T>> = IndexMap::new();
    for (version, item) in items {
        groups.entry(version).or_default().push(item);
    }
    groups.sort_keys();
    groups.into_iter().collect()
}

fn version_check(op: &str, version: PythonVersion) -> Expression {
    build::compare(
        build::dotted("sys.version_info"),
        op,
        build::tuple(vec![
            build::number(version.major as usize),
            build::number(version.minor as usize),
        ]),
    )
}

impl Guards {
    fn fallback_value(&self, name: &str) -> Expression {
        match self.fallback {
            Fallback::TypingExtensions => build::dotted(&format!("typing_extensions.{name}")),
            Fallback::Identity => build::lambda("cls", build::name("cls")),
        }
    }

    /// `if sys.version_info >= (M, m): from typing import ... else: ...`
    fn import_guard(
        &self,
        version: PythonVersion,
        names: Vec<(String, Option<String>)>,
    ) -> Statement {
        let body = vec![build::line(vec![build::from_import("typing", &names)])];
        let orelse = match self.fallback {
            Fallback::TypingExtensions => {
                vec![build::line(vec![build::from_import("typing_extensions", &names)])]
            }
            Fallback::Identity => names
                .iter()
                .map(|(name, alias)| {
                    let local = alias.as_deref().unwrap_or(name);
                    build::line(vec![build::assign(
                        build::name(local),
                        self.fallback_value(name),
                    )])
                })
                .collect(),
        };
        let mut guard = build::if_block("if", version_check(">=", version), &self.indent, body);
        guard.orelse = Some(Box::new(OrElse::Else(build::else_block(&self.indent, orelse))));
        Statement::If(guard)
    }

    /// `if sys.version_info < (M, m): typing.F = typing_extensions.F`
    fn assignment_guard(
        &self,
        version: PythonVersion,
        features: Vec<(String, String)>,
    ) -> Statement {
        let mut body = Vec::new();
        if self.fallback == Fallback::TypingExtensions {
            body.push(build::line(vec![build::import("typing_extensions")]));
        }
        for (feature, path) in features {
            body.push(build::line(vec![build::assign(
                build::dotted(&format!("{path}.{feature}")),
                self.fallback_value(&feature),
            )]));
        }
        Statement::If(build::if_block("if", version_check("<", version), &self.indent, body))
    }

    fn assignment_guards(
        &self,
        dotted: IndexMap<String, (PythonVersion, String)>,
    ) -> Vec<Statement> {
        by_version(
            dotted
                .into_iter()
                .map(|(feature, (version, path))| (version, (feature, path))),
        )
        .into_iter()
        .map(|(version, features)| self.assignment_guard(version, features))
        .collect()
    }

    /// Guards after the imports, from-imports hoisted out of their statements.
    fn guard_module(&self, body: &mut Vec<Statement>, facts: ScopeFacts) {
        let mut names = Vec::new();
        for import in &facts.imports {
            for removed in imports::remove_import(body, "typing", &import.name) {
                if !names.iter().any(|(_, name)| *name == removed) {
                    names.push((import.version, removed));
                }
            }
        }
        imports::ensure_module_import(body, "sys");

        let mut guards: Vec<Statement> = by_version(names)
            .into_iter()
            .map(|(version, names)| self.import_guard(version, names))
            .collect();
        let mut index = imports::position_after_all_imports(body);
        if !facts.dotted.is_empty() {
            let table = ImportTable::scan(body);
            let after_typing = table
                .modules
                .iter()
                .filter(|import| import.module == "typing")
                .map(|import| import.statement + 1)
                .max()
                .unwrap_or(0);
            index = index.max(after_typing);
            guards.extend(self.assignment_guards(facts.dotted));
        }
        for guard in guards.iter_mut() {
            guard.leading_lines_mut().push(EmptyLine::blank());
        }
        let count = guards.len();
        tracing::debug!(count, index, "adding module version guards");
        imports::insert_statements(body, index, guards);
        if let Some(next) = body.get_mut(index + count) {
            let lines = next.leading_lines_mut();
            if lines.is_empty() {
                lines.push(EmptyLine::blank());
            }
        }
    }

    /// From-imports replaced in place, assignment guards after the imports.
    fn guard_block(&self, body: &mut Vec<Statement>, facts: ScopeFacts) {
        let mut by_statement: IndexMap<usize, Vec<&FromImport>> = IndexMap::new();
        for import in &facts.imports {
            by_statement.entry(import.statement).or_default().push(import);
        }
        by_statement.sort_keys();
        for (index, found) in by_statement.into_iter().rev() {
            let mut statement = body.remove(index);
            let leading_lines = std::mem::take(statement.leading_lines_mut());
            let mut replacement = vec![statement];
            let mut names = Vec::new();
            for import in found {
                for removed in imports::remove_import(&mut replacement, "typing", &import.name) {
                    names.push((import.version, removed));
                }
            }
            replacement.extend(
                by_version(names)
                    .into_iter()
                    .map(|(version, names)| self.import_guard(version, names)),
            );
            if let Some(first) = replacement.first_mut() {
                *first.leading_lines_mut() = leading_lines;
            }
            tracing::debug!(index, "replacing nested typing import");
            body.splice(index..index, replacement);
        }

        if !facts.dotted.is_empty() {
            let index = imports::position_after_all_imports(body);
            let guards = self.assignment_guards(facts.dotted);
            tracing::debug!(count = guards.len(), index, "adding nested assignment guards");
            body.splice(index..index, guards);
        }
    }

    fn rewrite_block(
        &mut self,
        statements: &mut Vec<Statement>,
        module_level: bool,
    ) -> Result<(), DesugarError> {
        let id = self.next_scope;
        self.next_scope += 1;
        for statement in statements.iter_mut() {
            if !is_version_guard(statement) {
                walk_statement(self, statement)?;
            }
        }
        if let Some(facts) = self.facts.shift_remove(&id) {
            if module_level {
                self.guard_module(statements, facts);
            } else {
                self.guard_block(statements, facts);
            }
        }
        Ok(())
    }
}

impl Transformer for Guards {
    type Error = DesugarError;

    fn transform_module(&mut self, module: &mut Module) -> Result<(), DesugarError> {
        self.rewrite_block(&mut module.body, true)?;
        imports::ensure_module_import(&mut module.body, "sys");
        Ok(())
    }

    fn transform_statements(
        &mut self,
        statements: &mut Vec<Statement>,
    ) -> Result<(), DesugarError> {
        self.rewrite_block(statements, false)
    }
}

#[cfg(test)]
mod tests {
    use crate::{desugar_final, desugar_typing_extensions};
    use retrofy_cst::Module;

    macro_rules! assert_converts {
        ($desugar:ident, $source:expr, $want:expr) => {{
            let module = Module::parse($source).unwrap_or_else(|err| panic!("{err:?}"));
            let got = $desugar(module).unwrap_or_else(|err| panic!("{err}"));
            similar_asserts::assert_eq!(got.render(), $want);
            let again = $desugar(Module::parse($want).unwrap()).unwrap();
            similar_asserts::assert_eq!(again.render(), $want, "not idempotent");
        }};
    }

    #[test]
    fn it_guards_module_level_imports() {
        assert_converts!(
            desugar_typing_extensions,
            "from typing import Literal\n\ndef f(mode: Literal[\"r\"]) -> str:\n    return mode\n",
            concat!(
                "import sys\n",
                "\n",
                "if sys.version_info >= (3, 8):\n",
                "    from typing import Literal\n",
                "else:\n",
                "    from typing_extensions import Literal\n",
                "\n",
                "def f(mode: Literal[\"r\"]) -> str:\n",
                "    return mode\n",
            )
        );
    }

    #[test]
    fn it_separates_module_guards_from_what_follows() {
        assert_converts!(
            desugar_typing_extensions,
            "from typing import Literal\ndef f(mode: Literal[\"r\"]):\n    return mode\n",
            concat!(
                "import sys\n",
                "\n",
                "if sys.version_info >= (3, 8):\n",
                "    from typing import Literal\n",
                "else:\n",
                "    from typing_extensions import Literal\n",
                "\n",
                "def f(mode: Literal[\"r\"]):\n",
                "    return mode\n",
            )
        );
    }

    #[test]
    fn it_groups_features_by_version() {
        assert_converts!(
            desugar_typing_extensions,
            "from __future__ import annotations\nfrom typing import get_args, Literal as Lit, Union, get_origin\n\nx: Lit[1] = 1\n",
            concat!(
                "from __future__ import annotations\n",
                "import sys\n",
                "from typing import Union\n",
                "\n",
                "if sys.version_info >= (3, 8):\n",
                "    from typing import Literal as Lit\n",
                "else:\n",
                "    from typing_extensions import Literal as Lit\n",
                "\n",
                "if sys.version_info >= (3, 10):\n",
                "    from typing import get_args, get_origin\n",
                "else:\n",
                "    from typing_extensions import get_args, get_origin\n",
                "\n",
                "x: Lit[1] = 1\n",
            )
        );
    }

    #[test]
    fn it_assigns_dotted_features() {
        assert_converts!(
            desugar_typing_extensions,
            "import sys\nimport typing as t\n\n@t.final\nclass A:\n    def f(self, x) -> t.Literal[1]:\n        return t.get_args(x)\n",
            concat!(
                "import sys\n",
                "import typing as t\n",
                "\n",
                "if sys.version_info < (3, 8):\n",
                "    import typing_extensions\n",
                "    t.final = typing_extensions.final\n",
                "    t.Literal = typing_extensions.Literal\n",
                "\n",
                "if sys.version_info < (3, 10):\n",
                "    import typing_extensions\n",
                "    t.get_args = typing_extensions.get_args\n",
                "\n",
                "@t.final\n",
                "class A:\n",
                "    def f(self, x) -> t.Literal[1]:\n",
                "        return t.get_args(x)\n",
            )
        );
    }

    #[test]
    fn it_rewrites_nested_imports_in_place() {
        assert_converts!(
            desugar_typing_extensions,
            "def f(x):\n    # local\n    from typing import get_args, Any\n    return get_args(x)\n",
            concat!(
                "import sys\n",
                "def f(x):\n",
                "    # local\n",
                "    from typing import Any\n",
                "    if sys.version_info >= (3, 10):\n",
                "        from typing import get_args\n",
                "    else:\n",
                "        from typing_extensions import get_args\n",
                "    return get_args(x)\n",
            )
        );
        assert_converts!(
            desugar_typing_extensions,
            "try:\n    import typing\n    x = typing.get_origin(int)\nexcept ImportError:\n    pass\n",
            concat!(
                "import sys\n",
                "try:\n",
                "    import typing\n",
                "    if sys.version_info < (3, 10):\n",
                "        import typing_extensions\n",
                "        typing.get_origin = typing_extensions.get_origin\n",
                "    x = typing.get_origin(int)\n",
                "except ImportError:\n",
                "    pass\n",
            )
        );
    }

    #[test]
    fn it_leaves_other_code_alone() {
        let source = "from typing import Union, List\n\ndef f(items: List[Union[str, int]]) -> None:\n    pass\n";
        let module = desugar_typing_extensions(Module::parse(source).unwrap()).unwrap();
        similar_asserts::assert_eq!(module.render(), source);
    }

    #[test]
    fn it_falls_back_to_identity_for_final() {
        assert_converts!(
            desugar_final,
            "from typing import final as fin, Optional\n\n@fin\nclass A:\n    pass\n",
            concat!(
                "import sys\n",
                "from typing import Optional\n",
                "\n",
                "if sys.version_info >= (3, 8):\n",
                "    from typing import final as fin\n",
                "else:\n",
                "    fin = lambda cls: cls\n",
                "\n",
                "@fin\n",
                "class A:\n",
                "    pass\n",
            )
        );
        assert_converts!(
            desugar_final,
            "import typing\n\n@typing.final\nclass A:\n    pass\n",
            concat!(
                "import sys\n",
                "import typing\n",
                "\n",
                "if sys.version_info < (3, 8):\n",
                "    typing.final = lambda cls: cls\n",
                "\n",
                "@typing.final\n",
                "class A:\n",
                "    pass\n",
            )
        );
    }
}
