//! Finding, adding and removing imports in a block of statements.

use crate::build;
use retrofy_cst::{
    EmptyLine, Expression, ImportFrom, ImportNames, SimpleStatementLine, SmallStatementKind,
    Statement,
};

/// A name brought in by `from module import name [as alias]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportedName {
    /// The absolute module path.
    pub module: String,
    /// The imported name.
    pub name: String,
    /// `as alias`
    pub alias: Option<String>,
    /// Index of the importing statement in the scanned block.
    pub statement: usize,
}

impl ImportedName {
    /// The name this import binds locally.
    pub fn local_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

/// A module brought in by `import module [as alias]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportedModule {
    /// The dotted module path.
    pub module: String,
    /// `as alias`
    pub alias: Option<String>,
    /// Index of the importing statement in the scanned block.
    pub statement: usize,
}

impl ImportedModule {
    /// The expression path that reaches this module locally.
    pub fn local_path(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.module)
    }
}

/// The imports of one block, as found by [ImportTable::scan].
#[derive(Debug, Clone, Default)]
pub struct ImportTable {
    /// `from x import y` names, in source order.
    pub names: Vec<ImportedName>,
    /// `import x` modules, in source order.
    pub modules: Vec<ImportedModule>,
}

impl ImportTable {
    /// Collect the import statements directly in `body`.
    ///
    /// Relative imports and star imports are ignored.
    pub fn scan(body: &[Statement]) -> Self {
        let mut table = Self::default();
        for (index, statement) in body.iter().enumerate() {
            table.scan_statement(index, statement);
        }
        table
    }

    fn scan_statement(&mut self, index: usize, statement: &Statement) {
        let Some(body) = statement.as_simple() else {
            return;
        };
        for small in body {
            match &small.kind {
                SmallStatementKind::Import(import) => {
                    for alias in &import.names {
                        if let Some(module) = alias.name.dotted_name() {
                            self.modules.push(ImportedModule {
                                module,
                                alias: alias.asname.as_ref().map(|(_, name)| name.text.clone()),
                                statement: index,
                            });
                        }
                    }
                }
                SmallStatementKind::ImportFrom(import) => {
                    let Some(module) = import.module_name() else {
                        continue;
                    };
                    if let ImportNames::Aliases { names, .. } = &import.names {
                        for alias in names {
                            if let Some(name) = alias.name.as_name() {
                                self.names.push(ImportedName {
                                    module: module.clone(),
                                    name: name.to_owned(),
                                    alias: alias
                                        .asname
                                        .as_ref()
                                        .map(|(_, name)| name.text.clone()),
                                    statement: index,
                                });
                            }
                        }
                    }
                }
                _ => {}
            }
        }
    }

    /// Is `name` imported from `module`?
    pub fn has_import(&self, module: &str, name: &str) -> bool {
        self.find(module, name).is_some()
    }

    /// The local name of `from module import name`, if imported.
    pub fn get_alias(&self, module: &str, name: &str) -> Option<&str> {
        self.find(module, name).map(ImportedName::local_name)
    }

    /// The first import of `name` from `module`.
    pub fn find(&self, module: &str, name: &str) -> Option<&ImportedName> {
        self.names
            .iter()
            .find(|import| import.module == module && import.name == name)
    }

    /// The local path of `import module [as alias]`, if imported.
    pub fn module_alias(&self, module: &str) -> Option<&str> {
        self.modules
            .iter()
            .find(|import| import.module == module)
            .map(ImportedModule::local_path)
    }

    /// Is there a plain `import module`, without an alias?
    pub fn has_module_import(&self, module: &str) -> bool {
        self.modules
            .iter()
            .any(|import| import.module == module && import.alias.is_none())
    }
}

/// Does this statement import `module` with `import module`?
fn imports_module(statement: &Statement, module: &str) -> bool {
    statement.as_simple().map_or(false, |body| {
        body.iter().any(|small| match &small.kind {
            SmallStatementKind::Import(import) => import.names.iter().any(|alias| {
                alias.asname.is_none() && alias.name.dotted_name().as_deref() == Some(module)
            }),
            _ => false,
        })
    })
}

fn contains_import(statement: &Statement) -> bool {
    statement.as_simple().map_or(false, |body| {
        body.iter().any(|small| {
            matches!(
                small.kind,
                SmallStatementKind::Import(_) | SmallStatementKind::ImportFrom(_)
            )
        })
    })
}

/// The index after a leading docstring.
pub fn position_after_docstring(body: &[Statement]) -> usize {
    match body.first() {
        Some(statement) if statement.is_docstring() => 1,
        _ => 0,
    }
}

/// The index after the docstring and any `from __future__` imports.
pub fn position_after_future_imports(body: &[Statement]) -> usize {
    let start = position_after_docstring(body);
    start
        + body[start..]
            .iter()
            .take_while(|statement| statement.is_future_import())
            .count()
}

/// The index after the docstring and the leading run of import lines.
pub fn position_after_all_imports(body: &[Statement]) -> usize {
    let start = position_after_docstring(body);
    start
        + body[start..]
            .iter()
            .take_while(|statement| contains_import(statement))
            .count()
}

/// Insert `statements` at `index`.
///
/// Inserting at the very start takes over the comments and blank lines in
/// front of the first statement, so a file header stays on top. A first
/// statement that is not an import keeps the blank lines after the last
/// comment.
pub fn insert_statements(body: &mut Vec<Statement>, index: usize, mut statements: Vec<Statement>) {
    if statements.is_empty() {
        return;
    }
    if index == 0 {
        if let (Some(first_new), Some(first_old)) = (statements.first_mut(), body.first_mut()) {
            let mut lines = std::mem::take(first_old.leading_lines_mut());
            if !first_old.is_import() {
                let header = lines.iter().rposition(EmptyLine::is_comment).map_or(0, |at| at + 1);
                *first_old.leading_lines_mut() = lines.split_off(header);
            }
            lines.append(first_new.leading_lines_mut());
            *first_new.leading_lines_mut() = lines;
        }
    }
    body.splice(index..index, statements);
}

/// Add `import module` after the `__future__` imports unless the leading
/// imports already import it without an alias. Returns whether anything was
/// added.
pub fn ensure_module_import(body: &mut Vec<Statement>, module: &str) -> bool {
    let leading = position_after_all_imports(body);
    if body[..leading]
        .iter()
        .any(|statement| imports_module(statement, module))
    {
        return false;
    }
    let index = position_after_future_imports(body);
    tracing::trace!(module, index, "adding module import");
    insert_statements(body, index, vec![build::line(vec![build::import(module)])]);
    true
}

/// Remove `name` from every `from module import ...` directly in `body`.
///
/// Import statements left without names are removed, and lines left without
/// statements are dropped; their leading lines move to the next statement.
/// Returns the removed imports, in the form `(name, alias)`.
pub fn remove_import(
    body: &mut Vec<Statement>,
    module: &str,
    name: &str,
) -> Vec<(String, Option<String>)> {
    let mut removed = Vec::new();
    let mut index = 0;
    while index < body.len() {
        let emptied = match &mut body[index] {
            Statement::Simple(line) => {
                let found = remove_from_line(line, module, name);
                let emptied = !found.is_empty() && line.body.is_empty();
                removed.extend(found);
                emptied
            }
            _ => false,
        };
        if emptied {
            let gone = body.remove(index);
            if let Statement::Simple(SimpleStatementLine { leading_lines, .. }) = gone {
                if let Some(next) = body.get_mut(index) {
                    let next_lines = next.leading_lines_mut();
                    *next_lines = merge_leading_lines(leading_lines, std::mem::take(next_lines));
                }
            }
        } else {
            index += 1;
        }
    }
    removed
}

/// The lines in front of a removed statement followed by those of the next
/// one. Runs of blank lines do not add up.
fn merge_leading_lines(mut removed: Vec<EmptyLine>, next: Vec<EmptyLine>) -> Vec<EmptyLine> {
    if removed.iter().chain(&next).any(EmptyLine::is_comment) {
        removed.extend(next);
        removed
    } else if removed.len() > next.len() {
        removed
    } else {
        next
    }
}

fn remove_from_line(
    line: &mut SimpleStatementLine,
    module: &str,
    name: &str,
) -> Vec<(String, Option<String>)> {
    let mut removed = Vec::new();
    let before = line.body.len();
    line.body.retain_mut(|small| match &mut small.kind {
        SmallStatementKind::ImportFrom(import) => {
            removed.extend(remove_from_import(import, module, name));
            !import_is_empty(import)
        }
        _ => true,
    });
    if line.body.len() != before {
        if let Some(first) = line.body.first_mut() {
            first.kind.first_token_mut().leading_trivia = String::new();
        }
        if let Some(last) = line.body.last_mut() {
            last.semicolon = None;
        }
    }
    removed
}

fn import_is_empty(import: &ImportFrom) -> bool {
    matches!(&import.names, ImportNames::Aliases { names, .. } if names.is_empty())
}

fn remove_from_import(
    import: &mut ImportFrom,
    module: &str,
    name: &str,
) -> Vec<(String, Option<String>)> {
    if import.module_name().as_deref() != Some(module) {
        return Vec::new();
    }
    let ImportNames::Aliases { names, open, close } = &mut import.names else {
        return Vec::new();
    };
    let first_trivia = names
        .first()
        .map(|alias| alias.name.leading_trivia().to_owned())
        .unwrap_or_default();
    let mut removed = Vec::new();
    let mut kept = Vec::with_capacity(names.len());
    for alias in names.drain(..) {
        if alias.name.as_name() == Some(name) {
            removed.push((
                name.to_owned(),
                alias.asname.as_ref().map(|(_, alias)| alias.text.clone()),
            ));
        } else {
            kept.push(alias);
        }
    }
    if !removed.is_empty() {
        if let Some(first) = kept.first_mut() {
            first.name.first_token_mut().leading_trivia = first_trivia;
        }
        if open.is_none() {
            if let Some(last) = kept.last_mut() {
                last.comma = None;
            }
        }
        if kept.len() == 1 && open.is_some() {
            *open = None;
            *close = None;
            if let Some(only) = kept.first_mut() {
                only.name.first_token_mut().leading_trivia = String::from(" ");
                only.comma = None;
            }
        }
    }
    *names = kept;
    removed
}

/// Recognizes every spelling of one imported symbol, like `typing.final`.
///
/// The symbol can be spelled through `from module import name [as alias]`
/// or through the module itself (`import module [as alias]`, then
/// `alias.name`).
#[derive(Debug, Clone)]
pub struct SymbolMatcher {
    /// Bare names bound by `from` imports.
    local_names: Vec<String>,
    /// Dotted paths reaching the symbol through a module import.
    paths: Vec<String>,
}

impl SymbolMatcher {
    /// Resolve `module.name` against the imports in `table`.
    pub fn new(table: &ImportTable, module: &str, name: &str) -> Self {
        let local_names = table
            .names
            .iter()
            .filter(|import| import.module == module && import.name == name)
            .map(|import| import.local_name().to_owned())
            .collect();
        let paths = table
            .modules
            .iter()
            .filter(|import| import.module == module)
            .map(|import| format!("{}.{name}", import.local_path()))
            .collect();
        Self { local_names, paths }
    }

    /// Is the symbol imported at all?
    pub fn is_imported(&self) -> bool {
        !self.local_names.is_empty() || !self.paths.is_empty()
    }

    /// Does `expression` denote the symbol?
    pub fn matches(&self, expression: &Expression) -> bool {
        match expression.unparenthesized() {
            Expression::Name(token) => self.local_names.contains(&token.text),
            attribute @ Expression::Attribute(_) => attribute
                .dotted_name()
                .map_or(false, |path| self.paths.contains(&path)),
            _ => false,
        }
    }

    /// Does `expression` denote the symbol, or a call of it?
    pub fn matches_callee(&self, expression: &Expression) -> bool {
        match expression.unparenthesized() {
            Expression::Call(call) => self.matches(&call.func),
            other => self.matches(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use retrofy_cst::Module;

    fn parse(source: &str) -> Module {
        Module::parse(source).unwrap_or_else(|err| panic!("{err:?}"))
    }

    #[test]
    fn it_scans_imports() {
        let module = parse(
            "import typing as t, sys\nfrom typing import final as fin, Literal\nfrom . import x\nx = 1\n",
        );
        let table = ImportTable::scan(&module.body);
        assert!(table.has_import("typing", "final"));
        assert!(!table.has_import("typing", "x"));
        assert_eq!(table.get_alias("typing", "final"), Some("fin"));
        assert_eq!(table.get_alias("typing", "Literal"), Some("Literal"));
        assert_eq!(table.module_alias("typing"), Some("t"));
        assert_eq!(table.module_alias("sys"), Some("sys"));
        assert!(table.has_module_import("sys"));
        assert!(!table.has_module_import("typing"));
    }

    #[test]
    fn it_finds_insertion_points() {
        let module = parse(
            "\"\"\"Docs.\"\"\"\nfrom __future__ import annotations\nimport os\nfrom a import b\nx = 1\nimport late\n",
        );
        assert_eq!(position_after_docstring(&module.body), 1);
        assert_eq!(position_after_future_imports(&module.body), 2);
        assert_eq!(position_after_all_imports(&module.body), 4);
        assert_eq!(position_after_all_imports(&[]), 0);
    }

    #[test]
    fn it_ensures_module_imports() {
        let mut module = parse("# header\n\nx = 1\n");
        assert!(ensure_module_import(&mut module.body, "typing"));
        assert!(!ensure_module_import(&mut module.body, "typing"));
        similar_asserts::assert_eq!(module.render(), "# header\nimport typing\n\nx = 1\n");

        let mut module = parse("# header\nimport os\n");
        assert!(ensure_module_import(&mut module.body, "sys"));
        similar_asserts::assert_eq!(module.render(), "# header\nimport sys\nimport os\n");

        let mut module = parse("x = 1\nimport sys\n");
        assert!(ensure_module_import(&mut module.body, "sys"));
        similar_asserts::assert_eq!(module.render(), "import sys\nx = 1\nimport sys\n");

        let mut module = parse("from __future__ import annotations\nimport typing as t\n");
        assert!(ensure_module_import(&mut module.body, "typing"));
        similar_asserts::assert_eq!(
            module.render(),
            "from __future__ import annotations\nimport typing\nimport typing as t\n"
        );
    }

    #[test]
    fn it_removes_imports() {
        let mut module = parse("from typing import Literal, final as fin, Any\nx = 1\n");
        let removed = remove_import(&mut module.body, "typing", "final");
        assert_eq!(removed, vec![(String::from("final"), Some(String::from("fin")))]);
        similar_asserts::assert_eq!(module.render(), "from typing import Literal, Any\nx = 1\n");

        let mut module = parse("# keep\nfrom typing import Literal\nx = 1\n");
        remove_import(&mut module.body, "typing", "Literal");
        similar_asserts::assert_eq!(module.render(), "# keep\nx = 1\n");

        let mut module = parse("from typing import (\n    Literal,\n    Any,\n)\n");
        remove_import(&mut module.body, "typing", "Literal");
        similar_asserts::assert_eq!(module.render(), "from typing import Any\n");

        let mut module = parse("from typing import Literal\n\nx = 1\n");
        remove_import(&mut module.body, "typing", "Literal");
        similar_asserts::assert_eq!(module.render(), "\nx = 1\n");

        let mut module = parse("import os; from typing import Literal\n");
        remove_import(&mut module.body, "typing", "Literal");
        similar_asserts::assert_eq!(module.render(), "import os\n");
    }

    #[test]
    fn it_matches_symbols() {
        let module = parse("import dataclasses as dc\nfrom dataclasses import dataclass as d\n");
        let matcher = SymbolMatcher::new(
            &ImportTable::scan(&module.body),
            "dataclasses",
            "dataclass",
        );
        assert!(matcher.is_imported());
        let matches = |source: &str| {
            let expression = Expression::parse(source).unwrap_or_else(|err| panic!("{err:?}"));
            matcher.matches_callee(&expression)
        };
        assert!(matches("d"));
        assert!(matches("dc.dataclass"));
        assert!(matches("dc.dataclass(frozen=True)"));
        assert!(!matches("dataclass"));
        assert!(!matches("dataclasses.dataclass"));
    }
}
