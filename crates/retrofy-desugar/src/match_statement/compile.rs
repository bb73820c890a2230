//! Patterns to conditions and bindings.

use super::match_args::{MatchArgsTable, HELPER};
use crate::{build, DesugarError};
use itertools::Itertools;
use retrofy_cst::{
    ClassPattern, CompFor, CompIf, Comprehension, ComprehensionKind, Expression, MappingPattern,
    Pattern, Render, SequencePattern, StarPattern, Token,
};

/// Builtins whose single positional sub-pattern matches the subject itself.
const SELF_MATCHING: &[&str] = &[
    "bool",
    "bytearray",
    "bytes",
    "dict",
    "float",
    "frozenset",
    "int",
    "list",
    "set",
    "str",
    "tuple",
];

/// A name a pattern binds, and where its value comes from.
#[derive(Debug, Clone)]
pub(super) struct Binding {
    pub(super) name: String,
    pub(super) value: Expression,
    /// Whether `value` builds a new object each time it's evaluated.
    pub(super) fresh: bool,
}

/// One way for a pattern to match: every term must hold, then the bindings
/// are made in order.
#[derive(Debug, Clone, Default)]
pub(super) struct Branch {
    pub(super) terms: Vec<Expression>,
    pub(super) bindings: Vec<Binding>,
}

impl Branch {
    fn term(term: Expression) -> Self {
        Self {
            terms: vec![term],
            bindings: Vec::new(),
        }
    }

    fn binding(name: &str, path: &Expression) -> Self {
        Self {
            terms: Vec::new(),
            bindings: vec![Binding {
                name: name.to_owned(),
                value: path.clone(),
                fresh: false,
            }],
        }
    }

    /// Bind `name` to a copy built by `value`.
    fn copy(name: &str, value: Expression) -> Self {
        Self {
            terms: Vec::new(),
            bindings: vec![Binding {
                name: name.to_owned(),
                value,
                fresh: true,
            }],
        }
    }

    /// The terms, each once.
    pub(super) fn unique_terms(&self) -> Vec<Expression> {
        self.terms
            .iter()
            .unique_by(|term| term.to_source())
            .cloned()
            .collect()
    }
}

/// `a and b`, without parentheses around a lone term.
pub(super) fn conjunction(mut terms: Vec<Expression>) -> Option<Expression> {
    if terms.len() == 1 {
        return terms.pop();
    }
    build::and_all(terms)
}

/// Every combination of a branch from `left` followed by one from `right`.
fn product(left: Vec<Branch>, right: Vec<Branch>) -> Vec<Branch> {
    if let [single] = right.as_slice() {
        return left
            .into_iter()
            .map(|mut branch| {
                branch.terms.extend(single.terms.iter().cloned());
                branch.bindings.extend(single.bindings.iter().cloned());
                branch
            })
            .collect();
    }
    left.iter()
        .cartesian_product(right.iter())
        .map(|(first, second)| Branch {
            terms: first.terms.iter().chain(&second.terms).cloned().collect(),
            bindings: first.bindings.iter().chain(&second.bindings).cloned().collect(),
        })
        .collect()
}

fn add_term(branches: &mut [Branch], term: Expression) {
    for branch in branches.iter_mut() {
        branch.terms.push(term.clone());
    }
}

fn isinstance(path: &Expression, class: Expression) -> Expression {
    build::call_positional(build::name("isinstance"), vec![path.clone(), class])
}

fn hasattr(path: &Expression, attr: Expression) -> Expression {
    build::call_positional(build::name("hasattr"), vec![path.clone(), attr])
}

fn len(path: &Expression) -> Expression {
    build::call_positional(build::name("len"), vec![path.clone()])
}

/// A literal that can go in a `path in (...)` test.
fn is_plain_literal(pattern: &Pattern) -> bool {
    let Pattern::Literal(value) = pattern else {
        return false;
    };
    match value {
        Expression::Number(_) | Expression::String(_) => true,
        Expression::UnaryOp(unary) => {
            unary.op.is("-") && matches!(*unary.operand, Expression::Number(_))
        }
        _ => false,
    }
}

/// `{_k: _v for _k, _v in path.items() if _k not in (keys)}`
fn remaining_items(path: &Expression, keys: Vec<Expression>) -> Expression {
    if keys.is_empty() {
        return build::call_positional(build::name("dict"), vec![path.clone()]);
    }
    let items = build::call(build::attribute(path.clone(), "items"), Vec::new());
    Expression::Comprehension(Box::new(Comprehension {
        kind: ComprehensionKind::Dict,
        open: Some(Token::new("{")),
        element: build::name("_k"),
        value: Some((Token::new(":"), build::spaced(build::name("_v")))),
        clauses: vec![CompFor {
            async_keyword: None,
            for_keyword: Token::spaced("for"),
            target: build::spaced(build::bare_tuple(vec![build::name("_k"), build::name("_v")])),
            in_keyword: Token::spaced("in"),
            iter: build::spaced(items),
            ifs: vec![CompIf {
                if_keyword: Token::spaced("if"),
                test: build::spaced(build::compare(
                    build::name("_k"),
                    "not in",
                    build::tuple(keys),
                )),
            }],
        }],
        close: Some(Token::new("}")),
    }))
}

/// Compiles patterns against access paths.
pub(super) struct Compiler<'a> {
    match_args: &'a MatchArgsTable,
    /// Whether a `collections.abc` type test was emitted.
    pub(super) uses_abc: bool,
    /// Whether a call to the run time `__match_args__` helper was emitted.
    pub(super) uses_helper: bool,
}

impl<'a> Compiler<'a> {
    pub(super) fn new(match_args: &'a MatchArgsTable) -> Self {
        Self {
            match_args,
            uses_abc: false,
            uses_helper: false,
        }
    }

    /// The ways `pattern` can match the value at `path`, in the order they
    /// should be tried.
    pub(super) fn compile(
        &mut self,
        pattern: &Pattern,
        path: &Expression,
    ) -> Result<Vec<Branch>, DesugarError> {
        match pattern {
            Pattern::Literal(value) => {
                let op = if value.is_singleton() { "is" } else { "==" };
                Ok(vec![Branch::term(build::compare(
                    path.clone(),
                    op,
                    build::detached(value),
                ))])
            }
            Pattern::Value(value) => Ok(vec![Branch::term(build::compare(
                path.clone(),
                "==",
                build::detached(value),
            ))]),
            Pattern::Capture(name) if name.is("_") => Ok(vec![Branch::default()]),
            Pattern::Capture(name) => Ok(vec![Branch::binding(&name.text, path)]),
            Pattern::Star(StarPattern { star, .. }) => Err(DesugarError::unsupported(
                star.span,
                "a star pattern outside a sequence",
            )),
            Pattern::Sequence(sequence) => self.compile_sequence(sequence, path),
            Pattern::Mapping(mapping) => self.compile_mapping(mapping, path),
            Pattern::Class(class) => self.compile_class(class, path),
            Pattern::Or(or) => {
                let alternatives = or
                    .alternatives()
                    .map(|alternative| self.compile(alternative, path))
                    .collect::<Result<Vec<_>, _>>()?;
                if !pattern.bound_names().is_empty() {
                    return Ok(alternatives.into_iter().flatten().collect());
                }
                if or.alternatives().all(is_plain_literal) {
                    let values = or
                        .alternatives()
                        .filter_map(|alternative| match alternative {
                            Pattern::Literal(value) => Some(build::detached(value)),
                            _ => None,
                        })
                        .collect();
                    return Ok(vec![Branch::term(build::compare(
                        path.clone(),
                        "in",
                        build::tuple(values),
                    ))]);
                }
                let mut conditions = Vec::new();
                for branch in alternatives.iter().flatten() {
                    match build::and_all(branch.unique_terms()) {
                        Some(condition) => conditions.push(condition),
                        // One alternative always matches, so the whole pattern does.
                        None => return Ok(vec![Branch::default()]),
                    }
                }
                Ok(build::or_all(conditions)
                    .map(Branch::term)
                    .into_iter()
                    .collect())
            }
            Pattern::As(as_pattern) => {
                let branches = self.compile(&as_pattern.pattern, path)?;
                Ok(product(
                    branches,
                    vec![Branch::binding(&as_pattern.name.text, path)],
                ))
            }
            Pattern::Group(group) => self.compile(&group.pattern, path),
        }
    }

    fn compile_sequence(
        &mut self,
        sequence: &SequencePattern,
        path: &Expression,
    ) -> Result<Vec<Branch>, DesugarError> {
        let stars = sequence
            .elements
            .iter()
            .filter_map(|element| match &element.pattern {
                Pattern::Star(star) => Some(star),
                _ => None,
            })
            .collect_vec();
        if let [_, second, ..] = stars.as_slice() {
            return Err(DesugarError::unsupported(
                second.star.span,
                "a sequence pattern with more than one star",
            ));
        }
        let star = sequence
            .elements
            .iter()
            .position(|element| matches!(element.pattern, Pattern::Star(_)));
        let total = sequence.elements.len();
        let fixed = total - usize::from(star.is_some());

        self.uses_abc = true;
        let mut terms = vec![
            isinstance(path, build::dotted("collections.abc.Sequence")),
            build::not(isinstance(
                path,
                build::tuple(vec![
                    build::name("str"),
                    build::name("bytes"),
                    build::name("bytearray"),
                ]),
            )),
        ];
        match star {
            None => terms.push(build::compare(len(path), "==", build::number(fixed))),
            Some(_) if fixed > 0 => {
                terms.push(build::compare(len(path), ">=", build::number(fixed)))
            }
            Some(_) => {}
        }
        let mut branches = vec![Branch {
            terms,
            bindings: Vec::new(),
        }];

        for (index, element) in sequence.elements.iter().enumerate() {
            let element_path = match star {
                Some(at) if index == at => {
                    if let Pattern::Star(StarPattern { name, .. }) = &element.pattern {
                        if !name.is("_") {
                            let after = total - at - 1;
                            let rest = if at == 0 && after == 0 {
                                path.clone()
                            } else {
                                build::slice(
                                    path.clone(),
                                    (at > 0).then(|| build::number(at)),
                                    (after > 0).then(|| build::negative(build::number(after))),
                                )
                            };
                            let rest = build::call_positional(build::name("list"), vec![rest]);
                            branches = product(branches, vec![Branch::copy(&name.text, rest)]);
                        }
                    }
                    continue;
                }
                Some(at) if index > at => {
                    build::subscript(path.clone(), build::negative(build::number(total - index)))
                }
                _ => build::subscript(path.clone(), build::number(index)),
            };
            branches = product(branches, self.compile(&element.pattern, &element_path)?);
        }
        Ok(branches)
    }

    fn compile_mapping(
        &mut self,
        mapping: &MappingPattern,
        path: &Expression,
    ) -> Result<Vec<Branch>, DesugarError> {
        self.uses_abc = true;
        let mut branches = vec![Branch::term(isinstance(
            path,
            build::dotted("collections.abc.Mapping"),
        ))];
        for element in mapping.elements.iter() {
            let key = build::detached(&element.key);
            add_term(
                &mut branches,
                build::compare(key.clone(), "in", path.clone()),
            );
            let value_path = build::subscript(path.clone(), key);
            branches = product(branches, self.compile(&element.pattern, &value_path)?);
        }
        if let Some(rest) = &mapping.rest {
            let keys = mapping
                .elements
                .iter()
                .map(|element| build::detached(&element.key))
                .collect();
            let remaining = remaining_items(path, keys);
            branches = product(branches, vec![Branch::copy(&rest.name.text, remaining)]);
        }
        Ok(branches)
    }

    fn compile_class(
        &mut self,
        class: &ClassPattern,
        path: &Expression,
    ) -> Result<Vec<Branch>, DesugarError> {
        let cls = build::detached(&class.cls);
        let name = class.cls.dotted_name();
        let known = name.as_deref().and_then(|name| self.match_args.get(name));
        let mut branches = vec![Branch::term(isinstance(path, cls.clone()))];

        let count = class.positional.len();
        let self_matching = count == 1
            && name
                .as_deref()
                .map_or(false, |name| SELF_MATCHING.contains(&name));
        if self_matching {
            for element in class.positional.iter() {
                branches = product(branches, self.compile(&element.pattern, path)?);
            }
        } else if let Some(known) = known.filter(|known| known.fields.len() >= count) {
            for (element, field) in class.positional.iter().zip(&known.fields) {
                if !known.exposed {
                    add_term(&mut branches, hasattr(path, build::string(field, '"')));
                }
                let field_path = build::attribute(path.clone(), field);
                branches = product(branches, self.compile(&element.pattern, &field_path)?);
            }
        } else if count > 0 {
            tracing::trace!(class = ?name, count, "checking __match_args__ at run time");
            self.uses_helper = true;
            add_term(
                &mut branches,
                build::call_positional(
                    build::name(HELPER),
                    vec![cls.clone(), build::number(count)],
                ),
            );
            for (index, element) in class.positional.iter().enumerate() {
                let field = build::subscript(
                    build::attribute(cls.clone(), "__match_args__"),
                    build::number(index),
                );
                add_term(&mut branches, hasattr(path, field.clone()));
                let field_path =
                    build::call_positional(build::name("getattr"), vec![path.clone(), field]);
                branches = product(branches, self.compile(&element.pattern, &field_path)?);
            }
        }

        for keyword in class.keywords.iter() {
            let attr = keyword.name.text.as_str();
            let exposed = known.map_or(false, |known| {
                known.exposed && known.fields.iter().any(|field| field == attr)
            });
            if !exposed {
                add_term(&mut branches, hasattr(path, build::string(attr, '"')));
            }
            let attr_path = build::attribute(path.clone(), attr);
            branches = product(branches, self.compile(&keyword.pattern, &attr_path)?);
        }
        Ok(branches)
    }
}

#[cfg(test)]
mod tests {
    use super::{conjunction, Branch, Compiler};
    use crate::{build, match_statement::match_args::MatchArgsTable};
    use retrofy_cst::{Module, Pattern, Render, Statement};

    /// The pattern of the first case of the first statement.
    fn pattern(source: &str) -> Pattern {
        let module = Module::parse(&format!("match subject:\n    case {source}:\n        pass\n"))
            .unwrap_or_else(|err| panic!("{err:?}"));
        match module.body.into_iter().next() {
            Some(Statement::Match(statement)) => {
                statement.cases.into_iter().next().unwrap().pattern
            }
            other => panic!("{other:#?}"),
        }
    }

    fn render(branch: &Branch) -> (String, Vec<String>) {
        let condition = conjunction(branch.unique_terms())
            .map(|condition| condition.to_source())
            .unwrap_or_default();
        let bindings = branch
            .bindings
            .iter()
            .map(|binding| format!("{} = {}", binding.name, binding.value.to_source()))
            .collect();
        (condition, bindings)
    }

    fn compile_with(table: &MatchArgsTable, source: &str) -> Vec<(String, Vec<String>)> {
        let mut compiler = Compiler::new(table);
        compiler
            .compile(&pattern(source), &build::name("s"))
            .unwrap_or_else(|err| panic!("{err}"))
            .iter()
            .map(render)
            .collect()
    }

    fn compile(source: &str) -> Vec<(String, Vec<String>)> {
        compile_with(&MatchArgsTable::default(), source)
    }

    fn one(condition: &str, bindings: &[&str]) -> Vec<(String, Vec<String>)> {
        vec![(
            condition.to_owned(),
            bindings.iter().map(|binding| binding.to_string()).collect(),
        )]
    }

    #[test]
    fn it_compiles_literals_and_captures() {
        assert_eq!(compile("404"), one("s == 404", &[]));
        assert_eq!(compile("-1"), one("s == -1", &[]));
        assert_eq!(compile("None"), one("s is None", &[]));
        assert_eq!(compile("False"), one("s is False", &[]));
        assert_eq!(compile("Color.RED"), one("s == Color.RED", &[]));
        assert_eq!(compile("x"), one("", &["x = s"]));
        assert_eq!(compile("_"), one("", &[]));
        assert_eq!(compile("(1 | 2) as n"), one("s in (1, 2)", &["n = s"]));
    }

    #[test]
    fn it_compiles_sequences() {
        let sequence = "isinstance(s, collections.abc.Sequence) and not isinstance(s, (str, bytes, bytearray))";
        assert_eq!(
            compile("(0, y)"),
            one(&format!("{sequence} and len(s) == 2 and s[0] == 0"), &["y = s[1]"])
        );
        assert_eq!(
            compile("[first, *rest, last]"),
            one(
                &format!("{sequence} and len(s) >= 2"),
                &["first = s[0]", "rest = list(s[1:-1])", "last = s[-1]"]
            )
        );
        assert_eq!(compile("[*_]"), one(sequence, &[]));
        assert_eq!(compile("[*all]"), one(sequence, &["all = list(s)"]));
        assert_eq!(
            compile("[[a], _]"),
            one(
                &format!("{sequence} and len(s) == 2 and isinstance(s[0], collections.abc.Sequence) and not isinstance(s[0], (str, bytes, bytearray)) and len(s[0]) == 1"),
                &["a = s[0][0]"]
            )
        );
    }

    #[test]
    fn it_compiles_mappings() {
        assert_eq!(
            compile("{\"kind\": \"user\", \"name\": name, **extra}"),
            one(
                "isinstance(s, collections.abc.Mapping) and \"kind\" in s and s[\"kind\"] == \"user\" and \"name\" in s",
                &[
                    "name = s[\"name\"]",
                    "extra = {_k: _v for _k, _v in s.items() if _k not in (\"kind\", \"name\")}",
                ]
            )
        );
        assert_eq!(
            compile("{**rest}"),
            one("isinstance(s, collections.abc.Mapping)", &["rest = dict(s)"])
        );
    }

    #[test]
    fn it_compiles_class_patterns() {
        let module = Module::parse("class Point:\n    __match_args__ = ('x', 'y')\n").unwrap();
        let table = MatchArgsTable::scan(&module.body);
        assert_eq!(
            compile_with(&table, "Point(x, 0)"),
            one(
                "isinstance(s, Point) and hasattr(s, \"x\") and hasattr(s, \"y\") and s.y == 0",
                &["x = s.x"]
            )
        );
        assert_eq!(
            compile_with(&table, "Point(y=0, z=z)"),
            one(
                "isinstance(s, Point) and hasattr(s, \"y\") and s.y == 0 and hasattr(s, \"z\")",
                &["z = s.z"]
            )
        );
        assert_eq!(compile("int(n)"), one("isinstance(s, int)", &["n = s"]));
        assert_eq!(
            compile("Other(a)"),
            one(
                "isinstance(s, Other) and _retrofy_match_args(Other, 1) and hasattr(s, Other.__match_args__[0])",
                &["a = getattr(s, Other.__match_args__[0])"]
            )
        );
    }

    #[test]
    fn it_reads_dataclass_fields_directly() {
        let module = Module::parse(concat!(
            "from dataclasses import dataclass\n",
            "@dataclass\n",
            "class Point:\n",
            "    x: int\n",
            "    y: int\n",
            "    __match_args__ = ('x', 'y')\n",
        ))
        .unwrap();
        let table = MatchArgsTable::scan(&module.body);
        assert_eq!(
            compile_with(&table, "Point(x, y=0)"),
            one("isinstance(s, Point) and s.y == 0", &["x = s.x"])
        );
        assert_eq!(
            compile_with(&table, "Point(label=l)"),
            one("isinstance(s, Point) and hasattr(s, \"label\")", &["l = s.label"])
        );
    }

    #[test]
    fn it_expands_or_patterns_that_bind() {
        let module = Module::parse(concat!(
            "from dataclasses import dataclass\n",
            "@dataclass\n",
            "class Point:\n",
            "    x: int\n",
            "    y: int\n",
            "    __match_args__ = ('x', 'y')\n",
        ))
        .unwrap();
        let table = MatchArgsTable::scan(&module.body);
        assert_eq!(
            compile_with(&table, "Point(x, 0) | Point(0, x)"),
            vec![
                (String::from("isinstance(s, Point) and s.y == 0"), vec![String::from("x = s.x")]),
                (String::from("isinstance(s, Point) and s.x == 0"), vec![String::from("x = s.y")]),
            ]
        );
        assert_eq!(
            compile("Point() | None"),
            one("isinstance(s, Point) or s is None", &[])
        );
    }

    #[test]
    fn it_marks_copies() {
        let table = MatchArgsTable::default();
        let mut compiler = Compiler::new(&table);
        let branches = compiler
            .compile(&pattern("[x, *rest] | {\"x\": x, **rest}"), &build::name("s"))
            .unwrap_or_else(|err| panic!("{err}"));
        let fresh = branches
            .iter()
            .map(|branch| {
                branch
                    .bindings
                    .iter()
                    .map(|binding| (binding.name.as_str(), binding.fresh))
                    .collect::<Vec<_>>()
            })
            .collect::<Vec<_>>();
        assert_eq!(
            fresh,
            vec![vec![("x", false), ("rest", true)], vec![("x", false), ("rest", true)]]
        );
    }

    #[test]
    fn it_rejects_stray_stars() {
        // The parser refuses both of these, so build them by hand.
        let mut two_stars = pattern("[*a, b, c]");
        let lone_star = match &mut two_stars {
            Pattern::Sequence(sequence) => {
                let star = sequence.elements[0].pattern.clone();
                sequence.elements[1].pattern = star.clone();
                star
            }
            other => panic!("{other:#?}"),
        };
        let table = MatchArgsTable::default();
        let mut compiler = Compiler::new(&table);
        assert!(compiler.compile(&two_stars, &build::name("s")).is_err());
        assert!(compiler.compile(&lone_star, &build::name("s")).is_err());
    }
}
