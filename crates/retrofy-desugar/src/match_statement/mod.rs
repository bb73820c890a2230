//! `match` statements become `if`/`elif`/`else` chains.
//!
//! Each case pattern is compiled to one or more branches: a conjunction of
//! tests against access paths built from the subject, and the bindings to make
//! once those tests hold. Cases are tried in source order and a subject that
//! matches nothing runs nothing.

mod compile;
mod guard;
mod match_args;

use self::{
    compile::{conjunction, Binding, Compiler},
    match_args::MatchArgsTable,
};
use crate::{build, imports, DesugarError};
use retrofy_cst::{
    visit::{walk_module, walk_statement, walk_suite},
    Else, EmptyLine, Expression, If, Match, MatchCase, Module, Statement, Suite, Token,
    Transformer,
};

/// The name a subject that isn't a plain name is bound to.
const SUBJECT: &str = "_retrofy_subject";

/// The dict holding copies a guard reads, so the body binds the same objects.
const BOUND: &str = "_retrofy_bound";

pub(crate) fn desugar(mut module: Module) -> Result<Module, DesugarError> {
    let match_args = MatchArgsTable::scan(&module.body);
    let mut matches = MatchStatements {
        compiler: Compiler::new(&match_args),
        rewritten: 0,
        orphans: Vec::new(),
    };
    matches.transform_module(&mut module)?;
    if matches.rewritten == 0 {
        return Ok(module);
    }
    tracing::debug!(count = matches.rewritten, "rewrote match statements");

    if matches.compiler.uses_abc {
        imports::ensure_module_import(&mut module.body, "collections.abc");
    }
    if matches.compiler.uses_helper && !match_args::defines_helper(&module.body) {
        let index = imports::position_after_all_imports(&module.body);
        let mut helper = match_args::helper(&crate::block_indent(&module));
        if index > 0 {
            *helper.leading_lines_mut() = match_args::separator();
        }
        if let Some(next) = module.body.get_mut(index) {
            if next.leading_lines_mut().is_empty() {
                *next.leading_lines_mut() = match_args::separator();
            }
        }
        imports::insert_statements(&mut module.body, index, vec![helper]);
    }
    Ok(module)
}

struct MatchStatements<'a> {
    compiler: Compiler<'a>,
    rewritten: usize,
    /// Lines left over after the last statement of the block just rewritten.
    orphans: Vec<EmptyLine>,
}

/// A trailing `# comment` on a header line, as a line of its own.
fn trailing_comment(newline: &Token) -> Option<EmptyLine> {
    if !newline.has_comments() {
        return None;
    }
    Some(EmptyLine {
        indent: true,
        whitespace: String::new(),
        comment: Some(newline.leading_trivia.trim().to_owned()),
        newline: String::from("\n"),
    })
}

/// `_retrofy_bound["name"]`
fn stored(name: &str) -> Expression {
    build::subscript(build::name(BOUND), build::string(name, '"'))
}

/// `_retrofy_bound.__setitem__("name", value) is None`, which always holds.
fn store(name: &str, value: Expression) -> Expression {
    let call = build::call_positional(
        build::attribute(build::name(BOUND), "__setitem__"),
        vec![build::string(name, '"'), value],
    );
    build::compare(call, "is", build::name("None"))
}

/// `guard` reading the names bound in `bindings`, preceded by the terms that
/// store the copies it reads. Those bindings then read the stored copy too.
fn guard_terms(
    guard: &Expression,
    bindings: &mut [Binding],
) -> Result<Vec<Expression>, DesugarError> {
    let mut test = build::detached(guard);
    let paths = bindings
        .iter()
        .map(|binding| {
            let path = if binding.fresh {
                stored(&binding.name)
            } else {
                binding.value.clone()
            };
            (binding.name.clone(), path)
        })
        .collect::<Vec<_>>();
    let read = guard::substitute(&mut test, &paths)?;

    let mut terms = Vec::new();
    for binding in bindings.iter_mut() {
        if binding.fresh && read.contains(&binding.name) {
            let value = std::mem::replace(&mut binding.value, stored(&binding.name));
            terms.push(store(&binding.name, value));
        }
    }
    terms.push(test);
    Ok(terms)
}

/// `body`, with `bindings` made first.
fn with_bindings(body: Suite, bindings: Vec<Binding>) -> Suite {
    if bindings.is_empty() {
        return body;
    }
    let assigns = bindings
        .into_iter()
        .map(|binding| build::assign(build::name(&binding.name), binding.value));
    match body {
        Suite::Simple(mut simple) => {
            let mut line = build::join_small(assigns.collect());
            if let Some(first) = line.first_mut() {
                first.kind.first_token_mut().leading_trivia = String::from(" ");
            }
            if let Some(last) = line.last_mut() {
                last.semicolon = Some(Token::new(";"));
            }
            if let Some(first) = simple.body.first_mut() {
                first.kind.first_token_mut().leading_trivia = String::from(" ");
            }
            line.append(&mut simple.body);
            simple.body = line;
            Suite::Simple(simple)
        }
        Suite::Indented(mut block) => {
            let lines = assigns.map(|assign| build::line(vec![assign]));
            block.body.splice(0..0, lines);
            Suite::Indented(block)
        }
    }
}

impl MatchStatements<'_> {
    /// The statements replacing `statement`, and the lines to put before
    /// whatever follows them.
    fn rewrite(
        &mut self,
        statement: Match,
    ) -> Result<(Vec<Statement>, Vec<EmptyLine>), DesugarError> {
        let Match {
            leading_lines,
            subject,
            newline,
            cases,
            footer,
            ..
        } = statement;
        self.rewritten += 1;

        let rebinds_subject = |name: &str| {
            cases
                .iter()
                .any(|case| case.pattern.bound_names().iter().any(|bound| bound == name))
        };
        let (path, subject_line) = match subject.as_name() {
            Some(name) if !rebinds_subject(name) => (build::name(name), None),
            _ => {
                let line = build::line(vec![build::assign(
                    build::name(SUBJECT),
                    build::detached(&subject),
                )]);
                (build::name(SUBJECT), Some(line))
            }
        };

        let mut header = leading_lines;
        header.extend(trailing_comment(&newline));

        let mut ifs: Vec<If> = Vec::new();
        let mut orelse: Option<Else> = None;
        let mut stores = false;
        'cases: for case in cases {
            let MatchCase {
                leading_lines,
                pattern,
                guard,
                body,
                ..
            } = case;
            let branches = self.compiler.compile(&pattern, &path)?;
            tracing::trace!(branches = branches.len(), "compiled case");
            let mut leading_lines = Some(leading_lines);
            for branch in branches {
                let mut terms = branch.unique_terms();
                let mut bindings = branch.bindings;
                if let Some((_, test)) = &guard {
                    let checks = guard_terms(test, &mut bindings)?;
                    stores |= checks.len() > 1;
                    terms.extend(checks);
                }
                let leading_lines = leading_lines.take().unwrap_or_default();
                let body = with_bindings(body.clone(), bindings);
                match conjunction(terms) {
                    Some(test) => ifs.push(If {
                        leading_lines,
                        keyword: Token::new("if"),
                        test: build::spaced(test),
                        colon: Token::new(":"),
                        body,
                        orelse: None,
                    }),
                    // Always matches, so nothing after it can run.
                    None => {
                        orelse = Some(Else {
                            leading_lines,
                            keyword: Token::new("else"),
                            colon: Token::new(":"),
                            body,
                        });
                        break 'cases;
                    }
                }
            }
        }

        let mut produced = Vec::from_iter(subject_line);
        if stores {
            produced.push(build::line(vec![build::assign(
                build::name(BOUND),
                build::empty_dict(),
            )]));
        }
        let mut trailing = Vec::new();
        let chain = if ifs.is_empty() {
            None
        } else {
            build::if_chain(ifs, orelse.take())
        };
        if let Some(chain) = chain {
            produced.push(Statement::If(chain));
        } else if let Some(Else {
            leading_lines, body, ..
        }) = orelse
        {
            let (newline, mut statements, footer) = build::suite_statements(body);
            if let Some(first) = statements.first_mut() {
                let lines = first.leading_lines_mut();
                let mut moved = leading_lines;
                moved.extend(trailing_comment(&newline));
                lines.splice(0..0, moved);
            }
            produced.extend(statements);
            trailing.extend(footer);
        }
        if let Some(first) = produced.first_mut() {
            first.leading_lines_mut().splice(0..0, header);
        }
        trailing.extend(footer);
        Ok((produced, trailing))
    }
}

impl Transformer for MatchStatements<'_> {
    type Error = DesugarError;

    fn transform_module(&mut self, module: &mut Module) -> Result<(), DesugarError> {
        walk_module(self, module)?;
        let orphans = std::mem::take(&mut self.orphans);
        module.footer.splice(0..0, orphans);
        Ok(())
    }

    fn transform_suite(&mut self, suite: &mut Suite) -> Result<(), DesugarError> {
        walk_suite(self, suite)?;
        if let Suite::Indented(block) = suite {
            let orphans = std::mem::take(&mut self.orphans);
            block.footer.splice(0..0, orphans);
        }
        Ok(())
    }

    fn transform_statements(
        &mut self,
        statements: &mut Vec<Statement>,
    ) -> Result<(), DesugarError> {
        let old = std::mem::take(statements);
        let mut carried: Vec<EmptyLine> = Vec::new();
        for mut statement in old {
            walk_statement(self, &mut statement)?;
            let (mut produced, trailing) = match statement {
                Statement::Match(statement) => self.rewrite(statement)?,
                other => (vec![other], Vec::new()),
            };
            if let Some(first) = produced.first_mut() {
                first.leading_lines_mut().splice(0..0, std::mem::take(&mut carried));
            }
            statements.append(&mut produced);
            carried = trailing;
        }
        self.orphans = carried;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::{desugar_match, DesugarError};
    use retrofy_cst::Module;

    fn convert(source: &str) -> Result<String, DesugarError> {
        let module = Module::parse(source).unwrap_or_else(|err| panic!("{err:?}"));
        desugar_match(module).map(|module| module.render())
    }

    macro_rules! assert_converts {
        ($source:expr, $want:expr) => {{
            let got = convert($source).unwrap_or_else(|err| panic!("{err}"));
            similar_asserts::assert_eq!(got, $want);
        }};
    }

    #[test]
    fn it_compiles_literal_cases() {
        assert_converts!(
            concat!(
                "def http_error(status):\n",
                "    match status:\n",
                "        case 400:\n",
                "            return \"Bad request\"\n",
                "        case 404:\n",
                "            return \"Not found\"\n",
                "        case None:\n",
                "            return \"Missing\"\n",
                "        case _:\n",
                "            return \"Something's wrong\"\n",
            ),
            concat!(
                "def http_error(status):\n",
                "    if status == 400:\n",
                "        return \"Bad request\"\n",
                "    elif status == 404:\n",
                "        return \"Not found\"\n",
                "    elif status is None:\n",
                "        return \"Missing\"\n",
                "    else:\n",
                "        return \"Something's wrong\"\n",
            )
        );
    }

    #[test]
    fn it_falls_through_without_a_catch_all() {
        assert_converts!(
            "match value:\n    case 1 | 2 | 3:\n        small()\n    case \"a\" | \"b\":\n        letter()\n",
            "if value in (1, 2, 3):\n    small()\nelif value in (\"a\", \"b\"):\n    letter()\n"
        );
    }

    #[test]
    fn it_expands_or_patterns_with_bindings() {
        assert_converts!(
            concat!(
                "class Point:\n",
                "    __match_args__ = (\"x\", \"y\")\n",
                "def axis(value):\n",
                "    match value:\n",
                "        case Point(x, 0) | Point(0, x) if x > 0:\n",
                "            return x\n",
            ),
            concat!(
                "class Point:\n",
                "    __match_args__ = (\"x\", \"y\")\n",
                "def axis(value):\n",
                "    if isinstance(value, Point) and hasattr(value, \"x\") and hasattr(value, \"y\") and value.y == 0 and value.x > 0:\n",
                "        x = value.x\n",
                "        return x\n",
                "    elif isinstance(value, Point) and hasattr(value, \"x\") and value.x == 0 and hasattr(value, \"y\") and value.y > 0:\n",
                "        x = value.y\n",
                "        return x\n",
            )
        );
    }

    #[test]
    fn it_checks_declared_attributes_exist() {
        assert_converts!(
            concat!(
                "class P2:\n",
                "    __match_args__ = (\"x\", \"y\")\n",
                "match p:\n",
                "    case P2(a, b):\n",
                "        both(a, b)\n",
                "    case P2(x=a):\n",
                "        one(a)\n",
            ),
            concat!(
                "class P2:\n",
                "    __match_args__ = (\"x\", \"y\")\n",
                "if isinstance(p, P2) and hasattr(p, \"x\") and hasattr(p, \"y\"):\n",
                "    a = p.x\n",
                "    b = p.y\n",
                "    both(a, b)\n",
                "elif isinstance(p, P2) and hasattr(p, \"x\"):\n",
                "    a = p.x\n",
                "    one(a)\n",
            )
        );
    }

    #[test]
    fn it_stores_copies_a_guard_reads() {
        assert_converts!(
            concat!(
                "def f(v):\n",
                "    match v:\n",
                "        case [*rest] if rest.append(0) is None:\n",
                "            return rest\n",
                "        case {\"a\": 1, **kw} if kw.setdefault(\"z\", 9):\n",
                "            return kw\n",
            ),
            concat!(
                "import collections.abc\n",
                "def f(v):\n",
                "    _retrofy_bound = {}\n",
                "    if isinstance(v, collections.abc.Sequence) and not isinstance(v, (str, bytes, bytearray)) and _retrofy_bound.__setitem__(\"rest\", list(v)) is None and _retrofy_bound[\"rest\"].append(0) is None:\n",
                "        rest = _retrofy_bound[\"rest\"]\n",
                "        return rest\n",
                "    elif isinstance(v, collections.abc.Mapping) and \"a\" in v and v[\"a\"] == 1 and _retrofy_bound.__setitem__(\"kw\", {_k: _v for _k, _v in v.items() if _k not in (\"a\",)}) is None and _retrofy_bound[\"kw\"].setdefault(\"z\", 9):\n",
                "        kw = _retrofy_bound[\"kw\"]\n",
                "        return kw\n",
            )
        );
    }

    #[test]
    fn it_copies_once_only_for_guards_that_read_the_copy() {
        assert_converts!(
            "match v:\n    case [x, *rest] if x:\n        use(rest)\n",
            concat!(
                "import collections.abc\n",
                "if isinstance(v, collections.abc.Sequence) and not isinstance(v, (str, bytes, bytearray)) and len(v) >= 1 and v[0]:\n",
                "    x = v[0]\n",
                "    rest = list(v[1:])\n",
                "    use(rest)\n",
            )
        );
    }

    #[test]
    fn it_binds_complex_subjects_once() {
        assert_converts!(
            "match get():\n    case [x, *rest]:\n        print(x, rest)\n",
            concat!(
                "import collections.abc\n",
                "_retrofy_subject = get()\n",
                "if isinstance(_retrofy_subject, collections.abc.Sequence) and not isinstance(_retrofy_subject, (str, bytes, bytearray)) and len(_retrofy_subject) >= 1:\n",
                "    x = _retrofy_subject[0]\n",
                "    rest = list(_retrofy_subject[1:])\n",
                "    print(x, rest)\n",
            )
        );
        assert_converts!(
            "match x:\n    case {\"x\": x}: pass\n",
            concat!(
                "import collections.abc\n",
                "_retrofy_subject = x\n",
                "if isinstance(_retrofy_subject, collections.abc.Mapping) and \"x\" in _retrofy_subject: x = _retrofy_subject[\"x\"]; pass\n",
            )
        );
    }

    #[test]
    fn it_substitutes_guards() {
        assert_converts!(
            "match n:\n    case x if x > 100:\n        big(x)\n    case _:\n        pass\n",
            "if n > 100:\n    x = n\n    big(x)\nelse:\n    pass\n"
        );
    }

    #[test]
    fn it_replaces_a_lone_capture() {
        assert_converts!(
            "def f(x):\n    match x:\n        case y:\n            return y * 2\n",
            "def f(x):\n    y = x\n    return y * 2\n"
        );
        assert_converts!("match f():\n    case _: pass\n", "_retrofy_subject = f()\npass\n");
    }

    #[test]
    fn it_moves_comments() {
        assert_converts!(
            concat!(
                "# dispatch\n",
                "match c:  # on c\n",
                "    # first\n",
                "    case 1: a()\n",
                "    # other\n",
                "    case _: b()\n",
                "after()\n",
            ),
            concat!(
                "# dispatch\n",
                "# on c\n",
                "# first\n",
                "if c == 1: a()\n",
                "# other\n",
                "else: b()\n",
                "after()\n",
            )
        );
    }

    #[test]
    fn it_checks_unknown_match_args_at_run_time() {
        assert_converts!(
            "import os\n\nmatch e:\n    case Error(code):\n        fail(code)\n",
            concat!(
                "import os\n",
                "\n",
                "\n",
                "def _retrofy_match_args(cls, count):\n",
                "    match_args = getattr(cls, \"__match_args__\", ())\n",
                "    if len(match_args) < count:\n",
                "        raise TypeError(\"{}() accepts {} positional sub-patterns ({} given)\".format(cls.__name__, len(match_args), count))\n",
                "    return match_args\n",
                "\n",
                "if isinstance(e, Error) and _retrofy_match_args(Error, 1) and hasattr(e, Error.__match_args__[0]):\n",
                "    code = getattr(e, Error.__match_args__[0])\n",
                "    fail(code)\n",
            )
        );
    }

    #[test]
    fn it_rewrites_nested_matches() {
        assert_converts!(
            "match a:\n    case 1:\n        match b:\n            case 2:\n                both()\n",
            "if a == 1:\n    if b == 2:\n        both()\n"
        );
    }

    #[test]
    fn it_rejects_inline_assignments_in_guards() {
        assert!(matches!(
            convert("match p:\n    case x if (y := x):\n        pass\n"),
            Err(DesugarError::UnsupportedConstruct { .. })
        ));
    }

    #[test]
    fn it_is_idempotent() {
        let source = "match e:\n    case Error(code):\n        fail(code)\n    case [1, *_]:\n        pass\n";
        let once = convert(source).unwrap();
        similar_asserts::assert_eq!(convert(&once).unwrap(), once);
    }
}
