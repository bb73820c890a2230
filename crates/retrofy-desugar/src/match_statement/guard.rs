//! Case guards, with the names their pattern binds spelled as access paths.

use crate::DesugarError;
use retrofy_cst::{visit::walk_expression, Expression, Transformer};

/// Rewrite `guard` to read each bound name straight from its access path,
/// returning the names it reads.
pub(super) fn substitute(
    guard: &mut Expression,
    bindings: &[(String, Expression)],
) -> Result<Vec<String>, DesugarError> {
    let mut substitute = Substitute {
        bindings,
        shadowed: Vec::new(),
        read: Vec::new(),
    };
    substitute.transform_expression(guard)?;
    Ok(substitute.read)
}

struct Substitute<'a> {
    bindings: &'a [(String, Expression)],
    /// Names bound by enclosing lambdas and comprehensions.
    shadowed: Vec<String>,
    read: Vec<String>,
}

/// The names a comprehension target assigns.
fn target_names(target: &Expression, names: &mut Vec<String>) {
    match target {
        Expression::Name(name) => names.push(name.text.clone()),
        Expression::Parenthesized(parenthesized) => target_names(&parenthesized.value, names),
        Expression::Tuple(tuple) => tuple
            .elements
            .iter()
            .for_each(|element| target_names(&element.value, names)),
        Expression::List(list) => list
            .elements
            .iter()
            .for_each(|element| target_names(&element.value, names)),
        Expression::Starred(starred) => target_names(&starred.value, names),
        _ => {}
    }
}

impl Substitute<'_> {
    fn shadowing<F>(&mut self, names: Vec<String>, f: F) -> Result<(), DesugarError>
    where
        F: FnOnce(&mut Self) -> Result<(), DesugarError>,
    {
        let depth = self.shadowed.len();
        self.shadowed.extend(names);
        let result = f(self);
        self.shadowed.truncate(depth);
        result
    }
}

impl Transformer for Substitute<'_> {
    type Error = DesugarError;

    fn transform_expression(&mut self, expression: &mut Expression) -> Result<(), DesugarError> {
        match expression {
            Expression::Name(name) => {
                if self.shadowed.contains(&name.text) {
                    return Ok(());
                }
                let path = self
                    .bindings
                    .iter()
                    .rev()
                    .find(|(bound, _)| *bound == name.text)
                    .map(|(_, path)| path);
                if let Some(path) = path {
                    if !self.read.contains(&name.text) {
                        self.read.push(name.text.clone());
                    }
                    let trivia = std::mem::take(&mut name.leading_trivia);
                    *expression = path.clone().with_leading_trivia(trivia);
                }
                Ok(())
            }
            Expression::NamedExpr(named) => Err(DesugarError::unsupported(
                named.target.start(),
                "inline assignment in a case guard",
            )),
            Expression::Lambda(lambda) => {
                let mut names = Vec::new();
                for param in lambda.params.params.iter_mut() {
                    if let Some((_, default)) = &mut param.default {
                        self.transform_expression(default)?;
                    }
                    if let Some(name) = &param.name {
                        names.push(name.text.clone());
                    }
                }
                self.shadowing(names, |this| this.transform_expression(&mut lambda.body))
            }
            Expression::Comprehension(comprehension) => {
                // The outermost iterable is evaluated outside the comprehension.
                if let Some(first) = comprehension.clauses.first_mut() {
                    self.transform_expression(&mut first.iter)?;
                }
                let mut names = Vec::new();
                for clause in comprehension.clauses.iter() {
                    target_names(&clause.target, &mut names);
                }
                self.shadowing(names, |this| {
                    this.transform_expression(&mut comprehension.element)?;
                    if let Some((_, value)) = &mut comprehension.value {
                        this.transform_expression(value)?;
                    }
                    for (index, clause) in comprehension.clauses.iter_mut().enumerate() {
                        if index > 0 {
                            this.transform_expression(&mut clause.iter)?;
                        }
                        for condition in clause.ifs.iter_mut() {
                            this.transform_expression(&mut condition.test)?;
                        }
                    }
                    Ok(())
                })
            }
            _ => walk_expression(self, expression),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::substitute;
    use crate::build;
    use retrofy_cst::{Expression, Render};

    fn substituted(guard: &str) -> String {
        let bindings = vec![
            (String::from("x"), build::subscript(build::name("p"), build::number(0))),
            (String::from("y"), build::attribute(build::name("p"), "y")),
        ];
        let mut guard = Expression::parse(guard).unwrap_or_else(|err| panic!("{err:?}"));
        substitute(&mut guard, &bindings).unwrap_or_else(|err| panic!("{err}"));
        guard.to_source()
    }

    #[test]
    fn it_substitutes_bound_names() {
        assert_eq!(substituted("x > y"), "p[0] > p.y");
        assert_eq!(substituted("f(x, key=y).x"), "f(p[0], key=p.y).x");
        assert_eq!(substituted("z and not x"), "z and not p[0]");
    }

    #[test]
    fn it_reports_the_names_read() {
        let bindings = vec![
            (String::from("x"), build::name("a")),
            (String::from("y"), build::name("b")),
            (String::from("z"), build::name("c")),
        ];
        let mut guard = Expression::parse("z > x + z or (lambda y: y)(0)").unwrap();
        let read = substitute(&mut guard, &bindings).unwrap_or_else(|err| panic!("{err}"));
        assert_eq!(read, vec![String::from("z"), String::from("x")]);
    }

    #[test]
    fn it_respects_shadowing() {
        assert_eq!(substituted("(lambda x: x + y)(x)"), "(lambda x: x + p.y)(p[0])");
        assert_eq!(
            substituted("any(x > y for x in range(x))"),
            "any(x > p.y for x in range(p[0]))"
        );
    }

    #[test]
    fn it_rejects_inline_assignments() {
        let mut guard = Expression::parse("(z := x)").unwrap();
        assert!(substitute(&mut guard, &[]).is_err());
    }
}
