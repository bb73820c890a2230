//! Depth-first rewriting of a tree in place.
//!
//! Implementors override the `transform_*` methods they care about and call
//! the matching `walk_*` function to keep descending.

use crate::{
    Arg, ClassDef, Decorator, DictElement, Else, ExceptHandler, Expression, For, FunctionDef,
    If, Match, Module, OrElse, Parameters, Pattern, SimpleStatementLine, Slice, SmallStatement,
    SmallStatementKind, Statement, Suite, Try, TypeParams, While, With,
};

/// A tree rewriter.
pub trait Transformer {
    /// The error that stops a walk.
    type Error;

    /// Rewrite a module.
    fn transform_module(&mut self, module: &mut Module) -> Result<(), Self::Error> {
        walk_module(self, module)
    }

    /// Rewrite a block of statements, possibly adding or removing some.
    fn transform_statements(&mut self, statements: &mut Vec<Statement>) -> Result<(), Self::Error> {
        walk_statements(self, statements)
    }

    /// Rewrite a single statement.
    fn transform_statement(&mut self, statement: &mut Statement) -> Result<(), Self::Error> {
        walk_statement(self, statement)
    }

    /// Rewrite a small statement.
    fn transform_small_statement(
        &mut self,
        statement: &mut SmallStatement,
    ) -> Result<(), Self::Error> {
        walk_small_statement(self, statement)
    }

    /// Rewrite the body of a compound statement.
    fn transform_suite(&mut self, suite: &mut Suite) -> Result<(), Self::Error> {
        walk_suite(self, suite)
    }

    /// Rewrite an expression.
    fn transform_expression(&mut self, expression: &mut Expression) -> Result<(), Self::Error> {
        walk_expression(self, expression)
    }

    /// Rewrite a type annotation.
    ///
    /// Reached for parameter and return annotations, the annotation of an
    /// annotated assignment, type parameter bounds and the value of a `type`
    /// statement. Defaults to [Transformer::transform_expression].
    fn transform_annotation(&mut self, annotation: &mut Expression) -> Result<(), Self::Error> {
        self.transform_expression(annotation)
    }

    /// Rewrite a `case` pattern.
    fn transform_pattern(&mut self, pattern: &mut Pattern) -> Result<(), Self::Error> {
        walk_pattern(self, pattern)
    }
}

/// Transform the top-level statements.
pub fn walk_module<T: Transformer + ?Sized>(
    transformer: &mut T,
    module: &mut Module,
) -> Result<(), T::Error> {
    transformer.transform_statements(&mut module.body)
}

/// Transform each statement in order.
pub fn walk_statements<T: Transformer + ?Sized>(
    transformer: &mut T,
    statements: &mut Vec<Statement>,
) -> Result<(), T::Error> {
    for statement in statements.iter_mut() {
        transformer.transform_statement(statement)?;
    }
    Ok(())
}

/// Transform the statements of a block or a one-line suite.
pub fn walk_suite<T: Transformer + ?Sized>(
    transformer: &mut T,
    suite: &mut Suite,
) -> Result<(), T::Error> {
    match suite {
        Suite::Indented(block) => transformer.transform_statements(&mut block.body),
        Suite::Simple(simple) => {
            for small in simple.body.iter_mut() {
                transformer.transform_small_statement(small)?;
            }
            Ok(())
        }
    }
}

/// Transform the expressions, patterns and suites of a statement.
pub fn walk_statement<T: Transformer + ?Sized>(
    transformer: &mut T,
    statement: &mut Statement,
) -> Result<(), T::Error> {
    match statement {
        Statement::Simple(SimpleStatementLine { body, .. }) => {
            for small in body.iter_mut() {
                transformer.transform_small_statement(small)?;
            }
        }
        Statement::If(statement) => walk_if(transformer, statement)?,
        Statement::While(While {
            test, body, orelse, ..
        }) => {
            transformer.transform_expression(test)?;
            transformer.transform_suite(body)?;
            walk_else(transformer, orelse.as_mut())?;
        }
        Statement::For(For {
            target,
            iter,
            body,
            orelse,
            ..
        }) => {
            transformer.transform_expression(target)?;
            transformer.transform_expression(iter)?;
            transformer.transform_suite(body)?;
            walk_else(transformer, orelse.as_mut())?;
        }
        Statement::Try(Try {
            body,
            handlers,
            orelse,
            finalbody,
            ..
        }) => {
            transformer.transform_suite(body)?;
            for ExceptHandler { type_, body, .. } in handlers.iter_mut() {
                if let Some(type_) = type_ {
                    transformer.transform_expression(type_)?;
                }
                transformer.transform_suite(body)?;
            }
            walk_else(transformer, orelse.as_mut())?;
            walk_else(transformer, finalbody.as_mut())?;
        }
        Statement::With(With { items, body, .. }) => {
            for item in items.iter_mut() {
                transformer.transform_expression(&mut item.item)?;
                if let Some((_, target)) = &mut item.asname {
                    transformer.transform_expression(target)?;
                }
            }
            transformer.transform_suite(body)?;
        }
        Statement::FunctionDef(FunctionDef {
            decorators,
            type_params,
            params,
            returns,
            body,
            ..
        }) => {
            walk_decorators(transformer, decorators)?;
            walk_type_params(transformer, type_params.as_mut())?;
            walk_parameters(transformer, params)?;
            if let Some((_, returns)) = returns {
                transformer.transform_annotation(returns)?;
            }
            transformer.transform_suite(body)?;
        }
        Statement::ClassDef(ClassDef {
            decorators,
            type_params,
            args,
            body,
            ..
        }) => {
            walk_decorators(transformer, decorators)?;
            walk_type_params(transformer, type_params.as_mut())?;
            walk_args(transformer, args)?;
            transformer.transform_suite(body)?;
        }
        Statement::Match(Match { subject, cases, .. }) => {
            transformer.transform_expression(subject)?;
            for case in cases.iter_mut() {
                transformer.transform_pattern(&mut case.pattern)?;
                if let Some((_, guard)) = &mut case.guard {
                    transformer.transform_expression(guard)?;
                }
                transformer.transform_suite(&mut case.body)?;
            }
        }
    }
    Ok(())
}

fn walk_if<T: Transformer + ?Sized>(
    transformer: &mut T,
    statement: &mut If,
) -> Result<(), T::Error> {
    transformer.transform_expression(&mut statement.test)?;
    transformer.transform_suite(&mut statement.body)?;
    match statement.orelse.as_deref_mut() {
        Some(OrElse::Elif(elif)) => walk_if(transformer, elif),
        Some(OrElse::Else(orelse)) => walk_else(transformer, Some(orelse)),
        None => Ok(()),
    }
}

fn walk_else<T: Transformer + ?Sized>(
    transformer: &mut T,
    orelse: Option<&mut Else>,
) -> Result<(), T::Error> {
    match orelse {
        Some(orelse) => transformer.transform_suite(&mut orelse.body),
        None => Ok(()),
    }
}

fn walk_decorators<T: Transformer + ?Sized>(
    transformer: &mut T,
    decorators: &mut [Decorator],
) -> Result<(), T::Error> {
    for decorator in decorators.iter_mut() {
        transformer.transform_expression(&mut decorator.expression)?;
    }
    Ok(())
}

fn walk_type_params<T: Transformer + ?Sized>(
    transformer: &mut T,
    type_params: Option<&mut TypeParams>,
) -> Result<(), T::Error> {
    if let Some(type_params) = type_params {
        for param in type_params.params.iter_mut() {
            if let Some((_, bound)) = &mut param.bound {
                transformer.transform_annotation(bound)?;
            }
        }
    }
    Ok(())
}

fn walk_parameters<T: Transformer + ?Sized>(
    transformer: &mut T,
    parameters: &mut Parameters,
) -> Result<(), T::Error> {
    for param in parameters.params.iter_mut() {
        if let Some((_, annotation)) = &mut param.annotation {
            transformer.transform_annotation(annotation)?;
        }
        if let Some((_, default)) = &mut param.default {
            transformer.transform_expression(default)?;
        }
    }
    Ok(())
}

fn walk_args<T: Transformer + ?Sized>(
    transformer: &mut T,
    args: &mut [Arg],
) -> Result<(), T::Error> {
    for arg in args.iter_mut() {
        transformer.transform_expression(&mut arg.value)?;
    }
    Ok(())
}

/// Transform the expressions of a small statement.
pub fn walk_small_statement<T: Transformer + ?Sized>(
    transformer: &mut T,
    statement: &mut SmallStatement,
) -> Result<(), T::Error> {
    match &mut statement.kind {
        SmallStatementKind::Expr(expression) => transformer.transform_expression(expression),
        SmallStatementKind::Assign(assign) => {
            for (target, _) in assign.targets.iter_mut() {
                transformer.transform_expression(target)?;
            }
            transformer.transform_expression(&mut assign.value)
        }
        SmallStatementKind::AnnAssign(assign) => {
            transformer.transform_expression(&mut assign.target)?;
            transformer.transform_annotation(&mut assign.annotation)?;
            match &mut assign.value {
                Some((_, value)) => transformer.transform_expression(value),
                None => Ok(()),
            }
        }
        SmallStatementKind::AugAssign(assign) => {
            transformer.transform_expression(&mut assign.target)?;
            transformer.transform_expression(&mut assign.value)
        }
        SmallStatementKind::Return { value, .. } => match value {
            Some(value) => transformer.transform_expression(value),
            None => Ok(()),
        },
        SmallStatementKind::Raise {
            exception, cause, ..
        } => {
            if let Some(exception) = exception {
                transformer.transform_expression(exception)?;
            }
            match cause {
                Some((_, cause)) => transformer.transform_expression(cause),
                None => Ok(()),
            }
        }
        SmallStatementKind::Del { target, .. } => transformer.transform_expression(target),
        SmallStatementKind::Assert { test, message, .. } => {
            transformer.transform_expression(test)?;
            match message {
                Some((_, message)) => transformer.transform_expression(message),
                None => Ok(()),
            }
        }
        SmallStatementKind::TypeAlias(alias) => {
            walk_type_params(transformer, alias.type_params.as_mut())?;
            transformer.transform_annotation(&mut alias.value)
        }
        SmallStatementKind::Pass(_)
        | SmallStatementKind::Break(_)
        | SmallStatementKind::Continue(_)
        | SmallStatementKind::Global { .. }
        | SmallStatementKind::Import(_)
        | SmallStatementKind::ImportFrom(_) => Ok(()),
    }
}

/// Transform the direct subexpressions.
pub fn walk_expression<T: Transformer + ?Sized>(
    transformer: &mut T,
    expression: &mut Expression,
) -> Result<(), T::Error> {
    match expression {
        Expression::Name(_)
        | Expression::Number(_)
        | Expression::String(_)
        | Expression::Ellipsis(_) => Ok(()),
        Expression::Parenthesized(parenthesized) => {
            transformer.transform_expression(&mut parenthesized.value)
        }
        Expression::Tuple(tuple) => {
            for element in tuple.elements.iter_mut() {
                transformer.transform_expression(&mut element.value)?;
            }
            Ok(())
        }
        Expression::List(collection) | Expression::Set(collection) => {
            for element in collection.elements.iter_mut() {
                transformer.transform_expression(&mut element.value)?;
            }
            Ok(())
        }
        Expression::Dict(dict) => {
            for element in dict.elements.iter_mut() {
                match element {
                    DictElement::KeyValue { key, value, .. } => {
                        transformer.transform_expression(key)?;
                        transformer.transform_expression(value)?;
                    }
                    DictElement::Unpack { value, .. } => transformer.transform_expression(value)?,
                }
            }
            Ok(())
        }
        Expression::Comprehension(comprehension) => {
            transformer.transform_expression(&mut comprehension.element)?;
            if let Some((_, value)) = &mut comprehension.value {
                transformer.transform_expression(value)?;
            }
            for clause in comprehension.clauses.iter_mut() {
                transformer.transform_expression(&mut clause.target)?;
                transformer.transform_expression(&mut clause.iter)?;
                for condition in clause.ifs.iter_mut() {
                    transformer.transform_expression(&mut condition.test)?;
                }
            }
            Ok(())
        }
        Expression::Attribute(attribute) => transformer.transform_expression(&mut attribute.value),
        Expression::Subscript(subscript) => {
            transformer.transform_expression(&mut subscript.value)?;
            for element in subscript.slices.iter_mut() {
                match &mut element.slice {
                    Slice::Index(index) => transformer.transform_expression(index)?,
                    Slice::Range {
                        lower, upper, step, ..
                    } => {
                        for bound in [lower, upper, step].into_iter().flatten() {
                            transformer.transform_expression(bound)?;
                        }
                    }
                }
            }
            Ok(())
        }
        Expression::Call(call) => {
            transformer.transform_expression(&mut call.func)?;
            walk_args(transformer, &mut call.args)
        }
        Expression::UnaryOp(unary) => transformer.transform_expression(&mut unary.operand),
        Expression::BinaryOp(binary) => {
            transformer.transform_expression(&mut binary.left)?;
            transformer.transform_expression(&mut binary.right)
        }
        Expression::BoolOp(boolean) => {
            transformer.transform_expression(&mut boolean.left)?;
            transformer.transform_expression(&mut boolean.right)
        }
        Expression::Compare(compare) => {
            transformer.transform_expression(&mut compare.left)?;
            for comparison in compare.comparisons.iter_mut() {
                transformer.transform_expression(&mut comparison.right)?;
            }
            Ok(())
        }
        Expression::IfExp(if_exp) => {
            transformer.transform_expression(&mut if_exp.body)?;
            transformer.transform_expression(&mut if_exp.test)?;
            transformer.transform_expression(&mut if_exp.orelse)
        }
        Expression::Lambda(lambda) => {
            for param in lambda.params.params.iter_mut() {
                if let Some((_, default)) = &mut param.default {
                    transformer.transform_expression(default)?;
                }
            }
            transformer.transform_expression(&mut lambda.body)
        }
        Expression::NamedExpr(named) => {
            transformer.transform_expression(&mut named.target)?;
            transformer.transform_expression(&mut named.value)
        }
        Expression::Await(await_) => transformer.transform_expression(&mut await_.value),
        Expression::Yield(yield_) => match &mut yield_.value {
            Some(value) => transformer.transform_expression(value),
            None => Ok(()),
        },
        Expression::Starred(starred) => transformer.transform_expression(&mut starred.value),
    }
}

/// Transform the subpatterns and the expressions inside them.
pub fn walk_pattern<T: Transformer + ?Sized>(
    transformer: &mut T,
    pattern: &mut Pattern,
) -> Result<(), T::Error> {
    match pattern {
        Pattern::Literal(value) | Pattern::Value(value) => transformer.transform_expression(value),
        Pattern::Capture(_) | Pattern::Star(_) => Ok(()),
        Pattern::Sequence(sequence) => {
            for element in sequence.elements.iter_mut() {
                transformer.transform_pattern(&mut element.pattern)?;
            }
            Ok(())
        }
        Pattern::Mapping(mapping) => {
            for element in mapping.elements.iter_mut() {
                transformer.transform_expression(&mut element.key)?;
                transformer.transform_pattern(&mut element.pattern)?;
            }
            Ok(())
        }
        Pattern::Class(class) => {
            transformer.transform_expression(&mut class.cls)?;
            for element in class.positional.iter_mut() {
                transformer.transform_pattern(&mut element.pattern)?;
            }
            for keyword in class.keywords.iter_mut() {
                transformer.transform_pattern(&mut keyword.pattern)?;
            }
            Ok(())
        }
        Pattern::Or(or) => {
            transformer.transform_pattern(&mut or.first)?;
            for (_, alternative) in or.rest.iter_mut() {
                transformer.transform_pattern(alternative)?;
            }
            Ok(())
        }
        Pattern::As(as_pattern) => transformer.transform_pattern(&mut as_pattern.pattern),
        Pattern::Group(group) => transformer.transform_pattern(&mut group.pattern),
    }
}

#[cfg(test)]
mod tests {
    use super::{walk_expression, Transformer};
    use crate::{Expression, Module};
    use std::convert::Infallible;

    struct Rename;

    impl Transformer for Rename {
        type Error = Infallible;

        fn transform_expression(&mut self, expression: &mut Expression) -> Result<(), Infallible> {
            if let Expression::Name(name) = expression {
                if name.is("old") {
                    name.text = String::from("new");
                }
            }
            walk_expression(self, expression)
        }
    }

    #[derive(Default)]
    struct Annotations(Vec<String>);

    impl Transformer for Annotations {
        type Error = Infallible;

        fn transform_annotation(&mut self, annotation: &mut Expression) -> Result<(), Infallible> {
            if let Some(name) = annotation.as_name() {
                self.0.push(name.to_owned());
            }
            Ok(())
        }
    }

    #[test]
    fn it_rewrites_nested_expressions() {
        let mut module = Module::parse(
            "def f(a=old):\n    return [old for x in old if old]\nmatch old:\n    case {'k': old.attr}:\n        old()\n",
        )
        .unwrap();
        Rename.transform_module(&mut module).unwrap();
        similar_asserts::assert_eq!(
            module.render(),
            "def f(a=new):\n    return [new for x in new if new]\nmatch new:\n    case {'k': new.attr}:\n        new()\n",
        );
    }

    #[test]
    fn it_visits_annotations() {
        let mut module =
            Module::parse("def f(a: A, b: B = c) -> C:\n    x: D = 1\ntype E = F\n").unwrap();
        let mut annotations = Annotations::default();
        annotations.transform_module(&mut module).unwrap();
        assert_eq!(annotations.0, vec!["A", "B", "C", "D", "F"]);
    }
}
