use crate::{
    Arg, AsPattern, Attribute, Await, BinaryOp, BoolOp, Call, ClassDef, ClassPattern, Collection,
    Compare, Comprehension, Decorator, Dict, DictElement, Element, Else, EmptyLine,
    ExceptHandler, Expression, For, FunctionDef, GroupPattern, If, IfExp, ImportAlias,
    ImportNames, IndentedBlock, Lambda, MappingPattern, Match, MatchCase, Module, NamedExpr,
    OrElse, OrPattern, Param, Parameters, Parenthesized, Pattern, PatternElement,
    SequencePattern, SimpleStatementLine, Slice, SmallStatement, SmallStatementKind, Starred,
    Statement, Subscript, Suite, Token, Try, Tuple, TypeParams, UnaryOp, While, With, Yield,
};

/// Write source text for a node.
pub trait Render {
    /// Append this node's source text to `accum`.
    fn render(&self, accum: &mut String);

    /// This node's source text.
    fn to_source(&self) -> String {
        let mut accum = String::new();
        self.render(&mut accum);
        accum
    }
}

impl Module {
    /// Render the module back to source text.
    pub fn render(&self) -> String {
        let mut accum = String::new();
        for statement in &self.body {
            statement.render_at("", &mut accum);
        }
        render_lines(&self.footer, "", &mut accum);
        accum
    }
}

impl<T: Render> Render for Option<T> {
    fn render(&self, accum: &mut String) {
        if let Some(inner) = self {
            inner.render(accum);
        }
    }
}

impl<T: Render> Render for Vec<T> {
    fn render(&self, accum: &mut String) {
        self.iter().for_each(|inner| inner.render(accum));
    }
}

impl<A: Render, B: Render> Render for (A, B) {
    fn render(&self, accum: &mut String) {
        self.0.render(accum);
        self.1.render(accum);
    }
}

impl<T: Render> Render for Box<T> {
    fn render(&self, accum: &mut String) {
        self.as_ref().render(accum);
    }
}

impl Render for Token {
    fn render(&self, accum: &mut String) {
        accum.push_str(&self.leading_trivia);
        accum.push_str(&self.text);
    }
}

impl Render for Expression {
    fn render(&self, accum: &mut String) {
        match self {
            Self::Name(token) | Self::Number(token) | Self::Ellipsis(token) => {
                token.render(accum)
            }
            Self::String(tokens) => tokens.render(accum),
            Self::Parenthesized(Parenthesized { open, value, close }) => {
                open.render(accum);
                value.render(accum);
                close.render(accum);
            }
            Self::Tuple(Tuple {
                open,
                elements,
                close,
            }) => {
                open.render(accum);
                elements.render(accum);
                close.render(accum);
            }
            Self::List(collection) | Self::Set(collection) => collection.render(accum),
            Self::Dict(Dict {
                open,
                elements,
                close,
            }) => {
                open.render(accum);
                elements.render(accum);
                close.render(accum);
            }
            Self::Comprehension(comprehension) => comprehension.render(accum),
            Self::Attribute(Attribute { value, dot, attr }) => {
                value.render(accum);
                dot.render(accum);
                attr.render(accum);
            }
            Self::Subscript(Subscript {
                value,
                open,
                slices,
                close,
            }) => {
                value.render(accum);
                open.render(accum);
                for element in slices {
                    element.slice.render(accum);
                    element.comma.render(accum);
                }
                close.render(accum);
            }
            Self::Call(Call {
                func,
                open,
                args,
                close,
            }) => {
                func.render(accum);
                open.render(accum);
                args.render(accum);
                close.render(accum);
            }
            Self::UnaryOp(UnaryOp { op, operand }) => {
                op.render(accum);
                operand.render(accum);
            }
            Self::BinaryOp(BinaryOp { left, op, right })
            | Self::BoolOp(BoolOp { left, op, right }) => {
                left.render(accum);
                op.render(accum);
                right.render(accum);
            }
            Self::Compare(Compare { left, comparisons }) => {
                left.render(accum);
                for comparison in comparisons {
                    comparison.op.render(accum);
                    comparison.right.render(accum);
                }
            }
            Self::IfExp(IfExp {
                body,
                if_keyword,
                test,
                else_keyword,
                orelse,
            }) => {
                body.render(accum);
                if_keyword.render(accum);
                test.render(accum);
                else_keyword.render(accum);
                orelse.render(accum);
            }
            Self::Lambda(Lambda {
                keyword,
                params,
                colon,
                body,
            }) => {
                keyword.render(accum);
                params.render(accum);
                colon.render(accum);
                body.render(accum);
            }
            Self::NamedExpr(NamedExpr { target, op, value }) => {
                target.render(accum);
                op.render(accum);
                value.render(accum);
            }
            Self::Await(Await { keyword, value }) => {
                keyword.render(accum);
                value.render(accum);
            }
            Self::Yield(Yield {
                keyword,
                from_keyword,
                value,
            }) => {
                keyword.render(accum);
                from_keyword.render(accum);
                value.render(accum);
            }
            Self::Starred(Starred { star, value }) => {
                star.render(accum);
                value.render(accum);
            }
        }
    }
}

impl Render for Element {
    fn render(&self, accum: &mut String) {
        self.value.render(accum);
        self.comma.render(accum);
    }
}

impl Render for Collection {
    fn render(&self, accum: &mut String) {
        self.open.render(accum);
        self.elements.render(accum);
        self.close.render(accum);
    }
}

impl Render for DictElement {
    fn render(&self, accum: &mut String) {
        match self {
            Self::KeyValue {
                key,
                colon,
                value,
                comma,
            } => {
                key.render(accum);
                colon.render(accum);
                value.render(accum);
                comma.render(accum);
            }
            Self::Unpack {
                stars,
                value,
                comma,
            } => {
                stars.render(accum);
                value.render(accum);
                comma.render(accum);
            }
        }
    }
}

impl Render for Comprehension {
    fn render(&self, accum: &mut String) {
        self.open.render(accum);
        self.element.render(accum);
        self.value.render(accum);
        for clause in &self.clauses {
            clause.async_keyword.render(accum);
            clause.for_keyword.render(accum);
            clause.target.render(accum);
            clause.in_keyword.render(accum);
            clause.iter.render(accum);
            for condition in &clause.ifs {
                condition.if_keyword.render(accum);
                condition.test.render(accum);
            }
        }
        self.close.render(accum);
    }
}

impl Render for Slice {
    fn render(&self, accum: &mut String) {
        match self {
            Self::Index(index) => index.render(accum),
            Self::Range {
                lower,
                first_colon,
                upper,
                second_colon,
                step,
            } => {
                lower.render(accum);
                first_colon.render(accum);
                upper.render(accum);
                second_colon.render(accum);
                step.render(accum);
            }
        }
    }
}

impl Render for Arg {
    fn render(&self, accum: &mut String) {
        self.star.render(accum);
        self.keyword.render(accum);
        self.value.render(accum);
        self.comma.render(accum);
    }
}

impl Render for Parameters {
    fn render(&self, accum: &mut String) {
        self.params.render(accum);
    }
}

impl Render for Param {
    fn render(&self, accum: &mut String) {
        self.star.render(accum);
        self.name.render(accum);
        self.annotation.render(accum);
        self.default.render(accum);
        self.comma.render(accum);
    }
}

impl Render for Pattern {
    fn render(&self, accum: &mut String) {
        match self {
            Self::Literal(expression) | Self::Value(expression) => expression.render(accum),
            Self::Capture(name) => name.render(accum),
            Self::Star(star) => {
                star.star.render(accum);
                star.name.render(accum);
            }
            Self::Sequence(SequencePattern {
                open,
                elements,
                close,
            }) => {
                open.render(accum);
                elements.render(accum);
                close.render(accum);
            }
            Self::Mapping(MappingPattern {
                open,
                elements,
                rest,
                close,
            }) => {
                open.render(accum);
                for element in elements {
                    element.key.render(accum);
                    element.colon.render(accum);
                    element.pattern.render(accum);
                    element.comma.render(accum);
                }
                if let Some(rest) = rest {
                    rest.stars.render(accum);
                    rest.name.render(accum);
                    rest.comma.render(accum);
                }
                close.render(accum);
            }
            Self::Class(ClassPattern {
                cls,
                open,
                positional,
                keywords,
                close,
            }) => {
                cls.render(accum);
                open.render(accum);
                positional.render(accum);
                for keyword in keywords {
                    keyword.name.render(accum);
                    keyword.equals.render(accum);
                    keyword.pattern.render(accum);
                    keyword.comma.render(accum);
                }
                close.render(accum);
            }
            Self::Or(OrPattern { first, rest }) => {
                first.render(accum);
                rest.render(accum);
            }
            Self::As(AsPattern {
                pattern,
                as_keyword,
                name,
            }) => {
                pattern.render(accum);
                as_keyword.render(accum);
                name.render(accum);
            }
            Self::Group(GroupPattern {
                open,
                pattern,
                close,
            }) => {
                open.render(accum);
                pattern.render(accum);
                close.render(accum);
            }
        }
    }
}

impl Render for PatternElement {
    fn render(&self, accum: &mut String) {
        self.pattern.render(accum);
        self.comma.render(accum);
    }
}

impl Render for SmallStatement {
    fn render(&self, accum: &mut String) {
        self.kind.render(accum);
        self.semicolon.render(accum);
    }
}

impl Render for SmallStatementKind {
    fn render(&self, accum: &mut String) {
        match self {
            Self::Expr(expression) => expression.render(accum),
            Self::Assign(assign) => {
                assign.targets.render(accum);
                assign.value.render(accum);
            }
            Self::AnnAssign(assign) => {
                assign.target.render(accum);
                assign.colon.render(accum);
                assign.annotation.render(accum);
                assign.value.render(accum);
            }
            Self::AugAssign(assign) => {
                assign.target.render(accum);
                assign.op.render(accum);
                assign.value.render(accum);
            }
            Self::Return { keyword, value } => {
                keyword.render(accum);
                value.render(accum);
            }
            Self::Pass(token) | Self::Break(token) | Self::Continue(token) => token.render(accum),
            Self::Raise {
                keyword,
                exception,
                cause,
            } => {
                keyword.render(accum);
                exception.render(accum);
                cause.render(accum);
            }
            Self::Global { keyword, names } => {
                keyword.render(accum);
                names.render(accum);
            }
            Self::Del { keyword, target } => {
                keyword.render(accum);
                target.render(accum);
            }
            Self::Assert {
                keyword,
                test,
                message,
            } => {
                keyword.render(accum);
                test.render(accum);
                message.render(accum);
            }
            Self::Import(import) => {
                import.keyword.render(accum);
                import.names.render(accum);
            }
            Self::ImportFrom(import) => {
                import.from_keyword.render(accum);
                import.relative.render(accum);
                import.module.render(accum);
                import.import_keyword.render(accum);
                match &import.names {
                    ImportNames::Star(star) => star.render(accum),
                    ImportNames::Aliases { open, names, close } => {
                        open.render(accum);
                        names.render(accum);
                        close.render(accum);
                    }
                }
            }
            Self::TypeAlias(alias) => {
                alias.keyword.render(accum);
                alias.name.render(accum);
                alias.type_params.render(accum);
                alias.equals.render(accum);
                alias.value.render(accum);
            }
        }
    }
}

impl Render for ImportAlias {
    fn render(&self, accum: &mut String) {
        self.name.render(accum);
        self.asname.render(accum);
        self.comma.render(accum);
    }
}

impl Render for TypeParams {
    fn render(&self, accum: &mut String) {
        self.open.render(accum);
        for param in &self.params {
            param.star.render(accum);
            param.name.render(accum);
            param.bound.render(accum);
            param.comma.render(accum);
        }
        self.close.render(accum);
    }
}

fn render_lines(lines: &[EmptyLine], indent: &str, accum: &mut String) {
    for line in lines {
        if line.indent {
            accum.push_str(indent);
        }
        accum.push_str(&line.whitespace);
        if let Some(comment) = &line.comment {
            accum.push_str(comment);
        }
        accum.push_str(&line.newline);
    }
}

impl Statement {
    /// Render this statement with every line indented by `indent`.
    pub fn render_at(&self, indent: &str, accum: &mut String) {
        match self {
            Self::Simple(SimpleStatementLine {
                leading_lines,
                body,
                newline,
            }) => {
                render_lines(leading_lines, indent, accum);
                accum.push_str(indent);
                body.render(accum);
                newline.render(accum);
            }
            Self::If(statement) => statement.render_at(indent, accum),
            Self::While(While {
                leading_lines,
                keyword,
                test,
                colon,
                body,
                orelse,
            }) => {
                render_lines(leading_lines, indent, accum);
                accum.push_str(indent);
                keyword.render(accum);
                test.render(accum);
                colon.render(accum);
                body.render_at(indent, accum);
                render_else(orelse.as_ref(), indent, accum);
            }
            Self::For(For {
                leading_lines,
                async_keyword,
                for_keyword,
                target,
                in_keyword,
                iter,
                colon,
                body,
                orelse,
            }) => {
                render_lines(leading_lines, indent, accum);
                accum.push_str(indent);
                async_keyword.render(accum);
                for_keyword.render(accum);
                target.render(accum);
                in_keyword.render(accum);
                iter.render(accum);
                colon.render(accum);
                body.render_at(indent, accum);
                render_else(orelse.as_ref(), indent, accum);
            }
            Self::Try(Try {
                leading_lines,
                keyword,
                colon,
                body,
                handlers,
                orelse,
                finalbody,
            }) => {
                render_lines(leading_lines, indent, accum);
                accum.push_str(indent);
                keyword.render(accum);
                colon.render(accum);
                body.render_at(indent, accum);
                for handler in handlers {
                    handler.render_at(indent, accum);
                }
                render_else(orelse.as_ref(), indent, accum);
                render_else(finalbody.as_ref(), indent, accum);
            }
            Self::With(With {
                leading_lines,
                async_keyword,
                keyword,
                open,
                items,
                close,
                colon,
                body,
            }) => {
                render_lines(leading_lines, indent, accum);
                accum.push_str(indent);
                async_keyword.render(accum);
                keyword.render(accum);
                open.render(accum);
                for item in items {
                    item.item.render(accum);
                    item.asname.render(accum);
                    item.comma.render(accum);
                }
                close.render(accum);
                colon.render(accum);
                body.render_at(indent, accum);
            }
            Self::FunctionDef(FunctionDef {
                leading_lines,
                decorators,
                lines_after_decorators,
                async_keyword,
                keyword,
                name,
                type_params,
                open,
                params,
                close,
                returns,
                colon,
                body,
            }) => {
                render_lines(leading_lines, indent, accum);
                render_decorators(decorators, indent, accum);
                render_lines(lines_after_decorators, indent, accum);
                accum.push_str(indent);
                async_keyword.render(accum);
                keyword.render(accum);
                name.render(accum);
                type_params.render(accum);
                open.render(accum);
                params.render(accum);
                close.render(accum);
                returns.render(accum);
                colon.render(accum);
                body.render_at(indent, accum);
            }
            Self::ClassDef(ClassDef {
                leading_lines,
                decorators,
                lines_after_decorators,
                keyword,
                name,
                type_params,
                open,
                args,
                close,
                colon,
                body,
            }) => {
                render_lines(leading_lines, indent, accum);
                render_decorators(decorators, indent, accum);
                render_lines(lines_after_decorators, indent, accum);
                accum.push_str(indent);
                keyword.render(accum);
                name.render(accum);
                type_params.render(accum);
                open.render(accum);
                args.render(accum);
                close.render(accum);
                colon.render(accum);
                body.render_at(indent, accum);
            }
            Self::Match(statement) => statement.render_at(indent, accum),
        }
    }

    /// This statement's source text, at the top level.
    pub fn render(&self) -> String {
        let mut accum = String::new();
        self.render_at("", &mut accum);
        accum
    }
}

fn render_decorators(decorators: &[Decorator], indent: &str, accum: &mut String) {
    for decorator in decorators {
        render_lines(&decorator.leading_lines, indent, accum);
        accum.push_str(indent);
        decorator.at.render(accum);
        decorator.expression.render(accum);
        decorator.newline.render(accum);
    }
}

fn render_else(orelse: Option<&Else>, indent: &str, accum: &mut String) {
    if let Some(Else {
        leading_lines,
        keyword,
        colon,
        body,
    }) = orelse
    {
        render_lines(leading_lines, indent, accum);
        accum.push_str(indent);
        keyword.render(accum);
        colon.render(accum);
        body.render_at(indent, accum);
    }
}

impl If {
    fn render_at(&self, indent: &str, accum: &mut String) {
        render_lines(&self.leading_lines, indent, accum);
        accum.push_str(indent);
        self.keyword.render(accum);
        self.test.render(accum);
        self.colon.render(accum);
        self.body.render_at(indent, accum);
        match self.orelse.as_deref() {
            Some(OrElse::Elif(elif)) => elif.render_at(indent, accum),
            Some(OrElse::Else(orelse)) => render_else(Some(orelse), indent, accum),
            None => {}
        }
    }
}

impl ExceptHandler {
    fn render_at(&self, indent: &str, accum: &mut String) {
        render_lines(&self.leading_lines, indent, accum);
        accum.push_str(indent);
        self.keyword.render(accum);
        self.star.render(accum);
        self.type_.render(accum);
        self.name.render(accum);
        self.colon.render(accum);
        self.body.render_at(indent, accum);
    }
}

impl Match {
    fn render_at(&self, indent: &str, accum: &mut String) {
        render_lines(&self.leading_lines, indent, accum);
        accum.push_str(indent);
        self.keyword.render(accum);
        self.subject.render(accum);
        self.colon.render(accum);
        self.newline.render(accum);
        let case_indent = format!("{indent}{}", self.indent);
        for case in &self.cases {
            case.render_at(&case_indent, accum);
        }
        render_lines(&self.footer, &case_indent, accum);
    }
}

impl MatchCase {
    fn render_at(&self, indent: &str, accum: &mut String) {
        render_lines(&self.leading_lines, indent, accum);
        accum.push_str(indent);
        self.keyword.render(accum);
        self.pattern.render(accum);
        self.guard.render(accum);
        self.colon.render(accum);
        self.body.render_at(indent, accum);
    }
}

impl Suite {
    /// Render the suite of a header line indented by `indent`, starting right after its `:`.
    pub fn render_at(&self, indent: &str, accum: &mut String) {
        match self {
            Self::Simple(suite) => {
                suite.body.render(accum);
                suite.newline.render(accum);
            }
            Self::Indented(IndentedBlock {
                newline,
                indent: relative,
                body,
                footer,
            }) => {
                newline.render(accum);
                let inner = format!("{indent}{relative}");
                for statement in body {
                    statement.render_at(&inner, accum);
                }
                render_lines(footer, &inner, accum);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{EmptyLine, Expression, Module, Render, Statement, Suite, Token};

    #[test]
    fn it_reindents_moved_statements() {
        let module = Module::parse("if a:\n    # why\n    b()\n").unwrap();
        let block = match &module.body[0] {
            Statement::If(statement) => match &statement.body {
                Suite::Indented(block) => block.clone(),
                other => panic!("{other:#?}"),
            },
            other => panic!("{other:#?}"),
        };
        let mut accum = String::new();
        block.body[0].render_at("", &mut accum);
        assert_eq!(accum, "# why\nb()\n");
    }

    #[test]
    fn it_renders_built_nodes() {
        let mut module = Module::parse("").unwrap();
        module.footer.push(EmptyLine::blank());
        assert_eq!(module.render(), "\n");
        let name = Expression::Name(Token::spaced("x"));
        assert_eq!(name.to_source(), " x");
    }
}
