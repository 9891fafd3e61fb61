use std::{fmt::Display, rc::Rc};

use crate::{span::Span, stack::ensure_sufficient_stack};

#[derive(Debug, Clone, Default)]
pub struct Module(pub Vec<Statement>);

#[derive(Debug, Clone)]
pub enum Statement {
    Let {
        name: String,
        value: Expression,
        span: Span,
    },
    Return {
        value: Expression,
        span: Span,
    },
    Expression {
        expression: Expression,
        span: Span,
    },
}

/// A `{ ... }` body of an `if` branch or a function. Each evaluation gets its
/// own scope.
#[derive(Debug, Clone)]
pub struct Block {
    pub statements: Vec<Statement>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum Expression {
    Identifier {
        name: String,
        span: Span,
    },
    Number {
        value: f64,
        span: Span,
    },
    Boolean {
        value: bool,
        span: Span,
    },
    String {
        value: String,
        span: Span,
    },
    Array {
        elements: Vec<Expression>,
        span: Span,
    },
    Hash {
        pairs: Vec<(Expression, Expression)>,
        span: Span,
    },
    Prefix {
        operator: PrefixOperator,
        right: Box<Expression>,
        span: Span,
    },
    Infix {
        left: Box<Expression>,
        operator: InfixOperator,
        right: Box<Expression>,
        span: Span,
    },
    If {
        condition: Box<Expression>,
        consequence: Block,
        alternative: Option<Block>,
        span: Span,
    },
    Function {
        params: Vec<String>,
        body: Rc<Block>,
        span: Span,
    },
    Call {
        function: Box<Expression>,
        args: Vec<Expression>,
        span: Span,
    },
    Index {
        left: Box<Expression>,
        index: Box<Expression>,
        span: Span,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefixOperator {
    Negate,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfixOperator {
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    Plus,
    Minus,
    Multiply,
    Divide,
    And,
    Or,
    Pipe,
}

impl Expression {
    fn placeholder() -> Expression {
        Expression::Boolean {
            value: false,
            span: Span::default(),
        }
    }

    /// Moves every directly owned subexpression into `pending`, leaving
    /// `self` shallow.
    fn take_children(&mut self, pending: &mut Vec<Expression>) {
        fn take_block(block: &mut Block, pending: &mut Vec<Expression>) {
            pending.extend(block.statements.drain(..).map(|statement| match statement {
                Statement::Let { value, .. } | Statement::Return { value, .. } => value,
                Statement::Expression { expression, .. } => expression,
            }));
        }

        match self {
            Expression::Identifier { .. }
            | Expression::Number { .. }
            | Expression::Boolean { .. }
            | Expression::String { .. } => {}
            Expression::Array { elements, .. } => pending.append(elements),
            Expression::Hash { pairs, .. } => {
                for (key, value) in pairs.drain(..) {
                    pending.push(key);
                    pending.push(value);
                }
            }
            Expression::Prefix { right, .. } => {
                pending.push(std::mem::replace(&mut **right, Expression::placeholder()));
            }
            Expression::Infix { left, right, .. } | Expression::Index { left, index: right, .. } => {
                pending.push(std::mem::replace(&mut **left, Expression::placeholder()));
                pending.push(std::mem::replace(&mut **right, Expression::placeholder()));
            }
            Expression::If {
                condition,
                consequence,
                alternative,
                ..
            } => {
                pending.push(std::mem::replace(&mut **condition, Expression::placeholder()));
                take_block(consequence, pending);
                if let Some(alternative) = alternative {
                    take_block(alternative, pending);
                }
            }
            // Closures may still share the body.
            Expression::Function { body, .. } => {
                if let Some(body) = Rc::get_mut(body) {
                    take_block(body, pending);
                }
            }
            Expression::Call { function, args, .. } => {
                pending.push(std::mem::replace(&mut **function, Expression::placeholder()));
                pending.append(args);
            }
        }
    }
}

// Dropping deeply nested trees must not recurse once per level.
impl Drop for Expression {
    fn drop(&mut self) {
        let mut pending = Vec::new();
        self.take_children(&mut pending);
        while let Some(mut expression) = pending.pop() {
            expression.take_children(&mut pending);
        }
    }
}

fn write_separated<T: Display>(
    f: &mut std::fmt::Formatter<'_>,
    items: impl IntoIterator<Item = T>,
    separator: &str,
) -> std::fmt::Result {
    for (i, item) in items.into_iter().enumerate() {
        if i != 0 {
            write!(f, "{separator}")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

impl Display for Module {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write_separated(f, &self.0, "; ")
    }
}

impl Display for Statement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Statement::Let { name, value, .. } => write!(f, "let {name} = {value}"),
            Statement::Return { value, .. } => write!(f, "return {value}"),
            Statement::Expression { expression, .. } => write!(f, "{expression}"),
        }
    }
}

impl Display for Block {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.statements.is_empty() {
            return write!(f, "{{ }}");
        }
        write!(f, "{{ ")?;
        write_separated(f, &self.statements, "; ")?;
        write!(f, " }}")
    }
}

impl Display for Expression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        ensure_sufficient_stack(|| match self {
            Expression::Identifier { name, .. } => write!(f, "{name}"),
            Expression::Number { value, .. } => write!(f, "{value}"),
            Expression::Boolean { value, .. } => write!(f, "{value}"),
            Expression::String { value, .. } => write!(f, "\"{value}\""),
            Expression::Array { elements, .. } => {
                write!(f, "[")?;
                write_separated(f, elements, ", ")?;
                write!(f, "]")
            }
            Expression::Hash { pairs, .. } => {
                write!(f, "{{")?;
                write_separated(
                    f,
                    pairs.iter().map(|(key, value)| format!("{key}: {value}")),
                    ", ",
                )?;
                write!(f, "}}")
            }
            Expression::Prefix {
                operator, right, ..
            } => write!(f, "({operator}{right})"),
            Expression::Infix {
                left,
                operator,
                right,
                ..
            } => write!(f, "({left} {operator} {right})"),
            Expression::If {
                condition,
                consequence,
                alternative,
                ..
            } => {
                write!(f, "if ({condition}) {consequence}")?;
                if let Some(alternative) = alternative {
                    write!(f, " else {alternative}")?;
                }
                Ok(())
            }
            Expression::Function { params, body, .. } => {
                write!(f, "fn(")?;
                write_separated(f, params, ", ")?;
                write!(f, ") {body}")
            }
            Expression::Call { function, args, .. } => {
                write!(f, "{function}(")?;
                write_separated(f, args, ", ")?;
                write!(f, ")")
            }
            Expression::Index { left, index, .. } => write!(f, "({left}[{index}])"),
        })
    }
}

impl Display for InfixOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InfixOperator::Equal => write!(f, "=="),
            InfixOperator::NotEqual => write!(f, "!="),
            InfixOperator::LessThan => write!(f, "<"),
            InfixOperator::LessThanOrEqual => write!(f, "<="),
            InfixOperator::GreaterThan => write!(f, ">"),
            InfixOperator::GreaterThanOrEqual => write!(f, ">="),
            InfixOperator::Plus => write!(f, "+"),
            InfixOperator::Minus => write!(f, "-"),
            InfixOperator::Multiply => write!(f, "*"),
            InfixOperator::Divide => write!(f, "/"),
            InfixOperator::And => write!(f, "&&"),
            InfixOperator::Or => write!(f, "||"),
            InfixOperator::Pipe => write!(f, "|"),
        }
    }
}

impl Display for PrefixOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PrefixOperator::Negate => write!(f, "-"),
            PrefixOperator::Not => write!(f, "!"),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn identifier(name: &str) -> Expression {
        Expression::Identifier {
            name: name.to_string(),
            span: Span::default(),
        }
    }

    #[test]
    fn test_let_statement_display() {
        let module = Module(vec![Statement::Let {
            name: "myVar".to_string(),
            value: identifier("anotherVar"),
            span: Span::default(),
        }]);
        assert_eq!(module.to_string(), "let myVar = anotherVar");
    }

    #[test]
    fn test_function_display() {
        let body = Block {
            statements: vec![Statement::Expression {
                expression: Expression::Infix {
                    left: Box::new(identifier("x")),
                    operator: InfixOperator::Plus,
                    right: Box::new(identifier("y")),
                    span: Span::default(),
                },
                span: Span::default(),
            }],
            span: Span::default(),
        };
        let function = Expression::Function {
            params: vec!["x".to_string(), "y".to_string()],
            body: Rc::new(body),
            span: Span::default(),
        };
        assert_eq!(function.to_string(), "fn(x, y) { (x + y) }");
    }

    #[test]
    fn test_empty_block_display() {
        let expr = Expression::If {
            condition: Box::new(Expression::Boolean {
                value: true,
                span: Span::default(),
            }),
            consequence: Block {
                statements: vec![],
                span: Span::default(),
            },
            alternative: None,
            span: Span::default(),
        };
        assert_eq!(expr.to_string(), "if (true) { }");
    }

    #[test]
    fn test_deeply_nested_tree_display_and_drop() {
        let depth = 200_000;
        let expression = (0..depth).fold(identifier("x"), |right, _| Expression::Prefix {
            operator: PrefixOperator::Not,
            right: Box::new(right),
            span: Span::default(),
        });
        let printed = expression.to_string();
        assert_eq!(printed.len(), 1 + 3 * depth);
        assert!(printed.starts_with("(!(!"));
        drop(expression);
    }
}
