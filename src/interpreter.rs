mod builtins;
mod callable;
mod modules;
pub mod object;
pub mod scope;

use std::{cell::RefCell, fmt::Debug, rc::Rc};

use crate::{
    ast::{Block, Expression, InfixOperator, Module, PrefixOperator, Statement},
    parser::ParseErrors,
    stack::ensure_sufficient_stack,
};

pub use self::{
    builtins::{Builtin, BuiltinFn, Builtins},
    modules::{FileResolver, MemoryResolver, ModuleRegistry, ModuleResolver},
};
use self::{
    object::{Function, HashObject, Object, ObjectType},
    scope::{Scope, ScopeRef},
};

pub const DEFAULT_MAX_CALL_DEPTH: usize = 10_000;

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("identifier not found: {0}")]
    IdentifierNotFound(String),
    #[error("unknown operator: {operator}{right}")]
    UnknownPrefixOperator {
        operator: PrefixOperator,
        right: ObjectType,
    },
    #[error("unknown operator: {left} {operator} {right}")]
    UnknownInfixOperator {
        left: ObjectType,
        operator: InfixOperator,
        right: ObjectType,
    },
    #[error("type mismatch: {left} {operator} {right}")]
    TypeMismatch {
        left: ObjectType,
        operator: InfixOperator,
        right: ObjectType,
    },
    #[error("wrong number of arguments. got={got}, want={want}")]
    WrongArgumentCount { got: usize, want: usize },
    #[error("argument to `{name}` must be ({expected}), got {got}")]
    InvalidArgument {
        name: &'static str,
        expected: ObjectType,
        got: ObjectType,
    },
    #[error("not a function: {0}")]
    NotAFunction(ObjectType),
    #[error("unusable as hash key: {0}")]
    UnusableAsHashKey(ObjectType),
    #[error("index operator not supported: {0}")]
    IndexNotSupported(ObjectType),
    #[error("stack overflow: maximum call depth of {0} exceeded")]
    StackOverflow(usize),
    #[error("module not found: {0}")]
    ModuleNotFound(String),
    #[error("could not compile module {name}: {errors}")]
    ModuleCompile { name: String, errors: ParseErrors },
    #[error("IO error: {0}")]
    IO(#[from] std::io::Error),
}

/// Non-local exits out of the recursive evaluator. `?` carries both up to the
/// nearest function call (for `Return`) or the top level (for `Error`).
#[derive(Debug)]
pub enum Unwind {
    Return(Object),
    Error(RuntimeError),
}

impl From<RuntimeError> for Unwind {
    fn from(error: RuntimeError) -> Self {
        Unwind::Error(error)
    }
}

type EvalResult = Result<Object, Unwind>;

pub struct Interpreter {
    builtins: Builtins,
    modules: ModuleRegistry,
    stdout: Rc<RefCell<dyn std::io::Write>>,
    call_depth: usize,
    max_call_depth: usize,
}

impl Debug for Interpreter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interpreter")
            .field("builtins", &self.builtins)
            .field("modules", &self.modules)
            .field("call_depth", &self.call_depth)
            .field("max_call_depth", &self.max_call_depth)
            .finish()
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new(Rc::new(RefCell::new(std::io::stdout())))
    }
}

impl Interpreter {
    /// Standard builtins, modules resolved relative to the working directory.
    pub fn new(stdout: Rc<RefCell<dyn std::io::Write>>) -> Self {
        Self::with_parts(
            Builtins::standard(),
            ModuleRegistry::default().with_resolver(FileResolver::new(".")),
            stdout,
        )
    }

    pub fn with_parts(
        builtins: Builtins,
        modules: ModuleRegistry,
        stdout: Rc<RefCell<dyn std::io::Write>>,
    ) -> Self {
        Self {
            builtins,
            modules,
            stdout,
            call_depth: 0,
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
        }
    }

    pub fn with_max_call_depth(mut self, max_call_depth: usize) -> Self {
        self.max_call_depth = max_call_depth;
        self
    }

    /// Evaluates a module in `scope` and returns the value of its last
    /// statement. A top-level `return` ends evaluation with its value; a
    /// runtime error comes back as [`Object::Error`].
    #[tracing::instrument(level = "debug", skip_all, fields(statements = module.0.len()))]
    pub fn evaluate(&mut self, module: &Module, scope: &ScopeRef) -> Object {
        match self.try_evaluate(module, scope) {
            Ok(value) => value,
            Err(error) => {
                tracing::debug!(%error, "evaluation failed");
                Object::Error(Rc::new(error))
            }
        }
    }

    /// Like [`Interpreter::evaluate`], with the error kept as a `Result`.
    pub fn try_evaluate(&mut self, module: &Module, scope: &ScopeRef) -> Result<Object, RuntimeError> {
        match self.eval_statements(&module.0, scope) {
            Ok(value) | Err(Unwind::Return(value)) => Ok(value),
            Err(Unwind::Error(error)) => Err(error),
        }
    }

    fn eval_statements(&mut self, statements: &[Statement], scope: &ScopeRef) -> EvalResult {
        let mut result = Object::Null;
        for statement in statements {
            result = self.eval_statement(statement, scope)?;
        }
        Ok(result)
    }

    fn eval_block(&mut self, block: &Block, scope: &ScopeRef) -> EvalResult {
        let scope = Scope::boxed(Some(scope.clone()));
        self.eval_statements(&block.statements, &scope)
    }

    fn eval_statement(&mut self, statement: &Statement, scope: &ScopeRef) -> EvalResult {
        match statement {
            Statement::Let { name, value, .. } => {
                let value = self.eval_expression(value, scope)?;
                scope.borrow_mut().set(name.clone(), value);
                Ok(Object::Null)
            }
            Statement::Return { value, .. } => {
                let value = self.eval_expression(value, scope)?;
                Err(Unwind::Return(value))
            }
            Statement::Expression { expression, .. } => self.eval_expression(expression, scope),
        }
    }

    fn eval_expression(&mut self, expression: &Expression, scope: &ScopeRef) -> EvalResult {
        ensure_sufficient_stack(|| self.eval_expression_inner(expression, scope))
    }

    fn eval_expression_inner(&mut self, expression: &Expression, scope: &ScopeRef) -> EvalResult {
        match expression {
            Expression::Identifier { name, .. } => self.lookup(name, scope),
            Expression::Number { value, .. } => Ok(Object::Number(*value)),
            Expression::Boolean { value, .. } => Ok(Object::Bool(*value)),
            Expression::String { value, .. } => Ok(Object::string(value.as_str())),
            Expression::Array { elements, .. } => {
                let elements = elements
                    .iter()
                    .map(|element| self.eval_expression(element, scope))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Object::array(elements))
            }
            Expression::Hash { pairs, .. } => {
                let mut hash = HashObject::default();
                for (key, value) in pairs {
                    let key = self.eval_expression(key, scope)?;
                    let hash_key = key
                        .hash_key()
                        .ok_or_else(|| RuntimeError::UnusableAsHashKey(key.object_type()))?;
                    let value = self.eval_expression(value, scope)?;
                    hash.insert(hash_key, key, value);
                }
                Ok(Object::Hash(Rc::new(hash)))
            }
            Expression::Prefix {
                operator, right, ..
            } => {
                let right = self.eval_expression(right, scope)?;
                Ok(eval_prefix(*operator, right)?)
            }
            Expression::Infix {
                left,
                operator,
                right,
                ..
            } => {
                let left = self.eval_expression(left, scope)?;
                let right = self.eval_expression(right, scope)?;
                Ok(self.eval_infix(*operator, left, right)?)
            }
            Expression::If {
                condition,
                consequence,
                alternative,
                ..
            } => {
                if self.eval_expression(condition, scope)?.is_truthy() {
                    self.eval_block(consequence, scope)
                } else if let Some(alternative) = alternative {
                    self.eval_block(alternative, scope)
                } else {
                    Ok(Object::Null)
                }
            }
            Expression::Function { params, body, .. } => Ok(Object::Function(Rc::new(Function {
                params: params.clone(),
                body: body.clone(),
                scope: scope.clone(),
            }))),
            Expression::Call { function, args, .. } => {
                let function = self.eval_expression(function, scope)?;
                let args = args
                    .iter()
                    .map(|arg| self.eval_expression(arg, scope))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(self.apply_function(&function, args)?)
            }
            Expression::Index { left, index, .. } => {
                let left = self.eval_expression(left, scope)?;
                let index = self.eval_expression(index, scope)?;
                Ok(eval_index(&left, &index)?)
            }
        }
    }

    fn lookup(&self, name: &str, scope: &ScopeRef) -> EvalResult {
        if let Some(value) = scope.borrow().get(name) {
            return Ok(value);
        }
        match self.builtins.get(name) {
            Some(builtin) => Ok(Object::Builtin(builtin)),
            None => Err(RuntimeError::IdentifierNotFound(name.to_string()).into()),
        }
    }

    fn eval_infix(
        &mut self,
        operator: InfixOperator,
        left: Object,
        right: Object,
    ) -> Result<Object, RuntimeError> {
        match (&left, &right) {
            (Object::Number(l), Object::Number(r)) => eval_number_infix(operator, *l, *r),
            (Object::String(l), Object::String(r)) => match operator {
                InfixOperator::Plus => Ok(Object::string(format!("{}{}", l.value, r.value))),
                _ => Err(RuntimeError::UnknownInfixOperator {
                    left: ObjectType::STRING,
                    operator,
                    right: ObjectType::STRING,
                }),
            },
            _ if operator == InfixOperator::Equal => Ok(Object::Bool(left.is_identical(&right))),
            _ if operator == InfixOperator::NotEqual => {
                Ok(Object::Bool(!left.is_identical(&right)))
            }
            _ if operator == InfixOperator::Pipe => self.apply_function(&right, vec![left]),
            _ if left.object_type() != right.object_type() => Err(RuntimeError::TypeMismatch {
                left: left.object_type(),
                operator,
                right: right.object_type(),
            }),
            _ => Err(RuntimeError::UnknownInfixOperator {
                left: left.object_type(),
                operator,
                right: right.object_type(),
            }),
        }
    }

    /// Evaluates the named module in a fresh root scope and returns its
    /// top-level bindings as a hash keyed by name.
    fn import(&mut self, name: &str) -> Result<Object, RuntimeError> {
        let module = self.modules.load(name)?;
        let scope = Scope::boxed(None);
        self.with_call_frame(|interpreter| interpreter.try_evaluate(&module, &scope))?;

        let mut hash = HashObject::default();
        for (name, value) in scope.borrow().bindings() {
            let key = Object::string(name);
            if let Some(hash_key) = key.hash_key() {
                hash.insert(hash_key, key, value);
            }
        }
        tracing::debug!(module = name, bindings = hash.len(), "imported module");
        Ok(Object::Hash(Rc::new(hash)))
    }
}

fn eval_prefix(operator: PrefixOperator, right: Object) -> Result<Object, RuntimeError> {
    match (operator, right) {
        (PrefixOperator::Not, right) => Ok(Object::Bool(!right.is_truthy())),
        (PrefixOperator::Negate, Object::Number(n)) => Ok(Object::Number(-n)),
        (PrefixOperator::Negate, right) => Err(RuntimeError::UnknownPrefixOperator {
            operator,
            right: right.object_type(),
        }),
    }
}

fn eval_number_infix(operator: InfixOperator, l: f64, r: f64) -> Result<Object, RuntimeError> {
    let result = match operator {
        InfixOperator::Plus => Object::Number(l + r),
        InfixOperator::Minus => Object::Number(l - r),
        InfixOperator::Multiply => Object::Number(l * r),
        InfixOperator::Divide => Object::Number(l / r),
        InfixOperator::LessThan => Object::Bool(l < r),
        InfixOperator::LessThanOrEqual => Object::Bool(l <= r),
        InfixOperator::GreaterThan => Object::Bool(l > r),
        InfixOperator::GreaterThanOrEqual => Object::Bool(l >= r),
        InfixOperator::Equal => Object::Bool(l == r),
        InfixOperator::NotEqual => Object::Bool(l != r),
        InfixOperator::And | InfixOperator::Or | InfixOperator::Pipe => {
            return Err(RuntimeError::UnknownInfixOperator {
                left: ObjectType::NUMBER,
                operator,
                right: ObjectType::NUMBER,
            })
        }
    };
    Ok(result)
}

fn eval_index(left: &Object, index: &Object) -> Result<Object, RuntimeError> {
    match (left, index) {
        (Object::Array(elements), Object::Number(i)) => {
            let i = i.trunc();
            if !i.is_finite() || i < 0.0 || i >= elements.len() as f64 {
                return Ok(Object::Null);
            }
            Ok(elements[i as usize].clone())
        }
        (Object::Hash(hash), index) => {
            let hash_key = index
                .hash_key()
                .ok_or_else(|| RuntimeError::UnusableAsHashKey(index.object_type()))?;
            Ok(hash
                .get(&hash_key)
                .map_or(Object::Null, |pair| pair.value.clone()))
        }
        (left, _) => Err(RuntimeError::IndexNotSupported(left.object_type())),
    }
}
