use std::rc::Rc;

use super::{
    builtins::Builtin,
    object::{Function, Object},
    scope::Scope,
    Interpreter, RuntimeError, Unwind,
};

impl Interpreter {
    /// Calls `function` with already evaluated arguments. Supplying fewer
    /// arguments than a user function declares returns a new function over
    /// the remaining parameters; surplus arguments are ignored.
    pub fn apply_function(
        &mut self,
        function: &Object,
        args: Vec<Object>,
    ) -> Result<Object, RuntimeError> {
        match function {
            Object::Function(function) if args.len() < function.params.len() => {
                Ok(partially_apply(function, args))
            }
            Object::Function(function) => {
                self.with_call_frame(|interpreter| interpreter.call_function(function, args))
            }
            Object::Builtin(builtin) => self.call_builtin(builtin, &args),
            other => Err(RuntimeError::NotAFunction(other.object_type())),
        }
    }

    fn call_function(
        &mut self,
        function: &Function,
        args: Vec<Object>,
    ) -> Result<Object, RuntimeError> {
        let scope = Scope::boxed(Some(function.scope.clone()));
        {
            let mut scope = scope.borrow_mut();
            for (param, arg) in function.params.iter().zip(args) {
                scope.set(param.clone(), arg);
            }
        }

        match self.eval_block(&function.body, &scope) {
            Ok(value) | Err(Unwind::Return(value)) => Ok(value),
            Err(Unwind::Error(error)) => Err(error),
        }
    }

    fn call_builtin(&mut self, builtin: &Builtin, args: &[Object]) -> Result<Object, RuntimeError> {
        if args.len() < builtin.params.len() {
            return Err(RuntimeError::WrongArgumentCount {
                got: args.len(),
                want: builtin.params.len(),
            });
        }

        for (arg, accepted) in args.iter().zip(builtin.params) {
            if !accepted.contains(arg.object_type()) {
                return Err(RuntimeError::InvalidArgument {
                    name: builtin.name,
                    expected: *accepted,
                    got: arg.object_type(),
                });
            }
        }

        tracing::trace!(builtin = builtin.name, args = args.len(), "calling builtin");
        (builtin.function)(self, args)
    }

    /// Runs `f` one level deeper in the call depth, failing instead once the
    /// configured maximum is reached.
    pub(super) fn with_call_frame<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, RuntimeError>,
    ) -> Result<T, RuntimeError> {
        if self.call_depth >= self.max_call_depth {
            tracing::debug!(depth = self.call_depth, "call depth exceeded");
            return Err(RuntimeError::StackOverflow(self.max_call_depth));
        }

        self.call_depth += 1;
        let result = f(self);
        self.call_depth -= 1;
        result
    }
}

fn partially_apply(function: &Function, args: Vec<Object>) -> Object {
    let bound = args.len();
    let scope = Scope::boxed(Some(function.scope.clone()));
    {
        let mut scope = scope.borrow_mut();
        for (param, arg) in function.params.iter().zip(args) {
            scope.set(param.clone(), arg);
        }
    }

    Object::Function(Rc::new(Function {
        params: function.params[bound..].to_vec(),
        body: function.body.clone(),
        scope,
    }))
}

#[cfg(test)]
mod test {
    use std::cell::RefCell;

    use super::*;
    use pretty_assertions::assert_eq;

    fn interpreter() -> Interpreter {
        Interpreter::new(Rc::new(RefCell::new(Vec::<u8>::new())))
    }

    fn eval_with(interpreter: &mut Interpreter, source: &str) -> Object {
        let module = crate::compile(source).expect("Parse should work on valid program");
        interpreter.evaluate(&module, &Scope::boxed(None))
    }

    #[test]
    fn test_partial_application_returns_remaining_params() {
        let mut interpreter = interpreter();
        let partial = eval_with(&mut interpreter, "fn(x, y, z) { x + y + z }(1)");
        let Object::Function(function) = &partial else {
            panic!("expected a function, got {partial:?}");
        };
        assert_eq!(function.params, vec!["y".to_string(), "z".to_string()]);
        assert_eq!(
            interpreter.apply_function(&partial, vec![Object::Number(2.0), Object::Number(3.0)])
                .ok(),
            Some(Object::Number(6.0))
        );
    }

    #[test]
    fn test_builtin_arity_and_masks() {
        let mut interpreter = interpreter();
        assert_eq!(
            eval_with(&mut interpreter, "len()").to_string(),
            "wrong number of arguments. got=0, want=1"
        );
        assert_eq!(
            eval_with(&mut interpreter, "push(1, 2)").to_string(),
            "argument to `push` must be (TypeArray), got TypeNumber"
        );
        assert_eq!(
            eval_with(&mut interpreter, r#"len("one", "two")"#),
            Object::Number(3.0)
        );
    }

    #[test]
    fn test_call_depth_limit() {
        let mut interpreter = interpreter().with_max_call_depth(32);
        let result = eval_with(
            &mut interpreter,
            "let f = fn(n) { if (n == 0) { 0 } else { 1 + f(n - 1) } }; f(31)",
        );
        assert_eq!(result, Object::Number(31.0));

        let result = eval_with(&mut interpreter, "let loop = fn() { loop() }; loop()");
        assert_eq!(
            result.to_string(),
            "stack overflow: maximum call depth of 32 exceeded"
        );

        // the depth counter unwinds with the error
        let result = eval_with(&mut interpreter, "fn(x) { x }(7)");
        assert_eq!(result, Object::Number(7.0));
    }
}
