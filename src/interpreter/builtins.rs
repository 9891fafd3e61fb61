use std::{fmt::Debug, rc::Rc};

use rustc_hash::FxHashMap;

use super::{
    object::{Object, ObjectType},
    Interpreter, RuntimeError,
};

pub type BuiltinFn = fn(&mut Interpreter, &[Object]) -> Result<Object, RuntimeError>;

/// A native function. `params` holds one accepted-type mask per required
/// positional parameter; extra arguments are passed through unchecked.
#[derive(Clone)]
pub struct Builtin {
    pub name: &'static str,
    pub params: &'static [ObjectType],
    pub function: BuiltinFn,
}

impl Debug for Builtin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Builtin")
            .field("name", &self.name)
            .field("params", &self.params)
            .finish()
    }
}

const STANDARD: &[Builtin] = &[
    Builtin {
        name: "len",
        params: &[ObjectType::STRING.union(ObjectType::ARRAY)],
        function: len,
    },
    Builtin {
        name: "head",
        params: &[ObjectType::ARRAY],
        function: head,
    },
    Builtin {
        name: "last",
        params: &[ObjectType::ARRAY],
        function: last,
    },
    Builtin {
        name: "tail",
        params: &[ObjectType::ARRAY],
        function: tail,
    },
    Builtin {
        name: "push",
        params: &[ObjectType::ARRAY, ObjectType::all()],
        function: push,
    },
    Builtin {
        name: "puts!",
        params: &[],
        function: puts,
    },
    Builtin {
        name: "import",
        params: &[ObjectType::STRING],
        function: import,
    },
];

/// Name to builtin lookup, consulted after the scope chain.
#[derive(Debug, Clone, Default)]
pub struct Builtins {
    table: FxHashMap<&'static str, Rc<Builtin>>,
}

impl Builtins {
    pub fn standard() -> Self {
        let mut builtins = Self::default();
        for builtin in STANDARD {
            builtins.register(builtin.clone());
        }
        builtins
    }

    /// Replaces any builtin already registered under the same name.
    pub fn register(&mut self, builtin: Builtin) {
        self.table.insert(builtin.name, Rc::new(builtin));
    }

    pub fn get(&self, name: &str) -> Option<Rc<Builtin>> {
        self.table.get(name).cloned()
    }
}

fn wrong_argument(name: &'static str, expected: ObjectType, args: &[Object]) -> RuntimeError {
    RuntimeError::InvalidArgument {
        name,
        expected,
        got: args.first().map_or(ObjectType::NULL, Object::object_type),
    }
}

fn len(_: &mut Interpreter, args: &[Object]) -> Result<Object, RuntimeError> {
    match args {
        [Object::String(s), ..] => Ok(Object::Number(s.value.len() as f64)),
        [Object::Array(elements), ..] => Ok(Object::Number(elements.len() as f64)),
        _ => Err(wrong_argument(
            "len",
            ObjectType::STRING | ObjectType::ARRAY,
            args,
        )),
    }
}

fn head(_: &mut Interpreter, args: &[Object]) -> Result<Object, RuntimeError> {
    match args {
        [Object::Array(elements), ..] => Ok(elements.first().cloned().unwrap_or(Object::Null)),
        _ => Err(wrong_argument("head", ObjectType::ARRAY, args)),
    }
}

fn last(_: &mut Interpreter, args: &[Object]) -> Result<Object, RuntimeError> {
    match args {
        [Object::Array(elements), ..] => Ok(elements.last().cloned().unwrap_or(Object::Null)),
        _ => Err(wrong_argument("last", ObjectType::ARRAY, args)),
    }
}

fn tail(_: &mut Interpreter, args: &[Object]) -> Result<Object, RuntimeError> {
    match args {
        [Object::Array(elements), ..] => match elements.split_first() {
            Some((_, rest)) => Ok(Object::array(rest.to_vec())),
            None => Ok(Object::Null),
        },
        _ => Err(wrong_argument("tail", ObjectType::ARRAY, args)),
    }
}

fn push(_: &mut Interpreter, args: &[Object]) -> Result<Object, RuntimeError> {
    match args {
        [Object::Array(elements), value, ..] => {
            let mut pushed = Vec::with_capacity(elements.len() + 1);
            pushed.extend(elements.iter().cloned());
            pushed.push(value.clone());
            Ok(Object::array(pushed))
        }
        _ => Err(wrong_argument("push", ObjectType::ARRAY, args)),
    }
}

fn puts(interpreter: &mut Interpreter, args: &[Object]) -> Result<Object, RuntimeError> {
    let mut stdout = interpreter.stdout.borrow_mut();
    for arg in args {
        writeln!(stdout, "{arg}")?;
    }
    Ok(Object::Null)
}

fn import(interpreter: &mut Interpreter, args: &[Object]) -> Result<Object, RuntimeError> {
    match args {
        [Object::String(name), ..] => interpreter.import(&name.value),
        _ => Err(wrong_argument("import", ObjectType::STRING, args)),
    }
}

#[cfg(test)]
mod test {
    use std::cell::RefCell;

    use super::*;
    use pretty_assertions::assert_eq;

    fn call(name: &str, args: &[Object]) -> Result<Object, RuntimeError> {
        let mut interpreter = Interpreter::new(Rc::new(RefCell::new(Vec::<u8>::new())));
        let builtin = Builtins::standard()
            .get(name)
            .expect("standard builtin should exist");
        (builtin.function)(&mut interpreter, args)
    }

    fn numbers(values: &[f64]) -> Object {
        Object::array(values.iter().copied().map(Object::Number).collect())
    }

    #[test]
    fn test_len() {
        assert_eq!(call("len", &[Object::string("four")]).ok(), Some(Object::Number(4.0)));
        assert_eq!(call("len", &[Object::string("世界")]).ok(), Some(Object::Number(6.0)));
        assert_eq!(call("len", &[numbers(&[1.0, 2.0, 3.0])]).ok(), Some(Object::Number(3.0)));
        assert_eq!(
            call("len", &[Object::Number(1.0)]).map_err(|e| e.to_string()),
            Err("argument to `len` must be (TypeString, TypeArray), got TypeNumber".to_string())
        );
    }

    #[test]
    fn test_head_last_tail() {
        let array = numbers(&[1.0, 2.0, 3.0]);
        assert_eq!(call("head", &[array.clone()]).ok(), Some(Object::Number(1.0)));
        assert_eq!(call("last", &[array.clone()]).ok(), Some(Object::Number(3.0)));
        assert_eq!(call("tail", &[array]).ok(), Some(numbers(&[2.0, 3.0])));

        let empty = numbers(&[]);
        assert_eq!(call("head", &[empty.clone()]).ok(), Some(Object::Null));
        assert_eq!(call("last", &[empty.clone()]).ok(), Some(Object::Null));
        assert_eq!(call("tail", &[empty]).ok(), Some(Object::Null));
    }

    #[test]
    fn test_push_leaves_input_untouched() {
        let array = numbers(&[1.0]);
        let pushed = call("push", &[array.clone(), Object::Number(2.0)]).ok();
        assert_eq!(pushed, Some(numbers(&[1.0, 2.0])));
        assert_eq!(array, numbers(&[1.0]));
    }

    #[test]
    fn test_puts_writes_display_strings() {
        let stdout = Rc::new(RefCell::new(Vec::<u8>::new()));
        let mut interpreter = Interpreter::new(stdout.clone());
        let result = puts(
            &mut interpreter,
            &[Object::string("hello"), Object::Number(1.5), Object::Null],
        );
        assert_eq!(result.ok(), Some(Object::Null));
        assert_eq!(
            String::from_utf8(stdout.borrow().clone()).expect("output is utf-8"),
            "hello\n1.5\nnull\n"
        );
    }

    #[test]
    fn test_register_overrides() {
        let mut builtins = Builtins::standard();
        builtins.register(Builtin {
            name: "len",
            params: &[],
            function: |_, _| Ok(Object::Number(42.0)),
        });
        let builtin = builtins.get("len").expect("len is registered");
        assert!(builtin.params.is_empty());
        assert!(builtins.get("missing").is_none());
    }
}
