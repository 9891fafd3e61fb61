use std::{
    fmt::{Debug, Display},
    hash::Hasher,
    rc::Rc,
};

use bitflags::bitflags;
use rustc_hash::{FxHashMap, FxHasher};

use crate::{ast::Block, stack::ensure_sufficient_stack};

use super::{builtins::Builtin, scope::ScopeRef, RuntimeError};

bitflags! {
    /// Runtime type tags. Builtins declare one mask per parameter listing the
    /// types they accept.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ObjectType: u16 {
        const ERROR = 1 << 0;
        const NUMBER = 1 << 1;
        const BOOL = 1 << 2;
        const STRING = 1 << 3;
        const ARRAY = 1 << 4;
        const HASH = 1 << 5;
        const NULL = 1 << 6;
        const FN = 1 << 7;
        const BUILTIN = 1 << 8;
    }
}

impl ObjectType {
    const NAMES: [(ObjectType, &'static str); 9] = [
        (ObjectType::ERROR, "TypeError"),
        (ObjectType::NUMBER, "TypeNumber"),
        (ObjectType::BOOL, "TypeBool"),
        (ObjectType::STRING, "TypeString"),
        (ObjectType::ARRAY, "TypeArray"),
        (ObjectType::HASH, "TypeHash"),
        (ObjectType::NULL, "TypeNull"),
        (ObjectType::FN, "TypeFn"),
        (ObjectType::BUILTIN, "TypeBuiltin"),
    ];
}

impl Display for ObjectType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names = Self::NAMES
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect::<Vec<_>>();
        write!(f, "{}", names.join(", "))
    }
}

/// Structural key of a hashable value. Equal values of the same type always
/// produce the same key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HashKey {
    pub object_type: ObjectType,
    pub value: u64,
}

#[derive(Debug)]
pub struct StringObject {
    pub value: String,
    hash: u64,
}

impl StringObject {
    pub fn new(value: impl Into<String>) -> Self {
        let value = value.into();
        let mut hasher = FxHasher::default();
        hasher.write_usize(value.len());
        hasher.write(value.as_bytes());
        Self {
            hash: hasher.finish(),
            value,
        }
    }

    pub fn hash_key(&self) -> HashKey {
        HashKey {
            object_type: ObjectType::STRING,
            value: self.hash,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HashPair {
    pub key: Object,
    pub value: Object,
}

/// Pairs in insertion order plus an index by structural key.
#[derive(Debug, Clone, Default)]
pub struct HashObject {
    pairs: Vec<HashPair>,
    index: FxHashMap<HashKey, usize>,
}

impl HashObject {
    /// Re-inserting an existing key keeps its position and replaces the pair.
    pub fn insert(&mut self, hash_key: HashKey, key: Object, value: Object) {
        match self.index.get(&hash_key) {
            Some(&i) => self.pairs[i] = HashPair { key, value },
            None => {
                self.index.insert(hash_key, self.pairs.len());
                self.pairs.push(HashPair { key, value });
            }
        }
    }

    pub fn get(&self, hash_key: &HashKey) -> Option<&HashPair> {
        self.index.get(hash_key).map(|&i| &self.pairs[i])
    }

    pub fn pairs(&self) -> &[HashPair] {
        &self.pairs
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// A closure: the function literal plus the scope it was evaluated in.
#[derive(Clone)]
pub struct Function {
    pub params: Vec<String>,
    pub body: Rc<Block>,
    pub scope: ScopeRef,
}

impl Debug for Function {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Function")
            .field("params", &self.params)
            .field("body", &self.body.to_string())
            .field("scope", &self.scope.as_ptr())
            .finish()
    }
}

#[derive(Debug, Clone)]
pub enum Object {
    Number(f64),
    Bool(bool),
    String(Rc<StringObject>),
    Array(Rc<Vec<Object>>),
    Hash(Rc<HashObject>),
    Function(Rc<Function>),
    Builtin(Rc<Builtin>),
    Null,
    Error(Rc<RuntimeError>),
}

impl Object {
    pub fn string(value: impl Into<String>) -> Self {
        Object::String(Rc::new(StringObject::new(value)))
    }

    pub fn array(elements: Vec<Object>) -> Self {
        Object::Array(Rc::new(elements))
    }

    pub fn object_type(&self) -> ObjectType {
        match self {
            Object::Number(_) => ObjectType::NUMBER,
            Object::Bool(_) => ObjectType::BOOL,
            Object::String(_) => ObjectType::STRING,
            Object::Array(_) => ObjectType::ARRAY,
            Object::Hash(_) => ObjectType::HASH,
            Object::Function(_) => ObjectType::FN,
            Object::Builtin(_) => ObjectType::BUILTIN,
            Object::Null => ObjectType::NULL,
            Object::Error(_) => ObjectType::ERROR,
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Object::Bool(b) => *b,
            Object::Null => false,
            Object::Number(n) => *n != 0.0,
            Object::String(s) => !s.value.is_empty(),
            Object::Array(elements) => !elements.is_empty(),
            Object::Hash(hash) => !hash.is_empty(),
            Object::Function(_) | Object::Builtin(_) | Object::Error(_) => true,
        }
    }

    /// `None` for values that cannot be used as hash keys.
    pub fn hash_key(&self) -> Option<HashKey> {
        match self {
            Object::Number(n) => {
                // -0 and 0 are the same key
                let n = if *n == 0.0 { 0.0 } else { *n };
                Some(HashKey {
                    object_type: ObjectType::NUMBER,
                    value: n.to_bits(),
                })
            }
            Object::Bool(b) => Some(HashKey {
                object_type: ObjectType::BOOL,
                value: u64::from(*b),
            }),
            Object::String(s) => Some(s.hash_key()),
            _ => None,
        }
    }

    /// Language-level `==`: scalars by value, everything else by reference.
    pub fn is_identical(&self, other: &Object) -> bool {
        match (self, other) {
            (Object::Number(a), Object::Number(b)) => a == b,
            (Object::Bool(a), Object::Bool(b)) => a == b,
            (Object::Null, Object::Null) => true,
            (Object::String(a), Object::String(b)) => Rc::ptr_eq(a, b),
            (Object::Array(a), Object::Array(b)) => Rc::ptr_eq(a, b),
            (Object::Hash(a), Object::Hash(b)) => Rc::ptr_eq(a, b),
            (Object::Function(a), Object::Function(b)) => Rc::ptr_eq(a, b),
            (Object::Builtin(a), Object::Builtin(b)) => Rc::ptr_eq(a, b),
            (Object::Error(a), Object::Error(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// Structural comparison for host code and tests. Functions and builtins
/// compare by reference.
impl PartialEq for Object {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Object::String(a), Object::String(b)) => a.value == b.value,
            (Object::Array(a), Object::Array(b)) => a == b,
            (Object::Hash(a), Object::Hash(b)) => {
                a.len() == b.len()
                    && a.pairs().iter().all(|pair| {
                        pair.key
                            .hash_key()
                            .and_then(|key| b.get(&key))
                            .is_some_and(|other| other.value == pair.value)
                    })
            }
            (Object::Error(a), Object::Error(b)) => a.to_string() == b.to_string(),
            _ => self.is_identical(other),
        }
    }
}

impl Object {
    /// Moves the elements of uniquely owned arrays and hashes into `pending`.
    fn take_children(&mut self, pending: &mut Vec<Object>) {
        match self {
            Object::Array(elements) => {
                if let Some(elements) = Rc::get_mut(elements) {
                    pending.append(elements);
                }
            }
            Object::Hash(hash) => {
                if let Some(hash) = Rc::get_mut(hash) {
                    hash.index.clear();
                    for pair in hash.pairs.drain(..) {
                        pending.push(pair.key);
                        pending.push(pair.value);
                    }
                }
            }
            _ => {}
        }
    }
}

// Arrays nested once per call would otherwise drop recursively.
impl Drop for Object {
    fn drop(&mut self) {
        let mut pending = Vec::new();
        self.take_children(&mut pending);
        while let Some(mut object) = pending.pop() {
            object.take_children(&mut pending);
        }
    }
}

impl Display for Object {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        ensure_sufficient_stack(|| match self {
            Object::Number(n) => write!(f, "{n}"),
            Object::Bool(b) => write!(f, "{b}"),
            Object::String(s) => write!(f, "{}", s.value),
            Object::Array(elements) => {
                let elements = elements.iter().map(ToString::to_string).collect::<Vec<_>>();
                write!(f, "[{}]", elements.join(", "))
            }
            Object::Hash(hash) => {
                let pairs = hash
                    .pairs()
                    .iter()
                    .map(|pair| format!("{}: {}", pair.key, pair.value))
                    .collect::<Vec<_>>();
                write!(f, "{{{}}}", pairs.join(", "))
            }
            Object::Function(function) => {
                write!(f, "fn({}) {}", function.params.join(", "), function.body)
            }
            Object::Builtin(_) => write!(f, "builtin function"),
            Object::Null => write!(f, "null"),
            Object::Error(error) => write!(f, "{error}"),
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_string_hash_key() {
        let hello1 = Object::string("Hello World");
        let hello2 = Object::string("Hello World");
        let diff1 = Object::string("My name is johnny");
        let diff2 = Object::string("My name is johnny");

        assert_eq!(hello1.hash_key(), hello2.hash_key());
        assert_eq!(diff1.hash_key(), diff2.hash_key());
        assert_ne!(hello1.hash_key(), diff1.hash_key());
    }

    #[test]
    fn test_string_hash_key_depends_on_length() {
        assert_ne!(Object::string("").hash_key(), Object::string("\0").hash_key());
        assert_ne!(Object::string("a").hash_key(), Object::string("a\0").hash_key());
        assert_ne!(Object::string("\0").hash_key(), Object::string("\0\0").hash_key());
    }

    #[test]
    fn test_deeply_nested_array_display_and_drop() {
        let depth = 100_000;
        let nested = (0..depth).fold(Object::array(vec![]), |inner, _| {
            Object::array(vec![inner])
        });
        let printed = nested.to_string();
        assert_eq!(printed.len(), 2 * (depth + 1));
        assert!(printed.starts_with("[[[") && printed.ends_with("]]]"));
        drop(nested);

        let mut hash = HashObject::default();
        let key = Object::string("next");
        for _ in 0..depth {
            let mut outer = HashObject::default();
            outer.insert(
                key.hash_key().expect("strings are hashable"),
                key.clone(),
                Object::Hash(Rc::new(hash)),
            );
            hash = outer;
        }
        drop(Object::Hash(Rc::new(hash)));
    }

    #[test]
    fn test_number_and_bool_hash_keys() {
        assert_eq!(Object::Number(1.0).hash_key(), Object::Number(1.0).hash_key());
        assert_ne!(Object::Number(1.0).hash_key(), Object::Number(1.5).hash_key());
        assert_eq!(Object::Number(0.0).hash_key(), Object::Number(-0.0).hash_key());
        assert_ne!(Object::Bool(true).hash_key(), Object::Bool(false).hash_key());
        assert_ne!(Object::Bool(true).hash_key(), Object::Number(1.0).hash_key());
    }

    #[test]
    fn test_unhashable_values() {
        assert_eq!(Object::Null.hash_key(), None);
        assert_eq!(Object::array(vec![]).hash_key(), None);
        assert_eq!(Object::Hash(Rc::default()).hash_key(), None);
    }

    #[test]
    fn test_truthiness() {
        let cases = [
            (Object::Bool(true), true),
            (Object::Bool(false), false),
            (Object::Null, false),
            (Object::Number(0.0), false),
            (Object::Number(-0.0), false),
            (Object::Number(0.1), true),
            (Object::string(""), false),
            (Object::string("a"), true),
            (Object::array(vec![]), false),
            (Object::array(vec![Object::Null]), true),
            (Object::Hash(Rc::default()), false),
        ];
        for (object, expected) in cases {
            assert_eq!(object.is_truthy(), expected, "{object:?}");
        }
    }

    #[test]
    fn test_identity_equality() {
        let array = Object::array(vec![Object::Number(1.0)]);
        assert!(array.is_identical(&array.clone()));
        assert!(!array.is_identical(&Object::array(vec![Object::Number(1.0)])));
        assert!(Object::Null.is_identical(&Object::Null));
        assert!(!Object::Null.is_identical(&Object::Bool(false)));
    }

    #[test]
    fn test_hash_insert_replaces_duplicate_keys() {
        let mut hash = HashObject::default();
        let key = Object::string("a");
        let hash_key = key.hash_key().expect("strings are hashable");
        hash.insert(hash_key, key.clone(), Object::Number(1.0));
        hash.insert(hash_key, key, Object::Number(2.0));
        assert_eq!(hash.len(), 1);
        assert_eq!(hash.get(&hash_key).map(|p| p.value.clone()), Some(Object::Number(2.0)));
    }

    #[test]
    fn test_type_mask_display() {
        assert_eq!(ObjectType::NUMBER.to_string(), "TypeNumber");
        assert_eq!(
            (ObjectType::ARRAY | ObjectType::STRING).to_string(),
            "TypeString, TypeArray"
        );
    }

    #[test]
    fn test_display() {
        let mut hash = HashObject::default();
        let key = Object::string("k");
        hash.insert(
            key.hash_key().expect("strings are hashable"),
            key,
            Object::array(vec![Object::Number(1.0), Object::Number(2.5)]),
        );
        assert_eq!(Object::Hash(Rc::new(hash)).to_string(), "{k: [1, 2.5]}");
        assert_eq!(Object::Null.to_string(), "null");
        assert_eq!(Object::string("raw").to_string(), "raw");
    }
}
