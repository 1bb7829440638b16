//! Runtime value model shared by the tree-walking macro evaluator and the
//! bytecode VM.
//!
//! `Value` is a single closed sum type (no open `Box<dyn Object>` hierarchy)
//! so hot dispatch in the VM stays a flat `match` instead of a v-table call.
//! Cloning is O(1) for every variant that can get large (`Array`, `Hash`,
//! function bodies) because they're stored behind `Rc`; the language has no
//! mutation of captured variables, so shared ownership never needs interior
//! mutability.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use crate::ast::Node;
use crate::code::{Closure, CompiledFunction};

/// A native function exposed to user code (`len`, `puts`, ...).
pub type BuiltinFn = fn(&[Value]) -> Value;

/// Lexical environment for the tree-walking evaluator used by the macro
/// engine (and, optionally, the REPL's `--macros` mode). Chains to an outer
/// scope rather than mutating it, matching the language's lack of an
/// upward-funarg mutation primitive.
#[derive(Debug, Clone)]
pub struct Environment {
    store: Rc<RefCell<HashMap<String, Value>>>,
    outer: Option<Box<Environment>>,
}

impl Environment {
    pub fn new() -> Self {
        Environment {
            store: Rc::new(RefCell::new(HashMap::new())),
            outer: None,
        }
    }

    pub fn enclosed(outer: &Environment) -> Self {
        Environment {
            store: Rc::new(RefCell::new(HashMap::new())),
            outer: Some(Box::new(outer.clone())),
        }
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        if let Some(v) = self.store.borrow().get(name) {
            return Some(v.clone());
        }
        self.outer.as_ref().and_then(|o| o.get(name))
    }

    pub fn set(&self, name: impl Into<String>, value: Value) {
        self.store.borrow_mut().insert(name.into(), value);
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for Environment {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.store, &other.store)
    }
}

#[derive(Debug, Clone)]
pub enum Value {
    Integer(i64),
    Boolean(bool),
    String(Rc<str>),
    Null,
    Array(Rc<Vec<Value>>),
    Hash(Rc<HashMap<HashKey, HashPair>>),
    /// Internal sentinel used while unwinding a block to the enclosing
    /// function call; never observed as a final result.
    ReturnValue(Box<Value>),
    Error(String),
    Function {
        parameters: Rc<Vec<String>>,
        body: Rc<Node>,
        env: Environment,
    },
    Quote(Rc<Node>),
    Macro {
        parameters: Rc<Vec<String>>,
        body: Rc<Node>,
        env: Environment,
    },
    CompiledFunction(Rc<CompiledFunction>),
    Closure(Rc<Closure>),
    Builtin(BuiltinFn),
}

#[derive(Debug, Clone, PartialEq)]
pub struct HashPair {
    pub key: Value,
    pub value: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum HashKeyTag {
    Integer,
    Boolean,
    String,
}

/// `(type-tag, 64-bit fingerprint)` — the only three hashable value kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HashKey {
    tag: HashKeyTag,
    fingerprint: u64,
}

/// Error returned when a `Value` cannot be used as a hash key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnhashableError(pub &'static str);

impl fmt::Display for UnhashableError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unusable as hash key: {}", self.0)
    }
}

impl std::error::Error for UnhashableError {}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Integer(_) => "INTEGER",
            Value::Boolean(_) => "BOOLEAN",
            Value::String(_) => "STRING",
            Value::Null => "NULL",
            Value::Array(_) => "ARRAY",
            Value::Hash(_) => "HASH",
            Value::ReturnValue(_) => "RETURN_VALUE",
            Value::Error(_) => "ERROR",
            Value::Function { .. } => "FUNCTION",
            Value::Quote(_) => "QUOTE",
            Value::Macro { .. } => "MACRO",
            Value::CompiledFunction(_) => "COMPILED_FUNCTION_OBJ",
            Value::Closure(_) => "CLOSURE",
            Value::Builtin(_) => "BUILTIN",
        }
    }

    /// `False` and `Null` are falsy; everything else (including integer `0`
    /// and empty collections) is truthy.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Boolean(false) | Value::Null)
    }

    pub fn hash_key(&self) -> Result<HashKey, UnhashableError> {
        match self {
            Value::Integer(i) => Ok(HashKey {
                tag: HashKeyTag::Integer,
                fingerprint: *i as u64,
            }),
            Value::Boolean(b) => Ok(HashKey {
                tag: HashKeyTag::Boolean,
                fingerprint: if *b { 1 } else { 0 },
            }),
            Value::String(s) => {
                let mut hasher = std::collections::hash_map::DefaultHasher::new();
                s.as_bytes().hash(&mut hasher);
                Ok(HashKey {
                    tag: HashKeyTag::String,
                    fingerprint: hasher.finish(),
                })
            }
            other => Err(UnhashableError(other.type_name())),
        }
    }

    pub fn inspect(&self) -> String {
        match self {
            Value::Integer(i) => i.to_string(),
            Value::Boolean(b) => b.to_string(),
            Value::String(s) => s.to_string(),
            Value::Null => "null".to_string(),
            Value::Array(elems) => {
                let parts: Vec<String> = elems.iter().map(Value::inspect).collect();
                format!("[{}]", parts.join(", "))
            }
            Value::Hash(pairs) => {
                let parts: Vec<String> = pairs
                    .values()
                    .map(|p| format!("{}: {}", p.key.inspect(), p.value.inspect()))
                    .collect();
                format!("{{{}}}", parts.join(", "))
            }
            Value::ReturnValue(v) => v.inspect(),
            Value::Error(msg) => format!("ERROR: {}", msg),
            Value::Function { parameters, .. } => {
                format!("fn({}) {{ ... }}", parameters.join(", "))
            }
            Value::Quote(node) => format!("QUOTE({:?})", node),
            Value::Macro { parameters, .. } => {
                format!("macro({}) {{ ... }}", parameters.join(", "))
            }
            Value::CompiledFunction(_) => "CompiledFunction[...]".to_string(),
            Value::Closure(_) => "Closure[...]".to_string(),
            Value::Builtin(_) => "builtin function".to_string(),
        }
    }
}

/// Partial equality for values that have a well-defined notion of equality
/// (integers, booleans, strings, arrays, hashes, and the `Null` singleton).
/// Function-like variants are never structurally equal to one another, only
/// usable via identity elsewhere (matching the language's lack of value
/// equality for closures).
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Null, Value::Null) => true,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Hash(a), Value::Hash(b)) => a == b,
            (Value::Error(a), Value::Error(b)) => a == b,
            (Value::ReturnValue(a), Value::ReturnValue(b)) => a == b,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_key_integers_use_own_value() {
        let key = Value::Integer(42).hash_key().unwrap();
        assert_eq!(key, Value::Integer(42).hash_key().unwrap());
        assert_ne!(key, Value::Integer(43).hash_key().unwrap());
    }

    #[test]
    fn hash_key_strings_are_deterministic() {
        let a = Value::String(Rc::from("hello")).hash_key().unwrap();
        let b = Value::String(Rc::from("hello")).hash_key().unwrap();
        let c = Value::String(Rc::from("world")).hash_key().unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn only_three_types_are_hashable() {
        assert!(Value::Array(Rc::new(vec![])).hash_key().is_err());
        assert!(Value::Null.hash_key().is_err());
    }

    #[test]
    fn truthiness_matches_spec() {
        assert!(!Value::Boolean(false).is_truthy());
        assert!(!Value::Null.is_truthy());
        assert!(Value::Integer(0).is_truthy());
        assert!(Value::Array(Rc::new(vec![])).is_truthy());
        assert!(Value::Boolean(true).is_truthy());
    }
}
