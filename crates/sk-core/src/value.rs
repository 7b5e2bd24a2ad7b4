//! Runtime values of the sketch language.
//!
//! Arrays and objects have reference semantics (`Rc<RefCell<..>>`), so user
//! code may mutate a state record in place. History isolation comes from
//! [`Value::deep_clone`], not from the value model.

use crate::ast::Function;
use crate::emitter::format_number;
use crate::error::SketchError;
use crate::interp::{Env, Interpreter};
use crate::name::Name;
use smallvec::SmallVec;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// Object fields in insertion order.
pub type Fields = SmallVec<[(Name, Value); 4]>;

/// Host function: `(interpreter, this, args)`.
pub type NativeFn = fn(&mut Interpreter, &Value, &[Value]) -> Result<Value, SketchError>;

#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    Str(Rc<str>),
    Array(Rc<RefCell<Vec<Value>>>),
    Object(Rc<RefCell<Fields>>),
    Closure(Rc<Closure>),
    Native(Rc<Native>),
}

/// A user function together with the scope it was created in.
pub struct Closure {
    pub func: Rc<Function>,
    pub env: Env,
}

/// A host function, optionally bound to a receiver (`xs.map`).
pub struct Native {
    pub name: &'static str,
    pub func: NativeFn,
    pub this: Value,
}

// ─── Construction ────────────────────────────────────────────────────────

impl Value {
    pub fn str(s: impl AsRef<str>) -> Self {
        Value::Str(Rc::from(s.as_ref()))
    }

    pub fn array(items: Vec<Value>) -> Self {
        Value::Array(Rc::new(RefCell::new(items)))
    }

    pub fn object<I>(fields: I) -> Self
    where
        I: IntoIterator<Item = (Name, Value)>,
    {
        Value::Object(Rc::new(RefCell::new(fields.into_iter().collect())))
    }

    /// Object literal from string keys, for host-built records.
    pub fn record<'k, I>(fields: I) -> Self
    where
        I: IntoIterator<Item = (&'k str, Value)>,
    {
        Self::object(fields.into_iter().map(|(k, v)| (Name::intern(k), v)))
    }

    pub fn native(name: &'static str, func: NativeFn) -> Self {
        Self::bound(name, func, Value::Undefined)
    }

    pub fn bound(name: &'static str, func: NativeFn, this: Value) -> Self {
        Value::Native(Rc::new(Native { name, func, this }))
    }

    pub fn numbers(values: &[f64]) -> Self {
        Self::array(values.iter().copied().map(Value::Number).collect())
    }
}

// ─── Inspection ──────────────────────────────────────────────────────────

impl Value {
    pub fn type_of(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null | Value::Array(_) | Value::Object(_) => "object",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::Str(_) => "string",
            Value::Closure(_) | Value::Native(_) => "function",
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::Str(s) => !s.is_empty(),
            _ => true,
        }
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, Value::Closure(_) | Value::Native(_))
    }

    pub fn to_number(&self) -> f64 {
        match self {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Bool(b) => f64::from(u8::from(*b)),
            Value::Number(n) => *n,
            Value::Str(s) => {
                let t = s.trim();
                if t.is_empty() {
                    0.0
                } else {
                    t.parse().unwrap_or(f64::NAN)
                }
            }
            Value::Array(items) => {
                let items = items.borrow();
                match items.as_slice() {
                    [] => 0.0,
                    [single] => single.to_number(),
                    _ => f64::NAN,
                }
            }
            _ => f64::NAN,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Snapshot of an array's elements.
    pub fn as_array(&self) -> Option<Vec<Value>> {
        match self {
            Value::Array(items) => Some(items.borrow().clone()),
            _ => None,
        }
    }

    /// `[x, y]` with two finite numbers.
    pub fn as_point(&self) -> Option<(f64, f64)> {
        let Value::Array(items) = self else {
            return None;
        };
        let items = items.borrow();
        match items.as_slice() {
            [Value::Number(x), Value::Number(y), ..] if x.is_finite() && y.is_finite() => {
                Some((*x, *y))
            }
            _ => None,
        }
    }

    /// Own field of an object, if present.
    pub fn get(&self, key: &str) -> Option<Value> {
        let Value::Object(fields) = self else {
            return None;
        };
        let key = Name::intern(key);
        fields
            .borrow()
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.clone())
    }

    /// Set (or append) an object field. No-op on non-objects.
    pub fn set(&self, key: Name, value: Value) {
        if let Value::Object(fields) = self {
            let mut fields = fields.borrow_mut();
            match fields.iter_mut().find(|(k, _)| *k == key) {
                Some(slot) => slot.1 = value,
                None => fields.push((key, value)),
            }
        }
    }

    /// Field names of an object in insertion order.
    pub fn keys(&self) -> Vec<Name> {
        match self {
            Value::Object(fields) => fields.borrow().iter().map(|(k, _)| *k).collect(),
            _ => Vec::new(),
        }
    }

    pub fn strict_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            (Value::Closure(a), Value::Closure(b)) => Rc::ptr_eq(a, b),
            (Value::Native(a), Value::Native(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    pub fn loose_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (a, b) if a.is_nullish() && b.is_nullish() => true,
            (a, b) if a.is_nullish() || b.is_nullish() => false,
            (Value::Number(_), Value::Str(_) | Value::Bool(_))
            | (Value::Str(_) | Value::Bool(_), Value::Number(_))
            | (Value::Bool(_), Value::Str(_))
            | (Value::Str(_), Value::Bool(_)) => self.to_number() == other.to_number(),
            _ => self.strict_eq(other),
        }
    }
}

// ─── Copying and conversion ──────────────────────────────────────────────

impl Value {
    /// Structural copy of arrays and objects. Functions are shared. Shared
    /// and cyclic references are preserved within the copy.
    pub fn deep_clone(&self) -> Value {
        let mut seen = HashMap::new();
        self.deep_clone_with(&mut seen)
    }

    fn deep_clone_with(&self, seen: &mut HashMap<usize, Value>) -> Value {
        match self {
            Value::Array(items) => {
                let key = Rc::as_ptr(items) as usize;
                if let Some(copy) = seen.get(&key) {
                    return copy.clone();
                }
                let copy = Rc::new(RefCell::new(Vec::new()));
                seen.insert(key, Value::Array(copy.clone()));
                let cloned: Vec<Value> = items
                    .borrow()
                    .iter()
                    .map(|v| v.deep_clone_with(seen))
                    .collect();
                *copy.borrow_mut() = cloned;
                Value::Array(copy)
            }
            Value::Object(fields) => {
                let key = Rc::as_ptr(fields) as usize;
                if let Some(copy) = seen.get(&key) {
                    return copy.clone();
                }
                let copy = Rc::new(RefCell::new(Fields::new()));
                seen.insert(key, Value::Object(copy.clone()));
                let cloned: Fields = fields
                    .borrow()
                    .iter()
                    .map(|(k, v)| (*k, v.deep_clone_with(seen)))
                    .collect();
                *copy.borrow_mut() = cloned;
                Value::Object(copy)
            }
            other => other.clone(),
        }
    }

    /// JSON view for state panels and CLI output. Functions become `null`,
    /// non-finite numbers become `null`, and nesting is cut off at a fixed
    /// depth.
    pub fn to_json(&self) -> serde_json::Value {
        self.to_json_at(0)
    }

    fn to_json_at(&self, depth: usize) -> serde_json::Value {
        use serde_json::Value as Json;
        if depth > 64 {
            return Json::Null;
        }
        match self {
            Value::Undefined | Value::Null | Value::Closure(_) | Value::Native(_) => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Number(n) => serde_json::Number::from_f64(*n).map_or(Json::Null, Json::Number),
            Value::Str(s) => Json::String(s.to_string()),
            Value::Array(items) => Json::Array(
                items
                    .borrow()
                    .iter()
                    .map(|v| v.to_json_at(depth + 1))
                    .collect(),
            ),
            Value::Object(fields) => Json::Object(
                fields
                    .borrow()
                    .iter()
                    .map(|(k, v)| (k.as_str().to_string(), v.to_json_at(depth + 1)))
                    .collect(),
            ),
        }
    }

    /// Build a value from JSON (host-supplied events and fixtures).
    pub fn from_json(json: &serde_json::Value) -> Value {
        use serde_json::Value as Json;
        match json {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Bool(*b),
            Json::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            Json::String(s) => Value::str(s),
            Json::Array(items) => Value::array(items.iter().map(Value::from_json).collect()),
            Json::Object(map) => {
                Value::object(map.iter().map(|(k, v)| (Name::intern(k), Value::from_json(v))))
            }
        }
    }
}

// ─── Display ─────────────────────────────────────────────────────────────

impl fmt::Display for Value {
    /// String conversion as `String(value)` performs it.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => f.write_str("undefined"),
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => f.write_str(&format_number(*n)),
            Value::Str(s) => f.write_str(s),
            Value::Array(items) => {
                for (i, item) in items.borrow().iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    if !item.is_nullish() {
                        write!(f, "{item}")?;
                    }
                }
                Ok(())
            }
            Value::Object(_) => f.write_str("[object Object]"),
            Value::Closure(c) => match c.func.name {
                Some(name) => write!(f, "function {name}() {{ ... }}"),
                None => f.write_str("function () { ... }"),
            },
            Value::Native(n) => write!(f, "function {}() {{ [native code] }}", n.name),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => write!(f, "{s:?}"),
            Value::Closure(_) | Value::Native(_) => write!(f, "{self}"),
            Value::Undefined => f.write_str("undefined"),
            other => write!(f, "{}", other.to_json()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn deep_clone_isolates_nested_arrays() {
        let inner = Value::numbers(&[1.0, 2.0]);
        let original = Value::record([("pos", inner.clone()), ("c", Value::Number(0.0))]);
        let copy = original.deep_clone();

        if let Value::Array(items) = &inner {
            items.borrow_mut()[0] = Value::Number(99.0);
        }
        assert_eq!(copy.get("pos").and_then(|p| p.as_point()), Some((1.0, 2.0)));
        assert_eq!(original.get("pos").and_then(|p| p.as_point()), Some((99.0, 2.0)));
    }

    #[test]
    fn deep_clone_preserves_cycles() {
        let obj = Value::record([("n", Value::Number(1.0))]);
        obj.set(Name::intern("me"), obj.clone());
        let copy = obj.deep_clone();
        let me = copy.get("me").unwrap();
        assert!(me.strict_eq(&copy));
        assert!(!me.strict_eq(&obj));
    }

    #[test]
    fn truthiness_and_coercion() {
        assert!(!Value::Number(0.0).is_truthy());
        assert!(!Value::str("").is_truthy());
        assert!(Value::array(vec![]).is_truthy());
        assert_eq!(Value::str(" 42 ").to_number(), 42.0);
        assert!(Value::Undefined.to_number().is_nan());
        assert!(Value::Null.loose_eq(&Value::Undefined));
        assert!(Value::str("1").loose_eq(&Value::Number(1.0)));
        assert!(!Value::str("1").strict_eq(&Value::Number(1.0)));
    }

    #[test]
    fn display_follows_string_conversion() {
        let v = Value::array(vec![Value::Number(1.0), Value::Null, Value::str("a")]);
        assert_eq!(v.to_string(), "1,,a");
        assert_eq!(Value::Number(0.5).to_string(), "0.5");
        assert_eq!(Value::record([]).to_string(), "[object Object]");
    }

    #[test]
    fn json_roundtrip_of_plain_data() {
        let json = serde_json::json!({ "pos": [1.5, 2.5], "label": "a", "on": true });
        let value = Value::from_json(&json);
        assert_eq!(value.to_json(), json);
    }
}
