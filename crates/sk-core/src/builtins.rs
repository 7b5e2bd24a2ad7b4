//! Host-provided globals: `Math`, `Object`, `Array`, `console`, array and
//! string methods, and module resolution for `require`.

use crate::error::SketchError;
use crate::interp::{Env, Interpreter, Job};
use crate::name::Name;
use crate::value::{NativeFn, Value};
use std::cell::RefCell;
use std::rc::Rc;

type NativeResult = Result<Value, SketchError>;

/// Supplies modules to `require("name")`.
pub trait ModuleResolver {
    fn resolve(&self, name: &str) -> Option<Value>;
}

/// The modules every sketch can require: `"utils"`.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinModules;

impl ModuleResolver for BuiltinModules {
    fn resolve(&self, name: &str) -> Option<Value> {
        match name {
            "utils" => Some(Value::record([
                ("range", Value::native("range", utils_range)),
                ("clamp", Value::native("clamp", utils_clamp)),
                ("lerp", Value::native("lerp", utils_lerp)),
                ("sum", Value::native("sum", utils_sum)),
            ])),
            _ => None,
        }
    }
}

/// Name of the module loader the `require` rewrite calls.
pub const REQUIRE_GLOBAL: &str = "__require";

pub fn install(globals: &Env) {
    let define = |name: &str, value: Value| globals.declare(Name::intern(name), value, true);

    define(
        "Math",
        Value::record([
            ("PI", Value::Number(std::f64::consts::PI)),
            ("E", Value::Number(std::f64::consts::E)),
            ("sin", Value::native("sin", math_sin)),
            ("cos", Value::native("cos", math_cos)),
            ("tan", Value::native("tan", math_tan)),
            ("asin", Value::native("asin", math_asin)),
            ("acos", Value::native("acos", math_acos)),
            ("atan", Value::native("atan", math_atan)),
            ("atan2", Value::native("atan2", math_atan2)),
            ("sqrt", Value::native("sqrt", math_sqrt)),
            ("abs", Value::native("abs", math_abs)),
            ("floor", Value::native("floor", math_floor)),
            ("ceil", Value::native("ceil", math_ceil)),
            ("round", Value::native("round", math_round)),
            ("trunc", Value::native("trunc", math_trunc)),
            ("sign", Value::native("sign", math_sign)),
            ("exp", Value::native("exp", math_exp)),
            ("log", Value::native("log", math_log)),
            ("pow", Value::native("pow", math_pow)),
            ("hypot", Value::native("hypot", math_hypot)),
            ("min", Value::native("min", math_min)),
            ("max", Value::native("max", math_max)),
            ("random", Value::native("random", math_random)),
        ]),
    );
    define(
        "Object",
        Value::record([
            ("keys", Value::native("keys", object_keys)),
            ("values", Value::native("values", object_values)),
            ("entries", Value::native("entries", object_entries)),
            ("assign", Value::native("assign", object_assign)),
        ]),
    );
    define(
        "Array",
        Value::record([
            ("from", Value::native("from", array_from)),
            ("isArray", Value::native("isArray", array_is_array)),
        ]),
    );
    define(
        "console",
        Value::record([("log", Value::native("log", console_log))]),
    );
    define("String", Value::native("String", to_string));
    define("Number", Value::native("Number", to_number));
    define(REQUIRE_GLOBAL, Value::native(REQUIRE_GLOBAL, require));
}

fn arg(args: &[Value], i: usize) -> Value {
    args.get(i).cloned().unwrap_or_default()
}

fn num(args: &[Value], i: usize) -> f64 {
    args.get(i).map_or(f64::NAN, Value::to_number)
}

fn items_of(interp: &Interpreter, this: &Value, method: &str) -> Result<Rc<RefCell<Vec<Value>>>, SketchError> {
    match this {
        Value::Array(items) => Ok(items.clone()),
        other => Err(interp.error(format!(
            "Array.prototype.{method} called on {}",
            other.type_of()
        ))),
    }
}

/// Resolve a possibly negative slice bound against `len`.
fn relative_index(value: Option<&Value>, len: usize, default: usize) -> usize {
    match value {
        None | Some(Value::Undefined) => default,
        Some(v) => {
            let n = v.to_number();
            if n.is_nan() {
                0
            } else if n < 0.0 {
                len.saturating_sub((-n) as usize)
            } else {
                (n as usize).min(len)
            }
        }
    }
}

// ─── Math ────────────────────────────────────────────────────────────────

macro_rules! math_unary {
    ($($name:ident => $f:expr),* $(,)?) => {
        $(
            fn $name(_: &mut Interpreter, _: &Value, args: &[Value]) -> NativeResult {
                let f: fn(f64) -> f64 = $f;
                Ok(Value::Number(f(num(args, 0))))
            }
        )*
    };
}

math_unary! {
    math_sin => f64::sin,
    math_cos => f64::cos,
    math_tan => f64::tan,
    math_asin => f64::asin,
    math_acos => f64::acos,
    math_atan => f64::atan,
    math_sqrt => f64::sqrt,
    math_abs => f64::abs,
    math_floor => f64::floor,
    math_ceil => f64::ceil,
    math_round => |x| (x + 0.5).floor(),
    math_trunc => f64::trunc,
    math_sign => |x| if x == 0.0 || x.is_nan() { x } else { x.signum() },
    math_exp => f64::exp,
    math_log => f64::ln,
}

fn math_atan2(_: &mut Interpreter, _: &Value, args: &[Value]) -> NativeResult {
    Ok(Value::Number(num(args, 0).atan2(num(args, 1))))
}

fn math_pow(_: &mut Interpreter, _: &Value, args: &[Value]) -> NativeResult {
    Ok(Value::Number(num(args, 0).powf(num(args, 1))))
}

fn math_hypot(_: &mut Interpreter, _: &Value, args: &[Value]) -> NativeResult {
    let sum: f64 = args.iter().map(|v| v.to_number().powi(2)).sum();
    Ok(Value::Number(sum.sqrt()))
}

fn math_min(_: &mut Interpreter, _: &Value, args: &[Value]) -> NativeResult {
    Ok(Value::Number(args.iter().map(Value::to_number).fold(
        f64::INFINITY,
        |acc, x| if acc.is_nan() || x.is_nan() { f64::NAN } else { acc.min(x) },
    )))
}

fn math_max(_: &mut Interpreter, _: &Value, args: &[Value]) -> NativeResult {
    Ok(Value::Number(args.iter().map(Value::to_number).fold(
        f64::NEG_INFINITY,
        |acc, x| if acc.is_nan() || x.is_nan() { f64::NAN } else { acc.max(x) },
    )))
}

fn math_random(interp: &mut Interpreter, _: &Value, _: &[Value]) -> NativeResult {
    Ok(Value::Number(interp.random()))
}

// ─── Object / Array / conversions ────────────────────────────────────────

fn object_keys(_: &mut Interpreter, _: &Value, args: &[Value]) -> NativeResult {
    Ok(Value::array(
        arg(args, 0).keys().into_iter().map(|k| Value::str(k.as_str())).collect(),
    ))
}

fn object_values(_: &mut Interpreter, _: &Value, args: &[Value]) -> NativeResult {
    let values: Vec<Value> = match args.first() {
        Some(Value::Object(fields)) => fields.borrow().iter().map(|(_, v)| v.clone()).collect(),
        Some(Value::Array(items)) => items.borrow().clone(),
        _ => Vec::new(),
    };
    Ok(Value::array(values))
}

fn object_entries(_: &mut Interpreter, _: &Value, args: &[Value]) -> NativeResult {
    let entries: Vec<Value> = match args.first() {
        Some(Value::Object(fields)) => fields
            .borrow()
            .iter()
            .map(|(k, v)| Value::array(vec![Value::str(k.as_str()), v.clone()]))
            .collect(),
        _ => Vec::new(),
    };
    Ok(Value::array(entries))
}

fn object_assign(interp: &mut Interpreter, _: &Value, args: &[Value]) -> NativeResult {
    let target = arg(args, 0);
    if !matches!(target, Value::Object(_)) {
        return Err(interp.error("Object.assign target must be an object"));
    }
    for source in args.iter().skip(1) {
        if let Value::Object(fields) = source {
            for (k, v) in fields.borrow().iter() {
                target.set(*k, v.clone());
            }
        }
    }
    Ok(target)
}

fn array_from(interp: &mut Interpreter, _: &Value, args: &[Value]) -> NativeResult {
    let source = arg(args, 0);
    let items: Vec<Value> = match &source {
        Value::Array(items) => items.borrow().clone(),
        Value::Str(s) => s.chars().map(|c| Value::str(c.to_string())).collect(),
        Value::Object(_) => {
            let len = source.get("length").map_or(0.0, |v| v.to_number());
            let len = if len.is_finite() && len > 0.0 { len as u64 } else { 0 };
            interp.charge_steps(len)?;
            vec![Value::Undefined; len as usize]
        }
        _ => Vec::new(),
    };
    let Some(map) = args.get(1).filter(|f| f.is_callable()) else {
        return Ok(Value::array(items));
    };
    let mut out = Vec::with_capacity(items.len());
    for (i, item) in items.into_iter().enumerate() {
        out.push(interp.call(map, Value::Undefined, &[item, Value::Number(i as f64)])?);
    }
    Ok(Value::array(out))
}

fn array_is_array(_: &mut Interpreter, _: &Value, args: &[Value]) -> NativeResult {
    Ok(Value::Bool(matches!(arg(args, 0), Value::Array(_))))
}

fn to_string(_: &mut Interpreter, _: &Value, args: &[Value]) -> NativeResult {
    Ok(Value::str(args.first().map_or(String::new(), |v| v.to_string())))
}

fn to_number(_: &mut Interpreter, _: &Value, args: &[Value]) -> NativeResult {
    Ok(Value::Number(args.first().map_or(0.0, Value::to_number)))
}

fn console_log(_: &mut Interpreter, _: &Value, args: &[Value]) -> NativeResult {
    let line = args
        .iter()
        .map(|v| match v {
            Value::Str(s) => s.to_string(),
            other => format!("{other:?}"),
        })
        .collect::<Vec<_>>()
        .join(" ");
    log::info!(target: "sketch", "{line}");
    Ok(Value::Undefined)
}

// ─── Modules ─────────────────────────────────────────────────────────────

/// `__require(name)`: a thenable whose callback runs after the program.
fn require(interp: &mut Interpreter, _: &Value, args: &[Value]) -> NativeResult {
    let name = arg(args, 0).to_string();
    let resolved = interp.resolver().resolve(&name);
    let then: NativeFn = match resolved {
        Some(_) => then_resolved,
        None => {
            interp.warn(format!("cannot resolve module \"{name}\""));
            then_failed
        }
    };
    Ok(Value::record([(
        "then",
        Value::bound("then", then, resolved.unwrap_or(Value::Null)),
    )]))
}

fn then_resolved(interp: &mut Interpreter, module: &Value, args: &[Value]) -> NativeResult {
    let callback = arg(args, 0);
    if !callback.is_callable() {
        return Err(interp.error("then() expects a callback"));
    }
    interp.enqueue(Job {
        callback,
        arg: module.clone(),
    });
    Ok(Value::Undefined)
}

fn then_failed(_: &mut Interpreter, _: &Value, _: &[Value]) -> NativeResult {
    Ok(Value::Undefined)
}

fn utils_range(interp: &mut Interpreter, _: &Value, args: &[Value]) -> NativeResult {
    let (start, end) = match args.len() {
        0 | 1 => (0.0, num(args, 0)),
        _ => (num(args, 0), num(args, 1)),
    };
    let step = args.get(2).map_or(1.0, Value::to_number);
    if !(start.is_finite() && end.is_finite()) || step == 0.0 || step.is_nan() {
        return Ok(Value::array(Vec::new()));
    }
    let count = ((end - start) / step).ceil();
    let count = if count > 0.0 { count as u64 } else { 0 };
    interp.charge_steps(count)?;
    let out = (0..count)
        .map(|i| Value::Number(start + step * i as f64))
        .collect();
    Ok(Value::array(out))
}

fn utils_clamp(_: &mut Interpreter, _: &Value, args: &[Value]) -> NativeResult {
    let (x, lo, hi) = (num(args, 0), num(args, 1), num(args, 2));
    Ok(Value::Number(x.max(lo).min(hi)))
}

fn utils_lerp(_: &mut Interpreter, _: &Value, args: &[Value]) -> NativeResult {
    let (a, b, t) = (num(args, 0), num(args, 1), num(args, 2));
    Ok(Value::Number(a + (b - a) * t))
}

fn utils_sum(_: &mut Interpreter, _: &Value, args: &[Value]) -> NativeResult {
    let total = arg(args, 0)
        .as_array()
        .unwrap_or_default()
        .iter()
        .map(Value::to_number)
        .sum();
    Ok(Value::Number(total))
}

// ─── Array methods ───────────────────────────────────────────────────────

/// Method of the array prototype, looked up by name.
pub fn array_method(name: &str) -> Option<(&'static str, NativeFn)> {
    let entry: (&'static str, NativeFn) = match name {
        "push" => ("push", array_push),
        "pop" => ("pop", array_pop),
        "shift" => ("shift", array_shift),
        "unshift" => ("unshift", array_unshift),
        "map" => ("map", array_map),
        "filter" => ("filter", array_filter),
        "forEach" => ("forEach", array_for_each),
        "reduce" => ("reduce", array_reduce),
        "slice" => ("slice", array_slice),
        "concat" => ("concat", array_concat),
        "indexOf" => ("indexOf", array_index_of),
        "includes" => ("includes", array_includes),
        "join" => ("join", array_join),
        "find" => ("find", array_find),
        "findIndex" => ("findIndex", array_find_index),
        "some" => ("some", array_some),
        "every" => ("every", array_every),
        "reverse" => ("reverse", array_reverse),
        _ => return None,
    };
    Some(entry)
}

fn array_push(interp: &mut Interpreter, this: &Value, args: &[Value]) -> NativeResult {
    let items = items_of(interp, this, "push")?;
    let mut items = items.borrow_mut();
    items.extend(args.iter().cloned());
    Ok(Value::Number(items.len() as f64))
}

fn array_pop(interp: &mut Interpreter, this: &Value, _: &[Value]) -> NativeResult {
    let items = items_of(interp, this, "pop")?;
    let popped = items.borrow_mut().pop();
    Ok(popped.unwrap_or_default())
}

fn array_shift(interp: &mut Interpreter, this: &Value, _: &[Value]) -> NativeResult {
    let items = items_of(interp, this, "shift")?;
    let mut items = items.borrow_mut();
    if items.is_empty() {
        return Ok(Value::Undefined);
    }
    Ok(items.remove(0))
}

fn array_unshift(interp: &mut Interpreter, this: &Value, args: &[Value]) -> NativeResult {
    let items = items_of(interp, this, "unshift")?;
    let mut items = items.borrow_mut();
    items.splice(0..0, args.iter().cloned());
    Ok(Value::Number(items.len() as f64))
}

/// Run `callback(item, index, array)` over a snapshot of the array.
fn each<F>(interp: &mut Interpreter, this: &Value, args: &[Value], method: &str, mut f: F) -> Result<(), SketchError>
where
    F: FnMut(usize, Value, Value) -> bool,
{
    let items = items_of(interp, this, method)?;
    let callback = arg(args, 0);
    if !callback.is_callable() {
        return Err(interp.error(format!("{method} expects a function")));
    }
    let snapshot = items.borrow().clone();
    for (i, item) in snapshot.into_iter().enumerate() {
        let result = interp.call(
            &callback,
            Value::Undefined,
            &[item.clone(), Value::Number(i as f64), this.clone()],
        )?;
        if !f(i, item, result) {
            break;
        }
    }
    Ok(())
}

fn array_map(interp: &mut Interpreter, this: &Value, args: &[Value]) -> NativeResult {
    let mut out = Vec::new();
    each(interp, this, args, "map", |_, _, r| {
        out.push(r);
        true
    })?;
    Ok(Value::array(out))
}

fn array_filter(interp: &mut Interpreter, this: &Value, args: &[Value]) -> NativeResult {
    let mut out = Vec::new();
    each(interp, this, args, "filter", |_, item, r| {
        if r.is_truthy() {
            out.push(item);
        }
        true
    })?;
    Ok(Value::array(out))
}

fn array_for_each(interp: &mut Interpreter, this: &Value, args: &[Value]) -> NativeResult {
    each(interp, this, args, "forEach", |_, _, _| true)?;
    Ok(Value::Undefined)
}

fn array_find(interp: &mut Interpreter, this: &Value, args: &[Value]) -> NativeResult {
    let mut found = Value::Undefined;
    each(interp, this, args, "find", |_, item, r| {
        if r.is_truthy() {
            found = item;
            return false;
        }
        true
    })?;
    Ok(found)
}

fn array_find_index(interp: &mut Interpreter, this: &Value, args: &[Value]) -> NativeResult {
    let mut found = -1.0;
    each(interp, this, args, "findIndex", |i, _, r| {
        if r.is_truthy() {
            found = i as f64;
            return false;
        }
        true
    })?;
    Ok(Value::Number(found))
}

fn array_some(interp: &mut Interpreter, this: &Value, args: &[Value]) -> NativeResult {
    let mut any = false;
    each(interp, this, args, "some", |_, _, r| {
        any = r.is_truthy();
        !any
    })?;
    Ok(Value::Bool(any))
}

fn array_every(interp: &mut Interpreter, this: &Value, args: &[Value]) -> NativeResult {
    let mut all = true;
    each(interp, this, args, "every", |_, _, r| {
        all = r.is_truthy();
        all
    })?;
    Ok(Value::Bool(all))
}

fn array_reduce(interp: &mut Interpreter, this: &Value, args: &[Value]) -> NativeResult {
    let items = items_of(interp, this, "reduce")?;
    let callback = arg(args, 0);
    if !callback.is_callable() {
        return Err(interp.error("reduce expects a function"));
    }
    let snapshot = items.borrow().clone();
    let mut iter = snapshot.into_iter().enumerate();
    let mut acc = match args.get(1) {
        Some(init) => init.clone(),
        None => match iter.next() {
            Some((_, first)) => first,
            None => return Err(interp.error("reduce of empty array with no initial value")),
        },
    };
    for (i, item) in iter {
        acc = interp.call(
            &callback,
            Value::Undefined,
            &[acc, item, Value::Number(i as f64), this.clone()],
        )?;
    }
    Ok(acc)
}

fn array_slice(interp: &mut Interpreter, this: &Value, args: &[Value]) -> NativeResult {
    let items = items_of(interp, this, "slice")?;
    let items = items.borrow();
    let len = items.len();
    let start = relative_index(args.first(), len, 0);
    let end = relative_index(args.get(1), len, len);
    Ok(Value::array(if start < end {
        items[start..end].to_vec()
    } else {
        Vec::new()
    }))
}

fn array_concat(interp: &mut Interpreter, this: &Value, args: &[Value]) -> NativeResult {
    let items = items_of(interp, this, "concat")?;
    let mut out = items.borrow().clone();
    for extra in args {
        match extra {
            Value::Array(more) => out.extend(more.borrow().iter().cloned()),
            other => out.push(other.clone()),
        }
    }
    Ok(Value::array(out))
}

fn array_index_of(interp: &mut Interpreter, this: &Value, args: &[Value]) -> NativeResult {
    let items = items_of(interp, this, "indexOf")?;
    let needle = arg(args, 0);
    let index = items.borrow().iter().position(|v| v.strict_eq(&needle));
    Ok(Value::Number(index.map_or(-1.0, |i| i as f64)))
}

fn array_includes(interp: &mut Interpreter, this: &Value, args: &[Value]) -> NativeResult {
    let items = items_of(interp, this, "includes")?;
    let needle = arg(args, 0);
    let is_nan = |v: &Value| v.as_number().is_some_and(f64::is_nan);
    let found = items
        .borrow()
        .iter()
        .any(|v| v.strict_eq(&needle) || (is_nan(v) && is_nan(&needle)));
    Ok(Value::Bool(found))
}

fn array_join(interp: &mut Interpreter, this: &Value, args: &[Value]) -> NativeResult {
    let items = items_of(interp, this, "join")?;
    let separator = match args.first() {
        None | Some(Value::Undefined) => ",".to_string(),
        Some(v) => v.to_string(),
    };
    let joined = items
        .borrow()
        .iter()
        .map(|v| if v.is_nullish() { String::new() } else { v.to_string() })
        .collect::<Vec<_>>()
        .join(&separator);
    Ok(Value::str(joined))
}

fn array_reverse(interp: &mut Interpreter, this: &Value, _: &[Value]) -> NativeResult {
    let items = items_of(interp, this, "reverse")?;
    items.borrow_mut().reverse();
    Ok(this.clone())
}

// ─── String and number methods ───────────────────────────────────────────

pub fn string_method(name: &str) -> Option<(&'static str, NativeFn)> {
    let entry: (&'static str, NativeFn) = match name {
        "toUpperCase" => ("toUpperCase", string_upper),
        "toLowerCase" => ("toLowerCase", string_lower),
        "trim" => ("trim", string_trim),
        "split" => ("split", string_split),
        "includes" => ("includes", string_includes),
        "slice" => ("slice", string_slice),
        _ => return None,
    };
    Some(entry)
}

fn string_upper(_: &mut Interpreter, this: &Value, _: &[Value]) -> NativeResult {
    Ok(Value::str(this.to_string().to_uppercase()))
}

fn string_lower(_: &mut Interpreter, this: &Value, _: &[Value]) -> NativeResult {
    Ok(Value::str(this.to_string().to_lowercase()))
}

fn string_trim(_: &mut Interpreter, this: &Value, _: &[Value]) -> NativeResult {
    Ok(Value::str(this.to_string().trim()))
}

fn string_split(_: &mut Interpreter, this: &Value, args: &[Value]) -> NativeResult {
    let s = this.to_string();
    let parts: Vec<Value> = match args.first() {
        None | Some(Value::Undefined) => vec![Value::str(&s)],
        Some(sep) => {
            let sep = sep.to_string();
            if sep.is_empty() {
                s.chars().map(|c| Value::str(c.to_string())).collect()
            } else {
                s.split(sep.as_str()).map(Value::str).collect()
            }
        }
    };
    Ok(Value::array(parts))
}

fn string_includes(_: &mut Interpreter, this: &Value, args: &[Value]) -> NativeResult {
    Ok(Value::Bool(this.to_string().contains(&arg(args, 0).to_string())))
}

fn string_slice(_: &mut Interpreter, this: &Value, args: &[Value]) -> NativeResult {
    let chars: Vec<char> = this.to_string().chars().collect();
    let start = relative_index(args.first(), chars.len(), 0);
    let end = relative_index(args.get(1), chars.len(), chars.len());
    Ok(Value::str(if start < end {
        chars[start..end].iter().collect::<String>()
    } else {
        String::new()
    }))
}

pub fn number_method(name: &str) -> Option<(&'static str, NativeFn)> {
    match name {
        "toFixed" => Some(("toFixed", number_to_fixed)),
        _ => None,
    }
}

fn number_to_fixed(interp: &mut Interpreter, this: &Value, args: &[Value]) -> NativeResult {
    let digits = args.first().map_or(0.0, Value::to_number);
    if !(0.0..=100.0).contains(&digits) {
        return Err(interp.error("toFixed() digits argument must be between 0 and 100"));
    }
    Ok(Value::str(format!("{:.*}", digits as usize, this.to_number())))
}
