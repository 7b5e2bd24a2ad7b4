//! Tree-walking interpreter for the sketch language.
//!
//! Lexical scopes are `Rc` chains so closures can outlive the call that
//! created them. Execution is bounded by a step budget and a call-depth cap
//! so a runaway `update` or `draw` surfaces as an evaluation error instead
//! of hanging the frame loop.

use crate::ast::*;
use crate::builtins::{self, ModuleResolver};
use crate::error::{SketchError, Span};
use crate::name::Name;
use crate::value::{Closure, Value};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

/// Statements executed per host call before giving up.
pub const STEP_LIMIT: u64 = 5_000_000;

/// Nested user-function calls before giving up.
pub const MAX_CALL_DEPTH: usize = 64;

pub type Env = Rc<Scope>;

struct Binding {
    value: Value,
    constant: bool,
}

/// One lexical scope.
#[derive(Default)]
pub struct Scope {
    vars: RefCell<HashMap<Name, Binding>>,
    parent: Option<Env>,
}

enum AssignError {
    Undefined,
    Constant,
}

impl Scope {
    pub fn root() -> Env {
        Rc::new(Scope::default())
    }

    pub fn child(parent: &Env) -> Env {
        Rc::new(Scope {
            vars: RefCell::default(),
            parent: Some(parent.clone()),
        })
    }

    pub fn declare(&self, name: Name, value: Value, constant: bool) {
        self.vars
            .borrow_mut()
            .insert(name, Binding { value, constant });
    }

    pub fn lookup(&self, name: Name) -> Option<Value> {
        if let Some(binding) = self.vars.borrow().get(&name) {
            return Some(binding.value.clone());
        }
        self.parent.as_ref().and_then(|p| p.lookup(name))
    }

    fn has_own(&self, name: Name) -> bool {
        self.vars.borrow().contains_key(&name)
    }

    fn assign(&self, name: Name, value: Value) -> Result<(), AssignError> {
        if let Some(binding) = self.vars.borrow_mut().get_mut(&name) {
            if binding.constant {
                return Err(AssignError::Constant);
            }
            binding.value = value;
            return Ok(());
        }
        match &self.parent {
            Some(parent) => parent.assign(name, value),
            None => Err(AssignError::Undefined),
        }
    }
}

enum Flow {
    Normal,
    Return(Value),
    Break,
    Continue,
}

/// A deferred callback, run after the main program (module resolution).
pub struct Job {
    pub callback: Value,
    pub arg: Value,
}

pub struct Interpreter {
    globals: Env,
    rng: StdRng,
    steps: u64,
    depth: usize,
    span: Span,
    jobs: VecDeque<Job>,
    registered: Vec<(Value, Span)>,
    warnings: Vec<String>,
    resolver: Rc<dyn ModuleResolver>,
}

// ─── Host interface ──────────────────────────────────────────────────────

impl Interpreter {
    pub fn new(seed: u64, resolver: Rc<dyn ModuleResolver>) -> Self {
        let globals = Scope::root();
        builtins::install(&globals);
        Self {
            globals,
            rng: StdRng::seed_from_u64(seed),
            steps: 0,
            depth: 0,
            span: Span::default(),
            jobs: VecDeque::new(),
            registered: Vec::new(),
            warnings: Vec::new(),
            resolver,
        }
    }

    pub fn define_global(&mut self, name: &str, value: Value) {
        self.globals.declare(Name::intern(name), value, true);
    }

    pub fn global(&self, name: &str) -> Option<Value> {
        self.globals.lookup(Name::intern(name))
    }

    /// Execute a program, then every callback it queued.
    pub fn run(&mut self, program: &Program) -> Result<(), SketchError> {
        self.steps = 0;
        let scope = Scope::child(&self.globals);
        match self.exec_block(&program.body, &scope)? {
            Flow::Normal => {}
            Flow::Return(_) => {
                return Err(SketchError::evaluation(
                    "`return` outside of a function",
                    program.span,
                ));
            }
            Flow::Break | Flow::Continue => {
                return Err(SketchError::evaluation(
                    "`break` or `continue` outside of a loop",
                    program.span,
                ));
            }
        }
        while let Some(job) = self.jobs.pop_front() {
            self.call(&job.callback, Value::Undefined, &[job.arg])?;
        }
        Ok(())
    }

    /// Call a user value from the host with a fresh step budget.
    pub fn invoke(&mut self, callee: &Value, args: &[Value]) -> Result<Value, SketchError> {
        self.steps = 0;
        self.depth = 0;
        self.call(callee, Value::Undefined, args)
    }

    pub fn call(&mut self, callee: &Value, this: Value, args: &[Value]) -> Result<Value, SketchError> {
        match callee {
            Value::Native(native) => {
                let this = if matches!(native.this, Value::Undefined) {
                    this
                } else {
                    native.this.clone()
                };
                (native.func)(self, &this, args)
            }
            Value::Closure(closure) => self.call_closure(closure, args),
            other => Err(self.error(format!("{} is not a function", other.type_of()))),
        }
    }

    /// An evaluation error at the call site currently executing.
    pub fn error(&self, message: impl Into<String>) -> SketchError {
        SketchError::evaluation(message, self.span)
    }

    pub fn random(&mut self) -> f64 {
        self.rng.r#gen::<f64>()
    }

    pub fn enqueue(&mut self, job: Job) {
        self.jobs.push_back(job);
    }

    pub fn resolver(&self) -> Rc<dyn ModuleResolver> {
        self.resolver.clone()
    }

    /// Record a recoverable problem (for example an unresolved module).
    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        log::warn!("{message}");
        self.warnings.push(message);
    }

    pub fn take_warnings(&mut self) -> Vec<String> {
        std::mem::take(&mut self.warnings)
    }

    /// Record a value handed to the registration callback.
    pub fn register(&mut self, value: Value) {
        self.registered.push((value, self.span));
    }

    pub fn take_registered(&mut self) -> Vec<(Value, Span)> {
        std::mem::take(&mut self.registered)
    }

    fn tick(&mut self, span: Span) -> Result<(), SketchError> {
        self.charge(1, span)
    }

    /// Spend `steps` of the step budget at once, for natives whose cost
    /// grows with their input.
    pub fn charge_steps(&mut self, steps: u64) -> Result<(), SketchError> {
        self.charge(steps, self.span)
    }

    fn charge(&mut self, steps: u64, span: Span) -> Result<(), SketchError> {
        self.steps = self.steps.saturating_add(steps);
        if self.steps > STEP_LIMIT {
            return Err(SketchError::evaluation(
                "step limit exceeded (infinite loop?)",
                span,
            ));
        }
        Ok(())
    }

    fn call_closure(&mut self, closure: &Closure, args: &[Value]) -> Result<Value, SketchError> {
        if self.depth >= MAX_CALL_DEPTH {
            return Err(SketchError::evaluation(
                "maximum call stack size exceeded",
                closure.func.span,
            ));
        }
        let scope = Scope::child(&closure.env);
        for (i, param) in closure.func.params.iter().enumerate() {
            let arg = args.get(i).cloned().unwrap_or_default();
            self.bind_pattern(param, arg, &scope, false)?;
        }

        let saved = self.span;
        self.depth += 1;
        let result = match &closure.func.body {
            FunctionBody::Expr(e) => self.eval(e, &scope),
            FunctionBody::Block(body) => match self.exec_block(body, &scope) {
                Ok(Flow::Return(v)) => Ok(v),
                Ok(_) => Ok(Value::Undefined),
                Err(e) => Err(e),
            },
        };
        self.depth -= 1;
        self.span = saved;
        result
    }
}

// ─── Statements ──────────────────────────────────────────────────────────

impl Interpreter {
    fn exec_block(&mut self, body: &[Stmt], env: &Env) -> Result<Flow, SketchError> {
        for stmt in body {
            if let StmtKind::Function { name, func } = &stmt.kind {
                env.declare(*name, self.closure(func, env), false);
            }
        }
        for stmt in body {
            match self.exec(stmt, env)? {
                Flow::Normal => {}
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    fn exec(&mut self, stmt: &Stmt, env: &Env) -> Result<Flow, SketchError> {
        self.tick(stmt.span)?;
        match &stmt.kind {
            StmtKind::Expr(e) => {
                self.eval(e, env)?;
            }
            StmtKind::Decl { kind, decls } => {
                for decl in decls {
                    let value = match &decl.init {
                        Some(init) => self.eval(init, env)?,
                        None => Value::Undefined,
                    };
                    self.bind_pattern(&decl.target, value, env, *kind == DeclKind::Const)?;
                }
            }
            StmtKind::Function { name, func } => {
                if !env.has_own(*name) {
                    env.declare(*name, self.closure(func, env), false);
                }
            }
            StmtKind::Return(arg) => {
                let value = match arg {
                    Some(e) => self.eval(e, env)?,
                    None => Value::Undefined,
                };
                return Ok(Flow::Return(value));
            }
            StmtKind::If { test, cons, alt } => {
                if self.eval(test, env)?.is_truthy() {
                    return self.exec(cons, env);
                }
                if let Some(alt) = alt {
                    return self.exec(alt, env);
                }
            }
            StmtKind::Block(body) => return self.exec_block(body, &Scope::child(env)),
            StmtKind::For {
                init,
                test,
                update,
                body,
            } => {
                let scope = Scope::child(env);
                if let Some(init) = init {
                    self.exec(init, &scope)?;
                }
                loop {
                    if let Some(test) = test {
                        if !self.eval(test, &scope)?.is_truthy() {
                            break;
                        }
                    }
                    match self.exec(body, &scope)? {
                        Flow::Break => break,
                        Flow::Return(v) => return Ok(Flow::Return(v)),
                        Flow::Normal | Flow::Continue => {}
                    }
                    if let Some(update) = update {
                        self.eval(update, &scope)?;
                    }
                    self.tick(stmt.span)?;
                }
            }
            StmtKind::ForOf {
                kind,
                target,
                iter,
                body,
            } => {
                let iterable = self.eval(iter, env)?;
                let items = self.iterate(iterable, iter.span)?;
                for item in items {
                    let scope = Scope::child(env);
                    self.bind_pattern(target, item, &scope, *kind == DeclKind::Const)?;
                    match self.exec(body, &scope)? {
                        Flow::Break => break,
                        Flow::Return(v) => return Ok(Flow::Return(v)),
                        Flow::Normal | Flow::Continue => {}
                    }
                }
            }
            StmtKind::While { test, body } => {
                while self.eval(test, env)?.is_truthy() {
                    match self.exec(body, env)? {
                        Flow::Break => break,
                        Flow::Return(v) => return Ok(Flow::Return(v)),
                        Flow::Normal | Flow::Continue => {}
                    }
                    self.tick(stmt.span)?;
                }
            }
            StmtKind::Break => return Ok(Flow::Break),
            StmtKind::Continue => return Ok(Flow::Continue),
            StmtKind::Empty => {}
        }
        Ok(Flow::Normal)
    }

    fn closure(&self, func: &Rc<Function>, env: &Env) -> Value {
        Value::Closure(Rc::new(Closure {
            func: func.clone(),
            env: env.clone(),
        }))
    }

    fn iterate(&self, value: Value, span: Span) -> Result<Vec<Value>, SketchError> {
        match value {
            Value::Array(items) => {
                let items = items.borrow().clone();
                Ok(items)
            }
            Value::Str(s) => Ok(s.chars().map(|c| Value::str(c.to_string())).collect()),
            other => Err(SketchError::evaluation(
                format!("{} is not iterable", other.type_of()),
                span,
            )),
        }
    }

    fn bind_pattern(
        &mut self,
        pattern: &Pattern,
        value: Value,
        env: &Env,
        constant: bool,
    ) -> Result<(), SketchError> {
        match &pattern.kind {
            PatternKind::Ident(name) => env.declare(*name, value, constant),
            PatternKind::Object(entries) => {
                for (key, target) in entries {
                    let field = self.get_member(&value, key.as_str(), pattern.span)?;
                    self.bind_pattern(target, field, env, constant)?;
                }
            }
            PatternKind::Array(elements) => {
                let items = self.iterate(value, pattern.span)?;
                for (i, element) in elements.iter().enumerate() {
                    if let Some(target) = element {
                        let item = items.get(i).cloned().unwrap_or_default();
                        self.bind_pattern(target, item, env, constant)?;
                    }
                }
            }
        }
        Ok(())
    }
}

// ─── Expressions ─────────────────────────────────────────────────────────

impl Interpreter {
    fn eval(&mut self, expr: &Expr, env: &Env) -> Result<Value, SketchError> {
        match &expr.kind {
            ExprKind::Number(n) => Ok(Value::Number(*n)),
            ExprKind::Str(s) => Ok(Value::str(s)),
            ExprKind::Bool(b) => Ok(Value::Bool(*b)),
            ExprKind::Null => Ok(Value::Null),
            ExprKind::Undefined => Ok(Value::Undefined),
            ExprKind::Ident(name) => env.lookup(*name).ok_or_else(|| {
                SketchError::evaluation(format!("{name} is not defined"), expr.span)
            }),
            ExprKind::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    if let ExprKind::Spread(inner) = &item.kind {
                        let value = self.eval(inner, env)?;
                        out.extend(self.iterate(value, inner.span)?);
                    } else {
                        out.push(self.eval(item, env)?);
                    }
                }
                Ok(Value::array(out))
            }
            ExprKind::Object(props) => {
                let object = Value::object([]);
                for prop in props {
                    match &prop.kind {
                        PropKind::KeyValue { key, value, .. } => {
                            let value = self.eval(value, env)?;
                            object.set(*key, value);
                        }
                        PropKind::Spread(inner) => match self.eval(inner, env)? {
                            Value::Object(fields) => {
                                for (k, v) in fields.borrow().iter() {
                                    object.set(*k, v.clone());
                                }
                            }
                            Value::Array(items) => {
                                for (i, v) in items.borrow().iter().enumerate() {
                                    object.set(Name::intern(&i.to_string()), v.clone());
                                }
                            }
                            _ => {}
                        },
                    }
                }
                Ok(object)
            }
            ExprKind::Spread(_) => Err(SketchError::evaluation(
                "spread is only allowed in arrays, objects and calls",
                expr.span,
            )),
            ExprKind::Function(func) => Ok(self.closure(func, env)),
            ExprKind::Unary { op, arg } => {
                if *op == UnaryOp::TypeOf {
                    if let Some(name) = arg.as_ident() {
                        let value = env.lookup(name).unwrap_or_default();
                        return Ok(Value::str(value.type_of()));
                    }
                }
                let value = self.eval(arg, env)?;
                Ok(match op {
                    UnaryOp::Neg => Value::Number(-value.to_number()),
                    UnaryOp::Plus => Value::Number(value.to_number()),
                    UnaryOp::Not => Value::Bool(!value.is_truthy()),
                    UnaryOp::TypeOf => Value::str(value.type_of()),
                })
            }
            ExprKind::Update { op, prefix, target } => {
                let old = self.eval(target, env)?.to_number();
                let new = match op {
                    UpdateOp::Increment => old + 1.0,
                    UpdateOp::Decrement => old - 1.0,
                };
                self.assign_to(target, Value::Number(new), env)?;
                Ok(Value::Number(if *prefix { new } else { old }))
            }
            ExprKind::Binary { op, left, right } => {
                let left = self.eval(left, env)?;
                let right = self.eval(right, env)?;
                Ok(binary(*op, &left, &right))
            }
            ExprKind::Logical { op, left, right } => {
                let left = self.eval(left, env)?;
                let short_circuit = match op {
                    LogicalOp::And => !left.is_truthy(),
                    LogicalOp::Or => left.is_truthy(),
                    LogicalOp::Nullish => !left.is_nullish(),
                };
                if short_circuit {
                    Ok(left)
                } else {
                    self.eval(right, env)
                }
            }
            ExprKind::Conditional { test, cons, alt } => {
                if self.eval(test, env)?.is_truthy() {
                    self.eval(cons, env)
                } else {
                    self.eval(alt, env)
                }
            }
            ExprKind::Assign { op, target, value } => {
                let value = match op {
                    AssignOp::Assign => self.eval(value, env)?,
                    AssignOp::Compound(op) => {
                        let old = self.eval(target, env)?;
                        let rhs = self.eval(value, env)?;
                        binary(*op, &old, &rhs)
                    }
                };
                self.assign_to(target, value.clone(), env)?;
                Ok(value)
            }
            ExprKind::Call { callee, args } => self.eval_call(expr, callee, args, env),
            ExprKind::Member { object, prop } => {
                let object = self.eval(object, env)?;
                self.get_member(&object, prop.as_str(), expr.span)
            }
            ExprKind::Index { object, index } => {
                let object = self.eval(object, env)?;
                let key = self.eval(index, env)?;
                self.get_index(&object, &key, expr.span)
            }
        }
    }

    fn eval_call(
        &mut self,
        expr: &Expr,
        callee: &Expr,
        args: &[Expr],
        env: &Env,
    ) -> Result<Value, SketchError> {
        let (function, this) = match &callee.kind {
            ExprKind::Member { object, prop } => {
                let object = self.eval(object, env)?;
                let function = self.get_member(&object, prop.as_str(), callee.span)?;
                (function, object)
            }
            ExprKind::Index { object, index } => {
                let object = self.eval(object, env)?;
                let key = self.eval(index, env)?;
                let function = self.get_index(&object, &key, callee.span)?;
                (function, object)
            }
            _ => (self.eval(callee, env)?, Value::Undefined),
        };

        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            if let ExprKind::Spread(inner) = &arg.kind {
                let value = self.eval(inner, env)?;
                values.extend(self.iterate(value, inner.span)?);
            } else {
                values.push(self.eval(arg, env)?);
            }
        }

        if !function.is_callable() {
            return Err(SketchError::evaluation(
                format!("{} is not a function", describe_callee(callee)),
                expr.span,
            ));
        }
        self.span = expr.span;
        self.call(&function, this, &values)
    }

    /// `object.name`
    pub fn get_member(&self, object: &Value, name: &str, span: Span) -> Result<Value, SketchError> {
        Ok(match object {
            Value::Undefined | Value::Null => {
                return Err(SketchError::evaluation(
                    format!("cannot read properties of {object} (reading '{name}')"),
                    span,
                ));
            }
            Value::Object(_) => object.get(name).unwrap_or_default(),
            Value::Array(items) => match name {
                "length" => Value::Number(items.borrow().len() as f64),
                _ => builtins::array_method(name)
                    .map(|f| Value::bound(f.0, f.1, object.clone()))
                    .unwrap_or_default(),
            },
            Value::Str(s) => match name {
                "length" => Value::Number(s.chars().count() as f64),
                _ => builtins::string_method(name)
                    .map(|f| Value::bound(f.0, f.1, object.clone()))
                    .unwrap_or_default(),
            },
            Value::Number(_) => builtins::number_method(name)
                .map(|f| Value::bound(f.0, f.1, object.clone()))
                .unwrap_or_default(),
            _ => Value::Undefined,
        })
    }

    /// `object[key]`
    pub fn get_index(&self, object: &Value, key: &Value, span: Span) -> Result<Value, SketchError> {
        match (object, key) {
            (Value::Array(items), Value::Number(n)) => Ok(index_of(*n)
                .and_then(|i| items.borrow().get(i).cloned())
                .unwrap_or_default()),
            (Value::Str(s), Value::Number(n)) => Ok(index_of(*n)
                .and_then(|i| s.chars().nth(i))
                .map(|c| Value::str(c.to_string()))
                .unwrap_or_default()),
            _ => self.get_member(object, &key.to_string(), span),
        }
    }

    fn assign_to(&mut self, target: &Expr, value: Value, env: &Env) -> Result<(), SketchError> {
        match &target.kind {
            ExprKind::Ident(name) => env.assign(*name, value).map_err(|e| {
                let message = match e {
                    AssignError::Undefined => format!("{name} is not defined"),
                    AssignError::Constant => format!("assignment to constant variable `{name}`"),
                };
                SketchError::evaluation(message, target.span)
            }),
            ExprKind::Member { object, prop } => {
                let object = self.eval(object, env)?;
                self.set_member(&object, *prop, value, target.span)
            }
            ExprKind::Index { object, index } => {
                let object = self.eval(object, env)?;
                let key = self.eval(index, env)?;
                match (&object, &key) {
                    (Value::Array(items), Value::Number(n)) => {
                        let Some(i) = index_of(*n) else {
                            return Err(SketchError::evaluation(
                                format!("invalid array index {key}"),
                                target.span,
                            ));
                        };
                        let mut items = items.borrow_mut();
                        if i >= items.len() {
                            items.resize(i + 1, Value::Undefined);
                        }
                        items[i] = value;
                        Ok(())
                    }
                    _ => self.set_member(&object, Name::intern(&key.to_string()), value, target.span),
                }
            }
            _ => Err(SketchError::evaluation("invalid assignment target", target.span)),
        }
    }

    fn set_member(&self, object: &Value, key: Name, value: Value, span: Span) -> Result<(), SketchError> {
        match object {
            Value::Object(_) => {
                object.set(key, value);
                Ok(())
            }
            Value::Array(items) if key.as_str() == "length" => {
                let len = index_of(value.to_number()).ok_or_else(|| {
                    SketchError::evaluation("invalid array length", span)
                })?;
                items.borrow_mut().resize(len, Value::Undefined);
                Ok(())
            }
            _ => Err(SketchError::evaluation(
                format!("cannot set property '{key}' of {}", object.type_of()),
                span,
            )),
        }
    }
}

fn index_of(n: f64) -> Option<usize> {
    (n >= 0.0 && n.fract() == 0.0 && n < usize::MAX as f64).then_some(n as usize)
}

fn describe_callee(callee: &Expr) -> String {
    match &callee.kind {
        ExprKind::Ident(name) => name.to_string(),
        ExprKind::Member { object, prop } => format!("{}.{prop}", describe_callee(object)),
        _ => "expression".to_string(),
    }
}

/// Binary operators with the usual coercions.
pub fn binary(op: BinaryOp, left: &Value, right: &Value) -> Value {
    let stringy = |v: &Value| matches!(v, Value::Str(_) | Value::Array(_) | Value::Object(_));
    match op {
        BinaryOp::Add if stringy(left) || stringy(right) => Value::str(format!("{left}{right}")),
        BinaryOp::Add => Value::Number(left.to_number() + right.to_number()),
        BinaryOp::Sub => Value::Number(left.to_number() - right.to_number()),
        BinaryOp::Mul => Value::Number(left.to_number() * right.to_number()),
        BinaryOp::Div => Value::Number(left.to_number() / right.to_number()),
        BinaryOp::Rem => Value::Number(left.to_number() % right.to_number()),
        BinaryOp::Pow => Value::Number(left.to_number().powf(right.to_number())),
        BinaryOp::Eq => Value::Bool(left.loose_eq(right)),
        BinaryOp::NotEq => Value::Bool(!left.loose_eq(right)),
        BinaryOp::StrictEq => Value::Bool(left.strict_eq(right)),
        BinaryOp::StrictNotEq => Value::Bool(!left.strict_eq(right)),
        BinaryOp::Lt | BinaryOp::Gt | BinaryOp::LtEq | BinaryOp::GtEq => {
            let ordering = match (left, right) {
                (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
                _ => left.to_number().partial_cmp(&right.to_number()),
            };
            let result = ordering.is_some_and(|o| match op {
                BinaryOp::Lt => o.is_lt(),
                BinaryOp::Gt => o.is_gt(),
                BinaryOp::LtEq => o.is_le(),
                _ => o.is_ge(),
            });
            Value::Bool(result)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins::BuiltinModules;
    use crate::parser::parse_program;
    use pretty_assertions::assert_eq;

    fn run(src: &str) -> Result<Value, SketchError> {
        let mut interp = Interpreter::new(7, Rc::new(BuiltinModules));
        let program = parse_program(src)?;
        interp.run(&program)?;
        Ok(interp
            .globals
            .lookup(Name::intern("__probe"))
            .unwrap_or_default())
    }

    fn probe(src: &str) -> serde_json::Value {
        let program = format!("{src}\n__set(result);");
        let mut interp = Interpreter::new(7, Rc::new(BuiltinModules));
        fn set(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> Result<Value, SketchError> {
            interp.define_global("__probe", args.first().cloned().unwrap_or_default());
            Ok(Value::Undefined)
        }
        interp.define_global("__set", Value::native("__set", set));
        interp.run(&parse_program(&program).unwrap()).unwrap();
        interp
            .globals
            .lookup(Name::intern("__probe"))
            .unwrap_or_default()
            .to_json()
    }

    #[test]
    fn closures_capture_their_scope() {
        let out = probe(
            "const make = n => () => n * 2;\nconst f = make(21);\nconst result = f();",
        );
        assert_eq!(out, serde_json::json!(42.0));
    }

    #[test]
    fn loops_and_mutation() {
        let out = probe(
            r#"
let xs = [];
for (let i = 0; i < 5; i++) { if (i === 3) continue; xs.push(i * i); }
let total = 0;
for (const x of xs) total += x;
const result = { xs, total };
"#,
        );
        assert_eq!(out, serde_json::json!({ "xs": [0.0, 1.0, 4.0, 16.0], "total": 21.0 }));
    }

    #[test]
    fn destructuring_and_spread() {
        let out = probe(
            r#"
const { pos: [x, y], size } = { pos: [1, 2], size: 3 };
const more = [...[x, y], 3];
function sum(a, b, c) { return a + b + c; }
const result = [sum(...more), size];
"#,
        );
        assert_eq!(out, serde_json::json!([6.0, 3.0]));
    }

    #[test]
    fn hoisted_function_declarations() {
        let out = probe("const result = twice(4);\nfunction twice(n) { return n * 2; }");
        assert_eq!(out, serde_json::json!(8.0));
    }

    #[test]
    fn string_concatenation_and_comparison() {
        let out = probe(r#"const result = ["a" + 1, "b" < "c", 2 == "2", null ?? "d"];"#);
        assert_eq!(out, serde_json::json!(["a1", true, true, "d"]));
    }

    #[test]
    fn reference_error_reports_position() {
        let err = run("const a = 1;\nconst b = missing + a;").unwrap_err();
        assert_eq!(err.position(), (2, 11));
        assert!(err.message().contains("missing is not defined"));
    }

    #[test]
    fn constant_reassignment_fails() {
        let err = run("const a = 1;\na = 2;").unwrap_err();
        assert!(err.message().contains("constant"));
    }

    #[test]
    fn infinite_loop_hits_step_limit() {
        let err = run("while (true) {}").unwrap_err();
        assert!(err.message().contains("step limit"));
    }

    #[test]
    fn unbounded_recursion_is_caught() {
        let err = run("function f(n) { return f(n + 1); }\nf(0);").unwrap_err();
        assert!(err.message().contains("call stack"));
    }
}
