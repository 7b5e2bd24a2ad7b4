//! Sketch evaluation: compile source, run it, capture what it registers.
//!
//! The registration callback is handed in by the caller; the program itself
//! only sees a `sketch` global that records its argument. The last
//! registration of a run wins.

use crate::builtins::{BuiltinModules, ModuleResolver};
use crate::command::{BuiltinCommands, CommandVocabulary, DrawCommand};
use crate::error::{SketchError, Span};
use crate::interp::Interpreter;
use crate::parser::parse_program;
use crate::transform::{self, Extracted, REGISTRATION};
use crate::value::Value;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Canvas size of a sketch that does not declare one.
pub const DEFAULT_SIZE: (u32, u32) = (800, 600);

/// Largest canvas side a sketch may ask for, in pixels.
pub const MAX_SIDE: u32 = 16384;

// ─── Sketch ──────────────────────────────────────────────────────────────

/// One of a sketch's callable members. Absent members get their default
/// behaviour at construction time.
#[derive(Debug, Clone)]
pub enum SketchFn {
    /// A function supplied by the program.
    User(Value),
    /// Missing `update`: the state passes through.
    Identity,
    /// Missing `draw`: no commands.
    Empty,
}

/// A registered sketch, immutable once captured.
#[derive(Clone)]
pub struct Sketch {
    pub size: (u32, u32),
    initial_state: Value,
    update: SketchFn,
    draw: SketchFn,
    /// Where `draw` is defined, for errors about its result.
    draw_span: Span,
    runtime: Rc<RefCell<Interpreter>>,
}

impl fmt::Debug for Sketch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sketch")
            .field("size", &self.size)
            .field("initial_state", &self.initial_state)
            .field("update", &self.update)
            .field("draw", &self.draw)
            .finish_non_exhaustive()
    }
}

impl Sketch {
    fn from_registration(
        value: &Value,
        span: Span,
        runtime: Rc<RefCell<Interpreter>>,
    ) -> Result<Self, SketchError> {
        if !matches!(value, Value::Object(_)) {
            return Err(SketchError::evaluation(
                format!("{REGISTRATION}() expects an object, got {}", value.type_of()),
                span,
            ));
        }

        let size = match value.get("size").and_then(|v| v.as_point()) {
            Some((w, h)) if w.is_finite() && h.is_finite() && w >= 1.0 && h >= 1.0 => {
                if w > f64::from(MAX_SIDE) || h > f64::from(MAX_SIDE) {
                    return Err(SketchError::evaluation(
                        format!("size {w}x{h} is larger than {MAX_SIDE}px per side"),
                        span,
                    ));
                }
                (w as u32, h as u32)
            }
            _ => DEFAULT_SIZE,
        };
        let initial_state = match value.get("initialState") {
            Some(state) if !matches!(state, Value::Undefined) => state,
            _ => Value::object([]),
        };
        let update = match value.get("update") {
            Some(f) if f.is_callable() => SketchFn::User(f),
            _ => SketchFn::Identity,
        };
        let draw = match value.get("draw") {
            Some(f) if f.is_callable() => SketchFn::User(f),
            _ => SketchFn::Empty,
        };
        let draw_span = match &draw {
            SketchFn::User(Value::Closure(closure)) => closure.func.span,
            _ => span,
        }
        .or_origin();

        Ok(Self {
            size,
            initial_state,
            update,
            draw,
            draw_span,
            runtime,
        })
    }

    /// A fresh copy of the initial state.
    pub fn initial_state(&self) -> Value {
        self.initial_state.deep_clone()
    }

    pub fn update_fn(&self) -> &SketchFn {
        &self.update
    }

    pub fn draw_fn(&self) -> &SketchFn {
        &self.draw
    }

    /// Advance `state` by one batch of events. `state` itself is never
    /// mutated; `update` receives a deep copy.
    pub fn update(&self, state: &Value, events: Value) -> Result<Value, SketchError> {
        match &self.update {
            SketchFn::User(f) => self
                .runtime
                .borrow_mut()
                .invoke(f, &[state.deep_clone(), events]),
            SketchFn::Identity | SketchFn::Empty => Ok(state.deep_clone()),
        }
    }

    /// Run `draw` and keep every well-formed `[name, args]` tuple.
    pub fn draw(&self, state: &Value, constants: &[f64]) -> Result<Vec<DrawCommand>, SketchError> {
        let f = match &self.draw {
            SketchFn::User(f) => f,
            SketchFn::Identity | SketchFn::Empty => return Ok(Vec::new()),
        };
        let result = self
            .runtime
            .borrow_mut()
            .invoke(f, &[state.deep_clone(), Value::numbers(constants)])?;
        let Some(items) = result.as_array() else {
            return Err(SketchError::evaluation(
                format!("draw must return an array, got {}", result.type_of()),
                self.draw_span,
            ));
        };
        Ok(items
            .iter()
            .filter_map(|item| {
                let cmd = DrawCommand::from_value(item);
                if cmd.is_none() {
                    log::trace!("skipping non-command draw output {item:?}");
                }
                cmd
            })
            .collect())
    }

    /// Warnings raised by user code since the last call (unresolved
    /// modules and the like).
    pub fn take_warnings(&self) -> Vec<String> {
        self.runtime.borrow_mut().take_warnings()
    }
}

// ─── Evaluator ───────────────────────────────────────────────────────────

/// What a successful evaluation produced besides the sketch itself.
#[derive(Debug, Clone, PartialEq)]
pub struct EvalReport {
    /// Constants pulled out of `draw`, in document order.
    pub constants: Vec<f64>,
    /// The transformed program that was executed.
    pub code: String,
    pub warnings: Vec<String>,
}

/// Turns source text into a live [`Sketch`].
pub struct Evaluator {
    commands: Rc<dyn CommandVocabulary>,
    resolver: Rc<dyn ModuleResolver>,
    seed: u64,
    dry_run: bool,
}

impl Default for Evaluator {
    fn default() -> Self {
        Self {
            commands: Rc::new(BuiltinCommands),
            resolver: Rc::new(BuiltinModules),
            seed: 0,
            dry_run: true,
        }
    }
}

impl Evaluator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_commands(mut self, commands: Rc<dyn CommandVocabulary>) -> Self {
        self.commands = commands;
        self
    }

    pub fn with_resolver(mut self, resolver: Rc<dyn ModuleResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    /// Seed for `Math.random`.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Run `draw(update(initialState, []), constants)` once before handing
    /// the sketch out.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Compile and run `source`. `on_register` receives the sketch only if
    /// every step, including the dry run, succeeded; on error the caller's
    /// current sketch stays untouched.
    pub fn evaluate(
        &self,
        source: &str,
        on_register: impl FnOnce(Sketch),
    ) -> Result<EvalReport, SketchError> {
        let Extracted { code, constants } = transform::compile(source, self.commands.as_ref())?;
        let program = parse_program(&code)?;

        let mut interp = Interpreter::new(self.seed, self.resolver.clone());
        interp.define_global(REGISTRATION, Value::native(REGISTRATION, register_sketch));
        interp.run(&program)?;

        let mut registered = interp.take_registered();
        if registered.len() > 1 {
            interp.warn(format!(
                "{REGISTRATION}() was called {} times, using the last call",
                registered.len()
            ));
        }
        let Some((value, span)) = registered.pop() else {
            return Err(SketchError::evaluation(
                format!("the program never calls {REGISTRATION}()"),
                Span::ORIGIN,
            ));
        };

        let runtime = Rc::new(RefCell::new(interp));
        let sketch = Sketch::from_registration(&value, span, runtime)?;
        if self.dry_run {
            let state = sketch.update(&sketch.initial_state, Value::array(Vec::new()))?;
            sketch.draw(&state, &constants)?;
        }

        let warnings = sketch.take_warnings();
        log::debug!(
            "sketch registered: size {:?}, {} constants",
            sketch.size,
            constants.len()
        );
        on_register(sketch);
        Ok(EvalReport {
            constants,
            code,
            warnings,
        })
    }

    /// [`Evaluator::evaluate`] returning the sketch alongside the report.
    pub fn load(&self, source: &str) -> Result<(Sketch, EvalReport), SketchError> {
        let mut captured = None;
        let report = self.evaluate(source, |sketch| captured = Some(sketch))?;
        match captured {
            Some(sketch) => Ok((sketch, report)),
            None => Err(SketchError::evaluation(
                "no sketch was registered",
                Span::ORIGIN,
            )),
        }
    }
}

fn register_sketch(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> Result<Value, SketchError> {
    interp.register(args.first().cloned().unwrap_or_default());
    Ok(Value::Undefined)
}
