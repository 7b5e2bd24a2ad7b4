//! Editing session: source text, live sketch, playback and inspection.
//!
//! The session owns the one live [`Engine`] and everything around it. The
//! host drives it by calling [`Session::poll`] with the current time and
//! forwarding pointer input to [`Session::pointer`]:
//!
//! - source edits are debounced, then recompiled between frames; a failed
//!   compile keeps the previous sketch running.
//! - while playing, pointer and key events queue for the sketch's `update`.
//! - while paused, the pointer drives the inspector instead: hovering
//!   highlights the source lines of the shape under it, dragging a shape
//!   solves for new constants and writes them back into the source.

use crate::config::EditorConfig;
use crate::drag::{DragTool, NumberPicker};
use crate::engine::{Engine, PlayState};
use crate::input::{EventQueue, InputEvent};
use crate::optimize::{self, DragTarget};
use crate::scheduler::{CancelToken, Debouncer, FrameScheduler};
use serde::Serialize;
use sk_core::{DrawCommand, Evaluator, Meta, SketchError, Value};
use sk_render::{Inspector, Registry, Surface};
use std::rc::Rc;
use std::time::Instant;

/// Editor rows to highlight, 0-based and inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Highlight {
    pub start: u32,
    pub end: u32,
}

impl From<Meta> for Highlight {
    fn from(meta: Meta) -> Self {
        Self {
            start: meta.line_start.saturating_sub(1),
            end: meta.line_end.saturating_sub(1),
        }
    }
}

pub struct Session {
    config: EditorConfig,
    registry: Rc<Registry>,
    evaluator: Evaluator,
    source: String,
    /// The text the live sketch was compiled from.
    live_source: String,
    engine: Option<Engine>,
    compile_error: Option<SketchError>,
    warnings: Vec<String>,
    events: EventQueue,
    recompile: Debouncer,
    scheduler: FrameScheduler,
    inspector: Option<Inspector>,
    drag: DragTool,
    highlight: Option<Highlight>,
    frame: Vec<DrawCommand>,
}

impl Session {
    pub fn new(config: EditorConfig) -> Self {
        Self::with_registry(config, Registry::builtin())
    }

    /// A session whose command vocabulary is `registry`.
    pub fn with_registry(config: EditorConfig, registry: Registry) -> Self {
        let registry = Rc::new(registry);
        let evaluator = Evaluator::new()
            .with_commands(registry.clone())
            .with_seed(config.seed)
            .with_dry_run(config.dry_run);
        Self {
            recompile: Debouncer::new(config.debounce()),
            scheduler: FrameScheduler::new(config.frame_interval()),
            config,
            registry,
            evaluator,
            source: String::new(),
            live_source: String::new(),
            engine: None,
            compile_error: None,
            warnings: Vec::new(),
            events: EventQueue::new(),
            inspector: None,
            drag: DragTool::new(),
            highlight: None,
            frame: Vec::new(),
        }
    }

    // ─── Source ──────────────────────────────────────────────────────────

    /// Replace the source and compile it right away.
    pub fn open(&mut self, source: &str) -> Result<(), SketchError> {
        self.source = source.to_string();
        self.recompile.cancel();
        self.compile()
    }

    /// Record an edit; the recompile happens on a later [`Session::poll`]
    /// once edits have settled.
    pub fn set_source(&mut self, source: String, now: Instant) {
        self.source = source;
        self.recompile.trigger(now);
    }

    /// Compile the current source and adopt the result. On failure the
    /// error is kept for display and the previous sketch stays live.
    pub fn compile(&mut self) -> Result<(), SketchError> {
        match self.evaluator.load(&self.source) {
            Ok((sketch, report)) => {
                // Listeners of the old sketch go first.
                self.events.detach();
                for warning in &report.warnings {
                    log::warn!("{warning}");
                }
                match self.engine.as_mut() {
                    Some(engine) => engine.replace_sketch(sketch, report.constants),
                    None => {
                        let mut engine =
                            Engine::new(sketch, report.constants, self.config.max_history_len);
                        if self.config.start_playing {
                            engine.play();
                        }
                        self.engine = Some(engine);
                    }
                }
                self.warnings = report.warnings;
                self.live_source.clone_from(&self.source);
                self.compile_error = None;
                self.drag.pointer_up();
                self.events.attach();
                self.refresh();
                Ok(())
            }
            Err(err) => {
                let (line, column) = err.position();
                log::warn!("{} at {line}:{column}: {}", err.kind(), err.message());
                self.compile_error = Some(err.clone());
                Err(err)
            }
        }
    }

    /// Splice `value` over the number literal at `(line, column)` and
    /// schedule a recompile. False when no number sits there.
    pub fn pick_number(&mut self, line: u32, column: u32, value: f64, now: Instant) -> bool {
        match sk_core::replace_number_at(&self.source, line, column, value) {
            Some(source) => {
                self.set_source(source, now);
                true
            }
            None => false,
        }
    }

    /// Whether the source holds edits the live sketch was not built from,
    /// either waiting on the debounce or failing to compile.
    pub fn has_unapplied_edits(&self) -> bool {
        self.source != self.live_source
    }

    /// Slider for the number literal at `(line, column)`.
    pub fn number_picker(&self, line: u32, column: u32) -> Option<NumberPicker> {
        sk_core::number_at(&self.source, line, column).map(NumberPicker::for_value)
    }

    // ─── Frames ──────────────────────────────────────────────────────────

    /// Start the frame clock. Cancelling the token stops it for good.
    pub fn start(&mut self, now: Instant) -> CancelToken {
        self.scheduler.start(now)
    }

    pub fn stop(&mut self) {
        self.scheduler.stop();
    }

    /// Cancel the pending frame and detach input.
    pub fn shutdown(&mut self) {
        self.scheduler.stop();
        self.recompile.cancel();
        self.events.detach();
    }

    /// Run whatever is due at `now`: a settled recompile first, then a
    /// frame. Returns whether a frame was produced.
    pub fn poll(&mut self, now: Instant) -> bool {
        if self.recompile.poll(now) && self.compile().is_err() {
            log::debug!("keeping the previous sketch");
        }
        if !self.scheduler.poll(now) {
            return false;
        }
        if let Err(err) = self.tick() {
            log::debug!("frame failed: {err}");
        }
        true
    }

    /// One frame: drain the queued events into the engine and keep the
    /// commands it draws.
    pub fn tick(&mut self) -> Result<(), SketchError> {
        let events = self.events.drain();
        let Some(engine) = self.engine.as_mut() else {
            return Ok(());
        };
        let was_playing = !engine.is_paused();
        let result = engine.tick(events);
        match result {
            Ok(commands) => {
                self.frame = commands;
                Ok(())
            }
            Err(err) => {
                if was_playing {
                    self.refresh();
                }
                Err(err)
            }
        }
    }

    /// Paint the last frame.
    pub fn render(&self) -> Surface {
        let (width, height) = self.size();
        let mut surface = Surface::new(width, height);
        self.registry.render(&mut surface, &self.frame);
        surface
    }

    /// Redraw the selected state; rebuild the inspector when paused.
    fn refresh(&mut self) {
        let Some(engine) = self.engine.as_mut() else {
            return;
        };
        if !engine.is_paused() {
            self.inspector = None;
            return;
        }
        match engine.frame() {
            Ok(commands) => {
                self.inspector = Some(Inspector::build(
                    &self.registry,
                    engine.sketch().size,
                    commands.clone(),
                ));
                self.frame = commands;
            }
            Err(err) => {
                log::debug!("no inspector for this frame: {err}");
                self.inspector = None;
            }
        }
    }

    // ─── Transport ───────────────────────────────────────────────────────

    pub fn play(&mut self) {
        if let Some(engine) = self.engine.as_mut() {
            engine.play();
        }
        self.drag.pointer_up();
        self.highlight = None;
        self.refresh();
    }

    pub fn pause(&mut self) {
        if let Some(engine) = self.engine.as_mut() {
            engine.pause();
        }
        self.refresh();
    }

    pub fn toggle(&mut self) {
        match self.play_state() {
            Some(PlayState::Playing) => self.pause(),
            Some(PlayState::Paused) => self.play(),
            None => {}
        }
    }

    /// Back to the initial state, paused.
    pub fn reset(&mut self) {
        if let Some(engine) = self.engine.as_mut() {
            engine.reset();
        }
        self.refresh();
    }

    pub fn seek(&mut self, idx: usize) -> Option<usize> {
        let idx = self.engine.as_mut()?.seek(idx)?;
        self.refresh();
        Some(idx)
    }

    pub fn step_back(&mut self) -> Option<usize> {
        let idx = self.engine.as_mut()?.step_back()?;
        self.refresh();
        Some(idx)
    }

    pub fn step_forward(&mut self) -> Option<usize> {
        let idx = self.engine.as_mut()?.step_forward()?;
        self.refresh();
        Some(idx)
    }

    // ─── Pointer ─────────────────────────────────────────────────────────

    /// Route an input event: to the sketch while playing, to the inspector
    /// while paused.
    pub fn pointer(&mut self, event: InputEvent) {
        if self.play_state() != Some(PlayState::Paused) {
            self.events.push(event);
            return;
        }
        let Some(inspector) = self.inspector.as_ref() else {
            return;
        };
        if let InputEvent::MouseMove { pos } = &event
            && !self.drag.is_dragging()
        {
            self.highlight = inspector
                .meta_at(pos[0].floor(), pos[1].floor())
                .map(Highlight::from);
            return;
        }
        // Constants only line up with the text they were pulled from.
        if matches!(event, InputEvent::MouseDown { .. }) && self.has_unapplied_edits() {
            log::debug!("drag refused until the source compiles");
            return;
        }
        if let Some(drag) = self.drag.handle(&event, inspector, &self.registry) {
            self.solve(drag);
        }
    }

    /// The pointer left the canvas.
    pub fn pointer_leave(&mut self) {
        self.highlight = None;
    }

    fn solve(&mut self, drag: DragTarget) {
        if self.has_unapplied_edits() {
            self.drag.pointer_up();
            return;
        }
        let Some(engine) = self.engine.as_mut() else {
            return;
        };
        let solved = optimize::solve_drag(
            |x: &[f64]| engine.draw_with(x),
            &self.registry,
            &drag,
            engine.constants(),
            &self.config.optimizer,
        );
        let solution = match solved {
            Ok(solution) => solution,
            Err(err) => {
                log::debug!("drag of #{} ignored: {err}", drag.id);
                return;
            }
        };
        match sk_core::replace_constants_with_precision(
            &self.source,
            &solution.constants,
            self.config.constant_precision,
        ) {
            Ok(source) => {
                self.live_source.clone_from(&source);
                self.source = source;
            }
            Err(err) => log::warn!("could not write constants back: {err}"),
        }
        engine.set_constants(solution.constants);
        self.refresh();
    }

    // ─── Accessors ───────────────────────────────────────────────────────

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Compile error of the current source, else the error that paused
    /// playback.
    pub fn error(&self) -> Option<&SketchError> {
        self.compile_error
            .as_ref()
            .or_else(|| self.engine.as_ref()?.last_error())
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn engine(&self) -> Option<&Engine> {
        self.engine.as_ref()
    }

    pub fn play_state(&self) -> Option<PlayState> {
        self.engine.as_ref().map(Engine::play_state)
    }

    /// Queue handle for hosts that push input themselves.
    pub fn events(&self) -> EventQueue {
        self.events.clone()
    }

    pub fn inspector(&self) -> Option<&Inspector> {
        self.inspector.as_ref()
    }

    pub fn highlight(&self) -> Option<Highlight> {
        self.highlight
    }

    pub fn frame(&self) -> &[DrawCommand] {
        &self.frame
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_dragging()
    }

    /// Canvas size of the live sketch.
    pub fn size(&self) -> (u32, u32) {
        self.engine
            .as_ref()
            .map_or(sk_core::eval::DEFAULT_SIZE, |engine| engine.sketch().size)
    }

    /// The selected state, for state panels.
    pub fn state(&self) -> Option<&Value> {
        self.engine.as_ref().map(Engine::state)
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }
}
