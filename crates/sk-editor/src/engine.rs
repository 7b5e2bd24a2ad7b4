//! Playback engine: the live sketch, its constants and its history.
//!
//! While playing, each tick feeds one event batch through `update`, appends
//! the result and draws it. While paused, ticks only redraw the selected
//! history entry and the index can be moved freely. A failing `update` or
//! `draw` never reaches the history; the engine pauses on the last good
//! state instead.

use crate::history::History;
use crate::input::{InputEvent, batch_value};
use sk_core::{DrawCommand, Sketch, SketchError, Value};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayState {
    Playing,
    Paused,
}

#[derive(Debug)]
pub struct Engine {
    sketch: Sketch,
    constants: Vec<f64>,
    history: History,
    play_state: PlayState,
    last_error: Option<SketchError>,
}

impl Engine {
    pub fn new(sketch: Sketch, constants: Vec<f64>, max_history_len: usize) -> Self {
        let history = History::new(sketch.initial_state(), max_history_len);
        Self {
            sketch,
            constants,
            history,
            play_state: PlayState::Paused,
            last_error: None,
        }
    }

    // ─── Frames ──────────────────────────────────────────────────────────

    /// Advance one frame. `events` is the batch drained from the input
    /// queue; paused ticks ignore it.
    pub fn tick(&mut self, events: Vec<InputEvent>) -> Result<Vec<DrawCommand>, SketchError> {
        if self.play_state == PlayState::Paused {
            return self.frame();
        }
        let current = &self.history.current().state;
        let stepped = self
            .sketch
            .update(current, batch_value(&events))
            .and_then(|next| {
                let commands = self.sketch.draw(&next, &self.constants)?;
                Ok((next, commands))
            });
        match stepped {
            Ok((next, commands)) => {
                self.history.push(next, events);
                self.last_error = None;
                Ok(commands)
            }
            Err(err) => Err(self.halt(err)),
        }
    }

    /// Draw the selected history entry without advancing.
    pub fn frame(&mut self) -> Result<Vec<DrawCommand>, SketchError> {
        match self.sketch.draw(&self.history.current().state, &self.constants) {
            Ok(commands) => Ok(commands),
            Err(err) => Err(self.halt(err)),
        }
    }

    /// Draw the selected entry with trial constants. Leaves the engine
    /// untouched either way.
    pub fn draw_with(&self, constants: &[f64]) -> Result<Vec<DrawCommand>, SketchError> {
        self.sketch.draw(&self.history.current().state, constants)
    }

    fn halt(&mut self, err: SketchError) -> SketchError {
        if self.play_state == PlayState::Playing {
            log::warn!("pausing at step {}: {} {err}", self.history.idx(), err.kind());
        }
        self.play_state = PlayState::Paused;
        self.last_error = Some(err.clone());
        err
    }

    // ─── Transport ───────────────────────────────────────────────────────

    /// Resume playing. Everything after the selected entry is discarded
    /// first, so playback branches from what is on screen.
    pub fn play(&mut self) {
        if self.play_state == PlayState::Playing {
            return;
        }
        let dropped = self.history.truncate_after_current();
        if dropped > 0 {
            log::debug!("discarded {dropped} future steps");
        }
        self.play_state = PlayState::Playing;
    }

    pub fn pause(&mut self) {
        self.play_state = PlayState::Paused;
    }

    pub fn toggle(&mut self) -> PlayState {
        match self.play_state {
            PlayState::Playing => self.pause(),
            PlayState::Paused => self.play(),
        }
        self.play_state
    }

    /// History back to the initial state, paused.
    pub fn reset(&mut self) {
        self.history.reset(self.sketch.initial_state());
        self.play_state = PlayState::Paused;
        self.last_error = None;
    }

    /// Select a history entry. Only possible while paused; returns the
    /// clamped index that is now selected.
    pub fn seek(&mut self, idx: usize) -> Option<usize> {
        self.is_paused().then(|| self.history.seek(idx))
    }

    pub fn step_back(&mut self) -> Option<usize> {
        self.is_paused().then(|| self.history.step_back())
    }

    pub fn step_forward(&mut self) -> Option<usize> {
        self.is_paused().then(|| self.history.step_forward())
    }

    // ─── Sketch and constants ────────────────────────────────────────────

    pub fn set_constants(&mut self, constants: Vec<f64>) {
        self.constants = constants;
    }

    /// Adopt a recompiled sketch. History survives when the new initial
    /// state has the same top-level keys as the selected state; otherwise
    /// it restarts from the new initial state.
    pub fn replace_sketch(&mut self, sketch: Sketch, constants: Vec<f64>) {
        let initial = sketch.initial_state();
        if same_keys(&initial, &self.history.current().state) {
            log::debug!("sketch replaced, keeping {} history entries", self.history.len());
        } else {
            log::debug!("state shape changed, restarting history");
            self.history.reset(initial);
        }
        self.sketch = sketch;
        self.constants = constants;
        self.last_error = None;
    }

    // ─── Accessors ───────────────────────────────────────────────────────

    pub fn sketch(&self) -> &Sketch {
        &self.sketch
    }

    pub fn constants(&self) -> &[f64] {
        &self.constants
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn state(&self) -> &Value {
        &self.history.current().state
    }

    pub fn play_state(&self) -> PlayState {
        self.play_state
    }

    pub fn is_paused(&self) -> bool {
        self.play_state == PlayState::Paused
    }

    /// The error that last paused the engine, until the next good step.
    pub fn last_error(&self) -> Option<&SketchError> {
        self.last_error.as_ref()
    }
}

fn same_keys(a: &Value, b: &Value) -> bool {
    let keys = |v: &Value| v.keys().into_iter().collect::<HashSet<_>>();
    keys(a) == keys(b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sk_core::Evaluator;

    const COUNTER: &str = r#"
sketch({
  initialState: { c: 0 },
  update: (s, events) => ({ c: s.c + 1 + events.length }),
  draw: s => [["rect", { pos: [s.c, 10], size: [5, 5] }]]
});
"#;

    fn engine(source: &str) -> Engine {
        let (sketch, report) = Evaluator::new().load(source).unwrap();
        let mut engine = Engine::new(sketch, report.constants, 1000);
        engine.play();
        engine
    }

    fn count(engine: &Engine) -> f64 {
        engine.state().get("c").unwrap().as_number().unwrap()
    }

    #[test]
    fn playing_tick_appends_and_draws_new_state() {
        let mut engine = engine(COUNTER);
        let commands = engine.tick(vec![]).unwrap();
        assert_eq!(engine.history().len(), 2);
        assert_eq!(count(&engine), 1.0);
        assert_eq!(commands[0].point("pos"), Some((1.0, 10.0)));
        engine.tick(vec![InputEvent::Click { pos: [0.0, 0.0] }]).unwrap();
        assert_eq!(count(&engine), 3.0);
        assert_eq!(engine.history().current().events.len(), 1);
    }

    #[test]
    fn paused_tick_only_redraws() {
        let mut engine = engine(COUNTER);
        engine.tick(vec![]).unwrap();
        engine.pause();
        engine.tick(vec![]).unwrap();
        assert_eq!(engine.history().len(), 2);
        assert_eq!(engine.seek(0), Some(0));
        let commands = engine.tick(vec![]).unwrap();
        assert_eq!(commands[0].point("pos"), Some((0.0, 10.0)));
    }

    #[test]
    fn seeking_requires_pause() {
        let mut engine = engine(COUNTER);
        engine.tick(vec![]).unwrap();
        assert_eq!(engine.seek(0), None);
        assert_eq!(engine.step_back(), None);
        assert_eq!(engine.toggle(), PlayState::Paused);
        assert_eq!(engine.step_back(), Some(0));
        assert_eq!(engine.step_forward(), Some(1));
    }

    #[test]
    fn failing_update_pauses_without_appending() {
        let mut engine = engine(
            r#"
sketch({
  initialState: { c: 0 },
  update: s => { if (s.c >= 2) { return s.missing.field; } return { c: s.c + 1 }; },
  draw: s => []
});
"#,
        );
        engine.tick(vec![]).unwrap();
        engine.tick(vec![]).unwrap();
        let err = engine.tick(vec![]).unwrap_err();
        assert_eq!(err.kind(), "evaluation error");
        assert!(engine.is_paused());
        assert_eq!(engine.history().len(), 3);
        assert_eq!(count(&engine), 2.0);
        assert!(engine.last_error().is_some());
    }

    #[test]
    fn reset_goes_back_to_initial_and_pauses() {
        let mut engine = engine(COUNTER);
        engine.tick(vec![]).unwrap();
        engine.reset();
        assert!(engine.is_paused());
        assert_eq!(engine.history().len(), 1);
        assert_eq!(count(&engine), 0.0);
    }

    #[test]
    fn replace_keeps_history_only_for_same_shape() {
        let mut engine = engine(COUNTER);
        engine.tick(vec![]).unwrap();
        engine.tick(vec![]).unwrap();

        let same_shape = COUNTER.replace("s.c + 1", "s.c + 10");
        let (sketch, report) = Evaluator::new().load(&same_shape).unwrap();
        engine.replace_sketch(sketch, report.constants);
        assert_eq!(engine.history().len(), 3);
        engine.tick(vec![]).unwrap();
        assert_eq!(count(&engine), 12.0);

        let new_shape = COUNTER.replace("{ c: 0 }", "{ c: 0, d: 1 }");
        let (sketch, report) = Evaluator::new().load(&new_shape).unwrap();
        engine.replace_sketch(sketch, report.constants);
        assert_eq!(engine.history().len(), 1);
        assert_eq!(engine.play_state(), PlayState::Playing);
    }

    #[test]
    fn constants_feed_draw() {
        let mut engine = engine(COUNTER);
        engine.pause();
        assert_eq!(engine.constants(), &[10.0, 5.0, 5.0][..]);
        engine.set_constants(vec![20.0, 5.0, 5.0]);
        let commands = engine.frame().unwrap();
        assert_eq!(commands[0].point("pos"), Some((0.0, 20.0)));
        let trial = engine.draw_with(&[30.0, 5.0, 5.0]).unwrap();
        assert_eq!(trial[0].point("pos"), Some((0.0, 30.0)));
    }
}
