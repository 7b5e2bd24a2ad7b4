//! Integration tests: playback engine and time-travel history (sk-editor).
//!
//! Drives real sketches through `Session` and `Engine`, checking history
//! bounds, branch discard on resume, scrubbing and hot reload.

use pretty_assertions::assert_eq;
use sk_core::Evaluator;
use sk_editor::{EditorConfig, Engine, InputEvent, PlayState, Session};

const COUNTER: &str = include_str!("fixtures/counter.js");
const ANIMATED_RECTANGLE: &str = include_str!("../../sk-cli/sketches/animated_rectangle.js");

fn engine(source: &str, max_history_len: usize) -> Engine {
    let (sketch, report) = Evaluator::new().load(source).unwrap();
    let mut engine = Engine::new(sketch, report.constants, max_history_len);
    engine.play();
    engine
}

fn counter_at(engine: &Engine, idx: usize) -> f64 {
    let entry = engine.history().get(idx).unwrap();
    entry.state.get("c").unwrap().as_number().unwrap()
}

// ─── History ─────────────────────────────────────────────────────────────

#[test]
fn five_ticks_of_the_counter() {
    let mut engine = engine(COUNTER, 1000);
    for _ in 0..5 {
        let commands = engine.tick(vec![]).unwrap();
        assert_eq!(commands[0].name, "background");
    }
    assert_eq!(engine.history().len(), 6);
    assert_eq!(counter_at(&engine, 5), 5.0);
    assert_eq!(counter_at(&engine, 0), 0.0);
}

#[test]
fn history_is_bounded() {
    let max = 1000;
    let mut engine = engine(COUNTER, max);
    for _ in 0..max + 250 {
        engine.tick(vec![]).unwrap();
    }
    assert_eq!(engine.history().len(), max + 1);
    assert_eq!(engine.history().idx(), max);
    assert_eq!(counter_at(&engine, max), (max + 250) as f64);
    assert_eq!(counter_at(&engine, 0), 250.0);
}

#[test]
fn resume_discards_the_future() {
    let mut engine = engine(COUNTER, 1000);
    for _ in 0..10 {
        engine.tick(vec![]).unwrap();
    }
    engine.pause();
    assert_eq!(engine.seek(4), Some(4));
    // Scrubbing never calls update.
    engine.tick(vec![]).unwrap();
    assert_eq!(engine.history().len(), 11);

    engine.play();
    assert_eq!(engine.history().len(), 5);
    engine.tick(vec![]).unwrap();
    assert_eq!(engine.history().len(), 6);
    assert_eq!(counter_at(&engine, 5), 5.0);
}

#[test]
fn events_are_recorded_with_their_step() {
    let mut engine = engine(COUNTER, 1000);
    engine.tick(vec![InputEvent::MouseDown { pos: [1.0, 2.0] }]).unwrap();
    engine.tick(vec![]).unwrap();
    assert_eq!(engine.history().get(1).unwrap().events.len(), 1);
    assert!(engine.history().get(2).unwrap().events.is_empty());
}

#[test]
fn failing_draw_holds_last_good_state() {
    let source = r##"
sketch({
  initialState: { c: 0 },
  update: s => ({ c: s.c + 1 }),
  draw: s => s.c > 2 ? s.boom() : [["background", { fill: "#000" }]]
});
"##;
    let mut engine = engine(source, 1000);
    engine.tick(vec![]).unwrap();
    engine.tick(vec![]).unwrap();
    assert!(engine.tick(vec![]).is_err());
    assert_eq!(engine.play_state(), PlayState::Paused);
    assert_eq!(engine.history().len(), 3);
    assert_eq!(counter_at(&engine, 2), 2.0);
    // The held state still draws.
    assert!(engine.frame().is_ok());
}

// ─── Session ─────────────────────────────────────────────────────────────

fn rect_size(session: &Session) -> f64 {
    session.state().unwrap().get("rectSize").unwrap().as_number().unwrap()
}

#[test]
fn scrubbing_the_animated_rectangle() {
    let mut session = Session::new(EditorConfig::default());
    session.open(ANIMATED_RECTANGLE).unwrap();
    for _ in 0..3 {
        session.tick().unwrap();
    }
    assert_eq!(rect_size(&session), 103.0);

    session.pause();
    assert_eq!(session.step_back(), Some(2));
    assert_eq!(session.step_back(), Some(1));
    assert_eq!(rect_size(&session), 101.0);
    let rect = &session.frame()[1];
    assert_eq!(rect.point("pos"), Some((249.5, 249.5)));
    assert_eq!(session.step_forward(), Some(2));
    assert_eq!(session.seek(99), Some(3));

    session.reset();
    assert_eq!(session.play_state(), Some(PlayState::Paused));
    assert_eq!(rect_size(&session), 100.0);
    assert_eq!(session.engine().unwrap().history().len(), 1);
}

#[test]
fn hot_reload_keeps_history_for_the_same_state_shape() {
    let mut session = Session::new(EditorConfig::default());
    session.open(ANIMATED_RECTANGLE).unwrap();
    session.tick().unwrap();
    session.tick().unwrap();

    let recolored = ANIMATED_RECTANGLE.replace("#050505", "#ff0000");
    session.open(&recolored).unwrap();
    assert_eq!(session.engine().unwrap().history().len(), 3);
    assert_eq!(rect_size(&session), 102.0);

    let reshaped = ANIMATED_RECTANGLE.replace("direction: 1\n", "direction: 1,\n    speed: 2\n");
    session.open(&reshaped).unwrap();
    assert_eq!(session.engine().unwrap().history().len(), 1);
    assert_eq!(rect_size(&session), 100.0);
}

#[test]
fn seeded_runs_are_reproducible() {
    let source = r#"
sketch({
  initialState: { xs: [] },
  update: s => ({ xs: s.xs.concat([Math.random()]) }),
  draw: s => []
});
"#;
    let run = || {
        let mut session = Session::new(EditorConfig {
            seed: 7,
            ..EditorConfig::default()
        });
        session.open(source).unwrap();
        for _ in 0..4 {
            session.tick().unwrap();
        }
        session.state().unwrap().to_json()
    };
    assert_eq!(run(), run());
}
