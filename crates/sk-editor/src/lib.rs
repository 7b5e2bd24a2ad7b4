pub mod config;
pub mod drag;
pub mod engine;
pub mod history;
pub mod input;
pub mod optimize;
pub mod scheduler;
pub mod session;

pub use config::{EditorConfig, OptimizerConfig};
pub use drag::{DragTool, NumberPicker};
pub use engine::{Engine, PlayState};
pub use history::{Entry, History};
pub use input::{EventQueue, InputEvent, KeyEvent};
pub use optimize::{DragTarget, Solution, SolverError};
pub use scheduler::{CancelToken, Debouncer, FrameScheduler};
pub use session::{Highlight, Session};
