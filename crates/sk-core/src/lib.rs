pub mod ast;
pub mod builtins;
pub mod command;
pub mod emitter;
pub mod error;
pub mod eval;
pub mod interp;
pub mod lexer;
pub mod name;
pub mod parser;
pub mod transform;
pub mod value;
pub mod visit;

pub use builtins::{BuiltinModules, ModuleResolver};
pub use command::{BUILTIN_COMMANDS, BuiltinCommands, CommandVocabulary, DrawCommand, Meta};
pub use error::{SketchError, Span};
pub use eval::{EvalReport, Evaluator, Sketch, SketchFn};
pub use name::Name;
pub use parser::parse_program;
pub use transform::{
    Extracted, add_meta, compile, number_at, process_require, pull_out_constants,
    replace_constants, replace_constants_with_precision, replace_number_at,
};
pub use value::Value;
