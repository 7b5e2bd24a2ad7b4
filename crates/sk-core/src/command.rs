//! Drawing commands as produced by a sketch's `draw` function.

use crate::value::Value;
use serde::Serialize;

/// Commands every renderer understands.
pub const BUILTIN_COMMANDS: &[&str] = &["background", "line", "path", "ellipse", "rect"];

/// Key of the source-location record injected into command arguments.
pub const META_KEY: &str = "__meta";

/// The set of command names the transformer annotates.
pub trait CommandVocabulary {
    fn is_command(&self, name: &str) -> bool;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinCommands;

impl CommandVocabulary for BuiltinCommands {
    fn is_command(&self, name: &str) -> bool {
        BUILTIN_COMMANDS.contains(&name)
    }
}

/// 1-based source line range of the expression that produced a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Meta {
    pub line_start: u32,
    pub line_end: u32,
}

/// One `[name, args]` tuple.
#[derive(Debug, Clone)]
pub struct DrawCommand {
    pub name: String,
    pub args: Value,
}

impl DrawCommand {
    /// Read a `["name", { ... }]` tuple. A missing second element reads as
    /// an empty argument record; anything that is not a tuple headed by a
    /// string is rejected.
    pub fn from_value(value: &Value) -> Option<Self> {
        let items = value.as_array()?;
        let name = items.first()?.as_str()?.to_string();
        let args = match items.get(1) {
            Some(args @ Value::Object(_)) => args.clone(),
            _ => Value::object([]),
        };
        Some(Self { name, args })
    }

    pub fn arg(&self, key: &str) -> Option<Value> {
        self.args.get(key)
    }

    pub fn number(&self, key: &str) -> Option<f64> {
        self.arg(key)
            .and_then(|v| v.as_number())
            .filter(|n| n.is_finite())
    }

    pub fn point(&self, key: &str) -> Option<(f64, f64)> {
        self.arg(key).and_then(|v| v.as_point())
    }

    pub fn meta(&self) -> Option<Meta> {
        let meta = self.arg(META_KEY)?;
        let line = |key: &str| {
            meta.get(key)
                .and_then(|v| v.as_number())
                .filter(|n| n.is_finite() && *n >= 1.0)
                .map(|n| n as u32)
        };
        Some(Meta {
            line_start: line("lineStart")?,
            line_end: line("lineEnd")?,
        })
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!([self.name, self.args.to_json()])
    }
}
