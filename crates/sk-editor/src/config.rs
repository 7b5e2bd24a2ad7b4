//! Editor configuration.
//!
//! Every field has a default, so a config file only needs the keys it
//! wants to change.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tunables for playback, recompiling and the drag optimizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// History keeps at most this many steps after the initial state.
    pub max_history_len: usize,
    /// Quiet time after the last source edit before a recompile.
    pub debounce_ms: u64,
    pub frame_interval_ms: u64,
    /// Whether a freshly loaded sketch starts in the playing state.
    pub start_playing: bool,
    /// Run `draw(update(initialState, []))` once before adopting a sketch.
    pub dry_run: bool,
    /// Decimal places kept when optimized constants are written back.
    pub constant_precision: u32,
    /// Seed for `Math.random`.
    pub seed: u64,
    pub optimizer: OptimizerConfig,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            max_history_len: 1000,
            debounce_ms: 16,
            frame_interval_ms: 16,
            start_playing: true,
            dry_run: true,
            constant_precision: sk_core::transform::DEFAULT_PRECISION,
            seed: 0,
            optimizer: OptimizerConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    pub max_iterations: usize,
    /// Stop once the objective or the gradient norm drops below this.
    pub tolerance: f64,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            max_iterations: 200,
            tolerance: 1e-6,
        }
    }
}

impl EditorConfig {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_object_is_default() {
        assert_eq!(EditorConfig::from_json("{}").unwrap(), EditorConfig::default());
    }

    #[test]
    fn partial_override() {
        let config = EditorConfig::from_json(
            r#"{ "max_history_len": 10, "optimizer": { "tolerance": 0.01 } }"#,
        )
        .unwrap();
        assert_eq!(config.max_history_len, 10);
        assert_eq!(config.optimizer.tolerance, 0.01);
        assert_eq!(config.optimizer.max_iterations, 200);
        assert_eq!(config.frame_interval(), Duration::from_millis(16));
    }

    #[test]
    fn rejects_wrong_types() {
        assert!(EditorConfig::from_json(r#"{ "debounce_ms": "soon" }"#).is_err());
    }
}
