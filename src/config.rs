//! Runtime tuning for the execution task.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Calibration and safety bounds for script execution.
///
/// Defaults match the simulator's calibration. Hosts that need different
/// pacing (headless test runs, faster turn animations) pass a modified
/// value to [`crate::Interpreter::with_config`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Sleep inserted at every loop boundary so scripts stay cancellable
    /// without busy-spinning.
    pub loop_yield: Duration,
    /// Granularity at which `delay`/`delayMicroseconds` re-check the
    /// cancellation flag.
    pub delay_slice: Duration,
    /// How long `left()`/`right()` hold the execution task while the
    /// simulation completes the snap turn.
    pub turn_hold: Duration,
    /// Largest array a script may allocate; larger size expressions are
    /// clamped.
    pub max_array_len: usize,
    /// User-function call depth at which further calls return void instead
    /// of recursing.
    pub max_call_depth: usize,
    /// Diagnostics retained per run; the rest are dropped.
    pub max_diagnostics: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            loop_yield: Duration::from_micros(100),
            delay_slice: Duration::from_millis(5),
            turn_hold: Duration::from_millis(250),
            max_array_len: 65_536,
            max_call_depth: 64,
            max_diagnostics: 64,
        }
    }
}
