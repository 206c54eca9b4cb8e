//! Interpreter session state: the evaluator (and with it the environment)
//! plus the execution counter.

use vibe_eval::{Evaluator, Streams};

use crate::config::KernelConfig;

/// Counts submissions that parsed. Never decremented.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecutionCounter(u32);

impl ExecutionCounter {
    pub fn current(self) -> u32 {
        self.0
    }

    /// Advance and return the new count.
    pub(crate) fn increment(&mut self) -> u32 {
        self.0 = self.0.saturating_add(1);
        self.0
    }
}

/// One kernel session. Globals defined by any submission stay visible to
/// every later one until the session is dropped.
pub struct Session {
    pub(crate) evaluator: Evaluator,
    pub(crate) counter: ExecutionCounter,
    config: KernelConfig,
}

impl Session {
    pub fn new() -> Self {
        Self::with_config(KernelConfig::default())
    }

    pub fn with_config(config: KernelConfig) -> Self {
        // Output only matters while a submission is captured.
        let mut evaluator = Evaluator::with_streams(Streams::discard());
        evaluator.set_max_depth(config.max_call_depth);
        Self {
            evaluator,
            counter: ExecutionCounter::default(),
            config,
        }
    }

    pub fn execution_count(&self) -> u32 {
        self.counter.current()
    }

    /// Read-only view of the evaluator and its environment.
    pub fn evaluator(&self) -> &Evaluator {
        &self.evaluator
    }

    pub fn config(&self) -> &KernelConfig {
        &self.config
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
