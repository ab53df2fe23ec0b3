//! Step tracing for the question pipeline.
//!
//! The pipeline reports each transition to an optional [`TraceSink`]. The
//! binary plugs in [`LogTrace`], which forwards to the `log` facade (and so to
//! stderr); tests use [`MemoryTrace`] to assert on the recorded steps.

use std::cell::RefCell;

use log::debug;

pub trait TraceSink {
    fn record(&self, step: &str, detail: &str);
}

/// Forwards steps to `log::debug!` under the `tabular_qa::trace` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogTrace;

impl TraceSink for LogTrace {
    fn record(&self, step: &str, detail: &str) {
        debug!(target: "tabular_qa::trace", "{step}: {detail}");
    }
}

#[derive(Debug, Default)]
pub struct MemoryTrace {
    steps: RefCell<Vec<(String, String)>>,
}

impl MemoryTrace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn steps(&self) -> Vec<(String, String)> {
        self.steps.borrow().clone()
    }

    pub fn step_names(&self) -> Vec<String> {
        self.steps
            .borrow()
            .iter()
            .map(|(step, _)| step.clone())
            .collect()
    }
}

impl TraceSink for MemoryTrace {
    fn record(&self, step: &str, detail: &str) {
        self.steps
            .borrow_mut()
            .push((step.to_string(), detail.to_string()));
    }
}
