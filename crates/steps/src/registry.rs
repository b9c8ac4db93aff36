//! Explicit step registry.
//!
//! Maps step names to [`Step`] implementations. The registry is an owned
//! value injected through the run context — there is no process-wide
//! registration, so tests compose exactly the registry they need.

use std::collections::HashMap;
use std::sync::Arc;

use crate::traits::Step;

#[derive(Default)]
pub struct StepRegistry {
    steps: HashMap<String, Arc<dyn Step>>,
}

impl StepRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a step under its own name. Re-registering a name replaces
    /// the previous entry.
    pub fn register(&mut self, step: Arc<dyn Step>) -> &mut Self {
        self.steps.insert(step.name().to_string(), step);
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Step>> {
        self.steps.get(name).map(Arc::clone)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}
