use std::collections::HashMap;

use crate::core::error::WorkflowError;
use crate::llm::ContextBlock;

/// Stage outputs of a single run. Each stage publishes exactly once.
#[derive(Debug, Default)]
pub struct RunContext {
    outputs: HashMap<String, String>,
}

impl RunContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&mut self, stage: &str, output: String) -> Result<(), WorkflowError> {
        if self.outputs.contains_key(stage) {
            return Err(WorkflowError::AlreadyPublished(stage.to_string()));
        }
        self.outputs.insert(stage.to_string(), output);
        Ok(())
    }

    pub fn get(&self, stage: &str) -> Option<&str> {
        self.outputs.get(stage).map(String::as_str)
    }

    pub fn contains(&self, stage: &str) -> bool {
        self.outputs.contains_key(stage)
    }

    /// True when every named dependency has published.
    pub fn satisfies(&self, dependencies: &[String]) -> bool {
        dependencies.iter().all(|d| self.outputs.contains_key(d))
    }

    /// Dependency outputs as context blocks, in dependency order.
    pub fn blocks_for(&self, dependencies: &[String]) -> Vec<ContextBlock> {
        dependencies
            .iter()
            .filter_map(|d| self.get(d).map(|output| ContextBlock::stage(d.clone(), output)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }

    pub(crate) fn take(&mut self, stage: &str) -> Option<String> {
        self.outputs.remove(stage)
    }
}
