use std::collections::{HashMap, HashSet};

use crate::core::error::DefinitionError;
use crate::core::stage::{Stage, StageBuilder};
use crate::core::validation::ValidationResult;

/// An ordered collection of stages whose dependency edges form a DAG.
///
/// Built once and never mutated; every run borrows it.
#[derive(Debug, Clone)]
pub struct Workflow {
    stages: Vec<Stage>,
    /// Indices into `stages` in a dependency-respecting order.
    order: Vec<usize>,
}

impl Workflow {
    pub fn builder() -> WorkflowBuilder {
        WorkflowBuilder::default()
    }

    /// Stages in declaration order.
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn stage(&self, name: &str) -> Option<&Stage> {
        self.stages.iter().find(|s| s.name() == name)
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Stages in an order where every dependency precedes its dependents.
    /// Ties keep declaration order.
    pub fn execution_order(&self) -> impl Iterator<Item = &Stage> {
        self.order.iter().map(|&i| &self.stages[i])
    }

    /// Names of stages that list `name` as a dependency.
    pub fn dependents(&self, name: &str) -> Vec<&str> {
        self.stages
            .iter()
            .filter(|s| s.depends_on().iter().any(|d| d == name))
            .map(Stage::name)
            .collect()
    }

    /// Checks the structural contract of a set of stages.
    pub fn validate(stages: &[Stage]) -> ValidationResult {
        let mut result = ValidationResult::new();

        if stages.is_empty() {
            result.add_error("workflow has no stages");
            return result;
        }

        let mut seen = HashSet::new();
        for stage in stages {
            if !seen.insert(stage.name()) {
                result.add_error(format!("stage '{}' is declared more than once", stage.name()));
            }
        }

        let mut output_files: HashMap<&str, &str> = HashMap::new();
        for stage in stages {
            for dep in stage.depends_on() {
                if dep == stage.name() {
                    result.add_error(format!("stage '{}' depends on itself", stage.name()));
                } else if !seen.contains(dep.as_str()) {
                    result.add_error(format!(
                        "stage '{}' depends on unknown stage '{}'",
                        stage.name(),
                        dep
                    ));
                }
            }

            for request in stage.tool_requests() {
                if !stage.capabilities().contains(&request.capability) {
                    result.add_error(format!(
                        "stage '{}' requests {} without declaring that capability",
                        stage.name(),
                        request.capability
                    ));
                }
            }

            if let Some(file) = stage.output_file() {
                if file.is_empty() || file.contains(['/', '\\']) || file == "." || file == ".." {
                    result.add_error(format!(
                        "stage '{}' has output file '{}', expected a bare file name",
                        stage.name(),
                        file
                    ));
                }
                if let Some(other) = output_files.insert(file, stage.name()) {
                    result.add_error(format!(
                        "stages '{}' and '{}' both write '{}'",
                        other,
                        stage.name(),
                        file
                    ));
                }
            }
        }

        if result.is_safe() {
            let order = topological_order(stages);
            if order.len() != stages.len() {
                let placed: HashSet<usize> = order.into_iter().collect();
                let stuck: Vec<&str> = stages
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| !placed.contains(i))
                    .map(|(_, s)| s.name())
                    .collect();
                result.add_error(format!(
                    "dependency cycle between stages: {}",
                    stuck.join(", ")
                ));
            }
        }

        for stage in stages {
            let consumed = stages
                .iter()
                .any(|s| s.depends_on().iter().any(|d| d == stage.name()));
            if !consumed && stage.output_file().is_none() {
                result.add_warning(format!(
                    "output of stage '{}' is neither used by another stage nor persisted",
                    stage.name()
                ));
            }
        }

        result
    }
}

/// Kahn's algorithm, always taking the earliest-declared ready stage.
/// Returns fewer indices than stages when a cycle exists.
fn topological_order(stages: &[Stage]) -> Vec<usize> {
    let mut placed: HashSet<&str> = HashSet::new();
    let mut order = Vec::with_capacity(stages.len());

    loop {
        let next = stages.iter().enumerate().find(|(i, stage)| {
            !order.contains(i) && stage.depends_on().iter().all(|d| placed.contains(d.as_str()))
        });
        match next {
            Some((i, stage)) => {
                placed.insert(stage.name());
                order.push(i);
            }
            None => break,
        }
    }

    order
}

/// Builder for [`Workflow`].
#[derive(Default)]
pub struct WorkflowBuilder {
    stages: Vec<StageBuilder>,
}

impl WorkflowBuilder {
    pub fn stage(mut self, stage: StageBuilder) -> Self {
        self.stages.push(stage);
        self
    }

    /// Builds every stage and validates the graph.
    pub fn build(self) -> Result<Workflow, DefinitionError> {
        let mut issues = Vec::new();
        let mut stages = Vec::with_capacity(self.stages.len());
        for builder in self.stages {
            match builder.build() {
                Ok(stage) => stages.push(stage),
                Err(issue) => issues.push(issue),
            }
        }
        if !issues.is_empty() {
            return Err(DefinitionError { issues });
        }

        let validation = Workflow::validate(&stages);
        validation.log_summary();
        if !validation.is_safe() {
            return Err(DefinitionError {
                issues: validation.errors(),
            });
        }

        let order = topological_order(&stages);
        Ok(Workflow { stages, order })
    }
}
