/// Represents an issue found while validating a workflow definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationIssue {
    /// A hard error: the workflow cannot be executed as declared.
    Error(String),
    /// A warning: the workflow runs, but something is probably unintended.
    Warning(String),
}

/// The result of a workflow validation pass.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error(&mut self, msg: impl Into<String>) {
        self.issues.push(ValidationIssue::Error(msg.into()));
    }

    pub fn add_warning(&mut self, msg: impl Into<String>) {
        self.issues.push(ValidationIssue::Warning(msg.into()));
    }

    pub fn is_safe(&self) -> bool {
        !self.issues.iter().any(|i| matches!(i, ValidationIssue::Error(_)))
    }

    pub fn has_warnings(&self) -> bool {
        self.issues.iter().any(|i| matches!(i, ValidationIssue::Warning(_)))
    }

    pub fn errors(&self) -> Vec<String> {
        self.issues
            .iter()
            .filter_map(|i| match i {
                ValidationIssue::Error(msg) => Some(msg.clone()),
                ValidationIssue::Warning(_) => None,
            })
            .collect()
    }

    pub fn log_summary(&self) {
        if self.is_safe() && !self.has_warnings() {
            log::debug!("Workflow validation passed: every dependency and capability is declared.");
            return;
        }

        for issue in &self.issues {
            match issue {
                ValidationIssue::Error(msg) => log::error!("Workflow definition error: {}", msg),
                ValidationIssue::Warning(msg) => log::warn!("Workflow definition warning: {}", msg),
            }
        }
    }
}
