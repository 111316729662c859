//! The per-run input every stage template is filled from.

use reqwest::Url;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Rejected input; no stage runs when this is returned.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("{field} must be an http(s) URL, got '{value}'")]
    InvalidUrl { field: &'static str, value: String },
}

/// Inputs a user supplies for one run. Immutable once the run starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowInput {
    pub job_posting_url: String,
    pub github_url: Option<String>,
    pub personal_writeup: String,
}

/// Value substituted for a placeholder whose input is absent.
const NOT_PROVIDED: &str = "not provided";

impl WorkflowInput {
    /// Builds and validates an input. Fields are trimmed and an empty
    /// GitHub URL counts as absent.
    pub fn new(
        job_posting_url: impl Into<String>,
        github_url: Option<String>,
        personal_writeup: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let input = Self {
            job_posting_url: job_posting_url.into().trim().to_string(),
            github_url: github_url
                .map(|url| url.trim().to_string())
                .filter(|url| !url.is_empty()),
            personal_writeup: personal_writeup.into().trim().to_string(),
        };
        input.validate()?;
        Ok(input)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.job_posting_url.trim().is_empty() {
            return Err(ValidationError::MissingField("job_posting_url"));
        }
        check_url("job_posting_url", &self.job_posting_url)?;

        if let Some(url) = &self.github_url {
            check_url("github_url", url)?;
        }

        if self.personal_writeup.trim().is_empty() {
            return Err(ValidationError::MissingField("personal_writeup"));
        }
        Ok(())
    }

    /// Value of a template variable, `None` when unknown or absent.
    pub fn variable(&self, name: &str) -> Option<&str> {
        match name {
            "job_posting_url" => Some(self.job_posting_url.as_str()),
            "github_url" => self.github_url.as_deref(),
            "personal_writeup" => Some(self.personal_writeup.as_str()),
            _ => None,
        }
        .filter(|value| !value.is_empty())
    }

    /// Fills `{name}` placeholders. Absent values read as "not provided";
    /// unknown placeholders are left untouched.
    pub fn interpolate(&self, template: &str) -> String {
        render(template, |name| match name {
            "job_posting_url" | "github_url" | "personal_writeup" => {
                Some(self.variable(name).unwrap_or(NOT_PROVIDED))
            }
            _ => None,
        })
        .unwrap_or_else(|partial| partial)
    }

    /// Like [`interpolate`](Self::interpolate) but returns `None` if any
    /// placeholder has no value.
    pub fn try_interpolate(&self, template: &str) -> Option<String> {
        render(template, |name| self.variable(name)).ok()
    }
}

fn check_url(field: &'static str, value: &str) -> Result<(), ValidationError> {
    let invalid = || ValidationError::InvalidUrl {
        field,
        value: value.to_string(),
    };
    let url = Url::parse(value).map_err(|_| invalid())?;
    match url.scheme() {
        "http" | "https" if url.host_str().is_some() => Ok(()),
        _ => Err(invalid()),
    }
}

/// Substitutes `{name}` occurrences. `Err` carries the text rendered with
/// unresolved placeholders kept verbatim.
fn render<'a>(template: &str, lookup: impl Fn(&str) -> Option<&'a str>) -> Result<String, String> {
    let mut out = String::with_capacity(template.len());
    let mut complete = true;
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        match after.find('}') {
            Some(close) if is_identifier(&after[..close]) => {
                let name = &after[..close];
                match lookup(name) {
                    Some(value) => out.push_str(value),
                    None => {
                        complete = false;
                        out.push('{');
                        out.push_str(name);
                        out.push('}');
                    }
                }
                rest = &after[close + 1..];
            }
            _ => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);

    if complete { Ok(out) } else { Err(out) }
}

fn is_identifier(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}
