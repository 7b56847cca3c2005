//! Typed failures of the width estimators.

use thiserror::Error;

/// Why an estimation (or the setup for one) failed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EstimateError {
    /// A hyperparameter is outside its valid domain.
    #[error("invalid hyperparameter `{name}` = {value}: {reason}")]
    InvalidHyperparameter {
        name: &'static str,
        value: String,
        reason: &'static str,
    },

    /// Chair estimation was asked to run without any template.
    #[error("template catalog is empty")]
    EmptyTemplateCatalog,

    /// No template produced a single good match against the query.
    #[error("no template produced a good match")]
    NoMatchFound,

    /// Good matches exist, but none falls inside the seat region.
    #[error("no matched keypoint lies in the seat region")]
    NoKeypointsInRegion,

    /// No detected line passed the near-vertical filter.
    #[error("no near-vertical line found")]
    NoVerticalLineFound,

    /// A diagnostic artifact could not be written.
    #[error("failed to write artifact: {0}")]
    Artifact(String),
}

impl EstimateError {
    pub(crate) fn invalid(name: &'static str, value: impl ToString, reason: &'static str) -> Self {
        Self::InvalidHyperparameter {
            name,
            value: value.to_string(),
            reason,
        }
    }
}
