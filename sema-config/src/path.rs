//! Property paths: ordered forward/inverse predicate steps.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One step of a property path: a predicate IRI traversed forward or
/// inverse. The wire form marks inverse steps with a leading `^`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PathStep {
    /// Follow the predicate subject-to-object
    Forward(String),
    /// Follow the predicate object-to-subject
    Inverse(String),
}

impl PathStep {
    /// The predicate IRI, ignoring direction.
    pub fn iri(&self) -> &str {
        match self {
            PathStep::Forward(iri) | PathStep::Inverse(iri) => iri,
        }
    }

    /// Whether this step is traversed inverse.
    pub fn is_inverse(&self) -> bool {
        matches!(self, PathStep::Inverse(_))
    }
}

impl From<String> for PathStep {
    fn from(s: String) -> Self {
        match s.strip_prefix('^') {
            Some(iri) => PathStep::Inverse(iri.to_string()),
            None => PathStep::Forward(s),
        }
    }
}

impl From<&str> for PathStep {
    fn from(s: &str) -> Self {
        PathStep::from(s.to_string())
    }
}

impl From<PathStep> for String {
    fn from(step: PathStep) -> Self {
        step.to_string()
    }
}

impl fmt::Display for PathStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathStep::Forward(iri) => write!(f, "{iri}"),
            PathStep::Inverse(iri) => write!(f, "^{iri}"),
        }
    }
}

/// An ordered sequence of path steps from a root resource to a value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PropertyPath(pub Vec<PathStep>);

impl PropertyPath {
    pub fn new(steps: Vec<PathStep>) -> Self {
        Self(steps)
    }

    /// Build a path from `^`-marked IRI strings.
    pub fn parse<S: AsRef<str>>(steps: &[S]) -> Self {
        Self(steps.iter().map(|s| PathStep::from(s.as_ref())).collect())
    }

    pub fn steps(&self) -> &[PathStep] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether the predicate appears at any position, forward or inverse.
    pub fn contains_predicate(&self, iri: &str) -> bool {
        self.0.iter().any(|step| step.iri() == iri)
    }

    /// All positions at which the predicate appears, forward or inverse.
    pub fn positions_of(&self, iri: &str) -> Vec<usize> {
        self.0
            .iter()
            .enumerate()
            .filter(|(_, step)| step.iri() == iri)
            .map(|(i, _)| i)
            .collect()
    }

    /// Steps before position `i`.
    pub fn prefix(&self, i: usize) -> &[PathStep] {
        &self.0[..i]
    }

    /// Steps after position `i`.
    pub fn suffix(&self, i: usize) -> &[PathStep] {
        &self.0[i + 1..]
    }

    /// A new path with `tail` appended.
    pub fn join(&self, tail: &PropertyPath) -> PropertyPath {
        let mut steps = self.0.clone();
        steps.extend(tail.0.iter().cloned());
        PropertyPath(steps)
    }
}

impl fmt::Display for PropertyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for step in &self.0 {
            if !first {
                write!(f, "/")?;
            }
            write!(f, "{step}")?;
            first = false;
        }
        Ok(())
    }
}
