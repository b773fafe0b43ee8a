//! Per-item outcomes and the position-aligned result set.

use std::ops::Index;

use thiserror::Error;

/// One element of the input batch paired with its zero-based position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem<T> {
    pub index: usize,
    pub item: T,
}

/// Why a single item did not produce a value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ItemFailure<E> {
    /// The operation returned an error.
    #[error("{0}")]
    Failed(E),
    /// The operation panicked. The panic was caught at this position.
    #[error("operation panicked: {0}")]
    Panicked(String),
}

impl<E> ItemFailure<E> {
    /// The operation's own error, if it returned one.
    #[must_use]
    pub fn error(&self) -> Option<&E> {
        match self {
            Self::Failed(err) => Some(err),
            Self::Panicked(_) => None,
        }
    }
}

/// Settled result for one input position.
///
/// A sum type rather than `Option` + error fields, so a position is never
/// half-populated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<R, E> {
    Success(R),
    Failure(ItemFailure<E>),
}

impl<R, E> Outcome<R, E> {
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::Failure(_))
    }

    #[must_use]
    pub fn success(&self) -> Option<&R> {
        match self {
            Self::Success(value) => Some(value),
            Self::Failure(_) => None,
        }
    }

    #[must_use]
    pub fn failure(&self) -> Option<&ItemFailure<E>> {
        match self {
            Self::Success(_) => None,
            Self::Failure(reason) => Some(reason),
        }
    }

    pub fn into_result(self) -> Result<R, ItemFailure<E>> {
        match self {
            Self::Success(value) => Ok(value),
            Self::Failure(reason) => Err(reason),
        }
    }
}

/// Outcomes for a whole batch, indexed identically to the input.
///
/// `results[i]` always corresponds to `items[i]`, whatever order the
/// operations actually completed in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultSet<R, E> {
    outcomes: Vec<Outcome<R, E>>,
}

impl<R, E> ResultSet<R, E> {
    pub(crate) fn from_vec(outcomes: Vec<Outcome<R, E>>) -> Self {
        Self { outcomes }
    }

    pub(crate) fn empty() -> Self {
        Self {
            outcomes: Vec::new(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Outcome<R, E>> {
        self.outcomes.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Outcome<R, E>> {
        self.outcomes.iter()
    }

    /// Successful values with their input positions.
    pub fn successes(&self) -> impl Iterator<Item = (usize, &R)> {
        self.outcomes
            .iter()
            .enumerate()
            .filter_map(|(index, outcome)| outcome.success().map(|value| (index, value)))
    }

    /// Failure reasons with their input positions.
    pub fn failures(&self) -> impl Iterator<Item = (usize, &ItemFailure<E>)> {
        self.outcomes
            .iter()
            .enumerate()
            .filter_map(|(index, outcome)| outcome.failure().map(|reason| (index, reason)))
    }

    #[must_use]
    pub fn success_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.outcomes.len() - self.success_count()
    }

    #[must_use]
    pub fn into_vec(self) -> Vec<Outcome<R, E>> {
        self.outcomes
    }

    #[must_use]
    pub fn into_results(self) -> Vec<Result<R, ItemFailure<E>>> {
        self.outcomes
            .into_iter()
            .map(Outcome::into_result)
            .collect()
    }
}

impl<R, E> Index<usize> for ResultSet<R, E> {
    type Output = Outcome<R, E>;

    fn index(&self, index: usize) -> &Self::Output {
        &self.outcomes[index]
    }
}

impl<R, E> IntoIterator for ResultSet<R, E> {
    type Item = Outcome<R, E>;
    type IntoIter = std::vec::IntoIter<Outcome<R, E>>;

    fn into_iter(self) -> Self::IntoIter {
        self.outcomes.into_iter()
    }
}

impl<'a, R, E> IntoIterator for &'a ResultSet<R, E> {
    type Item = &'a Outcome<R, E>;
    type IntoIter = std::slice::Iter<'a, Outcome<R, E>>;

    fn into_iter(self) -> Self::IntoIter {
        self.outcomes.iter()
    }
}
