//! Aggregate contract used by the user and group models.

use crate::error::{DomainError, DomainResult};

/// Identity + version of an aggregate root.
pub trait AggregateRoot {
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    fn id(&self) -> &Self::Id;

    /// Number of events applied so far.
    fn version(&self) -> u64;
}

/// Optimistic concurrency expectation for a read-modify-write command.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum ExpectedVersion {
    #[default]
    Any,
    Exact(u64),
}

impl ExpectedVersion {
    pub fn from_option(version: Option<u64>) -> Self {
        version.map_or(Self::Any, Self::Exact)
    }

    pub fn matches(self, actual: u64) -> bool {
        match self {
            ExpectedVersion::Any => true,
            ExpectedVersion::Exact(v) => v == actual,
        }
    }

    pub fn check(self, actual: u64) -> DomainResult<()> {
        if self.matches(actual) {
            Ok(())
        } else {
            Err(DomainError::conflict(format!(
                "stale version (expected: {self:?}, actual: {actual})"
            )))
        }
    }
}

/// Pure decide/evolve split.
///
/// `handle` validates a command against current state and returns the events
/// it would produce; `apply` folds one event into state. Neither does IO.
pub trait Aggregate: AggregateRoot {
    type Command: Clone + core::fmt::Debug;
    type Event: Clone + core::fmt::Debug;

    fn apply(&mut self, event: &Self::Event);

    fn handle(&self, command: &Self::Command) -> DomainResult<Vec<Self::Event>>;

    /// Handle a command and apply the resulting events in place.
    fn execute(&mut self, command: &Self::Command) -> DomainResult<Vec<Self::Event>> {
        let events = self.handle(command)?;
        for event in &events {
            self.apply(event);
        }
        Ok(events)
    }
}
