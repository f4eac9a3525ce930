//! `stockroom-core` - domain building blocks shared by every stockroom crate.
//!
//! Pure types only: identifiers, the domain error model and the aggregate
//! contract. Nothing here performs IO.

pub mod aggregate;
pub mod error;
pub mod event;
pub mod id;

pub use aggregate::{Aggregate, AggregateRoot, ExpectedVersion};
pub use error::{DomainError, DomainResult};
pub use event::DomainEvent;
pub use id::{GroupId, UserId};
