use chrono::{DateTime, Utc};

/// A fact emitted by an aggregate.
///
/// Events are immutable and named with a stable dotted identifier
/// (e.g. `"auth.group.permission_added"`) so they can be logged and audited.
pub trait DomainEvent: Clone + core::fmt::Debug + Send + Sync + 'static {
    fn event_type(&self) -> &'static str;

    fn occurred_at(&self) -> DateTime<Utc>;
}
