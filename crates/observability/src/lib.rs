//! Process-wide tracing setup.

pub mod subscriber;

pub use subscriber::{LogFormat, init};
