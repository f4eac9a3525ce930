//! HTTP API: server wiring, the authorization middleware and the
//! administration endpoints.

pub mod app;
pub mod context;
pub mod middleware;
