use std::sync::Arc;

use axum::{
    extract::{OriginalUri, Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::Response,
};
use chrono::Utc;

use stockroom_auth::{AccessRequest, Decision};

use crate::app::{errors, services::AppServices};
use crate::context::SubjectContext;

fn authorization_header(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
}

/// Full gate: credential, route, verb and merged permissions.
pub async fn authorize(State(services): State<Arc<AppServices>>, mut req: Request, next: Next) -> Response {
    let path = req
        .extensions()
        .get::<OriginalUri>()
        .map(|uri| uri.0.path().to_string())
        .unwrap_or_else(|| req.uri().path().to_string());

    let decision = services.gate.authorize(
        &AccessRequest {
            authorization: authorization_header(req.headers()),
            path: &path,
            method: req.method().as_str(),
        },
        Utc::now(),
    );

    match decision {
        Decision::Allowed(grant) => {
            req.extensions_mut().insert(SubjectContext::granted(grant));
            next.run(req).await
        }
        Decision::Denied(denial) => errors::denial_to_response(&denial),
    }
}

/// Credential check only.
pub async fn authenticate(State(services): State<Arc<AppServices>>, mut req: Request, next: Next) -> Response {
    let authenticated = services
        .gate
        .authenticate(authorization_header(req.headers()), Utc::now());

    match authenticated {
        Ok(identity) => {
            req.extensions_mut().insert(SubjectContext::authenticated(identity));
            next.run(req).await
        }
        Err(denial) => errors::denial_to_response(&denial),
    }
}
