use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::StatusCode;
use serde_json::json;
use stockroom_api::app::services::{AppServices, build_services};
use stockroom_auth::JwtClaims;
use stockroom_core::UserId;
use stockroom_infra::load_config_from_str;

const SECRET: &str = "test-secret";

struct TestServer {
    base_url: String,
    services: Arc<AppServices>,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        let config = load_config_from_str(&format!(
            r#"
            [auth]
            jwt_secret = "{SECRET}"
            default_domain = "localhost"

            [bootstrap]
            admin_login = "0001"
            admin_email = "admin@example.com"
            "#
        ))
        .expect("config should parse");
        let services = Arc::new(build_services(&config).expect("services should build"));

        // Build app (same router as prod), but bind to an ephemeral port.
        let app = stockroom_api::app::build_app(services.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            services,
            handle,
        }
    }

    fn admin_id(&self) -> UserId {
        self.services
            .directory
            .find_user_by_login("0001")
            .unwrap()
            .expect("bootstrap admin should exist")
            .id
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn mint_jwt(sub: UserId) -> String {
    let claims = JwtClaims::new(sub, Utc::now(), ChronoDuration::minutes(10)).with_login("tester");

    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .expect("failed to encode jwt")
}

async fn body(res: reqwest::Response) -> serde_json::Value {
    res.json().await.expect("response should be json")
}

/// Create a user through the API as the administrator and return its id.
async fn create_user(server: &TestServer, client: &reqwest::Client, admin: &str, payload: serde_json::Value) -> UserId {
    let res = client
        .post(server.url("/api/users"))
        .bearer_auth(admin)
        .json(&payload)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);

    let v = body(res).await;
    v["data"]["id"].as_str().unwrap().parse().unwrap()
}

#[tokio::test]
async fn health_is_public() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client.get(server.url("/health")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn missing_or_bad_token_is_401() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client.get(server.url("/api/groups")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let v = body(res).await;
    assert_eq!(v["success"], false);
    assert_eq!(v["type"], "authenticationError");

    let res = client
        .get(server.url("/api/groups"))
        .bearer_auth("not-a-jwt")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn unknown_route_is_404_even_for_admin() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let token = mint_jwt(server.admin_id());

    let res = client
        .get(server.url("/api/nowhere"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_eq!(body(res).await["type"], "resourceNotFound");
}

#[tokio::test]
async fn verb_disabled_on_route_is_403() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let token = mint_jwt(server.admin_id());

    // `routes` is registered read-only.
    let res = client
        .delete(server.url("/api/routes"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let v = body(res).await;
    assert_eq!(v["type"], "forbidden");
    assert_eq!(v["reason"], "action_disabled");
}

#[tokio::test]
async fn verb_without_action_is_405() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let token = mint_jwt(server.admin_id());

    let res = client
        .request(reqwest::Method::OPTIONS, server.url("/api/produtos"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::METHOD_NOT_ALLOWED);

    let v = body(res).await;
    assert_eq!(v["type"], "methodNotAllowed");
    assert_eq!(v["reason"], "unsupported_method");
}

#[tokio::test]
async fn user_with_unknown_group_is_not_created() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let admin = mint_jwt(server.admin_id());

    let payload = json!({
        "name": "Orphan",
        "login": "0400",
        "email": "orphan@example.com",
        "groups": [stockroom_core::GroupId::new()]
    });
    let res = client
        .post(server.url("/api/users"))
        .bearer_auth(&admin)
        .json(&payload)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert!(server.services.directory.find_user_by_login("0400").unwrap().is_none());

    // Same login and email succeed once the group reference is dropped.
    create_user(
        &server,
        &client,
        &admin,
        json!({ "name": "Orphan", "login": "0400", "email": "orphan@example.com" }),
    )
    .await;
}

#[tokio::test]
async fn admin_can_list_groups() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let token = mint_jwt(server.admin_id());

    let res = client
        .get(server.url("/api/groups"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let v = body(res).await;
    assert_eq!(v["success"], true);
    assert_eq!(v["data"][0]["name"], "Administradores");
}

#[tokio::test]
async fn user_without_permissions_is_403() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let admin = mint_jwt(server.admin_id());

    let plain = create_user(
        &server,
        &client,
        &admin,
        json!({ "name": "Plain", "login": "0100", "email": "plain@example.com" }),
    )
    .await;

    let res = client
        .get(server.url("/api/groups"))
        .bearer_auth(mint_jwt(plain))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let v = body(res).await;
    assert_eq!(v["type"], "forbidden");
    assert!(v["message"].as_str().unwrap().contains("route 'groups'"));
}

#[tokio::test]
async fn individual_record_overrides_group_grant() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let admin = mint_jwt(server.admin_id());

    let res = client
        .post(server.url("/api/groups"))
        .bearer_auth(&admin)
        .json(&json!({
            "name": "Readers",
            "description": "read groups",
            "permissions": [{ "route": "groups", "canRead": true }]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let group_id = body(res).await["data"]["id"].as_str().unwrap().to_string();

    // The individual record denies what the group grants.
    let user = create_user(
        &server,
        &client,
        &admin,
        json!({
            "name": "Reader",
            "login": "0200",
            "email": "reader@example.com",
            "permissions": [{ "route": "groups", "canRead": false }],
            "groups": [group_id]
        }),
    )
    .await;
    let token = mint_jwt(user);

    let res = client
        .get(server.url("/api/groups"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    // Drop the individual record: the group grant now applies.
    let res = client
        .delete(server.url(&format!("/api/users/{user}/permissions/groups")))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = client
        .get(server.url("/api/groups"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn deactivated_user_is_denied() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let admin = mint_jwt(server.admin_id());

    let user = create_user(
        &server,
        &client,
        &admin,
        json!({
            "name": "Temp",
            "login": "0300",
            "email": "temp@example.com",
            "permissions": [{ "route": "groups", "canRead": true }]
        }),
    )
    .await;
    let token = mint_jwt(user);

    let res = client
        .get(server.url("/api/groups"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = client
        .delete(server.url(&format!("/api/users/{user}")))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body(res).await["data"]["active"], false);

    let res = client
        .get(server.url("/api/groups"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn me_needs_only_a_valid_token() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client.get(server.url("/api/auth/me")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    // Unknown subject: authenticated, no account.
    let res = client
        .get(server.url("/api/auth/me"))
        .bearer_auth(mint_jwt(UserId::new()))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let v = body(res).await;
    assert_eq!(v["data"]["subject"]["login"], "tester");
    assert!(v["data"]["account"].is_null());
}

#[tokio::test]
async fn explain_reports_the_deciding_source() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let admin = mint_jwt(server.admin_id());

    let res = client
        .get(server.url("/api/permissions/explain?route=groups&action=GET"))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body(res).await["success"], true);

    let res = client
        .get(server.url("/api/permissions/explain?route=groups&action=FETCH"))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}
