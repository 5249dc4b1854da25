mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode, header},
};
use common::{Call, PASSWORD, TestSetup, send, setup};
use serde_json::json;
use tower::ServiceExt;
use warden::api::{ACTIVATION_REQUEST_MESSAGE, RESET_REQUEST_MESSAGE};

fn login_body(identifier: &str, password: &str) -> serde_json::Value {
    json!({ "identifier": identifier, "password": password })
}

#[tokio::test]
async fn test_health() {
    let ctx = setup().await;
    let (status, body) = send(&ctx.app(), Call::get("/healthz")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_login_and_me() {
    let ctx = setup().await;
    let user = ctx.seed_user("alice", "alice@example.com", false).await;
    let app = ctx.app();

    let (status, body) = send(
        &app,
        Call::post("/api/auth/login", login_body("alice", PASSWORD)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["token_type"], "bearer");
    let access = body["access_token"].as_str().unwrap().to_string();
    assert!(body["refresh_token"].as_str().is_some());

    let (status, body) = send(&app, Call::get("/api/me").bearer(&access)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], user.id().to_string());
    assert_eq!(body["username"], "alice");
    assert_eq!(body["email"], "alice@example.com");
    assert!(body.get("credential_hash").is_none());

    let (status, body) = send(&app, Call::get("/api/auth/verify").bearer(&access)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["sub"], user.id().to_string());
    assert_eq!(body["type"], "access");
}

#[tokio::test]
async fn test_login_failures() {
    let ctx = setup().await;
    let admin = ctx.seed_user("root", "root@example.com", true).await;
    let user = ctx.seed_user("alice", "alice@example.com", false).await;
    let app = ctx.app();

    let (status, body) = send(
        &app,
        Call::post("/api/auth/login", login_body("alice", "Wr0ngPassword")),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "invalid_credentials");

    let (status, unknown) = send(
        &app,
        Call::post("/api/auth/login", login_body("nobody", PASSWORD)),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown, body);

    ctx.accounts.deactivate_user(admin.id(), user.id()).await.unwrap();
    let (status, body) = send(
        &app,
        Call::post("/api/auth/login", login_body("alice", PASSWORD)),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "inactive_user");
}

#[tokio::test]
async fn test_bad_authorization_headers_look_the_same() {
    let ctx = setup().await;
    let user = ctx.seed_user("alice", "alice@example.com", false).await;
    let pair = ctx.login("alice").await;
    let app = ctx.app();

    let headers = [
        None,
        Some(format!("Token {}", pair.access_token)),
        Some("Bearer not-a-token".to_string()),
        Some(format!("Bearer {}", pair.refresh_token)),
    ];

    for value in headers {
        let mut builder = Request::builder().uri("/api/me");
        if let Some(value) = value {
            builder = builder.header(header::AUTHORIZATION, value);
        }
        let response = app
            .clone()
            .oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers()[header::WWW_AUTHENTICATE], "Bearer");
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "invalid_credentials");
    }

    // Revoked tokens get the same answer
    ctx.accounts.logout(user.id()).await.unwrap();
    let (status, body) = send(&app, Call::get("/api/me").bearer(&pair.access_token)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "invalid_credentials");
}

#[tokio::test]
async fn test_refresh_and_logout() {
    let ctx = setup().await;
    ctx.seed_user("alice", "alice@example.com", false).await;
    let pair = ctx.login("alice").await;
    let app = ctx.app();

    let body = json!({ "refresh_token": pair.refresh_token });
    let (status, refreshed) = send(&app, Call::post("/api/auth/refresh", body.clone())).await;
    assert_eq!(status, StatusCode::OK);
    let access = refreshed["access_token"].as_str().unwrap().to_string();

    let (status, body_after) = send(&app, Call::post("/api/auth/logout", json!({})).bearer(&access)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(body_after.is_null());

    let (status, error) = send(&app, Call::post("/api/auth/refresh", body)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(error["error"], "token_revoked");

    let (status, _) = send(&app, Call::get("/api/me").bearer(&access)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_reset_request_response_is_generic() {
    let ctx = setup().await;
    ctx.seed_user("alice", "alice@example.com", false).await;
    let app = ctx.app();

    let (status, known) = send(
        &app,
        Call::post(
            "/api/me/reset-password-request",
            json!({ "email": "alice@example.com" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(known["message"], RESET_REQUEST_MESSAGE);

    let (status, unknown) = send(
        &app,
        Call::post(
            "/api/me/reset-password-request",
            json!({ "email": "nobody@example.com" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(unknown, known);

    // Even a broken mailer is not visible
    ctx.mailer.set_failing(true);
    let (status, failed) = send(
        &app,
        Call::post(
            "/api/me/reset-password-request",
            json!({ "email": "alice@example.com" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(failed, known);
    ctx.mailer.set_failing(false);

    assert_eq!(ctx.mails_to("alice@example.com"), 1);
    assert_eq!(ctx.mailer.sent().len(), 1);
}

#[tokio::test]
async fn test_reset_password_flow() {
    let ctx = setup().await;
    ctx.seed_user("alice", "alice@example.com", false).await;
    let app = ctx.app();

    send(
        &app,
        Call::post(
            "/api/me/reset-password-request",
            json!({ "email": "alice@example.com" }),
        ),
    )
    .await;
    let token = ctx.mailed_token("alice@example.com");

    let weak = json!({ "token": token, "new_password": "weak" });
    let (status, body) = send(&app, Call::post("/api/me/reset-password", weak)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "password_too_short");

    let confirm = json!({ "token": token, "new_password": "N3wPassword" });
    let (status, _) = send(&app, Call::post("/api/me/reset-password", confirm.clone())).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = send(&app, Call::post("/api/me/reset-password", confirm)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "invalid_password_token");

    let (status, _) = send(
        &app,
        Call::post("/api/auth/login", login_body("alice", "N3wPassword")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_change_password_and_email() {
    let ctx = setup().await;
    ctx.seed_user("alice", "alice@example.com", false).await;
    let pair = ctx.login("alice").await;
    let app = ctx.app();

    let (status, body) = send(
        &app,
        Call::post(
            "/api/me/change-email",
            json!({ "new_email": "alice@new.example.com", "password": PASSWORD }),
        )
        .bearer(&pair.access_token),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["email"], "alice@new.example.com");

    let (status, body) = send(
        &app,
        Call::post(
            "/api/me/change-password",
            json!({ "old_password": "Wr0ngPassword", "new_password": "N3wPassword" }),
        )
        .bearer(&pair.access_token),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "invalid_credentials");

    let (status, _) = send(
        &app,
        Call::post(
            "/api/me/change-password",
            json!({ "old_password": PASSWORD, "new_password": "N3wPassword" }),
        )
        .bearer(&pair.access_token),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&app, Call::get("/api/me").bearer(&pair.access_token)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_creates_and_user_activates() {
    let ctx = setup().await;
    ctx.seed_user("root", "root@example.com", true).await;
    let admin = ctx.login("root").await;
    let app = ctx.app();

    let (status, created) = send(
        &app,
        Call::post("/api/users", json!({ "email": "bob@example.com" })).bearer(&admin.access_token),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["email"], "bob@example.com");
    assert_eq!(created["is_active"], false);
    assert!(created["username"].is_null());

    let (status, body) = send(
        &app,
        Call::post("/api/users", json!({ "email": "bob@example.com" })).bearer(&admin.access_token),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "user_already_exists");

    let (status, generic) = send(
        &app,
        Call::post("/api/me/activation-request", json!({ "email": "bob@example.com" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(generic["message"], ACTIVATION_REQUEST_MESSAGE);

    let (status, _) = send(
        &app,
        Call::post("/api/users/resend-activation", json!({ "email": "bob@example.com" }))
            .bearer(&admin.access_token),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let token = ctx.mailed_token("bob@example.com");

    let (status, activated) = send(
        &app,
        Call::post(
            "/api/me/first-activation",
            json!({ "token": token, "username": "bob", "password": PASSWORD }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(activated["username"], "bob");
    assert_eq!(activated["is_active"], true);

    let (status, body) = send(
        &app,
        Call::post("/api/users/resend-activation", json!({ "email": "bob@example.com" }))
            .bearer(&admin.access_token),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "user_was_activated_before");

    let (status, body) = send(
        &app,
        Call::post(
            "/api/me/first-activation",
            json!({ "token": "stale", "username": "bob2", "password": PASSWORD }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "invalid_activation_token");
}

#[tokio::test]
async fn test_admin_routes_require_admin() {
    let ctx = setup().await;
    let admin = ctx.seed_user("root", "root@example.com", true).await;
    let user = ctx.seed_user("alice", "alice@example.com", false).await;
    let other = ctx.seed_user("bob", "bob@example.com", false).await;
    let session = ctx.login("alice").await;
    let app = ctx.app();

    let (status, body) = send(&app, Call::get("/api/users").bearer(&session.access_token)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "forbidden");

    let uri = format!("/api/users/{}/deactivate", admin.id());
    let (status, _) = send(&app, Call::patch(&uri).bearer(&session.access_token)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let own = format!("/api/users/{}", user.id());
    let (status, body) = send(&app, Call::get(&own).bearer(&session.access_token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["username"], "alice");

    let theirs = format!("/api/users/{}", other.id());
    let (status, _) = send(&app, Call::get(&theirs).bearer(&session.access_token)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_admin_user_management() {
    let ctx = setup().await;
    let admin = ctx.seed_user("root", "root@example.com", true).await;
    let user = ctx.seed_user("alice", "alice@example.com", false).await;
    let root = ctx.login("root").await;
    let alice = ctx.login("alice").await;
    let app = ctx.app();

    let (status, page) = send(
        &app,
        Call::get("/api/users?order_by=created_at&direction=desc&limit=10").bearer(&root.access_token),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total"], 2);
    assert_eq!(page["items"][0]["username"], "root");

    let (status, body) = send(&app, Call::get("/api/users?limit=0").bearer(&root.access_token)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "invalid_limit");

    let own = format!("/api/users/{}/deactivate", admin.id());
    let (status, body) = send(&app, Call::patch(&own).bearer(&root.access_token)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "cannot_deactivate_yourself");

    let uri = format!("/api/users/{}/deactivate", user.id());
    let (status, body) = send(&app, Call::patch(&uri).bearer(&root.access_token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_active"], false);

    let (status, _) = send(&app, Call::get("/api/me").bearer(&alice.access_token)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let uri = format!("/api/users/{}/activate", user.id());
    let (status, body) = send(&app, Call::patch(&uri).bearer(&root.access_token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_active"], true);

    let pending = ctx.seed_pending("pending@example.com").await;
    let uri = format!("/api/users/{}/activate", pending.id());
    let (status, body) = send(&app, Call::patch(&uri).bearer(&root.access_token)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "user_pending_activation");

    let uri = format!("/api/users/{}/promote", user.id());
    let (status, body) = send(&app, Call::patch(&uri).bearer(&root.access_token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_admin"], true);

    let uri = format!("/api/users/{}/demote", user.id());
    let (status, body) = send(&app, Call::patch(&uri).bearer(&root.access_token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_admin"], false);

    let missing = format!("/api/users/{}", uuid::Uuid::new_v4());
    let (status, body) = send(&app, Call::get(&missing).bearer(&root.access_token)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "user_not_found");
}

#[tokio::test]
async fn test_login_rate_limit() {
    let ctx = TestSetup::new().with_rate_limits().build().await;
    ctx.seed_user("alice", "alice@example.com", false).await;
    let app = ctx.app();

    for _ in 0..5 {
        let (status, _) = send(
            &app,
            Call::post("/api/auth/login", login_body("alice", "Wr0ngPassword")).from_ip("203.0.113.9"),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    let (status, body) = send(
        &app,
        Call::post("/api/auth/login", login_body("alice", PASSWORD)).from_ip("203.0.113.9"),
    )
    .await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["error"], "too_many_requests");

    let (status, _) = send(
        &app,
        Call::post("/api/auth/login", login_body("alice", PASSWORD)).from_ip("203.0.113.10"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        &app,
        Call::post("/api/auth/login", login_body("alice", PASSWORD)),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "unknown_client");
}

#[tokio::test]
async fn test_full_flow_with_sqlite_store() {
    let ctx = TestSetup::new().with_sqlite().build().await;
    ctx.seed_user("root", "root@example.com", true).await;
    let root = ctx.login("root").await;
    let app = ctx.app();

    let (status, _) = send(
        &app,
        Call::post("/api/users", json!({ "email": "carol@example.com" })).bearer(&root.access_token),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let token = ctx.mailed_token("carol@example.com");

    let (status, _) = send(
        &app,
        Call::post(
            "/api/me/first-activation",
            json!({ "token": token, "username": "carol", "password": PASSWORD }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(
        &app,
        Call::post("/api/auth/login", login_body("carol@example.com", PASSWORD)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let access = body["access_token"].as_str().unwrap().to_string();

    let (status, me) = send(&app, Call::get("/api/me").bearer(&access)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["username"], "carol");
}
