use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use csmcl_space::{app::build_app, state::AppState};

async fn app() -> Router {
    build_app(AppState::fake().await)
}

async fn call(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut req = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        req = req.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let req = match body {
        Some(body) => req
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => req.body(Body::empty()).unwrap(),
    };

    let res = app.clone().oneshot(req).await.unwrap();
    let status = res.status();
    let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };
    (status, value)
}

async fn register(app: &Router, name: &str) -> String {
    let (status, body) = call(
        app,
        Method::POST,
        "/session/register",
        None,
        Some(json!({
            "cosmical_name": name,
            "display_name": "Test Pilot",
            "email": "pilot@example.com",
            "recovery_phrase": "secure-recovery-phrase",
            "agree_to_terms": true
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    body["access_token"].as_str().unwrap().to_string()
}

async fn login_admin(app: &Router) -> String {
    let (status, body) = call(
        app,
        Method::POST,
        "/session/login",
        None,
        Some(json!({
            "cosmical_name": "INNERPIXEL",
            "recovery_phrase": "cosmical space adventure"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    body["access_token"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn health_is_ok() {
    let app = app().await;
    let (status, body) = call(&app, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::String("ok".into()));
}

#[tokio::test]
async fn register_opens_a_session() {
    let app = app().await;
    let token = register(&app, "test-pilot").await;

    let (status, session) = call(&app, Method::GET, "/session", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(session["logged_in"], true);
    assert_eq!(session["mode"], "user");
    assert_eq!(session["user"]["cosmicalName"], "test-pilot");
    assert!(session["user"].get("phraseHash").is_none());

    let (status, _) = call(&app, Method::POST, "/session/logout", Some(&token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = call(&app, Method::GET, "/session", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn duplicate_registration_conflicts() {
    let app = app().await;
    register(&app, "twin").await;
    let (status, _) = call(
        &app,
        Method::POST,
        "/session/register",
        None,
        Some(json!({
            "cosmical_name": "twin",
            "display_name": "Other Twin",
            "email": "twin@example.com",
            "agree_to_terms": true
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn session_routes_need_a_token() {
    let app = app().await;
    let (status, _) = call(&app, Method::GET, "/session", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = call(&app, Method::GET, "/session", Some("garbage"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn wrong_phrase_is_rejected() {
    let app = app().await;
    let (status, _) = call(
        &app,
        Method::POST,
        "/session/login",
        None,
        Some(json!({"cosmical_name": "INNERPIXEL", "recovery_phrase": "nope nope nope"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn protected_accounts_cannot_be_deleted() {
    let app = app().await;
    let token = login_admin(&app).await;

    let (status, _) = call(&app, Method::DELETE, "/users/INNERPIXEL", Some(&token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = call(&app, Method::DELETE, "/users/CSMCL.Explorer", Some(&token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, users) = call(&app, Method::GET, "/users", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(users.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn admin_manages_users() {
    let app = app().await;
    let token = login_admin(&app).await;

    let (status, created) = call(
        &app,
        Method::POST,
        "/users",
        Some(&token),
        Some(json!({
            "cosmical_name": "new-crew",
            "display_name": "New Crew",
            "email": "crew@example.com",
            "agree_to_terms": true
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["user"]["role"], "user");
    assert_eq!(
        created["recovery_phrase"].as_str().unwrap().split(' ').count(),
        12
    );

    let (status, updated) = call(
        &app,
        Method::PATCH,
        "/users/new-crew",
        Some(&token),
        Some(json!({"display_name": "Renamed Crew"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["displayName"], "Renamed Crew");

    let (status, submitted) =
        call(&app, Method::POST, "/users/new-crew/submit", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(submitted["status"], "submitted");

    let (status, _) = call(&app, Method::DELETE, "/users/new-crew", Some(&token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = call(&app, Method::GET, "/users/new-crew", Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn regular_users_cannot_manage_others() {
    let app = app().await;
    let token = register(&app, "plain-user").await;

    let (status, _) = call(&app, Method::GET, "/users", Some(&token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = call(&app, Method::GET, "/users/INNERPIXEL", Some(&token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = call(
        &app,
        Method::PATCH,
        "/users/plain-user",
        Some(&token),
        Some(json!({"role": "admin"})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, me) = call(&app, Method::GET, "/users/plain-user", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["cosmicalName"], "plain-user");
}

#[tokio::test]
async fn self_edits_cannot_skip_onboarding() {
    let app = app().await;
    let token = register(&app, "shortcut").await;
    let t = Some(token.as_str());

    let forged = [
        json!({"wallet": {"address": "0xabc", "connected": true}}),
        json!({"onboarding_step": "complete"}),
        json!({"csmcl_id": {"spaceBinding": null, "confirmed": true}}),
        json!({"step_progress": {
            "identity": {"started": true, "completed": true},
            "space": {"started": true, "completed": true},
            "csmclId": {"started": true, "completed": true},
            "wallet": {"started": true, "completed": true}
        }}),
        json!({"display_name": "Sneaky", "phone": "+15551234567"}),
    ];
    for body in forged {
        let (status, res) = call(&app, Method::PATCH, "/users/shortcut", t, Some(body)).await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{res}");
    }

    let (status, _) = call(&app, Method::POST, "/onboarding/complete", t, None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    let (_, session) = call(&app, Method::GET, "/session", t, None).await;
    assert_eq!(session["user"]["displayName"], "Test Pilot");
    assert_eq!(session["user"]["wallet"]["connected"], false);

    let (status, me) = call(
        &app,
        Method::PATCH,
        "/users/shortcut",
        t,
        Some(json!({"display_name": "Honest Pilot"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{me}");
    assert_eq!(me["displayName"], "Honest Pilot");
}

#[tokio::test]
async fn explorers_cannot_edit_the_shared_account() {
    let app = app().await;
    let (_, body) = call(&app, Method::POST, "/session/explorer", None, None).await;
    let token = body["access_token"].as_str().unwrap().to_string();

    let (status, _) = call(
        &app,
        Method::PATCH,
        "/users/CSMCL.Explorer",
        Some(&token),
        Some(json!({"display_name": "Defaced"})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = call(
        &app,
        Method::POST,
        "/users/CSMCL.Explorer/submit",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let admin = login_admin(&app).await;
    let (status, explorer) =
        call(&app, Method::GET, "/users/CSMCL.Explorer", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(explorer["displayName"], "CSMCL Explorer");
}

#[tokio::test]
async fn deleted_user_loses_their_session() {
    let app = app().await;
    let token = register(&app, "doomed").await;
    let admin = login_admin(&app).await;

    let (status, _) = call(&app, Method::DELETE, "/users/doomed", Some(&admin), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = call(&app, Method::GET, "/session", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = call(
        &app,
        Method::PATCH,
        "/session/profile",
        Some(&token),
        Some(json!({"display_name": "Ghost"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn renamed_user_keeps_a_working_session() {
    let app = app().await;
    let token = register(&app, "old-name").await;
    let admin = login_admin(&app).await;

    let (status, renamed) = call(
        &app,
        Method::PATCH,
        "/users/old-name",
        Some(&admin),
        Some(json!({"cosmical_name": "new-name"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{renamed}");

    let (status, session) = call(&app, Method::GET, "/session", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(session["user"]["cosmicalName"], "new-name");

    let (status, _) = call(
        &app,
        Method::POST,
        "/onboarding/verify-email",
        Some(&token),
        Some(json!({"email": "renamed@example.com"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (_, user) = call(&app, Method::GET, "/users/new-name", Some(&admin), None).await;
    assert_eq!(user["emailVerified"], true);
}

#[tokio::test]
async fn explorer_sessions_are_read_only() {
    let app = app().await;
    let (status, body) = call(&app, Method::POST, "/session/explorer", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["session"]["mode"], "explorer");
    assert!(body["session"]["explorer_expires_at"].is_string());
    let token = body["access_token"].as_str().unwrap();

    let (status, _) = call(
        &app,
        Method::PATCH,
        "/session/profile",
        Some(token),
        Some(json!({"display_name": "Hacker"})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = call(&app, Method::POST, "/onboarding/complete", Some(token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn metrics_grant_xp() {
    let app = app().await;
    let token = register(&app, "reader").await;
    let (status, outcome) = call(
        &app,
        Method::POST,
        "/session/metrics",
        Some(&token),
        Some(json!({"metric_id": "docs-completed", "category": "documentation"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["xp_earned"], 100);

    let (_, session) = call(&app, Method::GET, "/session", Some(&token), None).await;
    assert_eq!(session["xp"], 150);

    let (status, log) = call(&app, Method::GET, "/session/metrics", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(log.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn unknown_step_is_bad_request() {
    let app = app().await;
    let token = register(&app, "stepper").await;
    let (status, _) = call(
        &app,
        Method::POST,
        "/onboarding/steps/launchpad/start",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn onboarding_hands_over_with_single_use_token() {
    let app = app().await;
    let token = register(&app, "voyager").await;
    let t = Some(token.as_str());

    let steps: Vec<(Method, &str, Option<Value>)> = vec![
        (Method::POST, "/onboarding/verify-email", Some(json!({"email": "voyager@example.com"}))),
        (Method::POST, "/onboarding/verify-phone", Some(json!({"phone": "+15551234567"}))),
        (Method::POST, "/onboarding/steps/identity/complete", None),
        (
            Method::PUT,
            "/onboarding/space",
            Some(json!({"theme": "nebula", "template": "studio", "visibility": "public"})),
        ),
        (Method::POST, "/onboarding/steps/space/complete", None),
        (Method::POST, "/onboarding/csmcl-id", None),
        (Method::POST, "/onboarding/csmcl-id/confirm", None),
        (Method::POST, "/onboarding/steps/csmclId/complete", None),
        (Method::POST, "/onboarding/wallet", Some(json!({"address": "0xabc"}))),
    ];

    let (status, _) = call(&app, Method::POST, "/onboarding/complete", t, None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    for (method, uri, body) in steps {
        let (status, res) = call(&app, method, uri, t, body).await;
        assert_eq!(status, StatusCode::OK, "{uri}: {res}");
    }
    let (status, _) = call(&app, Method::POST, "/onboarding/steps/wallet/complete", t, None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, done) = call(&app, Method::POST, "/onboarding/complete", t, None).await;
    assert_eq!(status, StatusCode::OK, "{done}");
    let transition = done["transition_token"].as_str().unwrap().to_string();
    assert_eq!(
        done["redirect_url"],
        format!("https://platform.test?transition_token={}", transition)
    );

    let payload = json!({"transitionToken": transition});
    let (status, first) = call(
        &app,
        Method::POST,
        "/auth/validate-transition",
        None,
        Some(payload.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(first["sessionToken"].is_string());

    let (status, second) =
        call(&app, Method::POST, "/auth/validate-transition", None, Some(payload)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(second, json!({"error": "Invalid transition"}));
}

#[tokio::test]
async fn transition_token_for_unknown_user_is_not_found() {
    let app = app().await;
    let (status, body) = call(
        &app,
        Method::POST,
        "/auth/transition-token",
        None,
        Some(json!({"userId": uuid::Uuid::new_v4(), "onboardingStatus": "complete"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "User not found");
}

#[tokio::test]
async fn docs_writes_need_edit_rights() {
    let app = app().await;
    let user = register(&app, "doc-reader").await;
    let admin = login_admin(&app).await;
    let body = json!({"content": "# Welcome aboard"});

    let (status, _) = call(&app, Method::PUT, "/docs/intro", Some(&user), Some(body.clone())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = call(&app, Method::PUT, "/docs/intro", Some(&admin), Some(body)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, section) = call(&app, Method::GET, "/docs/intro", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(section["content"], "# Welcome aboard");

    let (status, _) = call(
        &app,
        Method::PUT,
        "/docs/current",
        None,
        Some(json!({"section": "intro"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (_, current) = call(&app, Method::GET, "/docs/current", None, None).await;
    assert_eq!(current, Value::String("# Welcome aboard".into()));
}

#[tokio::test]
async fn navigation_guard_redirects_anonymous_users() {
    let app = app().await;
    let (status, nav) = call(
        &app,
        Method::POST,
        "/session/navigate",
        None,
        Some(json!({"path": "/profile", "meta": {"requires_auth": true}})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        nav,
        json!({"action": "redirect", "path": "/login", "redirect": "/profile"})
    );

    let admin = login_admin(&app).await;
    let (_, nav) = call(
        &app,
        Method::POST,
        "/session/navigate",
        Some(&admin),
        Some(json!({"path": "/admin", "meta": {"requires_admin": true}})),
    )
    .await;
    assert_eq!(nav, json!({"action": "proceed"}));
}
