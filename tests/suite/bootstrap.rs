//! Initial administrator creation over HTTP

use std::sync::atomic::Ordering;

use axum::http::StatusCode;

use gatehouse_core::STATE_CHECKER_COOKIE;
use gatehouse_theme::{ThemeRegistry, ThemeSelection};

use crate::common::{
    RecordingStore, TestApp, body_text, creation_fields, form_token, get, local_peer, peer,
    post_form, remote_peer, set_cookies,
};

#[tokio::test]
async fn local_user_creates_admin() {
    let app = TestApp::new("/setup");
    let token = app.fetch_token().await;

    let response = app
        .send(post_form(
            "/setup/",
            local_peer(),
            Some(&token),
            &creation_fields(&token, "admin", "secret", "secret"),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let cookies = set_cookies(&response);
    assert!(
        cookies
            .iter()
            .any(|c| c.starts_with(&format!("{STATE_CHECKER_COOKIE}=;")) && c.contains("Max-Age=0"))
    );

    let body = body_text(response).await;
    assert!(body.contains("User created"));
    assert!(form_token(&body).is_none());
    assert_eq!(
        app.store.created(),
        vec![("admin".to_string(), "secret".to_string())]
    );

    // The gate is inert from now on.
    let response = app.send(get("/setup/", local_peer())).await;
    assert!(set_cookies(&response).is_empty());
    assert!(form_token(&body_text(response).await).is_none());
}

#[tokio::test]
async fn username_is_trimmed_and_password_is_not() {
    let app = TestApp::new("/");
    let token = app.fetch_token().await;

    let response = app
        .send(post_form(
            "/",
            local_peer(),
            Some(&token),
            &creation_fields(&token, "  root  ", " pw ", " pw "),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        app.store.created(),
        vec![("root".to_string(), " pw ".to_string())]
    );
}

#[tokio::test]
async fn confirmation_mismatch_rerenders_with_error() {
    let app = TestApp::new("/setup");
    let token = app.fetch_token().await;

    let response = app
        .send(post_form(
            "/setup/",
            local_peer(),
            Some(&token),
            &creation_fields(&token, "admin", "a", "b"),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_text(response).await;
    assert!(body.contains("Password and confirmation doesn&#39;t match"));
    assert!(form_token(&body).is_some());
    assert!(app.store.created().is_empty());
}

#[tokio::test]
async fn missing_fields_are_reported_in_order() {
    let app = TestApp::new("/");

    for (username, password, message) in [
        ("   ", "secret", "Username is missing"),
        ("admin", "", "Password is missing"),
    ] {
        let token = app.fetch_token().await;
        let response = app
            .send(post_form(
                "/",
                local_peer(),
                Some(&token),
                &creation_fields(&token, username, password, password),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_text(response).await.contains(message));
    }
    assert!(app.store.created().is_empty());
}

#[tokio::test]
async fn non_local_submission_is_rejected() {
    let app = TestApp::new("/setup");
    let token = app.fetch_token().await;

    let response = app
        .send(post_form(
            "/setup/",
            remote_peer(),
            Some(&token),
            &creation_fields(&token, "admin", "secret", "secret"),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_text(response).await, "Bad request");
    assert!(app.store.created().is_empty());

    // No token at all is still a 400, not a 403: the origin check comes first.
    let response = app
        .send(post_form(
            "/setup/",
            remote_peer(),
            None,
            &creation_fields("", "admin", "secret", "secret"),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn forwarded_submission_over_loopback_is_rejected() {
    let app = TestApp::new("/");
    let token = app.fetch_token().await;

    let mut request = post_form(
        "/",
        local_peer(),
        Some(&token),
        &creation_fields(&token, "admin", "secret", "secret"),
    );
    request
        .headers_mut()
        .insert("x-forwarded-for", "198.51.100.7".parse().unwrap());

    let response = app.send(request).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(app.store.created().is_empty());
}

#[tokio::test]
async fn ipv6_loopback_may_submit() {
    let app = TestApp::new("/");
    let token = app.fetch_token().await;

    let response = app
        .send(post_form(
            "/",
            peer("[::1]:50000", "[::1]:8080"),
            Some(&token),
            &creation_fields(&token, "admin", "secret", "secret"),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(app.store.created().len(), 1);
}

#[tokio::test]
async fn token_problems_are_forbidden() {
    let app = TestApp::new("/");
    let token = app.fetch_token().await;
    let other = app.fetch_token().await;

    let cases: [(Option<&str>, &str); 3] = [
        (None, token.as_str()),
        (Some(token.as_str()), ""),
        (Some(token.as_str()), other.as_str()),
    ];
    for (cookie, field) in cases {
        let response = app
            .send(post_form(
                "/",
                local_peer(),
                cookie,
                &creation_fields(field, "admin", "secret", "secret"),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(body_text(response).await, "Forbidden");
    }
    assert!(app.store.created().is_empty());
}

#[tokio::test]
async fn token_is_spent_even_when_creation_fails() {
    let store = RecordingStore::default();
    store.fail_creation.store(true, Ordering::SeqCst);
    let app = TestApp::with(
        "/",
        store,
        ThemeRegistry::new(&ThemeSelection::Builtin),
    );
    let token = app.fetch_token().await;
    let fields = creation_fields(&token, "admin", "secret", "secret");

    let response = app
        .send(post_form("/", local_peer(), Some(&token), &fields))
        .await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(set_cookies(&response).iter().any(|c| c.contains("Max-Age=0")));
    assert!(!body_text(response).await.contains("disk full"));

    app.store.fail_creation.store(false, Ordering::SeqCst);
    let response = app
        .send(post_form("/", local_peer(), Some(&token), &fields))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(app.store.created().is_empty());
}

#[tokio::test]
async fn submission_after_bootstrap_is_a_no_op() {
    let app = TestApp::with(
        "/setup",
        RecordingStore::with_admin(),
        ThemeRegistry::new(&ThemeSelection::Builtin),
    );

    let response = app
        .send(post_form(
            "/setup/",
            remote_peer(),
            None,
            &creation_fields("junk", "", "a", "b"),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_text(response).await;
    assert!(!body.contains("doesn&#39;t match"));
    assert!(!body.contains("is missing"));
    assert!(app.store.created().is_empty());
}

#[tokio::test]
async fn out_of_range_token_timestamp_is_forbidden() {
    let app = TestApp::new("/");
    // 24 zero nonce bytes followed by u64::MAX seconds, base64url encoded.
    let token = format!("{}{}", "A".repeat(32), "__________8");

    let response = app
        .send(post_form(
            "/",
            local_peer(),
            Some(&token),
            &creation_fields(&token, "admin", "secret", "secret"),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(app.store.created().is_empty());
}
