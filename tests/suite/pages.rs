//! Welcome page rendering over HTTP

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::http::{StatusCode, header};

use gatehouse_core::{Resource, STATE_CHECKER_COOKIE, Theme, ThemeError, ViewModel};
use gatehouse_server::NO_STORE;
use gatehouse_theme::{FileTheme, ThemeRegistry, ThemeSelection};

use crate::common::{
    RecordingStore, TestApp, body_text, form_token, get, local_peer, peer, remote_peer,
    set_cookies,
};

#[tokio::test]
async fn missing_trailing_slash_redirects() {
    let app = TestApp::new("/setup");

    let response = app.send(get("/setup", local_peer())).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()[header::LOCATION], "/setup/");

    let response = app.send(get("/setup?lang=en", remote_peer())).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()[header::LOCATION], "/setup/?lang=en");
}

#[tokio::test]
async fn local_visitor_gets_form_and_cookie() {
    let app = TestApp::new("/setup");

    let response = app.send(get("/setup/", local_peer())).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CACHE_CONTROL], NO_STORE);

    let cookies = set_cookies(&response);
    assert_eq!(cookies.len(), 1);
    let cookie = &cookies[0];
    assert!(cookie.starts_with(&format!("{STATE_CHECKER_COOKIE}=")));
    assert!(cookie.contains("; Path=/setup/"));
    assert!(cookie.contains("; Max-Age=300"));
    assert!(cookie.contains("; HttpOnly"));
    assert!(!cookie.contains("Secure"));

    let body = body_text(response).await;
    let token = form_token(&body).unwrap();
    assert_eq!(token.len(), 43);
    assert!(cookie.contains(&token));
}

#[tokio::test]
async fn remote_visitor_is_pointed_to_local_url() {
    let app = TestApp::new("/setup");

    let response = app.send(get("/setup/", remote_peer())).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(set_cookies(&response).is_empty());

    let body = body_text(response).await;
    assert!(form_token(&body).is_none());
    assert!(body.contains("http://localhost:8080/"));
    assert!(body.contains("GATEHOUSE_ADMIN"));
}

#[tokio::test]
async fn proxied_loopback_visitor_is_not_local() {
    let app = TestApp::new("/");

    let mut request = get("/", local_peer());
    request
        .headers_mut()
        .insert("forwarded", "for=198.51.100.7".parse().unwrap());
    let response = app.send(request).await;

    assert!(set_cookies(&response).is_empty());
    assert!(form_token(&body_text(response).await).is_none());
}

#[tokio::test]
async fn unspecified_local_address_counts_as_local() {
    let app = TestApp::new("/");
    let response = app.send(get("/", peer("127.0.0.1:1234", "0.0.0.0:8080"))).await;
    assert!(form_token(&body_text(response).await).is_some());
}

#[tokio::test]
async fn satisfied_gate_shows_console_link() {
    let app = TestApp::with(
        "/",
        RecordingStore::with_admin(),
        ThemeRegistry::new(&ThemeSelection::Builtin),
    );

    let response = app.send(get("/", local_peer())).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(set_cookies(&response).is_empty());

    let body = body_text(response).await;
    assert!(form_token(&body).is_none());
    assert!(body.contains("href=\"/admin/\""));
}

#[tokio::test]
async fn missing_theme_is_a_bad_request() {
    let app = TestApp::with("/setup", RecordingStore::default(), ThemeRegistry::empty());

    let response = app.send(get("/setup/", local_peer())).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_text(response).await, "The theme is unavailable");
}

#[tokio::test]
async fn directory_theme_can_redirect_to_admin_console() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("theme.toml"),
        "name = \"corp\"\n[properties]\nredirectToAdmin = \"true\"\n",
    )
    .unwrap();
    std::fs::write(dir.path().join("index.html"), "<p>${productName}</p>").unwrap();
    let theme: Arc<dyn Theme> = Arc::new(FileTheme::load(dir.path()).unwrap());

    let satisfied = TestApp::with_theme("/", RecordingStore::with_admin(), Arc::clone(&theme));
    let response = satisfied.send(get("/", remote_peer())).await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(response.headers()[header::LOCATION], "/admin/");

    // Never redirect while the bootstrap is still pending.
    let pending = TestApp::with_theme("/", RecordingStore::default(), theme);
    let response = pending.send(get("/", remote_peer())).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "<p>Gatehouse</p>");
}

struct BrokenTheme {
    properties: BTreeMap<String, String>,
}

impl Theme for BrokenTheme {
    fn name(&self) -> &str {
        "broken"
    }

    fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }

    fn render(&self, _view: &ViewModel, _template: &str) -> Result<String, ThemeError> {
        Err(ThemeError::Invalid {
            theme: "broken".to_string(),
            reason: "secret detail".to_string(),
        })
    }

    fn resource(&self, _path: &str) -> Result<Option<Resource>, ThemeError> {
        Ok(None)
    }
}

#[tokio::test]
async fn render_failure_is_internal_and_generic() {
    let app = TestApp::with_theme(
        "/",
        RecordingStore::default(),
        Arc::new(BrokenTheme {
            properties: BTreeMap::new(),
        }),
    );

    let response = app.send(get("/", local_peer())).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_text(response).await;
    assert!(!body.contains("secret detail"));
}
