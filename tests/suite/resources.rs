//! Theme resources over HTTP

use axum::http::{StatusCode, header};

use gatehouse_server::RESOURCE_MAX_AGE;
use gatehouse_theme::{ThemeRegistry, ThemeSelection};

use crate::common::{RecordingStore, TestApp, body_text, get, local_peer, remote_peer};

#[tokio::test]
async fn builtin_stylesheet_is_served_with_long_cache() {
    let app = TestApp::new("/setup");

    let response = app
        .send(get("/setup/welcome-content/welcome.css", remote_peer()))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/css; charset=utf-8"
    );
    assert_eq!(response.headers()[header::CACHE_CONTROL], RESOURCE_MAX_AGE);
    assert!(!body_text(response).await.is_empty());
}

#[tokio::test]
async fn unknown_and_escaping_paths_are_not_found() {
    let app = TestApp::new("/");

    for uri in [
        "/welcome-content/missing.css",
        "/welcome-content/..%2Ftheme.toml",
        "/welcome-content/%2Fetc%2Fpasswd",
    ] {
        let response = app.send(get(uri, local_peer())).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{uri}");
    }
}

#[tokio::test]
async fn directory_theme_resources() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("theme.toml"), "").unwrap();
    std::fs::write(dir.path().join("index.html"), "x").unwrap();
    std::fs::create_dir_all(dir.path().join("resources/img")).unwrap();
    std::fs::write(dir.path().join("resources/img/logo.png"), [0x89, b'P', b'N', b'G']).unwrap();

    let app = TestApp::with(
        "/",
        RecordingStore::default(),
        ThemeRegistry::new(&ThemeSelection::Directory(
            dir.path().to_path_buf(),
        )),
    );

    let response = app
        .send(get("/welcome-content/img/logo.png", local_peer()))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");

    let response = app
        .send(get("/welcome-content/theme.toml", local_peer()))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn no_theme_means_no_resources() {
    let app = TestApp::with("/", RecordingStore::default(), ThemeRegistry::empty());
    let response = app
        .send(get("/welcome-content/welcome.css", local_peer()))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
