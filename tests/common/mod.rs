//! Shared test utilities and fixtures
//!
//! Builds routers around a recording account store and drives them with
//! in-process requests carrying connection info.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use axum::Router;
use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{Request, Response, header};
use tower::ServiceExt;

use gatehouse_config::Features;
use gatehouse_core::{
    AccountStore, CreationError, GateSettings, STATE_CHECKER_COOKIE, StoreError, Theme,
    WelcomeGate,
};
use gatehouse_server::PeerAddrs;
use gatehouse_theme::{ThemeRegistry, ThemeSelection};
use gatehouse_types::{BasePath, Password, Username};

/// Account store that records every creation call.
#[derive(Default)]
pub struct RecordingStore {
    pub exists: AtomicBool,
    pub fail_creation: AtomicBool,
    pub created: Mutex<Vec<(String, String)>>,
}

impl RecordingStore {
    pub fn with_admin() -> Self {
        let store = Self::default();
        store.exists.store(true, Ordering::SeqCst);
        store
    }

    pub fn created(&self) -> Vec<(String, String)> {
        self.created.lock().unwrap().clone()
    }
}

impl AccountStore for RecordingStore {
    fn account_exists(&self) -> Result<bool, StoreError> {
        Ok(self.exists.load(Ordering::SeqCst))
    }

    fn create_account(
        &self,
        username: &Username,
        password: &Password,
    ) -> Result<(), CreationError> {
        if self.fail_creation.load(Ordering::SeqCst) {
            return Err(CreationError::Backend("disk full".into()));
        }
        self.created
            .lock()
            .unwrap()
            .push((username.as_str().to_string(), password.expose().to_string()));
        self.exists.store(true, Ordering::SeqCst);
        Ok(())
    }
}

pub struct TestApp {
    pub router: Router,
    pub store: Arc<RecordingStore>,
    pub base: BasePath,
}

impl TestApp {
    pub fn new(base: &str) -> Self {
        Self::with(base, RecordingStore::default(), ThemeRegistry::new(&ThemeSelection::Builtin))
    }

    pub fn with(base: &str, store: RecordingStore, themes: ThemeRegistry) -> Self {
        let base = BasePath::parse(base).unwrap();
        let store = Arc::new(store);
        let gate = WelcomeGate::new(
            store.clone(),
            Arc::new(themes),
            Arc::new(Features::default()),
            GateSettings::default(),
        );
        let router = gatehouse_server::router(Arc::new(gate), &base);
        Self {
            router,
            store,
            base,
        }
    }

    pub fn with_theme(base: &str, store: RecordingStore, theme: Arc<dyn Theme>) -> Self {
        Self::with(base, store, ThemeRegistry::with_theme(theme))
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }

    /// Load the page as a local user and return the issued token.
    pub async fn fetch_token(&self) -> String {
        let response = self
            .send(get(&self.base.with_trailing_slash(), local_peer()))
            .await;
        let cookie = set_cookies(&response)
            .into_iter()
            .find(|c| c.starts_with(STATE_CHECKER_COOKIE))
            .expect("state checker cookie");
        let body = body_text(response).await;
        let token = form_token(&body).expect("state checker field");
        assert!(cookie.starts_with(&format!("{STATE_CHECKER_COOKIE}={token};")));
        token
    }
}

pub fn local_peer() -> PeerAddrs {
    PeerAddrs {
        remote: "127.0.0.1:50000".parse().unwrap(),
        local: Some("127.0.0.1:8080".parse().unwrap()),
    }
}

pub fn remote_peer() -> PeerAddrs {
    peer("203.0.113.5:40000", "10.0.0.2:8080")
}

pub fn peer(remote: &str, local: &str) -> PeerAddrs {
    PeerAddrs {
        remote: remote.parse::<SocketAddr>().unwrap(),
        local: Some(local.parse().unwrap()),
    }
}

pub fn get(uri: &str, peer: PeerAddrs) -> Request<Body> {
    let mut request = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    request.extensions_mut().insert(ConnectInfo(peer));
    request
}

/// URL-encoded form POST, optionally carrying the state checker cookie.
pub fn post_form(
    uri: &str,
    peer: PeerAddrs,
    cookie: Option<&str>,
    fields: &[(&str, &str)],
) -> Request<Body> {
    let body = fields
        .iter()
        .map(|(k, v)| format!("{}={}", urlencode(k), urlencode(v)))
        .collect::<Vec<_>>()
        .join("&");

    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(token) = cookie {
        builder = builder.header(header::COOKIE, format!("{STATE_CHECKER_COOKIE}={token}"));
    }
    let mut request = builder.body(Body::from(body)).unwrap();
    request.extensions_mut().insert(ConnectInfo(peer));
    request
}

pub fn creation_fields<'a>(
    token: &'a str,
    username: &'a str,
    password: &'a str,
    confirmation: &'a str,
) -> Vec<(&'a str, &'a str)> {
    vec![
        ("username", username),
        ("password", password),
        ("passwordConfirmation", confirmation),
        ("stateChecker", token),
    ]
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub fn set_cookies(response: &Response<Body>) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect()
}

pub fn form_token(body: &str) -> Option<String> {
    let marker = "name=\"stateChecker\" value=\"";
    let start = body.find(marker)? + marker.len();
    let end = body[start..].find('"')?;
    Some(body[start..start + end].to_string())
}

fn urlencode(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char);
            }
            b' ' => out.push('+'),
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}
