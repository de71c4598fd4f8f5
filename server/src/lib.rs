//! HTTP surface for the welcome page.
//!
//! Routes, relative to the configured base path:
//!
//! - `GET|POST <base>` and `<base>/`: welcome page and admin bootstrap form
//! - `GET <base>/welcome-content/{*path}`: theme resources
//!
//! Gate calls may block on the account store, so handlers run them on
//! tokio's blocking pool.

mod error;

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::connect_info::Connected;
use axum::extract::{ConnectInfo, Form, Path, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use axum::serve::IncomingStream;
use tokio::net::TcpListener;

use gatehouse_core::{
    GateError, PageStatus, RedirectKind, Reply, ResponseCookies, WelcomeGate, WelcomeRequest,
};
use gatehouse_types::{BasePath, CreationForm, Scheme};

pub use error::ServerError;

/// Cache policy for pages and error bodies.
pub const NO_STORE: &str = "no-cache, no-store, must-revalidate";
/// Cache policy for theme resources (30 days).
pub const RESOURCE_MAX_AGE: &str = "max-age=2592000";

/// Both ends of the TCP connection a request arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerAddrs {
    pub remote: SocketAddr,
    /// `None` if the socket could not report its local address.
    pub local: Option<SocketAddr>,
}

impl Connected<IncomingStream<'_, TcpListener>> for PeerAddrs {
    fn connect_info(stream: IncomingStream<'_, TcpListener>) -> Self {
        Self {
            remote: *stream.remote_addr(),
            local: stream.io().local_addr().ok(),
        }
    }
}

#[derive(Clone)]
struct AppState {
    gate: Arc<WelcomeGate>,
}

/// Build the router serving the welcome page under `base_path`.
pub fn router(gate: Arc<WelcomeGate>, base_path: &BasePath) -> Router {
    let resources = base_path.join(&format!(
        "{}/{{*path}}",
        gate.settings().resources_path.trim_matches('/')
    ));

    let mut router = Router::new().route(
        &base_path.with_trailing_slash(),
        get(welcome_page).post(submit_form),
    );
    if !base_path.is_root() {
        router = router.route(base_path.as_str(), get(welcome_page).post(submit_form));
    }

    router
        .route(&resources, get(theme_resource))
        .with_state(AppState { gate })
}

/// Serve until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, app: Router, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<PeerAddrs>(),
    )
    .with_graceful_shutdown(shutdown)
    .await
}

async fn welcome_page(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<PeerAddrs>,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    let request = welcome_request(&uri, &headers, peer);
    let gate = Arc::clone(&state.gate);

    let outcome = tokio::task::spawn_blocking(move || {
        let mut cookies = ResponseCookies::default();
        let reply = gate.welcome_page(&request, &mut cookies);
        (reply, cookies)
    })
    .await;

    respond(outcome)
}

async fn submit_form(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<PeerAddrs>,
    uri: Uri,
    headers: HeaderMap,
    Form(pairs): Form<Vec<(String, String)>>,
) -> Response {
    let request = welcome_request(&uri, &headers, peer);
    let form = CreationForm::from_pairs(pairs);
    let gate = Arc::clone(&state.gate);

    let outcome = tokio::task::spawn_blocking(move || {
        let mut cookies = ResponseCookies::default();
        let reply = gate.submit(&request, &form, &mut cookies);
        (reply, cookies)
    })
    .await;

    respond(outcome)
}

async fn theme_resource(
    State(state): State<AppState>,
    Path(path): Path<String>,
) -> Result<Response, ServerError> {
    let gate = Arc::clone(&state.gate);
    let found = tokio::task::spawn_blocking(move || gate.resource(&path)).await??;

    Ok(match found {
        Some(resource) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, resource.content_type),
                (header::CACHE_CONTROL, RESOURCE_MAX_AGE),
            ],
            resource.bytes,
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, "Not found").into_response(),
    })
}

fn welcome_request(uri: &Uri, headers: &HeaderMap, peer: PeerAddrs) -> WelcomeRequest {
    // Origin-form URIs carry no scheme; this listener only speaks plain HTTP.
    let scheme = uri
        .scheme_str()
        .and_then(Scheme::parse)
        .unwrap_or(Scheme::Http);
    let local = peer
        .local
        .map(|addr| addr.ip().to_string())
        .unwrap_or_default();

    let mut request = WelcomeRequest::new(uri.path(), scheme, peer.remote.ip().to_string(), local);
    if let Some(query) = uri.query() {
        request = request.with_query(query);
    }
    for (name, value) in headers {
        if let Ok(value) = value.to_str() {
            request = request.with_header(name.as_str(), value);
        }
    }
    request
}

type Outcome = Result<(Result<Reply, GateError>, ResponseCookies), tokio::task::JoinError>;

fn respond(outcome: Outcome) -> Response {
    let (reply, cookies) = match outcome {
        Ok(done) => done,
        Err(join) => return ServerError::from(join).into_response(),
    };

    let mut response = match reply {
        Ok(reply) => reply_response(reply),
        Err(err) => ServerError::from(err).into_response(),
    };
    for cookie in cookies.iter() {
        match HeaderValue::from_str(&cookie.to_string()) {
            Ok(value) => {
                response.headers_mut().append(header::SET_COOKIE, value);
            }
            Err(e) => tracing::error!(cookie = cookie.name, error = %e, "Dropped unencodable cookie"),
        }
    }
    response
}

fn reply_response(reply: Reply) -> Response {
    match reply {
        Reply::Redirect { kind, location } => {
            let status = match kind {
                RedirectKind::SeeOther => StatusCode::SEE_OTHER,
                RedirectKind::Found => StatusCode::FOUND,
            };
            (status, [(header::LOCATION, location)]).into_response()
        }
        Reply::Page { status, body } => {
            let status = match status {
                PageStatus::Ok => StatusCode::OK,
                PageStatus::BadRequest => StatusCode::BAD_REQUEST,
            };
            (
                status,
                [
                    (header::CONTENT_TYPE, "text/html; charset=utf-8"),
                    (header::CACHE_CONTROL, NO_STORE),
                ],
                body,
            )
                .into_response()
        }
    }
}
