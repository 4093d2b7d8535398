//! Throwaway bracket service for tests.
//!
//! Serves canned bodies keyed by method and path on `127.0.0.1:0` and
//! records every request it sees.

use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::http::{Method, StatusCode, Uri};
use parking_lot::Mutex;

/// One canned answer.
#[derive(Debug, Clone)]
pub(crate) struct Route {
    method: Method,
    path: String,
    status: StatusCode,
    body: String,
}

impl Route {
    pub(crate) fn new(method: Method, path: &str, status: StatusCode, body: &str) -> Self {
        Self {
            method,
            path: path.to_string(),
            status,
            body: body.to_string(),
        }
    }

    pub(crate) fn ok(method: Method, path: &str, body: &str) -> Self {
        Self::new(method, path, StatusCode::OK, body)
    }
}

/// A request as the mock received it.
#[derive(Debug, Clone)]
pub(crate) struct Recorded {
    pub(crate) method: Method,
    pub(crate) path: String,
    pub(crate) query: String,
    pub(crate) body: String,
}

#[derive(Debug, Clone)]
struct MockState {
    routes: Arc<Vec<Route>>,
    log: Arc<Mutex<Vec<Recorded>>>,
}

/// Handle to a running mock.
#[derive(Debug)]
pub(crate) struct MockBracket {
    pub(crate) url: String,
    log: Arc<Mutex<Vec<Recorded>>>,
}

impl MockBracket {
    /// Binds an ephemeral port and serves `routes`; unknown paths get 404.
    #[allow(clippy::panic)]
    pub(crate) async fn start(routes: Vec<Route>) -> Self {
        let log = Arc::new(Mutex::new(Vec::new()));
        let state = MockState {
            routes: Arc::new(routes),
            log: Arc::clone(&log),
        };
        let app = Router::new().fallback(respond).with_state(state);
        let Ok(listener) = tokio::net::TcpListener::bind("127.0.0.1:0").await else {
            panic!("bind mock bracket service");
        };
        let Ok(addr) = listener.local_addr() else {
            panic!("mock bracket address");
        };
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        Self {
            url: format!("http://{addr}"),
            log,
        }
    }

    /// Requests received so far, oldest first.
    pub(crate) fn requests(&self) -> Vec<Recorded> {
        self.log.lock().clone()
    }
}

async fn respond(
    State(state): State<MockState>,
    method: Method,
    uri: Uri,
    body: String,
) -> (StatusCode, String) {
    state.log.lock().push(Recorded {
        method: method.clone(),
        path: uri.path().to_string(),
        query: uri.query().unwrap_or_default().to_string(),
        body,
    });
    state
        .routes
        .iter()
        .find(|route| route.method == method && route.path == uri.path())
        .map_or_else(
            || (StatusCode::NOT_FOUND, String::new()),
            |route| (route.status, route.body.clone()),
        )
}
