#![allow(dead_code)]

//! Shared fixtures for session integration tests.
//!
//! Provides:
//! - StubApi: an in-memory backend with call counters, scripted failures and
//!   gates that hold a request until the test releases it
//! - RecordingNavigator: remembers every navigation signal
//! - HttpStub: a one-shot HTTP server on a local TCP port

use async_trait::async_trait;
use hive_session::{
    AccessGrant, HiveApi, Identity, IdentityPatch, Navigator, PasswordChange, RegistrationRequest,
    RetryConfig, Route, SessionError, SessionManager, SessionResult,
};
use hive_storage::{CredentialStore, MemoryStorage};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::Notify;

pub fn identity(id: i64, name: &str, email: &str, roles: &[&str]) -> Identity {
    Identity {
        id,
        name: name.to_string(),
        email: email.to_string(),
        photo_url: None,
        bio: None,
        roles: roles.iter().map(|r| r.to_string()).collect(),
    }
}

/// A scripted failure for the identity endpoint.
#[derive(Debug, Clone, Copy)]
pub enum FetchFailure {
    /// 503 from the server
    Transient,
    /// 401 from the server
    Rejected,
}

/// Behavior of the update and password endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsReply {
    /// Success; update answers with the stored identity
    Echo,
    /// Success with an empty body
    Empty,
    /// 401
    Rejected,
    /// 422 with a message
    Invalid,
}

struct Account {
    secret: String,
    token: String,
}

#[derive(Default)]
struct Backend {
    accounts: HashMap<String, Account>,
    identities: HashMap<String, Identity>,
    fetch_failures: VecDeque<FetchFailure>,
    register_failure: Option<String>,
    auth_gates: HashMap<String, Arc<Notify>>,
    fetch_gates: HashMap<String, Arc<Notify>>,
    next_id: i64,
}

/// In-memory backend implementing [`HiveApi`].
pub struct StubApi {
    backend: Mutex<Backend>,
    settings_reply: Mutex<SettingsReply>,
    pub authenticate_calls: AtomicUsize,
    pub register_calls: AtomicUsize,
    pub fetch_calls: AtomicUsize,
    pub update_calls: AtomicUsize,
    pub password_calls: AtomicUsize,
}

impl StubApi {
    pub fn new() -> Self {
        Self {
            backend: Mutex::new(Backend {
                next_id: 100,
                ..Backend::default()
            }),
            settings_reply: Mutex::new(SettingsReply::Echo),
            authenticate_calls: AtomicUsize::new(0),
            register_calls: AtomicUsize::new(0),
            fetch_calls: AtomicUsize::new(0),
            update_calls: AtomicUsize::new(0),
            password_calls: AtomicUsize::new(0),
        }
    }

    /// Register an account whose login yields `token`.
    pub fn with_account(self, secret: &str, token: &str, identity: Identity) -> Self {
        {
            let mut backend = self.backend.lock();
            backend.accounts.insert(
                identity.email.clone(),
                Account {
                    secret: secret.to_string(),
                    token: token.to_string(),
                },
            );
            backend.identities.insert(token.to_string(), identity);
        }
        self
    }

    pub fn fail_next_fetches(&self, failures: &[FetchFailure]) {
        self.backend.lock().fetch_failures.extend(failures.iter().copied());
    }

    pub fn fail_registration(&self, message: &str) {
        self.backend.lock().register_failure = Some(message.to_string());
    }

    pub fn set_settings_reply(&self, reply: SettingsReply) {
        *self.settings_reply.lock() = reply;
    }

    /// Revoke a token server-side.
    pub fn revoke(&self, token: &str) {
        self.backend.lock().identities.remove(token);
    }

    /// Hold authentications for `email` until the returned gate is notified.
    pub fn hold_authenticate(&self, email: &str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.backend
            .lock()
            .auth_gates
            .insert(email.to_string(), gate.clone());
        gate
    }

    /// Hold identity fetches for `token` until the returned gate is notified.
    pub fn hold_fetch(&self, token: &str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.backend
            .lock()
            .fetch_gates
            .insert(token.to_string(), gate.clone());
        gate
    }

    pub fn server_identity(&self, token: &str) -> Option<Identity> {
        self.backend.lock().identities.get(token).cloned()
    }

    pub fn calls(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    pub fn total_calls(&self) -> usize {
        [
            &self.authenticate_calls,
            &self.register_calls,
            &self.fetch_calls,
            &self.update_calls,
            &self.password_calls,
        ]
        .iter()
        .map(|c| c.load(Ordering::SeqCst))
        .sum()
    }
}

#[async_trait]
impl HiveApi for StubApi {
    async fn authenticate(&self, email: &str, secret: &str) -> SessionResult<AccessGrant> {
        self.authenticate_calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.backend.lock().auth_gates.remove(email);
        if let Some(gate) = gate {
            gate.notified().await;
        }

        let backend = self.backend.lock();
        match backend.accounts.get(email) {
            Some(account) if account.secret == secret => Ok(AccessGrant {
                access_token: account.token.clone(),
                expires_in: Some(3600),
            }),
            _ => Err(SessionError::Authentication(
                "Invalid email or password".to_string(),
            )),
        }
    }

    async fn register(&self, request: &RegistrationRequest) -> SessionResult<()> {
        self.register_calls.fetch_add(1, Ordering::SeqCst);
        let mut backend = self.backend.lock();
        if let Some(message) = backend.register_failure.clone() {
            return Err(SessionError::Registration(message));
        }
        if backend.accounts.contains_key(&request.email) {
            return Err(SessionError::Registration(
                "Email already registered".to_string(),
            ));
        }

        backend.next_id += 1;
        let token = format!("token-{}", backend.next_id);
        let created = identity(backend.next_id, &request.name, &request.email, &["USER"]);
        backend.accounts.insert(
            request.email.clone(),
            Account {
                secret: request.secret.clone(),
                token: token.clone(),
            },
        );
        backend.identities.insert(token, created);
        Ok(())
    }

    async fn fetch_identity(&self, access_token: &str) -> SessionResult<Identity> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.backend.lock().fetch_gates.remove(access_token);
        if let Some(gate) = gate {
            gate.notified().await;
        }

        let mut backend = self.backend.lock();
        match backend.fetch_failures.pop_front() {
            Some(FetchFailure::Transient) => {
                return Err(SessionError::Server {
                    status: 503,
                    message: "Service unavailable".to_string(),
                })
            }
            Some(FetchFailure::Rejected) => return Err(SessionError::SessionExpired),
            None => {}
        }
        backend
            .identities
            .get(access_token)
            .cloned()
            .ok_or(SessionError::SessionExpired)
    }

    async fn update_identity(
        &self,
        access_token: &str,
        patch: &IdentityPatch,
    ) -> SessionResult<Option<Identity>> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        let reply = *self.settings_reply.lock();
        let mut backend = self.backend.lock();
        let Some(stored) = backend.identities.get_mut(access_token) else {
            return Err(SessionError::SessionExpired);
        };

        match reply {
            SettingsReply::Rejected => Err(SessionError::SessionExpired),
            SettingsReply::Invalid => Err(SessionError::Api {
                status: 422,
                message: "Invalid profile".to_string(),
            }),
            SettingsReply::Empty => {
                patch.apply(stored);
                Ok(None)
            }
            SettingsReply::Echo => {
                patch.apply(stored);
                // the server normalizes names
                stored.name = stored.name.trim().to_string();
                Ok(Some(stored.clone()))
            }
        }
    }

    async fn change_password(
        &self,
        access_token: &str,
        change: &PasswordChange,
    ) -> SessionResult<()> {
        self.password_calls.fetch_add(1, Ordering::SeqCst);
        let reply = *self.settings_reply.lock();
        let mut backend = self.backend.lock();
        let Some(email) = backend
            .identities
            .get(access_token)
            .map(|i| i.email.clone())
        else {
            return Err(SessionError::SessionExpired);
        };

        match reply {
            SettingsReply::Rejected => Err(SessionError::SessionExpired),
            SettingsReply::Invalid => Err(SessionError::Api {
                status: 400,
                message: "Current password is wrong".to_string(),
            }),
            SettingsReply::Echo | SettingsReply::Empty => {
                let Some(account) = backend.accounts.get_mut(&email) else {
                    return Err(SessionError::SessionExpired);
                };
                if account.secret != change.current_secret {
                    return Err(SessionError::Api {
                        status: 400,
                        message: "Current password is wrong".to_string(),
                    });
                }
                account.secret = change.new_secret.clone();
                Ok(())
            }
        }
    }
}

/// Navigator that records every signal.
#[derive(Default)]
pub struct RecordingNavigator {
    routes: Mutex<Vec<Route>>,
}

impl RecordingNavigator {
    pub fn routes(&self) -> Vec<Route> {
        self.routes.lock().clone()
    }

    pub fn count(&self, route: &Route) -> usize {
        self.routes.lock().iter().filter(|r| *r == route).count()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, route: Route) {
        self.routes.lock().push(route);
    }
}

pub struct Harness {
    pub api: Arc<StubApi>,
    pub credentials: CredentialStore,
    pub navigator: Arc<RecordingNavigator>,
    pub manager: Arc<SessionManager>,
}

pub fn fast_retry() -> RetryConfig {
    RetryConfig {
        max_retries: 3,
        initial_delay_ms: 1,
        max_delay_ms: 4,
    }
}

/// Build a manager over `api` with an optional pre-stored token.
pub fn harness(api: StubApi, stored_token: Option<&str>) -> Harness {
    let api = Arc::new(api);
    let storage = Arc::new(MemoryStorage::new());
    let credentials = CredentialStore::new(storage);
    if let Some(token) = stored_token {
        credentials.set_access_token(token).unwrap();
    }
    let navigator = Arc::new(RecordingNavigator::default());
    let manager = Arc::new(SessionManager::with_retry_config(
        api.clone(),
        credentials.clone(),
        navigator.clone(),
        fast_retry(),
    ));
    Harness {
        api,
        credentials,
        navigator,
        manager,
    }
}

pub const EMAIL: &str = "user@x.com";
pub const SECRET: &str = "right-secret";
pub const TOKEN: &str = "token-user";

pub fn default_api() -> StubApi {
    StubApi::new().with_account(SECRET, TOKEN, identity(7, "User X", EMAIL, &["USER"]))
}

/// Wait until `counter` reaches `n`, yielding to spawned tasks.
pub async fn wait_for_calls(counter: &AtomicUsize, n: usize) {
    for _ in 0..10_000 {
        if counter.load(Ordering::SeqCst) >= n {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("timed out waiting for {} calls", n);
}

/// A request captured by [`HttpStub`].
#[derive(Debug, Clone, Default)]
pub struct CapturedRequest {
    pub method: String,
    pub path: String,
    pub headers: HashMap<String, String>,
    pub body: String,
}

/// Serves exactly one HTTP request with a canned answer.
pub struct HttpStub {
    pub base_url: String,
    captured: Arc<Mutex<Option<CapturedRequest>>>,
    handle: tokio::task::JoinHandle<()>,
}

impl HttpStub {
    pub async fn start(status: u16, body: &str) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let captured = Arc::new(Mutex::new(None));
        let captured_clone = captured.clone();
        let body = body.to_string();

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let request = read_request(&mut socket).await;
            *captured_clone.lock() = Some(request);

            let response = format!(
                "HTTP/1.1 {} Stub\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.flush().await.unwrap();
        });

        Self {
            base_url: format!("http://{}/api", addr),
            captured,
            handle,
        }
    }

    /// Wait for the served request.
    pub async fn request(self) -> CapturedRequest {
        self.handle.await.unwrap();
        let captured = self.captured.lock().take();
        captured.unwrap()
    }
}

async fn read_request(socket: &mut tokio::net::TcpStream) -> CapturedRequest {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    let header_end = loop {
        let n = socket.read(&mut chunk).await.unwrap();
        assert!(n > 0, "connection closed before headers");
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let mut lines = head.split("\r\n");
    let request_line = lines.next().unwrap_or_default();
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or_default().to_string();
    let path = parts.next().unwrap_or_default().to_string();

    let headers: HashMap<String, String> = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.trim().to_ascii_lowercase(), v.trim().to_string()))
        .collect();

    let content_length: usize = headers
        .get("content-length")
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);
    while buf.len() < header_end + content_length {
        let n = socket.read(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    let body = String::from_utf8_lossy(&buf[header_end..]).to_string();

    CapturedRequest {
        method,
        path,
        headers,
        body,
    }
}
