//! Session management using FSM-based state tracking.
//!
//! The manager owns the credential and identity of one client process. All
//! state sits behind a single lock that is never held across an `.await`.
//! Every credential change bumps a generation counter; an identity fetch
//! commits only while its generation is still current, so a slow answer
//! can never overwrite a newer login or resurrect a logged-out session.

use crate::api::HiveApi;
use crate::auth_fsm::{
    RetryConfig, SessionChangedPayload, SessionMachine, SessionMachineInput, SessionStatus,
};
use crate::error::{SessionError, SessionResult};
use crate::models::{Identity, IdentityPatch, PasswordChange, RegistrationRequest};
use crate::routes::{Navigator, Route};
use chrono::{DateTime, TimeDelta, Utc};
use hive_storage::CredentialStore;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Callback type for session change notifications.
pub type SessionStateCallback = Box<dyn Fn(SessionChangedPayload) + Send + Sync>;

/// Read-only view of the session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub status: SessionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity: Option<Identity>,
    pub has_credential: bool,
    /// Only known for credentials issued by a login in this process.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

struct SessionInner {
    fsm: SessionMachine,
    credential: Option<String>,
    identity: Option<Identity>,
    expires_at: Option<DateTime<Utc>>,
    /// Bumped on every credential change.
    generation: u64,
    /// Bumped when a login starts.
    login_ticket: u64,
    /// Logins whose ticket is at or below this may no longer store a
    /// credential: a later-started login committed, or a logout happened.
    settled_ticket: u64,
    /// Sequence number of the last change event handed out.
    events: u64,
    initialized: bool,
}

impl SessionInner {
    fn new() -> Self {
        Self {
            fsm: SessionMachine::new(),
            credential: None,
            identity: None,
            expires_at: None,
            generation: 0,
            login_ticket: 0,
            settled_ticket: 0,
            events: 0,
            initialized: false,
        }
    }

    fn status(&self) -> SessionStatus {
        SessionStatus::from(self.fsm.state())
    }

    /// Feed `input` to the machine. Returns true when observers should be
    /// told: the status changed or the identity was edited in place.
    fn apply(&mut self, input: &SessionMachineInput) -> SessionResult<bool> {
        let old_status = self.status();
        self.fsm.consume(input).map_err(|_| {
            SessionError::InvalidStateTransition(format!(
                "Cannot apply {:?} in state {:?}",
                input,
                self.fsm.state()
            ))
        })?;
        let new_status = self.status();

        if old_status != new_status {
            debug!(
                old_status = %old_status,
                new_status = %new_status,
                "Session state transition"
            );
        }
        Ok(old_status != new_status || matches!(input, SessionMachineInput::IdentityUpdated))
    }

    /// Drop credential and identity and retire every in-flight fetch.
    fn clear(&mut self) {
        self.credential = None;
        self.identity = None;
        self.expires_at = None;
        self.generation += 1;
    }

    fn payload(&mut self) -> SessionChangedPayload {
        self.events += 1;
        SessionChangedPayload {
            seq: self.events,
            status: self.status(),
            user_id: self.identity.as_ref().map(|i| i.id),
            email: self.identity.as_ref().map(|i| i.email.clone()),
        }
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            status: self.status(),
            identity: self.identity.clone(),
            has_credential: self.credential.is_some(),
            expires_at: self.expires_at,
        }
    }
}

/// Session manager for the client with FSM-based state tracking.
///
/// One instance per process, shared through `Arc`. The persisted credential
/// outlives the process; the identity is always re-fetched.
pub struct SessionManager {
    api: Arc<dyn HiveApi>,
    credentials: CredentialStore,
    navigator: Arc<dyn Navigator>,
    retry_config: RetryConfig,
    inner: Mutex<SessionInner>,
    state_callback: Mutex<Option<SessionStateCallback>>,
}

impl SessionManager {
    /// Create a new session manager.
    pub fn new(
        api: Arc<dyn HiveApi>,
        credentials: CredentialStore,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self::with_retry_config(api, credentials, navigator, RetryConfig::default())
    }

    /// Create a new session manager with custom identity-fetch retry behavior.
    pub fn with_retry_config(
        api: Arc<dyn HiveApi>,
        credentials: CredentialStore,
        navigator: Arc<dyn Navigator>,
        retry_config: RetryConfig,
    ) -> Self {
        Self {
            api,
            credentials,
            navigator,
            retry_config,
            inner: Mutex::new(SessionInner::new()),
            state_callback: Mutex::new(None),
        }
    }

    /// Set a callback to be notified of session changes.
    pub fn set_state_callback(&self, callback: SessionStateCallback) {
        *self.state_callback.lock() = Some(callback);
    }

    fn notify(&self, payload: Option<SessionChangedPayload>) {
        let Some(payload) = payload else {
            return;
        };
        let cb = self.state_callback.lock();
        if let Some(callback) = cb.as_ref() {
            callback(payload);
        }
    }

    pub fn status(&self) -> SessionStatus {
        self.inner.lock().status()
    }

    pub fn is_authenticated(&self) -> bool {
        self.status().is_authenticated()
    }

    pub fn identity(&self) -> Option<Identity> {
        self.inner.lock().identity.clone()
    }

    /// The held bearer token, if any.
    pub fn access_token(&self) -> Option<String> {
        self.inner.lock().credential.clone()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.inner.lock().snapshot()
    }

    /// Hydrate the session from storage.
    ///
    /// - No stored credential: `anonymous`, no network call.
    /// - Stored credential: `loading`, then the identity is fetched and the
    ///   session ends `authenticated` or, if the credential fails validation,
    ///   `anonymous` with the credential cleared.
    ///
    /// Only the first call does anything; later calls return the current
    /// status. Errors are logged, never returned.
    pub async fn initialize(&self) -> SessionStatus {
        match self.hydrate().await {
            Ok(status) => status,
            Err(SessionError::Superseded) => {
                debug!("Hydration overtaken by a newer session change");
                self.status()
            }
            Err(e) => {
                warn!(error = %e, "Session hydration ended without a session");
                self.status()
            }
        }
    }

    /// Run [`initialize`](Self::initialize) on a Tokio task.
    pub fn spawn_initialize(self: &Arc<Self>) -> JoinHandle<SessionStatus> {
        let manager = Arc::clone(self);
        tokio::spawn(async move { manager.initialize().await })
    }

    async fn hydrate(&self) -> SessionResult<SessionStatus> {
        let (token, generation) = {
            let mut inner = self.inner.lock();
            if inner.initialized || inner.status() != SessionStatus::Uninitialized {
                inner.initialized = true;
                return Ok(inner.status());
            }
            inner.initialized = true;

            let stored = self.credentials.get_access_token().unwrap_or_else(|e| {
                warn!(error = %e, "Could not read stored credential");
                None
            });

            let Some(token) = stored else {
                let changed = inner.apply(&SessionMachineInput::NoCredential)?;
                let payload = changed.then(|| inner.payload());
                drop(inner);
                self.notify(payload);
                info!("No stored credential, session is anonymous");
                return Ok(SessionStatus::Anonymous);
            };

            let changed = inner.apply(&SessionMachineInput::CredentialFound)?;
            inner.generation += 1;
            inner.credential = Some(token.clone());
            let generation = inner.generation;
            let payload = changed.then(|| inner.payload());
            drop(inner);
            self.notify(payload);
            (token, generation)
        };

        info!("Stored credential found, validating with server");
        self.load_identity(&token, generation).await?;
        Ok(self.status())
    }

    /// Fetch the identity for `token` and commit it if `generation` is
    /// still current.
    ///
    /// Transient failures are retried with exponential backoff. A rejection,
    /// or running out of attempts, invalidates the credential.
    async fn load_identity(&self, token: &str, generation: u64) -> SessionResult<Identity> {
        let attempts = self.retry_config.attempts();
        let mut attempt = 0;

        loop {
            match self.api.fetch_identity(token).await {
                Ok(identity) => return self.commit_identity(identity, generation),
                Err(e) if e.is_transient() && attempt + 1 < attempts => {
                    {
                        let mut inner = self.inner.lock();
                        if inner.generation != generation {
                            return Err(SessionError::Superseded);
                        }
                        inner.apply(&SessionMachineInput::FetchRetry)?;
                    }

                    let delay = self.retry_config.delay_for_attempt(attempt);
                    debug!(
                        attempt = attempt + 1,
                        max_retries = attempts,
                        delay_ms = delay.as_millis(),
                        error = %e,
                        "Identity fetch failed with transient error, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    if e.is_transient() {
                        warn!(attempts, error = %e, "Identity fetch failed after retries");
                    } else {
                        warn!(error = %e, "Credential rejected by server");
                    }
                    if !self.invalidate(generation) {
                        return Err(SessionError::Superseded);
                    }
                    return Err(e);
                }
            }
        }
    }

    fn commit_identity(&self, identity: Identity, generation: u64) -> SessionResult<Identity> {
        let payload = {
            let mut inner = self.inner.lock();
            if inner.generation != generation {
                debug!(user_id = identity.id, "Dropping identity from a stale fetch");
                return Err(SessionError::Superseded);
            }
            let changed = inner.apply(&SessionMachineInput::IdentityFetched)?;
            inner.identity = Some(identity.clone());
            changed.then(|| inner.payload())
        };
        self.notify(payload);
        info!(user_id = identity.id, "Identity loaded");
        Ok(identity)
    }

    /// Logout path minus navigation. Returns false if `generation` is stale
    /// and nothing was touched.
    fn invalidate(&self, generation: u64) -> bool {
        let payload = {
            let mut inner = self.inner.lock();
            if inner.generation != generation {
                return false;
            }
            let changed = match inner.apply(&SessionMachineInput::CredentialRejected) {
                Ok(changed) => changed,
                Err(e) => {
                    warn!(error = %e, "Could not invalidate session");
                    return false;
                }
            };
            self.clear_stored_credential();
            inner.clear();
            changed.then(|| inner.payload())
        };
        self.notify(payload);
        info!("Session invalidated");
        true
    }

    fn clear_stored_credential(&self) {
        if let Err(e) = self.credentials.clear_access_token() {
            warn!(error = %e, "Failed to clear stored credential");
        }
    }

    /// Login with email and secret.
    ///
    /// On success the credential is persisted, the identity fetched and the
    /// navigator sent to the feed. A refused login leaves state and storage
    /// untouched. When two logins overlap and both are accepted, the one
    /// started last wins and the other fails with
    /// [`SessionError::Superseded`]. A refused login never cancels another.
    pub async fn login(&self, email: &str, secret: &str) -> SessionResult<Identity> {
        let ticket = {
            let mut inner = self.inner.lock();
            inner.login_ticket += 1;
            inner.login_ticket
        };

        debug!("Attempting login");
        let grant = self.api.authenticate(email, secret).await?;

        let (token, generation) = {
            let mut inner = self.inner.lock();
            if ticket <= inner.settled_ticket {
                debug!("Login overtaken before the credential was stored");
                return Err(SessionError::Superseded);
            }

            self.credentials.set_access_token(&grant.access_token)?;
            inner.settled_ticket = ticket;
            let changed = inner.apply(&SessionMachineInput::CredentialIssued)?;
            inner.initialized = true;
            inner.generation += 1;
            inner.credential = Some(grant.access_token.clone());
            inner.identity = None;
            inner.expires_at = grant
                .expires_in
                .and_then(TimeDelta::try_seconds)
                .and_then(|ttl| Utc::now().checked_add_signed(ttl));
            let generation = inner.generation;
            let payload = changed.then(|| inner.payload());
            drop(inner);
            self.notify(payload);
            (grant.access_token, generation)
        };

        let identity = self.load_identity(&token, generation).await?;
        info!(user_id = identity.id, "Login successful");
        self.navigator.navigate(Route::Feed);
        Ok(identity)
    }

    /// Create an account, then log in with the same credentials.
    ///
    /// A refused registration changes nothing.
    pub async fn register(&self, request: &RegistrationRequest) -> SessionResult<Identity> {
        self.api.register(request).await?;
        info!("Registration accepted, logging in");
        self.login(&request.email, &request.secret).await
    }

    /// Clear credential and identity and send the navigator to the login
    /// screen. Idempotent; never touches the network.
    pub fn logout(&self) {
        let payload = {
            let mut inner = self.inner.lock();
            inner.settled_ticket = inner.login_ticket;
            inner.initialized = true;
            let changed = match inner.apply(&SessionMachineInput::LogoutRequested) {
                Ok(changed) => changed,
                Err(e) => {
                    warn!(error = %e, "Logout transition rejected");
                    false
                }
            };
            self.clear_stored_credential();
            inner.clear();
            changed.then(|| inner.payload())
        };
        self.notify(payload);
        info!("Logged out");
        self.navigator.navigate(Route::Login);
    }

    /// Merge `patch` into the in-memory identity without a round trip.
    ///
    /// No-op unless authenticated. Returns whether the patch was applied.
    /// Front ends should prefer [`update_profile`](Self::update_profile).
    pub fn update_identity(&self, patch: &IdentityPatch) -> bool {
        let payload = {
            let mut inner = self.inner.lock();
            if !inner.status().is_authenticated() {
                debug!(status = %inner.status(), "Ignoring identity update without a session");
                return false;
            }
            let Some(identity) = inner.identity.as_mut() else {
                return false;
            };
            patch.apply(identity);
            match inner.apply(&SessionMachineInput::IdentityUpdated) {
                Ok(true) => Some(inner.payload()),
                Ok(false) => None,
                Err(e) => {
                    warn!(error = %e, "Identity update transition rejected");
                    None
                }
            }
        };
        self.notify(payload);
        true
    }

    fn authenticated_context(&self) -> SessionResult<(String, u64, Identity)> {
        let inner = self.inner.lock();
        match (inner.status(), &inner.credential, &inner.identity) {
            (SessionStatus::Authenticated, Some(token), Some(identity)) => {
                Ok((token.clone(), inner.generation, identity.clone()))
            }
            _ => Err(SessionError::NotAuthenticated),
        }
    }

    /// Update the profile on the server, then locally.
    ///
    /// The local identity changes only after the server accepts. If the
    /// server answers with an identity, that identity replaces the local
    /// one; otherwise the patch is merged. A `401/403` ends the session.
    pub async fn update_profile(&self, patch: &IdentityPatch) -> SessionResult<Identity> {
        let (token, generation, current) = self.authenticated_context()?;
        if patch.is_empty() {
            return Ok(current);
        }

        match self.api.update_identity(&token, patch).await {
            Ok(returned) => {
                let (identity, payload) = {
                    let mut inner = self.inner.lock();
                    if inner.generation != generation {
                        return Err(SessionError::Superseded);
                    }
                    let changed = inner.apply(&SessionMachineInput::IdentityUpdated)?;
                    let identity = match returned {
                        Some(identity) => identity,
                        None => {
                            let mut merged = inner.identity.clone().unwrap_or(current);
                            patch.apply(&mut merged);
                            merged
                        }
                    };
                    inner.identity = Some(identity.clone());
                    (identity, changed.then(|| inner.payload()))
                };
                self.notify(payload);
                info!(user_id = identity.id, "Profile updated");
                Ok(identity)
            }
            Err(SessionError::SessionExpired) => {
                self.invalidate(generation);
                Err(SessionError::SessionExpired)
            }
            Err(e) => Err(e),
        }
    }

    /// Change the account password. No local state changes on success;
    /// a `401/403` ends the session.
    pub async fn change_password(&self, change: &PasswordChange) -> SessionResult<()> {
        let (token, generation, identity) = self.authenticated_context()?;

        match self.api.change_password(&token, change).await {
            Ok(()) => {
                info!(user_id = identity.id, "Password changed");
                Ok(())
            }
            Err(SessionError::SessionExpired) => {
                self.invalidate(generation);
                Err(SessionError::SessionExpired)
            }
            Err(e) => Err(e),
        }
    }
}
