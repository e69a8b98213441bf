//! Session state machine using rust-fsm.
//!
//! ## State Diagram
//!
//! ```text
//!                 ┌─────────────────┐
//!                 │  Uninitialized  │ (initial)
//!                 └───┬─────────┬───┘
//!     CredentialFound │         │ NoCredential
//!                     ▼         ▼
//! ┌─────────────────┐ CredentialIssued ┌─────────────────┐
//! │     Loading     │ ◄─────────────── │    Anonymous    │
//! └───┬─────────┬───┘                  └─────────────────┘
//!     │         │ CredentialRejected          ▲
//!     │         └─────────────────────────────┤
//!     │ IdentityFetched                       │ CredentialRejected
//!     ▼                                       │ LogoutRequested
//! ┌─────────────────┐                         │
//! │  Authenticated  │ ────────────────────────┘
//! └─────────────────┘
//! ```
//!
//! `LogoutRequested` is accepted in every state and always lands in
//! `Anonymous`. `CredentialIssued` (a successful login) is accepted in
//! every state and always lands in `Loading`.

use hive_config_and_utils::RetrySettings;
use rust_fsm::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

state_machine! {
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub session_machine(Uninitialized)

    Uninitialized => {
        CredentialFound => Loading,
        NoCredential => Anonymous,
        CredentialIssued => Loading,
        LogoutRequested => Anonymous
    },
    Loading => {
        IdentityFetched => Authenticated,
        // Transient fetch failure, another attempt follows
        FetchRetry => Loading,
        CredentialRejected => Anonymous,
        // A newer login supersedes the pending one
        CredentialIssued => Loading,
        LogoutRequested => Anonymous
    },
    Authenticated => {
        IdentityUpdated => Authenticated,
        CredentialRejected => Anonymous,
        CredentialIssued => Loading,
        LogoutRequested => Anonymous
    },
    Anonymous => {
        CredentialIssued => Loading,
        LogoutRequested => Anonymous
    }
}

pub use session_machine::Input as SessionMachineInput;
pub use session_machine::State as SessionMachineState;
pub use session_machine::StateMachine as SessionMachine;

/// Session status for external consumption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Created, not yet hydrated from storage.
    Uninitialized,
    /// A credential is held and the identity is being fetched.
    Loading,
    /// Credential validated and identity present.
    Authenticated,
    /// No credential.
    Anonymous,
}

impl SessionStatus {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionStatus::Authenticated)
    }

    /// Returns true while the outcome of hydration or login is still unknown.
    pub fn is_transient(&self) -> bool {
        matches!(self, SessionStatus::Uninitialized | SessionStatus::Loading)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Uninitialized => "uninitialized",
            SessionStatus::Loading => "loading",
            SessionStatus::Authenticated => "authenticated",
            SessionStatus::Anonymous => "anonymous",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&SessionMachineState> for SessionStatus {
    fn from(state: &SessionMachineState) -> Self {
        match state {
            SessionMachineState::Uninitialized => SessionStatus::Uninitialized,
            SessionMachineState::Loading => SessionStatus::Loading,
            SessionMachineState::Authenticated => SessionStatus::Authenticated,
            SessionMachineState::Anonymous => SessionStatus::Anonymous,
        }
    }
}

/// Retry behavior for transient identity-fetch failures.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total number of attempts, including the first. The default of 3
    /// means one fetch plus two retries.
    pub max_retries: u32,
    /// Initial delay between retries in milliseconds.
    pub initial_delay_ms: u64,
    /// Maximum delay between retries in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 250,
            max_delay_ms: 2000,
        }
    }
}

impl RetryConfig {
    /// Calculate the delay for a given attempt number (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 2u64.checked_pow(attempt).unwrap_or(u64::MAX);
        let delay_ms = self.initial_delay_ms.saturating_mul(factor);
        Duration::from_millis(delay_ms.min(self.max_delay_ms))
    }

    /// Number of attempts actually made. Zero is treated as one.
    pub fn attempts(&self) -> u32 {
        self.max_retries.max(1)
    }
}

impl From<&RetrySettings> for RetryConfig {
    fn from(settings: &RetrySettings) -> Self {
        Self {
            max_retries: settings.max_retries,
            initial_delay_ms: settings.initial_delay_ms,
            max_delay_ms: settings.max_delay_ms,
        }
    }
}

/// Payload for session change events.
///
/// `seq` increases with every event, in the order the changes were made.
/// Callbacks run outside the session lock, so overlapping operations may
/// deliver events out of order; observers should drop any event whose
/// `seq` is lower than the last one they applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionChangedPayload {
    #[serde(default)]
    pub seq: u64,
    pub status: SessionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}
