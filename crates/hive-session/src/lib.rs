//! Client session core for HiveBooks.
//!
//! This crate provides:
//! - [`SessionManager`]: credential and identity ownership with an explicit
//!   FSM, hydration from durable storage and generation-guarded fetches
//! - [`HiveApi`] / [`HiveApiClient`]: the backend REST endpoints
//! - [`routes`]: client screens, the [`Navigator`] seam and the route guard
//! - [`forms`]: client-side validation for login, sign-up and password change

mod api;
mod auth_fsm;
mod error;
pub mod forms;
mod models;
pub mod routes;
mod session;

pub use api::{HiveApi, HiveApiClient};
pub use auth_fsm::session_machine;
pub use auth_fsm::{
    RetryConfig, SessionChangedPayload, SessionMachine, SessionMachineInput, SessionMachineState,
    SessionStatus,
};
pub use error::{SessionError, SessionResult};
pub use forms::{LoginForm, PasswordChangeForm, RegistrationForm, ValidationErrors};
pub use models::{AccessGrant, Identity, IdentityPatch, PasswordChange, RegistrationRequest, ADMIN_ROLE};
pub use routes::{guard, Access, Navigator, NoopNavigator, Route};
pub use session::{SessionManager, SessionSnapshot, SessionStateCallback};
