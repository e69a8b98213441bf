//! Client screens, the navigation seam and the route guard.

use crate::auth_fsm::SessionStatus;
use crate::session::SessionSnapshot;
use serde::{Serialize, Serializer};
use std::fmt;

/// A screen of the client.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Route {
    Home,
    Login,
    Register,
    RecoverPassword,
    Feed,
    Explore,
    Upload,
    Profile,
    Settings,
    /// Detail page of a single work.
    Work(String),
    Admin,
    AdminWorks,
    AdminUsers,
    AdminCategories,
    AdminStatistics,
    AdminSettings,
}

impl Route {
    pub fn path(&self) -> String {
        let path = match self {
            Route::Home => "/",
            Route::Login => "/login",
            Route::Register => "/cadastro",
            Route::RecoverPassword => "/recuperar-senha",
            Route::Feed => "/feed",
            Route::Explore => "/explorar",
            Route::Upload => "/hivar",
            Route::Profile => "/perfil",
            Route::Settings => "/configuracoes",
            Route::Work(id) => return format!("/obra/{}", id),
            Route::Admin => "/admin",
            Route::AdminWorks => "/admin/obras",
            Route::AdminUsers => "/admin/usuarios",
            Route::AdminCategories => "/admin/categorias",
            Route::AdminStatistics => "/admin/estatisticas",
            Route::AdminSettings => "/admin/configuracoes",
        };
        path.to_string()
    }

    /// Map a path back to its screen. Query string, fragment and a
    /// trailing slash are ignored.
    pub fn parse(path: &str) -> Option<Route> {
        let path = path
            .split(|c| c == '?' || c == '#')
            .next()
            .unwrap_or_default();
        if !path.starts_with('/') {
            return None;
        }
        let segments: Vec<&str> = path.trim_end_matches('/').split('/').skip(1).collect();

        let route = match segments.as_slice() {
            [] => Route::Home,
            ["login"] => Route::Login,
            ["cadastro"] => Route::Register,
            ["recuperar-senha"] => Route::RecoverPassword,
            ["feed"] => Route::Feed,
            ["explorar"] => Route::Explore,
            ["hivar"] => Route::Upload,
            ["perfil"] => Route::Profile,
            ["configuracoes"] => Route::Settings,
            ["obra", id] if !id.is_empty() => Route::Work(id.to_string()),
            ["admin"] => Route::Admin,
            ["admin", "obras"] => Route::AdminWorks,
            ["admin", "usuarios"] => Route::AdminUsers,
            ["admin", "categorias"] => Route::AdminCategories,
            ["admin", "estatisticas"] => Route::AdminStatistics,
            ["admin", "configuracoes"] => Route::AdminSettings,
            _ => return None,
        };
        Some(route)
    }

    /// Reachable without a session.
    pub fn is_public(&self) -> bool {
        matches!(
            self,
            Route::Home | Route::Login | Route::Register | Route::RecoverPassword
        )
    }

    /// Only meaningful for anonymous users.
    pub fn is_auth_only(&self) -> bool {
        matches!(self, Route::Login | Route::Register)
    }

    pub fn is_admin(&self) -> bool {
        matches!(
            self,
            Route::Admin
                | Route::AdminWorks
                | Route::AdminUsers
                | Route::AdminCategories
                | Route::AdminStatistics
                | Route::AdminSettings
        )
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

impl Serialize for Route {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.path())
    }
}

/// Navigation side channel fired by the session.
pub trait Navigator: Send + Sync {
    fn navigate(&self, route: Route);
}

/// Navigator that drops every signal.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNavigator;

impl Navigator for NoopNavigator {
    fn navigate(&self, _route: Route) {}
}

/// Outcome of the route guard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "access", content = "to", rename_all = "snake_case")]
pub enum Access {
    Allow,
    /// The session has not settled yet; render a loading state.
    Pending,
    Redirect(Route),
}

/// Decide whether the current session may view `route`.
pub fn guard(route: &Route, snapshot: &SessionSnapshot) -> Access {
    if route.is_auth_only() && snapshot.status.is_authenticated() {
        return Access::Redirect(Route::Feed);
    }
    if route.is_public() {
        return Access::Allow;
    }

    match snapshot.status {
        SessionStatus::Uninitialized | SessionStatus::Loading => Access::Pending,
        SessionStatus::Anonymous => Access::Redirect(Route::Login),
        SessionStatus::Authenticated => {
            let is_admin = snapshot
                .identity
                .as_ref()
                .map(|identity| identity.is_admin())
                .unwrap_or(false);
            if route.is_admin() && !is_admin {
                Access::Redirect(Route::Feed)
            } else {
                Access::Allow
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Identity;

    fn snapshot(status: SessionStatus, roles: &[&str]) -> SessionSnapshot {
        let identity = status.is_authenticated().then(|| Identity {
            id: 1,
            name: "Ana".to_string(),
            email: "ana@hive.dev".to_string(),
            photo_url: None,
            bio: None,
            roles: roles.iter().map(|r| r.to_string()).collect(),
        });
        SessionSnapshot {
            status,
            identity,
            has_credential: !matches!(status, SessionStatus::Anonymous | SessionStatus::Uninitialized),
            expires_at: None,
        }
    }

    #[test]
    fn test_paths_roundtrip() {
        let routes = [
            Route::Home,
            Route::Login,
            Route::Register,
            Route::RecoverPassword,
            Route::Feed,
            Route::Explore,
            Route::Upload,
            Route::Profile,
            Route::Settings,
            Route::Work("42".to_string()),
            Route::Admin,
            Route::AdminWorks,
            Route::AdminUsers,
            Route::AdminCategories,
            Route::AdminStatistics,
            Route::AdminSettings,
        ];
        for route in routes {
            assert_eq!(Route::parse(&route.path()), Some(route));
        }
    }

    #[test]
    fn test_parse_ignores_query_and_trailing_slash() {
        assert_eq!(Route::parse("/feed/"), Some(Route::Feed));
        assert_eq!(Route::parse("/explorar?q=calculo"), Some(Route::Explore));
        assert_eq!(Route::parse("/obra/9#comentarios"), Some(Route::Work("9".to_string())));
        assert_eq!(Route::parse("/"), Some(Route::Home));
    }

    #[test]
    fn test_parse_unknown() {
        assert_eq!(Route::parse("/nope"), None);
        assert_eq!(Route::parse("/obra/"), None);
        assert_eq!(Route::parse("/admin/obras/extra"), None);
        assert_eq!(Route::parse("feed"), None);
    }

    #[test]
    fn test_public_routes_always_allowed() {
        for status in [
            SessionStatus::Uninitialized,
            SessionStatus::Loading,
            SessionStatus::Anonymous,
        ] {
            let snap = snapshot(status, &[]);
            assert_eq!(guard(&Route::Login, &snap), Access::Allow);
            assert_eq!(guard(&Route::RecoverPassword, &snap), Access::Allow);
        }
        let snap = snapshot(SessionStatus::Authenticated, &["USER"]);
        assert_eq!(guard(&Route::RecoverPassword, &snap), Access::Allow);
    }

    #[test]
    fn test_protected_routes_pending_while_loading() {
        assert_eq!(
            guard(&Route::Feed, &snapshot(SessionStatus::Loading, &[])),
            Access::Pending
        );
        assert_eq!(
            guard(&Route::Admin, &snapshot(SessionStatus::Uninitialized, &[])),
            Access::Pending
        );
    }

    #[test]
    fn test_anonymous_redirected_to_login() {
        let snap = snapshot(SessionStatus::Anonymous, &[]);
        assert_eq!(guard(&Route::Profile, &snap), Access::Redirect(Route::Login));
        assert_eq!(guard(&Route::AdminUsers, &snap), Access::Redirect(Route::Login));
    }

    #[test]
    fn test_admin_routes_require_admin_role() {
        let user = snapshot(SessionStatus::Authenticated, &["USER"]);
        assert_eq!(guard(&Route::AdminWorks, &user), Access::Redirect(Route::Feed));
        assert_eq!(guard(&Route::Upload, &user), Access::Allow);

        let admin = snapshot(SessionStatus::Authenticated, &["USER", "ADMIN"]);
        assert_eq!(guard(&Route::AdminWorks, &admin), Access::Allow);
    }

    #[test]
    fn test_authenticated_user_leaves_auth_screens() {
        let snap = snapshot(SessionStatus::Authenticated, &["USER"]);
        assert_eq!(guard(&Route::Login, &snap), Access::Redirect(Route::Feed));
        assert_eq!(guard(&Route::Register, &snap), Access::Redirect(Route::Feed));
    }

    #[test]
    fn test_access_serializes_with_path() {
        let value = serde_json::to_value(Access::Redirect(Route::Login)).unwrap();
        assert_eq!(value, serde_json::json!({"access": "redirect", "to": "/login"}));
        let value = serde_json::to_value(Access::Allow).unwrap();
        assert_eq!(value, serde_json::json!({"access": "allow"}));
    }
}
