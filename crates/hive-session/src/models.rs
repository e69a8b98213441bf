//! Wire types exchanged with the HiveBooks backend.

use serde::{Deserialize, Serialize};

/// Role name granting access to the admin dashboard.
pub const ADMIN_ROLE: &str = "ADMIN";

/// The authenticated user's profile.
///
/// Older backends send the Portuguese field names; both spellings are
/// accepted when reading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub id: i64,
    #[serde(alias = "nome")]
    pub name: String,
    pub email: String,
    #[serde(default, alias = "fotoUrl", skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    #[serde(default, alias = "descricao", skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(default, alias = "perfis")]
    pub roles: Vec<String>,
}

impl Identity {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r.eq_ignore_ascii_case(role))
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(ADMIN_ROLE)
    }
}

/// Partial identity update. Absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
}

impl IdentityPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none() && self.photo_url.is_none() && self.bio.is_none()
    }

    /// Merge the present fields into `identity`.
    pub fn apply(&self, identity: &mut Identity) {
        if let Some(name) = &self.name {
            identity.name = name.clone();
        }
        if let Some(email) = &self.email {
            identity.email = email.clone();
        }
        if let Some(photo_url) = &self.photo_url {
            identity.photo_url = Some(photo_url.clone());
        }
        if let Some(bio) = &self.bio {
            identity.bio = Some(bio.clone());
        }
    }
}

/// Answer to a successful authentication.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessGrant {
    pub access_token: String,
    /// Lifetime of the token in seconds.
    #[serde(default)]
    pub expires_in: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct AuthenticationRequest<'a> {
    pub email: &'a str,
    pub secret: &'a str,
}

/// New account fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistrationRequest {
    pub name: String,
    pub email: String,
    pub secret: String,
}

/// Password change request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordChange {
    pub current_secret: String,
    pub new_secret: String,
}

/// Error body the backend sends with non-success answers.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub message: Option<String>,
}
