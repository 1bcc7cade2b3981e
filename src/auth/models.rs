//! Authentication models.
//! Mission: Represent the verified identity carried by a request.

use serde::{Deserialize, Serialize};

/// The authenticated caller, derived from a verified bearer token (spec §6).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthUser {
    /// `sub` claim.
    pub id: String,
    /// `preferred_username` claim, if present.
    pub username: Option<String>,
    /// `email` claim, if present.
    pub email: Option<String>,
    /// `azp` claim — the authorized party (originating client) of the token.
    pub azp: Option<String>,
    /// `realm_access.roles` claim.
    pub roles: Vec<String>,
}

/// Raw claims shape decoded from the verified JWT before being narrowed into
/// an [`AuthUser`]. Kept separate so unexpected/extra claims never leak
/// through to application code.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenClaims {
    pub sub: String,
    pub exp: usize,
    #[serde(default)]
    pub iss: Option<String>,
    #[serde(default)]
    pub aud: Option<serde_json::Value>,
    #[serde(default)]
    pub preferred_username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub azp: Option<String>,
    #[serde(default)]
    pub realm_access: Option<RealmAccess>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RealmAccess {
    #[serde(default)]
    pub roles: Vec<String>,
}

impl From<TokenClaims> for AuthUser {
    fn from(claims: TokenClaims) -> Self {
        Self {
            id: claims.sub,
            username: claims.preferred_username,
            email: claims.email,
            azp: claims.azp,
            roles: claims.realm_access.map(|r| r.roles).unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_claims_into_auth_user() {
        let claims = TokenClaims {
            sub: "user-1".to_string(),
            exp: 9999999999,
            iss: Some("https://idp.example/realms/marketplace".to_string()),
            aud: None,
            preferred_username: Some("seller1".to_string()),
            email: Some("seller1@example.com".to_string()),
            azp: Some("web-frontend".to_string()),
            realm_access: Some(RealmAccess { roles: vec!["seller".to_string()] }),
        };

        let user: AuthUser = claims.into();
        assert_eq!(user.id, "user-1");
        assert_eq!(user.username.as_deref(), Some("seller1"));
        assert_eq!(user.azp.as_deref(), Some("web-frontend"));
        assert_eq!(user.roles, vec!["seller".to_string()]);
    }

    #[test]
    fn missing_optional_claims_default_cleanly() {
        let claims = TokenClaims {
            sub: "user-2".to_string(),
            exp: 9999999999,
            iss: None,
            aud: None,
            preferred_username: None,
            email: None,
            azp: None,
            realm_access: None,
        };

        let user: AuthUser = claims.into();
        assert!(user.username.is_none());
        assert!(user.roles.is_empty());
    }
}
