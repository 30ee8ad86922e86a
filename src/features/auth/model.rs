use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::features::users::models::UserRole;

/// The caller of a protected route, decoded from the access token
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    pub username: String,
    pub role: UserRole,
}

impl AuthenticatedUser {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    /// Owners and admins may modify a record
    pub fn can_modify(&self, owner_id: Uuid) -> bool {
        self.is_admin() || self.user_id == owner_id
    }
}

/// JWT claims embedded in every access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Subject -- the user's id
    pub sub: Uuid,
    pub username: String,
    pub role: UserRole,
    /// Expiration time (UTC Unix timestamp)
    pub exp: i64,
    /// Issued-at time (UTC Unix timestamp)
    pub iat: i64,
    /// Unique token identifier
    pub jti: String,
}

impl From<AccessClaims> for AuthenticatedUser {
    fn from(claims: AccessClaims) -> Self {
        Self {
            user_id: claims.sub,
            username: claims.username,
            role: claims.role,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_can_modify() {
        let owner = Uuid::new_v4();
        let reporter = AuthenticatedUser {
            user_id: owner,
            username: "juan".to_string(),
            role: UserRole::Reporter,
        };
        assert!(reporter.can_modify(owner));
        assert!(!reporter.can_modify(Uuid::new_v4()));

        let admin = AuthenticatedUser {
            user_id: Uuid::new_v4(),
            username: "admin".to_string(),
            role: UserRole::Admin,
        };
        assert!(admin.can_modify(owner));
    }
}
