//! Role-based authorization guards.
//!
//! These guards extract the authenticated user placed in request extensions by
//! the auth middleware and verify the required role.
//!
//! Roles:
//! - admin: manages categories, the dataset, the classifier and users
//! - reporter: reports incidents and tracks their own reports
//!
//! Admins can do everything reporters can.

use crate::core::error::AppError;
use crate::features::auth::model::AuthenticatedUser;
use axum::{extract::FromRequestParts, http::request::Parts};

fn authenticated_user(parts: &Parts) -> Result<AuthenticatedUser, AppError> {
    parts
        .extensions
        .get::<AuthenticatedUser>()
        .cloned()
        .ok_or_else(|| AppError::Unauthorized("User not authenticated".to_string()))
}

/// Guard for checking if user is an admin.
///
/// # Example
/// ```ignore
/// pub async fn handler(RequireAdmin(user): RequireAdmin) { ... }
/// ```
pub struct RequireAdmin(pub AuthenticatedUser);

impl<S> FromRequestParts<S> for RequireAdmin
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user = authenticated_user(parts)?;

        if !user.is_admin() {
            return Err(AppError::Forbidden("Admin access required".to_string()));
        }

        Ok(RequireAdmin(user))
    }
}

/// Guard for any signed-in account (reporter or admin).
///
/// # Example
/// ```ignore
/// pub async fn handler(RequireReporter(user): RequireReporter) { ... }
/// ```
pub struct RequireReporter(pub AuthenticatedUser);

impl<S> FromRequestParts<S> for RequireReporter
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(RequireReporter(authenticated_user(parts)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::users::models::UserRole;
    use axum::http::Request;
    use uuid::Uuid;

    fn parts_with(user: Option<AuthenticatedUser>) -> Parts {
        let mut request = Request::builder().uri("/").body(()).unwrap();
        if let Some(user) = user {
            request.extensions_mut().insert(user);
        }
        request.into_parts().0
    }

    fn user(role: UserRole) -> AuthenticatedUser {
        AuthenticatedUser {
            user_id: Uuid::new_v4(),
            username: "tester".to_string(),
            role,
        }
    }

    #[tokio::test]
    async fn test_require_admin() {
        let mut parts = parts_with(Some(user(UserRole::Admin)));
        assert!(RequireAdmin::from_request_parts(&mut parts, &()).await.is_ok());

        let mut parts = parts_with(Some(user(UserRole::Reporter)));
        assert!(matches!(
            RequireAdmin::from_request_parts(&mut parts, &()).await,
            Err(AppError::Forbidden(_))
        ));

        let mut parts = parts_with(None);
        assert!(matches!(
            RequireAdmin::from_request_parts(&mut parts, &()).await,
            Err(AppError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn test_require_reporter_accepts_any_role() {
        for role in [UserRole::Admin, UserRole::Reporter] {
            let mut parts = parts_with(Some(user(role)));
            let RequireReporter(u) = RequireReporter::from_request_parts(&mut parts, &())
                .await
                .ok()
                .unwrap();
            assert_eq!(u.role, role);
        }
    }
}
