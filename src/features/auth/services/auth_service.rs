use std::sync::Arc;

use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::core::error::{AppError, Result};
use crate::features::auth::dtos::{
    AuthResponseDto, LoginRequestDto, RefreshTokenRequestDto, RegisterRequestDto,
};
use crate::features::auth::jwt::{generate_refresh_token, hash_refresh_token, JwtManager};
use crate::features::auth::model::AuthenticatedUser;
use crate::features::auth::models::Session;
use crate::features::auth::password::{hash_password_blocking, verify_password_blocking};
use crate::features::users::dtos::UserResponseDto;
use crate::features::users::models::{CreateUser, User, UserRole};
use crate::features::users::UserService;

const INVALID_CREDENTIALS: &str = "Invalid username or password";
const INVALID_REFRESH_TOKEN: &str = "Invalid or expired refresh token";

/// Service for authentication operations (register, login, refresh, logout)
pub struct AuthService {
    pool: PgPool,
    user_service: Arc<UserService>,
    jwt: Arc<JwtManager>,
}

impl AuthService {
    pub fn new(pool: PgPool, user_service: Arc<UserService>, jwt: Arc<JwtManager>) -> Self {
        Self {
            pool,
            user_service,
            jwt,
        }
    }

    /// Register a new reporter account and sign it in
    pub async fn register(&self, dto: RegisterRequestDto) -> Result<AuthResponseDto> {
        let password_hash = hash_password_blocking(dto.password).await?;

        let user = self
            .user_service
            .create(&CreateUser {
                username: dto.username,
                email: dto.email.map(|e| e.trim().to_lowercase()),
                password_hash,
                role: UserRole::Reporter,
            })
            .await?;

        self.start_session(user).await
    }

    /// Login with username and password
    ///
    /// Unknown users and wrong passwords produce the same error.
    pub async fn login(&self, dto: LoginRequestDto) -> Result<AuthResponseDto> {
        let user = self
            .user_service
            .find_by_username(dto.username.trim())
            .await?
            .ok_or_else(|| AppError::Unauthorized(INVALID_CREDENTIALS.to_string()))?;

        let password_valid =
            verify_password_blocking(dto.password, user.password_hash.clone()).await?;
        if !password_valid {
            tracing::debug!("Failed login for {}", user.username);
            return Err(AppError::Unauthorized(INVALID_CREDENTIALS.to_string()));
        }

        if !user.is_active {
            return Err(AppError::Forbidden("Account is deactivated".to_string()));
        }

        tracing::info!("User logged in: {} ({})", user.id, user.username);
        self.start_session(user).await
    }

    /// Exchange a refresh token for a new token pair. The old session is revoked.
    pub async fn refresh(&self, dto: RefreshTokenRequestDto) -> Result<AuthResponseDto> {
        let token_hash = hash_refresh_token(&dto.refresh_token);
        let mut tx = self.pool.begin().await?;

        let session = sqlx::query_as::<_, Session>(
            r#"
            SELECT id, user_id, refresh_token_hash, expires_at, revoked_at, created_at
            FROM sessions
            WHERE refresh_token_hash = $1
            FOR UPDATE
            "#,
        )
        .bind(&token_hash)
        .fetch_optional(&mut *tx)
        .await?
        .filter(|s| s.is_usable(Utc::now()))
        .ok_or_else(|| AppError::Unauthorized(INVALID_REFRESH_TOKEN.to_string()))?;

        sqlx::query("UPDATE sessions SET revoked_at = NOW() WHERE id = $1")
            .bind(session.id)
            .execute(&mut *tx)
            .await?;

        let user = self.user_service.get_by_id(session.user_id).await?;
        if !user.is_active {
            return Err(AppError::Forbidden("Account is deactivated".to_string()));
        }

        let refresh_token = self.insert_session(&mut tx, user.id).await?;
        tx.commit().await?;

        self.token_response(user, refresh_token)
    }

    /// Revoke the session behind a refresh token. Unknown tokens are ignored.
    pub async fn logout(&self, dto: RefreshTokenRequestDto) -> Result<()> {
        let token_hash = hash_refresh_token(&dto.refresh_token);
        let result = sqlx::query(
            "UPDATE sessions SET revoked_at = NOW() WHERE refresh_token_hash = $1 AND revoked_at IS NULL",
        )
        .bind(&token_hash)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            tracing::info!("Session revoked");
        }
        Ok(())
    }

    /// Fresh user record for the /me endpoint
    pub async fn get_current_user(&self, user: &AuthenticatedUser) -> Result<UserResponseDto> {
        let user = self.user_service.get_by_id(user.user_id).await?;
        Ok(user.into())
    }

    /// Create the configured admin account if it does not exist yet
    pub async fn ensure_admin(&self, username: &str, password: &str) -> Result<()> {
        if let Some(existing) = self.user_service.find_by_username(username).await? {
            if existing.role != UserRole::Admin {
                tracing::warn!(
                    "Bootstrap admin '{}' exists with role {}; leaving it unchanged",
                    username,
                    existing.role
                );
            }
            return Ok(());
        }

        let password_hash = hash_password_blocking(password.to_string()).await?;
        let admin = self
            .user_service
            .create(&CreateUser {
                username: username.to_string(),
                email: None,
                password_hash,
                role: UserRole::Admin,
            })
            .await?;

        tracing::info!("Bootstrap admin created: {} ({})", admin.id, admin.username);
        Ok(())
    }

    async fn start_session(&self, user: User) -> Result<AuthResponseDto> {
        let mut tx = self.pool.begin().await?;
        let refresh_token = self.insert_session(&mut tx, user.id).await?;
        tx.commit().await?;

        self.token_response(user, refresh_token)
    }

    async fn insert_session(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        user_id: Uuid,
    ) -> Result<String> {
        let (plaintext, token_hash) = generate_refresh_token();
        let expires_at = Utc::now() + self.jwt.refresh_token_ttl();

        sqlx::query(
            r#"
            INSERT INTO sessions (user_id, refresh_token_hash, expires_at)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(user_id)
        .bind(&token_hash)
        .bind(expires_at)
        .execute(&mut **tx)
        .await?;

        Ok(plaintext)
    }

    fn token_response(&self, user: User, refresh_token: String) -> Result<AuthResponseDto> {
        let access = self
            .jwt
            .issue_access_token(user.id, &user.username, user.role)?;

        Ok(AuthResponseDto {
            access_token: access.token,
            token_type: "Bearer".to_string(),
            expires_in: access.expires_in,
            refresh_token,
            user: user.into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::app::AppState;
    use crate::shared::test_helpers::test_config;

    fn registration(username: &str, email: Option<&str>) -> RegisterRequestDto {
        RegisterRequestDto {
            username: username.to_string(),
            email: email.map(str::to_string),
            password: "password123".to_string(),
        }
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_duplicate_registration_conflicts(pool: PgPool) {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::build(pool, &test_config(dir.path())).await.unwrap();

        let first = state
            .auth
            .register(registration("juan_dc", Some("juan@example.com")))
            .await
            .unwrap();
        assert_eq!(first.user.username, "juan_dc");
        assert_eq!(first.user.role, UserRole::Reporter);

        for duplicate in [
            registration("juan_dc", None),
            registration("JUAN_DC", None),
            registration("someone_else", Some("Juan@Example.com")),
        ] {
            let result = state.auth.register(duplicate).await;
            assert!(matches!(result, Err(AppError::Conflict(_))));
        }
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_login_and_refresh_rotation(pool: PgPool) {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::build(pool, &test_config(dir.path())).await.unwrap();
        state
            .auth
            .register(registration("maria", None))
            .await
            .unwrap();

        let wrong = state
            .auth
            .login(LoginRequestDto {
                username: "maria".to_string(),
                password: "wrong-password".to_string(),
            })
            .await;
        assert!(matches!(wrong, Err(AppError::Unauthorized(_))));

        let session = state
            .auth
            .login(LoginRequestDto {
                username: "maria".to_string(),
                password: "password123".to_string(),
            })
            .await
            .unwrap();

        let old_token = RefreshTokenRequestDto {
            refresh_token: session.refresh_token.clone(),
        };
        let rotated = state.auth.refresh(old_token).await.unwrap();
        assert_ne!(rotated.refresh_token, session.refresh_token);

        let reused = state
            .auth
            .refresh(RefreshTokenRequestDto {
                refresh_token: session.refresh_token,
            })
            .await;
        assert!(matches!(reused, Err(AppError::Unauthorized(_))));
    }
}
