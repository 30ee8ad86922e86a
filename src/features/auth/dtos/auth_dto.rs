use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::features::users::dtos::UserResponseDto;
use crate::shared::validation::USERNAME_REGEX;

/// Request DTO for user registration
#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct RegisterRequestDto {
    #[validate(
        length(min = 3, max = 50, message = "Username must be 3-50 characters"),
        regex(
            path = *USERNAME_REGEX,
            message = "Username must start with a letter or underscore and contain only letters, digits and underscores"
        )
    )]
    pub username: String,

    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,

    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
}

/// Request DTO for user login
#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct LoginRequestDto {
    #[validate(length(min = 1, message = "Username is required"))]
    pub username: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Request DTO for token refresh and logout
#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct RefreshTokenRequestDto {
    #[validate(length(min = 1, message = "Refresh token is required"))]
    pub refresh_token: String,
}

/// Response DTO for register, login and refresh
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AuthResponseDto {
    /// HS256 JWT access token
    pub access_token: String,
    /// Token type (always "Bearer")
    pub token_type: String,
    /// Access token expiry time in seconds
    pub expires_in: i64,
    /// Opaque refresh token; rotated on every refresh
    pub refresh_token: String,
    pub user: UserResponseDto,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn register(username: &str, email: Option<&str>, password: &str) -> RegisterRequestDto {
        RegisterRequestDto {
            username: username.to_string(),
            email: email.map(str::to_string),
            password: password.to_string(),
        }
    }

    #[test]
    fn test_register_validation() {
        assert!(register("juan_dc", None, "password123").validate().is_ok());
        assert!(register("juan_dc", Some("juan@example.com"), "password123")
            .validate()
            .is_ok());

        assert!(register("ju", None, "password123").validate().is_err());
        assert!(register("1juan", None, "password123").validate().is_err());
        assert!(register("juan-dc", None, "password123").validate().is_err());
        assert!(register("juan_dc", Some("not-an-email"), "password123")
            .validate()
            .is_err());
        assert!(register("juan_dc", None, "short").validate().is_err());
    }

    #[test]
    fn test_register_accepts_generated_emails() {
        use fake::faker::internet::en::{Password, SafeEmail};
        use fake::Fake;

        for _ in 0..20 {
            let email: String = SafeEmail().fake();
            let password: String = Password(8..64).fake();
            let dto = register("reporter_1", Some(&email), &password);
            assert!(dto.validate().is_ok(), "{email} should be accepted");
        }
    }
}
