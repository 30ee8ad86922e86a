use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub swagger: SwaggerConfig,
    pub storage: StorageConfig,
    pub classifier: ClassifierConfig,
    pub map: MapConfig,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub cors_allowed_origins: Vec<String>,
    pub max_request_body_size: usize,
    pub static_dir: PathBuf,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_secs: u64,
    pub idle_timeout_secs: u64,
    pub max_lifetime_secs: u64,
}

/// Locally issued HS256 tokens plus optional admin bootstrap credentials
#[derive(Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub access_token_expiry_mins: i64,
    pub refresh_token_expiry_days: i64,
    pub admin_username: Option<String>,
    pub admin_password: Option<String>,
}

// Secrets stay out of logs
impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"<redacted>")
            .field("access_token_expiry_mins", &self.access_token_expiry_mins)
            .field("refresh_token_expiry_days", &self.refresh_token_expiry_days)
            .field("admin_username", &self.admin_username)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct SwaggerConfig {
    pub username: Option<String>,
    pub password: Option<String>,
    pub title: String,
    pub version: String,
    pub description: String,
}

/// Local storage for uploaded incident images
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Directory uploaded files are written to
    pub upload_dir: PathBuf,
    /// URL prefix the upload directory is served under
    pub url_prefix: String,
}

/// Training data folder, model file and network hyperparameters
#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    pub dataset_dir: PathBuf,
    pub model_path: PathBuf,
    /// Images are resized to `image_size` x `image_size` before training and inference
    pub image_size: usize,
    pub filters: usize,
    pub epochs: usize,
    pub learning_rate: f32,
    /// Predictions below this confidence are not applied to incidents
    pub min_confidence: f32,
    pub seed: u64,
}

#[derive(Debug, Clone)]
pub struct MapConfig {
    pub center_lat: f64,
    pub center_lng: f64,
    pub zoom: u8,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        // Load .env file if exists, ignore if not found (optional for production)
        if let Err(e) = dotenvy::dotenv() {
            if !e.to_string().contains("not found") {
                eprintln!("Warning: Error loading .env file: {}", e);
            }
        }

        Ok(Config {
            app: AppConfig::from_env()?,
            database: DatabaseConfig::from_env()?,
            auth: AuthConfig::from_env()?,
            swagger: SwaggerConfig::from_env()?,
            storage: StorageConfig::from_env()?,
            classifier: ClassifierConfig::from_env()?,
            map: MapConfig::from_env()?,
        })
    }
}

/// Read an env var and parse it, falling back to `default` when unset
fn parse_var<T: std::str::FromStr>(key: &str, default: T) -> Result<T, String> {
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map_err(|_| format!("{} must be a valid value", key)),
        _ => Ok(default),
    }
}

impl AppConfig {
    const DEFAULT_MAX_REQUEST_BODY_SIZE: usize = 10 * 1024 * 1024; // 10MB

    pub fn from_env() -> Result<Self, String> {
        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|e| format!("Invalid PORT: {}", e))?;

        // Parse CORS allowed origins from comma-separated string
        let cors_allowed_origins = env::var("CORS_ALLOWED_ORIGINS")
            .unwrap_or_else(|_| "*".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let max_request_body_size =
            parse_var("MAX_REQUEST_BODY_SIZE", Self::DEFAULT_MAX_REQUEST_BODY_SIZE)?;

        let static_dir =
            PathBuf::from(env::var("STATIC_DIR").unwrap_or_else(|_| "static".to_string()));

        Ok(Self {
            host,
            port,
            cors_allowed_origins,
            max_request_body_size,
            static_dir,
        })
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl DatabaseConfig {
    // Default values for database connection pool (conservative defaults for small-medium apps)
    const DEFAULT_MAX_CONNECTIONS: u32 = 10;
    const DEFAULT_MIN_CONNECTIONS: u32 = 1;
    const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 5;
    const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 600; // 10 minutes
    const DEFAULT_MAX_LIFETIME_SECS: u64 = 1800; // 30 minutes

    pub fn from_env() -> Result<Self, String> {
        let url = env::var("DATABASE_URL").map_err(|_| "DATABASE_URL must be set".to_string())?;

        Ok(Self {
            url,
            max_connections: parse_var("DB_MAX_CONNECTIONS", Self::DEFAULT_MAX_CONNECTIONS)?,
            min_connections: parse_var("DB_MIN_CONNECTIONS", Self::DEFAULT_MIN_CONNECTIONS)?,
            acquire_timeout_secs: parse_var(
                "DB_ACQUIRE_TIMEOUT_SECS",
                Self::DEFAULT_ACQUIRE_TIMEOUT_SECS,
            )?,
            idle_timeout_secs: parse_var("DB_IDLE_TIMEOUT_SECS", Self::DEFAULT_IDLE_TIMEOUT_SECS)?,
            max_lifetime_secs: parse_var("DB_MAX_LIFETIME_SECS", Self::DEFAULT_MAX_LIFETIME_SECS)?,
        })
    }
}

impl AuthConfig {
    const DEFAULT_ACCESS_EXPIRY_MINS: i64 = 15;
    const DEFAULT_REFRESH_EXPIRY_DAYS: i64 = 7;

    pub fn from_env() -> Result<Self, String> {
        let jwt_secret = env::var("JWT_SECRET")
            .map_err(|_| "JWT_SECRET environment variable is required".to_string())?;
        if jwt_secret.len() < 16 {
            return Err("JWT_SECRET must be at least 16 characters".to_string());
        }

        let admin_username = env::var("ADMIN_USERNAME").ok().filter(|s| !s.is_empty());
        let admin_password = env::var("ADMIN_PASSWORD").ok().filter(|s| !s.is_empty());

        Ok(Self {
            jwt_secret,
            access_token_expiry_mins: parse_var(
                "JWT_ACCESS_EXPIRY_MINS",
                Self::DEFAULT_ACCESS_EXPIRY_MINS,
            )?,
            refresh_token_expiry_days: parse_var(
                "JWT_REFRESH_EXPIRY_DAYS",
                Self::DEFAULT_REFRESH_EXPIRY_DAYS,
            )?,
            admin_username,
            admin_password,
        })
    }

    /// Returns bootstrap admin credentials when both are configured
    pub fn bootstrap_admin(&self) -> Option<(&str, &str)> {
        match (&self.admin_username, &self.admin_password) {
            (Some(user), Some(pass)) => Some((user.as_str(), pass.as_str())),
            _ => None,
        }
    }
}

impl SwaggerConfig {
    pub fn from_env() -> Result<Self, String> {
        // Only use credentials if they are non-empty
        let username = env::var("SWAGGER_USERNAME").ok().filter(|s| !s.is_empty());
        let password = env::var("SWAGGER_PASSWORD").ok().filter(|s| !s.is_empty());
        let title = env::var("SWAGGER_TITLE").unwrap_or_else(|_| "Bantay API".to_string());
        let version = env::var("SWAGGER_VERSION").unwrap_or_else(|_| "0.1.0".to_string());
        let description = env::var("SWAGGER_DESCRIPTION")
            .unwrap_or_else(|_| "Incident reporting and classification API".to_string());

        Ok(Self {
            username,
            password,
            title,
            version,
            description,
        })
    }

    /// Returns credentials in "username:password" format if auth is enabled
    pub fn credentials(&self) -> Option<String> {
        match (&self.username, &self.password) {
            (Some(user), Some(pass)) => Some(format!("{}:{}", user, pass)),
            _ => None,
        }
    }
}

impl StorageConfig {
    pub fn from_env() -> Result<Self, String> {
        let upload_dir =
            PathBuf::from(env::var("UPLOAD_DIR").unwrap_or_else(|_| "data/uploads".to_string()));
        let url_prefix = env::var("UPLOAD_URL_PREFIX")
            .unwrap_or_else(|_| "/uploads".to_string())
            .trim_end_matches('/')
            .to_string();

        if !url_prefix.starts_with('/') {
            return Err("UPLOAD_URL_PREFIX must start with '/'".to_string());
        }

        Ok(Self {
            upload_dir,
            url_prefix,
        })
    }
}

impl ClassifierConfig {
    const DEFAULT_IMAGE_SIZE: usize = 32;
    const DEFAULT_FILTERS: usize = 8;
    const DEFAULT_EPOCHS: usize = 15;
    const DEFAULT_LEARNING_RATE: f32 = 0.001;
    const DEFAULT_MIN_CONFIDENCE: f32 = 0.5;
    const DEFAULT_SEED: u64 = 42;

    pub fn from_env() -> Result<Self, String> {
        let dataset_dir = PathBuf::from(
            env::var("DATASET_DIR").unwrap_or_else(|_| "data/training_data".to_string()),
        );
        let model_path = PathBuf::from(
            env::var("MODEL_PATH").unwrap_or_else(|_| "data/model/classifier.json".to_string()),
        );

        let image_size = parse_var("CLASSIFIER_IMAGE_SIZE", Self::DEFAULT_IMAGE_SIZE)?;
        if image_size < 8 || image_size % 2 != 0 {
            return Err("CLASSIFIER_IMAGE_SIZE must be an even number >= 8".to_string());
        }

        let min_confidence = parse_var("CLASSIFIER_MIN_CONFIDENCE", Self::DEFAULT_MIN_CONFIDENCE)?;
        if !(0.0..=1.0).contains(&min_confidence) {
            return Err("CLASSIFIER_MIN_CONFIDENCE must be between 0 and 1".to_string());
        }

        Ok(Self {
            dataset_dir,
            model_path,
            image_size,
            filters: parse_var("CLASSIFIER_FILTERS", Self::DEFAULT_FILTERS)?.max(1),
            epochs: parse_var("CLASSIFIER_EPOCHS", Self::DEFAULT_EPOCHS)?.max(1),
            learning_rate: parse_var("CLASSIFIER_LEARNING_RATE", Self::DEFAULT_LEARNING_RATE)?,
            min_confidence,
            seed: parse_var("CLASSIFIER_SEED", Self::DEFAULT_SEED)?,
        })
    }
}

impl MapConfig {
    // Manila city centre
    const DEFAULT_CENTER_LAT: f64 = 14.5995;
    const DEFAULT_CENTER_LNG: f64 = 120.9842;
    const DEFAULT_ZOOM: u8 = 13;

    pub fn from_env() -> Result<Self, String> {
        Ok(Self {
            center_lat: parse_var("MAP_CENTER_LAT", Self::DEFAULT_CENTER_LAT)?,
            center_lng: parse_var("MAP_CENTER_LNG", Self::DEFAULT_CENTER_LNG)?,
            zoom: parse_var("MAP_ZOOM", Self::DEFAULT_ZOOM)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_var_uses_default_when_missing() {
        let value: u32 = parse_var("BANTAY_TEST_UNSET_VARIABLE", 7).unwrap();
        assert_eq!(value, 7);
    }

    #[test]
    fn test_swagger_credentials_require_both_parts() {
        let mut swagger = SwaggerConfig {
            username: Some("admin".to_string()),
            password: None,
            title: "t".to_string(),
            version: "v".to_string(),
            description: "d".to_string(),
        };
        assert!(swagger.credentials().is_none());

        swagger.password = Some("secret".to_string());
        assert_eq!(swagger.credentials().as_deref(), Some("admin:secret"));
    }

    #[test]
    fn test_auth_config_debug_redacts_secret() {
        let auth = AuthConfig {
            jwt_secret: "super-secret-signing-key".to_string(),
            access_token_expiry_mins: 15,
            refresh_token_expiry_days: 7,
            admin_username: None,
            admin_password: Some("hunter22".to_string()),
        };
        let printed = format!("{:?}", auth);
        assert!(!printed.contains("super-secret-signing-key"));
        assert!(!printed.contains("hunter22"));
        assert!(auth.bootstrap_admin().is_none());
    }
}
