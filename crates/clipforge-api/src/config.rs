//! API configuration.

/// Record store backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    Firestore,
}

/// Media object store backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectStoreBackend {
    Memory,
    R2,
}

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// CORS origins
    pub cors_origins: Vec<String>,
    /// Max request body size
    pub max_body_size: usize,
    /// Environment (development/production)
    pub environment: String,
    /// HS256 secret for user tokens
    pub jwt_secret: Option<String>,
    /// Shared secret the render worker presents on status callbacks
    pub worker_credential: Option<String>,
    pub store_backend: StoreBackend,
    pub object_store_backend: ObjectStoreBackend,
    pub metrics_enabled: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            cors_origins: vec!["*".to_string()],
            max_body_size: 1024 * 1024, // 1MB
            environment: "development".to_string(),
            jwt_secret: None,
            worker_credential: None,
            store_backend: StoreBackend::Memory,
            object_store_backend: ObjectStoreBackend::Memory,
            metrics_enabled: true,
        }
    }
}

impl ApiConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("HOST").unwrap_or(defaults.host),
            port: std::env::var("PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.port),
            cors_origins: std::env::var("CORS_ORIGINS")
                .map(|s| {
                    s.split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or(defaults.cors_origins),
            max_body_size: std::env::var("MAX_BODY_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_body_size),
            environment: std::env::var("ENVIRONMENT").unwrap_or(defaults.environment),
            jwt_secret: std::env::var("JWT_SECRET").ok().filter(|s| !s.is_empty()),
            worker_credential: std::env::var("WORKER_CREDENTIAL").ok().filter(|s| !s.is_empty()),
            store_backend: match std::env::var("STORE_BACKEND").as_deref() {
                Ok("firestore") => StoreBackend::Firestore,
                _ => StoreBackend::Memory,
            },
            object_store_backend: match std::env::var("OBJECT_STORE_BACKEND").as_deref() {
                Ok("r2") => ObjectStoreBackend::R2,
                _ => ObjectStoreBackend::Memory,
            },
            metrics_enabled: std::env::var("METRICS_ENABLED")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(true),
        }
    }

    /// Check if running in production mode.
    pub fn is_production(&self) -> bool {
        self.environment.to_lowercase() == "production"
    }
}
