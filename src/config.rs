use std::env;
use std::time::Duration;
use tracing::warn;

/// Server configuration, read once at startup from `CLASSLIVE_*` environment
/// variables with sensible development defaults.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Period of the server-initiated keep-alive probe on teacher sockets.
    pub heartbeat_interval: Duration,
    /// Origins allowed to open browser connections.
    pub allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            heartbeat_interval: Duration::from_secs(30),
            allowed_origins: vec![
                "http://localhost:5173".to_string(),
                "http://localhost:3000".to_string(),
                "http://localhost:8000".to_string(),
            ],
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let host = env::var("CLASSLIVE_HOST").unwrap_or(defaults.host);

        let port = match env::var("CLASSLIVE_PORT") {
            Ok(raw) => raw.parse().unwrap_or_else(|_| {
                warn!(value = %raw, "Invalid CLASSLIVE_PORT, using default");
                defaults.port
            }),
            Err(_) => defaults.port,
        };

        let heartbeat_interval = match env::var("CLASSLIVE_HEARTBEAT_SECS") {
            Ok(raw) => raw.parse().map(Duration::from_secs).unwrap_or_else(|_| {
                warn!(value = %raw, "Invalid CLASSLIVE_HEARTBEAT_SECS, using default");
                defaults.heartbeat_interval
            }),
            Err(_) => defaults.heartbeat_interval,
        };

        let allowed_origins = match env::var("CLASSLIVE_ALLOWED_ORIGINS") {
            Ok(raw) => raw
                .split(',')
                .map(|origin| origin.trim().to_string())
                .filter(|origin| !origin.is_empty())
                .collect(),
            Err(_) => defaults.allowed_origins,
        };

        Self {
            host,
            port,
            heartbeat_interval,
            allowed_origins,
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
