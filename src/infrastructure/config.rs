/// Which party store backend the server uses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    Sqlite,
}

impl StoreBackend {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Some(StoreBackend::Memory),
            "sqlite" => Some(StoreBackend::Sqlite),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StoreBackend::Memory => "memory",
            StoreBackend::Sqlite => "sqlite",
        }
    }
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub store_backend: StoreBackend,
    pub database_url: String,
    pub jwt_secret: String,
    pub snapshot_channel_capacity: usize,
}

impl AppConfig {
    /// Read configuration from the environment
    pub fn from_env() -> Self {
        let port = std::env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(9999);

        let store_backend = match std::env::var("PARTY_STORE") {
            Ok(value) => StoreBackend::from_str(&value).unwrap_or_else(|| {
                tracing::warn!("Unknown PARTY_STORE '{}', using sqlite", value);
                StoreBackend::Sqlite
            }),
            Err(_) => StoreBackend::Sqlite,
        };

        let db_path = std::env::var("DATABASE_URL")
            .or_else(|_| std::env::var("DB_PATH"))
            .unwrap_or_else(|_| "sqlite:./data/watchparty.db".to_string());

        // Ensure path has sqlite: prefix
        let database_url = if db_path.starts_with("sqlite:") {
            db_path
        } else {
            format!("sqlite:{}", db_path)
        };

        let jwt_secret = std::env::var("JWT_SECRET")
            .unwrap_or_else(|_| "watchparty-secret-key-change-in-production".to_string());

        let snapshot_channel_capacity = std::env::var("SNAPSHOT_CHANNEL_CAPACITY")
            .ok()
            .and_then(|c| c.parse().ok())
            .unwrap_or(64);

        Self {
            port,
            store_backend,
            database_url,
            jwt_secret,
            snapshot_channel_capacity,
        }
    }

    /// In-memory configuration used by tests and local demos
    pub fn in_memory(jwt_secret: &str) -> Self {
        Self {
            port: 0,
            store_backend: StoreBackend::Memory,
            database_url: "sqlite::memory:".to_string(),
            jwt_secret: jwt_secret.to_string(),
            snapshot_channel_capacity: 64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_names() {
        assert_eq!(StoreBackend::from_str("Memory"), Some(StoreBackend::Memory));
        assert_eq!(StoreBackend::from_str("sqlite"), Some(StoreBackend::Sqlite));
        assert_eq!(StoreBackend::from_str("redis"), None);
    }
}
