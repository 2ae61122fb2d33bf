use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub run_migrations: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    /// `None` runs the service on the in-process store.
    pub database: Option<DatabaseConfig>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let host = std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let port = match std::env::var("APP_PORT") {
            Ok(v) => v.parse::<u16>()?,
            Err(_) => 8080,
        };
        let database = std::env::var("DATABASE_URL").ok().map(|url| DatabaseConfig {
            url,
            max_connections: std::env::var("DB_MAX_CONNECTIONS")
                .ok()
                .and_then(|v| v.parse::<u32>().ok())
                .unwrap_or(10),
            run_migrations: std::env::var("RUN_MIGRATIONS")
                .map(|v| v != "false" && v != "0")
                .unwrap_or(true),
        });
        Ok(Self {
            host,
            port,
            database,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
