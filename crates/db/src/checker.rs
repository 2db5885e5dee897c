use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgConnection};
use sqlx::Connection;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::{EnvironmentConfig, RoleSettings};
use crate::error::{DbError, Result};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Opens one connection for a role and closes it again.
#[async_trait]
pub trait ConnectionProbe: Send + Sync {
    async fn probe(&self, role: &str, settings: &RoleSettings) -> Result<()>;
}

pub struct PostgresProbe {
    timeout: Duration,
}

impl PostgresProbe {
    pub fn new() -> Self {
        Self {
            timeout: CONNECT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn connect_options(settings: &RoleSettings) -> Result<PgConnectOptions> {
        let mut options = match settings.url.as_deref().filter(|u| !u.is_empty()) {
            Some(url) => PgConnectOptions::from_str(url)?,
            None => PgConnectOptions::new().host(settings.host()),
        };

        if settings.url.is_some() && settings.host.is_some() {
            options = options.host(settings.host());
        }
        if let Some(port) = settings.port {
            options = options.port(port);
        }
        if let Some(username) = settings.username.as_deref() {
            options = options.username(username);
        }
        if let Some(password) = settings.password.as_deref().filter(|p| !p.is_empty()) {
            options = options.password(password);
        }
        if let Some(database) = settings.database.as_deref() {
            options = options.database(database);
        }

        Ok(options)
    }
}

impl Default for PostgresProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConnectionProbe for PostgresProbe {
    async fn probe(&self, role: &str, settings: &RoleSettings) -> Result<()> {
        let options = Self::connect_options(settings)?;
        debug!(role, host = settings.host(), "Connecting");

        let conn = tokio::time::timeout(self.timeout, PgConnection::connect_with(&options))
            .await
            .map_err(|_| DbError::Sqlx(sqlx::Error::PoolTimedOut))??;
        conn.close().await?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleReport {
    pub role: String,
    pub host: String,
    pub database: String,
    pub error: Option<String>,
}

impl RoleReport {
    pub fn success(&self) -> bool {
        self.error.is_none()
    }

    /// One line of operator-facing text.
    pub fn summary(&self) -> String {
        match &self.error {
            None => format!(
                "✓ {}: connected to {} on {}",
                self.role, self.database, self.host
            ),
            Some(e) => format!(
                "✗ {}: failed to connect to {} on {}: {}",
                self.role, self.database, self.host, e
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseReport {
    pub environment: String,
    pub roles: Vec<RoleReport>,
}

impl DatabaseReport {
    pub fn success(&self) -> bool {
        self.roles.iter().all(RoleReport::success)
    }

    pub fn failures(&self) -> impl Iterator<Item = &RoleReport> {
        self.roles.iter().filter(|r| !r.success())
    }
}

/// Checks every role of `environment` against a real PostgreSQL server.
pub async fn check_connections(environment: &str, path: &Path) -> Result<DatabaseReport> {
    check_connections_with(&PostgresProbe::new(), environment, path).await
}

pub async fn check_connections_with(
    probe: &dyn ConnectionProbe,
    environment: &str,
    path: &Path,
) -> Result<DatabaseReport> {
    let config = EnvironmentConfig::load(path, environment).await?;
    Ok(probe_all(probe, &config).await)
}

/// Every role is tried even when an earlier one fails.
pub async fn probe_all(probe: &dyn ConnectionProbe, config: &EnvironmentConfig) -> DatabaseReport {
    info!("=== Checking database connections ({}) ===", config.environment);

    let mut roles = Vec::with_capacity(config.roles.len());
    for (role, settings) in &config.roles {
        let error = probe.probe(role, settings).await.err().map(|e| e.to_string());
        let report = RoleReport {
            role: role.clone(),
            host: settings.host().to_string(),
            database: settings.database_name().to_string(),
            error,
        };
        info!("{}", report.summary());
        roles.push(report);
    }

    DatabaseReport {
        environment: config.environment.clone(),
        roles,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tempfile::TempDir;

    struct FakeProbe {
        failing: &'static str,
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ConnectionProbe for FakeProbe {
        async fn probe(&self, role: &str, _settings: &RoleSettings) -> Result<()> {
            self.seen.lock().unwrap().push(role.to_string());
            if role == self.failing {
                return Err(DbError::Sqlx(sqlx::Error::PoolTimedOut));
            }
            Ok(())
        }
    }

    const DATABASE_YML: &str = "production:\n  primary: {database: app}\n  cache: {database: app_cache}\n  queue: {database: app_queue}\n  cable: {database: app_cable}\n";

    async fn write_config() -> (TempDir, std::path::PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("database.yml");
        tokio::fs::write(&path, DATABASE_YML).await.unwrap();
        (dir, path)
    }

    #[tokio::test]
    async fn test_all_roles_succeed() {
        let (_dir, path) = write_config().await;
        let probe = FakeProbe {
            failing: "none",
            seen: Mutex::new(Vec::new()),
        };

        let report = check_connections_with(&probe, "production", &path)
            .await
            .unwrap();
        assert!(report.success());
        assert_eq!(report.roles.len(), 4);
        assert_eq!(probe.seen.lock().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_failure_does_not_stop_other_roles() {
        let (_dir, path) = write_config().await;
        let probe = FakeProbe {
            failing: "cache",
            seen: Mutex::new(Vec::new()),
        };

        let report = check_connections_with(&probe, "production", &path)
            .await
            .unwrap();
        assert!(!report.success());
        assert_eq!(probe.seen.lock().unwrap().len(), 4);

        let failures: Vec<_> = report.failures().map(|r| r.role.as_str()).collect();
        assert_eq!(failures, vec!["cache"]);
        assert!(report.roles[0].summary().starts_with("✓"));
    }

    #[test]
    fn test_connect_options_from_fields() {
        let settings = RoleSettings {
            host: Some("db.internal".to_string()),
            port: Some(6432),
            username: Some("shop".to_string()),
            database: Some("shop_production".to_string()),
            ..Default::default()
        };
        let options = PostgresProbe::connect_options(&settings).unwrap();
        assert_eq!(options.get_host(), "db.internal");
        assert_eq!(options.get_port(), 6432);
        assert_eq!(options.get_username(), "shop");
        assert_eq!(options.get_database(), Some("shop_production"));
    }

    #[tokio::test]
    async fn test_refused_connection_is_reported() {
        let settings = RoleSettings {
            host: Some("127.0.0.1".to_string()),
            port: Some(1),
            username: Some("nobody".to_string()),
            database: Some("nothing".to_string()),
            ..Default::default()
        };
        let probe = PostgresProbe::new().with_timeout(Duration::from_secs(2));
        assert!(probe.probe("primary", &settings).await.is_err());
    }
}
