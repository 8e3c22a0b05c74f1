//! A small local stand-in for the project-wide health-check trait the
//! teacher crate depends on externally (`olaos_health_check`). That crate is
//! internal tooling, not something worth vendoring as a real dependency for
//! a handful of lines, so the trait shape is reproduced here instead.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    NotReady,
    Ready,
    Affected,
}

#[derive(Debug, Clone, Serialize)]
pub struct Health {
    status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Value>,
}

impl From<HealthStatus> for Health {
    fn from(status: HealthStatus) -> Self {
        Self {
            status,
            details: None,
        }
    }
}

impl Health {
    pub fn status(&self) -> HealthStatus {
        self.status
    }

    pub fn with_details(mut self, details: impl Serialize) -> Self {
        self.details = serde_json::to_value(details).ok();
        self
    }
}

#[async_trait]
pub trait CheckHealth: Sync + Send {
    fn name(&self) -> &'static str;
    async fn check_health(&self) -> Health;
}

#[derive(Debug, Serialize)]
struct ConnectionPoolHealthDetails {
    pool_size: u32,
}

#[derive(Clone, Debug)]
pub struct ConnectionPoolHealthCheck {
    connection_pool: crate::connection::ConnectionPool,
}

impl ConnectionPoolHealthCheck {
    pub fn new(connection_pool: crate::connection::ConnectionPool) -> Self {
        Self { connection_pool }
    }
}

#[async_trait]
impl CheckHealth for ConnectionPoolHealthCheck {
    fn name(&self) -> &'static str {
        "connection_pool"
    }

    async fn check_health(&self) -> Health {
        let status = match self.connection_pool.access_storage().await {
            Ok(_) => HealthStatus::Ready,
            Err(err) => {
                tracing::warn!(%err, "connection pool health check failed to acquire a connection");
                HealthStatus::NotReady
            }
        };
        Health::from(status).with_details(ConnectionPoolHealthDetails {
            pool_size: self.connection_pool.max_size(),
        })
    }
}
