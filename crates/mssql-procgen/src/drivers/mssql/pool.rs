//! SQL Server connectivity for probing and deployment.
//!
//! Uses Tiberius with bb8 connection pooling. The generator itself never
//! touches the network; this module answers the compatibility-level probe
//! and executes generated scripts batch by batch.

use std::time::Duration;

use async_trait::async_trait;
use bb8::{Pool, PooledConnection};
use tiberius::{AuthMethod, Client, Config, EncryptionLevel};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::{debug, info};

use crate::config::ConnectionConfig;
use crate::core::traits::CompatibilityProbe;
use crate::error::{GenError, Result};
use crate::procedure::script::split_batches;
use crate::procedure::Script;

/// Query returning the compatibility level of the connected database.
const COMPATIBILITY_LEVEL_QUERY: &str =
    "SELECT compatibility_level FROM sys.databases WHERE name = DB_NAME()";

/// Connection pool timeouts.
const POOL_CONNECTION_TIMEOUT: Duration = Duration::from_secs(30);
const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(300);

/// Connection manager for bb8 pool with Tiberius.
#[derive(Clone)]
pub struct TiberiusConnectionManager {
    config: ConnectionConfig,
}

impl TiberiusConnectionManager {
    pub fn new(config: ConnectionConfig) -> Self {
        Self { config }
    }

    fn build_config(&self) -> Config {
        let mut config = Config::new();
        config.host(&self.config.host);
        config.port(self.config.port);
        config.database(&self.config.database);
        config.authentication(AuthMethod::sql_server(
            &self.config.user,
            &self.config.password,
        ));

        if self.config.encryption_enabled() {
            config.encryption(EncryptionLevel::Required);
        } else {
            config.encryption(EncryptionLevel::NotSupported);
        }
        if self.config.trust_server_cert {
            config.trust_cert();
        }

        config
    }
}

#[async_trait]
impl bb8::ManageConnection for TiberiusConnectionManager {
    type Connection = Client<Compat<TcpStream>>;
    type Error = tiberius::error::Error;

    async fn connect(&self) -> std::result::Result<Self::Connection, Self::Error> {
        let config = self.build_config();
        let tcp = TcpStream::connect(config.get_addr()).await.map_err(|e| {
            tiberius::error::Error::Io {
                kind: e.kind(),
                message: e.to_string(),
            }
        })?;
        tcp.set_nodelay(true).ok();
        Client::connect(config, tcp.compat_write()).await
    }

    async fn is_valid(&self, conn: &mut Self::Connection) -> std::result::Result<(), Self::Error> {
        conn.simple_query("SELECT 1").await?.into_row().await?;
        Ok(())
    }

    fn has_broken(&self, _conn: &mut Self::Connection) -> bool {
        false
    }
}

/// Pooled connection to the target SQL Server database.
pub struct MssqlPool {
    pool: Pool<TiberiusConnectionManager>,
    database: String,
}

impl MssqlPool {
    /// Create a new pool from configuration.
    pub async fn new(config: ConnectionConfig) -> Result<Self> {
        Self::with_pool_size(config, 2).await
    }

    /// Create a new pool with specified size.
    pub async fn with_pool_size(config: ConnectionConfig, max_size: u32) -> Result<Self> {
        let database = config.database.clone();
        let endpoint = format!("{}:{}/{}", config.host, config.port, config.database);

        let manager = TiberiusConnectionManager::new(config);
        let pool = Pool::builder()
            .max_size(max_size)
            .connection_timeout(POOL_CONNECTION_TIMEOUT)
            .idle_timeout(Some(POOL_IDLE_TIMEOUT))
            .build(manager)
            .await
            .map_err(|e| GenError::pool(e.to_string(), "creating SQL Server pool"))?;

        info!("Connected to SQL Server: {} (pool_size={})", endpoint, max_size);

        Ok(Self { pool, database })
    }

    /// Get a pooled connection.
    async fn get_conn(&self) -> Result<PooledConnection<'_, TiberiusConnectionManager>> {
        self.pool
            .get()
            .await
            .map_err(|e| GenError::pool(e.to_string(), "getting SQL Server connection"))
    }

    /// Execute a generated script, one `GO`-separated batch at a time.
    ///
    /// Stops at the first failing batch; earlier batches stay applied.
    /// Returns the number of batches executed.
    pub async fn execute_script(&self, script: &Script) -> Result<usize> {
        let mut conn = self.get_conn().await?;
        let batches = split_batches(&script.sql);

        for (idx, batch) in batches.iter().enumerate() {
            debug!(
                "Executing batch {}/{} of {}",
                idx + 1,
                batches.len(),
                script.object_name
            );
            conn.simple_query(*batch).await?.into_results().await?;
        }

        info!("Applied {} ({} batches)", script.object_name, batches.len());
        Ok(batches.len())
    }
}

#[async_trait]
impl CompatibilityProbe for MssqlPool {
    async fn compatibility_level(&self) -> Result<u16> {
        let mut conn = self.get_conn().await?;
        let row = conn
            .simple_query(COMPATIBILITY_LEVEL_QUERY)
            .await?
            .into_row()
            .await?;

        let level = row
            .and_then(|r| r.get::<u8, _>(0))
            .ok_or_else(|| GenError::CompatibilityUnavailable(self.database.clone()))?;

        debug!("Database {} compatibility level: {}", self.database, level);
        Ok(u16::from(level))
    }
}
