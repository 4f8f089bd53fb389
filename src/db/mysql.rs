use crate::config::DatabaseConfig;
use crate::db::statements::{Statement, use_database};
use async_trait::async_trait;
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection};
use sqlx::{Connection, Error as SqlxError};
use tracing::debug;

/// Opens the scoped session used for a single bootstrap run.
#[async_trait]
pub trait Connector: Send + Sync {
    type Session: SiteDatabase;

    async fn connect(&self) -> Result<Self::Session, SqlxError>;
}

/// Operations the runner performs on an open session.
#[async_trait]
pub trait SiteDatabase: Send {
    async fn select_database(&mut self, name: &str) -> Result<(), SqlxError>;

    /// Execute one override; returns the number of affected rows.
    async fn execute(&mut self, statement: &Statement) -> Result<u64, SqlxError>;

    async fn close(self) -> Result<(), SqlxError>;
}

#[derive(Clone)]
pub struct MySqlConnector {
    options: MySqlConnectOptions,
}

impl MySqlConnector {
    pub fn new(options: MySqlConnectOptions) -> Self {
        Self { options }
    }

    /// Connects without a default schema; the runner selects it after the install.
    pub fn from_config(cfg: &DatabaseConfig) -> Self {
        let options = MySqlConnectOptions::new()
            .host(&cfg.host)
            .port(cfg.port)
            .username(&cfg.user)
            .password(&cfg.password);
        Self::new(options)
    }
}

#[async_trait]
impl Connector for MySqlConnector {
    type Session = MySqlSession;

    async fn connect(&self) -> Result<MySqlSession, SqlxError> {
        let conn = MySqlConnection::connect_with(&self.options).await?;
        Ok(MySqlSession { conn })
    }
}

pub struct MySqlSession {
    conn: MySqlConnection,
}

#[async_trait]
impl SiteDatabase for MySqlSession {
    async fn select_database(&mut self, name: &str) -> Result<(), SqlxError> {
        let sql = use_database(name);
        sqlx::Executor::execute(&mut self.conn, sqlx::raw_sql(&sql)).await?;
        Ok(())
    }

    async fn execute(&mut self, statement: &Statement) -> Result<u64, SqlxError> {
        let sql = statement.sql();
        debug!(action = statement.action(), "executing seed override");
        let result = sqlx::Executor::execute(&mut self.conn, sqlx::raw_sql(&sql)).await?;
        Ok(result.rows_affected())
    }

    async fn close(self) -> Result<(), SqlxError> {
        self.conn.close().await
    }
}
