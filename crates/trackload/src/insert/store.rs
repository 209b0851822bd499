//! SQL backend for the insert workers.
//!
//! Connections go through `sqlx`'s `Any` driver so the same code path serves
//! MySQL in production and SQLite in tests and local runs. Placeholders are
//! `?`, which both drivers accept.

use sqlx::{AnyConnection, Connection};
use std::sync::Arc;
use trackload_core::{
    ActionRecord, ActionStore, Error, Result, Session, StoreConnector,
};

/// Opens one [`SqlStore`] per worker against a fixed URL and pair of tables.
#[derive(Clone, Debug)]
pub struct SqlConnector {
    url: Arc<str>,
    statements: Arc<Statements>,
}

#[derive(Debug)]
struct Statements {
    max_id: String,
    insert_session: String,
    insert_action: String,
}

impl SqlConnector {
    /// `table` and `session_table` are interpolated verbatim and must already
    /// be validated identifiers.
    pub fn new(url: &str, table: &str, session_table: &str) -> Self {
        sqlx::any::install_default_drivers();
        Self {
            url: Arc::from(url),
            statements: Arc::new(Statements {
                max_id: format!("SELECT MAX(id) FROM {table}"),
                insert_session: format!(
                    "INSERT INTO {session_table} (session_id,user_ip,user_agent,user_id) \
                     VALUES (?, ?, ?, ?)"
                ),
                insert_action: format!(
                    "INSERT INTO {table} \
                     (id,inpoint,outpoint,mediapackage,session_id,created,length,type,playing) \
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"
                ),
            }),
        }
    }

    async fn open(&self) -> Result<AnyConnection> {
        AnyConnection::connect(&self.url)
            .await
            .map_err(Error::connect)
    }
}

impl StoreConnector for SqlConnector {
    type Store = SqlStore;

    async fn connect(&self) -> Result<SqlStore> {
        Ok(SqlStore {
            conn: self.open().await?,
            statements: Arc::clone(&self.statements),
        })
    }

    #[tracing::instrument(skip(self), err)]
    async fn current_max_id(&self) -> Result<Option<i64>> {
        let mut conn = self.open().await?;
        let max = sqlx::query_scalar::<_, Option<i64>>(&self.statements.max_id)
            .fetch_one(&mut conn)
            .await
            .map_err(Error::query)?;
        if let Err(e) = conn.close().await {
            tracing::debug!("Failed to close range query connection: {e}");
        }
        Ok(max)
    }
}

/// A worker's dedicated SQL connection.
pub struct SqlStore {
    conn: AnyConnection,
    statements: Arc<Statements>,
}

impl ActionStore for SqlStore {
    async fn register_session(&mut self, session: &Session) -> Result<()> {
        sqlx::query(&self.statements.insert_session)
            .bind(session.session_id.as_str())
            .bind(session.user_ip.to_string())
            .bind(session.user_agent.as_str())
            .bind(session.user_id)
            .execute(&mut self.conn)
            .await
            .map_err(|e| Error::SessionRegistration {
                session_id: session.session_id.clone(),
                source: e.into(),
            })?;
        Ok(())
    }

    async fn insert_action(&mut self, record: &ActionRecord) -> Result<()> {
        sqlx::query(&self.statements.insert_action)
            .bind(record.id.get())
            .bind(record.inpoint)
            .bind(record.outpoint)
            .bind(record.mediapackage.to_string())
            .bind(record.session_id.as_str())
            .bind(record.created_text())
            .bind(record.length)
            .bind(record.action_type.as_str())
            .bind(record.playing)
            .execute(&mut self.conn)
            .await
            .map_err(|e| Error::Write {
                job: record.id,
                source: e.into(),
            })?;
        Ok(())
    }

    async fn close(self) -> Result<()> {
        self.conn.close().await.map_err(Error::connect)
    }
}
