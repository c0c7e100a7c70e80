//! SQLite Registry Store Implementation
//!
//! ## Usage
//!
//! ### File-Based (Production)
//! ```ignore
//! use logagg_registry::{SqliteRegistryStore, RegistryStore};
//!
//! // Creates registry.db (or opens it if it exists)
//! let store = SqliteRegistryStore::new("registry.db").await?;
//! ```
//!
//! ### In-Memory (Testing)
//! ```ignore
//! let store = SqliteRegistryStore::new_in_memory().await?;
//! ```
//!
//! ## Implementation Details
//!
//! - Schema is created on open (`CREATE TABLE IF NOT EXISTS`), one primary key
//!   per collection matching the entity's unique key.
//! - Inserts surface unique violations as `RegistryError::DuplicateKey`.
//! - `upsert_component` is a single `INSERT ... ON CONFLICT DO UPDATE`, so it is
//!   atomic without any surrounding transaction.
//! - Component heartbeat fields are stored as a JSON text column.

use crate::{
    error::{RegistryError, Result},
    types::*,
    RegistryStore,
};
use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS brokers (
        tcp_address TEXT NOT NULL,
        http_address TEXT NOT NULL,
        depth_limit INTEGER NOT NULL,
        api_address TEXT NOT NULL,
        PRIMARY KEY (tcp_address, http_address)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS broker_apis (
        host TEXT NOT NULL,
        port INTEGER NOT NULL,
        PRIMARY KEY (host, port)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS topics (
        name TEXT PRIMARY KEY NOT NULL,
        tcp_address TEXT NOT NULL,
        http_address TEXT NOT NULL,
        depth_limit INTEGER NOT NULL,
        api_address TEXT NOT NULL,
        heartbeat_topic TEXT NOT NULL,
        logs_topic TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS components (
        host TEXT NOT NULL,
        port TEXT NOT NULL,
        namespace TEXT NOT NULL,
        topic_name TEXT NOT NULL,
        fields TEXT NOT NULL,
        PRIMARY KEY (host, port)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_components_topic ON components (topic_name, namespace)",
];

type TopicRow = (String, String, String, i64, String, String, String);
type ComponentRow = (String, String, String, String, String);

/// SQLite-based registry store
pub struct SqliteRegistryStore {
    pool: SqlitePool,
}

impl SqliteRegistryStore {
    /// Open (or create) a registry database file
    pub async fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let options =
            SqliteConnectOptions::from_str(&format!("sqlite://{}", path.as_ref().display()))?
                .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(10)
            .connect_with(options)
            .await?;

        Self::with_pool(pool).await
    }

    /// Create in-memory database (for testing)
    pub async fn new_in_memory() -> Result<Self> {
        // Each SQLite connection gets its own in-memory database, so pin the
        // pool to a single connection that never expires.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;

        Self::with_pool(pool).await
    }

    async fn with_pool(pool: SqlitePool) -> Result<Self> {
        for statement in SCHEMA {
            sqlx::query(*statement).execute(&pool).await?;
        }
        Ok(Self { pool })
    }

    fn topic_from_row(row: TopicRow) -> Topic {
        let (name, tcp_address, http_address, depth_limit, api_address, heartbeat_topic, logs_topic) =
            row;
        Topic {
            name,
            tcp_address,
            http_address,
            depth_limit,
            api_address,
            heartbeat_topic,
            logs_topic,
        }
    }

    fn component_from_row(row: ComponentRow) -> Result<Component> {
        let (host, port, namespace, topic_name, fields) = row;
        let fields: Map<String, Value> = serde_json::from_str(&fields)?;
        Ok(Component {
            host,
            port,
            namespace: Namespace::from_name(&namespace),
            topic_name,
            fields,
        })
    }
}

#[async_trait]
impl RegistryStore for SqliteRegistryStore {
    async fn insert_broker(&self, broker: Broker) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO brokers (tcp_address, http_address, depth_limit, api_address)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(&broker.tcp_address)
        .bind(&broker.http_address)
        .bind(broker.depth_limit)
        .bind(&broker.api_address)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            RegistryError::from_insert(
                e,
                "brokers",
                format!("{}/{}", broker.tcp_address, broker.http_address),
            )
        })?;

        Ok(())
    }

    async fn list_brokers(&self) -> Result<Vec<Broker>> {
        let rows: Vec<(String, String, i64, String)> = sqlx::query_as(
            r#"
            SELECT tcp_address, http_address, depth_limit, api_address
            FROM brokers
            ORDER BY tcp_address, http_address
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(tcp_address, http_address, depth_limit, api_address)| Broker {
                tcp_address,
                http_address,
                depth_limit,
                api_address,
            })
            .collect())
    }

    async fn insert_broker_api(&self, api: BrokerApi) -> Result<()> {
        sqlx::query("INSERT INTO broker_apis (host, port) VALUES (?, ?)")
            .bind(&api.host)
            .bind(i64::from(api.port))
            .execute(&self.pool)
            .await
            .map_err(|e| RegistryError::from_insert(e, "broker_apis", api.address()))?;

        Ok(())
    }

    async fn list_broker_apis(&self) -> Result<Vec<BrokerApi>> {
        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT host, port FROM broker_apis ORDER BY host, port")
                .fetch_all(&self.pool)
                .await?;

        // Rows written by other tools may hold ports no socket can use.
        Ok(rows
            .into_iter()
            .filter_map(|(host, port)| match u16::try_from(port) {
                Ok(port) if port != 0 => Some(BrokerApi { host, port }),
                _ => {
                    tracing::warn!(host = %host, port, "Skipping broker api with invalid port");
                    None
                }
            })
            .collect())
    }

    async fn insert_topic(&self, topic: Topic) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO topics (
                name, tcp_address, http_address, depth_limit,
                api_address, heartbeat_topic, logs_topic
            )
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&topic.name)
        .bind(&topic.tcp_address)
        .bind(&topic.http_address)
        .bind(topic.depth_limit)
        .bind(&topic.api_address)
        .bind(&topic.heartbeat_topic)
        .bind(&topic.logs_topic)
        .execute(&self.pool)
        .await
        .map_err(|e| RegistryError::from_insert(e, "topics", topic.name.clone()))?;

        Ok(())
    }

    async fn get_topic(&self, name: &str) -> Result<Option<Topic>> {
        let row: Option<TopicRow> = sqlx::query_as(
            r#"
            SELECT name, tcp_address, http_address, depth_limit,
                   api_address, heartbeat_topic, logs_topic
            FROM topics
            WHERE name = ?
            "#,
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Self::topic_from_row))
    }

    async fn list_topics(&self) -> Result<Vec<Topic>> {
        let rows: Vec<TopicRow> = sqlx::query_as(
            r#"
            SELECT name, tcp_address, http_address, depth_limit,
                   api_address, heartbeat_topic, logs_topic
            FROM topics
            ORDER BY name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Self::topic_from_row).collect())
    }

    async fn delete_topic(&self, name: &str) -> Result<u64> {
        let rows_affected = sqlx::query("DELETE FROM topics WHERE name = ?")
            .bind(name)
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(rows_affected)
    }

    async fn upsert_component(&self, component: Component) -> Result<()> {
        let fields_json = serde_json::to_string(&component.fields)?;

        sqlx::query(
            r#"
            INSERT INTO components (host, port, namespace, topic_name, fields)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(host, port) DO UPDATE SET
                namespace = excluded.namespace,
                topic_name = excluded.topic_name,
                fields = excluded.fields
            "#,
        )
        .bind(&component.host)
        .bind(&component.port)
        .bind(component.namespace.as_str())
        .bind(&component.topic_name)
        .bind(fields_json)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_component(
        &self,
        topic_name: &str,
        key: &ComponentKey,
        namespace: Namespace,
    ) -> Result<Option<Component>> {
        let row: Option<ComponentRow> = sqlx::query_as(
            r#"
            SELECT host, port, namespace, topic_name, fields
            FROM components
            WHERE topic_name = ? AND host = ? AND port = ? AND namespace = ?
            "#,
        )
        .bind(topic_name)
        .bind(&key.host)
        .bind(&key.port)
        .bind(namespace.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::component_from_row).transpose()
    }

    async fn list_components(&self, topic_name: &str) -> Result<Vec<Component>> {
        let rows: Vec<ComponentRow> = sqlx::query_as(
            r#"
            SELECT host, port, namespace, topic_name, fields
            FROM components
            WHERE topic_name = ?
            ORDER BY host, port
            "#,
        )
        .bind(topic_name)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::component_from_row).collect()
    }

    async fn delete_components(
        &self,
        topic_name: &str,
        namespace: Namespace,
        key: Option<&ComponentKey>,
    ) -> Result<u64> {
        let result = match key {
            Some(key) => {
                sqlx::query(
                    r#"
                    DELETE FROM components
                    WHERE topic_name = ? AND namespace = ? AND host = ? AND port = ?
                    "#,
                )
                .bind(topic_name)
                .bind(namespace.as_str())
                .bind(&key.host)
                .bind(&key.port)
                .execute(&self.pool)
                .await?
            }
            None => {
                sqlx::query("DELETE FROM components WHERE topic_name = ? AND namespace = ?")
                    .bind(topic_name)
                    .bind(namespace.as_str())
                    .execute(&self.pool)
                    .await?
            }
        };

        Ok(result.rows_affected())
    }
}
