//! logagg Registry
//!
//! Durable keyed storage for everything the master knows about the fleet:
//! - **Brokers**: message-queue nodes and the API endpoint assigned to each
//! - **Broker APIs**: endpoints able to proxy streaming reads from brokers
//! - **Topics**: logical log channels and the broker snapshot they were bound to
//! - **Components**: every process (master, collector, broker API) by `(host, port)`
//!
//! ## Concurrency Model
//!
//! There is no locking or multi-entity transaction anywhere in the master.
//! Every mutation is a single-row insert or upsert against a unique key, and
//! the store's uniqueness constraint is the only arbiter between racing
//! writers:
//!
//! - `insert_*` is insert-or-fail: a collision is `RegistryError::DuplicateKey`,
//!   which callers interpret as "already done".
//! - `upsert_component` is insert-or-overwrite: last write wins, no merge.
//!
//! ## Usage Example
//!
//! ```ignore
//! use logagg_registry::{RegistryStore, SqliteRegistryStore, Topic};
//!
//! let store = SqliteRegistryStore::new("registry.db").await?;
//!
//! let broker = store.list_brokers().await?.remove(0);
//! store.insert_topic(Topic::assign("logagg", &broker)).await?;
//!
//! let topic = store.get_topic("logagg").await?.unwrap();
//! println!("heartbeats on {}", topic.heartbeat_topic);
//! ```

pub mod error;
pub mod store;
pub mod types;

pub use error::{RegistryError, Result};
pub use store::SqliteRegistryStore;
pub use types::*;

use async_trait::async_trait;

/// Registry store trait - abstracts over storage backends.
///
/// All implementations must be `Send + Sync` so a single store can be shared
/// across request handlers and background ingestion tasks via
/// `Arc<dyn RegistryStore>`.
#[async_trait]
pub trait RegistryStore: Send + Sync {
    // ============================================================
    // BROKER OPERATIONS
    // ============================================================

    /// Insert a broker.
    ///
    /// # Errors
    ///
    /// - `DuplicateKey`: a broker with the same `(tcp_address, http_address)` exists
    async fn insert_broker(&self, broker: Broker) -> Result<()>;

    /// List all brokers, ordered by key.
    async fn list_brokers(&self) -> Result<Vec<Broker>>;

    /// Insert a broker API endpoint.
    ///
    /// # Errors
    ///
    /// - `DuplicateKey`: an endpoint with the same `(host, port)` exists
    async fn insert_broker_api(&self, api: BrokerApi) -> Result<()>;

    /// List all broker API endpoints, ordered by key.
    async fn list_broker_apis(&self) -> Result<Vec<BrokerApi>>;

    // ============================================================
    // TOPIC OPERATIONS
    // ============================================================

    /// Insert a topic.
    ///
    /// # Errors
    ///
    /// - `DuplicateKey`: a topic with this name exists
    async fn insert_topic(&self, topic: Topic) -> Result<()>;

    /// Get a topic by name, `Ok(None)` when absent.
    async fn get_topic(&self, name: &str) -> Result<Option<Topic>>;

    /// List all topics, sorted by name.
    async fn list_topics(&self) -> Result<Vec<Topic>>;

    /// Delete a topic. Returns the number of rows removed (0 or 1).
    ///
    /// Components are not touched; cascading is the caller's business.
    async fn delete_topic(&self, name: &str) -> Result<u64>;

    // ============================================================
    // COMPONENT OPERATIONS
    // ============================================================

    /// Insert or overwrite the component keyed by `(host, port)`.
    ///
    /// Every stored field is replaced by the supplied record.
    async fn upsert_component(&self, component: Component) -> Result<()>;

    /// Find one component matching all of topic, identity and namespace.
    async fn find_component(
        &self,
        topic_name: &str,
        key: &ComponentKey,
        namespace: Namespace,
    ) -> Result<Option<Component>>;

    /// List the components registered under a topic.
    async fn list_components(&self, topic_name: &str) -> Result<Vec<Component>>;

    /// Delete components of one namespace under a topic, optionally narrowed
    /// to a single identity. Returns the number of rows removed.
    async fn delete_components(
        &self,
        topic_name: &str,
        namespace: Namespace,
        key: Option<&ComponentKey>,
    ) -> Result<u64>;
}
