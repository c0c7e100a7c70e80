//! Topic lifecycle and registrations
//!
//! All writes here are single-row inserts or upserts. A unique-key conflict
//! means a concurrent caller got there first, so it is reported as success
//! (`Registration::Duplicate`) and never as an error.

use logagg_registry::{
    Broker, BrokerApi, Component, Namespace, RegistryError, RegistryStore, Topic,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::assignment::{assign_broker, assign_broker_api};
use crate::collector::CollectorClient;
use crate::error::{MasterError, Result};

/// Outcome of an idempotent registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    Registered,
    /// The record already existed; treated as success.
    Duplicate,
}

impl Registration {
    fn from_insert(result: std::result::Result<(), RegistryError>) -> Result<Self> {
        match result {
            Ok(()) => Ok(Registration::Registered),
            Err(e) if e.is_duplicate() => Ok(Registration::Duplicate),
            Err(e) => Err(e.into()),
        }
    }
}

pub struct TopicLifecycle {
    registry: Arc<dyn RegistryStore>,
    collectors: CollectorClient,
    broker_depth_limit: i64,
}

impl TopicLifecycle {
    pub fn new(
        registry: Arc<dyn RegistryStore>,
        collectors: CollectorClient,
        broker_depth_limit: i64,
    ) -> Self {
        Self {
            registry,
            collectors,
            broker_depth_limit,
        }
    }

    /// Create `name` on a randomly chosen broker. Creating an existing topic
    /// succeeds and leaves the stored record untouched.
    pub async fn create_topic(&self, name: &str) -> Result<String> {
        let broker = assign_broker(self.registry.as_ref()).await?;

        let topic = Topic::assign(name, &broker);
        match Registration::from_insert(self.registry.insert_topic(topic).await)? {
            Registration::Registered => info!(
                topic = %name,
                broker = %broker.tcp_address,
                "Topic created"
            ),
            Registration::Duplicate => debug!(topic = %name, "Topic already exists"),
        }

        Ok(name.to_string())
    }

    /// Register a component under `topic_name`, creating the topic on first use.
    pub async fn register_component(
        &self,
        namespace: Namespace,
        topic_name: &str,
        host: &str,
        port: &str,
    ) -> Result<Registration> {
        if self.registry.get_topic(topic_name).await?.is_none() {
            self.create_topic(topic_name).await?;
        }

        let component = Component::new(namespace, topic_name, host, port);
        let registration = Registration::from_insert(self.registry.upsert_component(component).await)?;

        info!(
            namespace = %namespace,
            topic = %topic_name,
            host = %host,
            port = %port,
            "Component registered"
        );
        Ok(registration)
    }

    /// Delete a topic, stopping its collectors first.
    ///
    /// Each collector stop is independent; nothing is rolled back if a later
    /// step fails. A collector that cannot be reached has most likely exited
    /// already, so its component row is removed directly. Returns the number
    /// of collectors stopped or found gone.
    pub async fn delete_topic(&self, name: &str) -> Result<u64> {
        if self.registry.get_topic(name).await?.is_none() {
            return Err(MasterError::TopicNotFound(name.to_string()));
        }

        let collectors: Vec<Component> = self
            .registry
            .list_components(name)
            .await?
            .into_iter()
            .filter(|c| c.namespace == Namespace::Collector)
            .collect();

        let mut stopped: u64 = 0;
        for collector in &collectors {
            let address = collector.address();
            match self.collectors.stop(&address).await {
                Ok(()) => {
                    stopped += 1;
                    info!(topic = %name, collector = %address, "Collector stopped");
                }
                Err(e) if e.is_unreachable() => {
                    let removed = self
                        .registry
                        .delete_components(name, Namespace::Collector, Some(&collector.key()))
                        .await?;
                    stopped += 1;
                    debug!(
                        topic = %name,
                        collector = %address,
                        removed,
                        "Collector already gone, component removed"
                    );
                }
                Err(e) => {
                    warn!(topic = %name, collector = %address, error = %e, "Failed to stop collector");
                }
            }
        }

        self.registry.delete_topic(name).await?;
        info!(topic = %name, collectors_stopped = stopped, "Topic deleted");

        Ok(stopped)
    }

    /// Register a broker, attaching a randomly chosen broker API endpoint.
    pub async fn register_broker(&self, tcp_address: &str, http_address: &str) -> Result<Registration> {
        let api = assign_broker_api(self.registry.as_ref()).await?;
        let broker = Broker {
            tcp_address: tcp_address.to_string(),
            http_address: http_address.to_string(),
            depth_limit: self.broker_depth_limit,
            api_address: api.address(),
        };

        let registration = Registration::from_insert(self.registry.insert_broker(broker).await)?;
        info!(
            tcp_address = %tcp_address,
            http_address = %http_address,
            api_address = %api.address(),
            ?registration,
            "Broker registered"
        );
        Ok(registration)
    }

    pub async fn register_broker_api(&self, host: &str, port: u16) -> Result<Registration> {
        let api = BrokerApi {
            host: host.to_string(),
            port,
        };
        let registration = Registration::from_insert(self.registry.insert_broker_api(api).await)?;
        info!(host = %host, port, ?registration, "Broker api registered");
        Ok(registration)
    }
}
