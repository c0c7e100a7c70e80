//! Broker assignment
//!
//! New topics are bound to a broker, and new brokers to a broker API endpoint,
//! chosen uniformly at random from what is currently registered so load
//! spreads without any coordination between masters.

use logagg_registry::{Broker, BrokerApi, RegistryStore};
use rand::Rng;

use crate::error::{MasterError, Result};

/// Uniform random choice, `None` for an empty set.
pub fn pick_uniform<T>(mut items: Vec<T>) -> Option<T> {
    if items.is_empty() {
        return None;
    }
    let index = rand::thread_rng().gen_range(0..items.len());
    Some(items.swap_remove(index))
}

pub async fn assign_broker(registry: &dyn RegistryStore) -> Result<Broker> {
    pick_uniform(registry.list_brokers().await?).ok_or(MasterError::NoBrokerAvailable)
}

pub async fn assign_broker_api(registry: &dyn RegistryStore) -> Result<BrokerApi> {
    pick_uniform(registry.list_broker_apis().await?).ok_or(MasterError::NoBrokerApiAvailable)
}
