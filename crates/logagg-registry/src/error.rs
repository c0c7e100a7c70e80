//! Registry Error Types
//!
//! ## Error Categories
//!
//! ### Uniqueness
//! - `DuplicateKey`: an insert collided with an existing unique key. Callers in
//!   the master treat this as "someone else already did it" and report success.
//!
//! ### Backend
//! - `Database`: SQLite/sqlx operation failed (connection, query, etc.)
//! - `Serialization`: free-form component fields could not be encoded/decoded
//!
//! ## Usage
//!
//! ```ignore
//! use logagg_registry::{RegistryError, RegistryStore};
//!
//! match store.insert_topic(topic).await {
//!     Ok(()) => println!("Created"),
//!     Err(e) if e.is_duplicate() => println!("Already there"),
//!     Err(e) => return Err(e),
//! }
//! ```

use thiserror::Error;

pub type Result<T> = std::result::Result<T, RegistryError>;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Duplicate key in {collection}: {key}")]
    DuplicateKey { collection: &'static str, key: String },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RegistryError {
    /// True when the error is a benign unique-key collision.
    pub fn is_duplicate(&self) -> bool {
        matches!(self, RegistryError::DuplicateKey { .. })
    }

    /// Map a sqlx error to `DuplicateKey` when it is a uniqueness violation.
    pub(crate) fn from_insert(err: sqlx::Error, collection: &'static str, key: String) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                RegistryError::DuplicateKey { collection, key }
            }
            _ => RegistryError::Database(err),
        }
    }
}
