//! RPC handlers for `/logagg/v1/*`
//!
//! Every operation is a `GET` with query parameters. Non-streaming handlers
//! return `Result<Json<ApiResponse<_>>, MasterError>`; the error side renders as
//! the same envelope with `success: false`.

pub mod auth;
pub mod brokers;
pub mod collectors;
pub mod components;
pub mod health;
pub mod tail;
pub mod topics;

use crate::error::{MasterError, Result};
use crate::AppState;

/// Reject the request unless `key`/`secret` match the configured pair.
pub(crate) fn authorize(state: &AppState, key: &str, secret: &str) -> Result<()> {
    if state.auth.check(key, secret) {
        Ok(())
    } else {
        Err(MasterError::AuthFailed)
    }
}
