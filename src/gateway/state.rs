use std::sync::Arc;

use crate::account::AccountStore;
use crate::transfer::TransferEngine;

/// Shared gateway state
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<TransferEngine>,
    /// Read-only account lookups
    pub store: Arc<dyn AccountStore>,
}

impl AppState {
    pub fn new(engine: Arc<TransferEngine>, store: Arc<dyn AccountStore>) -> Self {
        Self { engine, store }
    }
}
