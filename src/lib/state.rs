//! This module stores the type for the collective state of the server.
use std::sync::{Arc, RwLock};

use crate::ledger::{Bus, Ledger};

/// The shared state for the application.
#[derive(Debug)]
pub struct AppState {
    pub ledger: Ledger,
}

pub type SharedState = Arc<RwLock<AppState>>;

impl AppState {
    /// Creates a new [`AppState`] serving the given fleet.
    pub fn new(fleet: Vec<Bus>) -> Self {
        AppState {
            ledger: Ledger::new(fleet),
        }
    }

    pub fn shared(self) -> SharedState {
        Arc::new(RwLock::new(self))
    }
}
