//! Process-wide ledgers shared by every actor.
//!
//! [`install`] succeeds once per process; later calls are rejected and the
//! installed services are never replaced or reset.

use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::catalog::ItemCatalog;
use crate::error::CoreError;
use crate::health::HealthLedger;
use crate::inventory::InventoryLedger;

/// Handles onto the shared ledgers. Clones point at the same state.
#[derive(Debug, Clone)]
pub struct Services {
    pub catalog: Arc<ItemCatalog>,
    pub inventory: InventoryLedger,
    pub health: HealthLedger,
}

impl Services {
    pub fn new(catalog: ItemCatalog) -> Self {
        let catalog = Arc::new(catalog);
        Self {
            inventory: InventoryLedger::new(Arc::clone(&catalog)),
            health: HealthLedger::new(),
            catalog,
        }
    }
}

static SERVICES: OnceCell<Services> = OnceCell::new();

pub fn install(services: Services) -> Result<&'static Services, CoreError> {
    SERVICES
        .set(services)
        .map_err(|_| CoreError::AlreadyInstalled)?;
    SERVICES.get().ok_or(CoreError::AlreadyInstalled)
}

pub fn installed() -> Option<&'static Services> {
    SERVICES.get()
}
