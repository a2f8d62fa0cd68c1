use std::collections::HashMap;
use std::sync::Arc;

use log::{info, warn};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use crate::error::LedgerError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthRecord {
    pub entity_id: String,
    pub current_health: f64,
    pub is_dead: bool,
}

type DeathHandler = Arc<dyn Fn(&HealthRecord) + Send + Sync>;

/// Authoritative health bookkeeping for every registered entity.
///
/// Cloning the ledger yields another handle onto the same records. Each
/// record sits in its own cell so damage to one entity never waits on
/// another.
#[derive(Clone, Default)]
pub struct HealthLedger {
    records: Arc<RwLock<HashMap<String, Arc<Mutex<HealthRecord>>>>>,
    on_death: Arc<RwLock<Option<DeathHandler>>>,
}

impl std::fmt::Debug for HealthLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthLedger")
            .field("entities", &self.records.read().len())
            .finish()
    }
}

impl HealthLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs the callback fired once per entity when its health drops to zero.
    pub fn set_death_handler<F>(&self, handler: F)
    where
        F: Fn(&HealthRecord) + Send + Sync + 'static,
    {
        let handler: DeathHandler = Arc::new(handler);
        *self.on_death.write() = Some(handler);
    }

    /// Starts tracking `entity_id`. A second registration leaves the record untouched.
    pub fn register(&self, entity_id: &str, start_health: f64) -> bool {
        let mut records = self.records.write();
        if records.contains_key(entity_id) {
            return false;
        }
        records.insert(
            entity_id.to_string(),
            Arc::new(Mutex::new(HealthRecord {
                entity_id: entity_id.to_string(),
                current_health: start_health,
                is_dead: start_health <= 0.0,
            })),
        );
        true
    }

    pub fn apply_damage(&self, entity_id: &str, amount: f64) -> Result<HealthRecord, LedgerError> {
        let Some(cell) = self.cell(entity_id) else {
            warn!("Damage to unknown entity {entity_id} ignored");
            return Err(LedgerError::UnknownEntity(entity_id.to_string()));
        };

        let (record, died) = {
            let mut record = cell.lock();
            if record.is_dead {
                warn!("Damage to dead entity {entity_id} ignored");
                return Err(LedgerError::AlreadyDead(entity_id.to_string()));
            }
            // Healing goes through `reset`.
            record.current_health -= amount.max(0.0);
            let died = record.current_health <= 0.0;
            if died {
                record.is_dead = true;
            }
            (record.clone(), died)
        };

        info!(
            "Entity {} Health Remaining: {}",
            record.entity_id, record.current_health
        );
        if died {
            info!("Entity {} died", record.entity_id);
            let handler = self.on_death.read().clone();
            if let Some(handler) = handler {
                handler(&record);
            }
        }
        Ok(record)
    }

    pub fn is_dead(&self, entity_id: &str) -> bool {
        self.cell(entity_id)
            .map(|cell| cell.lock().is_dead)
            .unwrap_or(false)
    }

    pub fn record(&self, entity_id: &str) -> Option<HealthRecord> {
        self.cell(entity_id).map(|cell| cell.lock().clone())
    }

    pub fn contains(&self, entity_id: &str) -> bool {
        self.records.read().contains_key(entity_id)
    }

    /// Restores a living entity to `health`. Dead entities stay dead until acknowledged.
    pub fn reset(&self, entity_id: &str, health: f64) -> Result<HealthRecord, LedgerError> {
        let cell = self
            .cell(entity_id)
            .ok_or_else(|| LedgerError::UnknownEntity(entity_id.to_string()))?;
        let mut record = cell.lock();
        if record.is_dead {
            return Err(LedgerError::AlreadyDead(entity_id.to_string()));
        }
        record.current_health = health;
        Ok(record.clone())
    }

    /// Drops the record of a dead entity. Living entities are left alone.
    pub fn acknowledge_death(&self, entity_id: &str) -> Option<HealthRecord> {
        let mut records = self.records.write();
        let dead = records
            .get(entity_id)
            .map(|cell| cell.lock().is_dead)
            .unwrap_or(false);
        if !dead {
            return None;
        }
        records
            .remove(entity_id)
            .map(|cell| cell.lock().clone())
    }

    /// Snapshot of every record, sorted by entity id.
    pub fn all_records(&self) -> Vec<HealthRecord> {
        let mut records: Vec<HealthRecord> = self
            .records
            .read()
            .values()
            .map(|cell| cell.lock().clone())
            .collect();
        records.sort_by(|a, b| a.entity_id.cmp(&b.entity_id));
        records
    }

    fn cell(&self, entity_id: &str) -> Option<Arc<Mutex<HealthRecord>>> {
        self.records.read().get(entity_id).cloned()
    }
}
