use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, info, warn};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use crate::catalog::{chambered_slot, reserves_slot, ItemCatalog, ItemDef, ItemKind};
use crate::error::LedgerError;

/// Quantity of one item held by one owner. `owner == None` is the shared pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryEntry {
    pub owner: Option<String>,
    pub item_id: String,
    pub quantity: u32,
}

/// Receives equip requests raised by [`InventoryLedger::add_weapon`].
pub trait EquipHook: Send + Sync {
    fn equip(&self, owner: Option<&str>, item: &ItemDef);
}

impl<F> EquipHook for F
where
    F: Fn(Option<&str>, &ItemDef) + Send + Sync,
{
    fn equip(&self, owner: Option<&str>, item: &ItemDef) {
        self(owner, item)
    }
}

type SlotKey = (Option<String>, String);

fn key(owner: Option<&str>, item_id: &str) -> SlotKey {
    (owner.map(str::to_string), item_id.to_string())
}

fn owner_label(owner: Option<&str>) -> &str {
    owner.unwrap_or("<shared>")
}

/// Authoritative item quantities keyed by owner and item id.
///
/// Handles are cheap to clone and share the same cells. Every mutation goes
/// through the public operations so quantities can never go negative and
/// unknown ids never create a cell.
#[derive(Clone)]
pub struct InventoryLedger {
    catalog: Arc<ItemCatalog>,
    cells: Arc<RwLock<HashMap<SlotKey, Arc<Mutex<u32>>>>>,
    equip_hook: Arc<RwLock<Option<Arc<dyn EquipHook>>>>,
}

impl std::fmt::Debug for InventoryLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InventoryLedger")
            .field("catalog_items", &self.catalog.len())
            .field("cells", &self.cells.read().len())
            .finish()
    }
}

impl InventoryLedger {
    pub fn new(catalog: Arc<ItemCatalog>) -> Self {
        Self {
            catalog,
            cells: Arc::default(),
            equip_hook: Arc::default(),
        }
    }

    pub fn catalog(&self) -> &ItemCatalog {
        &self.catalog
    }

    pub fn set_equip_hook(&self, hook: impl EquipHook + 'static) {
        let hook: Arc<dyn EquipHook> = Arc::new(hook);
        *self.equip_hook.write() = Some(hook);
    }

    /// Adds `quantity` of `item_id` without any acquire side effect.
    pub fn add_item(&self, owner: Option<&str>, item_id: &str, quantity: u32) -> bool {
        self.add(owner, item_id, quantity, false).is_ok()
    }

    /// Adds `quantity` of `item_id` as a world pickup, running the item's
    /// acquire side effect before the quantity is stored.
    pub fn pick_up(&self, owner: Option<&str>, item_id: &str, quantity: u32) -> bool {
        self.add(owner, item_id, quantity, true).is_ok()
    }

    /// Picks up one `item_id` and, when `equip` is set and the item is a
    /// weapon, signals the equip hook.
    pub fn add_weapon(&self, owner: Option<&str>, item_id: &str, equip: bool) -> bool {
        let Ok(item) = self.add(owner, item_id, 1, true) else {
            return false;
        };
        if equip && item.kind.is_weapon() {
            let hook = self.equip_hook.read().clone();
            match hook {
                Some(hook) => {
                    info!("Equipping {item_id}.");
                    hook.equip(owner, &item);
                }
                None => debug!(
                    "No equip hook installed; {} keeps {item_id} unequipped",
                    owner_label(owner)
                ),
            }
        }
        true
    }

    pub fn has_item(&self, owner: Option<&str>, item_id: &str) -> bool {
        self.quantity(owner, item_id) > 0
    }

    pub fn quantity(&self, owner: Option<&str>, item_id: &str) -> u32 {
        self.cells
            .read()
            .get(&key(owner, item_id))
            .map(|cell| *cell.lock())
            .unwrap_or(0)
    }

    /// Takes up to `quantity` of `item_id` away and returns how many were removed.
    pub fn remove_item(&self, owner: Option<&str>, item_id: &str, quantity: u32) -> u32 {
        let Some(cell) = self.cells.read().get(&key(owner, item_id)).cloned() else {
            return 0;
        };
        let mut stored = cell.lock();
        let removed = quantity.min(*stored);
        *stored -= removed;
        removed
    }

    /// Snapshot of all cells, sorted by owner then item.
    pub fn entries(&self) -> Vec<InventoryEntry> {
        let mut entries: Vec<InventoryEntry> = self
            .cells
            .read()
            .iter()
            .map(|((owner, item_id), cell)| InventoryEntry {
                owner: owner.clone(),
                item_id: item_id.clone(),
                quantity: *cell.lock(),
            })
            .collect();
        entries.sort_by(|a, b| (&a.owner, &a.item_id).cmp(&(&b.owner, &b.item_id)));
        entries
    }

    fn add(
        &self,
        owner: Option<&str>,
        item_id: &str,
        quantity: u32,
        pickup: bool,
    ) -> Result<ItemDef, LedgerError> {
        let item = match self.catalog.get(item_id) {
            Some(item) => item.clone(),
            None if self.catalog.is_ammo_slot(item_id) => ItemDef::plain(item_id),
            None => {
                warn!(
                    "Item {item_id} couldn't be added to entity {}, due to it not existing in the item database.",
                    owner_label(owner)
                );
                return Err(LedgerError::UnknownItem(item_id.to_string()));
            }
        };

        if pickup {
            self.on_acquire(owner, &item);
        }

        let cell = self.cell_or_insert(owner, item_id);
        let total = {
            let mut stored = cell.lock();
            *stored = stored.saturating_add(quantity);
            *stored
        };
        info!("Item ID {item_id}, New Qty: {total}");
        Ok(item)
    }

    // The branch depends on what the owner holds right now, before the
    // picked-up item itself is counted.
    fn on_acquire(&self, owner: Option<&str>, item: &ItemDef) {
        let ItemKind::Firearm(spec) = &item.kind else {
            return;
        };
        let reserves = reserves_slot(&spec.ammo_type);
        if self.has_item(owner, &item.id) {
            self.stock(owner, &reserves, spec.holding_ammo);
        } else {
            let chambered = spec.clip_size.min(spec.fresh_ammo);
            self.stock(owner, &reserves, spec.fresh_ammo - chambered);
            self.stock(owner, &chambered_slot(&item.id), chambered);
        }
    }

    fn stock(&self, owner: Option<&str>, slot: &str, quantity: u32) {
        // Derived ammo slots are always accepted by `add`.
        let _ = self.add(owner, slot, quantity, false);
    }

    fn cell_or_insert(&self, owner: Option<&str>, item_id: &str) -> Arc<Mutex<u32>> {
        let slot = key(owner, item_id);
        if let Some(cell) = self.cells.read().get(&slot) {
            return Arc::clone(cell);
        }
        Arc::clone(self.cells.write().entry(slot).or_default())
    }
}
