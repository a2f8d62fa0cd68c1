//! Per-actor weapon state: aiming, firing cadence and reloads.
//!
//! Attacks run on a cooldown polled once per tick. Automatic firearms keep
//! attacking while Fire is held; everything else attacks once per press.

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::catalog::{chambered_slot, reserves_slot, FirearmSpec, ItemDef, ItemKind, WeaponSpec};
use crate::input::{ActionState, Button};
use crate::inventory::InventoryLedger;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WeaponEvent {
    Equipped(String),
    AimChanged(bool),
    /// The weapon hit whatever the actor is looking at.
    Attacked { weapon: String, damage: f64 },
    /// Fire was requested with an empty chamber.
    DryFire { weapon: String },
    Reloaded { weapon: String, rounds: u32 },
}

#[derive(Debug, Clone, Default)]
pub struct WeaponHandler {
    equipped: Option<ItemDef>,
    aiming: bool,
    firing: bool,
    cooldown: f32,
}

impl WeaponHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn equipped(&self) -> Option<&ItemDef> {
        self.equipped.as_ref()
    }

    pub fn is_aiming(&self) -> bool {
        self.aiming
    }

    pub fn is_firing(&self) -> bool {
        self.firing
    }

    /// Replaces the equipped weapon. Items that cannot attack are refused.
    pub fn equip(&mut self, item: &ItemDef) -> bool {
        if !item.kind.is_weapon() {
            debug!("{} is not a weapon, ignoring equip", item.id);
            return false;
        }
        info!("Equipped {}", item.id);
        self.equipped = Some(item.clone());
        self.aiming = false;
        self.firing = false;
        self.cooldown = 0.0;
        true
    }

    pub fn tick(
        &mut self,
        dt: f32,
        input: &ActionState,
        inventory: &InventoryLedger,
        owner: Option<&str>,
    ) -> Vec<WeaponEvent> {
        let mut events = Vec::new();
        let Some(item) = self.equipped.clone() else {
            return events;
        };
        let Some(spec) = item.kind.weapon_spec().copied() else {
            return events;
        };
        self.cooldown = (self.cooldown - dt).max(0.0);

        if let ItemKind::Firearm(firearm) = &item.kind {
            if input.was_pressed(Button::Reload) {
                let rounds = reload(&item.id, firearm, inventory, owner);
                if rounds > 0 {
                    events.push(WeaponEvent::Reloaded {
                        weapon: item.id.clone(),
                        rounds,
                    });
                }
                return events;
            }
        }

        let aiming = input.is_held(Button::Aim);
        if aiming != self.aiming {
            self.aiming = aiming;
            events.push(WeaponEvent::AimChanged(aiming));
        }

        let automatic = is_automatic(&item.kind);
        if !self.firing {
            self.firing = (automatic && input.is_held(Button::Fire))
                || input.was_pressed(Button::Fire);
        }
        if self.firing && self.cooldown <= 0.0 {
            events.push(self.attack(&item, &spec, inventory, owner));
            self.firing = automatic && input.is_held(Button::Fire);
            self.cooldown = spec.attack_rate.max(0.0);
        }
        events
    }

    fn attack(
        &self,
        item: &ItemDef,
        spec: &WeaponSpec,
        inventory: &InventoryLedger,
        owner: Option<&str>,
    ) -> WeaponEvent {
        if matches!(item.kind, ItemKind::Firearm(_))
            && inventory.remove_item(owner, &chambered_slot(&item.id), 1) == 0
        {
            debug!("{} is empty", item.id);
            return WeaponEvent::DryFire {
                weapon: item.id.clone(),
            };
        }
        WeaponEvent::Attacked {
            weapon: item.id.clone(),
            damage: spec.damage,
        }
    }
}

fn is_automatic(kind: &ItemKind) -> bool {
    matches!(kind, ItemKind::Firearm(spec) if spec.automatic)
}

fn reload(
    weapon_id: &str,
    spec: &FirearmSpec,
    inventory: &InventoryLedger,
    owner: Option<&str>,
) -> u32 {
    let chambered = chambered_slot(weapon_id);
    let reserves = reserves_slot(&spec.ammo_type);
    let missing = spec
        .clip_size
        .saturating_sub(inventory.quantity(owner, &chambered));
    let moved = inventory.remove_item(owner, &reserves, missing);
    if moved > 0 {
        inventory.add_item(owner, &chambered, moved);
    }
    moved
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::catalog::ItemCatalog;

    fn firearm(id: &str, automatic: bool) -> ItemDef {
        ItemDef::firearm(
            id,
            FirearmSpec {
                weapon: WeaponSpec {
                    attack_rate: 0.5,
                    damage: 25.0,
                },
                ammo_type: "Pistol".into(),
                clip_size: 12,
                fresh_ammo: 36,
                holding_ammo: 24,
                automatic,
            },
        )
    }

    fn armed(item: ItemDef) -> (WeaponHandler, InventoryLedger) {
        let inventory = InventoryLedger::new(Arc::new(ItemCatalog::from_items([item.clone()])));
        inventory.pick_up(Some("P1"), &item.id, 1);
        let mut handler = WeaponHandler::new();
        assert!(handler.equip(&item));
        (handler, inventory)
    }

    fn attacks(events: &[WeaponEvent]) -> usize {
        events
            .iter()
            .filter(|event| matches!(event, WeaponEvent::Attacked { .. }))
            .count()
    }

    #[test]
    fn semi_automatic_fires_once_per_press() {
        let (mut handler, inventory) = armed(firearm("M9", false));
        let mut input = ActionState::new();
        input.press(Button::Fire);
        let mut fired = 0;
        for _ in 0..20 {
            fired += attacks(&handler.tick(0.25, &input, &inventory, Some("P1")));
            input.end_tick();
        }
        assert_eq!(fired, 1);
        assert_eq!(inventory.quantity(Some("P1"), "M9_Chambered"), 11);
    }

    #[test]
    fn automatic_fires_on_cooldown_while_held() {
        let (mut handler, inventory) = armed(firearm("MP5", true));
        let mut input = ActionState::new();
        input.press(Button::Fire);
        let mut fired = 0;
        for _ in 0..10 {
            fired += attacks(&handler.tick(0.25, &input, &inventory, Some("P1")));
            input.end_tick();
        }
        assert_eq!(fired, 5);
        input.release(Button::Fire);
        handler.tick(0.25, &input, &inventory, Some("P1"));
        assert!(!handler.is_firing());
    }

    #[test]
    fn empty_chamber_dry_fires_and_reload_refills() {
        let (mut handler, inventory) = armed(firearm("M9", false));
        inventory.remove_item(Some("P1"), "M9_Chambered", 12);

        let mut input = ActionState::new();
        input.tap(Button::Fire);
        let events = handler.tick(0.25, &input, &inventory, Some("P1"));
        assert_eq!(
            events,
            vec![WeaponEvent::DryFire {
                weapon: "M9".into()
            }]
        );
        input.end_tick();

        input.tap(Button::Reload);
        let events = handler.tick(0.25, &input, &inventory, Some("P1"));
        assert_eq!(
            events,
            vec![WeaponEvent::Reloaded {
                weapon: "M9".into(),
                rounds: 12
            }]
        );
        assert_eq!(inventory.quantity(Some("P1"), "M9_Chambered"), 12);
        assert_eq!(inventory.quantity(Some("P1"), "Pistol_Reserves"), 12);
    }

    #[test]
    fn reload_skips_the_rest_of_the_tick() {
        let (mut handler, inventory) = armed(firearm("M9", false));
        let mut input = ActionState::new();
        input.tap(Button::Reload);
        input.tap(Button::Fire);
        input.press(Button::Aim);
        assert!(handler
            .tick(0.25, &input, &inventory, Some("P1"))
            .is_empty());
        assert_eq!(inventory.quantity(Some("P1"), "M9_Chambered"), 12);
        assert!(!handler.is_aiming());
    }

    #[test]
    fn aim_follows_the_button() {
        let (mut handler, inventory) = armed(firearm("M9", false));
        let mut input = ActionState::new();
        input.press(Button::Aim);
        assert_eq!(
            handler.tick(0.25, &input, &inventory, Some("P1")),
            vec![WeaponEvent::AimChanged(true)]
        );
        assert!(handler
            .tick(0.25, &input, &inventory, Some("P1"))
            .is_empty());
        input.release(Button::Aim);
        assert_eq!(
            handler.tick(0.25, &input, &inventory, Some("P1")),
            vec![WeaponEvent::AimChanged(false)]
        );
    }

    #[test]
    fn melee_weapons_need_no_ammo() {
        let knife = ItemDef {
            id: "Knife".into(),
            kind: ItemKind::Weapon(WeaponSpec::default()),
        };
        let inventory = InventoryLedger::new(Arc::new(ItemCatalog::from_items([knife.clone()])));
        let mut handler = WeaponHandler::new();
        handler.equip(&knife);
        let mut input = ActionState::new();
        input.tap(Button::Fire);
        assert_eq!(
            handler.tick(0.25, &input, &inventory, None),
            vec![WeaponEvent::Attacked {
                weapon: "Knife".into(),
                damage: 10.0
            }]
        );
    }

    #[test]
    fn plain_items_cannot_be_equipped() {
        let mut handler = WeaponHandler::new();
        assert!(!handler.equip(&ItemDef::plain("TestItem-Cube")));
        assert!(handler.equipped().is_none());
    }
}
