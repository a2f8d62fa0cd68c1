use std::cell::Cell;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use glam::Vec3;
use parking_lot::Mutex;
use sightline_runtime::services::{self, Services};
use sightline_runtime::{
    CastError, CoreError, FirearmSpec, GazeEvent, GazeListener, GazePayload, GazeSession,
    GazeTracker, HealthLedger, HitRecord, InventoryLedger, ItemCatalog, ItemDef, LayerMask,
    LedgerError, MatchRule, ObjectId, Ray, RayHost, SubscriptionRegistry, WeaponSpec,
};

fn m9_catalog() -> ItemCatalog {
    ItemCatalog::from_items([
        ItemDef::plain("TestItem-Cube"),
        ItemDef::firearm(
            "M9",
            FirearmSpec {
                weapon: WeaponSpec::default(),
                ammo_type: "Pistol".into(),
                clip_size: 12,
                fresh_ammo: 36,
                holding_ammo: 24,
                automatic: false,
            },
        ),
    ])
}

fn cube_hit() -> HitRecord {
    HitRecord {
        target: ObjectId(7),
        distance: 2.0,
        tag: "Item".into(),
        name: "Cube".into(),
    }
}

/// Reports the cube for the first `hits` casts, then nothing.
struct FlickerHost {
    hits: usize,
    casts: Cell<usize>,
}

impl RayHost for FlickerHost {
    fn cast(&self, _ray: &Ray, _mask: LayerMask) -> Result<Option<HitRecord>, CastError> {
        let cast = self.casts.get();
        self.casts.set(cast + 1);
        Ok((cast < self.hits).then(cube_hit))
    }
}

#[derive(Default)]
struct Counter {
    enters: usize,
    exits: usize,
    engaged: bool,
}

impl GazeListener for Counter {
    fn on_enter(&mut self, _payload: &GazePayload) {
        assert!(!self.engaged, "enter while already engaged");
        self.engaged = true;
        self.enters += 1;
    }

    fn on_exit(&mut self) {
        assert!(self.engaged, "exit without enter");
        self.engaged = false;
        self.exits += 1;
    }
}

#[test]
fn three_hits_then_two_misses_pair_enter_with_exit() {
    let host = FlickerHost {
        hits: 3,
        casts: Cell::new(0),
    };
    let registry = SubscriptionRegistry::new();
    let counter = Arc::new(Mutex::new(Counter::default()));
    registry.register_handle(MatchRule::Tag("Item".into()), counter.clone());

    let mut tracker = GazeTracker::new(5.0, LayerMask::ALL.without(8));
    let mut session: Option<GazeSession> = None;
    let mut events = Vec::new();
    for _ in 0..5 {
        let update = tracker.tick(&host, Vec3::ZERO, Vec3::NEG_Z, None);
        if update.exited.is_some() {
            if let Some(open) = session.take() {
                open.end();
            }
        }
        if let Some(hit) = &update.entered {
            session = Some(registry.enter(&GazePayload {
                caster: Some("P1".into()),
                hit: hit.clone(),
            }));
        }
        events.extend(update.events());
    }

    assert_eq!(
        events,
        vec![GazeEvent::Enter(cube_hit()), GazeEvent::Exit(cube_hit())]
    );
    let counter = counter.lock();
    assert_eq!((counter.enters, counter.exits), (1, 1));
    assert!(session.is_none());
}

#[test]
fn damage_scenario_kills_exactly_once() {
    let ledger = HealthLedger::new();
    let deaths = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&deaths);
    ledger.set_death_handler(move |_| {
        seen.fetch_add(1, Ordering::SeqCst);
    });
    ledger.register("E1", 100.0);

    assert_eq!(ledger.apply_damage("E1", 40.0).unwrap().current_health, 60.0);
    let record = ledger.apply_damage("E1", 70.0).unwrap();
    assert_eq!(record.current_health, -10.0);
    assert!(record.is_dead);

    for _ in 0..3 {
        assert_eq!(
            ledger.apply_damage("E1", 10.0),
            Err(LedgerError::AlreadyDead("E1".into()))
        );
    }
    assert_eq!(ledger.record("E1").unwrap().current_health, -10.0);
    assert_eq!(deaths.load(Ordering::SeqCst), 1);
}

#[test]
fn firearm_pickup_scenario() {
    let inventory = InventoryLedger::new(Arc::new(m9_catalog()));
    let equipped = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&equipped);
    inventory.set_equip_hook(move |owner: Option<&str>, item: &ItemDef| {
        sink.lock().push((owner.map(str::to_string), item.id.clone()));
    });

    assert!(inventory.add_weapon(Some("P1"), "M9", true));
    assert_eq!(inventory.quantity(Some("P1"), "M9"), 1);
    assert_eq!(inventory.quantity(Some("P1"), "Pistol_Reserves"), 24);
    assert_eq!(inventory.quantity(Some("P1"), "M9_Chambered"), 12);

    assert!(inventory.add_weapon(Some("P1"), "M9", true));
    assert_eq!(inventory.quantity(Some("P1"), "M9"), 2);
    assert_eq!(inventory.quantity(Some("P1"), "Pistol_Reserves"), 48);
    assert_eq!(inventory.quantity(Some("P1"), "M9_Chambered"), 12);

    assert_eq!(equipped.lock().len(), 2);
}

#[test]
fn unknown_item_changes_nothing() {
    let inventory = InventoryLedger::new(Arc::new(m9_catalog()));
    inventory.add_item(Some("P1"), "TestItem-Cube", 2);
    let before = inventory.entries();

    assert!(!inventory.add_item(Some("P1"), "Unobtainium", 1));
    assert!(!inventory.add_weapon(Some("P1"), "Unobtainium", true));
    assert_eq!(inventory.entries(), before);
    assert!(!inventory.has_item(Some("P1"), "Unobtainium"));
}

#[test]
fn services_install_once_per_process() {
    let installed = services::install(Services::new(m9_catalog())).unwrap();
    installed.health.register("P1", 100.0);

    let again = services::install(Services::new(ItemCatalog::new()));
    assert_eq!(again.unwrap_err(), CoreError::AlreadyInstalled);
    let current = services::installed().unwrap();
    assert!(current.catalog.contains("M9"));
    assert!(current.health.contains("P1"));
}
