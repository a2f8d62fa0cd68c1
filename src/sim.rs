//! Fixed-interval tick loop tying gaze, listeners, weapons and ledgers together.
//!
//! One tick runs in this order: scripted input, then per actor the gaze ray,
//! session exit/enter, focus callbacks and the weapon. Equip requests and
//! deaths raised during the tick are drained afterwards, and per-tick button
//! presses are cleared last.

use std::sync::Arc;

use anyhow::{Context, Result};
use log::{debug, warn};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::catalog::ItemDef;
use crate::config::SimConfig;
use crate::data_model::DataModel;
use crate::gaze::{GazeEvent, GazeTracker, HitRecord};
use crate::input::{ActionState, InputAction, ScriptedInput};
use crate::listeners::build_listener;
use crate::scene::{ObjectId, Scene};
use crate::services::Services;
use crate::subscription::{FocusContext, GazePayload, GazeSession, SubscriptionRegistry};
use crate::weapon::{WeaponEvent, WeaponHandler};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SimEvent {
    Gaze { actor: String, event: GazeEvent },
    Weapon { actor: String, event: WeaponEvent },
    Died { entity: String },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    pub tick: u64,
    pub events: Vec<SimEvent>,
}

/// An object that looks around, listens and carries a weapon.
#[derive(Debug)]
pub struct Actor {
    name: String,
    object: ObjectId,
    entity: Option<String>,
    tracker: GazeTracker,
    registry: SubscriptionRegistry,
    session: Option<GazeSession>,
    weapon: WeaponHandler,
    input: ActionState,
}

impl Actor {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn object(&self) -> ObjectId {
        self.object
    }

    pub fn entity(&self) -> Option<&str> {
        self.entity.as_deref()
    }

    pub fn gaze_target(&self) -> Option<&HitRecord> {
        self.tracker.current()
    }

    pub fn registry(&self) -> &SubscriptionRegistry {
        &self.registry
    }

    pub fn weapon(&self) -> &WeaponHandler {
        &self.weapon
    }

    pub fn input(&self) -> &ActionState {
        &self.input
    }

    fn answers_to(&self, name: &str) -> bool {
        self.name == name || self.entity.as_deref() == Some(name)
    }

    fn step(&mut self, model: &DataModel, services: &Services, dt: f32) -> Vec<SimEvent> {
        let mut events = Vec::new();
        let Some(object) = model.get(self.object) else {
            // Gone from the scene: let go of whatever it was looking at.
            let update = self.tracker.clear();
            if let Some(session) = self.session.take() {
                session.end();
            }
            self.push_gaze(&mut events, update.events());
            return events;
        };

        let update = self
            .tracker
            .tick(model, object.position, object.forward(), Some(object.id));
        if update.exited.is_some() {
            if let Some(session) = self.session.take() {
                session.end();
            }
        }
        if let Some(hit) = &update.entered {
            let payload = GazePayload {
                caster: self.entity.clone(),
                hit: hit.clone(),
            };
            self.session = Some(self.registry.enter(&payload));
        }
        self.push_gaze(&mut events, update.events());

        if let (Some(session), Some(focused)) = (&self.session, self.tracker.current()) {
            session.focus(&FocusContext {
                owner: self.entity.as_deref(),
                input: &self.input,
                model,
                services,
                focused,
            });
        }

        let owner = self.entity.as_deref();
        for event in self.weapon.tick(dt, &self.input, &services.inventory, owner) {
            if let WeaponEvent::Attacked { damage, .. } = &event {
                self.deal_damage(model, services, *damage);
            }
            events.push(SimEvent::Weapon {
                actor: self.name.clone(),
                event,
            });
        }
        events
    }

    fn deal_damage(&self, model: &DataModel, services: &Services, damage: f64) {
        let Some(target) = self.tracker.current() else {
            debug!("{} attacked nothing", self.name);
            return;
        };
        let Some(entity) = model.get(target.target).and_then(|object| object.entity) else {
            debug!("{} hit {}, which cannot take damage", self.name, target.name);
            return;
        };
        if let Err(err) = services.health.apply_damage(&entity, damage) {
            debug!("{} could not damage {entity}: {err}", self.name);
        }
    }

    fn push_gaze(&self, events: &mut Vec<SimEvent>, gaze: Vec<GazeEvent>) {
        events.extend(gaze.into_iter().map(|event| SimEvent::Gaze {
            actor: self.name.clone(),
            event,
        }));
    }
}

type EquipQueue = Arc<Mutex<Vec<(Option<String>, ItemDef)>>>;

#[derive(Debug)]
pub struct Simulation {
    config: SimConfig,
    model: DataModel,
    services: Services,
    actors: Vec<Actor>,
    script: Vec<ScriptedInput>,
    cursor: usize,
    tick: u64,
    equip_requests: EquipQueue,
    deaths: Arc<Mutex<Vec<String>>>,
}

impl Simulation {
    /// Builds a simulation with fresh ledgers for the scene's catalog.
    pub fn new(scene: Scene) -> Result<Self> {
        let services = Services::new(scene.catalog.clone());
        Self::from_scene(scene, services)
    }

    /// Builds a simulation on top of existing ledgers, registering every
    /// damageable object and taking over the death and equip callbacks.
    pub fn from_scene(scene: Scene, services: Services) -> Result<Self> {
        let Scene {
            objects,
            settings,
            script,
            ..
        } = scene;

        for object in &objects {
            if let (Some(entity), Some(health)) = (&object.entity, object.health) {
                services.health.register(entity, health);
            }
        }

        let mut actors = Vec::new();
        for object in objects.iter().filter(|o| o.object_type == "actor") {
            let registry = SubscriptionRegistry::new();
            for spec in &object.listeners {
                let listener = build_listener(&spec.behaviour)
                    .with_context(|| format!("failed to build listener for {}", object.name))?;
                registry.register_handle(spec.rule.clone(), listener);
            }
            actors.push(Actor {
                name: object.name.clone(),
                object: object.id,
                entity: object.entity.clone(),
                tracker: GazeTracker::new(
                    object.ray_length.unwrap_or(settings.ray_length),
                    settings.layer_mask(),
                ),
                registry,
                session: None,
                weapon: WeaponHandler::new(),
                input: ActionState::new(),
            });
        }

        let deaths: Arc<Mutex<Vec<String>>> = Arc::default();
        let sink = Arc::clone(&deaths);
        services
            .health
            .set_death_handler(move |record| sink.lock().push(record.entity_id.clone()));

        let equip_requests: EquipQueue = Arc::default();
        let sink = Arc::clone(&equip_requests);
        services
            .inventory
            .set_equip_hook(move |owner: Option<&str>, item: &ItemDef| {
                sink.lock().push((owner.map(str::to_string), item.clone()));
            });

        Ok(Self {
            config: settings,
            model: DataModel::from_objects(objects),
            services,
            actors,
            script,
            cursor: 0,
            tick: 0,
            equip_requests,
            deaths,
        })
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn model(&self) -> &DataModel {
        &self.model
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    pub fn actors(&self) -> &[Actor] {
        &self.actors
    }

    /// Looks an actor up by object name or entity id.
    pub fn actor(&self, name: &str) -> Option<&Actor> {
        self.actors.iter().find(|actor| actor.answers_to(name))
    }

    /// Number of completed ticks.
    pub fn current_tick(&self) -> u64 {
        self.tick
    }

    /// Feeds one input to an actor for the upcoming tick.
    pub fn apply_input(&mut self, actor: &str, action: &InputAction) -> bool {
        let Some(target) = self.actors.iter_mut().find(|a| a.answers_to(actor)) else {
            warn!("Input for unknown actor {actor} dropped");
            return false;
        };
        match action {
            InputAction::Look(rotation) => self.model.set_rotation(target.object, *rotation),
            other => {
                target.input.apply(other);
                true
            }
        }
    }

    /// Runs one tick. Ticks are numbered from 1.
    pub fn tick(&mut self) -> TickReport {
        let tick = self.tick + 1;
        self.apply_script(tick);

        let dt = self.config.tick_interval();
        let mut events = Vec::new();
        for actor in &mut self.actors {
            events.extend(actor.step(&self.model, &self.services, dt));
        }

        self.drain_equip_requests(&mut events);
        self.drain_deaths(&mut events);

        for actor in &mut self.actors {
            actor.input.end_tick();
        }
        self.tick = tick;
        TickReport { tick, events }
    }

    pub fn run(&mut self, ticks: u64) -> Vec<TickReport> {
        (0..ticks).map(|_| self.tick()).collect()
    }

    fn apply_script(&mut self, tick: u64) {
        while let Some(input) = self.script.get(self.cursor) {
            if input.tick > tick {
                break;
            }
            let input = input.clone();
            self.cursor += 1;
            self.apply_input(&input.actor, &input.action);
        }
    }

    fn drain_equip_requests(&mut self, events: &mut Vec<SimEvent>) {
        let requests = std::mem::take(&mut *self.equip_requests.lock());
        for (owner, item) in requests {
            let actor = owner
                .as_deref()
                .and_then(|owner| self.actors.iter_mut().find(|a| a.answers_to(owner)));
            let Some(actor) = actor else {
                debug!(
                    "No actor for {}; equip of {} dropped",
                    owner.as_deref().unwrap_or("<shared>"),
                    item.id
                );
                continue;
            };
            if actor.weapon.equip(&item) {
                events.push(SimEvent::Weapon {
                    actor: actor.name.clone(),
                    event: WeaponEvent::Equipped(item.id.clone()),
                });
            }
        }
    }

    fn drain_deaths(&mut self, events: &mut Vec<SimEvent>) {
        let deaths = std::mem::take(&mut *self.deaths.lock());
        for entity in deaths {
            if let Some(object) = self.model.find_by_entity(&entity) {
                self.model.remove(object.id);
            }
            self.services.health.acknowledge_death(&entity);
            events.push(SimEvent::Died { entity });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    use crate::input::Button;

    const ARENA: &str = r#"
    <scene>
        <catalog>
            <item><id>TestItem-Cube</id></item>
            <item>
                <id>M9</id>
                <kind>firearm</kind>
                <ammo_type>Pistol</ammo_type>
                <clip_size>12</clip_size>
                <fresh_ammo>36</fresh_ammo>
                <holding_ammo>24</holding_ammo>
                <attack_rate>0.25</attack_rate>
                <damage>25</damage>
            </item>
        </catalog>
        <object>
            <name>Player</name>
            <type>actor</type>
            <entity>P1</entity>
            <health>100</health>
            <listener match="tag" value="Item">look_at_item</listener>
        </object>
        <object>
            <name>Cube</name>
            <type>item</type>
            <tag>Item</tag>
            <item>TestItem-Cube</item>
            <position>0 0 -3</position>
        </object>
        <object>
            <name>Pistol</name>
            <type>item</type>
            <tag>Item</tag>
            <item>M9</item>
            <position>-3 0 0</position>
        </object>
        <object>
            <name>Dummy</name>
            <tag>Enemy</tag>
            <entity>D1</entity>
            <health>30</health>
            <position>0 0 3</position>
        </object>
    </scene>
    "#;

    fn arena() -> Simulation {
        Simulation::new(Scene::from_xml(ARENA).unwrap()).unwrap()
    }

    fn gaze_events(report: &TickReport) -> Vec<&GazeEvent> {
        report
            .events
            .iter()
            .filter_map(|event| match event {
                SimEvent::Gaze { event, .. } => Some(event),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn looking_and_interacting_picks_up_the_cube() {
        let mut sim = arena();
        let first = sim.tick();
        assert!(matches!(
            gaze_events(&first)[..],
            [GazeEvent::Enter(HitRecord { name, .. })] if name == "Cube"
        ));
        assert!(sim.tick().events.is_empty());

        assert!(sim.apply_input("P1", &InputAction::Tap(Button::Interact)));
        sim.tick();
        assert!(sim.model().find_by_name("Cube").is_none());
        assert_eq!(
            sim.services().inventory.quantity(Some("P1"), "TestItem-Cube"),
            1
        );

        let after = sim.tick();
        assert!(matches!(gaze_events(&after)[..], [GazeEvent::Exit(_)]));
        assert!(sim.actor("Player").unwrap().gaze_target().is_none());
    }

    #[test]
    fn weapon_pickup_equips_and_shooting_kills() {
        let mut sim = arena();
        sim.apply_input("P1", &InputAction::Look(Vec3::new(0.0, 90.0, 0.0)));
        sim.tick();
        sim.apply_input("P1", &InputAction::Tap(Button::Interact));
        let report = sim.tick();
        assert!(report.events.contains(&SimEvent::Weapon {
            actor: "Player".into(),
            event: WeaponEvent::Equipped("M9".into()),
        }));
        assert_eq!(
            sim.actor("P1").unwrap().weapon().equipped().unwrap().id,
            "M9"
        );

        sim.apply_input("P1", &InputAction::Look(Vec3::new(0.0, 180.0, 0.0)));
        sim.tick();
        assert_eq!(
            sim.actor("P1").unwrap().gaze_target().unwrap().name,
            "Dummy"
        );

        sim.apply_input("P1", &InputAction::Tap(Button::Fire));
        sim.tick();
        assert_eq!(
            sim.services().health.record("D1").unwrap().current_health,
            5.0
        );

        sim.run(20);
        sim.apply_input("P1", &InputAction::Tap(Button::Fire));
        let report = sim.tick();
        assert!(report.events.contains(&SimEvent::Died {
            entity: "D1".into()
        }));
        assert!(sim.model().find_by_entity("D1").is_none());
        assert!(!sim.services().health.contains("D1"));
        assert_eq!(
            sim.services().inventory.quantity(Some("P1"), "M9_Chambered"),
            10
        );
    }

    #[test]
    fn scripted_inputs_apply_on_their_tick() {
        let xml = ARENA.replace(
            "</scene>",
            r#"<input tick="2" actor="P1" tap="Interact"/></scene>"#,
        );
        let mut sim = Simulation::new(Scene::from_xml(&xml).unwrap()).unwrap();
        sim.tick();
        assert!(sim.model().find_by_name("Cube").is_some());
        sim.tick();
        assert!(sim.model().find_by_name("Cube").is_none());
        assert_eq!(sim.current_tick(), 2);
    }

    #[test]
    fn unknown_actor_input_is_dropped() {
        let mut sim = arena();
        assert!(!sim.apply_input("Ghost", &InputAction::Tap(Button::Fire)));
    }

    #[test]
    fn unknown_listener_behaviour_fails_to_load() {
        let xml = ARENA.replace(">look_at_item<", ">dance<");
        let err = Simulation::new(Scene::from_xml(&xml).unwrap()).unwrap_err();
        assert!(format!("{err:#}").contains("Unknown listener behaviour"));
    }
}
