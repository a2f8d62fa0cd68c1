//! Headless gameplay core for first-person games.
//!
//! The crate tracks what each actor is looking at, dispatches gaze
//! enter/exit notifications to subscribed listeners and keeps the shared
//! health and inventory ledgers those listeners act on. Scenes, items and
//! scripted input are loaded from XML so whole play sessions can run and be
//! tested without an engine. Rendering, physics and platform integration stay
//! outside of the crate; hosts plug in through [`gaze::RayHost`] and
//! [`inventory::EquipHook`].

pub mod catalog;
pub mod config;
pub mod data_model;
pub mod error;
pub mod gaze;
pub mod health;
pub mod input;
pub mod inventory;
pub mod listeners;
pub mod scene;
pub mod services;
pub mod sim;
pub mod subscription;
pub mod weapon;

pub use catalog::{FirearmSpec, ItemCatalog, ItemDef, ItemKind, WeaponSpec};
pub use config::SimConfig;
pub use data_model::DataModel;
pub use error::{CastError, CoreError, LedgerError};
pub use gaze::{GazeEvent, GazeTracker, GazeUpdate, HitRecord, LayerMask, Ray, RayHost};
pub use health::{HealthLedger, HealthRecord};
pub use input::{ActionState, Button, InputAction, ScriptedInput};
pub use inventory::{EquipHook, InventoryEntry, InventoryLedger};
pub use listeners::{build_listener, GazeLogListener, LookAtItemListener};
pub use scene::{ObjectId, Scene, SceneObject};
pub use services::Services;
pub use sim::{Actor, SimEvent, Simulation, TickReport};
pub use subscription::{
    FocusContext, GazeListener, GazePayload, GazeSession, ListenerHandle, ListenerId, MatchRule,
    SubscriptionRegistry,
};
pub use weapon::{WeaponEvent, WeaponHandler};
