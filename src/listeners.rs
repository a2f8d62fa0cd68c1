//! Built-in gaze behaviours that scenes can attach to actors by name.

use std::sync::Arc;

use anyhow::{anyhow, Result};
use log::{debug, info};
use parking_lot::Mutex;

use crate::gaze::HitRecord;
use crate::input::Button;
use crate::subscription::{FocusContext, GazeListener, GazePayload, ListenerHandle};

/// Picks up the focused item when the actor presses Interact.
#[derive(Debug, Default)]
pub struct LookAtItemListener {
    focused: Option<HitRecord>,
}

impl LookAtItemListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_gaze(&self) -> bool {
        self.focused.is_some()
    }

    /// Grants the focused object's item and removes the object once granted.
    fn pick_up(&self, ctx: &FocusContext<'_>, focused: &HitRecord) -> bool {
        let Some(object) = ctx.model.get(focused.target) else {
            return false;
        };
        let Some(item_id) = object.item.as_deref() else {
            debug!("{} has no item to pick up", object.name);
            return false;
        };
        let inventory = &ctx.services.inventory;
        let is_weapon = inventory
            .catalog()
            .get(item_id)
            .map(|item| item.kind.is_weapon())
            .unwrap_or(false);
        let added = if is_weapon {
            inventory.add_weapon(ctx.owner, item_id, true)
        } else {
            inventory.pick_up(ctx.owner, item_id, 1)
        };
        // The tracker reports the exit on the next tick.
        if added {
            ctx.model.remove(object.id);
        }
        added
    }
}

impl GazeListener for LookAtItemListener {
    fn on_enter(&mut self, payload: &GazePayload) {
        debug!("StartRaycast for Item {}.", payload.hit.name);
        self.focused = Some(payload.hit.clone());
    }

    fn on_exit(&mut self) {
        debug!("EndRaycast for Item.");
        self.focused = None;
    }

    fn on_focus(&mut self, ctx: &FocusContext<'_>) {
        if !ctx.input.was_pressed(Button::Interact) {
            return;
        }
        let Some(focused) = self.focused.clone() else {
            return;
        };
        if self.pick_up(ctx, &focused) {
            self.focused = None;
        }
    }
}

/// Writes gaze transitions to the log.
#[derive(Debug, Default)]
pub struct GazeLogListener {
    current: Option<String>,
}

impl GazeListener for GazeLogListener {
    fn on_enter(&mut self, payload: &GazePayload) {
        info!(
            "{} looks at {} ({}) from {:.2}",
            payload.caster.as_deref().unwrap_or("<anonymous>"),
            payload.hit.name,
            payload.hit.tag,
            payload.hit.distance
        );
        self.current = Some(payload.hit.name.clone());
    }

    fn on_exit(&mut self) {
        if let Some(name) = self.current.take() {
            info!("Gaze left {name}");
        }
    }
}

/// Builds the behaviour registered under `name` in scene files.
pub fn build_listener(name: &str) -> Result<ListenerHandle> {
    let handle: ListenerHandle = match name {
        "look_at_item" => Arc::new(Mutex::new(LookAtItemListener::new())),
        "log" => Arc::new(Mutex::new(GazeLogListener::default())),
        other => return Err(anyhow!("Unknown listener behaviour: {other}")),
    };
    Ok(handle)
}
