use std::collections::HashSet;

use anyhow::{anyhow, Result};
use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Gameplay buttons an actor can use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Button {
    Interact,
    Fire,
    Aim,
    Reload,
}

impl Button {
    pub fn from_name(name: &str) -> Option<Self> {
        let button = match name {
            "Interact" | "interact" | "Use" => Button::Interact,
            "Fire" | "fire" | "Fire1" => Button::Fire,
            "Aim" | "aim" | "Fire2" => Button::Aim,
            "Reload" | "reload" => Button::Reload,
            _ => return None,
        };
        Some(button)
    }
}

/// Per-actor button snapshot for the current tick.
///
/// `pressed` only holds buttons that went down this tick; `held` holds every
/// button that is currently down.
#[derive(Debug, Clone, Default)]
pub struct ActionState {
    held: HashSet<Button>,
    pressed: HashSet<Button>,
    taps: HashSet<Button>,
}

impl ActionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn press(&mut self, button: Button) {
        if self.held.insert(button) {
            self.pressed.insert(button);
        }
    }

    pub fn release(&mut self, button: Button) {
        self.held.remove(&button);
        self.taps.remove(&button);
    }

    /// Presses `button` for exactly one tick.
    pub fn tap(&mut self, button: Button) {
        self.press(button);
        self.taps.insert(button);
    }

    pub fn is_held(&self, button: Button) -> bool {
        self.held.contains(&button)
    }

    pub fn was_pressed(&self, button: Button) -> bool {
        self.pressed.contains(&button)
    }

    /// Clears per-tick presses and lets go of tapped buttons.
    pub fn end_tick(&mut self) {
        self.pressed.clear();
        for button in self.taps.drain() {
            self.held.remove(&button);
        }
    }

    pub fn apply(&mut self, action: &InputAction) {
        match *action {
            InputAction::Press(button) => self.press(button),
            InputAction::Release(button) => self.release(button),
            InputAction::Tap(button) => self.tap(button),
            InputAction::Look(_) => {}
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum InputAction {
    Press(Button),
    Release(Button),
    Tap(Button),
    /// Sets the actor's rotation, Euler angles in degrees.
    Look(Vec3),
}

impl InputAction {
    /// Parses a button action such as `("tap", "Interact")`.
    pub fn parse(verb: &str, button: &str) -> Result<Self> {
        let parsed =
            Button::from_name(button).ok_or_else(|| anyhow!("Unknown button: {button}"))?;
        match verb {
            "press" => Ok(InputAction::Press(parsed)),
            "release" => Ok(InputAction::Release(parsed)),
            "tap" => Ok(InputAction::Tap(parsed)),
            other => Err(anyhow!("Unknown input action: {other}")),
        }
    }
}

/// Input applied to one actor at the start of a given tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptedInput {
    pub tick: u64,
    pub actor: String,
    pub action: InputAction,
}
