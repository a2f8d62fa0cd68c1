//! Gaze listener registration and dispatch.
//!
//! Listeners subscribe with a [`MatchRule`]. When a tracker reports a new
//! target the registry snapshots its registrations, delivers `on_enter` to
//! every match and hands back a [`GazeSession`]. Ending the session is the
//! only way to deliver `on_exit`, and it goes to exactly the listeners that
//! saw the enter.

use std::sync::Arc;

use anyhow::{anyhow, Result};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use crate::data_model::DataModel;
use crate::gaze::HitRecord;
use crate::input::ActionState;
use crate::scene::ObjectId;
use crate::services::Services;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchRule {
    Tag(String),
    Name(String),
}

impl MatchRule {
    pub fn parse(kind: &str, value: &str) -> Result<Self> {
        match kind {
            "tag" | "Tag" => Ok(MatchRule::Tag(value.to_string())),
            "name" | "Name" => Ok(MatchRule::Name(value.to_string())),
            other => Err(anyhow!("Unknown match kind: {other}. Expected tag or name")),
        }
    }

    pub fn matches(&self, hit: &HitRecord) -> bool {
        match self {
            MatchRule::Tag(tag) => *tag == hit.tag,
            MatchRule::Name(name) => *name == hit.name,
        }
    }

    fn is_tag(&self) -> bool {
        matches!(self, MatchRule::Tag(_))
    }
}

/// What a listener learns when it gains the gaze.
#[derive(Debug, Clone, PartialEq)]
pub struct GazePayload {
    /// Entity id of the actor doing the looking.
    pub caster: Option<String>,
    pub hit: HitRecord,
}

/// Per-tick context handed to listeners that currently hold the gaze.
pub struct FocusContext<'a> {
    pub owner: Option<&'a str>,
    pub input: &'a ActionState,
    pub model: &'a DataModel,
    pub services: &'a Services,
    pub focused: &'a HitRecord,
}

pub trait GazeListener: Send {
    fn on_enter(&mut self, payload: &GazePayload);

    fn on_exit(&mut self);

    /// Runs every tick while this listener holds the gaze, enter tick included.
    fn on_focus(&mut self, _ctx: &FocusContext<'_>) {}
}

pub type ListenerHandle = Arc<Mutex<dyn GazeListener>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

#[derive(Clone)]
struct Registration {
    id: ListenerId,
    rule: MatchRule,
    listener: ListenerHandle,
}

#[derive(Default)]
struct RegistryState {
    next_id: u64,
    entries: Vec<Registration>,
}

/// Shared set of gaze listeners. Clones refer to the same set.
#[derive(Clone, Default)]
pub struct SubscriptionRegistry {
    state: Arc<RwLock<RegistryState>>,
}

impl std::fmt::Debug for SubscriptionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionRegistry")
            .field("listeners", &self.len())
            .finish()
    }
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<L>(&self, rule: MatchRule, listener: L) -> ListenerId
    where
        L: GazeListener + 'static,
    {
        self.register_handle(rule, Arc::new(Mutex::new(listener)))
    }

    pub fn register_handle(&self, rule: MatchRule, listener: ListenerHandle) -> ListenerId {
        let mut state = self.state.write();
        state.next_id += 1;
        let id = ListenerId(state.next_id);
        state.entries.push(Registration { id, rule, listener });
        id
    }

    /// Removes a listener. An engaged session still delivers its exit.
    pub fn unregister(&self, id: ListenerId) -> bool {
        let mut state = self.state.write();
        let before = state.entries.len();
        state.entries.retain(|entry| entry.id != id);
        state.entries.len() != before
    }

    pub fn len(&self) -> usize {
        self.state.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Delivers `on_enter` to matching listeners, tag rules before name rules,
    /// each group in registration order.
    pub fn enter(&self, payload: &GazePayload) -> GazeSession {
        let snapshot: Vec<Registration> = self.state.read().entries.clone();
        let (tagged, named): (Vec<_>, Vec<_>) =
            snapshot.into_iter().partition(|entry| entry.rule.is_tag());

        let mut engaged = Vec::new();
        for entry in tagged.into_iter().chain(named) {
            if entry.rule.matches(&payload.hit) {
                entry.listener.lock().on_enter(payload);
                engaged.push((entry.id, entry.listener));
            }
        }
        GazeSession {
            target: payload.hit.target,
            engaged,
        }
    }
}

/// Listeners holding the gaze on one target.
///
/// Consumed by [`GazeSession::end`], so no listener can see two exits for
/// one enter.
#[must_use = "dropping a session skips the exit notifications"]
pub struct GazeSession {
    target: ObjectId,
    engaged: Vec<(ListenerId, ListenerHandle)>,
}

impl std::fmt::Debug for GazeSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GazeSession")
            .field("target", &self.target)
            .field("engaged", &self.listener_ids())
            .finish()
    }
}

impl GazeSession {
    pub fn target(&self) -> ObjectId {
        self.target
    }

    pub fn listener_ids(&self) -> Vec<ListenerId> {
        self.engaged.iter().map(|(id, _)| *id).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.engaged.is_empty()
    }

    /// Lets every engaged listener react to the current tick.
    pub fn focus(&self, ctx: &FocusContext<'_>) {
        for (_, listener) in &self.engaged {
            listener.lock().on_focus(ctx);
        }
    }

    /// Delivers `on_exit` to the listeners that received the enter.
    pub fn end(self) {
        for (_, listener) in self.engaged {
            listener.lock().on_exit();
        }
    }
}
