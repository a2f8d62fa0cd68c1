use anyhow::{anyhow, Context, Result};
use glam::{Mat4, Vec3};
use roxmltree::{Document, Node};
use serde::{Deserialize, Serialize};

use crate::catalog::ItemCatalog;
use crate::config::SimConfig;
use crate::input::{InputAction, ScriptedInput};
use crate::subscription::MatchRule;

/// Stable identity of a loaded scene object. Assigned in document order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId(pub u64);

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Runtime representation of a scene: objects, the item catalog, settings
/// and the scripted input timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Scene {
    pub objects: Vec<SceneObject>,
    pub catalog: ItemCatalog,
    pub settings: SimConfig,
    pub script: Vec<ScriptedInput>,
}

impl Scene {
    /// Parses the scene XML produced by the authoring tools.
    pub fn from_xml(xml: &str) -> Result<Self> {
        let document = Document::parse(xml).context("invalid scene XML")?;
        let root = document.root_element();

        let settings = match child(&root, "settings") {
            Some(node) => SimConfig::from_node(&node).context("invalid <settings>")?,
            None => SimConfig::default(),
        };
        let catalog = match child(&root, "catalog") {
            Some(node) => ItemCatalog::from_node(node).context("invalid <catalog>")?,
            None => ItemCatalog::default(),
        };

        let mut objects = Vec::new();
        for (index, node) in root
            .descendants()
            .filter(|n| n.has_tag_name("object"))
            .enumerate()
        {
            let object = parse_object(&node, ObjectId(index as u64 + 1))?;
            objects.push(object);
        }

        let mut script = Vec::new();
        for node in root.children().filter(|n| n.has_tag_name("input")) {
            script.push(parse_input(&node)?);
        }
        script.sort_by_key(|input| input.tick);

        Ok(Self {
            objects,
            catalog,
            settings,
            script,
        })
    }

    pub fn actors(&self) -> impl Iterator<Item = &SceneObject> {
        self.objects.iter().filter(|o| o.object_type == "actor")
    }

    /// Tick of the last scripted input, if any.
    pub fn last_scripted_tick(&self) -> Option<u64> {
        self.script.last().map(|input| input.tick)
    }

    /// Ticks to run when the caller does not say: the configured count, else
    /// one past the last scripted input, never less than one.
    pub fn default_ticks(&self) -> u64 {
        self.settings
            .ticks
            .or_else(|| self.last_scripted_tick().map(|tick| tick.saturating_add(1)))
            .unwrap_or(1)
            .max(1)
    }
}

/// Listener declared on an actor: which behaviour to attach and when it fires.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListenerSpec {
    pub rule: MatchRule,
    pub behaviour: String,
}

/// Scene object as described by the authoring tools.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneObject {
    pub id: ObjectId,
    pub name: String,
    #[serde(rename = "type")]
    pub object_type: String,
    #[serde(default)]
    pub tag: String,
    #[serde(default)]
    pub layer: u32,
    /// Ledger identity for actors and damageable entities.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity: Option<String>,
    /// Catalog id granted when the object is picked up.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ray_length: Option<f32>,
    #[serde(default)]
    pub position: Vec3,
    /// Euler angles in degrees.
    #[serde(default)]
    pub rotation: Vec3,
    #[serde(default = "default_scale")]
    pub scale: Vec3,
    #[serde(default)]
    pub listeners: Vec<ListenerSpec>,
}

impl Default for SceneObject {
    fn default() -> Self {
        Self {
            id: ObjectId(0),
            name: String::new(),
            object_type: String::new(),
            tag: String::new(),
            layer: 0,
            entity: None,
            item: None,
            health: None,
            ray_length: None,
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            scale: default_scale(),
            listeners: Vec::new(),
        }
    }
}

impl SceneObject {
    /// Unit vector the object is facing, `-Z` rotated by its Euler angles.
    pub fn forward(&self) -> Vec3 {
        let rotation = self.rotation;
        let rotation_matrix = Mat4::from_rotation_z(rotation.z.to_radians())
            * Mat4::from_rotation_y(rotation.y.to_radians())
            * Mat4::from_rotation_x(rotation.x.to_radians());
        let forward = (rotation_matrix * Vec3::new(0.0, 0.0, -1.0).extend(0.0)).truncate();
        if forward.length_squared() > f32::EPSILON {
            forward.normalize()
        } else {
            Vec3::NEG_Z
        }
    }

    /// Axis-aligned bounds, `scale` being the full box size.
    pub fn bounds(&self) -> (Vec3, Vec3) {
        let half = self.scale.abs() * 0.5;
        (self.position - half, self.position + half)
    }
}

fn default_scale() -> Vec3 {
    Vec3::ONE
}

fn parse_object(node: &Node<'_, '_>, id: ObjectId) -> Result<SceneObject> {
    let mut object = SceneObject {
        id,
        ..SceneObject::default()
    };
    object.name = required_text(node, "name")?;
    object.object_type = optional_text(node, "type").unwrap_or_else(|| "prop".to_string());
    object.tag = optional_text(node, "tag").unwrap_or_default();
    object.layer = parse_number(optional_text(node, "layer"), object.layer)?;
    object.entity = optional_text(node, "entity");
    object.item = optional_text(node, "item");
    object.health = optional_text(node, "health")
        .map(|value| parse_number(Some(value), 0.0))
        .transpose()?;
    object.ray_length = optional_text(node, "ray_length")
        .map(|value| parse_number(Some(value), 0.0))
        .transpose()?;
    object.position = parse_vec3(optional_text(node, "position"), object.position)?;
    object.rotation = parse_vec3(optional_text(node, "rotation"), object.rotation)?;
    object.scale = parse_vec3(optional_text(node, "scale"), object.scale)?;

    for listener in node.children().filter(|n| n.has_tag_name("listener")) {
        let kind = listener.attribute("match").unwrap_or("tag");
        let value = listener
            .attribute("value")
            .ok_or_else(|| anyhow!("listener on {} is missing a value", object.name))?;
        let behaviour = listener
            .text()
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .ok_or_else(|| anyhow!("listener on {} names no behaviour", object.name))?;
        object.listeners.push(ListenerSpec {
            rule: MatchRule::parse(kind, value)?,
            behaviour: behaviour.to_string(),
        });
    }

    if (object.object_type == "actor" || object.health.is_some()) && object.entity.is_none() {
        object.entity = Some(object.name.clone());
    }
    Ok(object)
}

fn parse_input(node: &Node<'_, '_>) -> Result<ScriptedInput> {
    let tick = node
        .attribute("tick")
        .ok_or_else(|| anyhow!("<input> is missing a tick"))?
        .parse::<u64>()
        .map_err(|err| anyhow!("failed to parse input tick: {err}"))?;
    let actor = node
        .attribute("actor")
        .ok_or_else(|| anyhow!("<input> at tick {tick} is missing an actor"))?
        .to_string();
    let action = ["press", "release", "tap", "look"]
        .into_iter()
        .find_map(|verb| node.attribute(verb).map(|value| (verb, value)))
        .ok_or_else(|| anyhow!("<input> at tick {tick} has no action"))?;
    let action = match action {
        ("look", value) => InputAction::Look(parse_vec3(Some(value.to_string()), Vec3::ZERO)?),
        (verb, value) => InputAction::parse(verb, value)?,
    };
    Ok(ScriptedInput {
        tick,
        actor,
        action,
    })
}

fn child<'a, 'input>(node: &Node<'a, 'input>, tag: &str) -> Option<Node<'a, 'input>> {
    node.children().find(|c| c.has_tag_name(tag))
}

fn required_text(node: &Node<'_, '_>, tag: &str) -> Result<String> {
    optional_text(node, tag).ok_or_else(|| anyhow!("<{tag}> tag is missing"))
}

pub(crate) fn optional_text(node: &Node<'_, '_>, tag: &str) -> Option<String> {
    node.children()
        .find(|child| child.has_tag_name(tag))
        .and_then(|child| child.text())
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(|text| text.to_string())
}

fn parse_vec3(value: Option<String>, default: Vec3) -> Result<Vec3> {
    let Some(value) = value else {
        return Ok(default);
    };
    let mut numbers = value
        .split_whitespace()
        .filter_map(|component| component.parse::<f32>().ok());
    let x = numbers
        .next()
        .ok_or_else(|| anyhow!("vector is missing components"))?;
    let y = numbers
        .next()
        .ok_or_else(|| anyhow!("vector is missing components"))?;
    let z = numbers
        .next()
        .ok_or_else(|| anyhow!("vector is missing components"))?;
    Ok(Vec3::new(x, y, z))
}

pub(crate) fn parse_number<T>(value: Option<String>, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        Some(value) => value
            .parse::<T>()
            .map_err(|err| anyhow!("failed to parse number: {err}")),
        None => Ok(default),
    }
}
