use std::collections::HashMap;

use anyhow::{anyhow, Context, Result};
use roxmltree::{Document, Node};
use serde::{Deserialize, Serialize};

/// Suffix of the inventory slot holding loose rounds of an ammo type.
pub const RESERVES: &str = "Reserves";
/// Suffix of the inventory slot holding rounds loaded in a specific weapon.
pub const CHAMBERED: &str = "Chambered";

/// Inventory slot id for the reserve ammo of `ammo_type`.
pub fn reserves_slot(ammo_type: &str) -> String {
    format!("{ammo_type}_{RESERVES}")
}

/// Inventory slot id for the rounds chambered in `weapon_id`.
pub fn chambered_slot(weapon_id: &str) -> String {
    format!("{weapon_id}_{CHAMBERED}")
}

/// Static combat values shared by every weapon.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeaponSpec {
    /// Seconds between two attacks.
    pub attack_rate: f32,
    pub damage: f64,
}

impl Default for WeaponSpec {
    fn default() -> Self {
        Self {
            attack_rate: 1.0,
            damage: 10.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FirearmSpec {
    pub weapon: WeaponSpec,
    pub ammo_type: String,
    pub clip_size: u32,
    /// Rounds granted when the firearm is picked up for the first time.
    pub fresh_ammo: u32,
    /// Rounds granted when the firearm is picked up while already held.
    pub holding_ammo: u32,
    #[serde(default)]
    pub automatic: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ItemKind {
    Plain,
    Weapon(WeaponSpec),
    Firearm(FirearmSpec),
}

impl ItemKind {
    pub fn is_weapon(&self) -> bool {
        !matches!(self, ItemKind::Plain)
    }

    pub fn weapon_spec(&self) -> Option<&WeaponSpec> {
        match self {
            ItemKind::Plain => None,
            ItemKind::Weapon(spec) => Some(spec),
            ItemKind::Firearm(firearm) => Some(&firearm.weapon),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemDef {
    pub id: String,
    pub kind: ItemKind,
}

impl ItemDef {
    pub fn plain(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: ItemKind::Plain,
        }
    }

    pub fn firearm(id: impl Into<String>, spec: FirearmSpec) -> Self {
        Self {
            id: id.into(),
            kind: ItemKind::Firearm(spec),
        }
    }
}

/// Read-only lookup from item id to its static definition.
///
/// The catalog is filled by content loading before any ledger uses it and is
/// never mutated by the ledgers themselves.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemCatalog {
    items: HashMap<String, ItemDef>,
}

impl ItemCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_items(items: impl IntoIterator<Item = ItemDef>) -> Self {
        Self {
            items: items
                .into_iter()
                .map(|item| (item.id.clone(), item))
                .collect(),
        }
    }

    /// Parses a standalone `<catalog>` document.
    pub fn from_xml(xml: &str) -> Result<Self> {
        let document = Document::parse(xml).context("invalid catalog XML")?;
        Self::from_node(document.root_element())
    }

    /// Reads every `<item>` below `node`.
    pub fn from_node(node: Node<'_, '_>) -> Result<Self> {
        let mut items = Vec::new();
        for item in node.descendants().filter(|n| n.has_tag_name("item")) {
            items.push(parse_item(&item)?);
        }
        Ok(Self::from_items(items))
    }

    pub fn get(&self, item_id: &str) -> Option<&ItemDef> {
        self.items.get(item_id)
    }

    pub fn contains(&self, item_id: &str) -> bool {
        self.items.contains_key(item_id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// True when `slot` is the reserves or chambered slot of a catalogued firearm.
    pub fn is_ammo_slot(&self, slot: &str) -> bool {
        self.items.values().any(|item| match &item.kind {
            ItemKind::Firearm(spec) => {
                slot == reserves_slot(&spec.ammo_type) || slot == chambered_slot(&item.id)
            }
            _ => false,
        })
    }
}

fn parse_item(node: &Node<'_, '_>) -> Result<ItemDef> {
    let id = text(node, "id").ok_or_else(|| anyhow!("<item> is missing <id>"))?;
    let kind = text(node, "kind").unwrap_or_else(|| "plain".to_string());
    let weapon = || -> Result<WeaponSpec> {
        let defaults = WeaponSpec::default();
        Ok(WeaponSpec {
            attack_rate: number(node, "attack_rate")?.unwrap_or(defaults.attack_rate),
            damage: number(node, "damage")?.unwrap_or(defaults.damage),
        })
    };
    let kind = match kind.as_str() {
        "plain" => ItemKind::Plain,
        "weapon" => ItemKind::Weapon(weapon()?),
        "firearm" => ItemKind::Firearm(FirearmSpec {
            weapon: weapon()?,
            ammo_type: text(node, "ammo_type")
                .ok_or_else(|| anyhow!("firearm {id} is missing <ammo_type>"))?,
            clip_size: number(node, "clip_size")?.unwrap_or(0),
            fresh_ammo: number(node, "fresh_ammo")?.unwrap_or(0),
            holding_ammo: number(node, "holding_ammo")?.unwrap_or(0),
            automatic: text(node, "automatic").is_some_and(|value| value == "true"),
        }),
        other => return Err(anyhow!("item {id} has unknown kind {other}")),
    };
    Ok(ItemDef { id, kind })
}

fn text(node: &Node<'_, '_>, tag: &str) -> Option<String> {
    node.children()
        .find(|child| child.has_tag_name(tag))
        .and_then(|child| child.text())
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}

fn number<T>(node: &Node<'_, '_>, tag: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    text(node, tag)
        .map(|value| {
            value
                .parse::<T>()
                .map_err(|err| anyhow!("failed to parse <{tag}>: {err}"))
        })
        .transpose()
}
