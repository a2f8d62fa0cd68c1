use anyhow::{anyhow, Result};
use roxmltree::Node;
use serde::{Deserialize, Serialize};

use crate::gaze::LayerMask;
use crate::scene::{optional_text, parse_number};

/// Layer that gaze rays skip unless a scene says otherwise.
pub const IGNORE_GAZE_LAYER: u32 = 8;

/// Simulation settings read from a scene's `<settings>` block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimConfig {
    /// Fixed ticks per second.
    pub tick_rate: u32,
    /// Gaze ray length for actors that do not set their own.
    pub ray_length: f32,
    pub ignored_layers: Vec<u32>,
    /// Number of ticks the CLI runs when `--ticks` is absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticks: Option<u64>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            tick_rate: 50,
            ray_length: 5.0,
            ignored_layers: vec![IGNORE_GAZE_LAYER],
            ticks: None,
        }
    }
}

impl SimConfig {
    pub fn from_node(node: &Node<'_, '_>) -> Result<Self> {
        let defaults = Self::default();
        let tick_rate = parse_number(optional_text(node, "tick_rate"), defaults.tick_rate)?;
        if tick_rate == 0 {
            return Err(anyhow!("tick_rate must be positive"));
        }
        let ray_length = parse_number(optional_text(node, "ray_length"), defaults.ray_length)?;
        let ignored_layers = match optional_text(node, "ignored_layers") {
            Some(value) => value
                .split_whitespace()
                .map(|layer| {
                    layer
                        .parse::<u32>()
                        .ok()
                        .filter(|layer| *layer < 32)
                        .ok_or_else(|| anyhow!("invalid layer {layer}"))
                })
                .collect::<Result<Vec<_>>>()?,
            None => defaults.ignored_layers,
        };
        let ticks = optional_text(node, "ticks")
            .map(|value| parse_number(Some(value), 0u64))
            .transpose()?;
        Ok(Self {
            tick_rate,
            ray_length,
            ignored_layers,
            ticks,
        })
    }

    /// Seconds covered by one tick.
    pub fn tick_interval(&self) -> f32 {
        1.0 / self.tick_rate.max(1) as f32
    }

    pub fn layer_mask(&self) -> LayerMask {
        self.ignored_layers
            .iter()
            .fold(LayerMask::ALL, |mask, layer| mask.without(*layer))
    }
}
