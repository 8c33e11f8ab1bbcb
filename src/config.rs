// Game configuration - rarity tiers and pack prices.
//
// Loaded once at process start (built-in defaults or a TOML file) and
// treated as immutable afterwards. There is deliberately no runtime
// mutation path.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{GameError, GameResult};

/// A weighted bucket of candidate cooks sharing a sell value and icon.
///
/// Weights are probability mass, not percentages: the configured values do
/// not have to sum to 100 (the default table sums to ~31.3). The draw
/// divides by the actual total.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RarityTier {
    /// Tier label, e.g. "Michelin".
    pub label: String,
    /// Drop weight (positive, unnormalized).
    pub weight: f64,
    /// Candidate cook names drawn uniformly within the tier.
    pub cooks: Vec<String>,
    /// Fixed sell value for every cook of this tier.
    pub sell_value: i64,
    /// Display glyph.
    pub icon: String,
}

impl RarityTier {
    /// Draws a cook name uniformly from this tier's candidates.
    ///
    /// Callers must have validated the config; an empty candidate list is a
    /// `ConfigError` there, so indexing here is safe.
    pub fn draw_cook<R: Rng + ?Sized>(&self, rng: &mut R) -> &str {
        let index = rng.gen_range(0..self.cooks.len());
        &self.cooks[index]
    }
}

/// Pack SKUs and their prices. One SKU today.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackPrices {
    /// The "OG" pack.
    pub og: i64,
}

/// Static game configuration: the rarity table plus pack prices.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameConfig {
    /// Rarity tiers, rarest first (draw order follows this list).
    pub rarities: Vec<RarityTier>,
    /// Pack prices.
    pub packs: PackPrices,
}

impl Default for GameConfig {
    fn default() -> Self {
        fn tier(label: &str, weight: f64, cooks: &[&str], sell_value: i64, icon: &str) -> RarityTier {
            RarityTier {
                label: label.to_string(),
                weight,
                cooks: cooks.iter().map(|c| c.to_string()).collect(),
                sell_value,
                icon: icon.to_string(),
            }
        }

        GameConfig {
            rarities: vec![
                tier("Secret", 0.0003, &["OG party"], 50000, "👑"),
                tier("Michelin", 0.00475, &["GoogleChroma", "Valens"], 1000, "⭐"),
                tier("Exotic", 0.04, &["Splash88", "SigmaQian"], 300, "🌟"),
                tier("5-star", 0.31, &["Katie"], 200, "🔥"),
                tier("Epic", 2.3, &["placeholder1", "placeholder2"], 75, "✨"),
                tier("Rare", 10.0, &["blabla", "placeholder3"], 20, "🍳"),
                tier(
                    "Uncommon",
                    18.75,
                    &["kittenlove1311", "RoadToS", "placeholder3", "Turtlekid2022"],
                    5,
                    "👨‍🍳",
                ),
            ],
            packs: PackPrices { og: 25 },
        }
    }
}

impl GameConfig {
    /// Loads configuration from a TOML file.
    pub fn load(path: &Path) -> GameResult<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| GameError::ConfigError(format!("cannot read {}: {e}", path.display())))?;
        Self::from_toml_str(&raw)
    }

    /// Parses configuration from a TOML string and validates it.
    pub fn from_toml_str(raw: &str) -> GameResult<Self> {
        let config: GameConfig =
            toml::from_str(raw).map_err(|e| GameError::ConfigError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the rarity table is usable for drawing.
    ///
    /// Rejects an empty table, non-positive tier weights, a non-positive
    /// total weight, and tiers with no candidate cooks.
    pub fn validate(&self) -> GameResult<()> {
        if self.rarities.is_empty() {
            return Err(GameError::ConfigError("rarity table is empty".to_string()));
        }
        for tier in &self.rarities {
            if tier.weight <= 0.0 || !tier.weight.is_finite() {
                return Err(GameError::ConfigError(format!(
                    "tier {} has non-positive weight {}",
                    tier.label, tier.weight
                )));
            }
            if tier.cooks.is_empty() {
                return Err(GameError::ConfigError(format!(
                    "tier {} has no candidate cooks",
                    tier.label
                )));
            }
        }
        if self.total_weight() <= 0.0 {
            return Err(GameError::ConfigError(
                "total rarity weight must be positive".to_string(),
            ));
        }
        if self.packs.og <= 0 {
            return Err(GameError::ConfigError(
                "pack price must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Sum of all tier weights.
    pub fn total_weight(&self) -> f64 {
        self.rarities.iter().map(|t| t.weight).sum()
    }

    /// Price of a pack SKU, or None for an unknown SKU.
    pub fn pack_price(&self, pack_id: &str) -> Option<i64> {
        match pack_id {
            "og" => Some(self.packs.og),
            _ => None,
        }
    }

    /// Draws a rarity tier by weight.
    ///
    /// Walks tiers accumulating weight and selects the first tier whose
    /// cumulative sum reaches the roll. If floating-point rounding leaves
    /// no tier selected, the last tier is the defined fallback.
    ///
    /// Callers must have validated the config, same as `draw_cook`.
    pub fn draw_tier<R: Rng + ?Sized>(&self, rng: &mut R) -> &RarityTier {
        let roll = rng.gen_range(0.0..self.total_weight());
        let mut cumulative = 0.0;
        for tier in &self.rarities {
            cumulative += tier.weight;
            if roll <= cumulative {
                return tier;
            }
        }

        // Float edge case: fall back to the last tier rather than erroring.
        self.rarities.last().expect("validated non-empty table")
    }
}
