//! Loot System: таблицы дропа и генерация
//!
//! # Архитектура
//!
//! **LootTable**: named ordered list of `LootEntry` (immutable, replaced only
//! by re-registration). A "Default" table is always seeded.
//!
//! **GenerateLoot**: every entry is an independent Bernoulli roll with
//! `drop_chance × global_drop_multiplier`; a dropped entry gets a quantity
//! drawn from `[min_qty, max_qty]`. One `LootGenerated` signal per call.
//!
//! **DropHistory**: bounded FIFO of human-readable records (oldest evicted).

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

use crate::config::LootConfig;
use crate::error::LootError;
use crate::events::LootGenerated;
use crate::logger;
use crate::manager::CoreSystem;
use crate::signal::Signal;
use crate::DeterministicRng;

pub const DEFAULT_TABLE: &str = "Default";

// ============================================================================
// Rarity
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Reflect, Serialize, Deserialize)]
pub enum Rarity {
    #[default]
    Common,
    Uncommon,
    Rare,
    Epic,
}

impl Rarity {
    /// Base drop rate suggested for entries of this rarity.
    pub fn base_drop_rate(self) -> f32 {
        match self {
            Rarity::Common => 0.7,
            Rarity::Uncommon => 0.2,
            Rarity::Rare => 0.08,
            Rarity::Epic => 0.02,
        }
    }
}

// ============================================================================
// LootEntry / LootDrop
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LootEntry {
    pub name: String,
    pub id: u32,
    /// Probability in [0, 1]
    pub drop_chance: f32,
    pub min_qty: u32,
    pub max_qty: u32,
    pub rarity: Rarity,
}

impl Default for LootEntry {
    fn default() -> Self {
        Self {
            name: String::new(),
            id: 0,
            drop_chance: 0.1,
            min_qty: 1,
            max_qty: 1,
            rarity: Rarity::Common,
        }
    }
}

impl LootEntry {
    pub fn new(name: impl Into<String>, id: u32, drop_chance: f32) -> Self {
        Self {
            name: name.into(),
            id,
            drop_chance,
            ..Default::default()
        }
    }

    /// Entry whose chance is the rarity's base drop rate.
    pub fn with_rarity_rate(name: impl Into<String>, id: u32, rarity: Rarity) -> Self {
        Self {
            rarity,
            ..Self::new(name, id, rarity.base_drop_rate())
        }
    }

    pub fn quantity(mut self, min_qty: u32, max_qty: u32) -> Self {
        self.min_qty = min_qty;
        self.max_qty = max_qty;
        self
    }

    pub fn rarity(mut self, rarity: Rarity) -> Self {
        self.rarity = rarity;
        self
    }

    pub(crate) fn check(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.drop_chance) {
            return Err(format!("drop_chance {} is outside [0, 1]", self.drop_chance));
        }
        if self.min_qty > self.max_qty {
            return Err(format!("min_qty {} exceeds max_qty {}", self.min_qty, self.max_qty));
        }
        Ok(())
    }
}

/// A dropped entry with its rolled quantity.
#[derive(Debug, Clone, PartialEq, Reflect)]
pub struct LootDrop {
    pub name: String,
    pub id: u32,
    pub rarity: Rarity,
    pub quantity: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LootTable {
    pub name: String,
    pub entries: Vec<LootEntry>,
}

// ============================================================================
// DropHistory
// ============================================================================

#[derive(Debug, Clone)]
pub struct DropHistory {
    records: VecDeque<String>,
    capacity: usize,
}

impl DropHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            records: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, record: String) {
        if self.records.len() == self.capacity {
            self.records.pop_front();
        }
        self.records.push_back(record);
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}

// ============================================================================
// LootResolver
// ============================================================================

pub struct LootResolver {
    tables: HashMap<String, LootTable>,
    global_drop_multiplier: f32,
    history: DropHistory,
    total_drops: u64,
    debug_logging: bool,
    pub on_loot_generated: Signal<LootGenerated>,
}

impl Default for LootResolver {
    fn default() -> Self {
        Self::new(&LootConfig::default())
    }
}

impl LootResolver {
    pub fn new(config: &LootConfig) -> Self {
        let mut resolver = Self {
            tables: HashMap::new(),
            global_drop_multiplier: config.global_drop_multiplier.max(0.0),
            history: DropHistory::new(config.history_capacity),
            total_drops: 0,
            debug_logging: config.debug_logging,
            on_loot_generated: Signal::new(),
        };

        resolver.tables.insert(DEFAULT_TABLE.to_string(), default_table());
        for (name, entries) in &config.loot_tables_sorted() {
            if let Err(err) = resolver.register_table(name, entries.to_vec()) {
                logger::log_warning(&format!("LootSystem: skipping table '{}': {}", name, err));
            }
        }

        logger::log(&format!(
            "LootSystem initialized with {} loot tables",
            resolver.tables.len()
        ));
        resolver
    }

    /// Registers (or replaces) a named table.
    pub fn register_table(&mut self, name: &str, entries: Vec<LootEntry>) -> Result<(), LootError> {
        if name.is_empty() {
            return Err(LootError::EmptyTableName);
        }
        if entries.is_empty() {
            return Err(LootError::EmptyTable(name.to_string()));
        }
        for entry in &entries {
            entry.check().map_err(|reason| LootError::InvalidEntry {
                name: entry.name.clone(),
                reason,
            })?;
        }

        if self.debug_logging {
            logger::log(&format!("Added loot table '{}' with {} items", name, entries.len()));
        }
        self.tables.insert(
            name.to_string(),
            LootTable {
                name: name.to_string(),
                entries,
            },
        );
        Ok(())
    }

    pub fn add_loot_table(&mut self, name: &str, entries: Vec<LootEntry>) -> bool {
        match self.register_table(name, entries) {
            Ok(()) => true,
            Err(err) => {
                logger::log_warning(&format!("AddLootTable rejected: {}", err));
                false
            }
        }
    }

    pub fn table(&self, name: &str) -> Option<&LootTable> {
        self.tables.get(name)
    }

    pub fn table_count(&self) -> usize {
        self.tables.len()
    }

    /// Boolean-style contract: empty on any failure.
    pub fn generate_loot(
        &mut self,
        source: Entity,
        table_name: &str,
        location: Vec3,
        rng: &mut DeterministicRng,
    ) -> Vec<LootDrop> {
        match self.try_generate_loot(source, table_name, location, rng) {
            Ok(items) => items,
            Err(err) => {
                logger::log_error(&format!("GenerateLoot: {}", err));
                Vec::new()
            }
        }
    }

    pub fn try_generate_loot(
        &mut self,
        source: Entity,
        table_name: &str,
        location: Vec3,
        rng: &mut DeterministicRng,
    ) -> Result<Vec<LootDrop>, LootError> {
        if source == Entity::PLACEHOLDER {
            return Err(LootError::InvalidSource);
        }

        let table = match self.tables.get(table_name) {
            Some(table) => table,
            None => {
                if self.debug_logging {
                    logger::log_warning(&format!(
                        "Loot table not found: {}, using {}",
                        table_name, DEFAULT_TABLE
                    ));
                }
                self.tables
                    .get(DEFAULT_TABLE)
                    .ok_or_else(|| LootError::NoTable(table_name.to_string()))?
            }
        };

        let mut dropped = Vec::new();
        for entry in &table.entries {
            let chance = entry.drop_chance * self.global_drop_multiplier;
            if !rng.roll_chance(chance) {
                continue;
            }
            dropped.push(LootDrop {
                name: entry.name.clone(),
                id: entry.id,
                rarity: entry.rarity,
                quantity: rng.range_inclusive(entry.min_qty, entry.max_qty),
            });
        }

        for item in &dropped {
            let record = format!("{} x{} from {:?}", item.name, item.quantity, source);
            if self.debug_logging {
                logger::log(&format!("Loot generated: {}", record));
            }
            self.history.push(record);
            self.total_drops += 1;
        }

        if !dropped.is_empty() {
            self.on_loot_generated.emit(&LootGenerated {
                source,
                items: dropped.clone(),
                location,
            });
        }

        Ok(dropped)
    }

    pub fn global_drop_multiplier(&self) -> f32 {
        self.global_drop_multiplier
    }

    pub fn set_global_drop_multiplier(&mut self, multiplier: f32) {
        self.global_drop_multiplier = multiplier.max(0.0);
    }

    pub fn history(&self) -> &DropHistory {
        &self.history
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    pub fn total_drops(&self) -> u64 {
        self.total_drops
    }

    pub fn enable_journal(&mut self) {
        self.on_loot_generated.enable_journal();
    }
}

impl CoreSystem for LootResolver {
    fn name(&self) -> &'static str {
        "LootSystem"
    }

    fn reset(&mut self) {
        self.total_drops = 0;
        self.history.clear();
        logger::log("LootSystem reset");
    }

    fn status(&self) -> String {
        format!(
            "{}: {} tables, {} drops, {} history records",
            self.name(),
            self.tables.len(),
            self.total_drops,
            self.history.len()
        )
    }
}

fn default_table() -> LootTable {
    LootTable {
        name: DEFAULT_TABLE.to_string(),
        entries: vec![
            LootEntry::new("Common Drop", 1, 0.5).rarity(Rarity::Common),
            LootEntry::new("Rare Drop", 2, 0.1).rarity(Rarity::Rare),
        ],
    }
}

impl LootConfig {
    /// Таблицы в стабильном порядке (HashMap порядок не детерминирован)
    fn loot_tables_sorted(&self) -> Vec<(String, Vec<LootEntry>)> {
        let mut tables: Vec<_> = self
            .tables
            .iter()
            .map(|(name, entries)| (name.clone(), entries.clone()))
            .collect();
        tables.sort_by(|a, b| a.0.cmp(&b.0));
        tables
    }
}
