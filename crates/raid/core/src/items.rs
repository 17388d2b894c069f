//! Attack items and the read-only catalog used to resolve them.

use std::collections::HashMap;

use crate::config::CombatParams;

/// Identifier of an item an attacker can bring into a raid.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ItemId(pub String);

impl ItemId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for ItemId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ItemId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<String> for ItemId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Combat stats carried by an item.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ItemStats {
    pub attack: u32,
    pub speed: u32,
}

/// Static definition of an item.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ItemDefinition {
    pub id: ItemId,
    pub stats: Option<ItemStats>,
}

impl ItemDefinition {
    pub fn new(id: impl Into<ItemId>, stats: Option<ItemStats>) -> Self {
        Self {
            id: id.into(),
            stats,
        }
    }

    /// Base power contributed to a loadout: `attack + speed / 2`, or
    /// [`CombatParams::DEFAULT_ITEM_POWER`] for items without stats.
    pub fn base_power(&self) -> u32 {
        match self.stats {
            Some(stats) => stats.attack.saturating_add(stats.speed / 2),
            None => CombatParams::DEFAULT_ITEM_POWER,
        }
    }
}

/// Read-only item lookup.
pub trait ItemCatalog: Send + Sync {
    fn item(&self, id: &ItemId) -> Option<ItemDefinition>;
}

/// Catalog backed by a fixed map of definitions.
#[derive(Clone, Debug, Default)]
pub struct StaticItemCatalog {
    items: HashMap<ItemId, ItemDefinition>,
}

impl StaticItemCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_item(mut self, item: ItemDefinition) -> Self {
        self.insert(item);
        self
    }

    pub fn insert(&mut self, item: ItemDefinition) {
        self.items.insert(item.id.clone(), item);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl FromIterator<ItemDefinition> for StaticItemCatalog {
    fn from_iter<T: IntoIterator<Item = ItemDefinition>>(iter: T) -> Self {
        let mut catalog = Self::new();
        for item in iter {
            catalog.insert(item);
        }
        catalog
    }
}

impl ItemCatalog for StaticItemCatalog {
    fn item(&self, id: &ItemId) -> Option<ItemDefinition> {
        self.items.get(id).cloned()
    }
}
