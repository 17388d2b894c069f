//! Attack loadouts and their validation.

use arrayvec::ArrayVec;

use crate::error::{ErrorSeverity, RaidError};
use crate::items::{ItemCatalog, ItemDefinition, ItemId};

const MAX_LOADOUT_ITEMS: usize = 5;

/// Errors raised while assembling a loadout from a caller's item selection.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum LoadoutError {
    #[error("loadout must contain at least one item")]
    Empty,

    #[error("loadout has {count} items, at most {max} allowed")]
    TooManyItems { count: usize, max: usize },

    #[error("item {0} appears more than once in the loadout")]
    DuplicateItem(ItemId),

    #[error("unknown item {0}")]
    UnknownItem(ItemId),

    #[error("loadout has no attack power")]
    ZeroPower,
}

impl RaidError for LoadoutError {
    fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::Validation
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::Empty => "LOADOUT_EMPTY",
            Self::TooManyItems { .. } => "LOADOUT_TOO_MANY_ITEMS",
            Self::DuplicateItem(_) => "LOADOUT_DUPLICATE_ITEM",
            Self::UnknownItem(_) => "LOADOUT_UNKNOWN_ITEM",
            Self::ZeroPower => "LOADOUT_ZERO_POWER",
        }
    }
}

/// Validated, ordered set of item powers used for one attack.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Loadout {
    items: ArrayVec<ItemId, MAX_LOADOUT_ITEMS>,
    powers: ArrayVec<u32, MAX_LOADOUT_ITEMS>,
}

impl Loadout {
    /// Maximum number of items per attack.
    pub const MAX_ITEMS: usize = MAX_LOADOUT_ITEMS;

    /// Builds a loadout from already-resolved item definitions.
    pub fn from_items(items: &[ItemDefinition]) -> Result<Self, LoadoutError> {
        if items.is_empty() {
            return Err(LoadoutError::Empty);
        }
        if items.len() > Self::MAX_ITEMS {
            return Err(LoadoutError::TooManyItems {
                count: items.len(),
                max: Self::MAX_ITEMS,
            });
        }

        let mut loadout = Self {
            items: ArrayVec::new(),
            powers: ArrayVec::new(),
        };
        for item in items {
            if loadout.items.contains(&item.id) {
                return Err(LoadoutError::DuplicateItem(item.id.clone()));
            }
            loadout.items.push(item.id.clone());
            loadout.powers.push(item.base_power());
        }

        if loadout.total_power() == 0 {
            return Err(LoadoutError::ZeroPower);
        }
        Ok(loadout)
    }

    /// Resolves item ids through `catalog` and validates the result.
    ///
    /// Size is checked before lookups so oversized requests never touch the
    /// catalog.
    pub fn resolve(
        ids: &[ItemId],
        catalog: &(impl ItemCatalog + ?Sized),
    ) -> Result<Self, LoadoutError> {
        if ids.is_empty() {
            return Err(LoadoutError::Empty);
        }
        if ids.len() > Self::MAX_ITEMS {
            return Err(LoadoutError::TooManyItems {
                count: ids.len(),
                max: Self::MAX_ITEMS,
            });
        }

        let items = ids
            .iter()
            .map(|id| {
                catalog
                    .item(id)
                    .ok_or_else(|| LoadoutError::UnknownItem(id.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Self::from_items(&items)
    }

    pub fn item_ids(&self) -> &[ItemId] {
        &self.items
    }

    pub fn powers(&self) -> &[u32] {
        &self.powers
    }

    pub fn len(&self) -> usize {
        self.powers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.powers.is_empty()
    }

    pub fn total_power(&self) -> u64 {
        self.powers.iter().map(|&p| p as u64).sum()
    }
}
