//! Damage calculation for raid attacks.
//!
//! Pure functions only: the same loadout, boss stats, parameters and random
//! draw always produce the same [`DamageRoll`].
//!
//! - [`Loadout`]: validated set of 1 to 5 item powers
//! - [`calculate_damage`]: deterministic damage for a known critical flag
//! - [`compute_damage`]: full resolution including the critical roll

pub mod damage;
pub mod loadout;

pub use damage::{DamageRoll, calculate_damage, compute_damage};
pub use loadout::{Loadout, LoadoutError};
