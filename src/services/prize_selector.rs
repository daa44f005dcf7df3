//! Weighted prize selection for gacha draws.
//!
//! A draw first picks a rarity tier with probability `weight / 100`, then
//! picks one member of that tier uniformly. Over many draws a prize of tier
//! `T` therefore comes up `weight(T) / 100 / |T|` of the time.
//!
//! All validation happens before the random source is touched, so a rejected
//! catalog never consumes randomness and never yields a partial draw.

use thiserror::Error;

use crate::models::{Catalog, PrizeEntry, RarityTier, TierWeights};
use crate::utils::RandomSource;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    #[error("catalog has no prizes")]
    EmptyCatalog,

    #[error("tier weights must each be within 0..=100 and sum to 100 (got {total})")]
    InvalidWeights { total: i64 },

    #[error("tier {0} has a non-zero weight but no prizes")]
    UnreachableTier(RarityTier),
}

pub fn validate_weights(weights: &TierWeights) -> Result<(), SelectionError> {
    let in_range = RarityTier::ALL
        .iter()
        .all(|&tier| (0..=TierWeights::TOTAL).contains(&weights.get(tier)));
    let total = weights.total();
    if !in_range || total != i64::from(TierWeights::TOTAL) {
        return Err(SelectionError::InvalidWeights { total });
    }
    Ok(())
}

/// Checks that a catalog can be drawn from.
pub fn validate_catalog(catalog: &Catalog) -> Result<(), SelectionError> {
    if catalog.prizes.is_empty() {
        return Err(SelectionError::EmptyCatalog);
    }
    validate_weights(&catalog.tier_weights)?;
    for tier in RarityTier::ALL {
        if catalog.tier_weights.get(tier) > 0 && catalog.population(tier) == 0 {
            return Err(SelectionError::UnreachableTier(tier));
        }
    }
    Ok(())
}

/// Draws one prize from `catalog`.
pub fn select_prize<R>(catalog: &Catalog, rng: &mut R) -> Result<PrizeEntry, SelectionError>
where
    R: RandomSource + ?Sized,
{
    validate_catalog(catalog)?;

    let roll = rng.next_below(TierWeights::TOTAL as u32) as i32;
    let tier = tier_for_roll(&catalog.tier_weights, roll);

    let members = catalog.members(tier);
    // validate_catalog guarantees the rolled tier has members
    let index = rng.next_below(members.len() as u32) as usize;
    Ok(members[index].clone())
}

/// Tier whose cumulative range in canonical order contains `roll`.
fn tier_for_roll(weights: &TierWeights, roll: i32) -> RarityTier {
    let mut upper = 0;
    for tier in RarityTier::ALL {
        upper += weights.get(tier);
        if roll < upper {
            return tier;
        }
    }
    // Unreachable for weights summing to 100 and roll < 100
    RarityTier::Legendary
}
