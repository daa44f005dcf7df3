//! Price suggestions for gacha machines, derived from tier weights.

use crate::models::{PricingResponse, PricingSuggestion, RarityTier, TierWeights};

/// Reference price of a common prize, in the smallest currency unit.
pub const BASE_PRICE: i64 = 500;

/// Margin applied on top of the expected prize value, in percent.
pub const PROFIT_MARGIN_PERCENT: i64 = 30;

// (min, recommended, max) as tenths of BASE_PRICE
fn multipliers(tier: RarityTier) -> (i64, i64, i64) {
    match tier {
        RarityTier::Common => (5, 10, 20),
        RarityTier::Rare => (15, 30, 50),
        RarityTier::Epic => (40, 80, 150),
        RarityTier::Legendary => (100, 200, 500),
    }
}

pub fn suggestion(tier: RarityTier) -> PricingSuggestion {
    let (min, recommended, max) = multipliers(tier);
    PricingSuggestion {
        min: BASE_PRICE * min / 10,
        recommended: BASE_PRICE * recommended / 10,
        max: BASE_PRICE * max / 10,
    }
}

pub fn pricing_for(weights: &TierWeights) -> PricingResponse {
    // Σ weight × recommended, still scaled by 100
    let weighted: i64 = RarityTier::ALL
        .iter()
        .map(|&tier| i64::from(weights.get(tier)) * suggestion(tier).recommended)
        .sum();

    let scale = 100 * 100;
    let marked_up = weighted * (100 + PROFIT_MARGIN_PERCENT);
    // Half-up rounding; suggestions and weights are never negative here
    let recommended_price = (marked_up + scale / 2).div_euclid(scale);

    PricingResponse {
        common: suggestion(RarityTier::Common),
        rare: suggestion(RarityTier::Rare),
        epic: suggestion(RarityTier::Epic),
        legendary: suggestion(RarityTier::Legendary),
        expected_value: weighted as f64 / 100.0,
        recommended_price,
    }
}
