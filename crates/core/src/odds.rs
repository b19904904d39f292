//! Odds-format conversions and expected-value formulas.
//!
//! Every function here is pure and total: inputs outside the valid domain
//! map to fixed sentinel values instead of errors.
//!
//! | Sentinel | Meaning |
//! |----------|---------|
//! | `0.0` probability | invalid decimal price (`d <= 1`) |
//! | `1.0` decimal | invalid probability (outside `(0, 1)`) |
//! | `0` American | invalid probability |
//! | `-1.0` EV | invalid probability or price |
//!
//! # Example
//!
//! ```
//! use evscan_core::odds::{american_to_probability, probability_to_american, remove_vig_two_sided};
//!
//! let (fair_a, fair_b) = remove_vig_two_sided(
//!     american_to_probability(-150),
//!     american_to_probability(130),
//! );
//! assert_eq!(probability_to_american(fair_a), -138);
//! assert_eq!(probability_to_american(fair_b), 138);
//! ```

use serde::{Deserialize, Serialize};

// =============================================================================
// Constants
// =============================================================================

/// EV returned when the fair probability or price is invalid.
pub const INVALID_EV: f64 = -1.0;

/// Lower clamp for maker probabilities.
pub const MIN_MAKER_PROBABILITY: f64 = 0.05;

/// Upper clamp for maker probabilities.
pub const MAX_MAKER_PROBABILITY: f64 = 0.95;

// =============================================================================
// Format Conversions
// =============================================================================

/// Converts decimal odds to implied probability.
///
/// Returns `0.0` for `d <= 1.0`.
#[must_use]
pub fn decimal_to_probability(decimal: f64) -> f64 {
    if decimal <= 1.0 || !decimal.is_finite() {
        return 0.0;
    }
    1.0 / decimal
}

/// Converts a probability to decimal odds.
///
/// Returns `1.0` for probabilities outside `(0, 1)`.
#[must_use]
pub fn probability_to_decimal(probability: f64) -> f64 {
    if !is_valid_probability(probability) {
        return 1.0;
    }
    1.0 / probability
}

/// Converts American odds to implied probability.
///
/// `+130` → `100 / 230`, `-150` → `150 / 250`, `0` → `0.0`.
#[must_use]
pub fn american_to_probability(american: i64) -> f64 {
    match american {
        0 => 0.0,
        a if a > 0 => 100.0 / (a as f64 + 100.0),
        a => {
            let abs = a.unsigned_abs() as f64;
            abs / (abs + 100.0)
        }
    }
}

/// Converts a probability to American odds.
///
/// Exactly `0.5` maps to `+100`. Rounds to the nearest integer with ties
/// away from zero. Returns `0` for probabilities outside `(0, 1)`.
#[must_use]
#[allow(clippy::float_cmp)]
pub fn probability_to_american(probability: f64) -> i64 {
    if !is_valid_probability(probability) {
        return 0;
    }
    if probability == 0.5 {
        return 100;
    }

    let american = if probability > 0.5 {
        -100.0 * probability / (1.0 - probability)
    } else {
        100.0 * (1.0 - probability) / probability
    };

    // f64::round rounds half away from zero
    american.round() as i64
}

/// Converts decimal odds straight to American odds (`0` when `d <= 1`).
#[must_use]
pub fn decimal_to_american(decimal: f64) -> i64 {
    probability_to_american(decimal_to_probability(decimal))
}

/// Converts American odds straight to decimal odds (`1.0` when `a == 0`).
#[must_use]
pub fn american_to_decimal(american: i64) -> f64 {
    probability_to_decimal(american_to_probability(american))
}

/// Formats American odds with an explicit sign, or `N/A` for the `0` sentinel.
#[must_use]
pub fn format_american(american: i64) -> String {
    match american {
        0 => "N/A".to_string(),
        a if a > 0 => format!("+{a}"),
        a => a.to_string(),
    }
}

/// Returns true if American odds survive a round trip through probability
/// within one tick.
///
/// `-100` and `+100` both denote even money and normalize to `+100`.
#[must_use]
pub fn american_round_trip_ok(american: i64) -> bool {
    if american == 0 {
        return false;
    }
    let expected = if american == -100 { 100 } else { american };
    let back = probability_to_american(american_to_probability(american));
    (back - expected).abs() <= 1
}

// =============================================================================
// Vig Removal
// =============================================================================

/// Normalizes two implied probabilities so they sum to one.
///
/// Returns `(0.0, 0.0)` when the sum is not positive.
#[must_use]
pub fn remove_vig_two_sided(p1: f64, p2: f64) -> (f64, f64) {
    let total = p1 + p2;
    if total <= 0.0 || !total.is_finite() {
        return (0.0, 0.0);
    }
    (p1 / total, p2 / total)
}

/// Bookmaker margin implied by a two-way line (`p1 + p2 - 1`).
#[must_use]
pub fn implied_vig(p1: f64, p2: f64) -> f64 {
    p1 + p2 - 1.0
}

// =============================================================================
// Expected Value
// =============================================================================

/// Decimal odds after an exchange commission charged on profit only.
///
/// `1 + (d - 1) * (1 - fee)`
#[must_use]
pub fn apply_exchange_fee(decimal: f64, fee: f64) -> f64 {
    1.0 + (decimal - 1.0) * (1.0 - fee)
}

/// Expected value per unit staked before fees: `p * d - 1`.
#[must_use]
pub fn calculate_ev_gross(fair_probability: f64, decimal: f64) -> f64 {
    if fair_probability <= 0.0 || decimal <= 1.0 {
        return INVALID_EV;
    }
    fair_probability * decimal - 1.0
}

/// Expected value per unit staked after the exchange fee.
#[must_use]
#[allow(clippy::float_cmp)]
pub fn calculate_ev_net(fair_probability: f64, decimal: f64, fee: f64) -> f64 {
    if fee == 0.0 {
        return calculate_ev_gross(fair_probability, decimal);
    }
    if decimal <= 1.0 {
        return INVALID_EV;
    }
    calculate_ev_gross(fair_probability, apply_exchange_fee(decimal, fee))
}

// =============================================================================
// Maker Pricing
// =============================================================================

/// Implied probability of the price to post on an exchange so that backing
/// at that price earns `target_ev` against the fair probability.
///
/// Without a fee this is `p / (1 + target_ev)`. With a fee the probability
/// is first divided by `1 + fee`, then by `1 + (target_ev - fee)`. The
/// result is clamped to `[0.05, 0.95]`. Returns `0.0` for `p` outside `(0, 1)`.
#[must_use]
pub fn calculate_maker_probability(fair_probability: f64, target_ev: f64, fee: f64) -> f64 {
    if !is_valid_probability(fair_probability) {
        return 0.0;
    }

    let raw = if fee <= 0.0 {
        fair_probability / (1.0 + target_ev)
    } else {
        let fee_neutral = fair_probability / (1.0 + fee);
        fee_neutral / (1.0 + (target_ev - fee))
    };

    if !raw.is_finite() {
        return 0.0;
    }
    raw.clamp(MIN_MAKER_PROBABILITY, MAX_MAKER_PROBABILITY)
}

/// A posting price and the EV it actually delivers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MakerOdds {
    /// Maker probability after margin and fee adjustment.
    pub probability: f64,
    /// Decimal odds to post.
    pub decimal_odds: f64,
    /// American odds to post (`0` if unavailable).
    pub american_odds: i64,
    /// EV at the posted price before fees.
    pub ev_gross: f64,
    /// EV at the posted price after fees.
    pub ev_net: f64,
}

impl MakerOdds {
    /// Returns true if a usable posting price was produced.
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.american_odds != 0 && self.decimal_odds > 1.0
    }
}

/// Computes the maker posting price for a fair probability.
#[must_use]
pub fn calculate_maker_odds(fair_probability: f64, target_ev: f64, fee: f64) -> MakerOdds {
    let probability = calculate_maker_probability(fair_probability, target_ev, fee);
    let decimal_odds = probability_to_decimal(probability);

    MakerOdds {
        probability,
        decimal_odds,
        american_odds: probability_to_american(probability),
        ev_gross: calculate_ev_gross(fair_probability, decimal_odds),
        ev_net: calculate_ev_net(fair_probability, decimal_odds, fee),
    }
}

fn is_valid_probability(probability: f64) -> bool {
    probability > 0.0 && probability < 1.0
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    // ==================== Decimal Conversion Tests ====================

    #[test]
    fn test_decimal_to_probability() {
        assert!((decimal_to_probability(2.0) - 0.5).abs() < EPS);
        assert!((decimal_to_probability(4.0) - 0.25).abs() < EPS);
    }

    #[test]
    fn test_decimal_to_probability_invalid() {
        assert_eq!(decimal_to_probability(1.0), 0.0);
        assert_eq!(decimal_to_probability(0.5), 0.0);
        assert_eq!(decimal_to_probability(-3.0), 0.0);
    }

    #[test]
    fn test_probability_to_decimal_invalid() {
        assert_eq!(probability_to_decimal(0.0), 1.0);
        assert_eq!(probability_to_decimal(1.0), 1.0);
        assert_eq!(probability_to_decimal(-0.2), 1.0);
        assert_eq!(probability_to_decimal(1.4), 1.0);
    }

    #[test]
    fn test_decimal_round_trip() {
        for decimal in [1.01, 1.5, 1.909, 2.0, 2.75, 3.3, 10.0, 51.0, 1001.0] {
            let back = probability_to_decimal(decimal_to_probability(decimal));
            assert!(
                (back - decimal).abs() < EPS,
                "round trip failed for {decimal}: got {back}"
            );
        }
    }

    // ==================== American Conversion Tests ====================

    #[test]
    fn test_american_to_probability() {
        assert!((american_to_probability(-150) - 0.6).abs() < EPS);
        assert!((american_to_probability(130) - 100.0 / 230.0).abs() < EPS);
        assert!((american_to_probability(100) - 0.5).abs() < EPS);
        assert_eq!(american_to_probability(0), 0.0);
    }

    #[test]
    fn test_probability_to_american_even_money() {
        assert_eq!(probability_to_american(0.5), 100);
    }

    #[test]
    fn test_probability_to_american_favorite_and_underdog() {
        assert_eq!(probability_to_american(0.6), -150);
        assert_eq!(probability_to_american(0.4), 150);
        assert_eq!(probability_to_american(0.2), 400);
    }

    #[test]
    fn test_probability_to_american_invalid() {
        assert_eq!(probability_to_american(0.0), 0);
        assert_eq!(probability_to_american(1.0), 0);
        assert_eq!(probability_to_american(-0.1), 0);
    }

    #[test]
    fn test_probability_to_american_rounds_to_nearest() {
        // 100 * 0.55 / 0.45 = 122.2
        assert_eq!(probability_to_american(0.45), 122);
        assert_eq!(probability_to_american(0.55), -122);
    }

    #[test]
    fn test_american_round_trip_within_one_tick() {
        for american in (100..=2000).step_by(7).chain((-2000..=-101).step_by(9)) {
            let back = probability_to_american(american_to_probability(american));
            assert!(
                (back - american).abs() <= 1,
                "round trip failed for {american}: got {back}"
            );
            assert!(american_round_trip_ok(american));
        }
    }

    #[test]
    fn test_american_round_trip_even_money_aliases() {
        assert!(american_round_trip_ok(100));
        assert!(american_round_trip_ok(-100));
        assert!(!american_round_trip_ok(0));
    }

    #[test]
    fn test_decimal_american_shortcuts() {
        assert_eq!(decimal_to_american(2.5), 150);
        assert_eq!(decimal_to_american(1.0), 0);
        assert!((american_to_decimal(-200) - 1.5).abs() < EPS);
        assert_eq!(american_to_decimal(0), 1.0);
    }

    #[test]
    fn test_format_american() {
        assert_eq!(format_american(138), "+138");
        assert_eq!(format_american(-150), "-150");
        assert_eq!(format_american(0), "N/A");
    }

    // ==================== Vig Removal Tests ====================

    #[test]
    fn test_remove_vig_sums_to_one() {
        let pairs = [(0.6, 0.4348), (0.52, 0.52), (0.91, 0.13), (0.01, 0.99), (0.3, 0.3)];
        for (p1, p2) in pairs {
            let (f1, f2) = remove_vig_two_sided(p1, p2);
            assert!((f1 + f2 - 1.0).abs() < EPS);
        }
    }

    #[test]
    fn test_remove_vig_anchor_example() {
        let p1 = american_to_probability(-150);
        let p2 = american_to_probability(130);
        assert!((p1 + p2 - 1.0348).abs() < 1e-4);

        let (f1, f2) = remove_vig_two_sided(p1, p2);
        assert!((f1 - 0.5797).abs() < 1e-3);
        assert!((f2 - 0.4203).abs() < 1e-3);
        assert_eq!(probability_to_american(f1), -138);
        assert_eq!(probability_to_american(f2), 138);
    }

    #[test]
    fn test_remove_vig_zero_sum() {
        assert_eq!(remove_vig_two_sided(0.0, 0.0), (0.0, 0.0));
    }

    #[test]
    fn test_implied_vig() {
        assert!((implied_vig(0.5238, 0.5238) - 0.0476).abs() < 1e-9);
    }

    // ==================== EV Tests ====================

    #[test]
    fn test_apply_exchange_fee() {
        assert_eq!(apply_exchange_fee(2.5, 0.0), 2.5);
        assert!((apply_exchange_fee(3.0, 0.02) - 2.96).abs() < EPS);
        for decimal in [1.01, 1.8, 2.0, 7.5] {
            assert!(apply_exchange_fee(decimal, 0.02) < decimal);
        }
    }

    #[test]
    fn test_ev_gross() {
        assert!((calculate_ev_gross(0.5, 2.2) - 0.1).abs() < EPS);
        assert_eq!(calculate_ev_gross(0.0, 2.2), INVALID_EV);
        assert_eq!(calculate_ev_gross(0.5, 1.0), INVALID_EV);
    }

    #[test]
    fn test_ev_net_without_fee_matches_gross() {
        assert_eq!(calculate_ev_net(0.45, 2.4, 0.0), calculate_ev_gross(0.45, 2.4));
    }

    #[test]
    fn test_ev_net_with_fee() {
        // adjusted = 1 + 1.2 * 0.98 = 2.176
        let ev = calculate_ev_net(0.5, 2.2, 0.02);
        assert!((ev - 0.088).abs() < EPS);
        assert!(ev < calculate_ev_gross(0.5, 2.2));
    }

    // ==================== Maker Tests ====================

    #[test]
    fn test_maker_probability_without_fee() {
        let p = calculate_maker_probability(0.5, 0.045, 0.0);
        assert!((p - 0.5 / 1.045).abs() < EPS);
    }

    #[test]
    fn test_maker_probability_with_fee() {
        let p = calculate_maker_probability(0.5, 0.045, 0.02);
        let expected = 0.5 / 1.02 / 1.025;
        assert!((p - expected).abs() < EPS);
    }

    #[test]
    fn test_maker_probability_invalid_input() {
        assert_eq!(calculate_maker_probability(0.0, 0.045, 0.02), 0.0);
        assert_eq!(calculate_maker_probability(1.0, 0.045, 0.02), 0.0);
    }

    #[test]
    fn test_maker_probability_always_clamped() {
        let mut p = 0.001;
        while p < 1.0 {
            for fee in [0.0, 0.01, 0.02, 0.05] {
                for target in [0.0, 0.02, 0.045, 0.1] {
                    let maker = calculate_maker_probability(p, target, fee);
                    assert!(
                        (MIN_MAKER_PROBABILITY..=MAX_MAKER_PROBABILITY).contains(&maker),
                        "p={p} fee={fee} target={target} -> {maker}"
                    );
                }
            }
            p += 0.013;
        }
    }

    #[test]
    fn test_maker_odds_reports_achieved_ev() {
        let maker = calculate_maker_odds(0.5, 0.045, 0.0);
        assert!(maker.is_available());
        assert!((maker.decimal_odds - 2.09).abs() < 1e-9);
        assert!((maker.ev_gross - 0.045).abs() < 1e-9);
        assert_eq!(maker.ev_gross, maker.ev_net);
    }

    #[test]
    fn test_maker_odds_with_fee_net_below_gross() {
        let maker = calculate_maker_odds(0.55, 0.045, 0.02);
        assert!(maker.ev_net < maker.ev_gross);
        assert!(maker.american_odds != 0);
    }

    #[test]
    fn test_maker_odds_invalid_probability() {
        let maker = calculate_maker_odds(1.2, 0.045, 0.02);
        assert!(!maker.is_available());
        assert_eq!(maker.american_odds, 0);
        assert_eq!(maker.ev_gross, INVALID_EV);
    }
}
