//! Filling in the missing side of a price pair from a fixed tax rate.
//!
//! Rounding is to the nearest yen with halves rounded up. It is done in
//! integer arithmetic on a basis-point rate, so `1000` at 10 % is exactly
//! `1100` and back.

use std::fmt;

use crate::price::PricePair;
use crate::{ChumonError, Result};

const BASIS: i64 = 10_000;

/// Consumption tax rate in basis points (1000 = 10 %).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaxRate {
    basis_points: u32,
}

impl TaxRate {
    /// Japanese standard consumption tax.
    pub const STANDARD: TaxRate = TaxRate { basis_points: 1_000 };

    pub const fn from_basis_points(basis_points: u32) -> Self {
        Self { basis_points }
    }

    /// Builds a rate from a fraction such as `0.10` or `0.08`.
    ///
    /// # Errors
    ///
    /// Returns [`ChumonError::ConfigError`] for negative, non-finite or
    /// implausibly large (over 100 %) rates.
    pub fn from_fraction(fraction: f64) -> Result<Self> {
        if !fraction.is_finite() || !(0.0..=1.0).contains(&fraction) {
            return Err(ChumonError::ConfigError(format!("tax rate {fraction} is out of range 0.0..=1.0")));
        }
        Ok(Self { basis_points: (fraction * BASIS as f64).round() as u32 })
    }

    pub fn basis_points(&self) -> u32 {
        self.basis_points
    }

    /// `round(excl × (1 + rate))`, or `None` if the amount overflows.
    pub fn add_tax(&self, excl_tax: i64) -> Option<i64> {
        let factor = BASIS + i64::from(self.basis_points);
        div_round_half_up(excl_tax.checked_mul(factor)?, BASIS)
    }

    /// `round(incl ÷ (1 + rate))`, or `None` if the amount overflows.
    pub fn remove_tax(&self, incl_tax: i64) -> Option<i64> {
        let factor = BASIS + i64::from(self.basis_points);
        div_round_half_up(incl_tax.checked_mul(BASIS)?, factor)
    }
}

impl Default for TaxRate {
    fn default() -> Self {
        Self::STANDARD
    }
}

impl fmt::Display for TaxRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (whole, hundredths) = (self.basis_points / 100, self.basis_points % 100);
        if hundredths == 0 { write!(f, "{whole}%") } else { write!(f, "{whole}.{hundredths:02}%") }
    }
}

fn div_round_half_up(numerator: i64, denominator: i64) -> Option<i64> {
    let doubled = numerator.checked_mul(2)?.checked_add(denominator)?;
    Some(doubled.div_euclid(denominator.checked_mul(2)?))
}

/// Derives a genuinely missing side; an observed value is never replaced.
///
/// Both present or both absent: returned unchanged. A side that cannot be
/// derived without overflow stays unset.
pub fn reconcile(prices: PricePair, rate: TaxRate) -> PricePair {
    match (prices.excl_tax, prices.incl_tax) {
        (Some(excl), None) => PricePair::new(Some(excl), rate.add_tax(excl)),
        (None, Some(incl)) => PricePair::new(rate.remove_tax(incl), Some(incl)),
        _ => prices,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_excl_to_incl() {
        let pair = reconcile(PricePair::excl_only(1000), TaxRate::STANDARD);
        assert_eq!(pair, PricePair::new(Some(1000), Some(1100)));
    }

    #[test]
    fn test_incl_to_excl() {
        let pair = reconcile(PricePair::incl_only(1100), TaxRate::STANDARD);
        assert_eq!(pair, PricePair::new(Some(1000), Some(1100)));
    }

    #[test]
    fn test_rounding_half_up() {
        // 5 × 1.1 = 5.5
        assert_eq!(TaxRate::STANDARD.add_tax(5), Some(6));
        // 4 × 1.1 = 4.4
        assert_eq!(TaxRate::STANDARD.add_tax(4), Some(4));
        // 1 ÷ 1.1 = 0.909…
        assert_eq!(TaxRate::STANDARD.remove_tax(1), Some(1));
        // 980 ÷ 1.1 = 890.9…
        assert_eq!(TaxRate::STANDARD.remove_tax(980), Some(891));
    }

    #[test]
    fn test_overflowing_amount_leaves_side_unset() {
        let huge = i64::MAX / 100;
        assert_eq!(TaxRate::STANDARD.add_tax(huge), None);
        assert_eq!(reconcile(PricePair::excl_only(huge), TaxRate::STANDARD), PricePair::excl_only(huge));
        assert_eq!(reconcile(PricePair::incl_only(huge), TaxRate::STANDARD), PricePair::incl_only(huge));
        assert_eq!(TaxRate::STANDARD.add_tax(100_000_000_000), Some(110_000_000_000));
    }

    #[test]
    fn test_both_present_unchanged() {
        let pair = PricePair::new(Some(1000), Some(1099));
        assert_eq!(reconcile(pair, TaxRate::STANDARD), pair);
    }

    #[test]
    fn test_neither_present_unchanged() {
        assert_eq!(reconcile(PricePair::default(), TaxRate::STANDARD), PricePair::default());
    }

    #[test]
    fn test_idempotent() {
        for excl in [1, 99, 1000, 12_345, 7_777_777] {
            let once = reconcile(PricePair::excl_only(excl), TaxRate::STANDARD);
            assert_eq!(reconcile(once, TaxRate::STANDARD), once);
        }
        for incl in [1, 110, 1980, 54_321] {
            let once = reconcile(PricePair::incl_only(incl), TaxRate::STANDARD);
            assert_eq!(reconcile(once, TaxRate::STANDARD), once);
        }
    }

    #[test]
    fn test_reduced_rate() {
        let rate = TaxRate::from_fraction(0.08).unwrap();
        assert_eq!(rate.basis_points(), 800);
        assert_eq!(rate.add_tax(1000), Some(1080));
        assert_eq!(rate.remove_tax(1080), Some(1000));
    }

    #[test]
    fn test_invalid_fraction() {
        assert!(TaxRate::from_fraction(-0.1).is_err());
        assert!(TaxRate::from_fraction(f64::NAN).is_err());
        assert!(TaxRate::from_fraction(1.5).is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(TaxRate::STANDARD.to_string(), "10%");
    }
}
