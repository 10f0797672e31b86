//! The single quantile rule used across the crate.
//!
//! Linear interpolation between closest ranks: for values sorted ascending
//! `v[0..n]` and a quantile `q` in `[0, 1]`, let `h = q * (n - 1)`. The result
//! is `v[floor(h)] + (h - floor(h)) * (v[floor(h) + 1] - v[floor(h)])`.
//! Everything is computed in `Decimal`, so identical input always yields
//! identical boundaries.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

/// Computes a quantile of values already sorted in ascending order.
///
/// Returns `None` for an empty slice or a quantile outside `[0, 1]`.
pub fn quantile_sorted(sorted_values: &[Decimal], q: Decimal) -> Option<Decimal> {
    if sorted_values.is_empty() || q < Decimal::ZERO || q > Decimal::ONE {
        return None;
    }
    debug_assert!(
        sorted_values.windows(2).all(|w| w[0] <= w[1]),
        "values must be sorted in ascending order"
    );

    let last = sorted_values.len() - 1;
    let h = q * Decimal::from(last);
    let floor = h.floor();
    let lower_index = floor.to_usize()?.min(last);
    let fraction = h - floor;

    let lower = sorted_values[lower_index];
    if lower_index == last || fraction.is_zero() {
        return Some(lower);
    }
    let upper = sorted_values[lower_index + 1];
    Some(lower + fraction * (upper - lower))
}

/// Computes a quantile of unsorted values.
pub fn quantile(values: &[Decimal], q: Decimal) -> Option<Decimal> {
    let mut sorted = values.to_vec();
    sorted.sort();
    quantile_sorted(&sorted, q)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn interpolates_between_closest_ranks() {
        let values = [dec!(50), dec!(100), dec!(200)];
        assert_eq!(quantile_sorted(&values, dec!(0.33)), Some(dec!(83)));
        assert_eq!(quantile_sorted(&values, dec!(0.67)), Some(dec!(134)));
        assert_eq!(quantile_sorted(&values, dec!(0.5)), Some(dec!(100)));
    }

    #[test]
    fn endpoints_are_min_and_max() {
        let values = [dec!(4), dec!(1), dec!(3), dec!(2)];
        assert_eq!(quantile(&values, Decimal::ZERO), Some(dec!(1)));
        assert_eq!(quantile(&values, Decimal::ONE), Some(dec!(4)));
        assert_eq!(quantile(&values, dec!(0.25)), Some(dec!(1.75)));
    }

    #[test]
    fn single_value_and_empty() {
        assert_eq!(quantile(&[dec!(7)], dec!(0.9)), Some(dec!(7)));
        assert_eq!(quantile(&[], dec!(0.5)), None);
        assert_eq!(quantile(&[dec!(1)], dec!(1.5)), None);
    }

    #[test]
    fn is_order_independent() {
        let a = [dec!(9), dec!(2), dec!(5), dec!(5), dec!(1)];
        let b = [dec!(1), dec!(5), dec!(9), dec!(5), dec!(2)];
        assert_eq!(quantile(&a, dec!(0.33)), quantile(&b, dec!(0.33)));
    }
}
