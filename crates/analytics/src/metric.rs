use rust_decimal::Decimal;
use serde::{Serialize, Serializer};
use std::fmt;

/// A ratio-like metric that may be undefined.
///
/// Any metric that divides by a quantity which can be zero (averages over an
/// empty group, lifts against a zero control value, growth rates) is a
/// `Ratio`. An undefined value is carried as `NotComputable` all the way to the
/// output; it is never replaced by zero, infinity or NaN.
///
/// Serializes as the decimal string or the literal `"not_computable"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Ratio {
    Value(Decimal),
    NotComputable,
}

impl Ratio {
    /// `numerator / denominator`, or `NotComputable` when the denominator is zero.
    pub fn of(numerator: Decimal, denominator: Decimal) -> Self {
        if denominator.is_zero() {
            Ratio::NotComputable
        } else {
            Ratio::Value(numerator / denominator)
        }
    }

    /// Arithmetic mean of `count` values summing to `sum`.
    pub fn mean(sum: Decimal, count: usize) -> Self {
        Self::of(sum, Decimal::from(count))
    }

    /// Relative change of `treatment` against `control`:
    /// `(treatment - control) / control`.
    pub fn lift(treatment: Decimal, control: Decimal) -> Self {
        Self::of(treatment - control, control)
    }

    /// Lift between two possibly undefined metrics.
    pub fn lift_between(treatment: Ratio, control: Ratio) -> Self {
        match (treatment, control) {
            (Ratio::Value(t), Ratio::Value(c)) => Self::lift(t, c),
            _ => Ratio::NotComputable,
        }
    }

    /// Share of `part` in `whole`, in percent.
    pub fn percentage(part: Decimal, whole: Decimal) -> Self {
        Self::of(part, whole).map(|v| v * Decimal::ONE_HUNDRED)
    }

    pub fn value(&self) -> Option<Decimal> {
        match self {
            Ratio::Value(v) => Some(*v),
            Ratio::NotComputable => None,
        }
    }

    pub fn is_computable(&self) -> bool {
        matches!(self, Ratio::Value(_))
    }

    pub fn map(self, f: impl FnOnce(Decimal) -> Decimal) -> Self {
        match self {
            Ratio::Value(v) => Ratio::Value(f(v)),
            Ratio::NotComputable => Ratio::NotComputable,
        }
    }

    /// Rounds a defined value to `dp` decimal places.
    pub fn round_dp(self, dp: u32) -> Self {
        self.map(|v| v.round_dp(dp))
    }
}

impl fmt::Display for Ratio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ratio::Value(v) => match f.precision() {
                Some(p) => write!(f, "{:.*}", p, v),
                None => write!(f, "{v}"),
            },
            Ratio::NotComputable => f.write_str("n/a"),
        }
    }
}

impl Serialize for Ratio {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Ratio::Value(v) => Serialize::serialize(v, serializer),
            Ratio::NotComputable => serializer.serialize_str("not_computable"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn zero_denominator_is_not_computable() {
        assert_eq!(Ratio::of(dec!(5), Decimal::ZERO), Ratio::NotComputable);
        assert_eq!(Ratio::mean(Decimal::ZERO, 0), Ratio::NotComputable);
        assert_eq!(Ratio::lift(dec!(50), Decimal::ZERO), Ratio::NotComputable);
        assert!(!Ratio::of(dec!(5), Decimal::ZERO).is_computable());
        assert!(Ratio::of(dec!(5), dec!(2)).is_computable());
    }

    #[test]
    fn lift_is_relative_to_control() {
        assert_eq!(Ratio::lift(dec!(150), dec!(100)), Ratio::Value(dec!(0.5)));
        assert_eq!(
            Ratio::lift(dec!(50), dec!(150)).round_dp(3),
            Ratio::Value(dec!(-0.667))
        );
    }

    #[test]
    fn undefined_inputs_propagate() {
        assert_eq!(
            Ratio::lift_between(Ratio::Value(dec!(1)), Ratio::NotComputable),
            Ratio::NotComputable
        );
        assert_eq!(
            Ratio::lift_between(Ratio::NotComputable, Ratio::Value(dec!(1))),
            Ratio::NotComputable
        );
    }

    #[test]
    fn serializes_marker_distinctly() {
        let json = serde_json::to_string(&[Ratio::Value(dec!(0.25)), Ratio::NotComputable]).unwrap();
        assert_eq!(json, r#"["0.25","not_computable"]"#);
    }

    #[test]
    fn displays_with_precision() {
        assert_eq!(format!("{:.2}", Ratio::Value(dec!(1.23456))), "1.23");
        assert_eq!(format!("{:.2}", Ratio::NotComputable), "n/a");
    }
}
