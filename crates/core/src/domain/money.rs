// Money and tolerance types (ADR: budget math must be exact, not float-approximate)

use serde::{Deserialize, Serialize};

/// An amount of money in micro-dollars (1 unit = 1e-6 USD).
///
/// Integer representation keeps the budget-guard comparison in §4.4 exact:
/// floating point would make the "projected cost exactly equals budget"
/// boundary case flaky.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Micros(pub i64);

impl Micros {
    pub const ZERO: Micros = Micros(0);

    pub fn from_dollars(dollars: f64) -> Self {
        Micros((dollars * 1_000_000.0).round() as i64)
    }

    pub fn as_dollars(self) -> f64 {
        self.0 as f64 / 1_000_000.0
    }

    pub fn checked_add(self, other: Micros) -> Option<Micros> {
        self.0.checked_add(other.0).map(Micros)
    }

    pub fn saturating_add(self, other: Micros) -> Micros {
        Micros(self.0.saturating_add(other.0))
    }

    pub fn max(self, other: Micros) -> Micros {
        if self.0 >= other.0 {
            self
        } else {
            other
        }
    }
}

impl std::fmt::Display for Micros {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "${:.6}", self.as_dollars())
    }
}

/// Fractional over-budget allowance, represented as an exact rational so the
/// `cost_accumulated + projected <= budget * (1 + tolerance)` check in §4.4
/// never drifts from the configured value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tolerance {
    pub numerator: i64,
    pub denominator: i64,
}

impl Tolerance {
    pub const STRICT: Tolerance = Tolerance {
        numerator: 0,
        denominator: 1,
    };

    pub fn new(numerator: i64, denominator: i64) -> Self {
        assert!(denominator > 0, "tolerance denominator must be positive");
        Self {
            numerator,
            denominator,
        }
    }

    /// Returns true if `accumulated + projected <= budget * (1 + tolerance)`,
    /// computed with i128 intermediates to avoid overflow on the cross-multiply.
    pub fn within_budget(&self, accumulated: Micros, projected: Micros, budget: Micros) -> bool {
        let lhs = (accumulated.0 as i128 + projected.0 as i128) * self.denominator as i128;
        let rhs = budget.0 as i128 * (self.denominator as i128 + self.numerator as i128);
        lhs <= rhs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strict_tolerance_allows_exact_match() {
        let budget = Micros(1_000_000);
        let accumulated = Micros(0);
        let projected = Micros(1_000_000);
        assert!(Tolerance::STRICT.within_budget(accumulated, projected, budget));
    }

    #[test]
    fn strict_tolerance_rejects_one_over() {
        let budget = Micros(1_000_000);
        let accumulated = Micros(0);
        let projected = Micros(1_000_001);
        assert!(!Tolerance::STRICT.within_budget(accumulated, projected, budget));
    }

    #[test]
    fn ten_percent_tolerance_allows_overshoot() {
        let tol = Tolerance::new(1, 10);
        let budget = Micros(1_000_000);
        assert!(tol.within_budget(Micros(0), Micros(1_100_000), budget));
        assert!(!tol.within_budget(Micros(0), Micros(1_100_001), budget));
    }
}
