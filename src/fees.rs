use serde::{Deserialize, Serialize};

use crate::decimal::{Money, Rate};
use crate::types::AmountMode;

/// how one flat amount (booking, DLD, admin) is derived from the price
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeRule {
    pub mode: AmountMode,
    /// share of the effective price, used in percentage mode
    pub rate: Rate,
    /// current amount; user-owned in fixed mode, recomputed in percentage mode
    pub amount: Money,
}

impl FeeRule {
    pub fn fixed(amount: Money) -> Self {
        Self {
            mode: AmountMode::Fixed,
            rate: Rate::ZERO,
            amount,
        }
    }

    pub fn percentage(rate: Rate) -> Self {
        Self {
            mode: AmountMode::Percentage,
            rate,
            amount: Money::ZERO,
        }
    }

    pub fn none() -> Self {
        Self::fixed(Money::ZERO)
    }

    pub fn is_percentage(&self) -> bool {
        self.mode == AmountMode::Percentage
    }
}

impl Default for FeeRule {
    fn default() -> Self {
        Self::none()
    }
}

/// prices a fee can be computed against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PriceBasis {
    pub base_price: Option<Money>,
    pub ask_price: Option<Money>,
}

impl PriceBasis {
    pub fn new(base_price: Option<Money>, ask_price: Option<Money>) -> Self {
        Self { base_price, ask_price }
    }

    /// base price when set and non-zero, else the ask price
    pub fn effective(&self) -> Option<Money> {
        self.base_price
            .filter(|p| !p.is_zero())
            .or(self.ask_price.filter(|p| !p.is_zero()))
    }
}

/// derives one-time fee amounts
pub struct FeeCalculator;

impl FeeCalculator {
    /// compute the amount for a rule; never fails, degrades to zero
    pub fn compute(basis: PriceBasis, rule: &FeeRule) -> Money {
        match rule.mode {
            AmountMode::Fixed => rule.amount,
            AmountMode::Percentage => basis
                .effective()
                .map(|price| price.percentage(rule.rate).round_currency())
                .unwrap_or(Money::ZERO),
        }
    }

    /// refresh the stored amount; fixed rules are left untouched
    pub fn recompute(basis: PriceBasis, rule: &mut FeeRule) -> bool {
        if !rule.is_percentage() {
            return false;
        }
        let amount = Self::compute(basis, rule);
        let changed = amount != rule.amount;
        rule.amount = amount;
        changed
    }
}
