use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::contract::Contract;
use crate::decimal::Money;
use crate::obligation::PaymentObligation;
use crate::types::{ObligationKind, PaymentStatus};

/// settlement status of one booking-tier item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TierStatus {
    Paid,
    Unpaid,
    /// configured amount is zero, vacuously satisfied
    NotRequired,
}

/// one of booking, DLD fee and admin fee with its settlement status
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingTierItem {
    pub kind: ObligationKind,
    pub amount: Money,
    pub status: TierStatus,
}

impl BookingTierItem {
    pub fn is_required(&self) -> bool {
        self.status != TierStatus::NotRequired
    }

    pub fn is_satisfied(&self) -> bool {
        self.status != TierStatus::Unpaid
    }
}

/// which booking-tier items are unpaid and how far along the tier is
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingBreakdown {
    pub items: Vec<BookingTierItem>,
    /// paid / required * 100, two decimals
    pub progress: Decimal,
}

impl BookingBreakdown {
    pub fn is_complete(&self) -> bool {
        self.items.iter().all(BookingTierItem::is_satisfied)
    }

    pub fn unpaid(&self) -> impl Iterator<Item = &BookingTierItem> {
        self.items.iter().filter(|i| !i.is_satisfied())
    }

    pub fn unpaid_kinds(&self) -> Vec<ObligationKind> {
        self.unpaid().map(|i| i.kind).collect()
    }
}

impl fmt::Display for BookingBreakdown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let unpaid: Vec<String> = self
            .unpaid()
            .map(|i| format!("{} ({:.2})", i.kind, i.amount.as_decimal()))
            .collect();
        if unpaid.is_empty() {
            write!(f, "all booking payments settled ({}% complete)", self.progress)
        } else {
            write!(
                f,
                "unpaid: {} ({}% complete)",
                unpaid.join(", "),
                self.progress
            )
        }
    }
}

/// money totals across every obligation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerTotals {
    pub invoiced: Money,
    pub paid: Money,
    pub outstanding: Money,
}

/// counts and progress figures for reporting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerStatistics {
    pub total_obligations: usize,
    pub booking_tier_obligations: usize,
    pub installment_obligations: usize,
    pub posted_obligations: usize,
    pub paid_obligations: usize,
    pub partial_obligations: usize,
    /// paid amount over invoiced amount, percent
    pub payment_percentage: Decimal,
    /// paid installments over all installments, percent
    pub installment_progress: Decimal,
}

/// read-only aggregation over a contract's obligations
pub struct PaymentObligationLedger<'a> {
    contract: &'a Contract,
    obligations: &'a [PaymentObligation],
}

impl<'a> PaymentObligationLedger<'a> {
    pub fn new(contract: &'a Contract, obligations: &'a [PaymentObligation]) -> Self {
        Self {
            contract,
            obligations,
        }
    }

    pub fn obligations(&self) -> &'a [PaymentObligation] {
        self.obligations
    }

    pub fn by_kind(&self, kind: ObligationKind) -> impl Iterator<Item = &'a PaymentObligation> {
        self.obligations.iter().filter(move |o| o.kind == kind)
    }

    fn tier_status(&self, kind: ObligationKind) -> TierStatus {
        if !self.contract.booking_tier_amount(kind).is_positive() {
            return TierStatus::NotRequired;
        }
        if self.by_kind(kind).any(|o| o.is_paid()) {
            TierStatus::Paid
        } else {
            TierStatus::Unpaid
        }
    }

    /// every required booking-tier item has a paid obligation
    pub fn booking_tier_paid(&self) -> bool {
        ObligationKind::BOOKING_TIER
            .iter()
            .all(|k| self.tier_status(*k) != TierStatus::Unpaid)
    }

    /// paid / required * 100 over the booking tier; 100 when nothing is required
    pub fn progress_percentage(&self) -> Decimal {
        let statuses: Vec<TierStatus> = ObligationKind::BOOKING_TIER
            .iter()
            .map(|k| self.tier_status(*k))
            .collect();
        let required = statuses.iter().filter(|s| **s != TierStatus::NotRequired).count();
        let paid = statuses.iter().filter(|s| **s == TierStatus::Paid).count();
        percent(paid, required)
    }

    pub fn booking_breakdown(&self) -> BookingBreakdown {
        let items = ObligationKind::BOOKING_TIER
            .iter()
            .map(|k| BookingTierItem {
                kind: *k,
                amount: self.contract.booking_tier_amount(*k),
                status: self.tier_status(*k),
            })
            .collect();

        BookingBreakdown {
            items,
            progress: self.progress_percentage(),
        }
    }

    pub fn has_installments(&self) -> bool {
        self.by_kind(ObligationKind::Installment).next().is_some()
    }

    pub fn totals(&self) -> LedgerTotals {
        let invoiced: Money = self.obligations.iter().map(|o| o.amount).sum();
        let paid: Money = self.obligations.iter().map(|o| o.amount_paid).sum();
        LedgerTotals {
            invoiced,
            paid,
            outstanding: self.obligations.iter().map(|o| o.outstanding()).sum(),
        }
    }

    pub fn statistics(&self) -> LedgerStatistics {
        let totals = self.totals();
        let installments = self.by_kind(ObligationKind::Installment).count();
        let paid_installments = self
            .by_kind(ObligationKind::Installment)
            .filter(|o| o.is_paid())
            .count();

        LedgerStatistics {
            total_obligations: self.obligations.len(),
            booking_tier_obligations: self.obligations.iter().filter(|o| o.kind.is_booking_tier()).count(),
            installment_obligations: installments,
            posted_obligations: self.obligations.iter().filter(|o| o.is_posted()).count(),
            paid_obligations: self.obligations.iter().filter(|o| o.is_paid()).count(),
            partial_obligations: self
                .obligations
                .iter()
                .filter(|o| o.payment_status == PaymentStatus::Partial)
                .count(),
            payment_percentage: totals.paid.ratio_of(totals.invoiced),
            installment_progress: if installments == 0 {
                Decimal::ZERO
            } else {
                percent(paid_installments, installments)
            },
        }
    }
}

fn percent(part: usize, whole: usize) -> Decimal {
    if whole == 0 {
        return Decimal::ONE_HUNDRED;
    }
    (Decimal::from(part as u64) * Decimal::ONE_HUNDRED / Decimal::from(whole as u64)).round_dp(2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fees::FeeRule;
    use crate::obligation::{LedgerPayment, LedgerRef};
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn contract() -> Contract {
        Contract::builder()
            .base_price(Money::from_major(1_000_000))
            .booking(FeeRule::fixed(Money::from_major(100_000)))
            .admin(FeeRule::fixed(Money::from_major(20_000)))
            .build()
    }

    fn obligation(contract: &Contract, kind: ObligationKind, amount: i64) -> PaymentObligation {
        PaymentObligation::new(
            contract.id,
            kind,
            Money::from_major(amount),
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            kind.label(),
        )
    }

    fn pay(o: &mut PaymentObligation) {
        o.attach_ledger_ref(LedgerRef(format!("INV/{}", o.kind)));
        o.apply_ledger_payment(LedgerPayment {
            status: PaymentStatus::Paid,
            amount_paid: o.amount,
        });
    }

    fn booking_tier(contract: &Contract) -> Vec<PaymentObligation> {
        vec![
            obligation(contract, ObligationKind::Booking, 100_000),
            obligation(contract, ObligationKind::DldFee, 40_000),
            obligation(contract, ObligationKind::AdminFee, 20_000),
        ]
    }

    #[test]
    fn test_nothing_paid() {
        let contract = contract();
        let obligations = booking_tier(&contract);
        let ledger = PaymentObligationLedger::new(&contract, &obligations);

        assert!(!ledger.booking_tier_paid());
        assert_eq!(ledger.progress_percentage(), Decimal::ZERO);
        assert_eq!(ledger.booking_breakdown().unpaid().count(), 3);
    }

    #[test]
    fn test_dld_unpaid_breakdown() {
        let contract = contract();
        let mut obligations = booking_tier(&contract);
        pay(&mut obligations[0]);
        pay(&mut obligations[2]);
        let ledger = PaymentObligationLedger::new(&contract, &obligations);

        assert!(!ledger.booking_tier_paid());
        let breakdown = ledger.booking_breakdown();
        assert_eq!(breakdown.unpaid_kinds(), vec![ObligationKind::DldFee]);
        assert_eq!(breakdown.progress, dec!(66.67));
        assert_eq!(
            breakdown.to_string(),
            "unpaid: DLD Fee (40000.00) (66.67% complete)"
        );
    }

    #[test]
    fn test_zero_amount_items_are_vacuously_satisfied() {
        let contract = Contract::builder()
            .base_price(Money::from_major(1_000_000))
            .booking(FeeRule::fixed(Money::from_major(100_000)))
            .include_dld(false)
            .include_admin(false)
            .build();
        let mut obligations = vec![obligation(&contract, ObligationKind::Booking, 100_000)];
        pay(&mut obligations[0]);
        let ledger = PaymentObligationLedger::new(&contract, &obligations);

        assert!(ledger.booking_tier_paid());
        assert_eq!(ledger.progress_percentage(), dec!(100));
        let breakdown = ledger.booking_breakdown();
        assert!(breakdown.is_complete());
        assert_eq!(
            breakdown.items.iter().filter(|i| i.is_required()).count(),
            1
        );
    }

    #[test]
    fn test_missing_obligation_counts_as_unpaid() {
        let contract = contract();
        let obligations: Vec<PaymentObligation> = Vec::new();
        let ledger = PaymentObligationLedger::new(&contract, &obligations);
        assert!(!ledger.booking_tier_paid());
        assert!(!ledger.has_installments());
    }

    #[test]
    fn test_partial_payment_is_not_paid() {
        let contract = contract();
        let mut obligations = booking_tier(&contract);
        pay(&mut obligations[0]);
        pay(&mut obligations[2]);
        obligations[1].attach_ledger_ref(LedgerRef("INV/DLD".to_string()));
        obligations[1].apply_ledger_payment(LedgerPayment {
            status: PaymentStatus::Partial,
            amount_paid: Money::from_major(39_999),
        });
        let ledger = PaymentObligationLedger::new(&contract, &obligations);
        assert!(!ledger.booking_tier_paid());
    }

    #[test]
    fn test_totals_and_statistics() {
        let contract = contract();
        let mut obligations = booking_tier(&contract);
        for i in 0..4 {
            let mut o = obligation(&contract, ObligationKind::Installment, 225_000);
            if i == 0 {
                pay(&mut o);
            }
            obligations.push(o);
        }
        pay(&mut obligations[0]);
        let ledger = PaymentObligationLedger::new(&contract, &obligations);

        let totals = ledger.totals();
        assert_eq!(totals.invoiced, Money::from_major(1_060_000));
        assert_eq!(totals.paid, Money::from_major(325_000));
        assert_eq!(totals.outstanding, Money::from_major(735_000));

        let stats = ledger.statistics();
        assert_eq!(stats.total_obligations, 7);
        assert_eq!(stats.booking_tier_obligations, 3);
        assert_eq!(stats.installment_obligations, 4);
        assert_eq!(stats.posted_obligations, 2);
        assert_eq!(stats.paid_obligations, 2);
        assert_eq!(stats.payment_percentage, dec!(30.66));
        assert_eq!(stats.installment_progress, dec!(25));
    }
}
