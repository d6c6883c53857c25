use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::contract::Contract;
use crate::errors::{PlanError, Result};
use crate::ledger::PaymentObligationLedger;
use crate::obligation::PaymentObligation;
use crate::types::{ContractId, ContractState};

/// a state change applied by the gate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub contract_id: ContractId,
    pub from: ContractState,
    pub to: ContractState,
    pub at: DateTime<Utc>,
}

/// contract lifecycle state machine.
///
/// Only the `state` field of the contract is written here. Side effects on
/// collaborators (property registry, notifier) belong to the caller.
pub struct BookingGate;

impl BookingGate {
    /// draft -> booked, once every required booking-tier item is paid
    pub fn confirm_booking(
        contract: &mut Contract,
        obligations: &[PaymentObligation],
        now: DateTime<Utc>,
    ) -> Result<Transition> {
        Self::check_edge(contract, ContractState::Booked)?;

        let ledger = PaymentObligationLedger::new(contract, obligations);
        if !ledger.booking_tier_paid() {
            let breakdown = ledger.booking_breakdown();
            warn!(
                contract = %contract.id,
                progress = %breakdown.progress,
                "booking confirmation rejected, booking payments outstanding"
            );
            return Err(PlanError::BookingRequirementsNotMet { breakdown });
        }

        Ok(Self::apply(contract, ContractState::Booked, now))
    }

    /// booked -> sold, requires a generated installment plan
    pub fn confirm_sale(
        contract: &mut Contract,
        obligations: &[PaymentObligation],
        now: DateTime<Utc>,
    ) -> Result<Transition> {
        Self::check_edge(contract, ContractState::Sold)?;

        let ledger = PaymentObligationLedger::new(contract, obligations);
        if !ledger.has_installments() {
            return Err(PlanError::NoInstallmentPlan {
                contract_id: contract.id,
            });
        }

        Ok(Self::apply(contract, ContractState::Sold, now))
    }

    /// draft|booked -> refund; obligation history is kept
    pub fn refund(contract: &mut Contract, now: DateTime<Utc>) -> Result<Transition> {
        Self::check_edge(contract, ContractState::Refund)?;
        Ok(Self::apply(contract, ContractState::Refund, now))
    }

    /// draft|booked -> cancel; obligation history is kept
    pub fn cancel(contract: &mut Contract, now: DateTime<Utc>) -> Result<Transition> {
        Self::check_edge(contract, ContractState::Cancel)?;
        Ok(Self::apply(contract, ContractState::Cancel, now))
    }

    /// administrative freeze from any state
    pub fn lock(contract: &mut Contract, now: DateTime<Utc>) -> Transition {
        Self::apply(contract, ContractState::Locked, now)
    }

    /// installments may only be generated for a booked contract
    pub fn ensure_can_generate(contract: &Contract, obligations: &[PaymentObligation]) -> Result<()> {
        match contract.state {
            ContractState::Booked => Ok(()),
            ContractState::Locked => Err(PlanError::ContractLocked {
                contract_id: contract.id,
            }),
            ContractState::Draft => {
                let ledger = PaymentObligationLedger::new(contract, obligations);
                if ledger.booking_tier_paid() {
                    Err(PlanError::NotBooked {
                        state: contract.state,
                    })
                } else {
                    Err(PlanError::BookingRequirementsNotMet {
                        breakdown: ledger.booking_breakdown(),
                    })
                }
            }
            state => Err(PlanError::NotBooked { state }),
        }
    }

    /// booking-tier obligations may only be issued while in draft
    pub fn ensure_draft(contract: &Contract) -> Result<()> {
        match contract.state {
            ContractState::Draft => Ok(()),
            ContractState::Locked => Err(PlanError::ContractLocked {
                contract_id: contract.id,
            }),
            state => Err(PlanError::InvalidTransition {
                from: state,
                to: ContractState::Booked,
            }),
        }
    }

    fn check_edge(contract: &Contract, to: ContractState) -> Result<()> {
        if contract.state == ContractState::Locked {
            return Err(PlanError::ContractLocked {
                contract_id: contract.id,
            });
        }
        if !contract.state.can_transition_to(to) {
            warn!(
                contract = %contract.id,
                from = %contract.state,
                to = %to,
                "transition rejected"
            );
            return Err(PlanError::InvalidTransition {
                from: contract.state,
                to,
            });
        }
        Ok(())
    }

    fn apply(contract: &mut Contract, to: ContractState, now: DateTime<Utc>) -> Transition {
        let from = contract.state;
        contract.state = to;
        contract.state_changed_at = Some(now);

        info!(contract = %contract.id, from = %from, to = %to, "contract state changed");

        Transition {
            contract_id: contract.id,
            from,
            to,
            at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decimal::Money;
    use crate::fees::FeeRule;
    use crate::obligation::{LedgerPayment, LedgerRef};
    use crate::types::{ObligationKind, PaymentStatus};
    use chrono::NaiveDate;
    use hourglass_rs::{SafeTimeProvider, TimeSource};

    fn now() -> DateTime<Utc> {
        let time = SafeTimeProvider::new(TimeSource::Test(
            "2024-01-15T09:00:00Z".parse::<DateTime<Utc>>().unwrap(),
        ));
        time.now()
    }

    fn contract() -> Contract {
        Contract::builder()
            .base_price(Money::from_major(1_000_000))
            .booking(FeeRule::fixed(Money::from_major(100_000)))
            .admin(FeeRule::fixed(Money::from_major(20_000)))
            .build()
    }

    fn obligation(contract: &Contract, kind: ObligationKind, paid: bool) -> PaymentObligation {
        let mut o = PaymentObligation::new(
            contract.id,
            kind,
            contract.booking_tier_amount(kind).max(Money::from_major(1)),
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            kind.label(),
        );
        if paid {
            o.attach_ledger_ref(LedgerRef(format!("INV/{}", kind)));
            o.apply_ledger_payment(LedgerPayment {
                status: PaymentStatus::Paid,
                amount_paid: o.amount,
            });
        }
        o
    }

    fn paid_tier(contract: &Contract) -> Vec<PaymentObligation> {
        ObligationKind::BOOKING_TIER
            .iter()
            .map(|k| obligation(contract, *k, true))
            .collect()
    }

    #[test]
    fn test_confirm_booking_requires_paid_tier() {
        let mut contract = contract();
        let obligations = vec![
            obligation(&contract, ObligationKind::Booking, true),
            obligation(&contract, ObligationKind::DldFee, false),
            obligation(&contract, ObligationKind::AdminFee, true),
        ];

        let err = BookingGate::confirm_booking(&mut contract, &obligations, now()).unwrap_err();
        match err {
            PlanError::BookingRequirementsNotMet { breakdown } => {
                assert_eq!(breakdown.unpaid_kinds(), vec![ObligationKind::DldFee]);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(contract.state, ContractState::Draft);
        assert!(contract.state_changed_at.is_none());
    }

    #[test]
    fn test_confirm_booking() {
        let mut contract = contract();
        let obligations = paid_tier(&contract);
        let transition = BookingGate::confirm_booking(&mut contract, &obligations, now()).unwrap();

        assert_eq!(transition.from, ContractState::Draft);
        assert_eq!(transition.to, ContractState::Booked);
        assert_eq!(contract.state, ContractState::Booked);
        assert_eq!(contract.state_changed_at, Some(now()));

        // not twice
        assert!(matches!(
            BookingGate::confirm_booking(&mut contract, &obligations, now()),
            Err(PlanError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_confirm_sale_requires_installments() {
        let mut contract = contract();
        let mut obligations = paid_tier(&contract);
        BookingGate::confirm_booking(&mut contract, &obligations, now()).unwrap();

        assert!(matches!(
            BookingGate::confirm_sale(&mut contract, &obligations, now()),
            Err(PlanError::NoInstallmentPlan { .. })
        ));

        obligations.push(obligation(&contract, ObligationKind::Installment, false));
        let transition = BookingGate::confirm_sale(&mut contract, &obligations, now()).unwrap();
        assert_eq!(transition.to, ContractState::Sold);
    }

    #[test]
    fn test_refund_and_cancel_only_before_sale() {
        let mut draft = contract();
        assert!(BookingGate::cancel(&mut draft, now()).is_ok());
        assert_eq!(draft.state, ContractState::Cancel);

        // terminal states never go back
        assert!(matches!(
            BookingGate::refund(&mut draft, now()),
            Err(PlanError::InvalidTransition { from: ContractState::Cancel, to: ContractState::Refund })
        ));

        let mut booked = contract();
        let obligations = paid_tier(&booked);
        BookingGate::confirm_booking(&mut booked, &obligations, now()).unwrap();
        assert!(BookingGate::refund(&mut booked, now()).is_ok());
        assert_eq!(booked.state, ContractState::Refund);
    }

    #[test]
    fn test_lock_blocks_everything() {
        let mut contract = contract();
        let obligations = paid_tier(&contract);
        let transition = BookingGate::lock(&mut contract, now());
        assert_eq!(transition.to, ContractState::Locked);

        assert!(matches!(
            BookingGate::confirm_booking(&mut contract, &obligations, now()),
            Err(PlanError::ContractLocked { .. })
        ));
        assert!(matches!(
            BookingGate::ensure_can_generate(&contract, &obligations),
            Err(PlanError::ContractLocked { .. })
        ));
        assert!(matches!(
            BookingGate::cancel(&mut contract, now()),
            Err(PlanError::ContractLocked { .. })
        ));
    }

    #[test]
    fn test_generation_guard() {
        let mut contract = contract();
        let unpaid: Vec<PaymentObligation> = Vec::new();
        assert!(matches!(
            BookingGate::ensure_can_generate(&contract, &unpaid),
            Err(PlanError::BookingRequirementsNotMet { .. })
        ));

        let paid = paid_tier(&contract);
        assert!(matches!(
            BookingGate::ensure_can_generate(&contract, &paid),
            Err(PlanError::NotBooked { state: ContractState::Draft })
        ));

        BookingGate::confirm_booking(&mut contract, &paid, now()).unwrap();
        assert!(BookingGate::ensure_can_generate(&contract, &paid).is_ok());

        BookingGate::cancel(&mut contract, now()).unwrap();
        assert!(matches!(
            BookingGate::ensure_can_generate(&contract, &paid),
            Err(PlanError::NotBooked { state: ContractState::Cancel })
        ));
    }
}
