/// serializable views of a contract and its payment plan
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::contract::Contract;
use crate::decimal::Money;
use crate::ledger::{BookingBreakdown, LedgerStatistics, LedgerTotals, PaymentObligationLedger};
use crate::obligation::PaymentObligation;
use crate::types::{AmountMode, ContractId, ContractState, ObligationKind, PaymentStatus, PropertyId};

/// serializable view of a contract with its plan
#[derive(Debug, Serialize, Deserialize)]
pub struct ContractView {
    pub id: ContractId,
    pub reference: String,
    pub property_id: PropertyId,
    pub state: ContractState,
    pub state_changed_at: Option<DateTime<Utc>>,
    pub start_date: Option<NaiveDate>,
    pub pricing: PricingView,
    pub booking: BookingBreakdown,
    pub totals: LedgerTotals,
    pub statistics: LedgerStatistics,
    pub obligations: Vec<ObligationView>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PricingView {
    pub effective_price: Money,
    pub booking_amount: Money,
    pub booking_mode: AmountMode,
    pub dld_fee: Money,
    pub admin_fee: Money,
    pub include_dld_in_plan: bool,
    pub include_admin_in_plan: bool,
    pub remaining_balance: Money,
    pub total_payable: Money,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ObligationView {
    pub sequence: u32,
    pub kind: ObligationKind,
    pub description: String,
    pub due_date: NaiveDate,
    pub amount: Money,
    pub amount_paid: Money,
    pub outstanding: Money,
    pub status: PaymentStatus,
    pub ledger_ref: Option<String>,
}

impl ContractView {
    pub fn build(contract: &Contract, obligations: &[PaymentObligation]) -> Self {
        let ledger = PaymentObligationLedger::new(contract, obligations);

        ContractView {
            id: contract.id,
            reference: contract.reference.clone(),
            property_id: contract.property_id,
            state: contract.state,
            state_changed_at: contract.state_changed_at,
            start_date: contract.start_date,
            pricing: PricingView {
                effective_price: contract.effective_price(),
                booking_amount: contract.booking_amount(),
                booking_mode: contract.booking.mode,
                dld_fee: contract.dld_fee(),
                admin_fee: contract.admin_fee(),
                include_dld_in_plan: contract.include_dld_in_plan,
                include_admin_in_plan: contract.include_admin_in_plan,
                remaining_balance: contract.remaining_balance(),
                total_payable: contract.total_payable(),
            },
            booking: ledger.booking_breakdown(),
            totals: ledger.totals(),
            statistics: ledger.statistics(),
            obligations: obligations.iter().map(ObligationView::from_obligation).collect(),
        }
    }

    /// booking-tier progress in percent
    pub fn booking_progress(&self) -> Decimal {
        self.booking.progress
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

impl ObligationView {
    pub fn from_obligation(obligation: &PaymentObligation) -> Self {
        ObligationView {
            sequence: obligation.sequence,
            kind: obligation.kind,
            description: obligation.description.clone(),
            due_date: obligation.due_date,
            amount: obligation.amount,
            amount_paid: obligation.amount_paid,
            outstanding: obligation.outstanding(),
            status: obligation.payment_status,
            ledger_ref: obligation.ledger_ref.as_ref().map(|r| r.0.clone()),
        }
    }
}
