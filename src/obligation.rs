use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::types::{ContractId, ObligationKind, PaymentStatus};

/// reference to a financial document in the accounting ledger
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LedgerRef(pub String);

impl std::fmt::Display for LedgerRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// payment position of one ledger document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerPayment {
    pub status: PaymentStatus,
    pub amount_paid: Money,
}

/// one scheduled payment line of a contract
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentObligation {
    pub contract_id: ContractId,
    pub sequence: u32,
    pub kind: ObligationKind,
    pub amount: Money,
    pub due_date: NaiveDate,
    pub description: String,
    pub payment_status: PaymentStatus,
    pub amount_paid: Money,
    pub ledger_ref: Option<LedgerRef>,
}

impl PaymentObligation {
    pub fn new(
        contract_id: ContractId,
        kind: ObligationKind,
        amount: Money,
        due_date: NaiveDate,
        description: impl Into<String>,
    ) -> Self {
        Self {
            contract_id,
            sequence: 0,
            kind,
            amount,
            due_date,
            description: description.into(),
            payment_status: PaymentStatus::Unpaid,
            amount_paid: Money::ZERO,
            ledger_ref: None,
        }
    }

    /// a ledger document has been produced for this obligation
    pub fn is_posted(&self) -> bool {
        self.ledger_ref.is_some()
    }

    pub fn is_paid(&self) -> bool {
        self.payment_status.is_paid()
    }

    /// attach the ledger document issued for this obligation
    pub fn attach_ledger_ref(&mut self, reference: LedgerRef) {
        self.ledger_ref = Some(reference);
    }

    /// apply a payment update from the ledger; obligations without a document stay unpaid
    pub fn apply_ledger_payment(&mut self, payment: LedgerPayment) -> bool {
        if !self.is_posted() {
            return false;
        }
        let amount_paid = match payment.status {
            PaymentStatus::Paid if payment.amount_paid.is_zero() => self.amount,
            PaymentStatus::Unpaid => Money::ZERO,
            _ => payment.amount_paid.min(self.amount),
        };
        let changed = self.payment_status != payment.status || self.amount_paid != amount_paid;
        self.payment_status = payment.status;
        self.amount_paid = amount_paid;
        changed
    }

    pub fn outstanding(&self) -> Money {
        (self.amount - self.amount_paid).max(Money::ZERO)
    }
}

/// renumber obligations 1..=n in their current order
pub fn renumber(obligations: &mut [PaymentObligation]) {
    for (idx, obligation) in obligations.iter_mut().enumerate() {
        obligation.sequence = idx as u32 + 1;
    }
}
