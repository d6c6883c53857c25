use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::obligation::LedgerRef;
use crate::types::{ContractId, ContractState, PaymentStatus, PropertyId};

/// audit events emitted by the payment plan service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    // lifecycle events
    ContractRegistered {
        contract_id: ContractId,
        property_id: PropertyId,
        effective_price: Money,
        total_payable: Money,
        timestamp: DateTime<Utc>,
    },
    PricingUpdated {
        contract_id: ContractId,
        effective_price: Money,
        booking_amount: Money,
        dld_fee: Money,
        admin_fee: Money,
        timestamp: DateTime<Utc>,
    },
    StateChanged {
        contract_id: ContractId,
        old_state: ContractState,
        new_state: ContractState,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    // plan events
    BookingObligationsIssued {
        contract_id: ContractId,
        count: usize,
        total: Money,
        timestamp: DateTime<Utc>,
    },
    BookingRequirementsMet {
        contract_id: ContractId,
        timestamp: DateTime<Utc>,
    },
    PlanGenerated {
        contract_id: ContractId,
        obligation_count: usize,
        installment_count: usize,
        total_payable: Money,
        rounding_adjustment: Money,
        first_due: Option<NaiveDate>,
        last_due: Option<NaiveDate>,
        replaced: usize,
        timestamp: DateTime<Utc>,
    },

    // ledger events
    LedgerDocumentIssued {
        contract_id: ContractId,
        sequence: u32,
        reference: LedgerRef,
        amount: Money,
        timestamp: DateTime<Utc>,
    },
    PaymentStatusUpdated {
        contract_id: ContractId,
        sequence: u32,
        old_status: PaymentStatus,
        new_status: PaymentStatus,
        amount_paid: Money,
        timestamp: DateTime<Utc>,
    },
    BookingProgressUpdated {
        contract_id: ContractId,
        progress: Decimal,
        timestamp: DateTime<Utc>,
    },
}

impl Event {
    pub fn contract_id(&self) -> ContractId {
        match self {
            Event::ContractRegistered { contract_id, .. }
            | Event::PricingUpdated { contract_id, .. }
            | Event::StateChanged { contract_id, .. }
            | Event::BookingObligationsIssued { contract_id, .. }
            | Event::BookingRequirementsMet { contract_id, .. }
            | Event::PlanGenerated { contract_id, .. }
            | Event::LedgerDocumentIssued { contract_id, .. }
            | Event::PaymentStatusUpdated { contract_id, .. }
            | Event::BookingProgressUpdated { contract_id, .. } => *contract_id,
        }
    }

    /// events the notifier is told about
    pub fn is_notifiable(&self) -> bool {
        matches!(
            self,
            Event::BookingRequirementsMet { .. } | Event::PlanGenerated { .. }
        )
    }
}

/// event store for collecting events during operations
#[derive(Debug, Default)]
pub struct EventStore {
    events: Vec<Event>,
}

impl EventStore {
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
        }
    }

    pub fn emit(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn take_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}
