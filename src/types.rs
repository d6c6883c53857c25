use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// unique identifier for a sale contract
pub type ContractId = Uuid;

/// unique identifier for a schedule template
pub type TemplateId = Uuid;

/// unique identifier for the property unit being sold
pub type PropertyId = Uuid;

/// contract lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractState {
    /// created, booking-tier obligations may be issued and paid
    Draft,
    /// booking tier settled, installments may be generated
    Booked,
    /// sale confirmed
    Sold,
    /// booking refunded, property released
    Refund,
    /// contract cancelled, property released
    Cancel,
    /// administratively frozen
    Locked,
}

impl ContractState {
    /// no lifecycle transition leaves these states except an administrative lock
    pub fn is_terminal(&self) -> bool {
        matches!(self, ContractState::Sold | ContractState::Refund | ContractState::Cancel)
    }

    /// whether the property resource is held by this contract
    pub fn holds_property(&self) -> bool {
        matches!(self, ContractState::Booked | ContractState::Sold)
    }

    /// allowed lifecycle edges; guards are checked separately by the gate
    pub fn can_transition_to(&self, target: ContractState) -> bool {
        use ContractState::*;
        match (self, target) {
            (_, Locked) => true,
            (Draft, Booked) => true,
            (Booked, Sold) => true,
            (Draft | Booked, Refund | Cancel) => true,
            (Draft, _) | (Booked, _) => false,
            (Sold, _) | (Refund, _) | (Cancel, _) | (Locked, _) => false,
        }
    }
}

impl fmt::Display for ContractState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ContractState::Draft => "draft",
            ContractState::Booked => "booked",
            ContractState::Sold => "sold",
            ContractState::Refund => "refund",
            ContractState::Cancel => "cancel",
            ContractState::Locked => "locked",
        };
        f.write_str(name)
    }
}

/// how a fee or booking amount is derived
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmountMode {
    /// stored amount, edited by the user
    Fixed,
    /// share of the effective price
    Percentage,
}

/// cadence of installments inside one schedule line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    OneTime,
    Monthly,
    Quarterly,
    BiAnnual,
    Annual,
}

impl Frequency {
    /// days between consecutive installments of a line
    pub fn interval_days(&self) -> u32 {
        match self {
            Frequency::OneTime => 0,
            Frequency::Monthly => 30,
            Frequency::Quarterly => 90,
            Frequency::BiAnnual => 180,
            Frequency::Annual => 365,
        }
    }

    /// installment count offered when a line switches to this frequency
    pub fn suggested_installments(&self) -> u32 {
        match self {
            Frequency::Monthly => 12,
            Frequency::Quarterly => 4,
            Frequency::BiAnnual => 2,
            Frequency::OneTime | Frequency::Annual => 1,
        }
    }
}

/// category of a scheduled payment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObligationKind {
    Booking,
    DldFee,
    AdminFee,
    Installment,
}

impl ObligationKind {
    pub const BOOKING_TIER: [ObligationKind; 3] =
        [ObligationKind::Booking, ObligationKind::DldFee, ObligationKind::AdminFee];

    /// booking, DLD and admin must be settled before the contract is booked
    pub fn is_booking_tier(&self) -> bool {
        !matches!(self, ObligationKind::Installment)
    }

    pub fn label(&self) -> &'static str {
        match self {
            ObligationKind::Booking => "Booking Fee",
            ObligationKind::DldFee => "DLD Fee",
            ObligationKind::AdminFee => "Admin Fee",
            ObligationKind::Installment => "Installment",
        }
    }
}

impl fmt::Display for ObligationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// payment status fed back by the accounting ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Unpaid,
    Partial,
    Paid,
}

impl PaymentStatus {
    pub fn is_paid(&self) -> bool {
        matches!(self, PaymentStatus::Paid)
    }
}
