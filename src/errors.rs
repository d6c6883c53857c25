use thiserror::Error;
use uuid::Uuid;

use crate::decimal::Money;
use crate::ledger::BookingBreakdown;
use crate::types::{ContractId, ContractState};

/// error taxonomy surfaced to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    InvariantViolation,
    BookingRequirementsNotMet,
    NoInstallmentPlan,
    DuplicatePlan,
    InvalidTransition,
    Locked,
    Persistence,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlanError {
    #[error("no payment schedule template attached to contract {contract_id}")]
    MissingScheduleTemplate {
        contract_id: ContractId,
    },

    #[error("payment schedule '{template}' has no lines")]
    EmptyScheduleTemplate {
        template: String,
    },

    #[error("payment schedule declares {declared} installment slots, at least {required} needed")]
    InsufficientTranches {
        declared: u32,
        required: u32,
    },

    #[error("invalid schedule line '{line}': {message}")]
    InvalidScheduleLine {
        line: String,
        message: String,
    },

    #[error("invalid configuration: {message}")]
    InvalidConfiguration {
        message: String,
    },

    #[error("effective price must be greater than zero, got {price}")]
    NonPositivePrice {
        price: Money,
    },

    #[error("booking amount {booking} leaves no balance against effective price {price}")]
    BookingExceedsPrice {
        booking: Money,
        price: Money,
    },

    #[error("{field} cannot be negative: {amount}")]
    NegativeAmount {
        field: &'static str,
        amount: Money,
    },

    #[error("booking requirements not met: {breakdown}")]
    BookingRequirementsNotMet {
        breakdown: BookingBreakdown,
    },

    #[error("contract {contract_id} has no installment plan")]
    NoInstallmentPlan {
        contract_id: ContractId,
    },

    #[error("contract {contract_id} already has {existing} obligation(s) that would be replaced")]
    DuplicatePlan {
        contract_id: ContractId,
        existing: usize,
    },

    #[error("invalid transition: {from} -> {to}")]
    InvalidTransition {
        from: ContractState,
        to: ContractState,
    },

    #[error("contract must be booked to generate installments, current state: {state}")]
    NotBooked {
        state: ContractState,
    },

    #[error("contract {contract_id} is locked")]
    ContractLocked {
        contract_id: ContractId,
    },

    #[error("invalid date: {message}")]
    InvalidDate {
        message: String,
    },

    #[error("{entity} not found: {id}")]
    NotFound {
        entity: &'static str,
        id: Uuid,
    },

    #[error("obligation {sequence} not found on contract {contract_id}")]
    ObligationNotFound {
        contract_id: ContractId,
        sequence: u32,
    },

    #[error("concurrent modification of contract {contract_id}: expected version {expected}, found {found}")]
    ConcurrentModification {
        contract_id: ContractId,
        expected: u64,
        found: u64,
    },

    #[error("persistence error: {message}")]
    Persistence {
        message: String,
    },
}

impl PlanError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PlanError::MissingScheduleTemplate { .. }
            | PlanError::EmptyScheduleTemplate { .. }
            | PlanError::InsufficientTranches { .. }
            | PlanError::InvalidScheduleLine { .. }
            | PlanError::InvalidConfiguration { .. } => ErrorKind::Configuration,
            PlanError::NonPositivePrice { .. }
            | PlanError::BookingExceedsPrice { .. }
            | PlanError::NegativeAmount { .. }
            | PlanError::InvalidDate { .. } => ErrorKind::InvariantViolation,
            PlanError::BookingRequirementsNotMet { .. } => ErrorKind::BookingRequirementsNotMet,
            PlanError::NoInstallmentPlan { .. } => ErrorKind::NoInstallmentPlan,
            PlanError::DuplicatePlan { .. } => ErrorKind::DuplicatePlan,
            PlanError::InvalidTransition { .. } | PlanError::NotBooked { .. } => {
                ErrorKind::InvalidTransition
            }
            PlanError::ContractLocked { .. } => ErrorKind::Locked,
            PlanError::NotFound { .. }
            | PlanError::ObligationNotFound { .. }
            | PlanError::ConcurrentModification { .. }
            | PlanError::Persistence { .. } => ErrorKind::Persistence,
        }
    }

    /// business-rule violations raised before any mutation
    pub fn is_business_rule(&self) -> bool {
        self.kind() != ErrorKind::Persistence
    }
}

pub type Result<T> = std::result::Result<T, PlanError>;
