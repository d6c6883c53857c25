use crate::contract::Contract;
use crate::errors::Result;
use crate::events::Event;
use crate::obligation::{LedgerPayment, LedgerRef, PaymentObligation};
use crate::schedule::ScheduleTemplate;
use crate::types::{ContractId, PropertyId, TemplateId};

/// unit of work replacing a contract and its whole obligation set at once
#[derive(Debug, Clone, PartialEq)]
pub struct ObligationBatch {
    pub contract: Contract,
    pub obligations: Vec<PaymentObligation>,
}

impl ObligationBatch {
    pub fn new(contract: Contract, obligations: Vec<PaymentObligation>) -> Self {
        Self {
            contract,
            obligations,
        }
    }

    /// version the stored contract must still carry for the commit to apply
    pub fn expected_version(&self) -> u64 {
        self.contract.version
    }
}

/// persistence collaborator
pub trait ContractRepository {
    fn insert_contract(&mut self, contract: Contract) -> Result<()>;

    fn load_contract(&self, id: ContractId) -> Result<Contract>;

    /// write contract fields only; stale versions fail with `ConcurrentModification`.
    /// returns the new version
    fn save_contract(&mut self, contract: &Contract) -> Result<u64>;

    fn insert_template(&mut self, template: ScheduleTemplate) -> Result<()>;

    fn load_template(&self, id: TemplateId) -> Result<ScheduleTemplate>;

    /// obligations of a contract ordered by sequence
    fn load_obligations(&self, contract_id: ContractId) -> Result<Vec<PaymentObligation>>;

    /// atomically replace the contract and its obligations; all or nothing.
    /// returns the new version
    fn commit(&mut self, batch: ObligationBatch) -> Result<u64>;
}

/// accounting collaborator producing invoices and feeding back payment status
pub trait AccountingLedger {
    /// create a financial document for an obligation
    fn issue_document(&mut self, obligation: &PaymentObligation) -> Result<LedgerRef>;

    /// current payment position of a document
    fn payment(&self, reference: &LedgerRef) -> Result<LedgerPayment>;
}

/// property-resource collaborator
pub trait PropertyRegistry {
    fn reserve(&mut self, property_id: PropertyId) -> Result<()>;

    fn mark_sold(&mut self, property_id: PropertyId) -> Result<()>;

    /// return the property to the available pool
    fn release(&mut self, property_id: PropertyId) -> Result<()>;
}

/// fire-and-forget user messaging
pub trait Notifier {
    fn notify(&mut self, event: &Event);
}
