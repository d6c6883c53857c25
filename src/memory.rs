use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::contract::Contract;
use crate::decimal::Money;
use crate::errors::{PlanError, Result};
use crate::events::Event;
use crate::obligation::{LedgerPayment, LedgerRef, PaymentObligation};
use crate::ports::{AccountingLedger, ContractRepository, Notifier, ObligationBatch, PropertyRegistry};
use crate::schedule::ScheduleTemplate;
use crate::types::{ContractId, PaymentStatus, PropertyId, TemplateId};

/// in-memory repository for tests and demos
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    contracts: HashMap<ContractId, Contract>,
    templates: HashMap<TemplateId, ScheduleTemplate>,
    obligations: HashMap<ContractId, Vec<PaymentObligation>>,
    fail_next_write: Option<String>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// make the next save or commit fail without writing anything
    pub fn fail_next_write(&mut self, message: impl Into<String>) {
        self.fail_next_write = Some(message.into());
    }

    fn check_version(&self, contract: &Contract) -> Result<u64> {
        let stored = self.contracts.get(&contract.id).ok_or(PlanError::NotFound {
            entity: "contract",
            id: contract.id,
        })?;
        if stored.version != contract.version {
            return Err(PlanError::ConcurrentModification {
                contract_id: contract.id,
                expected: contract.version,
                found: stored.version,
            });
        }
        Ok(stored.version + 1)
    }
}

impl ContractRepository for InMemoryRepository {
    fn insert_contract(&mut self, contract: Contract) -> Result<()> {
        if self.contracts.contains_key(&contract.id) {
            return Err(PlanError::Persistence {
                message: format!("contract {} already exists", contract.id),
            });
        }
        self.obligations.entry(contract.id).or_default();
        self.contracts.insert(contract.id, contract);
        Ok(())
    }

    fn load_contract(&self, id: ContractId) -> Result<Contract> {
        self.contracts
            .get(&id)
            .cloned()
            .ok_or(PlanError::NotFound { entity: "contract", id })
    }

    fn save_contract(&mut self, contract: &Contract) -> Result<u64> {
        if let Some(message) = self.fail_next_write.take() {
            return Err(PlanError::Persistence { message });
        }
        let version = self.check_version(contract)?;
        let mut stored = contract.clone();
        stored.version = version;
        self.contracts.insert(stored.id, stored);
        Ok(version)
    }

    fn insert_template(&mut self, template: ScheduleTemplate) -> Result<()> {
        self.templates.insert(template.id, template);
        Ok(())
    }

    fn load_template(&self, id: TemplateId) -> Result<ScheduleTemplate> {
        self.templates
            .get(&id)
            .cloned()
            .ok_or(PlanError::NotFound { entity: "schedule template", id })
    }

    fn load_obligations(&self, contract_id: ContractId) -> Result<Vec<PaymentObligation>> {
        if !self.contracts.contains_key(&contract_id) {
            return Err(PlanError::NotFound {
                entity: "contract",
                id: contract_id,
            });
        }
        let mut obligations = self.obligations.get(&contract_id).cloned().unwrap_or_default();
        obligations.sort_by_key(|o| o.sequence);
        Ok(obligations)
    }

    fn commit(&mut self, batch: ObligationBatch) -> Result<u64> {
        if let Some(message) = self.fail_next_write.take() {
            return Err(PlanError::Persistence { message });
        }

        let version = self.check_version(&batch.contract)?;
        let mut contract = batch.contract;
        contract.version = version;

        debug!(
            contract = %contract.id,
            version,
            obligations = batch.obligations.len(),
            "batch committed"
        );

        self.obligations.insert(contract.id, batch.obligations);
        self.contracts.insert(contract.id, contract);
        Ok(version)
    }
}

#[derive(Debug, Clone)]
struct LedgerDocument {
    amount: Money,
    payment: LedgerPayment,
}

/// in-memory accounting ledger issuing sequential invoice numbers
#[derive(Debug)]
pub struct InMemoryLedger {
    prefix: String,
    next_number: u32,
    documents: HashMap<LedgerRef, LedgerDocument>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::with_prefix("INV")
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next_number: 1,
            documents: HashMap::new(),
        }
    }

    /// record a customer payment against a document
    pub fn record_payment(&mut self, reference: &LedgerRef, amount: Money) -> Result<LedgerPayment> {
        let document = self.documents.get_mut(reference).ok_or_else(|| PlanError::Persistence {
            message: format!("unknown ledger document {}", reference),
        })?;

        let paid = (document.payment.amount_paid + amount).min(document.amount);
        document.payment = LedgerPayment {
            status: if paid >= document.amount {
                PaymentStatus::Paid
            } else if paid.is_positive() {
                PaymentStatus::Partial
            } else {
                PaymentStatus::Unpaid
            },
            amount_paid: paid,
        };
        Ok(document.payment)
    }

    /// settle a document in full
    pub fn settle(&mut self, reference: &LedgerRef) -> Result<LedgerPayment> {
        let outstanding = self
            .documents
            .get(reference)
            .map(|d| d.amount - d.payment.amount_paid)
            .unwrap_or(Money::ZERO);
        self.record_payment(reference, outstanding)
    }

    pub fn document_count(&self) -> usize {
        self.documents.len()
    }
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl AccountingLedger for InMemoryLedger {
    fn issue_document(&mut self, obligation: &PaymentObligation) -> Result<LedgerRef> {
        let reference = LedgerRef(format!("{}/{:05}", self.prefix, self.next_number));
        self.next_number += 1;
        self.documents.insert(
            reference.clone(),
            LedgerDocument {
                amount: obligation.amount,
                payment: LedgerPayment {
                    status: PaymentStatus::Unpaid,
                    amount_paid: Money::ZERO,
                },
            },
        );
        Ok(reference)
    }

    fn payment(&self, reference: &LedgerRef) -> Result<LedgerPayment> {
        self.documents
            .get(reference)
            .map(|d| d.payment)
            .ok_or_else(|| PlanError::Persistence {
                message: format!("unknown ledger document {}", reference),
            })
    }
}

/// availability of a property unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyStatus {
    #[default]
    Available,
    Reserved,
    Sold,
}

/// in-memory property registry
#[derive(Debug, Default)]
pub struct InMemoryPropertyRegistry {
    statuses: HashMap<PropertyId, PropertyStatus>,
}

impl InMemoryPropertyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self, property_id: PropertyId) -> PropertyStatus {
        self.statuses.get(&property_id).copied().unwrap_or_default()
    }
}

impl PropertyRegistry for InMemoryPropertyRegistry {
    fn reserve(&mut self, property_id: PropertyId) -> Result<()> {
        if self.status(property_id) == PropertyStatus::Sold {
            return Err(PlanError::Persistence {
                message: format!("property {} is already sold", property_id),
            });
        }
        self.statuses.insert(property_id, PropertyStatus::Reserved);
        Ok(())
    }

    fn mark_sold(&mut self, property_id: PropertyId) -> Result<()> {
        self.statuses.insert(property_id, PropertyStatus::Sold);
        Ok(())
    }

    fn release(&mut self, property_id: PropertyId) -> Result<()> {
        self.statuses.insert(property_id, PropertyStatus::Available);
        Ok(())
    }
}

/// notifier that keeps every event it receives
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    received: Vec<Event>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn received(&self) -> &[Event] {
        &self.received
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&mut self, event: &Event) {
        self.received.push(event.clone());
    }
}
