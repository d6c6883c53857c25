use chrono::NaiveDate;
use hourglass_rs::SafeTimeProvider;
use tracing::{info, warn};

use crate::config::{PlanConfig, RegenerationPolicy};
use crate::contract::Contract;
use crate::errors::{PlanError, Result};
use crate::events::{Event, EventStore};
use crate::gate::{BookingGate, Transition};
use crate::ledger::{BookingBreakdown, LedgerStatistics, LedgerTotals, PaymentObligationLedger};
use crate::obligation::{renumber, LedgerRef, PaymentObligation};
use crate::ports::{AccountingLedger, ContractRepository, Notifier, ObligationBatch, PropertyRegistry};
use crate::schedule::{GeneratedPlan, InstallmentPlanGenerator, PlanSummary, ScheduleTemplate};
use crate::types::{ContractId, ContractState, ObligationKind, PropertyId, TemplateId};

/// orchestrates gate, generator and ledger against the collaborators.
///
/// Each public operation loads what it needs, validates every business rule,
/// then writes through a single repository call. Events are recorded only
/// after that write succeeded.
pub struct PaymentPlanService<R, L, P, N> {
    config: PlanConfig,
    generator: InstallmentPlanGenerator,
    repository: R,
    ledger: L,
    properties: P,
    notifier: N,
    events: EventStore,
}

impl<R, L, P, N> PaymentPlanService<R, L, P, N>
where
    R: ContractRepository,
    L: AccountingLedger,
    P: PropertyRegistry,
    N: Notifier,
{
    pub fn new(config: PlanConfig, repository: R, ledger: L, properties: P, notifier: N) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            generator: InstallmentPlanGenerator::new(config.clone()),
            config,
            repository,
            ledger,
            properties,
            notifier,
            events: EventStore::new(),
        })
    }

    pub fn config(&self) -> &PlanConfig {
        &self.config
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    pub fn repository_mut(&mut self) -> &mut R {
        &mut self.repository
    }

    pub fn accounting(&self) -> &L {
        &self.ledger
    }

    pub fn accounting_mut(&mut self) -> &mut L {
        &mut self.ledger
    }

    pub fn properties(&self) -> &P {
        &self.properties
    }

    pub fn properties_mut(&mut self) -> &mut P {
        &mut self.properties
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    /// store a schedule template after structural validation
    pub fn register_template(&mut self, template: ScheduleTemplate) -> Result<TemplateId> {
        template.validate(self.config.require_full_allocation)?;
        let id = template.id;
        self.repository.insert_template(template)?;
        Ok(id)
    }

    /// store a new draft contract
    pub fn register_contract(&mut self, mut contract: Contract, time: &SafeTimeProvider) -> Result<ContractId> {
        if contract.state != ContractState::Draft {
            return Err(PlanError::InvalidTransition {
                from: contract.state,
                to: ContractState::Draft,
            });
        }
        contract.recompute_fees();
        contract.validate_pricing()?;
        contract.version = 0;

        let event = Event::ContractRegistered {
            contract_id: contract.id,
            property_id: contract.property_id,
            effective_price: contract.effective_price(),
            total_payable: contract.total_payable(),
            timestamp: time.now(),
        };
        let id = contract.id;
        self.repository.insert_contract(contract)?;

        info!(contract = %id, "contract registered");
        self.emit(event);
        Ok(id)
    }

    /// edit pricing, fee rules, start date or template of a draft contract
    pub fn update_pricing<F>(&mut self, id: ContractId, edit: F, time: &SafeTimeProvider) -> Result<Contract>
    where
        F: FnOnce(&mut Contract),
    {
        let stored = self.repository.load_contract(id)?;
        BookingGate::ensure_draft(&stored)?;

        let mut contract = stored.clone();
        edit(&mut contract);
        // lifecycle fields are not editable here
        contract.id = stored.id;
        contract.state = stored.state;
        contract.state_changed_at = stored.state_changed_at;
        contract.version = stored.version;
        contract.recompute_fees();
        contract.validate_pricing()?;

        contract.version = self.repository.save_contract(&contract)?;

        self.emit(Event::PricingUpdated {
            contract_id: id,
            effective_price: contract.effective_price(),
            booking_amount: contract.booking_amount(),
            dld_fee: contract.dld_fee(),
            admin_fee: contract.admin_fee(),
            timestamp: time.now(),
        });
        Ok(contract)
    }

    pub fn contract(&self, id: ContractId) -> Result<Contract> {
        self.repository.load_contract(id)
    }

    pub fn obligations(&self, id: ContractId) -> Result<Vec<PaymentObligation>> {
        self.repository.load_obligations(id)
    }

    pub fn booking_breakdown(&self, id: ContractId) -> Result<BookingBreakdown> {
        let contract = self.repository.load_contract(id)?;
        let obligations = self.repository.load_obligations(id)?;
        Ok(PaymentObligationLedger::new(&contract, &obligations).booking_breakdown())
    }

    pub fn ledger_totals(&self, id: ContractId) -> Result<LedgerTotals> {
        let contract = self.repository.load_contract(id)?;
        let obligations = self.repository.load_obligations(id)?;
        Ok(PaymentObligationLedger::new(&contract, &obligations).totals())
    }

    pub fn ledger_statistics(&self, id: ContractId) -> Result<LedgerStatistics> {
        let contract = self.repository.load_contract(id)?;
        let obligations = self.repository.load_obligations(id)?;
        Ok(PaymentObligationLedger::new(&contract, &obligations).statistics())
    }

    /// issue booking, DLD and admin obligations for a draft contract
    pub fn request_booking_obligations(&mut self, id: ContractId, time: &SafeTimeProvider) -> Result<GeneratedPlan> {
        let contract = self.repository.load_contract(id)?;
        BookingGate::ensure_draft(&contract)?;

        let existing = self.repository.load_obligations(id)?;
        let issued = existing.iter().filter(|o| o.kind.is_booking_tier()).count();
        if issued > 0 {
            return Err(PlanError::DuplicatePlan {
                contract_id: id,
                existing: issued,
            });
        }

        let start = self.start_date(&contract, time);
        let plan = self.generator.booking_tier(&contract, start)?;

        let mut obligations = existing;
        obligations.extend(plan.obligations.iter().cloned());
        obligations.sort_by_key(|o| o.due_date);
        renumber(&mut obligations);

        self.repository.commit(ObligationBatch::new(contract, obligations))?;

        self.emit(Event::BookingObligationsIssued {
            contract_id: id,
            count: plan.summary.obligation_count,
            total: plan.summary.total_payable,
            timestamp: time.now(),
        });
        Ok(plan)
    }

    /// draft -> booked once booking, DLD and admin are paid; reserves the property
    pub fn confirm_booking(&mut self, id: ContractId, time: &SafeTimeProvider) -> Result<Transition> {
        let mut contract = self.repository.load_contract(id)?;
        let obligations = self.repository.load_obligations(id)?;

        let transition = BookingGate::confirm_booking(&mut contract, &obligations, time.now())?;
        self.properties.reserve(contract.property_id)?;
        self.save_transition(&contract, |registry, property| registry.release(property))?;

        self.emit_transition(transition, "booking payments settled");
        Ok(transition)
    }

    /// generate the complete payment plan for a booked contract.
    ///
    /// With `RegenerationPolicy::Replace` every existing obligation is
    /// discarded, including ones already paid. With
    /// `RegenerationPolicy::KeepBookingTier` the existing booking-tier
    /// obligations are kept and a second generation is refused.
    pub fn generate_payment_plan(&mut self, id: ContractId, time: &SafeTimeProvider) -> Result<GeneratedPlan> {
        let contract = self.repository.load_contract(id)?;
        let existing = self.repository.load_obligations(id)?;
        BookingGate::ensure_can_generate(&contract, &existing)?;

        let template = match contract.schedule_template {
            Some(template_id) => Some(self.repository.load_template(template_id)?),
            None => None,
        };

        let start = self.start_date(&contract, time);
        let generated = self.generator.generate(&contract, template.as_ref(), start)?;

        let plan = match self.config.regeneration {
            RegenerationPolicy::Replace => generated,
            RegenerationPolicy::KeepBookingTier => Self::keep_booking_tier(&contract, &existing, generated)?,
        };

        self.repository
            .commit(ObligationBatch::new(contract, plan.obligations.clone()))?;

        info!(
            contract = %id,
            replaced = existing.len(),
            obligations = plan.summary.obligation_count,
            "payment plan committed"
        );

        self.emit(Event::PlanGenerated {
            contract_id: id,
            obligation_count: plan.summary.obligation_count,
            installment_count: plan.summary.installment_count,
            total_payable: plan.summary.total_payable,
            rounding_adjustment: plan.summary.rounding_adjustment,
            first_due: plan.summary.first_due,
            last_due: plan.summary.last_due,
            replaced: existing.len(),
            timestamp: time.now(),
        });
        Ok(plan)
    }

    fn keep_booking_tier(
        contract: &Contract,
        existing: &[PaymentObligation],
        generated: GeneratedPlan,
    ) -> Result<GeneratedPlan> {
        let installments = existing
            .iter()
            .filter(|o| o.kind == ObligationKind::Installment)
            .count();
        if installments > 0 {
            return Err(PlanError::DuplicatePlan {
                contract_id: contract.id,
                existing: installments,
            });
        }

        let mut obligations: Vec<PaymentObligation> = existing
            .iter()
            .filter(|o| o.kind.is_booking_tier())
            .cloned()
            .collect();
        let kept: Vec<ObligationKind> = obligations.iter().map(|o| o.kind).collect();
        obligations.extend(
            generated
                .obligations
                .into_iter()
                .filter(|o| !kept.contains(&o.kind)),
        );
        obligations.sort_by_key(|o| o.due_date);
        renumber(&mut obligations);

        let summary = PlanSummary::from_obligations(
            &obligations,
            generated.summary.total_payable,
            generated.summary.rounding_adjustment,
        );
        Ok(GeneratedPlan { obligations, summary })
    }

    /// booked -> sold; marks the property sold
    pub fn confirm_sale(&mut self, id: ContractId, time: &SafeTimeProvider) -> Result<Transition> {
        let mut contract = self.repository.load_contract(id)?;
        let obligations = self.repository.load_obligations(id)?;

        let transition = BookingGate::confirm_sale(&mut contract, &obligations, time.now())?;
        self.properties.mark_sold(contract.property_id)?;
        self.save_transition(&contract, |registry, property| registry.reserve(property))?;

        self.emit_transition(transition, "sale confirmed");
        Ok(transition)
    }

    /// draft|booked -> refund; releases the property, keeps obligations
    pub fn refund(&mut self, id: ContractId, time: &SafeTimeProvider) -> Result<Transition> {
        let mut contract = self.repository.load_contract(id)?;
        let transition = BookingGate::refund(&mut contract, time.now())?;
        self.properties.release(contract.property_id)?;
        self.save_transition(&contract, |registry, property| match transition.from {
            ContractState::Booked => registry.reserve(property),
            _ => Ok(()),
        })?;

        self.emit_transition(transition, "booking refunded");
        Ok(transition)
    }

    /// draft|booked -> cancel; releases the property, keeps obligations
    pub fn cancel(&mut self, id: ContractId, time: &SafeTimeProvider) -> Result<Transition> {
        let mut contract = self.repository.load_contract(id)?;
        let transition = BookingGate::cancel(&mut contract, time.now())?;
        self.properties.release(contract.property_id)?;
        self.save_transition(&contract, |registry, property| match transition.from {
            ContractState::Booked => registry.reserve(property),
            _ => Ok(()),
        })?;

        self.emit_transition(transition, "contract cancelled");
        Ok(transition)
    }

    /// administrative freeze
    pub fn lock(&mut self, id: ContractId, time: &SafeTimeProvider) -> Result<Transition> {
        let mut contract = self.repository.load_contract(id)?;
        let transition = BookingGate::lock(&mut contract, time.now());
        self.repository.save_contract(&contract)?;

        self.emit_transition(transition, "contract locked");
        Ok(transition)
    }

    /// ask the accounting ledger for a document for one obligation.
    /// an obligation that already has a document keeps it
    pub fn issue_ledger_document(
        &mut self,
        id: ContractId,
        sequence: u32,
        time: &SafeTimeProvider,
    ) -> Result<LedgerRef> {
        let contract = self.repository.load_contract(id)?;
        let mut obligations = self.repository.load_obligations(id)?;

        let obligation = obligations
            .iter_mut()
            .find(|o| o.sequence == sequence)
            .ok_or(PlanError::ObligationNotFound {
                contract_id: id,
                sequence,
            })?;
        if let Some(existing) = &obligation.ledger_ref {
            return Ok(existing.clone());
        }

        let reference = self.ledger.issue_document(obligation)?;
        obligation.attach_ledger_ref(reference.clone());
        let amount = obligation.amount;

        self.repository.commit(ObligationBatch::new(contract, obligations))?;

        info!(contract = %id, sequence, reference = %reference, "ledger document issued");
        self.emit(Event::LedgerDocumentIssued {
            contract_id: id,
            sequence,
            reference: reference.clone(),
            amount,
            timestamp: time.now(),
        });
        Ok(reference)
    }

    /// issue documents for every booking-tier obligation that has none yet
    pub fn issue_booking_documents(&mut self, id: ContractId, time: &SafeTimeProvider) -> Result<Vec<LedgerRef>> {
        let pending: Vec<u32> = self
            .repository
            .load_obligations(id)?
            .iter()
            .filter(|o| o.kind.is_booking_tier() && !o.is_posted())
            .map(|o| o.sequence)
            .collect();

        pending
            .into_iter()
            .map(|sequence| self.issue_ledger_document(id, sequence, time))
            .collect()
    }

    /// pull payment status for every posted obligation; returns how many changed
    pub fn sync_payment_statuses(&mut self, id: ContractId, time: &SafeTimeProvider) -> Result<usize> {
        let contract = self.repository.load_contract(id)?;
        let mut obligations = self.repository.load_obligations(id)?;

        let (was_met, old_progress) = {
            let ledger = PaymentObligationLedger::new(&contract, &obligations);
            (ledger.booking_tier_paid(), ledger.progress_percentage())
        };

        let now = time.now();
        let mut pending = Vec::new();
        for obligation in obligations.iter_mut() {
            let Some(reference) = obligation.ledger_ref.clone() else {
                continue;
            };
            let payment = self.ledger.payment(&reference)?;
            let old_status = obligation.payment_status;
            if obligation.apply_ledger_payment(payment) {
                pending.push(Event::PaymentStatusUpdated {
                    contract_id: id,
                    sequence: obligation.sequence,
                    old_status,
                    new_status: obligation.payment_status,
                    amount_paid: obligation.amount_paid,
                    timestamp: now,
                });
            }
        }

        let changed = pending.len();
        if changed == 0 {
            return Ok(0);
        }

        let (is_met, new_progress) = {
            let ledger = PaymentObligationLedger::new(&contract, &obligations);
            (ledger.booking_tier_paid(), ledger.progress_percentage())
        };
        let draft = contract.state == ContractState::Draft;

        self.repository.commit(ObligationBatch::new(contract, obligations))?;

        for event in pending {
            self.emit(event);
        }
        if new_progress != old_progress {
            self.emit(Event::BookingProgressUpdated {
                contract_id: id,
                progress: new_progress,
                timestamp: now,
            });
        }
        if draft && is_met && !was_met {
            info!(contract = %id, "booking requirements met");
            self.emit(Event::BookingRequirementsMet {
                contract_id: id,
                timestamp: now,
            });
        }

        Ok(changed)
    }

    pub fn take_events(&mut self) -> Vec<Event> {
        self.events.take_events()
    }

    pub fn events(&self) -> &[Event] {
        self.events.events()
    }

    fn start_date(&self, contract: &Contract, time: &SafeTimeProvider) -> NaiveDate {
        contract.start_date.unwrap_or_else(|| {
            let today = time.now().date_naive();
            warn!(contract = %contract.id, %today, "contract has no start date, using today");
            today
        })
    }

    /// persist a transition whose property update already went through; on a
    /// failed write the property update is reverted with `undo`
    fn save_transition<F>(&mut self, contract: &Contract, undo: F) -> Result<()>
    where
        F: FnOnce(&mut P, PropertyId) -> Result<()>,
    {
        if let Err(err) = self.repository.save_contract(contract) {
            if let Err(undo_err) = undo(&mut self.properties, contract.property_id) {
                warn!(
                    contract = %contract.id,
                    property = %contract.property_id,
                    error = %undo_err,
                    "could not revert property status after a failed save"
                );
            }
            return Err(err);
        }
        Ok(())
    }

    fn emit_transition(&mut self, transition: Transition, reason: &str) {
        self.emit(Event::StateChanged {
            contract_id: transition.contract_id,
            old_state: transition.from,
            new_state: transition.to,
            reason: reason.to_string(),
            timestamp: transition.at,
        });
    }

    fn emit(&mut self, event: Event) {
        if event.is_notifiable() {
            self.notifier.notify(&event);
        }
        self.events.emit(event);
    }
}
