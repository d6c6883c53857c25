use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::PlanConfig;
use crate::decimal::{Money, Rate};
use crate::errors::{PlanError, Result};
use crate::fees::{FeeCalculator, FeeRule, PriceBasis};
use crate::types::{ContractId, ContractState, ObligationKind, PropertyId, TemplateId};

/// one property-sale agreement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contract {
    pub id: ContractId,
    pub reference: String,
    pub property_id: PropertyId,

    // pricing
    pub base_price: Option<Money>,
    pub ask_price: Option<Money>,
    pub booking: FeeRule,
    pub dld: FeeRule,
    pub admin: FeeRule,
    pub include_dld_in_plan: bool,
    pub include_admin_in_plan: bool,

    // schedule
    pub start_date: Option<NaiveDate>,
    pub schedule_template: Option<TemplateId>,

    // lifecycle
    pub state: ContractState,
    pub state_changed_at: Option<DateTime<Utc>>,
    /// optimistic concurrency token, bumped by every commit
    pub version: u64,
}

impl Contract {
    pub fn builder() -> ContractBuilder {
        ContractBuilder::new()
    }

    fn price_basis(&self) -> PriceBasis {
        PriceBasis::new(self.base_price, self.ask_price)
    }

    /// base price if set, else the negotiated ask price
    pub fn effective_price(&self) -> Money {
        self.price_basis().effective().unwrap_or(Money::ZERO)
    }

    pub fn booking_amount(&self) -> Money {
        self.booking.amount
    }

    /// DLD fee as it enters the plan (zero when excluded)
    pub fn dld_fee(&self) -> Money {
        if self.include_dld_in_plan {
            self.dld.amount
        } else {
            Money::ZERO
        }
    }

    /// admin fee as it enters the plan (zero when excluded)
    pub fn admin_fee(&self) -> Money {
        if self.include_admin_in_plan {
            self.admin.amount
        } else {
            Money::ZERO
        }
    }

    /// configured amount of a booking-tier item
    pub fn booking_tier_amount(&self, kind: ObligationKind) -> Money {
        match kind {
            ObligationKind::Booking => self.booking_amount(),
            ObligationKind::DldFee => self.dld_fee(),
            ObligationKind::AdminFee => self.admin_fee(),
            ObligationKind::Installment => Money::ZERO,
        }
    }

    /// effective price minus booking; the base split across tranches
    pub fn remaining_balance(&self) -> Money {
        self.effective_price() - self.booking_amount()
    }

    /// effective price plus the included ancillary fees
    pub fn total_payable(&self) -> Money {
        self.effective_price() + self.dld_fee() + self.admin_fee()
    }

    /// refresh percentage-derived amounts after a price or rule change
    pub fn recompute_fees(&mut self) {
        let basis = self.price_basis();
        FeeCalculator::recompute(basis, &mut self.booking);
        FeeCalculator::recompute(basis, &mut self.dld);
        FeeCalculator::recompute(basis, &mut self.admin);
    }

    pub fn set_base_price(&mut self, price: Option<Money>) {
        self.base_price = price;
        self.recompute_fees();
    }

    pub fn set_ask_price(&mut self, price: Option<Money>) {
        self.ask_price = price;
        self.recompute_fees();
    }

    pub fn set_booking_rule(&mut self, rule: FeeRule) {
        self.booking = rule;
        self.recompute_fees();
    }

    pub fn set_dld_rule(&mut self, rule: FeeRule) {
        self.dld = rule;
        self.recompute_fees();
    }

    pub fn set_admin_rule(&mut self, rule: FeeRule) {
        self.admin = rule;
        self.recompute_fees();
    }

    /// pricing invariants that must hold before any plan is generated
    pub fn validate_pricing(&self) -> Result<()> {
        for (field, amount) in [
            ("booking amount", self.booking.amount),
            ("dld fee", self.dld.amount),
            ("admin fee", self.admin.amount),
        ] {
            if amount.is_negative() {
                return Err(PlanError::NegativeAmount { field, amount });
            }
        }

        let price = self.effective_price();
        if !price.is_positive() {
            return Err(PlanError::NonPositivePrice { price });
        }

        if self.booking_amount() >= price {
            return Err(PlanError::BookingExceedsPrice {
                booking: self.booking_amount(),
                price,
            });
        }

        Ok(())
    }
}

/// builder for contracts
pub struct ContractBuilder {
    reference: Option<String>,
    property_id: Option<PropertyId>,
    base_price: Option<Money>,
    ask_price: Option<Money>,
    booking: Option<FeeRule>,
    dld: Option<FeeRule>,
    admin: Option<FeeRule>,
    include_dld: bool,
    include_admin: bool,
    start_date: Option<NaiveDate>,
    schedule_template: Option<TemplateId>,
    default_dld_rate: Rate,
    default_admin_rate: Rate,
}

impl ContractBuilder {
    pub fn new() -> Self {
        let defaults = PlanConfig::default();
        Self {
            reference: None,
            property_id: None,
            base_price: None,
            ask_price: None,
            booking: None,
            dld: None,
            admin: None,
            include_dld: true,
            include_admin: true,
            start_date: None,
            schedule_template: None,
            default_dld_rate: defaults.default_dld_rate,
            default_admin_rate: defaults.default_admin_rate,
        }
    }

    /// take default fee rates from a config
    pub fn config(mut self, config: &PlanConfig) -> Self {
        self.default_dld_rate = config.default_dld_rate;
        self.default_admin_rate = config.default_admin_rate;
        self
    }

    pub fn reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    pub fn property(mut self, property_id: PropertyId) -> Self {
        self.property_id = Some(property_id);
        self
    }

    pub fn base_price(mut self, price: Money) -> Self {
        self.base_price = Some(price);
        self
    }

    pub fn ask_price(mut self, price: Money) -> Self {
        self.ask_price = Some(price);
        self
    }

    pub fn booking(mut self, rule: FeeRule) -> Self {
        self.booking = Some(rule);
        self
    }

    pub fn dld(mut self, rule: FeeRule) -> Self {
        self.dld = Some(rule);
        self
    }

    pub fn admin(mut self, rule: FeeRule) -> Self {
        self.admin = Some(rule);
        self
    }

    pub fn include_dld(mut self, include: bool) -> Self {
        self.include_dld = include;
        self
    }

    pub fn include_admin(mut self, include: bool) -> Self {
        self.include_admin = include;
        self
    }

    pub fn start_date(mut self, date: NaiveDate) -> Self {
        self.start_date = Some(date);
        self
    }

    pub fn schedule_template(mut self, template_id: TemplateId) -> Self {
        self.schedule_template = Some(template_id);
        self
    }

    pub fn build(self) -> Contract {
        let id = Uuid::new_v4();
        let mut contract = Contract {
            id,
            reference: self.reference.unwrap_or_else(|| format!("SC-{}", &id.simple().to_string()[..8])),
            property_id: self.property_id.unwrap_or_else(Uuid::new_v4),
            base_price: self.base_price,
            ask_price: self.ask_price,
            booking: self.booking.unwrap_or_default(),
            dld: self.dld.unwrap_or(FeeRule::percentage(self.default_dld_rate)),
            admin: self.admin.unwrap_or(FeeRule::percentage(self.default_admin_rate)),
            include_dld_in_plan: self.include_dld,
            include_admin_in_plan: self.include_admin,
            start_date: self.start_date,
            schedule_template: self.schedule_template,
            state: ContractState::Draft,
            state_changed_at: None,
            version: 0,
        };
        contract.recompute_fees();
        contract
    }
}

impl Default for ContractBuilder {
    fn default() -> Self {
        Self::new()
    }
}
