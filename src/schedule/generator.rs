use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::{FeeDueDays, PlanConfig};
use crate::contract::Contract;
use crate::decimal::Money;
use crate::errors::{PlanError, Result};
use crate::obligation::{renumber, PaymentObligation};
use crate::types::{AmountMode, ObligationKind};

use super::template::ScheduleTemplate;

/// totals of a generated plan, returned to the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanSummary {
    pub obligation_count: usize,
    pub booking_tier_count: usize,
    pub installment_count: usize,
    pub booking_amount: Money,
    pub dld_fee: Money,
    pub admin_fee: Money,
    pub installment_total: Money,
    pub total_payable: Money,
    /// residual added to the last installment during reconciliation
    pub rounding_adjustment: Money,
    pub first_due: Option<NaiveDate>,
    pub last_due: Option<NaiveDate>,
}

impl PlanSummary {
    pub(crate) fn from_obligations(
        obligations: &[PaymentObligation],
        total_payable: Money,
        rounding_adjustment: Money,
    ) -> Self {
        let sum_of = |kind: ObligationKind| -> Money {
            obligations
                .iter()
                .filter(|o| o.kind == kind)
                .map(|o| o.amount)
                .sum()
        };

        Self {
            obligation_count: obligations.len(),
            booking_tier_count: obligations.iter().filter(|o| o.kind.is_booking_tier()).count(),
            installment_count: obligations
                .iter()
                .filter(|o| o.kind == ObligationKind::Installment)
                .count(),
            booking_amount: sum_of(ObligationKind::Booking),
            dld_fee: sum_of(ObligationKind::DldFee),
            admin_fee: sum_of(ObligationKind::AdminFee),
            installment_total: sum_of(ObligationKind::Installment),
            total_payable,
            rounding_adjustment,
            first_due: obligations.iter().map(|o| o.due_date).min(),
            last_due: obligations.iter().map(|o| o.due_date).max(),
        }
    }
}

/// obligations produced by one generator run
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedPlan {
    pub obligations: Vec<PaymentObligation>,
    pub summary: PlanSummary,
}

/// turns price, fees and a schedule template into payment obligations
pub struct InstallmentPlanGenerator {
    config: PlanConfig,
}

impl InstallmentPlanGenerator {
    pub fn new(config: PlanConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PlanConfig {
        &self.config
    }

    /// generate the complete plan: booking tier followed by every installment.
    ///
    /// All preconditions are checked before the first obligation is built, so
    /// a failed call never yields a partial plan. The returned set is meant to
    /// replace whatever the contract held before.
    pub fn generate(
        &self,
        contract: &Contract,
        template: Option<&ScheduleTemplate>,
        start_date: NaiveDate,
    ) -> Result<GeneratedPlan> {
        let template = template.ok_or(PlanError::MissingScheduleTemplate {
            contract_id: contract.id,
        })?;
        template.validate(self.config.require_full_allocation)?;
        contract.validate_pricing()?;

        let flat_count = ObligationKind::BOOKING_TIER
            .iter()
            .filter(|k| contract.booking_tier_amount(**k).is_positive())
            .count() as u32;
        let required = flat_count.max(1);
        let declared = template.installment_slots();
        if declared < required {
            return Err(PlanError::InsufficientTranches { declared, required });
        }

        if !template.is_fully_allocated() {
            warn!(
                contract = %contract.id,
                template = template.name.as_str(),
                total_percentage = %template.total_percentage(),
                "schedule template does not allocate 100% of the remaining balance"
            );
        }

        let precision = self.config.currency_precision;
        let mut obligations =
            self.flat_obligations(contract, start_date, self.config.plan_fee_due_days)?;

        let flat_total: Money = obligations.iter().map(|o| o.amount).sum();
        let remaining_balance = contract.remaining_balance();
        let mut last_installment = None;

        for line in &template.lines {
            let line_total = remaining_balance.percentage(line.percentage);
            let per_installment = line_total.split(line.installment_count);

            for (idx, offset) in line.day_offsets().enumerate() {
                let description = if line.installment_count > 1 {
                    format!("{} ({}/{})", line.label, idx + 1, line.installment_count)
                } else {
                    line.label.clone()
                };

                obligations.push(PaymentObligation::new(
                    contract.id,
                    ObligationKind::Installment,
                    per_installment.round_dp(precision),
                    add_days(start_date, offset)?,
                    description,
                ));
                last_installment = Some(obligations.len() - 1);
            }
        }

        // built from the rounded tier so the obligations sum to it exactly
        let total_payable = flat_total + remaining_balance.round_dp(precision);
        let emitted: Money = obligations.iter().map(|o| o.amount).sum();
        let difference = (total_payable - emitted).round_dp(precision);

        let mut rounding_adjustment = Money::ZERO;
        if !difference.is_zero() {
            if let Some(idx) = last_installment {
                let last = &mut obligations[idx];
                last.amount += difference;
                rounding_adjustment = difference;

                debug!(
                    contract = %contract.id,
                    adjustment = %difference,
                    "rounding residual applied to last installment"
                );

                if last.amount.is_negative() {
                    warn!(
                        contract = %contract.id,
                        amount = %last.amount,
                        "reconciliation produced a negative final installment"
                    );
                }
            }
        }

        // stable: equal due dates keep emission order
        obligations.sort_by_key(|o| o.due_date);
        renumber(&mut obligations);

        let summary = PlanSummary::from_obligations(&obligations, total_payable, rounding_adjustment);

        info!(
            contract = %contract.id,
            obligations = summary.obligation_count,
            installments = summary.installment_count,
            total_payable = %summary.total_payable,
            adjustment = %summary.rounding_adjustment,
            "payment plan generated"
        );

        Ok(GeneratedPlan { obligations, summary })
    }

    /// generate only the booking, DLD and admin obligations
    pub fn booking_tier(&self, contract: &Contract, start_date: NaiveDate) -> Result<GeneratedPlan> {
        contract.validate_pricing()?;

        let mut obligations =
            self.flat_obligations(contract, start_date, self.config.booking_tier_due_days)?;
        obligations.sort_by_key(|o| o.due_date);
        renumber(&mut obligations);

        let total: Money = obligations.iter().map(|o| o.amount).sum();
        let summary = PlanSummary::from_obligations(&obligations, total, Money::ZERO);

        info!(
            contract = %contract.id,
            obligations = summary.obligation_count,
            total = %total,
            "booking obligations generated"
        );

        Ok(GeneratedPlan { obligations, summary })
    }

    fn flat_obligations(
        &self,
        contract: &Contract,
        start_date: NaiveDate,
        due_days: FeeDueDays,
    ) -> Result<Vec<PaymentObligation>> {
        let precision = self.config.currency_precision;
        let mut obligations = Vec::with_capacity(3);

        let booking = contract.booking_amount().round_dp(precision);
        if booking.is_positive() {
            let description = match contract.booking.mode {
                AmountMode::Percentage => {
                    format!("Booking Fee - {} of property price", contract.booking.rate)
                }
                AmountMode::Fixed => "Booking Fee".to_string(),
            };
            obligations.push(PaymentObligation::new(
                contract.id,
                ObligationKind::Booking,
                booking,
                start_date,
                description,
            ));
        }

        let dld = contract.dld_fee().round_dp(precision);
        if dld.is_positive() {
            obligations.push(PaymentObligation::new(
                contract.id,
                ObligationKind::DldFee,
                dld,
                add_days(start_date, due_days.dld.unwrap_or(0) as u64)?,
                "DLD Fee - Dubai Land Department",
            ));
        }

        let admin = contract.admin_fee().round_dp(precision);
        if admin.is_positive() {
            obligations.push(PaymentObligation::new(
                contract.id,
                ObligationKind::AdminFee,
                admin,
                add_days(start_date, due_days.admin.unwrap_or(0) as u64)?,
                "Admin Fee - Administrative Processing",
            ));
        }

        Ok(obligations)
    }
}

fn add_days(start: NaiveDate, days: u64) -> Result<NaiveDate> {
    start
        .checked_add_days(Days::new(days))
        .ok_or_else(|| PlanError::InvalidDate {
            message: format!("{} + {} days is out of range", start, days),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decimal::Rate;
    use crate::fees::FeeRule;
    use crate::schedule::ScheduleLine;
    use crate::types::Frequency;
    use rust_decimal_macros::dec;

    fn start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    fn contract() -> Contract {
        Contract::builder()
            .base_price(Money::from_major(1_000_000))
            .booking(FeeRule::fixed(Money::from_major(100_000)))
            .admin(FeeRule::fixed(Money::from_major(20_000)))
            .start_date(start())
            .build()
    }

    fn monthly(count: u32) -> ScheduleTemplate {
        ScheduleTemplate::new(
            "Monthly",
            vec![ScheduleLine::new("Monthly", Rate::from_percentage(100), Frequency::Monthly, count, 30)],
        )
    }

    fn total(plan: &GeneratedPlan) -> Money {
        plan.obligations.iter().map(|o| o.amount).sum()
    }

    #[test]
    fn test_flat_then_monthly_installments() {
        let generator = InstallmentPlanGenerator::new(PlanConfig::default());
        let plan = generator.generate(&contract(), Some(&monthly(9)), start()).unwrap();

        assert_eq!(plan.obligations.len(), 12);
        let kinds: Vec<ObligationKind> = plan.obligations.iter().take(3).map(|o| o.kind).collect();
        assert_eq!(
            kinds,
            vec![ObligationKind::Booking, ObligationKind::DldFee, ObligationKind::AdminFee]
        );
        for flat in &plan.obligations[..3] {
            assert_eq!(flat.due_date, start());
        }

        for (i, o) in plan.obligations[3..].iter().enumerate() {
            assert_eq!(o.kind, ObligationKind::Installment);
            assert_eq!(o.amount, Money::from_major(100_000));
            assert_eq!(o.due_date, start() + chrono::Duration::days(30 * (i as i64 + 1)));
            assert_eq!(o.description, format!("Monthly ({}/9)", i + 1));
        }

        assert_eq!(total(&plan), Money::from_major(1_060_000));
        assert_eq!(plan.summary.total_payable, Money::from_major(1_060_000));
        assert_eq!(plan.summary.rounding_adjustment, Money::ZERO);
        assert_eq!(plan.summary.installment_total, Money::from_major(900_000));
    }

    #[test]
    fn test_rounding_residual_lands_on_last_installment() {
        let generator = InstallmentPlanGenerator::new(PlanConfig::default());
        let plan = generator.generate(&contract(), Some(&monthly(7)), start()).unwrap();

        // 900,000 / 7 = 128,571.428571...
        let installments: Vec<&PaymentObligation> = plan
            .obligations
            .iter()
            .filter(|o| o.kind == ObligationKind::Installment)
            .collect();
        for o in &installments[..6] {
            assert_eq!(o.amount, Money::from_decimal(dec!(128571.43)));
        }
        assert_eq!(installments[6].amount, Money::from_decimal(dec!(128571.42)));
        assert_eq!(plan.summary.rounding_adjustment, Money::from_decimal(dec!(-0.01)));
        assert_eq!(total(&plan), Money::from_major(1_060_000));
    }

    #[test]
    fn test_single_cent_residual_is_corrected() {
        let contract = Contract::builder()
            .base_price(Money::from_major(1_000_000))
            .include_dld(false)
            .include_admin(false)
            .start_date(start())
            .build();
        let generator = InstallmentPlanGenerator::new(PlanConfig::default());
        let plan = generator.generate(&contract, Some(&monthly(3)), start()).unwrap();

        let amounts: Vec<Money> = plan.obligations.iter().map(|o| o.amount).collect();
        assert_eq!(
            amounts,
            vec![
                Money::from_decimal(dec!(333333.33)),
                Money::from_decimal(dec!(333333.33)),
                Money::from_decimal(dec!(333333.34)),
            ]
        );
    }

    #[test]
    fn test_underallocated_template_pushes_shortfall_into_last_installment() {
        let template = ScheduleTemplate::new(
            "Eighty",
            vec![ScheduleLine::new("Quarterly", Rate::from_percentage(80), Frequency::Quarterly, 4, 90)],
        );
        let generator = InstallmentPlanGenerator::new(PlanConfig::default());
        let plan = generator.generate(&contract(), Some(&template), start()).unwrap();

        let last = plan.obligations.last().unwrap();
        // 4 x 180,000 emitted, 180,000 shortfall absorbed by the final one
        assert_eq!(last.amount, Money::from_major(360_000));
        assert_eq!(plan.summary.rounding_adjustment, Money::from_major(180_000));
        assert_eq!(total(&plan), Money::from_major(1_060_000));

        let strict = InstallmentPlanGenerator::new(PlanConfig::strict());
        assert!(matches!(
            strict.generate(&contract(), Some(&template), start()),
            Err(PlanError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn test_fee_due_days_keep_due_dates_ordered() {
        let config = PlanConfig {
            plan_fee_due_days: FeeDueDays::after(45),
            ..PlanConfig::default()
        };
        let generator = InstallmentPlanGenerator::new(config);
        let plan = generator.generate(&contract(), Some(&monthly(3)), start()).unwrap();

        for pair in plan.obligations.windows(2) {
            assert!(pair[0].due_date <= pair[1].due_date);
            assert_eq!(pair[0].sequence + 1, pair[1].sequence);
        }
        // booking, installment at day 30, fees at day 45
        assert_eq!(plan.obligations[1].kind, ObligationKind::Installment);
        assert_eq!(plan.obligations[2].kind, ObligationKind::DldFee);
        assert_eq!(plan.obligations[3].kind, ObligationKind::AdminFee);
    }

    #[test]
    fn test_preconditions() {
        let generator = InstallmentPlanGenerator::new(PlanConfig::default());

        assert!(matches!(
            generator.generate(&contract(), None, start()),
            Err(PlanError::MissingScheduleTemplate { .. })
        ));

        let one_slot = monthly(1);
        assert_eq!(
            generator.generate(&contract(), Some(&one_slot), start()).unwrap_err(),
            PlanError::InsufficientTranches { declared: 1, required: 3 }
        );

        let mut no_fees = contract();
        no_fees.set_booking_rule(FeeRule::none());
        no_fees.include_dld_in_plan = false;
        no_fees.include_admin_in_plan = false;
        assert!(generator.generate(&no_fees, Some(&one_slot), start()).is_ok());

        let mut full_booking = contract();
        full_booking.set_booking_rule(FeeRule::fixed(Money::from_major(1_000_000)));
        let err = generator.generate(&full_booking, Some(&monthly(9)), start()).unwrap_err();
        assert_eq!(err.kind(), crate::errors::ErrorKind::InvariantViolation);
    }

    #[test]
    fn test_generation_is_deterministic() {
        let generator = InstallmentPlanGenerator::new(PlanConfig::default());
        let contract = contract();
        let template = ScheduleTemplate::standard_offplan();
        let first = generator.generate(&contract, Some(&template), start()).unwrap();
        let second = generator.generate(&contract, Some(&template), start()).unwrap();
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first.obligations).unwrap(),
            serde_json::to_string(&second.obligations).unwrap()
        );
    }

    #[test]
    fn test_booking_tier_only() {
        let generator = InstallmentPlanGenerator::new(PlanConfig::default());
        let plan = generator.booking_tier(&contract(), start()).unwrap();

        assert_eq!(plan.obligations.len(), 3);
        assert!(plan.obligations.iter().all(|o| o.kind.is_booking_tier()));
        assert_eq!(plan.obligations[0].due_date, start());
        assert_eq!(plan.obligations[1].due_date, start() + chrono::Duration::days(30));
        assert_eq!(plan.summary.total_payable, Money::from_major(160_000));
    }

    #[test]
    fn test_percentage_booking_description() {
        let contract = Contract::builder()
            .base_price(Money::from_major(2_000_000))
            .booking(FeeRule::percentage(Rate::from_percentage(10)))
            .build();
        let generator = InstallmentPlanGenerator::new(PlanConfig::default());
        let plan = generator.booking_tier(&contract, start()).unwrap();
        assert_eq!(plan.obligations[0].amount, Money::from_major(200_000));
        assert_eq!(plan.obligations[0].description, "Booking Fee - 10% of property price");
    }
    #[test]
    fn test_whole_unit_precision_keeps_sum_exact() {
        // DLD is 4% of 1,000,003 = 40,000.12
        let contract = Contract::builder()
            .base_price(Money::from_major(1_000_003))
            .booking(FeeRule::fixed(Money::from_major(100_000)))
            .admin(FeeRule::fixed(Money::from_major(20_000)))
            .build();
        let config = PlanConfig {
            currency_precision: 0,
            ..PlanConfig::default()
        };
        let plan = InstallmentPlanGenerator::new(config)
            .generate(&contract, Some(&monthly(9)), start())
            .unwrap();

        let dld = plan.obligations.iter().find(|o| o.kind == ObligationKind::DldFee).unwrap();
        assert_eq!(dld.amount, Money::from_major(40_000));
        for o in &plan.obligations {
            assert_eq!(o.amount, o.amount.round_dp(0));
        }
        assert_eq!(plan.summary.total_payable, Money::from_major(1_060_003));
        assert_eq!(total(&plan), plan.summary.total_payable);
    }

    #[test]
    fn test_sub_cent_fixed_fee_is_rounded() {
        let mut contract = contract();
        contract.set_admin_rule(FeeRule::fixed(Money::from_decimal(dec!(20000.005))));
        let generator = InstallmentPlanGenerator::new(PlanConfig::default());

        let plan = generator.generate(&contract, Some(&monthly(9)), start()).unwrap();
        let admin = plan.obligations.iter().find(|o| o.kind == ObligationKind::AdminFee).unwrap();
        assert_eq!(admin.amount, Money::from_decimal(dec!(20000.01)));
        assert_eq!(plan.summary.total_payable, Money::from_decimal(dec!(1060000.01)));
        assert_eq!(total(&plan), plan.summary.total_payable);

        let tier = generator.booking_tier(&contract, start()).unwrap();
        let tier_admin = tier.obligations.iter().find(|o| o.kind == ObligationKind::AdminFee).unwrap();
        assert_eq!(tier_admin.amount, Money::from_decimal(dec!(20000.01)));
        assert_eq!(total(&tier), tier.summary.total_payable);
    }

    #[test]
    fn test_residual_goes_to_last_line_in_template_order() {
        // the final line is due first; it still absorbs the residual
        let template = ScheduleTemplate::new(
            "Out of order",
            vec![
                ScheduleLine::one_time("Handover", Rate::from_percent(dec!(33.33)), 400),
                ScheduleLine::one_time("Construction", Rate::from_percent(dec!(33.33)), 200),
                ScheduleLine::one_time("Down Payment", Rate::from_percent(dec!(33.33)), 30),
            ],
        );
        let generator = InstallmentPlanGenerator::new(PlanConfig::default());
        let plan = generator.generate(&contract(), Some(&template), start()).unwrap();

        let find = |label: &str| plan.obligations.iter().find(|o| o.description == label).unwrap();
        assert_eq!(find("Handover").amount, Money::from_major(299_970));
        assert_eq!(find("Construction").amount, Money::from_major(299_970));
        assert_eq!(find("Down Payment").amount, Money::from_major(300_060));
        assert_eq!(plan.obligations[3].description, "Down Payment");
        assert_eq!(plan.obligations.last().unwrap().description, "Handover");
        assert_eq!(total(&plan), Money::from_major(1_060_000));
    }
}
