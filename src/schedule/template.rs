use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::decimal::Rate;
use crate::errors::{PlanError, Result};
use crate::types::{Frequency, TemplateId};

/// allowed drift of a template total away from 100%
const ALLOCATION_TOLERANCE: Decimal = dec!(0.01);

/// one tranche of a payment schedule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleLine {
    pub label: String,
    /// share of the post-booking balance
    pub percentage: Rate,
    pub frequency: Frequency,
    pub installment_count: u32,
    /// offset of the first installment from the contract start date
    pub days_after_start: u32,
}

impl ScheduleLine {
    pub fn new(
        label: impl Into<String>,
        percentage: Rate,
        frequency: Frequency,
        installment_count: u32,
        days_after_start: u32,
    ) -> Self {
        Self {
            label: label.into(),
            percentage,
            frequency,
            installment_count,
            days_after_start,
        }
    }

    /// single payment due `days_after_start` days in
    pub fn one_time(label: impl Into<String>, percentage: Rate, days_after_start: u32) -> Self {
        Self::new(label, percentage, Frequency::OneTime, 1, days_after_start)
    }

    /// line using the suggested installment count for its frequency
    pub fn recurring(
        label: impl Into<String>,
        percentage: Rate,
        frequency: Frequency,
        days_after_start: u32,
    ) -> Self {
        Self::new(
            label,
            percentage,
            frequency,
            frequency.suggested_installments(),
            days_after_start,
        )
    }

    pub fn validate(&self) -> Result<()> {
        let pct = self.percentage.as_percentage();
        if pct <= Decimal::ZERO || pct > Decimal::ONE_HUNDRED {
            return Err(PlanError::InvalidScheduleLine {
                line: self.label.clone(),
                message: format!("percentage must be between 0 and 100, got {}", pct.normalize()),
            });
        }
        if self.installment_count < 1 {
            return Err(PlanError::InvalidScheduleLine {
                line: self.label.clone(),
                message: "number of installments must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// day offsets of every installment in this line
    pub fn day_offsets(&self) -> impl Iterator<Item = u64> + '_ {
        let interval = self.frequency.interval_days() as u64;
        (0..self.installment_count as u64)
            .map(move |i| self.days_after_start as u64 + i * interval)
    }
}

/// named, reusable sequence of schedule lines
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleTemplate {
    pub id: TemplateId,
    pub name: String,
    pub description: Option<String>,
    pub lines: Vec<ScheduleLine>,
}

impl ScheduleTemplate {
    pub fn new(name: impl Into<String>, lines: Vec<ScheduleLine>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: None,
            lines,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// sum of line percentages, e.g. 100 for a complete template
    pub fn total_percentage(&self) -> Decimal {
        self.lines.iter().map(|l| l.percentage.as_percentage()).sum()
    }

    pub fn is_fully_allocated(&self) -> bool {
        (self.total_percentage() - Decimal::ONE_HUNDRED).abs() <= ALLOCATION_TOLERANCE
    }

    /// installment slots declared across all lines
    pub fn installment_slots(&self) -> u32 {
        self.lines.iter().map(|l| l.installment_count).sum()
    }

    /// structural checks; the 100% total is only enforced when `require_full` is set
    pub fn validate(&self, require_full: bool) -> Result<()> {
        if self.lines.is_empty() {
            return Err(PlanError::EmptyScheduleTemplate {
                template: self.name.clone(),
            });
        }
        for line in &self.lines {
            line.validate()?;
        }
        if require_full && !self.is_fully_allocated() {
            return Err(PlanError::InvalidConfiguration {
                message: format!(
                    "total percentage of '{}' must equal 100%, got {}%",
                    self.name,
                    self.total_percentage().normalize()
                ),
            });
        }
        Ok(())
    }

    /// ten percent on signing, the rest monthly over a year
    pub fn standard_offplan() -> Self {
        Self::new(
            "Standard Off-Plan",
            vec![
                ScheduleLine::one_time("Down Payment", Rate::from_percentage(10), 30),
                ScheduleLine::recurring(
                    "Monthly Installment",
                    Rate::from_percentage(60),
                    Frequency::Monthly,
                    60,
                ),
                ScheduleLine::one_time("Handover Payment", Rate::from_percentage(30), 420),
            ],
        )
        .with_description("down payment, twelve monthly installments, handover balance")
    }
}
