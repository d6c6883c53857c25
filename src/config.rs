use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::decimal::{Rate, CURRENCY_DP};
use crate::errors::{PlanError, Result};

/// engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanConfig {
    pub currency_precision: u32,
    /// fee due offsets used by the complete payment plan
    pub plan_fee_due_days: FeeDueDays,
    /// fee due offsets used when only the booking tier is issued
    pub booking_tier_due_days: FeeDueDays,
    pub regeneration: RegenerationPolicy,
    /// reject templates whose percentages do not total 100%
    pub require_full_allocation: bool,
    pub default_dld_rate: Rate,
    pub default_admin_rate: Rate,
}

/// days after the contract start at which ancillary fees fall due
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FeeDueDays {
    pub dld: Option<u32>,
    pub admin: Option<u32>,
}

impl FeeDueDays {
    pub fn on_start() -> Self {
        Self { dld: None, admin: None }
    }

    pub fn after(days: u32) -> Self {
        Self {
            dld: Some(days),
            admin: Some(days),
        }
    }
}

/// what happens to existing obligations when a plan is generated again
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegenerationPolicy {
    /// discard every existing obligation, paid or not
    #[default]
    Replace,
    /// keep the existing booking-tier obligations with their payments and
    /// refuse with `DuplicatePlan` when installments already exist
    KeepBookingTier,
}

impl Default for PlanConfig {
    fn default() -> Self {
        Self {
            currency_precision: CURRENCY_DP,
            plan_fee_due_days: FeeDueDays::on_start(),
            booking_tier_due_days: FeeDueDays::after(30),
            regeneration: RegenerationPolicy::Replace,
            require_full_allocation: false,
            default_dld_rate: Rate::from_percentage(4),
            default_admin_rate: Rate::from_percentage(2),
        }
    }
}

impl PlanConfig {
    /// strict variant: full templates only, no silent replacement of an existing plan
    pub fn strict() -> Self {
        Self {
            regeneration: RegenerationPolicy::KeepBookingTier,
            require_full_allocation: true,
            ..Self::default()
        }
    }

    /// load from json, filling missing fields with defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let config: PlanConfig =
            serde_json::from_str(json).map_err(|e| PlanError::InvalidConfiguration {
                message: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.currency_precision > 8 {
            return Err(PlanError::InvalidConfiguration {
                message: format!(
                    "currency precision {} exceeds working precision",
                    self.currency_precision
                ),
            });
        }
        for (name, rate) in [("dld", self.default_dld_rate), ("admin", self.default_admin_rate)] {
            if rate.as_decimal() < dec!(0) || rate.as_decimal() > dec!(1) {
                return Err(PlanError::InvalidConfiguration {
                    message: format!("default {} rate {} out of range", name, rate),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PlanConfig::default();
        assert_eq!(config.currency_precision, 2);
        assert_eq!(config.plan_fee_due_days, FeeDueDays::on_start());
        assert_eq!(config.booking_tier_due_days.dld, Some(30));
        assert_eq!(config.regeneration, RegenerationPolicy::Replace);
        assert!(!config.require_full_allocation);
        assert_eq!(config.default_dld_rate, Rate::from_percentage(4));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_json_partial() {
        let config = PlanConfig::from_json(
            r#"{ "regeneration": "keep_booking_tier", "plan_fee_due_days": { "dld": 15, "admin": null } }"#,
        )
        .unwrap();
        assert_eq!(config.regeneration, RegenerationPolicy::KeepBookingTier);
        assert_eq!(config.plan_fee_due_days.dld, Some(15));
        assert_eq!(config.plan_fee_due_days.admin, None);
        assert_eq!(config.currency_precision, 2);
    }

    #[test]
    fn test_from_json_rejects_garbage() {
        let err = PlanConfig::from_json("{ not json").unwrap_err();
        assert!(matches!(err, PlanError::InvalidConfiguration { .. }));

        let err = PlanConfig::from_json(r#"{ "currency_precision": 12 }"#).unwrap_err();
        assert!(matches!(err, PlanError::InvalidConfiguration { .. }));
    }

    #[test]
    fn test_round_trip_through_json() {
        let config = PlanConfig::strict();
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(PlanConfig::from_json(&json).unwrap(), config);
    }
}
