pub mod generator;
pub mod template;

pub use generator::{GeneratedPlan, InstallmentPlanGenerator, PlanSummary};
pub use template::{ScheduleLine, ScheduleTemplate};
