pub mod config;
pub mod contract;
pub mod decimal;
pub mod errors;
pub mod events;
pub mod fees;
pub mod gate;
pub mod ledger;
pub mod memory;
pub mod obligation;
pub mod ports;
pub mod schedule;
pub mod service;
pub mod types;
pub mod views;

// re-export key types
pub use config::{FeeDueDays, PlanConfig, RegenerationPolicy};
pub use contract::{Contract, ContractBuilder};
pub use decimal::{Money, Rate};
pub use errors::{ErrorKind, PlanError, Result};
pub use events::{Event, EventStore};
pub use fees::{FeeCalculator, FeeRule, PriceBasis};
pub use gate::{BookingGate, Transition};
pub use ledger::{
    BookingBreakdown, BookingTierItem, LedgerStatistics, LedgerTotals, PaymentObligationLedger,
    TierStatus,
};
pub use memory::{
    InMemoryLedger, InMemoryPropertyRegistry, InMemoryRepository, PropertyStatus, RecordingNotifier,
};
pub use obligation::{LedgerPayment, LedgerRef, PaymentObligation};
pub use ports::{AccountingLedger, ContractRepository, Notifier, ObligationBatch, PropertyRegistry};
pub use schedule::{GeneratedPlan, InstallmentPlanGenerator, PlanSummary, ScheduleLine, ScheduleTemplate};
pub use service::PaymentPlanService;
pub use types::{
    AmountMode, ContractId, ContractState, Frequency, ObligationKind, PaymentStatus, PropertyId,
    TemplateId,
};
pub use views::{ContractView, ObligationView, PricingView};

// re-export external dependencies that users will need
pub use chrono;
pub use hourglass_rs::{SafeTimeProvider, TimeSource};
pub use rust_decimal::Decimal;
pub use uuid::Uuid;
