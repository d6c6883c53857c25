/// json view - render a contract and its plan
use chrono::NaiveDate;
use payment_plan_rs::{
    Contract, ContractView, FeeRule, InstallmentPlanGenerator, Money, PlanConfig, Rate,
    ScheduleTemplate,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "payment_plan_rs=warn".to_string()),
        )
        .init();

    let config = PlanConfig::from_json(
        r#"{ "plan_fee_due_days": { "dld": 30, "admin": 30 }, "require_full_allocation": true }"#,
    )?;
    let start = NaiveDate::from_ymd_opt(2024, 6, 1).ok_or("invalid date")?;

    let contract = Contract::builder()
        .config(&config)
        .reference("SC-0107")
        .ask_price(Money::from_major(2_350_000))
        .booking(FeeRule::percentage(Rate::from_percentage(5)))
        .include_admin(false)
        .start_date(start)
        .build();

    let plan = InstallmentPlanGenerator::new(config)
        .generate(&contract, Some(&ScheduleTemplate::standard_offplan()), start)?;

    let view = ContractView::build(&contract, &plan.obligations);
    println!("{}", view.to_json_pretty()?);

    Ok(())
}
