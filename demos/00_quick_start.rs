/// quick start - generate a payment plan for one contract
use chrono::NaiveDate;
use payment_plan_rs::{
    Contract, FeeRule, InstallmentPlanGenerator, Money, PlanConfig, ScheduleTemplate,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "payment_plan_rs=info".to_string()),
        )
        .init();

    let start = NaiveDate::from_ymd_opt(2024, 1, 1).ok_or("invalid date")?;

    // 1.2M apartment, 10% booking is fixed at 120k, DLD and admin at default rates
    let contract = Contract::builder()
        .reference("SC-0001")
        .base_price(Money::from_major(1_200_000))
        .booking(FeeRule::fixed(Money::from_major(120_000)))
        .start_date(start)
        .build();

    let generator = InstallmentPlanGenerator::new(PlanConfig::default());
    let plan = generator.generate(&contract, Some(&ScheduleTemplate::standard_offplan()), start)?;

    for o in &plan.obligations {
        println!("{:>3}  {}  {:<28} {:>14}", o.sequence, o.due_date, o.description, o.amount);
    }
    println!("\ntotal payable: {}", plan.summary.total_payable);

    Ok(())
}
