/// booking lifecycle - booking payments, confirmation, plan, sale
use chrono::{Duration, TimeZone, Utc};
use payment_plan_rs::{
    Contract, FeeRule, Frequency, InMemoryLedger, InMemoryPropertyRegistry, InMemoryRepository,
    Money, PaymentPlanService, PlanConfig, Rate, RecordingNotifier, SafeTimeProvider,
    ScheduleLine, ScheduleTemplate, TimeSource,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "payment_plan_rs=info".to_string()),
        )
        .init();

    println!("=== booking lifecycle example ===\n");

    let time = SafeTimeProvider::new(TimeSource::Test(
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
    ));
    let controller = time.test_control().unwrap();

    let mut service = PaymentPlanService::new(
        PlanConfig::default(),
        InMemoryRepository::new(),
        InMemoryLedger::new(),
        InMemoryPropertyRegistry::new(),
        RecordingNotifier::new(),
    )?;

    let template_id = service.register_template(ScheduleTemplate::new(
        "Quarterly Two Years",
        vec![
            ScheduleLine::one_time("Down Payment", Rate::from_percentage(20), 30),
            ScheduleLine::new("Quarterly", Rate::from_percentage(80), Frequency::Quarterly, 8, 90),
        ],
    ))?;

    let contract = Contract::builder()
        .base_price(Money::from_major(850_000))
        .booking(FeeRule::percentage(Rate::from_percentage(10)))
        .admin(FeeRule::fixed(Money::from_major(4_200)))
        .start_date(time.now().date_naive())
        .schedule_template(template_id)
        .build();
    let id = service.register_contract(contract, &time)?;

    // booking-tier invoices
    service.request_booking_obligations(id, &time)?;
    let refs = service.issue_booking_documents(id, &time)?;
    println!("issued {} booking documents", refs.len());

    // trying to generate now fails with a breakdown
    if let Err(err) = service.generate_payment_plan(id, &time) {
        println!("not yet: {}", err);
    }

    // customer pays over the next weeks
    for reference in &refs {
        controller.advance(Duration::days(7));
        service.accounting_mut().settle(reference)?;
        service.sync_payment_statuses(id, &time)?;
        println!(
            "{}: booking progress {}%",
            time.now().format("%Y-%m-%d"),
            service.booking_breakdown(id)?.progress
        );
    }

    service.confirm_booking(id, &time)?;
    let plan = service.generate_payment_plan(id, &time)?;
    println!(
        "\nplan: {} obligations, {} installments, total {}",
        plan.summary.obligation_count, plan.summary.installment_count, plan.summary.total_payable
    );

    let transition = service.confirm_sale(id, &time)?;
    println!("contract {} -> {} at {}", transition.from, transition.to, transition.at);

    println!("\nevents:");
    for event in service.take_events() {
        println!("  {:?}", event);
    }

    Ok(())
}
