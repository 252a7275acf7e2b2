use chrono::{Duration, Utc};
use clap::{Args, ValueEnum};
use ledgerpulse::error::AppError;
use ledgerpulse::workflows::briefing::{
    next_run, BriefingError, ClientRunOutcome, OpenItem, Schedule,
};

use crate::infra::{build_demo_wiring, default_tenant, DemoFeed};

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Print full draft bodies instead of subjects only
    #[arg(long)]
    pub(crate) show_bodies: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub(crate) enum CadenceArg {
    Weekly,
    Biweekly,
    Monthly,
}

#[derive(Args, Debug)]
pub(crate) struct SchedulePreviewArgs {
    /// Cadence to preview
    #[arg(long, value_enum)]
    pub(crate) cadence: CadenceArg,
    /// Day of week, 0 = Sunday (weekly/biweekly)
    #[arg(long, default_value_t = 1)]
    pub(crate) day_of_week: u8,
    /// Day of month, 1..=28 (monthly)
    #[arg(long, default_value_t = 1)]
    pub(crate) day_of_month: u8,
    /// Hour of day, 0..=23
    #[arg(long, default_value_t = 9)]
    pub(crate) hour: u8,
    /// How many upcoming runs to print
    #[arg(long, default_value_t = 5)]
    pub(crate) count: usize,
}

pub(crate) fn run_schedule_preview(args: SchedulePreviewArgs) -> Result<(), AppError> {
    let schedule = match args.cadence {
        CadenceArg::Weekly => Schedule::weekly(args.day_of_week, args.hour),
        CadenceArg::Biweekly => Schedule::biweekly(args.day_of_week, args.hour),
        CadenceArg::Monthly => Schedule::monthly(args.day_of_month, args.hour),
    }
    .map_err(BriefingError::from)?;

    println!("Upcoming runs for a {:?} cadence:", args.cadence);
    let mut from = Utc::now();
    for index in 1..=args.count {
        let Some(next) = next_run(&schedule, from) else {
            break;
        };
        println!("{index:>3}. {}", next.format("%Y-%m-%d %H:%M UTC"));
        from = next;
    }

    Ok(())
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let wiring = build_demo_wiring();
    let tenant = default_tenant();

    println!("== Pass 1: baseline capture ==");
    let first = wiring
        .service
        .run_on_demand(&tenant, None)
        .await
        .map_err(AppError::from)?;
    print_outcomes(&first);

    // Move one client's books between passes so the second capture has
    // something to report; the other client stays flat.
    let ledger = wiring
        .demo_ledger
        .as_ref()
        .expect("demo wiring always carries the demo ledger");
    let mut feed = DemoFeed::harborview();
    feed.cash = Some(14_050.0);
    feed.payable = Some(3_400.0);
    let yesterday = (Utc::now() - Duration::days(1)).date_naive();
    feed.invoices = (1..=3)
        .map(|index| OpenItem {
            id: format!("demo-invoice-{index}"),
            txn_date: Some(yesterday),
            balance: Some("450".to_string()),
        })
        .collect();
    ledger.set_feed("demo-account-1", feed);

    println!();
    println!("== Pass 2: changes detected ==");
    let second = wiring
        .service
        .run_on_demand(&tenant, None)
        .await
        .map_err(AppError::from)?;
    print_outcomes(&second);

    println!();
    println!("== Pending drafts ==");
    let drafts = wiring.service.list_drafts(&tenant).map_err(AppError::from)?;
    for draft in &drafts {
        println!(
            "{} | {} | {} change(s) | {}",
            draft.id.0,
            draft.subject,
            draft.change_count,
            draft.status.label()
        );
        if args.show_bodies {
            println!("{}", draft.body);
            println!();
        }
    }

    if let Some(draft) = drafts.first() {
        let approved = wiring
            .service
            .approve_draft(&tenant, &draft.id)
            .await
            .map_err(AppError::from)?;
        println!();
        println!(
            "Approved {} -> mailbox draft {}",
            approved.id.0,
            approved.mailbox_draft_id.as_deref().unwrap_or("(none)")
        );
    }

    Ok(())
}

fn print_outcomes(outcomes: &[ClientRunOutcome]) {
    for outcome in outcomes {
        let status = if let Some(error) = &outcome.error {
            format!("failed: {error}")
        } else if let Some(reason) = outcome.skipped {
            format!("skipped ({})", reason.label())
        } else if let Some(draft_id) = &outcome.draft_id {
            format!("draft {} created", draft_id.0)
        } else {
            "completed".to_string()
        };
        println!(
            "{} | {} change(s) | {}",
            outcome.client_id.0, outcome.change_count, status
        );
    }
}
