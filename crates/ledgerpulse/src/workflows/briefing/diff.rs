use serde::Serialize;

use super::snapshot::Snapshot;

/// A scalar move of at least this many currency units is significant.
pub const SCALAR_DELTA_THRESHOLD: f64 = 500.0;
/// A scalar move of at least this percentage is significant.
pub const SCALAR_PERCENT_THRESHOLD: f64 = 10.0;
/// Aggregate sub-fields use a flat unit threshold; no percent branch.
pub const AGGREGATE_DELTA_THRESHOLD: f64 = 3.0;
/// Marker rendered when a percent figure is undefined.
pub const PERCENT_NOT_APPLICABLE: &str = "n/a";

// Float metrics round-trip through captures; moves below this are noise,
// not changes.
const NOISE_EPSILON: f64 = 1e-6;

/// One significant metric delta, pre-formatted for display. Callers must
/// not re-sort the list the detector returns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeRecord {
    pub label: &'static str,
    pub current: String,
    pub previous: String,
    pub delta: String,
    pub percent: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiffOutcome {
    pub is_first_run: bool,
    pub changes: Vec<ChangeRecord>,
}

/// Compares two snapshots and keeps the deltas that matter.
///
/// A missing baseline marks the run as first and produces no changes; a
/// baseline-only run must never generate a draft. A metric unknown on
/// either side is skipped outright, since "unknown" is neither zero nor a
/// change.
pub fn diff(current: &Snapshot, previous: Option<&Snapshot>) -> DiffOutcome {
    let Some(previous) = previous else {
        return DiffOutcome {
            is_first_run: true,
            changes: Vec::new(),
        };
    };

    let mut changes = Vec::new();

    compare_scalar(&mut changes, "Cash balance", current.cash, previous.cash);
    compare_scalar(
        &mut changes,
        "Accounts receivable",
        current.accounts_receivable,
        previous.accounts_receivable,
    );
    compare_scalar(
        &mut changes,
        "Accounts payable",
        current.accounts_payable,
        previous.accounts_payable,
    );
    compare_scalar(
        &mut changes,
        "Net income (last 30 days)",
        current.net_income_last_30_days,
        previous.net_income_last_30_days,
    );

    let invoice_counts = (
        current.invoices_open.map(|s| f64::from(s.recent_count)),
        previous.invoices_open.map(|s| f64::from(s.recent_count)),
    );
    let bill_counts = (
        current.bills_open.map(|s| f64::from(s.recent_count)),
        previous.bills_open.map(|s| f64::from(s.recent_count)),
    );
    let invoice_totals = (
        current.invoices_open.map(|s| s.open_total),
        previous.invoices_open.map(|s| s.open_total),
    );
    let bill_totals = (
        current.bills_open.map(|s| s.open_total),
        previous.bills_open.map(|s| s.open_total),
    );

    compare_aggregate(
        &mut changes,
        "Open invoices (count)",
        invoice_counts,
        format_integer,
    );
    compare_aggregate(
        &mut changes,
        "Open bills (count)",
        bill_counts,
        format_integer,
    );
    compare_aggregate(
        &mut changes,
        "Open invoices (balance)",
        invoice_totals,
        format_currency,
    );
    compare_aggregate(
        &mut changes,
        "Open bills (balance)",
        bill_totals,
        format_currency,
    );

    DiffOutcome {
        is_first_run: false,
        changes,
    }
}

fn compare_scalar(
    changes: &mut Vec<ChangeRecord>,
    label: &'static str,
    current: Option<f64>,
    previous: Option<f64>,
) {
    let (Some(current), Some(previous)) = (current, previous) else {
        return;
    };
    let delta = current - previous;
    if delta.abs() < NOISE_EPSILON {
        return;
    }

    let percent = (previous != 0.0).then(|| delta / previous * 100.0);
    let significant = delta.abs() >= SCALAR_DELTA_THRESHOLD
        || percent.is_some_and(|pct| pct.abs() >= SCALAR_PERCENT_THRESHOLD);
    if !significant {
        return;
    }

    changes.push(ChangeRecord {
        label,
        current: format_currency(current),
        previous: format_currency(previous),
        delta: format_currency(delta),
        percent: percent
            .map(format_percent)
            .unwrap_or_else(|| PERCENT_NOT_APPLICABLE.to_string()),
    });
}

fn compare_aggregate(
    changes: &mut Vec<ChangeRecord>,
    label: &'static str,
    values: (Option<f64>, Option<f64>),
    format: fn(f64) -> String,
) {
    let (Some(current), Some(previous)) = values else {
        return;
    };
    let delta = current - previous;
    if delta.abs() < AGGREGATE_DELTA_THRESHOLD {
        return;
    }

    changes.push(ChangeRecord {
        label,
        current: format(current),
        previous: format(previous),
        delta: format(delta),
        percent: PERCENT_NOT_APPLICABLE.to_string(),
    });
}

/// Whole currency units with thousands separators, e.g. `-$1,250`.
pub(crate) fn format_currency(value: f64) -> String {
    let rounded = value.round();
    let grouped = group_thousands(rounded.abs() as u64);
    if rounded < 0.0 {
        format!("-${grouped}")
    } else {
        format!("${grouped}")
    }
}

/// Plain integer with thousands separators.
pub(crate) fn format_integer(value: f64) -> String {
    let rounded = value.round();
    let grouped = group_thousands(rounded.abs() as u64);
    if rounded < 0.0 {
        format!("-{grouped}")
    } else {
        grouped
    }
}

fn format_percent(percent: f64) -> String {
    format!("{percent:.1}%")
}

fn group_thousands(mut value: u64) -> String {
    let mut groups = Vec::new();
    loop {
        let group = value % 1000;
        value /= 1000;
        if value == 0 {
            groups.push(group.to_string());
            break;
        }
        groups.push(format!("{group:03}"));
    }
    groups.reverse();
    groups.join(",")
}
