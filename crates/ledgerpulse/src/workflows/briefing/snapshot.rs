use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::extract::{find_value, parse_amount};
use super::ledger::{LedgerError, LedgerGateway, OpenItem, OpenItemKind, ReportKind};

/// Label synonyms per metric; report wording varies by vendor locale and
/// report version.
pub const CASH_LABELS: &[&str] = &["cash and cash equivalents", "cash"];
pub const RECEIVABLE_LABELS: &[&str] = &["accounts receivable", "total accounts receivable"];
pub const PAYABLE_LABELS: &[&str] = &["accounts payable", "total accounts payable"];
pub const NET_INCOME_LABELS: &[&str] = &["net income", "net earnings"];

const RECENT_WINDOW_DAYS: i64 = 7;

/// Rollup over one open line-item query.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OpenItemSummary {
    pub recent_count: u32,
    pub open_total: f64,
}

/// One point-in-time capture of a client's key financial metrics.
///
/// Every metric is individually optional: a report the extractor could not
/// read degrades that metric to "unknown" rather than zero. Immutable once
/// captured; the newest snapshot per client is the next run's baseline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub captured_at: DateTime<Utc>,
    pub cash: Option<f64>,
    pub accounts_receivable: Option<f64>,
    pub accounts_payable: Option<f64>,
    pub net_income_last_30_days: Option<f64>,
    pub invoices_open: Option<OpenItemSummary>,
    pub bills_open: Option<OpenItemSummary>,
}

/// The upstream was unreachable or returned a structurally invalid payload;
/// the affected client's run is aborted, nothing is retried here.
#[derive(Debug, thiserror::Error)]
#[error("snapshot collection failed: {source}")]
pub struct CollectionError {
    #[from]
    source: LedgerError,
}

/// Assembles a [`Snapshot`] from the accounting platform's reports and open
/// line-item queries.
pub struct SnapshotBuilder {
    ledger: Arc<dyn LedgerGateway>,
}

impl SnapshotBuilder {
    pub fn new(ledger: Arc<dyn LedgerGateway>) -> Self {
        Self { ledger }
    }

    /// The four upstream reads are independent and issued concurrently; the
    /// first hard failure aborts the build. Individual metrics the extractor
    /// cannot locate degrade to `None` instead.
    pub async fn build(&self, account_id: &str) -> Result<Snapshot, CollectionError> {
        let (balance_sheet, profit_loss, invoices, bills) = tokio::try_join!(
            self.ledger.fetch_report(account_id, ReportKind::BalanceSheet),
            self.ledger
                .fetch_report(account_id, ReportKind::ProfitAndLossLast30Days),
            self.ledger.fetch_open_items(account_id, OpenItemKind::Invoice),
            self.ledger.fetch_open_items(account_id, OpenItemKind::Bill),
        )?;

        let captured_at = Utc::now();
        Ok(Snapshot {
            captured_at,
            cash: find_value(&balance_sheet, CASH_LABELS),
            accounts_receivable: find_value(&balance_sheet, RECEIVABLE_LABELS),
            accounts_payable: find_value(&balance_sheet, PAYABLE_LABELS),
            net_income_last_30_days: find_value(&profit_loss, NET_INCOME_LABELS),
            invoices_open: Some(summarize_open_items(&invoices, captured_at)),
            bills_open: Some(summarize_open_items(&bills, captured_at)),
        })
    }
}

/// Counts items dated within the trailing week and sums outstanding
/// balances. An unparsable balance contributes zero but the item still
/// counts toward the recent tally; a dateless item never does.
pub(crate) fn summarize_open_items(items: &[OpenItem], now: DateTime<Utc>) -> OpenItemSummary {
    let week_ago = (now - Duration::days(RECENT_WINDOW_DAYS)).date_naive();
    let mut recent_count = 0u32;
    let mut open_total = 0.0f64;

    for item in items {
        if item.txn_date.is_some_and(|date| date >= week_ago) {
            recent_count += 1;
        }
        open_total += parse_amount(item.balance.as_deref()).unwrap_or(0.0);
    }

    OpenItemSummary {
        recent_count,
        open_total,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};

    fn item(id: &str, date: Option<(i32, u32, u32)>, balance: Option<&str>) -> OpenItem {
        OpenItem {
            id: id.to_string(),
            txn_date: date.and_then(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d)),
            balance: balance.map(str::to_string),
        }
    }

    fn capture_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 7, 12, 0, 0).single().expect("valid instant")
    }

    #[test]
    fn recent_window_is_inclusive_of_the_boundary_date() {
        let now = capture_time();
        let summary = summarize_open_items(
            &[
                item("on-boundary", Some((2026, 7, 31)), Some("100")),
                item("inside", Some((2026, 8, 5)), Some("50")),
                item("outside", Some((2026, 7, 20)), Some("25")),
            ],
            now,
        );
        assert_eq!(summary.recent_count, 2);
        assert_eq!(summary.open_total, 175.0);
    }

    #[test]
    fn unparsable_balance_counts_but_adds_zero() {
        let now = capture_time();
        let summary = summarize_open_items(
            &[
                item("bad-balance", Some((2026, 8, 6)), Some("oops")),
                item("good", Some((2026, 8, 6)), Some("1,200")),
            ],
            now,
        );
        assert_eq!(summary.recent_count, 2);
        assert_eq!(summary.open_total, 1200.0);
    }

    #[test]
    fn dateless_items_never_count_as_recent() {
        let now = capture_time();
        let summary = summarize_open_items(&[item("dateless", None, Some("300"))], now);
        assert_eq!(summary.recent_count, 0);
        assert_eq!(summary.open_total, 300.0);
    }

    #[test]
    fn empty_item_list_rolls_up_to_zeroes() {
        let summary = summarize_open_items(&[], capture_time());
        assert_eq!(summary.recent_count, 0);
        assert_eq!(summary.open_total, 0.0);
    }
}
