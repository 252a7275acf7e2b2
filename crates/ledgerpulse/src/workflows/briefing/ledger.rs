use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::Value;

use super::extract::{Cell, DataRow, ReportNode, ReportTree, SectionNode};

/// Reports the snapshot pipeline knows how to consume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    BalanceSheet,
    ProfitAndLossLast30Days,
}

impl ReportKind {
    pub const fn endpoint(self) -> &'static str {
        match self {
            Self::BalanceSheet => "BalanceSheet",
            Self::ProfitAndLossLast30Days => "ProfitAndLoss",
        }
    }
}

/// Open line-item entities queried alongside the reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenItemKind {
    Invoice,
    Bill,
}

impl OpenItemKind {
    pub const fn entity(self) -> &'static str {
        match self {
            Self::Invoice => "Invoice",
            Self::Bill => "Bill",
        }
    }
}

/// One open invoice or bill, reduced to the fields the summarizer needs.
/// The balance stays textual so an unparsable amount can degrade to zero
/// instead of failing deserialization upstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenItem {
    pub id: String,
    pub txn_date: Option<NaiveDate>,
    pub balance: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("ledger request failed: {0}")]
    Transport(String),
    #[error("ledger response malformed: {0}")]
    Malformed(String),
    #[error("no access token available for account {0}")]
    Unauthorized(String),
}

/// Read-side boundary to the accounting platform.
#[async_trait]
pub trait LedgerGateway: Send + Sync {
    async fn fetch_report(
        &self,
        account_id: &str,
        kind: ReportKind,
    ) -> Result<ReportTree, LedgerError>;

    async fn fetch_open_items(
        &self,
        account_id: &str,
        kind: OpenItemKind,
    ) -> Result<Vec<OpenItem>, LedgerError>;
}

/// Supplies a bearer token per account. Refresh and OAuth exchange live with
/// the token owner, not here.
#[async_trait]
pub trait AccessTokenProvider: Send + Sync {
    async fn access_token(&self, account_id: &str) -> Result<String, LedgerError>;
}

const OPEN_ITEM_FETCH_LIMIT: usize = 50;

/// Thin HTTP client for a QuickBooks-style reporting API. Everything beyond
/// request shaping and response mapping is someone else's job.
pub struct HttpLedgerClient {
    http: reqwest::Client,
    base_url: String,
    tokens: Arc<dyn AccessTokenProvider>,
}

impl HttpLedgerClient {
    pub fn new(base_url: impl Into<String>, tokens: Arc<dyn AccessTokenProvider>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            tokens,
        }
    }

    fn company_url(&self, account_id: &str, suffix: &str) -> String {
        format!(
            "{}/v3/company/{}/{}",
            self.base_url.trim_end_matches('/'),
            account_id,
            suffix
        )
    }

    async fn get_json(
        &self,
        account_id: &str,
        url: String,
        query: &[(&str, &str)],
    ) -> Result<Value, LedgerError> {
        let token = self.tokens.access_token(account_id).await?;
        let response = self
            .http
            .get(url)
            .query(query)
            .bearer_auth(token)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|err| LedgerError::Transport(err.to_string()))?
            .error_for_status()
            .map_err(|err| LedgerError::Transport(err.to_string()))?;

        response
            .json::<Value>()
            .await
            .map_err(|err| LedgerError::Malformed(err.to_string()))
    }
}

#[async_trait]
impl LedgerGateway for HttpLedgerClient {
    async fn fetch_report(
        &self,
        account_id: &str,
        kind: ReportKind,
    ) -> Result<ReportTree, LedgerError> {
        let url = self.company_url(account_id, &format!("reports/{}", kind.endpoint()));
        let query: &[(&str, &str)] = match kind {
            ReportKind::BalanceSheet => &[("accounting_method", "Accrual")],
            ReportKind::ProfitAndLossLast30Days => {
                &[("accounting_method", "Accrual"), ("date_macro", "Last30Days")]
            }
        };
        let payload = self.get_json(account_id, url, query).await?;
        let report: VendorReport = serde_json::from_value(payload)
            .map_err(|err| LedgerError::Malformed(err.to_string()))?;
        Ok(report.rows.into_tree())
    }

    async fn fetch_open_items(
        &self,
        account_id: &str,
        kind: OpenItemKind,
    ) -> Result<Vec<OpenItem>, LedgerError> {
        let statement = format!(
            "select Id, TxnDate, Balance from {} where Balance > '0' order by TxnDate desc maxresults {}",
            kind.entity(),
            OPEN_ITEM_FETCH_LIMIT
        );
        let url = self.company_url(account_id, "query");
        let payload = self
            .get_json(account_id, url, &[("query", statement.as_str())])
            .await?;

        let rows = payload
            .get("QueryResponse")
            .and_then(|response| response.get(kind.entity()))
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        Ok(rows.iter().map(vendor_open_item).collect())
    }
}

fn vendor_open_item(row: &Value) -> OpenItem {
    OpenItem {
        id: cell_text(row.get("Id")).unwrap_or_default(),
        txn_date: cell_text(row.get("TxnDate"))
            .and_then(|raw| NaiveDate::parse_from_str(&raw, "%Y-%m-%d").ok()),
        balance: cell_text(row.get("Balance")),
    }
}

// Vendor cells arrive as strings or bare numbers depending on the report
// version; normalize both to text.
fn cell_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

#[derive(Debug, Default, Deserialize)]
struct VendorReport {
    #[serde(rename = "Rows", default)]
    rows: VendorRows,
}

#[derive(Debug, Default, Deserialize)]
struct VendorRows {
    #[serde(rename = "Row", default)]
    row: Vec<VendorRow>,
}

impl VendorRows {
    fn into_tree(self) -> ReportTree {
        self.row.into_iter().map(VendorRow::into_node).collect()
    }
}

#[derive(Debug, Default, Deserialize)]
struct VendorRow {
    #[serde(rename = "Header")]
    header: Option<VendorColumns>,
    #[serde(rename = "Summary")]
    summary: Option<VendorColumns>,
    #[serde(rename = "Rows", default)]
    rows: VendorRows,
    #[serde(rename = "ColData", default)]
    col_data: Vec<VendorCell>,
}

impl VendorRow {
    fn into_node(self) -> ReportNode {
        let is_section =
            self.header.is_some() || self.summary.is_some() || !self.rows.row.is_empty();
        if is_section {
            ReportNode::Section(SectionNode {
                header: self.header.map(VendorColumns::into_row),
                summary: self.summary.map(VendorColumns::into_row),
                children: self.rows.into_tree(),
            })
        } else {
            ReportNode::Data(DataRow::new(
                self.col_data.into_iter().map(VendorCell::into_cell).collect(),
            ))
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct VendorColumns {
    #[serde(rename = "ColData", default)]
    col_data: Vec<VendorCell>,
}

impl VendorColumns {
    fn into_row(self) -> DataRow {
        DataRow::new(self.col_data.into_iter().map(VendorCell::into_cell).collect())
    }
}

#[derive(Debug, Default, Deserialize)]
struct VendorCell {
    #[serde(default)]
    value: Option<Value>,
}

impl VendorCell {
    fn into_cell(self) -> Cell {
        Cell {
            value: cell_text(self.value.as_ref()),
        }
    }
}
