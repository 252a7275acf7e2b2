use serde::{Deserialize, Serialize};

/// One cell of a report row. Vendor payloads routinely omit values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cell {
    #[serde(default)]
    pub value: Option<String>,
}

impl Cell {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: Some(value.into()),
        }
    }

    pub const fn empty() -> Self {
        Self { value: None }
    }
}

/// An ordered list of column values; by convention the first column carries
/// the label and the last column the amount.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataRow {
    #[serde(default)]
    pub cells: Vec<Cell>,
}

impl DataRow {
    pub fn new(cells: Vec<Cell>) -> Self {
        Self { cells }
    }

    pub fn labeled(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            cells: vec![Cell::new(label), Cell::new(value)],
        }
    }
}

/// A section groups nested nodes under an optional header and summary row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionNode {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header: Option<DataRow>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<DataRow>,
    #[serde(default)]
    pub children: Vec<ReportNode>,
}

/// One node of a vendor-formatted financial report. Reports nest sections
/// arbitrarily deep in principle, though real statements stay shallow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportNode {
    Data(DataRow),
    Section(SectionNode),
}

/// An ordered sequence of top-level report nodes.
pub type ReportTree = Vec<ReportNode>;

/// Depth-first, pre-order search for a labeled amount.
///
/// At each section the header row's first-column label is checked against
/// the matchers (case-insensitive substring), then the summary row, then the
/// children. The first label hit wins and yields the numeric parse of that
/// row's last column, which may still be `None` for a malformed amount;
/// label wording varies across vendor locales and report versions, so a
/// small synonym set beats a rigid schema.
pub fn find_value(nodes: &[ReportNode], matchers: &[&str]) -> Option<f64> {
    walk(nodes, matchers).flatten()
}

// Outer Option: was any label matched at this level or below. A matched row
// with an unparsable amount terminates its own sibling scan but lets the
// parent keep looking.
fn walk(nodes: &[ReportNode], matchers: &[&str]) -> Option<Option<f64>> {
    for node in nodes {
        let ReportNode::Section(section) = node else {
            continue;
        };
        if let Some(parsed) = labeled_amount(section.header.as_ref(), matchers) {
            return Some(parsed);
        }
        if let Some(parsed) = labeled_amount(section.summary.as_ref(), matchers) {
            return Some(parsed);
        }
        if let Some(Some(nested)) = walk(&section.children, matchers) {
            return Some(Some(nested));
        }
    }
    None
}

fn labeled_amount(row: Option<&DataRow>, matchers: &[&str]) -> Option<Option<f64>> {
    let row = row?;
    let label = row.cells.first()?.value.as_deref().unwrap_or_default();
    let label = label.to_lowercase();
    if !matchers.iter().any(|matcher| label.contains(matcher)) {
        return None;
    }
    Some(parse_amount(
        row.cells.last().and_then(|cell| cell.value.as_deref()),
    ))
}

/// Reads the amount out of a row the caller already located, e.g. a report's
/// standalone total row.
pub fn sum_last_column(row: &DataRow) -> Option<f64> {
    parse_amount(row.cells.last().and_then(|cell| cell.value.as_deref()))
}

/// Tolerant numeric parse: thousands separators stripped, anything else
/// malformed degrades to `None` rather than an error.
pub(crate) fn parse_amount(raw: Option<&str>) -> Option<f64> {
    let raw = raw?.trim();
    if raw.is_empty() {
        return None;
    }
    raw.replace(',', "").parse::<f64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section(
        header: Option<DataRow>,
        summary: Option<DataRow>,
        children: Vec<ReportNode>,
    ) -> ReportNode {
        ReportNode::Section(SectionNode {
            header,
            summary,
            children,
        })
    }

    #[test]
    fn finds_value_on_header_row() {
        let tree = vec![section(
            Some(DataRow::labeled("Cash and cash equivalents", "1,204.55")),
            None,
            Vec::new(),
        )];
        assert_eq!(find_value(&tree, &["cash"]), Some(1204.55));
    }

    #[test]
    fn falls_back_to_summary_row() {
        let tree = vec![section(
            Some(DataRow::labeled("ASSETS", "")),
            Some(DataRow::labeled("Total Accounts Receivable", "8,900")),
            Vec::new(),
        )];
        assert_eq!(
            find_value(&tree, &["accounts receivable", "total accounts receivable"]),
            Some(8900.0)
        );
    }

    #[test]
    fn reaches_values_nested_three_sections_deep() {
        let leaf = section(
            Some(DataRow::labeled("Net Income", "-412.07")),
            None,
            Vec::new(),
        );
        let middle = section(
            Some(DataRow::labeled("Operating", "")),
            None,
            vec![leaf],
        );
        let tree = vec![section(
            Some(DataRow::labeled("Income Statement", "")),
            None,
            vec![middle],
        )];
        assert_eq!(find_value(&tree, &["net income"]), Some(-412.07));
    }

    #[test]
    fn unmatched_tree_yields_none() {
        let tree = vec![
            section(
                Some(DataRow::labeled("Equity", "500")),
                None,
                vec![ReportNode::Data(DataRow::labeled("Retained earnings", "500"))],
            ),
            ReportNode::Data(DataRow::labeled("Cash", "100")),
        ];
        // Plain data rows are never label-matched; only headers and
        // summaries are.
        assert_eq!(find_value(&tree, &["cash"]), None);
    }

    #[test]
    fn matched_label_with_malformed_amount_degrades_to_none() {
        let tree = vec![section(
            Some(DataRow::labeled("Cash", "not-a-number")),
            None,
            Vec::new(),
        )];
        assert_eq!(find_value(&tree, &["cash"]), None);
    }

    #[test]
    fn match_is_case_insensitive_substring() {
        let tree = vec![section(
            Some(DataRow::labeled("TOTAL ACCOUNTS PAYABLE (A/P)", "2,000")),
            None,
            Vec::new(),
        )];
        assert_eq!(find_value(&tree, &["accounts payable"]), Some(2000.0));
    }

    #[test]
    fn first_match_in_document_order_wins() {
        let tree = vec![
            section(
                Some(DataRow::labeled("Cash and cash equivalents", "1500")),
                None,
                Vec::new(),
            ),
            section(
                Some(DataRow::labeled("Petty cash", "25")),
                None,
                Vec::new(),
            ),
        ];
        assert_eq!(find_value(&tree, &["cash"]), Some(1500.0));
    }

    #[test]
    fn sum_last_column_reads_the_final_cell() {
        let row = DataRow::new(vec![
            Cell::new("Total"),
            Cell::new("ignored"),
            Cell::new("12,345"),
        ]);
        assert_eq!(sum_last_column(&row), Some(12345.0));
        assert_eq!(sum_last_column(&DataRow::default()), None);
    }

    #[test]
    fn parse_amount_handles_separators_and_garbage() {
        assert_eq!(parse_amount(Some("1,234,567.89")), Some(1234567.89));
        assert_eq!(parse_amount(Some("  42 ")), Some(42.0));
        assert_eq!(parse_amount(Some("")), None);
        assert_eq!(parse_amount(Some("--")), None);
        assert_eq!(parse_amount(None), None);
    }

    #[test]
    fn headerless_sections_are_traversed() {
        let tree = vec![section(
            None,
            None,
            vec![section(
                None,
                Some(DataRow::labeled("Total Accounts Payable", "77")),
                Vec::new(),
            )],
        )];
        assert_eq!(find_value(&tree, &["accounts payable"]), Some(77.0));
    }
}
