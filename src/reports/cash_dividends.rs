//! `export:cash-dividend-report`: dividends received per security.

use rust_decimal::Decimal;
use tabled::Tabled;
use tracing::info;

use super::{ReportContext, ReportOutput};
use crate::browser::BrowserDriver;
use crate::export::{
    render, terminal_table, ColumnSpec, ExportRow, Field, GroupSpacing, NumberFormat,
};
use crate::normalize::{company_name, dedupe_by_key, parse_money, Money};
use crate::portal::models::ResultsHistoryItem;
use crate::portal::ResultCategory;
use crate::Result;

pub const FILE_NAME: &str = "dividends.xlsx";

/// Foreign tax is not reported by the portal; exported as an explicit zero.
const WITHHELD_TAX: Decimal = Decimal::ZERO;

const COLUMNS: [ColumnSpec; 5] = [
    ColumnSpec::new("Security"),
    ColumnSpec::new("Company"),
    ColumnSpec::new("Country"),
    ColumnSpec::new("Dividend").with_format(NumberFormat::CurrencyEur),
    ColumnSpec::new("Tax paid/withheld abroad").with_format(NumberFormat::CurrencyEur),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DividendLine {
    pub security: String,
    pub company: String,
    pub country: String,
    pub dividend: Money,
    pub tax: Money,
}

#[derive(Tabled)]
struct DividendRow {
    #[tabled(rename = "Security")]
    security: String,
    #[tabled(rename = "Company")]
    company: String,
    #[tabled(rename = "Country")]
    country: String,
    #[tabled(rename = "Dividend")]
    dividend: String,
    #[tabled(rename = "Tax paid/withheld abroad")]
    tax: String,
}

/// One line per security, keyed by name.
pub fn dividend_lines(
    items: Vec<ResultsHistoryItem>,
    domicile: &str,
) -> Result<Vec<DividendLine>> {
    dedupe_by_key(items, |item| item.security_name.clone())
        .into_iter()
        .map(|item| {
            Ok(DividendLine {
                company: company_name(&item.security_name).to_string(),
                country: domicile.to_string(),
                dividend: parse_money(&item.total)?,
                tax: Money::eur(WITHHELD_TAX),
                security: item.security_name,
            })
        })
        .collect()
}

fn export_row(line: &DividendLine) -> ExportRow {
    ExportRow(vec![
        Field::text(&line.security),
        Field::text(&line.company),
        Field::text(&line.country),
        Field::Money(line.dividend),
        Field::Money(line.tax),
    ])
}

pub async fn run<D: BrowserDriver>(ctx: &ReportContext<D>) -> Result<ReportOutput> {
    let year = ctx.year();
    info!(year, "building cash dividend report");

    ctx.visit_results_overview().await?;
    let credentials = ctx.credentials().await?;
    let items = ctx
        .results_history(&credentials, ResultCategory::CashDividends)
        .single_page()
        .await?;
    let lines = dividend_lines(items, &ctx.settings().domicile)?;

    let table = terminal_table(
        &lines
            .iter()
            .map(|line| DividendRow {
                security: line.security.clone(),
                company: line.company.clone(),
                country: line.country.clone(),
                dividend: line.dividend.to_string(),
                tax: line.tax.to_string(),
            })
            .collect::<Vec<_>>(),
    );
    let rows: Vec<ExportRow> = lines.iter().map(export_row).collect();

    Ok(ReportOutput {
        file_name: FILE_NAME,
        sheet: render(&COLUMNS, &[rows], GroupSpacing::Contiguous),
        tables: vec![(None, table)],
    })
}
