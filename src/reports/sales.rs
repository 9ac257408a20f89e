//! `export:sales-report`: realized results of tracker sales.

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

pub const FILE_NAME: &str = "sales.xlsx";

const COLUMNS: [ColumnSpec; 4] = [
    ColumnSpec::new("Security"),
    ColumnSpec::new("Company"),
    ColumnSpec::new("Country"),
    ColumnSpec::new("Profit").with_format(NumberFormat::CurrencyEur),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaleLine {
    pub security: String,
    pub company: String,
    pub country: String,
    pub profit: Money,
}

#[derive(Tabled)]
struct SaleRow {
    #[tabled(rename = "Security")]
    security: String,
    #[tabled(rename = "Company")]
    company: String,
    #[tabled(rename = "Country")]
    country: String,
    #[tabled(rename = "Profit")]
    profit: String,
}

pub fn sale_lines(items: Vec<ResultsHistoryItem>, domicile: &str) -> Result<Vec<SaleLine>> {
    dedupe_by_key(items, |item| item.security_name.clone())
        .into_iter()
        .map(|item| {
            Ok(SaleLine {
                company: company_name(&item.security_name).to_string(),
                country: domicile.to_string(),
                profit: parse_money(&item.realized_result)?,
                security: item.security_name,
            })
        })
        .collect()
}

pub async fn run<D: BrowserDriver>(ctx: &ReportContext<D>) -> Result<ReportOutput> {
    let year = ctx.year();
    info!(year, "building sales report");

    ctx.visit_results_overview().await?;
    let credentials = ctx.credentials().await?;
    let items = ctx
        .results_history(&credentials, ResultCategory::Trackers)
        .collect_all()
        .await?;
    let lines = sale_lines(items, &ctx.settings().domicile)?;

    let table = terminal_table(
        &lines
            .iter()
            .map(|line| SaleRow {
                security: line.security.clone(),
                company: line.company.clone(),
                country: line.country.clone(),
                profit: line.profit.to_string(),
            })
            .collect::<Vec<_>>(),
    );
    let rows: Vec<ExportRow> = lines
        .iter()
        .map(|line| {
            ExportRow(vec![
                Field::text(&line.security),
                Field::text(&line.company),
                Field::text(&line.country),
                Field::Money(line.profit),
            ])
        })
        .collect();

    Ok(ReportOutput {
        file_name: FILE_NAME,
        sheet: render(&COLUMNS, &[rows], GroupSpacing::Contiguous),
        tables: vec![(None, table)],
    })
}
