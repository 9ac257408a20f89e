//! `export:investments`: every position mutation of the funds held during
//! the report year.
//!
//! Funds come from the tracker results of the year; the mutations of each
//! fund are fetched separately and written as one block per fund.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tabled::Tabled;
use tracing::info;

use super::{ReportContext, ReportOutput};
use crate::browser::BrowserDriver;
use crate::export::{
    render, terminal_table, ColumnSpec, ExportRow, Field, GroupSpacing, NumberFormat, StyleRule,
};
use crate::normalize::{
    dedupe_by_key, parse_date, parse_decimal, parse_money, Money, TransactionType,
};
use crate::portal::models::{PositionMutation, ResultsHistoryItem};
use crate::portal::{PaginatedFetcher, PositionMutationPages, ResultCategory};
use crate::Result;

pub const FILE_NAME: &str = "investments.xlsx";

const NUMBER_COLUMN: u16 = 4;
const PRICE_COLUMN: u16 = 5;

const COLUMNS: [ColumnSpec; 8] = [
    ColumnSpec::new("Fund name"),
    ColumnSpec::new("Domicile"),
    ColumnSpec::new("Transaction date").with_format(NumberFormat::Date),
    ColumnSpec::new("Transaction type"),
    ColumnSpec::new("Number").with_style(StyleRule::RedWhenNegative),
    ColumnSpec::new("Share price"),
    ColumnSpec::new("Total shares"),
    ColumnSpec::new("Purchase price"),
];

/// A fund held during the report year.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fund {
    pub id: String,
    pub name: String,
}

/// One position mutation, parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvestmentLine {
    pub date: NaiveDate,
    pub transaction_type: TransactionType,
    pub number: Decimal,
    pub share_price: Money,
    pub total_shares: Decimal,
}

#[derive(Tabled)]
struct MutationRow {
    #[tabled(rename = "Date")]
    date: String,
    #[tabled(rename = "Transaction")]
    transaction: String,
    #[tabled(rename = "Number")]
    number: String,
    #[tabled(rename = "Share price")]
    share_price: String,
    #[tabled(rename = "Position")]
    position: String,
}

/// Distinct funds by security id, in first-seen order.
pub fn funds(items: Vec<ResultsHistoryItem>) -> Vec<Fund> {
    dedupe_by_key(items, |item| item.security_id.clone())
        .into_iter()
        .map(|item| Fund {
            id: item.security_id,
            name: item.security_name,
        })
        .collect()
}

pub fn investment_line(mutation: &PositionMutation) -> Result<InvestmentLine> {
    Ok(InvestmentLine {
        date: parse_date(&mutation.transaction_date)?,
        transaction_type: TransactionType::translate(&mutation.transaction_type)?,
        number: parse_decimal(&mutation.mutation)?,
        share_price: parse_money(&mutation.price)?,
        total_shares: parse_decimal(&mutation.new_position)?,
    })
}

fn export_row(fund: &Fund, domicile: &str, line: &InvestmentLine) -> ExportRow {
    ExportRow(vec![
        Field::text(&fund.name),
        Field::text(domicile),
        Field::Date(line.date),
        Field::text(line.transaction_type.as_str()),
        Field::Number(line.number),
        Field::Money(line.share_price),
        Field::Number(line.total_shares),
        Field::RowProduct {
            left: NUMBER_COLUMN,
            right: PRICE_COLUMN,
            currency: line.share_price.currency,
        },
    ])
}

fn mutation_row(mutation: &PositionMutation) -> MutationRow {
    MutationRow {
        date: mutation.transaction_date.clone(),
        transaction: mutation.transaction_type.clone(),
        number: mutation.mutation.clone(),
        share_price: mutation.price.clone(),
        position: mutation.new_position.clone(),
    }
}

pub async fn run<D: BrowserDriver>(ctx: &ReportContext<D>) -> Result<ReportOutput> {
    let year = ctx.year();
    info!(year, "building investments overview");

    ctx.visit_results_overview().await?;
    let credentials = ctx.credentials().await?;
    let funds = funds(
        ctx.results_history(&credentials, ResultCategory::Trackers)
            .collect_all()
            .await?,
    );

    let domicile = &ctx.settings().domicile;
    let mut groups = Vec::with_capacity(funds.len());
    let mut tables = Vec::with_capacity(funds.len());
    for fund in &funds {
        let mutations = PaginatedFetcher::new(PositionMutationPages::new(
            ctx.api(),
            &credentials,
            fund.id.as_str(),
        ))
        .single_page()
        .await?;
        info!(fund = %fund.name, mutations = mutations.len(), "fetched position mutations");

        let rows = mutations.iter().map(mutation_row).collect::<Vec<_>>();
        tables.push((Some(fund.name.clone()), terminal_table(&rows)));

        let group = mutations
            .iter()
            .map(|mutation| Ok(export_row(fund, domicile, &investment_line(mutation)?)))
            .collect::<Result<Vec<_>>>()?;
        groups.push(group);
    }

    Ok(ReportOutput {
        file_name: FILE_NAME,
        sheet: render(&COLUMNS, &groups, GroupSpacing::BlankRow),
        tables,
    })
}
