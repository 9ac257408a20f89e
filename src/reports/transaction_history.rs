//! `export:transaction-history`: position history of every fund in the
//! portfolio, scraped from the legacy position pages.

use chrono::NaiveDate;
use reqwest::Url;
use rust_decimal::Decimal;
use tabled::Tabled;
use tracing::{info, warn};

use super::{ReportContext, ReportOutput};
use crate::browser::{BrowserDriver, ElementSnapshot, Selector};
use crate::export::{
    render, terminal_table, ColumnSpec, ExportRow, Field, GroupSpacing, NumberFormat, StyleRule,
};
use crate::normalize::{
    dedupe_by_key, parse_date, parse_decimal, parse_money, Money, TransactionType,
};
use crate::portal::auth::parse_url;
use crate::{Error, Result};

pub const FILE_NAME: &str = "export.xlsx";

/// Links from the portfolio overview to each fund's position page.
pub const FUND_LINKS_XPATH: &str = r#"//table[@id="ctl00_ctl00_Content_Content_OverzichtRepeater_ctl00_PortefeuilleOverzicht"]//a[@data-logging-name="PositionOverview"]"#;

pub const POSITIONS_TABLE_XPATH: &str = r#"//table[@id="ctl00_ctl00_Content_Content_Posities"]"#;

/// Rows of a fund's position table. The first one repeats the header.
pub const POSITION_ROWS_XPATH: &str =
    r#"//table[@id="ctl00_ctl00_Content_Content_Posities"]/tbody/tr"#;

/// Cells per row after the leading action cell.
const CELLS_PER_ROW: usize = 5;

const COLUMNS: [ColumnSpec; 7] = [
    ColumnSpec::new("Fund name"),
    ColumnSpec::new("Domicile"),
    ColumnSpec::new("Transaction date").with_format(NumberFormat::Date),
    ColumnSpec::new("Transaction type"),
    ColumnSpec::new("Number").with_style(StyleRule::RedWhenNegative),
    ColumnSpec::new("Total"),
    ColumnSpec::new("Share price"),
];

/// A fund as linked from the portfolio overview.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FundLink {
    pub id: String,
    pub name: String,
}

/// The cells of one position row, as rendered.
#[derive(Debug, Clone, PartialEq, Eq, Tabled)]
pub struct ScrapedRow {
    #[tabled(rename = "Date")]
    pub date: String,
    #[tabled(rename = "Transaction")]
    pub transaction: String,
    #[tabled(rename = "Number")]
    pub number: String,
    #[tabled(rename = "Position")]
    pub position: String,
    #[tabled(rename = "Share price")]
    pub share_price: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryLine {
    pub date: NaiveDate,
    pub transaction_type: TransactionType,
    pub number: Decimal,
    pub total: Decimal,
    pub share_price: Money,
}

/// Read `fondsId` and `fondsNaam` from a position link.
///
/// Links without both parameters are skipped.
pub fn fund_link(page_url: &Url, href: &str) -> Result<Option<FundLink>> {
    let url = page_url.join(href).map_err(|e| Error::InvalidUrl {
        url: href.to_string(),
        reason: e.to_string(),
    })?;
    let mut id = None;
    let mut name = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "fondsId" => id = Some(value.into_owned()),
            "fondsNaam" => name = Some(value.into_owned()),
            _ => {}
        }
    }
    Ok(id.zip(name).map(|(id, name)| FundLink { id, name }))
}

/// Turn table rows into cells, dropping the header row and the action cell.
pub fn scraped_rows(page: &str, rows: &[ElementSnapshot]) -> Result<Vec<ScrapedRow>> {
    rows.iter()
        .skip(1)
        .map(|row| {
            let cells: Vec<&str> = row.children.iter().skip(1).map(String::as_str).collect();
            match cells[..] {
                [date, transaction, number, position, share_price, ..] => Ok(ScrapedRow {
                    date: date.to_string(),
                    transaction: transaction.to_string(),
                    number: number.to_string(),
                    position: position.to_string(),
                    share_price: share_price.to_string(),
                }),
                _ => Err(Error::MalformedResponse {
                    endpoint: page.to_string(),
                    reason: format!(
                        "position row has {} cells, expected {CELLS_PER_ROW}",
                        cells.len()
                    ),
                }),
            }
        })
        .collect()
}

pub fn history_line(row: &ScrapedRow) -> Result<HistoryLine> {
    Ok(HistoryLine {
        date: parse_date(&row.date)?,
        transaction_type: TransactionType::translate(&row.transaction)?,
        number: parse_decimal(&row.number)?,
        total: parse_decimal(&row.position)?,
        share_price: parse_money(&row.share_price)?,
    })
}

fn export_row(fund: &FundLink, domicile: &str, line: &HistoryLine) -> ExportRow {
    ExportRow(vec![
        Field::text(&fund.name),
        Field::text(domicile),
        Field::Date(line.date),
        Field::text(line.transaction_type.as_str()),
        Field::Number(line.number),
        Field::Number(line.total),
        Field::Money(line.share_price),
    ])
}

async fn fund_links<D: BrowserDriver>(ctx: &ReportContext<D>) -> Result<Vec<FundLink>> {
    let session = ctx.session();
    let page_url = match session.driver().current_url().await? {
        Some(url) => parse_url(&url)?,
        None => session.base_url().clone(),
    };

    let mut links = Vec::new();
    for element in session.driver().find_all(FUND_LINKS_XPATH).await? {
        let Some(href) = element.attribute("href") else {
            continue;
        };
        match fund_link(&page_url, href)? {
            Some(link) => links.push(link),
            None => warn!(href, "position link without fund parameters"),
        }
    }
    Ok(dedupe_by_key(links, |link| link.id.clone()))
}

fn position_page(base: &str, fund_id: &str) -> Result<Url> {
    let mut url = parse_url(base)?;
    url.query_pairs_mut().append_pair("fondsId", fund_id);
    Ok(url)
}

pub async fn run<D: BrowserDriver>(ctx: &ReportContext<D>) -> Result<ReportOutput> {
    info!("building transaction history");

    ctx.visit_portfolio_overview().await?;
    let funds = fund_links(ctx).await?;
    info!(funds = funds.len(), "found funds in portfolio");

    let session = ctx.session();
    let domicile = &ctx.settings().domicile;
    let mut groups = Vec::with_capacity(funds.len());
    let mut tables = Vec::with_capacity(funds.len());
    for fund in &funds {
        let url = position_page(&ctx.portal().position_history_url, &fund.id)?;
        session.visit(&url).await?;
        session
            .waiter()
            .wait_for_presence(&Selector::xpath(POSITIONS_TABLE_XPATH), true)
            .await?;

        let rows = scraped_rows(
            url.as_str(),
            &session.driver().find_all(POSITION_ROWS_XPATH).await?,
        )?;
        info!(fund = %fund.name, rows = rows.len(), "scraped position history");
        tables.push((Some(fund.name.clone()), terminal_table(&rows)));

        let group = rows
            .iter()
            .map(|row| Ok(export_row(fund, domicile, &history_line(row)?)))
            .collect::<Result<Vec<_>>>()?;
        groups.push(group);
    }

    Ok(ReportOutput {
        file_name: FILE_NAME,
        sheet: render(&COLUMNS, &groups, GroupSpacing::BlankRow),
        tables,
    })
}
