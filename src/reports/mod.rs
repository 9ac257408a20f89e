//! The exports the CLI offers.
//!
//! Every report runs against one logged-in [`ReportContext`], builds its
//! whole sheet in memory and only then hands it back as a
//! [`ReportOutput`], so a failure halfway never leaves a partial file.

pub mod cash_dividends;
pub mod investments;
pub mod sales;
pub mod transaction_history;

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::browser::{BrowserDriver, Selector};
use crate::clock::Clock;
use crate::config::{PortalConfig, ReportsConfig};
use crate::export::Sheet;
use crate::portal::api::RESULTS_OVERVIEW_PATH;
use crate::portal::auth::TOKEN_XPATH;
use crate::portal::{
    CredentialBundle, PaginatedFetcher, PortalApiClient, ResultCategory, ResultYear,
    ResultsHistoryPages, Session,
};
use crate::Result;

pub const PORTFOLIO_OVERVIEW_PATH: &str = "/PortfolioOverview/Index";

pub const PORTFOLIO_TABLE_XPATH: &str = r#"//table[contains(concat(" ", normalize-space(@class), " "), " sticky-portfolio-overview-table ")]"#;

/// Everything a report needs for one run.
pub struct ReportContext<D> {
    session: Session<D>,
    api: PortalApiClient,
    portal: PortalConfig,
    settings: ReportsConfig,
    clock: Arc<dyn Clock>,
}

impl<D: BrowserDriver> ReportContext<D> {
    pub fn new(
        session: Session<D>,
        api: PortalApiClient,
        portal: PortalConfig,
        settings: ReportsConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            session,
            api,
            portal,
            settings,
            clock,
        }
    }

    pub fn session(&self) -> &Session<D> {
        &self.session
    }

    pub fn into_session(self) -> Session<D> {
        self.session
    }

    pub fn api(&self) -> &PortalApiClient {
        &self.api
    }

    pub fn portal(&self) -> &PortalConfig {
        &self.portal
    }

    pub fn settings(&self) -> &ReportsConfig {
        &self.settings
    }

    /// The configured year, or the previous calendar year.
    pub fn year(&self) -> i32 {
        self.settings
            .year
            .unwrap_or_else(|| self.clock.previous_year())
    }

    /// Open the results overview, whose pages carry the token the result
    /// endpoints expect.
    pub async fn visit_results_overview(&self) -> Result<()> {
        self.session.visit_path(RESULTS_OVERVIEW_PATH).await?;
        self.session
            .waiter()
            .wait_for_presence(&Selector::xpath(TOKEN_XPATH), true)
            .await
    }

    pub async fn visit_portfolio_overview(&self) -> Result<()> {
        self.session.visit_path(PORTFOLIO_OVERVIEW_PATH).await?;
        self.session
            .waiter()
            .wait_for_visibility(&Selector::xpath(PORTFOLIO_TABLE_XPATH), true)
            .await
    }

    /// Bridge the current page's token and the configured cookies.
    pub async fn credentials(&self) -> Result<CredentialBundle> {
        self.session.credentials(&self.portal.cookies).await
    }

    /// Results of the report year in `category`.
    pub fn results_history<'a>(
        &'a self,
        credentials: &'a CredentialBundle,
        category: ResultCategory,
    ) -> PaginatedFetcher<ResultsHistoryPages<'a>> {
        PaginatedFetcher::new(ResultsHistoryPages::new(
            &self.api,
            credentials,
            category,
            ResultYear::Year(self.year()),
        ))
    }
}

/// A finished report: console tables and the sheet to save.
#[derive(Debug)]
pub struct ReportOutput {
    pub file_name: &'static str,
    pub sheet: Sheet,
    /// Console tables in display order, each with an optional caption.
    pub tables: Vec<(Option<String>, String)>,
}

impl ReportOutput {
    /// Save the sheet into `dir` and return the written path.
    pub fn save(&self, dir: &Path) -> Result<PathBuf> {
        let path = dir.join(self.file_name);
        self.sheet.save(&path)?;
        Ok(path)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    CashDividends,
    Investments,
    Sales,
    TransactionHistory,
}

impl ReportKind {
    pub fn file_name(self) -> &'static str {
        match self {
            ReportKind::CashDividends => cash_dividends::FILE_NAME,
            ReportKind::Investments => investments::FILE_NAME,
            ReportKind::Sales => sales::FILE_NAME,
            ReportKind::TransactionHistory => transaction_history::FILE_NAME,
        }
    }
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ReportKind::CashDividends => "cash dividend report",
            ReportKind::Investments => "investments overview",
            ReportKind::Sales => "sales report",
            ReportKind::TransactionHistory => "transaction history",
        })
    }
}

pub async fn run_report<D: BrowserDriver>(
    kind: ReportKind,
    ctx: &ReportContext<D>,
) -> Result<ReportOutput> {
    match kind {
        ReportKind::CashDividends => cash_dividends::run(ctx).await,
        ReportKind::Investments => investments::run(ctx).await,
        ReportKind::Sales => sales::run(ctx).await,
        ReportKind::TransactionHistory => transaction_history::run(ctx).await,
    }
}
