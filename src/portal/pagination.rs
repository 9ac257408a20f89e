//! Multi-page result retrieval.
//!
//! The portal only reports how many pages a query has in the response to
//! page 1, so a fetch always starts there and walks the remaining pages in
//! order.

use std::fmt;

use async_trait::async_trait;
use tracing::info;

use super::api::PortalApiClient;
use super::auth::CredentialBundle;
use super::models::{
    PositionMutation, PositionMutationsResponse, ResultsHistoryItem, ResultsHistoryResponse,
};
use crate::{Error, Result};

pub const RESULT_HISTORY_ENDPOINT: &str = "/ResultsOverview/GetResultHistory";
pub const POSITION_MUTATIONS_ENDPOINT: &str = "/ResultsOverview/GetPositionMutations";

/// One server response to a paginated query.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultPage<T> {
    /// 1-based.
    pub number: u32,
    pub total_pages: u32,
    pub items: Vec<T>,
}

/// A query whose results can be fetched page by page.
#[async_trait]
pub trait PageSource: Send + Sync {
    type Item: Send;

    async fn fetch_page(&self, page: u32) -> Result<ResultPage<Self::Item>>;

    /// Human-readable description of the query, for logs and errors.
    fn describe(&self) -> String;
}

/// Walks the pages of one query in ascending order.
pub struct PaginatedFetcher<S> {
    source: S,
    next: u32,
    total_pages: Option<u32>,
}

impl<S: PageSource> PaginatedFetcher<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            next: 1,
            total_pages: None,
        }
    }

    /// Page count of the query, known once page 1 was fetched.
    pub fn total_pages(&self) -> Option<u32> {
        self.total_pages
    }

    /// Fetch the next page, or `None` once every page was returned.
    pub async fn next_page(&mut self) -> Result<Option<ResultPage<S::Item>>> {
        if self.total_pages.is_some_and(|total| self.next > total) {
            return Ok(None);
        }

        let page = self.source.fetch_page(self.next).await?;
        // An empty result set still comes back as one (empty) page.
        let total_pages = *self.total_pages.get_or_insert(page.total_pages.max(1));
        info!(
            query = %self.source.describe(),
            page = self.next,
            total_pages,
            items = page.items.len(),
            "fetched result page"
        );
        self.next += 1;
        Ok(Some(page))
    }

    /// Fetch every page and concatenate the items in page order.
    pub async fn collect_all(mut self) -> Result<Vec<S::Item>> {
        let mut items = Vec::new();
        while let Some(page) = self.next_page().await? {
            items.extend(page.items);
        }
        Ok(items)
    }

    /// Fetch page 1 and refuse queries that have more than one page.
    pub async fn single_page(mut self) -> Result<Vec<S::Item>> {
        let Some(page) = self.next_page().await? else {
            return Ok(Vec::new());
        };
        if page.total_pages > 1 {
            return Err(Error::UnsupportedPagination {
                total_pages: page.total_pages,
                query: self.source.describe(),
            });
        }
        Ok(page.items)
    }
}

/// Result categories of the results overview.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultCategory {
    All,
    Stocks,
    CashDividends,
    Trackers,
}

impl ResultCategory {
    /// Value of the `category` form parameter.
    pub fn as_param(self) -> &'static str {
        match self {
            ResultCategory::All => "",
            ResultCategory::Stocks => "Aandelen",
            ResultCategory::CashDividends => "Cashdividenden",
            ResultCategory::Trackers => "Trackers",
        }
    }
}

/// Period of the results overview.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultYear {
    Year(i32),
    SinceStart,
}

impl fmt::Display for ResultYear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResultYear::Year(year) => write!(f, "{year}"),
            ResultYear::SinceStart => f.write_str("SinceStart"),
        }
    }
}

/// Per-security results for one category and period.
pub struct ResultsHistoryPages<'a> {
    api: &'a PortalApiClient,
    credentials: &'a CredentialBundle,
    category: ResultCategory,
    year: ResultYear,
}

impl<'a> ResultsHistoryPages<'a> {
    pub fn new(
        api: &'a PortalApiClient,
        credentials: &'a CredentialBundle,
        category: ResultCategory,
        year: ResultYear,
    ) -> Self {
        Self {
            api,
            credentials,
            category,
            year,
        }
    }

    fn params(&self, page: u32) -> Vec<(&'static str, String)> {
        vec![
            ("page", page.to_string()),
            ("sortProperty", "SecurityName".to_string()),
            ("sortOrder", "0".to_string()),
            ("resultsType", "Position".to_string()),
            ("positionType", "All".to_string()),
            ("category", self.category.as_param().to_string()),
            ("year", self.year.to_string()),
        ]
    }
}

#[async_trait]
impl<'a> PageSource for ResultsHistoryPages<'a> {
    type Item = ResultsHistoryItem;

    async fn fetch_page(&self, page: u32) -> Result<ResultPage<ResultsHistoryItem>> {
        let response: ResultsHistoryResponse = self
            .api
            .call_as(RESULT_HISTORY_ENDPOINT, &self.params(page), self.credentials)
            .await?;
        Ok(ResultPage {
            number: page,
            total_pages: response.no_of_pages,
            items: response.items,
        })
    }

    fn describe(&self) -> String {
        format!(
            "result history (category '{}', year {})",
            self.category.as_param(),
            self.year
        )
    }
}

/// Buy/sell/deposit history of one security.
pub struct PositionMutationPages<'a> {
    api: &'a PortalApiClient,
    credentials: &'a CredentialBundle,
    security_id: String,
}

impl<'a> PositionMutationPages<'a> {
    pub fn new(
        api: &'a PortalApiClient,
        credentials: &'a CredentialBundle,
        security_id: impl Into<String>,
    ) -> Self {
        Self {
            api,
            credentials,
            security_id: security_id.into(),
        }
    }
}

#[async_trait]
impl<'a> PageSource for PositionMutationPages<'a> {
    type Item = PositionMutation;

    async fn fetch_page(&self, page: u32) -> Result<ResultPage<PositionMutation>> {
        let params = [
            ("page", page.to_string()),
            ("sortProperty", "TransactionDate".to_string()),
            ("sortOrder", "0".to_string()),
            ("securityId", self.security_id.clone()),
            ("positionType", "All".to_string()),
        ];
        let response: PositionMutationsResponse = self
            .api
            .call_as(POSITION_MUTATIONS_ENDPOINT, &params, self.credentials)
            .await?;
        Ok(ResultPage {
            number: page,
            total_pages: response.no_of_pages,
            items: response.mutations,
        })
    }

    fn describe(&self) -> String {
        format!("position mutations of security {}", self.security_id)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    /// Serves `pages` pages of two items each and records requested pages.
    struct CountingSource {
        pages: u32,
        requested: Mutex<Vec<u32>>,
    }

    impl CountingSource {
        fn new(pages: u32) -> Self {
            Self {
                pages,
                requested: Mutex::new(Vec::new()),
            }
        }

        fn requested(&self) -> Vec<u32> {
            self.requested.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl<'a> PageSource for &'a CountingSource {
        type Item = String;

        async fn fetch_page(&self, page: u32) -> Result<ResultPage<String>> {
            self.requested.lock().unwrap().push(page);
            let items = if self.pages == 0 {
                Vec::new()
            } else {
                vec![format!("{page}a"), format!("{page}b")]
            };
            Ok(ResultPage {
                number: page,
                total_pages: self.pages,
                items,
            })
        }

        fn describe(&self) -> String {
            "counting".to_string()
        }
    }

    #[tokio::test]
    async fn single_page_query_fetches_once() -> Result<()> {
        let source = CountingSource::new(1);
        let items = PaginatedFetcher::new(&source).collect_all().await?;
        assert_eq!(items, vec!["1a", "1b"]);
        assert_eq!(source.requested(), vec![1]);
        Ok(())
    }

    #[tokio::test]
    async fn all_pages_fetched_in_ascending_order() -> Result<()> {
        let source = CountingSource::new(3);
        let items = PaginatedFetcher::new(&source).collect_all().await?;
        assert_eq!(items, vec!["1a", "1b", "2a", "2b", "3a", "3b"]);
        assert_eq!(source.requested(), vec![1, 2, 3]);
        Ok(())
    }

    #[tokio::test]
    async fn zero_pages_is_one_empty_page() -> Result<()> {
        let source = CountingSource::new(0);
        let mut fetcher = PaginatedFetcher::new(&source);
        assert!(fetcher.next_page().await?.is_some());
        assert_eq!(fetcher.total_pages(), Some(1));
        assert!(fetcher.next_page().await?.is_none());
        assert_eq!(source.requested(), vec![1]);
        Ok(())
    }

    #[tokio::test]
    async fn refusal_carries_page_count_and_stops_after_first_page() {
        let source = CountingSource::new(3);
        let err = PaginatedFetcher::new(&source).single_page().await.unwrap_err();
        match err {
            Error::UnsupportedPagination { total_pages, query } => {
                assert_eq!(total_pages, 3);
                assert_eq!(query, "counting");
            }
            other => panic!("expected unsupported pagination, got {other:?}"),
        }
        assert_eq!(source.requested(), vec![1]);
    }

    #[test]
    fn year_parameter() {
        assert_eq!(ResultYear::Year(2023).to_string(), "2023");
        assert_eq!(ResultYear::SinceStart.to_string(), "SinceStart");
        assert_eq!(ResultCategory::All.as_param(), "");
    }
}
