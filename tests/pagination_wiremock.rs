mod support;

use anyhow::Result;
use binck_export::portal::pagination::{POSITION_MUTATIONS_ENDPOINT, RESULT_HISTORY_ENDPOINT};
use binck_export::portal::{
    PaginatedFetcher, PortalApiClient, PositionMutationPages, ResultCategory, ResultYear,
    ResultsHistoryPages,
};
use binck_export::Error;
use serde_json::json;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use support::credentials;

fn results_page(total_pages: u32, names: &[&str]) -> ResponseTemplate {
    let items: Vec<_> = names
        .iter()
        .enumerate()
        .map(|(i, name)| {
            json!({
                "SecurityId": i + 1,
                "SecurityName": name,
                "Total": "€ 1,00",
                "RealizedResult": "€ 0,50",
            })
        })
        .collect();
    ResponseTemplate::new(200).set_body_json(json!({
        "NoOfPages": total_pages,
        "ResultsHistoryItems": items,
    }))
}

async fn mount_page(server: &MockServer, page: u32, response: ResponseTemplate) {
    Mock::given(method("POST"))
        .and(path(RESULT_HISTORY_ENDPOINT))
        .and(body_string_contains(format!("page={page}&")))
        .respond_with(response)
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn collects_every_page_in_order() -> Result<()> {
    let server = MockServer::start().await;
    mount_page(&server, 1, results_page(3, &["A", "B"])).await;
    mount_page(&server, 2, results_page(3, &["C"])).await;
    mount_page(&server, 3, results_page(3, &["D"])).await;

    let api = PortalApiClient::new(&server.uri())?;
    let creds = credentials("127.0.0.1");
    let items = PaginatedFetcher::new(ResultsHistoryPages::new(
        &api,
        &creds,
        ResultCategory::Trackers,
        ResultYear::Year(2023),
    ))
    .collect_all()
    .await?;

    let names: Vec<_> = items.iter().map(|i| i.security_name.as_str()).collect();
    assert_eq!(names, vec!["A", "B", "C", "D"]);

    let requests = server.received_requests().await.unwrap_or_default();
    let pages: Vec<_> = requests
        .iter()
        .map(|r| {
            String::from_utf8_lossy(&r.body)
                .split('&')
                .find_map(|pair| pair.strip_prefix("page=").map(str::to_string))
                .unwrap_or_default()
        })
        .collect();
    assert_eq!(pages, vec!["1", "2", "3"]);
    Ok(())
}

#[tokio::test]
async fn query_parameters_match_the_results_overview() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(RESULT_HISTORY_ENDPOINT))
        .and(body_string_contains(
            "page=1&sortProperty=SecurityName&sortOrder=0&resultsType=Position&positionType=All&category=Cashdividenden&year=2022",
        ))
        .respond_with(results_page(1, &["A"]))
        .expect(1)
        .mount(&server)
        .await;

    let api = PortalApiClient::new(&server.uri())?;
    let creds = credentials("127.0.0.1");
    let items = PaginatedFetcher::new(ResultsHistoryPages::new(
        &api,
        &creds,
        ResultCategory::CashDividends,
        ResultYear::Year(2022),
    ))
    .single_page()
    .await?;
    assert_eq!(items.len(), 1);
    Ok(())
}

#[tokio::test]
async fn single_page_report_refuses_more_pages() -> Result<()> {
    let server = MockServer::start().await;
    mount_page(&server, 1, results_page(2, &["A"])).await;

    let api = PortalApiClient::new(&server.uri())?;
    let creds = credentials("127.0.0.1");
    let err = PaginatedFetcher::new(ResultsHistoryPages::new(
        &api,
        &creds,
        ResultCategory::CashDividends,
        ResultYear::Year(2023),
    ))
    .single_page()
    .await
    .unwrap_err();

    assert!(matches!(err, Error::UnsupportedPagination { total_pages: 2, .. }));
    assert!(err.to_string().contains("multipage results are not implemented"));
    Ok(())
}

#[tokio::test]
async fn empty_result_is_one_page() -> Result<()> {
    let server = MockServer::start().await;
    mount_page(&server, 1, results_page(0, &[])).await;

    let api = PortalApiClient::new(&server.uri())?;
    let creds = credentials("127.0.0.1");
    let items = PaginatedFetcher::new(ResultsHistoryPages::new(
        &api,
        &creds,
        ResultCategory::Trackers,
        ResultYear::SinceStart,
    ))
    .collect_all()
    .await?;
    assert!(items.is_empty());
    Ok(())
}

#[tokio::test]
async fn position_mutations_are_requested_per_security() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(POSITION_MUTATIONS_ENDPOINT))
        .and(body_string_contains("securityId=4711"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "NoOfPages": 1,
            "PositionMutationDetails": [{
                "TransactionDate": "01/02/2023",
                "TransactionType": "Aankoop",
                "Mutation": "10",
                "Price": "€ 75,12",
                "NewPosition": "10",
            }],
        })))
        .expect(1)
        .mount(&server)
        .await;

    let api = PortalApiClient::new(&server.uri())?;
    let creds = credentials("127.0.0.1");
    let mutations = PaginatedFetcher::new(PositionMutationPages::new(&api, &creds, "4711"))
        .single_page()
        .await?;
    assert_eq!(mutations.len(), 1);
    assert_eq!(mutations[0].transaction_type, "Aankoop");
    Ok(())
}
