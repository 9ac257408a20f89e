mod support;

use anyhow::Result;
use binck_export::portal::models::ResultsHistoryResponse;
use binck_export::portal::pagination::RESULT_HISTORY_ENDPOINT;
use binck_export::portal::PortalApiClient;
use binck_export::Error;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use support::{credentials, COOKIE_HEADER, TOKEN};

fn params() -> Vec<(&'static str, String)> {
    vec![
        ("page", "1".to_string()),
        ("category", "Cashdividenden".to_string()),
        ("year", "2023".to_string()),
    ]
}

#[tokio::test]
async fn call_sends_token_cookies_and_form_body() -> Result<()> {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(RESULT_HISTORY_ENDPOINT))
        .and(header("__RequestVerificationToken", TOKEN))
        .and(header("x-requested-with", "XMLHttpRequest"))
        .and(header("cookie", COOKIE_HEADER))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .and(body_string_contains("page=1&category=Cashdividenden&year=2023"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"{"NoOfPages":1,"ResultsHistoryItems":[{"SecurityId":7,"SecurityName":"A fund","Total":"€ 1,00"}]}"#,
            "application/json",
        ))
        .expect(1)
        .mount(&server)
        .await;

    let api = PortalApiClient::new(&server.uri())?;
    let response: ResultsHistoryResponse = api
        .call_as(RESULT_HISTORY_ENDPOINT, &params(), &credentials("127.0.0.1"))
        .await?;

    assert_eq!(response.no_of_pages, 1);
    assert_eq!(response.items[0].security_id, "7");
    assert_eq!(response.items[0].total, "€ 1,00");
    Ok(())
}

#[tokio::test]
async fn cookies_for_other_domains_are_not_sent() -> Result<()> {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(RESULT_HISTORY_ENDPOINT))
        .respond_with(ResponseTemplate::new(200).set_body_raw("{}", "application/json"))
        .mount(&server)
        .await;

    let api = PortalApiClient::new(&server.uri())?;
    api.call(RESULT_HISTORY_ENDPOINT, &params(), &credentials("web.binck.be"))
        .await?;

    let requests = server.received_requests().await.unwrap_or_default();
    assert_eq!(requests.len(), 1);
    assert!(!requests[0].headers.contains_key("cookie"));
    Ok(())
}

#[tokio::test]
async fn non_200_status_is_an_error() -> Result<()> {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(RESULT_HISTORY_ENDPOINT))
        .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
        .mount(&server)
        .await;

    let api = PortalApiClient::new(&server.uri())?;
    let err = api
        .call(RESULT_HISTORY_ENDPOINT, &params(), &credentials("127.0.0.1"))
        .await
        .unwrap_err();

    match err {
        Error::HttpStatus { endpoint, status } => {
            assert_eq!(endpoint, RESULT_HISTORY_ENDPOINT);
            assert_eq!(status, 500);
        }
        other => panic!("expected HTTP status error, got {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn html_body_is_a_malformed_response() -> Result<()> {
    let server = MockServer::start().await;

    // An expired session answers with the login page instead of JSON.
    Mock::given(method("POST"))
        .and(path(RESULT_HISTORY_ENDPOINT))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw("<html><body>Inloggen</body></html>", "text/html"),
        )
        .mount(&server)
        .await;

    let api = PortalApiClient::new(&server.uri())?;
    let err = api
        .call(RESULT_HISTORY_ENDPOINT, &params(), &credentials("127.0.0.1"))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::MalformedResponse { .. }));
    Ok(())
}
