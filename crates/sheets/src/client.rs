use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, StatusCode, Url};
use rollcall_core::config::SheetsConfig;
use rollcall_core::{CellRange, CellRef, Grid, RosterSource, StoreError, TabularStore};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum SheetsClientError {
    #[error("invalid sheets api base url `{url}`: {reason}")]
    InvalidBaseUrl { url: String, reason: String },
    #[error("failed to build http client: {0}")]
    Http(#[from] reqwest::Error),
}

#[derive(Clone)]
pub struct SheetsClient {
    http: reqwest::Client,
    base_url: Url,
    access_token: SecretString,
}

#[derive(Debug, Default, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ValueRangeBody<'a> {
    range: &'a str,
    major_dimension: &'static str,
    values: [[&'a str; 1]; 1],
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

impl SheetsClient {
    pub fn new(
        base_url: &str,
        access_token: SecretString,
        timeout: Duration,
    ) -> Result<Self, SheetsClientError> {
        let base_url = Url::parse(base_url).map_err(|error| SheetsClientError::InvalidBaseUrl {
            url: base_url.to_owned(),
            reason: error.to_string(),
        })?;
        if base_url.cannot_be_a_base() {
            return Err(SheetsClientError::InvalidBaseUrl {
                url: base_url.to_string(),
                reason: "url cannot carry a path".to_owned(),
            });
        }

        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http, base_url, access_token })
    }

    pub fn from_config(config: &SheetsConfig) -> Result<Self, SheetsClientError> {
        Self::new(
            &config.api_base_url,
            config.access_token.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    /// `{base}/v4/spreadsheets/{id}/values/{a1}{suffix}`, each segment
    /// percent-encoded.
    fn values_url(&self, source: &RosterSource, a1: &str, suffix: &str) -> Result<Url, StoreError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| StoreError::InvalidRange(a1.to_owned()))?
            .pop_if_empty()
            .extend(["v4", "spreadsheets", source.spreadsheet_id(), "values"])
            .push(&format!("{a1}{suffix}"));
        Ok(url)
    }

    async fn send<B>(
        &self,
        method: Method,
        url: Url,
        body: Option<&B>,
    ) -> Result<reqwest::Response, StoreError>
    where
        B: Serialize + ?Sized,
    {
        let mut request =
            self.http.request(method, url).bearer_auth(self.access_token.expose_secret());
        if let Some(body) = body {
            request = request.json(body);
        }

        let response =
            request.send().await.map_err(|error| StoreError::Request(error.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let raw = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorEnvelope>(&raw)
            .map(|envelope| envelope.error.message)
            .unwrap_or_else(|_| fallback_message(status, &raw));
        warn!(
            event_name = "sheets.request.rejected",
            status = status.as_u16(),
            message = %message,
            "sheets api rejected request"
        );
        Err(StoreError::Rejected { status: status.as_u16(), message })
    }
}

fn fallback_message(status: StatusCode, raw: &str) -> String {
    let raw = raw.trim();
    if raw.is_empty() {
        status.canonical_reason().unwrap_or("unknown error").to_owned()
    } else {
        raw.to_owned()
    }
}

#[async_trait]
impl TabularStore for SheetsClient {
    async fn read_range(
        &self,
        source: &RosterSource,
        range: &CellRange,
    ) -> Result<Grid, StoreError> {
        let a1 = source.a1(range);
        let url = self.values_url(source, &a1, "")?;

        let response = self.send::<Value>(Method::GET, url, None).await?;
        let value_range: ValueRange =
            response.json().await.map_err(|error| StoreError::Decode(error.to_string()))?;

        debug!(
            event_name = "sheets.values.read",
            spreadsheet_id = source.spreadsheet_id(),
            range = %a1,
            rows = value_range.values.len(),
            "range read"
        );
        Ok(value_range.values)
    }

    async fn write_cell(
        &self,
        source: &RosterSource,
        cell: CellRef,
        value: &str,
    ) -> Result<(), StoreError> {
        let a1 = source.a1(&CellRange::cell(cell));
        let mut url = self.values_url(source, &a1, "")?;
        url.query_pairs_mut().append_pair("valueInputOption", "RAW");

        let body = ValueRangeBody { range: &a1, major_dimension: "ROWS", values: [[value]] };
        self.send(Method::PUT, url, Some(&body)).await?;

        debug!(
            event_name = "sheets.values.updated",
            spreadsheet_id = source.spreadsheet_id(),
            range = %a1,
            "cell written"
        );
        Ok(())
    }

    async fn clear_cell(&self, source: &RosterSource, cell: CellRef) -> Result<(), StoreError> {
        let a1 = source.a1(&CellRange::cell(cell));
        let url = self.values_url(source, &a1, ":clear")?;

        // The clear endpoint takes an empty JSON object as its request body.
        self.send(Method::POST, url, Some(&serde_json::json!({}))).await?;

        debug!(
            event_name = "sheets.values.cleared",
            spreadsheet_id = source.spreadsheet_id(),
            range = %a1,
            "cell cleared"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use rollcall_core::{
        read_roster, CellRange, CellRef, ClaimEngine, ClaimError, RosterSource, StoreError,
        TabularStore,
    };
    use secrecy::SecretString;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::{SheetsClient, SheetsClientError};

    const VALUES: &str = "/v4/spreadsheets/sheet-1/values";

    fn client(server: &MockServer) -> SheetsClient {
        SheetsClient::new(
            &server.uri(),
            SecretString::from("ya29.test".to_owned()),
            Duration::from_secs(5),
        )
        .expect("client")
    }

    fn source() -> RosterSource {
        RosterSource::new("sheet-1", "Mooncrat")
    }

    #[tokio::test]
    async fn read_range_sends_bearer_token_and_returns_values() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("{VALUES}/Mooncrat!1:1")))
            .and(header("authorization", "Bearer ya29.test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "range": "Mooncrat!A1:Z1",
                "majorDimension": "ROWS",
                "values": [["Alpha", "", "", "", "", "Bravo"]]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let grid = client(&server)
            .read_range(&source(), &CellRange::rows(1, 1))
            .await
            .expect("read");

        assert_eq!(grid.len(), 1);
        assert_eq!(grid[0][0], json!("Alpha"));
        assert_eq!(grid[0][5], json!("Bravo"));
    }

    #[tokio::test]
    async fn empty_range_has_no_values_field() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("{VALUES}/Mooncrat!E3")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "range": "Mooncrat!E3",
                "majorDimension": "ROWS"
            })))
            .mount(&server)
            .await;

        let grid = client(&server)
            .read_range(&source(), &CellRange::cell(CellRef::new(4, 3)))
            .await
            .expect("read");

        assert!(grid.is_empty());
    }

    #[tokio::test]
    async fn write_cell_puts_raw_single_value() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path(format!("{VALUES}/Mooncrat!J3")))
            .and(query_param("valueInputOption", "RAW"))
            .and(body_json(json!({
                "range": "Mooncrat!J3",
                "majorDimension": "ROWS",
                "values": [["=Bob"]]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "spreadsheetId": "sheet-1",
                "updatedCells": 1
            })))
            .expect(1)
            .mount(&server)
            .await;

        client(&server).write_cell(&source(), CellRef::new(9, 3), "=Bob").await.expect("write");
    }

    #[tokio::test]
    async fn clear_cell_posts_to_clear_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("{VALUES}/Mooncrat!E4:clear")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "spreadsheetId": "sheet-1",
                "clearedRange": "Mooncrat!E4"
            })))
            .expect(1)
            .mount(&server)
            .await;

        client(&server).clear_cell(&source(), CellRef::new(4, 4)).await.expect("clear");
    }

    #[tokio::test]
    async fn api_error_body_becomes_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": {
                    "code": 400,
                    "message": "Unable to parse range: Nope!1:1",
                    "status": "INVALID_ARGUMENT"
                }
            })))
            .mount(&server)
            .await;

        let result = client(&server)
            .read_range(&RosterSource::new("sheet-1", "Nope"), &CellRange::rows(1, 1))
            .await;

        assert_eq!(
            result,
            Err(StoreError::Rejected {
                status: 400,
                message: "Unable to parse range: Nope!1:1".to_owned(),
            })
        );
    }

    #[tokio::test]
    async fn non_json_error_falls_back_to_status_reason() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let result = client(&server).write_cell(&source(), CellRef::new(4, 3), "Bob").await;

        assert_eq!(
            result,
            Err(StoreError::Rejected { status: 503, message: "Service Unavailable".to_owned() })
        );
    }

    #[tokio::test]
    async fn malformed_success_body_is_a_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let result = client(&server).read_range(&source(), &CellRange::rows(1, 1)).await;

        assert!(matches!(result, Err(StoreError::Decode(_))));
    }

    #[tokio::test]
    async fn claim_engine_runs_against_the_http_store() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("{VALUES}/Mooncrat!1:1")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "values": [["Alpha", "", "", "", "", "Bravo"]]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("{VALUES}/Mooncrat!J3")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "values": [["Carol"]]
            })))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let engine = ClaimEngine::new(std::sync::Arc::new(client(&server)));
        let result = engine.claim(&source(), "Bravo", 1, "Bob").await;

        assert!(matches!(
            result,
            Err(ClaimError::AlreadyClaimed { ref occupant, .. }) if occupant == "Carol"
        ));
    }

    #[tokio::test]
    async fn read_roster_fetches_header_then_data_block() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("{VALUES}/Mooncrat!1:1")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "values": [["Alpha"]]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("{VALUES}/Mooncrat!A3:E")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "values": [["1", "Tank", "Sword", "", "P1"], ["2", "", "Axe"]]
            })))
            .mount(&server)
            .await;

        let roster = read_roster(&client(&server), &source()).await.expect("roster");

        assert_eq!(roster.party_names, vec!["Alpha"]);
        assert_eq!(roster.blocks[0].slots[1].role, "Tank");
    }

    #[test]
    fn rejects_relative_base_url() {
        let result = SheetsClient::new(
            "not a url",
            SecretString::from("token".to_owned()),
            Duration::from_secs(1),
        );
        assert!(matches!(result, Err(SheetsClientError::InvalidBaseUrl { .. })));
    }
}
