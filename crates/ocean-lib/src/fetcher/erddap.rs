//! ERDDAP tabledap client for Argo float profiles

use super::{ObservationSource, RawTable, WindowRequest, SOURCE_COLUMNS};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Argo profile dataset on ERDDAP servers
pub const ARGO_DATASET: &str = "ArgoFloats";

/// Observation source backed by an ERDDAP tabledap endpoint
pub struct ErddapSource {
    client: Client,
    base_url: String,
    dataset: String,
}

#[derive(Debug, Deserialize)]
struct TableResponse {
    table: Table,
}

#[derive(Debug, Deserialize)]
struct Table {
    #[serde(rename = "columnNames")]
    column_names: Vec<String>,
    #[serde(default)]
    rows: Vec<Vec<Value>>,
}

impl ErddapSource {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        Url::parse(base_url).context("Invalid upstream URL")?;

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            dataset: ARGO_DATASET.to_string(),
        })
    }

    /// Query URL selecting the Argo columns inside the request window
    pub fn query_url(&self, request: &WindowRequest) -> Result<Url> {
        let b = &request.bounds;
        let query = format!(
            "{columns}&latitude>={lat_min}&latitude<={lat_max}&longitude>={lon_min}&longitude<={lon_max}\
             &pres>=0&pres<={max_depth}&time>={start}T00:00:00Z&time<{end}T00:00:00Z",
            columns = SOURCE_COLUMNS.join(","),
            lat_min = b.lat_min,
            lat_max = b.lat_max,
            lon_min = b.lon_min,
            lon_max = b.lon_max,
            max_depth = request.max_depth,
            start = request.window.start.format("%Y-%m-%d"),
            end = request.window.end.format("%Y-%m-%d"),
        );

        let mut url = Url::parse(&format!("{}/{}.json", self.base_url, self.dataset))
            .context("Invalid dataset URL")?;
        url.set_query(Some(&query));
        Ok(url)
    }
}

#[async_trait]
impl ObservationSource for ErddapSource {
    fn name(&self) -> &str {
        "erddap"
    }

    async fn fetch_window(&self, request: &WindowRequest) -> Result<RawTable> {
        let url = self.query_url(request)?;
        debug!(url = %url, "Querying ERDDAP");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Failed to send request")?;

        // ERDDAP answers 404 when a query matches no rows
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(RawTable::default());
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("ERDDAP error ({}): {}", status, body.chars().take(200).collect::<String>());
        }

        let body: TableResponse = response.json().await.context("Failed to parse response")?;
        Ok(RawTable::new(body.table.column_names, body.table.rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::windows::DateWindow;
    use crate::models::BoundingBox;
    use chrono::NaiveDate;
    use mockito::Matcher;

    fn request() -> WindowRequest {
        WindowRequest {
            bounds: BoundingBox::new(50.0, 80.0, 5.0, 25.0),
            max_depth: 2000.0,
            window: DateWindow {
                start: NaiveDate::from_ymd_opt(2023, 7, 1).unwrap(),
                end: NaiveDate::from_ymd_opt(2023, 8, 1).unwrap(),
            },
        }
    }

    #[test]
    fn test_query_url_constraints() {
        let source =
            ErddapSource::new("https://erddap.example.org/erddap/tabledap/", Duration::from_secs(5))
                .unwrap();
        let url = source.query_url(&request()).unwrap();

        assert_eq!(url.path(), "/erddap/tabledap/ArgoFloats.json");
        let query = url.query().unwrap();
        assert!(query.starts_with("platform_number,cycle_number,time"));
        assert!(query.contains("latitude%3E=5"));
        assert!(query.contains("longitude%3C=80"));
        assert!(query.contains("pres%3C=2000"));
        assert!(query.contains("time%3E=2023-07-01T00:00:00Z"));
        assert!(query.contains("time%3C2023-08-01T00:00:00Z"));
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(ErddapSource::new("not a url", Duration::from_secs(5)).is_err());
    }

    #[tokio::test]
    async fn test_fetch_window_parses_table() {
        let mut server = mockito::Server::new_async().await;
        let body = serde_json::json!({
            "table": {
                "columnNames": SOURCE_COLUMNS,
                "columnTypes": ["String", "int", "String", "double", "double", "float", "float", "float"],
                "rows": [
                    ["2902746", 12, "2023-07-04T06:12:00Z", 15.2, 64.9, 5.0, 28.1, 35.9],
                    ["2902746", 12, "2023-07-04T06:12:00Z", 15.2, 64.9, 50.0, 26.4, 36.1]
                ]
            }
        });
        let mock = server
            .mock("GET", Matcher::Regex(r"^/tabledap/ArgoFloats\.json".to_string()))
            .match_query(Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body.to_string())
            .create_async()
            .await;

        let source =
            ErddapSource::new(&format!("{}/tabledap", server.url()), Duration::from_secs(5)).unwrap();
        let table = source.fetch_window(&request()).await.unwrap();

        mock.assert_async().await;
        assert_eq!(table.len(), 2);
        assert_eq!(table.columns()[7], "psal");
    }

    #[tokio::test]
    async fn test_not_found_is_empty() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", Matcher::Any)
            .with_status(404)
            .with_body("Error {\n    code=404;\n    message=\"Not Found: Your query produced no matching results.\";\n}")
            .create_async()
            .await;

        let source = ErddapSource::new(&server.url(), Duration::from_secs(5)).unwrap();
        let table = source.fetch_window(&request()).await.unwrap();
        assert!(table.is_empty());
    }

    #[tokio::test]
    async fn test_server_error_is_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", Matcher::Any)
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;

        let source = ErddapSource::new(&server.url(), Duration::from_secs(5)).unwrap();
        assert!(source.fetch_window(&request()).await.is_err());
    }
}
