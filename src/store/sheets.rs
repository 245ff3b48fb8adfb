//! Google Sheets values API adapter.

use super::{CellRange, Rows, TabularStore};
use crate::config::SheetsConfig;
use crate::error::{BotError, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};

/// Tabular store backed by one Google spreadsheet.
#[derive(Clone)]
pub struct SheetsStore {
    base_url: String,
    spreadsheet_id: String,
    access_token: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

impl SheetsStore {
    /// Build a store from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`BotError::Config`] when the spreadsheet id is empty or the HTTP
    /// client cannot be built.
    pub fn new(config: &SheetsConfig) -> Result<Self> {
        if config.spreadsheet_id.trim().is_empty() {
            return Err(BotError::Config("sheets.spreadsheet_id is empty".to_owned()));
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs.max(1)))
            .build()
            .map_err(|e| BotError::Config(format!("cannot build HTTP client: {e}")))?;
        Ok(Self {
            base_url: config.api_base_url.trim_end_matches('/').to_owned(),
            spreadsheet_id: config.spreadsheet_id.trim().to_owned(),
            access_token: config.access_token.clone(),
            client,
        })
    }

    fn values_url(&self, range: &CellRange) -> String {
        format!(
            "{}/v4/spreadsheets/{}/values/{}",
            self.base_url,
            self.spreadsheet_id,
            urlencoding::encode(&range.to_string())
        )
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if self.access_token.trim().is_empty() {
            request
        } else {
            request.bearer_auth(&self.access_token)
        }
    }

    async fn check(response: reqwest::Response, op: &str, range: &CellRange) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        warn!(%range, %status, "sheets {op} failed");
        Err(BotError::StoreUnavailable(format!(
            "sheets {op} {range} failed ({status}): {body}"
        )))
    }
}

fn cell_text(value: serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn transport(op: &str, range: &CellRange, err: reqwest::Error) -> BotError {
    BotError::StoreUnavailable(format!("sheets {op} {range}: {err}"))
}

#[async_trait]
impl TabularStore for SheetsStore {
    async fn read(&self, range: &CellRange) -> Result<Rows> {
        debug!(%range, "sheets read");
        let response = self
            .authorize(self.client.get(self.values_url(range)))
            .query(&[("majorDimension", "ROWS"), ("valueRenderOption", "FORMATTED_VALUE")])
            .send()
            .await
            .map_err(|e| transport("read", range, e))?;

        // An empty range is a 200 without `values`; 404 means the spreadsheet itself is gone.
        let response = Self::check(response, "read", range).await?;
        let body: ValueRange = response
            .json()
            .await
            .map_err(|e| transport("read", range, e))?;
        Ok(body
            .values
            .into_iter()
            .map(|row| row.into_iter().map(cell_text).collect())
            .collect())
    }

    async fn write(&self, range: &CellRange, rows: Rows) -> Result<()> {
        debug!(%range, rows = rows.len(), "sheets write");
        let body = json!({
            "range": range.to_string(),
            "majorDimension": "ROWS",
            "values": rows,
        });
        let response = self
            .authorize(self.client.put(self.values_url(range)))
            .query(&[("valueInputOption", "RAW")])
            .json(&body)
            .send()
            .await
            .map_err(|e| transport("write", range, e))?;
        Self::check(response, "write", range).await?;
        Ok(())
    }

    async fn append(&self, range: &CellRange, rows: Rows) -> Result<()> {
        debug!(%range, rows = rows.len(), "sheets append");
        let url = format!("{}:append", self.values_url(range));
        let body = json!({
            "majorDimension": "ROWS",
            "values": rows,
        });
        let response = self
            .authorize(self.client.post(url))
            .query(&[("valueInputOption", "RAW"), ("insertDataOption", "OVERWRITE")])
            .json(&body)
            .send()
            .await
            .map_err(|e| transport("append", range, e))?;
        Self::check(response, "append", range).await?;
        Ok(())
    }
}
