//! Implements the `Drive` and `Sheets` traits against the Google APIs.

use crate::api::{CellUpdate, Drive, Sheets, Spreadsheet, TokenProvider};
use crate::error::Res;
use anyhow::Context;
use sheets::types::{BatchUpdateValuesRequest, Dimension, ValueInputOption, ValueRange};
use sheets::ClientError;
use tracing::trace;

const DRIVE_FILES_URL: &str = "https://www.googleapis.com/drive/v3/files";

/// Talks to Google Drive with `reqwest` and to Google Sheets with `sheets::Client`. It takes a
/// `TokenProvider`, on which it calls refresh to keep the token up-to-date.
pub(crate) struct GoogleApi {
    token_provider: TokenProvider,
    client: sheets::Client,
    http: reqwest::Client,
}

impl GoogleApi {
    pub(crate) async fn new(mut token_provider: TokenProvider) -> Res<Self> {
        let client = create_sheets_client(&mut token_provider).await?;
        Ok(Self {
            token_provider,
            client,
            http: reqwest::Client::new(),
        })
    }

    /// Refreshes the sheets client with a new access token if needed
    async fn refresh_client(&mut self) -> Res<()> {
        self.client = create_sheets_client(&mut self.token_provider).await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl Drive for GoogleApi {
    async fn copy_file(&mut self, file_id: &str, name: &str) -> Res<String> {
        trace!("copy_file {file_id} to '{name}'");
        let token = self.token_provider.token_with_refresh().await?.to_string();

        // POST https://www.googleapis.com/drive/v3/files/{fileId}/copy
        let url = format!("{DRIVE_FILES_URL}/{file_id}/copy");
        let response = self
            .http
            .post(&url)
            .bearer_auth(token)
            .json(&serde_json::json!({
                "name": name
            }))
            .send()
            .await
            .context("Failed to send copy request to Google Drive API")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read response body".to_string());
            anyhow::bail!(
                "Google Drive API copy failed with status {}: {}",
                status,
                body
            );
        }

        let response_json: serde_json::Value = response
            .json()
            .await
            .context("Failed to parse Google Drive API response")?;

        let new_id = response_json
            .get("id")
            .and_then(|v| v.as_str())
            .context("Google Drive API response missing 'id' field")?
            .to_string();

        Ok(new_id)
    }
}

#[async_trait::async_trait]
impl Sheets for GoogleApi {
    async fn fetch_spreadsheet(&mut self, spreadsheet_id: &str) -> Res<Spreadsheet> {
        trace!("fetch_spreadsheet {spreadsheet_id}");
        self.refresh_client().await?;
        let response = self
            .client
            .spreadsheets()
            .get(spreadsheet_id, false, &[])
            .await
            .map_err(map_client_error)
            .with_context(|| format!("Failed to fetch spreadsheet {spreadsheet_id}"))?;

        let body = response.body;
        let title = body
            .properties
            .map(|p| p.title)
            .unwrap_or_default();
        let sheets = body
            .sheets
            .into_iter()
            .map(|s| s.properties.map(|p| p.title).unwrap_or_default())
            .collect();

        Ok(Spreadsheet {
            id: spreadsheet_id.to_string(),
            title,
            sheets,
        })
    }

    async fn update_cells(
        &mut self,
        spreadsheet_id: &str,
        sheet_title: &str,
        cells: &[CellUpdate],
    ) -> Res<()> {
        trace!("update_cells {} cells in {sheet_title}", cells.len());
        if cells.is_empty() {
            return Ok(());
        }
        self.refresh_client().await?;
        let value_ranges: Vec<ValueRange> = cells
            .iter()
            .map(|c| ValueRange {
                major_dimension: Some(Dimension::Rows),
                range: c.range(sheet_title),
                values: vec![vec![c.value.clone()]],
            })
            .collect();

        let request = BatchUpdateValuesRequest {
            data: value_ranges,
            include_values_in_response: Some(false),
            response_date_time_render_option: None,
            response_value_render_option: None,
            value_input_option: Some(ValueInputOption::UserEntered),
        };

        self.client
            .spreadsheets()
            .values_batch_update(spreadsheet_id, &request)
            .await
            .map_err(map_client_error)
            .with_context(|| format!("Failed to write {} cells to {sheet_title}", cells.len()))?;
        Ok(())
    }
}

/// Creates a new sheets client with a refreshed access token.
async fn create_sheets_client(token_provider: &mut TokenProvider) -> Res<sheets::Client> {
    let access_token = token_provider.token_with_refresh().await?;

    // The sheets crate requires client_id, client_secret, redirect_uri and refresh_token, but API
    // calls only use the access token. We handle refresh ourselves.
    Ok(sheets::Client::new(
        String::new(),
        String::new(),
        String::new(),
        access_token.to_string(),
        String::new(),
    ))
}

fn map_client_error(e: ClientError) -> anyhow::Error {
    let error_name = match &e {
        ClientError::EmptyRefreshToken => "EmptyRefreshToken".to_string(),
        ClientError::FromUtf8Error(inner) => format!("FromUtf8Error {inner}"),
        ClientError::UrlParserError(inner) => format!("UrlParserError {inner}"),
        ClientError::SerdeJsonError(inner) => format!("SerdeJsonError {inner}"),
        ClientError::ReqwestError(inner) => format!("ReqwestError {inner}"),
        ClientError::InvalidHeaderValue(inner) => format!("InvalidHeaderValue {inner}"),
        ClientError::ReqwestMiddleWareError(inner) => format!("ReqwestMiddleWareError {inner}"),
        ClientError::HttpError { .. } => "HttpError".to_string(),
        ClientError::Other(_) => "Other".to_string(),
    };
    anyhow::Error::new(e).context(error_name)
}
