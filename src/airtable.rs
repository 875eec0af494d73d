//! Hosted-table access: the `HostedTable` seam and its Airtable REST implementation.

use crate::config::AirtableSettings;
use crate::error::AppError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::time::Duration;

/// One record of a hosted table.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct AirtableRecord {
    pub id: String,
    #[serde(default)]
    pub fields: Map<String, Value>,
    #[serde(rename = "createdTime", default, skip_serializing_if = "Option::is_none")]
    pub created_time: Option<String>,
}

#[derive(Deserialize)]
struct ListPage {
    #[serde(default)]
    records: Vec<AirtableRecord>,
    offset: Option<String>,
}

/// Remote table the sync service pushes to and pulls from.
#[async_trait]
pub trait HostedTable: Send + Sync {
    /// Every record in the table, following pagination.
    async fn list_records(&self) -> Result<Vec<AirtableRecord>, AppError>;
    async fn create_record(&self, fields: Map<String, Value>) -> Result<AirtableRecord, AppError>;
    /// Partial update; fields not named are left unchanged.
    async fn update_record(&self, id: &str, fields: Map<String, Value>) -> Result<AirtableRecord, AppError>;
}

/// Airtable REST client for one table. Cheap to clone.
#[derive(Clone)]
pub struct AirtableClient {
    client: Client,
    table_url: String,
    api_key: String,
}

impl AirtableClient {
    pub fn new(settings: AirtableSettings) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| AppError::Unavailable(format!("failed to build HTTP client: {}", e)))?;
        let table_url = format!(
            "{}/{}/{}",
            settings.api_url.trim_end_matches('/'),
            settings.base_id,
            settings.buildings_table
        );
        Ok(Self {
            client,
            table_url,
            api_key: settings.api_key,
        })
    }

    pub fn table_url(&self) -> &str {
        &self.table_url
    }

    async fn read_record(what: &str, resp: reqwest::Response) -> Result<AirtableRecord, AppError> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AppError::Upstream(format!("{} returned {}: {}", what, status, body)));
        }
        Ok(resp.json().await?)
    }
}

#[async_trait]
impl HostedTable for AirtableClient {
    async fn list_records(&self) -> Result<Vec<AirtableRecord>, AppError> {
        let mut out = Vec::new();
        let mut offset: Option<String> = None;
        loop {
            let mut req = self.client.get(&self.table_url).bearer_auth(&self.api_key);
            if let Some(o) = &offset {
                req = req.query(&[("offset", o)]);
            }
            let resp = req.send().await?;
            let status = resp.status();
            if !status.is_success() {
                let body = resp.text().await.unwrap_or_default();
                return Err(AppError::Upstream(format!("GET {} returned {}: {}", self.table_url, status, body)));
            }
            let page: ListPage = resp.json().await?;
            out.extend(page.records);
            match page.offset {
                Some(next) => offset = Some(next),
                None => break,
            }
        }
        tracing::debug!(table = %self.table_url, count = out.len(), "listed hosted records");
        Ok(out)
    }

    async fn create_record(&self, fields: Map<String, Value>) -> Result<AirtableRecord, AppError> {
        let resp = self
            .client
            .post(&self.table_url)
            .bearer_auth(&self.api_key)
            .json(&json!({ "fields": fields, "typecast": true }))
            .send()
            .await?;
        Self::read_record("POST record", resp).await
    }

    async fn update_record(&self, id: &str, fields: Map<String, Value>) -> Result<AirtableRecord, AppError> {
        let resp = self
            .client
            .patch(format!("{}/{}", self.table_url, id))
            .bearer_auth(&self.api_key)
            .json(&json!({ "fields": fields, "typecast": true }))
            .send()
            .await?;
        Self::read_record("PATCH record", resp).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_url_joins_base_and_table() {
        let client = AirtableClient::new(AirtableSettings {
            api_key: "key".into(),
            base_id: "appBase".into(),
            buildings_table: "airtable_Building".into(),
            api_url: "https://api.airtable.com/v0/".into(),
        })
        .unwrap();
        assert_eq!(client.table_url(), "https://api.airtable.com/v0/appBase/airtable_Building");
    }

    #[test]
    fn list_page_decodes_offset_and_created_time() {
        let page: ListPage = serde_json::from_value(json!({
            "records": [{ "id": "rec1", "createdTime": "2024-01-01T00:00:00.000Z", "fields": { "Bld#": 1 } }],
            "offset": "itrNext"
        }))
        .unwrap();
        assert_eq!(page.offset.as_deref(), Some("itrNext"));
        assert_eq!(page.records[0].id, "rec1");
        assert_eq!(page.records[0].created_time.as_deref(), Some("2024-01-01T00:00:00.000Z"));
        assert_eq!(page.records[0].fields["Bld#"], json!(1));
    }

    #[tokio::test]
    async fn upstream_errors_name_the_status() {
        let resp = reqwest::Response::from(
            axum::http::Response::builder()
                .status(422)
                .body("INVALID_VALUE")
                .unwrap(),
        );
        let err = AirtableClient::read_record("POST record", resp).await.unwrap_err();
        assert_eq!(err.to_string(), "upstream: POST record returned 422 Unprocessable Entity: INVALID_VALUE");
        assert!(err.to_string().is_ascii());
    }
}
