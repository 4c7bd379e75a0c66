//! Elasticsearch REST client.

use async_trait::async_trait;
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use serde_json::{json, Value as JsonValue};
use std::fmt;
use std::time::Duration;

use crate::backend::SearchBackend;
use crate::error::{Result, SearchEngineError};

/// Search backend speaking the Elasticsearch REST API.
pub struct ElasticBackend {
    http: reqwest::Client,
    base_url: String,
}

impl ElasticBackend {
    /// Create a client against an Elasticsearch base URL.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self { http, base_url })
    }

    fn index_url(&self, name: &str) -> String {
        format!("{}/{}", self.base_url, name)
    }

    fn doc_url(&self, name: &str, id: &str) -> String {
        // Document ids are IRIs; escape them for the URL path.
        let encoded = utf8_percent_encode(id, NON_ALPHANUMERIC);
        format!("{}/{}/_doc/{}", self.base_url, name, encoded)
    }

    async fn expect_success(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(SearchEngineError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

impl fmt::Debug for ElasticBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElasticBackend")
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[async_trait]
impl SearchBackend for ElasticBackend {
    async fn index_exists(&self, name: &str) -> Result<bool> {
        let response = self.http.head(self.index_url(name)).send().await?;
        match response.status() {
            reqwest::StatusCode::OK => Ok(true),
            reqwest::StatusCode::NOT_FOUND => Ok(false),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(SearchEngineError::Status {
                    status: status.as_u16(),
                    body,
                })
            }
        }
    }

    async fn create_index(
        &self,
        name: &str,
        mappings: Option<&JsonValue>,
        settings: Option<&JsonValue>,
    ) -> Result<()> {
        let mut body = serde_json::Map::new();
        if let Some(mappings) = mappings {
            body.insert("mappings".to_string(), mappings.clone());
        }
        if let Some(settings) = settings {
            body.insert("settings".to_string(), settings.clone());
        }

        let response = self
            .http
            .put(self.index_url(name))
            .json(&JsonValue::Object(body))
            .send()
            .await?;
        Self::expect_success(response).await?;
        Ok(())
    }

    async fn delete_index(&self, name: &str) -> Result<()> {
        let response = self.http.delete(self.index_url(name)).send().await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(());
        }
        Self::expect_success(response).await?;
        Ok(())
    }

    async fn clear_index(&self, name: &str) -> Result<()> {
        let url = format!("{}/_delete_by_query?conflicts=proceed", self.index_url(name));
        let response = self
            .http
            .post(url)
            .json(&json!({ "query": { "match_all": {} } }))
            .send()
            .await?;
        Self::expect_success(response).await?;
        Ok(())
    }

    async fn refresh_index(&self, name: &str) -> Result<()> {
        let url = format!("{}/_refresh", self.index_url(name));
        let response = self.http.post(url).send().await?;
        Self::expect_success(response).await?;
        Ok(())
    }

    async fn upsert_document(&self, name: &str, id: &str, body: JsonValue) -> Result<()> {
        let response = self
            .http
            .put(self.doc_url(name, id))
            .json(&body)
            .send()
            .await?;
        Self::expect_success(response).await?;
        Ok(())
    }

    async fn delete_document(&self, name: &str, id: &str) -> Result<()> {
        let response = self.http.delete(self.doc_url(name, id)).send().await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(());
        }
        Self::expect_success(response).await?;
        Ok(())
    }

    async fn bulk_upsert(&self, name: &str, docs: Vec<(String, JsonValue)>) -> Result<()> {
        if docs.is_empty() {
            return Ok(());
        }

        let mut body = String::new();
        for (id, doc) in &docs {
            let action = json!({ "index": { "_index": name, "_id": id } });
            body.push_str(&action.to_string());
            body.push('\n');
            body.push_str(&doc.to_string());
            body.push('\n');
        }

        let response = self
            .http
            .post(format!("{}/_bulk", self.base_url))
            .header("Content-Type", "application/x-ndjson")
            .body(body)
            .send()
            .await?;
        let response = Self::expect_success(response).await?;

        // The bulk endpoint reports per-item failures in a 200 response;
        // those are logged and skipped rather than failing the batch.
        let report: JsonValue = response.json().await?;
        if report.get("errors").and_then(|e| e.as_bool()).unwrap_or(false) {
            let failed = report
                .get("items")
                .and_then(|items| items.as_array())
                .map(|items| {
                    items
                        .iter()
                        .filter(|item| {
                            item.get("index")
                                .and_then(|i| i.get("error"))
                                .is_some()
                        })
                        .count()
                })
                .unwrap_or(0);
            tracing::warn!(index = name, failed, "bulk upsert reported item failures");
        }
        Ok(())
    }

    async fn search(&self, name: &str, body: JsonValue) -> Result<JsonValue> {
        let url = format!("{}/_search", self.index_url(name));
        let response = self.http.post(url).json(&body).send().await?;
        let response = Self::expect_success(response).await?;
        Ok(response.json().await?)
    }
}
