//! HTTP client for the hosted search service (Algolia batch API).
//!
//! The service commits writes asynchronously, so a successful response only
//! means the batch was accepted; queryability follows after an unspecified
//! delay.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

use super::traits::{BaseSearchIndex, SearchDocument};

const REQUEST_TIMEOUT_SECS: u64 = 10;

/// A request the service rejected outright (4xx: bad credentials, malformed
/// batch). Retrying the same request cannot succeed.
#[derive(Debug, Error)]
#[error("search API rejected the request ({status}): {body}")]
pub struct SearchRejected {
    pub status: u16,
    pub body: String,
}

/// Retry predicate for search-index calls: everything is worth retrying
/// except an outright rejection.
pub fn is_transient_search_error(error: &anyhow::Error) -> bool {
    error.downcast_ref::<SearchRejected>().is_none()
}

/// Batch-writing client for the hosted search index.
pub struct AlgoliaClient {
    app_id: String,
    admin_key: String,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct BatchRequest {
    requests: Vec<BatchOperation>,
}

#[derive(Debug, Serialize)]
struct BatchOperation {
    action: &'static str,
    body: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct BatchResponse {
    #[serde(rename = "objectIDs")]
    object_ids: Vec<String>,
}

impl AlgoliaClient {
    pub fn new(app_id: String, admin_key: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            app_id,
            admin_key,
            client,
        })
    }

    fn batch_url(&self, index: &str) -> String {
        format!("https://{}.algolia.net/1/indexes/{}/batch", self.app_id, index)
    }

    async fn send_batch(&self, index: &str, request: &BatchRequest) -> Result<BatchResponse> {
        let response = self
            .client
            .post(self.batch_url(index))
            .header("X-Algolia-Application-Id", &self.app_id)
            .header("X-Algolia-API-Key", &self.admin_key)
            .json(request)
            .send()
            .await
            .context("Failed to send search batch request")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            if status.is_client_error() {
                return Err(SearchRejected {
                    status: status.as_u16(),
                    body,
                }
                .into());
            }
            anyhow::bail!("Search API error {}: {}", status, body);
        }

        response
            .json()
            .await
            .context("Failed to parse search batch response")
    }
}

#[async_trait]
impl BaseSearchIndex for AlgoliaClient {
    async fn upsert(&self, index: &str, documents: &[SearchDocument]) -> Result<usize> {
        if documents.is_empty() {
            return Ok(0);
        }

        let request = BatchRequest {
            requests: documents
                .iter()
                .map(|doc| {
                    Ok(BatchOperation {
                        action: "updateObject",
                        body: serde_json::to_value(doc)?,
                    })
                })
                .collect::<Result<_>>()?,
        };

        let response = self.send_batch(index, &request).await?;
        Ok(response.object_ids.len())
    }

    async fn delete(&self, index: &str, ids: &[String]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }

        let request = BatchRequest {
            requests: ids
                .iter()
                .map(|id| BatchOperation {
                    action: "deleteObject",
                    body: json!({ "objectID": id }),
                })
                .collect(),
        };

        self.send_batch(index, &request).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejections_are_permanent_other_errors_transient() {
        let rejected: anyhow::Error = SearchRejected {
            status: 403,
            body: "invalid key".into(),
        }
        .into();
        assert!(!is_transient_search_error(&rejected));

        let outage = anyhow::anyhow!("connection reset");
        assert!(is_transient_search_error(&outage));

        // Wrapping with context must not hide the rejection.
        let wrapped = rejected.context("search upsert");
        assert!(!is_transient_search_error(&wrapped));
    }
}
