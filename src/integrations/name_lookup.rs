use ethers::types::U256;
use reqwest::Client;
use std::time::Duration;

use crate::{
    config::Config,
    constants::NAME_LOOKUP_TIMEOUT_SECS,
    error::{AppError, Result},
};

const ITEMS_BY_QUERY: &str = r#"
  query ItemsByQuery($collectionSlug: String!, $query: String!) {
    itemsByQuery(collectionSlug: $collectionSlug, query: $query, limit: 1) {
      id
      name
      tokenId
    }
  }
"#;

/// Display-name lookup against the collection indexing API.
///
/// Lookups are best effort: every failure yields `None` and a warning.
#[derive(Clone)]
pub struct NameLookup {
    client: Client,
    endpoint: String,
    collection_slug: String,
}

impl NameLookup {
    pub fn new(endpoint: String, collection_slug: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(NAME_LOOKUP_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            endpoint,
            collection_slug,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.collection_items_endpoint.clone(),
            config.collection_slug.clone(),
        )
    }

    fn request_body(&self, token_id: &U256) -> serde_json::Value {
        serde_json::json!({
            "operationName": "ItemsByQuery",
            "query": ITEMS_BY_QUERY,
            "variables": {
                "collectionSlug": self.collection_slug,
                "query": token_id.to_string(),
            }
        })
    }

    pub async fn name_for_token(&self, token_id: &U256) -> Option<String> {
        match self.fetch_name(token_id).await {
            Ok(name) => name,
            Err(e) => {
                tracing::warn!("Name lookup for token {} failed: {}", token_id, e);
                None
            }
        }
    }

    async fn fetch_name(&self, token_id: &U256) -> Result<Option<String>> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&self.request_body(token_id))
            .send()
            .await
            .map_err(|e| AppError::ExternalAPI(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AppError::ExternalAPI(format!(
                "indexing API returned {}",
                response.status()
            )));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| AppError::ExternalAPI(format!("invalid JSON: {}", e)))?;
        Ok(extract_name(&body))
    }
}

/// `data.itemsByQuery[0].name`, ignoring empty names.
fn extract_name(body: &serde_json::Value) -> Option<String> {
    body.get("data")?
        .get("itemsByQuery")?
        .get(0)?
        .get("name")?
        .as_str()
        .filter(|name| !name.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_first_item_name() {
        let body = serde_json::json!({
            "data": { "itemsByQuery": [{ "id": "1", "name": "alice.base.eth", "tokenId": "42" }] }
        });
        assert_eq!(extract_name(&body), Some("alice.base.eth".to_string()));
    }

    #[test]
    fn missing_or_empty_name_is_none() {
        assert_eq!(extract_name(&serde_json::json!({ "data": { "itemsByQuery": [] } })), None);
        assert_eq!(
            extract_name(&serde_json::json!({ "data": { "itemsByQuery": [{ "name": "" }] } })),
            None
        );
        assert_eq!(extract_name(&serde_json::json!({ "errors": [] })), None);
    }

    #[test]
    fn request_uses_collection_slug_and_decimal_token_id() {
        let lookup = NameLookup::new("http://localhost".into(), "basenames".into());
        let body = lookup.request_body(&U256::from(42u64));
        assert_eq!(body["operationName"], "ItemsByQuery");
        assert_eq!(body["variables"]["collectionSlug"], "basenames");
        assert_eq!(body["variables"]["query"], "42");
    }

    #[tokio::test]
    async fn unreachable_endpoint_yields_none() {
        let lookup = NameLookup::new("http://127.0.0.1:9/graphql".into(), "basenames".into());
        assert_eq!(lookup.name_for_token(&U256::from(1u64)).await, None);
    }

    #[tokio::test]
    async fn transport_failure_is_an_external_api_error() {
        let lookup = NameLookup::new("http://127.0.0.1:9/graphql".into(), "basenames".into());
        let err = lookup.fetch_name(&U256::from(1u64)).await.unwrap_err();
        assert!(matches!(err, AppError::ExternalAPI(_)));
    }
}
