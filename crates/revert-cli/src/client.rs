//! HTTP client for the content management API

use crate::config::RevertConfig;
use crate::error::{CliError, CliResult};
use async_trait::async_trait;
use reqwest::Client;
use revert_engine::{
    ContentKind, DirectoryError, EnvironmentDirectory, EnvironmentRecord, UnpublishBatch,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::debug;

/// HTTP client for the management API of one stack
pub struct ManagementClient {
    client: Client,
    base_url: String,
    api_version: u32,
    api_key: String,
    management_token: String,
}

#[derive(Debug, Deserialize)]
struct EnvironmentList {
    environments: Vec<EnvironmentRecord>,
}

/// Entry reference inside a bulk unpublish request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BulkEntryRef {
    pub uid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
}

/// Asset reference inside a bulk unpublish request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BulkAssetRef {
    pub uid: String,
}

/// Body of `POST /bulk/unpublish`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BulkUnpublishRequest {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub entries: Vec<BulkEntryRef>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub assets: Vec<BulkAssetRef>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub locales: Vec<String>,
    pub environments: Vec<String>,
}

impl BulkUnpublishRequest {
    /// One request per batch: every item, the batch's environment and locale
    pub fn from_batch(batch: &UnpublishBatch) -> Self {
        let mut request = Self {
            entries: Vec::new(),
            assets: Vec::new(),
            locales: batch.locale.iter().cloned().collect(),
            environments: vec![batch.environment.clone()],
        };
        match batch.content_kind {
            ContentKind::Entry => {
                request.entries = batch
                    .items
                    .iter()
                    .map(|item| BulkEntryRef {
                        uid: item.uid.clone(),
                        content_type: item.content_type.clone(),
                        locale: item.locale.clone(),
                    })
                    .collect();
            }
            ContentKind::Asset => {
                request.assets = batch
                    .items
                    .iter()
                    .map(|item| BulkAssetRef {
                        uid: item.uid.clone(),
                    })
                    .collect();
            }
        }
        request
    }
}

/// Where a publish goes
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublishTarget {
    pub environments: Vec<String>,
    pub locales: Vec<String>,
}

/// Body of an entry publish; `version` is omitted for a plain publish
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntryPublishRequest {
    pub entry: PublishTarget,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<u64>,
}

/// Body of an asset publish
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssetPublishRequest {
    pub asset: PublishTarget,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<u64>,
}

impl ManagementClient {
    /// Create a client; fails if the stack credentials are not configured
    pub fn new(config: &RevertConfig) -> CliResult<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or(CliError::MissingSetting("api_key"))?;
        let management_token = config
            .management_token
            .clone()
            .ok_or(CliError::MissingSetting("management_token"))?;

        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.api_endpoint.trim_end_matches('/').to_string(),
            api_version: config.api_version,
            api_key,
            management_token,
        })
    }

    /// List every environment of the stack
    pub async fn environments(&self) -> CliResult<Vec<EnvironmentRecord>> {
        let list: EnvironmentList = self.get("/environments").await?;
        Ok(list.environments)
    }

    /// Unpublish a set of entries or assets from one environment
    pub async fn bulk_unpublish(&self, request: &BulkUnpublishRequest) -> CliResult<serde_json::Value> {
        self.post("/bulk/unpublish", request).await
    }

    /// Publish one entry
    pub async fn publish_entry(
        &self,
        content_type: &str,
        entry_uid: &str,
        request: &EntryPublishRequest,
    ) -> CliResult<serde_json::Value> {
        self.post(
            &format!("/content_types/{}/entries/{}/publish", content_type, entry_uid),
            request,
        )
        .await
    }

    /// Publish one asset
    pub async fn publish_asset(
        &self,
        asset_uid: &str,
        request: &AssetPublishRequest,
    ) -> CliResult<serde_json::Value> {
        self.post(&format!("/assets/{}/publish", asset_uid), request)
            .await
    }

    // ========== HTTP helpers ==========

    fn url(&self, path: &str) -> String {
        format!("{}/v{}{}", self.base_url, self.api_version, path)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> CliResult<T> {
        debug!(path, "GET");
        let response = self
            .client
            .get(self.url(path))
            .header("api_key", &self.api_key)
            .header("authorization", &self.management_token)
            .send()
            .await?;
        self.handle_response(response).await
    }

    async fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> CliResult<T> {
        debug!(path, "POST");
        let response = self
            .client
            .post(self.url(path))
            .header("api_key", &self.api_key)
            .header("authorization", &self.management_token)
            .json(body)
            .send()
            .await?;
        self.handle_response(response).await
    }

    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> CliResult<T> {
        let status = response.status();

        if status.is_success() {
            Ok(response.json().await?)
        } else {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            Err(CliError::Api {
                status: status.as_u16(),
                message,
            })
        }
    }
}

#[async_trait]
impl EnvironmentDirectory for ManagementClient {
    async fn list_environments(&self) -> Result<Vec<EnvironmentRecord>, DirectoryError> {
        self.environments()
            .await
            .map_err(|e| Box::new(e) as DirectoryError)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use revert_engine::{Batch, UnpublishWorkItem};
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    pub(crate) fn config_for(server: &MockServer) -> RevertConfig {
        RevertConfig {
            api_endpoint: server.uri(),
            api_key: Some("blt-stack".into()),
            management_token: Some("cs-token".into()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_environments_sends_credentials() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v3/environments"))
            .and(header("api_key", "blt-stack"))
            .and(header("authorization", "cs-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "environments": [
                    {"name": "development", "uid": "blt-env-dev", "urls": []},
                    {"name": "prod", "uid": "blt-env-prod"}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = ManagementClient::new(&config_for(&server)).unwrap();
        let environments = client.list_environments().await.unwrap();

        assert_eq!(environments.len(), 2);
        assert_eq!(environments[1].uid, "blt-env-prod");
    }

    #[tokio::test]
    async fn test_error_status_becomes_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v3/environments"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid token"))
            .mount(&server)
            .await;

        let client = ManagementClient::new(&config_for(&server)).unwrap();
        let err = client.environments().await.unwrap_err();

        match err {
            CliError::Api { status, message } => {
                assert_eq!(status, 401);
                assert_eq!(message, "invalid token");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_bulk_unpublish_body_for_entries() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v3/bulk/unpublish"))
            .and(body_json(json!({
                "entries": [{"uid": "e1", "content_type": "article", "locale": "en-us"}],
                "locales": ["en-us"],
                "environments": ["prod"]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"notice": "queued"})))
            .expect(1)
            .mount(&server)
            .await;

        let batch = Batch {
            content_kind: ContentKind::Entry,
            environment: "prod".into(),
            locale: Some("en-us".into()),
            items: vec![UnpublishWorkItem {
                uid: "e1".into(),
                locale: Some("en-us".into()),
                content_type: Some("article".into()),
            }],
        };

        let client = ManagementClient::new(&config_for(&server)).unwrap();
        client
            .bulk_unpublish(&BulkUnpublishRequest::from_batch(&batch))
            .await
            .unwrap();
    }

    #[test]
    fn test_asset_unpublish_body_has_no_locales() {
        let batch = Batch {
            content_kind: ContentKind::Asset,
            environment: "prod".into(),
            locale: None,
            items: vec![UnpublishWorkItem {
                uid: "a1".into(),
                locale: None,
                content_type: None,
            }],
        };
        let body = serde_json::to_value(BulkUnpublishRequest::from_batch(&batch)).unwrap();
        assert_eq!(
            body,
            json!({"assets": [{"uid": "a1"}], "environments": ["prod"]})
        );
    }

    #[test]
    fn test_missing_credentials_are_reported() {
        let config = RevertConfig::default();
        assert!(matches!(
            ManagementClient::new(&config),
            Err(CliError::MissingSetting("api_key"))
        ));
    }
}
