//! HTTP clients for the Pinecone control and data planes.

use crate::config::Config;
use crate::credentials::ApiKey;
use crate::pinecone::types::{DescribeIndexResponse, PineconeError, QueryResponse, UpsertResponse};
use crate::vector_store::{IndexConnector, IndexError, IndexMatch, IndexRecord, VectorIndex};
use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde_json::{Value, json};
use std::sync::Arc;

const API_VERSION: &str = "2024-07";
const UPSERT_BATCH_SIZE: usize = 100;

/// Resolves index names to data-plane hosts through the Pinecone control plane.
pub struct PineconeConnector {
    client: Client,
    controller_url: String,
    namespace: Option<String>,
}

impl PineconeConnector {
    /// Construct a connector for the given control plane; `namespace` applies to every index.
    pub fn new(
        client: Client,
        controller_url: &str,
        namespace: Option<String>,
    ) -> Result<Self, PineconeError> {
        let controller_url =
            normalize_base_url(controller_url).map_err(PineconeError::InvalidUrl)?;
        Ok(Self {
            client,
            controller_url,
            namespace: namespace.filter(|value| !value.trim().is_empty()),
        })
    }

    /// Construct a connector from the runtime configuration.
    pub fn from_config(config: &Config, client: Client) -> Result<Self, PineconeError> {
        Self::new(
            client,
            &config.pinecone_controller_url,
            config.pinecone_namespace.clone(),
        )
    }

    /// Look up the data-plane host serving `index_name`.
    pub async fn describe_index_host(
        &self,
        credential: &ApiKey,
        index_name: &str,
    ) -> Result<String, PineconeError> {
        let url = format_endpoint(&self.controller_url, &format!("indexes/{index_name}"));
        let response = authorized(self.client.request(Method::GET, url), credential)
            .send()
            .await?;
        let response = check_status(response, "describe index").await?;
        let DescribeIndexResponse { host } = response.json().await?;
        tracing::debug!("Resolved Pinecone index host");
        Ok(host)
    }
}

#[async_trait]
impl IndexConnector for PineconeConnector {
    async fn connect(
        &self,
        credential: &ApiKey,
        index_name: &str,
    ) -> Result<Arc<dyn VectorIndex>, IndexError> {
        let index_name = index_name.trim();
        if index_name.is_empty() {
            return Err(IndexError::IndexNotFound("index name is empty".into()));
        }
        let host = self.describe_index_host(credential, index_name).await?;
        let index = PineconeIndex::new(
            self.client.clone(),
            &host,
            credential.clone(),
            self.namespace.clone(),
        )?;
        Ok(Arc::new(index))
    }
}

/// Data-plane client bound to a single Pinecone index.
pub struct PineconeIndex {
    client: Client,
    base_url: String,
    api_key: ApiKey,
    namespace: Option<String>,
}

impl PineconeIndex {
    /// Construct a client for an index host; bare hosts are assumed to speak HTTPS.
    pub fn new(
        client: Client,
        host: &str,
        api_key: ApiKey,
        namespace: Option<String>,
    ) -> Result<Self, PineconeError> {
        let host = host.trim();
        let url = if host.contains("://") {
            host.to_string()
        } else {
            format!("https://{host}")
        };
        let base_url = normalize_base_url(&url).map_err(PineconeError::InvalidUrl)?;
        Ok(Self {
            client,
            base_url,
            api_key,
            namespace,
        })
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format_endpoint(&self.base_url, path);
        authorized(self.client.request(method, url), &self.api_key)
    }

    async fn upsert_batch(&self, records: &[IndexRecord]) -> Result<usize, PineconeError> {
        let vectors: Vec<Value> = records
            .iter()
            .map(|record| {
                json!({
                    "id": record.id,
                    "values": record.values,
                    "metadata": record.metadata,
                })
            })
            .collect();
        let mut body = json!({ "vectors": vectors });
        if let (Some(namespace), Some(obj)) = (&self.namespace, body.as_object_mut()) {
            obj.insert("namespace".into(), Value::String(namespace.clone()));
        }

        let response = self
            .request(Method::POST, "vectors/upsert")
            .json(&body)
            .send()
            .await?;
        let response = check_status(response, "upsert").await?;
        let UpsertResponse { upserted_count } = response.json().await?;
        Ok(upserted_count)
    }
}

#[async_trait]
impl VectorIndex for PineconeIndex {
    async fn upsert(&self, records: Vec<IndexRecord>) -> Result<usize, IndexError> {
        let mut upserted = 0;
        for batch in records.chunks(UPSERT_BATCH_SIZE) {
            upserted += self.upsert_batch(batch).await?;
        }
        tracing::debug!(records = records.len(), upserted, "Pinecone upsert finished");
        Ok(upserted)
    }

    async fn query(&self, vector: Vec<f32>, top_k: usize) -> Result<Vec<IndexMatch>, IndexError> {
        let mut body = json!({
            "vector": vector,
            "topK": top_k,
            "includeValues": true,
            "includeMetadata": true,
        });
        if let (Some(namespace), Some(obj)) = (&self.namespace, body.as_object_mut()) {
            obj.insert("namespace".into(), Value::String(namespace.clone()));
        }

        let response = self
            .request(Method::POST, "query")
            .json(&body)
            .send()
            .await
            .map_err(PineconeError::from)?;
        let response = check_status(response, "query").await?;
        let payload: QueryResponse = response.json().await.map_err(PineconeError::from)?;

        Ok(payload
            .matches
            .into_iter()
            .map(|hit| IndexMatch {
                id: hit.id,
                score: hit.score,
                values: (!hit.values.is_empty()).then_some(hit.values),
                metadata: hit.metadata.unwrap_or_default(),
            })
            .collect())
    }
}

fn authorized(builder: reqwest::RequestBuilder, api_key: &ApiKey) -> reqwest::RequestBuilder {
    builder
        .header("Api-Key", api_key.expose())
        .header("X-Pinecone-API-Version", API_VERSION)
}

async fn check_status(
    response: reqwest::Response,
    operation: &'static str,
) -> Result<reqwest::Response, PineconeError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let error = if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        PineconeError::Unauthorized { status, body }
    } else {
        PineconeError::UnexpectedStatus { status, body }
    };
    tracing::error!(operation, error = %error, "Pinecone request failed");
    Err(error)
}

fn normalize_base_url(url: &str) -> Result<String, String> {
    let mut parsed = reqwest::Url::parse(url).map_err(|err| err.to_string())?;
    let path = parsed.path().trim_end_matches('/').to_string();
    parsed.set_path(&path);
    Ok(parsed.to_string())
}

fn format_endpoint(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    format!("{base}/{path}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{
        Method::{GET, POST},
        MockServer,
    };
    use serde_json::Map;

    fn record(id: usize) -> IndexRecord {
        let mut metadata = Map::new();
        metadata.insert("text".into(), Value::String(format!("chunk {id}")));
        IndexRecord {
            id: format!("id-{id}"),
            values: vec![0.1, 0.2],
            metadata,
        }
    }

    #[test]
    fn bare_hosts_default_to_https() {
        let index = PineconeIndex::new(
            Client::new(),
            "handbook-abc123.svc.pinecone.io",
            ApiKey::new("pc-key"),
            None,
        )
        .expect("index");
        assert_eq!(
            format_endpoint(&index.base_url, "query"),
            "https://handbook-abc123.svc.pinecone.io/query"
        );
    }

    #[tokio::test]
    async fn connect_resolves_host_and_queries_with_metadata() {
        let server = MockServer::start_async().await;
        let describe = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/indexes/handbook")
                    .header("api-key", "pc-key")
                    .header("x-pinecone-api-version", API_VERSION);
                then.status(200).json_body(json!({
                    "name": "handbook",
                    "dimension": 2,
                    "host": server.base_url(),
                }));
            })
            .await;
        let query = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/query")
                    .header("api-key", "pc-key")
                    .body_contains("\"topK\":15")
                    .body_contains("\"includeValues\":true")
                    .body_contains("\"namespace\":\"hr\"");
                then.status(200).json_body(json!({
                    "matches": [
                        {
                            "id": "a",
                            "score": 0.91,
                            "values": [1.0, 0.0],
                            "metadata": { "text": "Vacation: 20 days", "page": 2.0 }
                        },
                        { "id": "b", "score": 0.5 }
                    ]
                }));
            })
            .await;

        let connector =
            PineconeConnector::new(Client::new(), &server.base_url(), Some("hr".into()))
                .expect("connector");
        let index = connector
            .connect(&ApiKey::new("pc-key"), "handbook")
            .await
            .expect("connect");
        let matches = index.query(vec![1.0, 0.0], 15).await.expect("query");

        describe.assert_async().await;
        query.assert_async().await;
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].values.as_deref(), Some(&[1.0, 0.0][..]));
        assert_eq!(matches[0].metadata["text"], json!("Vacation: 20 days"));
        assert!(matches[1].values.is_none());
    }

    #[tokio::test]
    async fn upsert_is_split_into_batches_of_one_hundred() {
        let server = MockServer::start_async().await;
        let upsert = server
            .mock_async(|when, then| {
                when.method(POST).path("/vectors/upsert");
                then.status(200).json_body(json!({ "upsertedCount": 75 }));
            })
            .await;

        let index = PineconeIndex::new(
            Client::new(),
            &server.base_url(),
            ApiKey::new("pc-key"),
            None,
        )
        .expect("index");
        let upserted = index
            .upsert((0..150).map(record).collect())
            .await
            .expect("upsert");

        upsert.assert_hits_async(2).await;
        assert_eq!(upserted, 150);
    }

    #[tokio::test]
    async fn rejected_key_maps_to_unauthorized() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/indexes/handbook");
                then.status(401).body("Invalid API Key");
            })
            .await;

        let connector =
            PineconeConnector::new(Client::new(), &server.base_url(), None).expect("connector");
        let error = connector
            .connect(&ApiKey::new("pc-wrong"), "handbook")
            .await
            .err()
            .expect("connect should fail");
        assert!(matches!(error, IndexError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn missing_index_maps_to_not_found() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/indexes/absent");
                then.status(404).body("not found");
            })
            .await;

        let connector =
            PineconeConnector::new(Client::new(), &server.base_url(), None).expect("connector");
        let error = connector
            .connect(&ApiKey::new("pc-key"), "absent")
            .await
            .err()
            .expect("connect should fail");
        assert!(matches!(error, IndexError::IndexNotFound(_)));
    }

    #[tokio::test]
    async fn transport_errors_omit_the_index_url() {
        let connector =
            PineconeConnector::new(Client::new(), "http://127.0.0.1:9", None).expect("connector");
        let error = connector
            .connect(&ApiKey::new("pc-key"), "private-handbook")
            .await
            .err()
            .expect("connect should fail");
        assert!(matches!(error, IndexError::Unavailable(_)));
        assert!(!error.to_string().contains("private-handbook"));
    }
}
