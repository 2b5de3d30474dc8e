use async_trait::async_trait;
use reqwest::{Client, Method};
use serde_json::{json, Value};
use tracing::{debug, error, info};

use crate::config::SearchConfig;
use crate::domain::{error::KnowledgeError, ports::DocumentSink};
use crate::infrastructure::http::executor::{send_request, ApiRequest};

pub struct SearchIndexWriter {
    config: SearchConfig,
    index_name: String,
    http: Client,
}

impl SearchIndexWriter {
    pub fn new(config: SearchConfig, index_name: String, http: Client) -> Self {
        debug!("Initializing index writer for index: {}", index_name);
        Self { config, index_name, http }
    }

    fn to_actions(documents: &[Value]) -> Vec<Value> {
        documents
            .iter()
            .map(|doc| match doc {
                Value::Object(fields) if !fields.contains_key("@search.action") => {
                    let mut with_action = fields.clone();
                    with_action.insert("@search.action".to_string(), json!("upload"));
                    Value::Object(with_action)
                }
                other => other.clone(),
            })
            .collect()
    }
}

#[async_trait]
impl DocumentSink for SearchIndexWriter {
    async fn upload_documents(&self, documents: &[Value]) -> Result<(), KnowledgeError> {
        if documents.is_empty() {
            info!("No documents to upload to index: {}", self.index_name);
            return Ok(());
        }

        debug!("Uploading {} documents to index: {}", documents.len(), self.index_name);
        let body = json!({ "value": Self::to_actions(documents) });
        let path = format!("indexes/{}/docs/index", self.index_name);

        let request = ApiRequest::new(
            Method::POST,
            &self.config.endpoint,
            &path,
            &self.config.admin_key,
        )
        .api_version(&self.config.api_version)
        .timeout_secs(self.config.timeout_secs)
        .json_body(&body);

        // TODO: surface per-document statuses from the indexing response
        send_request(Some(&self.http), request).await.map_err(|e| {
            error!("Failed to upload batch to index {}: {}", self.index_name, e);
            e
        })?;

        info!(
            "✅ Successfully uploaded {} documents to index: {}",
            documents.len(),
            self.index_name
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(endpoint: String) -> SearchConfig {
        SearchConfig {
            endpoint,
            admin_key: "admin-key".to_string(),
            api_version: "2025-11-01-Preview".to_string(),
            timeout_secs: 30,
        }
    }

    #[tokio::test]
    async fn batch_is_posted_with_upload_actions() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/indexes/hotels/docs/index")
            .match_query(mockito::Matcher::UrlEncoded(
                "api-version".into(),
                "2025-11-01-Preview".into(),
            ))
            .match_body(mockito::Matcher::Json(json!({
                "value": [
                    {"@search.action": "upload", "id": "1", "title": "first"},
                    {"@search.action": "mergeOrUpload", "id": "2"}
                ]
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"value":[{"key":"1","status":true},{"key":"2","status":true}]}"#)
            .create_async()
            .await;

        let writer = SearchIndexWriter::new(
            test_config(server.url()),
            "hotels".to_string(),
            Client::new(),
        );
        let documents = vec![
            json!({"id": "1", "title": "first"}),
            json!({"@search.action": "mergeOrUpload", "id": "2"}),
        ];
        writer.upload_documents(&documents).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn rejected_batch_surfaces_the_http_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/indexes/hotels/docs/index")
            .match_query(mockito::Matcher::Any)
            .with_status(403)
            .with_body("api key is not authorized")
            .create_async()
            .await;

        let writer = SearchIndexWriter::new(
            test_config(server.url()),
            "hotels".to_string(),
            Client::new(),
        );
        let err = writer
            .upload_documents(&[json!({"id": "1"})])
            .await
            .unwrap_err();
        match err {
            KnowledgeError::Http { status, ref detail, .. } => {
                assert_eq!(status, 403);
                assert_eq!(detail, "api key is not authorized");
            }
            other => panic!("expected Http error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn empty_batch_performs_no_call() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/indexes/hotels/docs/index")
            .expect(0)
            .create_async()
            .await;

        let writer = SearchIndexWriter::new(
            test_config(server.url()),
            "hotels".to_string(),
            Client::new(),
        );
        writer.upload_documents(&[]).await.unwrap();
        mock.assert_async().await;
    }
}
