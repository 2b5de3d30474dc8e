use std::time::Duration;
use reqwest::{Client, StatusCode};
use tracing::{debug, error, info};

use crate::domain::error::KnowledgeError;
use crate::infrastructure::http::executor::{error_for_status, wrap_transport};

#[derive(Debug)]
pub struct BlobContainerClient {
    http: Client,
    container_url: String,
    sas_query: String,
    timeout_secs: u64,
}

impl BlobContainerClient {
    pub fn new(
        container_sas_url: &str,
        timeout_secs: u64,
        http: Client,
    ) -> Result<Self, KnowledgeError> {
        let (container_url, sas_query) = match container_sas_url.split_once('?') {
            Some((base, query)) if !query.is_empty() => {
                (base.trim_end_matches('/').to_string(), query.to_string())
            }
            _ => {
                return Err(KnowledgeError::Config(
                    "BLOB_CONTAINER_SAS_URL must carry a SAS query string".to_string(),
                ))
            }
        };
        debug!("Initializing blob container client for: {}", container_url);
        Ok(Self { http, container_url, sas_query, timeout_secs })
    }

    fn container_op_url(&self, operation: &str) -> String {
        format!("{}?{}&{}", self.container_url, operation, self.sas_query)
    }

    fn blob_url(&self, blob_name: &str) -> String {
        format!("{}/{}?{}", self.container_url, blob_name, self.sas_query)
    }

    pub async fn ensure_container(&self) -> Result<bool, KnowledgeError> {
        let url = self.container_op_url("restype=container");
        debug!("Ensuring container exists: {}", self.container_url);

        let response = self
            .http
            .put(&url)
            .header("content-length", "0")
            .timeout(Duration::from_secs(self.timeout_secs))
            .send()
            .await
            .map_err(|e| wrap_transport(e, &self.container_url, self.timeout_secs))?;

        match response.status() {
            StatusCode::CREATED => {
                info!("Created container: {}", self.container_url);
                Ok(true)
            }
            StatusCode::CONFLICT => {
                info!("Container exists: {}", self.container_url);
                Ok(false)
            }
            status if status.as_u16() >= 400 => {
                Err(error_for_status(&self.container_url, response).await)
            }
            _ => Ok(false),
        }
    }

    pub async fn blob_exists(&self, blob_name: &str) -> Result<bool, KnowledgeError> {
        let url = self.blob_url(blob_name);
        let response = self
            .http
            .head(&url)
            .timeout(Duration::from_secs(self.timeout_secs))
            .send()
            .await
            .map_err(|e| wrap_transport(e, &self.container_url, self.timeout_secs))?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            status if status.as_u16() >= 400 => {
                Err(error_for_status(&self.container_url, response).await)
            }
            _ => Ok(true),
        }
    }

    pub async fn upload_blob(&self, blob_name: &str, bytes: Vec<u8>) -> Result<(), KnowledgeError> {
        let url = self.blob_url(blob_name);
        debug!("Uploading blob: {} ({} bytes)", blob_name, bytes.len());

        let response = self
            .http
            .put(&url)
            .header("x-ms-blob-type", "BlockBlob")
            .body(bytes)
            .timeout(Duration::from_secs(self.timeout_secs))
            .send()
            .await
            .map_err(|e| {
                error!("Failed to upload blob {}: {}", blob_name, e);
                wrap_transport(e, &self.container_url, self.timeout_secs)
            })?;

        if response.status().as_u16() >= 400 {
            return Err(error_for_status(&self.container_url, response).await);
        }
        Ok(())
    }
}
