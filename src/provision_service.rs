use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use reqwest::Client;
use serde_json::Value;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::application::bulk_upload::BulkUploader;
use crate::application::provisioning::{
    find_index_restores, knowledge_base_payload, knowledge_source_payload, retrieval_payload,
};
use crate::config::AppConfig;
use crate::domain::error::KnowledgeError;
use crate::domain::models::{RestoreOutcome, SyncReport};
use crate::domain::ports::DocumentSink;
use crate::infrastructure::blob::container::BlobContainerClient;
use crate::infrastructure::http::executor::ApiResponse;
use crate::infrastructure::search::index_writer::SearchIndexWriter;
use crate::infrastructure::search::knowledge_api::KnowledgeApiClient;

pub struct ProvisionService {
    config: AppConfig,
    api: KnowledgeApiClient,
    blob: BlobContainerClient,
    http: Client,
}

impl ProvisionService {
    pub fn new(config: AppConfig) -> Result<Self, KnowledgeError> {
        debug!("Initializing provisioning service");
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(config.search.timeout_secs))
            .build()
            .map_err(|e| KnowledgeError::Transport(e.to_string()))?;

        let api = KnowledgeApiClient::with_session(config.search.clone(), http.clone());
        let blob = BlobContainerClient::new(
            &config.blob.container_sas_url,
            config.search.timeout_secs,
            http.clone(),
        )?;
        debug!("Provisioning service initialized");

        Ok(Self { config, api, blob, http })
    }

    pub async fn run(&self) -> Result<(), KnowledgeError> {
        info!("Starting knowledge stack provisioning");

        debug!("Step 1: Ensuring blob container exists");
        self.blob.ensure_container().await?;

        debug!("Step 2: Syncing local documents to blob storage");
        self.sync_local_docs().await?;

        debug!("Step 3: Restoring search indexes");
        self.restore_indexes().await?;

        debug!("Step 4: Creating knowledge source");
        self.create_knowledge_source().await?;

        debug!("Step 5: Creating knowledge base");
        self.create_knowledge_base().await?;

        info!("✅ Knowledge stack provisioning complete");
        Ok(())
    }

    pub async fn sync_local_docs(&self) -> Result<SyncReport, KnowledgeError> {
        let docs_path = &self.config.blob.local_docs_path;
        if !docs_path.is_dir() {
            warn!("Documents not found at: {}", docs_path.display());
            return Ok(SyncReport { uploaded: 0, skipped: 0, failed: 0 });
        }

        info!("Uploading documents from: {}", docs_path.display());
        let mut report = SyncReport { uploaded: 0, skipped: 0, failed: 0 };

        let mut entries = tokio::fs::read_dir(docs_path).await?;
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let blob_name = entry.file_name().to_string_lossy().to_string();
            match self.sync_one(&entry.path(), &blob_name).await {
                Ok(true) => {
                    info!("Uploaded: {}", blob_name);
                    report.uploaded += 1;
                }
                Ok(false) => report.skipped += 1,
                Err(e) => {
                    // One bad file should not stop the sweep
                    error!("Failed to upload {}: {}", blob_name, e);
                    report.failed += 1;
                }
            }
        }

        info!(
            "Upload complete: {} uploaded, {} skipped, {} failed",
            report.uploaded, report.skipped, report.failed
        );
        Ok(report)
    }

    async fn sync_one(&self, path: &Path, blob_name: &str) -> Result<bool, KnowledgeError> {
        if self.blob.blob_exists(blob_name).await? {
            return Ok(false);
        }
        let bytes = tokio::fs::read(path).await?;
        self.blob.upload_blob(blob_name, bytes).await?;
        Ok(true)
    }

    pub async fn restore_indexes(&self) -> Result<Vec<RestoreOutcome>, KnowledgeError> {
        let data_dir = &self.config.upload.data_dir;
        if !data_dir.is_dir() {
            warn!("Index data directory not found at: {}", data_dir.display());
            return Ok(Vec::new());
        }

        let restores = find_index_restores(data_dir)?;
        let mut outcomes = Vec::with_capacity(restores.len());

        for (i, restore) in restores.iter().enumerate() {
            if i > 0 {
                // Back off between restores to stay under service rate limits
                debug!(
                    "Waiting {}s before next index restore",
                    self.config.upload.restore_delay_secs
                );
                sleep(Duration::from_secs(self.config.upload.restore_delay_secs)).await;
            }

            info!("Restoring index: {}", restore.name);
            let schema_text = tokio::fs::read_to_string(&restore.schema_path).await?;
            let schema: Value = serde_json::from_str(&schema_text).map_err(|e| {
                error!("Invalid index schema {}: {}", restore.schema_path.display(), e);
                KnowledgeError::Decode(e.to_string())
            })?;
            self.api.create_or_update_index(&restore.name, &schema).await?;

            let report = match &restore.data_path {
                Some(data_path) => {
                    let writer = Arc::new(SearchIndexWriter::new(
                        self.config.search.clone(),
                        restore.name.clone(),
                        self.http.clone(),
                    ));
                    let uploader = BulkUploader::with_batch_size(
                        writer as Arc<dyn DocumentSink>,
                        self.config.upload.batch_size,
                    );
                    Some(uploader.upload_file(data_path).await?)
                }
                None => {
                    debug!("No data file for index: {}", restore.name);
                    None
                }
            };
            outcomes.push(RestoreOutcome { index_name: restore.name.clone(), report });
        }

        info!("✅ Restored {} index(es)", outcomes.len());
        Ok(outcomes)
    }

    pub async fn create_knowledge_source(&self) -> Result<(), KnowledgeError> {
        let name = &self.config.knowledge.source_name;
        info!("Creating/updating Knowledge Source: {}", name);

        let payload = knowledge_source_payload(name, &self.config.blob, &self.config.openai);
        self.api.create_or_update_knowledge_source(name, &payload).await?;
        info!("✅ Knowledge Source created: {}", name);

        match self.api.get_knowledge_source_status(name).await {
            Ok(ApiResponse::Json(status)) => info!("Knowledge Source status: {}", status),
            Ok(_) => debug!("Knowledge Source status unavailable"),
            Err(e) => warn!("Could not fetch Knowledge Source status: {}", e),
        }
        Ok(())
    }

    pub async fn create_knowledge_base(&self) -> Result<(), KnowledgeError> {
        let name = &self.config.knowledge.base_name;
        info!("Creating/updating Knowledge Base: {}", name);

        let payload = knowledge_base_payload(
            name,
            &self.config.knowledge.source_name,
            &self.config.openai,
        );
        self.api.create_or_update_knowledge_base(name, &payload).await?;
        info!("✅ Knowledge Base created: {}", name);
        Ok(())
    }

    pub async fn retrieve(&self, question: &str) -> Result<Value, KnowledgeError> {
        info!("Retrieving from Knowledge Base: {}", self.config.knowledge.base_name);
        let payload = retrieval_payload(question);
        self.api
            .retrieve(&self.config.knowledge.base_name, &payload)
            .await?
            .into_json()
    }

    pub async fn cleanup(&self) -> Result<(), KnowledgeError> {
        let base_name = &self.config.knowledge.base_name;
        info!("Deleting Knowledge Base: {}", base_name);
        match self.api.delete_knowledge_base(base_name).await {
            Ok(_) => info!("Knowledge Base deleted: {}", base_name),
            Err(ref e) if e.status() == Some(404) => {
                info!("Knowledge Base already absent: {}", base_name)
            }
            Err(e) => return Err(e),
        }

        let source_name = &self.config.knowledge.source_name;
        info!("Deleting Knowledge Source: {}", source_name);
        match self.api.delete_knowledge_source(source_name).await {
            Ok(_) => info!("Knowledge Source deleted: {}", source_name),
            Err(ref e) if e.status() == Some(404) => {
                info!("Knowledge Source already absent: {}", source_name)
            }
            Err(e) => return Err(e),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AzureOpenAiConfig, BlobConfig, KnowledgeNames, SearchConfig, UploadConfig};
    use std::fs;
    use std::path::PathBuf;

    fn test_config(search_url: String, blob_url: String, data_dir: PathBuf, docs_dir: PathBuf) -> AppConfig {
        AppConfig {
            search: SearchConfig {
                endpoint: search_url,
                admin_key: "admin-key".to_string(),
                api_version: "2025-11-01-Preview".to_string(),
                timeout_secs: 30,
            },
            blob: BlobConfig {
                container_sas_url: format!("{}/documents?sv=2024-01-01&sig=secret", blob_url),
                search_connection_string: "conn-str".to_string(),
                container_name: "documents".to_string(),
                local_docs_path: docs_dir,
            },
            openai: AzureOpenAiConfig {
                endpoint: "https://aoai.example.net".to_string(),
                api_key: Some("aoai-key".to_string()),
                embedding_deployment: "embed".to_string(),
                embedding_model: "text-embedding-3-large".to_string(),
                chat_deployment: "chat".to_string(),
                chat_model: "gpt-5-mini".to_string(),
                use_verbalization: false,
            },
            upload: UploadConfig {
                batch_size: 2,
                data_dir,
                restore_delay_secs: 0,
            },
            knowledge: KnowledgeNames {
                source_name: "blob-src".to_string(),
                base_name: "kb".to_string(),
            },
        }
    }

    #[tokio::test]
    async fn restore_creates_the_index_then_bulk_loads_in_batches() {
        let mut server = mockito::Server::new_async().await;
        let schema_mock = server
            .mock("PUT", "/indexes/hotels")
            .match_query(mockito::Matcher::Any)
            .with_status(201)
            .with_header("content-type", "application/json")
            .with_body(r#"{"name":"hotels"}"#)
            .create_async()
            .await;
        let docs_mock = server
            .mock("POST", "/indexes/hotels/docs/index")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"value":[]}"#)
            .expect(2)
            .create_async()
            .await;

        let data_dir = tempfile::tempdir().unwrap();
        fs::write(
            data_dir.path().join("hotels.index.json"),
            r#"{"name":"hotels","fields":[]}"#,
        )
        .unwrap();
        fs::write(
            data_dir.path().join("hotels.ndjson"),
            "{\"id\":\"1\"}\n{\"id\":\"2\"}\n{\"id\":\"3\"}\n",
        )
        .unwrap();

        let config = test_config(
            server.url(),
            server.url(),
            data_dir.path().to_path_buf(),
            PathBuf::from("/nonexistent"),
        );
        let service = ProvisionService::new(config).unwrap();
        let outcomes = service.restore_indexes().await.unwrap();

        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].index_name, "hotels");
        let report = outcomes[0].report.as_ref().unwrap();
        assert_eq!(report.total_uploaded, 3);
        assert_eq!(report.batches, 2);

        schema_mock.assert_async().await;
        docs_mock.assert_async().await;
    }

    #[tokio::test]
    async fn doc_sync_uploads_new_blobs_and_skips_existing() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("HEAD", "/documents/fresh.md")
            .match_query(mockito::Matcher::Any)
            .with_status(404)
            .create_async()
            .await;
        let upload_mock = server
            .mock("PUT", "/documents/fresh.md")
            .match_query(mockito::Matcher::Any)
            .match_header("x-ms-blob-type", "BlockBlob")
            .with_status(201)
            .create_async()
            .await;
        server
            .mock("HEAD", "/documents/seen.md")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .create_async()
            .await;

        let docs_dir = tempfile::tempdir().unwrap();
        fs::write(docs_dir.path().join("fresh.md"), "new doc").unwrap();
        fs::write(docs_dir.path().join("seen.md"), "old doc").unwrap();

        let config = test_config(
            server.url(),
            server.url(),
            PathBuf::from("/nonexistent"),
            docs_dir.path().to_path_buf(),
        );
        let service = ProvisionService::new(config).unwrap();
        let report = service.sync_local_docs().await.unwrap();

        assert_eq!(report.uploaded, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.failed, 0);
        upload_mock.assert_async().await;
    }

    #[tokio::test]
    async fn cleanup_tolerates_absent_resources() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("DELETE", "/knowledgebases/kb")
            .match_query(mockito::Matcher::Any)
            .with_status(404)
            .create_async()
            .await;
        server
            .mock("DELETE", "/knowledgesources/blob-src")
            .match_query(mockito::Matcher::Any)
            .with_status(204)
            .create_async()
            .await;

        let config = test_config(
            server.url(),
            server.url(),
            PathBuf::from("/nonexistent"),
            PathBuf::from("/nonexistent"),
        );
        let service = ProvisionService::new(config).unwrap();
        service.cleanup().await.unwrap();
    }
}
