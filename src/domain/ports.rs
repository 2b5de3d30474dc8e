use async_trait::async_trait;
use crate::domain::error::KnowledgeError;

#[async_trait]
pub trait DocumentSink: Send + Sync {
    async fn upload_documents(&self, documents: &[serde_json::Value]) -> Result<(), KnowledgeError>;
}
