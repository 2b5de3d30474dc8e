use std::time::Duration;
use reqwest::{Client, Method};
use serde_json::Value;

use crate::config::SearchConfig;
use crate::domain::error::KnowledgeError;
use crate::infrastructure::http::executor::{send_request, ApiResponse, ApiRequest};

pub struct KnowledgeApiClient {
    config: SearchConfig,
    http: Client,
}

impl KnowledgeApiClient {
    pub fn new(config: SearchConfig) -> Result<Self, KnowledgeError> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| KnowledgeError::Transport(e.to_string()))?;
        Ok(Self::with_session(config, http))
    }

    pub fn with_session(config: SearchConfig, http: Client) -> Self {
        Self { config, http }
    }

    async fn call(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<ApiResponse, KnowledgeError> {
        let mut request = ApiRequest::new(method, &self.config.endpoint, path, &self.config.admin_key)
            .api_version(&self.config.api_version)
            .timeout_secs(self.config.timeout_secs);
        if let Some(body) = body {
            request = request.json_body(body);
        }
        send_request(Some(&self.http), request).await
    }

    pub async fn list_knowledge_bases(&self) -> Result<ApiResponse, KnowledgeError> {
        self.call(Method::GET, "knowledgebases", None).await
    }

    pub async fn get_knowledge_base(&self, name: &str) -> Result<ApiResponse, KnowledgeError> {
        self.call(Method::GET, &format!("knowledgebases/{}", name), None).await
    }

    pub async fn create_or_update_knowledge_base(
        &self,
        name: &str,
        body: &Value,
    ) -> Result<ApiResponse, KnowledgeError> {
        self.call(Method::PUT, &format!("knowledgebases/{}", name), Some(body)).await
    }

    pub async fn delete_knowledge_base(&self, name: &str) -> Result<ApiResponse, KnowledgeError> {
        self.call(Method::DELETE, &format!("knowledgebases/{}", name), None).await
    }

    pub async fn retrieve(&self, name: &str, body: &Value) -> Result<ApiResponse, KnowledgeError> {
        self.call(Method::POST, &format!("knowledgebases/{}/retrieve", name), Some(body)).await
    }

    pub async fn list_knowledge_sources(&self) -> Result<ApiResponse, KnowledgeError> {
        self.call(Method::GET, "knowledgesources", None).await
    }

    pub async fn get_knowledge_source(&self, name: &str) -> Result<ApiResponse, KnowledgeError> {
        self.call(Method::GET, &format!("knowledgesources/{}", name), None).await
    }

    pub async fn get_knowledge_source_status(
        &self,
        name: &str,
    ) -> Result<ApiResponse, KnowledgeError> {
        self.call(Method::GET, &format!("knowledgesources/{}/status", name), None).await
    }

    pub async fn create_or_update_knowledge_source(
        &self,
        name: &str,
        body: &Value,
    ) -> Result<ApiResponse, KnowledgeError> {
        self.call(Method::PUT, &format!("knowledgesources/{}", name), Some(body)).await
    }

    pub async fn delete_knowledge_source(&self, name: &str) -> Result<ApiResponse, KnowledgeError> {
        self.call(Method::DELETE, &format!("knowledgesources/{}", name), None).await
    }

    pub async fn create_or_update_index(
        &self,
        name: &str,
        schema: &Value,
    ) -> Result<ApiResponse, KnowledgeError> {
        self.call(Method::PUT, &format!("indexes/{}", name), Some(schema)).await
    }
}
