use std::env;
use std::path::PathBuf;
use tracing::debug;
use crate::domain::error::KnowledgeError;

pub const DEFAULT_API_VERSION: &str = "2025-11-01-Preview";
pub const DEFAULT_TIMEOUT_SECS: u64 = 90;
pub const DEFAULT_BATCH_SIZE: usize = 100;

#[derive(Debug, Clone)]
pub struct SearchConfig {
    pub endpoint: String,
    pub admin_key: String,
    pub api_version: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct BlobConfig {
    pub container_sas_url: String,
    pub search_connection_string: String,
    pub container_name: String,
    pub local_docs_path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct AzureOpenAiConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub embedding_deployment: String,
    pub embedding_model: String,
    pub chat_deployment: String,
    pub chat_model: String,
    pub use_verbalization: bool,
}

#[derive(Debug, Clone)]
pub struct UploadConfig {
    pub batch_size: usize,
    pub data_dir: PathBuf,
    pub restore_delay_secs: u64,
}

#[derive(Debug, Clone)]
pub struct KnowledgeNames {
    pub source_name: String,
    pub base_name: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub search: SearchConfig,
    pub blob: BlobConfig,
    pub openai: AzureOpenAiConfig,
    pub upload: UploadConfig,
    pub knowledge: KnowledgeNames,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, KnowledgeError> {
        debug!("Loading configuration from environment");

        let search = SearchConfig {
            endpoint: required("AZURE_SEARCH_SERVICE_ENDPOINT")?,
            admin_key: required("AZURE_SEARCH_ADMIN_KEY")?,
            api_version: optional("AZURE_SEARCH_API_VERSION", DEFAULT_API_VERSION),
            timeout_secs: parsed("KB_CLIENT_TIMEOUT", DEFAULT_TIMEOUT_SECS)?,
        };

        let blob = BlobConfig {
            container_sas_url: required("BLOB_CONTAINER_SAS_URL")?,
            search_connection_string: required("SEARCH_BLOB_DATASOURCE_CONNECTION_STRING")?,
            container_name: optional("BLOB_CONTAINER_NAME", "documents"),
            local_docs_path: PathBuf::from(optional("LOCAL_DOCS_PATH", "data/ai-search-data")),
        };

        let openai = AzureOpenAiConfig {
            endpoint: required("AZURE_OPENAI_ENDPOINT")?,
            api_key: env::var("AZURE_OPENAI_KEY").ok(),
            embedding_deployment: optional("AZURE_OPENAI_EMBEDDING_DEPLOYMENT", "text-embedding-3-large"),
            embedding_model: optional("AZURE_OPENAI_EMBEDDING_MODEL_NAME", "text-embedding-3-large"),
            chat_deployment: optional("AZURE_OPENAI_CHATGPT_DEPLOYMENT", "gpt-5-mini"),
            chat_model: optional("AZURE_OPENAI_CHATGPT_MODEL_NAME", "gpt-5-mini"),
            use_verbalization: optional("USE_VERBALIZATION", "false").to_lowercase() == "true",
        };

        let batch_size: usize = parsed("UPLOAD_BATCH_SIZE", DEFAULT_BATCH_SIZE)?;
        if batch_size == 0 {
            return Err(KnowledgeError::Config(
                "UPLOAD_BATCH_SIZE must be at least 1".to_string(),
            ));
        }

        let upload = UploadConfig {
            batch_size,
            data_dir: PathBuf::from(optional("SEARCH_DATA_DIR", "data/indexes")),
            restore_delay_secs: parsed("RESTORE_DELAY_SECONDS", 5)?,
        };

        let knowledge = KnowledgeNames {
            source_name: optional("AZURE_SEARCH_KNOWLEDGE_SOURCE", "blob-knowledge-source"),
            base_name: optional("AZURE_SEARCH_KNOWLEDGE_BASE", "blob-knowledge-base"),
        };

        debug!(
            "Configuration loaded - endpoint: {}, batch_size: {}, timeout: {}s",
            search.endpoint, upload.batch_size, search.timeout_secs
        );

        Ok(Self { search, blob, openai, upload, knowledge })
    }
}

fn required(name: &str) -> Result<String, KnowledgeError> {
    env::var(name).map_err(|_| {
        KnowledgeError::Config(format!("{} environment variable is required", name))
    })
}

fn optional(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn parsed<T: std::str::FromStr>(name: &str, default: T) -> Result<T, KnowledgeError> {
    match env::var(name) {
        Ok(raw) => raw.parse::<T>().map_err(|_| {
            KnowledgeError::Config(format!("{} has an invalid value: {}", name, raw))
        }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REQUIRED: [&str; 5] = [
        "AZURE_SEARCH_SERVICE_ENDPOINT",
        "AZURE_SEARCH_ADMIN_KEY",
        "BLOB_CONTAINER_SAS_URL",
        "SEARCH_BLOB_DATASOURCE_CONNECTION_STRING",
        "AZURE_OPENAI_ENDPOINT",
    ];

    // One sequential test: the environment is process-global state.
    #[test]
    fn from_env_applies_defaults_and_validates() {
        for name in REQUIRED {
            env::set_var(name, "value");
        }
        env::set_var("AZURE_SEARCH_SERVICE_ENDPOINT", "https://svc.search.windows.net");

        let config = AppConfig::from_env().unwrap();
        assert_eq!(config.search.api_version, DEFAULT_API_VERSION);
        assert_eq!(config.search.timeout_secs, DEFAULT_TIMEOUT_SECS);
        assert_eq!(config.upload.batch_size, DEFAULT_BATCH_SIZE);
        assert_eq!(config.upload.restore_delay_secs, 5);
        assert_eq!(config.blob.container_name, "documents");
        assert_eq!(config.knowledge.source_name, "blob-knowledge-source");
        assert_eq!(config.knowledge.base_name, "blob-knowledge-base");
        assert!(!config.openai.use_verbalization);

        env::set_var("UPLOAD_BATCH_SIZE", "0");
        let err = AppConfig::from_env().unwrap_err();
        match err {
            KnowledgeError::Config(ref message) => assert!(message.contains("UPLOAD_BATCH_SIZE")),
            other => panic!("expected Config error, got {:?}", other),
        }
        env::set_var("UPLOAD_BATCH_SIZE", "not-a-number");
        assert!(AppConfig::from_env().is_err());
        env::remove_var("UPLOAD_BATCH_SIZE");

        env::remove_var("AZURE_SEARCH_ADMIN_KEY");
        let err = AppConfig::from_env().unwrap_err();
        match err {
            KnowledgeError::Config(ref message) => {
                assert!(message.contains("AZURE_SEARCH_ADMIN_KEY"))
            }
            other => panic!("expected Config error, got {:?}", other),
        }

        for name in REQUIRED {
            env::remove_var(name);
        }
    }
}
